extern crate skeeter_deleter;

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

use skeeter_deleter::config::Config;
use skeeter_deleter::processes::{skeeter_deleter::run_logger, Options, SkeeterDeleter};

/// Archives a Bluesky account, then deletes old posts the account liked itself.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// A complex setting. ATProto pagination is awkward and will page through the
    /// whole history of an account even if there are no likes to be found. If likes
    /// have already been purged, a token at a reasonable point in the recent past
    /// terminates the search early. Tokens are short alphanumeric strings.
    #[arg(short = 'c', long, default_value = "")]
    fixed_likes_cursor: String,

    /// Show more information about what is happening.
    #[arg(short, long, conflicts_with = "very_verbose")]
    verbose: bool,

    /// Show granular information about what is happening.
    #[arg(long)]
    very_verbose: bool,

    /// Ignore warning prompts for deletion. Necessary for running in automation.
    #[arg(short, long)]
    yes: bool,

    /// Optional TOML file; BLUESKY_* environment variables take precedence.
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,
}

impl Args {
    fn verbosity(&self) -> u8 {
        if self.very_verbose {
            2
        } else if self.verbose {
            1
        } else {
            0
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = Config::load(&args.config)?;
    let logger = run_logger(&config.log_file)?;

    let options = Options {
        fixed_likes_cursor: Some(args.fixed_likes_cursor.clone()).filter(|c| !c.is_empty()),
        verbosity: args.verbosity(),
        auto_confirm: args.yes,
    };

    SkeeterDeleter::new(config, options, logger).run().await
}
