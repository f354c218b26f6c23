use std::path::PathBuf;

use anyhow::{Context, Result};
use atrium_api::types::string::Did;
use clap::Parser;
use env_logger::Env;
use log::{error, info};

use skeeter_deleter::algos::{self, SubjectCheck};
use skeeter_deleter::services::bluesky::{Archive, ArchiveRecord};

/// Lists the records of a saved `.car` snapshot without touching the network.
#[derive(Parser, Debug)]
struct Args {
    /// Path to a `bsky-archive-*.car` file.
    archive: PathBuf,

    /// Only report likes on this account's posts.
    #[arg(long)]
    self_likes_of: Option<String>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let bytes = tokio::fs::read(&args.archive)
        .await
        .with_context(|| format!("failed to read {}", args.archive.display()))?;
    let archive = Archive::decode(&bytes).await?;

    info!("{} blocks in {}", archive.len(), args.archive.display());

    if let Some(did) = args.self_likes_of {
        let did = match Did::new(did) {
            Ok(did) => did,
            Err(e) => {
                error!("Not a DID: {e}");
                return Ok(());
            }
        };

        for check in [SubjectCheck::RequireArchivedBlock, SubjectCheck::UriOnly] {
            let likes = algos::self_like_records(&archive, &did, check);
            info!("{check:?}: {} self-likes", likes.len());

            if check == SubjectCheck::RequireArchivedBlock {
                for like in likes {
                    info!("{} liked on {}", like.subject.uri, describe_date(&like.created_at));
                }
            }
        }

        return Ok(());
    }

    let (mut likes, mut posts, mut other) = (0, 0, 0);
    for record in archive.records() {
        match record {
            ArchiveRecord::Like(like) => {
                likes += 1;
                info!("like {} ({})", like.subject.uri, describe_date(&like.created_at));
            }
            ArchiveRecord::Post(post) => {
                posts += 1;
                match post.langs.as_deref() {
                    Some(langs) if !langs.is_empty() => {
                        info!("post {} [{}]: {}", post.created_at, langs.join(","), post.text)
                    }
                    _ => info!("post {}: {}", post.created_at, post.text),
                }
            }
            ArchiveRecord::Other => other += 1,
        }
    }

    info!("{posts} posts, {likes} likes, {other} other blocks");

    Ok(())
}

fn describe_date(created_at: &Option<String>) -> &str {
    created_at.as_deref().unwrap_or("an unknown date")
}
