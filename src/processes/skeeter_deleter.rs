use std::fs::OpenOptions;
use std::io::{BufRead, IsTerminal, Write};
use std::path::Path;

use anyhow::{Context, Result};
use atrium_api::types::string::Did;
use chrono::{DateTime, Utc};
use console::Term;
use dialoguer::Input;
use env_logger::{Env, Target, WriteStyle};
use log::{debug, info};

use super::{archiver, remover};
use crate::algos::{self, SubjectCheck};
use crate::config::Config;
use crate::services::bluesky::{Archive, PostService, PostView};
use crate::services::Bluesky;

#[derive(Debug, Clone, Default)]
pub struct Options {
    /// Accepted for compatibility with older runs; only logged.
    pub fixed_likes_cursor: Option<String>,
    pub verbosity: u8,
    pub auto_confirm: bool,
}

/// Builds the run's logger: timestamped lines appended to `path`, INFO and above
/// unless `RUST_LOG` says otherwise.
pub fn run_logger(path: &Path) -> Result<env_logger::Logger> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("failed to open log file {}", path.display()))?;

    Ok(
        env_logger::Builder::from_env(Env::default().default_filter_or("info"))
            .target(Target::Pipe(Box::new(file)))
            .write_style(WriteStyle::Never)
            .format_timestamp_secs()
            .build(),
    )
}

/// Archives the account, then removes the old posts it liked itself.
pub struct SkeeterDeleter {
    config: Config,
    options: Options,
    logger: env_logger::Logger,
    now: DateTime<Utc>,
}

impl SkeeterDeleter {
    pub fn new(config: Config, options: Options, logger: env_logger::Logger) -> Self {
        Self {
            config,
            options,
            logger,
            now: Utc::now(),
        }
    }

    pub async fn run(self) -> Result<()> {
        let Self {
            config,
            options,
            logger,
            now,
        } = self;

        let max_level = logger.filter();
        log::set_boxed_logger(Box::new(logger)).context("a logger is already installed")?;
        log::set_max_level(max_level);

        info!("Starting run at {now}");

        let bluesky = Bluesky::login(&config.service, &config.username, &config.password)
            .await
            .context("failed to log in")?;

        if let Some(cursor) = &options.fixed_likes_cursor {
            info!("Likes cursor fixed at {cursor}");
        }

        let repo = archiver::archive_repo(&bluesky, &config.archive_dir, now, options.verbosity)
            .await
            .context("failed to archive account")?;

        let archive = Archive::decode(&repo)
            .await
            .context("failed to decode repository archive")?;

        let to_delete = select_for_deletion(
            &archive,
            bluesky.did(),
            &bluesky,
            config.subject_check(),
            config.min_age_days,
            now,
        )
        .await;

        println!(
            "Found {} self-liked post{} to delete (only including posts older than {} days).",
            to_delete.len(),
            plural(to_delete.len()),
            config.min_age_days
        );

        delete_confirmed(&bluesky, bluesky.did(), &to_delete, &options, confirm).await?;

        Ok(())
    }
}

/// Asks through `confirm` (unless `auto_confirm` is set) and removes `to_delete`.
///
/// Nothing is asked when there is nothing to remove. Returns how many posts went.
pub async fn delete_confirmed(
    service: &dyn PostService,
    did: &Did,
    to_delete: &[PostView],
    options: &Options,
    confirm: impl FnOnce(usize) -> Result<bool>,
) -> Result<usize> {
    if to_delete.is_empty() {
        return Ok(0);
    }

    if !options.auto_confirm && !confirm(to_delete.len())? {
        info!("Deletion declined");
        return Ok(0);
    }

    Ok(delete_all(service, did, to_delete, options.verbosity).await)
}

/// Self-liked posts of `did` that are older than `min_age_days`.
pub async fn select_for_deletion(
    archive: &Archive,
    did: &Did,
    service: &dyn PostService,
    check: SubjectCheck,
    min_age_days: u32,
    now: DateTime<Utc>,
) -> Vec<PostView> {
    let posts = algos::find_self_liked_posts(archive, did, service, check).await;
    let resolved = posts.len();

    let old: Vec<_> = posts
        .into_iter()
        .filter(|post| algos::is_older_than(post, min_age_days, now))
        .collect();

    debug!(
        "{} of {resolved} self-liked posts are older than {min_age_days} days",
        old.len()
    );

    old
}

/// Removes `posts` one after another. Returns how many went through.
pub async fn delete_all(
    service: &dyn PostService,
    did: &Did,
    posts: &[PostView],
    verbosity: u8,
) -> usize {
    let total = posts.len();

    info!("Deleting {total} post{}", plural(total));
    if verbosity > 0 {
        println!("Deleting {total} post{}", plural(total));
    }

    let mut removed = 0;
    for (position, post) in posts.iter().enumerate() {
        let created_at = post
            .created_at()
            .and_then(|created_at| created_at.as_str())
            .unwrap_or("an unknown date");

        info!("Deleting: {} on {created_at}, CID: {}", post.text(), post.cid);
        if verbosity == 2 {
            println!("Deleting: {} on {created_at}, CID: {}", post.text(), post.cid);
        }

        if remover::remove(service, did, post).await {
            removed += 1;
        }

        println!("[{}/{total}] processed", position + 1);
    }

    info!("Removed {removed} of {total} post{}", plural(total));

    removed
}

fn confirm(count: usize) -> Result<bool> {
    let prompt = format!(
        "\nProceed to delete {count} post{}? WARNING: THIS IS DESTRUCTIVE AND CANNOT BE UNDONE. Y/n",
        plural(count)
    );

    let stdin = std::io::stdin();
    if !(stdin.is_terminal() && Term::stderr().is_term()) {
        return read_confirmation(&mut stdin.lock(), &mut std::io::stderr(), &prompt);
    }

    let answer: String = Input::new()
        .with_prompt(prompt)
        .validate_with(|input: &String| -> Result<(), &str> {
            match input.as_str() {
                "Y" | "n" => Ok(()),
                _ => Err("answer Y or n"),
            }
        })
        .interact_text()
        .context("failed to read confirmation")?;

    Ok(answer == "Y")
}

/// Asks `prompt` until the answer is exactly `Y` or `n`. Running out of input declines.
fn read_confirmation(
    input: &mut impl BufRead,
    output: &mut impl Write,
    prompt: &str,
) -> Result<bool> {
    let mut line = String::new();

    loop {
        write!(output, "{prompt}: ")?;
        output.flush()?;

        line.clear();
        if input
            .read_line(&mut line)
            .context("failed to read confirmation")?
            == 0
        {
            writeln!(output)?;
            return Ok(false);
        }

        match line.trim_end_matches(['\r', '\n']) {
            "Y" => return Ok(true),
            "n" => return Ok(false),
            _ => continue,
        }
    }
}

fn plural(count: usize) -> &'static str {
    if count == 1 {
        ""
    } else {
        "s"
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::algos::fakes::{post_view, FakePostService};
    use crate::services::bluesky::testing::{cid_for, like, post, CarBuilder};

    const ME: &str = "did:plc:me";

    fn me() -> Did {
        Did::new(ME.to_string()).unwrap()
    }

    fn post_uri(rkey: usize) -> String {
        format!("at://{ME}/app.bsky.feed.post/{rkey}")
    }

    #[tokio::test]
    async fn only_archived_old_self_liked_posts_qualify() {
        let now = Utc.with_ymd_and_hms(2024, 6, 10, 0, 0, 0).unwrap();
        let mut car = CarBuilder::new();

        for rkey in 0..3 {
            let cid = car.add(&post(&format!("post {rkey}"), "2024-01-01T00:00:00Z"));
            car.add(&like(&post_uri(rkey), &cid.to_string(), "2024-01-01T00:00:00Z"));
        }
        for rkey in 3..5 {
            let missing = cid_for(format!("gone {rkey}").as_bytes());
            car.add(&like(&post_uri(rkey), &missing.to_string(), "2024-01-01T00:00:00Z"));
        }
        let archive = Archive::decode(&car.build()).await.unwrap();

        let service = FakePostService {
            posts: vec![
                post_view(&post_uri(0), ME, "2024-06-01T00:00:00Z"),
                post_view(&post_uri(1), ME, "2024-06-09T00:00:00Z"),
                post_view(&post_uri(2), ME, "2024-05-01T00:00:00Z"),
                post_view(&post_uri(3), ME, "2024-05-01T00:00:00Z"),
                post_view(&post_uri(4), ME, "2024-05-01T00:00:00Z"),
            ],
            ..Default::default()
        };

        let selected = select_for_deletion(
            &archive,
            &me(),
            &service,
            SubjectCheck::RequireArchivedBlock,
            3,
            now,
        )
        .await;

        let uris: Vec<_> = selected.iter().map(|post| post.uri.clone()).collect();
        assert_eq!(uris, vec![post_uri(0), post_uri(2)]);
        assert_eq!(service.batches.lock().unwrap()[0].len(), 3);
    }

    #[tokio::test]
    async fn one_failed_removal_does_not_stop_the_rest() {
        let service = FakePostService {
            failing_uris: vec![post_uri(1)],
            ..Default::default()
        };
        let posts: Vec<_> = (0..3)
            .map(|rkey| post_view(&post_uri(rkey), ME, "2020-01-01T00:00:00Z"))
            .collect();

        let removed = delete_all(&service, &me(), &posts, 0).await;

        assert_eq!(removed, 2);
        assert_eq!(
            *service.deleted.lock().unwrap(),
            vec![post_uri(0), post_uri(2)]
        );
    }

    #[tokio::test]
    async fn nothing_to_delete_asks_nothing() {
        let service = FakePostService::default();

        let removed = delete_confirmed(&service, &me(), &[], &Options::default(), |_| {
            panic!("no prompt expected")
        })
        .await
        .unwrap();

        assert_eq!(removed, 0);
    }

    #[tokio::test]
    async fn auto_confirm_deletes_without_asking() {
        let service = FakePostService::default();
        let posts = vec![post_view(&post_uri(0), ME, "2020-01-01T00:00:00Z")];
        let options = Options {
            auto_confirm: true,
            ..Default::default()
        };

        let removed = delete_confirmed(&service, &me(), &posts, &options, |_| {
            panic!("no prompt expected")
        })
        .await
        .unwrap();

        assert_eq!(removed, 1);
        assert_eq!(*service.deleted.lock().unwrap(), vec![post_uri(0)]);
    }

    #[tokio::test]
    async fn declining_keeps_every_post() {
        let service = FakePostService::default();
        let posts = vec![
            post_view(&post_uri(0), ME, "2020-01-01T00:00:00Z"),
            post_view(&post_uri(1), ME, "2020-01-01T00:00:00Z"),
        ];

        let mut asked = None;
        let removed = delete_confirmed(&service, &me(), &posts, &Options::default(), |count| {
            asked = Some(count);
            Ok(false)
        })
        .await
        .unwrap();

        assert_eq!(asked, Some(2));
        assert_eq!(removed, 0);
        assert!(service.deleted.lock().unwrap().is_empty());
    }

    #[test]
    fn piped_answers_are_re_asked_until_y_or_n() {
        let mut output = Vec::new();

        let answer =
            read_confirmation(&mut "yes\ny\nY\n".as_bytes(), &mut output, "Proceed?").unwrap();

        assert!(answer);
        assert_eq!(String::from_utf8(output).unwrap().matches("Proceed?: ").count(), 3);
    }

    #[test]
    fn piped_n_and_end_of_input_decline() {
        for input in ["n\r\n", "maybe\n", ""] {
            let answer = read_confirmation(&mut input.as_bytes(), &mut Vec::new(), "Proceed?");
            assert!(!answer.unwrap(), "{input:?}");
        }
    }

    #[test]
    fn log_file_is_appended_with_timestamps_at_info_and_above() {
        use log::{Level, Log, Record};

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.log");

        for message in ["first run", "second run"] {
            let logger = run_logger(&path).unwrap();
            logger.log(
                &Record::builder()
                    .level(Level::Info)
                    .target("skeeter_deleter")
                    .args(format_args!("{message}"))
                    .build(),
            );
            logger.log(
                &Record::builder()
                    .level(Level::Debug)
                    .target("skeeter_deleter")
                    .args(format_args!("hidden detail"))
                    .build(),
            );
            logger.flush();
        }

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = contents.lines().collect();

        assert_eq!(lines.len(), 2, "{contents}");
        assert!(lines[0].ends_with("first run"));
        assert!(lines[1].ends_with("second run"));
        assert!(!contents.contains("hidden detail"));
        for line in lines {
            let stamp = line
                .strip_prefix('[')
                .and_then(|rest| rest.split_whitespace().next())
                .unwrap();
            assert!(DateTime::parse_from_rfc3339(stamp).is_ok(), "{line}");
            assert!(line.contains("INFO"));
        }
    }

    #[test]
    fn counts_are_pluralized() {
        assert_eq!(plural(1), "");
        assert_eq!(plural(0), "s");
        assert_eq!(plural(2), "s");
    }
}
