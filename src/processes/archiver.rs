use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use atrium_api::types::string::Did;
use chrono::{DateTime, SecondsFormat, Utc};
use log::info;

use crate::services::Bluesky;

const JPEG_MIME: &str = "image/jpeg";

/// Where everything archived for `did` lives.
pub fn account_dir(root: &Path, did: &Did) -> PathBuf {
    root.join(did.as_str().replace(':', "_"))
}

pub fn snapshot_path(root: &Path, did: &Did, now: DateTime<Utc>) -> PathBuf {
    let stamp = now
        .to_rfc3339_opts(SecondsFormat::Micros, false)
        .replace(':', "_");

    account_dir(root, did).join(format!("bsky-archive-{stamp}.car"))
}

/// Blobs keep their CID as the file name; sniffed JPEGs get an extension.
pub fn blob_file_name(cid: &str, blob: &[u8]) -> String {
    match infer::get(blob) {
        Some(kind) if kind.mime_type() == JPEG_MIME => format!("{cid}.jpeg"),
        _ => cid.to_string(),
    }
}

/// Saves the repository and every blob of the logged in account under `root`.
///
/// Returns the repository CAR bytes.
pub async fn archive_repo(
    bluesky: &Bluesky,
    root: &Path,
    now: DateTime<Utc>,
    verbosity: u8,
) -> Result<Vec<u8>> {
    let did = bluesky.did();
    let blob_dir = account_dir(root, did).join("_blob");

    tokio::fs::create_dir_all(&blob_dir)
        .await
        .with_context(|| format!("failed to create {}", blob_dir.display()))?;

    println!("Archiving posts...");

    let repo = bluesky
        .get_repo()
        .await
        .context("failed to fetch repository")?;

    let snapshot = snapshot_path(root, did, now);
    tokio::fs::write(&snapshot, &repo)
        .await
        .with_context(|| format!("failed to write {}", snapshot.display()))?;

    info!("Archived repository to {}", snapshot.display());

    println!("Downloading and archiving media...");

    let mut cids = Vec::new();
    let mut cursor: Option<String> = None;
    loop {
        let page = bluesky
            .list_blobs(cursor.as_deref())
            .await
            .context("failed to list blobs")?;

        cids.extend(page.cids);

        match page.cursor {
            Some(next) if !next.is_empty() => cursor = Some(next),
            _ => break,
        }
    }

    let total = cids.len();
    for (position, cid) in cids.iter().enumerate() {
        let blob = bluesky
            .get_blob(cid)
            .await
            .with_context(|| format!("failed to fetch blob {cid}"))?;

        let name = blob_file_name(cid, &blob);
        if verbosity == 2 {
            println!("Saving {name}");
        }

        tokio::fs::write(blob_dir.join(&name), &blob)
            .await
            .with_context(|| format!("failed to write blob {name}"))?;

        println!("[{}/{total}] media archived", position + 1);
    }

    info!("Archived {total} blobs to {}", blob_dir.display());

    Ok(repo)
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn me() -> Did {
        Did::new("did:plc:abc123".to_string()).unwrap()
    }

    #[test]
    fn account_directories_have_no_colons() {
        assert_eq!(
            account_dir(Path::new("archive"), &me()),
            PathBuf::from("archive/did_plc_abc123")
        );
    }

    #[test]
    fn snapshot_names_carry_the_run_time() {
        let now = Utc.with_ymd_and_hms(2024, 3, 5, 7, 8, 9).unwrap();

        assert_eq!(
            snapshot_path(Path::new("archive"), &me(), now),
            PathBuf::from(
                "archive/did_plc_abc123/bsky-archive-2024-03-05T07_08_09.000000+00_00.car"
            )
        );
    }

    #[test]
    fn only_jpegs_get_an_extension() {
        let jpeg = [0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F'];
        let png = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0x00];

        assert_eq!(blob_file_name("bafkjpeg", &jpeg), "bafkjpeg.jpeg");
        assert_eq!(blob_file_name("bafkpng", &png), "bafkpng");
        assert_eq!(blob_file_name("bafkblob", b"plain bytes"), "bafkblob");
    }
}
