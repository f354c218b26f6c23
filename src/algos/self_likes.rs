use atrium_api::types::string::Did;
use log::{debug, error};

use crate::services::bluesky::{
    Archive, LikeRecord, PostService, PostView, XrpcError, GET_POSTS_BATCH_SIZE,
};

/// How much a like's subject has to check out before the post is looked up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SubjectCheck {
    /// The liked post's block must be part of the archive as well.
    #[default]
    RequireArchivedBlock,
    UriOnly,
}

/// Likes in the archive that point back at the account's own posts.
pub fn self_like_records(archive: &Archive, did: &Did, check: SubjectCheck) -> Vec<LikeRecord> {
    archive
        .likes()
        .into_iter()
        .filter(|like| like.subject.uri.contains(did.as_str()))
        .filter(|like| match check {
            SubjectCheck::RequireArchivedBlock => archive.contains(&like.subject.cid),
            SubjectCheck::UriOnly => true,
        })
        .collect()
}

/// Resolves every self-liked post through `service`, keeping only those the account wrote.
///
/// Posts come back in archive order. A batch that fails to resolve is logged and skipped.
pub async fn find_self_liked_posts(
    archive: &Archive,
    did: &Did,
    service: &dyn PostService,
    check: SubjectCheck,
) -> Vec<PostView> {
    let likes = self_like_records(archive, did, check);
    debug!("Found {} self-like records", likes.len());

    let mut posts = Vec::new();

    for batch in likes.chunks(GET_POSTS_BATCH_SIZE) {
        let uris: Vec<String> = batch.iter().map(|like| like.subject.uri.clone()).collect();

        match service.get_posts(&uris).await {
            Ok(fetched) => posts.extend(
                fetched
                    .into_iter()
                    .filter(|post| post.author.did == *did),
            ),
            Err(e) => match e.downcast_ref::<XrpcError>() {
                Some(XrpcError::Status { .. }) => {
                    error!("An HTTP error occurred while fetching self-liked posts: {e}")
                }
                _ => error!("An error occurred while fetching self-liked posts: {e:#}"),
            },
        }
    }

    posts
}
