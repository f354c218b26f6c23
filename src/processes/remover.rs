use atrium_api::types::string::Did;
use log::{error, info};

use crate::services::bluesky::{PostService, PostView, XrpcError};

/// Takes a post off the account: undoes the repost when someone else wrote it,
/// deletes it otherwise.
///
/// Failures are logged and reported through the return value, never raised.
pub async fn remove(service: &dyn PostService, did: &Did, post: &PostView) -> bool {
    if post.author.did != *did {
        let Some(repost_uri) = post.repost_uri() else {
            error!("No repost of {} to undo", post.uri);
            return false;
        };

        info!("Removing repost: {repost_uri}");

        match service.unrepost(repost_uri).await {
            Ok(()) => true,
            Err(e) => {
                log_failure("unreposting", &e);
                false
            }
        }
    } else {
        info!("Removing post: {}", post.uri);

        match service.delete_post(&post.uri).await {
            Ok(()) => true,
            Err(e) => {
                log_failure("deletion", &e);
                false
            }
        }
    }
}

fn log_failure(action: &str, e: &anyhow::Error) {
    match e.downcast_ref::<XrpcError>() {
        Some(XrpcError::Status { .. }) => error!("HTTP error occurred during {action}: {e}"),
        _ => error!("An error occurred during {action}: {e:#}"),
    }
}
