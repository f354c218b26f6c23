mod archive;
mod client;
mod entities;

pub use archive::{classify, Archive, ArchiveRecord, DecodeError};
pub use client::{
    Bluesky, PostService, XrpcError, DEFAULT_SERVICE, GET_POSTS_BATCH_SIZE, REQUEST_TIMEOUT,
};
pub use entities::{Author, BlobPage, LikeRecord, PostRecord, PostView, RecordUri, Subject, ViewerState};

#[cfg(test)]
pub(crate) use archive::testing;
