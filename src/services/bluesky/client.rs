use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use atrium_api::app::bsky::feed::{Post, Repost};
use atrium_api::types::string::Did;
use atrium_api::types::Collection;
use log::{debug, info};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::Deserialize;

use super::entities::{
    BlobPage, DeleteRecordInput, GetPostsOutput, PostView, RecordUri, SessionOutput,
};

pub const DEFAULT_SERVICE: &str = "https://bsky.social";
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// The upper bound `app.bsky.feed.getPosts` accepts per call.
pub const GET_POSTS_BATCH_SIZE: usize = 25;

#[derive(Debug, thiserror::Error)]
pub enum XrpcError {
    #[error("HTTP {status} from {method}: {}", describe(.error, .message))]
    Status {
        method: &'static str,
        status: StatusCode,
        error: Option<String>,
        message: Option<String>,
    },
    #[error("request to {method} failed: {source}")]
    Transport {
        method: &'static str,
        #[source]
        source: reqwest::Error,
    },
}

fn describe(error: &Option<String>, message: &Option<String>) -> String {
    match (error, message) {
        (Some(error), Some(message)) => format!("{error}: {message}"),
        (Some(error), None) => error.clone(),
        (None, Some(message)) => message.clone(),
        (None, None) => "no details".to_string(),
    }
}

#[derive(Deserialize, Default)]
struct XrpcErrorBody {
    error: Option<String>,
    message: Option<String>,
}

/// Post lookups and removals, the only remote operations the deletion logic needs.
#[async_trait]
pub trait PostService: Send + Sync {
    async fn get_posts(&self, uris: &[String]) -> Result<Vec<PostView>>;

    async fn delete_post(&self, uri: &str) -> Result<()>;

    async fn unrepost(&self, repost_uri: &str) -> Result<()>;
}

/// An authenticated session against the account's PDS.
pub struct Bluesky {
    http: reqwest::Client,
    service: String,
    access_jwt: String,
    did: Did,
    handle: String,
}

impl Bluesky {
    pub async fn login(service: &str, identifier: &str, password: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("failed to build HTTP client")?;
        let service = service.trim_end_matches('/').to_string();

        let request = http
            .post(format!("{service}/xrpc/com.atproto.server.createSession"))
            .json(&serde_json::json!({
                "identifier": identifier,
                "password": password,
            }));
        let session: SessionOutput = send("com.atproto.server.createSession", request)
            .await?
            .json()
            .await
            .map_err(|source| XrpcError::Transport {
                method: "com.atproto.server.createSession",
                source,
            })?;

        let endpoint = session
            .did_doc
            .as_ref()
            .and_then(|doc| doc.pds_endpoint())
            .map(str::to_string)
            .unwrap_or(service);

        info!(
            "Logged in as {} ({}) via {endpoint}",
            session.handle,
            session.did.as_str()
        );

        Ok(Self {
            http,
            service: endpoint,
            access_jwt: session.access_jwt,
            did: session.did,
            handle: session.handle,
        })
    }

    pub fn did(&self) -> &Did {
        &self.did
    }

    pub fn handle(&self) -> &str {
        &self.handle
    }

    fn get(&self, method: &str) -> RequestBuilder {
        self.http
            .get(format!("{}/xrpc/{method}", self.service))
            .bearer_auth(&self.access_jwt)
    }

    fn post(&self, method: &str) -> RequestBuilder {
        self.http
            .post(format!("{}/xrpc/{method}", self.service))
            .bearer_auth(&self.access_jwt)
    }

    /// The whole repository as a CAR file.
    pub async fn get_repo(&self) -> Result<Vec<u8>> {
        const METHOD: &str = "com.atproto.sync.getRepo";

        let request = self.get(METHOD).query(&[("did", self.did.as_str())]);
        let bytes = read_bytes(METHOD, send(METHOD, request).await?).await?;

        debug!("Fetched repository of {} bytes", bytes.len());

        Ok(bytes)
    }

    pub async fn list_blobs(&self, cursor: Option<&str>) -> Result<BlobPage> {
        const METHOD: &str = "com.atproto.sync.listBlobs";

        let mut request = self.get(METHOD).query(&[("did", self.did.as_str())]);
        if let Some(cursor) = cursor {
            request = request.query(&[("cursor", cursor)]);
        }

        Ok(send(METHOD, request)
            .await?
            .json()
            .await
            .map_err(|source| XrpcError::Transport {
                method: METHOD,
                source,
            })?)
    }

    pub async fn get_blob(&self, cid: &str) -> Result<Vec<u8>> {
        const METHOD: &str = "com.atproto.sync.getBlob";

        let request = self
            .get(METHOD)
            .query(&[("did", self.did.as_str()), ("cid", cid)]);

        read_bytes(METHOD, send(METHOD, request).await?).await
    }

    async fn delete_record(&self, uri: &RecordUri) -> Result<()> {
        const METHOD: &str = "com.atproto.repo.deleteRecord";

        let request = self.post(METHOD).json(&DeleteRecordInput {
            repo: &uri.repo,
            collection: &uri.collection,
            rkey: &uri.rkey,
        });
        send(METHOD, request).await?;

        Ok(())
    }
}

#[async_trait]
impl PostService for Bluesky {
    async fn get_posts(&self, uris: &[String]) -> Result<Vec<PostView>> {
        const METHOD: &str = "app.bsky.feed.getPosts";

        let query: Vec<_> = uris.iter().map(|uri| ("uris", uri.as_str())).collect();
        let request = self.get(METHOD).query(&query);

        let output: GetPostsOutput = send(METHOD, request)
            .await?
            .json()
            .await
            .map_err(|source| XrpcError::Transport {
                method: METHOD,
                source,
            })?;

        Ok(output.posts)
    }

    async fn delete_post(&self, uri: &str) -> Result<()> {
        let uri = RecordUri::parse(uri)?;
        anyhow::ensure!(
            uri.collection == Post::NSID,
            "{} is not a post record",
            uri.collection
        );

        self.delete_record(&uri).await
    }

    async fn unrepost(&self, repost_uri: &str) -> Result<()> {
        let uri = RecordUri::parse(repost_uri)?;
        anyhow::ensure!(
            uri.collection == Repost::NSID,
            "{} is not a repost record",
            uri.collection
        );

        self.delete_record(&uri).await
    }
}

async fn send(method: &'static str, request: RequestBuilder) -> Result<Response, XrpcError> {
    let response = request
        .send()
        .await
        .map_err(|source| XrpcError::Transport { method, source })?;

    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.json::<XrpcErrorBody>().await.unwrap_or_default();

    Err(XrpcError::Status {
        method,
        status,
        error: body.error,
        message: body.message,
    })
}

async fn read_bytes(method: &'static str, response: Response) -> Result<Vec<u8>> {
    Ok(response
        .bytes()
        .await
        .map_err(|source| XrpcError::Transport { method, source })?
        .to_vec())
}
