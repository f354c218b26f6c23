use anyhow::{anyhow, Result};
use atrium_api::types::string::Did;
use serde::{Deserialize, Serialize};

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct LikeRecord {
    pub subject: Subject,
    #[serde(rename = "createdAt", default)]
    pub created_at: Option<String>,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct Subject {
    pub cid: String,
    pub uri: String,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct PostRecord {
    pub text: String,
    #[serde(rename = "createdAt")]
    pub created_at: String,
    pub langs: Option<Vec<String>>,
}

/// `app.bsky.feed.defs#postView`, trimmed to what deletion needs.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PostView {
    pub uri: String,
    pub cid: String,
    pub author: Author,
    pub record: serde_json::Value,
    #[serde(default)]
    pub viewer: Option<ViewerState>,
}

impl PostView {
    pub fn text(&self) -> &str {
        self.record
            .get("text")
            .and_then(|text| text.as_str())
            .unwrap_or_default()
    }

    /// The raw creation timestamp, whichever of the two spellings the record uses.
    pub fn created_at(&self) -> Option<&serde_json::Value> {
        self.record
            .get("createdAt")
            .or_else(|| self.record.get("created_at"))
    }

    pub fn repost_uri(&self) -> Option<&str> {
        self.viewer.as_ref().and_then(|viewer| viewer.repost.as_deref())
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct Author {
    pub did: Did,
    #[serde(default)]
    pub handle: String,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct ViewerState {
    #[serde(default)]
    pub repost: Option<String>,
}

#[derive(Deserialize, Debug)]
pub(super) struct GetPostsOutput {
    pub posts: Vec<PostView>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub(super) struct SessionOutput {
    pub access_jwt: String,
    pub did: Did,
    pub handle: String,
    #[serde(default)]
    pub did_doc: Option<DidDocument>,
}

#[derive(Deserialize, Debug)]
pub(super) struct DidDocument {
    #[serde(default)]
    pub service: Vec<DidService>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub(super) struct DidService {
    pub id: String,
    pub service_endpoint: String,
}

impl DidDocument {
    pub fn pds_endpoint(&self) -> Option<&str> {
        self.service
            .iter()
            .find(|service| service.id.ends_with("#atproto_pds"))
            .map(|service| service.service_endpoint.trim_end_matches('/'))
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct BlobPage {
    #[serde(default)]
    pub cursor: Option<String>,
    pub cids: Vec<String>,
}

#[derive(Serialize, Debug)]
pub(super) struct DeleteRecordInput<'a> {
    pub repo: &'a str,
    pub collection: &'a str,
    pub rkey: &'a str,
}

/// The three path segments of an `at://` record URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordUri {
    pub repo: String,
    pub collection: String,
    pub rkey: String,
}

impl RecordUri {
    pub fn parse(uri: &str) -> Result<Self> {
        let path = uri
            .strip_prefix("at://")
            .ok_or_else(|| anyhow!("not an at:// uri: {uri}"))?;

        let mut segments = path.split('/');
        match (segments.next(), segments.next(), segments.next(), segments.next()) {
            (Some(repo), Some(collection), Some(rkey), None)
                if !repo.is_empty() && !collection.is_empty() && !rkey.is_empty() =>
            {
                Ok(Self {
                    repo: repo.to_string(),
                    collection: collection.to_string(),
                    rkey: rkey.to_string(),
                })
            }
            _ => Err(anyhow!("not a record uri: {uri}")),
        }
    }
}
