use std::collections::{HashMap, HashSet};

use atrium_api::app::bsky::feed::{Like, Post};
use atrium_api::types::Collection;
use ipld_core::cid::Cid;
use ipld_core::ipld::Ipld;
use log::debug;

use super::entities::{LikeRecord, PostRecord};

const TYPE_KEY: &str = "$type";

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("malformed CAR container: {0}")]
    Container(#[from] rs_car::CarDecodeError),
    #[error("block {cid} is not valid DAG-CBOR: {reason}")]
    Block { cid: String, reason: String },
}

/// A record pulled out of the repository, classified by its `$type`.
#[derive(Debug, Clone, PartialEq)]
pub enum ArchiveRecord {
    Like(LikeRecord),
    Post(PostRecord),
    Other,
}

/// Every block of a repository CAR file, decoded and kept in file order.
#[derive(Debug, Default)]
pub struct Archive {
    blocks: Vec<(String, Ipld)>,
    index: HashMap<String, usize>,
}

impl Archive {
    pub async fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        let (blocks, _header) = rs_car::car_read_all(&mut &bytes[..], true).await?;

        let mut archive = Self::default();
        for (cid, block) in blocks {
            let cid = cid.to_string();
            let ipld = serde_ipld_dagcbor::from_slice::<Ipld>(&block).map_err(|e| {
                DecodeError::Block {
                    cid: cid.clone(),
                    reason: e.to_string(),
                }
            })?;

            if archive.index.contains_key(&cid) {
                continue;
            }
            archive.index.insert(cid.clone(), archive.blocks.len());
            archive.blocks.push((cid, ipld));
        }

        debug!("Decoded {} blocks", archive.blocks.len());

        Ok(archive)
    }

    pub fn get(&self, cid: &str) -> Option<&Ipld> {
        self.index.get(cid).map(|&position| &self.blocks[position].1)
    }

    pub fn contains(&self, cid: &str) -> bool {
        self.index.contains_key(cid)
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Ipld)> {
        self.blocks.iter().map(|(cid, block)| (cid.as_str(), block))
    }

    /// Brings the two shapes a feed item takes in a repository to the record itself.
    ///
    /// Typed records come back untouched. MST nodes (no `$type`, a non-empty `e`
    /// list) resolve to the block their first entry's `v` points at, or `None` when
    /// that block isn't part of the archive. Anything else is returned as is.
    pub fn extract_feed_item<'a>(&'a self, block: &'a Ipld) -> Option<&'a Ipld> {
        self.extract_feed_item_with_cid(block).map(|(_, item)| item)
    }

    fn extract_feed_item_with_cid<'a>(
        &'a self,
        block: &'a Ipld,
    ) -> Option<(Option<&'a str>, &'a Ipld)> {
        let Ipld::Map(map) = block else {
            return Some((None, block));
        };

        if map.contains_key(TYPE_KEY) {
            return Some((None, block));
        }

        let first_value = match map.get("e") {
            Some(Ipld::List(entries)) => entries.first().and_then(|entry| match entry {
                Ipld::Map(entry) => entry.get("v"),
                _ => None,
            }),
            _ => None,
        };

        match first_value {
            Some(value) => {
                let cid = link_to_cid_string(value)?;
                let position = *self.index.get(&cid)?;
                let (cid, item) = &self.blocks[position];
                Some((Some(cid.as_str()), item))
            }
            None => Some((None, block)),
        }
    }

    /// Every distinct record reachable from the archive, in archive order.
    pub fn records(&self) -> Vec<ArchiveRecord> {
        let mut seen = HashSet::new();
        let mut records = Vec::new();

        for (cid, block) in self.iter() {
            let Some((resolved_cid, item)) = self.extract_feed_item_with_cid(block) else {
                continue;
            };

            if !seen.insert(resolved_cid.unwrap_or(cid)) {
                continue;
            }

            records.push(classify(item));
        }

        records
    }

    pub fn likes(&self) -> Vec<LikeRecord> {
        self.records()
            .into_iter()
            .filter_map(|record| match record {
                ArchiveRecord::Like(like) => Some(like),
                _ => None,
            })
            .collect()
    }
}

pub fn classify(item: &Ipld) -> ArchiveRecord {
    let record_type = match item {
        Ipld::Map(map) => match map.get(TYPE_KEY) {
            Some(Ipld::String(record_type)) => record_type.as_str(),
            _ => return ArchiveRecord::Other,
        },
        _ => return ArchiveRecord::Other,
    };

    let decoded = if record_type == Like::NSID {
        ipld_core::serde::from_ipld::<LikeRecord>(item.clone()).map(ArchiveRecord::Like)
    } else if record_type == Post::NSID {
        ipld_core::serde::from_ipld::<PostRecord>(item.clone()).map(ArchiveRecord::Post)
    } else {
        return ArchiveRecord::Other;
    };

    decoded.unwrap_or_else(|e| {
        debug!("Skipping malformed {record_type} record: {e}");
        ArchiveRecord::Other
    })
}

fn link_to_cid_string(value: &Ipld) -> Option<String> {
    match value {
        Ipld::Link(cid) => Some(cid.to_string()),
        Ipld::Bytes(bytes) => Cid::try_from(bytes.as_slice()).ok().map(|cid| cid.to_string()),
        Ipld::String(cid) => Some(cid.clone()),
        _ => None,
    }
}
