use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::Deserialize;

use crate::algos::SubjectCheck;
use crate::services::bluesky::DEFAULT_SERVICE;

const ENV_PREFIX: &str = "BLUESKY_";

/// Taken verbatim from the environment; a password like `12345678` stays a string.
const RAW_ENV_KEYS: [&str; 2] = ["username", "password"];

#[derive(Deserialize, Clone)]
pub struct Config {
    pub username: String,
    pub password: String,
    #[serde(default = "default_service")]
    pub service: String,
    #[serde(default = "default_archive_dir")]
    pub archive_dir: PathBuf,
    #[serde(default = "default_min_age_days")]
    pub min_age_days: u32,
    #[serde(default = "default_require_archived_subject")]
    pub require_archived_subject: bool,
    #[serde(default = "default_log_file")]
    pub log_file: PathBuf,
}

impl Config {
    /// Reads `path` if it exists, then lets `BLUESKY_*` variables override it.
    pub fn load(path: &Path) -> Result<Self> {
        Self::from_figment(
            Figment::new()
                .merge(Toml::file(path))
                .merge(Env::prefixed(ENV_PREFIX).ignore(&RAW_ENV_KEYS))
                .merge(Serialized::defaults(raw_env())),
        )
    }

    fn from_figment(figment: Figment) -> Result<Self> {
        figment
            .extract::<Config>()
            .context("failed to load configuration")
    }

    pub fn subject_check(&self) -> SubjectCheck {
        if self.require_archived_subject {
            SubjectCheck::RequireArchivedBlock
        } else {
            SubjectCheck::UriOnly
        }
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("service", &self.service)
            .field("archive_dir", &self.archive_dir)
            .field("min_age_days", &self.min_age_days)
            .field("require_archived_subject", &self.require_archived_subject)
            .field("log_file", &self.log_file)
            .finish()
    }
}

fn raw_env() -> BTreeMap<&'static str, String> {
    RAW_ENV_KEYS
        .iter()
        .filter_map(|key| {
            let name = format!("{ENV_PREFIX}{}", key.to_uppercase());
            std::env::var(name).ok().map(|value| (*key, value))
        })
        .collect()
}

fn default_service() -> String {
    DEFAULT_SERVICE.to_string()
}

fn default_archive_dir() -> PathBuf {
    PathBuf::from("archive")
}

fn default_min_age_days() -> u32 {
    3
}

fn default_require_archived_subject() -> bool {
    true
}

fn default_log_file() -> PathBuf {
    PathBuf::from("skeeter_deleter.log")
}
