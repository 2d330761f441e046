use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, SecondsFormat, Utc};
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::crypto::constant_time_eq;
use crate::error::ShopError;

pub const VERSION_FILE: &str = "options_version.json";
const DEFAULT_VERSION: i64 = 1;

/// Contents of the version file, also returned as-is by the API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionInfo {
    pub version: i64,
    pub updated_at: String,
}

#[derive(Debug, Deserialize)]
struct StoredVersion {
    version: Option<serde_json::Value>,
    updated_at: Option<String>,
}

fn utc_stamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, false)
}

/// Version counter clients use to invalidate their cached catalog
#[derive(Debug)]
pub struct OptionsVersion {
    path: PathBuf,
    bump_lock: Mutex<()>,
}

impl OptionsVersion {
    pub fn new(cache_dir: impl AsRef<Path>) -> Self {
        Self { path: cache_dir.as_ref().join(VERSION_FILE), bump_lock: Mutex::new(()) }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stored version and timestamp; unreadable or non-positive versions count as 1
    fn read(&self) -> (i64, Option<String>) {
        let Ok(raw) = fs::read_to_string(&self.path) else {
            return (DEFAULT_VERSION, None);
        };
        match serde_json::from_str::<StoredVersion>(&raw) {
            Ok(stored) => {
                let version = stored
                    .version
                    .and_then(|v| v.as_i64().or_else(|| v.as_str().and_then(|s| s.trim().parse().ok())))
                    .filter(|v| *v > 0)
                    .unwrap_or(DEFAULT_VERSION);
                (version, stored.updated_at.filter(|s| !s.is_empty()))
            }
            Err(e) => {
                warn!("Ignoring malformed {}: {}", self.path.display(), e);
                (DEFAULT_VERSION, None)
            }
        }
    }

    fn write(&self, info: &VersionInfo) -> std::io::Result<()> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir)?;
        }
        let body = serde_json::to_string_pretty(info).map_err(std::io::Error::other)?;
        fs::write(&self.path, body)
    }

    /// Current version. A missing file is created on the way.
    pub fn current(&self, now: DateTime<Utc>) -> VersionInfo {
        let (version, updated_at) = self.read();
        let info = VersionInfo { version, updated_at: updated_at.unwrap_or_else(|| utc_stamp(now)) };

        if !self.path.exists() {
            if let Err(e) = self.write(&info) {
                warn!("Could not create {}: {}", self.path.display(), e);
            }
        }
        info
    }

    /// Increments the version after checking the caller's token
    pub fn bump(&self, expected_token: Option<&str>, provided: &str, now: DateTime<Utc>) -> Result<VersionInfo, ShopError> {
        let expected = expected_token.filter(|t| !t.is_empty()).ok_or(ShopError::TokenNotConfigured)?;
        if !constant_time_eq(expected.as_bytes(), provided.as_bytes()) {
            return Err(ShopError::InvalidToken);
        }

        let _guard = self.bump_lock.lock().map_err(|_| {
            ShopError::WriteFailed(std::io::Error::other("version lock poisoned"))
        })?;

        let (version, _) = self.read();
        let info = VersionInfo { version: version + 1, updated_at: utc_stamp(now) };
        self.write(&info).map_err(ShopError::WriteFailed)?;
        info!("Options cache version bumped to {}", info.version);
        Ok(info)
    }
}
