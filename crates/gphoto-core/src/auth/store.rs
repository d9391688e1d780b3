//! Credential persistence.
//!
//! Stores the bearer credential in a single JSON file with restricted
//! permissions (0600). An unreadable file is treated exactly like a missing
//! one so the caller re-runs the authorization flow.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::config::{paths, write_private};
use crate::error::{Error, Result};

/// Tokens are considered expired this long before their actual expiry.
const EXPIRY_LEEWAY_SECS: i64 = 30;

/// Bearer credential returned by the token endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry: Option<DateTime<Utc>>,
}

impl Credential {
    /// Returns true if the access token is expired (or about to) at `now`.
    ///
    /// Credentials without an expiry never expire.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expiry
            .is_some_and(|expiry| expiry <= now + TimeDelta::seconds(EXPIRY_LEEWAY_SECS))
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }
}

/// Reads and writes the credential file.
#[derive(Debug, Clone)]
pub struct TokenStore {
    path: PathBuf,
}

impl Default for TokenStore {
    fn default() -> Self {
        Self::new(paths::token_path())
    }
}

impl TokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the stored credential.
    ///
    /// # Errors
    /// Returns [`Error::TokenNotFound`] if the file is absent, unparsable, or
    /// holds an empty access token; other I/O failures are returned as-is.
    pub fn load(&self) -> Result<Credential> {
        let contents = match fs::read(&self.path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(Error::TokenNotFound);
            }
            Err(err) => return Err(err.into()),
        };

        match serde_json::from_slice::<Credential>(&contents) {
            Ok(credential) if !credential.access_token.is_empty() => Ok(credential),
            Ok(_) => {
                tracing::warn!(
                    path = %self.path.display(),
                    "stored credential has no access token"
                );
                Err(Error::TokenNotFound)
            }
            Err(err) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %err,
                    "ignoring unreadable credential file"
                );
                Err(Error::TokenNotFound)
            }
        }
    }

    /// Saves the credential, replacing any previous one.
    ///
    /// # Errors
    /// Returns an error if serialization or the write fails.
    pub fn save(&self, credential: &Credential) -> Result<()> {
        let contents = serde_json::to_string_pretty(credential)?;
        write_private(&self.path, contents.as_bytes())?;
        tracing::debug!(path = %self.path.display(), "saved credential");
        Ok(())
    }

    /// Deletes the stored credential. Returns whether a file was removed.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be removed.
    pub fn clear(&self) -> Result<bool> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err.into()),
        }
    }
}
