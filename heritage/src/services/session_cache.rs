//! Session cache
//!
//! Lets the next start restore the session without asking for credentials.
//! The refresh token lives in the OS credential store; only the non-secret
//! identity (user id and e-mail) is written to a small JSON file in the
//! data directory.

use crate::config::{CREDENTIAL_SERVICE, SESSION_CREDENTIAL_KEY};
use crate::error::{AppError, Result};
use keyring::Entry;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;

const SESSION_FILE: &str = "session.json";

/// What survives between runs
#[derive(Debug, Clone, PartialEq)]
pub struct CachedSession {
    pub user_id: String,
    pub email: String,
    pub refresh_token: String,
}

/// The part of a cached session written to disk
#[derive(Debug, Serialize, Deserialize)]
struct SessionFile {
    user_id: String,
    email: String,
}

#[derive(Debug, Clone)]
pub struct SessionCache {
    path: PathBuf,
    credential: Arc<Entry>,
}

impl SessionCache {
    /// Cache in `dir`, with the token under the application's entry in the
    /// OS credential store
    pub fn new(dir: &Path) -> Result<Self> {
        let entry = Entry::new(CREDENTIAL_SERVICE, SESSION_CREDENTIAL_KEY).map_err(|e| {
            AppError::Credential(format!("Failed to create keyring entry: {}", e))
        })?;

        Ok(Self {
            path: dir.join(SESSION_FILE),
            credential: Arc::new(entry),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the cached session. A missing or corrupt file, or a missing
    /// token, yields `None`.
    pub async fn load(&self) -> Result<Option<CachedSession>> {
        if !fs::try_exists(&self.path).await? {
            return Ok(None);
        }

        let json = fs::read_to_string(&self.path).await?;
        let file: SessionFile = match serde_json::from_str(&json) {
            Ok(file) => file,
            Err(e) => {
                tracing::warn!("Ignoring corrupt session cache {:?}: {}", self.path, e);
                return Ok(None);
            }
        };

        let refresh_token = match self.credential.get_password() {
            Ok(token) => token,
            Err(keyring::Error::NoEntry) => {
                tracing::warn!("Session cache for {} has no stored token", file.email);
                return Ok(None);
            }
            Err(e) => {
                return Err(AppError::Credential(format!(
                    "Failed to retrieve session token: {}",
                    e
                )))
            }
        };

        Ok(Some(CachedSession {
            user_id: file.user_id,
            email: file.email,
            refresh_token,
        }))
    }

    pub async fn save(&self, cached: &CachedSession) -> Result<()> {
        self.credential
            .set_password(&cached.refresh_token)
            .map_err(|e| AppError::Credential(format!("Failed to store session token: {}", e)))?;

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let json = serde_json::to_string_pretty(&SessionFile {
            user_id: cached.user_id.clone(),
            email: cached.email.clone(),
        })?;
        let temp_path = self.path.with_extension("tmp");
        fs::write(&temp_path, json).await?;
        fs::rename(&temp_path, &self.path).await?;

        tracing::debug!("Session cached for {}", cached.email);
        Ok(())
    }

    /// Forget the cached session, token included
    pub async fn clear(&self) -> Result<()> {
        match self.credential.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => {}
            Err(e) => {
                return Err(AppError::Credential(format!(
                    "Failed to delete session token: {}",
                    e
                )))
            }
        }

        if fs::try_exists(&self.path).await? {
            fs::remove_file(&self.path).await?;
        }
        Ok(())
    }
}
