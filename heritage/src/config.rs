//! Application configuration
//!
//! Central location for configuration constants, validation boundaries,
//! and the backend endpoint/key loaded from the environment.

use crate::error::{AppError, Result};
use std::path::PathBuf;

// ===== Account Limits =====

/// Minimum password length accepted before contacting the auth service
pub const MIN_PASSWORD_LENGTH: usize = 6;

// ===== Dashboard =====

/// Number of recent memories shown on the dashboard
pub const RECENT_MEMORIES_LIMIT: usize = 5;

// ===== Storage =====

/// Longest object name accepted by the storage buckets
pub const MAX_OBJECT_NAME_LENGTH: usize = 255;

/// Content type recorded audio is uploaded with
pub const RECORDED_AUDIO_MIME: &str = "audio/wav";

/// Bucket holding recorded audio memories
pub const AUDIO_BUCKET: &str = "audio-memories";

/// Bucket holding memory photos
pub const PHOTO_BUCKET: &str = "photo-memories";

// ===== Tables =====

pub const PROFILES_TABLE: &str = "profiles";
pub const FAMILY_TREES_TABLE: &str = "family_trees";
pub const FAMILY_MEMBERS_TABLE: &str = "family_members";
pub const MEMORIES_TABLE: &str = "memories";

// ===== Environment =====

/// Environment variable holding the backend base URL
pub const BACKEND_URL_VAR: &str = "HERITAGE_BACKEND_URL";

/// Environment variable holding the public (anon) API key
pub const BACKEND_ANON_KEY_VAR: &str = "HERITAGE_BACKEND_ANON_KEY";

/// Environment variable overriding the local data directory
pub const DATA_DIR_VAR: &str = "HERITAGE_DATA_DIR";

/// OS credential store service holding the session token
pub const CREDENTIAL_SERVICE: &str = "heritage";

/// Credential store key of the session token
pub const SESSION_CREDENTIAL_KEY: &str = "session";

/// Backend endpoint and public API key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendConfig {
    /// Base URL without trailing slash, e.g. `https://project.supabase.co`
    pub url: String,
    /// Public API key sent with every request
    pub anon_key: String,
}

impl BackendConfig {
    /// Load configuration from the process environment, falling back to
    /// values baked in at build time.
    ///
    /// | Env Var                     | Build-time fallback |
    /// |-----------------------------|---------------------|
    /// | `HERITAGE_BACKEND_URL`      | same name           |
    /// | `HERITAGE_BACKEND_ANON_KEY` | same name           |
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| {
            std::env::var(key).ok().or_else(|| match key {
                BACKEND_URL_VAR => option_env!("HERITAGE_BACKEND_URL").map(str::to_string),
                BACKEND_ANON_KEY_VAR => {
                    option_env!("HERITAGE_BACKEND_ANON_KEY").map(str::to_string)
                }
                _ => None,
            })
        })
    }

    /// Build configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let url = required(&lookup, BACKEND_URL_VAR)?;
        let anon_key = required(&lookup, BACKEND_ANON_KEY_VAR)?;

        let parsed = reqwest::Url::parse(&url)
            .map_err(|e| AppError::Config(format!("{} is not a valid URL: {}", BACKEND_URL_VAR, e)))?;
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(AppError::Config(format!(
                "{} must use http or https, got {}",
                BACKEND_URL_VAR,
                parsed.scheme()
            )));
        }

        Ok(Self {
            url: url.trim_end_matches('/').to_string(),
            anon_key,
        })
    }
}

fn required<F>(lookup: &F, key: &str) -> Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::Config(format!("Missing backend configuration: {}", key)))
}

/// Directory holding local application state (the session cache).
pub fn data_dir() -> Result<PathBuf> {
    if let Some(dir) = std::env::var_os(DATA_DIR_VAR) {
        return Ok(PathBuf::from(dir));
    }

    dirs_next::data_dir()
        .map(|dir| dir.join("heritage"))
        .ok_or_else(|| AppError::Config("Could not determine a data directory".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_loads_both_values() {
        let config = BackendConfig::from_lookup(lookup_from(&[
            (BACKEND_URL_VAR, "https://example.supabase.co/"),
            (BACKEND_ANON_KEY_VAR, "anon-key"),
        ]))
        .unwrap();

        assert_eq!(config.url, "https://example.supabase.co");
        assert_eq!(config.anon_key, "anon-key");
    }

    #[test]
    fn test_missing_key_is_config_error() {
        let err = BackendConfig::from_lookup(lookup_from(&[(
            BACKEND_URL_VAR,
            "https://example.supabase.co",
        )]))
        .unwrap_err();

        assert!(matches!(err, AppError::Config(msg) if msg.contains(BACKEND_ANON_KEY_VAR)));
    }

    #[test]
    fn test_blank_url_is_config_error() {
        let err = BackendConfig::from_lookup(lookup_from(&[
            (BACKEND_URL_VAR, "   "),
            (BACKEND_ANON_KEY_VAR, "anon-key"),
        ]))
        .unwrap_err();

        assert!(matches!(err, AppError::Config(_)));
    }

    #[test]
    fn test_rejects_non_http_url() {
        let err = BackendConfig::from_lookup(lookup_from(&[
            (BACKEND_URL_VAR, "ftp://example.com"),
            (BACKEND_ANON_KEY_VAR, "anon-key"),
        ]))
        .unwrap_err();

        assert!(matches!(err, AppError::Config(_)));
    }
}
