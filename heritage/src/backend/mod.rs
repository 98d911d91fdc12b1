//! Managed backend access
//!
//! This module provides everything that talks to the hosted backend:
//! - The `Backend` capability trait (authenticate, query, upload)
//! - Model definitions for rows and auth payloads
//! - The HTTP client and an in-process implementation
//! - A typed repository over the tables

pub mod http;
pub mod in_memory;
pub mod models;
pub mod query;
pub mod repository;

pub use http::SupabaseClient;
pub use in_memory::InMemoryBackend;
pub use models::*;
pub use query::Query;
pub use repository::Repository;

use crate::error::Result;
use async_trait::async_trait;
use serde_json::Value;

/// Capability set the application needs from the managed backend.
///
/// Every method is one network round trip. Calls that act on behalf of the
/// signed-in user take the session's access token.
#[async_trait]
pub trait Backend: Send + Sync {
    // ===== Authentication =====

    /// Create an account. `full_name` is stored in the account metadata.
    async fn sign_up(&self, email: &str, password: &str, full_name: &str) -> Result<SignUpOutcome>;

    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<AuthSession>;

    /// Exchange a refresh token for a new session
    async fn refresh_session(&self, refresh_token: &str) -> Result<AuthSession>;

    async fn get_user(&self, access_token: &str) -> Result<AuthUser>;

    async fn sign_out(&self, access_token: &str) -> Result<()>;

    // ===== Tables =====

    /// Read rows of `table` matching `query`
    async fn select(&self, table: &str, query: &Query, access_token: &str) -> Result<Vec<Value>>;

    /// Insert one row and return it as stored (with generated columns)
    async fn insert(&self, table: &str, row: Value, access_token: &str) -> Result<Value>;

    // ===== Storage =====

    /// Upload an object and return its path within the bucket
    async fn upload(
        &self,
        bucket: &str,
        name: &str,
        data: Vec<u8>,
        content_type: &str,
        access_token: &str,
    ) -> Result<String>;

    /// Public URL of an object in a public bucket
    fn public_url(&self, bucket: &str, path: &str) -> String;
}
