//! HTTP client for the managed backend
//!
//! Talks to the three services of a Supabase-style project:
//! - `/auth/v1` for accounts and sessions
//! - `/rest/v1` for table reads and inserts
//! - `/storage/v1` for object uploads
//!
//! Every request carries the public API key; requests made on behalf of a
//! user carry that user's access token as the bearer credential. No retries
//! or client-side timeouts are applied.

use super::models::{AuthSession, AuthUser, SignUpOutcome};
use super::query::Query;
use super::Backend;
use crate::config::BackendConfig;
use crate::error::{AppError, Result};
use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Url};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};

/// Backend client over HTTP
#[derive(Clone)]
pub struct SupabaseClient {
    http: reqwest::Client,
    base_url: String,
    anon_key: String,
}

impl SupabaseClient {
    pub fn new(config: &BackendConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("heritage/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            base_url: config.url.trim_end_matches('/').to_string(),
            anon_key: config.anon_key.clone(),
        })
    }

    /// Build a URL from path segments, percent-encoding each one
    fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| AppError::Config(format!("Invalid backend URL: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| AppError::Config("Backend URL cannot be a base".to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, url: Url, access_token: Option<&str>) -> RequestBuilder {
        let bearer = access_token.unwrap_or(&self.anon_key);
        self.http
            .request(method, url)
            .header("apikey", &self.anon_key)
            .bearer_auth(bearer)
    }
}

/// Send a request and decode a JSON body, wrapping every failure with `wrap`
async fn send_json<T, F>(request: RequestBuilder, wrap: F) -> Result<T>
where
    T: DeserializeOwned,
    F: Fn(String) -> AppError,
{
    let response = request
        .send()
        .await
        .map_err(|e| wrap(format!("Backend unreachable: {}", e)))?;

    let status = response.status();
    if !status.is_success() {
        let body: Value = response.json().await.unwrap_or(Value::Null);
        let message = error_message(&body).unwrap_or_else(|| format!("status {}", status));
        tracing::debug!("Backend returned {}: {}", status, message);
        return Err(wrap(message));
    }

    response
        .json::<T>()
        .await
        .map_err(|e| wrap(format!("Unexpected response body: {}", e)))
}

/// Decode a sign-up answer. With auto-confirm the service answers with a
/// session; otherwise with the bare user awaiting confirmation.
fn parse_sign_up(response: Value) -> Result<SignUpOutcome> {
    if response.get("access_token").is_some() {
        let session: AuthSession = serde_json::from_value(response)?;
        Ok(SignUpOutcome {
            user: session.user.clone(),
            session: Some(session),
        })
    } else {
        let user: AuthUser = serde_json::from_value(response)?;
        Ok(SignUpOutcome { user, session: None })
    }
}

/// The inserted row echoed back by `Prefer: return=representation`
fn first_row(table: &str, rows: Vec<Value>) -> Result<Value> {
    rows.into_iter()
        .next()
        .ok_or_else(|| AppError::Write(format!("Insert into {} returned no row", table)))
}

/// Object path inside `bucket` from an upload answer. `Key` is
/// "<bucket>/<path>"; without it the requested name is used.
fn object_path(bucket: &str, response: &Value, name: &str) -> String {
    response
        .get("Key")
        .and_then(|k| k.as_str())
        .and_then(|key| key.strip_prefix(&format!("{}/", bucket)).map(str::to_string))
        .unwrap_or_else(|| name.to_string())
}

/// Pull the human-readable message out of an auth, table or storage error body
fn error_message(body: &Value) -> Option<String> {
    ["msg", "error_description", "message", "error"]
        .iter()
        .find_map(|key| body.get(*key).and_then(|v| v.as_str()))
        .map(str::to_string)
}

#[async_trait]
impl Backend for SupabaseClient {
    async fn sign_up(&self, email: &str, password: &str, full_name: &str) -> Result<SignUpOutcome> {
        tracing::debug!("Creating account for {}", email);

        let url = self.url(&["auth", "v1", "signup"])?;
        let body = json!({
            "email": email,
            "password": password,
            "data": { "full_name": full_name },
        });

        let response: Value =
            send_json(self.request(Method::POST, url, None).json(&body), AppError::Auth).await?;
        parse_sign_up(response)
    }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<AuthSession> {
        let mut url = self.url(&["auth", "v1", "token"])?;
        url.query_pairs_mut().append_pair("grant_type", "password");

        let body = json!({ "email": email, "password": password });
        send_json(self.request(Method::POST, url, None).json(&body), AppError::Auth).await
    }

    async fn refresh_session(&self, refresh_token: &str) -> Result<AuthSession> {
        let mut url = self.url(&["auth", "v1", "token"])?;
        url.query_pairs_mut().append_pair("grant_type", "refresh_token");

        let body = json!({ "refresh_token": refresh_token });
        send_json(self.request(Method::POST, url, None).json(&body), AppError::Auth).await
    }

    async fn get_user(&self, access_token: &str) -> Result<AuthUser> {
        let url = self.url(&["auth", "v1", "user"])?;
        send_json(self.request(Method::GET, url, Some(access_token)), AppError::Auth).await
    }

    async fn sign_out(&self, access_token: &str) -> Result<()> {
        let url = self.url(&["auth", "v1", "logout"])?;
        let response = self
            .request(Method::POST, url, Some(access_token))
            .send()
            .await
            .map_err(|e| AppError::Auth(format!("Backend unreachable: {}", e)))?;

        if !response.status().is_success() {
            return Err(AppError::Auth(format!(
                "Sign-out rejected with status {}",
                response.status()
            )));
        }
        Ok(())
    }

    async fn select(&self, table: &str, query: &Query, access_token: &str) -> Result<Vec<Value>> {
        tracing::debug!("Selecting from {}: {:?}", table, query);

        let url = self.url(&["rest", "v1", table])?;
        let request = self
            .request(Method::GET, url, Some(access_token))
            .query(&query.to_params());

        send_json(request, AppError::Query).await
    }

    async fn insert(&self, table: &str, row: Value, access_token: &str) -> Result<Value> {
        tracing::debug!("Inserting into {}", table);

        let url = self.url(&["rest", "v1", table])?;
        let request = self
            .request(Method::POST, url, Some(access_token))
            .header("Prefer", "return=representation")
            .json(&row);

        let rows: Vec<Value> = send_json(request, AppError::Write).await?;
        first_row(table, rows)
    }

    async fn upload(
        &self,
        bucket: &str,
        name: &str,
        data: Vec<u8>,
        content_type: &str,
        access_token: &str,
    ) -> Result<String> {
        tracing::debug!("Uploading {} ({} bytes) to {}", name, data.len(), bucket);

        let url = self.url(&["storage", "v1", "object", bucket, name])?;
        let request = self
            .request(Method::POST, url, Some(access_token))
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .header("x-upsert", "false")
            .body(data);

        let response: Value = send_json(request, AppError::Upload).await?;
        Ok(object_path(bucket, &response, name))
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        let mut segments = vec!["storage", "v1", "object", "public", bucket];
        segments.extend(path.split('/').filter(|s| !s.is_empty()));

        match self.url(&segments) {
            Ok(url) => url.to_string(),
            Err(_) => format!("{}/storage/v1/object/public/{}/{}", self.base_url, bucket, path),
        }
    }
}
