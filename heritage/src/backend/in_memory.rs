//! In-process backend
//!
//! A complete `Backend` that keeps accounts, table rows and stored objects
//! in memory. It records every call it receives and can be told to fail
//! specific operations, which makes it the substitute for the hosted
//! backend in tests. Row ownership rules mirror the hosted policies: users
//! only see and write rows belonging to their own trees.

use super::models::{AuthSession, AuthUser, SignUpOutcome};
use super::query::{Filter, Query};
use super::Backend;
use crate::config::{
    FAMILY_MEMBERS_TABLE, FAMILY_TREES_TABLE, MEMORIES_TABLE, MIN_PASSWORD_LENGTH, PROFILES_TABLE,
};
use crate::error::{AppError, Result};
use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Map, Value};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

/// Base URL used for public object URLs
const PUBLIC_BASE_URL: &str = "https://backend.test/storage/v1/object/public";

/// One call received by the backend, in arrival order
#[derive(Debug, Clone, PartialEq)]
pub enum BackendCall {
    SignUp { email: String },
    SignIn { email: String },
    RefreshSession,
    GetUser,
    SignOut,
    Select { table: String, query: Query },
    Insert { table: String, row: Value },
    Upload { bucket: String, name: String, size: usize, content_type: String },
}

/// Operation the backend can be told to fail
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FailPoint {
    SignUp,
    SignIn,
    RefreshSession,
    SignOut,
    Select(String),
    Insert(String),
    Upload(String),
}

/// Object held in a bucket
#[derive(Debug, Clone, PartialEq)]
pub struct StoredObject {
    pub data: Vec<u8>,
    pub content_type: String,
}

#[derive(Debug, Clone)]
struct Account {
    user: AuthUser,
    password: String,
}

#[derive(Default)]
struct State {
    accounts: HashMap<String, Account>,
    access_tokens: HashMap<String, String>,
    refresh_tokens: HashMap<String, String>,
    tables: HashMap<String, Vec<Value>>,
    objects: HashMap<(String, String), StoredObject>,
    calls: Vec<BackendCall>,
    failures: HashSet<FailPoint>,
    require_confirmation: bool,
}

impl State {
    fn fail_if_armed(&self, point: FailPoint, wrap: fn(String) -> AppError) -> Result<()> {
        if self.failures.contains(&point) {
            return Err(wrap(format!("Injected failure: {:?}", point)));
        }
        Ok(())
    }

    fn user_for_token(&self, access_token: &str) -> Option<&AuthUser> {
        let user_id = self.access_tokens.get(access_token)?;
        self.accounts
            .values()
            .map(|account| &account.user)
            .find(|user| &user.id == user_id)
    }

    fn issue_session(&mut self, user: AuthUser) -> AuthSession {
        let access_token = Uuid::new_v4().to_string();
        let refresh_token = Uuid::new_v4().to_string();
        self.access_tokens.insert(access_token.clone(), user.id.clone());
        self.refresh_tokens.insert(refresh_token.clone(), user.id.clone());

        AuthSession {
            access_token,
            refresh_token,
            user,
        }
    }

    fn owns_tree(&self, user_id: &str, tree_id: &str) -> bool {
        self.tables
            .get(FAMILY_TREES_TABLE)
            .map(|rows| {
                rows.iter().any(|row| {
                    row.get("id").and_then(Value::as_str) == Some(tree_id)
                        && row.get("created_by").and_then(Value::as_str) == Some(user_id)
                })
            })
            .unwrap_or(false)
    }

    /// Row-level policy: may `user_id` see or write `row` of `table`?
    fn row_visible(&self, table: &str, row: &Value, user_id: &str) -> bool {
        match table {
            PROFILES_TABLE => str_field(row, "id") == user_id,
            FAMILY_TREES_TABLE => str_field(row, "created_by") == user_id,
            FAMILY_MEMBERS_TABLE | MEMORIES_TABLE => {
                self.owns_tree(user_id, str_field(row, "family_tree_id"))
            }
            _ => true,
        }
    }
}

/// In-memory implementation of the backend capability set
#[derive(Clone, Default)]
pub struct InMemoryBackend {
    state: Arc<Mutex<State>>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Make sign-up return no session, as when e-mail confirmation is on
    pub fn require_email_confirmation(&self, required: bool) {
        self.state().require_confirmation = required;
    }

    /// Make every subsequent call hitting `point` fail
    pub fn fail_on(&self, point: FailPoint) {
        self.state().failures.insert(point);
    }

    pub fn clear_failures(&self) {
        self.state().failures.clear();
    }

    /// Create an account directly, returning its user id
    pub fn register(&self, email: &str, password: &str, full_name: &str) -> String {
        let user = AuthUser {
            id: Uuid::new_v4().to_string(),
            email: Some(email.to_string()),
            user_metadata: json!({ "full_name": full_name }),
        };
        let id = user.id.clone();
        self.state().accounts.insert(
            email.to_lowercase(),
            Account {
                user,
                password: password.to_string(),
            },
        );
        id
    }

    /// Put a row straight into a table, bypassing policies
    pub fn seed_row(&self, table: &str, row: Value) {
        self.state()
            .tables
            .entry(table.to_string())
            .or_default()
            .push(row);
    }

    pub fn calls(&self) -> Vec<BackendCall> {
        self.state().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }

    /// Insert calls made against `table`
    pub fn inserts_into(&self, table: &str) -> Vec<Value> {
        self.state()
            .calls
            .iter()
            .filter_map(|call| match call {
                BackendCall::Insert { table: t, row } if t == table => Some(row.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn rows(&self, table: &str) -> Vec<Value> {
        self.state().tables.get(table).cloned().unwrap_or_default()
    }

    pub fn object(&self, bucket: &str, path: &str) -> Option<StoredObject> {
        self.state()
            .objects
            .get(&(bucket.to_string(), path.to_string()))
            .cloned()
    }

    pub fn object_count(&self, bucket: &str) -> usize {
        self.state()
            .objects
            .keys()
            .filter(|(b, _)| b == bucket)
            .count()
    }

    /// Whether `access_token` is still accepted
    pub fn token_is_live(&self, access_token: &str) -> bool {
        self.state().access_tokens.contains_key(access_token)
    }
}

#[async_trait]
impl Backend for InMemoryBackend {
    async fn sign_up(&self, email: &str, password: &str, full_name: &str) -> Result<SignUpOutcome> {
        let mut state = self.state();
        state.calls.push(BackendCall::SignUp {
            email: email.to_string(),
        });
        state.fail_if_armed(FailPoint::SignUp, AppError::Auth)?;

        let key = email.trim().to_lowercase();
        if key.is_empty() {
            return Err(AppError::Auth("Email is required".to_string()));
        }
        if password.chars().count() < MIN_PASSWORD_LENGTH {
            return Err(AppError::Auth(format!(
                "Password should be at least {} characters",
                MIN_PASSWORD_LENGTH
            )));
        }
        if state.accounts.contains_key(&key) {
            return Err(AppError::Auth("User already registered".to_string()));
        }

        let user = AuthUser {
            id: Uuid::new_v4().to_string(),
            email: Some(email.trim().to_string()),
            user_metadata: json!({ "full_name": full_name }),
        };
        state.accounts.insert(
            key,
            Account {
                user: user.clone(),
                password: password.to_string(),
            },
        );

        let session = if state.require_confirmation {
            None
        } else {
            Some(state.issue_session(user.clone()))
        };

        Ok(SignUpOutcome { user, session })
    }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<AuthSession> {
        let mut state = self.state();
        state.calls.push(BackendCall::SignIn {
            email: email.to_string(),
        });
        state.fail_if_armed(FailPoint::SignIn, AppError::Auth)?;

        let user = state
            .accounts
            .get(&email.trim().to_lowercase())
            .filter(|account| account.password == password)
            .map(|account| account.user.clone())
            .ok_or_else(|| AppError::Auth("Invalid login credentials".to_string()))?;

        Ok(state.issue_session(user))
    }

    async fn refresh_session(&self, refresh_token: &str) -> Result<AuthSession> {
        let mut state = self.state();
        state.calls.push(BackendCall::RefreshSession);
        state.fail_if_armed(FailPoint::RefreshSession, AppError::Auth)?;

        let user_id = state
            .refresh_tokens
            .remove(refresh_token)
            .ok_or_else(|| AppError::Auth("Invalid Refresh Token".to_string()))?;
        let user = state
            .accounts
            .values()
            .find(|account| account.user.id == user_id)
            .map(|account| account.user.clone())
            .ok_or_else(|| AppError::Auth("User not found".to_string()))?;

        Ok(state.issue_session(user))
    }

    async fn get_user(&self, access_token: &str) -> Result<AuthUser> {
        let mut state = self.state();
        state.calls.push(BackendCall::GetUser);

        state
            .user_for_token(access_token)
            .cloned()
            .ok_or_else(|| AppError::Auth("Invalid JWT".to_string()))
    }

    async fn sign_out(&self, access_token: &str) -> Result<()> {
        let mut state = self.state();
        state.calls.push(BackendCall::SignOut);
        state.fail_if_armed(FailPoint::SignOut, AppError::Auth)?;

        if let Some(user_id) = state.access_tokens.remove(access_token) {
            state.refresh_tokens.retain(|_, owner| *owner != user_id);
        }
        Ok(())
    }

    async fn select(&self, table: &str, query: &Query, access_token: &str) -> Result<Vec<Value>> {
        let mut state = self.state();
        state.calls.push(BackendCall::Select {
            table: table.to_string(),
            query: query.clone(),
        });
        state.fail_if_armed(FailPoint::Select(table.to_string()), AppError::Query)?;

        let user_id = state
            .user_for_token(access_token)
            .map(|user| user.id.clone())
            .ok_or_else(|| AppError::Query("Invalid JWT".to_string()))?;

        let mut rows: Vec<Value> = state
            .tables
            .get(table)
            .map(|rows| rows.as_slice())
            .unwrap_or_default()
            .iter()
            .filter(|row| state.row_visible(table, row, &user_id))
            .filter(|row| query.filters.iter().all(|filter| matches_filter(row, filter)))
            .cloned()
            .collect();

        if let Some(order) = &query.order {
            rows.sort_by(|a, b| {
                let ordering = compare_values(a.get(&order.column), b.get(&order.column));
                if order.ascending {
                    ordering
                } else {
                    ordering.reverse()
                }
            });
        }

        if let Some(limit) = query.limit {
            rows.truncate(limit);
        }

        if let Some(columns) = query.projected_columns() {
            rows = rows.into_iter().map(|row| project(&row, &columns)).collect();
        }

        Ok(rows)
    }

    async fn insert(&self, table: &str, row: Value, access_token: &str) -> Result<Value> {
        let mut state = self.state();
        state.calls.push(BackendCall::Insert {
            table: table.to_string(),
            row: row.clone(),
        });
        state.fail_if_armed(FailPoint::Insert(table.to_string()), AppError::Write)?;

        let user_id = state
            .user_for_token(access_token)
            .map(|user| user.id.clone())
            .ok_or_else(|| AppError::Write("Invalid JWT".to_string()))?;

        let Value::Object(mut fields) = row else {
            return Err(AppError::Write("Row must be a JSON object".to_string()));
        };

        let created_by = fields.get("created_by").and_then(Value::as_str);
        if created_by.is_some_and(|owner| owner != user_id) {
            return Err(AppError::Write(
                "new row violates row-level security policy".to_string(),
            ));
        }

        fields
            .entry("id")
            .or_insert_with(|| Value::String(Uuid::new_v4().to_string()));
        if table != PROFILES_TABLE {
            fields
                .entry("created_at")
                .or_insert_with(|| Value::String(Utc::now().to_rfc3339()));
        }

        let stored = Value::Object(fields);
        if !state.row_visible(table, &stored, &user_id) {
            return Err(AppError::Write(
                "new row violates row-level security policy".to_string(),
            ));
        }

        state
            .tables
            .entry(table.to_string())
            .or_default()
            .push(stored.clone());

        Ok(stored)
    }

    async fn upload(
        &self,
        bucket: &str,
        name: &str,
        data: Vec<u8>,
        content_type: &str,
        access_token: &str,
    ) -> Result<String> {
        let mut state = self.state();
        state.calls.push(BackendCall::Upload {
            bucket: bucket.to_string(),
            name: name.to_string(),
            size: data.len(),
            content_type: content_type.to_string(),
        });
        state.fail_if_armed(FailPoint::Upload(bucket.to_string()), AppError::Upload)?;

        if state.user_for_token(access_token).is_none() {
            return Err(AppError::Upload("Invalid JWT".to_string()));
        }

        let key = (bucket.to_string(), name.to_string());
        if state.objects.contains_key(&key) {
            return Err(AppError::Upload("The resource already exists".to_string()));
        }

        state.objects.insert(
            key,
            StoredObject {
                data,
                content_type: content_type.to_string(),
            },
        );

        Ok(name.to_string())
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        format!("{}/{}/{}", PUBLIC_BASE_URL, bucket, path)
    }
}

fn str_field<'a>(row: &'a Value, name: &str) -> &'a str {
    row.get(name).and_then(Value::as_str).unwrap_or_default()
}

fn value_as_text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s.clone()),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

fn matches_filter(row: &Value, filter: &Filter) -> bool {
    match filter {
        Filter::Eq(column, expected) => value_as_text(row.get(column)).as_ref() == Some(expected),
        Filter::In(column, allowed) => value_as_text(row.get(column))
            .map(|value| allowed.contains(&value))
            .unwrap_or(false),
    }
}

/// Nulls sort first; numbers numerically; everything else as text
fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        _ => value_as_text(a).cmp(&value_as_text(b)),
    }
}

fn project(row: &Value, columns: &[&str]) -> Value {
    let mut projected = Map::new();
    for column in columns {
        if let Some(value) = row.get(*column) {
            projected.insert(column.to_string(), value.clone());
        }
    }
    Value::Object(projected)
}
