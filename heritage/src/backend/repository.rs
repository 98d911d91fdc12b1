//! Repository layer for table operations
//!
//! Typed reads and inserts over the four tables, on top of any `Backend`.
//! Rows are decoded into the model structs here so services never touch
//! raw JSON.

use super::models::*;
use super::query::Query;
use super::Backend;
use crate::config::{
    FAMILY_MEMBERS_TABLE, FAMILY_TREES_TABLE, MEMORIES_TABLE, PROFILES_TABLE,
};
use crate::error::{AppError, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

/// Repository for table operations
#[derive(Clone)]
pub struct Repository {
    backend: Arc<dyn Backend>,
}

impl Repository {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self { backend }
    }

    async fn fetch<T: DeserializeOwned>(
        &self,
        table: &str,
        query: &Query,
        access_token: &str,
    ) -> Result<Vec<T>> {
        let rows = self.backend.select(table, query, access_token).await?;
        rows.into_iter()
            .map(|row| decode(table, row, AppError::Query))
            .collect()
    }

    async fn create<T: DeserializeOwned, R: Serialize>(
        &self,
        table: &str,
        row: &R,
        access_token: &str,
    ) -> Result<T> {
        let payload = serde_json::to_value(row)?;
        let stored = self.backend.insert(table, payload, access_token).await?;
        decode(table, stored, AppError::Write)
    }

    // ===== Profiles =====

    /// Insert the profile row created alongside a new account
    pub async fn create_profile(&self, profile: &Profile, access_token: &str) -> Result<Profile> {
        let profile: Profile = self.create(PROFILES_TABLE, profile, access_token).await?;
        tracing::debug!("Created profile: {}", profile.id);
        Ok(profile)
    }

    // ===== Family Trees =====

    pub async fn create_family_tree(
        &self,
        tree: &NewFamilyTree,
        access_token: &str,
    ) -> Result<FamilyTree> {
        let tree: FamilyTree = self.create(FAMILY_TREES_TABLE, tree, access_token).await?;
        tracing::debug!("Created family tree: {}", tree.id);
        Ok(tree)
    }

    /// Trees owned by `user_id`, newest first
    pub async fn list_trees_newest_first(
        &self,
        user_id: &str,
        access_token: &str,
    ) -> Result<Vec<FamilyTree>> {
        let query = Query::new()
            .eq("created_by", user_id)
            .order("created_at", false);
        self.fetch(FAMILY_TREES_TABLE, &query, access_token).await
    }

    /// Trees owned by `user_id`, alphabetically (for pickers)
    pub async fn list_trees_by_name(
        &self,
        user_id: &str,
        access_token: &str,
    ) -> Result<Vec<FamilyTree>> {
        let query = Query::new().eq("created_by", user_id).order("name", true);
        self.fetch(FAMILY_TREES_TABLE, &query, access_token).await
    }

    // ===== Family Members =====

    pub async fn create_family_member(
        &self,
        member: &NewFamilyMember,
        access_token: &str,
    ) -> Result<FamilyMember> {
        let member: FamilyMember = self
            .create(FAMILY_MEMBERS_TABLE, member, access_token)
            .await?;
        tracing::debug!("Created family member: {}", member.id);
        Ok(member)
    }

    /// Members of one tree, alphabetically
    pub async fn list_members(&self, tree_id: &str, access_token: &str) -> Result<Vec<FamilyMember>> {
        let query = Query::new().eq("family_tree_id", tree_id).order("name", true);
        self.fetch(FAMILY_MEMBERS_TABLE, &query, access_token).await
    }

    // ===== Memories =====

    pub async fn create_memory(&self, memory: &NewMemory, access_token: &str) -> Result<Memory> {
        let memory: Memory = self.create(MEMORIES_TABLE, memory, access_token).await?;
        tracing::debug!("Created memory: {}", memory.id);
        Ok(memory)
    }

    /// Most recently created memories across `tree_ids`
    pub async fn recent_memories(
        &self,
        tree_ids: &[String],
        limit: usize,
        access_token: &str,
    ) -> Result<Vec<RecentMemory>> {
        let query = Query::new()
            .select("id, title, created_at, photo_url, emotion_tags")
            .is_in("family_tree_id", tree_ids.iter().cloned())
            .order("created_at", false)
            .limit(limit);
        self.fetch(MEMORIES_TABLE, &query, access_token).await
    }
}

fn decode<T: DeserializeOwned>(table: &str, row: Value, wrap: fn(String) -> AppError) -> Result<T> {
    serde_json::from_value(row)
        .map_err(|e| wrap(format!("Unexpected row shape in {}: {}", table, e)))
}
