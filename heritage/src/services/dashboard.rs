//! Dashboard service
//!
//! Read-only overview: the user's trees, newest first, and the most recent
//! memories across them. Two sequential reads; the second needs the tree
//! ids from the first and is skipped when there are none.

use super::session::Session;
use crate::backend::{FamilyTree, RecentMemory, Repository};
use crate::config::RECENT_MEMORIES_LIMIT;
use crate::error::Result;
use serde::Serialize;

#[derive(Debug, Clone, Default, Serialize)]
pub struct DashboardData {
    pub family_trees: Vec<FamilyTree>,
    pub recent_memories: Vec<RecentMemory>,
}

#[derive(Clone)]
pub struct DashboardService {
    repo: Repository,
}

impl DashboardService {
    pub fn new(repo: Repository) -> Self {
        Self { repo }
    }

    pub async fn load(&self, session: &Session) -> Result<DashboardData> {
        let family_trees = self
            .repo
            .list_trees_newest_first(&session.user_id, &session.access_token)
            .await?;

        if family_trees.is_empty() {
            return Ok(DashboardData::default());
        }

        let tree_ids: Vec<String> = family_trees.iter().map(|t| t.id.clone()).collect();
        let recent_memories = self
            .repo
            .recent_memories(&tree_ids, RECENT_MEMORIES_LIMIT, &session.access_token)
            .await?;

        tracing::debug!(
            "Dashboard loaded: {} trees, {} recent memories",
            family_trees.len(),
            recent_memories.len()
        );

        Ok(DashboardData {
            family_trees,
            recent_memories,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::in_memory::BackendCall;
    use crate::backend::{Backend, InMemoryBackend};
    use crate::config::{FAMILY_TREES_TABLE, MEMORIES_TABLE};
    use serde_json::json;
    use std::sync::Arc;

    async fn signed_in(backend: &InMemoryBackend, email: &str) -> Session {
        backend.register(email, "secret1", "Test");
        let auth = backend.sign_in_with_password(email, "secret1").await.unwrap();
        Session {
            user_id: auth.user.id,
            email: email.to_string(),
            display_name: "Test".to_string(),
            access_token: auth.access_token,
            refresh_token: auth.refresh_token,
        }
    }

    #[tokio::test]
    async fn test_no_trees_skips_memory_query() {
        let backend = InMemoryBackend::new();
        let session = signed_in(&backend, "a@example.com").await;
        backend.clear_calls();
        let service = DashboardService::new(Repository::new(Arc::new(backend.clone())));

        let data = service.load(&session).await.unwrap();

        assert!(data.family_trees.is_empty());
        assert!(data.recent_memories.is_empty());
        assert_eq!(backend.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_five_newest_memories_across_own_trees() {
        let backend = InMemoryBackend::new();
        let session = signed_in(&backend, "a@example.com").await;
        let other = signed_in(&backend, "b@example.com").await;

        for (id, owner, created_at) in [
            ("t1", &session.user_id, "2023-01-01T00:00:00Z"),
            ("t2", &session.user_id, "2024-01-01T00:00:00Z"),
            ("t3", &other.user_id, "2024-06-01T00:00:00Z"),
        ] {
            backend.seed_row(
                FAMILY_TREES_TABLE,
                json!({ "id": id, "name": id, "created_by": owner, "created_at": created_at }),
            );
        }
        for day in 1..=7 {
            let tree = if day % 2 == 0 { "t1" } else { "t2" };
            backend.seed_row(
                MEMORIES_TABLE,
                json!({
                    "id": format!("m{}", day),
                    "family_tree_id": tree,
                    "title": format!("Memory {}", day),
                    "created_by": session.user_id,
                    "created_at": format!("2024-02-0{}T12:00:00Z", day),
                    "emotion_tags": ["love"],
                }),
            );
        }
        backend.seed_row(
            MEMORIES_TABLE,
            json!({
                "id": "foreign",
                "family_tree_id": "t3",
                "title": "Not mine",
                "created_by": other.user_id,
                "created_at": "2024-12-31T00:00:00Z",
            }),
        );

        let service = DashboardService::new(Repository::new(Arc::new(backend.clone())));
        let data = service.load(&session).await.unwrap();

        let tree_ids: Vec<&str> = data.family_trees.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(tree_ids, vec!["t2", "t1"]);

        let memory_ids: Vec<&str> = data.recent_memories.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(memory_ids, vec!["m7", "m6", "m5", "m4", "m3"]);

        let memory_query = backend
            .calls()
            .into_iter()
            .rev()
            .find_map(|call| match call {
                BackendCall::Select { table, query } if table == MEMORIES_TABLE => Some(query),
                _ => None,
            })
            .unwrap();
        assert_eq!(memory_query.limit, Some(RECENT_MEMORIES_LIMIT));
    }
}
