//! Family service
//!
//! Creating and listing family trees and their members.

use super::session::Session;
use crate::backend::{FamilyMember, FamilyTree, NewFamilyMember, NewFamilyTree, Repository};
use crate::error::{AppError, Result};
use chrono::NaiveDate;

/// Details of a member to add
#[derive(Debug, Clone, Default)]
pub struct MemberDetails {
    pub name: String,
    pub birth_date: Option<NaiveDate>,
    pub death_date: Option<NaiveDate>,
    pub gender: Option<String>,
    pub bio: Option<String>,
}

#[derive(Clone)]
pub struct FamilyService {
    repo: Repository,
}

impl FamilyService {
    pub fn new(repo: Repository) -> Self {
        Self { repo }
    }

    /// Create a tree owned by the signed-in user
    pub async fn create_tree(
        &self,
        session: &Session,
        name: &str,
        description: Option<&str>,
    ) -> Result<FamilyTree> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AppError::Validation("Tree name is required".to_string()));
        }

        tracing::info!("Creating family tree: {}", name);

        let tree = self
            .repo
            .create_family_tree(
                &NewFamilyTree {
                    name: name.to_string(),
                    description: description
                        .map(str::trim)
                        .filter(|d| !d.is_empty())
                        .map(str::to_string),
                    created_by: session.user_id.clone(),
                },
                &session.access_token,
            )
            .await?;

        tracing::info!("Family tree created: {}", tree.id);
        Ok(tree)
    }

    /// The user's trees, alphabetically
    pub async fn list_trees(&self, session: &Session) -> Result<Vec<FamilyTree>> {
        self.repo
            .list_trees_by_name(&session.user_id, &session.access_token)
            .await
    }

    pub async fn add_member(
        &self,
        session: &Session,
        tree_id: &str,
        details: MemberDetails,
    ) -> Result<FamilyMember> {
        let name = details.name.trim();
        if name.is_empty() {
            return Err(AppError::Validation("Member name is required".to_string()));
        }
        if let (Some(born), Some(died)) = (details.birth_date, details.death_date) {
            if died < born {
                return Err(AppError::Validation(
                    "Death date cannot be before birth date".to_string(),
                ));
            }
        }

        tracing::info!("Adding {} to tree {}", name, tree_id);

        self.repo
            .create_family_member(
                &NewFamilyMember {
                    family_tree_id: tree_id.to_string(),
                    name: name.to_string(),
                    birth_date: details.birth_date,
                    death_date: details.death_date,
                    gender: details.gender.filter(|g| !g.trim().is_empty()),
                    bio: details.bio.filter(|b| !b.trim().is_empty()),
                    photo_url: None,
                },
                &session.access_token,
            )
            .await
    }

    pub async fn list_members(&self, session: &Session, tree_id: &str) -> Result<Vec<FamilyMember>> {
        self.repo.list_members(tree_id, &session.access_token).await
    }
}
