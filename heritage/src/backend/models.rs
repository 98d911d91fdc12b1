//! Backend models
//!
//! Rust structs representing the rows of the managed backend's tables and
//! the payloads of its auth endpoints. All models use serde; field names
//! match the column names.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Feeling associated with a memory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmotionTag {
    Happy,
    Love,
    Nostalgia,
    Pride,
    Peaceful,
    Sad,
}

impl EmotionTag {
    /// Every tag, in the order the picker shows them
    pub const ALL: [EmotionTag; 6] = [
        EmotionTag::Happy,
        EmotionTag::Love,
        EmotionTag::Nostalgia,
        EmotionTag::Pride,
        EmotionTag::Peaceful,
        EmotionTag::Sad,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EmotionTag::Happy => "happy",
            EmotionTag::Love => "love",
            EmotionTag::Nostalgia => "nostalgia",
            EmotionTag::Pride => "pride",
            EmotionTag::Peaceful => "peaceful",
            EmotionTag::Sad => "sad",
        }
    }

    /// Label shown next to the tag in the picker
    pub fn label(&self) -> &'static str {
        match self {
            EmotionTag::Happy => "Gëzim",
            EmotionTag::Love => "Dashuri",
            EmotionTag::Nostalgia => "Nostalgji",
            EmotionTag::Pride => "Krenari",
            EmotionTag::Peaceful => "Qetësi",
            EmotionTag::Sad => "Trishtim",
        }
    }
}

impl fmt::Display for EmotionTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EmotionTag {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EmotionTag::ALL
            .into_iter()
            .find(|tag| tag.as_str() == s.trim().to_lowercase())
            .ok_or_else(|| format!("Unknown emotion tag: {}", s))
    }
}

/// Selected emotion tags, kept in selection order without duplicates
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmotionSet {
    tags: Vec<EmotionTag>,
}

impl EmotionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Select the tag if absent, deselect it if present
    pub fn toggle(&mut self, tag: EmotionTag) {
        if let Some(pos) = self.tags.iter().position(|t| *t == tag) {
            self.tags.remove(pos);
        } else {
            self.tags.push(tag);
        }
    }

    pub fn contains(&self, tag: EmotionTag) -> bool {
        self.tags.contains(&tag)
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    pub fn as_slice(&self) -> &[EmotionTag] {
        &self.tags
    }

    /// Column value for `memories.emotion_tags`: null when nothing is selected
    pub fn to_column(&self) -> Option<Vec<EmotionTag>> {
        if self.tags.is_empty() {
            None
        } else {
            Some(self.tags.clone())
        }
    }
}

impl FromIterator<EmotionTag> for EmotionSet {
    fn from_iter<I: IntoIterator<Item = EmotionTag>>(iter: I) -> Self {
        let mut set = EmotionSet::new();
        for tag in iter {
            if !set.contains(tag) {
                set.tags.push(tag);
            }
        }
        set
    }
}

// ===== Auth =====

/// Account as reported by the auth service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    /// Free-form metadata supplied at sign-up (holds `full_name`)
    #[serde(default)]
    pub user_metadata: serde_json::Value,
}

impl AuthUser {
    pub fn full_name(&self) -> Option<&str> {
        self.user_metadata
            .get("full_name")
            .and_then(|v| v.as_str())
            .filter(|name| !name.trim().is_empty())
    }
}

/// Tokens plus the user they were issued for
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthSession {
    pub access_token: String,
    pub refresh_token: String,
    pub user: AuthUser,
}

/// Result of creating an account.
///
/// `session` is absent when the backend requires e-mail confirmation
/// before the first sign-in.
#[derive(Debug, Clone, PartialEq)]
pub struct SignUpOutcome {
    pub user: AuthUser,
    pub session: Option<AuthSession>,
}

// ===== Tables =====

/// Row of `profiles`, one per account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    pub email: String,
    pub full_name: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

/// A named collection owned by one user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FamilyTree {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

/// Insert payload for `family_trees`
#[derive(Debug, Clone, Serialize)]
pub struct NewFamilyTree {
    pub name: String,
    pub description: Option<String>,
    pub created_by: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FamilyMember {
    pub id: String,
    pub family_tree_id: String,
    pub name: String,
    #[serde(default)]
    pub birth_date: Option<NaiveDate>,
    #[serde(default)]
    pub death_date: Option<NaiveDate>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub photo_url: Option<String>,
}

/// Insert payload for `family_members`
#[derive(Debug, Clone, Default, Serialize)]
pub struct NewFamilyMember {
    pub family_tree_id: String,
    pub name: String,
    pub birth_date: Option<NaiveDate>,
    pub death_date: Option<NaiveDate>,
    pub gender: Option<String>,
    pub bio: Option<String>,
    pub photo_url: Option<String>,
}

/// A titled record optionally carrying text, audio, a photo and emotion tags
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Memory {
    pub id: String,
    pub family_tree_id: String,
    #[serde(default)]
    pub family_member_id: Option<String>,
    pub title: String,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub audio_url: Option<String>,
    #[serde(default)]
    pub photo_url: Option<String>,
    #[serde(default)]
    pub emotion_tags: Option<Vec<EmotionTag>>,
    #[serde(default)]
    pub memory_date: Option<NaiveDate>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

/// Insert payload for `memories`.
///
/// Absent optional fields are sent as explicit nulls.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewMemory {
    pub family_tree_id: String,
    pub family_member_id: Option<String>,
    pub title: String,
    pub content: Option<String>,
    pub audio_url: Option<String>,
    pub photo_url: Option<String>,
    pub emotion_tags: Option<Vec<EmotionTag>>,
    pub memory_date: Option<NaiveDate>,
    pub created_by: String,
}

/// The columns the dashboard lists for recent memories
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecentMemory {
    pub id: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub photo_url: Option<String>,
    #[serde(default)]
    pub emotion_tags: Option<Vec<EmotionTag>>,
}
