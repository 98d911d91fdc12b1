//! Memories service
//!
//! The memory submission flow: collect the form, upload media, then write
//! one memory record.
//!
//! Steps run strictly in order and stop at the first failure:
//! 1. audio upload (if a recording is attached)
//! 2. photo upload (if a photo is picked)
//! 3. public URL resolution for whatever was uploaded
//! 4. the `memories` insert
//!
//! A failed upload means no record is written. A failed insert after
//! successful uploads leaves the uploaded objects behind; nothing removes
//! them.

use super::session::Session;
use crate::backend::{EmotionSet, EmotionTag, FamilyMember, FamilyTree, Memory, NewMemory, Repository};
use crate::error::Result;
use crate::media::{AudioBlob, AudioRecorder, PhotoPicker};
use crate::routing::Route;
use crate::storage::media_store::{audio_object_name, now_millis, photo_object_name};
use crate::storage::{MediaKind, MediaStore};
use chrono::NaiveDate;

/// The fields of the add-memory form
#[derive(Debug, Clone, Default)]
pub struct MemoryDraft {
    pub family_tree_id: String,
    /// Empty when the memory is not linked to a member
    pub family_member_id: String,
    pub title: String,
    pub content: String,
    pub memory_date: Option<NaiveDate>,
    pub emotions: EmotionSet,
    pub audio: Option<AudioBlob>,
    pub photo: PhotoPicker,
}

impl MemoryDraft {
    /// A tree and a non-blank title are required
    pub fn can_submit(&self) -> bool {
        !self.family_tree_id.trim().is_empty() && !self.title.trim().is_empty()
    }

    /// Build the insert payload from the draft and resolved media URLs
    pub fn to_new_memory(
        &self,
        created_by: &str,
        audio_url: Option<String>,
        photo_url: Option<String>,
    ) -> NewMemory {
        NewMemory {
            family_tree_id: self.family_tree_id.trim().to_string(),
            family_member_id: non_blank(&self.family_member_id),
            title: self.title.trim().to_string(),
            content: non_blank(&self.content),
            audio_url,
            photo_url,
            emotion_tags: self.emotions.to_column(),
            memory_date: self.memory_date,
            created_by: created_by.to_string(),
        }
    }
}

fn non_blank(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Service running the submission flow
#[derive(Clone)]
pub struct MemoriesService {
    repo: Repository,
    media: MediaStore,
}

impl MemoriesService {
    pub fn new(repo: Repository, media: MediaStore) -> Self {
        Self { repo, media }
    }

    /// Submit a draft.
    ///
    /// Returns `Ok(None)` without any network call when the draft is
    /// missing its tree or title.
    pub async fn submit(&self, session: &Session, draft: &MemoryDraft) -> Result<Option<Memory>> {
        if !draft.can_submit() {
            tracing::debug!("Memory draft incomplete, nothing submitted");
            return Ok(None);
        }

        let token = &session.access_token;
        tracing::info!("Submitting memory: {}", draft.title.trim());

        let audio_url = match &draft.audio {
            Some(blob) => Some(
                self.media
                    .upload(
                        MediaKind::Audio,
                        &audio_object_name(now_millis()),
                        blob.data.clone(),
                        &blob.content_type,
                        token,
                    )
                    .await?,
            ),
            None => None,
        };

        let photo_url = match draft.photo.photo() {
            Some(photo) => Some(
                self.media
                    .upload(
                        MediaKind::Photo,
                        &photo_object_name(now_millis(), &photo.filename),
                        photo.data.clone(),
                        &photo.content_type,
                        token,
                    )
                    .await?,
            ),
            None => None,
        };

        let uploaded = audio_url.is_some() || photo_url.is_some();
        let new_memory = draft.to_new_memory(&session.user_id, audio_url, photo_url);

        let memory = self
            .repo
            .create_memory(&new_memory, token)
            .await
            .map_err(|e| {
                if uploaded {
                    tracing::warn!("Memory insert failed after media upload, objects orphaned: {}", e);
                }
                e
            })?;

        tracing::info!("Memory created: {}", memory.id);
        Ok(Some(memory))
    }

    /// Open the add-memory form: the user's trees by name, the first one
    /// preselected with its members loaded
    pub async fn open_form(&self, session: &Session) -> Result<MemoryForm> {
        let trees = self
            .repo
            .list_trees_by_name(&session.user_id, &session.access_token)
            .await?;

        let mut form = MemoryForm {
            trees,
            members: Vec::new(),
            draft: MemoryDraft::default(),
            submitting: false,
            error: None,
        };

        if let Some(first) = form.trees.first().map(|t| t.id.clone()) {
            self.select_tree(&mut form, session, &first).await?;
        }

        Ok(form)
    }

    /// Switch the form to another tree, reloading its members
    pub async fn select_tree(
        &self,
        form: &mut MemoryForm,
        session: &Session,
        tree_id: &str,
    ) -> Result<()> {
        form.draft.family_tree_id = tree_id.to_string();
        form.draft.family_member_id.clear();
        form.members = self.repo.list_members(tree_id, &session.access_token).await?;
        Ok(())
    }
}

/// Add-memory screen state
#[derive(Debug)]
pub struct MemoryForm {
    pub trees: Vec<FamilyTree>,
    /// Members of the selected tree
    pub members: Vec<FamilyMember>,
    pub draft: MemoryDraft,
    submitting: bool,
    error: Option<String>,
}

impl MemoryForm {
    /// No tree exists yet; the user has to create one first
    pub fn needs_family_tree(&self) -> bool {
        self.trees.is_empty()
    }

    pub fn toggle_emotion(&mut self, tag: EmotionTag) {
        self.draft.emotions.toggle(tag);
    }

    /// Completion callback target for the recorder
    pub fn attach_audio(&mut self, blob: AudioBlob) {
        self.draft.audio = Some(blob);
    }

    /// Discard the recording both in the recorder and in the draft
    pub fn discard_audio(&mut self, recorder: &mut AudioRecorder) {
        recorder.discard();
        self.draft.audio = None;
    }

    /// Whether the submit action is enabled
    pub fn can_submit(&self) -> bool {
        !self.submitting && self.draft.can_submit()
    }

    pub fn is_submitting(&self) -> bool {
        self.submitting
    }

    /// Message from the last failed submission
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Submit the form.
    ///
    /// On success returns the route to navigate to. On failure the error is
    /// kept for display and returned; the draft stays as entered.
    pub async fn submit(
        &mut self,
        service: &MemoriesService,
        session: &Session,
    ) -> Result<Option<Route>> {
        if !self.can_submit() {
            return Ok(None);
        }

        self.submitting = true;
        self.error = None;
        let result = service.submit(session, &self.draft).await;
        self.submitting = false;

        match result {
            Ok(Some(_)) => Ok(Some(Route::Dashboard)),
            Ok(None) => Ok(None),
            Err(e) => {
                tracing::error!("Error creating memory: {}", e);
                self.error = Some(e.to_string());
                Err(e)
            }
        }
    }
}
