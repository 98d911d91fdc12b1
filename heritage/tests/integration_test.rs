//! Integration tests for Heritage
//!
//! End-to-end flows against the in-process backend:
//! - Sign-up, route guarding and session restore
//! - Family tree setup and the add-memory form
//! - Media uploads feeding the memory record and the dashboard

use async_trait::async_trait;
use heritage::app::AppState;
use heritage::backend::in_memory::{BackendCall, FailPoint};
use heritage::backend::{EmotionTag, InMemoryBackend};
use heritage::config::{AUDIO_BUCKET, MEMORIES_TABLE, PHOTO_BUCKET, PROFILES_TABLE};
use heritage::error::{AppError, Result};
use heritage::media::{AudioDevice, AudioRecorder, AudioStream, PickedPhoto};
use heritage::routing::{GuardState, Route, RouteDecision};
use heritage::services::{MemberDetails, SessionCache};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// Microphone yielding one fixed chunk per collection
struct FakeMicrophone;

struct FakeStream;

#[async_trait]
impl AudioDevice for FakeMicrophone {
    async fn open(&self) -> Result<Box<dyn AudioStream>> {
        Ok(Box::new(FakeStream))
    }
}

impl AudioStream for FakeStream {
    fn take_chunks(&mut self) -> Result<Vec<Vec<u8>>> {
        Ok(vec![b"RIFF0000WAVE".to_vec()])
    }

    fn release(&mut self) {}
}

/// Helper to build app state over a shared backend
fn create_test_app(backend: &InMemoryBackend, cache: Option<&SessionCache>) -> AppState {
    AppState::new(Arc::new(backend.clone()), cache.cloned())
}

/// Session cache in `dir` backed by an in-memory credential store
fn create_test_cache(dir: &TempDir) -> SessionCache {
    keyring::set_default_credential_builder(keyring::mock::default_credential_builder());
    SessionCache::new(dir.path()).unwrap()
}

#[tokio::test]
async fn test_sign_up_unlocks_protected_routes() {
    let backend = InMemoryBackend::new();
    let mut app = create_test_app(&backend, None);

    assert_eq!(app.navigator.navigate("/dashboard"), RouteDecision::ShowLoading);
    app.start().await;
    assert_eq!(app.navigator.navigate("/dashboard"), RouteDecision::Render(Route::Landing));

    let session = app
        .session
        .sign_up("drita@example.com", "sekret123", "Drita Berisha")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(session.display_name, "Drita Berisha");

    let profiles = backend.inserts_into(PROFILES_TABLE);
    assert_eq!(profiles.len(), 1);
    assert_eq!(profiles[0]["full_name"], "Drita Berisha");

    assert_eq!(app.navigator.state(), GuardState::Authenticated);
    assert_eq!(app.navigator.navigate("/"), RouteDecision::Render(Route::Dashboard));
    assert_eq!(app.navigator.navigate("/nowhere"), RouteDecision::Render(Route::Landing));
}

#[tokio::test]
async fn test_session_restored_from_cache() {
    let backend = InMemoryBackend::new();
    backend.register("drita@example.com", "sekret123", "Drita");
    let temp = TempDir::new().unwrap();
    let cache = create_test_cache(&temp);

    let first = create_test_app(&backend, Some(&cache));
    first.start().await;
    first
        .session
        .sign_in("drita@example.com", "sekret123")
        .await
        .unwrap();
    first.shutdown();

    let mut second = create_test_app(&backend, Some(&cache));
    let restored = second.start().await.unwrap();
    assert_eq!(restored.email, "drita@example.com");
    assert!(second.enter_protected(Route::Dashboard).is_ok());

    second.session.sign_out().await;
    second.shutdown();

    let third = create_test_app(&backend, Some(&cache));
    assert!(third.start().await.is_none());

    let on_disk = std::fs::read_to_string(cache.path()).unwrap_or_default();
    assert!(!on_disk.contains(&restored.refresh_token));
}

#[tokio::test]
async fn test_memory_with_recording_and_photo_reaches_dashboard() {
    let backend = InMemoryBackend::new();
    backend.register("drita@example.com", "sekret123", "Drita");
    let mut app = create_test_app(&backend, None);
    app.start().await;
    app.session
        .sign_in("drita@example.com", "sekret123")
        .await
        .unwrap();

    let session = app.enter_protected(Route::AddMemory).unwrap();
    let empty_form = app.memories.open_form(&session).await.unwrap();
    assert!(empty_form.needs_family_tree());

    let tree = app
        .family
        .create_tree(&session, "Familja Berisha", Some("Nga Gjakova"))
        .await
        .unwrap();
    let grandmother = app
        .family
        .add_member(
            &session,
            &tree.id,
            MemberDetails {
                name: "Nana Fatime".to_string(),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let mut form = app.memories.open_form(&session).await.unwrap();
    assert_eq!(form.draft.family_tree_id, tree.id);
    assert_eq!(form.members.len(), 1);

    let captured = Arc::new(Mutex::new(None));
    let sink = captured.clone();
    let mut recorder = AudioRecorder::new(Arc::new(FakeMicrophone))
        .on_complete(move |blob| *sink.lock().unwrap() = Some(blob));
    recorder.start().await.unwrap();
    recorder.collect().unwrap();
    recorder.stop().unwrap();

    let blob = captured.lock().unwrap().take().unwrap();
    form.attach_audio(blob);
    form.draft
        .photo
        .select(PickedPhoto {
            filename: "nana.png".to_string(),
            content_type: "image/png".to_string(),
            data: vec![0x89, b'P', b'N', b'G'],
        })
        .unwrap();
    form.draft.title = "Tregimet e nanës".to_string();
    form.draft.family_member_id = grandmother.id.clone();
    form.toggle_emotion(EmotionTag::Love);
    form.toggle_emotion(EmotionTag::Nostalgia);

    let next = form.submit(&app.memories, &session).await.unwrap();
    assert_eq!(next, Some(Route::Dashboard));

    assert_eq!(backend.object_count(AUDIO_BUCKET), 1);
    assert_eq!(backend.object_count(PHOTO_BUCKET), 1);

    let rows = backend.inserts_into(MEMORIES_TABLE);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["family_member_id"], grandmother.id.as_str());
    assert!(rows[0]["audio_url"].as_str().unwrap().contains("-audio.wav"));
    assert!(rows[0]["photo_url"].as_str().unwrap().ends_with("-nana.png"));

    let dashboard = app.dashboard.load(&session).await.unwrap();
    assert_eq!(dashboard.family_trees.len(), 1);
    assert_eq!(dashboard.recent_memories.len(), 1);
    assert_eq!(dashboard.recent_memories[0].title, "Tregimet e nanës");
    assert_eq!(
        dashboard.recent_memories[0].emotion_tags,
        Some(vec![EmotionTag::Love, EmotionTag::Nostalgia])
    );
}

#[tokio::test]
async fn test_failed_audio_upload_writes_nothing() {
    let backend = InMemoryBackend::new();
    backend.register("drita@example.com", "sekret123", "Drita");
    let mut app = create_test_app(&backend, None);
    app.start().await;
    app.session
        .sign_in("drita@example.com", "sekret123")
        .await
        .unwrap();
    let session = app.enter_protected(Route::AddMemory).unwrap();
    app.family
        .create_tree(&session, "Familja Berisha", None)
        .await
        .unwrap();

    let mut form = app.memories.open_form(&session).await.unwrap();
    form.draft.title = "Kënga e dasmës".to_string();
    form.attach_audio(heritage::media::AudioBlob {
        data: b"RIFF".to_vec(),
        content_type: "audio/wav".to_string(),
        duration_secs: 12,
    });
    form.draft
        .photo
        .select(PickedPhoto {
            filename: "dasma.jpg".to_string(),
            content_type: "image/jpeg".to_string(),
            data: vec![0xFF, 0xD8],
        })
        .unwrap();

    backend.fail_on(FailPoint::Upload(AUDIO_BUCKET.to_string()));
    backend.clear_calls();

    let err = form.submit(&app.memories, &session).await.unwrap_err();
    assert!(matches!(err, AppError::Upload(_)));
    assert!(form.error().is_some());
    assert!(!form.is_submitting());
    assert_eq!(form.draft.title, "Kënga e dasmës");

    assert!(backend.inserts_into(MEMORIES_TABLE).is_empty());
    assert!(!backend
        .calls()
        .iter()
        .any(|call| matches!(call, BackendCall::Upload { bucket, .. } if bucket == PHOTO_BUCKET)));

    backend.clear_failures();
    let next = form.submit(&app.memories, &session).await.unwrap();
    assert_eq!(next, Some(Route::Dashboard));
    assert!(form.error().is_none());
}
