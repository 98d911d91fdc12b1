//! Audio recorder
//!
//! Three-state recorder over an injected input device:
//!
//! ```text
//! Idle --start--> Recording --stop--> Recorded --discard--> Idle
//! ```
//!
//! The input stream is held exclusively while recording and released on
//! every exit from the Recording state: stop, discard, a failed stop, or
//! the recorder being dropped.

use crate::config::RECORDED_AUDIO_MIME;
use crate::error::{AppError, Result};
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use tokio::time::Instant;

/// Source of microphone input
#[async_trait]
pub trait AudioDevice: Send + Sync {
    /// Acquire an input stream.
    ///
    /// Fails with `AppError::Device` when permission is denied or no input
    /// device exists.
    async fn open(&self) -> Result<Box<dyn AudioStream>>;
}

/// An acquired input stream
pub trait AudioStream: Send {
    /// Encoded chunks captured since the previous call
    fn take_chunks(&mut self) -> Result<Vec<Vec<u8>>>;

    /// Stop capturing and give the device back
    fn release(&mut self);
}

/// A finished recording ready for upload
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBlob {
    pub data: Vec<u8>,
    pub content_type: String,
    pub duration_secs: u64,
}

impl AudioBlob {
    /// Use an existing audio file in place of a live recording
    pub async fn from_file(path: &Path) -> Result<Self> {
        let data = tokio::fs::read(path).await?;
        if data.is_empty() {
            return Err(AppError::Validation(format!(
                "Audio file is empty: {}",
                path.display()
            )));
        }

        Ok(Self {
            data,
            content_type: RECORDED_AUDIO_MIME.to_string(),
            duration_secs: 0,
        })
    }
}

/// Observable recorder state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecorderStatus {
    Idle,
    Recording,
    Recorded,
}

enum RecorderState {
    Idle,
    Recording {
        stream: Box<dyn AudioStream>,
        chunks: Vec<Vec<u8>>,
        started_at: Instant,
    },
    Recorded(AudioBlob),
}

type CompletionCallback = Box<dyn FnMut(AudioBlob) + Send>;

pub struct AudioRecorder {
    device: Arc<dyn AudioDevice>,
    state: RecorderState,
    on_complete: Option<CompletionCallback>,
}

impl AudioRecorder {
    pub fn new(device: Arc<dyn AudioDevice>) -> Self {
        Self {
            device,
            state: RecorderState::Idle,
            on_complete: None,
        }
    }

    /// Register the callback receiving each finished recording
    pub fn on_complete<F>(mut self, callback: F) -> Self
    where
        F: FnMut(AudioBlob) + Send + 'static,
    {
        self.on_complete = Some(Box::new(callback));
        self
    }

    pub fn status(&self) -> RecorderStatus {
        match self.state {
            RecorderState::Idle => RecorderStatus::Idle,
            RecorderState::Recording { .. } => RecorderStatus::Recording,
            RecorderState::Recorded(_) => RecorderStatus::Recorded,
        }
    }

    /// Begin recording. Only valid from Idle.
    pub async fn start(&mut self) -> Result<()> {
        match self.state {
            RecorderState::Idle => {}
            RecorderState::Recording { .. } => {
                return Err(AppError::Validation("Already recording".to_string()));
            }
            RecorderState::Recorded(_) => {
                return Err(AppError::Validation(
                    "Discard the current recording before starting a new one".to_string(),
                ));
            }
        }

        let stream = self.device.open().await.map_err(|e| match e {
            AppError::Device(_) => e,
            other => AppError::Device(other.to_string()),
        })?;

        self.state = RecorderState::Recording {
            stream,
            chunks: Vec::new(),
            started_at: Instant::now(),
        };
        tracing::info!("Recording started");

        Ok(())
    }

    /// Pull chunks the stream has produced so far
    pub fn collect(&mut self) -> Result<()> {
        if let RecorderState::Recording { stream, chunks, .. } = &mut self.state {
            chunks.extend(stream.take_chunks()?.into_iter().filter(|c| !c.is_empty()));
        }
        Ok(())
    }

    /// Whole seconds recorded so far, or the length of the finished recording
    pub fn elapsed_secs(&self) -> u64 {
        match &self.state {
            RecorderState::Idle => 0,
            RecorderState::Recording { started_at, .. } => started_at.elapsed().as_secs(),
            RecorderState::Recorded(blob) => blob.duration_secs,
        }
    }

    /// Timer text, e.g. "0:03"
    pub fn timer_display(&self) -> String {
        format_duration(self.elapsed_secs())
    }

    /// Finish recording: join the captured chunks into one blob, release
    /// the stream and hand the blob to the completion callback.
    pub fn stop(&mut self) -> Result<AudioBlob> {
        let RecorderState::Recording {
            mut stream,
            mut chunks,
            started_at,
        } = std::mem::replace(&mut self.state, RecorderState::Idle)
        else {
            return Err(AppError::Validation("Not recording".to_string()));
        };

        let duration_secs = started_at.elapsed().as_secs();
        let remaining = stream.take_chunks();
        stream.release();

        chunks.extend(
            remaining
                .map_err(|e| AppError::Device(format!("Recording failed: {}", e)))?
                .into_iter()
                .filter(|c| !c.is_empty()),
        );

        let blob = AudioBlob {
            data: chunks.concat(),
            content_type: RECORDED_AUDIO_MIME.to_string(),
            duration_secs,
        };
        tracing::info!(
            "Recording finished: {} bytes over {}",
            blob.data.len(),
            format_duration(duration_secs)
        );

        self.state = RecorderState::Recorded(blob.clone());
        if let Some(callback) = self.on_complete.as_mut() {
            callback(blob.clone());
        }

        Ok(blob)
    }

    /// Drop the current recording (or abandon one in progress)
    pub fn discard(&mut self) {
        if let RecorderState::Recording { mut stream, .. } =
            std::mem::replace(&mut self.state, RecorderState::Idle)
        {
            stream.release();
            tracing::debug!("Recording abandoned");
        }
    }

    /// The finished recording, if any
    pub fn recording(&self) -> Option<&AudioBlob> {
        match &self.state {
            RecorderState::Recorded(blob) => Some(blob),
            _ => None,
        }
    }
}

impl Drop for AudioRecorder {
    fn drop(&mut self) {
        if let RecorderState::Recording { stream, .. } = &mut self.state {
            stream.release();
        }
    }
}

/// Format seconds as "m:ss"
pub fn format_duration(seconds: u64) -> String {
    format!("{}:{:02}", seconds / 60, seconds % 60)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct Microphone {
        pending: Arc<Mutex<Vec<Vec<u8>>>>,
        released: Arc<AtomicBool>,
        fail_reads: Arc<AtomicBool>,
        denied: bool,
    }

    struct MicrophoneStream {
        pending: Arc<Mutex<Vec<Vec<u8>>>>,
        released: Arc<AtomicBool>,
        fail_reads: Arc<AtomicBool>,
    }

    #[async_trait]
    impl AudioDevice for Microphone {
        async fn open(&self) -> Result<Box<dyn AudioStream>> {
            if self.denied {
                return Err(AppError::Device("Permission denied".to_string()));
            }
            self.released.store(false, Ordering::SeqCst);
            Ok(Box::new(MicrophoneStream {
                pending: self.pending.clone(),
                released: self.released.clone(),
                fail_reads: self.fail_reads.clone(),
            }))
        }
    }

    impl AudioStream for MicrophoneStream {
        fn take_chunks(&mut self) -> Result<Vec<Vec<u8>>> {
            if self.fail_reads.load(Ordering::SeqCst) {
                return Err(AppError::Device("stream ended".to_string()));
            }
            Ok(std::mem::take(&mut *self.pending.lock().unwrap()))
        }

        fn release(&mut self) {
            self.released.store(true, Ordering::SeqCst);
        }
    }

    impl Microphone {
        fn speak(&self, chunk: &[u8]) {
            self.pending.lock().unwrap().push(chunk.to_vec());
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_three_second_recording() {
        let mic = Arc::new(Microphone::default());
        let deliveries = Arc::new(AtomicUsize::new(0));
        let counter = deliveries.clone();
        let mut recorder = AudioRecorder::new(mic.clone()).on_complete(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        recorder.start().await.unwrap();
        assert_eq!(recorder.timer_display(), "0:00");

        mic.speak(b"RIFF");
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(recorder.timer_display(), "0:01");
        recorder.collect().unwrap();

        mic.speak(b"");
        mic.speak(b"WAVE");
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(recorder.timer_display(), "0:03");

        let blob = recorder.stop().unwrap();

        assert_eq!(blob.data, b"RIFFWAVE");
        assert_eq!(blob.content_type, "audio/wav");
        assert_eq!(blob.duration_secs, 3);
        assert_eq!(recorder.timer_display(), "0:03");
        assert_eq!(recorder.status(), RecorderStatus::Recorded);
        assert_eq!(deliveries.load(Ordering::SeqCst), 1);
        assert!(mic.released.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_permission_denied() {
        let mic = Arc::new(Microphone {
            denied: true,
            ..Default::default()
        });
        let mut recorder = AudioRecorder::new(mic);

        let err = recorder.start().await.unwrap_err();
        assert!(matches!(err, AppError::Device(_)));
        assert_eq!(recorder.status(), RecorderStatus::Idle);
    }

    #[tokio::test]
    async fn test_stream_released_when_stop_fails() {
        let mic = Arc::new(Microphone::default());
        let mut recorder = AudioRecorder::new(mic.clone());

        recorder.start().await.unwrap();
        mic.fail_reads.store(true, Ordering::SeqCst);

        let err = recorder.stop().unwrap_err();
        assert!(matches!(err, AppError::Device(_)));
        assert!(mic.released.load(Ordering::SeqCst));
        assert_eq!(recorder.status(), RecorderStatus::Idle);
    }

    #[tokio::test]
    async fn test_discard_returns_to_idle() {
        let mic = Arc::new(Microphone::default());
        let mut recorder = AudioRecorder::new(mic.clone());

        recorder.start().await.unwrap();
        mic.speak(b"data");
        recorder.stop().unwrap();
        assert!(recorder.start().await.is_err());

        recorder.discard();
        assert_eq!(recorder.status(), RecorderStatus::Idle);
        assert!(recorder.recording().is_none());
        recorder.start().await.unwrap();
    }

    #[tokio::test]
    async fn test_drop_while_recording_releases_stream() {
        let mic = Arc::new(Microphone::default());
        let mut recorder = AudioRecorder::new(mic.clone());
        recorder.start().await.unwrap();

        drop(recorder);

        assert!(mic.released.load(Ordering::SeqCst));
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(0), "0:00");
        assert_eq!(format_duration(3), "0:03");
        assert_eq!(format_duration(75), "1:15");
        assert_eq!(format_duration(600), "10:00");
    }
}
