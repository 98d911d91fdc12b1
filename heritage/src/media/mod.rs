//! Media capture
//!
//! Local capture state for a memory's audio clip and photo. Nothing here
//! talks to the backend; finished media is handed to the memory form.

pub mod photo;
pub mod recorder;

pub use photo::{PhotoPicker, PickedPhoto};
pub use recorder::{
    format_duration, AudioBlob, AudioDevice, AudioRecorder, AudioStream, RecorderStatus,
};
