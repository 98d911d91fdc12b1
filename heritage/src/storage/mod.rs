//! Storage module
//!
//! Object storage for memory media (audio recordings and photos).

pub mod media_store;

pub use media_store::{MediaKind, MediaStore};
