//! Error types for the Heritage application
//!
//! All errors use thiserror for structured error handling.
//! These errors can be serialized to whatever presents them to the user.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    /// Bad credentials, duplicate account, weak password, or the auth
    /// endpoint being unreachable.
    #[error("Authentication error: {0}")]
    Auth(String),

    /// Microphone permission denied or no input device present.
    #[error("Device error: {0}")]
    Device(String),

    #[error("Upload error: {0}")]
    Upload(String),

    #[error("Write error: {0}")]
    Write(String),

    #[error("Query error: {0}")]
    Query(String),

    /// Missing or malformed backend credentials. Fatal at startup.
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Validation error: {0}")]
    Validation(String),

    /// The OS credential store refused a read, write or delete.
    #[error("Credential store error: {0}")]
    Credential(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    Generic(String),
}

impl serde::Serialize for AppError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
