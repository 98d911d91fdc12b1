//! Heritage library
//!
//! Family trees and multimedia memories on top of a managed backend.
//! Exposes the core for the command-line front end and for tests.

pub mod app;
pub mod backend;
pub mod config;
pub mod error;
pub mod media;
pub mod routing;
pub mod services;
pub mod storage;
