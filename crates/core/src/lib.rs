//! # Media Core
//!
//! Runtime glue between the storage crate and the transports.
//!
//! This crate holds:
//! - [`CoreConfig`], resolved once at startup, and the helpers that parse its environment values
//! - [`MediaService`], an async wrapper that runs storage operations on the blocking pool
//! - [`UploadSession`], for streaming an upload in chunks
//!
//! **No API concerns**: HTTP routing and CLI parsing belong in `api-rest` and `media-cli`.

pub mod config;
pub mod constants;
mod error;
pub mod service;

pub use config::CoreConfig;
pub use constants::{DEFAULT_STORAGE_DIR, DEFAULT_URL_PREFIX, STAGING_MAX_AGE};
pub use error::{CoreError, CoreResult};
pub use media_files::ErrorKind;
pub use service::{MediaService, UploadSession};
