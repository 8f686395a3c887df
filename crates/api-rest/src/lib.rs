//! # API REST
//!
//! REST API for the media asset store.
//!
//! Handles:
//! - HTTP endpoints with axum, including streamed multipart uploads
//! - OpenAPI documentation served at `/api-docs/openapi.json`
//! - REST-specific concerns (JSON serialization, error mapping, CORS, body limits)
//!
//! Storage semantics live in `media_files`; this crate reaches them through
//! [`media_core::MediaService`].

#![warn(rust_2018_idioms)]

pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod openapi;
pub mod router;

pub use config::ServerConfig;
pub use error::ApiError;
pub use handlers::AppState;
pub use router::{build_router, media_routes};
