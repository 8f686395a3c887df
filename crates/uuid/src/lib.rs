//! Asset identifier utilities.
//!
//! Every uploaded asset receives an opaque identifier at staging time. The identifier doubles as
//! the stem of the asset's stored filename (`<id><original extension>`), so its textual form must
//! be safe to use as a single path segment.
//!
//! ## Canonical form
//! - Length: 32
//! - Characters: `0-9` and `a-f` only
//! - Example: `550e8400e29b41d4a716446655440000`
//!
//! This is the same value you would get from `Uuid::new_v4().simple().to_string()`.
//! Identifiers are random (v4), so two concurrent uploads never stage into the same file.

mod service;

pub use service::AssetId;

/// Error type for identifier operations.
#[derive(Debug, thiserror::Error)]
pub enum IdError {
    /// Invalid input provided
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Result type for identifier operations.
pub type IdResult<T> = Result<T, IdError>;
