//! Media Asset Storage
//!
//! This crate is the storage-consistency core of the media asset store. It owns the rules that
//! keep an uploaded file and its JSON metadata sidecar together while they are created, moved,
//! renamed and deleted.
//!
//! ## Storage Layout
//!
//! ```text
//! <storage_root>/
//! ├── _tmp/                         # staging area for in-flight uploads
//! │   └── 550e8400….pdf
//! └── <tenant>/
//!     └── <collection>/
//!         ├── 550e8400….pdf         # asset bytes, named <id><ext>
//!         ├── 550e8400….pdf.meta.json
//!         └── <subdir>/…
//! ```
//!
//! ## Guarantees
//!
//! - Addresses are validated before any path is built; nothing escapes the storage root.
//! - Uploads land in the staging area first and are renamed into place, so a namespace never
//!   holds a half-written asset.
//! - Bytes are authoritative. A sidecar without bytes reads as not-found, while bytes without a
//!   sidecar degrade to metadata derived from the filesystem ([`Metadata::Derived`]).
//! - Sidecar maintenance never fails a primary operation that already succeeded. Its outcome is
//!   reported as a [`SidecarSync`] so callers can see the post-condition.
//!
//! There is no in-process locking. Concurrent operations on the same asset race at the
//! filesystem and the last rename/unlink wins.
//!
//! ## Example Usage
//!
//! ```no_run
//! use media_files::{CommitRequest, MediaStore};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let store = MediaStore::new("uploads", "/media");
//! let outcome = store.uploads().upload(
//!     &b"hello"[..],
//!     "hello.txt",
//!     CommitRequest::new("u1", "proj1"),
//! )?;
//! println!("stored as {}", outcome.asset.filename);
//! # Ok(())
//! # }
//! ```

mod constants;
pub mod namespace;
pub mod paths;
pub mod relocation;
pub mod sidecar;
pub mod store;
pub mod upload;

pub use constants::{
    DEFAULT_MIME_TYPE, FALLBACK_NOTE, SIDECAR_SUFFIX, STAGING_DIR_NAME,
};
pub use media_uuid::AssetId;
pub use namespace::{DirectoryListing, NamespaceOps};
pub use paths::{AddressResolver, AssetAddress, FileName, Segment, Subdir};
pub use relocation::{RelocationOps, RelocationOutcome};
pub use sidecar::{AssetMetadata, DerivedMetadata, Metadata, SidecarStore, SidecarSync};
pub use store::{DeleteOutcome, MediaStore, OpenedAsset};
pub use upload::{CommitOutcome, CommitRequest, StagedUpload, UploadPipeline};

/// Failure categories surfaced to callers.
///
/// Every [`FilesError`] maps onto exactly one kind; transports use the kind to pick a status
/// code and the error's display text as the human-readable message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidAddress,
    MissingIdentity,
    MissingParameter,
    NotFound,
    Io,
}

impl ErrorKind {
    /// Stable wire name of the kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidAddress => "InvalidAddress",
            ErrorKind::MissingIdentity => "MissingIdentity",
            ErrorKind::MissingParameter => "MissingParameter",
            ErrorKind::NotFound => "NotFound",
            ErrorKind::Io => "IOError",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that can occur during storage operations
#[derive(Debug, thiserror::Error)]
pub enum FilesError {
    /// A tenant, collection, directory or file name failed validation
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// Tenant or collection identifier was absent or blank
    #[error("Missing identity: {0}")]
    MissingIdentity(String),

    /// A required operation parameter was absent or blank
    #[error("Missing parameter: {0}")]
    MissingParameter(String),

    /// The referenced file, folder or metadata does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// I/O error occurred
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl FilesError {
    /// Returns the taxonomy kind of this error.
    ///
    /// An OS-level "not found" surfacing as [`FilesError::Io`] (for example when a concurrent
    /// delete wins the race after an existence check) is reported as [`ErrorKind::NotFound`].
    pub fn kind(&self) -> ErrorKind {
        match self {
            FilesError::InvalidAddress(_) => ErrorKind::InvalidAddress,
            FilesError::MissingIdentity(_) => ErrorKind::MissingIdentity,
            FilesError::MissingParameter(_) => ErrorKind::MissingParameter,
            FilesError::NotFound(_) => ErrorKind::NotFound,
            FilesError::Io(e) if e.kind() == std::io::ErrorKind::NotFound => ErrorKind::NotFound,
            FilesError::Io(_) => ErrorKind::Io,
        }
    }

    /// Wraps an I/O error with the operation and path it concerned.
    pub(crate) fn io(context: impl std::fmt::Display, e: std::io::Error) -> Self {
        FilesError::Io(std::io::Error::new(e.kind(), format!("{}: {}", context, e)))
    }
}

pub type FilesResult<T> = Result<T, FilesError>;
