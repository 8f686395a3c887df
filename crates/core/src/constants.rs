//! Constants used throughout the media core crate.

use std::time::Duration;

/// Default storage root when no explicit directory is configured.
pub const DEFAULT_STORAGE_DIR: &str = "uploads";

/// Default mount point of the HTTP routes, also the prefix of derived download URLs.
pub const DEFAULT_URL_PREFIX: &str = "/media";

/// Staged uploads older than this are treated as abandoned.
pub const STAGING_MAX_AGE: Duration = Duration::from_secs(24 * 60 * 60);
