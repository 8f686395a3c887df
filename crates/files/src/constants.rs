//! Names and markers that define the on-disk layout.

/// Suffix appended to a stored filename to form its metadata sidecar name.
pub const SIDECAR_SUFFIX: &str = ".meta.json";

/// Reserved directory under the storage root that holds in-flight uploads.
pub const STAGING_DIR_NAME: &str = "_tmp";

/// MIME type reported when neither the client nor content sniffing can tell.
pub const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

/// Note attached to metadata that was reconstructed from filesystem attributes.
pub const FALLBACK_NOTE: &str = "Fallback metadata, no .meta.json found";

/// Number of leading bytes kept from a staged upload for content sniffing.
pub const SNIFF_LEN: usize = 8192;

/// Longest accepted path segment, in bytes.
pub const MAX_SEGMENT_LEN: usize = 255;
