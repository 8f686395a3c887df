//! Metadata sidecar persistence.
//!
//! Each asset may have a JSON sidecar stored next to it as `<filename>.meta.json`. The sidecar's
//! `filename`, `originalname`, `url` and address fields always describe where the asset lives
//! now; [`SidecarStore::relocate`] keeps them in step when the asset moves.

use crate::paths::{AddressResolver, AssetAddress, FileName};
use crate::{FilesError, FilesResult};
use chrono::{DateTime, Utc};
use media_uuid::AssetId;
use std::fs;

/// Authoritative description of an asset, as written at upload time.
///
/// Field names on the wire match the sidecar format the store has always produced.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct AssetMetadata {
    /// Identifier assigned when the upload was staged
    #[cfg_attr(feature = "openapi", schema(value_type = String))]
    pub id: AssetId,

    /// Current stored filename
    pub filename: String,

    /// Client-supplied name at upload; replaced by the new name on rename
    pub originalname: String,

    pub mimetype: String,

    /// Size of the stored bytes
    pub size: u64,

    pub uploaded_at: DateTime<Utc>,

    /// Derived download URL; not authoritative
    pub url: String,

    pub tenant_id: String,

    pub collection_id: String,

    /// Directory inside the collection, empty for the top level
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub dir: String,

    /// Hex SHA-256 of the bytes, computed while staging
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
}

impl AssetMetadata {
    /// Rewrites the location fields for `name` at `address`.
    pub(crate) fn relocate_to(
        &mut self,
        resolver: &AddressResolver,
        address: &AssetAddress,
        name: &FileName,
    ) {
        self.filename = name.as_str().to_owned();
        self.url = resolver.download_url(address, name);
        self.tenant_id = address.tenant().to_owned();
        self.collection_id = address.collection().to_owned();
        self.dir = address.subdir().to_string();
    }
}

/// Best-effort metadata reconstructed from filesystem attributes.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct DerivedMetadata {
    pub filename: String,
    pub tenant_id: String,
    pub collection_id: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub dir: String,
    pub size: u64,
    /// Creation time when the platform reports one, else last modification time
    pub uploaded_at: Option<DateTime<Utc>>,
    pub url: String,
    #[cfg_attr(feature = "openapi", schema(value_type = String))]
    pub note: &'static str,
}

/// Metadata for an asset, tagged by how much it can be trusted.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(untagged)]
pub enum Metadata {
    /// Read from the asset's sidecar
    Authoritative(AssetMetadata),
    /// Reconstructed because the sidecar is absent or unreadable
    Derived(DerivedMetadata),
}

impl Metadata {
    pub fn is_fallback(&self) -> bool {
        matches!(self, Metadata::Derived(_))
    }

    pub fn url(&self) -> &str {
        match self {
            Metadata::Authoritative(m) => &m.url,
            Metadata::Derived(m) => &m.url,
        }
    }

    pub fn filename(&self) -> &str {
        match self {
            Metadata::Authoritative(m) => &m.filename,
            Metadata::Derived(m) => &m.filename,
        }
    }

    /// Recorded MIME type; derived metadata never has one.
    pub fn mime_type(&self) -> Option<&str> {
        match self {
            Metadata::Authoritative(m) => Some(&m.mimetype),
            Metadata::Derived(_) => None,
        }
    }
}

/// Observed state of an asset's sidecar after a secondary sidecar step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SidecarSync {
    /// The sidecar now matches the asset
    Synced,
    /// There was no sidecar to maintain
    Absent,
    /// The step failed; the sidecar may be stale, missing or orphaned
    Failed(String),
}

impl SidecarSync {
    pub fn is_consistent(&self) -> bool {
        !matches!(self, SidecarSync::Failed(_))
    }
}

/// Reads and writes sidecars.
#[derive(Debug, Clone)]
pub struct SidecarStore {
    resolver: AddressResolver,
}

impl SidecarStore {
    pub fn new(resolver: AddressResolver) -> Self {
        Self { resolver }
    }

    /// Serializes `fields` as the sidecar of `name`, overwriting any existing sidecar.
    ///
    /// # Errors
    ///
    /// Returns [`FilesError::Io`] if the sidecar cannot be written.
    pub fn write(
        &self,
        address: &AssetAddress,
        name: &FileName,
        fields: &AssetMetadata,
    ) -> FilesResult<()> {
        let path = self.resolver.sidecar_path(address, name);
        let json = serde_json::to_vec_pretty(fields)
            .map_err(|e| FilesError::Io(std::io::Error::other(e)))?;
        fs::write(&path, json)
            .map_err(|e| FilesError::io(format!("Failed to write sidecar {}", path.display()), e))
    }

    /// Reads the sidecar of `name`.
    ///
    /// This does not check that the asset's bytes exist; callers that must ignore orphaned
    /// sidecars check the bytes first.
    ///
    /// # Errors
    ///
    /// - [`FilesError::NotFound`] if there is no sidecar
    /// - [`FilesError::Io`] if it cannot be read or does not parse
    pub fn read(&self, address: &AssetAddress, name: &FileName) -> FilesResult<AssetMetadata> {
        let path = self.resolver.sidecar_path(address, name);
        let data = match fs::read(&path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(FilesError::NotFound(format!("metadata for {}", name)));
            }
            Err(e) => {
                return Err(FilesError::io(
                    format!("Failed to read sidecar {}", path.display()),
                    e,
                ))
            }
        };
        serde_json::from_slice(&data).map_err(|e| {
            FilesError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("Malformed sidecar {}: {}", path.display(), e),
            ))
        })
    }

    /// Moves the sidecar of `from_name` at `from` to `to_name` at `to`, rewriting its location
    /// fields. When `renamed` is true `originalname` takes the new name as well.
    ///
    /// The new sidecar is written before the old one is removed, so a failure part way leaves
    /// at worst a stale copy at the old location (which reads ignore, as its bytes are gone).
    ///
    /// Returns [`SidecarSync::Absent`] if there is no source sidecar. Any sidecar already at the
    /// destination described the file that was just overwritten, so it is removed.
    ///
    /// # Errors
    ///
    /// Returns [`FilesError::Io`] if the source cannot be parsed, the new sidecar cannot be
    /// written, or a stale sidecar cannot be removed.
    pub fn relocate(
        &self,
        from: &AssetAddress,
        to: &AssetAddress,
        from_name: &FileName,
        to_name: &FileName,
        renamed: bool,
    ) -> FilesResult<SidecarSync> {
        let old_path = self.resolver.sidecar_path(from, from_name);
        let new_path = self.resolver.sidecar_path(to, to_name);

        let mut fields = match self.read(from, from_name) {
            Ok(fields) => fields,
            Err(FilesError::NotFound(_)) => {
                if old_path != new_path {
                    remove_if_present(&new_path)?;
                }
                return Ok(SidecarSync::Absent);
            }
            Err(e) => return Err(e),
        };

        fields.relocate_to(&self.resolver, to, to_name);
        if renamed {
            fields.originalname = to_name.as_str().to_owned();
        }
        self.write(to, to_name, &fields)?;

        if old_path != new_path {
            remove_if_present(&old_path)?;
        }

        Ok(SidecarSync::Synced)
    }

    /// Removes the sidecar of `name`, swallowing errors.
    ///
    /// Only called once the asset's bytes are already gone; failures are logged and reported
    /// but never propagated.
    pub fn delete(&self, address: &AssetAddress, name: &FileName) -> SidecarSync {
        let path = self.resolver.sidecar_path(address, name);
        match fs::remove_file(&path) {
            Ok(()) => SidecarSync::Synced,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => SidecarSync::Absent,
            Err(e) => {
                tracing::warn!("failed to delete sidecar {}: {}", path.display(), e);
                SidecarSync::Failed(e.to_string())
            }
        }
    }
}

fn remove_if_present(path: &std::path::Path) -> FilesResult<()> {
    match fs::remove_file(path) {
        Ok(()) => {
            tracing::debug!("removed sidecar {}", path.display());
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(FilesError::io(
            format!("Failed to remove sidecar {}", path.display()),
            e,
        )),
    }
}
