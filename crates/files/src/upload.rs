//! Staged upload pipeline.
//!
//! Receiving bytes and placing bytes are two separate steps:
//!
//! 1. [`UploadPipeline::stage`] opens a fresh file in the shared staging area (`<root>/_tmp`),
//!    named by a newly generated [`AssetId`] plus the original extension. The caller streams
//!    bytes into the returned [`StagedUpload`].
//! 2. [`UploadPipeline::commit`] validates the target identity, creates the destination
//!    directory, renames the staged file into place and writes the sidecar.
//!
//! A [`StagedUpload`] that is dropped without being committed deletes its staged file. That
//! covers validation failures, I/O failures before the rename, and a caller that abandons the
//! upload part way (for example a client disconnect).
//!
//! The staging area lives under the storage root, so the commit rename never crosses a volume
//! boundary and is atomic: the asset is either still staged or fully in place.

use crate::constants::{DEFAULT_MIME_TYPE, SNIFF_LEN};
use crate::paths::{AddressResolver, AssetAddress, FileName};
use crate::sidecar::{AssetMetadata, SidecarStore, SidecarSync};
use crate::{FilesError, FilesResult};
use chrono::Utc;
use media_uuid::AssetId;
use sha2::{Digest, Sha256};
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

/// Identity and descriptive facts supplied with an upload.
#[derive(Debug, Clone, Default)]
pub struct CommitRequest {
    pub tenant_id: String,
    pub collection_id: String,
    /// Directory inside the collection; empty for the top level
    pub subdir: String,
    /// Client-declared MIME type; sniffed from content when absent
    pub mime_type: Option<String>,
    /// Client-declared size; the stored size is always the number of bytes received
    pub declared_size: Option<u64>,
}

impl CommitRequest {
    pub fn new(tenant_id: impl Into<String>, collection_id: impl Into<String>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            collection_id: collection_id.into(),
            ..Self::default()
        }
    }

    pub fn with_subdir(mut self, subdir: impl Into<String>) -> Self {
        self.subdir = subdir.into();
        self
    }

    pub fn with_mime_type(mut self, mime_type: Option<String>) -> Self {
        self.mime_type = mime_type;
        self
    }

    pub fn with_declared_size(mut self, size: Option<u64>) -> Self {
        self.declared_size = size;
        self
    }
}

/// Result of a successful commit.
#[derive(Debug, Clone)]
pub struct CommitOutcome {
    /// Full metadata of the committed asset
    pub asset: AssetMetadata,
    /// Whether the sidecar was persisted. The commit stands either way.
    pub sidecar: SidecarSync,
}

/// An upload whose bytes are being received into the staging area.
pub struct StagedUpload {
    id: AssetId,
    extension: String,
    original_name: String,
    path: PathBuf,
    file: Option<fs::File>,
    hasher: Sha256,
    head: Vec<u8>,
    size: u64,
    committed: bool,
}

impl std::fmt::Debug for StagedUpload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StagedUpload")
            .field("id", &self.id)
            .field("original_name", &self.original_name)
            .field("path", &self.path)
            .field("size", &self.size)
            .field("committed", &self.committed)
            .finish_non_exhaustive()
    }
}

impl StagedUpload {
    pub fn id(&self) -> AssetId {
        self.id
    }

    /// Name the asset will be stored under: `<id><extension>`.
    pub fn stored_name(&self) -> String {
        self.id.stored_name(&self.extension)
    }

    pub fn original_name(&self) -> &str {
        &self.original_name
    }

    /// Location of the staged bytes.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Bytes received so far.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Appends a chunk of the incoming stream.
    ///
    /// # Errors
    ///
    /// Returns [`FilesError::Io`] if the staged file cannot be written.
    pub fn write_chunk(&mut self, chunk: &[u8]) -> FilesResult<()> {
        self.write_all(chunk)
            .map_err(|e| FilesError::io(format!("Failed to stage {}", self.path.display()), e))
    }

    /// Drops the staged bytes.
    pub fn discard(self) {
        // Drop removes the staged file.
    }

    fn finish_writing(&mut self) -> FilesResult<()> {
        if let Some(mut file) = self.file.take() {
            file.flush()
                .and_then(|_| file.sync_all())
                .map_err(|e| {
                    FilesError::io(format!("Failed to flush {}", self.path.display()), e)
                })?;
        }
        Ok(())
    }

    fn sniffed_mime_type(&self) -> Option<&'static str> {
        infer::get(&self.head).map(|kind| kind.mime_type())
    }

    fn digest_hex(&self) -> String {
        hex::encode(self.hasher.clone().finalize())
    }
}

impl Write for StagedUpload {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let file = self.file.as_mut().ok_or_else(|| {
            io::Error::new(io::ErrorKind::BrokenPipe, "staged upload is already closed")
        })?;
        let written = file.write(buf)?;
        let accepted = &buf[..written];
        self.hasher.update(accepted);
        if self.head.len() < SNIFF_LEN {
            let take = (SNIFF_LEN - self.head.len()).min(accepted.len());
            self.head.extend_from_slice(&accepted[..take]);
        }
        self.size += written as u64;
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.file.as_mut() {
            Some(file) => file.flush(),
            None => Ok(()),
        }
    }
}

impl Drop for StagedUpload {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        self.file.take();
        match fs::remove_file(&self.path) {
            Ok(()) => tracing::debug!("discarded staged upload {}", self.path.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(
                "failed to remove staged upload {}: {}",
                self.path.display(),
                e
            ),
        }
    }
}

/// Receives uploads into the staging area and commits them into the namespace.
#[derive(Debug, Clone)]
pub struct UploadPipeline {
    resolver: AddressResolver,
    sidecars: SidecarStore,
}

impl UploadPipeline {
    pub fn new(resolver: AddressResolver, sidecars: SidecarStore) -> Self {
        Self { resolver, sidecars }
    }

    /// Opens a new staged file for an upload called `original_name`.
    ///
    /// # Errors
    ///
    /// Returns [`FilesError::Io`] if the staging area or staged file cannot be created.
    pub fn stage(&self, original_name: &str) -> FilesResult<StagedUpload> {
        let staging = self.resolver.staging_dir();
        fs::create_dir_all(&staging).map_err(|e| {
            FilesError::io(
                format!("Failed to create staging area {}", staging.display()),
                e,
            )
        })?;

        let original_name = client_file_name(original_name);
        let extension = extension_of(&original_name);
        let id = AssetId::new();
        let path = staging.join(id.stored_name(&extension));

        let file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|e| FilesError::io(format!("Failed to stage {}", path.display()), e))?;

        tracing::debug!("staging upload {} as {}", original_name, path.display());

        Ok(StagedUpload {
            id,
            extension,
            original_name,
            path,
            file: Some(file),
            hasher: Sha256::new(),
            head: Vec::new(),
            size: 0,
            committed: false,
        })
    }

    /// Moves a fully received upload into its addressed location.
    ///
    /// Any failure before the rename discards the staged file. A failure to write the sidecar
    /// after the rename does not undo the commit; it is logged and reported in
    /// [`CommitOutcome::sidecar`].
    ///
    /// # Errors
    ///
    /// - [`FilesError::MissingIdentity`] if the tenant or collection is blank
    /// - [`FilesError::InvalidAddress`] if the address fails validation
    /// - [`FilesError::Io`] if the destination cannot be created or the rename fails
    pub fn commit(
        &self,
        mut staged: StagedUpload,
        request: CommitRequest,
    ) -> FilesResult<CommitOutcome> {
        let address = AssetAddress::new(
            &request.tenant_id,
            &request.collection_id,
            &request.subdir,
        )?;
        let name = FileName::parse(&staged.stored_name())?;

        staged.finish_writing()?;

        let dest_dir = self.resolver.directory(&address);
        fs::create_dir_all(&dest_dir).map_err(|e| {
            FilesError::io(format!("Failed to create directory {}", dest_dir.display()), e)
        })?;

        let dest = self.resolver.file_path(&address, &name);
        fs::rename(&staged.path, &dest).map_err(|e| {
            FilesError::io(
                format!(
                    "Failed to move {} to {}",
                    staged.path.display(),
                    dest.display()
                ),
                e,
            )
        })?;
        staged.committed = true;

        if let Some(declared) = request.declared_size {
            if declared != staged.size {
                tracing::warn!(
                    "upload {} declared {} bytes but {} were received",
                    name,
                    declared,
                    staged.size
                );
            }
        }

        let mimetype = request
            .mime_type
            .filter(|m| !m.trim().is_empty())
            .or_else(|| staged.sniffed_mime_type().map(str::to_owned))
            .unwrap_or_else(|| DEFAULT_MIME_TYPE.to_owned());

        let asset = AssetMetadata {
            id: staged.id,
            filename: name.as_str().to_owned(),
            originalname: staged.original_name.clone(),
            mimetype,
            size: staged.size,
            uploaded_at: Utc::now(),
            url: self.resolver.download_url(&address, &name),
            tenant_id: address.tenant().to_owned(),
            collection_id: address.collection().to_owned(),
            dir: address.subdir().to_string(),
            sha256: Some(staged.digest_hex()),
        };

        let sidecar = match self.sidecars.write(&address, &name, &asset) {
            Ok(()) => SidecarSync::Synced,
            Err(e) => {
                tracing::warn!("committed {} without a sidecar: {}", dest.display(), e);
                SidecarSync::Failed(e.to_string())
            }
        };

        tracing::info!(
            "committed upload {} ({} bytes) to {}",
            asset.originalname,
            asset.size,
            dest.display()
        );

        Ok(CommitOutcome { asset, sidecar })
    }

    /// Stages everything `reader` yields and commits it.
    ///
    /// # Errors
    ///
    /// Any error from [`Self::stage`], reading `reader`, or [`Self::commit`]. The staged file
    /// is removed on every error path.
    pub fn upload(
        &self,
        mut reader: impl Read,
        original_name: &str,
        request: CommitRequest,
    ) -> FilesResult<CommitOutcome> {
        let mut staged = self.stage(original_name)?;
        io::copy(&mut reader, &mut staged).map_err(|e| {
            FilesError::io(format!("Failed to receive {}", original_name), e)
        })?;
        self.commit(staged, request)
    }

    /// Removes staged files last modified more than `max_age` ago.
    ///
    /// Intended for startup, to clear uploads abandoned by a process that died mid-transfer.
    /// Returns how many files were removed; individual removal failures are logged and skipped.
    ///
    /// # Errors
    ///
    /// Returns [`FilesError::Io`] if the staging area exists but cannot be listed.
    pub fn purge_stale(&self, max_age: Duration) -> FilesResult<usize> {
        let staging = self.resolver.staging_dir();
        let entries = match fs::read_dir(&staging) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
            Err(e) => {
                return Err(FilesError::io(
                    format!("Failed to list staging area {}", staging.display()),
                    e,
                ))
            }
        };

        let now = SystemTime::now();
        let mut removed = 0;
        for entry in entries.flatten() {
            let path = entry.path();
            let Ok(meta) = entry.metadata() else { continue };
            if !meta.is_file() {
                continue;
            }
            let age = meta
                .modified()
                .ok()
                .and_then(|modified| now.duration_since(modified).ok())
                .unwrap_or_default();
            if age < max_age {
                continue;
            }
            match fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(e) => tracing::warn!("failed to purge staged {}: {}", path.display(), e),
            }
        }

        if removed > 0 {
            tracing::info!("purged {} stale staged uploads", removed);
        }
        Ok(removed)
    }
}

/// Final component of a client-supplied filename, with any directory part stripped.
fn client_file_name(name: &str) -> String {
    let base = name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();
    if base.is_empty() {
        "upload".to_owned()
    } else {
        base.to_owned()
    }
}

/// Extension of `name` including its dot, or empty.
///
/// Only short alphanumeric extensions are kept so that the stored name stays a clean segment.
fn extension_of(name: &str) -> String {
    match name.rfind('.') {
        Some(idx) if idx > 0 => {
            let ext = &name[idx + 1..];
            if !ext.is_empty() && ext.len() <= 16 && ext.chars().all(|c| c.is_ascii_alphanumeric())
            {
                format!(".{}", ext.to_ascii_lowercase())
            } else {
                String::new()
            }
        }
        _ => String::new(),
    }
}
