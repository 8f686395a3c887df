//! The [`MediaStore`] facade and the per-asset read and delete operations.

use crate::constants::{DEFAULT_MIME_TYPE, FALLBACK_NOTE, SNIFF_LEN};
use crate::namespace::NamespaceOps;
use crate::paths::{AddressResolver, AssetAddress, FileName};
use crate::relocation::RelocationOps;
use crate::sidecar::{DerivedMetadata, Metadata, SidecarStore, SidecarSync};
use crate::upload::UploadPipeline;
use crate::{FilesError, FilesResult};
use chrono::{DateTime, Utc};
use std::fs;
use std::io::{self, Read, Seek};
use std::path::{Path, PathBuf};

/// A stored asset opened for reading, positioned at its first byte.
#[derive(Debug)]
pub struct OpenedAsset {
    pub filename: String,
    pub mime_type: String,
    pub size: u64,
    pub file: fs::File,
}

/// Result of deleting an asset. The bytes are always gone; `sidecar` says what happened to the
/// metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteOutcome {
    pub address: AssetAddress,
    pub filename: String,
    pub sidecar: SidecarSync,
}

/// Entry point to the asset store rooted at one storage directory.
///
/// All operation groups share the same [`AddressResolver`], so they agree on layout and URLs.
#[derive(Debug, Clone)]
pub struct MediaStore {
    resolver: AddressResolver,
    sidecars: SidecarStore,
    uploads: UploadPipeline,
    namespace: NamespaceOps,
    relocation: RelocationOps,
}

impl MediaStore {
    /// Creates a store rooted at `root` whose download URLs start with `url_prefix`.
    ///
    /// Nothing is created on disk until the first write.
    pub fn new(root: impl Into<PathBuf>, url_prefix: impl Into<String>) -> Self {
        let resolver = AddressResolver::new(root, url_prefix);
        let sidecars = SidecarStore::new(resolver.clone());
        Self {
            uploads: UploadPipeline::new(resolver.clone(), sidecars.clone()),
            namespace: NamespaceOps::new(resolver.clone()),
            relocation: RelocationOps::new(resolver.clone(), sidecars.clone()),
            sidecars,
            resolver,
        }
    }

    pub fn resolver(&self) -> &AddressResolver {
        &self.resolver
    }

    pub fn sidecars(&self) -> &SidecarStore {
        &self.sidecars
    }

    pub fn uploads(&self) -> &UploadPipeline {
        &self.uploads
    }

    pub fn namespace(&self) -> &NamespaceOps {
        &self.namespace
    }

    pub fn relocation(&self) -> &RelocationOps {
        &self.relocation
    }

    /// Opens an asset for streaming.
    ///
    /// The content type comes from the sidecar when there is one, otherwise it is sniffed from
    /// the leading bytes. Only those leading bytes are read here.
    ///
    /// # Errors
    ///
    /// - [`FilesError::NotFound`] if the file does not exist
    /// - [`FilesError::InvalidAddress`] / [`FilesError::MissingIdentity`] for a bad address
    /// - [`FilesError::Io`] if the file cannot be opened or read
    pub fn open(
        &self,
        tenant: &str,
        collection: &str,
        dir: &str,
        filename: &str,
    ) -> FilesResult<OpenedAsset> {
        let address = AssetAddress::new(tenant, collection, dir)?;
        let name = FileName::parse(filename)?;
        let path = self.resolver.file_path(&address, &name);
        ensure_asset(&path, &name)?;

        let read_err = |e: io::Error| match e.kind() {
            io::ErrorKind::NotFound => FilesError::NotFound(format!("file '{}'", name)),
            _ => FilesError::io(format!("Failed to read {}", path.display()), e),
        };
        let mut file = fs::File::open(&path).map_err(read_err)?;
        let size = file.metadata().map_err(read_err)?.len();

        let mime_type = match self.sidecars.read(&address, &name) {
            Ok(fields) => fields.mimetype,
            Err(_) => {
                let mut head = Vec::with_capacity(SNIFF_LEN);
                (&mut file)
                    .take(SNIFF_LEN as u64)
                    .read_to_end(&mut head)
                    .map_err(read_err)?;
                file.rewind().map_err(read_err)?;
                sniff(&head)
            }
        };

        Ok(OpenedAsset {
            filename: name.as_str().to_owned(),
            mime_type,
            size,
            file,
        })
    }

    /// Returns the asset's metadata.
    ///
    /// The sidecar is authoritative when present. Without a readable sidecar the metadata is
    /// derived from the file itself and marked with a note. A sidecar whose bytes are gone is
    /// ignored.
    ///
    /// # Errors
    ///
    /// - [`FilesError::NotFound`] if the file does not exist
    /// - [`FilesError::InvalidAddress`] / [`FilesError::MissingIdentity`] for a bad address
    /// - [`FilesError::Io`] if the file's attributes cannot be read
    pub fn metadata(
        &self,
        tenant: &str,
        collection: &str,
        dir: &str,
        filename: &str,
    ) -> FilesResult<Metadata> {
        let address = AssetAddress::new(tenant, collection, dir)?;
        let name = FileName::parse(filename)?;
        let path = self.resolver.file_path(&address, &name);
        ensure_asset(&path, &name)?;

        match self.sidecars.read(&address, &name) {
            Ok(fields) => return Ok(Metadata::Authoritative(fields)),
            Err(FilesError::NotFound(_)) => {}
            Err(e) => tracing::warn!("ignoring unreadable sidecar for {}: {}", path.display(), e),
        }

        let attrs = fs::metadata(&path)
            .map_err(|e| FilesError::io(format!("Failed to stat {}", path.display()), e))?;
        let uploaded_at = attrs
            .created()
            .or_else(|_| attrs.modified())
            .ok()
            .map(DateTime::<Utc>::from);

        Ok(Metadata::Derived(DerivedMetadata {
            filename: name.as_str().to_owned(),
            tenant_id: address.tenant().to_owned(),
            collection_id: address.collection().to_owned(),
            dir: address.subdir().to_string(),
            size: attrs.len(),
            uploaded_at,
            url: self.resolver.download_url(&address, &name),
            note: FALLBACK_NOTE,
        }))
    }

    /// Deletes an asset and then, best effort, its sidecar.
    ///
    /// # Errors
    ///
    /// - [`FilesError::NotFound`] if the file does not exist
    /// - [`FilesError::InvalidAddress`] / [`FilesError::MissingIdentity`] for a bad address
    /// - [`FilesError::Io`] if the file cannot be removed
    pub fn delete(
        &self,
        tenant: &str,
        collection: &str,
        dir: &str,
        filename: &str,
    ) -> FilesResult<DeleteOutcome> {
        let address = AssetAddress::new(tenant, collection, dir)?;
        let name = FileName::parse(filename)?;
        let path = self.resolver.file_path(&address, &name);
        ensure_asset(&path, &name)?;

        fs::remove_file(&path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => FilesError::NotFound(format!("file '{}'", name)),
            _ => FilesError::io(format!("Failed to delete {}", path.display()), e),
        })?;
        tracing::info!("deleted {}", path.display());

        let sidecar = self.sidecars.delete(&address, &name);
        Ok(DeleteOutcome {
            address,
            filename: name.as_str().to_owned(),
            sidecar,
        })
    }
}

fn ensure_asset(path: &Path, name: &FileName) -> FilesResult<()> {
    if path.is_file() {
        Ok(())
    } else {
        Err(FilesError::NotFound(format!("file '{}'", name)))
    }
}

fn sniff(head: &[u8]) -> String {
    infer::get(head)
        .map(|kind| kind.mime_type())
        .unwrap_or(DEFAULT_MIME_TYPE)
        .to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upload::CommitRequest;
    use crate::ErrorKind;
    use tempfile::TempDir;

    const PNG_HEADER: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0x0D];

    fn setup() -> (TempDir, MediaStore) {
        let temp = TempDir::new().unwrap();
        let store = MediaStore::new(temp.path(), "/media");
        (temp, store)
    }

    fn read_all(mut asset: OpenedAsset) -> Vec<u8> {
        let mut bytes = Vec::new();
        asset.file.read_to_end(&mut bytes).unwrap();
        bytes
    }

    fn put_raw(store: &MediaStore, dir: &str, name: &str, bytes: &[u8]) {
        let address = AssetAddress::new("u1", "proj1", dir).unwrap();
        let folder = store.resolver().directory(&address);
        fs::create_dir_all(&folder).unwrap();
        fs::write(folder.join(name), bytes).unwrap();
    }

    #[test]
    fn uploaded_report_reads_back_with_sidecar_metadata() {
        let (_temp, store) = setup();
        let content = vec![7u8; 500_000];
        let outcome = store
            .uploads()
            .upload(
                &content[..],
                "report.pdf",
                CommitRequest::new("u1", "proj1")
                    .with_mime_type(Some("application/pdf".into()))
                    .with_declared_size(Some(500_000)),
            )
            .unwrap();

        let name = outcome.asset.filename.clone();
        assert!(name.ends_with(".pdf"));
        assert_eq!(outcome.asset.url, format!("/media/u1/proj1/{}", name));

        let asset = store.open("u1", "proj1", "", &name).unwrap();
        assert_eq!(asset.size, 500_000);
        assert_eq!(asset.mime_type, "application/pdf");
        assert_eq!(read_all(asset), content);

        let Metadata::Authoritative(meta) = store.metadata("u1", "proj1", "", &name).unwrap()
        else {
            panic!("expected sidecar metadata");
        };
        assert_eq!(meta.originalname, "report.pdf");
        assert_eq!(meta.size, 500_000);
        assert_eq!(meta.mimetype, "application/pdf");
    }

    #[test]
    fn open_without_sidecar_sniffs_content_type_and_rewinds() {
        let (_temp, store) = setup();
        put_raw(&store, "", "image.bin", PNG_HEADER);
        put_raw(&store, "", "plain.bin", b"just some words");

        let image = store.open("u1", "proj1", "", "image.bin").unwrap();
        assert_eq!(image.mime_type, "image/png");
        assert_eq!(read_all(image), PNG_HEADER);

        let plain = store.open("u1", "proj1", "", "plain.bin").unwrap();
        assert_eq!(plain.mime_type, DEFAULT_MIME_TYPE);
        assert_eq!(read_all(plain), b"just some words");
    }

    #[test]
    fn open_missing_is_not_found() {
        let (_temp, store) = setup();
        let err = store.open("u1", "proj1", "", "ghost.pdf").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn open_rejects_directory_as_file() {
        let (_temp, store) = setup();
        store.namespace().create_folder("u1", "proj1", "docs").unwrap();
        let err = store.open("u1", "proj1", "", "docs").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn metadata_falls_back_without_sidecar() {
        let (_temp, store) = setup();
        put_raw(&store, "sub", "bare.txt", b"12345");

        let meta = store.metadata("u1", "proj1", "sub", "bare.txt").unwrap();
        assert!(meta.is_fallback());
        let Metadata::Derived(derived) = meta else {
            panic!("expected derived metadata");
        };
        assert_eq!(derived.size, 5);
        assert_eq!(derived.note, FALLBACK_NOTE);
        assert_eq!(derived.dir, "sub");
        assert_eq!(derived.url, "/media/u1/proj1/bare.txt?dir=sub");
        assert!(derived.uploaded_at.is_some());
    }

    #[test]
    fn metadata_falls_back_on_corrupt_sidecar() {
        let (_temp, store) = setup();
        put_raw(&store, "", "a.txt", b"abc");
        put_raw(&store, "", "a.txt.meta.json", b"{broken");

        let meta = store.metadata("u1", "proj1", "", "a.txt").unwrap();
        assert!(meta.is_fallback());
    }

    #[test]
    fn orphan_sidecar_reads_as_not_found() {
        let (_temp, store) = setup();
        let outcome = store
            .uploads()
            .upload(&b"data"[..], "a.txt", CommitRequest::new("u1", "proj1"))
            .unwrap();
        let name = outcome.asset.filename;
        let path = store.resolver().resolve("u1", "proj1", "", &name).unwrap();
        fs::remove_file(path).unwrap();

        let err = store.metadata("u1", "proj1", "", &name).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn delete_removes_bytes_and_sidecar() {
        let (_temp, store) = setup();
        let outcome = store
            .uploads()
            .upload(&b"data"[..], "a.txt", CommitRequest::new("u1", "proj1"))
            .unwrap();
        let name = outcome.asset.filename;

        let deleted = store.delete("u1", "proj1", "", &name).unwrap();
        assert_eq!(deleted.filename, name);
        assert_eq!(deleted.sidecar, SidecarSync::Synced);

        let address = AssetAddress::new("u1", "proj1", "").unwrap();
        let file = FileName::parse(&name).unwrap();
        assert!(!store.resolver().file_path(&address, &file).exists());
        assert!(!store.resolver().sidecar_path(&address, &file).exists());

        let err = store.delete("u1", "proj1", "", &name).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn delete_without_sidecar_reports_absent() {
        let (_temp, store) = setup();
        put_raw(&store, "", "bare.txt", b"x");
        let deleted = store.delete("u1", "proj1", "", "bare.txt").unwrap();
        assert_eq!(deleted.sidecar, SidecarSync::Absent);
    }

    #[test]
    fn operations_reject_blank_identity() {
        let (_temp, store) = setup();
        let err = store.open("", "proj1", "", "a.txt").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingIdentity);
        let err = store.delete("u1", "", "", "a.txt").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingIdentity);
    }
}
