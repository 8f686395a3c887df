//! Moving and renaming assets together with their sidecars.
//!
//! Both operations are two-step: the bytes move first and gate the whole operation, then the
//! sidecar follows. A sidecar failure does not undo the byte move; it is logged and reported in
//! [`RelocationOutcome::sidecar`] so callers can observe the post-condition.
//!
//! Destination files are overwritten. Concurrent relocations of the same asset race at the
//! filesystem and the last rename wins.

use crate::paths::{AddressResolver, AssetAddress, FileName, Subdir};
use crate::sidecar::{SidecarStore, SidecarSync};
use crate::{FilesError, FilesResult};
use media_types::NonEmptyText;
use std::fs;
use std::path::Path;

/// Where an asset ended up and what happened to its sidecar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelocationOutcome {
    pub address: AssetAddress,
    pub filename: String,
    pub sidecar: SidecarSync,
}

#[derive(Debug, Clone)]
pub struct RelocationOps {
    resolver: AddressResolver,
    sidecars: SidecarStore,
}

impl RelocationOps {
    pub fn new(resolver: AddressResolver, sidecars: SidecarStore) -> Self {
        Self { resolver, sidecars }
    }

    /// Moves `filename` from `from_dir` to `to_dir` within a collection.
    ///
    /// The destination directory is created if needed, but only after the source has been
    /// found, so a failed move leaves no new directories behind.
    ///
    /// # Errors
    ///
    /// - [`FilesError::NotFound`] if the source file does not exist
    /// - [`FilesError::InvalidAddress`] / [`FilesError::MissingIdentity`] for a bad address
    /// - [`FilesError::Io`] if the destination cannot be created or the bytes cannot be moved
    pub fn move_asset(
        &self,
        tenant: &str,
        collection: &str,
        filename: &str,
        from_dir: &str,
        to_dir: &str,
    ) -> FilesResult<RelocationOutcome> {
        let from = AssetAddress::new(tenant, collection, from_dir)?;
        let to = from.with_subdir(Subdir::parse(to_dir)?);
        let name = FileName::parse(filename)?;

        let source = self.resolver.file_path(&from, &name);
        ensure_file(&source, &name)?;

        let dest_dir = self.resolver.directory(&to);
        fs::create_dir_all(&dest_dir).map_err(|e| {
            FilesError::io(format!("Failed to create directory {}", dest_dir.display()), e)
        })?;

        let dest = self.resolver.file_path(&to, &name);
        fs::rename(&source, &dest).map_err(|e| {
            FilesError::io(
                format!("Failed to move {} to {}", source.display(), dest.display()),
                e,
            )
        })?;
        tracing::info!("moved {} to {}", source.display(), dest.display());

        let sidecar = self.follow_sidecar(&from, &to, &name, &name, false);
        Ok(RelocationOutcome {
            address: to,
            filename: name.as_str().to_owned(),
            sidecar,
        })
    }

    /// Renames `filename` to `new_name` inside `dir`. `new_name` is trimmed of surrounding
    /// whitespace.
    ///
    /// # Errors
    ///
    /// - [`FilesError::MissingParameter`] if `new_name` is blank
    /// - [`FilesError::NotFound`] if the source file does not exist
    /// - [`FilesError::InvalidAddress`] / [`FilesError::MissingIdentity`] for a bad address or
    ///   new name
    /// - [`FilesError::Io`] if the bytes cannot be renamed
    pub fn rename_asset(
        &self,
        tenant: &str,
        collection: &str,
        filename: &str,
        dir: &str,
        new_name: &str,
    ) -> FilesResult<RelocationOutcome> {
        let new_name = NonEmptyText::new(new_name)
            .map_err(|_| FilesError::MissingParameter("newName is required".into()))?;
        let address = AssetAddress::new(tenant, collection, dir)?;
        let old = FileName::parse(filename)?;
        let new = FileName::parse(new_name.as_str())?;

        let source = self.resolver.file_path(&address, &old);
        ensure_file(&source, &old)?;

        let dest = self.resolver.file_path(&address, &new);
        fs::rename(&source, &dest).map_err(|e| {
            FilesError::io(
                format!("Failed to rename {} to {}", source.display(), dest.display()),
                e,
            )
        })?;
        tracing::info!("renamed {} to {}", source.display(), dest.display());

        let sidecar = self.follow_sidecar(&address, &address, &old, &new, true);
        Ok(RelocationOutcome {
            address,
            filename: new.as_str().to_owned(),
            sidecar,
        })
    }

    fn follow_sidecar(
        &self,
        from: &AssetAddress,
        to: &AssetAddress,
        old: &FileName,
        new: &FileName,
        renamed: bool,
    ) -> SidecarSync {
        match self.sidecars.relocate(from, to, old, new, renamed) {
            Ok(sync) => sync,
            Err(e) => {
                tracing::warn!("asset {} relocated but its sidecar was not: {}", new, e);
                SidecarSync::Failed(e.to_string())
            }
        }
    }
}

fn ensure_file(path: &Path, name: &FileName) -> FilesResult<()> {
    if path.is_file() {
        Ok(())
    } else {
        Err(FilesError::NotFound(format!("file '{}'", name)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::namespace::NamespaceOps;
    use crate::upload::{CommitRequest, UploadPipeline};
    use crate::ErrorKind;
    use tempfile::TempDir;

    struct Fixture {
        _temp: TempDir,
        resolver: AddressResolver,
        sidecars: SidecarStore,
        uploads: UploadPipeline,
        namespace: NamespaceOps,
        ops: RelocationOps,
    }

    fn setup() -> Fixture {
        let temp = TempDir::new().unwrap();
        let resolver = AddressResolver::new(temp.path(), "/media");
        let sidecars = SidecarStore::new(resolver.clone());
        Fixture {
            uploads: UploadPipeline::new(resolver.clone(), sidecars.clone()),
            namespace: NamespaceOps::new(resolver.clone()),
            ops: RelocationOps::new(resolver.clone(), sidecars.clone()),
            sidecars,
            resolver,
            _temp: temp,
        }
    }

    fn upload(f: &Fixture, subdir: &str, content: &[u8]) -> String {
        f.uploads
            .upload(
                content,
                "report.pdf",
                CommitRequest::new("u1", "proj1").with_subdir(subdir),
            )
            .unwrap()
            .asset
            .filename
    }

    #[test]
    fn move_carries_bytes_and_sidecar() {
        let f = setup();
        let name = upload(&f, "a", b"payload");

        let outcome = f.ops.move_asset("u1", "proj1", &name, "a", "b").unwrap();
        assert_eq!(outcome.sidecar, SidecarSync::Synced);
        assert_eq!(outcome.address.subdir().to_string(), "b");

        let moved = f.resolver.resolve("u1", "proj1", "b", &name).unwrap();
        assert_eq!(fs::read(moved).unwrap(), b"payload");
        assert!(!f.resolver.resolve("u1", "proj1", "a", &name).unwrap().exists());

        let to = AssetAddress::new("u1", "proj1", "b").unwrap();
        let meta = f.sidecars.read(&to, &FileName::parse(&name).unwrap()).unwrap();
        assert_eq!(meta.dir, "b");
        assert_eq!(meta.url, format!("/media/u1/proj1/{}?dir=b", name));
    }

    #[test]
    fn move_to_top_level_clears_dir() {
        let f = setup();
        let name = upload(&f, "a", b"payload");

        f.ops.move_asset("u1", "proj1", &name, "a", "").unwrap();

        let to = AssetAddress::new("u1", "proj1", "").unwrap();
        let meta = f.sidecars.read(&to, &FileName::parse(&name).unwrap()).unwrap();
        assert_eq!(meta.dir, "");
        assert_eq!(meta.url, format!("/media/u1/proj1/{}", name));
    }

    #[test]
    fn move_from_missing_directory_is_not_found_and_creates_nothing() {
        let f = setup();
        let err = f
            .ops
            .move_asset("u1", "proj1", "ghost.pdf", "nowhere", "dest")
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let listing = f.namespace.list_children("u1", "proj1", "dest").unwrap();
        assert!(listing.files.is_empty());
        assert!(listing.folders.is_empty());
        assert!(!f.resolver.root().join("u1/proj1/dest").exists());
    }

    #[test]
    fn move_without_sidecar_still_moves_bytes() {
        let f = setup();
        let address = AssetAddress::new("u1", "proj1", "").unwrap();
        fs::create_dir_all(f.resolver.directory(&address)).unwrap();
        fs::write(f.resolver.directory(&address).join("bare.bin"), b"raw").unwrap();

        let outcome = f.ops.move_asset("u1", "proj1", "bare.bin", "", "x").unwrap();
        assert_eq!(outcome.sidecar, SidecarSync::Absent);
        assert!(f.resolver.resolve("u1", "proj1", "x", "bare.bin").unwrap().is_file());
    }

    #[test]
    fn rename_round_trip() {
        let f = setup();
        let name = upload(&f, "", b"contents");

        let outcome = f
            .ops
            .rename_asset("u1", "proj1", &name, "", "final.pdf")
            .unwrap();
        assert_eq!(outcome.filename, "final.pdf");
        assert_eq!(outcome.sidecar, SidecarSync::Synced);

        let new_path = f.resolver.resolve("u1", "proj1", "", "final.pdf").unwrap();
        assert_eq!(fs::read(new_path).unwrap(), b"contents");
        assert!(!f.resolver.resolve("u1", "proj1", "", &name).unwrap().exists());

        let address = AssetAddress::new("u1", "proj1", "").unwrap();
        let meta = f
            .sidecars
            .read(&address, &FileName::parse("final.pdf").unwrap())
            .unwrap();
        assert_eq!(meta.filename, "final.pdf");
        assert_eq!(meta.originalname, "final.pdf");
        assert_eq!(meta.url, "/media/u1/proj1/final.pdf");
    }

    #[test]
    fn rename_requires_new_name() {
        let f = setup();
        let name = upload(&f, "", b"contents");
        let err = f.ops.rename_asset("u1", "proj1", &name, "", "  ").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingParameter);
        assert!(f.resolver.resolve("u1", "proj1", "", &name).unwrap().exists());
    }

    #[test]
    fn rename_rejects_traversal_and_sidecar_names() {
        let f = setup();
        let name = upload(&f, "", b"contents");
        for bad in ["../escape.pdf", "x.pdf.meta.json", ".."] {
            let err = f.ops.rename_asset("u1", "proj1", &name, "", bad).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidAddress, "accepted {}", bad);
        }
    }

    #[test]
    fn rename_missing_source_leaves_sidecars_alone() {
        let f = setup();
        let err = f
            .ops
            .rename_asset("u1", "proj1", "ghost.pdf", "", "new.pdf")
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(f.namespace.list_files("u1", "proj1").unwrap().is_empty());
    }

    #[test]
    fn sidecar_failure_does_not_fail_the_move() {
        let f = setup();
        let name = upload(&f, "a", b"payload");

        // Corrupt the sidecar so it cannot be rewritten.
        let from = AssetAddress::new("u1", "proj1", "a").unwrap();
        let file = FileName::parse(&name).unwrap();
        fs::write(f.resolver.sidecar_path(&from, &file), b"garbage").unwrap();

        let outcome = f.ops.move_asset("u1", "proj1", &name, "a", "b").unwrap();
        assert!(matches!(outcome.sidecar, SidecarSync::Failed(_)));
        assert!(!outcome.sidecar.is_consistent());
        assert!(f.resolver.resolve("u1", "proj1", "b", &name).unwrap().is_file());
    }

    fn put_bare(f: &Fixture, subdir: &str, name: &str, content: &[u8]) {
        let address = AssetAddress::new("u1", "proj1", subdir).unwrap();
        let folder = f.resolver.directory(&address);
        fs::create_dir_all(&folder).unwrap();
        fs::write(folder.join(name), content).unwrap();
    }

    #[test]
    fn rename_over_described_asset_drops_its_sidecar() {
        let f = setup();
        let existing = upload(&f, "", b"%PDF-1.4 twenty bytes");
        put_bare(&f, "", "bare.bin", b"xy");

        let outcome = f
            .ops
            .rename_asset("u1", "proj1", "bare.bin", "", &existing)
            .unwrap();
        assert_eq!(outcome.sidecar, SidecarSync::Absent);

        let path = f.resolver.resolve("u1", "proj1", "", &existing).unwrap();
        assert_eq!(fs::read(path).unwrap(), b"xy");
        let address = AssetAddress::new("u1", "proj1", "").unwrap();
        let err = f
            .sidecars
            .read(&address, &FileName::parse(&existing).unwrap())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn move_over_described_asset_drops_its_sidecar() {
        let f = setup();
        let existing = upload(&f, "b", b"%PDF-1.4 twenty bytes");
        put_bare(&f, "a", &existing, b"xy");

        let outcome = f.ops.move_asset("u1", "proj1", &existing, "a", "b").unwrap();
        assert_eq!(outcome.sidecar, SidecarSync::Absent);

        let path = f.resolver.resolve("u1", "proj1", "b", &existing).unwrap();
        assert_eq!(fs::read(path).unwrap(), b"xy");
        let to = AssetAddress::new("u1", "proj1", "b").unwrap();
        let err = f
            .sidecars
            .read(&to, &FileName::parse(&existing).unwrap())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn move_with_sidecar_replaces_destination_sidecar() {
        let f = setup();
        let name = upload(&f, "a", b"new");
        put_bare(&f, "b", &name, b"older and longer");
        let to = AssetAddress::new("u1", "proj1", "b").unwrap();
        let file = FileName::parse(&name).unwrap();
        fs::write(f.resolver.sidecar_path(&to, &file), b"{}").unwrap();

        let outcome = f.ops.move_asset("u1", "proj1", &name, "a", "b").unwrap();
        assert_eq!(outcome.sidecar, SidecarSync::Synced);
        let meta = f.sidecars.read(&to, &file).unwrap();
        assert_eq!(meta.size, 3);
        assert_eq!(meta.dir, "b");
    }

    #[test]
    fn rename_sidecar_failure_keeps_renamed_bytes() {
        let f = setup();
        let name = upload(&f, "", b"contents");
        let address = AssetAddress::new("u1", "proj1", "").unwrap();
        fs::write(
            f.resolver
                .sidecar_path(&address, &FileName::parse(&name).unwrap()),
            b"garbage",
        )
        .unwrap();

        let outcome = f
            .ops
            .rename_asset("u1", "proj1", &name, "", "final.pdf")
            .unwrap();
        assert!(matches!(outcome.sidecar, SidecarSync::Failed(_)));
        let renamed = f.resolver.resolve("u1", "proj1", "", "final.pdf").unwrap();
        assert_eq!(fs::read(renamed).unwrap(), b"contents");
        assert!(!f.resolver.resolve("u1", "proj1", "", &name).unwrap().exists());
    }
}
