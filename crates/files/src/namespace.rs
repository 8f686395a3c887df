//! Namespace directory operations: collections, folders, listings and search.
//!
//! Namespace nodes are created lazily. Listing a node that was never created gives an empty
//! result rather than an error.

use crate::paths::{is_sidecar_name, AddressResolver, AssetAddress, Subdir};
use crate::{FilesError, FilesResult};
use std::fs;
use std::io;
use std::path::Path;

/// Immediate children of a directory, split into folders and files.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct DirectoryListing {
    pub folders: Vec<String>,
    pub files: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct NamespaceOps {
    resolver: AddressResolver,
}

impl NamespaceOps {
    pub fn new(resolver: AddressResolver) -> Self {
        Self { resolver }
    }

    /// Lists the folders and files directly under `subdir`. Sidecars are never listed.
    ///
    /// # Errors
    ///
    /// - [`FilesError::InvalidAddress`] / [`FilesError::MissingIdentity`] for a bad address
    /// - [`FilesError::Io`] if the directory exists but cannot be read
    pub fn list_children(
        &self,
        tenant: &str,
        collection: &str,
        subdir: &str,
    ) -> FilesResult<DirectoryListing> {
        let address = AssetAddress::new(tenant, collection, subdir)?;
        read_children(&self.resolver.directory(&address))
    }

    /// File names at the collection's top level.
    ///
    /// # Errors
    ///
    /// Same as [`Self::list_children`].
    pub fn list_files(&self, tenant: &str, collection: &str) -> FilesResult<Vec<String>> {
        Ok(self.list_children(tenant, collection, "")?.files)
    }

    /// Case-insensitive substring search over the file names in one directory.
    ///
    /// An empty query matches every file.
    ///
    /// # Errors
    ///
    /// Same as [`Self::list_children`].
    pub fn search(
        &self,
        tenant: &str,
        collection: &str,
        subdir: &str,
        query: &str,
    ) -> FilesResult<Vec<String>> {
        let needle = query.to_lowercase();
        let listing = self.list_children(tenant, collection, subdir)?;
        Ok(listing
            .files
            .into_iter()
            .filter(|name| name.to_lowercase().contains(&needle))
            .collect())
    }

    /// Creates `relative_path` (and any missing parents) inside a collection.
    ///
    /// Creating a folder that already exists succeeds.
    ///
    /// # Errors
    ///
    /// - [`FilesError::MissingParameter`] if `relative_path` names no folder
    /// - [`FilesError::InvalidAddress`] / [`FilesError::MissingIdentity`] for a bad address
    /// - [`FilesError::Io`] if creation fails
    pub fn create_folder(
        &self,
        tenant: &str,
        collection: &str,
        relative_path: &str,
    ) -> FilesResult<()> {
        let address = folder_address(tenant, collection, relative_path)?;
        let dir = self.resolver.directory(&address);
        fs::create_dir_all(&dir).map_err(|e| {
            FilesError::io(format!("Failed to create folder {}", dir.display()), e)
        })?;
        tracing::debug!("created folder {}", dir.display());
        Ok(())
    }

    /// Recursively deletes a folder inside a collection.
    ///
    /// # Errors
    ///
    /// - [`FilesError::MissingParameter`] if `relative_path` names no folder
    /// - [`FilesError::NotFound`] if the folder does not exist
    /// - [`FilesError::InvalidAddress`] / [`FilesError::MissingIdentity`] for a bad address
    /// - [`FilesError::Io`] if removal fails
    pub fn delete_folder(
        &self,
        tenant: &str,
        collection: &str,
        relative_path: &str,
    ) -> FilesResult<()> {
        let address = folder_address(tenant, collection, relative_path)?;
        let dir = self.resolver.directory(&address);
        if !dir.is_dir() {
            return Err(FilesError::NotFound(format!(
                "folder '{}'",
                address.subdir()
            )));
        }
        fs::remove_dir_all(&dir).map_err(|e| {
            FilesError::io(format!("Failed to delete folder {}", dir.display()), e)
        })?;
        tracing::info!("deleted folder {}", dir.display());
        Ok(())
    }

    /// Names of the tenant's collections.
    ///
    /// # Errors
    ///
    /// - [`FilesError::InvalidAddress`] / [`FilesError::MissingIdentity`] for a bad tenant
    /// - [`FilesError::Io`] if the tenant directory exists but cannot be read
    pub fn list_collections(&self, tenant: &str) -> FilesResult<Vec<String>> {
        let dir = self.resolver.tenant_dir(tenant)?;
        Ok(read_children(&dir)?.folders)
    }

    /// Creates a collection; creating an existing collection succeeds.
    ///
    /// # Errors
    ///
    /// - [`FilesError::InvalidAddress`] / [`FilesError::MissingIdentity`] for a bad address
    /// - [`FilesError::Io`] if creation fails
    pub fn create_collection(&self, tenant: &str, collection: &str) -> FilesResult<()> {
        let address = AssetAddress::new(tenant, collection, "")?;
        let dir = self.resolver.collection_dir(&address);
        fs::create_dir_all(&dir).map_err(|e| {
            FilesError::io(format!("Failed to create collection {}", dir.display()), e)
        })
    }
}

fn folder_address(tenant: &str, collection: &str, relative_path: &str) -> FilesResult<AssetAddress> {
    let subdir = Subdir::parse(relative_path)?;
    if subdir.is_root() {
        return Err(FilesError::MissingParameter("path is required".into()));
    }
    Ok(AssetAddress::new(tenant, collection, "")?.with_subdir(subdir))
}

fn read_children(dir: &Path) -> FilesResult<DirectoryListing> {
    if !dir.is_dir() {
        return Ok(DirectoryListing::default());
    }
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(DirectoryListing::default()),
        Err(e) => return Err(FilesError::io(format!("Failed to list {}", dir.display()), e)),
    };

    let mut listing = DirectoryListing::default();
    for entry in entries {
        let entry =
            entry.map_err(|e| FilesError::io(format!("Failed to list {}", dir.display()), e))?;
        let Ok(name) = entry.file_name().into_string() else {
            tracing::warn!("skipping non UTF-8 entry in {}", dir.display());
            continue;
        };
        let Ok(file_type) = entry.file_type() else {
            continue;
        };
        if file_type.is_dir() {
            listing.folders.push(name);
        } else if file_type.is_file() && !is_sidecar_name(&name) {
            listing.files.push(name);
        }
    }
    listing.folders.sort();
    listing.files.sort();
    Ok(listing)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;
    use tempfile::TempDir;

    fn setup() -> (TempDir, AddressResolver, NamespaceOps) {
        let temp = TempDir::new().unwrap();
        let resolver = AddressResolver::new(temp.path(), "/media");
        let ops = NamespaceOps::new(resolver.clone());
        (temp, resolver, ops)
    }

    fn touch(resolver: &AddressResolver, subdir: &str, name: &str) {
        let address = AssetAddress::new("u1", "proj1", subdir).unwrap();
        let dir = resolver.directory(&address);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(name), b"x").unwrap();
    }

    #[test]
    fn listing_missing_directory_is_empty() {
        let (_temp, _resolver, ops) = setup();
        let listing = ops.list_children("u1", "proj1", "never/created").unwrap();
        assert_eq!(listing, DirectoryListing::default());
    }

    #[test]
    fn listing_splits_folders_and_files_and_hides_sidecars() {
        let (_temp, resolver, ops) = setup();
        touch(&resolver, "", "b.png");
        touch(&resolver, "", "a.pdf");
        touch(&resolver, "", "a.pdf.meta.json");
        touch(&resolver, "docs", "inner.txt");

        let listing = ops.list_children("u1", "proj1", "").unwrap();
        assert_eq!(listing.folders, vec!["docs"]);
        assert_eq!(listing.files, vec!["a.pdf", "b.png"]);
    }

    #[test]
    fn listing_rejects_traversal() {
        let (_temp, _resolver, ops) = setup();
        let err = ops.list_children("u1", "proj1", "../..").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidAddress);
    }

    #[test]
    fn search_is_case_insensitive_and_skips_sidecars() {
        let (_temp, resolver, ops) = setup();
        touch(&resolver, "", "Report-2024.PDF");
        touch(&resolver, "", "Report-2024.PDF.meta.json");
        touch(&resolver, "", "photo.png");

        assert_eq!(
            ops.search("u1", "proj1", "", "report").unwrap(),
            vec!["Report-2024.PDF"]
        );
        assert!(ops.search("u1", "proj1", "", "meta").unwrap().is_empty());
        assert_eq!(ops.search("u1", "proj1", "", "").unwrap().len(), 2);
        assert!(ops.search("u1", "nothing", "", "x").unwrap().is_empty());
    }

    #[test]
    fn create_folder_is_idempotent() {
        let (_temp, _resolver, ops) = setup();
        ops.create_folder("u1", "proj1", "a/b").unwrap();
        ops.create_folder("u1", "proj1", "a/b").unwrap();

        assert_eq!(ops.list_children("u1", "proj1", "").unwrap().folders, vec!["a"]);
        assert_eq!(ops.list_children("u1", "proj1", "a").unwrap().folders, vec!["b"]);
    }

    #[test]
    fn create_folder_requires_a_path() {
        let (_temp, _resolver, ops) = setup();
        let err = ops.create_folder("u1", "proj1", "/").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingParameter);
    }

    #[test]
    fn delete_folder_missing_is_not_found() {
        let (_temp, _resolver, ops) = setup();
        let err = ops.delete_folder("u1", "proj1", "ghost").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn delete_folder_removes_descendants() {
        let (_temp, resolver, ops) = setup();
        touch(&resolver, "a/b", "deep.txt");
        touch(&resolver, "a", "shallow.txt");

        ops.delete_folder("u1", "proj1", "a").unwrap();

        let listing = ops.list_children("u1", "proj1", "").unwrap();
        assert!(listing.folders.is_empty());
        assert!(ops.list_children("u1", "proj1", "a/b").unwrap().files.is_empty());
    }

    #[test]
    fn delete_folder_does_not_accept_files() {
        let (_temp, resolver, ops) = setup();
        touch(&resolver, "", "file.txt");
        let err = ops.delete_folder("u1", "proj1", "file.txt").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn collections_are_listed_per_tenant() {
        let (_temp, _resolver, ops) = setup();
        assert!(ops.list_collections("u1").unwrap().is_empty());

        ops.create_collection("u1", "proj2").unwrap();
        ops.create_collection("u1", "proj1").unwrap();
        ops.create_collection("u1", "proj1").unwrap();
        ops.create_collection("u2", "other").unwrap();

        assert_eq!(ops.list_collections("u1").unwrap(), vec!["proj1", "proj2"]);
        assert_eq!(ops.list_collections("u2").unwrap(), vec!["other"]);
    }

    #[test]
    fn list_files_returns_top_level_names() {
        let (_temp, resolver, ops) = setup();
        touch(&resolver, "", "a.txt");
        touch(&resolver, "sub", "b.txt");
        assert_eq!(ops.list_files("u1", "proj1").unwrap(), vec!["a.txt"]);
    }
}
