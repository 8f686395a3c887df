//! Address validation and resolution.
//!
//! Maps logical addresses `(tenant, collection, subdir, name)` onto physical paths beneath the
//! storage root. Everything here is pure: no function in this module touches the filesystem.
//!
//! A [`Segment`] is a single path component that cannot contain separators, cannot be `.` or
//! `..`, and cannot carry control characters. Because every component of a resolved path is a
//! validated segment, a resolved path is always lexically beneath the storage root.

use crate::constants::{MAX_SEGMENT_LEN, SIDECAR_SUFFIX, STAGING_DIR_NAME};
use crate::{FilesError, FilesResult};
use media_types::NonEmptyText;
use std::fmt;
use std::path::{Path, PathBuf};

/// A single validated path component.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Segment(String);

impl Segment {
    /// Validates `value` as a path component.
    ///
    /// `what` names the field in error messages (for example `"tenantId"`).
    ///
    /// # Errors
    ///
    /// Returns [`FilesError::InvalidAddress`] for empty values, `.`/`..`, separators, NUL or
    /// other control characters, and values longer than 255 bytes.
    pub fn parse(what: &str, value: &str) -> FilesResult<Self> {
        if value.is_empty() {
            return Err(FilesError::InvalidAddress(format!("{} cannot be empty", what)));
        }
        if value == "." || value == ".." {
            return Err(FilesError::InvalidAddress(format!(
                "{} cannot be a relative directory reference: '{}'",
                what, value
            )));
        }
        if value.len() > MAX_SEGMENT_LEN {
            return Err(FilesError::InvalidAddress(format!(
                "{} exceeds maximum length of {} bytes",
                what, MAX_SEGMENT_LEN
            )));
        }
        if value
            .chars()
            .any(|c| c == '/' || c == '\\' || c.is_control())
        {
            return Err(FilesError::InvalidAddress(format!(
                "{} contains a path separator or control character: '{}'",
                what,
                value.escape_default()
            )));
        }
        Ok(Self(value.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A validated asset filename.
///
/// On top of the [`Segment`] rules, a filename may not carry the sidecar suffix: such a file
/// would be hidden from listings and confused with metadata.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FileName(Segment);

impl FileName {
    /// # Errors
    ///
    /// Returns [`FilesError::InvalidAddress`] if the name is not a valid segment or ends with the
    /// sidecar suffix.
    pub fn parse(value: &str) -> FilesResult<Self> {
        let segment = Segment::parse("filename", value)?;
        if is_sidecar_name(value) {
            return Err(FilesError::InvalidAddress(format!(
                "filename cannot end with '{}': '{}'",
                SIDECAR_SUFFIX, value
            )));
        }
        Ok(Self(segment))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Name of the sidecar that describes this file.
    pub fn sidecar_name(&self) -> String {
        format!("{}{}", self.as_str(), SIDECAR_SUFFIX)
    }
}

impl fmt::Display for FileName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returns true if `name` is a metadata sidecar filename.
pub fn is_sidecar_name(name: &str) -> bool {
    name.ends_with(SIDECAR_SUFFIX)
}

/// A relative directory inside a collection; empty means the collection's top level.
///
/// Parsed from slash-separated text. Leading, trailing and repeated slashes are ignored, so
/// `"/a//b/"` and `"a/b"` denote the same directory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Subdir(Vec<Segment>);

impl Subdir {
    /// The collection's top level.
    pub fn root() -> Self {
        Self::default()
    }

    /// # Errors
    ///
    /// Returns [`FilesError::InvalidAddress`] if any component is not a valid segment.
    pub fn parse(value: &str) -> FilesResult<Self> {
        value
            .split(['/', '\\'])
            .filter(|part| !part.is_empty())
            .map(|part| Segment::parse("directory", part))
            .collect::<FilesResult<Vec<_>>>()
            .map(Self)
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    fn join_onto(&self, base: &Path) -> PathBuf {
        self.0
            .iter()
            .fold(base.to_path_buf(), |path, seg| path.join(seg.as_str()))
    }
}

impl fmt::Display for Subdir {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for seg in &self.0 {
            if !first {
                f.write_str("/")?;
            }
            f.write_str(seg.as_str())?;
            first = false;
        }
        Ok(())
    }
}

/// The `(tenant, collection, subdir)` part of an asset's address.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AssetAddress {
    tenant: Segment,
    collection: Segment,
    subdir: Subdir,
}

impl AssetAddress {
    /// Validates and builds an address.
    ///
    /// Surrounding whitespace is trimmed from the tenant and collection.
    ///
    /// # Errors
    ///
    /// - [`FilesError::MissingIdentity`] if the tenant or collection is blank
    /// - [`FilesError::InvalidAddress`] if any component fails validation, or the tenant is the
    ///   reserved staging namespace
    pub fn new(tenant: &str, collection: &str, subdir: &str) -> FilesResult<Self> {
        let tenant = tenant_segment(tenant)?;
        let collection = identity_segment("collectionId", collection)?;
        let subdir = Subdir::parse(subdir)?;

        Ok(Self {
            tenant,
            collection,
            subdir,
        })
    }

    pub fn tenant(&self) -> &str {
        self.tenant.as_str()
    }

    pub fn collection(&self) -> &str {
        self.collection.as_str()
    }

    pub fn subdir(&self) -> &Subdir {
        &self.subdir
    }

    /// Same tenant and collection, different directory.
    pub fn with_subdir(&self, subdir: Subdir) -> Self {
        Self {
            tenant: self.tenant.clone(),
            collection: self.collection.clone(),
            subdir,
        }
    }
}

fn identity_segment(what: &str, value: &str) -> FilesResult<Segment> {
    let text = NonEmptyText::new(value)
        .map_err(|_| FilesError::MissingIdentity(format!("{} is required", what)))?;
    Segment::parse(what, text.as_str())
}

fn tenant_segment(tenant: &str) -> FilesResult<Segment> {
    let segment = identity_segment("tenantId", tenant)?;
    if segment.as_str() == STAGING_DIR_NAME {
        return Err(FilesError::InvalidAddress(format!(
            "tenantId '{}' is reserved",
            STAGING_DIR_NAME
        )));
    }
    Ok(segment)
}

/// Resolves validated addresses to paths under a storage root, and derives download URLs.
#[derive(Debug, Clone)]
pub struct AddressResolver {
    root: PathBuf,
    url_prefix: String,
}

impl AddressResolver {
    /// `url_prefix` is the mount point of the HTTP routes (for example `/media`); a trailing
    /// slash is dropped.
    pub fn new(root: impl Into<PathBuf>, url_prefix: impl Into<String>) -> Self {
        let url_prefix = url_prefix.into().trim_end_matches('/').to_owned();
        Self {
            root: root.into(),
            url_prefix,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Shared staging area for in-flight uploads.
    pub fn staging_dir(&self) -> PathBuf {
        self.root.join(STAGING_DIR_NAME)
    }

    /// Directory holding all collections of a tenant.
    ///
    /// # Errors
    ///
    /// Same as the tenant rules of [`AssetAddress::new`].
    pub fn tenant_dir(&self, tenant: &str) -> FilesResult<PathBuf> {
        Ok(self.root.join(tenant_segment(tenant)?.as_str()))
    }

    /// Top-level directory of the address's collection, ignoring its subdir.
    pub fn collection_dir(&self, address: &AssetAddress) -> PathBuf {
        self.root.join(address.tenant()).join(address.collection())
    }

    /// Directory the address points at, including its subdir.
    pub fn directory(&self, address: &AssetAddress) -> PathBuf {
        address.subdir.join_onto(&self.collection_dir(address))
    }

    pub fn file_path(&self, address: &AssetAddress, name: &FileName) -> PathBuf {
        self.directory(address).join(name.as_str())
    }

    pub fn sidecar_path(&self, address: &AssetAddress, name: &FileName) -> PathBuf {
        self.directory(address).join(name.sidecar_name())
    }

    /// Validates a full logical address and returns the physical path of the named file.
    ///
    /// # Errors
    ///
    /// Returns [`FilesError::InvalidAddress`] or [`FilesError::MissingIdentity`] when any part
    /// of the address fails validation.
    pub fn resolve(
        &self,
        tenant: &str,
        collection: &str,
        subdir: &str,
        name: &str,
    ) -> FilesResult<PathBuf> {
        let address = AssetAddress::new(tenant, collection, subdir)?;
        let name = FileName::parse(name)?;
        Ok(self.file_path(&address, &name))
    }

    /// Public URL of a stored file.
    ///
    /// Files outside the collection's top level carry their directory as a `dir` query
    /// parameter, matching how the read routes address them.
    pub fn download_url(&self, address: &AssetAddress, name: &FileName) -> String {
        let mut url = format!(
            "{}/{}/{}/{}",
            self.url_prefix,
            urlencoding::encode(address.tenant()),
            urlencoding::encode(address.collection()),
            urlencoding::encode(name.as_str())
        );
        if !address.subdir().is_root() {
            url.push_str("?dir=");
            url.push_str(&urlencoding::encode(&address.subdir().to_string()));
        }
        url
    }
}
