//! Async access to the asset store.
//!
//! Storage operations are blocking filesystem work. [`MediaService`] runs each one on tokio's
//! blocking pool so request handlers never stall the async workers.

use crate::config::CoreConfig;
use crate::{CoreError, CoreResult};
use media_files::{
    CommitOutcome, CommitRequest, DeleteOutcome, DirectoryListing, FilesResult, MediaStore,
    Metadata, OpenedAsset, RelocationOutcome, StagedUpload,
};
use std::sync::Arc;
use std::time::Duration;

/// Shared handle to the asset store; cheap to clone.
#[derive(Clone, Debug)]
pub struct MediaService {
    store: Arc<MediaStore>,
}

impl MediaService {
    pub fn new(cfg: &CoreConfig) -> Self {
        Self::from_store(MediaStore::new(cfg.storage_dir(), cfg.url_prefix()))
    }

    pub fn from_store(store: MediaStore) -> Self {
        Self {
            store: Arc::new(store),
        }
    }

    pub fn store(&self) -> &MediaStore {
        &self.store
    }

    async fn run<T, F>(&self, op: F) -> CoreResult<T>
    where
        F: FnOnce(&MediaStore) -> FilesResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let store = Arc::clone(&self.store);
        let result = tokio::task::spawn_blocking(move || op(&store)).await?;
        Ok(result?)
    }

    /// Opens a staged upload that chunks can be streamed into.
    ///
    /// # Errors
    ///
    /// Returns an error if the staging area cannot be prepared.
    pub async fn begin_upload(&self, original_name: &str) -> CoreResult<UploadSession> {
        let name = original_name.to_owned();
        let staged = self.run(move |store| store.uploads().stage(&name)).await?;
        Ok(UploadSession {
            store: Arc::clone(&self.store),
            staged: Some(staged),
        })
    }

    /// Uploads an in-memory body in one step.
    ///
    /// # Errors
    ///
    /// Same as [`media_files::UploadPipeline::upload`].
    pub async fn upload_bytes(
        &self,
        bytes: Vec<u8>,
        original_name: &str,
        request: CommitRequest,
    ) -> CoreResult<CommitOutcome> {
        let name = original_name.to_owned();
        self.run(move |store| store.uploads().upload(bytes.as_slice(), &name, request))
            .await
    }

    /// Opens an asset; the caller streams its bytes from the returned file.
    pub async fn open(
        &self,
        tenant: &str,
        collection: &str,
        dir: &str,
        filename: &str,
    ) -> CoreResult<OpenedAsset> {
        let (t, c, d, f) = owned(tenant, collection, dir, filename);
        self.run(move |store| store.open(&t, &c, &d, &f)).await
    }

    pub async fn metadata(
        &self,
        tenant: &str,
        collection: &str,
        dir: &str,
        filename: &str,
    ) -> CoreResult<Metadata> {
        let (t, c, d, f) = owned(tenant, collection, dir, filename);
        self.run(move |store| store.metadata(&t, &c, &d, &f)).await
    }

    pub async fn delete(
        &self,
        tenant: &str,
        collection: &str,
        dir: &str,
        filename: &str,
    ) -> CoreResult<DeleteOutcome> {
        let (t, c, d, f) = owned(tenant, collection, dir, filename);
        self.run(move |store| store.delete(&t, &c, &d, &f)).await
    }

    pub async fn list_children(
        &self,
        tenant: &str,
        collection: &str,
        dir: &str,
    ) -> CoreResult<DirectoryListing> {
        let (t, c, d, _) = owned(tenant, collection, dir, "");
        self.run(move |store| store.namespace().list_children(&t, &c, &d))
            .await
    }

    pub async fn list_files(&self, tenant: &str, collection: &str) -> CoreResult<Vec<String>> {
        let (t, c, _, _) = owned(tenant, collection, "", "");
        self.run(move |store| store.namespace().list_files(&t, &c))
            .await
    }

    pub async fn search(
        &self,
        tenant: &str,
        collection: &str,
        dir: &str,
        query: &str,
    ) -> CoreResult<Vec<String>> {
        let (t, c, d, q) = owned(tenant, collection, dir, query);
        self.run(move |store| store.namespace().search(&t, &c, &d, &q))
            .await
    }

    pub async fn create_folder(&self, tenant: &str, collection: &str, path: &str) -> CoreResult<()> {
        let (t, c, p, _) = owned(tenant, collection, path, "");
        self.run(move |store| store.namespace().create_folder(&t, &c, &p))
            .await
    }

    pub async fn delete_folder(&self, tenant: &str, collection: &str, path: &str) -> CoreResult<()> {
        let (t, c, p, _) = owned(tenant, collection, path, "");
        self.run(move |store| store.namespace().delete_folder(&t, &c, &p))
            .await
    }

    pub async fn list_collections(&self, tenant: &str) -> CoreResult<Vec<String>> {
        let tenant = tenant.to_owned();
        self.run(move |store| store.namespace().list_collections(&tenant))
            .await
    }

    pub async fn create_collection(&self, tenant: &str, collection: &str) -> CoreResult<()> {
        let (t, c, _, _) = owned(tenant, collection, "", "");
        self.run(move |store| store.namespace().create_collection(&t, &c))
            .await
    }

    pub async fn move_asset(
        &self,
        tenant: &str,
        collection: &str,
        filename: &str,
        from_dir: &str,
        to_dir: &str,
    ) -> CoreResult<RelocationOutcome> {
        let (t, c, f, from) = owned(tenant, collection, filename, from_dir);
        let to = to_dir.to_owned();
        self.run(move |store| store.relocation().move_asset(&t, &c, &f, &from, &to))
            .await
    }

    pub async fn rename_asset(
        &self,
        tenant: &str,
        collection: &str,
        filename: &str,
        dir: &str,
        new_name: &str,
    ) -> CoreResult<RelocationOutcome> {
        let (t, c, f, d) = owned(tenant, collection, filename, dir);
        let new_name = new_name.to_owned();
        self.run(move |store| store.relocation().rename_asset(&t, &c, &f, &d, &new_name))
            .await
    }

    /// Removes abandoned staged uploads; returns how many were removed.
    pub async fn purge_staging(&self, max_age: Duration) -> CoreResult<usize> {
        self.run(move |store| store.uploads().purge_stale(max_age))
            .await
    }
}

fn owned(a: &str, b: &str, c: &str, d: &str) -> (String, String, String, String) {
    (a.to_owned(), b.to_owned(), c.to_owned(), d.to_owned())
}

/// An upload being received in chunks.
///
/// Dropping the session without committing removes the staged file.
#[derive(Debug)]
pub struct UploadSession {
    store: Arc<MediaStore>,
    staged: Option<StagedUpload>,
}

impl UploadSession {
    /// Bytes received so far.
    pub fn size(&self) -> u64 {
        self.staged.as_ref().map_or(0, StagedUpload::size)
    }

    /// Appends a chunk to the staged file.
    ///
    /// A failed write discards the staged file and closes the session.
    ///
    /// # Errors
    ///
    /// - [`CoreError::SessionClosed`] if an earlier write failed
    /// - [`CoreError::Files`] if the chunk cannot be written
    pub async fn write<B>(&mut self, chunk: B) -> CoreResult<()>
    where
        B: AsRef<[u8]> + Send + 'static,
    {
        let mut staged = self.staged.take().ok_or(CoreError::SessionClosed)?;
        let (staged, result) = tokio::task::spawn_blocking(move || {
            let result = staged.write_chunk(chunk.as_ref());
            (staged, result)
        })
        .await?;

        match result {
            Ok(()) => {
                self.staged = Some(staged);
                Ok(())
            }
            Err(e) => {
                staged.discard();
                Err(e.into())
            }
        }
    }

    /// Commits the received bytes into the addressed location.
    ///
    /// # Errors
    ///
    /// - [`CoreError::SessionClosed`] if an earlier write failed
    /// - [`CoreError::Files`] for an invalid address or a failed rename
    pub async fn commit(mut self, request: CommitRequest) -> CoreResult<CommitOutcome> {
        let staged = self.staged.take().ok_or(CoreError::SessionClosed)?;
        let store = Arc::clone(&self.store);
        let outcome =
            tokio::task::spawn_blocking(move || store.uploads().commit(staged, request)).await?;
        Ok(outcome?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use media_files::{ErrorKind, SidecarSync};
    use tempfile::TempDir;

    fn service() -> (TempDir, MediaService) {
        let temp = TempDir::new().unwrap();
        let cfg = CoreConfig::new(temp.path().to_path_buf(), "/media").unwrap();
        (temp, MediaService::new(&cfg))
    }

    fn staging_is_empty(temp: &TempDir) -> bool {
        std::fs::read_dir(temp.path().join(media_files::STAGING_DIR_NAME))
            .map(|mut it| it.next().is_none())
            .unwrap_or(true)
    }

    #[tokio::test]
    async fn streamed_upload_commits_all_chunks() {
        let (temp, svc) = service();
        let mut session = svc.begin_upload("notes.txt").await.unwrap();
        session.write(b"hello ".to_vec()).await.unwrap();
        session.write(&b"world"[..]).await.unwrap();
        assert_eq!(session.size(), 11);

        let outcome = session
            .commit(CommitRequest::new("u1", "proj1").with_subdir("docs"))
            .await
            .unwrap();
        assert_eq!(outcome.sidecar, SidecarSync::Synced);
        assert_eq!(outcome.asset.size, 11);
        assert!(staging_is_empty(&temp));

        let mut asset = svc
            .open("u1", "proj1", "docs", &outcome.asset.filename)
            .await
            .unwrap();
        assert_eq!(asset.size, 11);
        let mut bytes = Vec::new();
        std::io::Read::read_to_end(&mut asset.file, &mut bytes).unwrap();
        assert_eq!(bytes, b"hello world");
    }

    #[tokio::test]
    async fn dropped_session_leaves_nothing_behind() {
        let (temp, svc) = service();
        let mut session = svc.begin_upload("big.bin").await.unwrap();
        session.write(vec![0u8; 1024]).await.unwrap();
        drop(session);

        assert!(staging_is_empty(&temp));
        assert!(svc.list_files("u1", "proj1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn commit_with_missing_identity_discards_upload() {
        let (temp, svc) = service();
        let mut session = svc.begin_upload("a.txt").await.unwrap();
        session.write(b"x".to_vec()).await.unwrap();

        let err = session
            .commit(CommitRequest::new("", "proj1"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingIdentity);
        assert!(staging_is_empty(&temp));
    }

    #[tokio::test]
    async fn namespace_and_relocation_round_trip() {
        let (_temp, svc) = service();
        let outcome = svc
            .upload_bytes(
                b"data".to_vec(),
                "a.txt",
                CommitRequest::new("u1", "proj1").with_subdir("a"),
            )
            .await
            .unwrap();
        let name = outcome.asset.filename;

        svc.create_folder("u1", "proj1", "b").await.unwrap();
        let moved = svc.move_asset("u1", "proj1", &name, "a", "b").await.unwrap();
        assert_eq!(moved.sidecar, SidecarSync::Synced);

        let renamed = svc
            .rename_asset("u1", "proj1", &name, "b", "final.txt")
            .await
            .unwrap();
        assert_eq!(renamed.filename, "final.txt");

        let listing = svc.list_children("u1", "proj1", "b").await.unwrap();
        assert_eq!(listing.files, vec!["final.txt"]);
        assert_eq!(
            svc.search("u1", "proj1", "b", "FINAL").await.unwrap(),
            vec!["final.txt"]
        );

        let meta = svc.metadata("u1", "proj1", "b", "final.txt").await.unwrap();
        assert!(!meta.is_fallback());
        assert_eq!(meta.url(), "/media/u1/proj1/final.txt?dir=b");

        let deleted = svc.delete("u1", "proj1", "b", "final.txt").await.unwrap();
        assert_eq!(deleted.sidecar, SidecarSync::Synced);

        svc.delete_folder("u1", "proj1", "a").await.unwrap();
        svc.delete_folder("u1", "proj1", "b").await.unwrap();
        assert_eq!(
            svc.list_children("u1", "proj1", "").await.unwrap(),
            DirectoryListing::default()
        );
    }

    #[tokio::test]
    async fn storage_errors_keep_their_kind() {
        let (_temp, svc) = service();
        let err = svc.open("u1", "proj1", "", "ghost.pdf").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let err = svc.list_children("u1", "proj1", "../x").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidAddress);
    }

    #[tokio::test]
    async fn collections_are_created_and_listed() {
        let (_temp, svc) = service();
        svc.create_collection("u1", "proj1").await.unwrap();
        assert_eq!(svc.list_collections("u1").await.unwrap(), vec!["proj1"]);
        assert_eq!(svc.purge_staging(Duration::ZERO).await.unwrap(), 0);
    }
}
