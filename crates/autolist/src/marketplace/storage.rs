//! Photo storage and the staged upload protocol used by listing submission.
//!
//! Photos are written one at a time under `{user}/{random}.{ext}`. Every object written
//! for an attempt is remembered by [`StagedPhotos`]; unless the attempt is committed, the
//! objects are removed again so an aborted submission leaves nothing behind.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex};

use tracing::warn;
use uuid::Uuid;

use super::domain::{PhotoUpload, UserId};

/// Bucket name photos are published under.
pub const PHOTO_BUCKET: &str = "vehicle-photos";

/// Blob store capable of holding listing photos and resolving their public URL.
pub trait BlobStore: Send + Sync {
    fn put(&self, path: &str, bytes: &[u8]) -> Result<(), BlobError>;
    fn get(&self, path: &str) -> Result<Option<Vec<u8>>, BlobError>;
    fn delete(&self, path: &str) -> Result<(), BlobError>;
    fn public_url(&self, path: &str) -> String;
}

/// Blob store error.
#[derive(Debug, thiserror::Error)]
pub enum BlobError {
    #[error("invalid object path '{0}'")]
    InvalidPath(String),
    #[error("upload of '{path}' failed: {reason}")]
    Upload { path: String, reason: String },
    #[error("blob store io error: {0}")]
    Io(#[from] io::Error),
    #[error("blob store unavailable: {0}")]
    Unavailable(String),
}

/// Builds the storage path for one photo: `{user}/{uuid}.{ext}`.
pub fn photo_path(owner: &UserId, photo: &PhotoUpload) -> String {
    format!("{}/{}.{}", owner.0, Uuid::new_v4(), photo.extension())
}

/// Rejects paths that could escape the bucket root.
pub(crate) fn validate_path(path: &str) -> Result<(), BlobError> {
    let candidate = Path::new(path);
    let safe = !path.is_empty()
        && candidate
            .components()
            .all(|component| matches!(component, Component::Normal(_)));
    if safe {
        Ok(())
    } else {
        Err(BlobError::InvalidPath(path.to_string()))
    }
}

fn bucket_url(base_url: &str, path: &str) -> String {
    format!("{}/{}/{}", base_url.trim_end_matches('/'), PHOTO_BUCKET, path)
}

/// Tracks photos written during one submission attempt.
pub struct StagedPhotos<'a, B: BlobStore + ?Sized> {
    store: &'a B,
    paths: Vec<String>,
    urls: Vec<String>,
    committed: bool,
}

impl<'a, B: BlobStore + ?Sized> StagedPhotos<'a, B> {
    pub fn new(store: &'a B) -> Self {
        Self {
            store,
            paths: Vec::new(),
            urls: Vec::new(),
            committed: false,
        }
    }

    /// Upload photos sequentially, stopping at the first failure.
    ///
    /// A path is tracked before its upload starts: a failed `put` may still have left a
    /// partial object, and cleanup deletes it like any other staged path.
    pub fn stage_all(&mut self, owner: &UserId, photos: &[PhotoUpload]) -> Result<(), BlobError> {
        for photo in photos {
            let path = photo_path(owner, photo);
            self.paths.push(path.clone());
            self.store.put(&path, &photo.bytes)?;
            self.urls.push(self.store.public_url(&path));
        }
        Ok(())
    }

    /// Public URLs of the staged photos, in upload order.
    pub fn urls(&self) -> &[String] {
        &self.urls
    }

    /// Every path an upload was started for, including one that failed part way.
    pub fn paths(&self) -> &[String] {
        &self.paths
    }

    /// Keep the staged objects; they are now referenced by a stored listing.
    pub fn commit(mut self) -> Vec<String> {
        self.committed = true;
        std::mem::take(&mut self.urls)
    }

    /// Remove every staged object. Failures are logged and skipped.
    pub fn abort(mut self) {
        self.cleanup();
    }

    fn cleanup(&mut self) {
        for path in self.paths.drain(..) {
            if let Err(error) = self.store.delete(&path) {
                warn!(%path, %error, "failed to remove staged photo");
            }
        }
        self.urls.clear();
    }
}

impl<B: BlobStore + ?Sized> Drop for StagedPhotos<'_, B> {
    fn drop(&mut self) {
        if !self.committed {
            self.cleanup();
        }
    }
}

/// Process-local blob store.
#[derive(Default, Clone)]
pub struct InMemoryBlobStore {
    base_url: String,
    objects: Arc<Mutex<HashMap<String, Vec<u8>>>>,
}

impl InMemoryBlobStore {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            objects: Arc::default(),
        }
    }

    pub fn paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = match self.objects.lock() {
            Ok(guard) => guard.keys().cloned().collect(),
            Err(_) => Vec::new(),
        };
        paths.sort();
        paths
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, Vec<u8>>>, BlobError> {
        self.objects
            .lock()
            .map_err(|_| BlobError::Unavailable("blob mutex poisoned".to_string()))
    }
}

impl BlobStore for InMemoryBlobStore {
    fn put(&self, path: &str, bytes: &[u8]) -> Result<(), BlobError> {
        validate_path(path)?;
        self.lock()?.insert(path.to_string(), bytes.to_vec());
        Ok(())
    }

    fn get(&self, path: &str) -> Result<Option<Vec<u8>>, BlobError> {
        validate_path(path)?;
        Ok(self.lock()?.get(path).cloned())
    }

    fn delete(&self, path: &str) -> Result<(), BlobError> {
        validate_path(path)?;
        self.lock()?.remove(path);
        Ok(())
    }

    fn public_url(&self, path: &str) -> String {
        bucket_url(&self.base_url, path)
    }
}

/// Blob store writing photos below a directory on local disk.
#[derive(Debug, Clone)]
pub struct DiskBlobStore {
    root: PathBuf,
    base_url: String,
}

impl DiskBlobStore {
    pub fn new(root: impl Into<PathBuf>, base_url: impl Into<String>) -> Result<Self, BlobError> {
        let root = root.into().join(PHOTO_BUCKET);
        fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            base_url: base_url.into(),
        })
    }

    fn resolve(&self, path: &str) -> Result<PathBuf, BlobError> {
        validate_path(path)?;
        Ok(self.root.join(path))
    }
}

impl BlobStore for DiskBlobStore {
    fn put(&self, path: &str, bytes: &[u8]) -> Result<(), BlobError> {
        let target = self.resolve(path)?;
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&target, bytes).map_err(|err| BlobError::Upload {
            path: path.to_string(),
            reason: err.to_string(),
        })
    }

    fn get(&self, path: &str) -> Result<Option<Vec<u8>>, BlobError> {
        let target = self.resolve(path)?;
        match fs::read(target) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn delete(&self, path: &str) -> Result<(), BlobError> {
        let target = self.resolve(path)?;
        match fs::remove_file(target) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    fn public_url(&self, path: &str) -> String {
        bucket_url(&self.base_url, path)
    }
}
