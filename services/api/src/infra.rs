use autolist::config::AppConfig;
use autolist::marketplace::{
    BlobError, BlobStore, DiskBlobStore, InMemoryBlobStore, InMemoryFinancingStore,
    InMemoryListingStore, InMemoryProfileStore, Marketplace,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Photo backend selected from configuration.
pub(crate) enum PhotoStore {
    Memory(InMemoryBlobStore),
    Disk(DiskBlobStore),
}

impl PhotoStore {
    pub(crate) fn from_config(config: &AppConfig) -> Result<Self, BlobError> {
        let base_url = config.public_base_url();
        match &config.storage.directory {
            Some(directory) => Ok(Self::Disk(DiskBlobStore::new(directory, base_url)?)),
            None => Ok(Self::Memory(InMemoryBlobStore::new(base_url))),
        }
    }

    pub(crate) fn describe(&self) -> &'static str {
        match self {
            PhotoStore::Memory(_) => "memory",
            PhotoStore::Disk(_) => "disk",
        }
    }
}

impl BlobStore for PhotoStore {
    fn put(&self, path: &str, bytes: &[u8]) -> Result<(), BlobError> {
        match self {
            PhotoStore::Memory(store) => store.put(path, bytes),
            PhotoStore::Disk(store) => store.put(path, bytes),
        }
    }

    fn get(&self, path: &str) -> Result<Option<Vec<u8>>, BlobError> {
        match self {
            PhotoStore::Memory(store) => store.get(path),
            PhotoStore::Disk(store) => store.get(path),
        }
    }

    fn delete(&self, path: &str) -> Result<(), BlobError> {
        match self {
            PhotoStore::Memory(store) => store.delete(path),
            PhotoStore::Disk(store) => store.delete(path),
        }
    }

    fn public_url(&self, path: &str) -> String {
        match self {
            PhotoStore::Memory(store) => store.public_url(path),
            PhotoStore::Disk(store) => store.public_url(path),
        }
    }
}

pub(crate) type ServiceMarketplace =
    Marketplace<InMemoryListingStore, InMemoryProfileStore, InMemoryFinancingStore, PhotoStore>;

pub(crate) fn build_marketplace(
    photos: PhotoStore,
    upload_limit: usize,
) -> Arc<ServiceMarketplace> {
    Arc::new(
        Marketplace::new(
            Arc::new(InMemoryListingStore::default()),
            Arc::new(InMemoryProfileStore::default()),
            Arc::new(InMemoryFinancingStore::default()),
            Arc::new(photos),
        )
        .with_upload_limit(upload_limit),
    )
}
