use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::response::Response;
use chrono::{Duration, TimeZone, Utc};
use serde_json::Value;

use crate::marketplace::domain::{
    Listing, ListingDraft, ListingId, ListingStatus, PhotoUpload, Profile, UserId,
};
use crate::marketplace::memory::{
    InMemoryFinancingStore, InMemoryListingStore, InMemoryProfileStore,
};
use crate::marketplace::repository::{ListingRepository, ProfileRepository, RepositoryError};
use crate::marketplace::router::Marketplace;
use crate::marketplace::storage::{BlobError, BlobStore, InMemoryBlobStore};

pub(super) const BASE_URL: &str = "https://cdn.autolist.test/storage";

pub(super) type MemoryMarketplace = Marketplace<
    InMemoryListingStore,
    InMemoryProfileStore,
    InMemoryFinancingStore,
    InMemoryBlobStore,
>;

pub(super) struct Fixture {
    pub(super) marketplace: Arc<MemoryMarketplace>,
    pub(super) listings: Arc<InMemoryListingStore>,
    pub(super) profiles: Arc<InMemoryProfileStore>,
    pub(super) applications: Arc<InMemoryFinancingStore>,
    pub(super) blobs: Arc<InMemoryBlobStore>,
}

pub(super) fn fixture() -> Fixture {
    let listings = Arc::new(InMemoryListingStore::default());
    let profiles = Arc::new(InMemoryProfileStore::default());
    let applications = Arc::new(InMemoryFinancingStore::default());
    let blobs = Arc::new(InMemoryBlobStore::new(BASE_URL));
    let marketplace = Arc::new(Marketplace::new(
        listings.clone(),
        profiles.clone(),
        applications.clone(),
        blobs.clone(),
    ));
    Fixture {
        marketplace,
        listings,
        profiles,
        applications,
        blobs,
    }
}

pub(super) fn seller() -> UserId {
    UserId("seller-1".to_string())
}

pub(super) fn buyer() -> UserId {
    UserId("buyer-1".to_string())
}

pub(super) fn corolla() -> ListingDraft {
    ListingDraft {
        make: "Toyota".to_string(),
        model: "Corolla".to_string(),
        year: 2022,
        mileage: 15000,
        description: "clean title".to_string(),
    }
}

pub(super) fn photo(name: &str) -> PhotoUpload {
    PhotoUpload::new(name, name.as_bytes().to_vec())
}

pub(super) fn seller_profile(id: &UserId) -> Profile {
    Profile {
        id: id.clone(),
        username: "autos_del_norte".to_string(),
        phone_number: Some("+52 81 5555 0101".to_string()),
        address: Some("Av. Constitucion 100, Monterrey".to_string()),
        company_name: Some("Autos del Norte".to_string()),
        bio: Some("Family dealership since 1998".to_string()),
    }
}

pub(super) fn seed_profile(profiles: &InMemoryProfileStore, id: &UserId) {
    profiles
        .upsert(seller_profile(id))
        .expect("profile seeds");
}

/// Listing stored directly with a fixed creation time, `minutes` after a shared epoch.
pub(super) fn stored_listing(
    listings: &InMemoryListingStore,
    owner: &UserId,
    status: ListingStatus,
    minutes: i64,
) -> Listing {
    let epoch = Utc
        .with_ymd_and_hms(2025, 3, 1, 9, 0, 0)
        .single()
        .expect("valid timestamp");
    let listing = Listing {
        id: ListingId::generate(),
        make: "Honda".to_string(),
        model: format!("Civic {minutes}"),
        year: 2021,
        mileage: 32000,
        description: String::new(),
        photos: Vec::new(),
        status,
        created_at: epoch + Duration::minutes(minutes),
        owner: owner.clone(),
    };
    listings.insert(listing).expect("listing stores")
}

/// Blob store that fails the `fail_on`-th upload (1-based) and records every attempt.
#[derive(Default)]
pub(super) struct FlakyBlobStore {
    pub(super) inner: InMemoryBlobStore,
    pub(super) fail_on: usize,
    /// Keep the first half of the failing upload, as a disk filling up mid-write would.
    pub(super) leaves_partial: bool,
    pub(super) attempts: AtomicUsize,
}

impl FlakyBlobStore {
    pub(super) fn failing_on(fail_on: usize) -> Self {
        Self {
            inner: InMemoryBlobStore::new(BASE_URL),
            fail_on,
            leaves_partial: false,
            attempts: AtomicUsize::new(0),
        }
    }

    pub(super) fn tearing_on(fail_on: usize) -> Self {
        Self {
            leaves_partial: true,
            ..Self::failing_on(fail_on)
        }
    }

    pub(super) fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl BlobStore for FlakyBlobStore {
    fn put(&self, path: &str, bytes: &[u8]) -> Result<(), BlobError> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        if attempt == self.fail_on {
            if self.leaves_partial {
                self.inner.put(path, &bytes[..bytes.len() / 2])?;
            }
            return Err(BlobError::Upload {
                path: path.to_string(),
                reason: "connection reset".to_string(),
            });
        }
        self.inner.put(path, bytes)
    }

    fn get(&self, path: &str) -> Result<Option<Vec<u8>>, BlobError> {
        self.inner.get(path)
    }

    fn delete(&self, path: &str) -> Result<(), BlobError> {
        self.inner.delete(path)
    }

    fn public_url(&self, path: &str) -> String {
        self.inner.public_url(path)
    }
}

/// Listing store whose inserts always fail while reads behave normally.
#[derive(Default)]
pub(super) struct InsertFailingListings {
    pub(super) inner: InMemoryListingStore,
}

impl ListingRepository for InsertFailingListings {
    fn insert(&self, _listing: Listing) -> Result<Listing, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn fetch(&self, id: &ListingId) -> Result<Option<Listing>, RepositoryError> {
        self.inner.fetch(id)
    }

    fn by_status(&self, status: ListingStatus) -> Result<Vec<Listing>, RepositoryError> {
        self.inner.by_status(status)
    }

    fn by_owner(&self, owner: &UserId) -> Result<Vec<Listing>, RepositoryError> {
        self.inner.by_owner(owner)
    }

    fn update_status(
        &self,
        id: &ListingId,
        expected: ListingStatus,
        next: ListingStatus,
    ) -> Result<Listing, RepositoryError> {
        self.inner.update_status(id, expected, next)
    }
}

pub(super) struct UnavailableListings;

impl ListingRepository for UnavailableListings {
    fn insert(&self, _listing: Listing) -> Result<Listing, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn fetch(&self, _id: &ListingId) -> Result<Option<Listing>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn by_status(&self, _status: ListingStatus) -> Result<Vec<Listing>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn by_owner(&self, _owner: &UserId) -> Result<Vec<Listing>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn update_status(
        &self,
        _id: &ListingId,
        _expected: ListingStatus,
        _next: ListingStatus,
    ) -> Result<Listing, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
