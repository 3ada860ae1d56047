use super::common::*;
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;

use crate::marketplace::domain::{ListingStatus, ModerationDecision, PhotoUpload, UserId};
use crate::marketplace::memory::InMemoryListingStore;
use crate::marketplace::repository::{ListingRepository, RepositoryError};
use crate::marketplace::storage::{BlobError, BlobStore, InMemoryBlobStore};
use crate::marketplace::submission::{SubmissionError, SubmissionService};

#[test]
fn submit_without_photos_creates_pending_listing() {
    let fx = fixture();
    let listing = fx
        .marketplace
        .submissions
        .submit(&seller(), corolla(), Vec::new())
        .expect("submission succeeds");

    assert_eq!(listing.status, ListingStatus::Pending);
    assert!(listing.photos.is_empty());
    assert_eq!(listing.owner, seller());
    assert_eq!(listing.make, "Toyota");
    assert_eq!(listing.model, "Corolla");
    assert_eq!(listing.year, 2022);
    assert_eq!(listing.mileage, 15000);
    assert_eq!(listing.description, "clean title");
    assert_eq!(fx.listings.len(), 1);
}

#[test]
fn photos_are_uploaded_in_order_under_owner_prefix() {
    let fx = fixture();
    let listing = fx
        .marketplace
        .submissions
        .submit(
            &seller(),
            corolla(),
            vec![photo("front.JPG"), photo("rear.png"), photo("noext")],
        )
        .expect("submission succeeds");

    assert_eq!(listing.photos.len(), 3);
    let prefix = format!("{BASE_URL}/vehicle-photos/seller-1/");
    assert!(listing.photos.iter().all(|url| url.starts_with(&prefix)));
    assert!(listing.photos[0].ends_with(".jpg"));
    assert!(listing.photos[1].ends_with(".png"));
    assert!(listing.photos[2].ends_with(".bin"));

    let stored = fx.blobs.paths();
    assert_eq!(stored.len(), 3);
    for url in &listing.photos {
        let path = url
            .strip_prefix(&format!("{BASE_URL}/vehicle-photos/"))
            .expect("url under bucket");
        assert!(fx.blobs.get(path).expect("read succeeds").is_some());
    }
}

#[test]
fn failed_second_upload_creates_no_listing_and_leaves_no_orphans() {
    let listings = Arc::new(InMemoryListingStore::default());
    let blobs = Arc::new(FlakyBlobStore::failing_on(2));
    let service = SubmissionService::new(listings.clone(), blobs.clone());

    let result = service.submit(
        &seller(),
        corolla(),
        vec![photo("one.jpg"), photo("two.jpg"), photo("three.jpg")],
    );

    assert!(matches!(
        result,
        Err(SubmissionError::Upload(BlobError::Upload { .. }))
    ));
    assert_eq!(blobs.attempts(), 2, "third upload is never attempted");
    assert!(blobs.inner.paths().is_empty(), "first upload is removed");
    assert!(listings.is_empty());
    assert!(listings
        .by_owner(&seller())
        .expect("read succeeds")
        .is_empty());
}

#[test]
fn partially_written_upload_is_removed_on_failure() {
    let listings = Arc::new(InMemoryListingStore::default());
    let blobs = Arc::new(FlakyBlobStore::tearing_on(2));
    let service = SubmissionService::new(listings.clone(), blobs.clone());

    let result = service.submit(
        &seller(),
        corolla(),
        vec![photo("one.jpg"), photo("two.jpg")],
    );

    assert!(matches!(
        result,
        Err(SubmissionError::Upload(BlobError::Upload { .. }))
    ));
    assert_eq!(blobs.attempts(), 2);
    assert!(
        blobs.inner.paths().is_empty(),
        "torn second upload is deleted along with the first"
    );
    assert!(listings.is_empty());
}

#[test]
fn failed_insert_removes_uploaded_photos() {
    let listings = Arc::new(InsertFailingListings::default());
    let blobs = Arc::new(InMemoryBlobStore::new(BASE_URL));
    let service = SubmissionService::new(listings, blobs.clone());

    let result = service.submit(
        &seller(),
        corolla(),
        vec![photo("one.jpg"), photo("two.jpg")],
    );

    assert!(matches!(
        result,
        Err(SubmissionError::Repository(RepositoryError::Unavailable(_)))
    ));
    assert!(blobs.paths().is_empty());
}

#[test]
fn caller_supplied_status_is_ignored() {
    let draft: crate::marketplace::domain::ListingDraft = serde_json::from_value(serde_json::json!({
        "make": "Toyota",
        "model": "Corolla",
        "year": 2022,
        "mileage": 15000,
        "status": "approved"
    }))
    .expect("draft parses");

    let fx = fixture();
    let listing = fx
        .marketplace
        .submissions
        .submit(&seller(), draft, Vec::new())
        .expect("submission succeeds");
    assert_eq!(listing.status, ListingStatus::Pending);
    assert_eq!(listing.description, "");
}

#[test]
fn invalid_drafts_are_rejected_before_upload() {
    let listings = Arc::new(InMemoryListingStore::default());
    let blobs = Arc::new(FlakyBlobStore::failing_on(usize::MAX));
    let service = SubmissionService::new(listings.clone(), blobs.clone());

    let mut blank_make = corolla();
    blank_make.make = "   ".to_string();
    let mut ancient = corolla();
    ancient.year = 1700;

    for draft in [blank_make, ancient] {
        assert!(matches!(
            service.submit(&seller(), draft, vec![photo("front.jpg")]),
            Err(SubmissionError::Invalid(_))
        ));
    }
    assert_eq!(blobs.attempts(), 0);
    assert!(listings.is_empty());
}

#[test]
fn listings_for_owner_returns_every_status_newest_first() {
    let fx = fixture();
    let owner = seller();
    let other = UserId("seller-2".to_string());
    let old = stored_listing(&fx.listings, &owner, ListingStatus::Approved, 0);
    let new = stored_listing(&fx.listings, &owner, ListingStatus::Rejected, 45);
    stored_listing(&fx.listings, &other, ListingStatus::Pending, 20);

    let mine = fx
        .marketplace
        .submissions
        .listings_for_owner(&owner)
        .expect("listings load");
    let ids: Vec<_> = mine.iter().map(|listing| listing.id).collect();
    assert_eq!(ids, vec![new.id, old.id]);
}

#[test]
fn submit_and_refresh_includes_new_listing() {
    let fx = fixture();
    stored_listing(&fx.listings, &seller(), ListingStatus::Approved, 0);

    let receipt = fx
        .marketplace
        .submissions
        .submit_and_refresh(&seller(), corolla(), Vec::new())
        .expect("submission succeeds");

    assert_eq!(receipt.listings.len(), 2);
    assert_eq!(receipt.listings[0].id, receipt.listing.id);
}

#[test]
fn corolla_scenario_reaches_public_catalog() {
    let fx = fixture();
    let listing = fx
        .marketplace
        .submissions
        .submit(&seller(), corolla(), Vec::new())
        .expect("submission succeeds");
    assert_eq!(listing.status, ListingStatus::Pending);
    assert!(listing.photos.is_empty());

    fx.marketplace
        .moderation
        .transition(&listing.id, ModerationDecision::Approve)
        .expect("approval succeeds");

    let catalog = fx.marketplace.catalog.approved().expect("catalog loads");
    assert!(catalog
        .iter()
        .any(|entry| entry.listing.make == "Toyota" && entry.listing.model == "Corolla"));
}

/// Blob store that parks the first upload until the test releases it.
struct GatedBlobStore {
    inner: InMemoryBlobStore,
    entered: Mutex<Option<mpsc::Sender<()>>>,
    release: Mutex<mpsc::Receiver<()>>,
}

impl BlobStore for GatedBlobStore {
    fn put(&self, path: &str, bytes: &[u8]) -> Result<(), BlobError> {
        if let Some(entered) = self.entered.lock().expect("gate mutex").take() {
            entered.send(()).expect("test listening");
            self.release
                .lock()
                .expect("gate mutex")
                .recv()
                .expect("test releases upload");
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

#[test]
fn concurrent_submission_by_same_owner_is_refused() {
    let (entered_tx, entered_rx) = mpsc::channel();
    let (release_tx, release_rx) = mpsc::channel();
    let blobs = Arc::new(GatedBlobStore {
        inner: InMemoryBlobStore::new(BASE_URL),
        entered: Mutex::new(Some(entered_tx)),
        release: Mutex::new(release_rx),
    });
    let listings = Arc::new(InMemoryListingStore::default());
    let service = Arc::new(SubmissionService::new(listings.clone(), blobs));

    let background = {
        let service = service.clone();
        thread::spawn(move || {
            service.submit(
                &seller(),
                corolla(),
                vec![PhotoUpload::new("front.jpg", vec![1, 2, 3])],
            )
        })
    };

    entered_rx.recv().expect("first upload started");
    match service.submit(&seller(), corolla(), Vec::new()) {
        Err(SubmissionError::SubmissionInFlight(owner)) => assert_eq!(owner, seller()),
        other => panic!("expected in-flight refusal, got {other:?}"),
    }

    let other_seller = UserId("seller-2".to_string());
    service
        .submit(&other_seller, corolla(), Vec::new())
        .expect("other owners are not blocked");

    release_tx.send(()).expect("background waiting");
    background
        .join()
        .expect("background thread")
        .expect("first submission completes");

    service
        .submit(&seller(), corolla(), Vec::new())
        .expect("guard released after completion");
    assert_eq!(listings.len(), 3);
}
