use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use chrono::{Datelike, Utc};
use tracing::{error, info};

use super::domain::{Listing, ListingDraft, ListingId, ListingStatus, PhotoUpload, UserId};
use super::repository::{ListingRepository, RepositoryError};
use super::storage::{BlobError, BlobStore, StagedPhotos};

/// Earliest model year accepted for a listing.
const FIRST_MODEL_YEAR: i32 = 1886;

/// Seller facing listing intake with staged photo uploads.
pub struct SubmissionService<L, B> {
    listings: Arc<L>,
    blobs: Arc<B>,
    in_flight: Mutex<HashSet<UserId>>,
}

/// Created listing plus the seller's refreshed listing set.
#[derive(Debug, Clone, serde::Serialize)]
pub struct SubmissionReceipt {
    pub listing: Listing,
    pub listings: Vec<Listing>,
}

struct InFlightGuard<'a> {
    owners: &'a Mutex<HashSet<UserId>>,
    owner: UserId,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        let mut owners = match self.owners.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        owners.remove(&self.owner);
    }
}

impl<L, B> SubmissionService<L, B>
where
    L: ListingRepository + 'static,
    B: BlobStore + 'static,
{
    pub fn new(listings: Arc<L>, blobs: Arc<B>) -> Self {
        Self {
            listings,
            blobs,
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    /// Upload the photos, then store the listing as pending. Uploaded photos are removed
    /// again when either step fails.
    pub fn submit(
        &self,
        owner: &UserId,
        draft: ListingDraft,
        photos: Vec<PhotoUpload>,
    ) -> Result<Listing, SubmissionError> {
        validate_draft(&draft)?;
        let _guard = self.claim(owner)?;

        let mut staged = StagedPhotos::new(self.blobs.as_ref());
        if let Err(err) = staged.stage_all(owner, &photos) {
            error!(owner = %owner, staged = staged.paths().len(), error = %err, "photo upload failed");
            staged.abort();
            return Err(SubmissionError::Upload(err));
        }

        let listing = Listing {
            id: ListingId::generate(),
            make: draft.make.trim().to_string(),
            model: draft.model.trim().to_string(),
            year: draft.year,
            mileage: draft.mileage,
            description: draft.description,
            photos: staged.urls().to_vec(),
            status: ListingStatus::Pending,
            created_at: Utc::now(),
            owner: owner.clone(),
        };

        match self.listings.insert(listing) {
            Ok(stored) => {
                staged.commit();
                info!(listing_id = %stored.id, owner = %owner, photos = stored.photos.len(), "listing submitted");
                Ok(stored)
            }
            Err(err) => {
                error!(owner = %owner, error = %err, "listing insert failed, removing uploaded photos");
                staged.abort();
                Err(err.into())
            }
        }
    }

    /// Submit and return the seller's listing set as it stands afterwards.
    pub fn submit_and_refresh(
        &self,
        owner: &UserId,
        draft: ListingDraft,
        photos: Vec<PhotoUpload>,
    ) -> Result<SubmissionReceipt, SubmissionError> {
        let listing = self.submit(owner, draft, photos)?;
        let listings = self.listings_for_owner(owner)?;
        Ok(SubmissionReceipt { listing, listings })
    }

    /// The owner's listings in every status, newest first.
    pub fn listings_for_owner(&self, owner: &UserId) -> Result<Vec<Listing>, SubmissionError> {
        Ok(self.listings.by_owner(owner)?)
    }

    fn claim(&self, owner: &UserId) -> Result<InFlightGuard<'_>, SubmissionError> {
        let mut owners = self
            .in_flight
            .lock()
            .map_err(|_| RepositoryError::Unavailable("submission guard poisoned".to_string()))?;
        if !owners.insert(owner.clone()) {
            return Err(SubmissionError::SubmissionInFlight(owner.clone()));
        }
        Ok(InFlightGuard {
            owners: &self.in_flight,
            owner: owner.clone(),
        })
    }
}

fn validate_draft(draft: &ListingDraft) -> Result<(), SubmissionError> {
    if draft.make.trim().is_empty() {
        return Err(SubmissionError::Invalid("make is required".to_string()));
    }
    if draft.model.trim().is_empty() {
        return Err(SubmissionError::Invalid("model is required".to_string()));
    }

    let latest = Utc::now().year() + 1;
    if !(FIRST_MODEL_YEAR..=latest).contains(&draft.year) {
        return Err(SubmissionError::Invalid(format!(
            "year must be between {FIRST_MODEL_YEAR} and {latest}"
        )));
    }
    Ok(())
}

/// Error raised by the submission service.
#[derive(Debug, thiserror::Error)]
pub enum SubmissionError {
    #[error("invalid listing: {0}")]
    Invalid(String),
    #[error("a submission for {0} is already in progress")]
    SubmissionInFlight(UserId),
    #[error("photo upload failed: {0}")]
    Upload(#[source] BlobError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}
