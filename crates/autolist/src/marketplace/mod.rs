//! Vehicle listing marketplace: seller intake, administrator moderation, the public
//! catalog, and buyer financing applications.
//!
//! Services are generic over the storage traits in [`repository`] and [`storage`] so the
//! HTTP layer can run against the in-memory adapters or any other backend.

pub mod catalog;
pub mod domain;
pub mod financing;
pub mod memory;
pub mod moderation;
pub mod profiles;
pub mod repository;
pub mod router;
pub mod storage;
pub mod submission;

#[cfg(test)]
mod tests;

pub use catalog::{CatalogError, CatalogService};
pub use domain::{
    ApplicationId, ContactScope, FinancingApplication, FinancingSubmission, Listing,
    ListingDraft, ListingId, ListingStatus, ListingWithOwner, ModerationDecision, OwnerContact,
    PhotoUpload, Profile, ProfileUpdate, UnknownStatus, UserId,
};
pub use financing::{FinancingError, FinancingService};
pub use memory::{InMemoryFinancingStore, InMemoryListingStore, InMemoryProfileStore};
pub use moderation::{ModerationError, ModerationOutcome, ModerationService};
pub use profiles::{ProfileError, ProfileService};
pub use repository::{FinancingRepository, ListingRepository, ProfileRepository, RepositoryError};
pub use router::{
    marketplace_router, ApiJson, ApiQuery, Marketplace, USER_ID_HEADER, USER_ROLE_HEADER,
};
pub use storage::{BlobError, BlobStore, DiskBlobStore, InMemoryBlobStore, StagedPhotos, PHOTO_BUCKET};
pub use submission::{SubmissionError, SubmissionReceipt, SubmissionService};
