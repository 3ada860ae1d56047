use super::domain::{
    FinancingApplication, Listing, ListingId, ListingStatus, Profile, UserId,
};

/// Listing table abstraction so services can be exercised in isolation.
pub trait ListingRepository: Send + Sync {
    fn insert(&self, listing: Listing) -> Result<Listing, RepositoryError>;
    fn fetch(&self, id: &ListingId) -> Result<Option<Listing>, RepositoryError>;
    /// Listings with `status`, newest first.
    fn by_status(&self, status: ListingStatus) -> Result<Vec<Listing>, RepositoryError>;
    /// Listings owned by `owner` in every status, newest first.
    fn by_owner(&self, owner: &UserId) -> Result<Vec<Listing>, RepositoryError>;
    /// Compare-and-set on the status column. Fails with `StatusMismatch` when the stored
    /// status differs from `expected`.
    fn update_status(
        &self,
        id: &ListingId,
        expected: ListingStatus,
        next: ListingStatus,
    ) -> Result<Listing, RepositoryError>;
}

/// Profile table keyed by user identifier.
pub trait ProfileRepository: Send + Sync {
    fn fetch(&self, id: &UserId) -> Result<Option<Profile>, RepositoryError>;
    fn upsert(&self, profile: Profile) -> Result<Profile, RepositoryError>;
}

/// Insert-only financing application table.
pub trait FinancingRepository: Send + Sync {
    fn insert(
        &self,
        application: FinancingApplication,
    ) -> Result<FinancingApplication, RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("status changed concurrently (stored {found})")]
    StatusMismatch { found: ListingStatus },
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}
