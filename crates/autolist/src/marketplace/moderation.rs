use std::sync::Arc;

use tracing::{error, info, warn};

use super::catalog::join_owners;
use super::domain::{
    ContactScope, Listing, ListingId, ListingStatus, ListingWithOwner, ModerationDecision,
};
use super::repository::{ListingRepository, ProfileRepository, RepositoryError};

/// Administrator review queue: filtered listing views plus approve/reject.
pub struct ModerationService<L, P> {
    listings: Arc<L>,
    profiles: Arc<P>,
}

/// Result of a decision together with the refreshed queue for the active filter.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ModerationOutcome {
    pub listing: Listing,
    pub filter: ListingStatus,
    pub listings: Vec<ListingWithOwner>,
}

impl<L, P> ModerationService<L, P>
where
    L: ListingRepository + 'static,
    P: ProfileRepository + 'static,
{
    pub fn new(listings: Arc<L>, profiles: Arc<P>) -> Self {
        Self { listings, profiles }
    }

    /// Every listing in `status`, newest first, joined with owner contact details.
    pub fn list_by_status(
        &self,
        status: ListingStatus,
    ) -> Result<Vec<ListingWithOwner>, ModerationError> {
        let listings = self.listings.by_status(status).map_err(|err| {
            error!(%status, error = %err, "failed to load moderation queue");
            err
        })?;
        let joined = join_owners(self.profiles.as_ref(), listings, ContactScope::Moderation)?;
        Ok(joined)
    }

    /// Apply `decision` to a pending listing.
    pub fn transition(
        &self,
        id: &ListingId,
        decision: ModerationDecision,
    ) -> Result<Listing, ModerationError> {
        let current = self
            .listings
            .fetch(id)?
            .ok_or(ModerationError::NotFound(*id))?;

        let target = decision.target();
        let Some(next) = current.status.apply(decision) else {
            warn!(listing_id = %id, from = %current.status, to = %target, "rejected moderation transition");
            return Err(ModerationError::InvalidTransition {
                from: current.status,
                to: target,
            });
        };

        let updated = match self.listings.update_status(id, current.status, next) {
            Ok(listing) => listing,
            Err(RepositoryError::StatusMismatch { found }) => {
                warn!(listing_id = %id, from = %found, to = %target, "listing decided concurrently");
                return Err(ModerationError::InvalidTransition {
                    from: found,
                    to: target,
                });
            }
            Err(RepositoryError::NotFound) => return Err(ModerationError::NotFound(*id)),
            Err(other) => return Err(other.into()),
        };

        info!(listing_id = %id, status = %updated.status, "listing moderated");
        Ok(updated)
    }

    /// Apply `decision` and reload the queue for `filter`. Nothing is reloaded on failure.
    pub fn transition_and_refresh(
        &self,
        id: &ListingId,
        decision: ModerationDecision,
        filter: ListingStatus,
    ) -> Result<ModerationOutcome, ModerationError> {
        let listing = self.transition(id, decision)?;
        let listings = self.list_by_status(filter)?;
        Ok(ModerationOutcome {
            listing,
            filter,
            listings,
        })
    }
}

/// Error raised by the moderation service.
#[derive(Debug, thiserror::Error)]
pub enum ModerationError {
    #[error("listing {0} not found")]
    NotFound(ListingId),
    #[error("listing cannot move from {from} to {to}")]
    InvalidTransition {
        from: ListingStatus,
        to: ListingStatus,
    },
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}
