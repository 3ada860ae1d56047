use std::sync::Arc;

use chrono::Utc;
use tracing::info;

use super::domain::{
    ApplicationId, FinancingApplication, FinancingSubmission, ListingId, ListingStatus, UserId,
};
use super::repository::{FinancingRepository, ListingRepository, RepositoryError};

/// Buyer financing intake for approved listings.
pub struct FinancingService<L, F> {
    listings: Arc<L>,
    applications: Arc<F>,
}

impl<L, F> FinancingService<L, F>
where
    L: ListingRepository + 'static,
    F: FinancingRepository + 'static,
{
    pub fn new(listings: Arc<L>, applications: Arc<F>) -> Self {
        Self {
            listings,
            applications,
        }
    }

    /// Record a financing request. Repeat applications for the same listing are accepted.
    pub fn apply(
        &self,
        applicant: &UserId,
        listing_id: &ListingId,
        submission: FinancingSubmission,
    ) -> Result<FinancingApplication, FinancingError> {
        if !submission.monthly_income.is_finite() || submission.monthly_income <= 0.0 {
            return Err(FinancingError::Invalid(
                "monthly income must be a positive amount".to_string(),
            ));
        }
        let employer = submission.employer.trim();
        if employer.is_empty() {
            return Err(FinancingError::Invalid("employer is required".to_string()));
        }

        self.listings
            .fetch(listing_id)?
            .filter(|listing| listing.status == ListingStatus::Approved)
            .ok_or(FinancingError::ListingNotFound(*listing_id))?;

        let application = FinancingApplication {
            id: ApplicationId::generate(),
            listing_id: *listing_id,
            applicant: applicant.clone(),
            monthly_income: submission.monthly_income,
            employer: employer.to_string(),
            months_employed: submission.months_employed,
            submitted_at: Utc::now(),
        };

        let stored = self.applications.insert(application)?;
        info!(application_id = %stored.id.0, %listing_id, applicant = %applicant, "financing application received");
        Ok(stored)
    }
}

/// Error raised by the financing service.
#[derive(Debug, thiserror::Error)]
pub enum FinancingError {
    #[error("invalid application: {0}")]
    Invalid(String),
    #[error("listing {0} not found")]
    ListingNotFound(ListingId),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}
