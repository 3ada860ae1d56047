use std::collections::HashMap;
use std::sync::Arc;

use super::domain::{
    ContactScope, Listing, ListingId, ListingStatus, ListingWithOwner, OwnerContact, UserId,
};
use super::repository::{ListingRepository, ProfileRepository, RepositoryError};

/// Public catalog of approved listings.
pub struct CatalogService<L, P> {
    listings: Arc<L>,
    profiles: Arc<P>,
}

impl<L, P> CatalogService<L, P>
where
    L: ListingRepository + 'static,
    P: ProfileRepository + 'static,
{
    pub fn new(listings: Arc<L>, profiles: Arc<P>) -> Self {
        Self { listings, profiles }
    }

    /// Approved listings, newest first, with the owner's public contact details.
    pub fn approved(&self) -> Result<Vec<ListingWithOwner>, CatalogError> {
        let listings = self.listings.by_status(ListingStatus::Approved)?;
        Ok(join_owners(
            self.profiles.as_ref(),
            listings,
            ContactScope::Public,
        )?)
    }

    /// A single approved listing. Pending and rejected listings read as missing.
    pub fn approved_listing(&self, id: &ListingId) -> Result<ListingWithOwner, CatalogError> {
        let listing = self
            .listings
            .fetch(id)?
            .filter(|listing| listing.status == ListingStatus::Approved)
            .ok_or(CatalogError::NotFound(*id))?;

        let mut joined = join_owners(self.profiles.as_ref(), vec![listing], ContactScope::Public)?;
        joined.pop().ok_or(CatalogError::NotFound(*id))
    }
}

/// Attach owner contact details, fetching each distinct owner profile once.
pub(crate) fn join_owners<P>(
    profiles: &P,
    listings: Vec<Listing>,
    scope: ContactScope,
) -> Result<Vec<ListingWithOwner>, RepositoryError>
where
    P: ProfileRepository + ?Sized,
{
    let mut contacts: HashMap<UserId, Option<OwnerContact>> = HashMap::new();
    let mut joined = Vec::with_capacity(listings.len());

    for listing in listings {
        let owner_contact = match contacts.get(&listing.owner) {
            Some(contact) => contact.clone(),
            None => {
                let contact = profiles
                    .fetch(&listing.owner)?
                    .map(|profile| OwnerContact::from_profile(&profile, scope));
                contacts.insert(listing.owner.clone(), contact.clone());
                contact
            }
        };
        joined.push(ListingWithOwner {
            listing,
            owner_contact,
        });
    }

    Ok(joined)
}

/// Error raised by the catalog.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("listing {0} not found")]
    NotFound(ListingId),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}
