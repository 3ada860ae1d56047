use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use super::domain::{
    newest_first, FinancingApplication, Listing, ListingId, ListingStatus, Profile, UserId,
};
use super::repository::{
    FinancingRepository, ListingRepository, ProfileRepository, RepositoryError,
};

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, RepositoryError> {
    mutex
        .lock()
        .map_err(|_| RepositoryError::Unavailable("repository mutex poisoned".to_string()))
}

#[derive(Default, Clone)]
pub struct InMemoryListingStore {
    records: Arc<Mutex<HashMap<ListingId, Listing>>>,
}

impl InMemoryListingStore {
    fn collect<F>(&self, predicate: F) -> Result<Vec<Listing>, RepositoryError>
    where
        F: Fn(&Listing) -> bool,
    {
        let guard = lock(&self.records)?;
        let mut listings: Vec<Listing> = guard
            .values()
            .filter(|listing| predicate(listing))
            .cloned()
            .collect();
        listings.sort_by(newest_first);
        Ok(listings)
    }

    pub fn len(&self) -> usize {
        self.records.lock().map(|guard| guard.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ListingRepository for InMemoryListingStore {
    fn insert(&self, listing: Listing) -> Result<Listing, RepositoryError> {
        let mut guard = lock(&self.records)?;
        if guard.contains_key(&listing.id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(listing.id, listing.clone());
        Ok(listing)
    }

    fn fetch(&self, id: &ListingId) -> Result<Option<Listing>, RepositoryError> {
        Ok(lock(&self.records)?.get(id).cloned())
    }

    fn by_status(&self, status: ListingStatus) -> Result<Vec<Listing>, RepositoryError> {
        self.collect(|listing| listing.status == status)
    }

    fn by_owner(&self, owner: &UserId) -> Result<Vec<Listing>, RepositoryError> {
        self.collect(|listing| &listing.owner == owner)
    }

    fn update_status(
        &self,
        id: &ListingId,
        expected: ListingStatus,
        next: ListingStatus,
    ) -> Result<Listing, RepositoryError> {
        let mut guard = lock(&self.records)?;
        let listing = guard.get_mut(id).ok_or(RepositoryError::NotFound)?;
        if listing.status != expected {
            return Err(RepositoryError::StatusMismatch {
                found: listing.status,
            });
        }
        listing.status = next;
        Ok(listing.clone())
    }
}

#[derive(Default, Clone)]
pub struct InMemoryProfileStore {
    records: Arc<Mutex<HashMap<UserId, Profile>>>,
}

impl ProfileRepository for InMemoryProfileStore {
    fn fetch(&self, id: &UserId) -> Result<Option<Profile>, RepositoryError> {
        Ok(lock(&self.records)?.get(id).cloned())
    }

    fn upsert(&self, profile: Profile) -> Result<Profile, RepositoryError> {
        lock(&self.records)?.insert(profile.id.clone(), profile.clone());
        Ok(profile)
    }
}

#[derive(Default, Clone)]
pub struct InMemoryFinancingStore {
    records: Arc<Mutex<Vec<FinancingApplication>>>,
}

impl InMemoryFinancingStore {
    pub fn applications(&self) -> Vec<FinancingApplication> {
        self.records
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }
}

impl FinancingRepository for InMemoryFinancingStore {
    fn insert(
        &self,
        application: FinancingApplication,
    ) -> Result<FinancingApplication, RepositoryError> {
        lock(&self.records)?.push(application.clone());
        Ok(application)
    }
}
