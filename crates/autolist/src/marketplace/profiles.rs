use std::sync::Arc;

use tracing::info;

use super::domain::{Profile, ProfileUpdate, UserId};
use super::repository::{ProfileRepository, RepositoryError};

/// Account contact details shown alongside listings.
pub struct ProfileService<P> {
    profiles: Arc<P>,
}

impl<P> ProfileService<P>
where
    P: ProfileRepository + 'static,
{
    pub fn new(profiles: Arc<P>) -> Self {
        Self { profiles }
    }

    pub fn profile(&self, user: &UserId) -> Result<Profile, ProfileError> {
        self.profiles
            .fetch(user)?
            .ok_or_else(|| ProfileError::NotFound(user.clone()))
    }

    /// Replace the editable contact fields. An existing username is kept as is; a missing
    /// profile is created, which requires a username in the update.
    pub fn update_contact(
        &self,
        user: &UserId,
        update: ProfileUpdate,
    ) -> Result<Profile, ProfileError> {
        let username = match self.profiles.fetch(user)? {
            Some(existing) => existing.username,
            None => update
                .username
                .as_deref()
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(str::to_string)
                .ok_or(ProfileError::UsernameRequired)?,
        };

        let profile = Profile {
            id: user.clone(),
            username,
            phone_number: normalize(update.phone_number),
            address: normalize(update.address),
            company_name: normalize(update.company_name),
            bio: normalize(update.bio),
        };

        let stored = self.profiles.upsert(profile)?;
        info!(user = %user, "profile updated");
        Ok(stored)
    }
}

fn normalize(value: Option<String>) -> Option<String> {
    value
        .map(|raw| raw.trim().to_string())
        .filter(|trimmed| !trimmed.is_empty())
}

/// Error raised by the profile service.
#[derive(Debug, thiserror::Error)]
pub enum ProfileError {
    #[error("profile for {0} not found")]
    NotFound(UserId),
    #[error("username is required to create a profile")]
    UsernameRequired,
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}
