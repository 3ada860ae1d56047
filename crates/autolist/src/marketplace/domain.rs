use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier of an authenticated account. Profiles share this identifier space.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub String);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier wrapper for vehicle listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ListingId(pub Uuid);

impl ListingId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ListingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for ListingId {
    type Err = uuid::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(value.trim()).map(Self)
    }
}

/// Identifier wrapper for financing applications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApplicationId(pub Uuid);

impl ApplicationId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

/// Moderation state of a listing. Only pending listings may be decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListingStatus {
    Pending,
    Approved,
    Rejected,
}

impl ListingStatus {
    pub fn label(&self) -> &'static str {
        match self {
            ListingStatus::Pending => "pending",
            ListingStatus::Approved => "approved",
            ListingStatus::Rejected => "rejected",
        }
    }

    /// Returns the status reached by applying `decision`, or `None` when the move is not allowed.
    pub fn apply(self, decision: ModerationDecision) -> Option<ListingStatus> {
        match (self, decision) {
            (ListingStatus::Pending, ModerationDecision::Approve) => Some(ListingStatus::Approved),
            (ListingStatus::Pending, ModerationDecision::Reject) => Some(ListingStatus::Rejected),
            _ => None,
        }
    }
}

impl fmt::Display for ListingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown listing status '{0}' (expected pending, approved, or rejected)")]
pub struct UnknownStatus(pub String);

impl FromStr for ListingStatus {
    type Err = UnknownStatus;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            _ => Err(UnknownStatus(value.to_string())),
        }
    }
}

/// Administrator action on a pending listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModerationDecision {
    Approve,
    Reject,
}

impl ModerationDecision {
    pub fn target(&self) -> ListingStatus {
        match self {
            ModerationDecision::Approve => ListingStatus::Approved,
            ModerationDecision::Reject => ListingStatus::Rejected,
        }
    }
}

/// Stored vehicle listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    pub id: ListingId,
    pub make: String,
    pub model: String,
    pub year: i32,
    pub mileage: u32,
    pub description: String,
    pub photos: Vec<String>,
    pub status: ListingStatus,
    pub created_at: DateTime<Utc>,
    pub owner: UserId,
}

/// Seller supplied fields for a new listing. Status and ownership are never taken from the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingDraft {
    pub make: String,
    pub model: String,
    pub year: i32,
    pub mileage: u32,
    #[serde(default)]
    pub description: String,
}

/// Raw photo handed to the submission flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhotoUpload {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl PhotoUpload {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes,
        }
    }

    /// Lower-cased final extension of the file name, `bin` when there is none.
    pub fn extension(&self) -> String {
        match self.file_name.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => ext.to_ascii_lowercase(),
            _ => "bin".to_string(),
        }
    }
}

/// Contact and business metadata attached to an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: UserId,
    pub username: String,
    pub phone_number: Option<String>,
    pub address: Option<String>,
    pub company_name: Option<String>,
    pub bio: Option<String>,
}

/// Which owner fields a listing view discloses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContactScope {
    Moderation,
    Public,
}

/// Owner contact projection joined onto listing views.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerContact {
    pub username: String,
    pub phone_number: Option<String>,
    pub company_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

impl OwnerContact {
    pub fn from_profile(profile: &Profile, scope: ContactScope) -> Self {
        let address = match scope {
            ContactScope::Public => profile.address.clone(),
            ContactScope::Moderation => None,
        };

        Self {
            username: profile.username.clone(),
            phone_number: profile.phone_number.clone(),
            company_name: profile.company_name.clone(),
            address,
        }
    }
}

/// Listing joined with its owner's contact details.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListingWithOwner {
    #[serde(flatten)]
    pub listing: Listing,
    pub owner_contact: Option<OwnerContact>,
}

/// Buyer supplied financing request fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinancingSubmission {
    pub monthly_income: f64,
    pub employer: String,
    pub months_employed: u32,
}

/// Stored financing application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinancingApplication {
    pub id: ApplicationId,
    pub listing_id: ListingId,
    pub applicant: UserId,
    pub monthly_income: f64,
    pub employer: String,
    pub months_employed: u32,
    pub submitted_at: DateTime<Utc>,
}

/// Contact fields a user may edit on their own profile.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileUpdate {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub company_name: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
}

/// Orders listing views newest first; ties fall back to id so results are stable.
pub(crate) fn newest_first(a: &Listing, b: &Listing) -> std::cmp::Ordering {
    b.created_at
        .cmp(&a.created_at)
        .then_with(|| a.id.cmp(&b.id))
}
