use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, FromRequest, FromRequestParts, Path, Query, Request, State},
    http::{header, request::Parts, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use base64::Engine;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use tracing::error;

use crate::config::DEFAULT_MAX_UPLOAD_BYTES;

use super::catalog::{CatalogError, CatalogService};
use super::domain::{
    FinancingSubmission, ListingDraft, ListingId, ListingStatus, ModerationDecision, PhotoUpload,
    ProfileUpdate, UserId,
};
use super::financing::{FinancingError, FinancingService};
use super::moderation::{ModerationError, ModerationService};
use super::profiles::{ProfileError, ProfileService};
use super::repository::{
    FinancingRepository, ListingRepository, ProfileRepository, RepositoryError,
};
use super::storage::{BlobError, BlobStore, PHOTO_BUCKET};
use super::submission::{SubmissionError, SubmissionService};

/// Header carrying the authenticated account identifier.
pub const USER_ID_HEADER: &str = "x-user-id";
/// Header carrying the authenticated account role.
pub const USER_ROLE_HEADER: &str = "x-user-role";

const ADMIN_ROLE: &str = "admin";

/// Every marketplace service wired against one set of stores.
pub struct Marketplace<L, P, F, B> {
    pub moderation: ModerationService<L, P>,
    pub submissions: SubmissionService<L, B>,
    pub catalog: CatalogService<L, P>,
    pub financing: FinancingService<L, F>,
    pub profiles: ProfileService<P>,
    blobs: Arc<B>,
    upload_limit: usize,
}

impl<L, P, F, B> Marketplace<L, P, F, B>
where
    L: ListingRepository + 'static,
    P: ProfileRepository + 'static,
    F: FinancingRepository + 'static,
    B: BlobStore + 'static,
{
    pub fn new(listings: Arc<L>, profiles: Arc<P>, applications: Arc<F>, blobs: Arc<B>) -> Self {
        Self {
            moderation: ModerationService::new(listings.clone(), profiles.clone()),
            submissions: SubmissionService::new(listings.clone(), blobs.clone()),
            catalog: CatalogService::new(listings.clone(), profiles.clone()),
            financing: FinancingService::new(listings, applications),
            profiles: ProfileService::new(profiles),
            blobs,
            upload_limit: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }

    /// Request body ceiling for the submission route.
    pub fn with_upload_limit(mut self, bytes: usize) -> Self {
        self.upload_limit = bytes;
        self
    }

    pub fn upload_limit(&self) -> usize {
        self.upload_limit
    }

    pub fn blobs(&self) -> &B {
        self.blobs.as_ref()
    }
}

/// Router builder exposing catalog, seller, admin, and financing endpoints.
pub fn marketplace_router<L, P, F, B>(marketplace: Arc<Marketplace<L, P, F, B>>) -> Router
where
    L: ListingRepository + 'static,
    P: ProfileRepository + 'static,
    F: FinancingRepository + 'static,
    B: BlobStore + 'static,
{
    let upload_limit = marketplace.upload_limit();
    Router::new()
        .route(
            "/api/v1/listings",
            get(catalog_handler::<L, P, F, B>)
                .post(submit_handler::<L, P, F, B>)
                .layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route(
            "/api/v1/listings/:listing_id",
            get(listing_handler::<L, P, F, B>),
        )
        .route(
            "/api/v1/listings/:listing_id/applications",
            post(financing_handler::<L, P, F, B>),
        )
        .route(
            "/api/v1/sellers/me/listings",
            get(seller_listings_handler::<L, P, F, B>),
        )
        .route(
            "/api/v1/admin/listings",
            get(moderation_queue_handler::<L, P, F, B>),
        )
        .route(
            "/api/v1/admin/listings/:listing_id/approve",
            post(approve_handler::<L, P, F, B>),
        )
        .route(
            "/api/v1/admin/listings/:listing_id/reject",
            post(reject_handler::<L, P, F, B>),
        )
        .route(
            "/api/v1/profiles/me",
            get(profile_handler::<L, P, F, B>).put(update_profile_handler::<L, P, F, B>),
        )
        .route(
            &format!("/storage/{PHOTO_BUCKET}/*path"),
            get(photo_handler::<L, P, F, B>),
        )
        .with_state(marketplace)
}

type SharedMarketplace<L, P, F, B> = State<Arc<Marketplace<L, P, F, B>>>;

/// JSON body extractor whose rejections carry the `{"error"}` body.
pub struct ApiJson<T>(pub T);

#[axum::async_trait]
impl<S, T> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        Json::<T>::from_request(req, state)
            .await
            .map(|Json(value)| ApiJson(value))
            .map_err(|rejection| error_response(rejection.status(), rejection.body_text()))
    }
}

/// Query string extractor whose rejections carry the `{"error"}` body.
pub struct ApiQuery<T>(pub T);

#[axum::async_trait]
impl<S, T> FromRequestParts<S> for ApiQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        Query::<T>::from_request_parts(parts, state)
            .await
            .map(|Query(value)| ApiQuery(value))
            .map_err(|rejection| error_response(rejection.status(), rejection.body_text()))
    }
}

/// Runs store-bound work off the async workers; repositories and blob stores are synchronous.
async fn run_blocking<W>(work: W) -> Response
where
    W: FnOnce() -> Response + Send + 'static,
{
    match tokio::task::spawn_blocking(work).await {
        Ok(response) => response,
        Err(err) => {
            error!(error = %err, "marketplace task did not complete");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "internal error")
        }
    }
}

/// Photo as carried in the submission payload.
#[derive(Debug, Deserialize)]
pub struct PhotoPayload {
    pub file_name: String,
    /// Standard base64 encoding of the file contents.
    pub data: String,
}

#[derive(Debug, Deserialize)]
pub struct SubmitListingRequest {
    #[serde(flatten)]
    pub draft: ListingDraft,
    #[serde(default)]
    pub photos: Vec<PhotoPayload>,
}

#[derive(Debug, Default, Deserialize)]
pub struct StatusQuery {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub filter: Option<String>,
}

impl StatusQuery {
    fn resolve(value: Option<&str>) -> Result<ListingStatus, Response> {
        match value {
            None => Ok(ListingStatus::Pending),
            Some(raw) => raw
                .parse()
                .map_err(|err: super::domain::UnknownStatus| {
                    error_response(StatusCode::UNPROCESSABLE_ENTITY, err.to_string())
                }),
        }
    }
}

pub(crate) async fn catalog_handler<L, P, F, B>(
    State(marketplace): SharedMarketplace<L, P, F, B>,
) -> Response
where
    L: ListingRepository + 'static,
    P: ProfileRepository + 'static,
    F: FinancingRepository + 'static,
    B: BlobStore + 'static,
{
    run_blocking(move || match marketplace.catalog.approved() {
        Ok(listings) => (StatusCode::OK, Json(listings)).into_response(),
        Err(err) => err.into_response(),
    })
    .await
}

pub(crate) async fn listing_handler<L, P, F, B>(
    State(marketplace): SharedMarketplace<L, P, F, B>,
    Path(listing_id): Path<String>,
) -> Response
where
    L: ListingRepository + 'static,
    P: ProfileRepository + 'static,
    F: FinancingRepository + 'static,
    B: BlobStore + 'static,
{
    let id = match parse_listing_id(&listing_id) {
        Ok(id) => id,
        Err(response) => return response,
    };
    run_blocking(move || match marketplace.catalog.approved_listing(&id) {
        Ok(listing) => (StatusCode::OK, Json(listing)).into_response(),
        Err(err) => err.into_response(),
    })
    .await
}

pub(crate) async fn submit_handler<L, P, F, B>(
    State(marketplace): SharedMarketplace<L, P, F, B>,
    headers: HeaderMap,
    ApiJson(request): ApiJson<SubmitListingRequest>,
) -> Response
where
    L: ListingRepository + 'static,
    P: ProfileRepository + 'static,
    F: FinancingRepository + 'static,
    B: BlobStore + 'static,
{
    let owner = match caller(&headers) {
        Ok(owner) => owner,
        Err(response) => return response,
    };

    run_blocking(move || {
        let mut photos = Vec::with_capacity(request.photos.len());
        for payload in request.photos {
            match base64::engine::general_purpose::STANDARD.decode(payload.data.trim()) {
                Ok(bytes) => photos.push(PhotoUpload::new(payload.file_name, bytes)),
                Err(err) => {
                    return error_response(
                        StatusCode::UNPROCESSABLE_ENTITY,
                        format!("photo '{}' is not valid base64: {err}", payload.file_name),
                    )
                }
            }
        }

        match marketplace
            .submissions
            .submit_and_refresh(&owner, request.draft, photos)
        {
            Ok(receipt) => (StatusCode::CREATED, Json(receipt)).into_response(),
            Err(err) => err.into_response(),
        }
    })
    .await
}

pub(crate) async fn seller_listings_handler<L, P, F, B>(
    State(marketplace): SharedMarketplace<L, P, F, B>,
    headers: HeaderMap,
) -> Response
where
    L: ListingRepository + 'static,
    P: ProfileRepository + 'static,
    F: FinancingRepository + 'static,
    B: BlobStore + 'static,
{
    let owner = match caller(&headers) {
        Ok(owner) => owner,
        Err(response) => return response,
    };
    run_blocking(move || match marketplace.submissions.listings_for_owner(&owner) {
        Ok(listings) => (StatusCode::OK, Json(listings)).into_response(),
        Err(err) => err.into_response(),
    })
    .await
}

pub(crate) async fn moderation_queue_handler<L, P, F, B>(
    State(marketplace): SharedMarketplace<L, P, F, B>,
    headers: HeaderMap,
    ApiQuery(query): ApiQuery<StatusQuery>,
) -> Response
where
    L: ListingRepository + 'static,
    P: ProfileRepository + 'static,
    F: FinancingRepository + 'static,
    B: BlobStore + 'static,
{
    if let Err(response) = require_admin(&headers) {
        return response;
    }
    let status = match StatusQuery::resolve(query.status.as_deref()) {
        Ok(status) => status,
        Err(response) => return response,
    };
    run_blocking(move || match marketplace.moderation.list_by_status(status) {
        Ok(listings) => (
            StatusCode::OK,
            Json(json!({ "status": status, "listings": listings })),
        )
            .into_response(),
        Err(err) => err.into_response(),
    })
    .await
}

pub(crate) async fn approve_handler<L, P, F, B>(
    state: SharedMarketplace<L, P, F, B>,
    headers: HeaderMap,
    path: Path<String>,
    query: ApiQuery<StatusQuery>,
) -> Response
where
    L: ListingRepository + 'static,
    P: ProfileRepository + 'static,
    F: FinancingRepository + 'static,
    B: BlobStore + 'static,
{
    decide(state, headers, path, query, ModerationDecision::Approve).await
}

pub(crate) async fn reject_handler<L, P, F, B>(
    state: SharedMarketplace<L, P, F, B>,
    headers: HeaderMap,
    path: Path<String>,
    query: ApiQuery<StatusQuery>,
) -> Response
where
    L: ListingRepository + 'static,
    P: ProfileRepository + 'static,
    F: FinancingRepository + 'static,
    B: BlobStore + 'static,
{
    decide(state, headers, path, query, ModerationDecision::Reject).await
}

async fn decide<L, P, F, B>(
    State(marketplace): SharedMarketplace<L, P, F, B>,
    headers: HeaderMap,
    Path(listing_id): Path<String>,
    ApiQuery(query): ApiQuery<StatusQuery>,
    decision: ModerationDecision,
) -> Response
where
    L: ListingRepository + 'static,
    P: ProfileRepository + 'static,
    F: FinancingRepository + 'static,
    B: BlobStore + 'static,
{
    if let Err(response) = require_admin(&headers) {
        return response;
    }
    let id = match parse_listing_id(&listing_id) {
        Ok(id) => id,
        Err(response) => return response,
    };
    let filter = match StatusQuery::resolve(query.filter.as_deref()) {
        Ok(filter) => filter,
        Err(response) => return response,
    };
    run_blocking(move || {
        match marketplace
            .moderation
            .transition_and_refresh(&id, decision, filter)
        {
            Ok(outcome) => (StatusCode::OK, Json(outcome)).into_response(),
            Err(err) => err.into_response(),
        }
    })
    .await
}

pub(crate) async fn financing_handler<L, P, F, B>(
    State(marketplace): SharedMarketplace<L, P, F, B>,
    headers: HeaderMap,
    Path(listing_id): Path<String>,
    ApiJson(submission): ApiJson<FinancingSubmission>,
) -> Response
where
    L: ListingRepository + 'static,
    P: ProfileRepository + 'static,
    F: FinancingRepository + 'static,
    B: BlobStore + 'static,
{
    let applicant = match caller(&headers) {
        Ok(applicant) => applicant,
        Err(response) => return response,
    };
    let id = match parse_listing_id(&listing_id) {
        Ok(id) => id,
        Err(response) => return response,
    };
    run_blocking(
        move || match marketplace.financing.apply(&applicant, &id, submission) {
            Ok(application) => (StatusCode::CREATED, Json(application)).into_response(),
            Err(err) => err.into_response(),
        },
    )
    .await
}

pub(crate) async fn profile_handler<L, P, F, B>(
    State(marketplace): SharedMarketplace<L, P, F, B>,
    headers: HeaderMap,
) -> Response
where
    L: ListingRepository + 'static,
    P: ProfileRepository + 'static,
    F: FinancingRepository + 'static,
    B: BlobStore + 'static,
{
    let user = match caller(&headers) {
        Ok(user) => user,
        Err(response) => return response,
    };
    run_blocking(move || match marketplace.profiles.profile(&user) {
        Ok(profile) => (StatusCode::OK, Json(profile)).into_response(),
        Err(err) => err.into_response(),
    })
    .await
}

pub(crate) async fn update_profile_handler<L, P, F, B>(
    State(marketplace): SharedMarketplace<L, P, F, B>,
    headers: HeaderMap,
    ApiJson(update): ApiJson<ProfileUpdate>,
) -> Response
where
    L: ListingRepository + 'static,
    P: ProfileRepository + 'static,
    F: FinancingRepository + 'static,
    B: BlobStore + 'static,
{
    let user = match caller(&headers) {
        Ok(user) => user,
        Err(response) => return response,
    };
    run_blocking(move || match marketplace.profiles.update_contact(&user, update) {
        Ok(profile) => (StatusCode::OK, Json(profile)).into_response(),
        Err(err) => err.into_response(),
    })
    .await
}

pub(crate) async fn photo_handler<L, P, F, B>(
    State(marketplace): SharedMarketplace<L, P, F, B>,
    Path(path): Path<String>,
) -> Response
where
    L: ListingRepository + 'static,
    P: ProfileRepository + 'static,
    F: FinancingRepository + 'static,
    B: BlobStore + 'static,
{
    run_blocking(move || match marketplace.blobs().get(&path) {
        Ok(Some(bytes)) => {
            let content_type = mime_guess::from_path(&path)
                .first_or_octet_stream()
                .to_string();
            (StatusCode::OK, [(header::CONTENT_TYPE, content_type)], bytes).into_response()
        }
        Ok(None) | Err(BlobError::InvalidPath(_)) => {
            error_response(StatusCode::NOT_FOUND, "photo not found")
        }
        Err(other) => error_response(StatusCode::SERVICE_UNAVAILABLE, other.to_string()),
    })
    .await
}

/// Identity of the calling account, taken from the authenticated request headers.
///
/// The identifier becomes the first segment of photo paths and URLs, so only ASCII
/// letters, digits and `-_.@` are accepted, and an id made only of dots is refused.
pub(crate) fn caller(headers: &HeaderMap) -> Result<UserId, Response> {
    let raw = headers
        .get(USER_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| error_response(StatusCode::UNAUTHORIZED, "missing caller identity"))?;

    let allowed = raw
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '@'));
    if !allowed || raw.chars().all(|c| c == '.') {
        return Err(error_response(
            StatusCode::BAD_REQUEST,
            format!("caller identity '{raw}' is not a valid account id"),
        ));
    }
    Ok(UserId(raw.to_string()))
}

pub(crate) fn require_admin(headers: &HeaderMap) -> Result<UserId, Response> {
    let user = caller(headers)?;
    let is_admin = headers
        .get(USER_ROLE_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(|role| role.trim().eq_ignore_ascii_case(ADMIN_ROLE))
        .unwrap_or(false);
    if is_admin {
        Ok(user)
    } else {
        Err(error_response(
            StatusCode::FORBIDDEN,
            "administrator role required",
        ))
    }
}

fn parse_listing_id(raw: &str) -> Result<ListingId, Response> {
    raw.parse()
        .map_err(|_| error_response(StatusCode::NOT_FOUND, format!("listing {raw} not found")))
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    let payload = json!({ "error": message.into() });
    (status, Json(payload)).into_response()
}

fn repository_status(error: &RepositoryError) -> StatusCode {
    match error {
        RepositoryError::NotFound => StatusCode::NOT_FOUND,
        RepositoryError::Conflict | RepositoryError::StatusMismatch { .. } => StatusCode::CONFLICT,
        RepositoryError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}

impl IntoResponse for ModerationError {
    fn into_response(self) -> Response {
        let status = match &self {
            ModerationError::NotFound(_) => StatusCode::NOT_FOUND,
            ModerationError::InvalidTransition { .. } => StatusCode::CONFLICT,
            ModerationError::Repository(err) => repository_status(err),
        };
        error_response(status, self.to_string())
    }
}

impl IntoResponse for SubmissionError {
    fn into_response(self) -> Response {
        let status = match &self {
            SubmissionError::Invalid(_) => StatusCode::UNPROCESSABLE_ENTITY,
            SubmissionError::SubmissionInFlight(_) => StatusCode::CONFLICT,
            SubmissionError::Upload(_) => StatusCode::BAD_GATEWAY,
            SubmissionError::Repository(err) => repository_status(err),
        };
        error_response(status, self.to_string())
    }
}

impl IntoResponse for CatalogError {
    fn into_response(self) -> Response {
        let status = match &self {
            CatalogError::NotFound(_) => StatusCode::NOT_FOUND,
            CatalogError::Repository(err) => repository_status(err),
        };
        error_response(status, self.to_string())
    }
}

impl IntoResponse for FinancingError {
    fn into_response(self) -> Response {
        let status = match &self {
            FinancingError::Invalid(_) => StatusCode::UNPROCESSABLE_ENTITY,
            FinancingError::ListingNotFound(_) => StatusCode::NOT_FOUND,
            FinancingError::Repository(err) => repository_status(err),
        };
        error_response(status, self.to_string())
    }
}

impl IntoResponse for ProfileError {
    fn into_response(self) -> Response {
        let status = match &self {
            ProfileError::NotFound(_) => StatusCode::NOT_FOUND,
            ProfileError::UsernameRequired => StatusCode::UNPROCESSABLE_ENTITY,
            ProfileError::Repository(err) => repository_status(err),
        };
        error_response(status, self.to_string())
    }
}
