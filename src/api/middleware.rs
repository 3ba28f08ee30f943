//! API middleware
//!
//! Contains:
//! - Shared application state
//! - The JSON error type every handler returns
//! - Authentication (session token validation)
//! - Authorization (admin gate)

use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::sync::Arc;

use crate::cache::MemoryCache;
use crate::config::Config;
use crate::db::repositories::{
    SqlxAdRepository, SqlxAffiliateRepository, SqlxBlogRepository, SqlxJobPostingRepository,
    SqlxLibraryRepository, SqlxNewsletterRepository, SqlxProductRepository,
    SqlxServiceListingRepository, SqlxSessionRepository, SqlxSponsorshipRepository,
    SqlxStatsRepository, SqlxTransactionRepository, SqlxUserRepository,
};
use crate::db::DynDatabasePool;
use crate::models::User;
use crate::services::{
    AdService, AffiliateService, AuthService, BlogService, DashboardService, FieldErrors,
    JobPostingService, LibraryService, LoginRateLimiter, Mailer, NewsletterService,
    PaymentService, ProductService, ServiceError, ServiceListingService, SponsorshipService,
    UserService,
};
use crate::storage::Storage;

/// Application state containing shared services
#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<AuthService>,
    pub users: Arc<UserService>,
    pub products: Arc<ProductService>,
    pub payments: Arc<PaymentService>,
    pub library: Arc<LibraryService>,
    pub ads: Arc<AdService>,
    pub affiliates: Arc<AffiliateService>,
    pub blogs: Arc<BlogService>,
    pub newsletters: Arc<NewsletterService>,
    pub service_listings: Arc<ServiceListingService>,
    pub jobs: Arc<JobPostingService>,
    pub sponsorships: Arc<SponsorshipService>,
    pub dashboard: Arc<DashboardService>,
    pub storage: Arc<Storage>,
    pub session_days: i64,
}

impl AppState {
    /// Wire repositories and services over one pool
    pub fn new(pool: DynDatabasePool, config: &Config, mailer: Option<Arc<dyn Mailer>>) -> Self {
        let storage = Arc::new(Storage::new(config.upload.clone()));
        let cache = Arc::new(MemoryCache::from_config(&config.cache));
        let limiter = Arc::new(LoginRateLimiter::new());

        let users = SqlxUserRepository::boxed(pool.clone());
        let sessions = SqlxSessionRepository::boxed(pool.clone());
        let products = SqlxProductRepository::boxed(pool.clone());
        let library = SqlxLibraryRepository::boxed(pool.clone());
        let affiliates = SqlxAffiliateRepository::boxed(pool.clone());

        Self {
            auth: Arc::new(AuthService::new(
                users.clone(),
                sessions.clone(),
                limiter,
                config.auth.session_days,
            )),
            users: Arc::new(UserService::new(users.clone(), sessions, storage.clone())),
            products: Arc::new(ProductService::new(products.clone(), storage.clone())),
            payments: Arc::new(PaymentService::new(
                SqlxTransactionRepository::boxed(pool.clone()),
                products.clone(),
                library.clone(),
                affiliates.clone(),
                storage.clone(),
            )),
            library: Arc::new(LibraryService::new(
                library,
                products.clone(),
                users.clone(),
                storage.clone(),
            )),
            ads: Arc::new(AdService::new(
                SqlxAdRepository::boxed(pool.clone()),
                users,
                storage.clone(),
                cache,
            )),
            affiliates: Arc::new(AffiliateService::new(affiliates, products)),
            blogs: Arc::new(BlogService::new(SqlxBlogRepository::boxed(pool.clone()), storage.clone())),
            newsletters: Arc::new(NewsletterService::new(
                SqlxNewsletterRepository::boxed(pool.clone()),
                mailer,
            )),
            service_listings: Arc::new(ServiceListingService::new(
                SqlxServiceListingRepository::boxed(pool.clone()),
                storage.clone(),
            )),
            jobs: Arc::new(JobPostingService::new(SqlxJobPostingRepository::boxed(pool.clone()))),
            sponsorships: Arc::new(SponsorshipService::new(
                SqlxSponsorshipRepository::boxed(pool.clone()),
                storage.clone(),
            )),
            dashboard: Arc::new(DashboardService::new(SqlxStatsRepository::boxed(pool))),
            storage,
            session_days: config.auth.session_days,
        }
    }
}

/// Authenticated user extracted from request
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub User);

/// Error response for API errors: `{message, code, errors?}`
#[derive(Debug, Serialize)]
pub struct ApiError {
    #[serde(skip)]
    pub status: StatusCode,
    pub message: String,
    pub code: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<FieldErrors>,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            code,
            errors: None,
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, "FORBIDDEN", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "NOT_FOUND", message)
    }

    pub fn validation(errors: FieldErrors) -> Self {
        Self {
            errors: Some(errors),
            ..Self::new(
                StatusCode::UNPROCESSABLE_ENTITY,
                "VALIDATION_ERROR",
                "The given data was invalid.",
            )
        }
    }

    /// A validation error on one field
    pub fn field(field: &str, message: impl Into<String>) -> Self {
        let mut errors = FieldErrors::new();
        errors.add(field, message);
        Self::validation(errors)
    }

    pub fn internal_error() -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", "Server Error")
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::NotFound(resource) => Self::not_found(format!("{} not found", resource)),
            ServiceError::Validation(errors) => Self::validation(errors),
            ServiceError::InvalidState(message) => {
                Self::new(StatusCode::UNPROCESSABLE_ENTITY, "INVALID_STATE", message)
            }
            ServiceError::Unauthorized(message) => Self::unauthorized(message),
            ServiceError::Forbidden(message) => Self::forbidden(message),
            ServiceError::Conflict(message) => Self::new(StatusCode::CONFLICT, "CONFLICT", message),
            ServiceError::TooManyRequests(message) => {
                Self::new(StatusCode::TOO_MANY_REQUESTS, "TOO_MANY_REQUESTS", message)
            }
            ServiceError::Internal(e) => {
                tracing::error!("Request failed: {:#}", e);
                Self::internal_error()
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self)).into_response()
    }
}

/// Extract session token from request
pub(crate) fn extract_session_token(headers: &axum::http::HeaderMap) -> Option<String> {
    if let Some(auth_header) = headers.get(header::AUTHORIZATION) {
        if let Ok(auth_str) = auth_header.to_str() {
            if let Some(token) = auth_str.strip_prefix("Bearer ") {
                return Some(token.trim().to_string());
            }
        }
    }

    if let Some(cookie_header) = headers.get(header::COOKIE) {
        if let Ok(cookie_str) = cookie_header.to_str() {
            for cookie in cookie_str.split(';') {
                if let Some(token) = cookie.trim().strip_prefix("session=") {
                    return Some(token.to_string());
                }
            }
        }
    }

    None
}

/// Authentication middleware
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_session_token(request.headers())
        .filter(|token| !token.is_empty())
        .ok_or_else(|| ApiError::unauthorized("Unauthenticated."))?;

    let user = state
        .auth
        .authenticate(&token)
        .await?
        .ok_or_else(|| ApiError::unauthorized("Unauthenticated."))?;

    request.extensions_mut().insert(AuthenticatedUser(user));
    Ok(next.run(request).await)
}

/// Admin authorization middleware
pub async fn require_admin(request: Request, next: Next) -> Result<Response, ApiError> {
    let user = request
        .extensions()
        .get::<AuthenticatedUser>()
        .ok_or_else(|| ApiError::unauthorized("Unauthenticated."))?;

    if !user.0.is_admin() {
        return Err(ApiError::forbidden("This action is unauthorized."));
    }

    Ok(next.run(request).await)
}
