//! API layer - HTTP handlers and routing
//!
//! Route groups:
//! - `/api/auth/*` registration, login and the current session
//! - `/api/admin/*` resource management, admin role required
//! - customer routes (payments, library, affiliate links), login required
//! - public catalogue reads and newsletter subscriptions
//!
//! The public upload disk is served under its configured URL prefix.

pub mod ads;
pub mod affiliates;
pub mod auth;
pub mod blogs;
pub mod common;
pub mod dashboard;
pub mod form;
pub mod jobs;
pub mod library;
pub mod listings;
pub mod middleware;
pub mod newsletters;
pub mod payments;
pub mod products;
pub mod sponsorships;
pub mod users;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    middleware as axum_middleware,
    Router,
};
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, services::ServeDir, trace::TraceLayer,
};

use crate::config::Config;

pub use middleware::{ApiError, AppState, AuthenticatedUser};

/// Multipart framing on top of the largest allowed upload
const BODY_LIMIT_MARGIN: usize = 1024 * 1024;

/// Build the `/api` router
pub fn build_api_router(state: AppState) -> Router<AppState> {
    // Admin routes (need admin role)
    let admin = Router::new()
        .nest("/dashboard", dashboard::router())
        .nest("/users", users::router())
        .nest("/products", products::router())
        .nest("/payments", payments::router())
        .nest("/library", library::router())
        .nest("/blogs", blogs::router())
        .nest("/services", listings::router())
        .nest("/jobs", jobs::router())
        .nest("/sponsorships", sponsorships::router())
        .merge(ads::router())
        .merge(affiliates::router())
        .merge(newsletters::router());

    let admin_routes = Router::new()
        .nest("/admin", admin)
        .route_layer(axum_middleware::from_fn(middleware::require_admin))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ));

    // Protected routes (need auth but not admin)
    let protected_routes = Router::new()
        .nest("/auth", auth::protected_router())
        .nest("/payments", payments::protected_router())
        .nest("/library", library::protected_router())
        .nest("/affiliate", affiliates::protected_router())
        .route_layer(axum_middleware::from_fn_with_state(
            state,
            middleware::require_auth,
        ));

    // Public routes
    Router::new()
        .nest("/auth", auth::public_router())
        .nest("/products", products::public_router())
        .nest("/blogs", blogs::public_router())
        .nest("/services", listings::public_router())
        .nest("/jobs", jobs::public_router())
        .nest("/sponsorships", sponsorships::public_router())
        .nest("/ads", ads::public_router())
        .nest("/affiliate-programs", affiliates::public_router())
        .nest("/newsletter", newsletters::public_router())
        .merge(admin_routes)
        .merge(protected_routes)
}

/// Build the complete router with middleware
pub fn build_router(state: AppState, config: &Config) -> Router {
    let mut cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::PATCH, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::COOKIE])
        .allow_credentials(true);
    match config.server.cors_origin.parse::<HeaderValue>() {
        Ok(origin) => cors = cors.allow_origin(origin),
        Err(_) => tracing::warn!(
            "Ignoring invalid CORS origin {:?}",
            config.server.cors_origin
        ),
    }

    let body_limit = usize::try_from(config.upload.max_file_size)
        .unwrap_or(usize::MAX)
        .saturating_add(BODY_LIMIT_MARGIN);
    let mut router = Router::new().nest("/api", build_api_router(state.clone()));
    // Absolute public URLs point at an external host that serves the disk.
    let prefix = config.upload.public_url.trim_end_matches('/');
    if prefix.starts_with('/') && prefix.len() > 1 {
        router = router.nest_service(prefix, ServeDir::new(&config.upload.path));
    }

    router
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CompressionLayer::new())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
