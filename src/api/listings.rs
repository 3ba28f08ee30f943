//! Service listing API endpoints

use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::get,
    Extension, Router,
};

use crate::api::common::{created, message, ok, paginated, ApiResult, PaginationQuery, SearchQuery};
use crate::api::middleware::{AppState, AuthenticatedUser};
use crate::models::ActiveStatus;
use crate::services::FormData;

const FILE_FIELDS: &[&str] = &["image"];

/// Admin routes
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_listings).post(create_listing))
        .route(
            "/{id}",
            get(get_listing).put(update_listing).patch(update_listing).delete(delete_listing),
        )
}

pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_active_listings))
        .route("/{slug}", get(get_active_listing))
}

async fn list_listings(
    State(state): State<AppState>,
    Query(page): Query<PaginationQuery>,
    Query(search): Query<SearchQuery>,
) -> ApiResult<impl IntoResponse> {
    let listings = state
        .service_listings
        .list(search.status()?, search.q(), &page.params())
        .await?;
    Ok(paginated(listings.map(|l| state.storage.present(&l, FILE_FIELDS))))
}

async fn get_listing(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<impl IntoResponse> {
    let listing = state.service_listings.get(id).await?;
    Ok(ok(state.storage.present(&listing, FILE_FIELDS)))
}

async fn create_listing(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(admin)): Extension<AuthenticatedUser>,
    form: FormData,
) -> ApiResult<impl IntoResponse> {
    let listing = state.service_listings.create(&form, admin.id).await?;
    Ok(created(state.storage.present(&listing, FILE_FIELDS)))
}

async fn update_listing(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    form: FormData,
) -> ApiResult<impl IntoResponse> {
    let listing = state.service_listings.update(id, &form).await?;
    Ok(ok(state.storage.present(&listing, FILE_FIELDS)))
}

async fn delete_listing(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<impl IntoResponse> {
    state.service_listings.delete(id).await?;
    Ok(message("Service deleted"))
}

async fn list_active_listings(
    State(state): State<AppState>,
    Query(page): Query<PaginationQuery>,
    Query(search): Query<SearchQuery>,
) -> ApiResult<impl IntoResponse> {
    let listings = state
        .service_listings
        .list(Some(ActiveStatus::Active), search.q(), &page.params())
        .await?;
    Ok(paginated(listings.map(|l| state.storage.present(&l, FILE_FIELDS))))
}

async fn get_active_listing(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let listing = state.service_listings.get_active(&slug).await?;
    Ok(ok(state.storage.present(&listing, FILE_FIELDS)))
}
