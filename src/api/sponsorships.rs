//! Sponsored post API endpoints

use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::get,
    Router,
};

use crate::api::common::{created, message, ok, paginated, ApiResult, PaginationQuery, SearchQuery};
use crate::api::middleware::AppState;
use crate::models::ContentStatus;
use crate::services::FormData;

const FILE_FIELDS: &[&str] = &["image"];

/// Admin routes
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_posts).post(create_post))
        .route(
            "/{id}",
            get(get_post).put(update_post).patch(update_post).delete(delete_post),
        )
}

pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_published_posts))
        .route("/{slug}", get(get_published_post))
}

async fn list_posts(
    State(state): State<AppState>,
    Query(page): Query<PaginationQuery>,
    Query(search): Query<SearchQuery>,
) -> ApiResult<impl IntoResponse> {
    let posts = state
        .sponsorships
        .list(search.status()?, search.q(), &page.params())
        .await?;
    Ok(paginated(posts.map(|p| state.storage.present(&p, FILE_FIELDS))))
}

async fn get_post(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<impl IntoResponse> {
    let post = state.sponsorships.get(id).await?;
    Ok(ok(state.storage.present(&post, FILE_FIELDS)))
}

async fn create_post(State(state): State<AppState>, form: FormData) -> ApiResult<impl IntoResponse> {
    let post = state.sponsorships.create(&form).await?;
    Ok(created(state.storage.present(&post, FILE_FIELDS)))
}

async fn update_post(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    form: FormData,
) -> ApiResult<impl IntoResponse> {
    let post = state.sponsorships.update(id, &form).await?;
    Ok(ok(state.storage.present(&post, FILE_FIELDS)))
}

async fn delete_post(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<impl IntoResponse> {
    state.sponsorships.delete(id).await?;
    Ok(message("Sponsored post deleted"))
}

async fn list_published_posts(
    State(state): State<AppState>,
    Query(page): Query<PaginationQuery>,
    Query(search): Query<SearchQuery>,
) -> ApiResult<impl IntoResponse> {
    let posts = state
        .sponsorships
        .list(Some(ContentStatus::Published), search.q(), &page.params())
        .await?;
    Ok(paginated(posts.map(|p| state.storage.present(&p, FILE_FIELDS))))
}

async fn get_published_post(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let post = state.sponsorships.get_published(&slug).await?;
    Ok(ok(state.storage.present(&post, FILE_FIELDS)))
}
