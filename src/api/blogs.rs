//! Blog API endpoints

use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::get,
    Extension, Router,
};

use crate::api::common::{created, message, ok, paginated, ApiResult, PaginationQuery, SearchQuery};
use crate::api::middleware::{AppState, AuthenticatedUser};
use crate::services::FormData;

const FILE_FIELDS: &[&str] = &["cover_image"];

/// Admin routes
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_blogs).post(create_blog))
        .route(
            "/{id}",
            get(get_blog).put(update_blog).patch(update_blog).delete(delete_blog),
        )
}

pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_published_blogs))
        .route("/{slug}", get(get_published_blog))
}

async fn list_blogs(
    State(state): State<AppState>,
    Query(page): Query<PaginationQuery>,
    Query(search): Query<SearchQuery>,
) -> ApiResult<impl IntoResponse> {
    let blogs = state
        .blogs
        .list(search.status()?, search.q(), &page.params())
        .await?;
    Ok(paginated(blogs.map(|b| state.storage.present(&b, FILE_FIELDS))))
}

async fn get_blog(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<impl IntoResponse> {
    let blog = state.blogs.get(id).await?;
    Ok(ok(state.storage.present(&blog, FILE_FIELDS)))
}

async fn create_blog(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(admin)): Extension<AuthenticatedUser>,
    form: FormData,
) -> ApiResult<impl IntoResponse> {
    let blog = state.blogs.create(&form, admin.id).await?;
    Ok(created(state.storage.present(&blog, FILE_FIELDS)))
}

async fn update_blog(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    form: FormData,
) -> ApiResult<impl IntoResponse> {
    let blog = state.blogs.update(id, &form).await?;
    Ok(ok(state.storage.present(&blog, FILE_FIELDS)))
}

async fn delete_blog(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<impl IntoResponse> {
    state.blogs.delete(id).await?;
    Ok(message("Blog deleted"))
}

async fn list_published_blogs(
    State(state): State<AppState>,
    Query(page): Query<PaginationQuery>,
    Query(search): Query<SearchQuery>,
) -> ApiResult<impl IntoResponse> {
    let blogs = state.blogs.list_published(search.q(), &page.params()).await?;
    Ok(paginated(blogs.map(|b| state.storage.present(&b, FILE_FIELDS))))
}

async fn get_published_blog(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let blog = state.blogs.get_published(&slug).await?;
    Ok(ok(state.storage.present(&blog, FILE_FIELDS)))
}
