//! Job posting API endpoints

use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::get,
    Extension, Router,
};

use crate::api::common::{created, message, ok, paginated, ApiResult, PaginationQuery, SearchQuery};
use crate::api::middleware::{AppState, AuthenticatedUser};
use crate::services::FormData;

/// Admin routes
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_jobs).post(create_job))
        .route(
            "/{id}",
            get(get_job).put(update_job).patch(update_job).delete(delete_job),
        )
}

pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_open_jobs))
        .route("/{slug}", get(get_open_job))
}

async fn list_jobs(
    State(state): State<AppState>,
    Query(page): Query<PaginationQuery>,
    Query(search): Query<SearchQuery>,
) -> ApiResult<impl IntoResponse> {
    let jobs = state
        .jobs
        .list(search.status()?, search.q(), &page.params())
        .await?;
    Ok(paginated(jobs))
}

async fn get_job(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<impl IntoResponse> {
    Ok(ok(state.jobs.get(id).await?))
}

async fn create_job(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(admin)): Extension<AuthenticatedUser>,
    form: FormData,
) -> ApiResult<impl IntoResponse> {
    Ok(created(state.jobs.create(&form, admin.id).await?))
}

async fn update_job(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    form: FormData,
) -> ApiResult<impl IntoResponse> {
    Ok(ok(state.jobs.update(id, &form).await?))
}

async fn delete_job(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<impl IntoResponse> {
    state.jobs.delete(id).await?;
    Ok(message("Job posting deleted"))
}

async fn list_open_jobs(
    State(state): State<AppState>,
    Query(page): Query<PaginationQuery>,
    Query(search): Query<SearchQuery>,
) -> ApiResult<impl IntoResponse> {
    Ok(paginated(state.jobs.list_open(search.q(), &page.params()).await?))
}

async fn get_open_job(State(state): State<AppState>, Path(slug): Path<String>) -> ApiResult<impl IntoResponse> {
    Ok(ok(state.jobs.get_open(&slug).await?))
}
