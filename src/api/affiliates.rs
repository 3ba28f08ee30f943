//! Affiliate program, link and commission API endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Extension, Router,
};

use crate::api::common::{created, message, message_with, ok, paginated, ApiResult, PaginationQuery, SearchQuery};
use crate::api::middleware::{AppState, AuthenticatedUser};
use crate::models::ActiveStatus;
use crate::services::FormData;

/// Admin routes for programs and commissions
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/affiliate-programs", get(list_programs).post(create_program))
        .route(
            "/affiliate-programs/{id}",
            get(get_program)
                .put(update_program)
                .patch(update_program)
                .delete(delete_program),
        )
        .route("/affiliate-commissions", get(list_commissions))
        .route("/affiliate-commissions/{id}/mark-paid", post(mark_paid))
}

/// Active programs, readable without an account
pub fn public_router() -> Router<AppState> {
    Router::new().route("/", get(list_active_programs))
}

/// Routes for the signed-in affiliate
pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/programs/{id}/join", post(join_program))
        .route("/links", get(my_links))
        .route("/commissions", get(my_commissions))
}

async fn list_programs(
    State(state): State<AppState>,
    Query(page): Query<PaginationQuery>,
    Query(search): Query<SearchQuery>,
) -> ApiResult<impl IntoResponse> {
    let programs = state
        .affiliates
        .list_programs(search.status()?, &page.params())
        .await?;
    Ok(paginated(programs))
}

async fn get_program(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<impl IntoResponse> {
    Ok(ok(state.affiliates.get_program(id).await?))
}

async fn create_program(State(state): State<AppState>, form: FormData) -> ApiResult<impl IntoResponse> {
    Ok(created(state.affiliates.create_program(&form).await?))
}

async fn update_program(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    form: FormData,
) -> ApiResult<impl IntoResponse> {
    Ok(ok(state.affiliates.update_program(id, &form).await?))
}

async fn delete_program(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<impl IntoResponse> {
    state.affiliates.delete_program(id).await?;
    Ok(message("Affiliate program deleted"))
}

async fn list_commissions(
    State(state): State<AppState>,
    Query(page): Query<PaginationQuery>,
    Query(search): Query<SearchQuery>,
) -> ApiResult<impl IntoResponse> {
    let commissions = state
        .affiliates
        .list_commissions(search.status()?, &page.params())
        .await?;
    Ok(paginated(commissions))
}

async fn mark_paid(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<impl IntoResponse> {
    let commission = state.affiliates.mark_paid(id).await?;
    Ok(message_with("Commission marked as paid", commission))
}

async fn list_active_programs(
    State(state): State<AppState>,
    Query(page): Query<PaginationQuery>,
) -> ApiResult<impl IntoResponse> {
    let programs = state
        .affiliates
        .list_programs(Some(ActiveStatus::Active), &page.params())
        .await?;
    Ok(paginated(programs))
}

async fn join_program(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(user)): Extension<AuthenticatedUser>,
    Path(id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    let (link, joined) = state.affiliates.join(id, user.id).await?;
    let status = if joined { StatusCode::CREATED } else { StatusCode::OK };
    Ok((status, ok(link)))
}

async fn my_links(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(user)): Extension<AuthenticatedUser>,
) -> ApiResult<impl IntoResponse> {
    Ok(ok(state.affiliates.my_links(user.id).await?))
}

async fn my_commissions(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(user)): Extension<AuthenticatedUser>,
    Query(page): Query<PaginationQuery>,
) -> ApiResult<impl IntoResponse> {
    let commissions = state.affiliates.my_commissions(user.id, &page.params()).await?;
    Ok(paginated(commissions))
}
