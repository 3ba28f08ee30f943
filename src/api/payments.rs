//! Payment submission and review API endpoints

use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::{get, post},
    Extension, Router,
};
use serde::Deserialize;
use serde_json::json;

use crate::api::common::{created, message_with, ok, paginated, parse_filter, ApiResult, PaginationQuery};
use crate::api::middleware::{AppState, AuthenticatedUser};
use crate::models::TransactionFilter;
use crate::services::FormData;

const FILE_FIELDS: &[&str] = &["proof_image"];

/// Admin review routes
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_payments))
        .route("/{id}", get(get_payment))
        .route("/{id}/approve", post(approve_payment))
        .route("/{id}/reject", post(reject_payment))
}

/// Customer routes
pub fn protected_router() -> Router<AppState> {
    Router::new().route("/", get(list_my_payments).post(submit_payment))
}

#[derive(Debug, Deserialize)]
struct PaymentQuery {
    status: Option<String>,
    user_id: Option<i64>,
}

async fn submit_payment(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(user)): Extension<AuthenticatedUser>,
    form: FormData,
) -> ApiResult<impl IntoResponse> {
    let transaction = state.payments.submit(user.id, &form).await?;
    Ok(created(state.storage.present(&transaction, FILE_FIELDS)))
}

async fn list_my_payments(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(user)): Extension<AuthenticatedUser>,
    Query(page): Query<PaginationQuery>,
) -> ApiResult<impl IntoResponse> {
    let payments = state.payments.list_mine(user.id, &page.params()).await?;
    Ok(paginated(payments.map(|p| state.storage.present(&p, FILE_FIELDS))))
}

async fn list_payments(
    State(state): State<AppState>,
    Query(page): Query<PaginationQuery>,
    Query(query): Query<PaymentQuery>,
) -> ApiResult<impl IntoResponse> {
    let filter = TransactionFilter {
        status: parse_filter("status", query.status.as_deref())?,
        user_id: query.user_id,
    };
    let payments = state.payments.list(&filter, &page.params()).await?;
    Ok(paginated(payments.map(|p| state.storage.present(&p, FILE_FIELDS))))
}

async fn get_payment(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<impl IntoResponse> {
    let transaction = state.payments.get(id).await?;
    Ok(ok(state.storage.present(&transaction, FILE_FIELDS)))
}

async fn approve_payment(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(admin)): Extension<AuthenticatedUser>,
    Path(id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    let (transaction, approval) = state.payments.approve(id, admin.id).await?;
    let mut data = state.storage.present(&transaction, FILE_FIELDS);
    data["library_entry"] = json!(approval.library_entry);
    data["commission_id"] = json!(approval.commission_id);
    Ok(message_with("Payment approved", data))
}

async fn reject_payment(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(admin)): Extension<AuthenticatedUser>,
    Path(id): Path<i64>,
    form: FormData,
) -> ApiResult<impl IntoResponse> {
    let transaction = state.payments.reject(id, admin.id, form.text("reason")).await?;
    Ok(message_with("Payment rejected", state.storage.present(&transaction, FILE_FIELDS)))
}
