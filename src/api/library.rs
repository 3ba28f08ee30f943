//! Library API endpoints

use axum::{
    extract::{Path, Query, State},
    http::header,
    response::IntoResponse,
    routing::{delete, get, post},
    Extension, Router,
};

use crate::api::common::{created, message, ok, paginated, ApiResult, PaginationQuery};
use crate::api::middleware::{AppState, AuthenticatedUser};
use crate::services::FormData;

/// Admin grant/revoke routes
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(grant))
        .route("/{user_id}/{product_id}", delete(revoke))
}

pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_library))
        .route("/{product_id}/download", get(download))
}

async fn list_library(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(user)): Extension<AuthenticatedUser>,
    Query(page): Query<PaginationQuery>,
) -> ApiResult<impl IntoResponse> {
    let items = state.library.list(user.id, &page.params()).await?;
    Ok(paginated(
        items.map(|item| state.storage.present(&item, &["product_cover_image"])),
    ))
}

async fn download(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(user)): Extension<AuthenticatedUser>,
    Path(product_id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    let file = state.library.download(user.id, product_id).await?;
    let disposition = format!(
        "attachment; filename=\"{}\"",
        file.file_name.replace(['"', '\\'], "")
    );
    Ok((
        [
            (header::CONTENT_TYPE, "application/octet-stream".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        file.bytes,
    ))
}

async fn grant(State(state): State<AppState>, form: FormData) -> ApiResult<impl IntoResponse> {
    let (entry, created_now) = state.library.grant(&form).await?;
    Ok(if created_now {
        created(entry).into_response()
    } else {
        ok(entry).into_response()
    })
}

async fn revoke(
    State(state): State<AppState>,
    Path((user_id, product_id)): Path<(i64, i64)>,
) -> ApiResult<impl IntoResponse> {
    state.library.revoke(user_id, product_id).await?;
    Ok(message("Library entry deleted"))
}
