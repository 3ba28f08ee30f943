//! Admin user API endpoints

use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::get,
    Extension, Router,
};
use serde::Deserialize;

use crate::api::common::{created, message, ok, paginated, parse_filter, ApiResult, PaginationQuery};
use crate::api::middleware::{AppState, AuthenticatedUser};
use crate::models::{User, UserFilter};
use crate::services::FormData;

const FILE_FIELDS: &[&str] = &["avatar"];

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_users).post(create_user))
        .route("/{id}", get(get_user).put(update_user).patch(update_user).delete(delete_user))
}

#[derive(Debug, Deserialize)]
struct UserQuery {
    q: Option<String>,
    role: Option<String>,
    status: Option<String>,
}

fn present(state: &AppState, user: &User) -> serde_json::Value {
    state.storage.present(user, FILE_FIELDS)
}

async fn list_users(
    State(state): State<AppState>,
    Query(page): Query<PaginationQuery>,
    Query(query): Query<UserQuery>,
) -> ApiResult<impl IntoResponse> {
    let filter = UserFilter {
        q: query.q.filter(|q| !q.trim().is_empty()),
        role: parse_filter("role", query.role.as_deref())?,
        status: parse_filter("status", query.status.as_deref())?,
    };
    let users = state.users.list(&filter, &page.params()).await?;
    Ok(paginated(users.map(|u| present(&state, &u))))
}

async fn get_user(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<impl IntoResponse> {
    let user = state.users.get(id).await?;
    Ok(ok(present(&state, &user)))
}

async fn create_user(State(state): State<AppState>, form: FormData) -> ApiResult<impl IntoResponse> {
    let user = state.users.create(&form).await?;
    Ok(created(present(&state, &user)))
}

async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    form: FormData,
) -> ApiResult<impl IntoResponse> {
    let user = state.users.update(id, &form).await?;
    Ok(ok(present(&state, &user)))
}

async fn delete_user(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(admin)): Extension<AuthenticatedUser>,
    Path(id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    state.users.delete(id, admin.id).await?;
    Ok(message("User deleted"))
}
