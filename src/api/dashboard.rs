//! Admin dashboard endpoint

use axum::{extract::State, response::IntoResponse, routing::get, Router};

use crate::api::common::{ok, ApiResult};
use crate::api::middleware::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(stats))
}

async fn stats(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    Ok(ok(state.dashboard.stats().await?))
}
