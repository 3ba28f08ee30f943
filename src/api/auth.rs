//! Authentication API endpoints

use axum::{
    extract::State,
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Extension, Router,
};

use crate::api::common::{created, message, ok, ApiResult};
use crate::api::middleware::{extract_session_token, ApiError, AppState, AuthenticatedUser};
use crate::services::{AuthSession, FormData};

pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
}

pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/logout", post(logout))
        .route("/me", get(me))
}

fn session_cookie(session: &AuthSession, days: i64) -> ApiResult<HeaderValue> {
    let cookie = format!(
        "session={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        session.token,
        days * 24 * 60 * 60
    );
    HeaderValue::from_str(&cookie).map_err(|e| {
        tracing::error!("Invalid session cookie: {}", e);
        ApiError::internal_error()
    })
}

async fn register(State(state): State<AppState>, form: FormData) -> ApiResult<Response> {
    let session = state.auth.register(&form).await?;
    let cookie = session_cookie(&session, state.session_days)?;
    let mut response = created(session).into_response();
    response.headers_mut().insert(header::SET_COOKIE, cookie);
    Ok(response)
}

async fn login(State(state): State<AppState>, form: FormData) -> ApiResult<Response> {
    let email = form.text("email").unwrap_or_default();
    let password = form.secret("password").unwrap_or_default();
    let session = state.auth.login(email, password).await?;

    let cookie = session_cookie(&session, state.session_days)?;
    let mut response = ok(session).into_response();
    response.headers_mut().insert(header::SET_COOKIE, cookie);
    Ok(response)
}

async fn logout(State(state): State<AppState>, headers: HeaderMap) -> ApiResult<impl IntoResponse> {
    if let Some(token) = extract_session_token(&headers) {
        state.auth.logout(&token).await?;
    }
    let clear_cookie = "session=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0";
    Ok((
        StatusCode::OK,
        [(header::SET_COOKIE, HeaderValue::from_static(clear_cookie))],
        message("Logged out"),
    ))
}

async fn me(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(user)): Extension<AuthenticatedUser>,
) -> impl IntoResponse {
    ok(state.storage.present(&user, &["avatar"]))
}
