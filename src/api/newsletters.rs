//! Newsletter and subscriber API endpoints

use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::{delete, get, post},
    Router,
};
use serde::Deserialize;
use serde_json::json;

use crate::api::common::{created, message, message_with, ok, paginated, ApiResult, PaginationQuery, SearchQuery};
use crate::api::middleware::AppState;
use crate::services::FormData;

/// Admin routes for `/newsletters` and `/newsletter-subscribers`
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/newsletters", get(list_newsletters).post(create_newsletter))
        .route(
            "/newsletters/{id}",
            get(get_newsletter)
                .put(update_newsletter)
                .patch(update_newsletter)
                .delete(delete_newsletter),
        )
        .route("/newsletters/{id}/send", post(send_newsletter))
        .route("/newsletter-subscribers", get(list_subscribers))
        .route("/newsletter-subscribers/{id}", delete(delete_subscriber))
}

pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/subscribe", post(subscribe))
        .route("/unsubscribe", post(unsubscribe))
}

#[derive(Debug, Deserialize)]
struct SubscriberQuery {
    active: Option<bool>,
}

async fn list_newsletters(
    State(state): State<AppState>,
    Query(page): Query<PaginationQuery>,
    Query(search): Query<SearchQuery>,
) -> ApiResult<impl IntoResponse> {
    let newsletters = state
        .newsletters
        .list(search.status()?, &page.params())
        .await?;
    Ok(paginated(newsletters))
}

async fn get_newsletter(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<impl IntoResponse> {
    Ok(ok(state.newsletters.get(id).await?))
}

async fn create_newsletter(State(state): State<AppState>, form: FormData) -> ApiResult<impl IntoResponse> {
    Ok(created(state.newsletters.create(&form).await?))
}

async fn update_newsletter(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    form: FormData,
) -> ApiResult<impl IntoResponse> {
    Ok(ok(state.newsletters.update(id, &form).await?))
}

async fn delete_newsletter(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<impl IntoResponse> {
    state.newsletters.delete(id).await?;
    Ok(message("Newsletter deleted"))
}

async fn send_newsletter(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<impl IntoResponse> {
    let delivery = state.newsletters.send(id).await?;
    Ok(message_with(
        format!("Newsletter sent to {} subscribers", delivery.delivered),
        json!({
            "newsletter": delivery.newsletter,
            "delivered": delivery.delivered,
            "failed": delivery.failed,
        }),
    ))
}

async fn list_subscribers(
    State(state): State<AppState>,
    Query(page): Query<PaginationQuery>,
    Query(query): Query<SubscriberQuery>,
) -> ApiResult<impl IntoResponse> {
    let subscribers = state
        .newsletters
        .list_subscribers(query.active, &page.params())
        .await?;
    Ok(paginated(subscribers))
}

async fn delete_subscriber(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<impl IntoResponse> {
    state.newsletters.delete_subscriber(id).await?;
    Ok(message("Subscriber deleted"))
}

async fn subscribe(State(state): State<AppState>, form: FormData) -> ApiResult<impl IntoResponse> {
    let subscriber = state
        .newsletters
        .subscribe(form.text("email").unwrap_or_default())
        .await?;
    Ok(message_with("Subscribed", subscriber))
}

async fn unsubscribe(State(state): State<AppState>, form: FormData) -> ApiResult<impl IntoResponse> {
    state
        .newsletters
        .unsubscribe(form.text("email").unwrap_or_default())
        .await?;
    Ok(message("Unsubscribed"))
}
