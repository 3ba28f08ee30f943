//! Ad slot and native ad API endpoints

use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use serde::Deserialize;

use crate::api::common::{created, message, message_with, ok, paginated, parse_filter, ApiResult, PaginationQuery, SearchQuery};
use crate::api::middleware::{ApiError, AppState};
use crate::models::AdPlacement;
use crate::services::FormData;

const FILE_FIELDS: &[&str] = &["image"];

/// Admin routes for `/ad-slots` and `/ads`
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/ad-slots", get(list_slots).post(create_slot))
        .route(
            "/ad-slots/{id}",
            get(get_slot).put(update_slot).patch(update_slot).delete(delete_slot),
        )
        .route("/ads", get(list_ads).post(create_ad))
        .route(
            "/ads/{id}",
            get(get_ad).put(update_ad).patch(update_ad).delete(delete_ad),
        )
        .route("/ads/{id}/approve", post(approve_ad))
        .route("/ads/{id}/reject", post(reject_ad))
}

pub fn public_router() -> Router<AppState> {
    Router::new().route("/{placement}", get(live_ads))
}

#[derive(Debug, Deserialize)]
struct SlotQuery {
    placement: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AdQuery {
    ad_slot_id: Option<i64>,
}

// ============================================================================
// Slots
// ============================================================================

async fn list_slots(
    State(state): State<AppState>,
    Query(page): Query<PaginationQuery>,
    Query(search): Query<SearchQuery>,
    Query(query): Query<SlotQuery>,
) -> ApiResult<impl IntoResponse> {
    let placement = parse_filter("placement", query.placement.as_deref())?;
    let slots = state
        .ads
        .list_slots(placement, search.status()?, &page.params())
        .await?;
    Ok(paginated(slots))
}

async fn get_slot(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<impl IntoResponse> {
    Ok(ok(state.ads.get_slot(id).await?))
}

async fn create_slot(State(state): State<AppState>, form: FormData) -> ApiResult<impl IntoResponse> {
    Ok(created(state.ads.create_slot(&form).await?))
}

async fn update_slot(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    form: FormData,
) -> ApiResult<impl IntoResponse> {
    Ok(ok(state.ads.update_slot(id, &form).await?))
}

async fn delete_slot(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<impl IntoResponse> {
    state.ads.delete_slot(id).await?;
    Ok(message("Ad slot deleted"))
}

// ============================================================================
// Native ads
// ============================================================================

async fn list_ads(
    State(state): State<AppState>,
    Query(page): Query<PaginationQuery>,
    Query(search): Query<SearchQuery>,
    Query(query): Query<AdQuery>,
) -> ApiResult<impl IntoResponse> {
    let ads = state
        .ads
        .list_ads(query.ad_slot_id, search.status()?, &page.params())
        .await?;
    Ok(paginated(ads.map(|ad| state.storage.present(&ad, FILE_FIELDS))))
}

async fn get_ad(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<impl IntoResponse> {
    let ad = state.ads.get_ad(id).await?;
    Ok(ok(state.storage.present(&ad, FILE_FIELDS)))
}

async fn create_ad(State(state): State<AppState>, form: FormData) -> ApiResult<impl IntoResponse> {
    let ad = state.ads.create_ad(&form).await?;
    Ok(created(state.storage.present(&ad, FILE_FIELDS)))
}

async fn update_ad(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    form: FormData,
) -> ApiResult<impl IntoResponse> {
    let ad = state.ads.update_ad(id, &form).await?;
    Ok(ok(state.storage.present(&ad, FILE_FIELDS)))
}

async fn delete_ad(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<impl IntoResponse> {
    state.ads.delete_ad(id).await?;
    Ok(message("Ad deleted"))
}

async fn approve_ad(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<impl IntoResponse> {
    let ad = state.ads.approve(id).await?;
    Ok(message_with("Ad approved", state.storage.present(&ad, FILE_FIELDS)))
}

async fn reject_ad(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<impl IntoResponse> {
    let ad = state.ads.reject(id).await?;
    Ok(message_with("Ad rejected", state.storage.present(&ad, FILE_FIELDS)))
}

// ============================================================================
// Public
// ============================================================================

async fn live_ads(State(state): State<AppState>, Path(placement): Path<String>) -> ApiResult<impl IntoResponse> {
    let placement: AdPlacement = placement
        .parse()
        .map_err(|_| ApiError::field("placement", "The selected placement is invalid."))?;
    let ads = state.ads.live(placement).await?;
    let ads: Vec<_> = ads
        .iter()
        .map(|ad| state.storage.present(ad, FILE_FIELDS))
        .collect();
    Ok(ok(ads))
}
