//! Product API endpoints

use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::get,
    Router,
};

use crate::api::common::{created, message, ok, paginated, ApiResult, PaginationQuery, SearchQuery};
use crate::api::middleware::AppState;
use crate::models::Product;
use crate::services::FormData;

const FILE_FIELDS: &[&str] = &["cover_image"];

/// Admin routes
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_products).post(create_product))
        .route(
            "/{id}",
            get(get_product).put(update_product).patch(update_product).delete(delete_product),
        )
}

pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_published_products))
        .route("/{slug}", get(get_published_product))
}

fn present(state: &AppState, product: &Product) -> serde_json::Value {
    let mut value = state.storage.present(product, FILE_FIELDS);
    value["has_file"] = serde_json::Value::Bool(product.has_file());
    value
}

async fn list_products(
    State(state): State<AppState>,
    Query(page): Query<PaginationQuery>,
    Query(search): Query<SearchQuery>,
) -> ApiResult<impl IntoResponse> {
    let products = state
        .products
        .list(search.status()?, search.q(), &page.params())
        .await?;
    Ok(paginated(products.map(|p| present(&state, &p))))
}

async fn get_product(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<impl IntoResponse> {
    let product = state.products.get(id).await?;
    Ok(ok(present(&state, &product)))
}

async fn create_product(State(state): State<AppState>, form: FormData) -> ApiResult<impl IntoResponse> {
    let product = state.products.create(&form).await?;
    Ok(created(present(&state, &product)))
}

async fn update_product(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    form: FormData,
) -> ApiResult<impl IntoResponse> {
    let product = state.products.update(id, &form).await?;
    Ok(ok(present(&state, &product)))
}

async fn delete_product(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<impl IntoResponse> {
    state.products.delete(id).await?;
    Ok(message("Product deleted"))
}

async fn list_published_products(
    State(state): State<AppState>,
    Query(page): Query<PaginationQuery>,
    Query(search): Query<SearchQuery>,
) -> ApiResult<impl IntoResponse> {
    let products = state.products.list_published(search.q(), &page.params()).await?;
    Ok(paginated(products.map(|p| present(&state, &p))))
}

async fn get_published_product(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let product = state.products.get_published(&slug).await?;
    Ok(ok(present(&state, &product)))
}
