//! Common API utilities and shared types
//!
//! Response envelopes, pagination and query filter parsing used by every
//! resource module.

use axum::{http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::api::middleware::ApiError;
use crate::models::{ListParams, PagedResult};
use crate::services::form::label;

pub type ApiResult<T> = Result<T, ApiError>;

// ============================================================================
// Pagination Query Types
// ============================================================================

/// `page` and `per_page` query parameters
#[derive(Debug, Default, Deserialize)]
pub struct PaginationQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

impl PaginationQuery {
    pub fn params(&self) -> ListParams {
        ListParams::from_query(self.page, self.per_page)
    }
}

/// The `q` and `status` filters most listings accept
#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
    pub status: Option<String>,
}

impl SearchQuery {
    pub fn q(&self) -> Option<&str> {
        self.q.as_deref().map(str::trim).filter(|q| !q.is_empty())
    }

    pub fn status<T: FromStr>(&self) -> ApiResult<Option<T>> {
        parse_filter("status", self.status.as_deref())
    }
}

/// Parse an optional enum filter; blank means no filter
pub fn parse_filter<T: FromStr>(name: &str, value: Option<&str>) -> ApiResult<Option<T>> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        None => Ok(None),
        Some(v) => v
            .parse::<T>()
            .map(Some)
            .map_err(|_| ApiError::field(name, format!("The selected {} is invalid.", label(name)))),
    }
}

// ============================================================================
// Envelopes
// ============================================================================

#[derive(Debug, Serialize)]
pub struct DataResponse<T> {
    pub data: T,
}

#[derive(Debug, Serialize)]
pub struct PageMeta {
    pub current_page: i64,
    pub per_page: i64,
    pub total: i64,
    pub last_page: i64,
}

#[derive(Debug, Serialize)]
pub struct PaginatedResponse<T> {
    pub data: Vec<T>,
    pub meta: PageMeta,
}

impl<T> From<PagedResult<T>> for PaginatedResponse<T> {
    fn from(page: PagedResult<T>) -> Self {
        let meta = PageMeta {
            current_page: page.page,
            per_page: page.per_page,
            total: page.total,
            last_page: page.last_page(),
        };
        Self {
            data: page.items,
            meta,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MessageResponse<T = ()> {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

pub fn ok<T>(data: T) -> Json<DataResponse<T>> {
    Json(DataResponse { data })
}

pub fn created<T>(data: T) -> (StatusCode, Json<DataResponse<T>>) {
    (StatusCode::CREATED, ok(data))
}

pub fn paginated<T>(page: PagedResult<T>) -> Json<PaginatedResponse<T>> {
    Json(page.into())
}

pub fn message(message: impl Into<String>) -> Json<MessageResponse> {
    Json(MessageResponse {
        message: message.into(),
        data: None,
    })
}

pub fn message_with<T>(message: impl Into<String>, data: T) -> Json<MessageResponse<T>> {
    Json(MessageResponse {
        message: message.into(),
        data: Some(data),
    })
}
