use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use axum_extra::extract::Query;
use serde::Deserialize;

use super::model::{CreateHaveItemRequest, HaveItem, HaveItemFilter, ItemActionRequest};
use crate::AppState;
use crate::pagination::Cursor;
use crate::utils::{error_codes, error_to_api_response, success_to_api_response};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListHaveItemsQuery {
    pub limit: Option<i64>,
    pub tab: Option<String>,
    pub account_name: Option<String>,
    pub search: Option<String>,
    #[serde(default)]
    pub qualities: Vec<String>,
    pub reservable: Option<bool>,
    pub cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CountsQuery {
    pub account_name: Option<String>,
}

#[axum::debug_handler]
pub async fn list_have_items(
    State(state): State<AppState>,
    Path(group_id): Path<String>,
    Query(query): Query<ListHaveItemsQuery>,
) -> impl IntoResponse {
    let filter = HaveItemFilter {
        account_name: query.account_name,
        tab: query.tab,
        search: query.search,
        qualities: query.qualities,
        reservable: query.reservable,
        cursor: Cursor::parse(query.cursor.as_deref()),
    };

    match HaveItem::list(&state.pool, &group_id, &filter, query.limit).await {
        Ok(page) => (StatusCode::OK, success_to_api_response(page)),
        Err(e) => {
            tracing::error!("Failed to list have items: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                error_to_api_response(error_codes::INTERNAL_ERROR, e.to_string()),
            )
        }
    }
}

#[axum::debug_handler]
pub async fn get_counts(
    State(state): State<AppState>,
    Path(group_id): Path<String>,
    Query(query): Query<CountsQuery>,
) -> impl IntoResponse {
    let Some(account_name) = query.account_name else {
        return (
            StatusCode::BAD_REQUEST,
            error_to_api_response(
                error_codes::VALIDATION_ERROR,
                "accountName is required".to_string(),
            ),
        );
    };

    match HaveItem::counts(&state.pool, &group_id, &account_name).await {
        Ok(counts) => (StatusCode::OK, success_to_api_response(counts)),
        Err(e) => {
            tracing::error!("Failed to count have items: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                error_to_api_response(error_codes::INTERNAL_ERROR, e.to_string()),
            )
        }
    }
}

#[axum::debug_handler]
pub async fn create_have_item(
    State(state): State<AppState>,
    Json(req): Json<CreateHaveItemRequest>,
) -> impl IntoResponse {
    match HaveItem::create(&state.pool, req).await {
        Ok(item) => (StatusCode::CREATED, success_to_api_response(item)),
        Err(e) => {
            tracing::error!("Failed to create have item: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                error_to_api_response(error_codes::INTERNAL_ERROR, e.to_string()),
            )
        }
    }
}

#[axum::debug_handler]
pub async fn reserve_item(
    State(state): State<AppState>,
    Json(req): Json<ItemActionRequest>,
) -> impl IntoResponse {
    match HaveItem::reserve(&state.pool, req.item_id, &req.account_name).await {
        Ok(item) => (StatusCode::OK, success_to_api_response(item)),
        Err(e) => {
            tracing::error!("Failed to reserve item {}: {}", req.item_id, e);
            let (status, code) = if matches!(e, sqlx::Error::RowNotFound) {
                (StatusCode::NOT_FOUND, error_codes::NOT_FOUND)
            } else if e.to_string().contains("your own item") {
                (StatusCode::FORBIDDEN, error_codes::PERMISSION_DENIED)
            } else {
                (StatusCode::INTERNAL_SERVER_ERROR, error_codes::INTERNAL_ERROR)
            };
            (status, error_to_api_response(code, e.to_string()))
        }
    }
}

#[axum::debug_handler]
pub async fn release_item(
    State(state): State<AppState>,
    Json(req): Json<ItemActionRequest>,
) -> impl IntoResponse {
    match HaveItem::release(&state.pool, req.item_id, &req.account_name).await {
        Ok(item) => (StatusCode::OK, success_to_api_response(item)),
        Err(e) => {
            tracing::error!("Failed to release item {}: {}", req.item_id, e);
            let (status, code) = if matches!(e, sqlx::Error::RowNotFound) {
                (StatusCode::NOT_FOUND, error_codes::NOT_FOUND)
            } else if e.to_string().contains("release a reservation") {
                (StatusCode::FORBIDDEN, error_codes::PERMISSION_DENIED)
            } else {
                (StatusCode::INTERNAL_SERVER_ERROR, error_codes::INTERNAL_ERROR)
            };
            (status, error_to_api_response(code, e.to_string()))
        }
    }
}

#[axum::debug_handler]
pub async fn delete_have_item(
    State(state): State<AppState>,
    Json(req): Json<ItemActionRequest>,
) -> impl IntoResponse {
    match HaveItem::delete(&state.pool, req.item_id, &req.account_name).await {
        Ok(_) => (
            StatusCode::OK,
            success_to_api_response(serde_json::json!({
                "success": true
            })),
        ),
        Err(e) => {
            tracing::error!("Failed to delete have item {}: {}", req.item_id, e);
            let (status, code) = if matches!(e, sqlx::Error::RowNotFound) {
                (StatusCode::NOT_FOUND, error_codes::NOT_FOUND)
            } else if e.to_string().contains("Only the finder") {
                (StatusCode::FORBIDDEN, error_codes::PERMISSION_DENIED)
            } else {
                (StatusCode::INTERNAL_SERVER_ERROR, error_codes::INTERNAL_ERROR)
            };
            (status, error_to_api_response(code, e.to_string()))
        }
    }
}
