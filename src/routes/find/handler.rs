use axum::{
    extract::{Json, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;

use super::model::{CreateFindRequest, DeleteFindRequest, Find, Reaction, ReactionRequest};
use crate::AppState;
use crate::pagination::Cursor;
use crate::utils::{error_codes, error_to_api_response, success_to_api_response};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListFindsQuery {
    pub limit: Option<i64>,
    pub cursor: Option<String>,
}

#[axum::debug_handler]
pub async fn list_finds(
    State(state): State<AppState>,
    Path(group_id): Path<String>,
    Query(query): Query<ListFindsQuery>,
) -> impl IntoResponse {
    let cursor = Cursor::parse(query.cursor.as_deref());

    match Find::list(&state.pool, &group_id, query.limit, cursor).await {
        Ok(page) => (StatusCode::OK, success_to_api_response(page)),
        Err(e) => {
            tracing::error!("Failed to list finds: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                error_to_api_response(error_codes::INTERNAL_ERROR, e.to_string()),
            )
        }
    }
}

#[axum::debug_handler]
pub async fn create_find(
    State(state): State<AppState>,
    Json(req): Json<CreateFindRequest>,
) -> impl IntoResponse {
    match Find::create(&state.pool, req).await {
        Ok(find) => (StatusCode::CREATED, success_to_api_response(find)),
        Err(e) => {
            tracing::error!("Failed to create find: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                error_to_api_response(error_codes::INTERNAL_ERROR, e.to_string()),
            )
        }
    }
}

#[axum::debug_handler]
pub async fn delete_find(
    State(state): State<AppState>,
    Json(req): Json<DeleteFindRequest>,
) -> impl IntoResponse {
    match Find::delete(&state.pool, req.find_id, &req.account_name).await {
        Ok(_) => (
            StatusCode::OK,
            success_to_api_response(serde_json::json!({
                "success": true
            })),
        ),
        Err(e) => {
            tracing::error!("Failed to delete find {}: {}", req.find_id, e);
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

#[axum::debug_handler]
pub async fn add_reaction(
    State(state): State<AppState>,
    Json(req): Json<ReactionRequest>,
) -> impl IntoResponse {
    match Reaction::add(&state.pool, req).await {
        Ok(_) => (
            StatusCode::CREATED,
            success_to_api_response(serde_json::json!({
                "success": true
            })),
        ),
        Err(e) => {
            tracing::error!("Failed to add reaction: {}", e);
            let (status, code) = if matches!(e, sqlx::Error::RowNotFound) {
                (StatusCode::NOT_FOUND, error_codes::NOT_FOUND)
            } else {
                (StatusCode::INTERNAL_SERVER_ERROR, error_codes::INTERNAL_ERROR)
            };
            (status, error_to_api_response(code, e.to_string()))
        }
    }
}

#[axum::debug_handler]
pub async fn remove_reaction(
    State(state): State<AppState>,
    Json(req): Json<ReactionRequest>,
) -> impl IntoResponse {
    match Reaction::remove(&state.pool, req).await {
        Ok(_) => (
            StatusCode::OK,
            success_to_api_response(serde_json::json!({
                "success": true
            })),
        ),
        Err(e) => {
            tracing::error!("Failed to remove reaction: {}", e);
            let (status, code) = if matches!(e, sqlx::Error::RowNotFound) {
                (StatusCode::NOT_FOUND, error_codes::NOT_FOUND)
            } else {
                (StatusCode::INTERNAL_SERVER_ERROR, error_codes::INTERNAL_ERROR)
            };
            (status, error_to_api_response(code, e.to_string()))
        }
    }
}
