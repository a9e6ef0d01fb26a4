// region:    --- Imports
use crate::auction::commands::{
    handle_create_auction as command_create_auction,
    handle_delete_auction as command_delete_auction,
    handle_update_auction as command_update_auction, CommandError,
};
use crate::auction::model::{CreateAuctionCommand, UpdateAuctionPatch};
use crate::database::DatabaseManager;
use crate::message_broker::KafkaProducer;
use crate::query;
use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

// endregion: --- Imports

// region:    --- Helpers

/// 요청자 신원 추출
/// 인증 자체는 게이트웨이 담당이고, 여기서는 전달된 사용자 이름만 사용한다
fn caller_identity(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-username")
        .and_then(|value| value.to_str().ok())
        .map(|value| value.to_string())
        .filter(|value| !value.is_empty())
}

/// 신원 누락 응답
fn missing_identity_response() -> Response {
    (
        axum::http::StatusCode::UNAUTHORIZED,
        Json(serde_json::json!({
            "error": "요청자 정보(x-username 헤더)가 필요합니다.",
            "code": "UNAUTHORIZED"
        })),
    )
        .into_response()
}

/// 커맨드 오류를 HTTP 응답으로 변환
fn command_error_response(error: CommandError) -> Response {
    match error {
        CommandError::NotFound => (
            axum::http::StatusCode::NOT_FOUND,
            Json(serde_json::json!({
                "error": "경매를 찾을 수 없습니다.",
                "code": "NOT_FOUND"
            })),
        )
            .into_response(),
        CommandError::Forbidden => (
            axum::http::StatusCode::FORBIDDEN,
            Json(serde_json::json!({
                "error": "판매자만 경매를 변경할 수 있습니다.",
                "code": "FORBIDDEN"
            })),
        )
            .into_response(),
        CommandError::Validation(message) => (
            axum::http::StatusCode::BAD_REQUEST,
            Json(serde_json::json!({
                "error": message,
                "code": "VALIDATION"
            })),
        )
            .into_response(),
        CommandError::Database(message) => (
            axum::http::StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({
                "error": message,
                "code": "DATABASE"
            })),
        )
            .into_response(),
        // 저장은 커밋되었으나 이벤트 발행이 실패한 경우: 호출자가 후속 조치를 해야 한다
        CommandError::Publication(message) => (
            axum::http::StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({
                "error": message,
                "code": "PUBLISH_FAILED"
            })),
        )
            .into_response(),
    }
}

// endregion: --- Helpers

// region:    --- Command Handlers

/// 경매 생성 요청 처리
pub async fn handle_create_auction(
    State((db_manager, kafka_producer)): State<(Arc<DatabaseManager>, Arc<KafkaProducer>)>,
    headers: HeaderMap,
    Json(cmd): Json<CreateAuctionCommand>,
) -> impl IntoResponse {
    info!("{:<12} --> 경매 생성 요청 처리 시작: {:?}", "Handler", cmd);

    let Some(seller) = caller_identity(&headers) else {
        return missing_identity_response();
    };

    match command_create_auction(cmd, &seller, &db_manager, &*kafka_producer).await {
        Ok(auction) => (axum::http::StatusCode::CREATED, Json(auction)).into_response(),
        Err(e) => command_error_response(e),
    }
}

/// 경매 수정 요청 처리
pub async fn handle_update_auction(
    State((db_manager, kafka_producer)): State<(Arc<DatabaseManager>, Arc<KafkaProducer>)>,
    Path(auction_id): Path<i64>,
    headers: HeaderMap,
    Json(patch): Json<UpdateAuctionPatch>,
) -> impl IntoResponse {
    info!(
        "{:<12} --> 경매 수정 요청 처리 시작 id: {}",
        "Handler", auction_id
    );

    let Some(caller) = caller_identity(&headers) else {
        return missing_identity_response();
    };

    match command_update_auction(auction_id, &caller, patch, &db_manager, &*kafka_producer).await {
        Ok(auction) => Json(auction).into_response(),
        Err(e) => command_error_response(e),
    }
}

/// 경매 삭제 요청 처리
pub async fn handle_delete_auction(
    State((db_manager, kafka_producer)): State<(Arc<DatabaseManager>, Arc<KafkaProducer>)>,
    Path(auction_id): Path<i64>,
    headers: HeaderMap,
) -> impl IntoResponse {
    info!(
        "{:<12} --> 경매 삭제 요청 처리 시작 id: {}",
        "Handler", auction_id
    );

    let Some(caller) = caller_identity(&headers) else {
        return missing_identity_response();
    };

    match command_delete_auction(auction_id, &caller, &db_manager, &*kafka_producer).await {
        Ok(()) => axum::http::StatusCode::OK.into_response(),
        Err(e) => command_error_response(e),
    }
}

// endregion: --- Command Handlers

// region:    --- Query Handlers

/// 경매 목록 조회 파라미터
#[derive(Debug, Deserialize)]
pub struct ListAuctionsParams {
    pub date: Option<String>,
}

/// 경매 목록 조회
pub async fn handle_get_auctions(
    State((db_manager, _)): State<(Arc<DatabaseManager>, Arc<KafkaProducer>)>,
    Query(params): Query<ListAuctionsParams>,
) -> impl IntoResponse {
    info!(
        "{:<12} --> 경매 목록 조회 date: {:?}",
        "HandlerQuery", params.date
    );

    let since = match params.date.as_deref() {
        Some(date) => match DateTime::parse_from_rfc3339(date) {
            Ok(parsed) => Some(parsed.with_timezone(&Utc)),
            Err(e) => {
                return (
                    axum::http::StatusCode::BAD_REQUEST,
                    Json(serde_json::json!({
                        "error": format!("date 파라미터 파싱 실패: {}", e),
                        "code": "VALIDATION"
                    })),
                )
                    .into_response()
            }
        },
        None => None,
    };

    match query::handlers::get_all_auctions(&db_manager, since).await {
        Ok(auctions) => Json(auctions).into_response(),
        Err(e) => (axum::http::StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

/// 경매 조회
pub async fn handle_get_auction(
    State((db_manager, _)): State<(Arc<DatabaseManager>, Arc<KafkaProducer>)>,
    Path(auction_id): Path<i64>,
) -> impl IntoResponse {
    info!("{:<12} --> 경매 조회 id: {}", "HandlerQuery", auction_id);
    match query::handlers::get_auction(&db_manager, auction_id).await {
        Ok(Some(auction)) => Json(auction).into_response(),
        Ok(None) => (
            axum::http::StatusCode::NOT_FOUND,
            Json(serde_json::json!({
                "error": "경매를 찾을 수 없습니다.",
                "code": "NOT_FOUND"
            })),
        )
            .into_response(),
        Err(e) => (axum::http::StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

// endregion: --- Query Handlers
