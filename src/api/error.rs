use crate::application::lending::LendingError;
use crate::domain::IdentifierError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use super::types::ErrorResponse;

/// API層のエラー型
///
/// アプリケーション層のエラーをラップし、HTTPレスポンスへのマッピングを提供する。
#[derive(Debug)]
pub enum ApiError {
    Lending(LendingError),
    InvalidBookId(IdentifierError),
    BookNotFound,
}

impl From<LendingError> for ApiError {
    fn from(err: LendingError) -> Self {
        ApiError::Lending(err)
    }
}

impl From<IdentifierError> for ApiError {
    fn from(err: IdentifierError) -> Self {
        ApiError::InvalidBookId(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match self {
            // 400 Bad Request - パスの書籍IDが不正
            ApiError::InvalidBookId(e) => {
                (StatusCode::BAD_REQUEST, "INVALID_BOOK_ID", e.to_string())
            }

            // 404 Not Found - カタログに存在しない
            ApiError::BookNotFound => (
                StatusCode::NOT_FOUND,
                "BOOK_NOT_FOUND",
                "Book not found".to_string(),
            ),

            // 422 Unprocessable Entity - ビジネスルール違反
            ApiError::Lending(e @ LendingError::AlreadyBorrowed) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "ALREADY_BORROWED", e.to_string())
            }
            ApiError::Lending(e @ LendingError::CapacityExceeded) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "CAPACITY_EXCEEDED",
                e.to_string(),
            ),
            ApiError::Lending(e @ LendingError::NotBorrowed) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "NOT_BORROWED", e.to_string())
            }

            // 409 Conflict - 同時更新に負け続けた（時間をおいて再試行可能）
            ApiError::Lending(e @ LendingError::Contention { .. }) => {
                tracing::warn!("Ledger contention: {}", e);
                (StatusCode::CONFLICT, "CONTENTION", e.to_string())
            }

            // 504 Gateway Timeout - 期限内に完了しなかった
            ApiError::Lending(e @ LendingError::TimedOut(_)) => {
                tracing::error!("Lending operation timed out: {}", e);
                (StatusCode::GATEWAY_TIMEOUT, "TIMED_OUT", e.to_string())
            }

            // 503 Service Unavailable - 外部ストアの障害
            // 内部エラーの詳細はログに記録し、クライアントには一般的なメッセージのみを返す
            ApiError::Lending(LendingError::StoreUnavailable(e)) => {
                tracing::error!("Ledger store error: {}", e);
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "STORE_UNAVAILABLE",
                    "Ledger store unavailable".to_string(),
                )
            }
            ApiError::Lending(LendingError::CatalogLookupFailed(e)) => {
                tracing::error!("Catalog lookup error: {}", e);
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "CATALOG_UNAVAILABLE",
                    "Catalog unavailable".to_string(),
                )
            }
        };

        let body = Json(ErrorResponse::new(error_type, message));
        (status, body).into_response()
    }
}
