use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::provider::ProviderError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("Purchase provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::Database(ref e) => {
                tracing::error!("Database error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "DATABASE_ERROR",
                    "An internal database error occurred".to_string(),
                )
            }
            ApiError::Provider(ref e) => match e {
                ProviderError::Unavailable(msg) => {
                    tracing::warn!("Purchase provider unavailable: {}", msg);
                    (
                        StatusCode::SERVICE_UNAVAILABLE,
                        "PROVIDER_UNAVAILABLE",
                        "The store is temporarily unavailable, please try again".to_string(),
                    )
                }
                // Operator mistake (product missing from the storefront
                // configuration), never the user's fault. Log loudly,
                // surface a generic message.
                ProviderError::ProductNotFound(product_id) => {
                    tracing::error!(
                        "Product '{}' not found in storefront configuration",
                        product_id
                    );
                    (
                        StatusCode::UNPROCESSABLE_ENTITY,
                        "PRODUCT_NOT_FOUND",
                        "Something went wrong, please try again or contact support".to_string(),
                    )
                }
                ProviderError::NotConfigured | ProviderError::AlreadyConfigured(_) => {
                    tracing::error!("Purchase provider misuse: {}", e);
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "PROVIDER_ERROR",
                        "An internal error occurred".to_string(),
                    )
                }
                ProviderError::Unknown(msg) => {
                    tracing::error!("Unknown purchase provider error: {}", msg);
                    (
                        StatusCode::BAD_GATEWAY,
                        "PROVIDER_ERROR",
                        "The store returned an unexpected response".to_string(),
                    )
                }
            },
            ApiError::BadRequest(ref msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            ApiError::NotFound(ref msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            ApiError::Unauthorized(ref msg) => {
                (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg.clone())
            }
            ApiError::InvalidToken(ref msg) => {
                (StatusCode::UNAUTHORIZED, "INVALID_TOKEN", msg.clone())
            }
            ApiError::Internal(ref e) => {
                tracing::error!("Internal error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal error occurred".to_string(),
                )
            }
        };

        let body = json!({
            "success": false,
            "error": {
                "code": error_code,
                "message": message,
            }
        });

        (status, Json(body)).into_response()
    }
}

// Helper type for results
pub type Result<T> = std::result::Result<T, ApiError>;
