//! Gateway 에러 타입

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// 자격 증명 실패 시 클라이언트에 보내는 메시지
///
/// 잘못된 서명, 만료, 존재하지 않는 사용자, 틀린 비밀번호 모두 같은 응답입니다.
pub const INVALID_CREDENTIALS_MESSAGE: &str = "invalid credentials";

/// Gateway 에러
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("bad request: {message}")]
    BadRequest { message: String },

    #[error("unauthorized: {message}")]
    Unauthorized { message: String },

    #[error("core error: {0}")]
    Core(#[from] kg_core::Error),
}

impl GatewayError {
    /// 자격 증명 실패 (401)
    pub fn invalid_credentials() -> Self {
        GatewayError::Unauthorized {
            message: INVALID_CREDENTIALS_MESSAGE.to_string(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        GatewayError::BadRequest {
            message: message.into(),
        }
    }
}

/// 에러 응답 JSON
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
    #[serde(rename = "requestId", skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            GatewayError::BadRequest { message } => {
                (StatusCode::BAD_REQUEST, "BAD_REQUEST", message.clone())
            }
            GatewayError::Unauthorized { message } => {
                (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", message.clone())
            }
            GatewayError::Core(e) if e.is_credential_failure() => (
                StatusCode::UNAUTHORIZED,
                "UNAUTHORIZED",
                INVALID_CREDENTIALS_MESSAGE.to_string(),
            ),
            GatewayError::Core(e @ kg_core::Error::StoreUnavailable { .. }) => {
                tracing::error!("Store error: {:?}", e);
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    e.code(),
                    "Backing store unavailable".to_string(),
                )
            }
            GatewayError::Core(
                e @ (kg_core::Error::KeyMaterial { .. }
                | kg_core::Error::PasswordHash { .. }
                | kg_core::Error::Json(_)),
            ) => {
                tracing::error!("Core error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "Internal server error".to_string(),
                )
            }
            GatewayError::Core(e) => {
                let status = StatusCode::from_u16(e.status_code())
                    .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
                (status, e.code(), e.to_string())
            }
        };

        let body = ErrorResponse {
            error: ErrorBody {
                code: code.to_string(),
                message,
                request_id: crate::middleware::current_request_id(),
            },
        };

        (status, Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, GatewayError>;

#[cfg(test)]
mod tests {
    use super::*;
    use kg_core::AccessLevel;

    fn status(err: GatewayError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn test_credential_failures_share_one_status() {
        let token = GatewayError::from(kg_core::Error::TokenExpired);
        let login = GatewayError::from(kg_core::Error::InvalidCredentials);
        let missing = GatewayError::invalid_credentials();

        for err in [token, login, missing] {
            assert_eq!(status(err), StatusCode::UNAUTHORIZED);
        }
    }

    #[test]
    fn test_core_status_mapping() {
        let cases = [
            (
                kg_core::Error::MalformedCredential {
                    reason: "x".to_string(),
                },
                StatusCode::BAD_REQUEST,
            ),
            (
                kg_core::Error::InsufficientAccess {
                    required: AccessLevel::Admin,
                    granted: AccessLevel::Reader,
                },
                StatusCode::FORBIDDEN,
            ),
            (
                kg_core::Error::ProtectedRecord {
                    id: "admin".to_string(),
                },
                StatusCode::FORBIDDEN,
            ),
            (
                kg_core::Error::StoreUnavailable {
                    reason: "timeout".to_string(),
                },
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                kg_core::Error::KeyMaterial {
                    reason: "bad".to_string(),
                },
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                kg_core::Error::PasswordHash {
                    reason: "bad params".to_string(),
                },
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, expected) in cases {
            assert_eq!(status(err.into()), expected);
        }
    }
}
