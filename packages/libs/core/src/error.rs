//! 공통 에러 타입
//!
//! Kubegate 인증/인가 서브시스템 전체에서 사용되는 에러 타입을 정의합니다.

use thiserror::Error;

use crate::access::AccessLevel;

pub type Result<T> = std::result::Result<T, Error>;

/// Kubegate 공통 에러
#[derive(Debug, Error)]
pub enum Error {
    // ─────────────────────────────────────────────────────────────────────────────
    // Auth Errors
    // ─────────────────────────────────────────────────────────────────────────────
    #[error("malformed credential: {reason}")]
    MalformedCredential { reason: String },

    #[error("token expired")]
    TokenExpired,

    #[error("invalid token: {reason}")]
    InvalidToken { reason: String },

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("insufficient access: required {required}, granted {granted}")]
    InsufficientAccess {
        required: AccessLevel,
        granted: AccessLevel,
    },

    #[error("unrecognized access level: {value}")]
    UnrecognizedAccessLevel { value: String },

    #[error("password hashing failed: {reason}")]
    PasswordHash { reason: String },

    // ─────────────────────────────────────────────────────────────────────────────
    // Key Material Errors
    // ─────────────────────────────────────────────────────────────────────────────
    #[error("key material error: {reason}")]
    KeyMaterial { reason: String },

    // ─────────────────────────────────────────────────────────────────────────────
    // Store Errors
    // ─────────────────────────────────────────────────────────────────────────────
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("{kind} already exists: {id}")]
    AlreadyExists { kind: &'static str, id: String },

    #[error("record '{id}' is protected and cannot be deleted")]
    ProtectedRecord { id: String },

    #[error("concurrent modification of '{name}', retry the request")]
    Conflict { name: String },

    #[error("backing store unavailable: {reason}")]
    StoreUnavailable { reason: String },

    // ─────────────────────────────────────────────────────────────────────────────
    // Serialization Errors
    // ─────────────────────────────────────────────────────────────────────────────
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// HTTP 상태 코드로 변환
    pub fn status_code(&self) -> u16 {
        match self {
            // 400 Bad Request
            Error::MalformedCredential { .. }
            | Error::UnrecognizedAccessLevel { .. }
            | Error::Json(_) => 400,

            // 401 Unauthorized
            Error::TokenExpired | Error::InvalidToken { .. } | Error::InvalidCredentials => 401,

            // 403 Forbidden
            Error::InsufficientAccess { .. } | Error::ProtectedRecord { .. } => 403,

            // 404 Not Found
            Error::NotFound { .. } => 404,

            // 409 Conflict
            Error::AlreadyExists { .. } | Error::Conflict { .. } => 409,

            // 503 Service Unavailable
            Error::StoreUnavailable { .. } => 503,

            // 500 Internal Server Error
            Error::KeyMaterial { .. } | Error::PasswordHash { .. } => 500,
        }
    }

    /// 에러 코드 (클라이언트용)
    pub fn code(&self) -> &'static str {
        match self {
            Error::MalformedCredential { .. } => "MALFORMED_REQUEST",
            Error::TokenExpired => "TOKEN_EXPIRED",
            Error::InvalidToken { .. } => "INVALID_TOKEN",
            Error::InvalidCredentials => "INVALID_CREDENTIALS",
            Error::InsufficientAccess { .. } => "INSUFFICIENT_ACCESS",
            Error::UnrecognizedAccessLevel { .. } => "UNRECOGNIZED_ACCESS_LEVEL",
            Error::PasswordHash { .. } => "PASSWORD_HASH_ERROR",
            Error::KeyMaterial { .. } => "KEY_MATERIAL_ERROR",
            Error::NotFound { .. } => "NOT_FOUND",
            Error::AlreadyExists { .. } => "ALREADY_EXISTS",
            Error::ProtectedRecord { .. } => "PROTECTED_RECORD",
            Error::Conflict { .. } => "CONFLICT",
            Error::StoreUnavailable { .. } => "STORE_UNAVAILABLE",
            Error::Json(_) => "JSON_ERROR",
        }
    }

    /// 토큰 검증 실패 여부 (서명/알고리즘/만료)
    pub fn is_credential_failure(&self) -> bool {
        matches!(
            self,
            Error::TokenExpired | Error::InvalidToken { .. } | Error::InvalidCredentials
        )
    }

    pub(crate) fn invalid_token(reason: impl Into<String>) -> Self {
        Error::InvalidToken {
            reason: reason.into(),
        }
    }

    pub(crate) fn key_material(reason: impl Into<String>) -> Self {
        Error::KeyMaterial {
            reason: reason.into(),
        }
    }

    pub(crate) fn store_unavailable(reason: impl Into<String>) -> Self {
        Error::StoreUnavailable {
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(Error::TokenExpired.status_code(), 401);
        assert_eq!(
            Error::ProtectedRecord {
                id: "admin".to_string()
            }
            .status_code(),
            403
        );
        assert_eq!(Error::store_unavailable("timeout").status_code(), 503);
        assert_eq!(
            Error::MalformedCredential {
                reason: "missing".to_string()
            }
            .code(),
            "MALFORMED_REQUEST"
        );
    }

    #[test]
    fn test_credential_failure() {
        assert!(Error::TokenExpired.is_credential_failure());
        assert!(Error::invalid_token("bad signature").is_credential_failure());
        assert!(!Error::store_unavailable("down").is_credential_failure());
    }
}
