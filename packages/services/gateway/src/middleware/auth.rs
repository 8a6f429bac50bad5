//! 인가 미들웨어
//!
//! 보호된 라우트마다 요구 레벨을 정해 `route_layer`로 붙입니다.
//!
//! # 처리 순서
//!
//! 1. 헤더 파싱: 없거나 `Bearer <token>` 형태가 아니면 400
//! 2. 토큰 검증: 서명/알고리즘/만료 실패는 401
//! 3. 사용자 조회: 토큰의 `sub`가 없거나 세대가 다르면 401 (2와 같은 응답)
//! 4. 레벨 확인: 현재 사용자 레코드 기준 유효 레벨이 부족하면 403
//!
//! 권한은 토큰의 `access_level`이 아니라 매 요청 시점의 사용자 레코드에서 가져오므로
//! 레벨 변경과 삭제는 다음 요청부터 바로 반영됩니다.

use std::sync::Arc;

use axum::extract::rejection::RawPathParamsRejection;
use axum::extract::{RawPathParams, Request, State};
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::Response;
use kg_core::auth::BearerCredential;
use kg_core::policy::AccessPolicy;
use kg_core::AccessLevel;

use crate::error::{GatewayError, Result};
use crate::state::AppState;

/// 컨텍스트 ID를 담는 경로 파라미터 이름
pub const CONTEXT_PARAM: &str = "context_id";

/// 인가된 요청의 사용자 정보 (요청 extension)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub id: String,
    pub global_level: AccessLevel,
    pub effective_level: AccessLevel,
}

/// 라우트별 인가 설정
///
/// `axum::middleware::from_fn_with_state(gate, require_access)`로 감싸서 씁니다.
#[derive(Clone)]
pub struct AuthGate {
    state: Arc<AppState>,
    required: AccessLevel,
}

impl AuthGate {
    pub fn new(state: Arc<AppState>, required: AccessLevel) -> Self {
        Self { state, required }
    }
}

/// 인가 미들웨어
pub async fn require_access(
    State(gate): State<AuthGate>,
    params: std::result::Result<RawPathParams, RawPathParamsRejection>,
    mut req: Request,
    next: Next,
) -> Result<Response> {
    let context_id = params.ok().and_then(|params| {
        params
            .iter()
            .find(|(name, _)| *name == CONTEXT_PARAM)
            .map(|(_, value)| value.to_string())
    });

    let user = authorize_request(&gate.state, req.headers(), context_id.as_deref(), gate.required).await?;
    req.extensions_mut().insert(user);
    Ok(next.run(req).await)
}

/// 요청 헤더와 컨텍스트로 사용자 인가
pub async fn authorize_request(
    state: &AppState,
    headers: &HeaderMap,
    context_id: Option<&str>,
    required: AccessLevel,
) -> Result<AuthenticatedUser> {
    let header = headers
        .get(state.config.auth_header.as_str())
        .map(|v| v.to_str())
        .transpose()
        .map_err(|_| kg_core::Error::MalformedCredential {
            reason: "authorization header is not valid ASCII".to_string(),
        })?;

    let credential = BearerCredential::from_header(header)?;

    let claims = state.tokens.validate(&credential.token).await.map_err(|e| {
        if e.is_credential_failure() {
            tracing::warn!(error = %e, "rejected bearer token");
            GatewayError::invalid_credentials()
        } else {
            GatewayError::Core(e)
        }
    })?;

    let user = match state.users.get(&claims.sub).await {
        Ok(user) => user,
        Err(kg_core::Error::NotFound { .. }) => {
            tracing::warn!(user = %claims.sub, "token subject no longer exists");
            return Err(GatewayError::invalid_credentials());
        }
        Err(e) => return Err(e.into()),
    };

    if !claims.matches_user(&user) {
        tracing::warn!(user = %user.id, "token was issued for an earlier generation of this user");
        return Err(GatewayError::invalid_credentials());
    }

    let effective_level = state
        .policy
        .authorize(&user, context_id, required)
        .await
        .inspect_err(|e| {
            if let kg_core::Error::InsufficientAccess { .. } = e {
                tracing::warn!(user = %user.id, context = ?context_id, error = %e, "access denied");
            }
        })?;

    Ok(AuthenticatedUser {
        global_level: AccessPolicy::global_level(&user),
        effective_level,
        id: user.id,
    })
}
