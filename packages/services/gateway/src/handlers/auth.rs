//! 로그인 및 현재 사용자

use std::sync::Arc;

use axum::{extract::State, Extension, Json};
use chrono::{DateTime, Utc};
use kg_core::AccessLevel;
use serde::{Deserialize, Serialize};

use super::users::UserView;
use crate::error::Result;
use crate::middleware::AuthenticatedUser;
use crate::state::AppState;

/// POST /api/auth/login 요청 본문
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub id: String,
    pub password: String,
}

/// POST /api/auth/login 응답 본문
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// POST /api/auth/login
///
/// 존재하지 않는 ID와 틀린 비밀번호는 같은 401 응답입니다.
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<LoginResponse>> {
    let user = state
        .users
        .authenticate(&request.id, &request.password)
        .await
        .inspect_err(|e| {
            if e.is_credential_failure() {
                tracing::warn!(user = %request.id, "login failed");
            }
        })?;

    let issued = state.tokens.issue_at(&user, Utc::now()).await?;
    tracing::info!(user = %user.id, jti = %issued.claims.jti, "issued access token");

    Ok(Json(LoginResponse {
        token: issued.token,
        expires_at: issued.claims.exp,
    }))
}

/// GET /api/me 응답 본문
#[derive(Debug, Serialize)]
pub struct MeResponse {
    #[serde(flatten)]
    pub user: UserView,

    /// 요청 시점의 유효 레벨
    pub effective_level: AccessLevel,
}

/// GET /api/me
pub async fn me(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthenticatedUser>,
) -> Result<Json<MeResponse>> {
    let user = state.users.get(&auth.id).await?;
    Ok(Json(MeResponse {
        user: UserView::from(&user),
        effective_level: auth.effective_level,
    }))
}
