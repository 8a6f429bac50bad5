//! 사용자 관리 (관리자 전용)

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use kg_core::credentials::{User, UserPatch};
use kg_core::AccessLevel;
use serde::{Deserialize, Serialize};

use crate::error::{GatewayError, Result};
use crate::state::AppState;

/// 응답용 사용자 표현 (비밀번호 해시 제외)
#[derive(Debug, Clone, Serialize)]
pub struct UserView {
    pub id: String,
    pub email: String,
    pub display_name: String,
    pub access_level: AccessLevel,
}

impl From<&User> for UserView {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            email: user.email.clone(),
            display_name: user.display_name.clone(),
            access_level: user.access_level,
        }
    }
}

/// POST /api/users 요청 본문
#[derive(Debug, Deserialize)]
pub struct NewUser {
    pub id: String,
    #[serde(default)]
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub display_name: String,
    pub access_level: AccessLevel,
}

/// GET /api/users
pub async fn list_users(State(state): State<Arc<AppState>>) -> Result<Json<Vec<UserView>>> {
    let users = state.users.list().await?;
    Ok(Json(users.iter().map(UserView::from).collect()))
}

/// POST /api/users
pub async fn add_user(
    State(state): State<Arc<AppState>>,
    Json(request): Json<NewUser>,
) -> Result<(StatusCode, Json<UserView>)> {
    if request.password.is_empty() {
        return Err(GatewayError::bad_request("password must not be empty"));
    }

    let user = User::new(request.id, request.email, &request.password, request.access_level)?
        .with_display_name(request.display_name);
    let user = state.users.add(user).await?;
    Ok((StatusCode::CREATED, Json(UserView::from(&user))))
}

/// GET /api/users/{user_id}
pub async fn get_user(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<Json<UserView>> {
    let user = state.users.get(&user_id).await?;
    Ok(Json(UserView::from(&user)))
}

/// PATCH /api/users/{user_id}
///
/// 보낸 필드만 바뀝니다. 레벨 변경은 다음 요청부터 바로 적용됩니다.
pub async fn update_user(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    Json(patch): Json<UserPatch>,
) -> Result<Json<UserView>> {
    if patch.is_empty() {
        return Err(GatewayError::bad_request("patch has no fields"));
    }
    if patch.password.as_deref() == Some("") {
        return Err(GatewayError::bad_request("password must not be empty"));
    }

    let user = state.users.update(&user_id, patch).await?;
    Ok(Json(UserView::from(&user)))
}

/// DELETE /api/users/{user_id}
///
/// 컨텍스트 오버라이드를 먼저 지우고 사용자를 삭제합니다.
/// 같은 ID로 다시 만든 사용자는 이전 오버라이드도 이전 토큰도 물려받지 않습니다.
pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<StatusCode> {
    if state.users.is_reserved(&user_id) {
        return Err(kg_core::Error::ProtectedRecord { id: user_id }.into());
    }
    state.users.get(&user_id).await?;

    state.contexts.remove_user(&user_id).await?;
    state.users.delete(&user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
