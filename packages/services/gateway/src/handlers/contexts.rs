//! 컨텍스트 관리

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use kg_core::credentials::Context;
use kg_core::AccessLevel;
use serde::Deserialize;
use serde_json::Value;

use crate::error::Result;
use crate::state::AppState;

/// POST /api/contexts 요청 본문
#[derive(Debug, Deserialize)]
pub struct NewContext {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub connection_config: Value,
}

/// PUT /api/contexts/{context_id}/access 요청 본문
#[derive(Debug, Deserialize)]
pub struct AccessGrant {
    pub user_id: String,
    pub access_level: AccessLevel,
}

/// GET /api/contexts
pub async fn list_contexts(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Context>>> {
    Ok(Json(state.contexts.list().await?))
}

/// POST /api/contexts
pub async fn add_context(
    State(state): State<Arc<AppState>>,
    Json(request): Json<NewContext>,
) -> Result<(StatusCode, Json<Context>)> {
    let context = Context::new(request.id, request.name, request.connection_config);
    let context = state.contexts.add(context).await?;
    Ok((StatusCode::CREATED, Json(context)))
}

/// GET /api/contexts/{context_id}
pub async fn get_context(
    State(state): State<Arc<AppState>>,
    Path(context_id): Path<String>,
) -> Result<Json<Context>> {
    Ok(Json(state.contexts.get(&context_id).await?))
}

/// DELETE /api/contexts/{context_id}
pub async fn delete_context(
    State(state): State<Arc<AppState>>,
    Path(context_id): Path<String>,
) -> Result<StatusCode> {
    state.contexts.delete(&context_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// PUT /api/contexts/{context_id}/access
///
/// 존재하는 사용자에게만 오버라이드를 줄 수 있습니다.
pub async fn upsert_access(
    State(state): State<Arc<AppState>>,
    Path(context_id): Path<String>,
    Json(grant): Json<AccessGrant>,
) -> Result<Json<Context>> {
    state.users.get(&grant.user_id).await?;
    let context = state
        .contexts
        .upsert_access(&context_id, &grant.user_id, grant.access_level)
        .await?;
    Ok(Json(context))
}

/// DELETE /api/contexts/{context_id}/access/{user_id}
pub async fn remove_access(
    State(state): State<Arc<AppState>>,
    Path((context_id, user_id)): Path<(String, String)>,
) -> Result<Json<Context>> {
    let context = state.contexts.remove_access(&context_id, &user_id).await?;
    Ok(Json(context))
}
