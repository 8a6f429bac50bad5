//! 헬스 체크

use std::sync::Arc;

use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::error::Result;
use crate::state::AppState;

/// GET /health
///
/// 서명 키가 로드되어 있으면 `ok`입니다.
pub async fn health_check(State(state): State<Arc<AppState>>) -> Result<Json<Value>> {
    state.keys.active().await?;
    Ok(Json(json!({ "status": "ok" })))
}
