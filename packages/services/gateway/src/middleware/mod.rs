//! Gateway 미들웨어
//!
//! 요청 ID와 토큰 기반 인가 미들웨어를 정의합니다.

pub mod auth;

use axum::extract::Request;
use axum::http::HeaderValue;
use axum::middleware::Next;
use axum::response::Response;
use tracing::Instrument;
use uuid::Uuid;

pub use auth::{require_access, AuthGate, AuthenticatedUser};

tokio::task_local! {
    static REQUEST_ID: String;
}

/// 현재 요청의 ID (요청 처리 중이 아니면 `None`)
pub fn current_request_id() -> Option<String> {
    REQUEST_ID.try_with(|id| id.clone()).ok()
}

/// 요청마다 ID를 부여하고 `x-request-id` 응답 헤더로 돌려준다
pub async fn request_id(req: Request, next: Next) -> Response {
    let id = Uuid::new_v4().to_string();
    let span = tracing::debug_span!("request", request_id = %id);

    let mut resp = REQUEST_ID
        .scope(id.clone(), async move { next.run(req).await })
        .instrument(span)
        .await;
    if let Ok(value) = HeaderValue::from_str(&id) {
        resp.headers_mut().insert("x-request-id", value);
    }
    resp
}
