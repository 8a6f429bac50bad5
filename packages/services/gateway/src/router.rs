//! 라우터 구성
//!
//! 보호된 라우트는 요구 레벨별 인가 레이어를 `route_layer`로 붙입니다.
//! 같은 경로라도 메서드마다 요구 레벨이 다를 수 있습니다.

use std::sync::Arc;

use axum::middleware::{from_fn, from_fn_with_state};
use axum::routing::{delete, get, post, put};
use axum::Router;
use kg_core::AccessLevel;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{auth, contexts, health, users};
use crate::middleware::{self, require_access, AuthGate};
use crate::state::AppState;

/// 라우터 생성
pub fn create_router(state: Arc<AppState>) -> Router {
    let reader = from_fn_with_state(AuthGate::new(state.clone(), AccessLevel::Reader), require_access);
    let admin = from_fn_with_state(AuthGate::new(state.clone(), AccessLevel::Admin), require_access);

    Router::new()
        // Public
        .route("/health", get(health::health_check))
        .route("/api/auth/login", post(auth::login))
        // Current user
        .route("/api/me", get(auth::me).route_layer(reader.clone()))
        // Users
        .route(
            "/api/users",
            get(users::list_users)
                .post(users::add_user)
                .route_layer(admin.clone()),
        )
        .route(
            "/api/users/{user_id}",
            get(users::get_user)
                .patch(users::update_user)
                .delete(users::delete_user)
                .route_layer(admin.clone()),
        )
        // Contexts
        .route(
            "/api/contexts",
            get(contexts::list_contexts)
                .route_layer(reader.clone())
                .merge(post(contexts::add_context).route_layer(admin.clone())),
        )
        .route(
            "/api/contexts/{context_id}",
            get(contexts::get_context)
                .route_layer(reader)
                .merge(delete(contexts::delete_context).route_layer(admin.clone())),
        )
        .route(
            "/api/contexts/{context_id}/access",
            put(contexts::upsert_access).route_layer(admin.clone()),
        )
        .route(
            "/api/contexts/{context_id}/access/{user_id}",
            delete(contexts::remove_access).route_layer(admin),
        )
        // Middleware
        .layer(TimeoutLayer::new(state.config.request_timeout()))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .layer(from_fn(middleware::request_id))
        // State
        .with_state(state)
}
