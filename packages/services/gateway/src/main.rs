//! Kubegate Gateway
//!
//! 사용자/컨텍스트 관리 API와 Bearer 토큰 기반 인가를 제공합니다.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod error;
mod handlers;
mod middleware;
mod router;
mod state;

use config::Config;
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 로컬 개발용 .env (운영에서는 없어도 됨)
    dotenvy::dotenv().ok();

    // RUST_LOG가 없으면 gateway/core는 debug, 요청 로그는 tower_http
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            "kg_gateway=debug,kg_core=debug,tower_http=debug".into()
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // KG_* 값이 잘못되면 기본값으로 넘어가지 않고 기동 실패
    let config = Config::from_env()?;
    tracing::info!("Starting Gateway with config: {:?}", config);

    // 서명 키를 읽지(또는 만들지) 못하면 토큰을 검증할 수 없으므로 포트를 열기 전에 종료.
    // 기본 관리자와 own-context도 여기서 시드된다.
    let state = Arc::new(AppState::new(&config).await?);
    let app = router::create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr).await?;
    tracing::info!("Gateway listening on {}", addr);

    // 진행 중인 요청은 끝까지 처리하고 종료
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
