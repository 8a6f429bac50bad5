//! Gateway 앱 상태

use std::sync::Arc;

use anyhow::Context as _;
use kg_core::auth::TokenService;
use kg_core::backing::{BackingStore, FileBackingStore, MemoryBackingStore};
use kg_core::credentials::{ContextStore, UserStore};
use kg_core::keys::KeyMaterial;
use kg_core::policy::AccessPolicy;

use crate::config::Config;

/// 앱 상태
///
/// 모든 핸들러와 인가 미들웨어에서 공유하는 상태입니다.
pub struct AppState {
    /// 설정
    pub config: Config,

    /// 토큰 서명 키
    pub keys: Arc<KeyMaterial>,

    /// 토큰 발급/검증
    pub tokens: TokenService,

    /// 사용자 저장소
    pub users: Arc<UserStore>,

    /// 컨텍스트 저장소
    pub contexts: Arc<ContextStore>,

    /// 접근 정책
    pub policy: AccessPolicy,
}

impl AppState {
    /// 설정에 맞는 백킹 스토어로 상태 생성
    pub async fn new(config: &Config) -> anyhow::Result<Self> {
        let backing: Arc<dyn BackingStore> = match &config.data_dir {
            Some(dir) => {
                tracing::info!("Using file backing store at {}", dir.display());
                Arc::new(FileBackingStore::new(dir))
            }
            None => {
                tracing::warn!("KG_DATA_DIR not set, using in-memory store (state is lost on restart)");
                Arc::new(MemoryBackingStore::new())
            }
        };

        Self::with_backing(config, backing).await
    }

    /// 주어진 백킹 스토어로 상태 생성
    ///
    /// 서명 키를 먼저 로드(없으면 생성)하므로 키 문제는 기동 시점에 드러납니다.
    pub async fn with_backing(config: &Config, backing: Arc<dyn BackingStore>) -> anyhow::Result<Self> {
        let timeout = config.store_timeout();

        let keys = Arc::new(
            KeyMaterial::new(backing.clone(), config.namespace.clone()).with_timeout(timeout),
        );
        keys.active()
            .await
            .context("failed to load token signing keys")?;

        let tokens = TokenService::new(keys.clone()).with_ttl(config.token_ttl());

        let users = Arc::new(UserStore::new(backing.clone(), config.namespace.clone()).with_timeout(timeout));
        let contexts = Arc::new(
            ContextStore::new(backing, config.namespace.clone()).with_timeout(timeout),
        );

        match &config.admin_password {
            Some(password) => {
                users
                    .ensure_default_admin(password)
                    .await
                    .context("failed to seed default admin")?;
            }
            None => tracing::debug!("KG_ADMIN_PASSWORD not set, skipping admin seed"),
        }
        contexts
            .ensure_own_context()
            .await
            .context("failed to seed own-context")?;

        let policy = AccessPolicy::new(contexts.clone());

        Ok(Self {
            config: config.clone(),
            keys,
            tokens,
            users,
            contexts,
            policy,
        })
    }
}

#[cfg(test)]
pub(crate) const TEST_ADMIN_PASSWORD: &str = "admin-pw";

/// 메모리 저장소와 기본 관리자를 가진 테스트용 상태
#[cfg(test)]
pub(crate) async fn test_state(config: Config) -> Arc<AppState> {
    let config = Config {
        admin_password: Some(TEST_ADMIN_PASSWORD.to_string()),
        ..config
    };
    let state = AppState::with_backing(&config, Arc::new(MemoryBackingStore::new()))
        .await
        .unwrap();
    Arc::new(state)
}
