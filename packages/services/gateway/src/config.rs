//! Gateway 설정

use std::env;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Gateway 설정
#[derive(Clone)]
pub struct Config {
    /// 서버 포트
    pub port: u16,

    /// 백킹 스토어 네임스페이스
    pub namespace: String,

    /// 파일 저장소 디렉터리 (없으면 메모리 저장소)
    pub data_dir: Option<PathBuf>,

    /// Bearer 토큰 헤더 이름 (소문자)
    pub auth_header: String,

    /// 토큰 수명 (시간)
    pub token_ttl_hours: i64,

    /// 백킹 스토어 호출 제한 시간 (ms)
    pub store_timeout_ms: u64,

    /// 요청 전체 제한 시간 (초)
    pub request_timeout_secs: u64,

    /// 기본 관리자 비밀번호 (설정 시 admin 사용자 생성)
    pub admin_password: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8080,
            namespace: "kubegate".to_string(),
            data_dir: None,
            auth_header: "authorization".to_string(),
            token_ttl_hours: kg_core::auth::DEFAULT_TOKEN_TTL_HOURS,
            store_timeout_ms: 5000,
            request_timeout_secs: 30,
            admin_password: None,
        }
    }
}

impl Config {
    /// 환경변수에서 설정 로드
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = Self::default();

        let token_ttl_hours: i64 = match env::var("KG_TOKEN_TTL_HOURS") {
            Ok(v) => v.parse()?,
            Err(_) => defaults.token_ttl_hours,
        };
        if token_ttl_hours <= 0 {
            anyhow::bail!("KG_TOKEN_TTL_HOURS must be positive, got {token_ttl_hours}");
        }

        Ok(Self {
            port: env::var("KG_PORT")
                .unwrap_or_else(|_| defaults.port.to_string())
                .parse()?,

            namespace: env::var("KG_NAMESPACE").unwrap_or(defaults.namespace),

            data_dir: env::var("KG_DATA_DIR")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from),

            auth_header: env::var("KG_AUTH_HEADER")
                .map(|v| v.trim().to_ascii_lowercase())
                .unwrap_or(defaults.auth_header),

            token_ttl_hours,

            store_timeout_ms: positive(
                "KG_STORE_TIMEOUT_MS",
                env::var("KG_STORE_TIMEOUT_MS").ok(),
                defaults.store_timeout_ms,
            )?,

            request_timeout_secs: positive(
                "KG_REQUEST_TIMEOUT_SECS",
                env::var("KG_REQUEST_TIMEOUT_SECS").ok(),
                defaults.request_timeout_secs,
            )?,

            admin_password: env::var("KG_ADMIN_PASSWORD")
                .ok()
                .filter(|v| !v.is_empty()),
        })
    }

    pub fn token_ttl(&self) -> chrono::Duration {
        chrono::Duration::hours(self.token_ttl_hours)
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// 0보다 큰 정수 설정값 파싱 (값이 없으면 기본값)
fn positive(name: &str, raw: Option<String>, default: u64) -> anyhow::Result<u64> {
    let Some(raw) = raw else {
        return Ok(default);
    };
    let value: u64 = raw
        .trim()
        .parse()
        .map_err(|e| anyhow::anyhow!("{name} must be a positive integer, got {raw:?}: {e}"))?;
    if value == 0 {
        anyhow::bail!("{name} must be positive, got 0");
    }
    Ok(value)
}

// 시작 로그에 비밀번호가 남지 않도록 직접 구현
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("port", &self.port)
            .field("namespace", &self.namespace)
            .field("data_dir", &self.data_dir)
            .field("auth_header", &self.auth_header)
            .field("token_ttl_hours", &self.token_ttl_hours)
            .field("store_timeout_ms", &self.store_timeout_ms)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("admin_password", &self.admin_password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}
