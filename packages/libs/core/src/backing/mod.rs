//! 백킹 스토어 어댑터
//!
//! 네임스페이스 단위의 평면 key→bytes 레코드 저장소입니다.
//! 실제 운영 환경에서는 오케스트레이션 API의 시크릿 객체가 이 역할을 합니다.
//!
//! # 계약
//!
//! - `get`: 레코드 전체 조회 (없으면 `None`)
//! - `create`: 새 레코드 생성 (이미 있으면 `AlreadyExists`)
//! - `update`: 레코드 전체 교체. `version`이 현재 값과 다르면 `Conflict`
//!
//! # 모듈 구조
//!
//! - `memory`: 프로세스 메모리 구현 (테스트/개발용)
//! - `file`: 디렉터리 기반 JSON 파일 구현

use std::collections::BTreeMap;
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{Error, Result};

mod file;
mod memory;

pub use file::FileBackingStore;
pub use memory::MemoryBackingStore;

/// 백킹 레코드
///
/// 하나의 이름 있는 객체와 그 필드 맵입니다.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackingRecord {
    /// 네임스페이스
    pub namespace: String,

    /// 레코드 이름
    pub name: String,

    /// 필드 맵 (field → bytes)
    pub data: BTreeMap<String, Vec<u8>>,

    /// 불투명 버전 (조건부 쓰기용, 생성 전에는 `None`)
    pub version: Option<String>,
}

impl BackingRecord {
    /// 빈 레코드 생성
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            data: BTreeMap::new(),
            version: None,
        }
    }

    /// 필드 조회
    pub fn field(&self, key: &str) -> Option<&[u8]> {
        self.data.get(key).map(Vec::as_slice)
    }

    /// 필드 설정
    pub fn set_field(&mut self, key: impl Into<String>, value: impl Into<Vec<u8>>) {
        self.data.insert(key.into(), value.into());
    }

    /// 필드 제거
    pub fn remove_field(&mut self, key: &str) -> Option<Vec<u8>> {
        self.data.remove(key)
    }

    /// 로그용 `namespace/name`
    pub fn path(&self) -> String {
        format!("{}/{}", self.namespace, self.name)
    }
}

/// 백킹 스토어 트레이트
#[async_trait]
pub trait BackingStore: Send + Sync {
    /// 레코드 조회
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<BackingRecord>>;

    /// 레코드 생성, 생성된 버전을 반환
    async fn create(&self, record: &BackingRecord) -> Result<String>;

    /// 레코드 교체 (버전 일치 시에만), 새 버전을 반환
    async fn update(&self, record: &BackingRecord) -> Result<String>;
}

/// 백킹 스토어 호출에 시간 제한을 건다
///
/// 시간이 초과되면 내부 future는 drop되어 취소되고 `StoreUnavailable`이 반환됩니다.
pub async fn bounded<T, F>(limit: Duration, operation: &str, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(Error::store_unavailable(format!(
            "{operation} timed out after {}ms",
            limit.as_millis()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_bounded_times_out() {
        let result: Result<()> = bounded(Duration::from_millis(10), "get users", async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;

        let err = result.unwrap_err();
        assert!(matches!(err, Error::StoreUnavailable { .. }));
        assert!(err.to_string().contains("get users"));
    }

    #[tokio::test]
    async fn test_bounded_passes_through() {
        let value = bounded(Duration::from_secs(1), "get", async { Ok(7) }).await.unwrap();
        assert_eq!(value, 7);
    }
}
