//! 메모리 백킹 스토어

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{BackingRecord, BackingStore};
use crate::error::{Error, Result};

/// 프로세스 메모리에 레코드를 보관하는 백킹 스토어
///
/// 버전은 레코드별 단조 증가 카운터입니다.
#[derive(Debug, Default)]
pub struct MemoryBackingStore {
    records: RwLock<HashMap<(String, String), BackingRecord>>,
}

impl MemoryBackingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 저장된 레코드 수
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

fn key(namespace: &str, name: &str) -> (String, String) {
    (namespace.to_string(), name.to_string())
}

fn next_version(current: Option<&str>) -> String {
    let n = current.and_then(|v| v.parse::<u64>().ok()).unwrap_or(0);
    (n + 1).to_string()
}

#[async_trait]
impl BackingStore for MemoryBackingStore {
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<BackingRecord>> {
        let records = self.records.read().await;
        Ok(records.get(&key(namespace, name)).cloned())
    }

    async fn create(&self, record: &BackingRecord) -> Result<String> {
        let mut records = self.records.write().await;
        let k = key(&record.namespace, &record.name);
        if records.contains_key(&k) {
            return Err(Error::AlreadyExists {
                kind: "record",
                id: record.path(),
            });
        }

        let version = next_version(None);
        let mut stored = record.clone();
        stored.version = Some(version.clone());
        records.insert(k, stored);
        Ok(version)
    }

    async fn update(&self, record: &BackingRecord) -> Result<String> {
        let mut records = self.records.write().await;
        let k = key(&record.namespace, &record.name);
        let current = records.get_mut(&k).ok_or_else(|| Error::NotFound {
            kind: "record",
            id: record.path(),
        })?;

        if current.version != record.version {
            return Err(Error::Conflict { name: record.path() });
        }

        let version = next_version(current.version.as_deref());
        *current = BackingRecord {
            version: Some(version.clone()),
            ..record.clone()
        };
        Ok(version)
    }
}
