//! 파일 백킹 스토어
//!
//! `{root}/{namespace}/{name}.json` 파일 하나가 레코드 하나입니다.
//! 필드 값은 base64로 인코딩되어 저장됩니다.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use super::{BackingRecord, BackingStore};
use crate::error::{Error, Result};

/// 디스크 상의 레코드 형식
#[derive(Debug, Serialize, Deserialize)]
struct StoredRecord {
    version: u64,
    data: BTreeMap<String, String>,
}

/// 디렉터리 기반 백킹 스토어
///
/// 같은 프로세스 안의 쓰기는 뮤텍스로 직렬화되고,
/// 쓰기는 임시 파일 + rename으로 원자적으로 교체됩니다.
#[derive(Debug)]
pub struct FileBackingStore {
    root: PathBuf,
    write_lock: Mutex<()>,
}

impl FileBackingStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn record_path(&self, namespace: &str, name: &str) -> Result<PathBuf> {
        for segment in [namespace, name] {
            let valid = !segment.is_empty()
                && segment
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
                && segment != "."
                && segment != "..";
            if !valid {
                return Err(Error::store_unavailable(format!(
                    "invalid record path segment: {segment:?}"
                )));
            }
        }
        Ok(self.root.join(namespace).join(format!("{name}.json")))
    }

    async fn read(&self, path: &Path) -> Result<Option<StoredRecord>> {
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(Error::store_unavailable(format!(
                    "read {}: {e}",
                    path.display()
                )))
            }
        };

        serde_json::from_slice(&bytes).map(Some).map_err(|e| {
            Error::store_unavailable(format!("corrupt record {}: {e}", path.display()))
        })
    }

    async fn write(&self, path: &Path, record: &BackingRecord, version: u64) -> Result<()> {
        let stored = StoredRecord {
            version,
            data: record
                .data
                .iter()
                .map(|(k, v)| (k.clone(), general_purpose::STANDARD.encode(v)))
                .collect(),
        };
        let bytes = serde_json::to_vec_pretty(&stored)?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| Error::store_unavailable(format!("mkdir {}: {e}", parent.display())))?;
        }

        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, bytes)
            .await
            .map_err(|e| Error::store_unavailable(format!("write {}: {e}", tmp.display())))?;
        tokio::fs::rename(&tmp, path)
            .await
            .map_err(|e| Error::store_unavailable(format!("rename {}: {e}", path.display())))?;
        Ok(())
    }
}

fn decode(namespace: &str, name: &str, stored: StoredRecord) -> Result<BackingRecord> {
    let mut data = BTreeMap::new();
    for (field, encoded) in stored.data {
        let bytes = general_purpose::STANDARD.decode(encoded.as_bytes()).map_err(|e| {
            Error::store_unavailable(format!("corrupt field {namespace}/{name}#{field}: {e}"))
        })?;
        data.insert(field, bytes);
    }

    Ok(BackingRecord {
        namespace: namespace.to_string(),
        name: name.to_string(),
        data,
        version: Some(stored.version.to_string()),
    })
}

#[async_trait]
impl BackingStore for FileBackingStore {
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<BackingRecord>> {
        let path = self.record_path(namespace, name)?;
        match self.read(&path).await? {
            Some(stored) => decode(namespace, name, stored).map(Some),
            None => Ok(None),
        }
    }

    async fn create(&self, record: &BackingRecord) -> Result<String> {
        let path = self.record_path(&record.namespace, &record.name)?;
        let _guard = self.write_lock.lock().await;

        if self.read(&path).await?.is_some() {
            return Err(Error::AlreadyExists {
                kind: "record",
                id: record.path(),
            });
        }

        self.write(&path, record, 1).await?;
        Ok("1".to_string())
    }

    async fn update(&self, record: &BackingRecord) -> Result<String> {
        let path = self.record_path(&record.namespace, &record.name)?;
        let _guard = self.write_lock.lock().await;

        let current = self.read(&path).await?.ok_or_else(|| Error::NotFound {
            kind: "record",
            id: record.path(),
        })?;

        if record.version.as_deref() != Some(current.version.to_string().as_str()) {
            return Err(Error::Conflict { name: record.path() });
        }

        let version = current.version + 1;
        self.write(&path, record, version).await?;
        Ok(version.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();

        let store = FileBackingStore::new(dir.path());
        let mut record = BackingRecord::new("kubegate", "users");
        record.set_field("admin", vec![0u8, 159, 255]);
        store.create(&record).await.unwrap();

        let reopened = FileBackingStore::new(dir.path());
        let fetched = reopened.get("kubegate", "users").await.unwrap().unwrap();
        assert_eq!(fetched.field("admin"), Some(&[0u8, 159, 255][..]));
        assert_eq!(fetched.version.as_deref(), Some("1"));
    }

    #[tokio::test]
    async fn test_version_check() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileBackingStore::new(dir.path());
        store.create(&BackingRecord::new("kubegate", "contexts")).await.unwrap();

        let stale = store.get("kubegate", "contexts").await.unwrap().unwrap();
        let mut fresh = stale.clone();
        fresh.set_field("c1", b"{}".to_vec());
        assert_eq!(store.update(&fresh).await.unwrap(), "2");

        let err = store.update(&stale).await.unwrap_err();
        assert!(matches!(err, Error::Conflict { .. }));
    }

    #[tokio::test]
    async fn test_rejects_path_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileBackingStore::new(dir.path());
        let err = store.get("..", "users").await.unwrap_err();
        assert!(matches!(err, Error::StoreUnavailable { .. }));
    }
}
