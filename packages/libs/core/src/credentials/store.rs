//! 문서 저장소
//!
//! 백킹 레코드 하나를 `id → JSON` 문서 맵으로 사용하는 작은 저장소입니다.
//! 모든 쓰기는 레코드 전체를 읽고, 필드 하나를 바꾸고, 전체를 다시 쓰는
//! read-modify-write이며, 쓰기 직전에 버전을 비교합니다.
//! 다른 쓰기와 겹치면 재시도하지 않고 `Conflict`를 반환합니다.

use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::backing::{bounded, BackingRecord, BackingStore};
use crate::error::{Error, Result};

/// 저장 가능한 문서
pub trait Document: Serialize + DeserializeOwned + Send + Sync {
    /// 에러 메시지에 쓰이는 종류 이름
    const KIND: &'static str;

    /// 문서 ID
    fn id(&self) -> &str;
}

/// 문서 저장소
pub struct DocumentStore<T> {
    backing: Arc<dyn BackingStore>,
    namespace: String,
    record_name: String,
    reserved: Vec<String>,
    timeout: Duration,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Document> DocumentStore<T> {
    pub fn new(
        backing: Arc<dyn BackingStore>,
        namespace: impl Into<String>,
        record_name: impl Into<String>,
    ) -> Self {
        Self {
            backing,
            namespace: namespace.into(),
            record_name: record_name.into(),
            reserved: Vec::new(),
            timeout: Duration::from_secs(5),
            _marker: PhantomData,
        }
    }

    /// 삭제할 수 없는 ID 설정
    pub fn with_reserved<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.reserved = ids.into_iter().map(Into::into).collect();
        self
    }

    /// 백킹 스토어 호출 제한 시간 설정
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// 예약된 ID인지 확인
    pub fn is_reserved(&self, id: &str) -> bool {
        self.reserved.iter().any(|r| r == id)
    }

    /// 전체 목록 (ID 순)
    pub async fn list(&self) -> Result<Vec<T>> {
        let Some(record) = self.load().await? else {
            return Ok(Vec::new());
        };

        record
            .data
            .iter()
            .map(|(id, bytes)| self.decode(id, bytes))
            .collect()
    }

    /// ID로 조회
    pub async fn get(&self, id: &str) -> Result<T> {
        let record = self.load().await?;
        match record.as_ref().and_then(|r| r.field(id)) {
            Some(bytes) => self.decode(id, bytes),
            None => Err(self.not_found(id)),
        }
    }

    /// ID 존재 여부
    pub async fn contains(&self, id: &str) -> Result<bool> {
        let record = self.load().await?;
        Ok(record.is_some_and(|r| r.field(id).is_some()))
    }

    /// 문서 저장 (있으면 교체)
    pub async fn put(&self, doc: &T) -> Result<()> {
        let bytes = serde_json::to_vec(doc)?;
        let id = doc.id().to_string();
        self.modify(move |record| {
            record.set_field(id, bytes);
            Ok(())
        })
        .await
    }

    /// 새 문서 추가 (이미 있으면 `AlreadyExists`)
    pub async fn insert(&self, doc: &T) -> Result<()> {
        let bytes = serde_json::to_vec(doc)?;
        let id = doc.id().to_string();
        self.modify(move |record| {
            if record.field(&id).is_some() {
                return Err(Error::AlreadyExists { kind: T::KIND, id });
            }
            record.set_field(id, bytes);
            Ok(())
        })
        .await
    }

    /// 기존 문서를 읽어 수정 후 저장
    pub async fn update<F>(&self, id: &str, f: F) -> Result<T>
    where
        F: FnOnce(&mut T) -> Result<()> + Send,
    {
        self.modify(|record| {
            let bytes = record.field(id).ok_or_else(|| self.not_found(id))?;
            let mut doc = self.decode(id, bytes)?;
            f(&mut doc)?;
            if doc.id() != id {
                return Err(Error::Conflict {
                    name: format!("{} id changed from {id} to {}", T::KIND, doc.id()),
                });
            }
            record.set_field(id, serde_json::to_vec(&doc)?);
            Ok(doc)
        })
        .await
    }

    /// 모든 문서에 `f`를 적용하고 바뀐 문서를 한 번에 저장
    ///
    /// `f`가 `true`를 반환한 문서 수를 돌려줍니다. 바뀐 문서가 없으면 쓰지 않습니다.
    pub async fn update_each<F>(&self, mut f: F) -> Result<usize>
    where
        F: FnMut(&mut T) -> bool,
    {
        let Some(mut record) = self.load().await? else {
            return Ok(0);
        };

        let mut changed = Vec::new();
        for (id, bytes) in &record.data {
            let mut doc = self.decode(id, bytes)?;
            if f(&mut doc) {
                changed.push((id.clone(), serde_json::to_vec(&doc)?));
            }
        }
        if changed.is_empty() {
            return Ok(0);
        }

        let count = changed.len();
        for (id, bytes) in changed {
            record.set_field(id, bytes);
        }
        bounded(
            self.timeout,
            &format!("update {}", self.record_name),
            self.backing.update(&record),
        )
        .await?;
        tracing::debug!(record = %record.path(), count, "updated {} records", T::KIND);
        Ok(count)
    }

    /// 문서 삭제
    ///
    /// 예약된 ID는 저장소를 건드리지 않고 `ProtectedRecord`로 거부합니다.
    pub async fn delete(&self, id: &str) -> Result<()> {
        if self.is_reserved(id) {
            return Err(Error::ProtectedRecord { id: id.to_string() });
        }

        self.modify(|record| {
            record
                .remove_field(id)
                .map(|_| ())
                .ok_or_else(|| self.not_found(id))
        })
        .await
    }

    async fn load(&self) -> Result<Option<BackingRecord>> {
        bounded(
            self.timeout,
            &format!("get {}", self.record_name),
            self.backing.get(&self.namespace, &self.record_name),
        )
        .await
    }

    async fn modify<R, F>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&mut BackingRecord) -> Result<R>,
    {
        match self.load().await? {
            Some(mut record) => {
                let out = f(&mut record)?;
                bounded(
                    self.timeout,
                    &format!("update {}", self.record_name),
                    self.backing.update(&record),
                )
                .await?;
                tracing::debug!(record = %record.path(), "updated {} record", T::KIND);
                Ok(out)
            }
            None => {
                let mut record = BackingRecord::new(&self.namespace, &self.record_name);
                let out = f(&mut record)?;
                let created = bounded(
                    self.timeout,
                    &format!("create {}", self.record_name),
                    self.backing.create(&record),
                )
                .await;

                match created {
                    Ok(_) => {
                        tracing::debug!(record = %record.path(), "created {} record", T::KIND);
                        Ok(out)
                    }
                    // 다른 쓰기가 먼저 레코드를 만들었음
                    Err(Error::AlreadyExists { .. }) => Err(Error::Conflict { name: record.path() }),
                    Err(e) => Err(e),
                }
            }
        }
    }

    fn decode(&self, id: &str, bytes: &[u8]) -> Result<T> {
        serde_json::from_slice(bytes).map_err(|e| {
            tracing::error!(kind = T::KIND, id, error = %e, "stored document is corrupt");
            Error::Json(e)
        })
    }

    fn not_found(&self, id: &str) -> Error {
        Error::NotFound {
            kind: T::KIND,
            id: id.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backing::MemoryBackingStore;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Note {
        id: String,
        body: String,
    }

    impl Document for Note {
        const KIND: &'static str = "note";

        fn id(&self) -> &str {
            &self.id
        }
    }

    fn note(id: &str, body: &str) -> Note {
        Note {
            id: id.to_string(),
            body: body.to_string(),
        }
    }

    fn store(backing: &Arc<MemoryBackingStore>) -> DocumentStore<Note> {
        DocumentStore::new(backing.clone(), "kubegate", "notes").with_reserved(["pinned"])
    }

    #[tokio::test]
    async fn test_empty_store() {
        let backing = Arc::new(MemoryBackingStore::new());
        let notes = store(&backing);
        assert!(notes.list().await.unwrap().is_empty());
        assert!(matches!(
            notes.get("a").await,
            Err(Error::NotFound { kind: "note", .. })
        ));
    }

    #[tokio::test]
    async fn test_put_get_list_delete() {
        let backing = Arc::new(MemoryBackingStore::new());
        let notes = store(&backing);

        notes.put(&note("b", "second")).await.unwrap();
        notes.put(&note("a", "first")).await.unwrap();
        notes.put(&note("a", "first, edited")).await.unwrap();

        assert_eq!(notes.get("a").await.unwrap().body, "first, edited");
        let ids: Vec<_> = notes.list().await.unwrap().into_iter().map(|n| n.id).collect();
        assert_eq!(ids, vec!["a", "b"]);

        notes.delete("a").await.unwrap();
        assert!(!notes.contains("a").await.unwrap());
        assert!(matches!(notes.delete("a").await, Err(Error::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_insert_rejects_duplicates() {
        let backing = Arc::new(MemoryBackingStore::new());
        let notes = store(&backing);

        notes.insert(&note("a", "one")).await.unwrap();
        let err = notes.insert(&note("a", "two")).await.unwrap_err();
        assert!(matches!(err, Error::AlreadyExists { .. }));
        assert_eq!(notes.get("a").await.unwrap().body, "one");
    }

    #[tokio::test]
    async fn test_reserved_delete_leaves_store_unchanged() {
        let backing = Arc::new(MemoryBackingStore::new());
        let notes = store(&backing);
        notes.put(&note("pinned", "keep me")).await.unwrap();

        let before = backing.get("kubegate", "notes").await.unwrap();
        let err = notes.delete("pinned").await.unwrap_err();
        assert!(matches!(err, Error::ProtectedRecord { .. }));
        assert_eq!(backing.get("kubegate", "notes").await.unwrap(), before);
    }

    #[tokio::test]
    async fn test_update_in_place() {
        let backing = Arc::new(MemoryBackingStore::new());
        let notes = store(&backing);
        notes.put(&note("a", "draft")).await.unwrap();

        let updated = notes
            .update("a", |n| {
                n.body.push_str(" (final)");
                Ok(())
            })
            .await
            .unwrap();
        assert_eq!(updated.body, "draft (final)");
        assert_eq!(notes.get("a").await.unwrap(), updated);

        let err = notes.update("missing", |_| Ok(())).await.unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_corrupt_document_is_an_error() {
        let backing = Arc::new(MemoryBackingStore::new());
        let mut record = BackingRecord::new("kubegate", "notes");
        record.set_field("bad", b"{not json".to_vec());
        backing.create(&record).await.unwrap();

        let notes = store(&backing);
        assert!(matches!(notes.get("bad").await, Err(Error::Json(_))));
        assert!(notes.list().await.is_err());
    }

    #[tokio::test]
    async fn test_concurrent_writers_conflict_instead_of_losing_updates() {
        let backing = Arc::new(MemoryBackingStore::new());
        let notes = store(&backing);
        notes.put(&note("seed", "")).await.unwrap();

        let note_a = note("a", "1");
        let note_b = note("b", "2");
        let (a, b) = tokio::join!(notes.put(&note_a), notes.put(&note_b));

        // 둘 다 성공했거나, 하나가 Conflict로 실패 (조용히 사라지지 않음)
        let stored: Vec<_> = notes.list().await.unwrap().into_iter().map(|n| n.id).collect();
        assert_eq!(a.is_ok(), stored.contains(&"a".to_string()));
        assert_eq!(b.is_ok(), stored.contains(&"b".to_string()));
        for result in [a, b] {
            if let Err(e) = result {
                assert!(matches!(e, Error::Conflict { .. }));
            }
        }
    }

    #[tokio::test]
    async fn test_update_each_writes_only_changed_documents() {
        let backing = Arc::new(MemoryBackingStore::new());
        let notes = store(&backing);
        assert_eq!(notes.update_each(|_| true).await.unwrap(), 0);

        notes.put(&note("a", "keep")).await.unwrap();
        notes.put(&note("b", "drop")).await.unwrap();
        notes.put(&note("c", "drop")).await.unwrap();

        let count = notes
            .update_each(|n| {
                if n.body == "drop" {
                    n.body.clear();
                    true
                } else {
                    false
                }
            })
            .await
            .unwrap();
        assert_eq!(count, 2);

        let bodies: Vec<_> = notes.list().await.unwrap().into_iter().map(|n| n.body).collect();
        assert_eq!(bodies, vec!["keep", "", ""]);
        assert_eq!(notes.update_each(|n| n.body == "missing").await.unwrap(), 0);
    }
}
