//! 컨텍스트 레코드
//!
//! 컨텍스트는 관리 대상 클러스터에 대한 이름 있는 연결 정보이며,
//! 사용자별 접근 레벨 오버라이드 목록을 가집니다.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::store::{Document, DocumentStore};
use crate::access::AccessLevel;
use crate::backing::BackingStore;
use crate::error::{Error, Result};

/// 삭제할 수 없는 기본 컨텍스트 ID (게이트웨이가 실행 중인 클러스터)
pub const OWN_CONTEXT_ID: &str = "own-context";

/// 컨텍스트 레코드 이름
pub const CONTEXTS_RECORD: &str = "contexts";

/// 사용자별 접근 레벨 오버라이드
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextAccess {
    pub user_id: String,
    pub access_level: AccessLevel,
}

/// 컨텍스트
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Context {
    /// 컨텍스트 ID
    pub id: String,

    /// 이름
    pub name: String,

    /// 연결 설정 (불투명 JSON)
    #[serde(default)]
    pub connection_config: Value,

    /// 사용자별 오버라이드
    #[serde(default)]
    pub access: Vec<ContextAccess>,
}

impl Context {
    pub fn new(id: impl Into<String>, name: impl Into<String>, connection_config: Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            connection_config,
            access: Vec::new(),
        }
    }

    /// 사용자의 오버라이드 레벨
    pub fn access_for(&self, user_id: &str) -> Option<AccessLevel> {
        self.access
            .iter()
            .find(|a| a.user_id == user_id)
            .map(|a| a.access_level)
    }

    /// 오버라이드 추가 또는 교체
    pub fn upsert_access(&mut self, user_id: impl Into<String>, level: AccessLevel) {
        let user_id = user_id.into();
        match self.access.iter_mut().find(|a| a.user_id == user_id) {
            Some(entry) => entry.access_level = level,
            None => self.access.push(ContextAccess {
                user_id,
                access_level: level,
            }),
        }
    }

    /// 오버라이드 제거, 있었으면 `true`
    pub fn remove_access(&mut self, user_id: &str) -> bool {
        let before = self.access.len();
        self.access.retain(|a| a.user_id != user_id);
        self.access.len() != before
    }
}

impl Document for Context {
    const KIND: &'static str = "context";

    fn id(&self) -> &str {
        &self.id
    }
}

/// 컨텍스트 저장소
pub struct ContextStore {
    docs: DocumentStore<Context>,
}

impl ContextStore {
    pub fn new(backing: Arc<dyn BackingStore>, namespace: impl Into<String>) -> Self {
        Self {
            docs: DocumentStore::new(backing, namespace, CONTEXTS_RECORD)
                .with_reserved([OWN_CONTEXT_ID]),
        }
    }

    /// 백킹 스토어 호출 제한 시간 설정
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.docs = self.docs.with_timeout(timeout);
        self
    }

    pub async fn list(&self) -> Result<Vec<Context>> {
        self.docs.list().await
    }

    pub async fn get(&self, id: &str) -> Result<Context> {
        self.docs.get(id).await
    }

    /// 새 컨텍스트 추가
    pub async fn add(&self, context: Context) -> Result<Context> {
        if context.id.trim().is_empty() {
            return Err(Error::MalformedCredential {
                reason: "context id must not be empty".to_string(),
            });
        }

        self.docs.insert(&context).await?;
        tracing::info!(context = %context.id, "context added");
        Ok(context)
    }

    /// 전체 레코드 저장
    pub async fn put(&self, context: &Context) -> Result<()> {
        self.docs.put(context).await
    }

    /// 컨텍스트 삭제 (기본 컨텍스트는 거부)
    pub async fn delete(&self, id: &str) -> Result<()> {
        self.docs.delete(id).await?;
        tracing::info!(context = %id, "context deleted");
        Ok(())
    }

    /// 사용자 오버라이드 추가/교체
    pub async fn upsert_access(
        &self,
        context_id: &str,
        user_id: &str,
        level: AccessLevel,
    ) -> Result<Context> {
        let context = self
            .docs
            .update(context_id, |ctx| {
                ctx.upsert_access(user_id, level);
                Ok(())
            })
            .await?;
        tracing::info!(context = %context_id, user = %user_id, level = %level, "context access granted");
        Ok(context)
    }

    /// 사용자 오버라이드 제거
    pub async fn remove_access(&self, context_id: &str, user_id: &str) -> Result<Context> {
        let context = self
            .docs
            .update(context_id, |ctx| {
                if ctx.remove_access(user_id) {
                    Ok(())
                } else {
                    Err(Error::NotFound {
                        kind: "access entry",
                        id: format!("{context_id}/{user_id}"),
                    })
                }
            })
            .await?;
        tracing::info!(context = %context_id, user = %user_id, "context access revoked");
        Ok(context)
    }

    /// 모든 컨텍스트에서 사용자의 오버라이드 제거
    ///
    /// 사용자를 삭제하기 전에 호출합니다. 같은 ID로 다시 만든 사용자가 이전 권한을
    /// 물려받지 않도록 합니다. 제거된 항목 수를 반환합니다.
    pub async fn remove_user(&self, user_id: &str) -> Result<usize> {
        let removed = self.docs.update_each(|ctx| ctx.remove_access(user_id)).await?;
        if removed > 0 {
            tracing::info!(user = %user_id, contexts = removed, "context access revoked for user");
        }
        Ok(removed)
    }

    /// 기본 컨텍스트가 없으면 생성
    pub async fn ensure_own_context(&self) -> Result<bool> {
        if self.docs.contains(OWN_CONTEXT_ID).await? {
            return Ok(false);
        }

        let own = Context::new(
            OWN_CONTEXT_ID,
            "Own cluster",
            serde_json::json!({ "in_cluster": true }),
        );
        match self.docs.insert(&own).await {
            Ok(()) => {
                tracing::info!("seeded own-context");
                Ok(true)
            }
            Err(Error::AlreadyExists { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backing::MemoryBackingStore;

    fn store() -> ContextStore {
        ContextStore::new(Arc::new(MemoryBackingStore::new()), "kubegate")
    }

    #[test]
    fn test_access_entries() {
        let mut ctx = Context::new("c1", "Cluster 1", Value::Null);
        assert_eq!(ctx.access_for("alice"), None);

        ctx.upsert_access("alice", AccessLevel::Reader);
        ctx.upsert_access("alice", AccessLevel::Admin);
        assert_eq!(ctx.access.len(), 1);
        assert_eq!(ctx.access_for("alice"), Some(AccessLevel::Admin));

        assert!(ctx.remove_access("alice"));
        assert!(!ctx.remove_access("alice"));
        assert_eq!(ctx.access_for("alice"), None);
    }

    #[tokio::test]
    async fn test_upsert_and_remove_access() {
        let contexts = store();
        contexts
            .add(Context::new("c1", "Cluster 1", serde_json::json!({"server": "https://c1"})))
            .await
            .unwrap();

        contexts.upsert_access("c1", "alice", AccessLevel::User).await.unwrap();
        contexts.upsert_access("c1", "bob", AccessLevel::Reader).await.unwrap();
        let ctx = contexts.upsert_access("c1", "alice", AccessLevel::Admin).await.unwrap();
        assert_eq!(ctx.access.len(), 2);
        assert_eq!(ctx.access_for("alice"), Some(AccessLevel::Admin));

        let ctx = contexts.remove_access("c1", "bob").await.unwrap();
        assert_eq!(ctx.access_for("bob"), None);
        assert_eq!(contexts.get("c1").await.unwrap(), ctx);

        let err = contexts.remove_access("c1", "bob").await.unwrap_err();
        assert!(matches!(err, Error::NotFound { kind: "access entry", .. }));

        let err = contexts.upsert_access("nope", "alice", AccessLevel::User).await.unwrap_err();
        assert!(matches!(err, Error::NotFound { kind: "context", .. }));
    }

    #[tokio::test]
    async fn test_own_context_is_protected() {
        let contexts = store();
        assert!(contexts.ensure_own_context().await.unwrap());
        assert!(!contexts.ensure_own_context().await.unwrap());

        let before = contexts.list().await.unwrap();
        let err = contexts.delete(OWN_CONTEXT_ID).await.unwrap_err();
        assert!(matches!(err, Error::ProtectedRecord { .. }));
        assert_eq!(contexts.list().await.unwrap(), before);
    }

    #[tokio::test]
    async fn test_delete_context() {
        let contexts = store();
        contexts.add(Context::new("c2", "Cluster 2", Value::Null)).await.unwrap();
        contexts.delete("c2").await.unwrap();
        assert!(contexts.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_remove_user_clears_every_context() {
        let contexts = store();
        contexts.ensure_own_context().await.unwrap();
        for id in ["c1", "c2", "c3"] {
            contexts
                .add(Context::new(id, id, Value::Null))
                .await
                .unwrap();
        }
        contexts.upsert_access("c1", "alice", AccessLevel::Admin).await.unwrap();
        contexts.upsert_access("c2", "alice", AccessLevel::Reader).await.unwrap();
        contexts.upsert_access("c2", "bob", AccessLevel::User).await.unwrap();
        contexts.upsert_access(OWN_CONTEXT_ID, "alice", AccessLevel::User).await.unwrap();

        assert_eq!(contexts.remove_user("alice").await.unwrap(), 3);
        for ctx in contexts.list().await.unwrap() {
            assert_eq!(ctx.access_for("alice"), None, "{}", ctx.id);
        }
        assert_eq!(
            contexts.get("c2").await.unwrap().access_for("bob"),
            Some(AccessLevel::User)
        );
        assert_eq!(contexts.remove_user("alice").await.unwrap(), 0);
    }
}
