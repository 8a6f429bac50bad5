//! 사용자 레코드
//!
//! 관리 콘솔 사용자와 그 전역 접근 레벨입니다.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::store::{Document, DocumentStore};
use crate::access::AccessLevel;
use crate::auth::{hash_password, is_hashed, verify_password};
use crate::backing::BackingStore;
use crate::error::{Error, Result};

/// 삭제할 수 없는 기본 관리자 ID
pub const DEFAULT_ADMIN_ID: &str = "admin";

/// 사용자 레코드 이름
pub const USERS_RECORD: &str = "users";

/// 사용자
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// 사용자 ID
    pub id: String,

    /// 이메일
    #[serde(default)]
    pub email: String,

    /// 비밀번호 해시
    pub password: String,

    /// 표시 이름
    #[serde(default)]
    pub display_name: String,

    /// 전역 접근 레벨
    #[serde(default)]
    pub access_level: AccessLevel,

    /// 레코드 세대 (ULID)
    ///
    /// 생성과 비밀번호 변경 때마다 새로 발급됩니다. 토큰은 발급 시점의 값을 담고 있어서
    /// 같은 ID로 다시 만든 사용자에게 이전 토큰이 통하지 않습니다.
    #[serde(default)]
    pub generation: String,
}

impl User {
    /// 새 사용자 생성 (비밀번호는 해시되어 저장)
    pub fn new(
        id: impl Into<String>,
        email: impl Into<String>,
        password: &str,
        access_level: AccessLevel,
    ) -> Result<Self> {
        Ok(Self {
            id: id.into(),
            email: email.into(),
            password: hash_password(password)?,
            display_name: String::new(),
            access_level,
            generation: new_generation(),
        })
    }

    /// 표시 이름 설정
    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = name.into();
        self
    }

    /// 비밀번호 확인
    pub fn verify_password(&self, password: &str) -> bool {
        verify_password(password, &self.password)
    }
}

fn new_generation() -> String {
    ulid::Ulid::new().to_string()
}

impl fmt::Debug for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("User")
            .field("id", &self.id)
            .field("email", &self.email)
            .field("display_name", &self.display_name)
            .field("access_level", &self.access_level)
            .field("generation", &self.generation)
            .finish_non_exhaustive()
    }
}

impl Document for User {
    const KIND: &'static str = "user";

    fn id(&self) -> &str {
        &self.id
    }
}

/// 부분 수정 요청
///
/// `None`인 필드는 변경하지 않습니다.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserPatch {
    #[serde(default)]
    pub email: Option<String>,

    /// 평문 비밀번호 (저장 시 해시)
    #[serde(default)]
    pub password: Option<String>,

    #[serde(default)]
    pub display_name: Option<String>,

    #[serde(default)]
    pub access_level: Option<AccessLevel>,
}

impl UserPatch {
    /// 변경 사항이 없는지 확인
    pub fn is_empty(&self) -> bool {
        self.email.is_none()
            && self.password.is_none()
            && self.display_name.is_none()
            && self.access_level.is_none()
    }

    /// 사용자에 적용
    ///
    /// 비밀번호가 바뀌면 세대도 바뀌어 기존 토큰이 무효가 됩니다.
    pub fn apply(self, user: &mut User) -> Result<()> {
        if let Some(email) = self.email {
            user.email = email;
        }
        if let Some(password) = self.password {
            user.password = hash_password(&password)?;
            user.generation = new_generation();
        }
        if let Some(display_name) = self.display_name {
            user.display_name = display_name;
        }
        if let Some(level) = self.access_level {
            user.access_level = level;
        }
        Ok(())
    }
}

/// 사용자 저장소
pub struct UserStore {
    docs: DocumentStore<User>,
}

impl UserStore {
    pub fn new(backing: Arc<dyn BackingStore>, namespace: impl Into<String>) -> Self {
        Self {
            docs: DocumentStore::new(backing, namespace, USERS_RECORD)
                .with_reserved([DEFAULT_ADMIN_ID]),
        }
    }

    /// 백킹 스토어 호출 제한 시간 설정
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.docs = self.docs.with_timeout(timeout);
        self
    }

    pub async fn list(&self) -> Result<Vec<User>> {
        self.docs.list().await
    }

    pub async fn get(&self, id: &str) -> Result<User> {
        self.docs.get(id).await
    }

    /// 삭제할 수 없는 예약 ID인지 확인
    pub fn is_reserved(&self, id: &str) -> bool {
        self.docs.is_reserved(id)
    }

    /// 새 사용자 추가
    pub async fn add(&self, user: User) -> Result<User> {
        if user.id.trim().is_empty() {
            return Err(Error::MalformedCredential {
                reason: "user id must not be empty".to_string(),
            });
        }
        if !is_hashed(&user.password) {
            return Err(Error::MalformedCredential {
                reason: "user password must be hashed before storing".to_string(),
            });
        }

        self.docs.insert(&user).await?;
        tracing::info!(user = %user.id, level = %user.access_level, "user added");
        Ok(user)
    }

    /// 전체 레코드 저장
    pub async fn put(&self, user: &User) -> Result<()> {
        self.docs.put(user).await
    }

    /// 부분 수정
    pub async fn update(&self, id: &str, patch: UserPatch) -> Result<User> {
        let user = self
            .docs
            .update(id, move |user| patch.apply(user))
            .await?;
        tracing::info!(user = %user.id, level = %user.access_level, "user updated");
        Ok(user)
    }

    /// 사용자 삭제 (기본 관리자는 거부)
    pub async fn delete(&self, id: &str) -> Result<()> {
        self.docs.delete(id).await?;
        tracing::info!(user = %id, "user deleted");
        Ok(())
    }

    /// ID/비밀번호 확인
    ///
    /// 존재하지 않는 ID와 틀린 비밀번호는 같은 `InvalidCredentials`로 처리합니다.
    pub async fn authenticate(&self, id: &str, password: &str) -> Result<User> {
        match self.docs.get(id).await {
            Ok(user) if user.verify_password(password) => Ok(user),
            Ok(_) => Err(Error::InvalidCredentials),
            Err(Error::NotFound { .. }) => {
                // 존재 여부가 응답 시간으로 드러나지 않도록 해시 비용을 맞춘다
                let _ = hash_password(password);
                Err(Error::InvalidCredentials)
            }
            Err(e) => Err(e),
        }
    }

    /// 기본 관리자가 없으면 생성
    ///
    /// 생성했으면 `true`를 반환합니다.
    pub async fn ensure_default_admin(&self, password: &str) -> Result<bool> {
        if self.docs.contains(DEFAULT_ADMIN_ID).await? {
            return Ok(false);
        }

        let admin = User::new(DEFAULT_ADMIN_ID, "", password, AccessLevel::Admin)?
            .with_display_name("Administrator");
        match self.docs.insert(&admin).await {
            Ok(()) => {
                tracing::info!("seeded default admin user");
                Ok(true)
            }
            Err(Error::AlreadyExists { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }
}
