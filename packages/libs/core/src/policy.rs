//! 접근 정책 평가기
//!
//! 사용자의 유효 접근 레벨을 결정합니다.
//!
//! # 규칙
//!
//! - 컨텍스트가 없으면 사용자의 전역 레벨
//! - 컨텍스트에 해당 사용자의 오버라이드가 있으면 그 레벨이 전역 레벨을 **대체**
//!   (높이든 낮든 그대로 적용)
//! - 오버라이드가 없으면 전역 레벨

use std::sync::Arc;

use crate::access::AccessLevel;
use crate::credentials::{Context, ContextStore, User};
use crate::error::{Error, Result};

/// 접근 정책 평가기
pub struct AccessPolicy {
    contexts: Arc<ContextStore>,
}

impl AccessPolicy {
    pub fn new(contexts: Arc<ContextStore>) -> Self {
        Self { contexts }
    }

    /// 전역 레벨
    pub fn global_level(user: &User) -> AccessLevel {
        user.access_level
    }

    /// 유효 레벨 (이미 로드된 컨텍스트 기준)
    pub fn effective_level(user: &User, context: Option<&Context>) -> AccessLevel {
        context
            .and_then(|ctx| ctx.access_for(&user.id))
            .unwrap_or_else(|| Self::global_level(user))
    }

    /// 요구 레벨 충족 여부
    pub fn sufficient(effective: AccessLevel, required: AccessLevel) -> bool {
        AccessLevel::sufficient(effective, required)
    }

    /// 유효 레벨 (컨텍스트 ID로 조회)
    ///
    /// 존재하지 않는 컨텍스트 ID는 `NotFound`입니다.
    pub async fn resolve(&self, user: &User, context_id: Option<&str>) -> Result<AccessLevel> {
        match context_id {
            Some(id) => {
                let context = self.contexts.get(id).await?;
                Ok(Self::effective_level(user, Some(&context)))
            }
            None => Ok(Self::global_level(user)),
        }
    }

    /// 유효 레벨을 계산하고 요구 레벨과 비교
    ///
    /// 충족하면 유효 레벨을, 아니면 `InsufficientAccess`를 반환합니다.
    pub async fn authorize(
        &self,
        user: &User,
        context_id: Option<&str>,
        required: AccessLevel,
    ) -> Result<AccessLevel> {
        let effective = self.resolve(user, context_id).await?;
        if Self::sufficient(effective, required) {
            Ok(effective)
        } else {
            Err(Error::InsufficientAccess {
                required,
                granted: effective,
            })
        }
    }
}
