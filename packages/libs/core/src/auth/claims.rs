//! 토큰 Claims
//!
//! Bearer 토큰의 서명된 페이로드입니다.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::access::AccessLevel;
use crate::credentials::User;

/// Access Token Claims (ES512 JWS 페이로드)
///
/// `access_level`은 발급 시점의 참고값일 뿐입니다.
/// 인가는 항상 `sub`로 사용자 레코드를 다시 조회해 현재 레벨을 사용합니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (User ID)
    pub sub: String,

    /// 발급 시점의 접근 레벨 (참고용)
    #[serde(default)]
    pub access_level: AccessLevel,

    /// 발급 시각
    #[serde(with = "chrono::serde::ts_seconds")]
    pub iat: DateTime<Utc>,

    /// 만료 시각
    #[serde(with = "chrono::serde::ts_seconds")]
    pub exp: DateTime<Utc>,

    /// JWT ID (감사 로그용)
    pub jti: String,

    /// 발급 시점의 사용자 세대
    #[serde(default)]
    pub gen: String,
}

impl Claims {
    /// 새 claims 생성
    pub fn new(
        sub: impl Into<String>,
        access_level: AccessLevel,
        issued_at: DateTime<Utc>,
        ttl: Duration,
    ) -> Self {
        // 와이어 형식이 초 단위이므로 발급 시각도 초 단위로 맞춘다
        let iat = DateTime::from_timestamp(issued_at.timestamp(), 0).unwrap_or(issued_at);
        Self {
            sub: sub.into(),
            access_level,
            iat,
            exp: iat + ttl,
            jti: ulid::Ulid::new().to_string(),
            gen: String::new(),
        }
    }

    /// 사용자 세대 설정
    pub fn with_generation(mut self, generation: impl Into<String>) -> Self {
        self.gen = generation.into();
        self
    }

    /// 현재 저장된 사용자 레코드에 대해 발급된 토큰인지 확인
    ///
    /// 삭제 후 같은 ID로 다시 만들었거나 비밀번호가 바뀐 사용자면 `false`입니다.
    pub fn matches_user(&self, user: &User) -> bool {
        self.sub == user.id && self.gen == user.generation
    }

    /// `now` 기준 만료 여부
    ///
    /// 만료 시각과 같은 순간까지는 유효하고, 그 이후부터 만료입니다.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.exp
    }

    /// 현재 시각 기준 만료 여부
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// 남은 TTL (초)
    pub fn remaining_ttl(&self) -> i64 {
        let diff = self.exp - Utc::now();
        diff.num_seconds().max(0)
    }
}
