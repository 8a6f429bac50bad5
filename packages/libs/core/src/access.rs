//! 접근 레벨
//!
//! 사용자 전역 레벨과 컨텍스트별 오버라이드에 공통으로 쓰이는 권한 단계입니다.
//!
//! # 순서
//!
//! `Unknown < Reader < User < Admin`
//!
//! # 와이어 형식
//!
//! 직렬화는 정수(`0..=3`)로, 역직렬화는 정수 또는 대소문자 무시 문자열
//! (`READER`, `USER`, `ADMIN`)을 모두 받습니다.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// 권한 단계
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(u8)]
pub enum AccessLevel {
    /// 미지정 (센티넬 값 0)
    #[default]
    Unknown = 0,

    /// 읽기 전용
    Reader = 1,

    /// 일반 사용자
    User = 2,

    /// 관리자
    Admin = 3,
}

impl AccessLevel {
    /// 부여된 레벨이 요구 레벨을 만족하는지 확인
    pub fn sufficient(granted: AccessLevel, required: AccessLevel) -> bool {
        granted >= required
    }

    /// 이 레벨이 `required`를 만족하는지 확인
    pub fn satisfies(self, required: AccessLevel) -> bool {
        Self::sufficient(self, required)
    }

    /// 정수 값
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// 정수 값에서 변환
    pub fn from_u8(value: u8) -> Result<Self> {
        match value {
            0 => Ok(AccessLevel::Unknown),
            1 => Ok(AccessLevel::Reader),
            2 => Ok(AccessLevel::User),
            3 => Ok(AccessLevel::Admin),
            other => Err(Error::UnrecognizedAccessLevel {
                value: other.to_string(),
            }),
        }
    }

    /// 문자열로 변환
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessLevel::Unknown => "UNKNOWN",
            AccessLevel::Reader => "READER",
            AccessLevel::User => "USER",
            AccessLevel::Admin => "ADMIN",
        }
    }

    /// 인식할 수 없는 문자열을 `Reader`로 취급하는 관대한 파싱
    ///
    /// 예전 레코드 호환용입니다. 새 호출부는 `str::parse`를 사용해
    /// 실패를 직접 처리해야 합니다.
    pub fn parse_or_reader(value: &str) -> Self {
        value.parse().unwrap_or(AccessLevel::Reader)
    }
}

impl FromStr for AccessLevel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "READER" => Ok(AccessLevel::Reader),
            "USER" => Ok(AccessLevel::User),
            "ADMIN" => Ok(AccessLevel::Admin),
            _ => Err(Error::UnrecognizedAccessLevel {
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for AccessLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for AccessLevel {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_u8(self.as_u8())
    }
}

impl<'de> Deserialize<'de> for AccessLevel {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        use serde::de::{self, Visitor};

        struct AccessLevelVisitor;

        impl<'de> Visitor<'de> for AccessLevelVisitor {
            type Value = AccessLevel;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("an access level integer (0-3) or one of READER, USER, ADMIN")
            }

            fn visit_u64<E>(self, value: u64) -> std::result::Result<Self::Value, E>
            where
                E: de::Error,
            {
                u8::try_from(value)
                    .map_err(|_| E::custom(format!("access level out of range: {value}")))
                    .and_then(|v| AccessLevel::from_u8(v).map_err(E::custom))
            }

            fn visit_i64<E>(self, value: i64) -> std::result::Result<Self::Value, E>
            where
                E: de::Error,
            {
                u64::try_from(value)
                    .map_err(|_| E::custom(format!("access level out of range: {value}")))
                    .and_then(|v| self.visit_u64(v))
            }

            fn visit_str<E>(self, value: &str) -> std::result::Result<Self::Value, E>
            where
                E: de::Error,
            {
                value.parse().map_err(E::custom)
            }
        }

        deserializer.deserialize_any(AccessLevelVisitor)
    }
}
