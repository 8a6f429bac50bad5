//! kg-core: Kubegate 인증/인가 핵심 라이브러리
//!
//! 이 크레이트는 게이트웨이가 사용하는 신원 및 접근 제어 로직을 제공합니다.
//!
//! # 모듈 구조
//!
//! - `access`: 접근 레벨 (Unknown < Reader < User < Admin)
//! - `backing`: 백킹 스토어 어댑터 트레이트와 구현
//! - `keys`: 토큰 서명 키 생성/저장/캐시
//! - `auth`: 토큰 발급/검증, 비밀번호 해시
//! - `credentials`: 사용자/컨텍스트 문서 저장소
//! - `policy`: 유효 접근 레벨 평가
//! - `error`: 공통 에러 타입

pub mod access;
pub mod auth;
pub mod backing;
pub mod credentials;
pub mod error;
pub mod keys;
pub mod policy;

pub use access::AccessLevel;
pub use error::{Error, Result};
