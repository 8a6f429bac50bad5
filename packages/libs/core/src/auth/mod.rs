//! 인증 관련 타입 및 로직
//!
//! # 개요
//!
//! Kubegate의 인증은 관리 콘솔 사용자(User)를 대상으로 합니다.
//! 토큰은 신원만 전달하며, 권한은 매 요청마다 사용자 레코드에서 다시 확인합니다.
//!
//! # 토큰 종류
//!
//! - **Access Token**: ES512로 서명된 JWS (기본 수명 7일)

mod claims;
mod password;
mod token;

pub use claims::Claims;
pub use password::{hash_password, is_hashed, verify_password};
pub use token::{
    BearerCredential, IssuedToken, TokenService, ALGORITHM, DEFAULT_TOKEN_TTL_HOURS,
};
