//! 비밀번호 해시
//!
//! Argon2id PHC 문자열(`$argon2id$v=19$m=...,t=...,p=...$<salt>$<hash>`)로 저장합니다.

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use rand::rngs::OsRng;

use crate::error::{Error, Result};

const PHC_PREFIX: &str = "$argon2id$";

/// 비밀번호 해시 생성
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| Error::PasswordHash {
            reason: e.to_string(),
        })?;
    Ok(hash.to_string())
}

/// 비밀번호 검증
///
/// 형식이 잘못된 저장값은 항상 불일치로 처리합니다.
pub fn verify_password(password: &str, stored: &str) -> bool {
    if !stored.starts_with(PHC_PREFIX) {
        return false;
    }
    let Ok(parsed) = PasswordHash::new(stored) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

/// 이미 해시된 값인지 확인
pub fn is_hashed(value: &str) -> bool {
    value.starts_with(PHC_PREFIX) && PasswordHash::new(value).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let hash = hash_password("hunter2").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(is_hashed(&hash));
        assert!(verify_password("hunter2", &hash));
        assert!(!verify_password("hunter3", &hash));
    }

    #[test]
    fn test_salted() {
        assert_ne!(hash_password("same").unwrap(), hash_password("same").unwrap());
    }

    #[test]
    fn test_garbage_never_matches() {
        assert!(!verify_password("x", ""));
        assert!(!verify_password("x", "x"));
        assert!(!verify_password("x", "$argon2id$garbage"));
        assert!(!is_hashed("plaintext"));
        assert!(!is_hashed("$argon2id$garbage"));
    }

    #[test]
    fn test_legacy_sha512_value_is_not_accepted() {
        // 단일 라운드 SHA-512 형식은 해시로 인정하지 않는다
        let legacy = "sha512$c2FsdA==$ZGlnZXN0";
        assert!(!is_hashed(legacy));
        assert!(!verify_password("pw", legacy));
    }

    #[test]
    fn test_other_argon2_variants_are_rejected() {
        let hash = hash_password("pw").unwrap();
        let argon2i = hash.replacen("$argon2id$", "$argon2i$", 1);
        assert!(!is_hashed(&argon2i));
        assert!(!verify_password("pw", &argon2i));
    }
}
