//! 토큰 발급 및 검증
//!
//! Bearer 토큰은 ES512(P-521 + SHA-512)로 서명된 JWS compact 문자열입니다.
//!
//! ```text
//! base64url(header) . base64url(claims) . base64url(r || s)
//! ```

use std::sync::Arc;

use base64::{engine::general_purpose, Engine as _};
use chrono::{DateTime, Duration, Utc};
use p521::ecdsa::Signature;
use serde::{Deserialize, Serialize};
use signature::{Signer, Verifier};

use super::claims::Claims;
use crate::credentials::User;
use crate::error::{Error, Result};
use crate::keys::KeyMaterial;

/// 허용되는 유일한 서명 알고리즘
pub const ALGORITHM: &str = "ES512";

/// 기본 토큰 수명 (7일)
pub const DEFAULT_TOKEN_TTL_HOURS: i64 = 7 * 24;

/// JWS 헤더
#[derive(Debug, Serialize, Deserialize)]
struct Header {
    alg: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    typ: Option<String>,
}

/// `Authorization` 헤더 값
///
/// `<scheme> <token>` 두 토큰으로만 이루어져야 합니다.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BearerCredential {
    pub token: String,
}

impl BearerCredential {
    /// 헤더 값에서 추출
    pub fn from_header(value: Option<&str>) -> Result<Self> {
        let value = value.ok_or_else(|| malformed("missing authorization header"))?;

        let mut parts = value.split_whitespace();
        match (parts.next(), parts.next(), parts.next()) {
            (Some(scheme), Some(token), None) => {
                if !scheme.eq_ignore_ascii_case("bearer") {
                    return Err(malformed(format!("unsupported scheme: {scheme}")));
                }
                Ok(Self {
                    token: token.to_string(),
                })
            }
            _ => Err(malformed("expected '<scheme> <token>'")),
        }
    }
}

fn malformed(reason: impl Into<String>) -> Error {
    Error::MalformedCredential {
        reason: reason.into(),
    }
}

/// 발급된 토큰
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub claims: Claims,
}

/// 토큰 서비스
///
/// 활성 키 쌍으로 토큰을 서명하고 검증합니다.
pub struct TokenService {
    keys: Arc<KeyMaterial>,
    ttl: Duration,
}

impl TokenService {
    pub fn new(keys: Arc<KeyMaterial>) -> Self {
        Self {
            keys,
            ttl: Duration::hours(DEFAULT_TOKEN_TTL_HOURS),
        }
    }

    /// 토큰 수명 설정
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// 사용자에게 토큰 발급
    pub async fn issue(&self, user: &User) -> Result<String> {
        Ok(self.issue_at(user, Utc::now()).await?.token)
    }

    /// 지정한 시각 기준으로 토큰 발급
    pub async fn issue_at(&self, user: &User, now: DateTime<Utc>) -> Result<IssuedToken> {
        let claims = Claims::new(user.id.clone(), user.access_level, now, self.ttl)
            .with_generation(user.generation.clone());
        let token = self.sign(&claims).await?;
        Ok(IssuedToken { token, claims })
    }

    /// Claims 서명
    pub async fn sign(&self, claims: &Claims) -> Result<String> {
        let header = Header {
            alg: ALGORITHM.to_string(),
            typ: Some("JWT".to_string()),
        };

        let header = general_purpose::URL_SAFE_NO_PAD.encode(serde_json::to_vec(&header)?);
        let payload = general_purpose::URL_SAFE_NO_PAD.encode(serde_json::to_vec(claims)?);
        let signing_input = format!("{header}.{payload}");

        let keys = self.keys.active().await?;
        let signature: Signature = keys
            .signing_key()
            .try_sign(signing_input.as_bytes())
            .map_err(|e| Error::key_material(format!("signing failed: {e}")))?;

        let signature = general_purpose::URL_SAFE_NO_PAD.encode(signature.to_bytes());
        Ok(format!("{signing_input}.{signature}"))
    }

    /// 토큰 검증 및 Claims 추출
    pub async fn validate(&self, token: &str) -> Result<Claims> {
        self.validate_at(token, Utc::now()).await
    }

    /// 지정한 시각 기준으로 토큰 검증
    ///
    /// # 검증 순서
    /// 1. 세 조각 구조 및 헤더 디코딩
    /// 2. `alg == ES512` (키를 사용하기 전에 확인)
    /// 3. 활성 공개키로 서명 검증
    /// 4. 만료 확인
    pub async fn validate_at(&self, token: &str, now: DateTime<Utc>) -> Result<Claims> {
        let mut parts = token.trim().split('.');
        let (Some(header_b64), Some(payload_b64), Some(signature_b64), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(Error::invalid_token("expected three dot-separated segments"));
        };

        let header: Header = serde_json::from_slice(&decode_segment("header", header_b64)?)
            .map_err(|_| Error::invalid_token("header is not valid JSON"))?;

        if header.alg != ALGORITHM {
            return Err(Error::invalid_token(format!(
                "unexpected signing algorithm: {}",
                header.alg
            )));
        }

        let signature = Signature::from_slice(&decode_segment("signature", signature_b64)?)
            .map_err(|_| Error::invalid_token("signature is not a valid ES512 signature"))?;

        let keys = self.keys.active().await?;
        let signing_input = format!("{header_b64}.{payload_b64}");
        keys.verifying_key()
            .verify(signing_input.as_bytes(), &signature)
            .map_err(|_| Error::invalid_token("signature verification failed"))?;

        let claims: Claims = serde_json::from_slice(&decode_segment("payload", payload_b64)?)
            .map_err(|_| Error::invalid_token("payload is not valid claims"))?;

        if claims.is_expired_at(now) {
            return Err(Error::TokenExpired);
        }

        Ok(claims)
    }
}

fn decode_segment(name: &str, segment: &str) -> Result<Vec<u8>> {
    general_purpose::URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|_| Error::invalid_token(format!("{name} is not base64url")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::AccessLevel;
    use crate::backing::MemoryBackingStore;

    fn service() -> TokenService {
        let backing = Arc::new(MemoryBackingStore::new());
        TokenService::new(Arc::new(KeyMaterial::new(backing, "kubegate")))
    }

    fn user(id: &str, level: AccessLevel) -> User {
        User::new(id, format!("{id}@example.com"), "secret", level).unwrap()
    }

    fn segments(token: &str) -> Vec<String> {
        token.split('.').map(str::to_string).collect()
    }

    #[test]
    fn test_bearer_from_header() {
        let cred = BearerCredential::from_header(Some("Bearer abc.def.ghi")).unwrap();
        assert_eq!(cred.token, "abc.def.ghi");

        let cred = BearerCredential::from_header(Some("bearer   tok")).unwrap();
        assert_eq!(cred.token, "tok");

        for bad in [None, Some(""), Some("Bearer"), Some("Bearer a b"), Some("Basic dXNlcg==")] {
            let err = BearerCredential::from_header(bad).unwrap_err();
            assert!(matches!(err, Error::MalformedCredential { .. }), "{bad:?}");
        }
    }

    #[tokio::test]
    async fn test_issue_then_validate() {
        let tokens = service();
        let alice = user("alice", AccessLevel::User);

        let token = tokens.issue(&alice).await.unwrap();
        assert_eq!(token.split('.').count(), 3);

        let claims = tokens.validate(&token).await.unwrap();
        assert_eq!(claims.sub, "alice");
        assert!(claims.matches_user(&alice));
        assert_eq!(claims.access_level, AccessLevel::User);
        assert_eq!(claims.exp - claims.iat, Duration::days(7));
    }

    #[tokio::test]
    async fn test_expired_token_rejected() {
        let tokens = service().with_ttl(Duration::hours(1));
        let issued = tokens
            .issue_at(&user("alice", AccessLevel::Admin), Utc::now())
            .await
            .unwrap();

        // 만료 시각 정각까지는 유효
        assert!(tokens.validate_at(&issued.token, issued.claims.exp).await.is_ok());

        let err = tokens
            .validate_at(&issued.token, issued.claims.exp + Duration::seconds(1))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::TokenExpired));
    }

    #[tokio::test]
    async fn test_signature_bit_flip_rejected() {
        let tokens = service();
        let token = tokens.issue(&user("alice", AccessLevel::User)).await.unwrap();
        let parts = segments(&token);
        let signature = general_purpose::URL_SAFE_NO_PAD.decode(&parts[2]).unwrap();

        for byte in [0, 33, 65, 66, 100, signature.len() - 1] {
            for bit in [0u8, 3, 7] {
                let mut flipped = signature.clone();
                flipped[byte] ^= 1 << bit;
                let forged = format!(
                    "{}.{}.{}",
                    parts[0],
                    parts[1],
                    general_purpose::URL_SAFE_NO_PAD.encode(&flipped)
                );
                let err = tokens.validate(&forged).await.unwrap_err();
                assert!(err.is_credential_failure(), "byte {byte} bit {bit}: {err}");
            }
        }
    }

    #[tokio::test]
    async fn test_tampered_payload_rejected() {
        let tokens = service();
        let token = tokens.issue(&user("alice", AccessLevel::Reader)).await.unwrap();
        let parts = segments(&token);

        let mut claims: Claims =
            serde_json::from_slice(&general_purpose::URL_SAFE_NO_PAD.decode(&parts[1]).unwrap()).unwrap();
        claims.sub = "admin".to_string();
        let payload = general_purpose::URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims).unwrap());

        let forged = format!("{}.{}.{}", parts[0], payload, parts[2]);
        assert!(matches!(
            tokens.validate(&forged).await,
            Err(Error::InvalidToken { .. })
        ));
    }

    #[tokio::test]
    async fn test_algorithm_confusion_rejected() {
        let tokens = service();
        let token = tokens.issue(&user("alice", AccessLevel::Admin)).await.unwrap();
        let parts = segments(&token);

        for alg in ["none", "HS256", "HS512", "ES256", "RS256", "es512"] {
            let header = general_purpose::URL_SAFE_NO_PAD
                .encode(format!(r#"{{"alg":"{alg}","typ":"JWT"}}"#));

            // 원래 서명을 그대로 붙여도, 빈 서명이어도 거부
            for signature in [parts[2].as_str(), ""] {
                let forged = format!("{}.{}.{}", header, parts[1], signature);
                let err = tokens.validate(&forged).await.unwrap_err();
                assert!(
                    err.to_string().contains("unexpected signing algorithm"),
                    "{alg}: {err}"
                );
            }
        }
    }

    #[tokio::test]
    async fn test_malformed_tokens_rejected() {
        let tokens = service();
        for bad in ["", "abc", "a.b", "a.b.c.d", "!!.??.##"] {
            assert!(matches!(
                tokens.validate(bad).await,
                Err(Error::InvalidToken { .. })
            ));
        }
    }

    #[tokio::test]
    async fn test_key_change_invalidates_tokens() {
        let issuer = service();
        let token = issuer.issue(&user("alice", AccessLevel::User)).await.unwrap();

        // 다른 키 저장소를 가진 서비스에서는 검증 실패
        let other = service();
        let err = other.validate(&token).await.unwrap_err();
        assert!(matches!(err, Error::InvalidToken { .. }));
    }
}
