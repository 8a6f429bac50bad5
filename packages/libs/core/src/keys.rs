//! 서명 키 관리
//!
//! 토큰 서명에 쓰는 P-521 ECDSA 키 쌍을 생성, 저장, 캐시합니다.
//!
//! # 저장 형식
//!
//! 잘 알려진 백킹 레코드 하나(`{namespace}/{record}`)에 두 필드로 저장됩니다.
//!
//! - `private_key`: `KUBEGATE ES512 PRIVATE KEY` 봉투 (스칼라 바이트)
//! - `public_key`: `KUBEGATE ES512 PUBLIC KEY` 봉투 (SEC1 비압축 포인트)
//!
//! # 수명
//!
//! 활성 키 쌍은 프로세스당 하나이며 처음 접근할 때 한 번만 로드됩니다.
//! 외부에서 키를 교체하면 재시작 전까지 반영되지 않고,
//! 교체 즉시 이전 키로 발급된 모든 토큰은 검증에 실패합니다.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use base64::{engine::general_purpose, Engine as _};
use p521::ecdsa::{SigningKey, VerifyingKey};
use rand::rngs::OsRng;
use tokio::sync::OnceCell;

use crate::backing::{bounded, BackingRecord, BackingStore};
use crate::error::{Error, Result};

/// 기본 레코드 이름
pub const DEFAULT_KEY_RECORD: &str = "token-signing-keys";

const PRIVATE_KEY_FIELD: &str = "private_key";
const PUBLIC_KEY_FIELD: &str = "public_key";

const PRIVATE_KEY_LABEL: &str = "KUBEGATE ES512 PRIVATE KEY";
const PUBLIC_KEY_LABEL: &str = "KUBEGATE ES512 PUBLIC KEY";

/// 서명 키 쌍
pub struct KeyPair {
    signing_key: SigningKey,
    verifying_key: VerifyingKey,
    private_envelope: String,
    public_envelope: String,
}

impl KeyPair {
    /// 새 키 쌍 생성
    pub fn generate() -> Self {
        let signing_key = SigningKey::random(&mut OsRng);
        Self::from_signing_key(signing_key)
    }

    fn from_signing_key(signing_key: SigningKey) -> Self {
        let verifying_key = VerifyingKey::from(&signing_key);
        let private_envelope = encode_envelope(PRIVATE_KEY_LABEL, &signing_key.to_bytes());
        let public_envelope = encode_envelope(
            PUBLIC_KEY_LABEL,
            verifying_key.to_encoded_point(false).as_bytes(),
        );
        Self {
            signing_key,
            verifying_key,
            private_envelope,
            public_envelope,
        }
    }

    /// 저장된 봉투에서 복원
    ///
    /// 공개키가 개인키에서 유도한 값과 다르면 실패합니다.
    pub fn from_envelopes(private_envelope: &str, public_envelope: &str) -> Result<Self> {
        let scalar = decode_envelope(PRIVATE_KEY_LABEL, private_envelope)?;
        let signing_key = SigningKey::from_slice(&scalar)
            .map_err(|_| Error::key_material("private key is not a valid P-521 scalar"))?;

        let point = decode_envelope(PUBLIC_KEY_LABEL, public_envelope)?;
        let stored_public = VerifyingKey::from_sec1_bytes(&point)
            .map_err(|_| Error::key_material("public key is not a valid P-521 point"))?;

        let pair = Self::from_signing_key(signing_key);
        if pair.verifying_key.to_encoded_point(false) != stored_public.to_encoded_point(false) {
            return Err(Error::key_material(
                "stored public key does not match the private key",
            ));
        }
        Ok(pair)
    }

    pub fn signing_key(&self) -> &SigningKey {
        &self.signing_key
    }

    pub fn verifying_key(&self) -> &VerifyingKey {
        &self.verifying_key
    }

    pub fn private_envelope(&self) -> &str {
        &self.private_envelope
    }

    pub fn public_envelope(&self) -> &str {
        &self.public_envelope
    }

    fn write_into(&self, record: &mut BackingRecord) {
        record.set_field(PRIVATE_KEY_FIELD, self.private_envelope.as_bytes().to_vec());
        record.set_field(PUBLIC_KEY_FIELD, self.public_envelope.as_bytes().to_vec());
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("public_envelope", &self.public_envelope)
            .finish_non_exhaustive()
    }
}

fn encode_envelope(label: &str, bytes: &[u8]) -> String {
    format!(
        "-----BEGIN {label}-----\n{}\n-----END {label}-----\n",
        general_purpose::STANDARD.encode(bytes)
    )
}

fn decode_envelope(label: &str, envelope: &str) -> Result<Vec<u8>> {
    let begin = format!("-----BEGIN {label}-----");
    let end = format!("-----END {label}-----");

    let body = envelope
        .trim()
        .strip_prefix(begin.as_str())
        .and_then(|rest| rest.strip_suffix(end.as_str()))
        .ok_or_else(|| Error::key_material(format!("expected a {label} envelope")))?;

    let body: String = body.chars().filter(|c| !c.is_whitespace()).collect();
    general_purpose::STANDARD
        .decode(body.as_bytes())
        .map_err(|e| Error::key_material(format!("{label} body is not base64: {e}")))
}

/// 키 관리자
///
/// 백킹 스토어 위에서 활성 키 쌍을 관리합니다.
/// `active()`는 동시에 호출되어도 `bootstrap()`을 한 번만 실행합니다.
pub struct KeyMaterial {
    backing: Arc<dyn BackingStore>,
    namespace: String,
    record_name: String,
    timeout: Duration,
    active: OnceCell<Arc<KeyPair>>,
}

impl KeyMaterial {
    pub fn new(backing: Arc<dyn BackingStore>, namespace: impl Into<String>) -> Self {
        Self {
            backing,
            namespace: namespace.into(),
            record_name: DEFAULT_KEY_RECORD.to_string(),
            timeout: Duration::from_secs(5),
            active: OnceCell::new(),
        }
    }

    /// 레코드 이름 설정
    pub fn with_record_name(mut self, name: impl Into<String>) -> Self {
        self.record_name = name.into();
        self
    }

    /// 백킹 스토어 호출 제한 시간 설정
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// 활성 키 쌍
    ///
    /// 초기화에 실패하면 에러를 반환하고, 다음 호출에서 다시 시도합니다.
    pub async fn active(&self) -> Result<Arc<KeyPair>> {
        let pair = self
            .active
            .get_or_try_init(|| async { self.bootstrap().await.map(Arc::new) })
            .await?;
        Ok(Arc::clone(pair))
    }

    /// 저장소에서 키 쌍을 로드하거나 새로 생성해 저장
    pub async fn bootstrap(&self) -> Result<KeyPair> {
        let existing = self.fetch().await?;

        match existing {
            None => {
                let pair = KeyPair::generate();
                let mut record = BackingRecord::new(&self.namespace, &self.record_name);
                pair.write_into(&mut record);

                match self.create(&record).await {
                    Ok(()) => {
                        tracing::info!(record = %record.path(), "generated new token signing key pair");
                        Ok(pair)
                    }
                    Err(Error::AlreadyExists { .. }) => {
                        tracing::info!(record = %record.path(), "signing keys created concurrently, loading them");
                        self.load_existing().await
                    }
                    Err(e) => Err(e),
                }
            }
            Some(mut record) => {
                let private = record.field(PRIVATE_KEY_FIELD).is_some();
                let public = record.field(PUBLIC_KEY_FIELD).is_some();

                match (private, public) {
                    (true, true) => {
                        let pair = decode_record(&record)?;
                        tracing::info!(record = %record.path(), "loaded token signing key pair");
                        Ok(pair)
                    }
                    (false, false) => {
                        let pair = KeyPair::generate();
                        pair.write_into(&mut record);

                        match self.update(&record).await {
                            Ok(()) => {
                                tracing::info!(record = %record.path(), "generated new token signing key pair");
                                Ok(pair)
                            }
                            Err(Error::Conflict { .. }) => self.load_existing().await,
                            Err(e) => Err(e),
                        }
                    }
                    _ => Err(Error::key_material(format!(
                        "key record {} is incomplete",
                        record.path()
                    ))),
                }
            }
        }
    }

    async fn load_existing(&self) -> Result<KeyPair> {
        let record = self.fetch().await?.ok_or_else(|| {
            Error::key_material(format!(
                "key record {}/{} disappeared during bootstrap",
                self.namespace, self.record_name
            ))
        })?;
        decode_record(&record)
    }

    async fn fetch(&self) -> Result<Option<BackingRecord>> {
        bounded(
            self.timeout,
            "get signing keys",
            self.backing.get(&self.namespace, &self.record_name),
        )
        .await
    }

    async fn create(&self, record: &BackingRecord) -> Result<()> {
        bounded(self.timeout, "create signing keys", self.backing.create(record)).await?;
        Ok(())
    }

    async fn update(&self, record: &BackingRecord) -> Result<()> {
        bounded(self.timeout, "update signing keys", self.backing.update(record)).await?;
        Ok(())
    }
}

fn decode_record(record: &BackingRecord) -> Result<KeyPair> {
    let field = |name: &str| -> Result<String> {
        let bytes = record.field(name).ok_or_else(|| {
            Error::key_material(format!("key record {} is missing {name}", record.path()))
        })?;
        String::from_utf8(bytes.to_vec())
            .map_err(|_| Error::key_material(format!("{name} is not valid UTF-8")))
    };

    KeyPair::from_envelopes(&field(PRIVATE_KEY_FIELD)?, &field(PUBLIC_KEY_FIELD)?)
}
