//! 자격 증명 저장소
//!
//! # 개요
//!
//! 백킹 레코드 하나를 문서 저장소로 사용하는 패턴 위에
//! 사용자(User)와 컨텍스트(Context) 두 저장소를 올립니다.
//!
//! # 모듈 구조
//!
//! - `store`: 제네릭 문서 저장소 (get/put/delete/list)
//! - `user`: 사용자 레코드와 저장소
//! - `context`: 컨텍스트 레코드와 저장소

mod context;
mod store;
mod user;

pub use context::{Context, ContextAccess, ContextStore, CONTEXTS_RECORD, OWN_CONTEXT_ID};
pub use store::{Document, DocumentStore};
pub use user::{User, UserPatch, UserStore, DEFAULT_ADMIN_ID, USERS_RECORD};
