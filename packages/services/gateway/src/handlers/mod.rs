//! HTTP 핸들러

pub mod auth;
pub mod contexts;
pub mod health;
pub mod users;
