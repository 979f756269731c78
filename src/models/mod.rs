//! Data models for the document assistant client.
//!
//! Field names follow the backend JSON contract; Rust names follow Rust conventions.

mod chat;
mod drive;
mod user;

pub use chat::*;
pub use drive::*;
pub use user::*;
