//! Shared domain building blocks for MergeDesk.
//!
//! Zero internal dependencies so every other crate (db, gitlab, api) can use
//! the same id/timestamp types, error taxonomy, token cipher, and chat intent
//! parser.

pub mod error;
pub mod intent;
pub mod token_cipher;
pub mod types;
