//! Huddle credential primitives.
//!
//! Password storage uses Argon2id with a per-password random salt, encoded as
//! `derived_hex.salt_hex`. Session identifiers are random 256-bit tokens.

pub mod password;
pub mod tokens;

pub use password::CredentialStore;
