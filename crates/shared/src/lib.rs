//! Shared utilities and common types for the chama backend.
//!
//! This crate provides common functionality used across all other crates:
//! - Callback signature verification (HMAC-SHA256)
//! - JWT verification
//! - Offset pagination
//! - Money validation helpers

pub mod crypto;
pub mod jwt;
pub mod pagination;
pub mod validation;
