//! Domain layer for the chama backend.
//!
//! This crate contains:
//! - Domain models with their state machines (loans, cycles, dividends, meetings)
//! - Authorization predicates and notification builders
//! - The engine error type

pub mod error;
pub mod models;
pub mod services;

pub use error::{EngineError, EngineResult, ErrorCategory};
