//! Persistence layer for the chama engine.
//!
//! This crate contains:
//! - Database connection management
//! - Entity definitions (database row mappings)
//! - Repository implementations and ledger primitives
//! - The unit of work that bounds every engine command

pub mod db;
pub mod entities;
pub mod metrics;
pub mod repositories;
pub mod unit_of_work;

pub use unit_of_work::{with_retry, UnitOfWork};
