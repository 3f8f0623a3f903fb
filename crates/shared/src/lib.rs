//! Shared types, errors, and configuration for Tally.
//!
//! This crate provides common types used across all other crates:
//! - Fixed-point money in minor currency units
//! - Typed IDs for type-safe entity references
//! - Application-wide error types
//! - Configuration management

pub mod config;
pub mod error;
pub mod types;

pub use config::{AppConfig, EngineConfig, IntervalUnit, StorageConfig};
pub use error::{AppError, AppResult};
pub use types::{CustomerId, Money, MoneyError, ProductId, ReceivableId, SaleId};
