//! Sale and receivable synchronization.
//!
//! - `service` - sale status derivation and receivable regeneration on save
//! - `report` - overdue classification, filters and dashboard totals

pub mod report;
pub mod service;

pub use report::{
    DisplayStatus, ReceivableSummary, StatusFilter, is_overdue, receivables_by_filter, summarize,
};
pub use service::{SaleSyncOutcome, SaleSynchronizer};
