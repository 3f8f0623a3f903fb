//! Ledger entry log.
//!
//! This module implements the per-receivable audit trail:
//! - Payment and reversal entries
//! - Append-only history with integrity checks
//! - "Last unreversed payment" lookup used by reversal

pub mod entry;
pub mod error;
pub mod log;

pub use entry::{EntryKind, PaymentHistoryEntry};
pub use error::LedgerError;
pub use log::LedgerLog;
