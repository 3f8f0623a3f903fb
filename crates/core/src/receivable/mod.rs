//! Receivable lifecycle.
//!
//! This module owns everything that changes a receivable:
//! - Creation from a sale's payment terms
//! - Batch payment allocation with discount/surcharge and renegotiation
//! - LIFO reversal, single and per installment group
//! - Due-date changes and guarded cascade deletion

pub mod error;
pub mod invariants;
pub mod service;
pub mod types;

#[cfg(test)]
mod service_props;

pub use error::ReceivableError;
pub use invariants::{InvariantViolation, check_receivable, check_sale, check_snapshot};
pub use service::ReceivableService;
pub use types::{
    BatchPaymentOutcome, BatchPaymentRequest, GroupReversalOutcome, Receivable, ReversalOutcome,
};
