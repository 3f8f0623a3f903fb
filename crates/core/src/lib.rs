//! Core receivable ledger logic for Tally.
//!
//! This crate contains pure business logic with ZERO storage or web dependencies.
//! Callers hand in a [`LedgerSnapshot`], get a new one back, and persist it
//! themselves.
//!
//! # Modules
//!
//! - `allocation` - Installment schedules and payment allocation
//! - `ledger` - Append-only payment/reversal history per receivable
//! - `receivable` - Receivable lifecycle: creation, payment, reversal, deletion
//! - `sync` - Sale status derivation, overdue classification, summaries
//! - `engine` - Facade tying the above together with an injected clock

pub mod allocation;
pub mod clock;
pub mod engine;
pub mod ledger;
pub mod receivable;
pub mod sale;
pub mod snapshot;
pub mod sync;

pub use clock::{Clock, FixedClock, SystemClock};
pub use engine::{Applied, ReceivableEngine};
pub use receivable::{
    BatchPaymentOutcome, BatchPaymentRequest, GroupReversalOutcome, Receivable, ReceivableError,
    ReversalOutcome,
};
pub use sale::{PaymentMethod, PaymentStatus, Sale, SaleItem};
pub use snapshot::LedgerSnapshot;
pub use sync::{DisplayStatus, ReceivableSummary, SaleSyncOutcome, StatusFilter};
