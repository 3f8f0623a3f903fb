//! Money allocation.
//!
//! Pure functions with no state:
//! - `schedule` - splitting a sale total into installments
//! - `payment` - distributing a batch payment over receivables, with
//!   optional discount/surcharge
//! - `error` - allocation error types

pub mod error;
pub mod payment;
pub mod schedule;

#[cfg(test)]
mod props;

pub use error::AllocationError;
pub use payment::{
    AdjustedPayment, AdjustmentDirection, AdjustmentValue, Allocation, OutstandingBalance,
    PaymentAdjustment, PaymentAllocator, Settlement,
};
pub use schedule::{InstallmentPlanner, InstallmentShare, IntervalPolicy};
