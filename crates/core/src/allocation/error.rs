//! Allocation error types.

use thiserror::Error;

/// Errors raised by schedule generation and payment allocation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AllocationError {
    /// The installment count, total, interval, or dates cannot form a plan.
    #[error("Invalid installment plan: {0}")]
    InvalidInstallmentPlan(String),

    /// The payment is not positive, becomes non-positive after adjustment,
    /// or cannot be represented.
    #[error("Invalid payment amount: {0}")]
    InvalidPaymentAmount(String),
}

impl AllocationError {
    /// Returns the error code for API responses.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidInstallmentPlan(_) => "INVALID_INSTALLMENT_PLAN",
            Self::InvalidPaymentAmount(_) => "INVALID_PAYMENT_AMOUNT",
        }
    }
}
