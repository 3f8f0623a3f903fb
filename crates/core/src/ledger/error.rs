//! Ledger entry log error types.

use chrono::{DateTime, Utc};
use tally_shared::Money;
use thiserror::Error;

/// Errors raised when appending to a payment history.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    /// Entry dates identify entries, so they must strictly increase.
    #[error("Entry dated {attempted} does not follow the last entry dated {last}")]
    NonMonotonicDate {
        /// Date of the current last entry.
        last: DateTime<Utc>,
        /// Date of the rejected entry.
        attempted: DateTime<Utc>,
    },

    /// Entry amounts must be positive.
    #[error("Entry amount must be positive, got {0}")]
    NonPositiveAmount(Money),

    /// A reversal must name the payment it undoes.
    #[error("Reversal does not reference a payment")]
    MissingPaymentReference,

    /// The referenced payment is not in this history.
    #[error("No payment dated {0} in this history")]
    UnknownPayment(DateTime<Utc>),

    /// The referenced payment has already been reversed.
    #[error("Payment dated {0} has already been reversed")]
    AlreadyReversed(DateTime<Utc>),

    /// A reversal must undo the full amount of its payment.
    #[error("Reversal amount {actual} does not match payment amount {expected}")]
    AmountMismatch {
        /// Amount of the referenced payment.
        expected: Money,
        /// Amount on the reversal.
        actual: Money,
    },
}

impl LedgerError {
    /// Returns the error code for API responses.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::NonMonotonicDate { .. } => "NON_MONOTONIC_ENTRY_DATE",
            Self::NonPositiveAmount(_) => "NON_POSITIVE_ENTRY_AMOUNT",
            Self::MissingPaymentReference => "MISSING_PAYMENT_REFERENCE",
            Self::UnknownPayment(_) => "UNKNOWN_PAYMENT",
            Self::AlreadyReversed(_) => "PAYMENT_ALREADY_REVERSED",
            Self::AmountMismatch { .. } => "REVERSAL_AMOUNT_MISMATCH",
        }
    }
}
