//! Receivable lifecycle error types.

use tally_shared::{AppError, Money, ReceivableId, SaleId};
use thiserror::Error;

use crate::allocation::AllocationError;
use crate::ledger::LedgerError;

/// Errors returned by receivable lifecycle operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReceivableError {
    /// The sale's installment terms cannot form a schedule.
    #[error("Invalid installment plan: {0}")]
    InvalidInstallmentPlan(String),

    /// The payment is not positive or exceeds what is owed.
    #[error("Invalid payment amount: {0}")]
    InvalidPaymentAmount(String),

    /// Every payment on the receivable has already been reversed.
    #[error("Receivable {0} has no payment to reverse")]
    NoReversablePayment(ReceivableId),

    /// Restoring the payment would push the balance past the original amount.
    #[error(
        "Reversing on receivable {receivable_id} would restore {restored}, above the original {original}"
    )]
    ReversalExceedsOriginal {
        /// The receivable.
        receivable_id: ReceivableId,
        /// Balance after the would-be reversal.
        restored: Money,
        /// Original amount of the receivable.
        original: Money,
    },

    /// The sale still has receivables with unreversed payments.
    #[error("Sale {sale_id} has {count} receivable(s) with active payments", count = .receivable_ids.len())]
    SaleHasActivePayments {
        /// The sale.
        sale_id: SaleId,
        /// Receivables holding unreversed payments.
        receivable_ids: Vec<ReceivableId>,
    },

    /// Receivable not found.
    #[error("Receivable not found: {0}")]
    ReceivableNotFound(ReceivableId),

    /// Sale not found.
    #[error("Sale not found: {0}")]
    SaleNotFound(SaleId),

    /// The operation only applies to pending receivables.
    #[error("Receivable {0} is already paid")]
    ReceivableAlreadyPaid(ReceivableId),

    /// An amount left the representable range.
    #[error("Amount overflow")]
    AmountOverflow,

    /// The receivable's payment history rejected an entry.
    #[error("Ledger error on receivable {receivable_id}: {source}")]
    Ledger {
        /// The receivable.
        receivable_id: ReceivableId,
        /// Underlying ledger error.
        #[source]
        source: LedgerError,
    },

    /// A post-operation consistency check failed; nothing was committed.
    #[error("Integrity violation: {0}")]
    IntegrityViolation(String),
}

impl ReceivableError {
    /// Returns the error code for API responses.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidInstallmentPlan(_) => "INVALID_INSTALLMENT_PLAN",
            Self::InvalidPaymentAmount(_) => "INVALID_PAYMENT_AMOUNT",
            Self::NoReversablePayment(_) => "NO_REVERSABLE_PAYMENT",
            Self::ReversalExceedsOriginal { .. } => "REVERSAL_EXCEEDS_ORIGINAL",
            Self::SaleHasActivePayments { .. } => "SALE_HAS_ACTIVE_PAYMENTS",
            Self::ReceivableNotFound(_) => "RECEIVABLE_NOT_FOUND",
            Self::SaleNotFound(_) => "SALE_NOT_FOUND",
            Self::ReceivableAlreadyPaid(_) => "RECEIVABLE_ALREADY_PAID",
            Self::AmountOverflow => "AMOUNT_OVERFLOW",
            Self::Ledger { source, .. } => source.error_code(),
            Self::IntegrityViolation(_) => "INTEGRITY_VIOLATION",
        }
    }

    pub(crate) fn ledger(receivable_id: ReceivableId) -> impl FnOnce(LedgerError) -> Self {
        move |source| Self::Ledger {
            receivable_id,
            source,
        }
    }
}

impl From<AllocationError> for ReceivableError {
    fn from(err: AllocationError) -> Self {
        match err {
            AllocationError::InvalidInstallmentPlan(msg) => Self::InvalidInstallmentPlan(msg),
            AllocationError::InvalidPaymentAmount(msg) => Self::InvalidPaymentAmount(msg),
        }
    }
}

impl From<ReceivableError> for AppError {
    fn from(err: ReceivableError) -> Self {
        let msg = err.to_string();
        match err {
            ReceivableError::ReceivableNotFound(_) | ReceivableError::SaleNotFound(_) => {
                Self::NotFound(msg)
            }
            ReceivableError::InvalidInstallmentPlan(_)
            | ReceivableError::InvalidPaymentAmount(_)
            | ReceivableError::AmountOverflow => Self::Validation(msg),
            ReceivableError::NoReversablePayment(_)
            | ReceivableError::ReversalExceedsOriginal { .. }
            | ReceivableError::ReceivableAlreadyPaid(_)
            | ReceivableError::Ledger { .. } => Self::BusinessRule(msg),
            ReceivableError::SaleHasActivePayments { .. } => Self::Conflict(msg),
            ReceivableError::IntegrityViolation(_) => Self::Internal(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocation_errors_keep_their_code() {
        let err: ReceivableError =
            AllocationError::InvalidPaymentAmount("zero".to_string()).into();
        assert_eq!(err.error_code(), "INVALID_PAYMENT_AMOUNT");
    }

    #[test]
    fn test_app_error_mapping() {
        let not_found: AppError = ReceivableError::SaleNotFound(SaleId::new()).into();
        assert_eq!(not_found.error_code(), "NOT_FOUND");

        let conflict: AppError = ReceivableError::SaleHasActivePayments {
            sale_id: SaleId::new(),
            receivable_ids: vec![ReceivableId::new()],
        }
        .into();
        assert_eq!(conflict.error_code(), "CONFLICT");
        assert!(conflict.to_string().contains("1 receivable(s)"));

        let rule: AppError = ReceivableError::NoReversablePayment(ReceivableId::new()).into();
        assert_eq!(rule.error_code(), "BUSINESS_RULE_VIOLATION");
    }
}
