//! Receivable domain types.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tally_shared::{CustomerId, Money, ReceivableId, SaleId};

use crate::allocation::{Allocation, PaymentAdjustment};
use crate::ledger::{LedgerLog, PaymentHistoryEntry};
use crate::sale::PaymentStatus;

use super::error::ReceivableError;

/// One installment's outstanding obligation for a sale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receivable {
    /// Receivable ID.
    pub id: ReceivableId,
    /// Owning sale.
    pub sale_id: SaleId,
    /// Debtor.
    pub customer_id: CustomerId,
    /// Remaining balance.
    pub amount: Money,
    /// Amount at creation; never changes.
    pub original_amount: Money,
    /// Net amount received so far.
    pub total_paid: Money,
    /// When the balance is due.
    pub due_date: NaiveDate,
    /// `paid` exactly when `amount` is zero.
    pub status: PaymentStatus,
    /// When the receivable was last fully settled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_date: Option<DateTime<Utc>>,
    /// 1-based position within the sale's schedule.
    pub installment_number: u32,
    /// Number of receivables the sale was split into.
    pub total_installments: u32,
    /// Append-only payment/reversal history.
    #[serde(default)]
    pub payment_history: Vec<PaymentHistoryEntry>,
}

impl Receivable {
    /// Returns true if the receivable is still owed.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.status == PaymentStatus::Pending
    }

    /// Returns true if the receivable is part of a multi-installment plan.
    #[must_use]
    pub fn is_grouped(&self) -> bool {
        self.total_installments > 1
    }

    /// Returns true if any payment on the receivable is unreversed.
    #[must_use]
    pub fn has_active_payment(&self) -> bool {
        LedgerLog::has_active_payment(&self.payment_history)
    }
}

/// A payment spread over a selection of receivables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchPaymentRequest {
    /// Receivables to pay, in any order.
    pub receivable_ids: Vec<ReceivableId>,
    /// Amount handed over by the customer.
    pub payment_amount: Money,
    /// Optional discount or surcharge.
    #[serde(default)]
    pub adjustment: Option<PaymentAdjustment>,
    /// Renegotiated due date for whatever remains pending.
    #[serde(default)]
    pub new_due_date: Option<NaiveDate>,
}

/// Result of a batch payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchPaymentOutcome {
    /// Amount handed over by the customer.
    pub requested: Money,
    /// Size of the discount or surcharge.
    pub adjustment: Money,
    /// Amount actually allocated.
    pub effective_amount: Money,
    /// Per-receivable allocation, in due-date order.
    pub allocations: Vec<Allocation>,
    /// Receivables whose due date moved to the renegotiated date.
    pub rescheduled: Vec<ReceivableId>,
    /// Sales owning the selected receivables.
    pub touched_sales: Vec<SaleId>,
}

/// Result of reversing one payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReversalOutcome {
    /// The receivable.
    pub receivable_id: ReceivableId,
    /// Date of the payment that was undone.
    pub reversed_payment_date: DateTime<Utc>,
    /// Amount restored to the balance.
    pub amount: Money,
}

/// Result of reversing across an installment group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupReversalOutcome {
    /// Reversals that were applied.
    pub reversed: Vec<ReversalOutcome>,
    /// Members that could not be reversed, with the reason.
    pub failures: Vec<(ReceivableId, ReceivableError)>,
}
