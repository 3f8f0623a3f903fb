//! Sale model.
//!
//! Sales are owned by the caller's catalog/checkout flow; the engine only reads
//! the fields that determine receivables and writes back `payment_status`.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tally_shared::{CustomerId, Money, ProductId, SaleId};

use crate::allocation::IntervalPolicy;

/// How the customer pays for a sale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Settled at the counter.
    Cash,
    /// Credit card.
    CreditCard,
    /// Debit card.
    DebitCard,
    /// Bank transfer.
    BankTransfer,
    /// Store credit paid in installments.
    Installment,
}

impl PaymentMethod {
    /// Returns true if the method settles at the point of sale and never
    /// produces a receivable.
    #[must_use]
    pub fn is_immediate(self) -> bool {
        matches!(self, Self::Cash)
    }
}

/// Settlement status shared by sales and receivables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    /// Money is still owed.
    #[default]
    Pending,
    /// Fully settled.
    Paid,
}

/// One line of a sale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleItem {
    /// Product sold.
    pub product_id: ProductId,
    /// Units sold.
    pub quantity: u32,
    /// Price per unit.
    pub unit_price: Money,
    /// `quantity * unit_price`.
    pub line_total: Money,
}

/// A recorded sale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sale {
    /// Sale ID.
    pub id: SaleId,
    /// Buyer.
    pub customer_id: CustomerId,
    /// Date of the sale.
    pub date: NaiveDate,
    /// Line items.
    #[serde(default)]
    pub items: Vec<SaleItem>,
    /// Amount owed for the whole sale.
    pub total: Money,
    /// Payment method.
    pub payment_method: PaymentMethod,
    /// Aggregate status, derived from receivables when any exist.
    #[serde(default)]
    pub payment_status: PaymentStatus,
    /// Number of installments, if the sale is split.
    #[serde(default)]
    pub installments: Option<u32>,
    /// Spacing between installments; engine default when absent.
    #[serde(default)]
    pub installment_interval: Option<IntervalPolicy>,
    /// Due date of the first installment.
    #[serde(default)]
    pub first_due_date: Option<NaiveDate>,
    /// Explicit due date for every installment. Takes precedence over
    /// `installments`/`installment_interval`/`first_due_date`.
    #[serde(default)]
    pub installment_dates: Option<Vec<NaiveDate>>,
}

impl Sale {
    /// Returns true if saving this sale should produce receivables.
    #[must_use]
    pub fn requires_receivables(&self) -> bool {
        self.payment_status == PaymentStatus::Pending && !self.payment_method.is_immediate()
    }

    /// Returns true if anything that shapes the receivable schedule differs
    /// between `self` and `previous`.
    #[must_use]
    pub fn payment_terms_changed(&self, previous: &Self) -> bool {
        self.total != previous.total
            || self.payment_method != previous.payment_method
            || self.installments != previous.installments
            || self.installment_interval != previous.installment_interval
            || self.first_due_date != previous.first_due_date
            || self.installment_dates != previous.installment_dates
    }

    /// Sum of line totals.
    ///
    /// Returns `None` on overflow.
    #[must_use]
    pub fn items_total(&self) -> Option<Money> {
        self.items
            .iter()
            .try_fold(Money::ZERO, |acc, item| acc.checked_add(item.line_total))
    }
}
