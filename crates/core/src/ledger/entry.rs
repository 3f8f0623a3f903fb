//! Payment history entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tally_shared::Money;

/// Kind of ledger event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    /// Money received against the receivable.
    Payment,
    /// Undo of exactly one earlier payment.
    Reversal,
}

/// An immutable payment or reversal event.
///
/// The timestamp doubles as the entry's identity within one receivable's
/// history; reversals point back at the payment they undo by that timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentHistoryEntry {
    /// When the event happened.
    pub date: DateTime<Utc>,
    /// Amount moved (always positive).
    pub amount: Money,
    /// Payment or reversal.
    #[serde(rename = "type")]
    pub kind: EntryKind,
    /// For reversals, the date of the payment being undone.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reversed_payment_date: Option<DateTime<Utc>>,
}

impl PaymentHistoryEntry {
    /// A payment entry.
    #[must_use]
    pub const fn payment(date: DateTime<Utc>, amount: Money) -> Self {
        Self {
            date,
            amount,
            kind: EntryKind::Payment,
            reversed_payment_date: None,
        }
    }

    /// A reversal entry undoing the payment recorded at `reversed_payment_date`.
    #[must_use]
    pub const fn reversal(
        date: DateTime<Utc>,
        amount: Money,
        reversed_payment_date: DateTime<Utc>,
    ) -> Self {
        Self {
            date,
            amount,
            kind: EntryKind::Reversal,
            reversed_payment_date: Some(reversed_payment_date),
        }
    }

    /// Returns true for payment entries.
    #[must_use]
    pub fn is_payment(&self) -> bool {
        self.kind == EntryKind::Payment
    }

    /// Returns true for reversal entries.
    #[must_use]
    pub fn is_reversal(&self) -> bool {
        self.kind == EntryKind::Reversal
    }
}
