//! Consistency checks over receivables and their sales.
//!
//! These never mutate anything; they describe what is wrong so the engine can
//! refuse to commit a snapshot that breaks them.

use std::fmt;

use tally_shared::{Money, ReceivableId, SaleId};

use crate::ledger::LedgerLog;
use crate::sale::PaymentStatus;
use crate::snapshot::LedgerSnapshot;

use super::types::Receivable;

/// A broken consistency rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvariantViolation {
    /// Remaining balance below zero.
    NegativeAmount(ReceivableId),
    /// `original_amount != amount + total_paid`.
    BalanceMismatch(ReceivableId),
    /// `total_paid` disagrees with the payment history.
    HistoryMismatch {
        /// The receivable.
        receivable_id: ReceivableId,
        /// Net paid according to the history.
        from_history: Money,
        /// Recorded `total_paid`.
        recorded: Money,
    },
    /// `paid` status without a zero balance, or the reverse.
    StatusMismatch(ReceivableId),
    /// A payment is reversed more than once, or a reversal points nowhere.
    BrokenReversalChain(ReceivableId),
    /// Receivable originals do not sum to the sale total.
    TotalMismatch {
        /// The sale.
        sale_id: SaleId,
        /// Sale total.
        expected: Money,
        /// Sum of receivable original amounts.
        actual: Money,
    },
    /// Installment numbers are not `1..=n` with `n == total_installments`.
    BrokenSequence(SaleId),
}

impl fmt::Display for InvariantViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NegativeAmount(id) => write!(f, "receivable {id} has a negative balance"),
            Self::BalanceMismatch(id) => {
                write!(f, "receivable {id}: original amount != balance + total paid")
            }
            Self::HistoryMismatch {
                receivable_id,
                from_history,
                recorded,
            } => write!(
                f,
                "receivable {receivable_id}: total paid {recorded} but history nets {from_history}"
            ),
            Self::StatusMismatch(id) => {
                write!(f, "receivable {id}: status disagrees with its balance")
            }
            Self::BrokenReversalChain(id) => {
                write!(f, "receivable {id}: reversal chain is inconsistent")
            }
            Self::TotalMismatch {
                sale_id,
                expected,
                actual,
            } => write!(
                f,
                "sale {sale_id}: receivables sum to {actual}, sale total is {expected}"
            ),
            Self::BrokenSequence(id) => {
                write!(f, "sale {id}: installment numbers are not contiguous")
            }
        }
    }
}

/// Check the per-receivable rules.
#[must_use]
pub fn check_receivable(receivable: &Receivable) -> Vec<InvariantViolation> {
    let id = receivable.id;
    let mut violations = Vec::new();

    if receivable.amount.is_negative() {
        violations.push(InvariantViolation::NegativeAmount(id));
    }

    if receivable.amount.checked_add(receivable.total_paid) != Some(receivable.original_amount) {
        violations.push(InvariantViolation::BalanceMismatch(id));
    }

    let from_history = LedgerLog::net_paid(&receivable.payment_history);
    if from_history != receivable.total_paid {
        violations.push(InvariantViolation::HistoryMismatch {
            receivable_id: id,
            from_history,
            recorded: receivable.total_paid,
        });
    }

    let is_paid = receivable.status == PaymentStatus::Paid;
    if is_paid != receivable.amount.is_zero() {
        violations.push(InvariantViolation::StatusMismatch(id));
    }

    if !reversal_chain_is_sound(receivable) {
        violations.push(InvariantViolation::BrokenReversalChain(id));
    }

    violations
}

/// Check the rules that span a sale's receivables.
///
/// Sales without receivables have nothing to check.
#[must_use]
pub fn check_sale(snapshot: &LedgerSnapshot, sale_id: SaleId) -> Vec<InvariantViolation> {
    let receivables = snapshot.receivables_for_sale(sale_id);
    let mut violations: Vec<InvariantViolation> = receivables
        .iter()
        .flat_map(|r| check_receivable(r))
        .collect();

    let Some(sale) = snapshot.sales.get(&sale_id) else {
        return violations;
    };
    if receivables.is_empty() {
        return violations;
    }

    let actual: Money = receivables.iter().map(|r| r.original_amount).sum();
    if actual != sale.total {
        violations.push(InvariantViolation::TotalMismatch {
            sale_id,
            expected: sale.total,
            actual,
        });
    }

    let count = receivables.len();
    let contiguous = receivables
        .iter()
        .zip(1u32..)
        .all(|(r, n)| {
            r.installment_number == n
                && usize::try_from(r.total_installments).is_ok_and(|total| total == count)
        });
    if !contiguous {
        violations.push(InvariantViolation::BrokenSequence(sale_id));
    }

    violations
}

/// Check every sale and every receivable in the snapshot.
#[must_use]
pub fn check_snapshot(snapshot: &LedgerSnapshot) -> Vec<InvariantViolation> {
    let mut violations: Vec<InvariantViolation> = snapshot
        .sales
        .keys()
        .flat_map(|id| check_sale(snapshot, *id))
        .collect();

    // receivables whose sale is gone are still checked individually
    violations.extend(
        snapshot
            .receivables
            .values()
            .filter(|r| !snapshot.sales.contains_key(&r.sale_id))
            .flat_map(check_receivable),
    );
    violations
}

fn reversal_chain_is_sound(receivable: &Receivable) -> bool {
    let history = &receivable.payment_history;
    let mut referenced = Vec::new();
    for reversal in history.iter().filter(|e| e.is_reversal()) {
        let Some(target) = reversal.reversed_payment_date else {
            return false;
        };
        if referenced.contains(&target) {
            return false;
        }
        if !history.iter().any(|e| e.is_payment() && e.date == target) {
            return false;
        }
        referenced.push(target);
    }
    true
}
