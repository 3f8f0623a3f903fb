//! Read-side views over receivables.
//!
//! Overdue is derived from the due date at read time and never stored.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tally_shared::Money;

use crate::ledger::LedgerLog;
use crate::receivable::Receivable;
use crate::snapshot::LedgerSnapshot;

/// Returns true if the receivable is pending and its due date has passed.
#[must_use]
pub fn is_overdue(receivable: &Receivable, today: NaiveDate) -> bool {
    receivable.is_pending() && receivable.due_date < today
}

/// Status as shown to a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayStatus {
    /// Pending and not yet due.
    Pending,
    /// Settled.
    Paid,
    /// Pending past its due date.
    Overdue,
}

impl DisplayStatus {
    /// Classify a receivable as of `today`.
    #[must_use]
    pub fn of(receivable: &Receivable, today: NaiveDate) -> Self {
        if !receivable.is_pending() {
            Self::Paid
        } else if is_overdue(receivable, today) {
            Self::Overdue
        } else {
            Self::Pending
        }
    }
}

/// Receivable list filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusFilter {
    /// Everything.
    #[default]
    All,
    /// Pending, overdue included.
    Pending,
    /// Paid.
    Paid,
    /// Pending past due.
    Overdue,
}

impl StatusFilter {
    /// Returns true if `receivable` passes the filter as of `today`.
    #[must_use]
    pub fn matches(self, receivable: &Receivable, today: NaiveDate) -> bool {
        match self {
            Self::All => true,
            Self::Pending => receivable.is_pending(),
            Self::Paid => !receivable.is_pending(),
            Self::Overdue => is_overdue(receivable, today),
        }
    }
}

/// Receivables passing `filter`, earliest due date first.
#[must_use]
pub fn receivables_by_filter(
    snapshot: &LedgerSnapshot,
    filter: StatusFilter,
    today: NaiveDate,
) -> Vec<&Receivable> {
    let mut found: Vec<&Receivable> = snapshot
        .receivables
        .values()
        .filter(|r| filter.matches(r, today))
        .collect();
    found.sort_by_key(|r| (r.due_date, r.installment_number, r.id));
    found
}

/// Dashboard totals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReceivableSummary {
    /// Outstanding balance of all pending receivables.
    pub total_outstanding: Money,
    /// Outstanding balance of overdue receivables.
    pub overdue_total: Money,
    /// Number of overdue receivables.
    pub overdue_count: usize,
    /// Net amount received today.
    pub received_today: Money,
}

/// Totals across the snapshot as of `today`.
#[must_use]
pub fn summarize(snapshot: &LedgerSnapshot, today: NaiveDate) -> ReceivableSummary {
    snapshot
        .receivables
        .values()
        .fold(ReceivableSummary::default(), |mut acc, r| {
            if r.is_pending() {
                acc.total_outstanding += r.amount;
            }
            if is_overdue(r, today) {
                acc.overdue_total += r.amount;
                acc.overdue_count += 1;
            }
            acc.received_today += LedgerLog::net_received_on(&r.payment_history, today);
            acc
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use rstest::rstest;
    use tally_shared::{CustomerId, ReceivableId, SaleId};

    use crate::ledger::PaymentHistoryEntry;
    use crate::sale::PaymentStatus;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, d).unwrap()
    }

    fn receivable(cents: i64, due: NaiveDate, paid: bool) -> Receivable {
        let amount = Money::from_cents(cents);
        Receivable {
            id: ReceivableId::new(),
            sale_id: SaleId::new(),
            customer_id: CustomerId::new(),
            amount: if paid { Money::ZERO } else { amount },
            original_amount: amount,
            total_paid: if paid { amount } else { Money::ZERO },
            due_date: due,
            status: if paid {
                PaymentStatus::Paid
            } else {
                PaymentStatus::Pending
            },
            payment_date: None,
            installment_number: 1,
            total_installments: 1,
            payment_history: vec![],
        }
    }

    #[rstest]
    #[case(day(9), false, false)]
    #[case(day(10), false, false)]
    #[case(day(11), false, true)]
    #[case(day(11), true, false)]
    fn test_is_overdue(#[case] today: NaiveDate, #[case] paid: bool, #[case] expected: bool) {
        let r = receivable(1_000, day(10), paid);
        assert_eq!(is_overdue(&r, today), expected);
    }

    #[test]
    fn test_display_status() {
        assert_eq!(
            DisplayStatus::of(&receivable(1, day(10), true), day(20)),
            DisplayStatus::Paid
        );
        assert_eq!(
            DisplayStatus::of(&receivable(1, day(10), false), day(20)),
            DisplayStatus::Overdue
        );
        assert_eq!(
            DisplayStatus::of(&receivable(1, day(10), false), day(5)),
            DisplayStatus::Pending
        );
    }

    #[test]
    fn test_filter_and_summary() {
        let mut snapshot = LedgerSnapshot::new();
        let overdue = receivable(1_000, day(1), false);
        let upcoming = receivable(2_500, day(30), false);
        let mut settled = receivable(4_000, day(2), true);
        let paid_at = Utc.with_ymd_and_hms(2024, 5, 15, 9, 30, 0).unwrap();
        settled.payment_history = vec![PaymentHistoryEntry::payment(paid_at, Money::from_cents(4_000))];
        for r in [overdue.clone(), upcoming.clone(), settled.clone()] {
            snapshot.receivables.insert(r.id, r);
        }
        let today = day(15);

        let pending: Vec<_> = receivables_by_filter(&snapshot, StatusFilter::Pending, today)
            .iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(pending, vec![overdue.id, upcoming.id]);
        assert_eq!(
            receivables_by_filter(&snapshot, StatusFilter::Overdue, today).len(),
            1
        );
        assert_eq!(receivables_by_filter(&snapshot, StatusFilter::Paid, today)[0].id, settled.id);
        assert_eq!(receivables_by_filter(&snapshot, StatusFilter::All, today).len(), 3);

        let summary = summarize(&snapshot, today);
        assert_eq!(summary.total_outstanding, Money::from_cents(3_500));
        assert_eq!(summary.overdue_total, Money::from_cents(1_000));
        assert_eq!(summary.overdue_count, 1);
        assert_eq!(summary.received_today, Money::from_cents(4_000));
        assert_eq!(summarize(&snapshot, day(16)).received_today, Money::ZERO);
    }
}
