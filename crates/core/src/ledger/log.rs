//! Append-only payment history queries.
//!
//! Reversal is LIFO over net payments: the target is always the most recent
//! payment that no reversal points at, and one reversal undoes exactly one
//! payment.

use chrono::{DateTime, NaiveDate, Utc};
use tally_shared::Money;

use super::entry::PaymentHistoryEntry;
use super::error::LedgerError;

/// Stateless operations over a receivable's payment history.
pub struct LedgerLog;

impl LedgerLog {
    /// Append an entry to the end of the history.
    ///
    /// Prior entries are never touched. Reversals must reference a payment in
    /// this history that has not been reversed yet, for the same amount.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError` if the entry would break history integrity; the
    /// history is left unchanged.
    pub fn append(
        history: &mut Vec<PaymentHistoryEntry>,
        entry: PaymentHistoryEntry,
    ) -> Result<(), LedgerError> {
        if !entry.amount.is_positive() {
            return Err(LedgerError::NonPositiveAmount(entry.amount));
        }

        if let Some(last) = history.last() {
            if entry.date <= last.date {
                return Err(LedgerError::NonMonotonicDate {
                    last: last.date,
                    attempted: entry.date,
                });
            }
        }

        if entry.is_reversal() {
            let target = entry
                .reversed_payment_date
                .ok_or(LedgerError::MissingPaymentReference)?;
            let payment = history
                .iter()
                .find(|e| e.is_payment() && e.date == target)
                .ok_or(LedgerError::UnknownPayment(target))?;
            if Self::is_reversed(history, target) {
                return Err(LedgerError::AlreadyReversed(target));
            }
            if payment.amount != entry.amount {
                return Err(LedgerError::AmountMismatch {
                    expected: payment.amount,
                    actual: entry.amount,
                });
            }
        }

        history.push(entry);
        Ok(())
    }

    /// Returns true if a reversal references the payment dated `payment_date`.
    #[must_use]
    pub fn is_reversed(history: &[PaymentHistoryEntry], payment_date: DateTime<Utc>) -> bool {
        history
            .iter()
            .any(|e| e.is_reversal() && e.reversed_payment_date == Some(payment_date))
    }

    /// The most recent payment that has not been reversed.
    #[must_use]
    pub fn last_unreversed_payment(
        history: &[PaymentHistoryEntry],
    ) -> Option<&PaymentHistoryEntry> {
        history
            .iter()
            .filter(|e| e.is_payment() && !Self::is_reversed(history, e.date))
            .max_by_key(|e| e.date)
    }

    /// Returns true if any payment is still unreversed.
    #[must_use]
    pub fn has_active_payment(history: &[PaymentHistoryEntry]) -> bool {
        Self::last_unreversed_payment(history).is_some()
    }

    /// Σ payments − Σ reversals.
    #[must_use]
    pub fn net_paid(history: &[PaymentHistoryEntry]) -> Money {
        history
            .iter()
            .map(|e| if e.is_payment() { e.amount } else { -e.amount })
            .sum()
    }

    /// Net amount received on `day` (payments minus reversals dated that day).
    #[must_use]
    pub fn net_received_on(history: &[PaymentHistoryEntry], day: NaiveDate) -> Money {
        history
            .iter()
            .filter(|e| e.date.date_naive() == day)
            .map(|e| if e.is_payment() { e.amount } else { -e.amount })
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn at(minutes: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap() + Duration::minutes(minutes)
    }

    fn cents(c: i64) -> Money {
        Money::from_cents(c)
    }

    fn history_with_payments(amounts: &[i64]) -> Vec<PaymentHistoryEntry> {
        let mut history = Vec::new();
        for (i, amount) in (0i64..).zip(amounts) {
            LedgerLog::append(&mut history, PaymentHistoryEntry::payment(at(i), cents(*amount)))
                .unwrap();
        }
        history
    }

    #[test]
    fn test_append_keeps_order() {
        let history = history_with_payments(&[100, 200]);
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].amount, cents(100));
        assert_eq!(history[1].amount, cents(200));
    }

    #[test]
    fn test_append_rejects_out_of_order_dates() {
        let mut history = history_with_payments(&[100]);
        let err = LedgerLog::append(&mut history, PaymentHistoryEntry::payment(at(0), cents(50)))
            .unwrap_err();
        assert!(matches!(err, LedgerError::NonMonotonicDate { .. }));
        assert_eq!(history.len(), 1);
    }

    #[test]
    fn test_append_rejects_zero_amount() {
        let mut history = Vec::new();
        let err = LedgerLog::append(&mut history, PaymentHistoryEntry::payment(at(0), Money::ZERO))
            .unwrap_err();
        assert_eq!(err, LedgerError::NonPositiveAmount(Money::ZERO));
    }

    #[test]
    fn test_last_unreversed_is_lifo() {
        let mut history = history_with_payments(&[100, 200, 300]);
        assert_eq!(LedgerLog::last_unreversed_payment(&history).unwrap().date, at(2));

        LedgerLog::append(
            &mut history,
            PaymentHistoryEntry::reversal(at(10), cents(300), at(2)),
        )
        .unwrap();
        assert_eq!(LedgerLog::last_unreversed_payment(&history).unwrap().date, at(1));

        LedgerLog::append(
            &mut history,
            PaymentHistoryEntry::reversal(at(11), cents(200), at(1)),
        )
        .unwrap();
        assert_eq!(LedgerLog::last_unreversed_payment(&history).unwrap().date, at(0));
    }

    #[test]
    fn test_no_unreversed_payment_when_all_reversed() {
        let mut history = history_with_payments(&[100]);
        LedgerLog::append(
            &mut history,
            PaymentHistoryEntry::reversal(at(5), cents(100), at(0)),
        )
        .unwrap();
        assert!(LedgerLog::last_unreversed_payment(&history).is_none());
        assert!(!LedgerLog::has_active_payment(&history));
    }

    #[test]
    fn test_double_reversal_is_rejected() {
        let mut history = history_with_payments(&[100]);
        LedgerLog::append(
            &mut history,
            PaymentHistoryEntry::reversal(at(5), cents(100), at(0)),
        )
        .unwrap();
        let err = LedgerLog::append(
            &mut history,
            PaymentHistoryEntry::reversal(at(6), cents(100), at(0)),
        )
        .unwrap_err();
        assert_eq!(err, LedgerError::AlreadyReversed(at(0)));
    }

    #[test]
    fn test_reversal_must_reference_known_payment() {
        let mut history = history_with_payments(&[100]);
        let err = LedgerLog::append(
            &mut history,
            PaymentHistoryEntry::reversal(at(5), cents(100), at(3)),
        )
        .unwrap_err();
        assert_eq!(err, LedgerError::UnknownPayment(at(3)));
    }

    #[test]
    fn test_reversal_amount_must_match() {
        let mut history = history_with_payments(&[100]);
        let err = LedgerLog::append(
            &mut history,
            PaymentHistoryEntry::reversal(at(5), cents(60), at(0)),
        )
        .unwrap_err();
        assert!(matches!(err, LedgerError::AmountMismatch { .. }));
    }

    #[test]
    fn test_net_paid() {
        let mut history = history_with_payments(&[100, 250]);
        assert_eq!(LedgerLog::net_paid(&history), cents(350));
        LedgerLog::append(
            &mut history,
            PaymentHistoryEntry::reversal(at(5), cents(250), at(1)),
        )
        .unwrap();
        assert_eq!(LedgerLog::net_paid(&history), cents(100));
    }

    #[test]
    fn test_net_received_on_day() {
        let mut history = history_with_payments(&[100]);
        let next_day = at(0) + Duration::days(1);
        LedgerLog::append(&mut history, PaymentHistoryEntry::payment(next_day, cents(40)))
            .unwrap();

        assert_eq!(
            LedgerLog::net_received_on(&history, at(0).date_naive()),
            cents(100)
        );
        assert_eq!(
            LedgerLog::net_received_on(&history, next_day.date_naive()),
            cents(40)
        );
    }
}
