//! Property-based tests for money allocation.
//!
//! - Installment sum exactness
//! - No zero-amount installments
//! - Allocation conservation

use chrono::NaiveDate;
use proptest::prelude::*;
use tally_shared::{Money, ReceivableId};

use super::payment::{OutstandingBalance, PaymentAllocator, Settlement};
use super::schedule::{InstallmentPlanner, IntervalPolicy};

/// Strategy to generate positive amounts (0.01 to 1,000,000.00).
fn positive_amount() -> impl Strategy<Value = Money> {
    (1i64..100_000_000i64).prop_map(Money::from_cents)
}

/// Installment count with a total of at least one cent per installment.
fn total_and_count(min_count: u32) -> impl Strategy<Value = (Money, u32)> {
    (min_count..48u32).prop_flat_map(|count| {
        (i64::from(count)..100_000_000i64).prop_map(move |cents| (Money::from_cents(cents), count))
    })
}

fn interval() -> impl Strategy<Value = IntervalPolicy> {
    prop_oneof![
        (1u32..60).prop_map(IntervalPolicy::Days),
        (1u32..12).prop_map(IntervalPolicy::Months),
    ]
}

fn first_due_date() -> impl Strategy<Value = NaiveDate> {
    (0u64..3_650).prop_map(|offset| {
        NaiveDate::from_ymd_opt(2020, 1, 1)
            .unwrap()
            .checked_add_days(chrono::Days::new(offset))
            .unwrap()
    })
}

fn outstanding_balances() -> impl Strategy<Value = Vec<OutstandingBalance>> {
    prop::collection::vec(0i64..5_000_000, 0..12).prop_map(|amounts| {
        amounts
            .into_iter()
            .map(|cents| OutstandingBalance {
                receivable_id: ReceivableId::new(),
                outstanding: Money::from_cents(cents),
            })
            .collect()
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Installments always sum exactly to the total and are never negative.
    #[test]
    fn prop_installments_sum_to_total(
        (total, count) in total_and_count(1),
        interval in interval(),
        first in first_due_date(),
    ) {
        let plan = InstallmentPlanner::generate_installments(total, count, interval, first).unwrap();

        prop_assert_eq!(plan.len(), count as usize);
        prop_assert_eq!(plan.iter().map(|s| s.amount).sum::<Money>(), total);
        prop_assert!(plan.iter().all(|s| s.amount.is_positive()));
    }

    /// Due dates never precede the first due date and never go backwards.
    #[test]
    fn prop_due_dates_are_ordered(
        (total, count) in total_and_count(1),
        interval in interval(),
        first in first_due_date(),
    ) {
        let plan = InstallmentPlanner::generate_installments(total, count, interval, first).unwrap();

        prop_assert_eq!(plan[0].due_date, first);
        for pair in plan.windows(2) {
            prop_assert!(pair[0].due_date < pair[1].due_date);
        }
    }

    /// Only the last installment differs from the others.
    #[test]
    fn prop_only_last_installment_absorbs_remainder(
        (total, count) in total_and_count(2),
    ) {
        let first = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let plan = InstallmentPlanner::generate_installments(
            total, count, IntervalPolicy::Months(1), first,
        ).unwrap();

        let base = plan[0].amount;
        prop_assert!(plan[..plan.len() - 1].iter().all(|s| s.amount == base));
        prop_assert!(plan[plan.len() - 1].amount >= base);
    }

    /// Totals too small to give every installment a cent are refused.
    #[test]
    fn prop_sub_cent_shares_rejected(
        count in 2u32..48,
        interval in interval(),
        first in first_due_date(),
    ) {
        let total = Money::from_cents(i64::from(count) - 1);
        let result = InstallmentPlanner::generate_installments(total, count, interval, first);
        prop_assert!(result.is_err());
    }

    /// The sum of allocations never exceeds the payment, and no receivable
    /// receives more than it owes.
    #[test]
    fn prop_allocation_conserves_payment(
        balances in outstanding_balances(),
        payment in positive_amount(),
    ) {
        let allocations = PaymentAllocator::allocate_payment(&balances, payment);

        prop_assert_eq!(allocations.len(), balances.len());
        let allocated: Money = allocations.iter().map(|a| a.allocated).sum();
        prop_assert!(allocated <= payment);

        let owed: Money = balances.iter().map(|b| b.outstanding).sum();
        prop_assert_eq!(allocated, payment.min(owed));

        for (allocation, balance) in allocations.iter().zip(balances.iter()) {
            prop_assert!(allocation.allocated <= balance.outstanding);
            match allocation.settlement {
                Settlement::FullSettle => prop_assert_eq!(allocation.allocated, balance.outstanding),
                Settlement::PartialSettle => prop_assert!(allocation.allocated < balance.outstanding),
                Settlement::Untouched => prop_assert!(allocation.allocated.is_zero()),
            }
        }
    }

    /// At most one receivable ends partially settled, and it is the last one touched.
    #[test]
    fn prop_at_most_one_partial_settlement(
        balances in outstanding_balances(),
        payment in positive_amount(),
    ) {
        let allocations = PaymentAllocator::allocate_payment(&balances, payment);

        let partials: Vec<usize> = allocations
            .iter()
            .enumerate()
            .filter(|(_, a)| a.settlement == Settlement::PartialSettle)
            .map(|(i, _)| i)
            .collect();
        prop_assert!(partials.len() <= 1);

        if let Some(&idx) = partials.first() {
            prop_assert!(allocations[idx + 1..].iter().all(|a| a.allocated.is_zero()));
        }
    }
}
