//! Property-based tests for ReceivableService.
//!
//! - Consistency rules hold after every payment/reversal step
//! - Pay then reverse restores the receivable exactly
//! - Reversal with nothing to reverse fails without mutation

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use proptest::prelude::*;
use tally_shared::{CustomerId, EngineConfig, Money, ReceivableId, SaleId};

use super::error::ReceivableError;
use super::invariants::check_snapshot;
use super::service::ReceivableService;
use super::types::BatchPaymentRequest;
use crate::sale::{PaymentMethod, PaymentStatus, Sale};
use crate::snapshot::LedgerSnapshot;

#[derive(Debug, Clone)]
enum Step {
    Pay { picks: Vec<usize>, cents: i64 },
    Reverse(usize),
    ReverseGroup(usize),
}

fn step_strategy() -> impl Strategy<Value = Step> {
    prop_oneof![
        3 => (prop::collection::vec(0usize..8, 1..4), 1i64..60_000)
            .prop_map(|(picks, cents)| Step::Pay { picks, cents }),
        2 => (0usize..8).prop_map(Step::Reverse),
        1 => (0usize..8).prop_map(Step::ReverseGroup),
    ]
}

fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 15, 8, 0, 0).unwrap()
}

fn seeded(total_cents: i64, installments: u32) -> (LedgerSnapshot, Vec<ReceivableId>) {
    let sale = Sale {
        id: SaleId::new(),
        customer_id: CustomerId::new(),
        date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        items: vec![],
        total: Money::from_cents(total_cents),
        payment_method: PaymentMethod::Installment,
        payment_status: PaymentStatus::Pending,
        installments: Some(installments),
        installment_interval: None,
        first_due_date: None,
        installment_dates: None,
    };
    let mut snapshot = LedgerSnapshot::new();
    snapshot.sales.insert(sale.id, sale.clone());
    let ids = ReceivableService::create_from_sale(&mut snapshot, &sale, &EngineConfig::default())
        .unwrap();
    (snapshot, ids)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Every step either fails without touching the snapshot or leaves it
    /// consistent.
    #[test]
    fn prop_steps_preserve_consistency(
        total in 100i64..100_000,
        installments in 1u32..6,
        steps in prop::collection::vec(step_strategy(), 1..25),
    ) {
        let (mut snapshot, ids) = seeded(total, installments);
        let mut now = start();

        for step in steps {
            now += Duration::minutes(1);
            let before = snapshot.clone();
            let result = match step {
                Step::Pay { picks, cents } => {
                    let request = BatchPaymentRequest {
                        receivable_ids: picks.iter().map(|i| ids[i % ids.len()]).collect(),
                        payment_amount: Money::from_cents(cents),
                        adjustment: None,
                        new_due_date: None,
                    };
                    ReceivableService::process_batch_payment(&mut snapshot, &request, now)
                        .map(|_| ())
                }
                Step::Reverse(i) => {
                    ReceivableService::reverse_last_payment(&mut snapshot, ids[i % ids.len()], now)
                        .map(|_| ())
                }
                Step::ReverseGroup(i) => {
                    ReceivableService::reverse_group(&mut snapshot, ids[i % ids.len()], now)
                        .map(|_| ())
                }
            };

            if result.is_err() {
                prop_assert_eq!(&snapshot, &before);
            }
            let violations = check_snapshot(&snapshot);
            prop_assert!(violations.is_empty(), "violations: {:?}", violations);
        }
    }

    /// Paying and then reversing that payment restores amount, total paid
    /// and status.
    #[test]
    fn prop_pay_then_reverse_round_trip(
        total in 100i64..100_000,
        percent in 1i64..=100,
    ) {
        let (mut snapshot, ids) = seeded(total, 1);
        let before = snapshot.receivable(ids[0]).unwrap().clone();
        let amount = (total * percent / 100).max(1);

        let request = BatchPaymentRequest {
            receivable_ids: ids.clone(),
            payment_amount: Money::from_cents(amount),
            adjustment: None,
            new_due_date: None,
        };
        ReceivableService::process_batch_payment(&mut snapshot, &request, start()).unwrap();
        ReceivableService::reverse_last_payment(
            &mut snapshot,
            ids[0],
            start() + Duration::seconds(1),
        )
        .unwrap();

        let after = snapshot.receivable(ids[0]).unwrap();
        prop_assert_eq!(after.amount, before.amount);
        prop_assert_eq!(after.total_paid, before.total_paid);
        prop_assert_eq!(after.status, before.status);
        prop_assert_eq!(after.payment_date, None);
        prop_assert_eq!(after.payment_history.len(), 2);
    }

    /// With every payment reversed, another reversal fails and changes nothing.
    #[test]
    fn prop_reversal_guard(
        total in 100i64..100_000,
        payments in 0usize..4,
    ) {
        let (mut snapshot, ids) = seeded(total, 1);
        let mut now = start();

        for _ in 0..payments {
            now += Duration::minutes(1);
            let request = BatchPaymentRequest {
                receivable_ids: ids.clone(),
                payment_amount: Money::from_cents(1),
                adjustment: None,
                new_due_date: None,
            };
            ReceivableService::process_batch_payment(&mut snapshot, &request, now).unwrap();
        }
        for _ in 0..payments {
            now += Duration::minutes(1);
            ReceivableService::reverse_last_payment(&mut snapshot, ids[0], now).unwrap();
        }

        let before = snapshot.clone();
        now += Duration::minutes(1);
        let err = ReceivableService::reverse_last_payment(&mut snapshot, ids[0], now).unwrap_err();
        prop_assert_eq!(err, ReceivableError::NoReversablePayment(ids[0]));
        prop_assert_eq!(snapshot, before);
    }
}
