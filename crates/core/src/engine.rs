//! Engine facade.
//!
//! Every mutating operation takes the caller's snapshot by reference, works on
//! a clone, re-derives the status of every sale it touched, checks the touched
//! sales for consistency, and only then hands the new snapshot back. A failed
//! operation leaves the caller with exactly what it passed in.

use chrono::NaiveDate;
use tally_shared::{EngineConfig, ReceivableId, SaleId};
use tracing::{debug, error, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::receivable::{
    BatchPaymentOutcome, BatchPaymentRequest, GroupReversalOutcome, InvariantViolation,
    Receivable, ReceivableError, ReceivableService, ReversalOutcome, check_sale, check_snapshot,
};
use crate::sale::Sale;
use crate::snapshot::LedgerSnapshot;
use crate::sync::{
    ReceivableSummary, SaleSyncOutcome, SaleSynchronizer, StatusFilter, receivables_by_filter,
    summarize,
};

/// A committed operation: the snapshot to persist and what happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Applied<T> {
    /// New state for the caller to persist.
    pub snapshot: LedgerSnapshot,
    /// Operation result.
    pub outcome: T,
}

/// Receivable ledger and payment reconciliation engine.
#[derive(Debug, Clone)]
pub struct ReceivableEngine<C = SystemClock> {
    clock: C,
    config: EngineConfig,
}

impl ReceivableEngine<SystemClock> {
    /// Engine on wall-clock time.
    #[must_use]
    pub fn new(config: EngineConfig) -> Self {
        Self::with_clock(config, SystemClock)
    }
}

impl<C: Clock> ReceivableEngine<C> {
    /// Engine on the given clock.
    #[must_use]
    pub fn with_clock(config: EngineConfig, clock: C) -> Self {
        Self { clock, config }
    }

    /// The engine's clock.
    #[must_use]
    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// The engine's defaults.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Create or update a sale, generating or settling its receivables.
    ///
    /// # Errors
    ///
    /// See [`SaleSynchronizer::on_sale_saved`].
    pub fn save_sale(
        &self,
        snapshot: &LedgerSnapshot,
        sale: Sale,
    ) -> Result<Applied<SaleSyncOutcome>, ReceivableError> {
        let sale_id = sale.id;
        let now = self.clock.now();
        let applied = self.apply("save_sale", snapshot, |working| {
            let outcome = SaleSynchronizer::on_sale_saved(working, sale, &self.config, now)?;
            Ok((outcome, vec![sale_id]))
        })?;

        info!(
            sale_id = %sale_id,
            created = applied.outcome.created.len(),
            removed = applied.outcome.removed.len(),
            settled = applied.outcome.settled.len(),
            status = ?applied.outcome.status,
            "Sale saved"
        );
        Ok(applied)
    }

    /// Allocate a payment across the selected receivables.
    ///
    /// # Errors
    ///
    /// See [`ReceivableService::process_batch_payment`].
    pub fn process_batch_payment(
        &self,
        snapshot: &LedgerSnapshot,
        request: &BatchPaymentRequest,
    ) -> Result<Applied<BatchPaymentOutcome>, ReceivableError> {
        let now = self.clock.now();
        let applied = self.apply("process_batch_payment", snapshot, |working| {
            let outcome = ReceivableService::process_batch_payment(working, request, now)?;
            let touched = outcome.touched_sales.clone();
            Ok((outcome, touched))
        })?;

        for allocation in &applied.outcome.allocations {
            debug!(
                receivable_id = %allocation.receivable_id,
                allocated = %allocation.allocated,
                settlement = ?allocation.settlement,
                "Payment allocated"
            );
        }
        info!(
            receivables = request.receivable_ids.len(),
            requested = %applied.outcome.requested,
            adjustment = %applied.outcome.adjustment,
            effective = %applied.outcome.effective_amount,
            rescheduled = applied.outcome.rescheduled.len(),
            "Batch payment recorded"
        );
        Ok(applied)
    }

    /// Reverse the most recent unreversed payment on a receivable.
    ///
    /// # Errors
    ///
    /// See [`ReceivableService::reverse_last_payment`].
    pub fn reverse_last_payment(
        &self,
        snapshot: &LedgerSnapshot,
        receivable_id: ReceivableId,
    ) -> Result<Applied<ReversalOutcome>, ReceivableError> {
        let now = self.clock.now();
        let applied = self.apply("reverse_last_payment", snapshot, |working| {
            let sale_id = working.receivable(receivable_id)?.sale_id;
            let outcome = ReceivableService::reverse_last_payment(working, receivable_id, now)?;
            Ok((outcome, vec![sale_id]))
        })?;

        info!(
            receivable_id = %receivable_id,
            amount = %applied.outcome.amount,
            reversed_payment_date = %applied.outcome.reversed_payment_date,
            "Payment reversed"
        );
        Ok(applied)
    }

    /// Reverse the last payment of every paid-into member of the receivable's
    /// installment group.
    ///
    /// # Errors
    ///
    /// See [`ReceivableService::reverse_group`].
    pub fn reverse_group(
        &self,
        snapshot: &LedgerSnapshot,
        receivable_id: ReceivableId,
    ) -> Result<Applied<GroupReversalOutcome>, ReceivableError> {
        let now = self.clock.now();
        let applied = self.apply("reverse_group", snapshot, |working| {
            let sale_id = working.receivable(receivable_id)?.sale_id;
            let outcome = ReceivableService::reverse_group(working, receivable_id, now)?;
            Ok((outcome, vec![sale_id]))
        })?;

        for (member, reason) in &applied.outcome.failures {
            warn!(
                receivable_id = %member,
                error = %reason,
                code = reason.error_code(),
                "Group member not reversed"
            );
        }
        info!(
            receivable_id = %receivable_id,
            reversed = applied.outcome.reversed.len(),
            failed = applied.outcome.failures.len(),
            "Installment group reversed"
        );
        Ok(applied)
    }

    /// Move a pending receivable's due date. Returns the previous date.
    ///
    /// # Errors
    ///
    /// See [`ReceivableService::change_due_date`].
    pub fn change_due_date(
        &self,
        snapshot: &LedgerSnapshot,
        receivable_id: ReceivableId,
        new_due_date: NaiveDate,
    ) -> Result<Applied<NaiveDate>, ReceivableError> {
        let applied = self.apply("change_due_date", snapshot, |working| {
            let sale_id = working.receivable(receivable_id)?.sale_id;
            let previous = ReceivableService::change_due_date(working, receivable_id, new_due_date)?;
            Ok((previous, vec![sale_id]))
        })?;

        if new_due_date < self.clock.today() {
            warn!(receivable_id = %receivable_id, due_date = %new_due_date, "Due date is in the past");
        }
        info!(
            receivable_id = %receivable_id,
            from = %applied.outcome,
            to = %new_due_date,
            "Due date changed"
        );
        Ok(applied)
    }

    /// Delete a sale and its receivables. Returns the removed receivable IDs.
    ///
    /// # Errors
    ///
    /// See [`ReceivableService::delete_sale_cascade`].
    pub fn delete_sale(
        &self,
        snapshot: &LedgerSnapshot,
        sale_id: SaleId,
    ) -> Result<Applied<Vec<ReceivableId>>, ReceivableError> {
        let applied = self.apply("delete_sale", snapshot, |working| {
            let removed = ReceivableService::delete_sale_cascade(working, sale_id)?;
            Ok((removed, vec![sale_id]))
        })?;

        info!(
            sale_id = %sale_id,
            removed = applied.outcome.len(),
            "Sale deleted"
        );
        Ok(applied)
    }

    /// Dashboard totals as of the clock's today.
    #[must_use]
    pub fn summary(&self, snapshot: &LedgerSnapshot) -> ReceivableSummary {
        summarize(snapshot, self.clock.today())
    }

    /// Receivables passing `filter` as of the clock's today.
    #[must_use]
    pub fn receivables<'a>(
        &self,
        snapshot: &'a LedgerSnapshot,
        filter: StatusFilter,
    ) -> Vec<&'a Receivable> {
        receivables_by_filter(snapshot, filter, self.clock.today())
    }

    /// Full consistency check of a snapshot.
    #[must_use]
    pub fn verify(&self, snapshot: &LedgerSnapshot) -> Vec<InvariantViolation> {
        check_snapshot(snapshot)
    }

    fn apply<T>(
        &self,
        operation: &'static str,
        snapshot: &LedgerSnapshot,
        run: impl FnOnce(&mut LedgerSnapshot) -> Result<(T, Vec<SaleId>), ReceivableError>,
    ) -> Result<Applied<T>, ReceivableError> {
        let mut working = snapshot.clone();

        let result = run(&mut working).and_then(|(outcome, touched)| {
            Self::settle_touched(&mut working, &touched)?;
            Ok(outcome)
        });

        match result {
            Ok(outcome) => Ok(Applied {
                snapshot: working,
                outcome,
            }),
            Err(err) => {
                if let ReceivableError::IntegrityViolation(details) = &err {
                    error!(operation, details = %details, "Refusing to commit inconsistent snapshot");
                } else {
                    warn!(operation, error = %err, code = err.error_code(), "Operation rejected");
                }
                Err(err)
            }
        }
    }

    fn settle_touched(
        working: &mut LedgerSnapshot,
        touched: &[SaleId],
    ) -> Result<(), ReceivableError> {
        for sale_id in touched {
            if working.sales.contains_key(sale_id) {
                SaleSynchronizer::refresh_sale_status(working, *sale_id)?;
            }
        }

        let violations: Vec<String> = touched
            .iter()
            .flat_map(|sale_id| check_sale(working, *sale_id))
            .map(|v| v.to_string())
            .collect();

        if violations.is_empty() {
            Ok(())
        } else {
            Err(ReceivableError::IntegrityViolation(violations.join("; ")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use tally_shared::{CustomerId, Money};

    use crate::clock::FixedClock;
    use crate::sale::{PaymentMethod, PaymentStatus};

    fn engine() -> ReceivableEngine<FixedClock> {
        let clock = FixedClock::new(Utc.with_ymd_and_hms(2024, 1, 10, 9, 0, 0).unwrap());
        ReceivableEngine::with_clock(EngineConfig::default(), clock)
    }

    fn sale(total: i64) -> Sale {
        Sale {
            id: SaleId::new(),
            customer_id: CustomerId::new(),
            date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            items: vec![],
            total: Money::from_cents(total),
            payment_method: PaymentMethod::Installment,
            payment_status: PaymentStatus::Pending,
            installments: Some(2),
            installment_interval: None,
            first_due_date: None,
            installment_dates: None,
        }
    }

    #[test]
    fn test_sale_too_small_for_its_installments_is_rejected() {
        let engine = engine();
        let mut s = sale(2);
        s.installments = Some(3);

        let err = engine.save_sale(&LedgerSnapshot::new(), s).unwrap_err();
        assert_eq!(err.error_code(), "INVALID_INSTALLMENT_PLAN");
    }

    #[test]
    fn test_sale_with_absurd_installment_count_is_rejected() {
        let engine = engine();
        let mut s = sale(10_000);
        s.installments = Some(u32::MAX);

        let err = engine.save_sale(&LedgerSnapshot::new(), s).unwrap_err();
        assert_eq!(err.error_code(), "INVALID_INSTALLMENT_PLAN");
    }

    #[test]
    fn test_failed_operation_returns_error_and_leaves_input_alone() {
        let engine = engine();
        let s = sale(10_000);
        let saved = engine.save_sale(&LedgerSnapshot::new(), s.clone()).unwrap();
        let ids = saved.snapshot.receivable_ids_for_sale(s.id);

        let request = BatchPaymentRequest {
            receivable_ids: ids,
            payment_amount: Money::from_cents(20_000),
            adjustment: None,
            new_due_date: None,
        };
        let err = engine
            .process_batch_payment(&saved.snapshot, &request)
            .unwrap_err();
        assert_eq!(err.error_code(), "INVALID_PAYMENT_AMOUNT");
        assert!(engine.verify(&saved.snapshot).is_empty());
    }

    #[test]
    fn test_sale_status_follows_payments() {
        let engine = engine();
        let s = sale(10_000);
        let saved = engine.save_sale(&LedgerSnapshot::new(), s.clone()).unwrap();
        let ids = saved.snapshot.receivable_ids_for_sale(s.id);

        let request = BatchPaymentRequest {
            receivable_ids: ids.clone(),
            payment_amount: Money::from_cents(10_000),
            adjustment: None,
            new_due_date: None,
        };
        let paid = engine.process_batch_payment(&saved.snapshot, &request).unwrap();
        assert_eq!(paid.snapshot.sale(s.id).unwrap().payment_status, PaymentStatus::Paid);

        engine.clock().advance(Duration::minutes(1));
        let reopened = engine.reverse_last_payment(&paid.snapshot, ids[1]).unwrap();
        assert_eq!(
            reopened.snapshot.sale(s.id).unwrap().payment_status,
            PaymentStatus::Pending
        );
        assert!(engine.verify(&reopened.snapshot).is_empty());
    }

    #[test]
    fn test_corrupted_snapshot_is_not_committed() {
        let engine = engine();
        let s = sale(10_000);
        let mut saved = engine.save_sale(&LedgerSnapshot::new(), s.clone()).unwrap();
        let id = saved.snapshot.receivable_ids_for_sale(s.id)[0];
        saved.snapshot.sale_mut(s.id).unwrap().total = Money::from_cents(9_999);

        let err = engine
            .change_due_date(&saved.snapshot, id, NaiveDate::from_ymd_opt(2024, 9, 1).unwrap())
            .unwrap_err();
        assert_eq!(err.error_code(), "INTEGRITY_VIOLATION");
    }

    #[test]
    fn test_summary_uses_clock() {
        let engine = engine();
        let s = sale(10_000);
        let saved = engine.save_sale(&LedgerSnapshot::new(), s).unwrap();
        // default first due date is 2024-01-31; second installment 2024-02-29
        assert_eq!(engine.summary(&saved.snapshot).overdue_count, 0);

        engine
            .clock()
            .set(Utc.with_ymd_and_hms(2024, 2, 10, 9, 0, 0).unwrap());
        let summary = engine.summary(&saved.snapshot);
        assert_eq!(summary.overdue_count, 1);
        assert_eq!(summary.overdue_total, Money::from_cents(5_000));
        assert_eq!(engine.receivables(&saved.snapshot, StatusFilter::Overdue).len(), 1);
    }
}
