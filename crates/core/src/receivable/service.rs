//! Receivable lifecycle operations.
//!
//! Every operation works on the caller's `LedgerSnapshot` and touches it only
//! once all of its checks have passed: updated receivables are prepared on
//! clones and written back together at the end.

use std::collections::BTreeSet;

use chrono::{DateTime, Days, NaiveDate, Utc};
use tally_shared::{EngineConfig, Money, ReceivableId, SaleId};

use crate::allocation::{
    InstallmentPlanner, InstallmentShare, IntervalPolicy, OutstandingBalance, PaymentAllocator,
    Settlement,
};
use crate::ledger::{LedgerLog, PaymentHistoryEntry};
use crate::sale::{PaymentStatus, Sale};
use crate::snapshot::LedgerSnapshot;

use super::error::ReceivableError;
use super::types::{
    BatchPaymentOutcome, BatchPaymentRequest, GroupReversalOutcome, Receivable, ReversalOutcome,
};

/// Stateless service for receivable lifecycle operations.
pub struct ReceivableService;

impl ReceivableService {
    /// Installment schedule implied by a sale's payment terms.
    ///
    /// Explicit `installment_dates` win. Otherwise the sale's installment
    /// count (default 1), interval (engine default) and first due date
    /// (sale date + `default_due_days`) are used.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInstallmentPlan` if the terms cannot form a schedule
    /// or ask for more than `max_installments` installments.
    pub fn plan_for_sale(
        sale: &Sale,
        config: &EngineConfig,
    ) -> Result<Vec<InstallmentShare>, ReceivableError> {
        let explicit = sale.installment_dates.as_deref().filter(|d| !d.is_empty());
        let requested = explicit.map_or_else(
            || u64::from(sale.installments.unwrap_or(1)),
            |dates| u64::try_from(dates.len()).unwrap_or(u64::MAX),
        );
        if requested > u64::from(config.max_installments) {
            return Err(ReceivableError::InvalidInstallmentPlan(format!(
                "{requested} installments exceed the limit of {}",
                config.max_installments
            )));
        }

        if let Some(dates) = explicit {
            return Ok(InstallmentPlanner::schedule_with_dates(sale.total, dates)?);
        }

        let first_due_date = match sale.first_due_date {
            Some(date) => date,
            None => sale
                .date
                .checked_add_days(Days::new(u64::from(config.default_due_days)))
                .ok_or_else(|| {
                    ReceivableError::InvalidInstallmentPlan(
                        "default due date is out of range".to_string(),
                    )
                })?,
        };
        let interval = sale
            .installment_interval
            .unwrap_or_else(|| IntervalPolicy::from_config(config));

        Ok(InstallmentPlanner::generate_installments(
            sale.total,
            sale.installments.unwrap_or(1),
            interval,
            first_due_date,
        )?)
    }

    /// Create the receivables for a sale.
    ///
    /// Creates nothing for sales that are already paid or use an immediate
    /// payment method.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInstallmentPlan` if the sale's terms cannot form a
    /// schedule; the snapshot is unchanged.
    pub fn create_from_sale(
        snapshot: &mut LedgerSnapshot,
        sale: &Sale,
        config: &EngineConfig,
    ) -> Result<Vec<ReceivableId>, ReceivableError> {
        if !sale.requires_receivables() {
            return Ok(Vec::new());
        }

        let plan = Self::plan_for_sale(sale, config)?;
        let total_installments = u32::try_from(plan.len()).map_err(|_| {
            ReceivableError::InvalidInstallmentPlan("too many installments".to_string())
        })?;

        let created: Vec<Receivable> = plan
            .into_iter()
            .map(|share| Receivable {
                id: ReceivableId::new(),
                sale_id: sale.id,
                customer_id: sale.customer_id,
                amount: share.amount,
                original_amount: share.amount,
                total_paid: Money::ZERO,
                due_date: share.due_date,
                status: PaymentStatus::Pending,
                payment_date: None,
                installment_number: share.installment_number,
                total_installments,
                payment_history: Vec::new(),
            })
            .collect();

        let ids = created.iter().map(|r| r.id).collect();
        for receivable in created {
            snapshot.receivables.insert(receivable.id, receivable);
        }
        Ok(ids)
    }

    /// Drop a sale's receivables and generate new ones from its current terms.
    ///
    /// Returns `(removed, created)`.
    ///
    /// # Errors
    ///
    /// Returns `SaleHasActivePayments` if any existing receivable carries an
    /// unreversed payment, or `InvalidInstallmentPlan` for unusable terms.
    pub fn replace_for_sale(
        snapshot: &mut LedgerSnapshot,
        sale: &Sale,
        config: &EngineConfig,
    ) -> Result<(Vec<ReceivableId>, Vec<ReceivableId>), ReceivableError> {
        Self::ensure_no_active_payments(snapshot, sale.id)?;

        let mut staged = snapshot.clone();
        let removed = Self::remove_receivables(&mut staged, sale.id);
        let created = Self::create_from_sale(&mut staged, sale, config)?;

        *snapshot = staged;
        Ok((removed, created))
    }

    /// Allocate one payment across the selected receivables.
    ///
    /// Receivables are paid earliest due date first (ties by installment
    /// number, then ID). Duplicate IDs are ignored. A `new_due_date` later
    /// than a receivable's current due date is applied to every selected
    /// receivable that is still pending afterwards.
    ///
    /// # Errors
    ///
    /// - `ReceivableNotFound` if an ID is not in the snapshot
    /// - `InvalidPaymentAmount` if the selection is empty, the payment is not
    ///   positive (before or after adjustment), or it exceeds the selection's
    ///   outstanding total
    /// - `Ledger` if a payment entry cannot be appended
    pub fn process_batch_payment(
        snapshot: &mut LedgerSnapshot,
        request: &BatchPaymentRequest,
        now: DateTime<Utc>,
    ) -> Result<BatchPaymentOutcome, ReceivableError> {
        let mut selected = Self::resolve_selection(snapshot, &request.receivable_ids)?;
        selected.sort_by_key(|r| (r.due_date, r.installment_number, r.id));

        let total_selected = selected
            .iter()
            .filter(|r| r.is_pending())
            .try_fold(Money::ZERO, |acc, r| acc.checked_add(r.amount))
            .ok_or(ReceivableError::AmountOverflow)?;

        let adjusted = PaymentAllocator::apply_adjustment(
            request.payment_amount,
            total_selected,
            request.adjustment.as_ref(),
        )?;

        if adjusted.effective > total_selected {
            return Err(ReceivableError::InvalidPaymentAmount(format!(
                "payment of {} exceeds the selected outstanding total of {total_selected}",
                adjusted.effective
            )));
        }

        let balances: Vec<OutstandingBalance> = selected
            .iter()
            .map(|r| OutstandingBalance {
                receivable_id: r.id,
                outstanding: if r.is_pending() { r.amount } else { Money::ZERO },
            })
            .collect();
        let allocations = PaymentAllocator::allocate_payment(&balances, adjusted.effective);

        let mut rescheduled = Vec::new();
        for (receivable, allocation) in selected.iter_mut().zip(&allocations) {
            if allocation.settlement != Settlement::Untouched {
                Self::record_payment(receivable, allocation.allocated, now)?;
            }

            if let Some(new_due_date) = request.new_due_date {
                if receivable.is_pending() && new_due_date > receivable.due_date {
                    receivable.due_date = new_due_date;
                    rescheduled.push(receivable.id);
                }
            }
        }

        let mut touched_sales: Vec<SaleId> = selected.iter().map(|r| r.sale_id).collect();
        touched_sales.sort_unstable();
        touched_sales.dedup();

        for receivable in selected {
            snapshot.receivables.insert(receivable.id, receivable);
        }

        Ok(BatchPaymentOutcome {
            requested: adjusted.requested,
            adjustment: adjusted.adjustment,
            effective_amount: adjusted.effective,
            allocations,
            rescheduled,
            touched_sales,
        })
    }

    /// Undo the most recent unreversed payment on one receivable.
    ///
    /// # Errors
    ///
    /// - `ReceivableNotFound` if the ID is not in the snapshot
    /// - `NoReversablePayment` if every payment is already reversed
    /// - `ReversalExceedsOriginal` if the restored balance would exceed the
    ///   original amount
    /// - `Ledger` wrapping `NonMonotonicDate` if `now` is not later than the
    ///   receivable's newest history entry, such as a reversal stamped at the
    ///   same instant as the payment it undoes
    pub fn reverse_last_payment(
        snapshot: &mut LedgerSnapshot,
        receivable_id: ReceivableId,
        now: DateTime<Utc>,
    ) -> Result<ReversalOutcome, ReceivableError> {
        let mut receivable = snapshot.receivable(receivable_id)?.clone();
        let outcome = Self::reverse_in_place(&mut receivable, now)?;
        snapshot.receivables.insert(receivable.id, receivable);
        Ok(outcome)
    }

    /// Reverse the last payment of every paid-into member of an installment
    /// group.
    ///
    /// Members are reversed independently: a failing member is reported in
    /// `failures` and does not undo the others. A receivable that is not part
    /// of a group is reversed on its own.
    ///
    /// # Errors
    ///
    /// Returns `ReceivableNotFound` for an unknown ID, or the first member
    /// failure (`NoReversablePayment` if no member had payments) when nothing
    /// could be reversed.
    pub fn reverse_group(
        snapshot: &mut LedgerSnapshot,
        receivable_id: ReceivableId,
        now: DateTime<Utc>,
    ) -> Result<GroupReversalOutcome, ReceivableError> {
        let target = snapshot.receivable(receivable_id)?;
        if !target.is_grouped() {
            let single = Self::reverse_last_payment(snapshot, receivable_id, now)?;
            return Ok(GroupReversalOutcome {
                reversed: vec![single],
                failures: Vec::new(),
            });
        }

        let members: Vec<Receivable> = snapshot
            .receivables_for_sale(target.sale_id)
            .into_iter()
            .filter(|r| r.total_paid.is_positive())
            .cloned()
            .collect();

        let mut reversed = Vec::new();
        let mut failures = Vec::new();
        let mut updated = Vec::new();
        for mut member in members {
            match Self::reverse_in_place(&mut member, now) {
                Ok(outcome) => {
                    reversed.push(outcome);
                    updated.push(member);
                }
                Err(err) => failures.push((member.id, err)),
            }
        }

        if reversed.is_empty() {
            return Err(failures
                .into_iter()
                .next()
                .map_or(ReceivableError::NoReversablePayment(receivable_id), |(_, e)| e));
        }

        for member in updated {
            snapshot.receivables.insert(member.id, member);
        }
        Ok(GroupReversalOutcome { reversed, failures })
    }

    /// Move a pending receivable's due date. No ledger entry is written.
    ///
    /// Returns the previous due date.
    ///
    /// # Errors
    ///
    /// Returns `ReceivableNotFound` or `ReceivableAlreadyPaid`.
    pub fn change_due_date(
        snapshot: &mut LedgerSnapshot,
        receivable_id: ReceivableId,
        new_due_date: NaiveDate,
    ) -> Result<NaiveDate, ReceivableError> {
        let receivable = snapshot.receivable_mut(receivable_id)?;
        if !receivable.is_pending() {
            return Err(ReceivableError::ReceivableAlreadyPaid(receivable_id));
        }
        Ok(std::mem::replace(&mut receivable.due_date, new_due_date))
    }

    /// Delete a sale together with its receivables.
    ///
    /// Returns the removed receivable IDs.
    ///
    /// # Errors
    ///
    /// Returns `SaleNotFound`, or `SaleHasActivePayments` while any
    /// receivable still carries an unreversed payment.
    pub fn delete_sale_cascade(
        snapshot: &mut LedgerSnapshot,
        sale_id: SaleId,
    ) -> Result<Vec<ReceivableId>, ReceivableError> {
        snapshot.sale(sale_id)?;
        Self::ensure_no_active_payments(snapshot, sale_id)?;

        let removed = Self::remove_receivables(snapshot, sale_id);
        snapshot.sales.remove(&sale_id);
        Ok(removed)
    }

    /// Settle every pending receivable of a sale in full, recording a payment
    /// entry for each.
    ///
    /// Returns the settled receivable IDs.
    ///
    /// # Errors
    ///
    /// Returns `Ledger` if an entry cannot be appended.
    pub fn settle_sale(
        snapshot: &mut LedgerSnapshot,
        sale_id: SaleId,
        now: DateTime<Utc>,
    ) -> Result<Vec<ReceivableId>, ReceivableError> {
        let mut pending: Vec<Receivable> = snapshot
            .receivables_for_sale(sale_id)
            .into_iter()
            .filter(|r| r.is_pending())
            .cloned()
            .collect();

        for receivable in &mut pending {
            let outstanding = receivable.amount;
            Self::record_payment(receivable, outstanding, now)?;
        }

        let ids = pending.iter().map(|r| r.id).collect();
        for receivable in pending {
            snapshot.receivables.insert(receivable.id, receivable);
        }
        Ok(ids)
    }

    fn resolve_selection(
        snapshot: &LedgerSnapshot,
        ids: &[ReceivableId],
    ) -> Result<Vec<Receivable>, ReceivableError> {
        if ids.is_empty() {
            return Err(ReceivableError::InvalidPaymentAmount(
                "no receivables selected".to_string(),
            ));
        }

        let mut seen = BTreeSet::new();
        let mut selected = Vec::with_capacity(ids.len());
        for &id in ids {
            if seen.insert(id) {
                selected.push(snapshot.receivable(id)?.clone());
            }
        }
        Ok(selected)
    }

    fn ensure_no_active_payments(
        snapshot: &LedgerSnapshot,
        sale_id: SaleId,
    ) -> Result<(), ReceivableError> {
        let active: Vec<ReceivableId> = snapshot
            .receivables_for_sale(sale_id)
            .into_iter()
            .filter(|r| r.has_active_payment())
            .map(|r| r.id)
            .collect();

        if active.is_empty() {
            Ok(())
        } else {
            Err(ReceivableError::SaleHasActivePayments {
                sale_id,
                receivable_ids: active,
            })
        }
    }

    fn remove_receivables(snapshot: &mut LedgerSnapshot, sale_id: SaleId) -> Vec<ReceivableId> {
        let ids = snapshot.receivable_ids_for_sale(sale_id);
        for id in &ids {
            snapshot.receivables.remove(id);
        }
        ids
    }

    fn record_payment(
        receivable: &mut Receivable,
        allocated: Money,
        now: DateTime<Utc>,
    ) -> Result<(), ReceivableError> {
        let id = receivable.id;
        let amount = receivable
            .amount
            .checked_sub(allocated)
            .ok_or(ReceivableError::AmountOverflow)?;
        let total_paid = receivable
            .total_paid
            .checked_add(allocated)
            .ok_or(ReceivableError::AmountOverflow)?;

        LedgerLog::append(
            &mut receivable.payment_history,
            PaymentHistoryEntry::payment(now, allocated),
        )
        .map_err(ReceivableError::ledger(id))?;

        receivable.amount = amount;
        receivable.total_paid = total_paid;
        if amount.is_zero() {
            receivable.status = PaymentStatus::Paid;
            receivable.payment_date = Some(now);
        }
        Ok(())
    }

    fn reverse_in_place(
        receivable: &mut Receivable,
        now: DateTime<Utc>,
    ) -> Result<ReversalOutcome, ReceivableError> {
        let id = receivable.id;
        let payment = LedgerLog::last_unreversed_payment(&receivable.payment_history)
            .cloned()
            .ok_or(ReceivableError::NoReversablePayment(id))?;

        let restored = receivable
            .amount
            .checked_add(payment.amount)
            .ok_or(ReceivableError::AmountOverflow)?;
        if restored > receivable.original_amount {
            return Err(ReceivableError::ReversalExceedsOriginal {
                receivable_id: id,
                restored,
                original: receivable.original_amount,
            });
        }

        LedgerLog::append(
            &mut receivable.payment_history,
            PaymentHistoryEntry::reversal(now, payment.amount, payment.date),
        )
        .map_err(ReceivableError::ledger(id))?;

        receivable.amount = restored;
        receivable.total_paid = receivable.total_paid.saturating_sub_to_zero(payment.amount);
        receivable.status = PaymentStatus::Pending;
        receivable.payment_date = None;

        Ok(ReversalOutcome {
            receivable_id: id,
            reversed_payment_date: payment.date,
            amount: payment.amount,
        })
    }
}
