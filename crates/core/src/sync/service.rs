//! Sale status derivation and receivable (re)generation on sale save.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tally_shared::{EngineConfig, ReceivableId, SaleId};

use crate::receivable::{ReceivableError, ReceivableService};
use crate::sale::{PaymentStatus, Sale};
use crate::snapshot::LedgerSnapshot;

/// What saving a sale did to its receivables.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SaleSyncOutcome {
    /// Receivables generated from the sale's terms.
    pub created: Vec<ReceivableId>,
    /// Receivables dropped because the terms changed.
    pub removed: Vec<ReceivableId>,
    /// Receivables settled because the sale was marked paid.
    pub settled: Vec<ReceivableId>,
    /// Sale status after synchronization.
    pub status: PaymentStatus,
}

/// Stateless sale/receivable synchronizer.
pub struct SaleSynchronizer;

impl SaleSynchronizer {
    /// Re-derive a sale's payment status from its receivables.
    ///
    /// A sale with receivables is `paid` exactly when all of them are paid.
    /// A sale without receivables keeps its own status. Returns the status
    /// after the refresh.
    ///
    /// # Errors
    ///
    /// Returns `SaleNotFound` if the sale is not in the snapshot.
    pub fn refresh_sale_status(
        snapshot: &mut LedgerSnapshot,
        sale_id: SaleId,
    ) -> Result<PaymentStatus, ReceivableError> {
        let receivables = snapshot.receivables_for_sale(sale_id);
        let derived = if receivables.is_empty() {
            None
        } else if receivables.iter().all(|r| r.status == PaymentStatus::Paid) {
            Some(PaymentStatus::Paid)
        } else {
            Some(PaymentStatus::Pending)
        };

        let sale = snapshot.sale_mut(sale_id)?;
        if let Some(status) = derived {
            sale.payment_status = status;
        }
        Ok(sale.payment_status)
    }

    /// Store a created or updated sale and bring its receivables in line.
    ///
    /// - No receivables yet: create them if the sale qualifies.
    /// - Payment terms changed: regenerate, unless payments are active.
    /// - Marked `paid` with receivables still pending: settle them through
    ///   recorded payment entries.
    /// - A new customer is carried over to the receivables.
    ///
    /// # Errors
    ///
    /// Returns `SaleHasActivePayments` when terms change under active
    /// payments, `InvalidInstallmentPlan` for unusable terms, or `Ledger` if a
    /// settling entry cannot be appended. The snapshot is unchanged on error.
    pub fn on_sale_saved(
        snapshot: &mut LedgerSnapshot,
        sale: Sale,
        config: &EngineConfig,
        now: DateTime<Utc>,
    ) -> Result<SaleSyncOutcome, ReceivableError> {
        let mut staged = snapshot.clone();
        let previous = staged.sales.insert(sale.id, sale.clone());
        let existing = staged.receivable_ids_for_sale(sale.id);
        let mut outcome = SaleSyncOutcome::default();

        if existing.is_empty() {
            outcome.created = ReceivableService::create_from_sale(&mut staged, &sale, config)?;
        } else {
            let terms_changed = previous
                .as_ref()
                .is_none_or(|before| sale.payment_terms_changed(before));

            if terms_changed {
                let (removed, created) =
                    ReceivableService::replace_for_sale(&mut staged, &sale, config)?;
                outcome.removed = removed;
                outcome.created = created;
            } else if sale.payment_status == PaymentStatus::Paid {
                outcome.settled = ReceivableService::settle_sale(&mut staged, sale.id, now)?;
            }

            for id in staged.receivable_ids_for_sale(sale.id) {
                staged.receivable_mut(id)?.customer_id = sale.customer_id;
            }
        }

        outcome.status = Self::refresh_sale_status(&mut staged, sale.id)?;
        *snapshot = staged;
        Ok(outcome)
    }
}
