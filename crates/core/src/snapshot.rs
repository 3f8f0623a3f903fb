//! The state arena every engine operation reads and returns.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tally_shared::{ReceivableId, SaleId};

use crate::receivable::{Receivable, ReceivableError};
use crate::sale::Sale;

/// All sales and receivables known to the engine.
///
/// Callers load and persist this verbatim; the engine never mutates a
/// snapshot it was handed, it returns a new one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerSnapshot {
    /// Sales by ID.
    pub sales: BTreeMap<SaleId, Sale>,
    /// Receivables by ID.
    pub receivables: BTreeMap<ReceivableId, Receivable>,
}

impl LedgerSnapshot {
    /// Empty snapshot.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a sale.
    ///
    /// # Errors
    ///
    /// Returns `SaleNotFound` if absent.
    pub fn sale(&self, id: SaleId) -> Result<&Sale, ReceivableError> {
        self.sales.get(&id).ok_or(ReceivableError::SaleNotFound(id))
    }

    /// Look up a sale for update.
    ///
    /// # Errors
    ///
    /// Returns `SaleNotFound` if absent.
    pub fn sale_mut(&mut self, id: SaleId) -> Result<&mut Sale, ReceivableError> {
        self.sales
            .get_mut(&id)
            .ok_or(ReceivableError::SaleNotFound(id))
    }

    /// Look up a receivable.
    ///
    /// # Errors
    ///
    /// Returns `ReceivableNotFound` if absent.
    pub fn receivable(&self, id: ReceivableId) -> Result<&Receivable, ReceivableError> {
        self.receivables
            .get(&id)
            .ok_or(ReceivableError::ReceivableNotFound(id))
    }

    /// Look up a receivable for update.
    ///
    /// # Errors
    ///
    /// Returns `ReceivableNotFound` if absent.
    pub fn receivable_mut(&mut self, id: ReceivableId) -> Result<&mut Receivable, ReceivableError> {
        self.receivables
            .get_mut(&id)
            .ok_or(ReceivableError::ReceivableNotFound(id))
    }

    /// Receivables of a sale, ordered by installment number.
    #[must_use]
    pub fn receivables_for_sale(&self, sale_id: SaleId) -> Vec<&Receivable> {
        let mut found: Vec<&Receivable> = self
            .receivables
            .values()
            .filter(|r| r.sale_id == sale_id)
            .collect();
        found.sort_by_key(|r| (r.installment_number, r.id));
        found
    }

    /// IDs of a sale's receivables, ordered by installment number.
    #[must_use]
    pub fn receivable_ids_for_sale(&self, sale_id: SaleId) -> Vec<ReceivableId> {
        self.receivables_for_sale(sale_id)
            .into_iter()
            .map(|r| r.id)
            .collect()
    }
}
