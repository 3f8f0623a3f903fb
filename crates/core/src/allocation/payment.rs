//! Payment allocation across outstanding receivables.
//!
//! A batch payment is walked once over receivables that the caller has
//! already ordered (earliest due date first). Each receivable takes
//! `min(remaining, outstanding)` until the payment is exhausted, so the sum
//! of allocations never exceeds the payment and no receivable is over-paid.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tally_shared::{Money, ReceivableId};

use super::error::AllocationError;

/// Outstanding balance of one receivable, as input to allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutstandingBalance {
    /// The receivable.
    pub receivable_id: ReceivableId,
    /// Remaining amount owed.
    pub outstanding: Money,
}

/// What an allocation did to a receivable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Settlement {
    /// The allocation consumed the whole outstanding amount.
    FullSettle,
    /// The allocation covered part of the outstanding amount.
    PartialSettle,
    /// Nothing was allocated.
    Untouched,
}

/// The share of a payment assigned to one receivable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allocation {
    /// The receivable.
    pub receivable_id: ReceivableId,
    /// Amount assigned from the payment.
    pub allocated: Money,
    /// Resulting settlement kind.
    pub settlement: Settlement,
}

/// Whether an adjustment lowers or raises the credited payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdjustmentDirection {
    /// Subtract the adjustment from the payment.
    Discount,
    /// Add the adjustment to the payment.
    Surcharge,
}

/// Size of an adjustment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum AdjustmentValue {
    /// Fraction of the total selected outstanding amount (`0.10` = 10%).
    Percentage(Decimal),
    /// A fixed amount.
    Fixed(Money),
}

/// A discount or surcharge applied to a batch payment before allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentAdjustment {
    /// Discount or surcharge.
    pub direction: AdjustmentDirection,
    /// Percentage of the selection or fixed amount.
    pub value: AdjustmentValue,
}

impl PaymentAdjustment {
    /// Percentage discount on the selected total.
    #[must_use]
    pub const fn discount_rate(rate: Decimal) -> Self {
        Self {
            direction: AdjustmentDirection::Discount,
            value: AdjustmentValue::Percentage(rate),
        }
    }

    /// Fixed discount.
    #[must_use]
    pub const fn discount_fixed(amount: Money) -> Self {
        Self {
            direction: AdjustmentDirection::Discount,
            value: AdjustmentValue::Fixed(amount),
        }
    }

    /// Percentage surcharge on the selected total.
    #[must_use]
    pub const fn surcharge_rate(rate: Decimal) -> Self {
        Self {
            direction: AdjustmentDirection::Surcharge,
            value: AdjustmentValue::Percentage(rate),
        }
    }

    /// Fixed surcharge.
    #[must_use]
    pub const fn surcharge_fixed(amount: Money) -> Self {
        Self {
            direction: AdjustmentDirection::Surcharge,
            value: AdjustmentValue::Fixed(amount),
        }
    }
}

/// A payment after discount/surcharge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdjustedPayment {
    /// Amount the caller asked to pay.
    pub requested: Money,
    /// Size of the discount or surcharge (always non-negative).
    pub adjustment: Money,
    /// Amount that will actually be allocated.
    pub effective: Money,
}

/// Stateless payment allocator.
pub struct PaymentAllocator;

impl PaymentAllocator {
    /// Allocate `payment` over receivables in the given order.
    ///
    /// Returns one allocation per input receivable, in input order.
    #[must_use]
    pub fn allocate_payment(ordered: &[OutstandingBalance], payment: Money) -> Vec<Allocation> {
        let mut remaining = payment.max(Money::ZERO);

        ordered
            .iter()
            .map(|balance| {
                let outstanding = balance.outstanding.max(Money::ZERO);
                let allocated = remaining.min(outstanding);
                remaining -= allocated;

                let settlement = if allocated.is_zero() {
                    Settlement::Untouched
                } else if allocated == outstanding {
                    Settlement::FullSettle
                } else {
                    Settlement::PartialSettle
                };

                Allocation {
                    receivable_id: balance.receivable_id,
                    allocated,
                    settlement,
                }
            })
            .collect()
    }

    /// Apply an optional discount/surcharge to a payment.
    ///
    /// Percentages are taken of `total_selected` and rounded to the cent
    /// with Banker's Rounding.
    ///
    /// # Errors
    ///
    /// Returns `InvalidPaymentAmount` if the payment is not positive, the
    /// adjustment is negative, or the effective payment is not positive.
    pub fn apply_adjustment(
        payment: Money,
        total_selected: Money,
        adjustment: Option<&PaymentAdjustment>,
    ) -> Result<AdjustedPayment, AllocationError> {
        if !payment.is_positive() {
            return Err(AllocationError::InvalidPaymentAmount(format!(
                "payment must be positive, got {payment}"
            )));
        }

        let Some(adjustment) = adjustment else {
            return Ok(AdjustedPayment {
                requested: payment,
                adjustment: Money::ZERO,
                effective: payment,
            });
        };

        let size = Self::adjustment_size(adjustment.value, total_selected)?;

        let effective = match adjustment.direction {
            AdjustmentDirection::Discount => payment.checked_sub(size),
            AdjustmentDirection::Surcharge => payment.checked_add(size),
        }
        .ok_or_else(|| {
            AllocationError::InvalidPaymentAmount("adjusted payment is out of range".to_string())
        })?;

        if !effective.is_positive() {
            return Err(AllocationError::InvalidPaymentAmount(format!(
                "payment after adjustment must be positive, got {effective}"
            )));
        }

        Ok(AdjustedPayment {
            requested: payment,
            adjustment: size,
            effective,
        })
    }

    fn adjustment_size(
        value: AdjustmentValue,
        total_selected: Money,
    ) -> Result<Money, AllocationError> {
        let size = match value {
            AdjustmentValue::Fixed(amount) => amount,
            AdjustmentValue::Percentage(rate) => {
                if rate.is_sign_negative() {
                    return Err(AllocationError::InvalidPaymentAmount(format!(
                        "adjustment rate must not be negative, got {rate}"
                    )));
                }
                let raw = total_selected
                    .to_decimal()
                    .checked_mul(rate)
                    .ok_or_else(|| {
                        AllocationError::InvalidPaymentAmount(
                            "adjustment is out of range".to_string(),
                        )
                    })?;
                Money::from_decimal_rounded(raw)
                    .map_err(|e| AllocationError::InvalidPaymentAmount(e.to_string()))?
            }
        };

        if size.is_negative() {
            return Err(AllocationError::InvalidPaymentAmount(format!(
                "adjustment must not be negative, got {size}"
            )));
        }
        Ok(size)
    }
}
