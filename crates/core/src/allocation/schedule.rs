//! Installment schedule generation.
//!
//! Splits a sale total into equal installments in whole cents. Every share is
//! the total divided by the count, truncated to the cent, and the final
//! installment absorbs the remainder so the schedule sums exactly to the total.

use chrono::{Months, NaiveDate};
use serde::{Deserialize, Serialize};
use tally_shared::{EngineConfig, IntervalUnit, Money};

use super::error::AllocationError;

/// Spacing between consecutive installment due dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "unit", content = "every", rename_all = "lowercase")]
pub enum IntervalPolicy {
    /// A fixed number of days.
    Days(u32),
    /// A number of calendar months. Day-of-month is clamped to the end of
    /// shorter months (Jan 31 + 1 month = Feb 28/29).
    Months(u32),
}

impl IntervalPolicy {
    /// Builds the default interval from engine configuration.
    #[must_use]
    pub fn from_config(config: &EngineConfig) -> Self {
        match config.default_interval_unit {
            IntervalUnit::Days => Self::Days(config.default_interval_every),
            IntervalUnit::Months => Self::Months(config.default_interval_every),
        }
    }

    /// Returns true if the interval does not advance the date.
    #[must_use]
    pub fn is_zero(self) -> bool {
        matches!(self, Self::Days(0) | Self::Months(0))
    }

    /// Due date of the installment at `index` (0-based), measured from `first`.
    ///
    /// Offsets are computed from the first date rather than chained, so
    /// month-end clamping on one installment never shifts the next.
    #[must_use]
    pub fn due_date(self, first: NaiveDate, index: u32) -> Option<NaiveDate> {
        match self {
            Self::Days(every) => {
                let days = u64::from(every) * u64::from(index);
                first.checked_add_days(chrono::Days::new(days))
            }
            Self::Months(every) => {
                let months = every.checked_mul(index)?;
                first.checked_add_months(Months::new(months))
            }
        }
    }
}

impl Default for IntervalPolicy {
    fn default() -> Self {
        Self::Months(1)
    }
}

/// One installment of a generated schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstallmentShare {
    /// 1-based position within the schedule.
    pub installment_number: u32,
    /// Amount owed for this installment.
    pub amount: Money,
    /// When the installment falls due.
    pub due_date: NaiveDate,
}

/// Stateless installment schedule builder.
pub struct InstallmentPlanner;

impl InstallmentPlanner {
    /// Hard ceiling on the number of installments in one schedule.
    pub const MAX_INSTALLMENTS: u32 = 1_200;

    /// Split `total` into `count` installments spaced by `interval`.
    ///
    /// # Example
    ///
    /// ```
    /// use chrono::NaiveDate;
    /// use tally_core::allocation::{InstallmentPlanner, IntervalPolicy};
    /// use tally_shared::Money;
    ///
    /// let first = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
    /// let plan = InstallmentPlanner::generate_installments(
    ///     Money::from_cents(100_000),
    ///     3,
    ///     IntervalPolicy::Months(1),
    ///     first,
    /// )
    /// .unwrap();
    ///
    /// let amounts: Vec<i64> = plan.iter().map(|s| s.amount.cents()).collect();
    /// assert_eq!(amounts, vec![33_333, 33_333, 33_334]);
    /// ```
    ///
    /// # Errors
    ///
    /// Returns `InvalidInstallmentPlan` when `count` is outside
    /// `1..=MAX_INSTALLMENTS`, `total` is fewer cents than `count`, the
    /// interval is zero for a multi-installment plan, or a due date overflows
    /// the calendar.
    pub fn generate_installments(
        total: Money,
        count: u32,
        interval: IntervalPolicy,
        first_due_date: NaiveDate,
    ) -> Result<Vec<InstallmentShare>, AllocationError> {
        if count > 1 && interval.is_zero() {
            return Err(AllocationError::InvalidInstallmentPlan(
                "installment interval must be positive".to_string(),
            ));
        }

        let amounts = Self::split_amounts(total, count)?;

        amounts
            .into_iter()
            .zip(0u32..)
            .map(|(amount, index)| {
                let due_date = interval.due_date(first_due_date, index).ok_or_else(|| {
                    AllocationError::InvalidInstallmentPlan(format!(
                        "due date of installment {} is out of range",
                        index + 1
                    ))
                })?;
                Ok(InstallmentShare {
                    installment_number: index + 1,
                    amount,
                    due_date,
                })
            })
            .collect()
    }

    /// Split `total` across explicitly chosen due dates, one per installment.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInstallmentPlan` when `dates` is empty, longer than
    /// `MAX_INSTALLMENTS`, not in ascending order, or `total` is fewer cents
    /// than there are dates.
    pub fn schedule_with_dates(
        total: Money,
        dates: &[NaiveDate],
    ) -> Result<Vec<InstallmentShare>, AllocationError> {
        if let Some(pos) = dates.windows(2).position(|w| w[1] < w[0]) {
            return Err(AllocationError::InvalidInstallmentPlan(format!(
                "due date of installment {} precedes installment {}",
                pos + 2,
                pos + 1
            )));
        }

        let count = u32::try_from(dates.len()).map_err(|_| {
            AllocationError::InvalidInstallmentPlan("too many installments".to_string())
        })?;
        let amounts = Self::split_amounts(total, count)?;

        Ok(amounts
            .into_iter()
            .zip(dates.iter().copied())
            .zip(1u32..)
            .map(|((amount, due_date), installment_number)| InstallmentShare {
                installment_number,
                amount,
                due_date,
            })
            .collect())
    }

    /// Equal shares truncated to the cent; the last share takes the remainder.
    fn split_amounts(total: Money, count: u32) -> Result<Vec<Money>, AllocationError> {
        if count < 1 {
            return Err(AllocationError::InvalidInstallmentPlan(
                "installment count must be at least 1".to_string(),
            ));
        }
        if !total.is_positive() {
            return Err(AllocationError::InvalidInstallmentPlan(format!(
                "total must be positive, got {total}"
            )));
        }

        if count > Self::MAX_INSTALLMENTS {
            return Err(AllocationError::InvalidInstallmentPlan(format!(
                "installment count {count} exceeds the limit of {}",
                Self::MAX_INSTALLMENTS
            )));
        }
        let count_i64 = i64::from(count);
        // every installment must owe at least one cent
        if total.cents() < count_i64 {
            return Err(AllocationError::InvalidInstallmentPlan(format!(
                "total {total} cannot be split into {count} non-zero installments"
            )));
        }

        let base = Money::from_cents(total.cents() / count_i64);
        let last = total - Money::from_cents(base.cents() * (count_i64 - 1));

        let leading = usize::try_from(count - 1).map_err(|_| {
            AllocationError::InvalidInstallmentPlan("too many installments".to_string())
        })?;
        let mut amounts = vec![base; leading];
        amounts.push(last);
        Ok(amounts)
    }
}
