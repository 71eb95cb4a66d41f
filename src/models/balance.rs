//! Leave balance rows.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::LeaveType;

/// Unique key of a balance row.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BalanceKey {
    /// The employee owning the balance.
    pub employee_id: String,
    /// The leave type.
    pub leave_type: LeaveType,
    /// The balance year.
    pub year: i32,
}

/// A leave balance for one `(employee, leave type, year)`.
///
/// `available == total_entitlement + carry_forward - used` holds after every
/// mutation made through this type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaveBalance {
    /// The employee owning the balance.
    pub employee_id: String,
    /// The leave type.
    pub leave_type: LeaveType,
    /// The balance year.
    pub year: i32,
    /// Entitlement credited this year (accruals, grants, comp-off).
    pub total_entitlement: Decimal,
    /// Days consumed by approved requests.
    pub used: Decimal,
    /// Days still available.
    pub available: Decimal,
    /// Days rolled over from the previous year.
    pub carry_forward: Decimal,
}

impl LeaveBalance {
    /// Creates an all-zero balance row.
    pub fn zeroed(employee_id: impl Into<String>, leave_type: LeaveType, year: i32) -> Self {
        Self {
            employee_id: employee_id.into(),
            leave_type,
            year,
            total_entitlement: Decimal::ZERO,
            used: Decimal::ZERO,
            available: Decimal::ZERO,
            carry_forward: Decimal::ZERO,
        }
    }

    /// Returns the row's unique key.
    pub fn key(&self) -> BalanceKey {
        BalanceKey {
            employee_id: self.employee_id.clone(),
            leave_type: self.leave_type,
            year: self.year,
        }
    }

    /// Checks the balance invariant.
    pub fn is_consistent(&self) -> bool {
        self.available == self.total_entitlement + self.carry_forward - self.used
    }

    /// Recomputes `available` from the other three columns.
    pub fn recompute_available(&mut self) {
        self.available = self.total_entitlement + self.carry_forward - self.used;
    }

    /// Applies a delta, keeping the invariant.
    pub fn apply(&mut self, delta: &BalanceDelta) {
        self.total_entitlement += delta.total_entitlement;
        self.used += delta.used;
        self.carry_forward += delta.carry_forward;
        self.recompute_available();
    }
}

/// A change to a balance row expressed on its independent columns.
///
/// `available` moves by [`BalanceDelta::available_delta`]; it is never set
/// directly, so a delta can not break the balance invariant.
///
/// # Example
///
/// ```
/// use leave_engine::models::{BalanceDelta, LeaveBalance, LeaveType};
/// use rust_decimal::Decimal;
///
/// let mut balance = LeaveBalance::zeroed("emp_001", LeaveType::Casual, 2026);
/// balance.apply(&BalanceDelta::credit(Decimal::new(5, 0)));
/// balance.apply(&BalanceDelta::debit(Decimal::new(2, 0)));
///
/// assert_eq!(balance.available, Decimal::new(3, 0));
/// assert!(balance.is_consistent());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BalanceDelta {
    /// Change to `total_entitlement`.
    pub total_entitlement: Decimal,
    /// Change to `used`.
    pub used: Decimal,
    /// Change to `carry_forward`.
    pub carry_forward: Decimal,
}

impl BalanceDelta {
    /// Credits entitlement.
    pub fn credit(days: Decimal) -> Self {
        Self {
            total_entitlement: days,
            ..Self::default()
        }
    }

    /// Consumes days.
    pub fn debit(days: Decimal) -> Self {
        Self {
            used: days,
            ..Self::default()
        }
    }

    /// The resulting change to `available`.
    pub fn available_delta(&self) -> Decimal {
        self.total_entitlement + self.carry_forward - self.used
    }
}
