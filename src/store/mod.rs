//! Collaborator interfaces the engine runs against, plus in-memory
//! implementations of each.
//!
//! The engine owns no persistence of its own. Every state change goes
//! through a [`Transaction`] obtained from a [`LeaveStore`]; employees,
//! role holders, holidays, time and audit entries come from the host
//! application through the traits defined here.
//!
//! # Transactions
//!
//! A transaction is committed explicitly and rolled back when dropped, so an
//! early return through `?` leaves every engine-owned record in its pre-call
//! state. [`with_transaction`] wraps the begin/commit pairing:
//!
//! ```
//! use leave_engine::models::{BalanceDelta, LeaveType};
//! use leave_engine::store::{with_transaction, BalanceStore, InMemoryStore};
//! use rust_decimal::Decimal;
//!
//! let store = InMemoryStore::new();
//! let balance = with_transaction(&store, |tx| {
//!     tx.apply_delta("emp_001", LeaveType::Casual, 2026, BalanceDelta::credit(Decimal::ONE))
//! })?;
//! assert_eq!(balance.available, Decimal::ONE);
//! # Ok::<(), leave_engine::error::EngineError>(())
//! ```

mod audit;
mod clock;
mod directory;
mod memory;

use chrono::NaiveDate;
use uuid::Uuid;

use crate::error::EngineResult;
use crate::models::{
    AccrualRecord, ApprovalRecord, BalanceDelta, BalanceKey, CarryForwardRecord, CompOffWorkLog,
    Employee, LeaveBalance, LeaveRequest, LeaveType, PeriodKey, PeriodRun, Region, Role,
};

pub use audit::{record_audit, AuditSink, InMemoryAuditLog};
pub use clock::{Clock, FixedClock, SystemClock};
pub use directory::{Directory, HolidayList};
pub use memory::InMemoryStore;

/// Balance row access within a transaction.
///
/// Every write re-reads the row inside the transaction; callers never pass
/// previously computed values.
pub trait BalanceStore {
    /// Reads a balance row.
    fn balance(&self, key: &BalanceKey) -> EngineResult<Option<LeaveBalance>>;

    /// Reads a balance row, creating a zeroed one if absent.
    fn get_or_create(
        &mut self,
        employee_id: &str,
        leave_type: LeaveType,
        year: i32,
    ) -> EngineResult<LeaveBalance>;

    /// Applies a delta to the current row, creating it if absent, and
    /// returns the updated row.
    fn apply_delta(
        &mut self,
        employee_id: &str,
        leave_type: LeaveType,
        year: i32,
        delta: BalanceDelta,
    ) -> EngineResult<LeaveBalance>;

    /// Replaces a balance row wholesale. The row must satisfy the
    /// available-balance invariant.
    fn put_balance(&mut self, balance: LeaveBalance) -> EngineResult<()>;
}

/// A unit of work against the leave store.
///
/// Dropping a transaction without calling [`Transaction::commit`] discards
/// every write made through it.
pub trait Transaction: BalanceStore {
    /// Reads a leave request.
    fn leave_request(&self, id: Uuid) -> EngineResult<Option<LeaveRequest>>;

    /// All requests filed by an employee, ordered by start date.
    fn requests_for_employee(&self, employee_id: &str) -> EngineResult<Vec<LeaveRequest>>;

    /// Inserts a new request. Fails with `Conflict` if the id exists.
    fn insert_leave_request(&mut self, request: LeaveRequest) -> EngineResult<()>;

    /// Replaces an existing request. Fails with `NotFound` if absent.
    fn update_leave_request(&mut self, request: LeaveRequest) -> EngineResult<()>;

    /// The approval records of a request, ordered by level.
    fn approval_records(&self, leave_request_id: Uuid) -> EngineResult<Vec<ApprovalRecord>>;

    /// Inserts a batch of approval records. `(leave_request_id, level)` is
    /// unique.
    fn insert_approval_records(&mut self, records: &[ApprovalRecord]) -> EngineResult<()>;

    /// Replaces an existing approval record.
    fn update_approval_record(&mut self, record: ApprovalRecord) -> EngineResult<()>;

    /// Reads the accrual record for an employee and month.
    fn accrual_record(
        &self,
        employee_id: &str,
        year: i32,
        month: u32,
    ) -> EngineResult<Option<AccrualRecord>>;

    /// Inserts an accrual record. `(employee_id, year, month)` is unique.
    fn insert_accrual_record(&mut self, record: AccrualRecord) -> EngineResult<()>;

    /// Reads the carry-forward record for an employee and closing year.
    fn carry_forward_record(
        &self,
        employee_id: &str,
        from_year: i32,
    ) -> EngineResult<Option<CarryForwardRecord>>;

    /// Inserts a carry-forward record. `(employee_id, from_year)` is unique.
    fn insert_carry_forward_record(&mut self, record: CarryForwardRecord) -> EngineResult<()>;

    /// Reads the run record for a job and period.
    fn period_run(&self, job: &str, period: &PeriodKey) -> EngineResult<Option<PeriodRun>>;

    /// Inserts or replaces a run record.
    fn put_period_run(&mut self, run: PeriodRun) -> EngineResult<()>;

    /// Reads a comp-off work log.
    fn work_log(&self, id: Uuid) -> EngineResult<Option<CompOffWorkLog>>;

    /// All work logs of an employee, ordered by work date.
    fn work_logs_for_employee(&self, employee_id: &str) -> EngineResult<Vec<CompOffWorkLog>>;

    /// Inserts a work log. Fails with `Conflict` if the id exists.
    fn insert_work_log(&mut self, log: CompOffWorkLog) -> EngineResult<()>;

    /// Replaces an existing work log.
    fn update_work_log(&mut self, log: CompOffWorkLog) -> EngineResult<()>;

    /// Makes every write visible to later transactions.
    fn commit(self: Box<Self>) -> EngineResult<()>;
}

/// A transactional leave store.
pub trait LeaveStore: Send + Sync {
    /// Opens a transaction. Transactions on the same store may be
    /// serialised by the implementation.
    fn begin(&self) -> EngineResult<Box<dyn Transaction + '_>>;
}

/// Runs `work` in a fresh transaction, committing on `Ok` and rolling back
/// on `Err`.
pub fn with_transaction<T, F>(store: &dyn LeaveStore, work: F) -> EngineResult<T>
where
    F: FnOnce(&mut dyn Transaction) -> EngineResult<T>,
{
    let mut tx = store.begin()?;
    let value = work(tx.as_mut())?;
    tx.commit()?;
    Ok(value)
}

/// Read-only employee lookup.
pub trait EmployeeDirectory: Send + Sync {
    /// Returns a snapshot of one employee. Fails with `NotFound`.
    fn get(&self, employee_id: &str) -> EngineResult<Employee>;

    /// Returns snapshots of every known employee.
    fn employees(&self) -> EngineResult<Vec<Employee>>;
}

/// Lookup of administrative role holders.
pub trait RoleDirectory: Send + Sync {
    /// The first ACTIVE holder of a role, if any.
    fn find_active_holder(&self, role: Role) -> EngineResult<Option<String>>;
}

/// Declared holidays by region.
pub trait HolidayCalendar: Send + Sync {
    /// Returns true if `date` is a declared holiday in `region`.
    fn is_holiday(&self, date: NaiveDate, region: Region) -> bool;
}
