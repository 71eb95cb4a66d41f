//! In-memory transactional store.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use uuid::Uuid;

use super::{BalanceStore, LeaveStore, Transaction};
use crate::error::{EngineError, EngineResult};
use crate::models::{
    AccrualRecord, ApprovalRecord, BalanceDelta, BalanceKey, CarryForwardRecord, CompOffWorkLog,
    LeaveBalance, LeaveRequest, LeaveType, PeriodKey, PeriodRun,
};

#[derive(Debug, Clone, Default)]
struct StoreState {
    requests: HashMap<Uuid, LeaveRequest>,
    approvals: BTreeMap<(Uuid, u8), ApprovalRecord>,
    balances: BTreeMap<BalanceKey, LeaveBalance>,
    accruals: HashMap<(String, i32, u32), AccrualRecord>,
    carry_forwards: HashMap<(String, i32), CarryForwardRecord>,
    period_runs: HashMap<(String, PeriodKey), PeriodRun>,
    work_logs: HashMap<Uuid, CompOffWorkLog>,
}

#[derive(Debug, Default)]
struct Faults {
    balance_writes: HashSet<String>,
    commits: u32,
}

/// A [`LeaveStore`] held entirely in memory.
///
/// `begin` takes the store-wide lock, so transactions are fully serialised.
/// Writes go to a private copy of the state that replaces the committed
/// state only on commit.
///
/// Faults can be injected to exercise rollback and retry paths:
/// [`InMemoryStore::fail_balance_writes_for`] makes balance writes for one
/// employee fail, [`InMemoryStore::fail_next_commits`] makes the next
/// commits fail with a retryable store error.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: Mutex<StoreState>,
    faults: Mutex<Faults>,
}

impl InMemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every balance write for `employee_id` fail with a store error.
    pub fn fail_balance_writes_for(&self, employee_id: &str) {
        self.faults()
            .balance_writes
            .insert(employee_id.to_string());
    }

    /// Makes the next `count` commits fail with a store error.
    pub fn fail_next_commits(&self, count: u32) {
        self.faults().commits = count;
    }

    /// Removes every injected fault.
    pub fn clear_faults(&self) {
        *self.faults() = Faults::default();
    }

    /// Reads a committed balance row.
    pub fn balance_of(
        &self,
        employee_id: &str,
        leave_type: LeaveType,
        year: i32,
    ) -> Option<LeaveBalance> {
        let key = BalanceKey {
            employee_id: employee_id.to_string(),
            leave_type,
            year,
        };
        self.committed().balances.get(&key).cloned()
    }

    /// Every committed balance row, ordered by key.
    pub fn balances(&self) -> Vec<LeaveBalance> {
        self.committed().balances.values().cloned().collect()
    }

    /// Reads a committed leave request.
    pub fn request(&self, id: Uuid) -> Option<LeaveRequest> {
        self.committed().requests.get(&id).cloned()
    }

    /// The committed approval records of a request, ordered by level.
    pub fn records(&self, leave_request_id: Uuid) -> Vec<ApprovalRecord> {
        records_of(&self.committed(), leave_request_id)
    }

    /// Reads a committed run record.
    pub fn run(&self, job: &str, period: &PeriodKey) -> Option<PeriodRun> {
        self.committed()
            .period_runs
            .get(&(job.to_string(), *period))
            .cloned()
    }

    /// Reads a committed accrual record.
    pub fn accrual(&self, employee_id: &str, year: i32, month: u32) -> Option<AccrualRecord> {
        self.committed()
            .accruals
            .get(&(employee_id.to_string(), year, month))
            .cloned()
    }

    /// Reads a committed carry-forward record.
    pub fn carry_forward(&self, employee_id: &str, from_year: i32) -> Option<CarryForwardRecord> {
        self.committed()
            .carry_forwards
            .get(&(employee_id.to_string(), from_year))
            .cloned()
    }

    /// Reads a committed work log.
    pub fn log(&self, id: Uuid) -> Option<CompOffWorkLog> {
        self.committed().work_logs.get(&id).cloned()
    }

    fn committed(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn faults(&self) -> MutexGuard<'_, Faults> {
        self.faults.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl LeaveStore for InMemoryStore {
    fn begin(&self) -> EngineResult<Box<dyn Transaction + '_>> {
        let guard = self.committed();
        let working = StoreState::clone(&guard);
        Ok(Box::new(MemoryTransaction {
            guard,
            working,
            faults: &self.faults,
        }))
    }
}

struct MemoryTransaction<'a> {
    guard: MutexGuard<'a, StoreState>,
    working: StoreState,
    faults: &'a Mutex<Faults>,
}

impl MemoryTransaction<'_> {
    fn check_balance_write(&self, employee_id: &str) -> EngineResult<()> {
        let faults = self.faults.lock().unwrap_or_else(PoisonError::into_inner);
        if faults.balance_writes.contains(employee_id) {
            return Err(EngineError::Store {
                message: format!("balance write failed for employee '{}'", employee_id),
            });
        }
        Ok(())
    }
}

fn records_of(state: &StoreState, leave_request_id: Uuid) -> Vec<ApprovalRecord> {
    state
        .approvals
        .range((leave_request_id, 0)..=(leave_request_id, u8::MAX))
        .map(|(_, record)| record.clone())
        .collect()
}

impl BalanceStore for MemoryTransaction<'_> {
    fn balance(&self, key: &BalanceKey) -> EngineResult<Option<LeaveBalance>> {
        Ok(self.working.balances.get(key).cloned())
    }

    fn get_or_create(
        &mut self,
        employee_id: &str,
        leave_type: LeaveType,
        year: i32,
    ) -> EngineResult<LeaveBalance> {
        let key = BalanceKey {
            employee_id: employee_id.to_string(),
            leave_type,
            year,
        };
        if let Some(existing) = self.working.balances.get(&key) {
            return Ok(existing.clone());
        }

        self.check_balance_write(employee_id)?;
        let balance = LeaveBalance::zeroed(employee_id, leave_type, year);
        self.working.balances.insert(key, balance.clone());
        Ok(balance)
    }

    fn apply_delta(
        &mut self,
        employee_id: &str,
        leave_type: LeaveType,
        year: i32,
        delta: BalanceDelta,
    ) -> EngineResult<LeaveBalance> {
        self.check_balance_write(employee_id)?;

        let mut balance = self.get_or_create(employee_id, leave_type, year)?;
        balance.apply(&delta);
        self.working.balances.insert(balance.key(), balance.clone());
        Ok(balance)
    }

    fn put_balance(&mut self, balance: LeaveBalance) -> EngineResult<()> {
        self.check_balance_write(&balance.employee_id)?;

        if !balance.is_consistent() {
            return Err(EngineError::Conflict {
                message: format!(
                    "balance {}/{}/{} violates available = entitlement + carry-forward - used",
                    balance.employee_id, balance.leave_type, balance.year
                ),
            });
        }
        self.working.balances.insert(balance.key(), balance);
        Ok(())
    }
}

impl Transaction for MemoryTransaction<'_> {
    fn leave_request(&self, id: Uuid) -> EngineResult<Option<LeaveRequest>> {
        Ok(self.working.requests.get(&id).cloned())
    }

    fn requests_for_employee(&self, employee_id: &str) -> EngineResult<Vec<LeaveRequest>> {
        let mut requests: Vec<LeaveRequest> = self
            .working
            .requests
            .values()
            .filter(|r| r.employee_id == employee_id)
            .cloned()
            .collect();
        requests.sort_by_key(|r| (r.start_date, r.created_at));
        Ok(requests)
    }

    fn insert_leave_request(&mut self, request: LeaveRequest) -> EngineResult<()> {
        if self.working.requests.contains_key(&request.id) {
            return Err(EngineError::Conflict {
                message: format!("leave request {} already exists", request.id),
            });
        }
        self.working.requests.insert(request.id, request);
        Ok(())
    }

    fn update_leave_request(&mut self, request: LeaveRequest) -> EngineResult<()> {
        match self.working.requests.get_mut(&request.id) {
            Some(existing) => {
                *existing = request;
                Ok(())
            }
            None => Err(EngineError::not_found("leave request", request.id)),
        }
    }

    fn approval_records(&self, leave_request_id: Uuid) -> EngineResult<Vec<ApprovalRecord>> {
        Ok(records_of(&self.working, leave_request_id))
    }

    fn insert_approval_records(&mut self, records: &[ApprovalRecord]) -> EngineResult<()> {
        for record in records {
            if !self.working.requests.contains_key(&record.leave_request_id) {
                return Err(EngineError::not_found(
                    "leave request",
                    record.leave_request_id,
                ));
            }
            let key = (record.leave_request_id, record.level);
            if self.working.approvals.contains_key(&key) {
                return Err(EngineError::Conflict {
                    message: format!(
                        "approval level {} already exists for leave request {}",
                        record.level, record.leave_request_id
                    ),
                });
            }
            self.working.approvals.insert(key, record.clone());
        }
        Ok(())
    }

    fn update_approval_record(&mut self, record: ApprovalRecord) -> EngineResult<()> {
        let key = (record.leave_request_id, record.level);
        match self.working.approvals.get_mut(&key) {
            Some(existing) => {
                *existing = record;
                Ok(())
            }
            None => Err(EngineError::not_found(
                "approval record",
                format!("{}#{}", record.leave_request_id, record.level),
            )),
        }
    }

    fn accrual_record(
        &self,
        employee_id: &str,
        year: i32,
        month: u32,
    ) -> EngineResult<Option<AccrualRecord>> {
        Ok(self
            .working
            .accruals
            .get(&(employee_id.to_string(), year, month))
            .cloned())
    }

    fn insert_accrual_record(&mut self, record: AccrualRecord) -> EngineResult<()> {
        let key = (record.employee_id.clone(), record.year, record.month);
        if self.working.accruals.contains_key(&key) {
            return Err(EngineError::Conflict {
                message: format!(
                    "accrual for '{}' in {:04}-{:02} already recorded",
                    record.employee_id, record.year, record.month
                ),
            });
        }
        self.working.accruals.insert(key, record);
        Ok(())
    }

    fn carry_forward_record(
        &self,
        employee_id: &str,
        from_year: i32,
    ) -> EngineResult<Option<CarryForwardRecord>> {
        Ok(self
            .working
            .carry_forwards
            .get(&(employee_id.to_string(), from_year))
            .cloned())
    }

    fn insert_carry_forward_record(&mut self, record: CarryForwardRecord) -> EngineResult<()> {
        let key = (record.employee_id.clone(), record.from_year);
        if self.working.carry_forwards.contains_key(&key) {
            return Err(EngineError::Conflict {
                message: format!(
                    "carry-forward for '{}' from {} already recorded",
                    record.employee_id, record.from_year
                ),
            });
        }
        self.working.carry_forwards.insert(key, record);
        Ok(())
    }

    fn period_run(&self, job: &str, period: &PeriodKey) -> EngineResult<Option<PeriodRun>> {
        Ok(self
            .working
            .period_runs
            .get(&(job.to_string(), *period))
            .cloned())
    }

    fn put_period_run(&mut self, run: PeriodRun) -> EngineResult<()> {
        self.working
            .period_runs
            .insert((run.job.clone(), run.period), run);
        Ok(())
    }

    fn work_log(&self, id: Uuid) -> EngineResult<Option<CompOffWorkLog>> {
        Ok(self.working.work_logs.get(&id).cloned())
    }

    fn work_logs_for_employee(&self, employee_id: &str) -> EngineResult<Vec<CompOffWorkLog>> {
        let mut logs: Vec<CompOffWorkLog> = self
            .working
            .work_logs
            .values()
            .filter(|log| log.employee_id == employee_id)
            .cloned()
            .collect();
        logs.sort_by_key(|log| (log.work_date, log.submitted_at));
        Ok(logs)
    }

    fn insert_work_log(&mut self, log: CompOffWorkLog) -> EngineResult<()> {
        if self.working.work_logs.contains_key(&log.id) {
            return Err(EngineError::Conflict {
                message: format!("work log {} already exists", log.id),
            });
        }
        self.working.work_logs.insert(log.id, log);
        Ok(())
    }

    fn update_work_log(&mut self, log: CompOffWorkLog) -> EngineResult<()> {
        match self.working.work_logs.get_mut(&log.id) {
            Some(existing) => {
                *existing = log;
                Ok(())
            }
            None => Err(EngineError::not_found("work log", log.id)),
        }
    }

    fn commit(self: Box<Self>) -> EngineResult<()> {
        let MemoryTransaction {
            mut guard,
            working,
            faults,
        } = *self;

        {
            let mut faults = faults.lock().unwrap_or_else(PoisonError::into_inner);
            if faults.commits > 0 {
                faults.commits -= 1;
                return Err(EngineError::Store {
                    message: "commit failed".to_string(),
                });
            }
        }

        *guard = working;
        Ok(())
    }
}
