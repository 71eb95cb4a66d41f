//! In-memory employee directory and holiday calendar.

use std::collections::{BTreeMap, HashSet};
use std::sync::{PoisonError, RwLock};

use chrono::NaiveDate;

use super::{EmployeeDirectory, HolidayCalendar, RoleDirectory};
use crate::error::{EngineError, EngineResult};
use crate::models::{Employee, Holiday, Region, Role};

/// Employee snapshots keyed by id, serving both employee and role lookups.
#[derive(Debug, Default)]
pub struct Directory {
    employees: RwLock<BTreeMap<String, Employee>>,
}

impl Directory {
    /// Creates a directory from snapshots.
    pub fn new(employees: impl IntoIterator<Item = Employee>) -> Self {
        let employees = employees
            .into_iter()
            .map(|employee| (employee.id.clone(), employee))
            .collect();
        Self {
            employees: RwLock::new(employees),
        }
    }

    /// Inserts or replaces a snapshot.
    pub fn upsert(&self, employee: Employee) {
        self.employees
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(employee.id.clone(), employee);
    }
}

impl EmployeeDirectory for Directory {
    fn get(&self, employee_id: &str) -> EngineResult<Employee> {
        self.employees
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(employee_id)
            .cloned()
            .ok_or_else(|| EngineError::not_found("employee", employee_id))
    }

    fn employees(&self) -> EngineResult<Vec<Employee>> {
        Ok(self
            .employees
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect())
    }
}

impl RoleDirectory for Directory {
    fn find_active_holder(&self, role: Role) -> EngineResult<Option<String>> {
        Ok(self
            .employees
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .find(|employee| employee.role == role && employee.is_active())
            .map(|employee| employee.id.clone()))
    }
}

/// A fixed list of declared holidays.
#[derive(Debug, Clone, Default)]
pub struct HolidayList {
    holidays: Vec<Holiday>,
    index: HashSet<(NaiveDate, Region)>,
}

impl HolidayList {
    /// Creates a calendar from declared holidays.
    pub fn new(holidays: Vec<Holiday>) -> Self {
        let index = holidays.iter().map(|h| (h.date, h.region)).collect();
        Self { holidays, index }
    }

    /// The declared holidays.
    pub fn holidays(&self) -> &[Holiday] {
        &self.holidays
    }
}

impl HolidayCalendar for HolidayList {
    fn is_holiday(&self, date: NaiveDate, region: Region) -> bool {
        self.index.contains(&(date, region))
    }
}
