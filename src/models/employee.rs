//! Employee snapshot model and its closed enumerations.
//!
//! Employees are owned by an external directory; the engine only ever reads
//! snapshots of them. Region, role, gender and marital status are closed
//! enums so policy resolution can match on them exhaustively.

use std::fmt;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

/// The policy region an employee belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Region {
    /// India: monthly accruing CL/PL/SL plus comp-off.
    India,
    /// United States: flat annual PTO grants.
    Us,
}

impl Region {
    /// Returns the canonical configuration name of the region.
    pub fn as_str(&self) -> &'static str {
        match self {
            Region::India => "INDIA",
            Region::Us => "US",
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An employee's organisational role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    /// Individual contributor.
    Employee,
    /// People manager.
    Manager,
    /// HR administrator; the usual final approver.
    HrAdmin,
    /// Director.
    Director,
    /// Vice president.
    Vp,
}

impl Role {
    /// Returns the canonical configuration name of the role.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Employee => "EMPLOYEE",
            Role::Manager => "MANAGER",
            Role::HrAdmin => "HR_ADMIN",
            Role::Director => "DIRECTOR",
            Role::Vp => "VP",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Gender as recorded in the employee directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Gender {
    /// Male.
    Male,
    /// Female.
    Female,
    /// Any other or undisclosed gender.
    Other,
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Gender::Male => write!(f, "MALE"),
            Gender::Female => write!(f, "FEMALE"),
            Gender::Other => write!(f, "OTHER"),
        }
    }
}

/// Marital status as recorded in the employee directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MaritalStatus {
    /// Never married.
    Single,
    /// Married.
    Married,
    /// Divorced.
    Divorced,
    /// Widowed.
    Widowed,
}

impl fmt::Display for MaritalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MaritalStatus::Single => write!(f, "SINGLE"),
            MaritalStatus::Married => write!(f, "MARRIED"),
            MaritalStatus::Divorced => write!(f, "DIVORCED"),
            MaritalStatus::Widowed => write!(f, "WIDOWED"),
        }
    }
}

/// Employment status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EmployeeStatus {
    /// Currently employed.
    Active,
    /// Left or suspended.
    Inactive,
}

impl fmt::Display for EmployeeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EmployeeStatus::Active => write!(f, "ACTIVE"),
            EmployeeStatus::Inactive => write!(f, "INACTIVE"),
        }
    }
}

/// A read-only snapshot of an employee.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Employee {
    /// Unique identifier for the employee.
    pub id: String,
    /// The policy region the employee belongs to.
    pub region: Region,
    /// The employee's role.
    pub role: Role,
    /// The direct reporting manager, if any. This is a weak reference and
    /// may point at an id the directory no longer knows.
    #[serde(default)]
    pub reporting_manager_id: Option<String>,
    /// Gender.
    pub gender: Gender,
    /// Marital status.
    pub marital_status: MaritalStatus,
    /// The date the employee joined.
    pub joining_date: NaiveDate,
    /// Employment status.
    pub status: EmployeeStatus,
}

impl Employee {
    /// Returns true if the employee is currently active.
    ///
    /// # Examples
    ///
    /// ```
    /// use leave_engine::models::{Employee, EmployeeStatus, Gender, MaritalStatus, Region, Role};
    /// use chrono::NaiveDate;
    ///
    /// let employee = Employee {
    ///     id: "emp_001".to_string(),
    ///     region: Region::India,
    ///     role: Role::Employee,
    ///     reporting_manager_id: Some("mgr_001".to_string()),
    ///     gender: Gender::Female,
    ///     marital_status: MaritalStatus::Married,
    ///     joining_date: NaiveDate::from_ymd_opt(2023, 6, 1).unwrap(),
    ///     status: EmployeeStatus::Active,
    /// };
    /// assert!(employee.is_active());
    /// ```
    pub fn is_active(&self) -> bool {
        self.status == EmployeeStatus::Active
    }

    /// Returns the number of complete months of service on `on`.
    ///
    /// A month counts once the joining day-of-month has been reached, so an
    /// employee who joined on 2024-01-20 has 0 months on 2024-02-19 and 1
    /// month on 2024-02-20. Dates before joining yield 0.
    pub fn months_of_service(&self, on: NaiveDate) -> u32 {
        if on < self.joining_date {
            return 0;
        }

        let mut months = (on.year() - self.joining_date.year()) * 12 + on.month() as i32
            - self.joining_date.month() as i32;
        if on.day() < self.joining_date.day() {
            months -= 1;
        }

        months.max(0) as u32
    }
}
