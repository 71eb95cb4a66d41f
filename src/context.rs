//! The collaborators every engine component runs against.

use std::sync::Arc;

use chrono::NaiveDate;

use crate::models::{Employee, Holiday};
use crate::notification::{NotificationSink, RecordingNotifier};
use crate::store::{
    AuditSink, Clock, Directory, EmployeeDirectory, FixedClock, HolidayCalendar, HolidayList,
    InMemoryAuditLog, InMemoryStore, LeaveStore, RoleDirectory,
};

/// Shared handles to the host application's collaborators.
///
/// Cloning is cheap; every field is reference counted.
#[derive(Clone)]
pub struct EngineContext {
    /// Transactional store for requests, approvals, balances and batch
    /// records.
    pub store: Arc<dyn LeaveStore>,
    /// Employee snapshots.
    pub employees: Arc<dyn EmployeeDirectory>,
    /// Administrative role holders.
    pub roles: Arc<dyn RoleDirectory>,
    /// Declared holidays.
    pub holidays: Arc<dyn HolidayCalendar>,
    /// Notification delivery.
    pub notifier: Arc<dyn NotificationSink>,
    /// Audit trail.
    pub audit: Arc<dyn AuditSink>,
    /// Time source.
    pub clock: Arc<dyn Clock>,
}

/// An [`EngineContext`] backed entirely by in-memory collaborators, with
/// the concrete handles kept for inspection.
///
/// # Example
///
/// ```
/// use chrono::NaiveDate;
/// use leave_engine::context::InMemoryContext;
///
/// let fixture = InMemoryContext::new(vec![], vec![], NaiveDate::from_ymd_opt(2026, 3, 2).unwrap());
/// let context = fixture.context();
/// assert_eq!(context.clock.today(), NaiveDate::from_ymd_opt(2026, 3, 2).unwrap());
/// ```
pub struct InMemoryContext {
    /// The store.
    pub store: Arc<InMemoryStore>,
    /// Employee and role directory.
    pub directory: Arc<Directory>,
    /// Holiday calendar.
    pub holidays: Arc<HolidayList>,
    /// Notification recorder.
    pub notifier: Arc<RecordingNotifier>,
    /// Audit log.
    pub audit: Arc<InMemoryAuditLog>,
    /// Manually driven clock.
    pub clock: Arc<FixedClock>,
}

impl InMemoryContext {
    /// Creates in-memory collaborators with the clock stopped on `today`.
    pub fn new(employees: Vec<Employee>, holidays: Vec<Holiday>, today: NaiveDate) -> Self {
        Self {
            store: Arc::new(InMemoryStore::new()),
            directory: Arc::new(Directory::new(employees)),
            holidays: Arc::new(HolidayList::new(holidays)),
            notifier: Arc::new(RecordingNotifier::new()),
            audit: Arc::new(InMemoryAuditLog::new()),
            clock: Arc::new(FixedClock::on(today)),
        }
    }

    /// Type-erased handles for the engine.
    pub fn context(&self) -> EngineContext {
        EngineContext {
            store: self.store.clone(),
            employees: self.directory.clone(),
            roles: self.directory.clone(),
            holidays: self.holidays.clone(),
            notifier: self.notifier.clone(),
            audit: self.audit.clone(),
            clock: self.clock.clone(),
        }
    }
}
