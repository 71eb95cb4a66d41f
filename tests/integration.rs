//! End-to-end tests for the Leave Governance Engine.
//!
//! Every test drives the public [`LeaveEngine`] against the shipped policy
//! configuration and in-memory collaborators:
//! - Monthly accrual on and after the joining threshold
//! - Comp-off conversion and verification
//! - Multi-level approval, rejection and cancellation
//! - Year-end carry-forward with role caps
//! - Gendered eligibility
//! - Concurrency, batch rollback and notification retry

use std::str::FromStr;
use std::sync::Arc;

use chrono::{Duration, NaiveDate};
use rust_decimal::Decimal;

use leave_engine::context::InMemoryContext;
use leave_engine::engine::LeaveEngine;
use leave_engine::error::{EngineError, ErrorKind};
use leave_engine::models::{
    ApprovalStatus, AuditAction, BalanceDelta, DecisionAction, Employee, EmployeeStatus, Gender,
    Holiday, LeaveStatus, LeaveType, MaritalStatus, PeriodKey, Region, Role, RunStatus,
    WorkLogStatus, WorkType,
};
use leave_engine::notification::{
    InMemoryPreferences, NotificationDispatcher, NotificationEvent, RecordingNotifier,
};
use leave_engine::service::LeaveApplication;
use leave_engine::store::{with_transaction, BalanceStore};

// =============================================================================
// Test Helpers
// =============================================================================

const CONFIG_DIR: &str = "./config/leave_policy";

fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn today() -> NaiveDate {
    date(2026, 3, 10)
}

fn employee(
    id: &str,
    region: Region,
    role: Role,
    manager: Option<&str>,
    gender: Gender,
    marital_status: MaritalStatus,
    joining_date: NaiveDate,
) -> Employee {
    Employee {
        id: id.to_string(),
        region,
        role,
        reporting_manager_id: manager.map(str::to_string),
        gender,
        marital_status,
        joining_date,
        status: EmployeeStatus::Active,
    }
}

/// An India reporting line (emp_001 -> mgr_001 -> dir_001) with an HR
/// admin, plus a small US team under us_dir.
fn create_test_employees() -> Vec<Employee> {
    let joined = date(2022, 1, 10);
    vec![
        employee("emp_001", Region::India, Role::Employee, Some("mgr_001"), Gender::Female, MaritalStatus::Married, joined),
        employee("emp_002", Region::India, Role::Employee, Some("mgr_001"), Gender::Female, MaritalStatus::Single, joined),
        employee("mgr_001", Region::India, Role::Manager, Some("dir_001"), Gender::Male, MaritalStatus::Married, joined),
        employee("dir_001", Region::India, Role::Director, None, Gender::Male, MaritalStatus::Married, joined),
        employee("hr_001", Region::India, Role::HrAdmin, None, Gender::Female, MaritalStatus::Single, joined),
        employee("us_dir", Region::Us, Role::Director, None, Gender::Male, MaritalStatus::Married, joined),
        employee("us_vp", Region::Us, Role::Vp, Some("us_dir"), Gender::Male, MaritalStatus::Married, joined),
        employee("us_emp", Region::Us, Role::Employee, Some("us_dir"), Gender::Female, MaritalStatus::Single, joined),
    ]
}

fn create_fixture(employees: Vec<Employee>) -> InMemoryContext {
    let holidays = vec![Holiday {
        date: date(2026, 3, 4),
        name: "Holi".to_string(),
        region: Region::India,
    }];
    InMemoryContext::new(employees, holidays, today())
}

fn create_engine(fixture: &InMemoryContext) -> LeaveEngine {
    LeaveEngine::from_dir(CONFIG_DIR, fixture.context()).expect("Failed to load config")
}

fn credit(fixture: &InMemoryContext, employee_id: &str, leave_type: LeaveType, year: i32, days: &str) {
    with_transaction(fixture.store.as_ref(), |tx| {
        tx.apply_delta(employee_id, leave_type, year, BalanceDelta::credit(dec(days)))
    })
    .unwrap();
}

fn debit(fixture: &InMemoryContext, employee_id: &str, leave_type: LeaveType, year: i32, days: &str) {
    with_transaction(fixture.store.as_ref(), |tx| {
        tx.apply_delta(employee_id, leave_type, year, BalanceDelta::debit(dec(days)))
    })
    .unwrap();
}

fn application(
    employee_id: &str,
    leave_type: LeaveType,
    start: NaiveDate,
    end: NaiveDate,
    days: &str,
) -> LeaveApplication {
    LeaveApplication {
        employee_id: employee_id.to_string(),
        leave_type,
        start_date: start,
        end_date: end,
        total_days: dec(days),
        reason: None,
    }
}

// =============================================================================
// Monthly Accrual
// =============================================================================

#[test]
fn test_accrual_full_rate_on_threshold_day() {
    let fixture = create_fixture(vec![employee(
        "new_015",
        Region::India,
        Role::Employee,
        Some("mgr_001"),
        Gender::Male,
        MaritalStatus::Single,
        date(2026, 3, 15),
    )]);
    let engine = create_engine(&fixture);

    let report = engine.run_monthly_accrual(2026, 3).unwrap();
    assert_eq!(report.status, RunStatus::Completed);
    assert_eq!(report.processed, vec!["new_015"]);

    let casual = engine.balance("new_015", LeaveType::Casual, 2026).unwrap();
    assert_eq!(casual.available, dec("1"));

    let record = fixture.store.accrual("new_015", 2026, 3).unwrap();
    let credit = record
        .credits
        .iter()
        .find(|c| c.leave_type == LeaveType::Casual)
        .unwrap();
    assert!(!credit.is_pro_rated);
}

#[test]
fn test_accrual_half_rate_after_threshold_day() {
    let fixture = create_fixture(vec![employee(
        "new_016",
        Region::India,
        Role::Employee,
        Some("mgr_001"),
        Gender::Male,
        MaritalStatus::Single,
        date(2026, 3, 16),
    )]);
    let engine = create_engine(&fixture);

    engine.run_monthly_accrual(2026, 3).unwrap();

    assert_eq!(
        engine.balance("new_016", LeaveType::Casual, 2026).unwrap().available,
        dec("0.5")
    );
    assert_eq!(
        engine.balance("new_016", LeaveType::Privilege, 2026).unwrap().available,
        dec("0.625")
    );
    let record = fixture.store.accrual("new_016", 2026, 3).unwrap();
    assert!(record.credits.iter().all(|c| c.is_pro_rated));
}

#[test]
fn test_accrual_period_runs_once() {
    let fixture = create_fixture(create_test_employees());
    let engine = create_engine(&fixture);

    let report = engine.run_monthly_accrual(2026, 2).unwrap();
    assert_eq!(report.status, RunStatus::Completed);
    assert!(!report.processed.iter().any(|id| id.starts_with("us_")));

    let err = engine.run_monthly_accrual(2026, 2).unwrap_err();
    assert!(matches!(err, EngineError::DuplicatePeriod { .. }));
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert_eq!(
        engine.balance("emp_001", LeaveType::Casual, 2026).unwrap().available,
        dec("1")
    );
}

#[test]
fn test_failed_batch_employee_is_rolled_back_and_retried() {
    let fixture = create_fixture(create_test_employees());
    let engine = create_engine(&fixture);
    fixture.store.fail_balance_writes_for("emp_002");

    let report = engine.run_monthly_accrual(2026, 2).unwrap();
    assert_eq!(report.status, RunStatus::Failed);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].employee_id, "emp_002");
    assert!(report.processed.contains(&"emp_001".to_string()));
    assert!(fixture.store.accrual("emp_002", 2026, 2).is_none());
    assert!(fixture
        .store
        .balance_of("emp_002", LeaveType::Casual, 2026)
        .is_none());

    fixture.store.clear_faults();
    let retry = engine.run_monthly_accrual(2026, 2).unwrap();
    assert_eq!(retry.status, RunStatus::Completed);
    assert_eq!(retry.processed, vec!["emp_002"]);
    assert!(retry.skipped.contains(&"emp_001".to_string()));
    assert_eq!(
        engine.balance("emp_001", LeaveType::Casual, 2026).unwrap().available,
        dec("1")
    );
    assert_eq!(
        engine.balance("emp_002", LeaveType::Casual, 2026).unwrap().available,
        dec("1")
    );
}

// =============================================================================
// Comp-Off
// =============================================================================

#[test]
fn test_comp_off_saturday_work_credits_half_day() {
    let fixture = create_fixture(create_test_employees());
    let engine = create_engine(&fixture);

    let submission = engine
        .submit_work_log("emp_001", date(2026, 3, 7), dec("6"))
        .unwrap();
    assert_eq!(submission.log.work_type, WorkType::Weekend);
    assert_eq!(submission.log.comp_off_earned, dec("6"));
    assert_eq!(submission.verifier_id.as_deref(), Some("mgr_001"));

    let decision = engine
        .verify_work_log(submission.log.id, "mgr_001", DecisionAction::Approve, None)
        .unwrap();
    assert_eq!(decision.log.status, WorkLogStatus::Verified);
    assert_eq!(decision.log.credited_days, dec("0.5"));
    assert_eq!(decision.log.remainder_hours, dec("1"));
    assert_eq!(
        engine.balance("emp_001", LeaveType::CompOff, 2026).unwrap().available,
        dec("0.5")
    );
}

#[test]
fn test_comp_off_holiday_work_is_accepted() {
    let fixture = create_fixture(create_test_employees());
    let engine = create_engine(&fixture);

    let submission = engine
        .submit_work_log("emp_001", date(2026, 3, 4), dec("8"))
        .unwrap();
    assert_eq!(submission.log.work_type, WorkType::Holiday);
}

#[test]
fn test_comp_off_weekday_work_is_refused() {
    let fixture = create_fixture(create_test_employees());
    let engine = create_engine(&fixture);

    let err = engine
        .submit_work_log("emp_001", date(2026, 3, 9), dec("8"))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[test]
fn test_comp_off_only_manager_may_verify() {
    let fixture = create_fixture(create_test_employees());
    let engine = create_engine(&fixture);

    let submission = engine
        .submit_work_log("emp_001", date(2026, 3, 8), dec("9"))
        .unwrap();
    let err = engine
        .verify_work_log(submission.log.id, "hr_001", DecisionAction::Approve, None)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PolicyViolation);
    assert_eq!(
        fixture.store.log(submission.log.id).unwrap().status,
        WorkLogStatus::Pending
    );
}

// =============================================================================
// Approval Chains
// =============================================================================

#[test]
fn test_three_level_rejection_at_second_level() {
    let fixture = create_fixture(create_test_employees());
    let engine = create_engine(&fixture);
    engine.provision_annual_grants("emp_001", 2026).unwrap();

    let submission = engine
        .submit(application(
            "emp_001",
            LeaveType::Maternity,
            date(2026, 4, 1),
            date(2026, 4, 10),
            "10",
        ))
        .unwrap();
    let id = submission.request.id;
    let approvers: Vec<&str> = submission
        .chain
        .levels
        .iter()
        .map(|l| l.approver_id.as_str())
        .collect();
    assert_eq!(approvers, vec!["mgr_001", "dir_001", "hr_001"]);

    let first = engine
        .process_decision(id, "mgr_001", DecisionAction::Approve, None)
        .unwrap();
    assert!(!first.completed);
    assert_eq!(first.next_level.unwrap().approver_id, "dir_001");

    let second = engine
        .process_decision(
            id,
            "dir_001",
            DecisionAction::Reject,
            Some("Overlaps the product launch".to_string()),
        )
        .unwrap();
    assert!(second.completed);
    assert_eq!(second.status, LeaveStatus::Rejected);
    assert!(second.superseded_levels.is_empty());

    let records = fixture.store.records(id);
    let statuses: Vec<ApprovalStatus> = records.iter().map(|r| r.status).collect();
    assert_eq!(
        statuses,
        vec![
            ApprovalStatus::Approved,
            ApprovalStatus::Rejected,
            ApprovalStatus::Pending
        ]
    );
    assert_eq!(
        engine.balance("emp_001", LeaveType::Maternity, 2026).unwrap().available,
        dec("182")
    );
    assert_eq!(
        fixture.notifier.sent_to("emp_001")[0].event,
        NotificationEvent::RequestRejected
    );

    let late = engine.process_decision(id, "hr_001", DecisionAction::Approve, None);
    assert!(matches!(late, Err(EngineError::AlreadyProcessed { .. })));
}

#[test]
fn test_full_approval_debits_balance_and_audits() {
    let fixture = create_fixture(create_test_employees());
    let engine = create_engine(&fixture);
    credit(&fixture, "emp_001", LeaveType::Privilege, 2026, "5");

    let submission = engine
        .submit(application(
            "emp_001",
            LeaveType::Privilege,
            date(2026, 3, 23),
            date(2026, 3, 25),
            "3",
        ))
        .unwrap();
    let id = submission.request.id;

    engine
        .process_decision(id, "mgr_001", DecisionAction::Approve, None)
        .unwrap();
    let outcome = engine
        .process_decision(id, "dir_001", DecisionAction::Approve, None)
        .unwrap();
    assert_eq!(outcome.status, LeaveStatus::Approved);

    let balance = engine.balance("emp_001", LeaveType::Privilege, 2026).unwrap();
    assert_eq!(balance.used, dec("3"));
    assert_eq!(balance.available, dec("2"));

    let actions: Vec<AuditAction> = fixture.audit.entries().iter().map(|e| e.action).collect();
    assert!(actions.contains(&AuditAction::ChainBuilt));
    assert!(actions.contains(&AuditAction::DecisionProcessed));
    assert!(actions.contains(&AuditAction::BalanceMutated));
}

#[test]
fn test_concurrent_final_approvals_debit_once() {
    let fixture = create_fixture(create_test_employees());
    let engine = create_engine(&fixture);
    credit(&fixture, "emp_001", LeaveType::Casual, 2026, "3");

    let id = engine
        .submit(application(
            "emp_001",
            LeaveType::Casual,
            date(2026, 3, 16),
            date(2026, 3, 17),
            "2",
        ))
        .unwrap()
        .request
        .id;

    let results: Vec<_> = std::thread::scope(|s| {
        let handles: Vec<_> = (0..4)
            .map(|_| {
                s.spawn(|| engine.process_decision(id, "mgr_001", DecisionAction::Approve, None))
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(results
        .iter()
        .filter_map(|r| r.as_ref().err())
        .all(|e| matches!(e, EngineError::AlreadyProcessed { .. })));

    let balance = engine.balance("emp_001", LeaveType::Casual, 2026).unwrap();
    assert_eq!(balance.used, dec("2"));
    assert_eq!(balance.available, dec("1"));
}

#[test]
fn test_cancel_leaves_balance_untouched() {
    let fixture = create_fixture(create_test_employees());
    let engine = create_engine(&fixture);
    credit(&fixture, "emp_001", LeaveType::Casual, 2026, "2");

    let id = engine
        .submit(application(
            "emp_001",
            LeaveType::Casual,
            date(2026, 3, 20),
            date(2026, 3, 20),
            "1",
        ))
        .unwrap()
        .request
        .id;

    let outcome = engine.cancel(id, "emp_001").unwrap();
    assert_eq!(outcome.request.status, LeaveStatus::Cancelled);
    assert_eq!(
        engine.balance("emp_001", LeaveType::Casual, 2026).unwrap().available,
        dec("2")
    );
    assert!(fixture
        .notifier
        .sent_to("mgr_001")
        .iter()
        .any(|n| n.event == NotificationEvent::RequestCancelled));

    let again = engine.cancel(id, "emp_001").unwrap_err();
    assert_eq!(again.kind(), ErrorKind::Conflict);
}

// =============================================================================
// Carry-Forward
// =============================================================================

#[test]
fn test_year_end_carry_forward_respects_role_caps() {
    let fixture = create_fixture(create_test_employees());
    let engine = create_engine(&fixture);
    engine.provision_annual_grants("us_vp", 2025).unwrap();
    engine.provision_annual_grants("us_emp", 2025).unwrap();
    debit(&fixture, "us_vp", LeaveType::Pto, 2025, "3");
    debit(&fixture, "us_emp", LeaveType::Pto, 2025, "7");

    let report = engine.run_carry_forward(2025).unwrap();
    assert_eq!(report.status, RunStatus::Completed);

    let vp = engine.balance("us_vp", LeaveType::Pto, 2026).unwrap();
    assert_eq!(vp.carry_forward, dec("0"));
    assert_eq!(vp.available, dec("15"));

    let staff = engine.balance("us_emp", LeaveType::Pto, 2026).unwrap();
    assert_eq!(staff.carry_forward, dec("5"));
    assert_eq!(staff.available, dec("20"));

    let record = fixture.store.carry_forward("us_vp", 2025).unwrap();
    let pto = record
        .entries
        .iter()
        .find(|e| e.leave_type == LeaveType::Pto)
        .unwrap();
    assert_eq!(pto.previous_available, dec("12"));
    assert_eq!(pto.expired, dec("12"));

    let err = engine
        .run_batch("annual_carry_forward", &PeriodKey::Year(2025))
        .unwrap_err();
    assert!(matches!(err, EngineError::DuplicatePeriod { .. }));
}

#[test]
fn test_carry_forward_after_january_accrual_keeps_accrued_days() {
    let fixture = create_fixture(create_test_employees());
    let engine = create_engine(&fixture);
    credit(&fixture, "emp_002", LeaveType::Privilege, 2025, "10");
    credit(&fixture, "emp_002", LeaveType::Casual, 2025, "4");

    engine.run_monthly_accrual(2026, 1).unwrap();
    let report = engine.run_carry_forward(2025).unwrap();
    assert_eq!(report.status, RunStatus::Completed);

    let privilege = engine.balance("emp_002", LeaveType::Privilege, 2026).unwrap();
    assert_eq!(privilege.total_entitlement, dec("1.25"));
    assert_eq!(privilege.carry_forward, dec("10"));
    assert_eq!(privilege.available, dec("11.25"));

    let casual = engine.balance("emp_002", LeaveType::Casual, 2026).unwrap();
    assert_eq!(casual.total_entitlement, dec("1"));
    assert_eq!(casual.carry_forward, dec("0"));
    assert_eq!(casual.available, dec("1"));
}

#[test]
fn test_comp_off_verified_after_rollover_credits_next_year() {
    let fixture = InMemoryContext::new(create_test_employees(), vec![], date(2026, 1, 5));
    let engine = create_engine(&fixture);

    let before = engine
        .submit_work_log("emp_001", date(2025, 12, 27), dec("6"))
        .unwrap();
    let after = engine
        .submit_work_log("emp_001", date(2025, 12, 28), dec("8"))
        .unwrap();

    engine
        .verify_work_log(before.log.id, "mgr_001", DecisionAction::Approve, None)
        .unwrap();
    engine.run_carry_forward(2025).unwrap();
    let decision = engine
        .verify_work_log(after.log.id, "mgr_001", DecisionAction::Approve, None)
        .unwrap();

    assert_eq!(decision.balance.unwrap().year, 2026);
    assert_eq!(
        engine.balance("emp_001", LeaveType::CompOff, 2025).unwrap().available,
        dec("0.5")
    );
    assert_eq!(
        engine.balance("emp_001", LeaveType::CompOff, 2026).unwrap().available,
        dec("1")
    );
}

// =============================================================================
// Eligibility
// =============================================================================

#[test]
fn test_gendered_leave_requires_marriage() {
    let fixture = create_fixture(create_test_employees());
    let engine = create_engine(&fixture);
    let start = date(2026, 6, 1);
    let end = date(2026, 6, 30);

    let single = engine
        .check_eligibility("emp_002", LeaveType::Maternity, start, end)
        .unwrap();
    assert!(!single.eligible);
    assert_eq!(single.reasons.len(), 1);
    assert!(single.reasons[0].contains("marital status"));

    let married = engine
        .check_eligibility("emp_001", LeaveType::Maternity, start, end)
        .unwrap();
    assert!(married.eligible);
    assert!(married.reasons.is_empty());
}

#[test]
fn test_maternity_is_once_per_year() {
    let fixture = create_fixture(create_test_employees());
    let engine = create_engine(&fixture);
    engine.provision_annual_grants("emp_001", 2026).unwrap();

    engine
        .submit(application(
            "emp_001",
            LeaveType::Maternity,
            date(2026, 4, 1),
            date(2026, 4, 10),
            "10",
        ))
        .unwrap();
    let err = engine
        .submit(application(
            "emp_001",
            LeaveType::Maternity,
            date(2026, 9, 1),
            date(2026, 9, 10),
            "10",
        ))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[test]
fn test_region_without_leave_type_is_ineligible() {
    let fixture = create_fixture(create_test_employees());
    let engine = create_engine(&fixture);

    let result = engine
        .check_eligibility("us_emp", LeaveType::CompOff, date(2026, 4, 1), date(2026, 4, 1))
        .unwrap();
    assert!(!result.eligible);
}

// =============================================================================
// Notifications
// =============================================================================

#[test]
fn test_failed_notification_is_retried_by_dispatcher() {
    let fixture = create_fixture(create_test_employees());
    let transport = Arc::new(RecordingNotifier::new());
    transport.set_failing(true);
    let dispatcher = Arc::new(NotificationDispatcher::new(
        transport.clone(),
        Arc::new(InMemoryPreferences::new()),
        fixture.clock.clone(),
        Default::default(),
    ));
    let mut ctx = fixture.context();
    ctx.notifier = dispatcher.clone();
    let engine = LeaveEngine::from_dir(CONFIG_DIR, ctx).unwrap();
    credit(&fixture, "emp_001", LeaveType::Casual, 2026, "1");

    let submission = engine
        .submit(application(
            "emp_001",
            LeaveType::Casual,
            date(2026, 3, 18),
            date(2026, 3, 18),
            "1",
        ))
        .unwrap();
    assert!(submission.warnings.is_empty());
    assert_eq!(dispatcher.pending(), 1);

    transport.set_failing(false);
    assert_eq!(dispatcher.retry_due().delivered, 0);

    fixture.clock.advance(Duration::seconds(60));
    let summary = dispatcher.retry_due();
    assert_eq!(summary.delivered, 1);
    assert_eq!(dispatcher.pending(), 0);
    assert_eq!(
        transport.sent_to("mgr_001")[0].event,
        NotificationEvent::ApprovalRequested
    );
}
