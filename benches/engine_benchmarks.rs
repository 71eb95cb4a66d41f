//! Performance benchmarks for the Leave Governance Engine.
//!
//! - Policy resolution with role overrides
//! - Comp-off work date classification
//! - Monthly accrual over 100 and 1000 employees
//!
//! Run with: `cargo bench`
//! HTML reports are generated in `target/criterion/`

use std::str::FromStr;

use chrono::NaiveDate;
use criterion::{
    black_box, criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion, Throughput,
};
use rust_decimal::Decimal;

use leave_engine::comp_off::CompOffConverter;
use leave_engine::config::ConfigLoader;
use leave_engine::context::InMemoryContext;
use leave_engine::engine::LeaveEngine;
use leave_engine::models::{
    Employee, EmployeeStatus, Gender, Holiday, LeaveType, MaritalStatus, Region, Role,
};

const CONFIG_DIR: &str = "./config/leave_policy";

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Creates `count` India employees reporting to one manager, with joining
/// days spread across the month so some credits are pro-rated.
fn create_employees(count: usize) -> Vec<Employee> {
    (0..count)
        .map(|i| Employee {
            id: format!("emp_bench_{:04}", i),
            region: Region::India,
            role: Role::Employee,
            reporting_manager_id: Some("mgr_bench".to_string()),
            gender: if i % 2 == 0 { Gender::Female } else { Gender::Male },
            marital_status: MaritalStatus::Single,
            joining_date: date(2026, 1, (i % 28) as u32 + 1),
            status: EmployeeStatus::Active,
        })
        .collect()
}

/// Benchmark: Policy resolution, with and without a role override.
fn bench_policy_resolution(c: &mut Criterion) {
    let loader = ConfigLoader::load(CONFIG_DIR).expect("Failed to load config");
    let policies = loader.policies();

    let mut group = c.benchmark_group("policy_resolution");
    for (name, region, leave_type, role) in [
        ("india_pl_employee", Region::India, LeaveType::Privilege, Role::Employee),
        ("india_pl_vp", Region::India, LeaveType::Privilege, Role::Vp),
        ("us_pto_director", Region::Us, LeaveType::Pto, Role::Director),
    ] {
        group.bench_function(name, |b| {
            b.iter(|| black_box(policies.resolve(region, leave_type, role)))
        });
    }
    group.finish();
}

/// Benchmark: Comp-off validation for weekend, holiday and weekday work.
fn bench_comp_off_validation(c: &mut Criterion) {
    let fixture = InMemoryContext::new(
        vec![],
        vec![Holiday {
            date: date(2026, 3, 4),
            name: "Holi".to_string(),
            region: Region::India,
        }],
        date(2026, 3, 10),
    );
    let ctx = fixture.context();
    let converter = CompOffConverter::new(
        Default::default(),
        ctx.holidays.clone(),
        ctx.clock.clone(),
    );
    let hours = Decimal::from_str("6").unwrap();

    let mut group = c.benchmark_group("comp_off_validation");
    for (name, work_date) in [
        ("saturday", date(2026, 3, 7)),
        ("holiday", date(2026, 3, 4)),
        ("weekday", date(2026, 3, 9)),
    ] {
        group.bench_function(name, |b| {
            b.iter(|| black_box(converter.validate(work_date, hours, Region::India)))
        });
    }
    group.finish();
}

/// Benchmark: One monthly accrual run over a fresh store.
///
/// Each iteration starts from an empty store, since a completed period is
/// refused on re-run.
fn bench_monthly_accrual(c: &mut Criterion) {
    let mut group = c.benchmark_group("monthly_accrual");
    group.sample_size(10);

    for count in [100usize, 1000] {
        let employees = create_employees(count);
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), &employees, |b, employees| {
            b.iter_batched(
                || {
                    let fixture = InMemoryContext::new(employees.clone(), vec![], date(2026, 2, 1));
                    let engine = LeaveEngine::from_dir(CONFIG_DIR, fixture.context())
                        .expect("Failed to load config");
                    (fixture, engine)
                },
                |(_fixture, engine)| black_box(engine.run_monthly_accrual(2026, 1).unwrap()),
                BatchSize::PerIteration,
            )
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_policy_resolution,
    bench_comp_off_validation,
    bench_monthly_accrual,
);
criterion_main!(benches);
