//! Weekend and holiday work classification and hours-to-days conversion.

use std::sync::Arc;

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::config::CompOffSettings;
use crate::models::{Region, WorkType};
use crate::store::{Clock, HolidayCalendar};

/// Upper bound on hours that can be logged for one day.
pub const MAX_HOURS_PER_DAY: Decimal = Decimal::from_parts(24, 0, 0, false, 0);

/// The result of validating a comp-off work entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompOffValidation {
    /// True if the entry earns comp-off.
    pub eligible: bool,
    /// Comp-off hours earned; zero when ineligible.
    pub comp_off_hours: Decimal,
    /// How the work date was classified.
    pub work_type: WorkType,
    /// Why the entry is ineligible.
    pub errors: Vec<String>,
}

impl CompOffValidation {
    fn ineligible(work_type: WorkType, errors: Vec<String>) -> Self {
        Self {
            eligible: false,
            comp_off_hours: Decimal::ZERO,
            work_type,
            errors,
        }
    }
}

/// Comp-off hours broken down into creditable days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompOffDays {
    /// Whole days earned.
    pub full_days: Decimal,
    /// 1 if the leftover hours earned a half day, else 0.
    pub half_days: u32,
    /// Days posted to the COMP_OFF balance.
    pub total_days: Decimal,
    /// Hours left over; not separately creditable.
    pub remaining_hours: Decimal,
}

/// Converts comp-off hours into days.
///
/// Whole multiples of `hours_per_day` become full days. If the remainder
/// reaches `half_day_hours` it earns one half day and `half_day_hours` is
/// taken off the remainder. Whatever is left is reported but not credited.
///
/// # Example
///
/// ```
/// use leave_engine::comp_off::calculate_comp_off_days;
/// use leave_engine::config::CompOffSettings;
/// use rust_decimal::Decimal;
///
/// let days = calculate_comp_off_days(Decimal::new(6, 0), &CompOffSettings::default());
/// assert_eq!(days.full_days, Decimal::ZERO);
/// assert_eq!(days.half_days, 1);
/// assert_eq!(days.total_days, Decimal::new(5, 1));
/// assert_eq!(days.remaining_hours, Decimal::ONE);
/// ```
pub fn calculate_comp_off_days(comp_off_hours: Decimal, settings: &CompOffSettings) -> CompOffDays {
    let hours = comp_off_hours.max(Decimal::ZERO);
    let full_days = (hours / settings.hours_per_day).floor();
    let mut remaining_hours = hours - full_days * settings.hours_per_day;

    let half_days = if remaining_hours >= settings.half_day_hours {
        remaining_hours -= settings.half_day_hours;
        1
    } else {
        0
    };

    CompOffDays {
        full_days,
        half_days,
        total_days: full_days + Decimal::new(5, 1) * Decimal::from(half_days),
        remaining_hours,
    }
}

/// Decides whether a day's work earns comp-off.
///
/// Input checks come first (hours in `(0, 24]`, date not in the future and
/// within the staleness window). The date is then classified: weekends
/// before holidays, anything else as extended hours. Only weekend and
/// holiday work with at least `min_hours` earns comp-off, at `rate` hours
/// per hour worked.
pub struct CompOffConverter {
    settings: CompOffSettings,
    holidays: Arc<dyn HolidayCalendar>,
    clock: Arc<dyn Clock>,
}

impl CompOffConverter {
    /// Creates a converter.
    pub fn new(
        settings: CompOffSettings,
        holidays: Arc<dyn HolidayCalendar>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            settings,
            holidays,
            clock,
        }
    }

    /// The conversion settings.
    pub fn settings(&self) -> &CompOffSettings {
        &self.settings
    }

    /// Validates one work entry for an employee in `region`.
    ///
    /// # Example
    ///
    /// ```
    /// use std::sync::Arc;
    ///
    /// use chrono::NaiveDate;
    /// use leave_engine::comp_off::CompOffConverter;
    /// use leave_engine::config::CompOffSettings;
    /// use leave_engine::models::{Region, WorkType};
    /// use leave_engine::store::{FixedClock, HolidayList};
    /// use rust_decimal::Decimal;
    ///
    /// let converter = CompOffConverter::new(
    ///     CompOffSettings::default(),
    ///     Arc::new(HolidayList::new(vec![])),
    ///     Arc::new(FixedClock::on(NaiveDate::from_ymd_opt(2026, 3, 9).unwrap())),
    /// );
    ///
    /// // 2026-03-07 is a Saturday
    /// let saturday = NaiveDate::from_ymd_opt(2026, 3, 7).unwrap();
    /// let result = converter.validate(saturday, Decimal::new(6, 0), Region::India);
    /// assert!(result.eligible);
    /// assert_eq!(result.work_type, WorkType::Weekend);
    /// assert_eq!(result.comp_off_hours, Decimal::new(6, 0));
    /// ```
    pub fn validate(
        &self,
        work_date: NaiveDate,
        hours_worked: Decimal,
        region: Region,
    ) -> CompOffValidation {
        let today = self.clock.today();
        let mut errors = Vec::new();

        if hours_worked <= Decimal::ZERO || hours_worked > MAX_HOURS_PER_DAY {
            errors.push(format!(
                "hours worked must be greater than 0 and at most {}, got {}",
                MAX_HOURS_PER_DAY, hours_worked
            ));
        }
        if work_date > today {
            errors.push(format!("work date {} is in the future", work_date));
        } else if Duration::try_days(self.settings.staleness_days)
            .and_then(|window| today.checked_sub_signed(window))
            .is_some_and(|oldest| work_date < oldest)
        {
            errors.push(format!(
                "work date {} is more than {} days old",
                work_date, self.settings.staleness_days
            ));
        }
        if !errors.is_empty() {
            return CompOffValidation::ineligible(WorkType::Invalid, errors);
        }

        let (work_type, label) = if is_weekend(work_date) {
            (WorkType::Weekend, "weekend")
        } else if self.holidays.is_holiday(work_date, region) {
            (WorkType::Holiday, "holiday")
        } else {
            return CompOffValidation::ineligible(
                WorkType::ExtendedHours,
                vec![format!(
                    "{} is a working day; comp-off is only earned for weekend or holiday work",
                    work_date
                )],
            );
        };

        if hours_worked < self.settings.min_hours {
            return CompOffValidation::ineligible(
                work_type,
                vec![format!(
                    "at least {} hours of {} work are required, got {}",
                    self.settings.min_hours, label, hours_worked
                )],
            );
        }

        CompOffValidation {
            eligible: true,
            comp_off_hours: hours_worked * self.settings.rate,
            work_type,
            errors: Vec::new(),
        }
    }

    /// Converts earned hours into days using the configured day lengths.
    pub fn calculate_days(&self, comp_off_hours: Decimal) -> CompOffDays {
        calculate_comp_off_days(comp_off_hours, &self.settings)
    }
}

fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}
