//! Compensatory leave earned by weekend and holiday work.
//!
//! [`CompOffConverter`] classifies a work date and converts hours to days;
//! [`CompOffService`] stores work logs and credits the COMP_OFF balance once
//! the employee's manager verifies them.

mod converter;
mod service;

pub use converter::{
    calculate_comp_off_days, CompOffConverter, CompOffDays, CompOffValidation, MAX_HOURS_PER_DAY,
};
pub use service::{CompOffService, WorkLogDecision, WorkLogSubmission};
