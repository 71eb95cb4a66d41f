//! Declared holidays.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::Region;

/// A declared holiday for one region.
///
/// # Example
///
/// ```
/// use leave_engine::models::{Holiday, Region};
/// use chrono::NaiveDate;
///
/// let holiday = Holiday {
///     date: NaiveDate::from_ymd_opt(2026, 1, 26).unwrap(),
///     name: "Republic Day".to_string(),
///     region: Region::India,
/// };
/// assert!(holiday.applies_to(Region::India));
/// assert!(!holiday.applies_to(Region::Us));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Holiday {
    /// The date of the holiday.
    pub date: NaiveDate,
    /// The name of the holiday.
    pub name: String,
    /// The region observing the holiday.
    pub region: Region,
}

impl Holiday {
    /// Returns true if the holiday is observed in `region`.
    pub fn applies_to(&self, region: Region) -> bool {
        self.region == region
    }
}
