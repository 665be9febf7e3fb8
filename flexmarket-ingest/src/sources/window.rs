use std::fmt;

use time::{util::days_in_year_month, Date, Month};

/// A half-open calendar range `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateWindow {
    pub start: Date,
    pub end: Date,
}

impl DateWindow {
    /// Partition `[start, end)` into contiguous windows of `months` calendar
    /// months each. The last window is cut short at `end`.
    pub fn split(start: Date, end: Date, months: u32) -> Vec<DateWindow> {
        let mut windows = Vec::new();
        let mut cursor = start;
        while cursor < end {
            let next = add_months(cursor, months.max(1)).map_or(end, |d| d.min(end));
            windows.push(DateWindow { start: cursor, end: next });
            cursor = next;
        }
        windows
    }
}

impl fmt::Display for DateWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

/// Add calendar months, clamping the day to the target month's length.
/// `None` when the result falls outside the representable calendar.
fn add_months(date: Date, months: u32) -> Option<Date> {
    let zero_based = i64::from(date.year()) * 12 + i64::from(u8::from(date.month())) - 1;
    let zero_based = zero_based.checked_add(i64::from(months))?;
    let year = i32::try_from(zero_based.div_euclid(12)).ok()?;
    let month = Month::try_from(u8::try_from(zero_based.rem_euclid(12) + 1).ok()?).ok()?;
    let day = date.day().min(days_in_year_month(year, month));
    Date::from_calendar_date(year, month, day).ok()
}
