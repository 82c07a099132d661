//! Display rules for task cards: relative due dates, the overdue flag and priority colours.

use chrono::{DateTime, NaiveDate, Utc};
use std::fmt;

use crate::task::{Priority, Task};

const MILLIS_PER_DAY: i64 = 24 * 60 * 60 * 1000;

/// A due date described relative to "now".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DueLabel {
    Today,
    Tomorrow,
    Yesterday,
    /// Due this many days ago, always more than one.
    Overdue(i64),
    /// Due in this many days, between two and seven.
    InDays(i64),
    /// Too far out for a relative label.
    On(NaiveDate),
}

impl fmt::Display for DueLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DueLabel::Today => f.write_str("Today"),
            DueLabel::Tomorrow => f.write_str("Tomorrow"),
            DueLabel::Yesterday => f.write_str("Yesterday"),
            DueLabel::Overdue(days) => write!(f, "{} days overdue", days),
            DueLabel::InDays(days) => write!(f, "In {} days", days),
            DueLabel::On(date) => write!(f, "{}", date.format("%-m/%-d/%Y")),
        }
    }
}

/// Whole days from `now` until `due`, rounded up.
pub fn day_offset(due: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    let millis = (due - now).num_milliseconds();
    let days = millis / MILLIS_PER_DAY;
    // Integer division truncates toward zero, which is already the ceiling for negatives.
    if millis % MILLIS_PER_DAY > 0 {
        days + 1
    } else {
        days
    }
}

/// Describes `due` relative to `now`.
pub fn format_due_date(due: DateTime<Utc>, now: DateTime<Utc>) -> DueLabel {
    match day_offset(due, now) {
        0 => DueLabel::Today,
        1 => DueLabel::Tomorrow,
        -1 => DueLabel::Yesterday,
        days if days < 0 => DueLabel::Overdue(-days),
        days if days <= 7 => DueLabel::InDays(days),
        _ => DueLabel::On(due.date_naive()),
    }
}

/// A task is overdue when its due date has passed and it is still open.
pub fn is_overdue(task: &Task, now: DateTime<Utc>) -> bool {
    !task.completed && task.due_date.is_some_and(|due| due < now)
}

/// Badge colour classes for a priority.
pub fn priority_classes(priority: Priority) -> &'static str {
    match priority {
        Priority::High => "text-red-600 bg-red-50 border-red-200",
        Priority::Medium => "text-yellow-600 bg-yellow-50 border-yellow-200",
        Priority::Low => "text-green-600 bg-green-50 border-green-200",
    }
}

/// Calendar date in `M/D/YYYY` form.
pub fn short_date(moment: DateTime<Utc>) -> String {
    moment.format("%-m/%-d/%Y").to_string()
}
