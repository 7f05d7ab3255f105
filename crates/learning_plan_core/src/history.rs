//! crates/learning_plan_core/src/history.rs
//!
//! Local filtering of the application list by start date and status.

use chrono::{Datelike, NaiveDate};

use crate::domain::{ApplicationStatus, ApplicationSummary};

/// Year, month and day are kept as typed. Each is matched against the
/// unpadded date component, so month `3` matches March and `03` does not.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HistoryFilter {
    year: String,
    month: String,
    day: String,
    pub status: Option<ApplicationStatus>,
}

fn digits_only(value: &str) -> bool {
    value.chars().all(|c| c.is_ascii_digit())
}

impl HistoryFilter {
    pub fn year(&self) -> &str {
        &self.year
    }

    pub fn month(&self) -> &str {
        &self.month
    }

    pub fn day(&self) -> &str {
        &self.day
    }

    /// Ignores input containing anything but digits. Returns whether it was taken.
    pub fn set_year(&mut self, value: &str) -> bool {
        Self::set_digits(&mut self.year, value)
    }

    pub fn set_month(&mut self, value: &str) -> bool {
        Self::set_digits(&mut self.month, value)
    }

    pub fn set_day(&mut self, value: &str) -> bool {
        Self::set_digits(&mut self.day, value)
    }

    fn set_digits(slot: &mut String, value: &str) -> bool {
        if !digits_only(value) {
            return false;
        }
        *slot = value.to_string();
        true
    }

    pub fn matches(&self, application: &ApplicationSummary) -> bool {
        if self.status.is_some_and(|status| status != application.status) {
            return false;
        }
        if self.year.is_empty() && self.month.is_empty() && self.day.is_empty() {
            return true;
        }
        // An unparseable date never matches a date filter.
        let Some(date) = start_date(&application.apply_date_start) else {
            return false;
        };
        component(&self.year, date.year())
            && component(&self.month, date.month())
            && component(&self.day, date.day())
    }

    pub fn apply<'a>(&self, applications: &'a [ApplicationSummary]) -> Vec<&'a ApplicationSummary> {
        applications.iter().filter(|a| self.matches(a)).collect()
    }
}

fn component(filter: &str, actual: impl ToString) -> bool {
    filter.is_empty() || filter == actual.to_string()
}

/// Parses the date part of `2025-03-14`, `2025-03-14 08:00` or `2025-03-14T08:00:00`.
fn start_date(raw: &str) -> Option<NaiveDate> {
    let date = raw.trim().split([' ', 'T']).next()?;
    NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()
}
