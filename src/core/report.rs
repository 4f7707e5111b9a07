//! Spending reports over a list of expenses.
//!
//! Everything here is pure: callers pass the expenses they already hold (for
//! example the latest snapshot of a live expense list) together with the time
//! zone the calendar should be drawn in. Expense dates are stored in UTC, so
//! the same expense may fall on different calendar days for different zones.

use crate::{
    models::{Category, Expense},
    money::Money,
};
use chrono::{Datelike, NaiveDate, TimeZone};
use std::collections::{BTreeMap, BTreeSet};

/// The local calendar day an expense falls on.
pub fn local_day<Tz: TimeZone>(expense: &Expense, tz: &Tz) -> NaiveDate {
    expense.date.with_timezone(tz).date_naive()
}

/// Buckets expenses by local calendar day. Each bucket is newest first.
pub fn group_by_day<Tz: TimeZone>(expenses: &[Expense], tz: &Tz) -> BTreeMap<NaiveDate, Vec<Expense>> {
    let mut days: BTreeMap<NaiveDate, Vec<Expense>> = BTreeMap::new();
    for expense in expenses {
        days.entry(local_day(expense, tz))
            .or_default()
            .push(expense.clone());
    }
    for bucket in days.values_mut() {
        bucket.sort_by(|a, b| b.date.cmp(&a.date));
    }
    days
}

/// Days of `month` in `year` with at least one expense.
///
/// An out of range month simply yields an empty set.
pub fn days_with_expenses<Tz: TimeZone>(
    expenses: &[Expense],
    tz: &Tz,
    year: i32,
    month: u32,
) -> BTreeSet<NaiveDate> {
    expenses
        .iter()
        .map(|expense| local_day(expense, tz))
        .filter(|day| day.year() == year && day.month() == month)
        .collect()
}

/// The expenses of one local day, newest first.
pub fn expenses_on<Tz: TimeZone>(expenses: &[Expense], tz: &Tz, day: NaiveDate) -> Vec<Expense> {
    let mut on_day: Vec<Expense> = expenses
        .iter()
        .filter(|expense| local_day(expense, tz) == day)
        .cloned()
        .collect();
    on_day.sort_by(|a, b| b.date.cmp(&a.date));
    on_day
}

/// Sum of all amounts.
#[must_use]
pub fn total_spent(expenses: &[Expense]) -> Money {
    expenses.iter().map(|expense| expense.amount).sum()
}

/// Per-category sums. Categories without expenses are absent.
#[must_use]
pub fn category_totals(expenses: &[Expense]) -> BTreeMap<Category, Money> {
    let mut totals = BTreeMap::new();
    for expense in expenses {
        *totals.entry(expense.category).or_insert(Money::ZERO) += expense.amount;
    }
    totals
}

/// Spending of one calendar month.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonthSummary {
    /// Calendar year
    pub year: i32,
    /// Month, 1 to 12
    pub month: u32,
    /// Number of expenses in the month
    pub count: usize,
    /// Sum of all amounts in the month
    pub total: Money,
    /// Per-category sums
    pub by_category: BTreeMap<Category, Money>,
    /// Per-day sums, keyed by local date
    pub by_day: BTreeMap<NaiveDate, Money>,
}

impl MonthSummary {
    /// Summarizes the expenses that fall in `year`/`month` in zone `tz`.
    pub fn for_month<Tz: TimeZone>(expenses: &[Expense], tz: &Tz, year: i32, month: u32) -> Self {
        let in_month: Vec<Expense> = expenses
            .iter()
            .filter(|expense| {
                let day = local_day(expense, tz);
                day.year() == year && day.month() == month
            })
            .cloned()
            .collect();

        let by_day = group_by_day(&in_month, tz)
            .into_iter()
            .map(|(day, bucket)| (day, total_spent(&bucket)))
            .collect();

        Self {
            year,
            month,
            count: in_month.len(),
            total: total_spent(&in_month),
            by_category: category_totals(&in_month),
            by_day,
        }
    }

    /// Category holding the largest share, ties going to the first in
    /// category order.
    #[must_use]
    pub fn top_category(&self) -> Option<(Category, Money)> {
        self.by_category
            .iter()
            .fold(None, |best: Option<(Category, Money)>, (&category, &amount)| match best {
                Some((_, top)) if top >= amount => best,
                _ => Some((category, amount)),
            })
    }
}
