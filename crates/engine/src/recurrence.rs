//! Next-occurrence calculation for recurring transactions.
//!
//! Everything here is pure date arithmetic: no I/O, no clock, no state. The
//! same function computes `next_due` when a recurring transaction is created
//! and when the processor reschedules it.
//!
//! Rules:
//! - a schedule never fires before its start date: if `start_date` is after
//!   the reference, the start date is the next occurrence;
//! - `daily` and `custom` add `frequency` days;
//! - `weekly`/`biweekly` add `frequency` cycles of one/two weeks, landing on
//!   `day_of_week` when given ("today is the day" still advances a full
//!   cycle);
//! - `monthly`/`quarterly` add `frequency` (or `3 * frequency`) months and
//!   pin `day_of_month`, clamped to the month length;
//! - `yearly` adds `frequency` years and, when both `month_of_year` and
//!   `day_of_month` are given, pins them with the same clamping;
//! - an unrecognized tag advances one month.
//!
//! The time of day of the reference is preserved. Results that would
//! overflow the calendar saturate to the largest representable instant.

use chrono::{DateTime, Datelike, Months, NaiveDate, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::{EngineError, RecurType, ResultEngine};

/// The shape of a recurring schedule, without its anchor dates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schedule {
    pub recur_type: RecurType,
    pub frequency: u32,
    /// 0 = Sunday .. 6 = Saturday.
    pub day_of_week: Option<u32>,
    /// 1..=31.
    pub day_of_month: Option<u32>,
    /// 1..=12.
    pub month_of_year: Option<u32>,
}

impl Schedule {
    #[must_use]
    pub fn new(recur_type: RecurType, frequency: u32) -> Self {
        Self {
            recur_type,
            frequency,
            day_of_week: None,
            day_of_month: None,
            month_of_year: None,
        }
    }

    #[must_use]
    pub fn day_of_week(mut self, day: u32) -> Self {
        self.day_of_week = Some(day);
        self
    }

    #[must_use]
    pub fn day_of_month(mut self, day: u32) -> Self {
        self.day_of_month = Some(day);
        self
    }

    #[must_use]
    pub fn month_of_year(mut self, month: u32) -> Self {
        self.month_of_year = Some(month);
        self
    }

    /// Range checks applied whenever a user creates or edits a schedule.
    pub fn validate(&self) -> ResultEngine<()> {
        if self.recur_type == RecurType::Unrecognized {
            return Err(EngineError::InvalidSchedule(
                "unrecognized recurrence type".to_string(),
            ));
        }
        if self.frequency == 0 {
            return Err(EngineError::InvalidSchedule(
                "frequency must be >= 1".to_string(),
            ));
        }
        if i32::try_from(self.frequency).is_err() {
            return Err(EngineError::InvalidSchedule(format!(
                "frequency must be <= {}",
                i32::MAX
            )));
        }
        if self.day_of_week.is_some_and(|day| day > 6) {
            return Err(EngineError::InvalidSchedule(
                "day_of_week must be in 0..=6".to_string(),
            ));
        }
        if self.day_of_month.is_some_and(|day| !(1..=31).contains(&day)) {
            return Err(EngineError::InvalidSchedule(
                "day_of_month must be in 1..=31".to_string(),
            ));
        }
        if self.month_of_year.is_some_and(|month| !(1..=12).contains(&month)) {
            return Err(EngineError::InvalidSchedule(
                "month_of_year must be in 1..=12".to_string(),
            ));
        }
        Ok(())
    }

    /// Next occurrence after `reference` for a schedule starting at
    /// `start_date`.
    #[must_use]
    pub fn next_due(&self, reference: DateTime<Utc>, start_date: DateTime<Utc>) -> DateTime<Utc> {
        next_due(
            reference,
            start_date,
            self.recur_type,
            self.frequency,
            self.day_of_week,
            self.day_of_month,
            self.month_of_year,
        )
    }
}

/// Computes the next due instant. See the module docs for the rules.
#[must_use]
pub fn next_due(
    reference: DateTime<Utc>,
    start_date: DateTime<Utc>,
    recur_type: RecurType,
    frequency: u32,
    day_of_week: Option<u32>,
    day_of_month: Option<u32>,
    month_of_year: Option<u32>,
) -> DateTime<Utc> {
    if start_date > reference {
        return start_date;
    }

    let frequency = frequency.max(1);
    match recur_type {
        RecurType::Daily | RecurType::Custom => add_days(reference, i64::from(frequency)),
        RecurType::Weekly => advance_weeks(reference, frequency, 1, day_of_week),
        RecurType::Biweekly => advance_weeks(reference, frequency, 2, day_of_week),
        RecurType::Monthly => advance_months(reference, frequency, day_of_month),
        RecurType::Quarterly => {
            advance_months(reference, frequency.saturating_mul(3), day_of_month)
        }
        RecurType::Yearly => advance_years(reference, frequency, month_of_year, day_of_month),
        RecurType::Unrecognized => add_months(reference, 1),
    }
}

fn add_days(at: DateTime<Utc>, days: i64) -> DateTime<Utc> {
    TimeDelta::try_days(days)
        .and_then(|delta| at.checked_add_signed(delta))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Adds calendar months; chrono clamps the day to the target month length.
fn add_months(at: DateTime<Utc>, months: u32) -> DateTime<Utc> {
    at.checked_add_months(Months::new(months))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

fn advance_weeks(
    reference: DateTime<Utc>,
    frequency: u32,
    unit_weeks: i64,
    day_of_week: Option<u32>,
) -> DateTime<Utc> {
    let cycle_days = 7 * unit_weeks * i64::from(frequency);
    let days = match day_of_week {
        None => cycle_days,
        Some(target) => {
            let current = i64::from(reference.weekday().num_days_from_sunday());
            let offset = (i64::from(target % 7) - current + 7) % 7;
            if offset == 0 {
                cycle_days
            } else {
                // Land on the weekday inside the last week of the cycle.
                offset + cycle_days - 7
            }
        }
    };
    add_days(reference, days)
}

fn advance_months(reference: DateTime<Utc>, months: u32, day_of_month: Option<u32>) -> DateTime<Utc> {
    let advanced = add_months(reference, months);
    match day_of_month {
        Some(day) => with_date_clamped(advanced, advanced.year(), advanced.month(), day),
        None => advanced,
    }
}

fn advance_years(
    reference: DateTime<Utc>,
    years: u32,
    month_of_year: Option<u32>,
    day_of_month: Option<u32>,
) -> DateTime<Utc> {
    let advanced = add_months(reference, years.saturating_mul(12));
    match (month_of_year, day_of_month) {
        (Some(month), Some(day)) => {
            with_date_clamped(advanced, advanced.year(), month.clamp(1, 12), day)
        }
        _ => advanced,
    }
}

/// Moves `at` to `year-month-day` keeping its time, clamping `day` to the
/// month length.
fn with_date_clamped(at: DateTime<Utc>, year: i32, month: u32, day: u32) -> DateTime<Utc> {
    if at == DateTime::<Utc>::MAX_UTC {
        return at;
    }
    let day = day.clamp(1, days_in_month(year, month));
    NaiveDate::from_ymd_opt(year, month, day)
        .map(|date| date.and_time(at.time()).and_utc())
        .unwrap_or(at)
}

pub(crate) fn days_in_month(year: i32, month: u32) -> u32 {
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|first_next| first_next.pred_opt())
        .map_or(28, |last| last.day())
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Weekday};

    use super::*;

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 10, 0, 0).unwrap()
    }

    fn long_ago() -> DateTime<Utc> {
        at(2000, 1, 1)
    }

    #[test]
    fn start_in_future_is_returned_as_is() {
        let reference = at(2024, 5, 1);
        let start = at(2024, 6, 15);
        for recur_type in [
            RecurType::Daily,
            RecurType::Weekly,
            RecurType::Monthly,
            RecurType::Yearly,
            RecurType::Unrecognized,
        ] {
            let next = next_due(reference, start, recur_type, 3, Some(2), Some(31), Some(2));
            assert_eq!(next, start);
        }
    }

    #[test]
    fn start_equal_to_reference_advances() {
        let reference = at(2024, 5, 1);
        let next = next_due(reference, reference, RecurType::Daily, 1, None, None, None);
        assert_eq!(next, at(2024, 5, 2));
    }

    #[test]
    fn daily_and_custom_add_frequency_days() {
        let reference = at(2024, 2, 27);
        assert_eq!(
            Schedule::new(RecurType::Daily, 3).next_due(reference, long_ago()),
            at(2024, 3, 1)
        );
        assert_eq!(
            Schedule::new(RecurType::Custom, 3).next_due(reference, long_ago()),
            at(2024, 3, 1)
        );
    }

    #[test]
    fn weekly_on_the_anchor_day_jumps_a_full_week() {
        // 2024-01-03 is a Wednesday.
        let reference = at(2024, 1, 3);
        assert_eq!(reference.weekday(), Weekday::Wed);
        let next = Schedule::new(RecurType::Weekly, 1)
            .day_of_week(3)
            .next_due(reference, long_ago());
        assert_eq!(next, at(2024, 1, 10));
    }

    #[test]
    fn weekly_moves_forward_to_the_anchor_weekday() {
        // Wednesday -> next Friday.
        let next = Schedule::new(RecurType::Weekly, 1)
            .day_of_week(5)
            .next_due(at(2024, 1, 3), long_ago());
        assert_eq!(next, at(2024, 1, 5));
        assert_eq!(next.weekday(), Weekday::Fri);

        // Wednesday -> Monday wraps into next week.
        let next = Schedule::new(RecurType::Weekly, 1)
            .day_of_week(1)
            .next_due(at(2024, 1, 3), long_ago());
        assert_eq!(next, at(2024, 1, 8));
    }

    #[test]
    fn weekly_anchor_with_frequency_adds_remaining_cycles() {
        // Wednesday, every 2 weeks on Friday: Friday of the following week.
        let next = Schedule::new(RecurType::Weekly, 2)
            .day_of_week(5)
            .next_due(at(2024, 1, 3), long_ago());
        assert_eq!(next, at(2024, 1, 12));
        assert_eq!(next.weekday(), Weekday::Fri);

        // Wednesday, every 2 weeks on Monday.
        let next = Schedule::new(RecurType::Weekly, 2)
            .day_of_week(1)
            .next_due(at(2024, 1, 3), long_ago());
        assert_eq!(next, at(2024, 1, 15));

        // On the anchor day the whole two-week cycle is skipped.
        let next = Schedule::new(RecurType::Weekly, 2)
            .day_of_week(3)
            .next_due(at(2024, 1, 3), long_ago());
        assert_eq!(next, at(2024, 1, 17));

        // Biweekly twice over: four weeks minus the final partial week.
        let next = Schedule::new(RecurType::Biweekly, 2)
            .day_of_week(5)
            .next_due(at(2024, 1, 3), long_ago());
        assert_eq!(next, at(2024, 1, 26));
    }

    #[test]
    fn weekly_without_anchor_adds_whole_weeks() {
        let next = Schedule::new(RecurType::Weekly, 2).next_due(at(2024, 1, 3), long_ago());
        assert_eq!(next, at(2024, 1, 17));
    }

    #[test]
    fn biweekly_doubles_the_cycle() {
        let reference = at(2024, 1, 3);
        assert_eq!(
            Schedule::new(RecurType::Biweekly, 1).next_due(reference, long_ago()),
            at(2024, 1, 17)
        );
        assert_eq!(
            Schedule::new(RecurType::Biweekly, 1)
                .day_of_week(3)
                .next_due(reference, long_ago()),
            at(2024, 1, 17)
        );
        let next = Schedule::new(RecurType::Biweekly, 1)
            .day_of_week(5)
            .next_due(reference, long_ago());
        assert_eq!(next, at(2024, 1, 12));
        assert_eq!(next.weekday(), Weekday::Fri);
    }

    #[test]
    fn monthly_day_31_clamps_into_february() {
        let leap = Schedule::new(RecurType::Monthly, 1)
            .day_of_month(31)
            .next_due(at(2024, 1, 31), long_ago());
        assert_eq!(leap, at(2024, 2, 29));

        let common = Schedule::new(RecurType::Monthly, 1)
            .day_of_month(31)
            .next_due(at(2023, 1, 31), long_ago());
        assert_eq!(common, at(2023, 2, 28));
    }

    #[test]
    fn monthly_anchor_recovers_after_short_month() {
        let next = Schedule::new(RecurType::Monthly, 1)
            .day_of_month(31)
            .next_due(at(2023, 2, 28), long_ago());
        assert_eq!(next, at(2023, 3, 31));
    }

    #[test]
    fn monthly_without_anchor_never_overflows_into_next_month() {
        let next = Schedule::new(RecurType::Monthly, 1).next_due(at(2023, 1, 31), long_ago());
        assert_eq!(next, at(2023, 2, 28));
    }

    #[test]
    fn quarterly_adds_three_months_per_step() {
        let next = Schedule::new(RecurType::Quarterly, 2)
            .day_of_month(15)
            .next_due(at(2024, 1, 20), long_ago());
        assert_eq!(next, at(2024, 7, 15));
    }

    #[test]
    fn yearly_feb_29_clamps_in_common_years() {
        let next = Schedule::new(RecurType::Yearly, 1)
            .month_of_year(2)
            .day_of_month(29)
            .next_due(at(2024, 2, 29), long_ago());
        assert_eq!(next, at(2025, 2, 28));

        let next = Schedule::new(RecurType::Yearly, 1)
            .month_of_year(2)
            .day_of_month(29)
            .next_due(at(2023, 3, 10), long_ago());
        assert_eq!(next, at(2024, 2, 29));
    }

    #[test]
    fn yearly_without_both_anchors_keeps_the_date() {
        let next = Schedule::new(RecurType::Yearly, 2)
            .day_of_month(5)
            .next_due(at(2024, 6, 20), long_ago());
        assert_eq!(next, at(2026, 6, 20));
    }

    #[test]
    fn unrecognized_advances_one_month() {
        let next = Schedule::new(RecurType::Unrecognized, 7).next_due(at(2024, 1, 15), long_ago());
        assert_eq!(next, at(2024, 2, 15));
    }

    #[test]
    fn zero_frequency_behaves_as_one() {
        let next = Schedule::new(RecurType::Daily, 0).next_due(at(2024, 1, 15), long_ago());
        assert_eq!(next, at(2024, 1, 16));
    }

    #[test]
    fn time_of_day_is_preserved() {
        let reference = Utc.with_ymd_and_hms(2024, 1, 31, 23, 45, 12).unwrap();
        let next = Schedule::new(RecurType::Monthly, 1)
            .day_of_month(31)
            .next_due(reference, long_ago());
        assert_eq!(next, Utc.with_ymd_and_hms(2024, 2, 29, 23, 45, 12).unwrap());
    }

    #[test]
    fn calculation_is_deterministic() {
        let schedule = Schedule::new(RecurType::Monthly, 1).day_of_month(30);
        let reference = at(2024, 1, 30);
        assert_eq!(
            schedule.next_due(reference, long_ago()),
            schedule.next_due(reference, long_ago())
        );
    }

    #[test]
    fn far_future_saturates_instead_of_panicking() {
        let next = Schedule::new(RecurType::Yearly, u32::MAX)
            .month_of_year(2)
            .day_of_month(29)
            .next_due(at(2024, 1, 1), long_ago());
        assert_eq!(next, DateTime::<Utc>::MAX_UTC);
    }

    #[test]
    fn month_lengths() {
        assert_eq!(days_in_month(2024, 2), 29);
        assert_eq!(days_in_month(2023, 2), 28);
        assert_eq!(days_in_month(2100, 2), 28);
        assert_eq!(days_in_month(2000, 2), 29);
        assert_eq!(days_in_month(2023, 12), 31);
        assert_eq!(days_in_month(2023, 4), 30);
    }

    #[test]
    fn validation_rejects_out_of_range_anchors() {
        assert!(Schedule::new(RecurType::Monthly, 1).day_of_month(31).validate().is_ok());
        assert!(Schedule::new(RecurType::Monthly, 0).validate().is_err());
        assert!(Schedule::new(RecurType::Daily, i32::MAX as u32).validate().is_ok());
        assert!(Schedule::new(RecurType::Daily, 3_000_000_000).validate().is_err());
        assert!(Schedule::new(RecurType::Weekly, 1).day_of_week(7).validate().is_err());
        assert!(Schedule::new(RecurType::Monthly, 1).day_of_month(0).validate().is_err());
        assert!(Schedule::new(RecurType::Yearly, 1).month_of_year(13).validate().is_err());
        assert!(Schedule::new(RecurType::Unrecognized, 1).validate().is_err());
    }
}
