//! Calendar boundary: dates in, sexagenary term strings out.
//!
//! The engine never converts dates itself beyond the year term; month, day
//! and hour pillars come from a [`CalendarService`]. [`ApproximateCalendar`]
//! is a self-contained implementation that uses fixed solar-term dates, good
//! to within a day of the real boundaries.

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, Timelike};

use crate::chart::{Branch, Jiazi, Stem};
use crate::cycle::year_term;
use crate::error::CalendarError;

/// Converts dates into sexagenary term strings such as `"甲子"`.
pub trait CalendarService {
    /// Month pillar in force on `date`.
    fn month_term(&self, date: NaiveDate) -> Result<String, CalendarError>;

    /// Day pillar of `date`.
    fn day_term(&self, date: NaiveDate) -> Result<String, CalendarError>;

    /// Double-hour pillar in force at `at`.
    fn hour_term(&self, at: NaiveDateTime) -> Result<String, CalendarError>;
}

impl<C: CalendarService + ?Sized> CalendarService for &C {
    fn month_term(&self, date: NaiveDate) -> Result<String, CalendarError> {
        (**self).month_term(date)
    }

    fn day_term(&self, date: NaiveDate) -> Result<String, CalendarError> {
        (**self).day_term(date)
    }

    fn hour_term(&self, at: NaiveDateTime) -> Result<String, CalendarError> {
        (**self).hour_term(at)
    }
}

/// Day of each Gregorian month on which the next solar month begins
/// (小寒 6 Jan, 立春 4 Feb, 惊蛰 6 Mar, …, 大雪 7 Dec).
const SOLAR_TERM_DAY: [u32; 12] = [6, 4, 6, 5, 6, 6, 7, 8, 8, 8, 7, 7];

/// 1900-01-01 was a 甲戌 day.
const DAY_ANCHOR_INDEX: i64 = 10;

/// Fixed-boundary calendar: solar months start on [`SOLAR_TERM_DAY`], the
/// solar year on 4 February, and the 子 hour at 23:00 belongs to the next day.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApproximateCalendar;

impl ApproximateCalendar {
    fn anchor() -> Result<NaiveDate, CalendarError> {
        NaiveDate::from_ymd_opt(1900, 1, 1)
            .ok_or_else(|| CalendarError::OutOfRange("1900-01-01".to_string()))
    }

    fn day_pillar(date: NaiveDate) -> Result<Jiazi, CalendarError> {
        let days = date.signed_duration_since(Self::anchor()?).num_days();
        Ok(Jiazi::from_index(
            (DAY_ANCHOR_INDEX + days).rem_euclid(60) as usize,
        ))
    }

    fn month_pillar(date: NaiveDate) -> Result<Jiazi, CalendarError> {
        let (month, day) = (date.month(), date.day());
        let started = day >= SOLAR_TERM_DAY[(month - 1) as usize];
        let branch_index = if started { month % 12 } else { (month + 11) % 12 };
        let solar_year = if month < 2 || (month == 2 && day < SOLAR_TERM_DAY[1]) {
            date.year() - 1
        } else {
            date.year()
        };

        // Months count from 寅; the first month's stem follows the year stem.
        let ordinal = (branch_index as usize + 10) % 12;
        let year_stem = year_term(solar_year).stem().index();
        let stem = Stem::from_index((year_stem % 5) * 2 + 2 + ordinal);
        let branch = Branch::from_index(branch_index as usize);
        Jiazi::new(stem, branch)
            .ok_or_else(|| CalendarError::Lookup(format!("no month term for {date}")))
    }

    fn hour_pillar(at: NaiveDateTime) -> Result<Jiazi, CalendarError> {
        let branch_index = ((at.hour() + 1) / 2 % 12) as usize;
        let date = if at.hour() == 23 {
            at.date()
                .checked_add_signed(Duration::days(1))
                .ok_or_else(|| CalendarError::OutOfRange(at.to_string()))?
        } else {
            at.date()
        };
        let day_stem = Self::day_pillar(date)?.stem().index();
        let stem = Stem::from_index((day_stem % 5) * 2 + branch_index);
        Jiazi::new(stem, Branch::from_index(branch_index))
            .ok_or_else(|| CalendarError::Lookup(format!("no hour term for {at}")))
    }
}

impl CalendarService for ApproximateCalendar {
    fn month_term(&self, date: NaiveDate) -> Result<String, CalendarError> {
        Ok(Self::month_pillar(date)?.to_string())
    }

    fn day_term(&self, date: NaiveDate) -> Result<String, CalendarError> {
        Ok(Self::day_pillar(date)?.to_string())
    }

    fn hour_term(&self, at: NaiveDateTime) -> Result<String, CalendarError> {
        Ok(Self::hour_pillar(at)?.to_string())
    }
}
