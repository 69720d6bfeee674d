//! Dynamic-layer sequences over the 60-term cycle.
//!
//! Luck pillars and flowing years are pure cycle arithmetic. Flowing months,
//! days and hours need a [`CalendarService`]; any term the calendar cannot
//! produce or that does not parse fails the whole request.

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::calendar::CalendarService;
use crate::chart::{Jiazi, StemBranch};
use crate::element::Polarity;
use crate::error::{self, CalendarError, EngineError, TermError};

/// 2000 is a 庚辰 year.
pub const YEAR_ANCHOR: i32 = 2000;
pub const YEAR_ANCHOR_INDEX: usize = 16;

pub const DEFAULT_LUCK_STEPS: usize = 8;
pub const DEFAULT_YEARS_SPAN: usize = 10;
pub const DEFAULT_DAY_STEPS: usize = 30;
pub const DEFAULT_HOUR_STEPS: usize = 12;
/// Hour used for the cascade when none is given.
pub const DEFAULT_ACTIVE_HOUR: u32 = 12;

/// Move `step` terms from `index`, wrapping both ways.
pub fn move_term(index: usize, step: i64) -> Jiazi {
    Jiazi::from_index(index).shifted(step)
}

/// Term of the Gregorian `year`.
pub fn year_term(year: i32) -> Jiazi {
    Jiazi::from_index(YEAR_ANCHOR_INDEX).shifted(i64::from(year) - i64::from(YEAR_ANCHOR))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LuckDirection {
    Forward,
    Backward,
}

impl LuckDirection {
    /// Yang-year men and yin-year women run forward; everyone else backward.
    pub fn from_year_polarity(year_stem: Polarity, gender: Gender) -> Self {
        match (year_stem, gender) {
            (Polarity::Yang, Gender::Male) | (Polarity::Yin, Gender::Female) => LuckDirection::Forward,
            _ => LuckDirection::Backward,
        }
    }

    fn sign(self) -> i64 {
        match self {
            LuckDirection::Forward => 1,
            LuckDirection::Backward => -1,
        }
    }
}

/// First luck pillar: the month pillar moved one term in `direction`.
pub fn first_luck_term(month: StemBranch, direction: LuckDirection) -> Result<Jiazi, TermError> {
    let term = Jiazi::new(month.stem, month.branch)
        .ok_or_else(|| TermError::ParityMismatch(month.to_string()))?;
    Ok(term.shifted(direction.sign()))
}

/// One ten-year luck pillar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LuckStep {
    pub index: usize,
    pub term: Jiazi,
    pub start_age: Option<u32>,
    pub end_age: Option<u32>,
}

fn step_ages(start_age: u32, index: usize) -> Option<(u32, u32)> {
    let start = u32::try_from(index)
        .ok()
        .and_then(|i| i.checked_mul(10))
        .and_then(|offset| start_age.checked_add(offset))?;
    Some((start, start.checked_add(9)?))
}

/// `steps` luck pillars from `first`, each spanning ten years of age when
/// `start_age` is known.
pub fn luck_sequence(
    first: Jiazi,
    direction: LuckDirection,
    steps: usize,
    start_age: Option<u32>,
) -> error::Result<Vec<LuckStep>> {
    (0..steps)
        .map(|i| {
            let ages = match start_age {
                Some(age) => {
                    let (start, end) = step_ages(age, i).ok_or_else(|| {
                        EngineError::InvalidRequest(format!("luck step {i} from age {age} overflows"))
                    })?;
                    (Some(start), Some(end))
                }
                None => (None, None),
            };
            Ok(LuckStep {
                index: i,
                term: first.shifted(direction.sign() * (i % 60) as i64),
                start_age: ages.0,
                end_age: ages.1,
            })
        })
        .collect()
}

/// `from_year + offset`, or `None` past the `i32` range.
pub fn offset_year(from_year: i32, offset: usize) -> Option<i32> {
    i32::try_from(offset).ok().and_then(|o| from_year.checked_add(o))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct YearTerm {
    pub year: i32,
    pub term: Jiazi,
}

pub fn year_sequence(from_year: i32, years: usize) -> error::Result<Vec<YearTerm>> {
    (0..years)
        .map(|i| {
            let year = offset_year(from_year, i).ok_or_else(|| {
                EngineError::InvalidRequest(format!("year {from_year} + {i} is out of range"))
            })?;
            Ok(YearTerm {
                year,
                term: year_term(year),
            })
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MonthTerm {
    pub year: i32,
    pub month: u32,
    pub term: Jiazi,
}

fn parse_term(raw: String) -> Result<Jiazi, CalendarError> {
    Ok(raw.parse::<Jiazi>()?)
}

/// `months` flowing months from `year`-`start_month`, each sampled on the
/// 15th. Rolls over into following years.
pub fn month_sequence(
    calendar: &impl CalendarService,
    year: i32,
    start_month: u32,
    months: usize,
) -> Result<Vec<MonthTerm>, CalendarError> {
    if !(1..=12).contains(&start_month) {
        return Err(CalendarError::OutOfRange(format!("month {start_month}")));
    }
    let first = (start_month - 1) as usize;
    (0..months)
        .map(|i| {
            let offset = first + i;
            let y = offset_year(year, offset / 12)
                .ok_or_else(|| CalendarError::OutOfRange(format!("year {year} + {}", offset / 12)))?;
            let m = (offset % 12) as u32 + 1;
            let date = NaiveDate::from_ymd_opt(y, m, 15)
                .ok_or_else(|| CalendarError::OutOfRange(format!("{y}-{m:02}-15")))?;
            let term = parse_term(calendar.month_term(date)?)?;
            Ok(MonthTerm {
                year: y,
                month: m,
                term,
            })
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DayTerm {
    pub date: NaiveDate,
    pub term: Jiazi,
}

pub fn day_sequence(
    calendar: &impl CalendarService,
    start: NaiveDate,
    days: usize,
) -> Result<Vec<DayTerm>, CalendarError> {
    (0..days)
        .map(|i| {
            let date = start
                .checked_add_signed(Duration::days(i as i64))
                .ok_or_else(|| CalendarError::OutOfRange(format!("{start} + {i} days")))?;
            let term = parse_term(calendar.day_term(date)?)?;
            Ok(DayTerm { date, term })
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HourTerm {
    pub at: NaiveDateTime,
    pub term: Jiazi,
}

/// `steps` double-hours from `start`, two hours apart.
pub fn hour_sequence(
    calendar: &impl CalendarService,
    start: NaiveDateTime,
    steps: usize,
) -> Result<Vec<HourTerm>, CalendarError> {
    (0..steps)
        .map(|i| {
            let at = start
                .checked_add_signed(Duration::hours(2 * i as i64))
                .ok_or_else(|| CalendarError::OutOfRange(format!("{start} + {} hours", 2 * i)))?;
            let term = parse_term(calendar.hour_term(at)?)?;
            Ok(HourTerm { at, term })
        })
        .collect()
}

/// Selection for [`build_cascade`]. Unset fields fall back to the birth date.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CascadeOptions {
    pub from_year: Option<i32>,
    pub years_span: Option<usize>,
    pub active_year: Option<i32>,
    pub active_month: Option<u32>,
    pub active_day: Option<u32>,
    pub active_hour: Option<u32>,
    /// Hours are produced unless this is `Some(false)`.
    pub include_hours: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ActiveMoment {
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub hour: u32,
}

/// Years, the months of the active year, and the hours of the active date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Cascade {
    pub years: Vec<YearTerm>,
    pub months: Vec<MonthTerm>,
    pub hours: Option<Vec<HourTerm>>,
    pub active: ActiveMoment,
}

fn days_in_month(year: i32, month: u32) -> Result<u32, CalendarError> {
    let (ny, nm) = if month == 12 {
        let next = year
            .checked_add(1)
            .ok_or_else(|| CalendarError::OutOfRange(format!("{year}-12")))?;
        (next, 1)
    } else {
        (year, month + 1)
    };
    let next = NaiveDate::from_ymd_opt(ny, nm, 1)
        .ok_or_else(|| CalendarError::OutOfRange(format!("{ny}-{nm:02}")))?;
    next.pred_opt()
        .map(|d| d.day())
        .ok_or_else(|| CalendarError::OutOfRange(format!("{year}-{month:02}")))
}

pub fn build_cascade(
    calendar: &impl CalendarService,
    birth: NaiveDate,
    options: &CascadeOptions,
) -> error::Result<Cascade> {
    let from_year = options.from_year.unwrap_or(birth.year());
    let span = options.years_span.unwrap_or(DEFAULT_YEARS_SPAN);
    let active_year = options.active_year.unwrap_or(from_year);

    let years = year_sequence(from_year, span)?;
    let months = month_sequence(calendar, active_year, 1, 12)?;

    let month = options.active_month.unwrap_or(birth.month()).clamp(1, 12);
    let day = options
        .active_day
        .unwrap_or(birth.day())
        .clamp(1, days_in_month(active_year, month)?);
    let hour = options.active_hour.unwrap_or(DEFAULT_ACTIVE_HOUR).min(23);

    let hours = if options.include_hours == Some(false) {
        None
    } else {
        let start = NaiveDate::from_ymd_opt(active_year, month, day)
            .and_then(|d| d.and_hms_opt(hour, 0, 0))
            .ok_or_else(|| CalendarError::OutOfRange(format!("{active_year}-{month:02}-{day:02}")))?;
        Some(hour_sequence(calendar, start, DEFAULT_HOUR_STEPS)?)
    };

    log::debug!(
        "cascade from {from_year} ({span} years), active {active_year}-{month:02}-{day:02} {hour:02}h"
    );
    Ok(Cascade {
        years,
        months,
        hours,
        active: ActiveMoment {
            year: active_year,
            month,
            day,
            hour,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::ApproximateCalendar;
    use crate::chart::{Branch, Stem};

    /// Calendar that answers every lookup with the same string.
    struct FixedCalendar(&'static str);

    impl CalendarService for FixedCalendar {
        fn month_term(&self, _: NaiveDate) -> Result<String, CalendarError> {
            Ok(self.0.to_string())
        }
        fn day_term(&self, _: NaiveDate) -> Result<String, CalendarError> {
            Ok(self.0.to_string())
        }
        fn hour_term(&self, _: NaiveDateTime) -> Result<String, CalendarError> {
            Ok(self.0.to_string())
        }
    }

    #[test]
    fn year_2024_is_jia_chen() {
        let term = year_term(2024);
        assert_eq!(term.index(), 40);
        assert_eq!(term.to_string(), "甲辰");
        assert_eq!(year_term(2000).to_string(), "庚辰");
        assert_eq!(year_term(1984).to_string(), "甲子");
        assert_eq!(year_term(1939).index(), year_term(1999).index());
    }

    #[test]
    fn move_forward_then_back_is_identity() {
        for index in 0..60 {
            for n in [1, 7, 59, 60, 61, 250] {
                assert_eq!(move_term(move_term(index, n).index(), -n).index(), index);
            }
        }
        assert_eq!(move_term(59, 1).index(), 0);
        assert_eq!(move_term(0, -1).index(), 59);
    }

    #[test]
    fn luck_direction_rules() {
        use LuckDirection::*;
        assert_eq!(LuckDirection::from_year_polarity(Polarity::Yang, Gender::Male), Forward);
        assert_eq!(LuckDirection::from_year_polarity(Polarity::Yin, Gender::Female), Forward);
        assert_eq!(LuckDirection::from_year_polarity(Polarity::Yang, Gender::Female), Backward);
        assert_eq!(LuckDirection::from_year_polarity(Polarity::Yin, Gender::Male), Backward);
    }

    #[test]
    fn luck_sequence_steps_and_ages() {
        let month = StemBranch {
            stem: Stem::Bing,
            branch: Branch::Yin,
        };
        let first = first_luck_term(month, LuckDirection::Backward).unwrap();
        assert_eq!(first.to_string(), "乙丑");

        let seq = luck_sequence(first, LuckDirection::Backward, DEFAULT_LUCK_STEPS, Some(3)).unwrap();
        assert_eq!(seq.len(), 8);
        assert_eq!(seq[1].term.to_string(), "甲子");
        assert_eq!(seq[2].term.to_string(), "癸亥");
        assert_eq!((seq[0].start_age, seq[0].end_age), (Some(3), Some(12)));
        assert_eq!((seq[7].start_age, seq[7].end_age), (Some(73), Some(82)));

        let no_age = luck_sequence(first, LuckDirection::Forward, 2, None).unwrap();
        assert_eq!(no_age[1].term.to_string(), "丙寅");
        assert!(no_age[0].start_age.is_none());
    }

    #[test]
    fn sequences_past_integer_range_are_rejected() {
        let first = year_term(2024);
        let err = luck_sequence(first, LuckDirection::Forward, 3, Some(u32::MAX - 15)).unwrap_err();
        assert!(matches!(err, EngineError::InvalidRequest(_)));
        assert_eq!(
            luck_sequence(first, LuckDirection::Forward, 1, Some(u32::MAX - 9)).unwrap()[0].end_age,
            Some(u32::MAX)
        );

        assert!(matches!(year_sequence(i32::MAX - 1, 3), Err(EngineError::InvalidRequest(_))));
        assert_eq!(year_sequence(i32::MAX - 1, 2).unwrap()[1].year, i32::MAX);
        assert_eq!(offset_year(i32::MAX, 1), None);

        let birth = NaiveDate::from_ymd_opt(1990, 8, 31).unwrap();
        let options = CascadeOptions {
            from_year: Some(i32::MAX - 2),
            ..CascadeOptions::default()
        };
        assert!(matches!(
            build_cascade(&ApproximateCalendar, birth, &options),
            Err(EngineError::InvalidRequest(_))
        ));
    }

    #[test]
    fn first_luck_needs_valid_month_term() {
        let month = StemBranch {
            stem: Stem::Jia,
            branch: Branch::Chou,
        };
        assert!(matches!(
            first_luck_term(month, LuckDirection::Forward),
            Err(TermError::ParityMismatch(_))
        ));
    }

    #[test]
    fn month_sequence_rolls_into_next_year() {
        let seq = month_sequence(&ApproximateCalendar, 2024, 11, 4).unwrap();
        let labels: Vec<(i32, u32)> = seq.iter().map(|m| (m.year, m.month)).collect();
        assert_eq!(labels, vec![(2024, 11), (2024, 12), (2025, 1), (2025, 2)]);
        assert_eq!(seq[1].term.to_string(), "丙子");
        // 2025 is an 乙 year: first month 戊寅
        assert_eq!(seq[3].term.to_string(), "戊寅");
    }

    #[test]
    fn day_and_hour_sequences_step() {
        let start = NaiveDate::from_ymd_opt(2000, 1, 7).unwrap();
        let days = day_sequence(&ApproximateCalendar, start, DEFAULT_DAY_STEPS).unwrap();
        assert_eq!(days.len(), 30);
        assert_eq!(days[0].term.to_string(), "甲子");
        assert_eq!(days[29].term.to_string(), "癸巳");

        let hours = hour_sequence(&ApproximateCalendar, start.and_hms_opt(0, 0, 0).unwrap(), 12).unwrap();
        let terms: Vec<String> = hours.iter().map(|h| h.term.to_string()).collect();
        assert_eq!(terms[0], "甲子");
        assert_eq!(terms[1], "乙丑");
        assert_eq!(terms[11], "乙亥");
    }

    #[test]
    fn bad_calendar_term_is_fatal() {
        let start = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let err = day_sequence(&FixedCalendar("甲丑"), start, 3).unwrap_err();
        assert!(matches!(err, CalendarError::Term(TermError::ParityMismatch(_))));
        let err = month_sequence(&FixedCalendar("??"), 2024, 1, 1).unwrap_err();
        assert!(matches!(err, CalendarError::Term(TermError::Unknown(_))));
    }

    #[test]
    fn cascade_defaults_from_birth_date() {
        let birth = NaiveDate::from_ymd_opt(1990, 8, 31).unwrap();
        let cascade = build_cascade(&ApproximateCalendar, birth, &CascadeOptions::default()).unwrap();
        assert_eq!(cascade.years.len(), 10);
        assert_eq!(cascade.years[0].year, 1990);
        assert_eq!(cascade.months.len(), 12);
        assert!(cascade.months.iter().all(|m| m.year == 1990));
        assert_eq!(cascade.hours.as_ref().map(Vec::len), Some(12));
        assert_eq!(
            cascade.active,
            ActiveMoment {
                year: 1990,
                month: 8,
                day: 31,
                hour: 12
            }
        );
    }

    #[test]
    fn cascade_clamps_active_date() {
        let birth = NaiveDate::from_ymd_opt(1990, 8, 31).unwrap();
        let options = CascadeOptions {
            active_year: Some(2023),
            active_month: Some(14),
            active_hour: Some(30),
            include_hours: Some(false),
            ..CascadeOptions::default()
        };
        let cascade = build_cascade(&ApproximateCalendar, birth, &options).unwrap();
        assert!(cascade.hours.is_none());
        assert_eq!(cascade.active.month, 12);
        assert_eq!(cascade.active.day, 31);
        assert_eq!(cascade.active.hour, 23);

        let feb = CascadeOptions {
            active_year: Some(2023),
            active_month: Some(2),
            ..CascadeOptions::default()
        };
        let cascade = build_cascade(&ApproximateCalendar, birth, &feb).unwrap();
        assert_eq!(cascade.active.day, 28);
        assert_eq!(cascade.years[0].year, 1990);
    }

    #[test]
    fn sequence_terms_serialize_as_glyphs() {
        let json = serde_json::to_string(&year_sequence(2024, 1).unwrap()).unwrap();
        assert_eq!(json, r#"[{"year":2024,"term":"甲辰"}]"#);
    }
}
