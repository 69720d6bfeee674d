//! Heavenly stems, earthly branches, sexagenary terms, and four-pillar charts.
//!
//! Stems and branches are closed enums carrying their element and polarity.
//! A [`Jiazi`] is one of the 60 stem-branch terms of the sexagenary cycle.
//! [`FourPillars`] is the natal chart the engine consumes; parsing rejects any
//! pillar whose glyphs are not a known stem followed by a known branch.

use std::fmt;
use std::str::FromStr;

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

use crate::element::{Element, Polarity};
use crate::error::{ChartError, TermError};

/// The ten heavenly stems.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Stem {
    Jia,
    Yi,
    Bing,
    Ding,
    Wu,
    Ji,
    Geng,
    Xin,
    Ren,
    Gui,
}

impl Stem {
    pub fn all() -> [Stem; 10] {
        [
            Stem::Jia,
            Stem::Yi,
            Stem::Bing,
            Stem::Ding,
            Stem::Wu,
            Stem::Ji,
            Stem::Geng,
            Stem::Xin,
            Stem::Ren,
            Stem::Gui,
        ]
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Stem {
        Stem::all()[index % 10]
    }

    pub fn glyph(self) -> char {
        ['甲', '乙', '丙', '丁', '戊', '己', '庚', '辛', '壬', '癸'][self.index()]
    }

    pub fn from_glyph(c: char) -> Option<Stem> {
        Stem::all().into_iter().find(|s| s.glyph() == c)
    }

    /// Stems pair up by element: 甲乙 wood, 丙丁 fire, and so on.
    pub fn element(self) -> Element {
        Element::all()[self.index() / 2]
    }

    pub fn polarity(self) -> Polarity {
        if self.index() % 2 == 0 {
            Polarity::Yang
        } else {
            Polarity::Yin
        }
    }
}

impl fmt::Display for Stem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.glyph())
    }
}

/// The twelve earthly branches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Branch {
    Zi,
    Chou,
    Yin,
    Mao,
    Chen,
    Si,
    Wu,
    Wei,
    Shen,
    You,
    Xu,
    Hai,
}

impl Branch {
    pub fn all() -> [Branch; 12] {
        [
            Branch::Zi,
            Branch::Chou,
            Branch::Yin,
            Branch::Mao,
            Branch::Chen,
            Branch::Si,
            Branch::Wu,
            Branch::Wei,
            Branch::Shen,
            Branch::You,
            Branch::Xu,
            Branch::Hai,
        ]
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Branch {
        Branch::all()[index % 12]
    }

    pub fn glyph(self) -> char {
        [
            '子', '丑', '寅', '卯', '辰', '巳', '午', '未', '申', '酉', '戌', '亥',
        ][self.index()]
    }

    pub fn from_glyph(c: char) -> Option<Branch> {
        Branch::all().into_iter().find(|b| b.glyph() == c)
    }

    /// Element of the branch's main qi.
    pub fn main_element(self) -> Element {
        match self {
            Branch::Zi | Branch::Hai => Element::Water,
            Branch::Yin | Branch::Mao => Element::Wood,
            Branch::Si | Branch::Wu => Element::Fire,
            Branch::Shen | Branch::You => Element::Metal,
            Branch::Chou | Branch::Chen | Branch::Wei | Branch::Xu => Element::Earth,
        }
    }

    pub fn polarity(self) -> Polarity {
        if self.index() % 2 == 0 {
            Polarity::Yang
        } else {
            Polarity::Yin
        }
    }
}

impl fmt::Display for Branch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.glyph())
    }
}

/// Number of terms in the sexagenary cycle.
pub const CYCLE_LEN: usize = 60;

/// One term of the 60-term sexagenary cycle (甲子 = 0 … 癸亥 = 59).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Jiazi(u8);

impl Jiazi {
    /// Term at `index` (taken modulo 60).
    pub fn from_index(index: usize) -> Jiazi {
        Jiazi((index % CYCLE_LEN) as u8)
    }

    /// Combine a stem and branch. Only same-parity pairs exist in the cycle.
    pub fn new(stem: Stem, branch: Branch) -> Option<Jiazi> {
        if stem.index() % 2 != branch.index() % 2 {
            return None;
        }
        // Solve i ≡ stem (mod 10), i ≡ branch (mod 12).
        let index = (6 * stem.index() + 60 - 5 * branch.index()) % CYCLE_LEN;
        Some(Jiazi(index as u8))
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }

    pub fn stem(self) -> Stem {
        Stem::from_index(self.index())
    }

    pub fn branch(self) -> Branch {
        Branch::from_index(self.index())
    }

    /// Move `step` terms through the cycle, wrapping in both directions.
    pub fn shifted(self, step: i64) -> Jiazi {
        let len = CYCLE_LEN as i64;
        Jiazi(((self.0 as i64 + step.rem_euclid(len)) % len) as u8)
    }
}

impl fmt::Display for Jiazi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.stem(), self.branch())
    }
}

/// Serialized as its two glyphs, e.g. `"甲子"`.
impl Serialize for Jiazi {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Jiazi {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(de::Error::custom)
    }
}

impl FromStr for Jiazi {
    type Err = TermError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chars = s.trim().chars();
        let (Some(sc), Some(bc), None) = (chars.next(), chars.next(), chars.next()) else {
            return Err(TermError::Unknown(s.to_string()));
        };
        let (Some(stem), Some(branch)) = (Stem::from_glyph(sc), Branch::from_glyph(bc)) else {
            return Err(TermError::Unknown(s.to_string()));
        };
        Jiazi::new(stem, branch).ok_or_else(|| TermError::ParityMismatch(s.to_string()))
    }
}

/// Natal pillar position: year, month, day, hour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Pillar {
    Year,
    Month,
    Day,
    Hour,
}

impl Pillar {
    pub fn all() -> [Pillar; 4] {
        [Pillar::Year, Pillar::Month, Pillar::Day, Pillar::Hour]
    }

    pub fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Pillar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Pillar::Year => "year",
            Pillar::Month => "month",
            Pillar::Day => "day",
            Pillar::Hour => "hour",
        };
        f.write_str(name)
    }
}

/// One stem-branch pair. Natal pillars need not form a valid cycle term.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StemBranch {
    pub stem: Stem,
    pub branch: Branch,
}

impl From<Jiazi> for StemBranch {
    fn from(term: Jiazi) -> Self {
        Self {
            stem: term.stem(),
            branch: term.branch(),
        }
    }
}

impl fmt::Display for StemBranch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.stem, self.branch)
    }
}

/// A four-pillar birth chart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FourPillars {
    pub year: StemBranch,
    pub month: StemBranch,
    pub day: StemBranch,
    pub hour: StemBranch,
}

impl FourPillars {
    /// Parse four two-glyph pillar strings such as `"甲辰"`.
    ///
    /// Fails on the first malformed pillar, naming it in the error.
    pub fn parse(year: &str, month: &str, day: &str, hour: &str) -> Result<Self, ChartError> {
        Ok(Self {
            year: parse_pillar(Pillar::Year, year)?,
            month: parse_pillar(Pillar::Month, month)?,
            day: parse_pillar(Pillar::Day, day)?,
            hour: parse_pillar(Pillar::Hour, hour)?,
        })
    }

    pub fn pillar(&self, pillar: Pillar) -> StemBranch {
        match pillar {
            Pillar::Year => self.year,
            Pillar::Month => self.month,
            Pillar::Day => self.day,
            Pillar::Hour => self.hour,
        }
    }

    /// Pillars in year, month, day, hour order.
    pub fn pillars(&self) -> [(Pillar, StemBranch); 4] {
        Pillar::all().map(|p| (p, self.pillar(p)))
    }

    /// The month branch, which sets the seasonal command.
    pub fn month_branch(&self) -> Branch {
        self.month.branch
    }

    /// The day stem ("day master").
    pub fn day_master(&self) -> Stem {
        self.day.stem
    }
}

impl fmt::Display for FourPillars {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {} {}", self.year, self.month, self.day, self.hour)
    }
}

fn parse_pillar(pillar: Pillar, input: &str) -> Result<StemBranch, ChartError> {
    let trimmed = input.trim();
    let mut chars = trimmed.chars();
    let (Some(sc), Some(bc), None) = (chars.next(), chars.next(), chars.next()) else {
        return Err(ChartError::Malformed {
            pillar,
            input: input.to_string(),
        });
    };
    let stem = Stem::from_glyph(sc).ok_or(ChartError::UnknownStem { pillar, found: sc })?;
    let branch = Branch::from_glyph(bc).ok_or(ChartError::UnknownBranch { pillar, found: bc })?;
    Ok(StemBranch { stem, branch })
}
