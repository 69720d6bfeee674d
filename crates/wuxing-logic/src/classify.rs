//! Five-level status per element, circulation, missing elements, day master.
//!
//! Absolute thresholds are checked first; only values inside the
//! `[weak_threshold, strong_threshold]` band are judged against the
//! cross-element mean. Every comparison is strict, so a value sitting on a
//! threshold lands in the band nearer to balanced.

use serde::Serialize;

use crate::chart::Stem;
use crate::config::EnergyConfig;
use crate::element::{Element, ElementMap};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum EnergyStatus {
    VeryWeak,
    Weak,
    Balanced,
    Strong,
    VeryStrong,
}

impl EnergyStatus {
    pub fn label(self) -> &'static str {
        match self {
            EnergyStatus::VeryWeak => "very weak",
            EnergyStatus::Weak => "weak",
            EnergyStatus::Balanced => "balanced",
            EnergyStatus::Strong => "strong",
            EnergyStatus::VeryStrong => "very strong",
        }
    }
}

pub fn classify_element(value: f64, mean: f64, config: &EnergyConfig) -> EnergyStatus {
    if value < config.very_weak_threshold {
        return EnergyStatus::VeryWeak;
    }
    if value < config.weak_threshold {
        return EnergyStatus::Weak;
    }
    if value > config.very_strong_threshold {
        return EnergyStatus::VeryStrong;
    }
    if value > config.strong_threshold {
        return EnergyStatus::Strong;
    }

    if value < mean * config.relative_very_weak_ratio {
        EnergyStatus::VeryWeak
    } else if value < mean * config.relative_weak_ratio {
        EnergyStatus::Weak
    } else if value > mean * config.relative_very_strong_ratio {
        EnergyStatus::VeryStrong
    } else if value > mean * config.relative_strong_ratio {
        EnergyStatus::Strong
    } else {
        EnergyStatus::Balanced
    }
}

pub fn classify_all(totals: &ElementMap<f64>, config: &EnergyConfig) -> ElementMap<EnergyStatus> {
    let mean = totals.mean();
    totals.map(|_, &v| classify_element(v, mean, config))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum CirculationStatus {
    Smooth,
    Weak,
    Blocked,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Circulation {
    pub status: CirculationStatus,
    /// Very weak elements; the generative flow breaks at each of them.
    pub blocked: Vec<Element>,
    /// Weak elements that still pass energy on.
    pub weak: Vec<Element>,
    pub cycle_closed: bool,
}

pub fn circulation(statuses: &ElementMap<EnergyStatus>, cycle_closed: bool) -> Circulation {
    let with = |status: EnergyStatus| -> Vec<Element> {
        statuses
            .iter()
            .filter(|(_, &s)| s == status)
            .map(|(e, _)| e)
            .collect()
    };
    let blocked = with(EnergyStatus::VeryWeak);
    let weak = with(EnergyStatus::Weak);
    let status = if !blocked.is_empty() {
        CirculationStatus::Blocked
    } else if !weak.is_empty() {
        CirculationStatus::Weak
    } else {
        CirculationStatus::Smooth
    };
    Circulation {
        status,
        blocked,
        weak,
        cycle_closed,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum MissingLevel {
    Critical,
    Moderate,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MissingElement {
    pub element: Element,
    pub level: MissingLevel,
    pub value: f64,
}

/// Very weak and weak elements, most severe first, then in generation order.
pub fn missing_elements(totals: &ElementMap<f64>, statuses: &ElementMap<EnergyStatus>) -> Vec<MissingElement> {
    let mut missing: Vec<MissingElement> = statuses
        .iter()
        .filter_map(|(element, &status)| {
            let level = match status {
                EnergyStatus::VeryWeak => MissingLevel::Critical,
                EnergyStatus::Weak => MissingLevel::Moderate,
                _ => return None,
            };
            Some(MissingElement {
                element,
                level,
                value: totals[element],
            })
        })
        .collect();
    missing.sort_by_key(|m| m.level != MissingLevel::Critical);
    missing
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DayMasterReading {
    pub stem: Stem,
    pub element: Element,
    pub value: f64,
    pub status: EnergyStatus,
}

pub fn day_master_reading(
    stem: Stem,
    totals: &ElementMap<f64>,
    statuses: &ElementMap<EnergyStatus>,
) -> DayMasterReading {
    let element = stem.element();
    DayMasterReading {
        stem,
        element,
        value: totals[element],
        status: statuses[element],
    }
}
