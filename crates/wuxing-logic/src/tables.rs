//! Traditional lookup tables: hidden-element distribution, month coefficients,
//! combination rules, clash/punishment/harm sets, and the position matrix.
//!
//! Everything here is static data keyed by the closed [`Stem`], [`Branch`],
//! and [`Element`] enums, so a lookup can never miss.

use crate::chart::{Branch, Stem};
use crate::element::{Element, ElementMap, Polarity};

use Branch::*;
use Element::{Earth, Fire, Metal, Water, Wood};

/// Share of a branch's base energy carried by each hidden element.
///
/// The main qi always carries at least 0.6.
pub fn hidden_elements(branch: Branch) -> &'static [(Element, f64)] {
    match branch {
        Zi => &[(Water, 1.0)],
        Chou => &[(Earth, 0.6), (Metal, 0.3), (Water, 0.1)],
        Yin => &[(Wood, 0.6), (Fire, 0.3), (Earth, 0.1)],
        Mao => &[(Wood, 1.0)],
        Chen => &[(Earth, 0.6), (Wood, 0.3), (Water, 0.1)],
        Si => &[(Fire, 0.6), (Metal, 0.3), (Earth, 0.1)],
        Wu => &[(Fire, 0.7), (Earth, 0.3)],
        Wei => &[(Earth, 0.6), (Fire, 0.3), (Wood, 0.1)],
        Shen => &[(Metal, 0.6), (Water, 0.3), (Earth, 0.1)],
        You => &[(Metal, 1.0)],
        Xu => &[(Earth, 0.6), (Metal, 0.3), (Fire, 0.1)],
        Hai => &[(Water, 0.7), (Wood, 0.3)],
    }
}

/// Hidden-element ratio of `element` inside `branch`, or 0.
pub fn hidden_ratio(branch: Branch, element: Element) -> f64 {
    hidden_elements(branch)
        .iter()
        .find(|(e, _)| *e == element)
        .map(|(_, r)| *r)
        .unwrap_or(0.0)
}

/// Combined prosperity and climate coefficient for each element in a month.
pub fn month_coefficients(month: Branch) -> ElementMap<f64> {
    // wood, fire, earth, metal, water
    let row = match month {
        Yin | Mao => [1.2, 1.1, 0.48, 0.66, 0.8],
        Chen => [0.6, 0.88, 1.44, 1.1, 0.4],
        Si | Wu => [0.72, 1.08, 1.0, 0.52, 0.78],
        Wei => [0.54, 0.72, 1.2, 1.3, 0.52],
        Shen | You => [0.44, 0.66, 0.8, 1.2, 1.1],
        Xu => [0.66, 1.1, 1.2, 0.6, 0.88],
        Hai | Zi => [1.0, 0.52, 0.78, 0.72, 1.08],
        Chou => [0.4, 0.78, 1.56, 0.9, 0.54],
    };
    ElementMap(row)
}

/// Result element of a stem five-combination, if the two stems combine.
/// Order does not matter.
pub fn stem_combination(a: Stem, b: Stem) -> Option<Element> {
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    match (lo, hi) {
        (Stem::Jia, Stem::Ji) => Some(Earth),
        (Stem::Yi, Stem::Geng) => Some(Metal),
        (Stem::Bing, Stem::Xin) => Some(Water),
        (Stem::Ding, Stem::Ren) => Some(Wood),
        (Stem::Wu, Stem::Gui) => Some(Fire),
        _ => None,
    }
}

/// Month branch at which a combined element is at its peak.
pub fn peak_branch(element: Element) -> Branch {
    match element {
        Wood => Mao,
        Fire => Wu,
        Metal => You,
        Water | Earth => Zi,
    }
}

/// Kinds of branch combination, in processing priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CombinationKind {
    ThreeAssembly,
    ThreeHarmony,
    SixHarmony,
    HalfCombination,
    StemFive,
}

impl CombinationKind {
    /// Multiplier applied to the base contribution and external gain.
    pub fn scale(self) -> f64 {
        match self {
            CombinationKind::ThreeAssembly => 1.6,
            CombinationKind::ThreeHarmony => 1.4,
            CombinationKind::SixHarmony => 1.0,
            CombinationKind::HalfCombination => 1.2,
            CombinationKind::StemFive => 1.0,
        }
    }

    /// Strength used when the month does not support the combination.
    pub fn decay(self) -> f64 {
        match self {
            CombinationKind::ThreeAssembly => 0.3,
            CombinationKind::ThreeHarmony => 0.2,
            CombinationKind::SixHarmony => 0.25,
            CombinationKind::HalfCombination => 0.15,
            CombinationKind::StemFive => 0.2,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            CombinationKind::ThreeAssembly => "three-assembly",
            CombinationKind::ThreeHarmony => "three-harmony",
            CombinationKind::SixHarmony => "six-harmony",
            CombinationKind::HalfCombination => "half-combination",
            CombinationKind::StemFive => "stem five-combination",
        }
    }
}

/// A branch combination rule.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BranchCombination {
    pub kind: CombinationKind,
    pub branches: &'static [Branch],
    pub result: Element,
    /// Centre branch of a three-harmony frame.
    pub centre: Option<Branch>,
}

const fn rule(
    kind: CombinationKind,
    branches: &'static [Branch],
    result: Element,
    centre: Option<Branch>,
) -> BranchCombination {
    BranchCombination {
        kind,
        branches,
        result,
        centre,
    }
}

use CombinationKind::{HalfCombination, SixHarmony, ThreeAssembly, ThreeHarmony};

/// All branch combination rules, grouped by kind in priority order.
pub const BRANCH_COMBINATIONS: &[BranchCombination] = &[
    rule(ThreeAssembly, &[Yin, Mao, Chen], Wood, None),
    rule(ThreeAssembly, &[Si, Wu, Wei], Fire, None),
    rule(ThreeAssembly, &[Shen, You, Xu], Metal, None),
    rule(ThreeAssembly, &[Hai, Zi, Chou], Water, None),
    rule(ThreeHarmony, &[Shen, Zi, Chen], Water, Some(Zi)),
    rule(ThreeHarmony, &[Hai, Mao, Wei], Wood, Some(Mao)),
    rule(ThreeHarmony, &[Yin, Wu, Xu], Fire, Some(Wu)),
    rule(ThreeHarmony, &[Si, You, Chou], Metal, Some(You)),
    rule(SixHarmony, &[Zi, Chou], Earth, None),
    rule(SixHarmony, &[Yin, Hai], Wood, None),
    rule(SixHarmony, &[Mao, Xu], Fire, None),
    rule(SixHarmony, &[Chen, You], Metal, None),
    rule(SixHarmony, &[Si, Shen], Water, None),
    rule(SixHarmony, &[Wu, Wei], Earth, None),
    rule(HalfCombination, &[Shen, Zi], Water, None),
    rule(HalfCombination, &[Zi, Chen], Water, None),
    rule(HalfCombination, &[Hai, Mao], Wood, None),
    rule(HalfCombination, &[Mao, Wei], Wood, None),
    rule(HalfCombination, &[Yin, Wu], Fire, None),
    rule(HalfCombination, &[Wu, Xu], Fire, None),
    rule(HalfCombination, &[Si, You], Metal, None),
    rule(HalfCombination, &[You, Chou], Metal, None),
];

/// The six clashes.
pub const CLASH_PAIRS: [(Branch, Branch); 6] = [
    (Zi, Wu),
    (Chou, Wei),
    (Yin, Shen),
    (Mao, You),
    (Chen, Xu),
    (Si, Hai),
];

/// The six harms.
pub const HARM_PAIRS: &[(Branch, Branch)] = &[
    (Zi, Wei),
    (Chou, Wu),
    (Yin, Si),
    (Mao, Chen),
    (Shen, Hai),
    (You, Xu),
];

/// Triple punishments: all three must be present.
pub const PUNISH_TRIPLES: [[Branch; 3]; 2] = [[Yin, Si, Shen], [Chou, Xu, Wei]];

/// Pair punishment (子刑卯).
pub const PUNISH_PAIRS: &[(Branch, Branch)] = &[(Zi, Mao)];

/// Branches that punish themselves when they appear twice.
pub const SELF_PUNISH: [Branch; 4] = [Chen, Wu, You, Hai];

/// Control-pair exponential loss parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RestrictionParams {
    pub max_loss_source: f64,
    pub max_loss_target: f64,
    pub alpha: f64,
    pub beta: f64,
}

/// Loss parameters for `source` controlling `target`. Pairs that are not a
/// control relation get a tiny capped loss from `default_source` and
/// `default_target`.
pub fn restriction(
    source: Element,
    target: Element,
    default_source: f64,
    default_target: f64,
) -> RestrictionParams {
    let typical = |k, b, alpha, beta| RestrictionParams {
        max_loss_source: k,
        max_loss_target: b,
        alpha,
        beta,
    };
    match (source, target) {
        (Wood, Earth) => typical(0.28, 0.25, 1.0, 1.0),
        (Fire, Metal) => typical(0.25, 0.32, 1.3, 1.2),
        (Earth, Water) => typical(0.22, 0.30, 1.5, 1.3),
        (Metal, Wood) => typical(0.18, 0.40, 2.0, 1.8),
        (Water, Fire) => typical(0.20, 0.38, 1.8, 1.6),
        _ => typical(default_source.min(0.01), default_target.min(0.01), 1.0, 1.0),
    }
}

/// Polarity pair lookup helper: (source, target).
fn polarity_pick(source: Polarity, target: Polarity, values: [f64; 4]) -> f64 {
    match (source, target) {
        (Polarity::Yang, Polarity::Yang) => values[0],
        (Polarity::Yang, Polarity::Yin) => values[1],
        (Polarity::Yin, Polarity::Yang) => values[2],
        (Polarity::Yin, Polarity::Yin) => values[3],
    }
}

/// Strength multiplier of a control by polarity pattern.
pub fn control_power_factor(source: Polarity, target: Polarity) -> f64 {
    polarity_pick(source, target, [1.4, 1.2, 0.9, 1.0])
}

/// `(base, max)` external coefficient for a generating pair.
pub fn external_polarity_coefficient(mother: Polarity, child: Polarity) -> (f64, f64) {
    (
        polarity_pick(mother, child, [1.2, 1.0, 0.6, 0.8]),
        polarity_pick(mother, child, [2.0, 1.8, 1.2, 1.5]),
    )
}

/// Additive external bonus for a mother → child element pair.
pub fn external_element_bonus(mother: Element, child: Element) -> f64 {
    match (mother, child) {
        (Wood, Fire) => 0.4,
        (Fire, Earth) => 0.2,
        (Earth, Metal) => 0.3,
        (Metal, Water) => 0.35,
        (Water, Wood) => 0.5,
        _ => 0.2,
    }
}

/// `(base, range)` transfer efficiency for a mother → child element pair.
pub fn transfer_efficiency_base(mother: Element, child: Element) -> (f64, f64) {
    match (mother, child) {
        (Wood, Fire) => (0.75, 0.1),
        (Fire, Earth) => (0.65, 0.1),
        (Earth, Metal) => (0.8, 0.15),
        (Metal, Water) => (0.85, 0.1),
        (Water, Wood) => (0.9, 0.05),
        _ => (0.7, 0.1),
    }
}

/// Transfer efficiency adjustment (in units of `range`) by polarity pattern.
pub fn transfer_polarity_adjust(mother: Polarity, child: Polarity) -> f64 {
    polarity_pick(mother, child, [0.8, 0.4, -0.2, 0.0])
}

/// Number of slots in the position interaction matrix.
pub const MATRIX_SIZE: usize = 18;

/// `M[i][j]`: strength of position `i` acting on position `j`.
///
/// Indices: 0–7 natal year/month/day/hour stem and branch, then luck (8, 9),
/// flowing year (10, 11), month (12, 13), day (14, 15), hour (16, 17).
#[rustfmt::skip]
pub const POSITION_MATRIX: [[f64; MATRIX_SIZE]; MATRIX_SIZE] = [
    [1.0, 1.0, 0.8, 0.0, 0.4, 0.0, 0.2, 0.0, 0.0, 0.0, 0.6, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
    [1.0, 1.0, 0.0, 0.8, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.6, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
    [0.8, 0.0, 1.0, 1.0, 0.8, 0.0, 0.4, 0.0, 0.0, 0.0, 0.4, 0.0, 0.6, 0.0, 0.0, 0.0, 0.0, 0.0],
    [0.0, 0.8, 1.0, 1.0, 0.0, 0.8, 0.0, 0.0, 0.0, 0.0, 0.0, 0.4, 0.0, 0.6, 0.0, 0.0, 0.0, 0.0],
    [0.4, 0.0, 0.8, 0.0, 1.0, 1.0, 0.8, 0.0, 0.0, 0.0, 0.6, 0.0, 0.4, 0.0, 0.6, 0.0, 0.4, 0.0],
    [0.0, 0.0, 0.0, 0.8, 1.0, 1.0, 0.0, 0.8, 0.0, 0.0, 0.0, 0.6, 0.0, 0.4, 0.0, 0.6, 0.0, 0.4],
    [0.2, 0.0, 0.4, 0.0, 0.8, 0.0, 1.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.4, 0.0, 0.6, 0.0],
    [0.0, 0.0, 0.0, 0.0, 0.0, 0.8, 1.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.4, 0.0, 0.6],
    [0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 0.8, 0.0, 0.6, 0.0, 0.4, 0.0, 0.2, 0.0],
    [0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 0.0, 0.8, 0.0, 0.6, 0.0, 0.4, 0.0, 0.2],
    [0.6, 0.0, 0.4, 0.0, 0.6, 0.0, 0.0, 0.0, 0.8, 0.0, 1.0, 1.0, 0.8, 0.0, 0.6, 0.0, 0.4, 0.0],
    [0.0, 0.6, 0.0, 0.4, 0.0, 0.6, 0.0, 0.0, 0.0, 0.8, 1.0, 1.0, 0.0, 0.8, 0.0, 0.6, 0.0, 0.4],
    [0.0, 0.0, 0.6, 0.0, 0.4, 0.0, 0.0, 0.0, 0.6, 0.0, 0.8, 0.0, 1.0, 1.0, 0.8, 0.0, 0.6, 0.0],
    [0.0, 0.0, 0.0, 0.6, 0.0, 0.4, 0.0, 0.0, 0.0, 0.6, 0.0, 0.8, 1.0, 1.0, 0.0, 0.8, 0.0, 0.6],
    [0.0, 0.0, 0.0, 0.0, 0.6, 0.0, 0.4, 0.0, 0.4, 0.0, 0.6, 0.0, 0.8, 0.0, 1.0, 1.0, 0.8, 0.0],
    [0.0, 0.0, 0.0, 0.0, 0.0, 0.6, 0.0, 0.4, 0.0, 0.4, 0.0, 0.6, 0.0, 0.8, 1.0, 1.0, 0.0, 0.8],
    [0.0, 0.0, 0.0, 0.0, 0.4, 0.0, 0.6, 0.0, 0.2, 0.0, 0.4, 0.0, 0.6, 0.0, 0.8, 0.0, 1.0, 1.0],
    [0.0, 0.0, 0.0, 0.0, 0.0, 0.4, 0.0, 0.6, 0.0, 0.2, 0.0, 0.4, 0.0, 0.6, 0.0, 0.8, 1.0, 1.0],
];

/// Base position weights for the eight natal slots (year stem … hour branch).
pub const NATAL_POSITION_WEIGHTS: [f64; 8] = [0.35, 0.3, 0.8, 1.0, 1.0, 0.9, 0.7, 0.5];

/// Position weight used by every dynamic-layer node.
pub const DYNAMIC_POSITION_WEIGHT: f64 = 1.0;
