//! Energy nodes: one per stem or branch glyph in the chart.
//!
//! A node stores energy per element (`None` = the element is absent, which
//! matters for relation building), structural flags, and an action counter
//! that dampens repeated interactions. Every write goes through
//! [`EnergyNode::update_energy`], which clamps into the configured bounds.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::chart::{Branch, Pillar, Stem};
use crate::config::EnergyConfig;
use crate::element::{Element, ElementMap, Polarity};
use crate::tables::{self, DYNAMIC_POSITION_WEIGHT, NATAL_POSITION_WEIGHTS};
use crate::time_weight::{DynamicLayer, TimeLayer};

/// Efficiency by number of prior actions; the last value repeats forever.
pub const ACTION_EFFICIENCY: [f64; 4] = [1.0, 0.5, 0.25, 0.125];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Stem,
    Branch,
}

/// The glyph a node was built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Glyph {
    Stem(Stem),
    Branch(Branch),
}

impl Glyph {
    pub fn kind(self) -> NodeKind {
        match self {
            Glyph::Stem(_) => NodeKind::Stem,
            Glyph::Branch(_) => NodeKind::Branch,
        }
    }

    pub fn as_branch(self) -> Option<Branch> {
        match self {
            Glyph::Branch(b) => Some(b),
            Glyph::Stem(_) => None,
        }
    }

    pub fn as_stem(self) -> Option<Stem> {
        match self {
            Glyph::Stem(s) => Some(s),
            Glyph::Branch(_) => None,
        }
    }
}

impl fmt::Display for Glyph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Glyph::Stem(s) => write!(f, "{s}"),
            Glyph::Branch(b) => write!(f, "{b}"),
        }
    }
}

/// Natal pillar or dynamic layer a node sits in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeSlot {
    Natal(Pillar),
    Dynamic(DynamicLayer),
}

/// Where a node sits: slot plus stem/branch half.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodePosition {
    pub slot: NodeSlot,
    pub kind: NodeKind,
}

impl NodePosition {
    pub fn natal(pillar: Pillar, kind: NodeKind) -> Self {
        Self {
            slot: NodeSlot::Natal(pillar),
            kind,
        }
    }

    pub fn dynamic(layer: DynamicLayer, kind: NodeKind) -> Self {
        Self {
            slot: NodeSlot::Dynamic(layer),
            kind,
        }
    }

    /// Row/column in the 18×18 position matrix; also the canonical sort key
    /// (year stem, year branch, …, hour branch, then luck … hour layers).
    pub fn matrix_index(self) -> usize {
        let base = match self.slot {
            NodeSlot::Natal(p) => p.index() * 2,
            NodeSlot::Dynamic(layer) => 8 + layer.index() * 2,
        };
        match self.kind {
            NodeKind::Stem => base,
            NodeKind::Branch => base + 1,
        }
    }

    pub fn position_weight(self) -> f64 {
        match self.slot {
            NodeSlot::Natal(_) => NATAL_POSITION_WEIGHTS[self.matrix_index()],
            NodeSlot::Dynamic(_) => DYNAMIC_POSITION_WEIGHT,
        }
    }

    pub fn time_layer(self) -> TimeLayer {
        match self.slot {
            NodeSlot::Natal(_) => TimeLayer::Natal,
            NodeSlot::Dynamic(layer) => layer.into(),
        }
    }

    pub fn is_natal(self) -> bool {
        matches!(self.slot, NodeSlot::Natal(_))
    }

    pub fn pillar(self) -> Option<Pillar> {
        match self.slot {
            NodeSlot::Natal(p) => Some(p),
            NodeSlot::Dynamic(_) => None,
        }
    }

    /// Human-readable label such as "month branch" or "flowing year stem".
    pub fn label(self) -> String {
        let half = match self.kind {
            NodeKind::Stem => "stem",
            NodeKind::Branch => "branch",
        };
        match self.slot {
            NodeSlot::Natal(p) => format!("{p} {half}"),
            NodeSlot::Dynamic(DynamicLayer::Luck) => format!("luck {half}"),
            NodeSlot::Dynamic(layer) => format!("flowing {layer} {half}"),
        }
    }
}

/// Structural markers set during the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NodeFlag {
    DayMaster,
    Combined,
    Clashed,
    Punished,
    Harmed,
    SelfPunished,
}

impl NodeFlag {
    pub fn all() -> [NodeFlag; 6] {
        [
            NodeFlag::DayMaster,
            NodeFlag::Combined,
            NodeFlag::Clashed,
            NodeFlag::Punished,
            NodeFlag::Harmed,
            NodeFlag::SelfPunished,
        ]
    }

    fn bit(self) -> u8 {
        1 << (self as u8)
    }
}

/// Bit set of [`NodeFlag`]s.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NodeFlags(u8);

impl NodeFlags {
    pub fn insert(&mut self, flag: NodeFlag) {
        self.0 |= flag.bit();
    }

    pub fn contains(self, flag: NodeFlag) -> bool {
        self.0 & flag.bit() != 0
    }

    pub fn iter(self) -> impl Iterator<Item = NodeFlag> {
        NodeFlag::all().into_iter().filter(move |f| self.contains(*f))
    }
}

impl Serialize for NodeFlags {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.iter())
    }
}

/// A stem or branch carrying per-element energy.
#[derive(Debug, Clone, PartialEq)]
pub struct EnergyNode {
    pub glyph: Glyph,
    pub position: NodePosition,
    pub original_element: Element,
    pub polarity: Polarity,
    energies: ElementMap<Option<f64>>,
    flags: NodeFlags,
    action_count: u32,
}

impl EnergyNode {
    /// A stem node holding `base` energy in its own element.
    pub fn from_stem(stem: Stem, slot: NodeSlot, base: f64, config: &EnergyConfig) -> Self {
        let mut node = Self::empty(Glyph::Stem(stem), slot, stem.element(), stem.polarity());
        node.update_energy(stem.element(), base, config);
        node
    }

    /// A branch node with `base` split over its hidden elements.
    pub fn from_branch(branch: Branch, slot: NodeSlot, base: f64, config: &EnergyConfig) -> Self {
        let mut node = Self::empty(
            Glyph::Branch(branch),
            slot,
            branch.main_element(),
            branch.polarity(),
        );
        for &(element, ratio) in tables::hidden_elements(branch) {
            node.update_energy(element, base * ratio, config);
        }
        node
    }

    fn empty(glyph: Glyph, slot: NodeSlot, original_element: Element, polarity: Polarity) -> Self {
        Self {
            glyph,
            position: NodePosition {
                slot,
                kind: glyph.kind(),
            },
            original_element,
            polarity,
            energies: ElementMap::splat(None),
            flags: NodeFlags::default(),
            action_count: 0,
        }
    }

    pub fn kind(&self) -> NodeKind {
        self.position.kind
    }

    pub fn name(&self) -> String {
        self.glyph.to_string()
    }

    pub fn branch(&self) -> Option<Branch> {
        self.glyph.as_branch()
    }

    pub fn stem(&self) -> Option<Stem> {
        self.glyph.as_stem()
    }

    pub fn total_energy(&self) -> f64 {
        self.energies.0.iter().flatten().sum()
    }

    pub fn element_energy(&self, element: Element) -> f64 {
        self.energies[element].unwrap_or(0.0)
    }

    pub fn has_element(&self, element: Element) -> bool {
        self.energies[element].is_some()
    }

    /// Elements that currently hold an entry, in generation order.
    pub fn present_elements(&self) -> impl Iterator<Item = Element> + '_ {
        self.energies.iter().filter(|(_, v)| v.is_some()).map(|(e, _)| e)
    }

    pub fn energies(&self) -> &ElementMap<Option<f64>> {
        &self.energies
    }

    /// Add `delta` to `element` and clamp into `[min_energy, max_energy]`.
    /// Creates the entry if absent.
    pub fn update_energy(&mut self, element: Element, delta: f64, config: &EnergyConfig) {
        let next = self.element_energy(element) + delta;
        self.energies[element] = Some(next.clamp(config.min_energy, config.max_energy));
    }

    pub fn add_element(&mut self, element: Element, value: f64, config: &EnergyConfig) {
        self.update_energy(element, value, config);
    }

    /// Spread `total_delta` over present elements in proportion to their share.
    pub fn distribute_energy(&mut self, total_delta: f64, config: &EnergyConfig) {
        let present: Vec<Element> = self.present_elements().collect();
        if present.is_empty() {
            self.update_energy(self.original_element, total_delta, config);
            return;
        }

        let total = self.total_energy();
        if total <= 0.0 {
            let per = total_delta / present.len() as f64;
            for element in present {
                self.update_energy(element, per, config);
            }
            return;
        }

        // Shares are read before any write so later elements see the same split.
        let shares: Vec<(Element, f64)> = present
            .into_iter()
            .map(|e| (e, self.element_energy(e) / total))
            .collect();
        for (element, share) in shares {
            self.update_energy(element, total_delta * share, config);
        }
    }

    pub fn set_flag(&mut self, flag: NodeFlag) {
        self.flags.insert(flag);
    }

    pub fn has_flag(&self, flag: NodeFlag) -> bool {
        self.flags.contains(flag)
    }

    pub fn flags(&self) -> NodeFlags {
        self.flags
    }

    pub fn action_count(&self) -> u32 {
        self.action_count
    }

    pub fn increment_action_count(&mut self) {
        self.action_count = self.action_count.saturating_add(1);
    }

    pub fn reset_action_count(&mut self) {
        self.action_count = 0;
    }

    pub fn action_efficiency(&self) -> f64 {
        let last = ACTION_EFFICIENCY.len() - 1;
        ACTION_EFFICIENCY[(self.action_count as usize).min(last)]
    }

    pub fn snapshot(&self) -> NodeSnapshot {
        NodeSnapshot {
            name: self.name(),
            kind: self.kind(),
            position: self.position.label(),
            original_element: self.original_element,
            polarity: self.polarity,
            total: self.total_energy(),
            energies: self.energies,
            flags: self.flags,
        }
    }
}

/// Frozen copy of a node for the stage log.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeSnapshot {
    pub name: String,
    pub kind: NodeKind,
    pub position: String,
    pub original_element: Element,
    pub polarity: Polarity,
    pub total: f64,
    pub energies: ElementMap<Option<f64>>,
    pub flags: NodeFlags,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> EnergyConfig {
        EnergyConfig::default()
    }

    #[test]
    fn stem_node_starts_with_base() {
        let node = EnergyNode::from_stem(Stem::Bing, NodeSlot::Natal(Pillar::Month), 1000.0, &cfg());
        assert_eq!(node.element_energy(Element::Fire), 1000.0);
        assert_eq!(node.total_energy(), 1000.0);
        assert!(!node.has_element(Element::Water));
        assert_eq!(node.position.label(), "month stem");
    }

    #[test]
    fn branch_node_splits_hidden_elements() {
        let node = EnergyNode::from_branch(Branch::Yin, NodeSlot::Natal(Pillar::Year), 1200.0, &cfg());
        assert!((node.element_energy(Element::Wood) - 720.0).abs() < 1e-9);
        assert!((node.element_energy(Element::Fire) - 360.0).abs() < 1e-9);
        assert!((node.element_energy(Element::Earth) - 120.0).abs() < 1e-9);
        assert!((node.total_energy() - 1200.0).abs() < 1e-9);
        assert_eq!(node.original_element, Element::Wood);
    }

    #[test]
    fn update_clamps_both_ways() {
        let config = cfg();
        let mut node = EnergyNode::from_stem(Stem::Jia, NodeSlot::Natal(Pillar::Day), 1000.0, &config);
        node.update_energy(Element::Wood, -5000.0, &config);
        assert_eq!(node.element_energy(Element::Wood), config.min_energy);
        node.update_energy(Element::Wood, 1e9, &config);
        assert_eq!(node.element_energy(Element::Wood), config.max_energy);
        node.add_element(Element::Metal, 3.0, &config);
        assert_eq!(node.element_energy(Element::Metal), config.min_energy);
    }

    #[test]
    fn distribute_is_proportional() {
        let config = cfg();
        let mut node = EnergyNode::from_branch(Branch::Wu, NodeSlot::Natal(Pillar::Hour), 1000.0, &config);
        // fire 700, earth 300
        node.distribute_energy(-100.0, &config);
        assert!((node.element_energy(Element::Fire) - 630.0).abs() < 1e-9);
        assert!((node.element_energy(Element::Earth) - 270.0).abs() < 1e-9);
    }

    #[test]
    fn efficiency_sequence() {
        let mut node = EnergyNode::from_stem(Stem::Yi, NodeSlot::Natal(Pillar::Year), 1000.0, &cfg());
        let mut seen = Vec::new();
        for _ in 0..5 {
            seen.push(node.action_efficiency());
            node.increment_action_count();
        }
        assert_eq!(seen, vec![1.0, 0.5, 0.25, 0.125, 0.125]);
        node.reset_action_count();
        assert_eq!(node.action_efficiency(), 1.0);
    }

    #[test]
    fn flags_are_independent() {
        let mut node = EnergyNode::from_branch(Branch::Zi, NodeSlot::Natal(Pillar::Day), 1200.0, &cfg());
        node.set_flag(NodeFlag::Clashed);
        node.set_flag(NodeFlag::Harmed);
        assert!(node.has_flag(NodeFlag::Clashed));
        assert!(node.has_flag(NodeFlag::Harmed));
        assert!(!node.has_flag(NodeFlag::Combined));
        let json = serde_json::to_string(&node.snapshot()).unwrap();
        assert!(json.contains(r#""flags":["clashed","harmed"]"#));
    }

    #[test]
    fn matrix_indices() {
        assert_eq!(NodePosition::natal(Pillar::Year, NodeKind::Stem).matrix_index(), 0);
        assert_eq!(NodePosition::natal(Pillar::Hour, NodeKind::Branch).matrix_index(), 7);
        assert_eq!(NodePosition::dynamic(DynamicLayer::Luck, NodeKind::Stem).matrix_index(), 8);
        assert_eq!(NodePosition::dynamic(DynamicLayer::Hour, NodeKind::Branch).matrix_index(), 17);
        assert_eq!(NodePosition::natal(Pillar::Month, NodeKind::Branch).position_weight(), 1.0);
        assert_eq!(NodePosition::natal(Pillar::Year, NodeKind::Stem).position_weight(), 0.35);
        assert_eq!(NodePosition::natal(Pillar::Day, NodeKind::Stem).time_layer(), TimeLayer::Natal);
        assert_eq!(
            NodePosition::dynamic(DynamicLayer::Month, NodeKind::Branch).time_layer(),
            TimeLayer::Month
        );
    }
}
