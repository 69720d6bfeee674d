//! Generate/control relation network and main-cycle detection.
//!
//! Relations are built between stem nodes at element granularity: for every
//! element a source stem holds, an edge goes to every other stem that holds
//! the element it generates (or controls). Edges are ordered by the source's
//! then the target's position, so propagation order is deterministic.

use serde::Serialize;

use crate::element::Element;
use crate::node::{EnergyNode, NodeKind};
use crate::tables::MATRIX_SIZE;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RelationKind {
    Generate,
    Control,
}

/// Directed element-level edge between two nodes (indices into the node list).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Relation {
    pub kind: RelationKind,
    pub source: usize,
    pub source_element: Element,
    pub target: usize,
    pub target_element: Element,
}

/// Both relation lists, each sorted by position.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RelationSet {
    pub generate: Vec<Relation>,
    pub control: Vec<Relation>,
}

/// Build the relation network over the stem nodes of `nodes`.
pub fn build_relations(nodes: &[EnergyNode]) -> RelationSet {
    let stems: Vec<usize> = (0..nodes.len())
        .filter(|&i| nodes[i].kind() == NodeKind::Stem)
        .collect();

    let mut set = RelationSet::default();
    for &s in &stems {
        for source_element in nodes[s].present_elements() {
            let generated = source_element.generates();
            let controlled = source_element.controls();
            for &t in &stems {
                if t == s {
                    continue;
                }
                if nodes[t].has_element(generated) {
                    set.generate.push(Relation {
                        kind: RelationKind::Generate,
                        source: s,
                        source_element,
                        target: t,
                        target_element: generated,
                    });
                }
                if nodes[t].has_element(controlled) {
                    set.control.push(Relation {
                        kind: RelationKind::Control,
                        source: s,
                        source_element,
                        target: t,
                        target_element: controlled,
                    });
                }
            }
        }
    }

    let order = |r: &Relation| {
        nodes[r.source].position.matrix_index() * MATRIX_SIZE + nodes[r.target].position.matrix_index()
    };
    // sort_by_key is stable: ties keep element order.
    set.generate.sort_by_key(order);
    set.control.sort_by_key(order);

    log::trace!(
        "built {} generate and {} control relations",
        set.generate.len(),
        set.control.len()
    );
    set
}

/// Element order in which the main cycle is walked.
pub const CYCLE_ORDER: [Element; 5] = [
    Element::Metal,
    Element::Water,
    Element::Wood,
    Element::Fire,
    Element::Earth,
];

/// Closed generative loop: one node per element, in [`CYCLE_ORDER`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MainCycle {
    pub members: [usize; 5],
}

impl MainCycle {
    pub fn contains(&self, node: usize) -> bool {
        self.members.contains(&node)
    }

    /// `(mother, child)` pairs around the loop, closing back to the start.
    pub fn edges(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        (0..5).map(move |i| (self.members[i], self.members[(i + 1) % 5]))
    }

    /// True when `a` directly generates `b` around the loop.
    pub fn is_adjacent(&self, a: usize, b: usize) -> bool {
        self.edges().any(|edge| edge == (a, b))
    }
}

/// Pick the first node of each original element; `None` unless all five exist.
pub fn detect_main_cycle(nodes: &[EnergyNode]) -> Option<MainCycle> {
    let mut members = [0usize; 5];
    for (slot, element) in CYCLE_ORDER.iter().enumerate() {
        members[slot] = nodes.iter().position(|n| n.original_element == *element)?;
    }
    Some(MainCycle { members })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chart::{Branch, Pillar, Stem};
    use crate::config::EnergyConfig;
    use crate::node::NodeSlot;

    fn stem(s: Stem, p: Pillar) -> EnergyNode {
        EnergyNode::from_stem(s, NodeSlot::Natal(p), 1000.0, &EnergyConfig::default())
    }

    fn branch(b: Branch, p: Pillar) -> EnergyNode {
        EnergyNode::from_branch(b, NodeSlot::Natal(p), 1200.0, &EnergyConfig::default())
    }

    #[test]
    fn only_stems_get_edges() {
        let nodes = vec![
            stem(Stem::Jia, Pillar::Year),
            branch(Branch::Wu, Pillar::Year),
            stem(Stem::Bing, Pillar::Month),
            branch(Branch::Chen, Pillar::Month),
        ];
        let set = build_relations(&nodes);
        assert_eq!(set.generate.len(), 1);
        let r = set.generate[0];
        assert_eq!((r.source, r.target), (0, 2));
        assert_eq!((r.source_element, r.target_element), (Element::Wood, Element::Fire));
        assert!(set.control.is_empty());
    }

    #[test]
    fn edges_sorted_by_position() {
        // Hour stem listed first but sorts after the year stem.
        let nodes = vec![
            stem(Stem::Ren, Pillar::Hour),
            stem(Stem::Jia, Pillar::Year),
            stem(Stem::Wu, Pillar::Day),
        ];
        let set = build_relations(&nodes);
        let sources: Vec<usize> = set.control.iter().map(|r| r.source).collect();
        // year wood → day earth, day earth → hour water
        assert_eq!(sources, vec![1, 2]);
        let gen: Vec<(usize, usize)> = set.generate.iter().map(|r| (r.source, r.target)).collect();
        // hour water → year wood
        assert_eq!(gen, vec![(0, 1)]);
    }

    #[test]
    fn cycle_requires_all_elements() {
        let nodes = vec![
            stem(Stem::Jia, Pillar::Year),
            stem(Stem::Bing, Pillar::Month),
            stem(Stem::Wu, Pillar::Day),
            stem(Stem::Geng, Pillar::Hour),
        ];
        assert!(detect_main_cycle(&nodes).is_none());
    }

    #[test]
    fn cycle_picks_first_node_per_element() {
        let nodes = vec![
            stem(Stem::Jia, Pillar::Year),
            branch(Branch::Zi, Pillar::Year),
            stem(Stem::Bing, Pillar::Month),
            branch(Branch::Chen, Pillar::Month),
            stem(Stem::Geng, Pillar::Day),
            branch(Branch::Hai, Pillar::Day),
        ];
        let cycle = detect_main_cycle(&nodes).unwrap();
        // metal, water, wood, fire, earth
        assert_eq!(cycle.members, [4, 1, 0, 2, 3]);
        assert!(cycle.is_adjacent(3, 4));
        assert!(!cycle.is_adjacent(4, 3));
        assert!(!cycle.contains(5));
    }
}
