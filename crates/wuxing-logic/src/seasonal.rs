//! Initial corrections: rooting, seasonal command, and penetration.
//!
//! | Step | Applies to | Effect |
//! |------|-----------|--------|
//! | Rooting | natal stems | ×1.5 / ×1.2 / ×1.16 by hidden-element support |
//! | Seasonal command | every node | each element × month factor |
//! | Penetration | natal branches | elements revealed by a natal stem × 1.1 |

use crate::chart::{Branch, Pillar};
use crate::config::{EnergyConfig, SeasonalTable};
use crate::element::Element;
use crate::node::{EnergyNode, NodeKind};
use crate::tables;

/// Hidden-element ratio at or above which a same-pillar branch roots a stem.
pub const ROOT_RATIO: f64 = 0.6;
/// Hidden-element ratio at or above which a branch lends qi to a stem.
pub const QI_RATIO: f64 = 0.2;
/// Share of the qi bonus granted by a branch in another pillar.
pub const CROSS_PILLAR_QI_SHARE: f64 = 0.8;

/// Rooting factor for one stem given the natal branches around it.
fn rooting_factor(stem: &EnergyNode, branches: &[(Option<Pillar>, Branch)], config: &EnergyConfig) -> f64 {
    let element = stem.original_element;
    let pillar = stem.position.pillar();

    if let Some(&(_, same)) = branches.iter().find(|(p, _)| *p == pillar) {
        let ratio = tables::hidden_ratio(same, element);
        if ratio >= ROOT_RATIO {
            return config.root_gain_factor;
        }
        if ratio >= QI_RATIO {
            return config.qi_gain_factor;
        }
    }

    let cross = branches
        .iter()
        .filter(|(p, _)| *p != pillar)
        .any(|&(_, b)| tables::hidden_ratio(b, element) >= QI_RATIO);
    if cross {
        1.0 + (config.qi_gain_factor - 1.0) * CROSS_PILLAR_QI_SHARE
    } else {
        1.0
    }
}

/// Amplify natal stems supported by the hidden elements of natal branches.
pub fn apply_rooting(nodes: &mut [EnergyNode], config: &EnergyConfig) {
    let branches: Vec<_> = nodes
        .iter()
        .filter(|n| n.position.is_natal())
        .filter_map(|n| n.branch().map(|b| (n.position.pillar(), b)))
        .collect();

    for node in nodes.iter_mut() {
        if node.kind() != NodeKind::Stem || !node.position.is_natal() {
            continue;
        }
        let factor = rooting_factor(node, &branches, config);
        if factor == 1.0 {
            continue;
        }
        let element = node.original_element;
        let current = node.element_energy(element);
        if current > 0.0 {
            node.update_energy(element, current * (factor - 1.0), config);
            log::trace!("rooting {} ×{factor:.2}", node.name());
        }
    }
}

/// Seasonal factor for `element` in the month of `month_branch`.
pub fn seasonal_factor(month_branch: Branch, element: Element, config: &EnergyConfig) -> f64 {
    match config.seasonal_table {
        SeasonalTable::MonthCoefficients => tables::month_coefficients(month_branch)[element],
        SeasonalTable::OrderFactors => {
            let month = month_branch.main_element();
            if element == month {
                config.order_strong_factor
            } else if month.generates() == element {
                config.order_secondary_factor
            } else if element.generates() == month {
                config.order_drained_factor
            } else {
                config.order_weaken_factor
            }
        }
    }
}

/// Scale every present element of every node by its seasonal factor.
pub fn apply_seasonal_command(nodes: &mut [EnergyNode], month_branch: Branch, config: &EnergyConfig) {
    for node in nodes.iter_mut() {
        let present: Vec<Element> = node.present_elements().collect();
        for element in present {
            let current = node.element_energy(element);
            if current <= 0.0 {
                continue;
            }
            let factor = seasonal_factor(month_branch, element, config);
            node.update_energy(element, current * (factor - 1.0), config);
        }
    }
}

/// Strengthen natal branch elements that are revealed by a natal stem.
pub fn apply_penetration(nodes: &mut [EnergyNode], config: &EnergyConfig) {
    let mut revealed = [false; 5];
    for n in nodes.iter() {
        if n.kind() == NodeKind::Stem && n.position.is_natal() {
            revealed[n.original_element.index()] = true;
        }
    }

    for node in nodes.iter_mut() {
        if node.kind() != NodeKind::Branch || !node.position.is_natal() {
            continue;
        }
        let present: Vec<Element> = node.present_elements().collect();
        for element in present {
            if !revealed[element.index()] {
                continue;
            }
            let current = node.element_energy(element);
            if current > 0.0 {
                node.update_energy(element, current * (config.penetration_factor - 1.0), config);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chart::Stem;
    use crate::node::NodeSlot;
    use crate::time_weight::DynamicLayer;

    fn natal_pair(stem: Stem, branch: Branch, pillar: Pillar, config: &EnergyConfig) -> [EnergyNode; 2] {
        [
            EnergyNode::from_stem(stem, NodeSlot::Natal(pillar), config.stem_base_energy, config),
            EnergyNode::from_branch(branch, NodeSlot::Natal(pillar), config.branch_base_energy, config),
        ]
    }

    #[test]
    fn same_pillar_root() {
        let config = EnergyConfig::default();
        let mut nodes = natal_pair(Stem::Jia, Branch::Yin, Pillar::Year, &config);
        apply_rooting(&mut nodes, &config);
        assert!((nodes[0].element_energy(Element::Wood) - 1500.0).abs() < 1e-9);
    }

    #[test]
    fn same_pillar_qi() {
        let config = EnergyConfig::default();
        // 丙 on 寅: fire ratio 0.3
        let mut nodes = natal_pair(Stem::Bing, Branch::Yin, Pillar::Month, &config);
        apply_rooting(&mut nodes, &config);
        assert!((nodes[0].element_energy(Element::Fire) - 1200.0).abs() < 1e-9);
    }

    #[test]
    fn cross_pillar_qi() {
        let config = EnergyConfig::default();
        let mut nodes: Vec<EnergyNode> = natal_pair(Stem::Geng, Branch::Zi, Pillar::Year, &config).into();
        nodes.extend(natal_pair(Stem::Jia, Branch::You, Pillar::Month, &config));
        apply_rooting(&mut nodes, &config);
        // 庚 finds metal in 酉 of the month pillar
        assert!((nodes[0].element_energy(Element::Metal) - 1160.0).abs() < 1e-9);
        // 甲 finds no wood anywhere
        assert_eq!(nodes[2].element_energy(Element::Wood), 1000.0);
    }

    #[test]
    fn dynamic_stems_are_not_rooted() {
        let config = EnergyConfig::default();
        let mut nodes = vec![
            EnergyNode::from_stem(Stem::Jia, NodeSlot::Dynamic(DynamicLayer::Year), 1000.0, &config),
            EnergyNode::from_branch(Branch::Yin, NodeSlot::Natal(Pillar::Year), 1200.0, &config),
        ];
        apply_rooting(&mut nodes, &config);
        assert_eq!(nodes[0].element_energy(Element::Wood), 1000.0);
    }

    #[test]
    fn order_factors_by_relation() {
        let config = EnergyConfig::default();
        // 午 month: fire commands
        assert_eq!(seasonal_factor(Branch::Wu, Element::Fire, &config), 1.8);
        assert_eq!(seasonal_factor(Branch::Wu, Element::Earth, &config), 1.2);
        assert_eq!(seasonal_factor(Branch::Wu, Element::Wood, &config), 0.95);
        assert_eq!(seasonal_factor(Branch::Wu, Element::Metal, &config), 0.9);
        assert_eq!(seasonal_factor(Branch::Wu, Element::Water, &config), 0.9);
    }

    #[test]
    fn month_coefficient_table() {
        let config = EnergyConfig {
            seasonal_table: SeasonalTable::MonthCoefficients,
            ..EnergyConfig::default()
        };
        assert_eq!(seasonal_factor(Branch::Chou, Element::Earth, &config), 1.56);
        assert_eq!(seasonal_factor(Branch::Yin, Element::Wood, &config), 1.2);
    }

    #[test]
    fn seasonal_scales_every_element() {
        let config = EnergyConfig::default();
        let mut nodes = natal_pair(Stem::Ding, Branch::Wu, Pillar::Hour, &config);
        apply_seasonal_command(&mut nodes, Branch::Zi, &config);
        // 子 month (water): fire restrained, earth restrained
        assert!((nodes[0].element_energy(Element::Fire) - 900.0).abs() < 1e-9);
        assert!((nodes[1].element_energy(Element::Fire) - 840.0 * 0.9).abs() < 1e-9);
        assert!((nodes[1].element_energy(Element::Earth) - 360.0 * 0.9).abs() < 1e-9);
    }

    #[test]
    fn penetration_only_revealed_elements() {
        let config = EnergyConfig::default();
        let mut nodes = natal_pair(Stem::Wu, Branch::Yin, Pillar::Day, &config);
        apply_penetration(&mut nodes, &config);
        // earth revealed by 戊, wood and fire not
        assert!((nodes[1].element_energy(Element::Earth) - 132.0).abs() < 1e-9);
        assert!((nodes[1].element_energy(Element::Wood) - 720.0).abs() < 1e-9);
    }
}
