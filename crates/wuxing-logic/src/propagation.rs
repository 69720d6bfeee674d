//! Generate/control propagation and the final bounds pass.
//!
//! Every interaction is scaled by the polarity adjustment, the edge weight
//! (position × optional matrix coefficient), and the action
//! efficiency of the node being changed. Efficiencies are read before the
//! update; both nodes then count one action.

use serde::Serialize;

use crate::config::{EnergyConfig, PropagationModel};
use crate::element::{Element, Polarity};
use crate::node::EnergyNode;
use crate::relations::{MainCycle, Relation};
use crate::tables::{self, POSITION_MATRIX};
use crate::time_weight::calculate_effective_weight;

/// Give-ratio decay rate of the exchange model.
const EXCHANGE_ALPHA: f64 = 0.8;
/// Floor applied to energies before taking ratios.
const RATIO_FLOOR: f64 = 1e-6;

/// `1 + δ`: same-yang boosts, same-yin damps, mixed pairs are neutral.
pub fn polarity_adjust(source: Polarity, target: Polarity, config: &EnergyConfig) -> f64 {
    match (source, target) {
        (Polarity::Yang, Polarity::Yang) => 1.0 + config.same_yang_delta,
        (Polarity::Yin, Polarity::Yin) => 1.0 + config.same_yin_delta,
        _ => 1.0,
    }
}

/// Effective weight of the edge from `source` to `target`.
///
/// A dynamic node's time weight is already in its base energy, so the time
/// factor here is always 1.
pub fn edge_weight(source: &EnergyNode, target: &EnergyNode, config: &EnergyConfig) -> f64 {
    let position = source.position.position_weight() * target.position.position_weight();
    let matrix = if config.enable_position_matrix {
        POSITION_MATRIX[source.position.matrix_index()][target.position.matrix_index()]
    } else {
        1.0
    };
    calculate_effective_weight(position, 1.0, matrix)
}

/// Energy moved by one generate interaction, before efficiency and weight.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerateFlow {
    /// Drained from the mother.
    pub given: f64,
    /// Added to the child.
    pub received: f64,
}

/// Linear model: the child gains a fixed share of the mother; the mother keeps hers.
pub fn linear_generate(mother_energy: f64, gain: f64, adjust: f64) -> GenerateFlow {
    GenerateFlow {
        given: 0.0,
        received: mother_energy * gain * adjust,
    }
}

/// Inputs of an exchange-model generate step.
#[derive(Debug, Clone, Copy)]
pub struct ExchangeInput {
    pub mother_energy: f64,
    pub child_energy: f64,
    pub mother_element: Element,
    pub child_element: Element,
    pub mother_polarity: Polarity,
    pub child_polarity: Polarity,
    /// `cycle_generate_gain / relation_generate_gain` on cycle edges, else 1.
    pub boost: f64,
}

/// Exchange model: the mother gives a decaying share, the environment adds
/// an external top-up, and the child receives both at a transfer efficiency.
pub fn exchange_generate(input: &ExchangeInput, config: &EnergyConfig) -> GenerateFlow {
    let em = input.mother_energy.max(RATIO_FLOOR);
    let ec = input.child_energy.max(RATIO_FLOOR);
    let r = em / ec;
    let boost = input.boost;

    let max_give = config.relation_generate_gain * boost;
    let min_give = (0.005 * boost).min(max_give * 0.2);
    let give_ratio = (max_give * (-EXCHANGE_ALPHA * r).exp()).clamp(min_give, max_give);
    let given = em * give_ratio;

    let (yy_base, yy_max) =
        tables::external_polarity_coefficient(input.mother_polarity, input.child_polarity);
    let bonus = tables::external_element_bonus(input.mother_element, input.child_element);
    let ratio_factor = if r >= 1.0 {
        (1.0 + (r - 1.0) * 0.1).min(1.2)
    } else {
        r.max(0.6)
    };
    let coefficient = ((yy_base + bonus) * ratio_factor * boost).clamp(0.1, (yy_max * boost).max(0.1));

    let (eff_base, eff_range) =
        tables::transfer_efficiency_base(input.mother_element, input.child_element);
    let mut efficiency = eff_base
        + tables::transfer_polarity_adjust(input.mother_polarity, input.child_polarity) * eff_range;
    if r < 1.0 {
        efficiency *= 0.5 + r * 0.5;
    } else if r > 2.0 {
        efficiency *= 1.0 - (r - 2.0) * 0.05;
    }
    let efficiency = efficiency.clamp(0.05, 0.95);

    let mut external = coefficient * config.global_external_energy_ratio;
    if external <= efficiency {
        external = efficiency + 0.1;
    }

    GenerateFlow {
        given,
        received: (given + given * external) * efficiency,
    }
}

/// Loss ratios of one control interaction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControlLoss {
    pub source_ratio: f64,
    pub target_ratio: f64,
}

/// Linear model: the controller pays a fixed share; the target's loss
/// saturates with the energy ratio.
pub fn linear_control(
    source_energy: f64,
    target_energy: f64,
    source: Element,
    target: Element,
    adjust: f64,
    config: &EnergyConfig,
) -> ControlLoss {
    let min_loss = config.control_min_loss_ratio;
    let max_loss = config.relation_control_target_loss;
    let beta = tables::restriction(source, target, 1.0, 1.0).beta;
    let r = source_energy.max(RATIO_FLOOR) / target_energy.max(RATIO_FLOOR);

    let raw = (max_loss * (1.0 - (-beta * r).exp())).max(min_loss) * adjust;
    ControlLoss {
        source_ratio: config.relation_control_source_loss * adjust,
        target_ratio: raw.clamp(min_loss, max_loss),
    }
}

/// Exchange model: per-pair exponential losses with the yin-yang power factor.
pub fn exchange_control(
    source_energy: f64,
    target_energy: f64,
    source: (Element, Polarity),
    target: (Element, Polarity),
    adjust: f64,
    config: &EnergyConfig,
) -> ControlLoss {
    let params = tables::restriction(
        source.0,
        target.0,
        config.relation_control_source_loss,
        config.relation_control_target_loss,
    );
    let min_loss = config.control_min_loss_ratio;
    let r = source_energy.max(RATIO_FLOOR) / target_energy.max(RATIO_FLOOR);
    let power = tables::control_power_factor(source.1, target.1);

    let k = (params.max_loss_source * (-params.alpha * r).exp()).max(min_loss) * adjust * power;
    let b = (params.max_loss_target * (1.0 - (-params.beta * r).exp())).max(min_loss) * adjust * power;
    ControlLoss {
        source_ratio: k.min(params.max_loss_source).max(min_loss),
        target_ratio: b.min(params.max_loss_target).max(min_loss),
    }
}

/// Two distinct nodes borrowed mutably.
fn pair_mut(nodes: &mut [EnergyNode], a: usize, b: usize) -> (&mut EnergyNode, &mut EnergyNode) {
    debug_assert_ne!(a, b);
    if a < b {
        let (lo, hi) = nodes.split_at_mut(b);
        (&mut lo[a], &mut hi[0])
    } else {
        let (lo, hi) = nodes.split_at_mut(a);
        (&mut hi[0], &mut lo[b])
    }
}

/// Counts of interactions that moved energy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PropagationStats {
    pub cycle_edges: usize,
    pub generate_edges: usize,
    pub control_edges: usize,
}

fn generate_once(
    nodes: &mut [EnergyNode],
    from: (usize, Element),
    to: (usize, Element),
    on_cycle: bool,
    config: &EnergyConfig,
) -> bool {
    let (mother, child) = pair_mut(nodes, from.0, to.0);
    let em = mother.element_energy(from.1);
    let ec = child.element_energy(to.1);
    if em <= 0.0 || ec <= 0.0 {
        return false;
    }

    let mother_eff = mother.action_efficiency();
    let child_eff = child.action_efficiency();
    let adjust = polarity_adjust(mother.polarity, child.polarity, config);
    let weight = edge_weight(mother, child, config);

    let flow = match config.propagation_model {
        PropagationModel::Linear => {
            let gain = if on_cycle {
                config.cycle_generate_gain
            } else {
                config.relation_generate_gain
            };
            linear_generate(em, gain, adjust)
        }
        PropagationModel::Exchange => {
            let boost = if on_cycle {
                config.cycle_generate_gain / config.relation_generate_gain.max(RATIO_FLOOR)
            } else {
                1.0
            };
            let input = ExchangeInput {
                mother_energy: em,
                child_energy: ec,
                mother_element: from.1,
                child_element: to.1,
                mother_polarity: mother.polarity,
                child_polarity: child.polarity,
                boost,
            };
            let flow = exchange_generate(&input, config);
            GenerateFlow {
                given: flow.given * adjust,
                received: flow.received * adjust,
            }
        }
    };

    if flow.given > 0.0 {
        mother.update_energy(from.1, -flow.given * mother_eff * weight, config);
    }
    if flow.received > 0.0 {
        child.update_energy(to.1, flow.received * child_eff * weight, config);
    }
    mother.increment_action_count();
    child.increment_action_count();
    true
}

/// Run the main cycle, then every generate relation not already covered by it.
pub fn apply_generate(
    nodes: &mut [EnergyNode],
    relations: &[Relation],
    cycle: Option<&MainCycle>,
    config: &EnergyConfig,
) -> PropagationStats {
    let mut stats = PropagationStats::default();

    if let Some(cycle) = cycle {
        for (m, c) in cycle.edges() {
            let from = (m, nodes[m].original_element);
            let to = (c, nodes[c].original_element);
            if generate_once(nodes, from, to, true, config) {
                stats.cycle_edges += 1;
            }
        }
    }

    for rel in relations {
        if cycle.is_some_and(|c| c.contains(rel.source) && c.contains(rel.target)) {
            continue;
        }
        let from = (rel.source, rel.source_element);
        let to = (rel.target, rel.target_element);
        if generate_once(nodes, from, to, false, config) {
            stats.generate_edges += 1;
        }
    }

    log::debug!(
        "generate: {} cycle edges, {} relation edges",
        stats.cycle_edges,
        stats.generate_edges
    );
    stats
}

/// Apply every control relation in order.
pub fn apply_control(nodes: &mut [EnergyNode], relations: &[Relation], config: &EnergyConfig) -> usize {
    let mut applied = 0;
    for rel in relations {
        let (source, target) = pair_mut(nodes, rel.source, rel.target);
        let es = source.element_energy(rel.source_element);
        let et = target.element_energy(rel.target_element);
        if es <= 0.0 || et <= 0.0 {
            continue;
        }

        let source_eff = source.action_efficiency();
        let target_eff = target.action_efficiency();
        let adjust = polarity_adjust(source.polarity, target.polarity, config);
        let weight = edge_weight(source, target, config);

        let loss = match config.propagation_model {
            PropagationModel::Linear => linear_control(
                es,
                et,
                rel.source_element,
                rel.target_element,
                adjust,
                config,
            ),
            PropagationModel::Exchange => exchange_control(
                es,
                et,
                (rel.source_element, source.polarity),
                (rel.target_element, target.polarity),
                adjust,
                config,
            ),
        };

        source.update_energy(rel.source_element, -es * loss.source_ratio * source_eff * weight, config);
        target.update_energy(rel.target_element, -et * loss.target_ratio * target_eff * weight, config);
        source.increment_action_count();
        target.increment_action_count();
        applied += 1;
    }
    log::debug!("control: {applied} relation edges");
    applied
}

/// Pull every node total back inside `[min_energy, max_energy]`.
pub fn apply_energy_bounds(nodes: &mut [EnergyNode], config: &EnergyConfig) {
    for node in nodes.iter_mut() {
        let total = node.total_energy();
        if total <= 0.0 {
            node.update_energy(node.original_element, config.min_energy, config);
        } else if total > config.max_energy {
            node.distribute_energy(total * (config.max_energy / total - 1.0), config);
        } else if total < config.min_energy {
            node.distribute_energy(config.min_energy - total, config);
        }
    }
}
