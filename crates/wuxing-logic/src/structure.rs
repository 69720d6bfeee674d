//! Structural stages: clash marking, combination/fusion, punishment and harm.
//!
//! Combinations are tried in priority order (three-assembly, three-harmony,
//! six-harmony, half-combination, then stem five-combinations). A node joins
//! at most one combination. A candidate fuses only when its participants
//! outweigh the element that would control the result by the configured
//! ratio; the month then decides how strongly it fuses.

use serde::Serialize;

use crate::chart::Branch;
use crate::config::EnergyConfig;
use crate::element::Element;
use crate::node::{EnergyNode, NodeFlag, NodeKind};
use crate::tables::{self, BranchCombination, CombinationKind};

/// A combination that passed its gate and moved energy.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Combination {
    pub kind: CombinationKind,
    pub result: Element,
    pub participants: Vec<usize>,
    pub strength: f64,
    pub energy_ratio: f64,
    pub pool: f64,
}

/// Flag both branches of every clash pair present in the chart.
/// Marker only; no energy moves.
pub fn mark_clashes(nodes: &mut [EnergyNode]) -> usize {
    let mut marked = 0;
    for (a, b) in tables::CLASH_PAIRS {
        let has = |br: Branch| nodes.iter().any(|n| n.branch() == Some(br));
        if !(has(a) && has(b)) {
            continue;
        }
        for node in nodes.iter_mut() {
            if matches!(node.branch(), Some(x) if x == a || x == b) {
                node.set_flag(NodeFlag::Clashed);
                marked += 1;
            }
        }
    }
    marked
}

/// `Σ participant totals / max(Σ participant energy in the controller of
/// result, min_energy)`.
pub fn combination_energy_ratio(
    nodes: &[EnergyNode],
    participants: &[usize],
    result: Element,
    config: &EnergyConfig,
) -> f64 {
    let controller = result.controlled_by();
    let total: f64 = participants.iter().map(|&i| nodes[i].total_energy()).sum();
    let opposing: f64 = participants
        .iter()
        .map(|&i| nodes[i].element_energy(controller))
        .sum();
    total / opposing.max(config.min_energy)
}

fn branch_strength(rule: &BranchCombination, month_branch: Branch) -> f64 {
    let month = month_branch.main_element();
    let favoured = |e: Element| e == month || month.generates() == e;
    let full = match rule.kind {
        CombinationKind::ThreeAssembly => rule.branches.contains(&month_branch),
        CombinationKind::ThreeHarmony => rule.centre.is_some_and(|c| favoured(c.main_element())),
        _ => favoured(rule.result),
    };
    if full {
        1.0
    } else {
        rule.kind.decay()
    }
}

fn stem_strength(result: Element, month_branch: Branch) -> f64 {
    if tables::peak_branch(result) == month_branch {
        1.0
    } else {
        CombinationKind::StemFive.decay()
    }
}

/// Move energy for one activated combination. Returns the pool size.
fn fuse(
    nodes: &mut [EnergyNode],
    participants: &[usize],
    kind: CombinationKind,
    result: Element,
    strength: f64,
    config: &EnergyConfig,
) -> f64 {
    let contribution_ratio = config.combination_contribution_ratio * kind.scale() * strength;
    let external_ratio = config.combination_external_gain
        * kind.scale()
        * strength
        * config.global_external_energy_ratio;

    let contributions: Vec<f64> = participants
        .iter()
        .map(|&i| nodes[i].total_energy() * contribution_ratio)
        .collect();
    let total: f64 = contributions.iter().sum();
    if total <= 0.0 {
        return 0.0;
    }
    let pool = total * (1.0 + external_ratio);

    for (&i, &c) in participants.iter().zip(&contributions) {
        nodes[i].distribute_energy(-c, config);
    }
    for (&i, &c) in participants.iter().zip(&contributions) {
        let share = if kind == CombinationKind::StemFive {
            pool / participants.len() as f64
        } else {
            pool * c / total
        };
        nodes[i].add_element(result, share, config);
        nodes[i].set_flag(NodeFlag::Combined);
    }
    pool
}

/// Try a candidate: gate on the energy ratio, then fuse.
fn try_combine(
    nodes: &mut [EnergyNode],
    participants: Vec<usize>,
    kind: CombinationKind,
    result: Element,
    strength: f64,
    config: &EnergyConfig,
) -> Option<Combination> {
    let energy_ratio = combination_energy_ratio(nodes, &participants, result, config);
    if energy_ratio < config.combination_energy_ratio_threshold {
        log::trace!(
            "{} → {result} rejected: ratio {energy_ratio:.2} below {}",
            kind.label(),
            config.combination_energy_ratio_threshold
        );
        return None;
    }
    let pool = fuse(nodes, &participants, kind, result, strength, config);
    log::trace!(
        "{} → {result} strength {strength} pool {pool:.1}",
        kind.label()
    );
    Some(Combination {
        kind,
        result,
        participants,
        strength,
        energy_ratio,
        pool,
    })
}

/// Run every combination rule in priority order.
pub fn handle_combinations(
    nodes: &mut [EnergyNode],
    month_branch: Branch,
    config: &EnergyConfig,
) -> Vec<Combination> {
    let mut activated = Vec::new();

    for rule in tables::BRANCH_COMBINATIONS {
        let participants: Option<Vec<usize>> = rule
            .branches
            .iter()
            .map(|&b| {
                nodes
                    .iter()
                    .position(|n| n.branch() == Some(b) && !n.has_flag(NodeFlag::Combined))
            })
            .collect();
        let Some(participants) = participants else {
            continue;
        };
        let strength = branch_strength(rule, month_branch);
        if let Some(c) = try_combine(nodes, participants, rule.kind, rule.result, strength, config) {
            activated.push(c);
        }
    }

    let stems: Vec<usize> = (0..nodes.len())
        .filter(|&i| nodes[i].kind() == NodeKind::Stem)
        .collect();
    for (k, &a) in stems.iter().enumerate() {
        for &b in &stems[k + 1..] {
            if nodes[a].has_flag(NodeFlag::Combined) || nodes[b].has_flag(NodeFlag::Combined) {
                continue;
            }
            let (Some(sa), Some(sb)) = (nodes[a].stem(), nodes[b].stem()) else {
                continue;
            };
            let Some(result) = tables::stem_combination(sa, sb) else {
                continue;
            };
            if nodes[a].total_energy() <= 0.0 || nodes[b].total_energy() <= 0.0 {
                continue;
            }
            let strength = stem_strength(result, month_branch);
            if let Some(c) = try_combine(
                nodes,
                vec![a, b],
                CombinationKind::StemFive,
                result,
                strength,
                config,
            ) {
                activated.push(c);
            }
        }
    }

    activated
}

/// Counts of nodes hit by each structural loss.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PunishHarmReport {
    pub punished: usize,
    pub harmed: usize,
    pub self_punished: usize,
}

fn take_loss(node: &mut EnergyNode, ratio: f64, flag: NodeFlag, config: &EnergyConfig) -> bool {
    let total = node.total_energy();
    if total <= 0.0 {
        return false;
    }
    node.distribute_energy(-total * ratio, config);
    node.set_flag(flag);
    true
}

/// Apply punishment, harm, and self-punishment losses. Combined nodes are exempt.
pub fn handle_punish_harm(nodes: &mut [EnergyNode], config: &EnergyConfig) -> PunishHarmReport {
    let mut report = PunishHarmReport::default();

    let free = |n: &EnergyNode, b: Branch, extra: &[NodeFlag]| {
        n.branch() == Some(b)
            && !n.has_flag(NodeFlag::Combined)
            && extra.iter().all(|f| !n.has_flag(*f))
    };

    for triple in tables::PUNISH_TRIPLES {
        let found: Option<Vec<usize>> = triple
            .iter()
            .map(|&b| nodes.iter().position(|n| free(n, b, &[NodeFlag::Punished])))
            .collect();
        if let Some(found) = found {
            for i in found {
                if take_loss(&mut nodes[i], config.punish_loss_ratio, NodeFlag::Punished, config) {
                    report.punished += 1;
                }
            }
        }
    }

    let pair_rounds = [
        (tables::PUNISH_PAIRS, config.punish_loss_ratio, NodeFlag::Punished),
        (tables::HARM_PAIRS, config.harm_loss_ratio, NodeFlag::Harmed),
    ];
    for (pairs, ratio, flag) in pair_rounds {
        for &(a, b) in pairs {
            let exempt = [NodeFlag::Punished, NodeFlag::Harmed];
            let side_a: Vec<usize> = (0..nodes.len()).filter(|&i| free(&nodes[i], a, &exempt)).collect();
            let side_b: Vec<usize> = (0..nodes.len()).filter(|&i| free(&nodes[i], b, &exempt)).collect();
            if side_a.is_empty() || side_b.is_empty() {
                continue;
            }
            for i in side_a.into_iter().chain(side_b) {
                if take_loss(&mut nodes[i], ratio, flag, config) {
                    match flag {
                        NodeFlag::Harmed => report.harmed += 1,
                        _ => report.punished += 1,
                    }
                }
            }
        }
    }

    for branch in tables::SELF_PUNISH {
        let exempt = [NodeFlag::Punished, NodeFlag::Harmed, NodeFlag::SelfPunished];
        let hits: Vec<usize> = (0..nodes.len())
            .filter(|&i| free(&nodes[i], branch, &exempt))
            .collect();
        if hits.len() < 2 {
            continue;
        }
        for i in hits {
            if take_loss(&mut nodes[i], config.self_punish_loss_ratio, NodeFlag::SelfPunished, config) {
                report.self_punished += 1;
            }
        }
    }

    report
}
