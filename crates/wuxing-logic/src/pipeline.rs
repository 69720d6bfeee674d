//! The energy pipeline: one pass from chart to bounded node energies.
//!
//! Stages run in a fixed order and each appends a snapshot of every node to
//! the [`StageLog`]. The log is returned next to the final state; nothing is
//! kept between runs, so the same input always yields the same output.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::chart::{FourPillars, Jiazi};
use crate::config::EnergyConfig;
use crate::error::Result;
use crate::element::{Element, ElementMap};
use crate::node::{EnergyNode, NodeFlag, NodeSlot, NodeSnapshot};
use crate::propagation::{self, PropagationStats};
use crate::relations::{self, MainCycle, RelationSet};
use crate::seasonal;
use crate::structure::{self, Combination, PunishHarmReport};
use crate::time_weight::{time_weight, DynamicLayer};

/// Pipeline stages in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Stage {
    Init,
    Rooting,
    Seasonal,
    Penetration,
    Clash,
    Combine,
    PunishHarm,
    Relations,
    Cycle,
    Generate,
    Control,
    Bounds,
}

impl Stage {
    pub fn all() -> [Stage; 12] {
        [
            Stage::Init,
            Stage::Rooting,
            Stage::Seasonal,
            Stage::Penetration,
            Stage::Clash,
            Stage::Combine,
            Stage::PunishHarm,
            Stage::Relations,
            Stage::Cycle,
            Stage::Generate,
            Stage::Control,
            Stage::Bounds,
        ]
    }

    pub fn id(self) -> &'static str {
        match self {
            Stage::Init => "init",
            Stage::Rooting => "rooting",
            Stage::Seasonal => "seasonal",
            Stage::Penetration => "penetration",
            Stage::Clash => "clash",
            Stage::Combine => "combine",
            Stage::PunishHarm => "punishHarm",
            Stage::Relations => "relations",
            Stage::Cycle => "cycle",
            Stage::Generate => "generate",
            Stage::Control => "control",
            Stage::Bounds => "bounds",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageEntry {
    pub step: Stage,
    pub description: String,
    pub nodes: Vec<NodeSnapshot>,
}

/// Ordered record of every stage of one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct StageLog {
    entries: Vec<StageEntry>,
}

impl StageLog {
    pub fn record(&mut self, step: Stage, description: impl Into<String>, nodes: &[EnergyNode]) {
        let description = description.into();
        log::debug!("[{step}] {description}");
        self.entries.push(StageEntry {
            step,
            description,
            nodes: nodes.iter().map(EnergyNode::snapshot).collect(),
        });
    }

    pub fn entries(&self) -> &[StageEntry] {
        &self.entries
    }

    pub fn get(&self, step: Stage) -> Option<&StageEntry> {
        self.entries.iter().find(|e| e.step == step)
    }

    pub fn steps(&self) -> impl Iterator<Item = Stage> + '_ {
        self.entries.iter().map(|e| e.step)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A dynamic-layer pillar merged over the natal chart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DynamicPillar {
    pub layer: DynamicLayer,
    pub term: Jiazi,
}

impl DynamicPillar {
    /// Pillar for `layer` from a two-glyph term such as `"甲子"`.
    pub fn parse(layer: DynamicLayer, term: &str) -> Result<Self> {
        Ok(Self {
            layer,
            term: term.parse()?,
        })
    }
}

/// Everything one computation produced.
#[derive(Debug, Clone)]
pub struct ChartState {
    pub chart: FourPillars,
    pub nodes: Vec<EnergyNode>,
    pub relations: RelationSet,
    pub main_cycle: Option<MainCycle>,
    pub config: EnergyConfig,
    /// Element totals just before propagation.
    pub raw_totals: ElementMap<f64>,
    pub combinations: Vec<Combination>,
    pub punish_harm: PunishHarmReport,
    pub propagation: PropagationStats,
}

impl ChartState {
    /// Sum of each element over every node.
    pub fn element_totals(&self) -> ElementMap<f64> {
        element_totals(&self.nodes)
    }

    pub fn day_master_node(&self) -> Option<&EnergyNode> {
        self.nodes.iter().find(|n| n.has_flag(NodeFlag::DayMaster))
    }

    /// Names of the main-cycle nodes in cycle order.
    pub fn main_cycle_names(&self) -> Vec<String> {
        self.main_cycle
            .map(|c| c.members.iter().map(|&i| self.nodes[i].name()).collect())
            .unwrap_or_default()
    }
}

pub fn element_totals(nodes: &[EnergyNode]) -> ElementMap<f64> {
    ElementMap::from_fn(|e: Element| nodes.iter().map(|n| n.element_energy(e)).sum())
}

fn build_nodes(chart: &FourPillars, dynamic: &[DynamicPillar], config: &EnergyConfig) -> Vec<EnergyNode> {
    let mut nodes = Vec::with_capacity(8 + dynamic.len() * 2);
    for (pillar, sb) in chart.pillars() {
        let slot = NodeSlot::Natal(pillar);
        nodes.push(EnergyNode::from_stem(sb.stem, slot, config.stem_base_energy, config));
        nodes.push(EnergyNode::from_branch(sb.branch, slot, config.branch_base_energy, config));
    }
    if let Some(day) = nodes.get_mut(4) {
        day.set_flag(NodeFlag::DayMaster);
    }

    for pillar in dynamic {
        let weight = time_weight(pillar.layer.into(), config);
        let slot = NodeSlot::Dynamic(pillar.layer);
        nodes.push(EnergyNode::from_stem(
            pillar.term.stem(),
            slot,
            config.stem_base_energy * weight,
            config,
        ));
        nodes.push(EnergyNode::from_branch(
            pillar.term.branch(),
            slot,
            config.branch_base_energy * weight,
            config,
        ));
    }
    nodes
}

/// Run every stage over `chart` plus any `dynamic` pillars.
///
/// `config` is used as given; callers validate it first.
pub fn run_pipeline(
    chart: &FourPillars,
    dynamic: &[DynamicPillar],
    config: &EnergyConfig,
) -> (ChartState, StageLog) {
    let mut stages = StageLog::default();
    let month_branch = chart.month_branch();

    let mut nodes = build_nodes(chart, dynamic, config);
    stages.record(
        Stage::Init,
        format!("base allocation for {chart} with {} dynamic pillars", dynamic.len()),
        &nodes,
    );

    seasonal::apply_rooting(&mut nodes, config);
    stages.record(Stage::Rooting, "rooting and qi gaining on natal stems", &nodes);

    seasonal::apply_seasonal_command(&mut nodes, month_branch, config);
    stages.record(
        Stage::Seasonal,
        format!("seasonal command of the {month_branch} month ({:?})", config.seasonal_table),
        &nodes,
    );

    seasonal::apply_penetration(&mut nodes, config);
    stages.record(Stage::Penetration, "natal branch elements revealed by natal stems", &nodes);

    let clashed = structure::mark_clashes(&mut nodes);
    stages.record(Stage::Clash, format!("{clashed} branches clashed"), &nodes);

    let combinations = structure::handle_combinations(&mut nodes, month_branch, config);
    let summary: Vec<String> = combinations
        .iter()
        .map(|c| format!("{} → {}", c.kind.label(), c.result))
        .collect();
    stages.record(
        Stage::Combine,
        format!("{} combinations [{}]", combinations.len(), summary.join(", ")),
        &nodes,
    );

    let punish_harm = structure::handle_punish_harm(&mut nodes, config);
    stages.record(
        Stage::PunishHarm,
        format!(
            "{} punished, {} harmed, {} self-punished",
            punish_harm.punished, punish_harm.harmed, punish_harm.self_punished
        ),
        &nodes,
    );

    let relations = relations::build_relations(&nodes);
    stages.record(
        Stage::Relations,
        format!(
            "{} generate and {} control relations",
            relations.generate.len(),
            relations.control.len()
        ),
        &nodes,
    );

    let main_cycle = relations::detect_main_cycle(&nodes);
    let cycle_note = match &main_cycle {
        Some(c) => {
            let names: Vec<String> = c.members.iter().map(|&i| nodes[i].name()).collect();
            format!("main cycle {}", names.join(" → "))
        }
        None => "no main cycle".to_string(),
    };
    stages.record(Stage::Cycle, cycle_note, &nodes);

    for node in nodes.iter_mut() {
        node.reset_action_count();
    }
    let raw_totals = element_totals(&nodes);

    let mut stats =
        propagation::apply_generate(&mut nodes, &relations.generate, main_cycle.as_ref(), config);
    stages.record(
        Stage::Generate,
        format!(
            "{:?} generate: {} cycle edges, {} relation edges",
            config.propagation_model, stats.cycle_edges, stats.generate_edges
        ),
        &nodes,
    );

    stats.control_edges = propagation::apply_control(&mut nodes, &relations.control, config);
    stages.record(
        Stage::Control,
        format!("{:?} control: {} edges", config.propagation_model, stats.control_edges),
        &nodes,
    );

    propagation::apply_energy_bounds(&mut nodes, config);
    stages.record(
        Stage::Bounds,
        format!("bounds [{}, {}]", config.min_energy, config.max_energy),
        &nodes,
    );

    let state = ChartState {
        chart: *chart,
        nodes,
        relations,
        main_cycle,
        config: config.clone(),
        raw_totals,
        combinations,
        punish_harm,
        propagation: stats,
    };
    (state, stages)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chart::Stem;
    use crate::error::TermError;

    fn chart(y: &str, m: &str, d: &str, h: &str) -> FourPillars {
        FourPillars::parse(y, m, d, h).unwrap()
    }

    #[test]
    fn dynamic_pillar_parses_term() {
        let luck = DynamicPillar::parse(DynamicLayer::Luck, "戊子").unwrap();
        assert_eq!(luck.term.to_string(), "戊子");
        assert!(matches!(
            DynamicPillar::parse(DynamicLayer::Year, "甲丑"),
            Err(crate::error::EngineError::Term(TermError::ParityMismatch(_)))
        ));
        assert!(matches!(
            DynamicPillar::parse(DynamicLayer::Year, "XY"),
            Err(crate::error::EngineError::Term(TermError::Unknown(_)))
        ));
    }

    #[test]
    fn log_has_every_stage_in_order() {
        let (_, log) = run_pipeline(
            &chart("乙卯", "丁亥", "辛未", "壬辰"),
            &[],
            &EnergyConfig::default(),
        );
        let steps: Vec<Stage> = log.steps().collect();
        assert_eq!(steps, Stage::all().to_vec());
        assert!(log.entries().iter().all(|e| e.nodes.len() == 8));
    }

    #[test]
    fn day_stem_is_flagged() {
        let (state, _) = run_pipeline(
            &chart("甲子", "丙寅", "戊辰", "庚申"),
            &[],
            &EnergyConfig::default(),
        );
        let dm = state.day_master_node().unwrap();
        assert_eq!(dm.stem(), Some(Stem::Wu));
        assert_eq!(dm.original_element, Element::Earth);
    }

    #[test]
    fn dynamic_nodes_are_pre_weighted() {
        let config = EnergyConfig::default();
        let dynamic = [DynamicPillar {
            layer: DynamicLayer::Month,
            term: "甲子".parse().unwrap(),
        }];
        let (_, log) = run_pipeline(&chart("乙卯", "丁亥", "辛未", "壬辰"), &dynamic, &config);
        let init = log.get(Stage::Init).unwrap();
        assert_eq!(init.nodes.len(), 10);
        assert!((init.nodes[8].total - 400.0).abs() < 1e-9);
        assert!((init.nodes[9].total - 480.0).abs() < 1e-9);
        assert_eq!(init.nodes[8].position, "flowing month stem");
    }

    #[test]
    fn raw_totals_taken_before_propagation() {
        let (state, log) = run_pipeline(
            &chart("庚申", "辛酉", "辛丑", "乙亥"),
            &[],
            &EnergyConfig::default(),
        );
        let cycle_stage = log.get(Stage::Cycle).unwrap();
        for element in Element::all() {
            let logged: f64 = cycle_stage
                .nodes
                .iter()
                .map(|n| n.energies[element].unwrap_or(0.0))
                .sum();
            assert!((logged - state.raw_totals[element]).abs() < 1e-9);
        }
        assert!(state.propagation.control_edges > 0);
    }

    #[test]
    fn totals_stay_in_bounds() {
        let config = EnergyConfig::default();
        let (state, _) = run_pipeline(&chart("丙午", "戊午", "丁巳", "壬子"), &[], &config);
        for node in &state.nodes {
            let total = node.total_energy();
            // per-element floors can leave a scaled node a hair above max
            assert!(total >= config.min_energy - 1e-9 && total <= config.max_energy + 1.0);
        }
    }
}
