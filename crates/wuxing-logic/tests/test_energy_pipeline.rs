//! Integration tests for the full energy pipeline.
//!
//! Exercises: FourPillars → nodes → rooting/seasonal → structure
//! → relations/cycle → propagation → bounds → classification
//!
//! All tests are pure logic: no calendar library, no I/O.

use approx::assert_relative_eq;
use chrono::NaiveDate;
use wuxing_logic::calendar::ApproximateCalendar;
use wuxing_logic::chart::{FourPillars, Pillar, Stem};
use wuxing_logic::classify::{classify_element, EnergyStatus};
use wuxing_logic::config::{EnergyConfig, PropagationModel, SeasonalTable};
use wuxing_logic::cycle::{build_cascade, move_term, year_term, CascadeOptions};
use wuxing_logic::element::Element;
use wuxing_logic::node::{EnergyNode, NodeFlag, NodeSlot, ACTION_EFFICIENCY};
use wuxing_logic::pipeline::{run_pipeline, DynamicPillar, Stage};
use wuxing_logic::tables::CombinationKind;
use wuxing_logic::time_weight::DynamicLayer;
use wuxing_logic::EnergyEngine;

// ── Helpers ────────────────────────────────────────────────────────────

const CHARTS: [[&str; 4]; 5] = [
    ["甲寅", "丙辰", "甲子", "庚午"],
    ["丙午", "戊午", "丁巳", "壬子"],
    ["庚申", "辛酉", "辛丑", "乙亥"],
    ["壬子", "癸亥", "甲子", "丙寅"],
    ["乙卯", "丁亥", "辛未", "壬辰"],
];

fn chart(pillars: [&str; 4]) -> FourPillars {
    FourPillars::parse(pillars[0], pillars[1], pillars[2], pillars[3]).unwrap()
}

fn all_configs() -> Vec<EnergyConfig> {
    let exchange = EnergyConfig {
        propagation_model: PropagationModel::Exchange,
        ..EnergyConfig::default()
    };
    let month_table = EnergyConfig {
        seasonal_table: SeasonalTable::MonthCoefficients,
        enable_position_matrix: true,
        ..EnergyConfig::default()
    };
    vec![EnergyConfig::default(), exchange, month_table]
}

fn layers() -> Vec<DynamicPillar> {
    vec![
        DynamicPillar::parse(DynamicLayer::Luck, "戊子").unwrap(),
        DynamicPillar {
            layer: DynamicLayer::Year,
            term: year_term(2024),
        },
    ]
}

// ── Pipeline invariants ────────────────────────────────────────────────

#[test]
fn deterministic_output_including_log() {
    let engine = EnergyEngine::default();
    for pillars in CHARTS {
        let a = engine.analyze_with_layers(&chart(pillars), &layers()).unwrap();
        let b = engine.analyze_with_layers(&chart(pillars), &layers()).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.to_json().unwrap(), b.to_json().unwrap());
    }
}

#[test]
fn every_stored_value_stays_clamped() {
    for config in all_configs() {
        for pillars in CHARTS {
            let (_, log) = run_pipeline(&chart(pillars), &layers(), &config);
            for entry in log.entries() {
                for node in &entry.nodes {
                    for (_, value) in node.energies.iter() {
                        if let Some(v) = *value {
                            assert!(
                                v >= config.min_energy && v <= config.max_energy,
                                "{} {} at {}: {v}",
                                entry.step,
                                node.name,
                                node.position
                            );
                        }
                    }
                }
            }
        }
    }
}

#[test]
fn stage_log_lists_every_stage_once() {
    let (_, log) = run_pipeline(&chart(CHARTS[0]), &[], &EnergyConfig::default());
    assert_eq!(log.len(), Stage::all().len());
    for stage in Stage::all() {
        assert_eq!(log.steps().filter(|s| *s == stage).count(), 1);
    }
    let json = serde_json::to_value(&log).unwrap();
    assert_eq!(json[6]["step"], "punishHarm");
}

#[test]
fn final_shares_sum_to_one() {
    for config in all_configs() {
        let engine = EnergyEngine::new(config).unwrap();
        for pillars in CHARTS {
            let analysis = engine.analyze(&chart(pillars));
            let share: f64 = analysis.elements.iter().map(|(_, r)| r.share).sum();
            assert_relative_eq!(share, 1.0, epsilon = 1e-9);
            assert!(analysis.total > 0.0);
        }
    }
}

// ── Node behaviour ─────────────────────────────────────────────────────

#[test]
fn action_efficiency_sequence() {
    let config = EnergyConfig::default();
    let mut node = EnergyNode::from_stem(Stem::Jia, NodeSlot::Natal(Pillar::Year), 1000.0, &config);
    let mut seen = Vec::new();
    for _ in 0..5 {
        seen.push(node.action_efficiency());
        node.increment_action_count();
    }
    assert_eq!(seen, vec![1.0, 0.5, 0.25, 0.125, 0.125]);
    assert_eq!(&seen[..4], &ACTION_EFFICIENCY[..]);
    node.reset_action_count();
    assert_eq!(node.action_efficiency(), 1.0);
}

#[test]
fn distribution_is_proportional() {
    let config = EnergyConfig::default();
    // 寅: wood 720, fire 360, earth 120
    let mut node = EnergyNode::from_branch(
        wuxing_logic::chart::Branch::Yin,
        NodeSlot::Natal(Pillar::Month),
        1200.0,
        &config,
    );
    node.distribute_energy(-600.0, &config);
    assert_relative_eq!(node.element_energy(Element::Wood), 360.0, epsilon = 1e-9);
    assert_relative_eq!(node.element_energy(Element::Fire), 180.0, epsilon = 1e-9);
    assert_relative_eq!(node.element_energy(Element::Earth), 60.0, epsilon = 1e-9);
}

// ── Structure ──────────────────────────────────────────────────────────

#[test]
fn stem_combination_gated_by_threshold() {
    let pillars = chart(["庚申", "辛酉", "辛丑", "乙亥"]);

    let (state, _) = run_pipeline(&pillars, &[], &EnergyConfig::default());
    let stem_five: Vec<_> = state
        .combinations
        .iter()
        .filter(|c| c.kind == CombinationKind::StemFive)
        .collect();
    assert_eq!(stem_five.len(), 1);
    assert_eq!(stem_five[0].participants, vec![0, 6]);
    assert_eq!(stem_five[0].result, Element::Metal);
    assert!(state.nodes[6].has_flag(NodeFlag::Combined));
    assert!(state.nodes[6].has_element(Element::Metal));

    let strict = EnergyConfig {
        combination_energy_ratio_threshold: 1e12,
        ..EnergyConfig::default()
    };
    let (state, _) = run_pipeline(&pillars, &[], &strict);
    assert!(state.combinations.is_empty());
    assert!(state.nodes.iter().all(|n| !n.has_flag(NodeFlag::Combined)));
}

#[test]
fn clash_marks_both_branches() {
    // 子 (day) and 午 (hour) clash
    let (state, _) = run_pipeline(&chart(CHARTS[0]), &[], &EnergyConfig::default());
    assert!(state.nodes[5].has_flag(NodeFlag::Clashed));
    assert!(state.nodes[7].has_flag(NodeFlag::Clashed));
    assert!(!state.nodes[1].has_flag(NodeFlag::Clashed));
}

// ── Classification ─────────────────────────────────────────────────────

#[test]
fn weak_threshold_classifies_above_weak() {
    let config = EnergyConfig::default();
    let status = classify_element(config.weak_threshold, config.weak_threshold, &config);
    assert!(status > EnergyStatus::Weak);
}

// ── Dynamic layers ─────────────────────────────────────────────────────

#[test]
fn year_2024_is_jia_chen() {
    assert_eq!(year_term(2024).index(), 40);
    assert_eq!(year_term(2024).to_string(), "甲辰");
    for n in [1, 13, 60, 121] {
        assert_eq!(move_term(move_term(40, n).index(), -n).index(), 40);
    }
}

#[test]
fn layered_analysis_adds_weighted_nodes() {
    let engine = EnergyEngine::default();
    let natal = engine.analyze(&chart(CHARTS[4]));
    let layered = engine.analyze_with_layers(&chart(CHARTS[4]), &layers()).unwrap();

    let init = layered.stages.get(Stage::Init).unwrap();
    assert_eq!(init.nodes.len(), 12);
    assert_eq!(init.nodes[8].position, "luck stem");
    assert_eq!(init.nodes[10].position, "flowing year stem");
    // luck weight 1.2 on a 1000 base
    assert_relative_eq!(init.nodes[8].total, 1200.0, epsilon = 1e-9);
    assert!(layered.total > natal.total);
}

#[test]
fn cascade_terms_feed_layered_analysis() {
    let birth = NaiveDate::from_ymd_opt(1975, 11, 20).unwrap();
    let options = CascadeOptions {
        from_year: Some(2024),
        years_span: Some(3),
        active_month: Some(6),
        ..CascadeOptions::default()
    };
    let cascade = build_cascade(&ApproximateCalendar, birth, &options).unwrap();
    assert_eq!(cascade.years[0].term.to_string(), "甲辰");
    assert_eq!(cascade.months[5].term.to_string(), "庚午");
    let hours = cascade.hours.as_ref().unwrap();

    let dynamic = [
        DynamicPillar {
            layer: DynamicLayer::Year,
            term: cascade.years[0].term,
        },
        DynamicPillar {
            layer: DynamicLayer::Month,
            term: cascade.months[5].term,
        },
        DynamicPillar {
            layer: DynamicLayer::Hour,
            term: hours[0].term,
        },
    ];
    let analysis = EnergyEngine::default()
        .analyze_with_layers(&chart(CHARTS[4]), &dynamic)
        .unwrap();
    assert_eq!(analysis.dynamic.len(), 3);
    assert_eq!(analysis.stages.get(Stage::Bounds).unwrap().nodes.len(), 14);
}
