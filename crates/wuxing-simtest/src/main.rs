//! Wuxing Headless Energy Harness
//!
//! Runs fixture charts through the energy engine and checks the invariants
//! the engine promises. Runs entirely in-process: no calendar library, no I/O
//! beyond stdout.
//!
//! Usage:
//!   cargo run -p wuxing-simtest
//!   cargo run -p wuxing-simtest -- --verbose
//!   cargo run -p wuxing-simtest -- --json
//!
//! `RUST_LOG=wuxing_logic=debug` shows every pipeline stage.

use chrono::NaiveDate;
use serde::Deserialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use wuxing_logic::calendar::{ApproximateCalendar, CalendarService};
use wuxing_logic::chart::{FourPillars, Jiazi};
use wuxing_logic::classify::CirculationStatus;
use wuxing_logic::config::{EnergyConfig, PropagationModel, SeasonalTable};
use wuxing_logic::cycle::{self, CascadeOptions, Gender, LuckDirection};
use wuxing_logic::pipeline::{run_pipeline, DynamicPillar, Stage};
use wuxing_logic::time_weight::DynamicLayer;
use wuxing_logic::EnergyEngine;

// ── Fixture charts ──────────────────────────────────────────────────────
const CHARTS_JSON: &str = include_str!("../data/sample_charts.json");

#[derive(Debug, Deserialize)]
struct SampleChart {
    name: String,
    pillars: [String; 4],
    gender: Gender,
}

impl SampleChart {
    fn parse(&self) -> Result<FourPillars, String> {
        let [y, m, d, h] = &self.pillars;
        FourPillars::parse(y, m, d, h).map_err(|e| e.to_string())
    }
}

// ── Test harness ────────────────────────────────────────────────────────

struct TestResult {
    name: String,
    passed: bool,
    detail: String,
}

fn init_logging() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "wuxing_logic=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}

fn main() {
    init_logging();
    let verbose = std::env::args().any(|a| a == "--verbose");
    let json = std::env::args().any(|a| a == "--json");
    println!("=== Wuxing Energy Harness ===\n");

    let charts: Vec<SampleChart> = match serde_json::from_str(CHARTS_JSON) {
        Ok(c) => c,
        Err(e) => {
            println!("  ✗ fixture_parse: {}", e);
            std::process::exit(1);
        }
    };

    let mut results = Vec::new();

    // 1. Fixture charts parse
    results.extend(validate_fixtures(&charts));

    // 2. Pipeline invariants under every model
    results.extend(validate_pipeline(&charts, verbose));

    // 3. Cycle arithmetic and luck pillars
    results.extend(validate_cycles(&charts, verbose));

    // 4. Calendar sequences and cascade
    results.extend(validate_calendar(verbose));

    // 5. Layered and year-span analysis
    results.extend(validate_layers(&charts, verbose));

    // ── Summary ──
    println!();
    let passed = results.iter().filter(|r| r.passed).count();
    let failed = results.iter().filter(|r| !r.passed).count();
    let total = results.len();

    for r in &results {
        let icon = if r.passed { "✓" } else { "✗" };
        if !r.passed || verbose {
            println!("  {} {}: {}", icon, r.name, r.detail);
        }
    }

    if json {
        if let Some(chart) = charts.first().and_then(|c| c.parse().ok()) {
            match EnergyEngine::default().analyze(&chart).to_json() {
                Ok(out) => println!("\n{}", out),
                Err(e) => println!("\n  ✗ json output: {}", e),
            }
        }
    }

    println!(
        "\n=== RESULT: {}/{} passed, {} failed ===",
        passed, total, failed
    );

    if failed > 0 {
        std::process::exit(1);
    }
}

// ── 1. Fixtures ─────────────────────────────────────────────────────────

fn validate_fixtures(charts: &[SampleChart]) -> Vec<TestResult> {
    println!("--- Fixture Charts ---");
    let mut results = Vec::new();

    results.push(TestResult {
        name: "fixtures_not_empty".into(),
        passed: !charts.is_empty(),
        detail: format!("{} charts loaded", charts.len()),
    });

    for c in charts {
        let parsed = c.parse();
        results.push(TestResult {
            name: format!("fixture_{}_parses", c.name),
            passed: parsed.is_ok(),
            detail: match parsed {
                Ok(chart) => chart.to_string(),
                Err(e) => e,
            },
        });
    }

    results
}

// ── 2. Pipeline invariants ──────────────────────────────────────────────

fn configs() -> Vec<(&'static str, EnergyConfig)> {
    vec![
        ("linear", EnergyConfig::default()),
        (
            "exchange",
            EnergyConfig {
                propagation_model: PropagationModel::Exchange,
                ..EnergyConfig::default()
            },
        ),
        (
            "month_table_matrix",
            EnergyConfig {
                seasonal_table: SeasonalTable::MonthCoefficients,
                enable_position_matrix: true,
                ..EnergyConfig::default()
            },
        ),
    ]
}

fn validate_pipeline(charts: &[SampleChart], verbose: bool) -> Vec<TestResult> {
    println!("--- Pipeline Invariants ---");
    let mut results = Vec::new();

    for (label, config) in configs() {
        let engine = match EnergyEngine::new(config.clone()) {
            Ok(e) => e,
            Err(e) => {
                results.push(TestResult {
                    name: format!("config_{}_valid", label),
                    passed: false,
                    detail: e.to_string(),
                });
                continue;
            }
        };

        for c in charts {
            let Ok(chart) = c.parse() else { continue };
            let (state, stages) = run_pipeline(&chart, &[], &config);

            // Every stage logged once, in order
            let steps: Vec<Stage> = stages.steps().collect();
            results.push(TestResult {
                name: format!("{}_{}_stage_order", label, c.name),
                passed: steps == Stage::all().to_vec(),
                detail: format!("{} stages", steps.len()),
            });

            // Stored values clamped at every stage
            let out_of_range = stages
                .entries()
                .iter()
                .flat_map(|e| e.nodes.iter())
                .flat_map(|n| n.energies.iter().filter_map(|(_, v)| *v))
                .filter(|&v| v < config.min_energy || v > config.max_energy)
                .count();
            results.push(TestResult {
                name: format!("{}_{}_clamped", label, c.name),
                passed: out_of_range == 0,
                detail: format!("{} values outside bounds", out_of_range),
            });

            // Same input, same output
            let a = engine.analyze(&chart);
            let b = engine.analyze(&chart);
            results.push(TestResult {
                name: format!("{}_{}_deterministic", label, c.name),
                passed: a == b,
                detail: "two runs compared field by field".into(),
            });

            // Shares add up
            let share: f64 = a.elements.iter().map(|(_, r)| r.share).sum();
            results.push(TestResult {
                name: format!("{}_{}_shares", label, c.name),
                passed: (share - 1.0).abs() < 1e-9,
                detail: format!("Σ share = {:.12}", share),
            });

            // Circulation agrees with element statuses
            let blocked = a.circulation.status == CirculationStatus::Blocked;
            results.push(TestResult {
                name: format!("{}_{}_circulation", label, c.name),
                passed: blocked == !a.circulation.blocked.is_empty()
                    && a.circulation.cycle_closed == state.main_cycle.is_some(),
                detail: format!("{:?}", a.circulation.status),
            });

            if verbose && label == "linear" {
                let values: Vec<String> = a
                    .elements
                    .iter()
                    .map(|(e, r)| format!("{}={:.0} ({})", e, r.value, r.status.label()))
                    .collect();
                println!("  {} [{}]: {}", c.name, chart, values.join(", "));
            }
        }
    }

    results
}

// ── 3. Cycle arithmetic ─────────────────────────────────────────────────

fn validate_cycles(charts: &[SampleChart], verbose: bool) -> Vec<TestResult> {
    println!("--- Cycle Arithmetic ---");
    let mut results = Vec::new();

    let y2024 = cycle::year_term(2024);
    results.push(TestResult {
        name: "year_2024_term".into(),
        passed: y2024.index() == 40 && y2024.to_string() == "甲辰",
        detail: format!("2024 → {} ({})", y2024, y2024.index()),
    });

    let round_trip = (0..60).all(|i| {
        [1i64, 7, 60, 125]
            .iter()
            .all(|&n| cycle::move_term(cycle::move_term(i, n).index(), -n).index() == i)
    });
    results.push(TestResult {
        name: "move_term_identity".into(),
        passed: round_trip,
        detail: "forward n then back n returns to start".into(),
    });

    for c in charts {
        let Ok(chart) = c.parse() else { continue };
        let direction = LuckDirection::from_year_polarity(chart.year.stem.polarity(), c.gender);
        let first = match cycle::first_luck_term(chart.month, direction) {
            Ok(t) => t,
            Err(e) => {
                results.push(TestResult {
                    name: format!("luck_{}", c.name),
                    passed: false,
                    detail: e.to_string(),
                });
                continue;
            }
        };
        let seq = match cycle::luck_sequence(first, direction, cycle::DEFAULT_LUCK_STEPS, Some(5)) {
            Ok(seq) => seq,
            Err(e) => {
                results.push(TestResult {
                    name: format!("luck_{}_steps", c.name),
                    passed: false,
                    detail: e.to_string(),
                });
                continue;
            }
        };
        let step = if direction == LuckDirection::Forward { 1 } else { 59 };
        let consecutive = seq
            .windows(2)
            .all(|w| (w[0].term.index() + step) % 60 == w[1].term.index());
        results.push(TestResult {
            name: format!("luck_{}_steps", c.name),
            passed: seq.len() == cycle::DEFAULT_LUCK_STEPS && consecutive,
            detail: format!("{:?} from {}", direction, first),
        });

        if verbose {
            let terms: Vec<String> = seq
                .iter()
                .map(|s| format!("{}({}-{})", s.term, s.start_age.unwrap_or(0), s.end_age.unwrap_or(0)))
                .collect();
            println!("  {} luck: {}", c.name, terms.join(" "));
        }
    }

    results
}

// ── 4. Calendar ─────────────────────────────────────────────────────────

fn validate_calendar(verbose: bool) -> Vec<TestResult> {
    println!("--- Calendar Sequences ---");
    let mut results = Vec::new();
    let calendar = ApproximateCalendar;

    let Some(start) = NaiveDate::from_ymd_opt(2024, 1, 1) else {
        return results;
    };

    match cycle::day_sequence(&calendar, start, 120) {
        Ok(days) => {
            let consecutive = days
                .windows(2)
                .all(|w| (w[0].term.index() + 1) % 60 == w[1].term.index());
            results.push(TestResult {
                name: "day_sequence_consecutive".into(),
                passed: days.len() == 120 && consecutive,
                detail: format!("{} → {}", days[0].term, days[days.len() - 1].term),
            });
        }
        Err(e) => results.push(TestResult {
            name: "day_sequence_consecutive".into(),
            passed: false,
            detail: e.to_string(),
        }),
    }

    match cycle::month_sequence(&calendar, 2024, 1, 24) {
        Ok(months) => {
            let consecutive = months
                .windows(2)
                .all(|w| (w[0].term.index() + 1) % 60 == w[1].term.index());
            results.push(TestResult {
                name: "month_sequence_consecutive".into(),
                passed: months.len() == 24 && consecutive,
                detail: format!(
                    "{}-{:02} {} → {}-{:02} {}",
                    months[0].year,
                    months[0].month,
                    months[0].term,
                    months[23].year,
                    months[23].month,
                    months[23].term
                ),
            });
        }
        Err(e) => results.push(TestResult {
            name: "month_sequence_consecutive".into(),
            passed: false,
            detail: e.to_string(),
        }),
    }

    // Twelve double-hours from 23:00 cover every branch once
    let hours = start
        .and_hms_opt(23, 0, 0)
        .ok_or_else(|| "bad start".to_string())
        .and_then(|at| cycle::hour_sequence(&calendar, at, 12).map_err(|e| e.to_string()));
    match hours {
        Ok(hours) => {
            let mut seen = [false; 12];
            for h in &hours {
                seen[h.term.branch().index()] = true;
            }
            results.push(TestResult {
                name: "hour_sequence_branches".into(),
                passed: seen.iter().all(|&s| s),
                detail: format!("{} hours from {}", hours.len(), hours[0].term),
            });
        }
        Err(e) => results.push(TestResult {
            name: "hour_sequence_branches".into(),
            passed: false,
            detail: e,
        }),
    }

    // Calendar strings always parse back into terms
    let sampled = (0..365).step_by(7).all(|offset| {
        start
            .checked_add_days(chrono::Days::new(offset))
            .map(|d| {
                calendar
                    .day_term(d)
                    .ok()
                    .and_then(|t| t.parse::<Jiazi>().ok())
                    .is_some()
            })
            .unwrap_or(false)
    });
    results.push(TestResult {
        name: "calendar_terms_parse".into(),
        passed: sampled,
        detail: "weekly samples across 2024".into(),
    });

    if let Some(birth) = NaiveDate::from_ymd_opt(1988, 2, 29) {
        let options = CascadeOptions {
            active_year: Some(2023),
            ..CascadeOptions::default()
        };
        match cycle::build_cascade(&calendar, birth, &options) {
            Ok(cascade) => {
                results.push(TestResult {
                    name: "cascade_clamps_leap_day".into(),
                    passed: cascade.active.day == 28
                        && cascade.months.len() == 12
                        && cascade.hours.as_ref().map(Vec::len) == Some(12),
                    detail: format!(
                        "active {}-{:02}-{:02} {:02}h",
                        cascade.active.year, cascade.active.month, cascade.active.day, cascade.active.hour
                    ),
                });
                if verbose {
                    let months: Vec<String> = cascade.months.iter().map(|m| m.term.to_string()).collect();
                    println!("  2023 months: {}", months.join(" "));
                }
            }
            Err(e) => results.push(TestResult {
                name: "cascade_clamps_leap_day".into(),
                passed: false,
                detail: e.to_string(),
            }),
        }
    }

    results
}

// ── 5. Layered analysis ─────────────────────────────────────────────────

fn validate_layers(charts: &[SampleChart], verbose: bool) -> Vec<TestResult> {
    println!("--- Dynamic Layers ---");
    let mut results = Vec::new();
    let engine = EnergyEngine::default();

    for c in charts {
        let Ok(chart) = c.parse() else { continue };
        let direction = LuckDirection::from_year_polarity(chart.year.stem.polarity(), c.gender);
        let Ok(luck) = cycle::first_luck_term(chart.month, direction) else {
            continue;
        };

        let dynamic: Vec<DynamicPillar> = [
            (DynamicLayer::Luck, luck),
            (DynamicLayer::Year, cycle::year_term(2024)),
        ]
        .into_iter()
        .map(|(layer, term)| DynamicPillar { layer, term })
        .collect();

        match engine.analyze_with_layers(&chart, &dynamic) {
            Ok(analysis) => {
                let nodes = analysis
                    .stages
                    .get(Stage::Bounds)
                    .map(|e| e.nodes.len())
                    .unwrap_or(0);
                results.push(TestResult {
                    name: format!("layers_{}_node_count", c.name),
                    passed: nodes == 12,
                    detail: format!("{} nodes with luck {}", nodes, luck),
                });
            }
            Err(e) => results.push(TestResult {
                name: format!("layers_{}_node_count", c.name),
                passed: false,
                detail: e.to_string(),
            }),
        }

        match engine.analyze_year_span(&chart, Some(luck), 2024, 10) {
            Ok(span) => {
                let years_ok = span
                    .iter()
                    .all(|y| y.term == cycle::year_term(y.year).to_string());
                results.push(TestResult {
                    name: format!("year_span_{}", c.name),
                    passed: span.len() == 10 && years_ok,
                    detail: format!("{} → {}", span[0].term, span[span.len() - 1].term),
                });
                if verbose {
                    let dm: Vec<String> = span
                        .iter()
                        .map(|y| format!("{}:{}", y.year, y.analysis.day_master.status.label()))
                        .collect();
                    println!("  {} day master: {}", c.name, dm.join(" "));
                }
            }
            Err(e) => results.push(TestResult {
                name: format!("year_span_{}", c.name),
                passed: false,
                detail: e.to_string(),
            }),
        }
    }

    log::debug!("layer checks finished for {} charts", charts.len());
    results
}
