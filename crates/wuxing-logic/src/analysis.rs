//! Top-level analysis API.
//!
//! [`EnergyEngine`] owns a validated [`EnergyConfig`] and turns charts into
//! [`EnergyAnalysis`] reports: natal only, natal plus dynamic layers, or one
//! report per flowing year.

use serde::Serialize;

use crate::chart::{FourPillars, Jiazi};
use crate::classify::{self, Circulation, DayMasterReading, EnergyStatus, MissingElement};
use crate::config::EnergyConfig;
use crate::cycle::{offset_year, year_term};
use crate::element::ElementMap;
use crate::error::{EngineError, Result};
use crate::pipeline::{run_pipeline, ChartState, DynamicPillar, StageLog};
use crate::propagation::PropagationStats;
use crate::structure::{Combination, PunishHarmReport};
use crate::time_weight::DynamicLayer;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ElementReading {
    pub value: f64,
    /// Fraction of the chart total, 0 when the chart is empty.
    pub share: f64,
    pub status: EnergyStatus,
}

/// Full result of one computation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnergyAnalysis {
    pub chart: String,
    pub dynamic: Vec<DynamicPillar>,
    pub elements: ElementMap<ElementReading>,
    pub total: f64,
    pub circulation: Circulation,
    pub missing: Vec<MissingElement>,
    pub day_master: DayMasterReading,
    pub main_cycle: Vec<String>,
    pub raw_totals: ElementMap<f64>,
    pub combinations: Vec<Combination>,
    pub punish_harm: PunishHarmReport,
    pub propagation: PropagationStats,
    pub stages: StageLog,
}

impl EnergyAnalysis {
    fn from_state(state: &ChartState, dynamic: &[DynamicPillar], stages: StageLog) -> Self {
        let totals = state.element_totals();
        let total = totals.total();
        let statuses = classify::classify_all(&totals, &state.config);
        let elements = totals.map(|e, &value| ElementReading {
            value,
            share: if total > 0.0 { value / total } else { 0.0 },
            status: statuses[e],
        });

        Self {
            chart: state.chart.to_string(),
            dynamic: dynamic.to_vec(),
            elements,
            total,
            circulation: classify::circulation(&statuses, state.main_cycle.is_some()),
            missing: classify::missing_elements(&totals, &statuses),
            day_master: classify::day_master_reading(state.chart.day_master(), &totals, &statuses),
            main_cycle: state.main_cycle_names(),
            raw_totals: state.raw_totals,
            combinations: state.combinations.clone(),
            punish_harm: state.punish_harm,
            propagation: state.propagation,
            stages,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// One flowing year of a year-span analysis.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct YearAnalysis {
    pub year: i32,
    pub term: String,
    pub analysis: EnergyAnalysis,
}

/// Analysis entry point holding a validated configuration.
#[derive(Debug, Clone, Default)]
pub struct EnergyEngine {
    config: EnergyConfig,
}

impl EnergyEngine {
    pub fn new(config: EnergyConfig) -> Result<Self> {
        Ok(Self {
            config: config.validated()?,
        })
    }

    /// Build from a camelCase JSON override; missing fields take defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(Self {
            config: EnergyConfig::from_json(json)?,
        })
    }

    pub fn config(&self) -> &EnergyConfig {
        &self.config
    }

    pub fn analyze(&self, chart: &FourPillars) -> EnergyAnalysis {
        let (state, stages) = run_pipeline(chart, &[], &self.config);
        EnergyAnalysis::from_state(&state, &[], stages)
    }

    /// Parse four pillar strings and analyze the natal chart.
    pub fn analyze_pillars(&self, year: &str, month: &str, day: &str, hour: &str) -> Result<EnergyAnalysis> {
        let chart = FourPillars::parse(year, month, day, hour)?;
        Ok(self.analyze(&chart))
    }

    /// Natal chart plus dynamic layers. Each layer may appear once.
    pub fn analyze_with_layers(&self, chart: &FourPillars, dynamic: &[DynamicPillar]) -> Result<EnergyAnalysis> {
        for layer in DynamicLayer::all() {
            if dynamic.iter().filter(|p| p.layer == layer).count() > 1 {
                log::warn!("rejected request: {layer} layer given twice");
                return Err(EngineError::InvalidRequest(format!(
                    "{layer} layer given more than once"
                )));
            }
        }
        let (state, stages) = run_pipeline(chart, dynamic, &self.config);
        Ok(EnergyAnalysis::from_state(&state, dynamic, stages))
    }

    /// One analysis per flowing year, each with the optional luck pillar.
    pub fn analyze_year_span(
        &self,
        chart: &FourPillars,
        luck: Option<Jiazi>,
        from_year: i32,
        years: usize,
    ) -> Result<Vec<YearAnalysis>> {
        if years == 0 {
            return Err(EngineError::InvalidRequest("year span is empty".to_string()));
        }
        (0..years)
            .map(|i| {
                let year = offset_year(from_year, i).ok_or_else(|| {
                    EngineError::InvalidRequest(format!("year {from_year} + {i} is out of range"))
                })?;
                let term = year_term(year);
                let mut dynamic = Vec::with_capacity(2);
                if let Some(term) = luck {
                    dynamic.push(DynamicPillar {
                        layer: DynamicLayer::Luck,
                        term,
                    });
                }
                dynamic.push(DynamicPillar {
                    layer: DynamicLayer::Year,
                    term,
                });
                Ok(YearAnalysis {
                    year,
                    term: term.to_string(),
                    analysis: self.analyze_with_layers(chart, &dynamic)?,
                })
            })
            .collect()
    }
}

/// Analyze `chart` under `config`, validating the configuration first.
pub fn analyze(chart: &FourPillars, config: &EnergyConfig) -> Result<EnergyAnalysis> {
    Ok(EnergyEngine::new(config.clone())?.analyze(chart))
}
