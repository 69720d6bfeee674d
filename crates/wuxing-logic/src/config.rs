//! Engine configuration: every tunable coefficient with its default.
//!
//! `EnergyConfig` is an immutable record passed by reference through every
//! stage. Callers override fields in Rust with struct update syntax or from
//! camelCase JSON; missing JSON fields keep their defaults. Construction
//! through [`EnergyConfig::validated`] or [`EnergyConfig::from_json`] rejects
//! inconsistent values, collecting every problem instead of stopping at the
//! first.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::{EngineError, Result};

/// Which seasonal-command table corrects energies for the month branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SeasonalTable {
    /// Factor by relation of each element to the month's element.
    #[default]
    OrderFactors,
    /// Traditional month × element coefficient table.
    MonthCoefficients,
}

/// How generate/control relations move energy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PropagationModel {
    /// Fixed gain and loss ratios.
    #[default]
    Linear,
    /// Mother gives, the environment tops up, the child receives at a
    /// transfer efficiency; control uses per-pair exponential losses.
    Exchange,
}

/// Tunable engine parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct EnergyConfig {
    // Base allocation and bounds
    pub stem_base_energy: f64,
    pub branch_base_energy: f64,
    pub min_energy: f64,
    pub max_energy: f64,

    // Rooting
    pub root_gain_factor: f64,
    pub qi_gain_factor: f64,
    pub penetration_factor: f64,

    // Propagation
    pub relation_generate_gain: f64,
    pub cycle_generate_gain: f64,
    pub relation_control_source_loss: f64,
    pub relation_control_target_loss: f64,
    pub control_min_loss_ratio: f64,
    pub same_yang_delta: f64,
    pub same_yin_delta: f64,

    // Seasonal command
    pub order_strong_factor: f64,
    pub order_secondary_factor: f64,
    pub order_weaken_factor: f64,
    pub order_drained_factor: f64,

    // Combination
    pub combination_energy_ratio_threshold: f64,
    pub combination_contribution_ratio: f64,
    pub combination_external_gain: f64,
    pub global_external_energy_ratio: f64,

    // Punishment and harm
    pub punish_loss_ratio: f64,
    pub harm_loss_ratio: f64,
    pub self_punish_loss_ratio: f64,

    // Status classification, named as in the JSON overrides
    #[serde(rename = "energyStatusVeryWeakThreshold")]
    pub very_weak_threshold: f64,
    #[serde(rename = "energyStatusWeakThreshold")]
    pub weak_threshold: f64,
    #[serde(rename = "energyStatusStrongThreshold")]
    pub strong_threshold: f64,
    #[serde(rename = "energyStatusVeryStrongThreshold")]
    pub very_strong_threshold: f64,
    #[serde(rename = "energyStatusVeryWeakRelativeRatio")]
    pub relative_very_weak_ratio: f64,
    #[serde(rename = "energyStatusWeakRelativeRatio")]
    pub relative_weak_ratio: f64,
    #[serde(rename = "energyStatusStrongRelativeRatio")]
    pub relative_strong_ratio: f64,
    #[serde(rename = "energyStatusVeryStrongRelativeRatio")]
    pub relative_very_strong_ratio: f64,

    // Dynamic layers
    pub enable_position_matrix: bool,
    pub time_weight_luck: f64,
    pub time_weight_year: f64,
    pub time_weight_month: f64,
    pub time_weight_day: f64,
    pub time_weight_hour: f64,

    pub seasonal_table: SeasonalTable,
    pub propagation_model: PropagationModel,
}

impl Default for EnergyConfig {
    fn default() -> Self {
        Self {
            stem_base_energy: 1000.0,
            branch_base_energy: 1200.0,
            min_energy: 10.0,
            max_energy: 10000.0,

            root_gain_factor: 1.5,
            qi_gain_factor: 1.2,
            penetration_factor: 1.1,

            relation_generate_gain: 0.3,
            cycle_generate_gain: 0.3,
            relation_control_source_loss: 0.25,
            relation_control_target_loss: 0.35,
            control_min_loss_ratio: 0.005,
            same_yang_delta: 0.03,
            same_yin_delta: -0.03,

            order_strong_factor: 1.8,
            order_secondary_factor: 1.2,
            order_weaken_factor: 0.9,
            order_drained_factor: 0.95,

            combination_energy_ratio_threshold: 3.0,
            combination_contribution_ratio: 0.5,
            combination_external_gain: 0.5,
            global_external_energy_ratio: 0.1,

            punish_loss_ratio: 0.20,
            harm_loss_ratio: 0.15,
            self_punish_loss_ratio: 0.12,

            very_weak_threshold: 50.0,
            weak_threshold: 300.0,
            strong_threshold: 3000.0,
            very_strong_threshold: 6000.0,
            relative_very_weak_ratio: 0.2,
            relative_weak_ratio: 0.5,
            relative_strong_ratio: 1.5,
            relative_very_strong_ratio: 2.5,

            enable_position_matrix: false,
            time_weight_luck: 1.2,
            time_weight_year: 1.0,
            time_weight_month: 0.4,
            time_weight_day: 0.25,
            time_weight_hour: 0.15,

            seasonal_table: SeasonalTable::OrderFactors,
            propagation_model: PropagationModel::Linear,
        }
    }
}

impl EnergyConfig {
    /// Return `self` if it passes [`validate_config`].
    pub fn validated(self) -> Result<Self> {
        let errors = validate_config(&self);
        if errors.is_empty() {
            Ok(self)
        } else {
            for e in &errors {
                log::warn!("rejected config field {}", e);
            }
            Err(EngineError::Config(errors))
        }
    }

    /// Parse a (possibly partial) camelCase JSON override and validate it.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: EnergyConfig = serde_json::from_str(json)?;
        config.validated()
    }
}

/// One rejected configuration field.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{field}: {message}")]
pub struct ConfigError {
    /// camelCase field name, as it appears in JSON.
    pub field: String,
    pub message: String,
}

impl ConfigError {
    fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

/// Validate a configuration, returning all errors found.
pub fn validate_config(config: &EnergyConfig) -> Vec<ConfigError> {
    let mut errors = Vec::new();

    let all_values: [(&str, f64); 38] = [
        ("stemBaseEnergy", config.stem_base_energy),
        ("branchBaseEnergy", config.branch_base_energy),
        ("minEnergy", config.min_energy),
        ("maxEnergy", config.max_energy),
        ("rootGainFactor", config.root_gain_factor),
        ("qiGainFactor", config.qi_gain_factor),
        ("penetrationFactor", config.penetration_factor),
        ("relationGenerateGain", config.relation_generate_gain),
        ("cycleGenerateGain", config.cycle_generate_gain),
        ("relationControlSourceLoss", config.relation_control_source_loss),
        ("relationControlTargetLoss", config.relation_control_target_loss),
        ("controlMinLossRatio", config.control_min_loss_ratio),
        ("sameYangDelta", config.same_yang_delta),
        ("sameYinDelta", config.same_yin_delta),
        ("orderStrongFactor", config.order_strong_factor),
        ("orderSecondaryFactor", config.order_secondary_factor),
        ("orderWeakenFactor", config.order_weaken_factor),
        ("orderDrainedFactor", config.order_drained_factor),
        ("combinationEnergyRatioThreshold", config.combination_energy_ratio_threshold),
        ("combinationContributionRatio", config.combination_contribution_ratio),
        ("combinationExternalGain", config.combination_external_gain),
        ("globalExternalEnergyRatio", config.global_external_energy_ratio),
        ("punishLossRatio", config.punish_loss_ratio),
        ("harmLossRatio", config.harm_loss_ratio),
        ("selfPunishLossRatio", config.self_punish_loss_ratio),
        ("energyStatusVeryWeakThreshold", config.very_weak_threshold),
        ("energyStatusWeakThreshold", config.weak_threshold),
        ("energyStatusStrongThreshold", config.strong_threshold),
        ("energyStatusVeryStrongThreshold", config.very_strong_threshold),
        ("energyStatusVeryWeakRelativeRatio", config.relative_very_weak_ratio),
        ("energyStatusWeakRelativeRatio", config.relative_weak_ratio),
        ("energyStatusStrongRelativeRatio", config.relative_strong_ratio),
        ("energyStatusVeryStrongRelativeRatio", config.relative_very_strong_ratio),
        ("timeWeightLuck", config.time_weight_luck),
        ("timeWeightYear", config.time_weight_year),
        ("timeWeightMonth", config.time_weight_month),
        ("timeWeightDay", config.time_weight_day),
        ("timeWeightHour", config.time_weight_hour),
    ];
    for (field, value) in all_values {
        if !value.is_finite() {
            errors.push(ConfigError::new(field, "must be a finite number"));
        }
    }

    if config.min_energy <= 0.0 {
        errors.push(ConfigError::new("minEnergy", "must be positive"));
    }
    if config.max_energy <= config.min_energy {
        errors.push(ConfigError::new("maxEnergy", "must exceed minEnergy"));
    }
    for (field, value) in [
        ("stemBaseEnergy", config.stem_base_energy),
        ("branchBaseEnergy", config.branch_base_energy),
    ] {
        if value < config.min_energy || value > config.max_energy {
            errors.push(ConfigError::new(field, "must lie within [minEnergy, maxEnergy]"));
        }
    }

    for (field, value) in [
        ("rootGainFactor", config.root_gain_factor),
        ("qiGainFactor", config.qi_gain_factor),
        ("penetrationFactor", config.penetration_factor),
        ("orderStrongFactor", config.order_strong_factor),
        ("orderSecondaryFactor", config.order_secondary_factor),
        ("orderWeakenFactor", config.order_weaken_factor),
        ("orderDrainedFactor", config.order_drained_factor),
    ] {
        if value <= 0.0 {
            errors.push(ConfigError::new(field, "must be positive"));
        }
    }

    for (field, value) in [
        ("relationGenerateGain", config.relation_generate_gain),
        ("cycleGenerateGain", config.cycle_generate_gain),
        ("relationControlSourceLoss", config.relation_control_source_loss),
        ("relationControlTargetLoss", config.relation_control_target_loss),
        ("controlMinLossRatio", config.control_min_loss_ratio),
        ("combinationContributionRatio", config.combination_contribution_ratio),
        ("punishLossRatio", config.punish_loss_ratio),
        ("harmLossRatio", config.harm_loss_ratio),
        ("selfPunishLossRatio", config.self_punish_loss_ratio),
    ] {
        if !(0.0..=1.0).contains(&value) {
            errors.push(ConfigError::new(field, "must lie within [0, 1]"));
        }
    }
    if config.control_min_loss_ratio > config.relation_control_target_loss {
        errors.push(ConfigError::new(
            "controlMinLossRatio",
            "must not exceed relationControlTargetLoss",
        ));
    }

    for (field, value) in [
        ("sameYangDelta", config.same_yang_delta),
        ("sameYinDelta", config.same_yin_delta),
    ] {
        if value <= -1.0 {
            errors.push(ConfigError::new(field, "must be greater than -1"));
        }
    }

    for (field, value) in [
        ("combinationEnergyRatioThreshold", config.combination_energy_ratio_threshold),
        ("combinationExternalGain", config.combination_external_gain),
        ("globalExternalEnergyRatio", config.global_external_energy_ratio),
        ("timeWeightLuck", config.time_weight_luck),
        ("timeWeightYear", config.time_weight_year),
        ("timeWeightMonth", config.time_weight_month),
        ("timeWeightDay", config.time_weight_day),
        ("timeWeightHour", config.time_weight_hour),
    ] {
        if value < 0.0 {
            errors.push(ConfigError::new(field, "must not be negative"));
        }
    }

    if config.very_weak_threshold < 0.0 {
        errors.push(ConfigError::new("energyStatusVeryWeakThreshold", "must not be negative"));
    }
    if config.weak_threshold <= config.very_weak_threshold {
        errors.push(ConfigError::new(
            "energyStatusWeakThreshold",
            "must exceed energyStatusVeryWeakThreshold",
        ));
    }
    if config.strong_threshold <= config.weak_threshold {
        errors.push(ConfigError::new(
            "energyStatusStrongThreshold",
            "must exceed energyStatusWeakThreshold",
        ));
    }
    if config.very_strong_threshold <= config.strong_threshold {
        errors.push(ConfigError::new(
            "energyStatusVeryStrongThreshold",
            "must exceed energyStatusStrongThreshold",
        ));
    }
    if !(config.relative_very_weak_ratio < config.relative_weak_ratio
        && config.relative_weak_ratio < config.relative_strong_ratio
        && config.relative_strong_ratio < config.relative_very_strong_ratio)
    {
        errors.push(ConfigError::new(
            "energyStatusWeakRelativeRatio",
            "relative ratios must increase from very weak to very strong",
        ));
    }

    errors
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(validate_config(&EnergyConfig::default()).is_empty());
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config = EnergyConfig::from_json(r#"{"energyStatusWeakThreshold": 250, "propagationModel": "exchange"}"#)
            .unwrap();
        assert_eq!(config.weak_threshold, 250.0);
        assert_eq!(config.propagation_model, PropagationModel::Exchange);
        assert_eq!(config.stem_base_energy, 1000.0);
        assert_eq!(config.seasonal_table, SeasonalTable::OrderFactors);
    }

    #[test]
    fn bad_bounds_rejected() {
        let config = EnergyConfig {
            min_energy: 0.0,
            max_energy: -5.0,
            ..EnergyConfig::default()
        };
        let errors = validate_config(&config);
        assert!(errors.iter().any(|e| e.field == "minEnergy"));
        assert!(errors.iter().any(|e| e.field == "maxEnergy"));
    }

    #[test]
    fn threshold_order_enforced() {
        let config = EnergyConfig {
            weak_threshold: 40.0,
            ..EnergyConfig::default()
        };
        let errors = validate_config(&config);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "energyStatusWeakThreshold");
    }

    #[test]
    fn all_errors_collected() {
        let config = EnergyConfig {
            punish_loss_ratio: 1.5,
            harm_loss_ratio: -0.1,
            time_weight_day: -1.0,
            ..EnergyConfig::default()
        };
        assert_eq!(validate_config(&config).len(), 3);
        assert!(matches!(config.validated(), Err(EngineError::Config(e)) if e.len() == 3));
    }

    #[test]
    fn unknown_json_key_is_rejected() {
        for json in [r#"{"minEnergyy": 5000.0}"#, r#"{"weakThreshold": 900.0}"#] {
            let err = EnergyConfig::from_json(json).unwrap_err();
            assert!(matches!(err, EngineError::Json(_)));
            assert!(err.to_string().contains("unknown field"));
        }
    }

    #[test]
    fn status_thresholds_use_energy_status_keys() {
        let json = serde_json::to_value(EnergyConfig::default()).unwrap();
        assert_eq!(json["energyStatusVeryWeakThreshold"], 50.0);
        assert_eq!(json["energyStatusVeryStrongRelativeRatio"], 2.5);
        assert!(json.get("weakThreshold").is_none());
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(matches!(
            EnergyConfig::from_json("{ not json"),
            Err(EngineError::Json(_))
        ));
    }

    #[test]
    fn config_roundtrips_through_json() {
        let config = EnergyConfig {
            enable_position_matrix: true,
            seasonal_table: SeasonalTable::MonthCoefficients,
            ..EnergyConfig::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"seasonalTable\":\"monthCoefficients\""));
        assert_eq!(EnergyConfig::from_json(&json).unwrap(), config);
    }
}
