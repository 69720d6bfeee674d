//! Time layers and their weights.
//!
//! Dynamic horoscope layers (luck pillar, flowing year, month, day, hour)
//! act on the natal chart with a weight that shrinks as the layer gets
//! shorter. Natal nodes always weigh 1.0.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::EnergyConfig;

/// A dynamic layer laid over the natal chart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DynamicLayer {
    Luck,
    Year,
    Month,
    Day,
    Hour,
}

impl DynamicLayer {
    pub fn all() -> [DynamicLayer; 5] {
        [
            DynamicLayer::Luck,
            DynamicLayer::Year,
            DynamicLayer::Month,
            DynamicLayer::Day,
            DynamicLayer::Hour,
        ]
    }

    pub fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for DynamicLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DynamicLayer::Luck => "luck",
            DynamicLayer::Year => "year",
            DynamicLayer::Month => "month",
            DynamicLayer::Day => "day",
            DynamicLayer::Hour => "hour",
        };
        f.write_str(name)
    }
}

/// The layer a node belongs to, natal included.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeLayer {
    Natal,
    Luck,
    Year,
    Month,
    Day,
    Hour,
}

impl From<DynamicLayer> for TimeLayer {
    fn from(layer: DynamicLayer) -> Self {
        match layer {
            DynamicLayer::Luck => TimeLayer::Luck,
            DynamicLayer::Year => TimeLayer::Year,
            DynamicLayer::Month => TimeLayer::Month,
            DynamicLayer::Day => TimeLayer::Day,
            DynamicLayer::Hour => TimeLayer::Hour,
        }
    }
}

/// Weight of a time layer under `config`.
pub fn time_weight(layer: TimeLayer, config: &EnergyConfig) -> f64 {
    match layer {
        TimeLayer::Natal => 1.0,
        TimeLayer::Luck => config.time_weight_luck,
        TimeLayer::Year => config.time_weight_year,
        TimeLayer::Month => config.time_weight_month,
        TimeLayer::Day => config.time_weight_day,
        TimeLayer::Hour => config.time_weight_hour,
    }
}

/// `W = position weight × time weight × matrix coefficient`.
pub fn calculate_effective_weight(position_weight: f64, time_weight: f64, matrix_coefficient: f64) -> f64 {
    position_weight * time_weight * matrix_coefficient
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_weights() {
        let config = EnergyConfig::default();
        assert_eq!(time_weight(TimeLayer::Natal, &config), 1.0);
        assert_eq!(time_weight(TimeLayer::Luck, &config), 1.2);
        assert_eq!(time_weight(TimeLayer::Year, &config), 1.0);
        assert_eq!(time_weight(TimeLayer::Month, &config), 0.4);
        assert_eq!(time_weight(TimeLayer::Day, &config), 0.25);
        assert_eq!(time_weight(TimeLayer::Hour, &config), 0.15);
    }

    #[test]
    fn weights_follow_config() {
        let config = EnergyConfig {
            time_weight_hour: 0.5,
            ..EnergyConfig::default()
        };
        assert_eq!(time_weight(DynamicLayer::Hour.into(), &config), 0.5);
    }

    #[test]
    fn effective_weight_is_product() {
        let w = calculate_effective_weight(0.8, 0.4, 0.6);
        assert!((w - 0.192).abs() < 1e-12);
        assert_eq!(calculate_effective_weight(1.0, 1.0, 1.0), 1.0);
    }
}
