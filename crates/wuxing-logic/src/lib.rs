//! Five-element energy engine for four-pillar charts.
//!
//! This crate contains the whole quantitative model and nothing else: no
//! calendar library, no UI, no storage. Functions take plain data and return
//! results, so every stage is unit-testable and the full run is
//! deterministic down to the stage log.
//!
//! # Module Overview
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`analysis`] | Engine entry points: natal, layered, and year-span reports |
//! | [`calendar`] | Date → sexagenary term boundary and a fixed-term calendar |
//! | [`chart`] | Stems, branches, 60-term cycle, four-pillar parsing |
//! | [`classify`] | Five-level status, circulation, missing elements, day master |
//! | [`config`] | Tunable coefficients, JSON overrides, validation |
//! | [`cycle`] | Luck pillars, flowing year/month/day/hour sequences, cascade |
//! | [`element`] | Element and polarity algebra, per-element maps |
//! | [`error`] | Error types and the crate `Result` alias |
//! | [`node`] | Energy nodes, flags, action efficiency |
//! | [`pipeline`] | Stage orchestration and the stage log |
//! | [`propagation`] | Generate/control propagation (linear and exchange models) |
//! | [`relations`] | Relation network and main-cycle detection |
//! | [`seasonal`] | Rooting, seasonal command, penetration |
//! | [`structure`] | Clash, combination/fusion, punishment and harm |
//! | [`tables`] | Traditional lookup tables |
//! | [`time_weight`] | Dynamic layers and their weights |

pub mod analysis;
pub mod calendar;
pub mod chart;
pub mod classify;
pub mod config;
pub mod cycle;
pub mod element;
pub mod error;
pub mod node;
pub mod pipeline;
pub mod propagation;
pub mod relations;
pub mod seasonal;
pub mod structure;
pub mod tables;
pub mod time_weight;

pub use analysis::{analyze, EnergyAnalysis, EnergyEngine};
pub use chart::FourPillars;
pub use config::EnergyConfig;
pub use error::{EngineError, Result};
