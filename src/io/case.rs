//! Case files.
//!
//! One JSON document describes a complete scheduling case: the basin
//! and plant topology, the conversion factor, the day-ahead forecast,
//! and optionally a set of pre-built intraday scenarios. Parsing stays
//! permissive; topology and series validation happens when the system
//! is assembled.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::domain::{Basin, EndVolumePolicy, Forecast, HydroSystem, Plant, Scenario};
use crate::error::DataError;

#[derive(Debug, Error)]
pub enum CaseError {
    #[error("failed to read case file {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse case file {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to encode case file {path}")]
    Encode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to write case file {path}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Data(#[from] DataError),
}

/// On-disk description of a scheduling case.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseFile {
    pub name: String,
    pub basins: Vec<Basin>,
    pub plants: Vec<Plant>,
    /// Conversion factor applied to the flow terms of the volume
    /// balance, on top of the m³/s-to-m³-per-period conversion
    #[serde(default = "default_volume_factor")]
    pub volume_factor: f64,
    #[serde(default)]
    pub end_volume_policy: EndVolumePolicy,
    pub forecast: Forecast,
    /// Pre-built intraday scenarios; more can be sampled at run time
    #[serde(default)]
    pub scenarios: Vec<Scenario>,
}

fn default_volume_factor() -> f64 {
    1.0
}

impl CaseFile {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CaseError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| CaseError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let case: Self = serde_json::from_str(&raw).map_err(|source| CaseError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        info!(case = %case.name, path = %path.display(), "case file loaded");
        Ok(case)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), CaseError> {
        let path = path.as_ref();
        let raw = serde_json::to_string_pretty(self).map_err(|source| CaseError::Encode {
            path: path.to_path_buf(),
            source,
        })?;
        fs::write(path, raw).map_err(|source| CaseError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Validates the topology and assembles the solvable system.
    pub fn build_system(&self) -> Result<HydroSystem, DataError> {
        let system = HydroSystem::new(self.basins.clone(), self.plants.clone())?
            .with_volume_factor(self.volume_factor)?;
        Ok(system.with_end_volume_policy(self.end_volume_policy))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"{
        "name": "single-chute",
        "basins": [
            {
                "id": "upper",
                "volume_min_m3": 0.0,
                "volume_max_m3": 100.0,
                "volume_initial_m3": 50.0
            }
        ],
        "plants": [
            {
                "id": "chute",
                "upstream_basin": "upper",
                "turbine": {
                    "power_mw_per_m3s": 0.5,
                    "flow_max_m3s": 30.0
                }
            }
        ],
        "forecast": {
            "axis": { "hours": [1.0, 1.0, 1.0] },
            "inflow_m3": { "upper": [10.0, 10.0, 10.0] },
            "prices_eur_per_mwh": [5.0, 10.0, 5.0]
        }
    }"#;

    #[test]
    fn parses_a_minimal_case_and_builds_the_system() {
        let case: CaseFile = serde_json::from_str(MINIMAL).unwrap();
        assert_eq!(case.name, "single-chute");
        assert_eq!(case.volume_factor, 1.0);
        assert_eq!(case.end_volume_policy, EndVolumePolicy::Free);
        assert!(case.scenarios.is_empty());

        let system = case.build_system().unwrap();
        assert_eq!(system.basin_count(), 1);
        assert_eq!(system.plant_count(), 1);
        assert!(system.check_forecast(&case.forecast).is_ok());
    }

    #[test]
    fn round_trips_through_json() {
        let case: CaseFile = serde_json::from_str(MINIMAL).unwrap();
        let encoded = serde_json::to_string_pretty(&case).unwrap();
        let decoded: CaseFile = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded.name, case.name);
        assert_eq!(decoded.basins.len(), 1);
        assert_eq!(decoded.forecast.prices_eur_per_mwh, case.forecast.prices_eur_per_mwh);
    }

    #[test]
    fn build_rejects_a_plant_on_an_unknown_basin() {
        let mut case: CaseFile = serde_json::from_str(MINIMAL).unwrap();
        case.plants[0].upstream_basin = "nope".to_string();

        let err = case.build_system().unwrap_err();
        assert!(matches!(err, DataError::UnknownBasin { .. }));
    }
}
