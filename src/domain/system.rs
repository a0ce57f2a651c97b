use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::{Basin, Forecast, Plant, Scenario};
use crate::error::DataError;

/// How the terminal basin volume is tied down by the day-ahead stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndVolumePolicy {
    /// Terminal volume only has to respect the basin bounds
    #[default]
    Free,
    /// Terminal volume must return to the initial volume, for horizons
    /// that repeat (weekly scheduling of a seasonal storage chain)
    Cyclic,
}

impl std::fmt::Display for EndVolumePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EndVolumePolicy::Free => write!(f, "free"),
            EndVolumePolicy::Cyclic => write!(f, "cyclic"),
        }
    }
}

/// Validated basin/powerplant topology shared by both stages.
///
/// Construction resolves all string references into dense indices and
/// rejects malformed inputs with a [`DataError`] naming the offending
/// entity. Once built, the system is immutable; solves share it read-only.
#[derive(Debug, Clone, PartialEq)]
pub struct HydroSystem {
    basins: Vec<Basin>,
    plants: Vec<Plant>,
    /// Index of the basin each plant draws from when turbining
    plant_upstream: Vec<usize>,
    /// Index of the basin each plant releases into, if modelled
    plant_downstream: Vec<Option<usize>>,
    /// Index of the basin each basin spills into, if any
    spill_target: Vec<Option<usize>>,
    volume_factor: f64,
    end_volume_policy: EndVolumePolicy,
}

impl HydroSystem {
    /// Builds a system with a volume factor of 1 (volumes in m³) and a
    /// free terminal volume.
    pub fn new(basins: Vec<Basin>, plants: Vec<Plant>) -> Result<Self, DataError> {
        let mut basin_index: BTreeMap<&str, usize> = BTreeMap::new();
        for (b, basin) in basins.iter().enumerate() {
            if basin_index.insert(basin.id.as_str(), b).is_some() {
                return Err(DataError::DuplicateBasin(basin.id.clone()));
            }
        }
        for basin in &basins {
            check_basin_bounds(basin)?;
        }

        let mut spill_target = Vec::with_capacity(basins.len());
        for basin in &basins {
            match &basin.spills_into {
                None => spill_target.push(None),
                Some(target) if target == &basin.id => {
                    return Err(DataError::SelfSpill(basin.id.clone()));
                }
                Some(target) => match basin_index.get(target.as_str()) {
                    Some(&idx) => spill_target.push(Some(idx)),
                    None => {
                        return Err(DataError::UnknownBasin {
                            context: format!("basin {}", basin.id),
                            basin: target.clone(),
                        });
                    }
                },
            }
        }

        let mut plant_index: BTreeMap<&str, usize> = BTreeMap::new();
        for (p, plant) in plants.iter().enumerate() {
            if plant_index.insert(plant.id.as_str(), p).is_some() {
                return Err(DataError::DuplicatePlant(plant.id.clone()));
            }
        }

        let mut plant_upstream = Vec::with_capacity(plants.len());
        let mut plant_downstream = Vec::with_capacity(plants.len());
        for plant in &plants {
            if !plant.has_turbine() && !plant.has_pump() {
                return Err(DataError::PlantWithoutUnits(plant.id.clone()));
            }
            check_plant_units(plant)?;

            let upstream = *basin_index.get(plant.upstream_basin.as_str()).ok_or_else(|| {
                DataError::UnknownBasin {
                    context: format!("powerplant {}", plant.id),
                    basin: plant.upstream_basin.clone(),
                }
            })?;
            let downstream = match &plant.downstream_basin {
                None => None,
                Some(id) => {
                    let idx = *basin_index.get(id.as_str()).ok_or_else(|| DataError::UnknownBasin {
                        context: format!("powerplant {}", plant.id),
                        basin: id.clone(),
                    })?;
                    if idx == upstream {
                        return Err(DataError::SelfLoop(plant.id.clone()));
                    }
                    Some(idx)
                }
            };
            plant_upstream.push(upstream);
            plant_downstream.push(downstream);
        }

        Ok(Self {
            basins,
            plants,
            plant_upstream,
            plant_downstream,
            spill_target,
            volume_factor: 1.0,
            end_volume_policy: EndVolumePolicy::default(),
        })
    }

    /// Scales flow-to-volume conversion, e.g. `1e-6` stores volumes in Mm³.
    pub fn with_volume_factor(mut self, volume_factor: f64) -> Result<Self, DataError> {
        if !volume_factor.is_finite() || volume_factor <= 0.0 {
            return Err(DataError::NegativeBound {
                entity: "system".to_string(),
                field: "volume_factor",
            });
        }
        self.volume_factor = volume_factor;
        Ok(self)
    }

    pub fn with_end_volume_policy(mut self, policy: EndVolumePolicy) -> Self {
        self.end_volume_policy = policy;
        self
    }

    pub fn basins(&self) -> &[Basin] {
        &self.basins
    }

    pub fn plants(&self) -> &[Plant] {
        &self.plants
    }

    pub fn basin_count(&self) -> usize {
        self.basins.len()
    }

    pub fn plant_count(&self) -> usize {
        self.plants.len()
    }

    pub fn basin_position(&self, id: &str) -> Option<usize> {
        self.basins.iter().position(|b| b.id == id)
    }

    /// Resolves a powerplant id into its dense index.
    ///
    /// Solution series are ordered by plant index, so callers holding an
    /// id go through this to pick the right row.
    pub fn plant_index(&self, id: &str) -> Result<usize, DataError> {
        self.plants
            .iter()
            .position(|p| p.id == id)
            .ok_or_else(|| DataError::UnknownPlant(id.to_string()))
    }

    /// Basin index plant `p` turbines from and pumps into.
    pub fn upstream_of(&self, p: usize) -> usize {
        self.plant_upstream[p]
    }

    /// Basin index plant `p` releases into, `None` for a tailrace.
    pub fn downstream_of(&self, p: usize) -> Option<usize> {
        self.plant_downstream[p]
    }

    /// Basin index basin `b` spills into, `None` when spill leaves the system.
    pub fn spill_target_of(&self, b: usize) -> Option<usize> {
        self.spill_target[b]
    }

    pub fn volume_factor(&self) -> f64 {
        self.volume_factor
    }

    pub fn end_volume_policy(&self) -> EndVolumePolicy {
        self.end_volume_policy
    }

    /// Checks a day-ahead forecast against this system.
    pub fn check_forecast(&self, forecast: &Forecast) -> Result<(), DataError> {
        forecast.axis.check()?;
        self.check_series(
            &forecast.inflow_m3,
            forecast.axis.len(),
            forecast.prices_eur_per_mwh.len(),
            "forecast",
        )
    }

    /// Checks an intraday scenario's series against this system.
    ///
    /// The partition itself is validated separately against the coarse
    /// axis the first stage ran on.
    pub fn check_scenario(&self, scenario: &Scenario) -> Result<(), DataError> {
        scenario.partition.fine().check()?;
        self.check_series(
            &scenario.inflow_m3,
            scenario.partition.fine().len(),
            scenario.prices_eur_per_mwh.len(),
            &format!("scenario {}", scenario.name),
        )
    }

    fn check_series(
        &self,
        inflow_m3: &BTreeMap<String, Vec<f64>>,
        periods: usize,
        price_len: usize,
        context: &str,
    ) -> Result<(), DataError> {
        if price_len != periods {
            return Err(DataError::LengthMismatch {
                series: format!("{context} price series"),
                expected: periods,
                actual: price_len,
            });
        }
        for (basin_id, series) in inflow_m3 {
            if self.basin_position(basin_id).is_none() {
                return Err(DataError::UnknownBasin {
                    context: format!("{context} inflow series"),
                    basin: basin_id.clone(),
                });
            }
            if series.len() != periods {
                return Err(DataError::LengthMismatch {
                    series: format!("{context} inflow series for basin {basin_id}"),
                    expected: periods,
                    actual: series.len(),
                });
            }
        }
        Ok(())
    }
}

fn check_basin_bounds(basin: &Basin) -> Result<(), DataError> {
    let entity = || format!("basin {}", basin.id);
    for (field, value) in [
        ("volume_min_m3", basin.volume_min_m3),
        ("volume_max_m3", basin.volume_max_m3),
        ("volume_initial_m3", basin.volume_initial_m3),
    ] {
        if !value.is_finite() || value < 0.0 {
            return Err(DataError::NegativeBound { entity: entity(), field });
        }
    }
    if basin.volume_max_m3 < basin.volume_min_m3 {
        return Err(DataError::EmptyRange {
            entity: entity(),
            field: "volume",
        });
    }
    Ok(())
}

fn check_plant_units(plant: &Plant) -> Result<(), DataError> {
    for (kind, unit) in [("turbine", &plant.turbine), ("pump", &plant.pump)] {
        let Some(unit) = unit else { continue };
        let entity = || format!("powerplant {} ({kind})", plant.id);
        for (field, value) in [
            ("power_mw_per_m3s", unit.power_mw_per_m3s),
            ("flow_max_m3s", unit.flow_max_m3s),
            ("flow_min_m3s", unit.flow_min_m3s),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(DataError::NegativeBound { entity: entity(), field });
            }
        }
        if let Some(ramp) = unit.ramp_m3s_per_h {
            if !ramp.is_finite() || ramp < 0.0 {
                return Err(DataError::NegativeBound {
                    entity: entity(),
                    field: "ramp_m3s_per_h",
                });
            }
        }
        if unit.flow_min_m3s > unit.flow_max_m3s {
            return Err(DataError::EmptyRange {
                entity: entity(),
                field: "flow",
            });
        }
    }
    Ok(())
}
