//! Scheduling façade.
//!
//! Validates inputs, runs the stage formulators under the solve
//! timeout, and fans scenario batches out across a rayon pool. The
//! formulators themselves stay private to the optimizer module; this
//! is the only solve surface the rest of the crate sees.

use std::sync::Arc;

use rayon::prelude::*;
use tracing::{info, warn};

use crate::domain::{Forecast, HydroSystem, Scenario};
use crate::error::{DataError, PlanError};
use crate::optimizer::first_stage;
use crate::optimizer::second_stage::{self, SecondStageConfig};
use crate::optimizer::solution::{FirstStageSolution, SecondStageSolution};
use crate::optimizer::solver::{solve_with_timeout, SolverConfig};

/// Entry point for both scheduling stages.
///
/// Holds the system description and tuning. Solve calls take their
/// inputs by reference and leave them untouched, so a single planner
/// can serve many scenarios, including concurrently.
#[derive(Debug, Clone)]
pub struct Planner {
    system: Arc<HydroSystem>,
    solver: SolverConfig,
    second_stage: SecondStageConfig,
}

impl Planner {
    pub fn new(system: HydroSystem) -> Self {
        Self {
            system: Arc::new(system),
            solver: SolverConfig::default(),
            second_stage: SecondStageConfig::default(),
        }
    }

    pub fn with_solver_config(mut self, config: SolverConfig) -> Self {
        self.solver = config;
        self
    }

    pub fn with_second_stage_config(mut self, config: SecondStageConfig) -> Self {
        self.second_stage = config;
        self
    }

    pub fn system(&self) -> &HydroSystem {
        &self.system
    }

    /// Computes the day-ahead plan for one forecast.
    pub fn solve_first_stage(&self, forecast: &Forecast) -> Result<FirstStageSolution, PlanError> {
        self.system.check_forecast(forecast)?;

        let system = Arc::clone(&self.system);
        let forecast = forecast.clone();
        let result = solve_with_timeout(&self.solver, "day-ahead", move || {
            first_stage::solve(&system, &forecast)
        });
        match &result {
            Ok(plan) => info!(objective_eur = plan.objective_eur, "day-ahead plan solved"),
            Err(err) => warn!(%err, "day-ahead solve failed"),
        }
        Ok(result?)
    }

    /// Recommits one scenario against a day-ahead plan.
    ///
    /// The plan is read, never modified. Each call assembles a fresh
    /// model, so the same plan can be recommitted any number of times,
    /// from any thread.
    pub fn solve_second_stage(
        &self,
        plan: &FirstStageSolution,
        scenario: &Scenario,
    ) -> Result<SecondStageSolution, PlanError> {
        scenario.partition.check_against(&plan.axis)?;
        self.system.check_scenario(scenario)?;
        check_setpoint_shape(&self.system, plan)?;
        check_penalties(&self.second_stage)?;

        let system = Arc::clone(&self.system);
        let scenario_data = scenario.clone();
        let setpoints = plan.setpoints_mwh.clone();
        let config = self.second_stage;
        let label = format!("intraday-{}", scenario.name);
        let result = solve_with_timeout(&self.solver, &label, move || {
            second_stage::solve(&system, &scenario_data, &setpoints, &config)
        });
        match &result {
            Ok(schedule) => info!(
                scenario = %schedule.scenario,
                objective_eur = schedule.objective_eur,
                "intraday schedule solved"
            ),
            Err(err) => warn!(scenario = %scenario.name, %err, "intraday solve failed"),
        }
        Ok(result?)
    }

    /// Recommits every scenario, one rayon worker per scenario.
    ///
    /// Results come back in input order, tagged with the scenario name.
    /// Failures stay per-scenario so one bad draw cannot sink the
    /// batch.
    pub fn solve_scenarios(
        &self,
        plan: &FirstStageSolution,
        scenarios: &[Scenario],
    ) -> Vec<(String, Result<SecondStageSolution, PlanError>)> {
        scenarios
            .par_iter()
            .map(|scenario| (scenario.name.clone(), self.solve_second_stage(plan, scenario)))
            .collect()
    }
}

fn check_setpoint_shape(system: &HydroSystem, plan: &FirstStageSolution) -> Result<(), DataError> {
    if plan.setpoints_mwh.len() != system.plant_count() {
        return Err(DataError::LengthMismatch {
            series: "setpoints_mwh".to_string(),
            expected: system.plant_count(),
            actual: plan.setpoints_mwh.len(),
        });
    }
    for (p, row) in plan.setpoints_mwh.iter().enumerate() {
        if row.len() != plan.axis.len() {
            return Err(DataError::LengthMismatch {
                series: format!("setpoints_mwh[{}]", system.plants()[p].id),
                expected: plan.axis.len(),
                actual: row.len(),
            });
        }
    }
    Ok(())
}

fn check_penalties(config: &SecondStageConfig) -> Result<(), DataError> {
    // Infinity is a valid deviation penalty (hard tether); NaN and
    // negative prices are not. The spill penalty multiplies a variable,
    // so it must stay finite.
    let deviation = config.deviation_penalty_eur_per_mwh;
    if deviation.is_nan() || deviation < 0.0 {
        return Err(DataError::InvalidPenalty {
            field: "deviation_penalty_eur_per_mwh",
        });
    }
    let spill = config.spill_penalty_eur_per_m3;
    if !spill.is_finite() || spill < 0.0 {
        return Err(DataError::InvalidPenalty {
            field: "spill_penalty_eur_per_m3",
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Basin, HydraulicUnit, Plant, TimeAxis, TimePartition};
    use std::collections::BTreeMap;

    fn small_system() -> HydroSystem {
        let basin = Basin {
            id: "upper".to_string(),
            volume_min_m3: 0.0,
            volume_max_m3: 100.0,
            volume_initial_m3: 50.0,
            spills_into: None,
        };
        let plant = Plant {
            id: "chute".to_string(),
            upstream_basin: "upper".to_string(),
            downstream_basin: None,
            turbine: Some(HydraulicUnit {
                power_mw_per_m3s: 0.5,
                flow_max_m3s: 30.0,
                flow_min_m3s: 0.0,
                ramp_m3s_per_h: None,
            }),
            pump: None,
        };
        HydroSystem::new(vec![basin], vec![plant])
            .unwrap()
            .with_volume_factor(1.0 / 3600.0)
            .unwrap()
    }

    fn forecast() -> Forecast {
        Forecast {
            axis: TimeAxis::uniform(2, 1.0).unwrap(),
            inflow_m3: BTreeMap::from([("upper".to_string(), vec![10.0, 10.0])]),
            prices_eur_per_mwh: vec![2.0, 10.0],
        }
    }

    #[test]
    fn rejects_a_price_series_of_the_wrong_length() {
        let planner = Planner::new(small_system());
        let mut forecast = forecast();
        forecast.prices_eur_per_mwh.pop();

        let err = planner.solve_first_stage(&forecast).unwrap_err();
        assert!(matches!(
            err,
            PlanError::Data(DataError::LengthMismatch { expected: 2, actual: 1, .. })
        ));
    }

    #[test]
    fn rejects_a_partition_built_for_another_horizon() {
        let planner = Planner::new(small_system());
        let plan = planner.solve_first_stage(&forecast()).unwrap();

        let foreign = TimeAxis::uniform(3, 1.0).unwrap();
        let scenario = Scenario {
            name: "bad".to_string(),
            partition: TimePartition::refine_uniform(&foreign, 2).unwrap(),
            inflow_m3: BTreeMap::new(),
            prices_eur_per_mwh: vec![10.0; 6],
        };

        let err = planner.solve_second_stage(&plan, &scenario).unwrap_err();
        assert!(matches!(err, PlanError::Data(_)));
    }

    #[test]
    fn rejects_setpoints_that_do_not_cover_every_plant() {
        let planner = Planner::new(small_system());
        let mut plan = planner.solve_first_stage(&forecast()).unwrap();
        plan.setpoints_mwh.clear();

        let coarse = TimeAxis::uniform(2, 1.0).unwrap();
        let scenario = Scenario {
            name: "s000".to_string(),
            partition: TimePartition::refine_uniform(&coarse, 2).unwrap(),
            inflow_m3: BTreeMap::new(),
            prices_eur_per_mwh: vec![10.0; 4],
        };

        let err = planner.solve_second_stage(&plan, &scenario).unwrap_err();
        assert!(matches!(
            err,
            PlanError::Data(DataError::LengthMismatch { expected: 1, actual: 0, .. })
        ));
    }

    #[test]
    fn rejects_a_nan_deviation_penalty() {
        let config = SecondStageConfig {
            deviation_penalty_eur_per_mwh: f64::NAN,
            spill_penalty_eur_per_m3: 0.01,
        };
        let planner = Planner::new(small_system()).with_second_stage_config(config);
        let plan = planner.solve_first_stage(&forecast()).unwrap();

        let coarse = TimeAxis::uniform(2, 1.0).unwrap();
        let scenario = Scenario {
            name: "s000".to_string(),
            partition: TimePartition::refine_uniform(&coarse, 2).unwrap(),
            inflow_m3: BTreeMap::new(),
            prices_eur_per_mwh: vec![10.0; 4],
        };

        let err = planner.solve_second_stage(&plan, &scenario).unwrap_err();
        assert!(matches!(err, PlanError::Data(DataError::InvalidPenalty { .. })));
    }

    #[test]
    fn both_stages_agree_under_a_hard_tether() {
        let config = SecondStageConfig {
            deviation_penalty_eur_per_mwh: f64::INFINITY,
            spill_penalty_eur_per_m3: 0.01,
        };
        let planner = Planner::new(small_system()).with_second_stage_config(config);
        let plan = planner.solve_first_stage(&forecast()).unwrap();

        let scenario = Scenario {
            name: "s000".to_string(),
            partition: TimePartition::refine_uniform(&plan.axis, 2).unwrap(),
            inflow_m3: BTreeMap::from([("upper".to_string(), vec![5.0, 5.0, 5.0, 5.0])]),
            prices_eur_per_mwh: vec![2.0, 2.0, 10.0, 10.0],
        };

        let schedule = planner.solve_second_stage(&plan, &scenario).unwrap();
        for deviation in &schedule.plants[0].deviation_mwh {
            assert!(deviation.abs() < 1e-5);
        }
        let coarse_energy: f64 = plan.setpoints_mwh[0].iter().sum();
        let fine_energy: f64 = (0..4).map(|t| schedule.plants[0].power_mw[t] * 0.5).sum();
        assert!((coarse_energy - fine_energy).abs() < 1e-5);
    }

    #[test]
    fn scenario_batches_preserve_input_order() {
        let config = SecondStageConfig {
            deviation_penalty_eur_per_mwh: 100.0,
            spill_penalty_eur_per_m3: 0.01,
        };
        let planner = Planner::new(small_system()).with_second_stage_config(config);
        let plan = planner.solve_first_stage(&forecast()).unwrap();

        let scenarios: Vec<Scenario> = (0..3)
            .map(|i| Scenario {
                name: format!("s{i:03}"),
                partition: TimePartition::refine_uniform(&plan.axis, 2).unwrap(),
                inflow_m3: BTreeMap::from([("upper".to_string(), vec![5.0; 4])]),
                prices_eur_per_mwh: vec![2.0, 2.0, 10.0, 10.0],
            })
            .collect();

        let results = planner.solve_scenarios(&plan, &scenarios);
        assert_eq!(results.len(), 3);
        for (i, (name, result)) in results.iter().enumerate() {
            assert_eq!(name, &format!("s{i:03}"));
            assert!(result.is_ok());
        }
    }
}
