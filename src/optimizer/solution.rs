//! Solved-schedule records returned by the two stages.
//!
//! These are plain data: everything a caller needs to audit a plan
//! (trajectories, dispatch, objective decomposition) without touching
//! solver types. Solutions are only constructed from optimal solves;
//! infeasible, unbounded or timed-out runs never produce one.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use itertools::iproduct;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{Forecast, HydroSystem, Scenario, TimeAxis};

/// Volume and spill series of one basin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BasinTrajectory {
    pub basin_id: String,
    /// Stored volume at each period boundary, m³ (one more entry than
    /// there are periods; the first is the initial volume)
    pub volume_m3: Vec<f64>,
    /// Volume spilled during each period, m³
    pub spill_m3: Vec<f64>,
}

/// Flow and power series of one powerplant at the day-ahead resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlantDispatch {
    pub plant_id: String,
    /// Turbined flow per period, m³/s
    pub turbined_m3s: Vec<f64>,
    /// Pumped flow per period, m³/s
    pub pumped_m3s: Vec<f64>,
    /// Net electrical power per period, MW (turbining minus pumping)
    pub power_mw: Vec<f64>,
}

/// Day-ahead plan: trajectories, dispatch and the setpoints the intraday
/// stage is anchored to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FirstStageSolution {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    /// Coarse axis the plan was computed on
    pub axis: TimeAxis,
    pub objective_eur: f64,
    pub breakdown: ObjectiveBreakdown,
    pub basins: Vec<BasinTrajectory>,
    pub plants: Vec<PlantDispatch>,
    /// Net dispatched energy per plant and period, MWh; the intraday
    /// stage penalizes deviation from these values
    pub setpoints_mwh: Vec<Vec<f64>>,
}

impl FirstStageSolution {
    /// Residual of the volume balance for basin `b` over period `t`.
    /// Exactly zero (up to float noise) for any solution of the model.
    pub fn mass_balance_residual(
        &self,
        system: &HydroSystem,
        forecast: &Forecast,
        b: usize,
        t: usize,
    ) -> f64 {
        volume_residual(
            system,
            &self.axis,
            &forecast.inflow_m3,
            &self.basins,
            |p| (&self.plants[p].turbined_m3s, &self.plants[p].pumped_m3s),
            b,
            t,
        )
    }

    /// Largest absolute balance residual across all basins and periods.
    pub fn max_mass_balance_residual(&self, system: &HydroSystem, forecast: &Forecast) -> f64 {
        max_residual(system, self.axis.len(), |b, t| {
            self.mass_balance_residual(system, forecast, b, t)
        })
    }
}

/// Flow, power and commitment series of one powerplant at the intraday
/// resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommittedDispatch {
    pub plant_id: String,
    /// Turbined flow per sub-period, m³/s
    pub turbined_m3s: Vec<f64>,
    /// Pumped flow per sub-period, m³/s
    pub pumped_m3s: Vec<f64>,
    /// Net electrical power per sub-period, MW
    pub power_mw: Vec<f64>,
    /// Turbine commitment per sub-period; all false without a turbine
    pub turbine_on: Vec<bool>,
    /// Pump commitment per sub-period; all false without a pump
    pub pump_on: Vec<bool>,
    /// Signed gap between realized energy and the day-ahead setpoint per
    /// parent period, MWh (positive = overdelivered)
    pub deviation_mwh: Vec<f64>,
}

/// Decomposition of an objective value, all in EUR. The day-ahead stage
/// has no penalty terms, so those buckets stay at zero there.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ObjectiveBreakdown {
    /// Market value of turbined energy
    pub gross_revenue_eur: f64,
    /// Market cost of pumped energy
    pub pumping_cost_eur: f64,
    /// Charge for deviating from day-ahead setpoints
    pub deviation_penalty_eur: f64,
    /// Charge for spilled water
    pub spill_penalty_eur: f64,
}

impl ObjectiveBreakdown {
    /// Net objective: revenue minus every cost and penalty.
    pub fn net_eur(&self) -> f64 {
        self.gross_revenue_eur
            - self.pumping_cost_eur
            - self.deviation_penalty_eur
            - self.spill_penalty_eur
    }
}

/// Intraday schedule for one scenario, solved against fixed day-ahead
/// setpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecondStageSolution {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    /// Scenario label this schedule answers
    pub scenario: String,
    /// Fine axis the schedule was computed on
    pub axis: TimeAxis,
    pub objective_eur: f64,
    pub breakdown: ObjectiveBreakdown,
    pub basins: Vec<BasinTrajectory>,
    pub plants: Vec<CommittedDispatch>,
}

impl SecondStageSolution {
    /// Residual of the volume balance for basin `b` over sub-period `t`.
    pub fn mass_balance_residual(
        &self,
        system: &HydroSystem,
        scenario: &Scenario,
        b: usize,
        t: usize,
    ) -> f64 {
        volume_residual(
            system,
            &self.axis,
            &scenario.inflow_m3,
            &self.basins,
            |p| (&self.plants[p].turbined_m3s, &self.plants[p].pumped_m3s),
            b,
            t,
        )
    }

    /// Largest absolute balance residual across all basins and sub-periods.
    pub fn max_mass_balance_residual(&self, system: &HydroSystem, scenario: &Scenario) -> f64 {
        max_residual(system, self.axis.len(), |b, t| {
            self.mass_balance_residual(system, scenario, b, t)
        })
    }
}

/// Recomputes `V[b][t+1] - V[b][t] - (net volume change)` from a solved
/// schedule. Mirrors the balance constraints of both formulators; a
/// non-zero value means the solution does not conserve water.
fn volume_residual<'a>(
    system: &HydroSystem,
    axis: &TimeAxis,
    inflow_m3: &BTreeMap<String, Vec<f64>>,
    basins: &[BasinTrajectory],
    flows_of: impl Fn(usize) -> (&'a Vec<f64>, &'a Vec<f64>),
    b: usize,
    t: usize,
) -> f64 {
    let to_volume = 3600.0 * axis.hours(t) * system.volume_factor();
    let basin_id = &system.basins()[b].id;

    let inflow = inflow_m3
        .get(basin_id)
        .and_then(|series| series.get(t))
        .copied()
        .unwrap_or(0.0);
    let mut delta = inflow - basins[b].spill_m3[t];

    for b2 in 0..system.basin_count() {
        if system.spill_target_of(b2) == Some(b) {
            delta += basins[b2].spill_m3[t];
        }
    }

    for p in 0..system.plant_count() {
        let (turbined, pumped) = flows_of(p);
        if system.upstream_of(p) == b {
            delta += to_volume * (pumped[t] - turbined[t]);
        }
        if system.downstream_of(p) == Some(b) {
            delta += to_volume * (turbined[t] - pumped[t]);
        }
    }

    basins[b].volume_m3[t + 1] - basins[b].volume_m3[t] - delta
}

fn max_residual(system: &HydroSystem, periods: usize, residual: impl Fn(usize, usize) -> f64) -> f64 {
    iproduct!(0..system.basin_count(), 0..periods)
        .map(|(b, t)| residual(b, t).abs())
        .fold(0.0, f64::max)
}
