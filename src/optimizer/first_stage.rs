//! Day-ahead formulator.
//!
//! Builds the coarse-resolution problem: continuous turbine/pump flows,
//! basin volume evolution with spill routing, and a market-revenue
//! objective. No commitment binaries at this stage, so the model is a
//! pure LP and solves fast even for long horizons.

use good_lp::*;
use tracing::debug;

use crate::domain::{EndVolumePolicy, Forecast, HydroSystem};
use crate::error::SolveError;
use crate::optimizer::solution::{
    BasinTrajectory, FirstStageSolution, ObjectiveBreakdown, PlantDispatch,
};
use crate::optimizer::solver::map_resolution_error;

/// Decision variables of the day-ahead problem.
struct StageVars {
    /// Stored volume per basin at each period boundary, m³
    volume: Vec<Vec<Variable>>,
    /// Spilled volume per basin and period, m³
    spill: Vec<Vec<Variable>>,
    /// Turbined flow per plant and period, m³/s
    turbine_flow: Vec<Vec<Variable>>,
    /// Pumped flow per plant and period, m³/s
    pump_flow: Vec<Vec<Variable>>,
}

fn declare_variables(
    problem: &mut ProblemVariables,
    system: &HydroSystem,
    periods: usize,
) -> StageVars {
    let mut volume = Vec::with_capacity(system.basin_count());
    let mut spill = Vec::with_capacity(system.basin_count());
    for basin in system.basins() {
        volume.push(problem.add_vector(
            variable().min(basin.volume_min_m3).max(basin.volume_max_m3),
            periods + 1,
        ));
        spill.push(problem.add_vector(variable().min(0.0), periods));
    }

    // Plants without one of the units get a zero flow cap, which pins the
    // corresponding variables to zero without special-casing the model.
    let mut turbine_flow = Vec::with_capacity(system.plant_count());
    let mut pump_flow = Vec::with_capacity(system.plant_count());
    for plant in system.plants() {
        turbine_flow.push(problem.add_vector(
            variable().min(0.0).max(plant.turbine_flow_cap()),
            periods,
        ));
        pump_flow.push(problem.add_vector(
            variable().min(0.0).max(plant.pump_flow_cap()),
            periods,
        ));
    }

    StageVars {
        volume,
        spill,
        turbine_flow,
        pump_flow,
    }
}

/// Net volume entering basin `b` during period `t`: inflow, spill out,
/// spill routed in from upstream basins, and the signed powerplant terms
/// (turbining drains the upstream basin and feeds the downstream one,
/// pumping does the opposite).
fn net_volume_change(
    system: &HydroSystem,
    forecast: &Forecast,
    vars: &StageVars,
    b: usize,
    t: usize,
) -> Expression {
    let basin_id = &system.basins()[b].id;
    let to_volume = 3600.0 * forecast.axis.hours(t) * system.volume_factor();

    let mut delta = Expression::from(forecast.inflow_of(basin_id, t));
    delta = delta - vars.spill[b][t];
    for b2 in 0..system.basin_count() {
        if system.spill_target_of(b2) == Some(b) {
            delta = delta + vars.spill[b2][t];
        }
    }
    for p in 0..system.plant_count() {
        if system.upstream_of(p) == b {
            delta = delta + (vars.pump_flow[p][t] - vars.turbine_flow[p][t]) * to_volume;
        }
        if system.downstream_of(p) == Some(b) {
            delta = delta + (vars.turbine_flow[p][t] - vars.pump_flow[p][t]) * to_volume;
        }
    }
    delta
}

fn volume_constraints(
    system: &HydroSystem,
    forecast: &Forecast,
    vars: &StageVars,
) -> Vec<Constraint> {
    let n = forecast.axis.len();
    let mut constraints = Vec::new();
    for (b, basin) in system.basins().iter().enumerate() {
        constraints.push(constraint!(vars.volume[b][0] == basin.volume_initial_m3));
        for t in 0..n {
            let delta = net_volume_change(system, forecast, vars, b, t);
            constraints.push(constraint!(vars.volume[b][t + 1] == vars.volume[b][t] + delta));
        }
        if system.end_volume_policy() == EndVolumePolicy::Cyclic {
            constraints.push(constraint!(vars.volume[b][n] == basin.volume_initial_m3));
        }
    }
    constraints
}

/// Market value of turbined energy and cost of pumped energy, kept as
/// separate expressions so the solved values can be reported per bucket.
fn objective_terms(
    system: &HydroSystem,
    forecast: &Forecast,
    vars: &StageVars,
) -> (Expression, Expression) {
    let n = forecast.axis.len();
    let gross = (0..n)
        .map(|t| {
            let value = forecast.prices_eur_per_mwh[t] * forecast.axis.hours(t);
            (0..system.plant_count())
                .map(|p| {
                    vars.turbine_flow[p][t] * (system.plants()[p].turbine_power_factor() * value)
                })
                .sum::<Expression>()
        })
        .sum::<Expression>();
    let pumping = (0..n)
        .map(|t| {
            let value = forecast.prices_eur_per_mwh[t] * forecast.axis.hours(t);
            (0..system.plant_count())
                .map(|p| vars.pump_flow[p][t] * (system.plants()[p].pump_power_factor() * value))
                .sum::<Expression>()
        })
        .sum::<Expression>();
    (gross, pumping)
}

/// Builds and solves the day-ahead problem.
///
/// Inputs are assumed validated; call sites go through
/// [`crate::optimizer::Planner`], which checks them first.
pub(crate) fn solve(
    system: &HydroSystem,
    forecast: &Forecast,
) -> Result<FirstStageSolution, SolveError> {
    let n = forecast.axis.len();
    let mut problem = ProblemVariables::new();
    let vars = declare_variables(&mut problem, system, n);
    let (gross, pumping) = objective_terms(system, forecast, &vars);
    let constraints = volume_constraints(system, forecast, &vars);

    debug!(
        basins = system.basin_count(),
        plants = system.plant_count(),
        periods = n,
        constraints = constraints.len(),
        "assembled day-ahead model"
    );

    let mut model = problem.maximise(gross.clone() - pumping.clone()).using(highs);
    for c in constraints {
        model.add_constraint(c);
    }
    let solution = model.solve().map_err(map_resolution_error)?;
    Ok(extract(system, forecast, &vars, gross, pumping, &solution))
}

fn extract(
    system: &HydroSystem,
    forecast: &Forecast,
    vars: &StageVars,
    gross: Expression,
    pumping: Expression,
    solution: &impl Solution,
) -> FirstStageSolution {
    let n = forecast.axis.len();

    let basins = system
        .basins()
        .iter()
        .enumerate()
        .map(|(b, basin)| BasinTrajectory {
            basin_id: basin.id.clone(),
            volume_m3: vars.volume[b].iter().map(|v| solution.value(*v)).collect(),
            spill_m3: vars.spill[b].iter().map(|v| solution.value(*v)).collect(),
        })
        .collect();

    let mut plants = Vec::with_capacity(system.plant_count());
    let mut setpoints_mwh = Vec::with_capacity(system.plant_count());
    for (p, plant) in system.plants().iter().enumerate() {
        let turbined: Vec<f64> = vars.turbine_flow[p].iter().map(|v| solution.value(*v)).collect();
        let pumped: Vec<f64> = vars.pump_flow[p].iter().map(|v| solution.value(*v)).collect();
        let power_mw: Vec<f64> = (0..n)
            .map(|t| plant.turbine_power_factor() * turbined[t] - plant.pump_power_factor() * pumped[t])
            .collect();
        let setpoints: Vec<f64> = (0..n).map(|t| power_mw[t] * forecast.axis.hours(t)).collect();
        plants.push(PlantDispatch {
            plant_id: plant.id.clone(),
            turbined_m3s: turbined,
            pumped_m3s: pumped,
            power_mw,
        });
        setpoints_mwh.push(setpoints);
    }

    let breakdown = ObjectiveBreakdown {
        gross_revenue_eur: solution.eval(gross),
        pumping_cost_eur: solution.eval(pumping),
        deviation_penalty_eur: 0.0,
        spill_penalty_eur: 0.0,
    };

    FirstStageSolution {
        id: uuid::Uuid::new_v4(),
        created_at: chrono::Utc::now(),
        axis: forecast.axis.clone(),
        objective_eur: breakdown.net_eur(),
        breakdown,
        basins,
        plants,
        setpoints_mwh,
    }
}
