//! Intraday recommitment formulator.
//!
//! Re-optimizes a single realized scenario on the fine axis with unit
//! commitment: a binary on/off per unit and sub-period gates flow
//! between the unit's minimum and maximum, ramp limits couple
//! consecutive sub-periods, and delivered energy is tethered to the
//! day-ahead setpoints through a pair of non-negative deviation slacks
//! per plant and parent period. An infinite deviation penalty collapses
//! the tether into a hard equality and the slacks are not created at
//! all.

use good_lp::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::{HydroSystem, Scenario, TimeAxis};
use crate::error::SolveError;
use crate::optimizer::solution::{
    BasinTrajectory, CommittedDispatch, ObjectiveBreakdown, SecondStageSolution,
};
use crate::optimizer::solver::map_resolution_error;

/// Tuning knobs of the intraday problem.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct SecondStageConfig {
    /// Price per MWh of absolute deviation from the day-ahead setpoints.
    /// `inf` turns the soft tether into a hard equality.
    pub deviation_penalty_eur_per_mwh: f64,
    /// Price per m³ of spilled water.
    pub spill_penalty_eur_per_m3: f64,
}

impl Default for SecondStageConfig {
    fn default() -> Self {
        Self {
            deviation_penalty_eur_per_mwh: 100.0,
            spill_penalty_eur_per_m3: 0.01,
        }
    }
}

/// Decision variables of the intraday problem.
struct StageVars {
    /// Stored volume per basin at each sub-period boundary, m³
    volume: Vec<Vec<Variable>>,
    /// Spilled volume per basin and sub-period, m³
    spill: Vec<Vec<Variable>>,
    /// Turbined flow per plant and sub-period, m³/s
    turbine_flow: Vec<Vec<Variable>>,
    /// Pumped flow per plant and sub-period, m³/s
    pump_flow: Vec<Vec<Variable>>,
    /// Commitment binaries; inner vec empty for plants without the unit
    turbine_on: Vec<Vec<Variable>>,
    pump_on: Vec<Vec<Variable>>,
    /// Deviation slacks per plant and parent period, MWh; both empty
    /// under a hard tether
    over_mwh: Vec<Vec<Variable>>,
    under_mwh: Vec<Vec<Variable>>,
}

fn declare_variables(
    problem: &mut ProblemVariables,
    system: &HydroSystem,
    periods: usize,
    parents: usize,
    soft_tether: bool,
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

    let mut turbine_flow = Vec::with_capacity(system.plant_count());
    let mut pump_flow = Vec::with_capacity(system.plant_count());
    let mut turbine_on = Vec::with_capacity(system.plant_count());
    let mut pump_on = Vec::with_capacity(system.plant_count());
    let mut over_mwh = Vec::with_capacity(system.plant_count());
    let mut under_mwh = Vec::with_capacity(system.plant_count());
    for plant in system.plants() {
        turbine_flow.push(problem.add_vector(
            variable().min(0.0).max(plant.turbine_flow_cap()),
            periods,
        ));
        pump_flow.push(problem.add_vector(
            variable().min(0.0).max(plant.pump_flow_cap()),
            periods,
        ));
        turbine_on.push(if plant.has_turbine() {
            problem.add_vector(variable().binary(), periods)
        } else {
            Vec::new()
        });
        pump_on.push(if plant.has_pump() {
            problem.add_vector(variable().binary(), periods)
        } else {
            Vec::new()
        });
        if soft_tether {
            over_mwh.push(problem.add_vector(variable().min(0.0), parents));
            under_mwh.push(problem.add_vector(variable().min(0.0), parents));
        } else {
            over_mwh.push(Vec::new());
            under_mwh.push(Vec::new());
        }
    }

    StageVars {
        volume,
        spill,
        turbine_flow,
        pump_flow,
        turbine_on,
        pump_on,
        over_mwh,
        under_mwh,
    }
}

/// Net volume entering basin `b` during sub-period `t`. Same balance as
/// the day-ahead formulator, read from the scenario series instead of
/// the forecast.
fn net_volume_change(
    system: &HydroSystem,
    scenario: &Scenario,
    vars: &StageVars,
    b: usize,
    t: usize,
) -> Expression {
    let basin_id = &system.basins()[b].id;
    let to_volume = 3600.0 * scenario.partition.fine().hours(t) * system.volume_factor();

    let mut delta = Expression::from(scenario.inflow_of(basin_id, t));
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

// The end-volume policy is a day-ahead concern: the intraday problem
// anchors only the initial volume and lets the tether carry the
// end-of-horizon discipline through the setpoints.
fn volume_constraints(
    system: &HydroSystem,
    scenario: &Scenario,
    vars: &StageVars,
) -> Vec<Constraint> {
    let n = scenario.partition.fine().len();
    let mut constraints = Vec::new();
    for (b, basin) in system.basins().iter().enumerate() {
        constraints.push(constraint!(vars.volume[b][0] == basin.volume_initial_m3));
        for t in 0..n {
            let delta = net_volume_change(system, scenario, vars, b, t);
            constraints.push(constraint!(vars.volume[b][t + 1] == vars.volume[b][t] + delta));
        }
    }
    constraints
}

/// Gates each unit's flow behind its commitment binary: zero when off,
/// inside `[flow_min, flow_max]` when on. Plants with both units also
/// get a mutual-exclusion row per sub-period.
fn commitment_constraints(
    system: &HydroSystem,
    vars: &StageVars,
    periods: usize,
) -> Vec<Constraint> {
    let mut out = Vec::new();
    for (p, plant) in system.plants().iter().enumerate() {
        if let Some(unit) = &plant.turbine {
            for t in 0..periods {
                let on = vars.turbine_on[p][t];
                out.push(constraint!(vars.turbine_flow[p][t] <= unit.flow_max_m3s * on));
                if unit.flow_min_m3s > 0.0 {
                    out.push(constraint!(vars.turbine_flow[p][t] >= unit.flow_min_m3s * on));
                }
            }
        }
        if let Some(unit) = &plant.pump {
            for t in 0..periods {
                let on = vars.pump_on[p][t];
                out.push(constraint!(vars.pump_flow[p][t] <= unit.flow_max_m3s * on));
                if unit.flow_min_m3s > 0.0 {
                    out.push(constraint!(vars.pump_flow[p][t] >= unit.flow_min_m3s * on));
                }
            }
        }
        if plant.has_turbine() && plant.has_pump() {
            for t in 0..periods {
                out.push(constraint!(vars.turbine_on[p][t] + vars.pump_on[p][t] <= 1.0));
            }
        }
    }
    out
}

/// Bounds the flow step between consecutive sub-periods for units that
/// declare a ramp rate. The first sub-period is unconstrained; the
/// allowed step scales with the duration of the later one.
fn ramp_constraints(system: &HydroSystem, axis: &TimeAxis, vars: &StageVars) -> Vec<Constraint> {
    let mut out = Vec::new();
    for (p, plant) in system.plants().iter().enumerate() {
        for (unit, flows) in [
            (&plant.turbine, &vars.turbine_flow),
            (&plant.pump, &vars.pump_flow),
        ] {
            let Some(unit) = unit else { continue };
            let Some(ramp) = unit.ramp_m3s_per_h else { continue };
            for t in 1..axis.len() {
                let step = ramp * axis.hours(t);
                out.push(constraint!(flows[p][t] - flows[p][t - 1] <= step));
                out.push(constraint!(flows[p][t - 1] - flows[p][t] <= step));
            }
        }
    }
    out
}

/// Net energy delivered by plant `p` across the sub-periods of parent
/// period `k`, MWh.
fn realized_energy(
    system: &HydroSystem,
    scenario: &Scenario,
    vars: &StageVars,
    p: usize,
    k: usize,
) -> Expression {
    let plant = &system.plants()[p];
    let axis = scenario.partition.fine();
    scenario
        .partition
        .children_of(k)
        .map(|t| {
            let h = axis.hours(t);
            vars.turbine_flow[p][t] * (plant.turbine_power_factor() * h)
                - vars.pump_flow[p][t] * (plant.pump_power_factor() * h)
        })
        .sum::<Expression>()
}

/// Ties realized energy to the day-ahead setpoint for every plant and
/// parent period, either exactly or through the deviation slacks.
fn tether_constraints(
    system: &HydroSystem,
    scenario: &Scenario,
    setpoints_mwh: &[Vec<f64>],
    vars: &StageVars,
    soft_tether: bool,
) -> Vec<Constraint> {
    let mut out = Vec::new();
    for p in 0..system.plant_count() {
        for k in 0..scenario.partition.parent_count() {
            let realized = realized_energy(system, scenario, vars, p, k);
            let setpoint = setpoints_mwh[p][k];
            if soft_tether {
                out.push(constraint!(
                    realized - setpoint == vars.over_mwh[p][k] - vars.under_mwh[p][k]
                ));
            } else {
                out.push(constraint!(realized == setpoint));
            }
        }
    }
    out
}

/// Objective value split by bucket, kept as expressions so the solved
/// amounts can be reported separately.
struct ObjectiveTerms {
    gross: Expression,
    pumping: Expression,
    deviation: Expression,
    spill: Expression,
}

fn objective_terms(
    system: &HydroSystem,
    scenario: &Scenario,
    config: &SecondStageConfig,
    vars: &StageVars,
) -> ObjectiveTerms {
    let axis = scenario.partition.fine();
    let n = axis.len();
    let gross = (0..n)
        .map(|t| {
            let value = scenario.prices_eur_per_mwh[t] * axis.hours(t);
            (0..system.plant_count())
                .map(|p| {
                    vars.turbine_flow[p][t] * (system.plants()[p].turbine_power_factor() * value)
                })
                .sum::<Expression>()
        })
        .sum::<Expression>();
    let pumping = (0..n)
        .map(|t| {
            let value = scenario.prices_eur_per_mwh[t] * axis.hours(t);
            (0..system.plant_count())
                .map(|p| vars.pump_flow[p][t] * (system.plants()[p].pump_power_factor() * value))
                .sum::<Expression>()
        })
        .sum::<Expression>();
    let deviation = if config.deviation_penalty_eur_per_mwh.is_finite() {
        vars.over_mwh
            .iter()
            .flatten()
            .chain(vars.under_mwh.iter().flatten())
            .map(|v| *v * config.deviation_penalty_eur_per_mwh)
            .sum::<Expression>()
    } else {
        Expression::from(0.0)
    };
    let spill = vars
        .spill
        .iter()
        .flatten()
        .map(|v| *v * config.spill_penalty_eur_per_m3)
        .sum::<Expression>();
    ObjectiveTerms {
        gross,
        pumping,
        deviation,
        spill,
    }
}

/// Builds and solves the intraday problem for one scenario.
///
/// `setpoints_mwh` is indexed `[plant][parent period]` and comes from
/// the day-ahead solution; it is read, never written. Inputs are
/// assumed validated by [`crate::optimizer::Planner`].
pub(crate) fn solve(
    system: &HydroSystem,
    scenario: &Scenario,
    setpoints_mwh: &[Vec<f64>],
    config: &SecondStageConfig,
) -> Result<SecondStageSolution, SolveError> {
    let axis = scenario.partition.fine();
    let n = axis.len();
    let parents = scenario.partition.parent_count();
    let soft_tether = config.deviation_penalty_eur_per_mwh.is_finite();

    let mut problem = ProblemVariables::new();
    let vars = declare_variables(&mut problem, system, n, parents, soft_tether);
    let terms = objective_terms(system, scenario, config, &vars);

    let mut constraints = volume_constraints(system, scenario, &vars);
    constraints.extend(commitment_constraints(system, &vars, n));
    constraints.extend(ramp_constraints(system, axis, &vars));
    constraints.extend(tether_constraints(
        system,
        scenario,
        setpoints_mwh,
        &vars,
        soft_tether,
    ));

    let binaries: usize = vars
        .turbine_on
        .iter()
        .chain(vars.pump_on.iter())
        .map(Vec::len)
        .sum();
    debug!(
        scenario = %scenario.name,
        sub_periods = n,
        binaries,
        constraints = constraints.len(),
        soft_tether,
        "assembled intraday model"
    );

    let objective =
        terms.gross.clone() - terms.pumping.clone() - terms.deviation.clone() - terms.spill.clone();
    let mut model = problem.maximise(objective).using(highs);
    for c in constraints {
        model.add_constraint(c);
    }
    let solution = model.solve().map_err(map_resolution_error)?;
    Ok(extract(system, scenario, setpoints_mwh, &vars, terms, &solution))
}

fn extract(
    system: &HydroSystem,
    scenario: &Scenario,
    setpoints_mwh: &[Vec<f64>],
    vars: &StageVars,
    terms: ObjectiveTerms,
    solution: &impl Solution,
) -> SecondStageSolution {
    let axis = scenario.partition.fine();
    let n = axis.len();

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
    for (p, plant) in system.plants().iter().enumerate() {
        let turbined: Vec<f64> = vars.turbine_flow[p].iter().map(|v| solution.value(*v)).collect();
        let pumped: Vec<f64> = vars.pump_flow[p].iter().map(|v| solution.value(*v)).collect();
        let power_mw: Vec<f64> = (0..n)
            .map(|t| plant.turbine_power_factor() * turbined[t] - plant.pump_power_factor() * pumped[t])
            .collect();
        let commitment = |on_vars: &Vec<Variable>| -> Vec<bool> {
            if on_vars.is_empty() {
                vec![false; n]
            } else {
                on_vars.iter().map(|v| solution.value(*v) > 0.5).collect()
            }
        };
        let deviation_mwh: Vec<f64> = (0..scenario.partition.parent_count())
            .map(|k| {
                solution.eval(realized_energy(system, scenario, vars, p, k)) - setpoints_mwh[p][k]
            })
            .collect();
        plants.push(CommittedDispatch {
            plant_id: plant.id.clone(),
            turbined_m3s: turbined,
            pumped_m3s: pumped,
            power_mw,
            turbine_on: commitment(&vars.turbine_on[p]),
            pump_on: commitment(&vars.pump_on[p]),
            deviation_mwh,
        });
    }

    let breakdown = ObjectiveBreakdown {
        gross_revenue_eur: solution.eval(terms.gross),
        pumping_cost_eur: solution.eval(terms.pumping),
        deviation_penalty_eur: solution.eval(terms.deviation),
        spill_penalty_eur: solution.eval(terms.spill),
    };

    SecondStageSolution {
        id: uuid::Uuid::new_v4(),
        created_at: chrono::Utc::now(),
        scenario: scenario.name.clone(),
        axis: axis.clone(),
        objective_eur: breakdown.net_eur(),
        breakdown,
        basins,
        plants,
    }
}
