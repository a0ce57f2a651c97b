//! Full pipeline checks: case in, both stages solved, artifacts out.

use std::collections::BTreeMap;

use hydroflex::domain::{
    Basin, Forecast, HydraulicUnit, HydroSystem, Plant, Scenario, ScenarioConfig,
    ScenarioGenerator, TimeAxis, TimePartition,
};
use hydroflex::io::case::CaseFile;
use hydroflex::io::export;
use hydroflex::optimizer::{Planner, SecondStageConfig};

const VF: f64 = 1.0 / 3600.0;

fn reference_system(flow_min: f64) -> HydroSystem {
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
            flow_min_m3s: flow_min,
            ramp_m3s_per_h: None,
        }),
        pump: None,
    };
    HydroSystem::new(vec![basin], vec![plant])
        .unwrap()
        .with_volume_factor(VF)
        .unwrap()
}

fn reference_forecast(prices: [f64; 3]) -> Forecast {
    Forecast {
        axis: TimeAxis::uniform(3, 1.0).unwrap(),
        inflow_m3: BTreeMap::from([("upper".to_string(), vec![10.0, 10.0, 10.0])]),
        prices_eur_per_mwh: prices.to_vec(),
    }
}

fn hard_tether() -> SecondStageConfig {
    SecondStageConfig {
        deviation_penalty_eur_per_mwh: f64::INFINITY,
        spill_penalty_eur_per_m3: 0.01,
    }
}

#[test]
fn day_ahead_moves_water_to_the_price_peak() {
    let planner = Planner::new(reference_system(0.0));
    let plan = planner
        .solve_first_stage(&reference_forecast([5.0, 10.0, 5.0]))
        .unwrap();

    // 80 m³ pass through: the 30 the cap allows at the peak, the other
    // 50 at the shoulder prices.
    let flows = &plan.plants[0].turbined_m3s;
    assert!((flows[1] - 30.0).abs() < 1e-6);
    assert!((flows[0] + flows[2] - 50.0).abs() < 1e-6);
    assert!((plan.objective_eur - 275.0).abs() < 1e-6);

    let forecast = reference_forecast([5.0, 10.0, 5.0]);
    assert!(plan.max_mass_balance_residual(planner.system(), &forecast) < 1e-6);
    for &volume in &plan.basins[0].volume_m3 {
        assert!((-1e-6..=100.0 + 1e-6).contains(&volume));
    }
}

#[test]
fn intraday_tracks_the_plan_exactly_under_a_hard_tether() {
    let planner = Planner::new(reference_system(0.0)).with_second_stage_config(hard_tether());
    let forecast = reference_forecast([5.0, 10.0, 5.0]);
    let plan = planner.solve_first_stage(&forecast).unwrap();

    let scenario = Scenario {
        name: "repeat".to_string(),
        partition: TimePartition::refine_uniform(&plan.axis, 4).unwrap(),
        inflow_m3: BTreeMap::from([("upper".to_string(), vec![2.5; 12])]),
        prices_eur_per_mwh: vec![
            5.0, 5.0, 5.0, 5.0, 10.0, 10.0, 10.0, 10.0, 5.0, 5.0, 5.0, 5.0,
        ],
    };

    let schedule = planner.solve_second_stage(&plan, &scenario).unwrap();

    for (k, deviation) in schedule.plants[0].deviation_mwh.iter().enumerate() {
        assert!(
            deviation.abs() < 1e-5,
            "parent {k} deviates by {deviation}"
        );
    }
    for k in 0..3 {
        let realized: f64 = (4 * k..4 * k + 4)
            .map(|t| schedule.plants[0].power_mw[t] * 0.25)
            .sum();
        assert!((realized - plan.setpoints_mwh[0][k]).abs() < 1e-5);
    }
    assert!(schedule.max_mass_balance_residual(planner.system(), &scenario) < 1e-6);
}

#[test]
fn negative_price_sub_periods_shut_the_turbine_down() {
    let config = SecondStageConfig {
        deviation_penalty_eur_per_mwh: 50.0,
        spill_penalty_eur_per_m3: 0.01,
    };
    let planner = Planner::new(reference_system(5.0)).with_second_stage_config(config);
    // A strictly decreasing-value shoulder keeps the day-ahead split
    // unique: 30 at 6 EUR, 30 at the peak, the remaining 20 at 5 EUR.
    let forecast = reference_forecast([6.0, 10.0, 5.0]);
    let plan = planner.solve_first_stage(&forecast).unwrap();
    assert!((plan.plants[0].turbined_m3s[0] - 30.0).abs() < 1e-6);
    assert!((plan.plants[0].turbined_m3s[2] - 20.0).abs() < 1e-6);

    let scenario = Scenario {
        name: "price-crash".to_string(),
        partition: TimePartition::refine_uniform(&plan.axis, 2).unwrap(),
        inflow_m3: BTreeMap::from([("upper".to_string(), vec![5.0; 6])]),
        prices_eur_per_mwh: vec![6.0, 6.0, 10.0, -500.0, 5.0, 5.0],
    };

    let schedule = planner.solve_second_stage(&plan, &scenario).unwrap();
    let chute = planner.system().plant_index("chute").unwrap();
    let dispatch = &schedule.plants[chute];

    // Off or inside the [5, 30] band, never in between.
    for t in 0..6 {
        if dispatch.turbine_on[t] {
            assert!(dispatch.turbined_m3s[t] >= 5.0 - 1e-6);
            assert!(dispatch.turbined_m3s[t] <= 30.0 + 1e-6);
        } else {
            assert!(dispatch.turbined_m3s[t] < 1e-6);
        }
    }
    // Paying the deviation penalty beats generating at -500 EUR/MWh.
    assert!(!dispatch.turbine_on[3]);
    assert!(dispatch.turbine_on[2]);
    assert!((dispatch.deviation_mwh[1] - (-7.5)).abs() < 1e-4);
    assert!((schedule.breakdown.deviation_penalty_eur - 375.0).abs() < 1e-3);
}

#[test]
fn identical_inputs_produce_identical_schedules() {
    let forecast = reference_forecast([5.0, 10.0, 5.0]);
    let scenario_config = ScenarioConfig {
        count: 3,
        children_per_period: 2,
        inflow_sigma: 0.1,
        price_sigma: 0.15,
        seed: Some(7),
    };

    let run = || {
        let planner = Planner::new(reference_system(0.0));
        let plan = planner.solve_first_stage(&forecast).unwrap();
        let scenarios = ScenarioGenerator::new(scenario_config.clone())
            .generate(&forecast)
            .unwrap();
        let results = planner.solve_scenarios(&plan, &scenarios);
        let objectives: Vec<f64> = results
            .iter()
            .map(|(_, result)| result.as_ref().unwrap().objective_eur)
            .collect();
        (plan.objective_eur, objectives)
    };

    let (first_a, intraday_a) = run();
    let (first_b, intraday_b) = run();

    assert!((first_a - first_b).abs() < 1e-9);
    assert_eq!(intraday_a.len(), intraday_b.len());
    for (a, b) in intraday_a.iter().zip(&intraday_b) {
        assert!((a - b).abs() < 1e-9);
    }
}

#[test]
fn case_file_pipeline_produces_csv_artifacts() {
    let case_json = r#"{
        "name": "cascade-demo",
        "volume_factor": 0.000277777777777778,
        "basins": [
            { "id": "upper", "volume_min_m3": 0.0, "volume_max_m3": 100.0, "volume_initial_m3": 50.0 }
        ],
        "plants": [
            {
                "id": "chute",
                "upstream_basin": "upper",
                "turbine": { "power_mw_per_m3s": 0.5, "flow_max_m3s": 30.0 }
            }
        ],
        "forecast": {
            "axis": { "hours": [1.0, 1.0, 1.0] },
            "inflow_m3": { "upper": [10.0, 10.0, 10.0] },
            "prices_eur_per_mwh": [5.0, 10.0, 5.0]
        }
    }"#;
    let case: CaseFile = serde_json::from_str(case_json).unwrap();

    // Round-trip through disk to exercise load/save.
    let path = std::env::temp_dir().join(format!("hydroflex-case-{}.json", uuid::Uuid::new_v4()));
    case.save(&path).unwrap();
    let case = CaseFile::load(&path).unwrap();
    let _ = std::fs::remove_file(&path);

    let system = case.build_system().unwrap();
    let planner = Planner::new(system).with_second_stage_config(hard_tether());
    let plan = planner.solve_first_stage(&case.forecast).unwrap();

    let scenario = Scenario {
        name: "s000".to_string(),
        partition: TimePartition::refine_uniform(&plan.axis, 2).unwrap(),
        inflow_m3: BTreeMap::from([("upper".to_string(), vec![5.0; 6])]),
        prices_eur_per_mwh: vec![5.0, 5.0, 10.0, 10.0, 5.0, 5.0],
    };
    let schedule = planner.solve_second_stage(&plan, &scenario).unwrap();

    let mut plan_csv = Vec::new();
    export::write_plan_csv(&plan, &mut plan_csv).unwrap();
    let plan_text = String::from_utf8(plan_csv).unwrap();
    assert!(plan_text.starts_with("plant,period,hours,"));
    assert_eq!(plan_text.lines().count(), 1 + 3);

    let mut dispatch_csv = Vec::new();
    export::write_dispatch_csv(&schedule, &mut dispatch_csv).unwrap();
    let dispatch_text = String::from_utf8(dispatch_csv).unwrap();
    assert!(dispatch_text.starts_with("scenario,plant,period,"));
    assert_eq!(dispatch_text.lines().count(), 1 + 6);

    let mut trajectory_csv = Vec::new();
    export::write_trajectories_csv(
        &schedule.scenario,
        &schedule.axis,
        &schedule.basins,
        &mut trajectory_csv,
    )
    .unwrap();
    let trajectory_text = String::from_utf8(trajectory_csv).unwrap();
    assert!(trajectory_text.starts_with("label,basin,period,"));
    assert_eq!(trajectory_text.lines().count(), 1 + 6);
}

#[test]
fn sampled_scenarios_recommit_in_order() {
    let planner = Planner::new(reference_system(0.0));
    let forecast = reference_forecast([5.0, 10.0, 5.0]);
    let plan = planner.solve_first_stage(&forecast).unwrap();

    let scenarios = ScenarioGenerator::new(ScenarioConfig {
        count: 4,
        children_per_period: 2,
        inflow_sigma: 0.05,
        price_sigma: 0.1,
        seed: Some(42),
    })
    .generate(&forecast)
    .unwrap();

    let results = planner.solve_scenarios(&plan, &scenarios);
    assert_eq!(results.len(), 4);
    for (i, (name, result)) in results.iter().enumerate() {
        assert_eq!(name, &scenarios[i].name);
        let schedule = result.as_ref().unwrap();
        assert!(schedule.max_mass_balance_residual(planner.system(), &scenarios[i]) < 1e-6);
    }
}
