use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::ProgressBar;
use rayon::prelude::*;
use tracing::{info, warn};

use hydroflex::cli::Args;
use hydroflex::config::AppConfig;
use hydroflex::error::PlanError;
use hydroflex::io::case::CaseFile;
use hydroflex::io::export;
use hydroflex::domain::ScenarioGenerator;
use hydroflex::optimizer::{Planner, SecondStageSolution};
use hydroflex::telemetry::init_tracing;

fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();

    let mut config = AppConfig::load()?;
    if let Some(timeout) = args.timeout {
        config.solver.timeout_seconds = timeout;
    }
    if let Some(count) = args.scenarios {
        config.scenarios.count = count;
    }
    if let Some(seed) = args.seed {
        config.scenarios.seed = Some(seed);
    }
    let out_dir = args
        .out
        .unwrap_or_else(|| PathBuf::from(&config.output.directory));

    let case = CaseFile::load(&args.case)?;
    let system = case.build_system()?;
    info!(
        case = %case.name,
        basins = system.basin_count(),
        plants = system.plant_count(),
        "case ready"
    );

    let planner = Planner::new(system)
        .with_solver_config(config.solver.clone())
        .with_second_stage_config(config.second_stage);

    let plan = planner
        .solve_first_stage(&case.forecast)
        .context("day-ahead stage failed")?;

    fs::create_dir_all(&out_dir)
        .with_context(|| format!("failed to create {}", out_dir.display()))?;
    export::export_plan_csv(&plan, &out_dir.join("day_ahead_plan.csv"))?;
    export::export_trajectories_csv(
        "day-ahead",
        &plan.axis,
        &plan.basins,
        &out_dir.join("day_ahead_trajectories.csv"),
    )?;
    fs::write(
        out_dir.join("day_ahead_plan.json"),
        serde_json::to_string_pretty(&plan)?,
    )?;

    let mut scenarios = case.scenarios.clone();
    if config.scenarios.count > 0 {
        let mut generator = ScenarioGenerator::new(config.scenarios.clone());
        scenarios.extend(generator.generate(&case.forecast)?);
    }
    if scenarios.is_empty() {
        info!("no scenarios to recommit, day-ahead plan written");
        return Ok(());
    }

    info!(scenarios = scenarios.len(), "recommitting scenarios");
    let progress = ProgressBar::new(scenarios.len() as u64);
    let results: Vec<(String, Result<SecondStageSolution, PlanError>)> = scenarios
        .par_iter()
        .map(|scenario| {
            let result = planner.solve_second_stage(&plan, scenario);
            progress.inc(1);
            (scenario.name.clone(), result)
        })
        .collect();
    progress.finish_and_clear();

    let mut solved = 0usize;
    for (name, result) in &results {
        match result {
            Ok(schedule) => {
                export::export_dispatch_csv(
                    schedule,
                    &out_dir.join(format!("{name}_dispatch.csv")),
                )?;
                export::export_trajectories_csv(
                    name,
                    &schedule.axis,
                    &schedule.basins,
                    &out_dir.join(format!("{name}_trajectories.csv")),
                )?;
                solved += 1;
            }
            Err(err) => warn!(scenario = %name, %err, "scenario left unsolved"),
        }
    }
    info!(
        solved,
        failed = results.len() - solved,
        out = %out_dir.display(),
        "scheduling run complete"
    );
    Ok(())
}
