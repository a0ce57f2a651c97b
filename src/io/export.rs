//! CSV export for solved schedules.
//!
//! One row per plant and period for dispatch, one row per basin and
//! period for storage trajectories. Output is deterministic for
//! identical inputs, so files can be diffed across runs.

use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use crate::domain::TimeAxis;
use crate::optimizer::{BasinTrajectory, FirstStageSolution, SecondStageSolution};

const PLAN_HEADER: &str = "plant,period,hours,turbined_m3s,pumped_m3s,power_mw,setpoint_mwh";
const DISPATCH_HEADER: &str =
    "scenario,plant,period,hours,turbined_m3s,pumped_m3s,power_mw,turbine_on,pump_on";
const TRAJECTORY_HEADER: &str = "label,basin,period,volume_start_m3,volume_end_m3,spill_m3";

/// Writes the day-ahead plan to a CSV file at `path`.
pub fn export_plan_csv(plan: &FirstStageSolution, path: &Path) -> io::Result<()> {
    let file = File::create(path)?;
    write_plan_csv(plan, io::BufWriter::new(file))
}

/// Writes the day-ahead plan as CSV to any writer.
pub fn write_plan_csv(plan: &FirstStageSolution, writer: impl Write) -> io::Result<()> {
    let mut wtr = csv::WriterBuilder::new().from_writer(writer);
    wtr.write_record(PLAN_HEADER.split(','))?;
    for (p, dispatch) in plan.plants.iter().enumerate() {
        for t in 0..plan.axis.len() {
            wtr.write_record(&[
                dispatch.plant_id.clone(),
                t.to_string(),
                format!("{:.4}", plan.axis.hours(t)),
                format!("{:.6}", dispatch.turbined_m3s[t]),
                format!("{:.6}", dispatch.pumped_m3s[t]),
                format!("{:.6}", dispatch.power_mw[t]),
                format!("{:.6}", plan.setpoints_mwh[p][t]),
            ])?;
        }
    }
    wtr.flush()?;
    Ok(())
}

/// Writes one scenario's committed dispatch to a CSV file at `path`.
pub fn export_dispatch_csv(schedule: &SecondStageSolution, path: &Path) -> io::Result<()> {
    let file = File::create(path)?;
    write_dispatch_csv(schedule, io::BufWriter::new(file))
}

/// Writes one scenario's committed dispatch as CSV to any writer.
pub fn write_dispatch_csv(schedule: &SecondStageSolution, writer: impl Write) -> io::Result<()> {
    let mut wtr = csv::WriterBuilder::new().from_writer(writer);
    wtr.write_record(DISPATCH_HEADER.split(','))?;
    for dispatch in &schedule.plants {
        for t in 0..schedule.axis.len() {
            wtr.write_record(&[
                schedule.scenario.clone(),
                dispatch.plant_id.clone(),
                t.to_string(),
                format!("{:.4}", schedule.axis.hours(t)),
                format!("{:.6}", dispatch.turbined_m3s[t]),
                format!("{:.6}", dispatch.pumped_m3s[t]),
                format!("{:.6}", dispatch.power_mw[t]),
                dispatch.turbine_on[t].to_string(),
                dispatch.pump_on[t].to_string(),
            ])?;
        }
    }
    wtr.flush()?;
    Ok(())
}

/// Writes basin storage trajectories to a CSV file at `path`.
pub fn export_trajectories_csv(
    label: &str,
    axis: &TimeAxis,
    basins: &[BasinTrajectory],
    path: &Path,
) -> io::Result<()> {
    let file = File::create(path)?;
    write_trajectories_csv(label, axis, basins, io::BufWriter::new(file))
}

/// Writes basin storage trajectories as CSV to any writer. Works for
/// both stages; `label` tags the rows ("day-ahead" or a scenario name).
pub fn write_trajectories_csv(
    label: &str,
    axis: &TimeAxis,
    basins: &[BasinTrajectory],
    writer: impl Write,
) -> io::Result<()> {
    let mut wtr = csv::WriterBuilder::new().from_writer(writer);
    wtr.write_record(TRAJECTORY_HEADER.split(','))?;
    for trajectory in basins {
        for t in 0..axis.len() {
            wtr.write_record(&[
                label.to_string(),
                trajectory.basin_id.clone(),
                t.to_string(),
                format!("{:.6}", trajectory.volume_m3[t]),
                format!("{:.6}", trajectory.volume_m3[t + 1]),
                format!("{:.6}", trajectory.spill_m3[t]),
            ])?;
        }
    }
    wtr.flush()?;
    Ok(())
}
