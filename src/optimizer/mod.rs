mod first_stage;
mod second_stage;

pub mod planner;
pub mod solution;
pub mod solver;

pub use planner::*;
pub use second_stage::SecondStageConfig;
pub use solution::*;
pub use solver::SolverConfig;
