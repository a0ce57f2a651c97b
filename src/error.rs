use thiserror::Error;

/// Input problems detected while assembling a model.
///
/// These abort formulation before anything is handed to the solver and
/// always name the offending entity.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DataError {
    #[error("duplicate basin id: {0}")]
    DuplicateBasin(String),

    #[error("duplicate powerplant id: {0}")]
    DuplicatePlant(String),

    #[error("{context} references unknown basin {basin}")]
    UnknownBasin { context: String, basin: String },

    #[error("unknown powerplant id: {0}")]
    UnknownPlant(String),

    #[error("basin {0} cannot spill into itself")]
    SelfSpill(String),

    #[error("powerplant {0} links a basin to itself")]
    SelfLoop(String),

    #[error("powerplant {0} declares neither a turbine nor a pump")]
    PlantWithoutUnits(String),

    #[error("{entity}: {field} must not be negative")]
    NegativeBound { entity: String, field: &'static str },

    #[error("{entity}: {field} range is empty (min exceeds max)")]
    EmptyRange { entity: String, field: &'static str },

    #[error("{field} must be a non-negative number")]
    InvalidPenalty { field: &'static str },

    #[error("time axis has no periods")]
    EmptyHorizon,

    #[error("period {index} has a non-positive duration")]
    NonPositiveDuration { index: usize },

    #[error("malformed period partition at sub-period {index}: {detail}")]
    MalformedPartition { index: usize, detail: String },

    #[error("{series} has {actual} entries, expected {expected}")]
    LengthMismatch {
        series: String,
        expected: usize,
        actual: usize,
    },
}

/// Outcomes of handing a finished model to the MILP solver.
///
/// `Infeasible` and `Unbounded` are expected optimization outcomes, not
/// bugs; callers decide whether to relax inputs and try again.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SolveError {
    #[error("model is infeasible")]
    Infeasible,

    #[error("objective is unbounded")]
    Unbounded,

    #[error("solver exceeded the configured time budget")]
    TimedOut,

    #[error("solver backend failure: {0}")]
    Backend(String),
}

/// Anything that can go wrong between loading inputs and returning a
/// solved schedule.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PlanError {
    #[error(transparent)]
    Data(#[from] DataError),

    #[error(transparent)]
    Solve(#[from] SolveError),
}

impl PlanError {
    /// True when the underlying solve found no feasible point.
    pub fn is_infeasible(&self) -> bool {
        matches!(self, PlanError::Solve(SolveError::Infeasible))
    }

    /// True when the solver ran out of its wall-clock budget.
    pub fn is_timeout(&self) -> bool {
        matches!(self, PlanError::Solve(SolveError::TimedOut))
    }
}
