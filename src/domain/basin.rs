use serde::{Deserialize, Serialize};

/// A reservoir whose stored water volume evolves under inflow, powerplant
/// releases and spill.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Basin {
    /// Stable identifier used to key input and output records
    pub id: String,
    /// Lowest volume operation may draw the basin down to, m³
    pub volume_min_m3: f64,
    /// Storage capacity, m³
    pub volume_max_m3: f64,
    /// Stored volume at the start of the scheduling horizon, m³
    pub volume_initial_m3: f64,
    /// Basin receiving spilled water; `None` sends spill out of the system
    #[serde(default)]
    pub spills_into: Option<String>,
}

impl Basin {
    /// Volume band the optimizer may move within, m³.
    pub fn usable_range_m3(&self) -> f64 {
        self.volume_max_m3 - self.volume_min_m3
    }
}
