use serde::{Deserialize, Serialize};

/// One hydraulic machine of a powerplant, either a turbine or a pump.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HydraulicUnit {
    /// Conversion factor between water flow and electrical power, MW per m³/s
    pub power_mw_per_m3s: f64,
    /// Largest flow the unit can pass, m³/s
    pub flow_max_m3s: f64,
    /// Smallest stable flow while the unit is committed, m³/s.
    /// Only enforced by the intraday stage, where commitment is modelled.
    #[serde(default)]
    pub flow_min_m3s: f64,
    /// Largest flow change between consecutive sub-periods, m³/s per hour.
    /// `None` leaves the unit unconstrained.
    #[serde(default)]
    pub ramp_m3s_per_h: Option<f64>,
}

/// A powerplant moving water between two basins.
///
/// Turbining draws from the upstream basin and releases downstream;
/// pumping draws from the downstream basin and injects upstream. A
/// missing downstream basin is a tailrace outside the modelled system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plant {
    /// Stable identifier used to key input and output records
    pub id: String,
    /// Basin the turbine draws from and the pump injects into
    pub upstream_basin: String,
    /// Basin the turbine releases into and the pump draws from
    #[serde(default)]
    pub downstream_basin: Option<String>,
    #[serde(default)]
    pub turbine: Option<HydraulicUnit>,
    #[serde(default)]
    pub pump: Option<HydraulicUnit>,
}

impl Plant {
    pub fn has_turbine(&self) -> bool {
        self.turbine.is_some()
    }

    pub fn has_pump(&self) -> bool {
        self.pump.is_some()
    }

    /// Upper flow bound for the turbine; zero when the plant has none,
    /// which pins the corresponding decision variable to zero.
    pub fn turbine_flow_cap(&self) -> f64 {
        self.turbine.as_ref().map_or(0.0, |u| u.flow_max_m3s)
    }

    /// Upper flow bound for the pump; zero when the plant has none.
    pub fn pump_flow_cap(&self) -> f64 {
        self.pump.as_ref().map_or(0.0, |u| u.flow_max_m3s)
    }

    /// MW produced per m³/s turbined; zero without a turbine.
    pub fn turbine_power_factor(&self) -> f64 {
        self.turbine.as_ref().map_or(0.0, |u| u.power_mw_per_m3s)
    }

    /// MW consumed per m³/s pumped; zero without a pump.
    pub fn pump_power_factor(&self) -> f64 {
        self.pump.as_ref().map_or(0.0, |u| u.power_mw_per_m3s)
    }
}
