use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::TimeAxis;

/// Day-ahead inputs at the coarse resolution: inflow per basin and the
/// market price curve.
///
/// Inflow series are keyed by basin id; a basin without an entry receives
/// zero inflow, so dry basins need no placeholder series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Forecast {
    pub axis: TimeAxis,
    /// Exogenous inflow (runoff and snowmelt) per basin, m³ per period
    #[serde(default)]
    pub inflow_m3: BTreeMap<String, Vec<f64>>,
    /// Day-ahead market price per period, EUR/MWh
    pub prices_eur_per_mwh: Vec<f64>,
}

impl Forecast {
    /// Inflow of one basin in period `t`, zero when no series exists.
    pub fn inflow_of(&self, basin_id: &str, t: usize) -> f64 {
        self.inflow_m3
            .get(basin_id)
            .and_then(|series| series.get(t))
            .copied()
            .unwrap_or(0.0)
    }

    /// Duration-weighted average of the price curve, EUR/MWh.
    pub fn mean_price_eur_per_mwh(&self) -> f64 {
        if self.prices_eur_per_mwh.is_empty() {
            return 0.0;
        }
        let weighted: f64 = self
            .prices_eur_per_mwh
            .iter()
            .zip(self.axis.as_hours())
            .map(|(p, h)| p * h)
            .sum();
        weighted / self.axis.total_hours()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basins_without_a_series_get_zero_inflow() {
        let forecast = Forecast {
            axis: TimeAxis::uniform(2, 1.0).unwrap(),
            inflow_m3: BTreeMap::from([("upper".to_string(), vec![10.0, 20.0])]),
            prices_eur_per_mwh: vec![5.0, 10.0],
        };
        assert_eq!(forecast.inflow_of("upper", 1), 20.0);
        assert_eq!(forecast.inflow_of("lower", 0), 0.0);
        assert_eq!(forecast.inflow_of("upper", 5), 0.0);
    }

    #[test]
    fn mean_price_weights_by_period_duration() {
        let forecast = Forecast {
            axis: TimeAxis::from_hours(vec![1.0, 3.0]).unwrap(),
            inflow_m3: BTreeMap::new(),
            prices_eur_per_mwh: vec![8.0, 4.0],
        };
        assert!((forecast.mean_price_eur_per_mwh() - 5.0).abs() < 1e-12);
    }
}
