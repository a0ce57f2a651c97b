use anyhow::Result;
use figment::{providers::{Env, Format, Toml}, Figment};
use serde::{Deserialize, Serialize};

use crate::domain::ScenarioConfig;
use crate::optimizer::{SecondStageConfig, SolverConfig};

/// Application configuration, merged from `config/default.toml` and
/// `HYDROFLEX__`-prefixed environment variables. Every section has
/// working defaults, so a missing file is not an error.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub solver: SolverConfig,
    pub second_stage: SecondStageConfig,
    pub scenarios: ScenarioConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Directory result files are written into
    pub directory: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: "results".to_string(),
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        let figment = Figment::new()
            .merge(Toml::file("config/default.toml"))
            .merge(Env::prefixed("HYDROFLEX__").split("__"));
        Ok(figment.extract()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_cover_every_section() {
        let config = AppConfig::default();
        assert_eq!(config.solver.timeout_seconds, 120);
        assert_eq!(config.second_stage.deviation_penalty_eur_per_mwh, 100.0);
        assert_eq!(config.scenarios.count, 4);
        assert_eq!(config.output.directory, "results");
    }

    #[test]
    fn figment_overlays_toml_fragments_onto_defaults() {
        figment::Jail::expect_with(|jail| {
            jail.create_dir("config")?;
            jail.create_file(
                "config/default.toml",
                r#"
                [solver]
                timeout_seconds = 7

                [scenarios]
                count = 2
                "#,
            )?;
            let config = AppConfig::load().map_err(|e| e.to_string())?;
            assert_eq!(config.solver.timeout_seconds, 7);
            assert_eq!(config.scenarios.count, 2);
            assert_eq!(config.second_stage.spill_penalty_eur_per_m3, 0.01);
            Ok(())
        });
    }
}
