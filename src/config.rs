use anyhow::Result;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct Config {
    #[validate(nested)]
    pub solver: SolverSettings,
    pub telemetry: TelemetryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SolverSettings {
    /// Absolute tolerance for lower-bound activity and positive slack
    #[validate(range(exclusive_min = 0.0, max = 1.0))]
    pub tolerance: f64,

    /// Run the slack relaxation pass when the direct solve is infeasible
    pub relax_deadlocks: bool,
}

impl Default for SolverSettings {
    fn default() -> Self {
        Self {
            tolerance: 1e-6,
            relax_deadlocks: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Fallback filter when RUST_LOG is unset
    pub filter: String,
    pub json: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            filter: "info,flow_balancer=info".to_string(),
            json: true,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::from_figment(
            Figment::new()
                .merge(Toml::file("config/default.toml"))
                .merge(Env::prefixed("FLOW__").split("__")),
        )
    }

    /// Extract over built-in defaults, then validate
    pub fn from_figment(figment: Figment) -> Result<Self> {
        let cfg: Config = Figment::from(Serialized::defaults(Config::default()))
            .merge(figment)
            .extract()?;
        cfg.validate()?;
        Ok(cfg)
    }
}
