//! Dashboard config v0 (YAML) parsing + semantic validation.
//!
//! One file names the panel CSV, optional column overrides, the model to fit
//! and the simulation surface (exposed covariates, preset wage bands).

use std::path::{Path, PathBuf};

use pl_core::{CovarianceKind, CovariateSpec, Error, Result, Variable};
use pl_data::ColumnMap;
use serde::{Deserialize, Serialize};

pub const SCHEMA_V0: &str = "povline_dashboard_v0";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DashboardConfig {
    pub schema_version: String,
    pub data: DataConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub simulation: SimulationConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DataConfig {
    /// CSV/TSV path; relative paths are resolved against the config file.
    pub path: PathBuf,
    #[serde(default)]
    pub columns: ColumnMap,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ModelConfig {
    pub covariates: Vec<Variable>,
    pub covariance: CovarianceKind,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self { covariates: Variable::COVARIATES.to_vec(), covariance: CovarianceKind::default() }
    }
}

impl ModelConfig {
    pub fn spec(&self) -> CovariateSpec {
        CovariateSpec::new(self.covariates.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimulationConfig {
    pub exposed: Vec<Variable>,
    pub wage_bands: Vec<WageBand>,
}

/// Preset minimum-wage choice: a label and the value it stands for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WageBand {
    pub label: String,
    pub value: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        // Bands of 500k rupiah from 1jt to 6jt, each standing for its midpoint.
        let wage_bands = (0..10)
            .map(|i| {
                let lo = 1.0 + 0.5 * i as f64;
                let hi = lo + 0.5;
                WageBand {
                    label: format!("{} - {}", millions(lo), millions(hi)),
                    value: (lo + hi) / 2.0 * 1_000_000.0,
                }
            })
            .collect();
        Self {
            exposed: vec![Variable::HumanDevelopmentIndex, Variable::MinimumWage],
            wage_bands,
        }
    }
}

fn millions(x: f64) -> String {
    if x.fract() == 0.0 { format!("{x:.0}jt") } else { format!("{x:.1}jt") }
}

impl SimulationConfig {
    pub fn wage_band(&self, label: &str) -> Option<&WageBand> {
        let label = label.trim();
        self.wage_bands.iter().find(|b| b.label.eq_ignore_ascii_case(label))
    }
}

impl DashboardConfig {
    /// Default config reading the panel at `path`.
    pub fn for_input(path: impl Into<PathBuf>) -> Self {
        Self {
            schema_version: SCHEMA_V0.to_string(),
            data: DataConfig { path: path.into(), columns: ColumnMap::default() },
            model: ModelConfig::default(),
            simulation: SimulationConfig::default(),
        }
    }

    pub fn from_yaml_str(text: &str) -> Result<Self> {
        // YAML is a superset of JSON, so JSON configs parse here as well.
        let probe: serde_yaml_ng::Value = serde_yaml_ng::from_str(text)?;
        match probe.get("schema_version").and_then(|v| v.as_str()) {
            Some(SCHEMA_V0) => {}
            Some(other) => {
                return Err(Error::Config(format!(
                    "unsupported schema_version '{other}' (expected '{SCHEMA_V0}')"
                )));
            }
            None => return Err(Error::Config("missing schema_version".to_string())),
        }
        let cfg: Self = serde_yaml_ng::from_value(probe)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Read and validate `path`, resolving `data.path` against its directory.
    pub fn read(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let mut cfg = Self::from_yaml_str(&text)?;
        if cfg.data.path.is_relative() {
            let base = path.parent().unwrap_or_else(|| Path::new("."));
            cfg.data.path = base.join(&cfg.data.path);
        }
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        self.model.spec().validate()?;

        let sim = &self.simulation;
        if sim.exposed.is_empty() {
            return Err(Error::Config("simulation.exposed must not be empty".to_string()));
        }
        for v in &sim.exposed {
            if !self.model.covariates.contains(v) {
                return Err(Error::Config(format!(
                    "exposed covariate {v} is not in model.covariates"
                )));
            }
        }
        for (i, band) in sim.wage_bands.iter().enumerate() {
            if !(band.value.is_finite() && band.value > 0.0) {
                return Err(Error::Config(format!(
                    "wage band '{}' must have a positive value",
                    band.label
                )));
            }
            if sim.wage_bands[..i].iter().any(|b| b.label.eq_ignore_ascii_case(&band.label)) {
                return Err(Error::Config(format!("duplicate wage band '{}'", band.label)));
            }
        }
        Ok(())
    }
}
