//! Common data types for PovLine

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// A measurement attribute of a panel observation.
///
/// The set is closed: every observation carries all six, and the regression
/// always targets [`Variable::PovertyLine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Variable {
    /// Poverty line (currency per capita per month). Regression target.
    PovertyLine,
    /// Human development index.
    HumanDevelopmentIndex,
    /// Labor-force participation rate (percent).
    LaborForceParticipationRate,
    /// Regional minimum wage (currency).
    MinimumWage,
    /// Open unemployment rate (percent).
    UnemploymentRate,
    /// Population living below the poverty line (count).
    PopulationInPoverty,
}

impl Variable {
    /// All variables in canonical column order.
    pub const ALL: [Variable; 6] = [
        Variable::PovertyLine,
        Variable::HumanDevelopmentIndex,
        Variable::LaborForceParticipationRate,
        Variable::MinimumWage,
        Variable::UnemploymentRate,
        Variable::PopulationInPoverty,
    ];

    /// Every variable except the regression target.
    pub const COVARIATES: [Variable; 5] = [
        Variable::HumanDevelopmentIndex,
        Variable::LaborForceParticipationRate,
        Variable::MinimumWage,
        Variable::UnemploymentRate,
        Variable::PopulationInPoverty,
    ];

    /// Position of this variable in [`Variable::ALL`].
    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Canonical column / coefficient name.
    pub fn name(self) -> &'static str {
        match self {
            Variable::PovertyLine => "poverty_line",
            Variable::HumanDevelopmentIndex => "human_development_index",
            Variable::LaborForceParticipationRate => "labor_force_participation_rate",
            Variable::MinimumWage => "minimum_wage",
            Variable::UnemploymentRate => "unemployment_rate",
            Variable::PopulationInPoverty => "population_in_poverty",
        }
    }

    /// Short label used in tables and the prediction formula.
    pub fn label(self) -> &'static str {
        match self {
            Variable::PovertyLine => "PovLine",
            Variable::HumanDevelopmentIndex => "HDI",
            Variable::LaborForceParticipationRate => "LFPR",
            Variable::MinimumWage => "MinWage",
            Variable::UnemploymentRate => "Unemp",
            Variable::PopulationInPoverty => "PopPoor",
        }
    }

    /// Alternative spellings accepted when matching column headers and CLI input.
    ///
    /// Includes the column names of the West Java regency dataset the dashboard
    /// was first built around.
    pub fn aliases(self) -> &'static [&'static str] {
        match self {
            Variable::PovertyLine => &["garis_kemiskinan"],
            Variable::HumanDevelopmentIndex => &["IPM", "hdi"],
            Variable::LaborForceParticipationRate => &["TPAK", "lfpr"],
            Variable::MinimumWage => &["upah_minimum", "wage"],
            Variable::UnemploymentRate => &["TPT", "unemployment"],
            Variable::PopulationInPoverty => &["jumlah_penduduk_miskin"],
        }
    }

    /// Whether `s` names this variable (canonical name, label or alias; ASCII case-insensitive).
    pub fn matches(self, s: &str) -> bool {
        let s = s.trim();
        s.eq_ignore_ascii_case(self.name())
            || s.eq_ignore_ascii_case(self.label())
            || self.aliases().iter().any(|a| s.eq_ignore_ascii_case(a))
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Variable {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Variable::ALL
            .into_iter()
            .find(|v| v.matches(s))
            .ok_or_else(|| Error::Config(format!("unknown variable '{s}'")))
    }
}

/// Covariance estimator used for coefficient standard errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CovarianceKind {
    /// Conventional homoskedastic covariance.
    Unadjusted,
    /// White heteroskedasticity-robust sandwich.
    #[default]
    Robust,
    /// Liang–Zeger sandwich clustered by entity.
    Clustered,
}

impl fmt::Display for CovarianceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CovarianceKind::Unadjusted => "Unadjusted",
            CovarianceKind::Robust => "Robust",
            CovarianceKind::Clustered => "Clustered (entity)",
        })
    }
}

/// Regression formula: `poverty_line ~ covariates + EntityEffects`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CovariateSpec {
    /// Ordered covariates regressed on the target.
    pub covariates: Vec<Variable>,
    /// Entity fixed effects. Always `true`; it is the only supported family.
    #[serde(default = "default_true")]
    pub entity_effects: bool,
}

fn default_true() -> bool {
    true
}

impl CovariateSpec {
    /// Entity fixed-effects spec over `covariates`.
    pub fn new(covariates: Vec<Variable>) -> Self {
        Self { covariates, entity_effects: true }
    }

    /// Check the spec describes an estimable model of the supported family.
    pub fn validate(&self) -> Result<()> {
        if !self.entity_effects {
            return Err(Error::ModelFit(
                "only entity fixed-effects specifications are supported".into(),
            ));
        }
        if self.covariates.is_empty() {
            return Err(Error::ModelFit("covariate list must be non-empty".into()));
        }
        for (i, v) in self.covariates.iter().enumerate() {
            if *v == Variable::PovertyLine {
                return Err(Error::ModelFit(format!("{v} is the target and cannot be a covariate")));
            }
            if self.covariates[..i].contains(v) {
                return Err(Error::ModelFit(format!("covariate {v} listed more than once")));
            }
        }
        Ok(())
    }

    /// Formula string in the usual `y ~ x1 + x2 + EntityEffects` notation.
    pub fn formula(&self) -> String {
        let mut terms: Vec<&str> = self.covariates.iter().map(|v| v.name()).collect();
        if self.entity_effects {
            terms.push("EntityEffects");
        }
        format!("{} ~ {}", Variable::PovertyLine, terms.join(" + "))
    }
}

impl Default for CovariateSpec {
    /// All five covariates, as in the full dashboard model.
    fn default() -> Self {
        Self::new(Variable::COVARIATES.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_variable_from_str_accepts_aliases() {
        assert_eq!("IPM".parse::<Variable>().unwrap(), Variable::HumanDevelopmentIndex);
        assert_eq!("upah_minimum".parse::<Variable>().unwrap(), Variable::MinimumWage);
        assert_eq!("hdi".parse::<Variable>().unwrap(), Variable::HumanDevelopmentIndex);
        assert_eq!(" minimum_wage ".parse::<Variable>().unwrap(), Variable::MinimumWage);
        assert!("bogus".parse::<Variable>().is_err());
    }

    #[test]
    fn test_spec_validation() {
        assert!(CovariateSpec::default().validate().is_ok());
        assert!(CovariateSpec::new(vec![]).validate().is_err());
        assert!(CovariateSpec::new(vec![Variable::PovertyLine]).validate().is_err());
        assert!(
            CovariateSpec::new(vec![Variable::MinimumWage, Variable::MinimumWage])
                .validate()
                .is_err()
        );
        let pooled = CovariateSpec { covariates: vec![Variable::MinimumWage], entity_effects: false };
        assert!(matches!(pooled.validate(), Err(Error::ModelFit(_))));
    }

    #[test]
    fn test_formula() {
        let spec = CovariateSpec::new(vec![Variable::HumanDevelopmentIndex, Variable::MinimumWage]);
        assert_eq!(
            spec.formula(),
            "poverty_line ~ human_development_index + minimum_wage + EntityEffects"
        );
    }
}
