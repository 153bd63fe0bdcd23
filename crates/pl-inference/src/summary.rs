//! Display-only model summary: parameter table and fit statistics.
//!
//! Nothing downstream of the fit reads these numbers; they exist for the
//! "model details" panel and the `summary` command.

use std::fmt;

use nalgebra::{DMatrix, DVector};
use pl_core::{CovarianceKind, CovariateSpec, Variable};
use serde::Serialize;
use statrs::distribution::{ContinuousCDF, FisherSnedecor, StudentsT};

const RULE_WIDTH: usize = 84;

/// One row of the parameter table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoefficientRow {
    /// Covariate name.
    pub name: String,
    /// Point estimate.
    pub estimate: f64,
    /// Standard error under the model's covariance kind.
    pub std_error: f64,
    /// `estimate / std_error`.
    pub t_stat: f64,
    /// Two-sided p-value (Student-t, residual dof).
    pub p_value: f64,
    /// Lower bound of the 95% confidence interval.
    pub ci_lower: f64,
    /// Upper bound of the 95% confidence interval.
    pub ci_upper: f64,
}

/// Estimation summary of a fixed-effects fit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelSummary {
    /// Formula in `y ~ x + EntityEffects` notation.
    pub formula: String,
    /// Covariance estimator behind the standard errors.
    pub covariance: CovarianceKind,
    /// Number of observations.
    pub n_obs: usize,
    /// Number of entities.
    pub n_entities: usize,
    /// Number of distinct periods.
    pub n_periods: usize,
    /// Fewest observations of any entity.
    pub obs_per_entity_min: usize,
    /// Average observations per entity.
    pub obs_per_entity_avg: f64,
    /// Most observations of any entity.
    pub obs_per_entity_max: usize,
    /// Residual degrees of freedom `n − N − k`.
    pub df_resid: usize,
    /// Model degrees of freedom `k`.
    pub df_model: usize,
    /// R² of the demeaned regression.
    pub r_squared_within: f64,
    /// Squared correlation of entity means of `y` and `xβ`.
    pub r_squared_between: f64,
    /// Squared correlation of `y` and `xβ`.
    pub r_squared_overall: f64,
    /// Gaussian log-likelihood of the within residuals.
    pub log_likelihood: f64,
    /// F-statistic of joint significance (conventional).
    pub f_stat: f64,
    /// p-value of `f_stat`.
    pub f_pvalue: f64,
    /// Wald F-statistic under the model's covariance kind.
    pub f_wald: Option<f64>,
    /// p-value of `f_wald`.
    pub f_wald_pvalue: Option<f64>,
    /// Parameter table, in covariate order.
    pub coefficients: Vec<CoefficientRow>,
}

/// Everything [`ModelSummary::build`] needs from the fit.
pub(crate) struct SummaryInputs<'a> {
    pub spec: &'a CovariateSpec,
    pub covariance_kind: CovarianceKind,
    pub coefficients: &'a [f64],
    pub covariance: &'a DMatrix<f64>,
    pub y: &'a [f64],
    pub xb: &'a [f64],
    pub entity: &'a [usize],
    pub entity_sizes: &'a [usize],
    pub y_within: &'a [f64],
    pub rss: f64,
    pub df_resid: usize,
    pub n_periods: usize,
}

impl ModelSummary {
    pub(crate) fn build(inp: SummaryInputs<'_>) -> Self {
        let n = inp.y.len();
        let k = inp.coefficients.len();
        let n_entities = inp.entity_sizes.len();
        let df = inp.df_resid as f64;

        let t_dist = StudentsT::new(0.0, 1.0, df).ok();
        let t_crit = t_dist.as_ref().map_or(f64::NAN, |t| t.inverse_cdf(0.975));

        let coefficients = inp
            .spec
            .covariates
            .iter()
            .enumerate()
            .map(|(j, v)| {
                let estimate = inp.coefficients[j];
                let std_error = inp.covariance[(j, j)].max(0.0).sqrt();
                let t_stat = estimate / std_error;
                let p_value = match (&t_dist, t_stat.is_finite()) {
                    (Some(t), true) => 2.0 * (1.0 - t.cdf(t_stat.abs())),
                    _ => f64::NAN,
                };
                CoefficientRow {
                    name: v.name().to_string(),
                    estimate,
                    std_error,
                    t_stat,
                    p_value,
                    ci_lower: estimate - t_crit * std_error,
                    ci_upper: estimate + t_crit * std_error,
                }
            })
            .collect();

        let tss_within: f64 = inp.y_within.iter().map(|v| v * v).sum();
        let r_squared_within = if tss_within > 0.0 { 1.0 - inp.rss / tss_within } else { 0.0 };

        let mut y_bar = vec![0.0; n_entities];
        let mut xb_bar = vec![0.0; n_entities];
        for (i, &g) in inp.entity.iter().enumerate() {
            y_bar[g] += inp.y[i];
            xb_bar[g] += inp.xb[i];
        }
        for g in 0..n_entities {
            y_bar[g] /= inp.entity_sizes[g] as f64;
            xb_bar[g] /= inp.entity_sizes[g] as f64;
        }

        let n_f = n as f64;
        let log_likelihood =
            -0.5 * n_f * ((2.0 * std::f64::consts::PI).ln() + (inp.rss / n_f).ln() + 1.0);

        let (f_stat, f_pvalue) = if inp.rss > 0.0 {
            let f = ((tss_within - inp.rss) / k as f64) / (inp.rss / df);
            (f, f_sf(f, k as f64, df))
        } else {
            (f64::INFINITY, 0.0)
        };

        let beta = DVector::from_column_slice(inp.coefficients);
        let f_wald = inp
            .covariance
            .clone()
            .try_inverse()
            .map(|v_inv| (beta.transpose() * v_inv * &beta)[(0, 0)] / k as f64)
            .filter(|w| w.is_finite());
        let f_wald_pvalue = f_wald.map(|w| f_sf(w, k as f64, df));

        Self {
            formula: inp.spec.formula(),
            covariance: inp.covariance_kind,
            n_obs: n,
            n_entities,
            n_periods: inp.n_periods,
            obs_per_entity_min: inp.entity_sizes.iter().copied().min().unwrap_or(0),
            obs_per_entity_avg: n_f / n_entities.max(1) as f64,
            obs_per_entity_max: inp.entity_sizes.iter().copied().max().unwrap_or(0),
            df_resid: inp.df_resid,
            df_model: k,
            r_squared_within,
            r_squared_between: squared_correlation(&y_bar, &xb_bar),
            r_squared_overall: squared_correlation(inp.y, inp.xb),
            log_likelihood,
            f_stat,
            f_pvalue,
            f_wald,
            f_wald_pvalue,
            coefficients,
        }
    }

    /// Row for `variable`, if it was a covariate.
    pub fn row(&self, variable: Variable) -> Option<&CoefficientRow> {
        self.coefficients.iter().find(|r| r.name == variable.name())
    }
}

/// Upper tail of F(d1, d2) at `f`; `NaN` when the distribution is undefined.
fn f_sf(f: f64, d1: f64, d2: f64) -> f64 {
    match FisherSnedecor::new(d1, d2) {
        Ok(dist) if f.is_finite() => 1.0 - dist.cdf(f),
        _ => f64::NAN,
    }
}

fn squared_correlation(a: &[f64], b: &[f64]) -> f64 {
    let n = a.len() as f64;
    if a.len() < 2 {
        return f64::NAN;
    }
    let ma = a.iter().sum::<f64>() / n;
    let mb = b.iter().sum::<f64>() / n;
    let (mut sab, mut saa, mut sbb) = (0.0, 0.0, 0.0);
    for (&x, &y) in a.iter().zip(b) {
        sab += (x - ma) * (y - mb);
        saa += (x - ma) * (x - ma);
        sbb += (y - mb) * (y - mb);
    }
    if saa <= 0.0 || sbb <= 0.0 {
        return f64::NAN;
    }
    (sab * sab) / (saa * sbb)
}

fn opt(v: Option<f64>) -> String {
    v.map_or_else(|| "n/a".to_string(), |x| format!("{x:.4}"))
}

impl fmt::Display for ModelSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let heavy = "=".repeat(RULE_WIDTH);
        let light = "-".repeat(RULE_WIDTH);

        writeln!(f, "{:^width$}", "Fixed-Effects Panel Estimation Summary", width = RULE_WIDTH)?;
        writeln!(f, "{heavy}")?;
        let left: [(&str, String); 7] = [
            ("Dep. Variable:", Variable::PovertyLine.name().to_string()),
            ("Estimator:", "Within (entity)".to_string()),
            ("No. Observations:", self.n_obs.to_string()),
            ("Cov. Estimator:", self.covariance.to_string()),
            ("Entities:", self.n_entities.to_string()),
            ("Time periods:", self.n_periods.to_string()),
            (
                "Obs/entity min-avg-max:",
                format!(
                    "{}-{:.1}-{}",
                    self.obs_per_entity_min, self.obs_per_entity_avg, self.obs_per_entity_max
                ),
            ),
        ];
        let right: [(&str, String); 7] = [
            ("R-squared (within):", format!("{:.4}", self.r_squared_within)),
            ("R-squared (between):", format!("{:.4}", self.r_squared_between)),
            ("R-squared (overall):", format!("{:.4}", self.r_squared_overall)),
            ("Log-likelihood:", format!("{:.2}", self.log_likelihood)),
            ("F-statistic:", format!("{:.4}", self.f_stat)),
            ("P-value:", format!("{:.4}", self.f_pvalue)),
            ("F-statistic (Wald):", opt(self.f_wald)),
        ];
        for ((lk, lv), (rk, rv)) in left.iter().zip(right.iter()) {
            writeln!(f, "{lk:<24}{lv:>17}   {rk:<24}{rv:>16}")?;
        }
        writeln!(
            f,
            "{:<24}{:>17}   {:<24}{:>16}",
            "Residual dof:",
            self.df_resid,
            "P-value (Wald):",
            opt(self.f_wald_pvalue)
        )?;
        writeln!(f)?;
        writeln!(f, "{:^width$}", "Parameter Estimates", width = RULE_WIDTH)?;
        writeln!(f, "{heavy}")?;
        writeln!(
            f,
            "{:<32}{:>12}{:>12}{:>8}{:>8}{:>12}{:>12}",
            "", "Parameter", "Std. Err.", "T-stat", "P-value", "Lower CI", "Upper CI"
        )?;
        writeln!(f, "{light}")?;
        for r in &self.coefficients {
            writeln!(
                f,
                "{:<32}{:>12.4}{:>12.4}{:>8.3}{:>8.4}{:>12.4}{:>12.4}",
                r.name, r.estimate, r.std_error, r.t_stat, r.p_value, r.ci_lower, r.ci_upper
            )?;
        }
        writeln!(f, "{heavy}")?;
        write!(f, "{}", self.formula)
    }
}
