//! Fixed-effects model over a [`PanelDataset`].
//!
//! Bridges the typed panel (string entity ids, [`Variable`] columns) and the
//! numeric within estimator in [`crate::econometrics::panel`].

use std::collections::{BTreeMap, HashMap};

use nalgebra::DMatrix;
use pl_core::{CovarianceKind, CovariateSpec, Error, Result, Variable};
use pl_data::PanelDataset;
use serde::Serialize;

use crate::econometrics::panel::{std_errors, within_fit};
use crate::summary::{ModelSummary, SummaryInputs};

/// Estimated entity effect attached to one (entity, period) observation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EstimatedEffect {
    /// Entity identifier.
    pub entity_id: String,
    /// Observation period.
    pub period: i32,
    /// Estimated effect for this observation.
    pub effect: f64,
}

/// Estimator entry point.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedEffectsModel {
    covariance: CovarianceKind,
}

impl FixedEffectsModel {
    /// Estimator using the given covariance kind for standard errors.
    pub fn new(covariance: CovarianceKind) -> Self {
        Self { covariance }
    }

    /// Fit `poverty_line ~ spec.covariates + EntityEffects` on `dataset`.
    pub fn fit(&self, dataset: &PanelDataset, spec: &CovariateSpec) -> Result<FittedModel> {
        spec.validate()?;

        let obs = dataset.observations();
        let n = obs.len();
        let k = spec.covariates.len();

        // entity id -> 0-based index, first appearance order
        let mut index: HashMap<&str, usize> = HashMap::new();
        let mut entity_ids: Vec<&str> = Vec::new();
        let mut entity = Vec::with_capacity(n);
        for o in obs {
            let next = index.len();
            let g = *index.entry(o.entity_id.as_str()).or_insert_with(|| {
                entity_ids.push(o.entity_id.as_str());
                next
            });
            entity.push(g);
        }

        let mut x = Vec::with_capacity(n * k);
        for o in obs {
            x.extend(spec.covariates.iter().map(|&v| o.get(v)));
        }
        let y = dataset.column(Variable::PovertyLine);
        let names: Vec<&str> = spec.covariates.iter().map(|v| v.name()).collect();

        tracing::info!(
            formula = %spec.formula(),
            observations = n,
            entities = entity_ids.len(),
            covariance = %self.covariance,
            "fitting fixed-effects model"
        );

        let fit = within_fit(&entity, &x, &y, &names, self.covariance)?;

        let effects: Vec<EstimatedEffect> = obs
            .iter()
            .zip(&entity)
            .map(|(o, &g)| EstimatedEffect {
                entity_id: o.entity_id.clone(),
                period: o.period,
                effect: fit.entity_effects[g],
            })
            .collect();

        let std_errors = std_errors(&fit.covariance);

        // Fitted values without the effects, for R² between/overall.
        let xb: Vec<f64> = x
            .chunks_exact(k)
            .map(|row| row.iter().zip(&fit.coefficients).map(|(a, b)| a * b).sum())
            .collect();

        let summary = ModelSummary::build(SummaryInputs {
            spec,
            covariance_kind: self.covariance,
            coefficients: &fit.coefficients,
            covariance: &fit.covariance,
            y: &y,
            xb: &xb,
            entity: &entity,
            entity_sizes: &fit.entity_sizes,
            y_within: &fit.y_within,
            rss: fit.rss,
            df_resid: fit.df_resid,
            n_periods: dataset.periods().len(),
        });

        for row in &summary.coefficients {
            tracing::debug!(
                covariate = %row.name,
                estimate = row.estimate,
                std_error = row.std_error,
                p_value = row.p_value,
                "coefficient"
            );
        }
        tracing::info!(
            r2_within = summary.r_squared_within,
            df_resid = fit.df_resid,
            "fixed-effects model fitted"
        );

        Ok(FittedModel {
            spec: spec.clone(),
            coefficients: fit.coefficients,
            std_errors,
            covariance: fit.covariance,
            effects,
            summary,
        })
    }
}

/// Result of a fixed-effects fit. Immutable once built.
#[derive(Debug, Clone)]
pub struct FittedModel {
    spec: CovariateSpec,
    coefficients: Vec<f64>,
    std_errors: Vec<f64>,
    covariance: DMatrix<f64>,
    effects: Vec<EstimatedEffect>,
    summary: ModelSummary,
}

impl FittedModel {
    /// The covariate spec this model was fitted with.
    pub fn spec(&self) -> &CovariateSpec {
        &self.spec
    }

    /// Coefficient of `variable`, if it was a covariate.
    pub fn coefficient(&self, variable: Variable) -> Option<f64> {
        self.position(variable).map(|j| self.coefficients[j])
    }

    /// Standard error of `variable`'s coefficient, if it was a covariate.
    pub fn std_error(&self, variable: Variable) -> Option<f64> {
        self.position(variable).map(|j| self.std_errors[j])
    }

    /// Coefficients by covariate. Key set equals the fitted covariates exactly.
    pub fn coefficients(&self) -> BTreeMap<Variable, f64> {
        self.spec.covariates.iter().copied().zip(self.coefficients.iter().copied()).collect()
    }

    /// Coefficient covariance matrix, in covariate order.
    pub fn covariance(&self) -> &DMatrix<f64> {
        &self.covariance
    }

    /// Estimated effect for every (entity, period) observation, in dataset order.
    pub fn estimated_effects(&self) -> &[EstimatedEffect] {
        &self.effects
    }

    /// Estimated effect of one (entity, period) observation.
    pub fn effect(&self, entity_id: &str, period: i32) -> Option<f64> {
        self.effects
            .iter()
            .find(|e| e.entity_id == entity_id && e.period == period)
            .map(|e| e.effect)
    }

    /// Display-only summary (estimates, standard errors, p-values, fit statistics).
    pub fn summary(&self) -> &ModelSummary {
        &self.summary
    }

    fn position(&self, variable: Variable) -> Option<usize> {
        self.spec.covariates.iter().position(|&v| v == variable)
    }
}

/// Fit with the default (robust) covariance.
pub fn fit(dataset: &PanelDataset, spec: &CovariateSpec) -> Result<FittedModel> {
    FixedEffectsModel::default().fit(dataset, spec)
}

/// Checks that every variable in `wanted` has a coefficient in `model`.
pub(crate) fn require_coefficients(
    model: &BTreeMap<Variable, f64>,
    wanted: &[Variable],
) -> Result<()> {
    let missing: Vec<&str> =
        wanted.iter().filter(|v| !model.contains_key(v)).map(|v| v.name()).collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(Error::Config(format!(
            "exposed covariate(s) not in the fitted model: {}",
            missing.join(", ")
        )))
    }
}
