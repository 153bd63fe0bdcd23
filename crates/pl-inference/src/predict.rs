//! Point prediction from a fitted model.
//!
//! `prediction = Σ_{v ∈ exposed} β_v · input_v + intercept(entity)`
//!
//! Only the *exposed* covariates enter the sum. Covariates that were fitted
//! but are not exposed to the simulation contribute nothing: their
//! coefficients exist but are not applied. This is a product decision (the
//! simulation shows the significant covariates only), not an omission.
//!
//! An entity selector that matches no entity (by id, then by display name)
//! falls back to the mean of all intercepts instead of failing.

use std::collections::BTreeMap;
use std::fmt;

use pl_core::{Error, Result, Variable};
use serde::Serialize;

use crate::intercepts::EntityIntercepts;
use crate::model::{FittedModel, require_coefficients};

/// User-chosen covariate values.
pub type Inputs = BTreeMap<Variable, f64>;

/// One `coefficient × input` term of a prediction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Term {
    /// Covariate.
    pub variable: Variable,
    /// Fitted coefficient.
    pub coefficient: f64,
    /// Input value.
    pub input: f64,
    /// `coefficient * input`.
    pub contribution: f64,
}

/// How the entity selector was resolved.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EntityResolution {
    /// Selector matched a known entity.
    Known {
        /// Entity identifier.
        entity_id: String,
        /// Entity display name.
        display_name: String,
    },
    /// Selector matched nothing; the mean intercept was used.
    Fallback {
        /// The unmatched selector.
        selector: String,
    },
}

/// A prediction with its breakdown.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    /// Predicted poverty line.
    pub value: f64,
    /// Intercept used.
    pub intercept: f64,
    /// Entity the intercept came from.
    pub entity: EntityResolution,
    /// Exposed-covariate terms, in exposed order.
    pub terms: Vec<Term>,
}

impl fmt::Display for Prediction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = ", Variable::PovertyLine)?;
        for t in &self.terms {
            write!(f, "({:.4} × {}) + ", t.coefficient, t.input)?;
        }
        write!(f, "({:.2}) = {:.2}", self.intercept, self.value)
    }
}

/// Prediction function bound to one fitted model and intercept table.
///
/// Immutable and `Send + Sync`; share it by reference across sessions.
#[derive(Debug, Clone)]
pub struct Predictor {
    coefficients: BTreeMap<Variable, f64>,
    intercepts: EntityIntercepts,
    exposed: Vec<Variable>,
}

impl Predictor {
    /// Bind `model`'s coefficients for the `exposed` covariates.
    ///
    /// Fails with [`Error::Config`] if an exposed covariate was not fitted or
    /// is listed twice.
    pub fn new(
        model: &FittedModel,
        intercepts: EntityIntercepts,
        exposed: Vec<Variable>,
    ) -> Result<Self> {
        Self::from_coefficients(model.coefficients(), intercepts, exposed)
    }

    /// Like [`Predictor::new`], from a bare coefficient map.
    pub fn from_coefficients(
        coefficients: BTreeMap<Variable, f64>,
        intercepts: EntityIntercepts,
        exposed: Vec<Variable>,
    ) -> Result<Self> {
        for (i, v) in exposed.iter().enumerate() {
            if exposed[..i].contains(v) {
                return Err(Error::Config(format!("exposed covariate {v} listed more than once")));
            }
        }
        require_coefficients(&coefficients, &exposed)?;
        Ok(Self { coefficients, intercepts, exposed })
    }

    /// Covariates the prediction uses, in order.
    pub fn exposed(&self) -> &[Variable] {
        &self.exposed
    }

    /// Entity intercept table.
    pub fn intercepts(&self) -> &EntityIntercepts {
        &self.intercepts
    }

    /// Fitted coefficient of `variable`, exposed or not.
    pub fn coefficient(&self, variable: Variable) -> Option<f64> {
        self.coefficients.get(&variable).copied()
    }

    /// Predicted poverty line for `entity_selector` at `inputs`.
    pub fn predict(&self, entity_selector: &str, inputs: &Inputs) -> Result<f64> {
        self.explain(entity_selector, inputs).map(|p| p.value)
    }

    /// Like [`Predictor::predict`], returning the full breakdown.
    pub fn explain(&self, entity_selector: &str, inputs: &Inputs) -> Result<Prediction> {
        let missing: Vec<String> = self
            .exposed
            .iter()
            .filter(|v| !inputs.contains_key(v))
            .map(|v| v.name().to_string())
            .collect();
        if !missing.is_empty() {
            return Err(Error::Input { missing });
        }

        let terms: Vec<Term> = self
            .exposed
            .iter()
            .map(|&variable| {
                // Presence checked by `require_coefficients` at construction.
                let coefficient = self.coefficients.get(&variable).copied().unwrap_or(0.0);
                let input = inputs[&variable];
                Term { variable, coefficient, input, contribution: coefficient * input }
            })
            .collect();

        let (intercept, entity) = match self.intercepts.lookup(entity_selector) {
            Some(e) => (
                e.intercept,
                EntityResolution::Known {
                    entity_id: e.entity_id.clone(),
                    display_name: e.display_name.clone(),
                },
            ),
            None => {
                tracing::debug!(selector = entity_selector, "unknown entity; using mean intercept");
                (
                    self.intercepts.mean_intercept(),
                    EntityResolution::Fallback { selector: entity_selector.to_string() },
                )
            }
        };

        let value = terms.iter().map(|t| t.contribution).sum::<f64>() + intercept;
        Ok(Prediction { value, intercept, entity, terms })
    }
}

/// One-shot prediction without building a [`Predictor`].
pub fn predict(
    coefficients: &BTreeMap<Variable, f64>,
    intercepts: &EntityIntercepts,
    exposed: &[Variable],
    entity_selector: &str,
    inputs: &Inputs,
) -> Result<f64> {
    Predictor::from_coefficients(coefficients.clone(), intercepts.clone(), exposed.to_vec())?
        .predict(entity_selector, inputs)
}
