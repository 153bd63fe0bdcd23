//! # pl-inference
//!
//! Statistical core of PovLine.
//!
//! This crate provides:
//! - the fixed-effects (within) panel estimator with robust standard errors
//! - per-entity intercept resolution from the estimated effects
//! - the prediction function consumed by the presentation layer
//!
//! ```text
//! PanelDataset ──fit──► FittedModel ──resolve_intercepts──► EntityIntercepts
//!                            └────────────────┬───────────────────┘
//!                                         Predictor ◄── entity selector + inputs
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Panel econometrics: within estimator and covariance estimators.
pub mod econometrics;
/// Per-entity intercepts.
pub mod intercepts;
/// Fixed-effects model over a panel dataset.
pub mod model;
/// Point prediction.
pub mod predict;
/// Display-only estimation summary.
pub mod summary;

pub use intercepts::{EntityIntercept, EntityIntercepts, resolve_intercepts};
pub use model::{EstimatedEffect, FittedModel, FixedEffectsModel, fit};
pub use predict::{EntityResolution, Inputs, Prediction, Predictor, Term, predict};
pub use summary::{CoefficientRow, ModelSummary};
