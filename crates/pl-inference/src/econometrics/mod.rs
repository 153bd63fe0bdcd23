//! Econometrics.
//!
//! This module provides:
//! - **Panel linear regression** with entity fixed effects (within estimator),
//!   plus conventional, heteroskedasticity-robust and entity-clustered
//!   covariance estimators.

pub mod panel;

pub use panel::{WithinFit, cluster_robust_cov, heteroskedastic_cov, std_errors, within_fit};
