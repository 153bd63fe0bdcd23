//! # pl-core
//!
//! Shared error type and domain vocabulary for PovLine: the closed set of
//! panel [`Variable`]s and the [`CovariateSpec`] that selects which of them
//! enter the fixed-effects regression.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::{CovarianceKind, CovariateSpec, Variable};

/// PovLine version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
