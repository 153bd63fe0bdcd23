//! # pl-data
//!
//! Ingest side of PovLine: reading a tabular file into a [`RawTable`],
//! normalizing it into a [`PanelDataset`] keyed by (entity, period), and the
//! descriptive statistics the dashboard shows next to the model.
//!
//! ```text
//! CSV ──► RawTable ──normalize──► PanelDataset ──► describe / ranges
//!              └──► EntityNameMap (entity_id → display name)
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Column name resolution (canonical names, aliases, overrides).
pub mod columns;
/// Descriptive statistics over a normalized panel.
pub mod describe;
/// Observation, PanelDataset, normalization and entity names.
pub mod panel;
/// Untyped tabular input and CSV reading.
pub mod table;

pub use columns::{ColumnMap, ResolvedColumns};
pub use describe::{ColumnSummary, DescribeTable, VariableRange, describe};
pub use panel::{EntityNameMap, Observation, PanelDataset, normalize};
pub use table::RawTable;
