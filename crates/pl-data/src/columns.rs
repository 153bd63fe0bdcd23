use std::collections::BTreeMap;

use pl_core::{Error, Result, Variable};
use serde::{Deserialize, Serialize};

use crate::table::RawTable;

const ENTITY_ID: &str = "entity_id";
const ENTITY_ID_ALIASES: &[&str] = &["kode_kabupaten_kota", "entity"];
const ENTITY_NAME: &str = "entity_name";
const ENTITY_NAME_ALIASES: &[&str] = &["nama_kabupaten_kota", "name"];
const PERIOD: &str = "period";
const PERIOD_ALIASES: &[&str] = &["tahun", "year"];

/// Which header holds which field.
///
/// Every field left `None` is located by its canonical name first and then by
/// its known aliases. An explicit override is used verbatim, with no alias
/// fallback.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ColumnMap {
    /// Entity identifier column.
    pub entity_id: Option<String>,
    /// Entity display-name column. Optional in the input; names fall back to ids.
    pub entity_name: Option<String>,
    /// Period (year) column.
    pub period: Option<String>,
    /// Per-variable overrides.
    pub variables: BTreeMap<Variable, String>,
}

/// Column indices of a [`RawTable`] after resolving a [`ColumnMap`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedColumns {
    /// Entity identifier column.
    pub entity_id: usize,
    /// Entity display-name column, if present.
    pub entity_name: Option<usize>,
    /// Period column.
    pub period: usize,
    /// Measurement columns, indexed by [`Variable::index`].
    pub variables: [usize; 6],
}

impl ColumnMap {
    /// Locate every column in `table`.
    ///
    /// Fails with [`Error::Data`] naming all required columns that could not be found.
    pub fn resolve(&self, table: &RawTable) -> Result<ResolvedColumns> {
        let mut missing = Vec::new();

        let entity_id = find(table, self.entity_id.as_deref(), ENTITY_ID, ENTITY_ID_ALIASES);
        if entity_id.is_none() {
            missing.push(self.entity_id.clone().unwrap_or_else(|| ENTITY_ID.to_string()));
        }
        let period = find(table, self.period.as_deref(), PERIOD, PERIOD_ALIASES);
        if period.is_none() {
            missing.push(self.period.clone().unwrap_or_else(|| PERIOD.to_string()));
        }

        let mut variables = [0usize; 6];
        for v in Variable::ALL {
            let over = self.variables.get(&v).map(String::as_str);
            match find(table, over, v.name(), v.aliases()) {
                Some(idx) => variables[v.index()] = idx,
                None => missing.push(over.unwrap_or(v.name()).to_string()),
            }
        }

        match (entity_id, period, missing.is_empty()) {
            (Some(entity_id), Some(period), true) => Ok(ResolvedColumns {
                entity_id,
                entity_name: self.resolve_name_column(table),
                period,
                variables,
            }),
            _ => Err(Error::Data(format!("missing required column(s): {}", missing.join(", ")))),
        }
    }

    /// Locate only the entity id and name columns (used for the display-name join).
    pub fn resolve_names(&self, table: &RawTable) -> Result<(usize, Option<usize>)> {
        let entity_id = find(table, self.entity_id.as_deref(), ENTITY_ID, ENTITY_ID_ALIASES)
            .ok_or_else(|| {
                Error::Data(format!(
                    "missing required column(s): {}",
                    self.entity_id.as_deref().unwrap_or(ENTITY_ID)
                ))
            })?;
        Ok((entity_id, self.resolve_name_column(table)))
    }

    fn resolve_name_column(&self, table: &RawTable) -> Option<usize> {
        find(table, self.entity_name.as_deref(), ENTITY_NAME, ENTITY_NAME_ALIASES)
    }
}

fn find(
    table: &RawTable,
    over: Option<&str>,
    canonical: &str,
    aliases: &[&str],
) -> Option<usize> {
    if let Some(name) = over {
        return table.column_index(name);
    }
    std::iter::once(canonical)
        .chain(aliases.iter().copied())
        .find_map(|name| table.column_index(name))
}
