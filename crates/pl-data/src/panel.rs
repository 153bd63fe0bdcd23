use std::collections::{HashMap, HashSet};

use pl_core::{Error, Result, Variable};
use serde::Serialize;

use crate::columns::ColumnMap;
use crate::describe::VariableRange;
use crate::table::RawTable;

/// One panel row, keyed by (entity, period), with all six measurements present.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Observation {
    /// Opaque entity identifier.
    pub entity_id: String,
    /// Observation year.
    pub period: i32,
    /// Measurements, indexed by [`Variable::index`].
    pub values: [f64; 6],
}

impl Observation {
    /// Value of `variable` for this row.
    #[inline]
    pub fn get(&self, variable: Variable) -> f64 {
        self.values[variable.index()]
    }
}

/// Normalized panel: complete observations with unique (entity, period) keys,
/// in source order.
#[derive(Debug, Clone, PartialEq)]
pub struct PanelDataset {
    observations: Vec<Observation>,
    duplicates_dropped: usize,
    incomplete_dropped: usize,
}

impl PanelDataset {
    /// Build a dataset from already-typed observations.
    ///
    /// Duplicate (entity, period) keys keep the first occurrence; later ones are
    /// dropped and counted. Rows with a non-finite measurement are rejected.
    pub fn from_observations(observations: Vec<Observation>) -> Result<Self> {
        let mut seen: HashSet<(String, i32)> = HashSet::with_capacity(observations.len());
        let mut kept = Vec::with_capacity(observations.len());
        let mut duplicates = Vec::new();

        for obs in observations {
            if let Some(v) = Variable::ALL.into_iter().find(|v| !obs.get(*v).is_finite()) {
                return Err(Error::Data(format!(
                    "observation ({}, {}) has non-finite {}",
                    obs.entity_id, obs.period, v
                )));
            }
            if seen.insert((obs.entity_id.clone(), obs.period)) {
                kept.push(obs);
            } else {
                duplicates.push(format!("({}, {})", obs.entity_id, obs.period));
            }
        }

        if !duplicates.is_empty() {
            tracing::warn!(
                count = duplicates.len(),
                keys = %duplicates.join(" "),
                "duplicate (entity, period) rows dropped; first occurrence kept"
            );
        }
        if kept.is_empty() {
            return Err(Error::Data("no complete observations".into()));
        }

        Ok(Self { observations: kept, duplicates_dropped: duplicates.len(), incomplete_dropped: 0 })
    }

    /// Observations in source order.
    pub fn observations(&self) -> &[Observation] {
        &self.observations
    }

    /// Number of observations.
    pub fn len(&self) -> usize {
        self.observations.len()
    }

    /// Always `false` for a constructed dataset; provided for API symmetry.
    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    /// Rows dropped because their (entity, period) key had already been seen.
    pub fn duplicates_dropped(&self) -> usize {
        self.duplicates_dropped
    }

    /// Rows dropped during normalization because a measurement was missing.
    pub fn incomplete_dropped(&self) -> usize {
        self.incomplete_dropped
    }

    /// Distinct entity ids, in order of first appearance.
    pub fn entities(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.observations
            .iter()
            .map(|o| o.entity_id.as_str())
            .filter(|id| seen.insert(*id))
            .collect()
    }

    /// Distinct periods, ascending.
    pub fn periods(&self) -> Vec<i32> {
        let mut p: Vec<i32> = self.observations.iter().map(|o| o.period).collect();
        p.sort_unstable();
        p.dedup();
        p
    }

    /// All values of one variable, in row order.
    pub fn column(&self, variable: Variable) -> Vec<f64> {
        self.observations.iter().map(|o| o.get(variable)).collect()
    }

    /// Observed min/mean/max of `variable`, used to bound simulation inputs.
    pub fn range(&self, variable: Variable) -> VariableRange {
        VariableRange::of(&self.column(variable))
    }

    /// Render back to a table with canonical headers (no name column).
    pub fn to_raw_table(&self) -> RawTable {
        let mut headers = vec!["entity_id".to_string(), "period".to_string()];
        headers.extend(Variable::ALL.iter().map(|v| v.name().to_string()));
        let rows = self
            .observations
            .iter()
            .map(|o| {
                let mut row = vec![o.entity_id.clone(), o.period.to_string()];
                row.extend(o.values.iter().map(|v| v.to_string()));
                row
            })
            .collect();
        RawTable::from_parts(headers, rows)
    }
}

/// Normalize a raw table into a [`PanelDataset`].
///
/// In order: entity ids become strings, periods become integers, measurements
/// become finite floats (anything unparseable counts as missing), rows with a
/// missing measurement or an empty entity id are dropped and counted as
/// incomplete, and duplicate (entity, period) keys keep their first occurrence.
pub fn normalize(raw: &RawTable, columns: &ColumnMap) -> Result<PanelDataset> {
    let cols = columns.resolve(raw)?;

    let mut observations = Vec::with_capacity(raw.n_rows());
    let mut incomplete = 0usize;

    for (row_idx, row) in raw.rows().iter().enumerate() {
        let entity_id = coerce_entity_id(&row[cols.entity_id]);
        if entity_id.is_empty() {
            incomplete += 1;
            tracing::debug!(row = row_idx + 1, "dropping row without entity id");
            continue;
        }
        let period = coerce_period(&row[cols.period]).ok_or_else(|| {
            Error::Data(format!("row {}: period '{}' is not an integer", row_idx + 1, row[cols.period]))
        })?;

        let mut values = [0.0; 6];
        let mut complete = true;
        for v in Variable::ALL {
            match coerce_numeric(&row[cols.variables[v.index()]]) {
                Some(x) => values[v.index()] = x,
                None => {
                    complete = false;
                    break;
                }
            }
        }
        if !complete {
            incomplete += 1;
            tracing::debug!(row = row_idx + 1, entity = %entity_id, period, "dropping incomplete row");
            continue;
        }
        observations.push(Observation { entity_id, period, values });
    }

    if observations.is_empty() {
        return Err(Error::Data(format!(
            "no complete observations remain ({} of {} rows had missing values)",
            incomplete,
            raw.n_rows()
        )));
    }

    let mut dataset = PanelDataset::from_observations(observations)?;
    dataset.incomplete_dropped = incomplete;

    tracing::info!(
        rows = raw.n_rows(),
        observations = dataset.len(),
        incomplete = incomplete,
        duplicates = dataset.duplicates_dropped,
        "panel normalized"
    );
    Ok(dataset)
}

/// Parse a measurement cell. Empty, non-numeric and non-finite cells are missing.
fn coerce_numeric(cell: &str) -> Option<f64> {
    let s = cell.trim();
    if s.is_empty() {
        return None;
    }
    s.parse::<f64>().ok().filter(|x| x.is_finite())
}

fn coerce_period(cell: &str) -> Option<i32> {
    let s = cell.trim();
    if let Ok(p) = s.parse::<i32>() {
        return Some(p);
    }
    let x = s.parse::<f64>().ok()?;
    if x.is_finite() && x.fract() == 0.0 && x.abs() <= i32::MAX as f64 {
        Some(x as i32)
    } else {
        None
    }
}

/// Spreadsheet exports often carry integer codes as floats ("3201.0").
fn coerce_entity_id(cell: &str) -> String {
    let s = cell.trim();
    match s.strip_suffix(".0") {
        Some(int_part) if !int_part.is_empty() && int_part.bytes().all(|b| b.is_ascii_digit()) => {
            int_part.to_string()
        }
        _ => s.to_string(),
    }
}

/// entity_id → display name, from the de-duplicated (id, name) pairs of the raw table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntityNameMap {
    names: HashMap<String, String>,
}

impl EntityNameMap {
    /// Collect names from `raw`. The first non-empty name per id wins; a table
    /// without a name column yields an empty map.
    pub fn from_raw(raw: &RawTable, columns: &ColumnMap) -> Result<Self> {
        let (id_col, name_col) = columns.resolve_names(raw)?;
        let mut names = HashMap::new();
        if let Some(name_col) = name_col {
            for row in raw.rows() {
                let id = coerce_entity_id(&row[id_col]);
                let name = row[name_col].trim();
                if id.is_empty() || name.is_empty() {
                    continue;
                }
                names.entry(id).or_insert_with(|| name.to_string());
            }
        } else {
            tracing::warn!("no entity name column; entity ids will be shown as names");
        }
        Ok(Self { names })
    }

    /// Build from explicit pairs (first occurrence wins).
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut names = HashMap::new();
        for (k, v) in pairs {
            names.entry(k.into()).or_insert_with(|| v.into());
        }
        Self { names }
    }

    /// Display name for `entity_id`, if known.
    pub fn get(&self, entity_id: &str) -> Option<&str> {
        self.names.get(entity_id).map(String::as_str)
    }

    /// Number of named entities.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether no names are known.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADERS: &[&str] = &[
        "entity_id",
        "entity_name",
        "period",
        "poverty_line",
        "human_development_index",
        "labor_force_participation_rate",
        "minimum_wage",
        "unemployment_rate",
        "population_in_poverty",
        "notes",
    ];

    fn table(rows: &[&[&str]]) -> RawTable {
        RawTable::from_strs(HEADERS, rows).unwrap()
    }

    #[test]
    fn test_normalize_drops_incomplete_rows() {
        let raw = table(&[
            &["3201", "Bogor", "2020", "450000", "70.1", "64.0", "4200000", "9.1", "490000", "x"],
            &["3201", "Bogor", "2021", "470000", "n/a", "64.5", "4300000", "8.9", "480000", ""],
            &["3202", "Sukabumi", "2020", "380000", "66.9", "61.2", "3100000", "8.0", ""],
            &["3202", "Sukabumi", "2021", "395000", "67.2", "62.0", "3200000", "7.9", "205000", ""],
        ]);
        let ds = normalize(&raw, &ColumnMap::default()).unwrap();
        assert_eq!(ds.len(), 2);
        assert_eq!(ds.incomplete_dropped(), 2);
        for obs in ds.observations() {
            for v in Variable::ALL {
                assert!(obs.get(v).is_finite());
            }
        }
        assert_eq!(ds.observations()[0].entity_id, "3201");
        assert_eq!(ds.observations()[1].period, 2021);
    }

    #[test]
    fn test_rows_without_entity_id_are_dropped_as_incomplete() {
        let raw = table(&[
            &["", "", "", "", "", "", "", "", "", ""],
            &["3201", "Bogor", "2020", "450000", "70.1", "64.0", "4200000", "9.1", "490000", ""],
            &["  ", "Bogor", "2021", "470000", "70.5", "64.5", "4300000", "8.9", "480000", ""],
            &["3201", "Bogor", "2021", "470000", "70.5", "64.5", "4300000", "8.9", "480000", ""],
        ]);
        let ds = normalize(&raw, &ColumnMap::default()).unwrap();
        assert_eq!(ds.len(), 2);
        assert_eq!(ds.incomplete_dropped(), 2);
        assert_eq!(ds.duplicates_dropped(), 0);
        assert!(ds.observations().iter().all(|o| o.entity_id == "3201"));
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let raw = table(&[
            &["1", "A", "2019", "10", "60", "55", "1000", "5", "100", ""],
            &["1", "A", "2020", "11", "61", "56", "1100", "4", "90", ""],
            &["2", "B", "2020", "12", "62", "57", "NaN", "3", "80", ""],
            &["2", "B", "2021", "13", "63", "58", "1300", "2", "70", ""],
        ]);
        let once = normalize(&raw, &ColumnMap::default()).unwrap();
        let twice = normalize(&once.to_raw_table(), &ColumnMap::default()).unwrap();
        assert_eq!(once.observations(), twice.observations());
        assert_eq!(twice.incomplete_dropped(), 0);
    }

    #[test]
    fn test_duplicate_keys_first_wins() {
        let raw = table(&[
            &["1", "A", "2020", "10", "60", "55", "1000", "5", "100", ""],
            &["1", "A", "2020", "99", "60", "55", "1000", "5", "100", ""],
            &["1", "A", "2021", "11", "61", "56", "1100", "4", "90", ""],
        ]);
        let ds = normalize(&raw, &ColumnMap::default()).unwrap();
        assert_eq!(ds.len(), 2);
        assert_eq!(ds.duplicates_dropped(), 1);
        assert_eq!(ds.observations()[0].get(Variable::PovertyLine), 10.0);
    }

    #[test]
    fn test_float_keys_are_coerced() {
        let raw = table(&[&["3201.0", "A", "2020.0", "10", "60", "55", "1000", "5", "100", ""]]);
        let ds = normalize(&raw, &ColumnMap::default()).unwrap();
        assert_eq!(ds.observations()[0].entity_id, "3201");
        assert_eq!(ds.observations()[0].period, 2020);
    }

    #[test]
    fn test_bad_period_is_data_error() {
        let raw = table(&[&["1", "A", "twenty", "10", "60", "55", "1000", "5", "100", ""]]);
        assert!(matches!(normalize(&raw, &ColumnMap::default()), Err(Error::Data(_))));
    }

    #[test]
    fn test_all_rows_incomplete_is_data_error() {
        let raw = table(&[&["1", "A", "2020", "", "60", "55", "1000", "5", "100", ""]]);
        let err = normalize(&raw, &ColumnMap::default()).unwrap_err();
        assert!(matches!(err, Error::Data(_)));
    }

    #[test]
    fn test_missing_column_is_data_error() {
        let raw = RawTable::from_strs(&["entity_id", "period"], &[&["1", "2020"]]).unwrap();
        assert!(matches!(normalize(&raw, &ColumnMap::default()), Err(Error::Data(_))));
    }

    #[test]
    fn test_entities_and_periods() {
        let raw = table(&[
            &["2", "B", "2021", "13", "63", "58", "1300", "2", "70", ""],
            &["1", "A", "2019", "10", "60", "55", "1000", "5", "100", ""],
            &["2", "B", "2019", "12", "62", "57", "1200", "3", "80", ""],
        ]);
        let ds = normalize(&raw, &ColumnMap::default()).unwrap();
        assert_eq!(ds.entities(), vec!["2", "1"]);
        assert_eq!(ds.periods(), vec![2019, 2021]);
    }

    #[test]
    fn test_entity_names_first_wins_and_include_dropped_rows() {
        let raw = table(&[
            &["1", "Kab. A", "2020", "", "", "", "", "", "", ""],
            &["1", "Kabupaten A", "2021", "10", "60", "55", "1000", "5", "100", ""],
            &["2", "", "2021", "10", "60", "55", "1000", "5", "100", ""],
        ]);
        let names = EntityNameMap::from_raw(&raw, &ColumnMap::default()).unwrap();
        assert_eq!(names.get("1"), Some("Kab. A"));
        assert_eq!(names.get("2"), None);
        assert_eq!(names.len(), 1);
    }

    #[test]
    fn test_from_observations_rejects_non_finite() {
        let obs = Observation {
            entity_id: "1".into(),
            period: 2020,
            values: [1.0, f64::NAN, 1.0, 1.0, 1.0, 1.0],
        };
        assert!(PanelDataset::from_observations(vec![obs]).is_err());
        assert!(PanelDataset::from_observations(vec![]).is_err());
    }
}
