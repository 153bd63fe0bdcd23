//! One representative intercept per entity.
//!
//! The per-(entity, period) effects of a fitted model are averaged over each
//! entity's periods. This treats the fixed effects as stable over time, which
//! is a modelling simplification: if intercepts drift across periods the
//! average smooths that drift away and predictions degrade accordingly.

use std::collections::HashMap;

use pl_core::{Error, Result};
use pl_data::{EntityNameMap, PanelDataset};
use serde::Serialize;

use crate::model::FittedModel;

/// Representative intercept of one entity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityIntercept {
    /// Entity identifier.
    pub entity_id: String,
    /// Display name (the id itself when no name is known).
    pub display_name: String,
    /// Mean estimated effect across the entity's periods.
    pub intercept: f64,
    /// Number of periods averaged.
    pub n_periods: usize,
}

/// entity → intercept table, one entry per entity in first-appearance order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntityIntercepts {
    entries: Vec<EntityIntercept>,
    by_id: HashMap<String, usize>,
    by_name: HashMap<String, usize>,
}

impl EntityIntercepts {
    /// Build from entries. Later entries with an already-seen id are ignored;
    /// a display name shared by several ids resolves to the first of them.
    pub fn new(entries: Vec<EntityIntercept>) -> Self {
        let mut out = Self::default();
        for e in entries {
            if out.by_id.contains_key(&e.entity_id) {
                continue;
            }
            let idx = out.entries.len();
            out.by_id.insert(e.entity_id.clone(), idx);
            out.by_name.entry(e.display_name.clone()).or_insert(idx);
            out.entries.push(e);
        }
        out
    }

    /// Build from `(entity_id, intercept)` pairs; ids double as display names.
    pub fn from_values<I, K>(values: I) -> Self
    where
        I: IntoIterator<Item = (K, f64)>,
        K: Into<String>,
    {
        Self::new(
            values
                .into_iter()
                .map(|(id, intercept)| {
                    let id = id.into();
                    EntityIntercept { display_name: id.clone(), entity_id: id, intercept, n_periods: 1 }
                })
                .collect(),
        )
    }

    /// All entries, in first-appearance order.
    pub fn entries(&self) -> &[EntityIntercept] {
        &self.entries
    }

    /// Number of entities.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Display names, in entry order (the selectable entity list).
    pub fn display_names(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.display_name.as_str()).collect()
    }

    /// Entry for `entity_id`.
    pub fn get(&self, entity_id: &str) -> Option<&EntityIntercept> {
        self.by_id.get(entity_id).map(|&i| &self.entries[i])
    }

    /// Resolve a selector: entity id first, then display name.
    pub fn lookup(&self, selector: &str) -> Option<&EntityIntercept> {
        self.by_id
            .get(selector)
            .or_else(|| self.by_name.get(selector))
            .map(|&i| &self.entries[i])
    }

    /// Arithmetic mean of all intercepts; `NaN` for an empty table.
    pub fn mean_intercept(&self) -> f64 {
        if self.entries.is_empty() {
            return f64::NAN;
        }
        self.entries.iter().map(|e| e.intercept).sum::<f64>() / self.entries.len() as f64
    }
}

/// Collapse `model`'s per-(entity, period) effects to one intercept per entity
/// of `dataset` and join display names from `names`.
///
/// Fails with [`Error::Data`] if an entity of `dataset` has no effect in
/// `model`, i.e. the model was fitted on a different panel.
pub fn resolve_intercepts(
    model: &FittedModel,
    dataset: &PanelDataset,
    names: &EntityNameMap,
) -> Result<EntityIntercepts> {
    let mut sums: HashMap<&str, (f64, usize)> = HashMap::new();
    for e in model.estimated_effects() {
        let acc = sums.entry(e.entity_id.as_str()).or_insert((0.0, 0));
        acc.0 += e.effect;
        acc.1 += 1;
    }

    let mut entries = Vec::new();
    let mut unnamed = 0usize;
    for id in dataset.entities() {
        let &(sum, count) = sums.get(id).ok_or_else(|| {
            Error::Data(format!("entity '{id}' has no estimated effect in the fitted model"))
        })?;
        let display_name = match names.get(id) {
            Some(name) => name.to_string(),
            None => {
                unnamed += 1;
                id.to_string()
            }
        };
        entries.push(EntityIntercept {
            entity_id: id.to_string(),
            display_name,
            intercept: sum / count as f64,
            n_periods: count,
        });
    }

    if unnamed > 0 {
        tracing::warn!(count = unnamed, "entities without a display name; using their ids");
    }
    tracing::info!(entities = entries.len(), "entity intercepts resolved");
    Ok(EntityIntercepts::new(entries))
}
