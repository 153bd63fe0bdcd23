//! Loaded dashboard session: dataset, fitted model, intercepts and predictor.
//!
//! Built once from a [`DashboardConfig`] and shared as `Arc<Dashboard>`.
//! Nothing in it is mutated after load; `reload` builds a replacement.

use std::collections::BTreeMap;
use std::sync::Arc;

use pl_core::{Result, Variable};
use pl_data::{EntityNameMap, PanelDataset, RawTable, VariableRange, normalize};
use pl_inference::{
    EntityIntercepts, FittedModel, FixedEffectsModel, Inputs, Prediction, Predictor,
    resolve_intercepts,
};

use crate::config::DashboardConfig;

#[derive(Debug)]
pub struct Dashboard {
    config: DashboardConfig,
    dataset: PanelDataset,
    model: FittedModel,
    predictor: Predictor,
    ranges: BTreeMap<Variable, VariableRange>,
}

impl Dashboard {
    /// Read the panel, fit the model and resolve intercepts.
    pub fn load(config: DashboardConfig) -> Result<Arc<Self>> {
        config.validate()?;
        let raw = RawTable::from_csv_path(&config.data.path)?;
        Self::from_raw(config, &raw).map(Arc::new)
    }

    /// Same pipeline over an already-read table.
    pub fn from_raw(config: DashboardConfig, raw: &RawTable) -> Result<Self> {
        let columns = &config.data.columns;
        let names = EntityNameMap::from_raw(raw, columns)?;
        let dataset = normalize(raw, columns)?;

        let model = FixedEffectsModel::new(config.model.covariance)
            .fit(&dataset, &config.model.spec())?;
        let intercepts = resolve_intercepts(&model, &dataset, &names)?;
        let predictor = Predictor::new(&model, intercepts, config.simulation.exposed.clone())?;
        let ranges = Variable::ALL.into_iter().map(|v| (v, dataset.range(v))).collect();

        tracing::info!(
            path = %config.data.path.display(),
            observations = dataset.len(),
            entities = predictor.intercepts().len(),
            "dashboard loaded"
        );
        Ok(Self { config, dataset, model, predictor, ranges })
    }

    /// Re-run the whole pipeline from the same config.
    pub fn reload(&self) -> Result<Arc<Self>> {
        Self::load(self.config.clone())
    }

    pub fn config(&self) -> &DashboardConfig {
        &self.config
    }

    pub fn dataset(&self) -> &PanelDataset {
        &self.dataset
    }

    pub fn model(&self) -> &FittedModel {
        &self.model
    }

    pub fn predictor(&self) -> &Predictor {
        &self.predictor
    }

    pub fn intercepts(&self) -> &EntityIntercepts {
        self.predictor.intercepts()
    }

    pub fn range(&self, variable: Variable) -> VariableRange {
        self.ranges[&variable]
    }

    /// Observed mean of every exposed covariate.
    pub fn default_inputs(&self) -> Inputs {
        self.predictor.exposed().iter().map(|&v| (v, self.range(v).mean)).collect()
    }

    /// Entity shown first in the selector.
    pub fn default_entity(&self) -> &str {
        self.intercepts().entries().first().map(|e| e.display_name.as_str()).unwrap_or("")
    }

    /// Predict, warning when an input lies outside its observed range.
    pub fn predict(&self, entity_selector: &str, inputs: &Inputs) -> Result<Prediction> {
        for (&v, &x) in inputs {
            if !self.range(v).contains(x) {
                let r = self.range(v);
                tracing::warn!(
                    variable = v.name(),
                    value = x,
                    min = r.min,
                    max = r.max,
                    "input outside observed range; extrapolating"
                );
            }
        }
        self.predictor.explain(entity_selector, inputs)
    }
}
