// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*!
In-memory reference engine for integration tests.

Implements [`SimulationEngine`] faithfully enough to exercise the
projection core: bulk rule realization with the engine's own seeded random
stream, per-connection attribute storage, and model-level defaults with
common properties that never appear on individual connections.
*/

use ahash::{AHashMap, AHashSet};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::Distribution;

use synaptic_projections::{
    AttributeValue, CellId, ConnectionHandle, EngineError, RandomDistribution, RuleDescriptor,
    SimulationEngine, SynapseAttribute, SynapseParamValue, SynapseParameters,
};

struct TestConnection {
    source: CellId,
    target: CellId,
    model: String,
    attributes: AHashMap<SynapseAttribute, f64>,
}

struct ModelInfo {
    /// Model-level defaults; the full attribute surface of the model.
    defaults: AHashMap<SynapseAttribute, f64>,
    /// Attributes that physically live on each connection. Everything in
    /// `defaults` but not here is a common synapse property.
    local: AHashSet<SynapseAttribute>,
}

pub struct TestEngine {
    rng: StdRng,
    connections: Vec<TestConnection>,
    models: AHashMap<String, ModelInfo>,
    poisoned: AHashSet<CellId>,
}

impl TestEngine {
    pub fn new(seed: u64) -> Self {
        let mut models = AHashMap::new();
        models.insert(
            "static_synapse".to_string(),
            ModelInfo {
                defaults: AHashMap::from_iter([
                    (SynapseAttribute::Weight, 1.0),
                    (SynapseAttribute::Delay, 1.0),
                ]),
                local: AHashSet::from_iter([
                    SynapseAttribute::Weight,
                    SynapseAttribute::Delay,
                    SynapseAttribute::Receptor,
                ]),
            },
        );
        // Short-term plasticity model with one common property: tau_psc
        // exists only at the model level, never on a connection.
        models.insert(
            "tsodyks_synapse".to_string(),
            ModelInfo {
                defaults: AHashMap::from_iter([
                    (SynapseAttribute::Weight, 1.0),
                    (SynapseAttribute::Delay, 1.0),
                    (SynapseAttribute::U, 0.5),
                    (SynapseAttribute::TauRec, 800.0),
                    (SynapseAttribute::TauFac, 0.0),
                    (SynapseAttribute::TauPsc, 3.0),
                ]),
                local: AHashSet::from_iter([
                    SynapseAttribute::Weight,
                    SynapseAttribute::Delay,
                    SynapseAttribute::U,
                    SynapseAttribute::TauRec,
                    SynapseAttribute::TauFac,
                    SynapseAttribute::Receptor,
                ]),
            },
        );
        Self {
            rng: StdRng::seed_from_u64(seed),
            connections: Vec::new(),
            models,
            poisoned: AHashSet::new(),
        }
    }

    /// Make a cell id invalid so creation against it fails.
    pub fn poison_cell(&mut self, id: CellId) {
        self.poisoned.insert(id);
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// (source, target) id pairs of every connection under `model`, in
    /// creation order.
    pub fn pairs(&self, model: &str) -> Vec<(CellId, CellId)> {
        self.connections
            .iter()
            .filter(|c| c.model == model)
            .map(|c| (c.source, c.target))
            .collect()
    }

    pub fn default_of(&self, model: &str, attribute: SynapseAttribute) -> Option<f64> {
        self.models
            .get(model)
            .and_then(|m| m.defaults.get(&attribute).copied())
    }

    fn model(&self, name: &str) -> Result<&ModelInfo, EngineError> {
        self.models
            .get(name)
            .ok_or_else(|| EngineError::UnknownModel(name.to_string()))
    }

    fn check_cell(&self, id: CellId) -> Result<(), EngineError> {
        if self.poisoned.contains(&id) {
            Err(EngineError::InvalidCell(id))
        } else {
            Ok(())
        }
    }

    fn draw(&mut self, dist: RandomDistribution) -> f64 {
        match dist {
            RandomDistribution::Normal { mu, sigma } => rand_distr::Normal::new(mu, sigma)
                .expect("test distribution parameters are valid")
                .sample(&mut self.rng),
            RandomDistribution::Uniform { low, high } => {
                self.rng.sample(rand_distr::Uniform::new(low, high))
            }
            _ => panic!("test engine only realizes normal and uniform draws"),
        }
    }

    fn create(
        &mut self,
        source: CellId,
        target: CellId,
        pre_index: usize,
        post_index: usize,
        synapse: &SynapseParameters,
    ) -> Result<(), EngineError> {
        self.check_cell(source)?;
        self.check_cell(target)?;
        let model = self.model(&synapse.model)?;
        let mut attributes: AHashMap<SynapseAttribute, f64> = model
            .local
            .iter()
            .filter_map(|&a| model.defaults.get(&a).map(|&v| (a, v)))
            .collect();
        let local = model.local.clone();
        let param_values: Vec<(SynapseAttribute, SynapseParamValue)> = synapse
            .values
            .iter()
            .map(|(&a, v)| (a, v.clone()))
            .collect();
        for (attribute, value) in param_values {
            let concrete = match value {
                SynapseParamValue::Scalar(v) => v,
                SynapseParamValue::Matrix(m) => m[[pre_index, post_index]],
                SynapseParamValue::Distribution(dist) => self.draw(dist),
            };
            if local.contains(&attribute) {
                attributes.insert(attribute, concrete);
            } else {
                // Common property delivered through bulk parameters lands
                // in the model defaults.
                self.models
                    .get_mut(&synapse.model)
                    .expect("model existence checked above")
                    .defaults
                    .insert(attribute, concrete);
            }
        }
        self.connections.push(TestConnection {
            source,
            target,
            model: synapse.model.clone(),
            attributes,
        });
        Ok(())
    }
}

impl SimulationEngine for TestEngine {
    fn bulk_connect(
        &mut self,
        pre_ids: &[CellId],
        post_ids: &[CellId],
        rule: &RuleDescriptor,
        synapse: &SynapseParameters,
    ) -> Result<(), EngineError> {
        match rule.rule {
            "one_to_one" => {
                if pre_ids.len() != post_ids.len() {
                    return Err(EngineError::Other(
                        "one_to_one requires equal id list lengths".to_string(),
                    ));
                }
                for k in 0..pre_ids.len() {
                    self.create(pre_ids[k], post_ids[k], k, k, synapse)?;
                }
                Ok(())
            }
            "all_to_all" => {
                for (j, &post) in post_ids.iter().enumerate() {
                    for (i, &pre) in pre_ids.iter().enumerate() {
                        if !rule.allow_autapses && pre == post {
                            continue;
                        }
                        self.create(pre, post, i, j, synapse)?;
                    }
                }
                Ok(())
            }
            "pairwise_bernoulli" => {
                let p = rule
                    .probability
                    .ok_or_else(|| EngineError::Other("missing probability".to_string()))?;
                for (j, &post) in post_ids.iter().enumerate() {
                    for (i, &pre) in pre_ids.iter().enumerate() {
                        if !rule.allow_autapses && pre == post {
                            continue;
                        }
                        if self.rng.gen::<f64>() < p {
                            self.create(pre, post, i, j, synapse)?;
                        }
                    }
                }
                Ok(())
            }
            other => Err(EngineError::UnsupportedRule(other.to_string())),
        }
    }

    fn connect_one(
        &mut self,
        pre_id: CellId,
        post_id: CellId,
        attributes: &[(SynapseAttribute, f64)],
        model: &str,
    ) -> Result<ConnectionHandle, EngineError> {
        self.check_cell(pre_id)?;
        self.check_cell(post_id)?;
        let info = self.model(model)?;
        let mut stored: AHashMap<SynapseAttribute, f64> = info
            .local
            .iter()
            .filter_map(|&a| info.defaults.get(&a).map(|&v| (a, v)))
            .collect();
        for &(attribute, value) in attributes {
            if !info.local.contains(&attribute) {
                return Err(EngineError::Other(format!(
                    "attribute '{}' is not a per-connection property of '{}'",
                    attribute.engine_key(),
                    model
                )));
            }
            stored.insert(attribute, value);
        }
        self.connections.push(TestConnection {
            source: pre_id,
            target: post_id,
            model: model.to_string(),
            attributes: stored,
        });
        Ok(ConnectionHandle(self.connections.len() as u64 - 1))
    }

    fn get_connections(
        &self,
        source_ids: &[CellId],
        target_ids: Option<&[CellId]>,
        model: &str,
    ) -> Vec<ConnectionHandle> {
        self.connections
            .iter()
            .enumerate()
            .filter(|(_, c)| {
                c.model == model
                    && source_ids.contains(&c.source)
                    && target_ids.map_or(true, |t| t.contains(&c.target))
            })
            .map(|(idx, _)| ConnectionHandle(idx as u64))
            .collect()
    }

    fn get_status(
        &self,
        handles: &[ConnectionHandle],
        attribute: SynapseAttribute,
    ) -> Result<Vec<f64>, EngineError> {
        handles
            .iter()
            .map(|&h| {
                let conn = self
                    .connections
                    .get(h.0 as usize)
                    .ok_or(EngineError::UnknownHandle(h))?;
                match attribute {
                    SynapseAttribute::Source => Ok(conn.source as f64),
                    SynapseAttribute::Target => Ok(conn.target as f64),
                    _ => conn.attributes.get(&attribute).copied().ok_or_else(|| {
                        EngineError::Other(format!(
                            "connection has no attribute '{}'",
                            attribute.engine_key()
                        ))
                    }),
                }
            })
            .collect()
    }

    fn set_status(
        &mut self,
        handles: &[ConnectionHandle],
        attribute: SynapseAttribute,
        values: &[f64],
    ) -> Result<(), EngineError> {
        if handles.len() != values.len() {
            return Err(EngineError::Other(
                "set_status requires one value per handle".to_string(),
            ));
        }
        for (&h, &v) in handles.iter().zip(values) {
            let conn = self
                .connections
                .get_mut(h.0 as usize)
                .ok_or(EngineError::UnknownHandle(h))?;
            conn.attributes.insert(attribute, v);
        }
        Ok(())
    }

    fn connection_status(
        &self,
        handle: ConnectionHandle,
    ) -> Result<AHashMap<SynapseAttribute, f64>, EngineError> {
        let conn = self
            .connections
            .get(handle.0 as usize)
            .ok_or(EngineError::UnknownHandle(handle))?;
        let mut status = conn.attributes.clone();
        status.insert(SynapseAttribute::Source, conn.source as f64);
        status.insert(SynapseAttribute::Target, conn.target as f64);
        Ok(status)
    }

    fn get_defaults(&self, model: &str) -> Result<AHashMap<SynapseAttribute, f64>, EngineError> {
        Ok(self.model(model)?.defaults.clone())
    }

    fn set_defaults(
        &mut self,
        model: &str,
        attribute: SynapseAttribute,
        value: &AttributeValue,
    ) -> Result<(), EngineError> {
        let info = self
            .models
            .get_mut(model)
            .ok_or_else(|| EngineError::UnknownModel(model.to_string()))?;
        match value {
            AttributeValue::Scalar(v) => {
                info.defaults.insert(attribute, *v);
            }
            AttributeValue::Array(values) => {
                // The reference engine keeps scalar defaults; a homogeneous
                // array collapses to its first element.
                if let Some(&first) = values.first() {
                    info.defaults.insert(attribute, first);
                }
            }
        }
        Ok(())
    }

    fn num_connections(&self, model: &str) -> Result<usize, EngineError> {
        self.model(model)?;
        Ok(self.connections.iter().filter(|c| c.model == model).count())
    }

    fn supports_distribution(&self, name: &str) -> bool {
        matches!(name, "normal" | "uniform")
    }
}
