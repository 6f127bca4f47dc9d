// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*!
Projection construction.

A [`Projection`] owns the connectivity graph between one pre- and one
post-population for a single synapse model. Building drives the connection
rule, creates low-level connections through the engine (batched where the
rule has an engine-native descriptor, one at a time otherwise), and records
which source cells were touched so the handle set can be resolved lazily
later.

Only connections whose post-synaptic cell is owned by the current process
are instantiated; random rules still draw against the full populations so
that identical seeds give consistent global statistics across processes.
*/

mod attributes;

use std::sync::Arc;

use ahash::{AHashMap, AHashSet};
use rand::rngs::StdRng;
use tracing::{info, warn};

use crate::engine::{ConnectionHandle, SimulationEngine};
use crate::parameters::{
    AttributeValue, ParameterSpec, ParameterValues, SynapseAttribute, SynapseParamValue,
    SynapseParameters, SynapseType,
};
use crate::population::{Population, ReceptorType};
use crate::rules::ConnectionRule;
use crate::types::{CellId, ProjectionError, ProjectionResult};

const LOG_TARGET: &str = "synaptic-projections";

/// The connectivity graph between two populations under one synapse model
/// and receptor type.
#[derive(Debug)]
pub struct Projection {
    pre: Arc<Population>,
    post: Arc<Population>,
    synapse_type: SynapseType,
    receptor_type: ReceptorType,
    /// Source ids touched during construction; deduplicated on first handle
    /// resolution.
    sources: Vec<CellId>,
    /// Cached engine handles, valid while `cache_epoch == write_epoch`.
    handle_cache: Vec<ConnectionHandle>,
    cache_epoch: u64,
    write_epoch: u64,
    /// Values recorded for common synapse properties; once set, a differing
    /// value for the same name is a heterogeneity error.
    common_properties: AHashMap<SynapseAttribute, AttributeValue>,
    /// Names classified as common (model-level), discovered lazily from the
    /// first created connection.
    common_names: Option<AHashSet<SynapseAttribute>>,
}

impl Projection {
    /// Build the projection by driving `rule` to completion.
    ///
    /// Validation failures surface before any engine contact. Engine
    /// rejections of a specific pair abort the remaining batch and leave the
    /// already-created connections visible.
    pub fn build(
        engine: &mut dyn SimulationEngine,
        pre: Arc<Population>,
        post: Arc<Population>,
        rule: ConnectionRule,
        synapse_type: SynapseType,
        receptor_type: ReceptorType,
        rng: &mut StdRng,
    ) -> ProjectionResult<Self> {
        rule.validate(&pre, &post)?;

        let mut projection = Self {
            pre,
            post,
            synapse_type,
            receptor_type,
            sources: Vec::new(),
            handle_cache: Vec::new(),
            cache_epoch: 0,
            write_epoch: 0,
            common_properties: AHashMap::new(),
            common_names: None,
        };

        let bulk_capable =
            rule.descriptor().is_some() && projection.post.cell_type().standard_receptors;
        if bulk_capable {
            projection.build_bulk(engine, &rule, rng)?;
        } else {
            projection.build_pairwise(engine, &rule, rng)?;
        }
        projection.write_epoch += 1;

        let created = projection.len(engine)?;
        info!(
            target: LOG_TARGET,
            "built projection {} -> {} ({}), {} local connections",
            projection.pre.label(),
            projection.post.label(),
            projection.synapse_type.model(),
            created
        );
        Ok(projection)
    }

    /// Engine-realized path: translate the rule once and hand the whole
    /// population pair to the bulk-connect primitive.
    fn build_bulk(
        &mut self,
        engine: &mut dyn SimulationEngine,
        rule: &ConnectionRule,
        rng: &mut StdRng,
    ) -> ProjectionResult<()> {
        let descriptor = rule
            .descriptor()
            .expect("bulk path requires an engine-realizable rule");
        let shape = (self.pre.size() as usize, self.post.size() as usize);
        let weight_factor = self.creation_weight_factor();

        // Stable evaluation order so eager draws consume the stream
        // identically on every process.
        let mut specs: Vec<(SynapseAttribute, &ParameterSpec)> = self
            .synapse_type
            .parameters()
            .iter()
            .map(|(&a, s)| (a, s))
            .collect();
        specs.sort_by_key(|(attribute, _)| attribute.engine_key());

        let mut values = AHashMap::new();
        for (attribute, spec) in specs {
            // A weight transform cannot be pushed through an engine-side
            // draw, so such specs are evaluated eagerly instead.
            let transform = if attribute == SynapseAttribute::Weight {
                weight_factor
            } else {
                1.0
            };
            let value = match spec.deferrable(engine) {
                Some(dist) if transform == 1.0 => {
                    warn!(
                        target: LOG_TARGET,
                        "random values for '{}' will be drawn inside the engine with the engine's own stream",
                        attribute.engine_key()
                    );
                    SynapseParamValue::Distribution(dist)
                }
                _ => match spec.evaluate(shape, rng)? {
                    ParameterValues::Scalar(v) => SynapseParamValue::Scalar(v * transform),
                    ParameterValues::Matrix(m) => {
                        SynapseParamValue::Matrix(m.mapv(|v| v * transform))
                    }
                },
            };
            values.insert(attribute, value);
        }

        let parameters = SynapseParameters {
            model: self.synapse_type.model().to_string(),
            values,
        };
        engine.bulk_connect(
            &self.pre.all_ids(),
            &self.post.all_ids(),
            &descriptor,
            &parameters,
        )?;
        self.sources = self.pre.all_ids();
        Ok(())
    }

    /// Host-realized path: emit the full pair stream, instantiate the pairs
    /// whose post cell is local, one engine call per pair.
    fn build_pairwise(
        &mut self,
        engine: &mut dyn SimulationEngine,
        rule: &ConnectionRule,
        rng: &mut StdRng,
    ) -> ProjectionResult<()> {
        let pairs = rule.pairs(&self.pre, &self.post, rng)?;
        let shape = (self.pre.size() as usize, self.post.size() as usize);
        let weight_factor = self.creation_weight_factor();
        let model = self.synapse_type.model().to_string();

        // Evaluate every parameter spec eagerly, over the full shape, before
        // filtering to local posts; this keeps RNG consumption identical on
        // every process.
        let mut specs: Vec<(SynapseAttribute, ParameterSpec)> = self
            .synapse_type
            .parameters()
            .iter()
            .map(|(&a, s)| (a, s.clone()))
            .collect();
        specs.sort_by_key(|(attribute, _)| attribute.engine_key());
        let mut evaluated: Vec<(SynapseAttribute, ParameterValues)> = Vec::new();
        for (attribute, spec) in specs {
            evaluated.push((attribute, spec.evaluate(shape, rng)?));
        }
        let lookup = |wanted: SynapseAttribute, i: u32, j: u32| -> Option<f64> {
            evaluated
                .iter()
                .find(|(a, _)| *a == wanted)
                .map(|(_, v)| v.at(i, j))
        };

        let receptor_port = match self.receptor_type {
            ReceptorType::Excitatory => 0.0,
            ReceptorType::Inhibitory => 1.0,
        };
        let standard_receptors = self.post.cell_type().standard_receptors;

        for pair in pairs {
            if !self.post.is_local(pair.post_index) {
                continue;
            }
            let (i, j) = (pair.pre_index, pair.post_index);
            let weight = pair
                .weight
                .or_else(|| lookup(SynapseAttribute::Weight, i, j))
                .unwrap_or(0.0)
                * weight_factor;
            let delay = pair
                .delay
                .or_else(|| lookup(SynapseAttribute::Delay, i, j))
                .unwrap_or(0.0);

            let mut attributes = vec![
                (SynapseAttribute::Weight, weight),
                (SynapseAttribute::Delay, delay),
            ];
            if !standard_receptors {
                attributes.push((SynapseAttribute::Receptor, receptor_port));
            }

            let handle = engine
                .connect_one(self.pre.id(i), self.post.id(j), &attributes, &model)
                .map_err(|source| ProjectionError::Connection {
                    pre_index: i,
                    post_index: j,
                    source,
                })?;
            self.sources.push(self.pre.id(i));

            if self.common_names.is_none() {
                self.classify_common_names(engine, handle)?;
            }
            // Attributes beyond what connect_one carries are routed through
            // the common/local classifier.
            for &(attribute, ref value) in &evaluated {
                if matches!(
                    attribute,
                    SynapseAttribute::Weight | SynapseAttribute::Delay
                ) {
                    continue;
                }
                self.apply_classified(engine, &[handle], attribute, value.at(i, j))?;
            }
        }
        Ok(())
    }

    /// Creation-time weight convention: inhibitory conductance-based
    /// connections are stored negated, and a declared receptor scale factor
    /// multiplies on top. Applied exactly once, never at read time.
    fn creation_weight_factor(&self) -> f64 {
        let mut factor = 1.0;
        if self.receptor_type == ReceptorType::Inhibitory && self.post.cell_type().conductance_based
        {
            factor = -1.0;
        }
        if let Some(scale) = self.post.cell_type().receptor_scale {
            factor *= scale;
        }
        factor
    }

    /// Sign applied to weight values on attribute writes (the engine stores
    /// inhibitory conductances negated).
    pub(crate) fn write_weight_sign(&self) -> f64 {
        if self.receptor_type == ReceptorType::Inhibitory && self.post.cell_type().conductance_based
        {
            -1.0
        } else {
            1.0
        }
    }

    /// A rule that reuses this projection's exact pair set, for attaching a
    /// different synapse model to the same topology.
    pub fn cloning_rule(
        &mut self,
        engine: &dyn SimulationEngine,
    ) -> ProjectionResult<ConnectionRule> {
        let handles = self.connections(engine)?.to_vec();
        let sources = engine.get_status(&handles, SynapseAttribute::Source)?;
        let targets = engine.get_status(&handles, SynapseAttribute::Target)?;
        let mut pairs = Vec::with_capacity(handles.len());
        for (src, tgt) in sources.into_iter().zip(targets) {
            let i = self
                .pre
                .index_of(src as CellId)
                .ok_or_else(|| ProjectionError::Configuration(format!(
                    "engine returned source id {} outside population '{}'",
                    src,
                    self.pre.label()
                )))?;
            let j = self
                .post
                .index_of(tgt as CellId)
                .ok_or_else(|| ProjectionError::Configuration(format!(
                    "engine returned target id {} outside population '{}'",
                    tgt,
                    self.post.label()
                )))?;
            pairs.push((i, j));
        }
        Ok(ConnectionRule::CloneProjection { pairs })
    }

    pub fn pre(&self) -> &Arc<Population> {
        &self.pre
    }

    pub fn post(&self) -> &Arc<Population> {
        &self.post
    }

    pub fn synapse_type(&self) -> &SynapseType {
        &self.synapse_type
    }

    pub fn receptor_type(&self) -> ReceptorType {
        self.receptor_type
    }

    /// Number of connections of this projection's model on this process.
    pub fn len(&self, engine: &dyn SimulationEngine) -> ProjectionResult<usize> {
        Ok(engine.num_connections(self.synapse_type.model())?)
    }

    pub fn is_empty(&self, engine: &dyn SimulationEngine) -> ProjectionResult<bool> {
        Ok(self.len(engine)? == 0)
    }
}

/// Convenience wrapper for plain scalar specs.
pub fn scalar(value: f64) -> ParameterSpec {
    ParameterSpec::Scalar(value)
}
