// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*!
Attribute store and common/local classifier.

Connection handles are resolved lazily, at most once per write epoch.
Attribute names are classified on first contact by comparing the keys
physically present on one connection against the synapse model's defaults:
names that exist only at the model level are common to every connection of
the model and must stay homogeneous.
*/

use ahash::AHashSet;
use ndarray::Array2;
use rand::rngs::StdRng;
use tracing::debug;

use crate::engine::{ConnectionHandle, SimulationEngine};
use crate::parameters::{AttributeValue, ParameterSpec, ParameterValues, SynapseAttribute};
use crate::projection::Projection;
use crate::types::{CellId, ProjectionError, ProjectionResult};

impl Projection {
    /// Engine handles of every local connection belonging to this
    /// projection.
    ///
    /// Resolved lazily: the cache is recomputed only when the write epoch
    /// has advanced past the epoch it was resolved at. Source ids are
    /// deduplicated before the engine query.
    pub fn connections(
        &mut self,
        engine: &dyn SimulationEngine,
    ) -> ProjectionResult<&[ConnectionHandle]> {
        if self.cache_epoch != self.write_epoch {
            self.sources.sort_unstable();
            self.sources.dedup();
            self.handle_cache =
                engine.get_connections(&self.sources, None, self.synapse_type.model());
            self.cache_epoch = self.write_epoch;
            debug!(
                target: super::LOG_TARGET,
                "resolved {} connection handles for {} -> {} (epoch {})",
                self.handle_cache.len(),
                self.pre.label(),
                self.post.label(),
                self.cache_epoch
            );
        }
        Ok(&self.handle_cache)
    }

    /// Per-connection values for the named attributes, one vector per name,
    /// in handle order.
    ///
    /// `Source` and `Target` come back as population indices rather than
    /// global ids. Weight values come back in the engine's stored
    /// convention: the creation-time sign transform is applied exactly once
    /// at write time and is not undone here.
    pub fn get(
        &mut self,
        engine: &dyn SimulationEngine,
        attributes: &[SynapseAttribute],
    ) -> ProjectionResult<Vec<Vec<f64>>> {
        let handles = self.connections(engine)?.to_vec();
        let mut columns = Vec::with_capacity(attributes.len());
        for &attribute in attributes {
            let mut values = engine.get_status(&handles, attribute)?;
            match attribute {
                SynapseAttribute::Source => {
                    for v in &mut values {
                        *v = self.pre_index_of(*v as CellId)? as f64;
                    }
                }
                SynapseAttribute::Target => {
                    for v in &mut values {
                        *v = self.post_index_of(*v as CellId)? as f64;
                    }
                }
                _ => {}
            }
            columns.push(values);
        }
        Ok(columns)
    }

    /// Dense (pre x post) view of one attribute. `NaN` marks pairs with no
    /// connection; when several physical connections exist between the same
    /// pair their values are summed, deliberately, not overwritten.
    pub fn get_as_matrix(
        &mut self,
        engine: &dyn SimulationEngine,
        attribute: SynapseAttribute,
    ) -> ProjectionResult<Array2<f64>> {
        let handles = self.connections(engine)?.to_vec();
        let sources = engine.get_status(&handles, SynapseAttribute::Source)?;
        let targets = engine.get_status(&handles, SynapseAttribute::Target)?;
        let values = engine.get_status(&handles, attribute)?;

        let mut matrix = Array2::from_elem(
            (self.pre.size() as usize, self.post.size() as usize),
            f64::NAN,
        );
        for ((src, tgt), value) in sources.into_iter().zip(targets).zip(values) {
            let i = self.pre_index_of(src as CellId)? as usize;
            let j = self.post_index_of(tgt as CellId)? as usize;
            let cell = &mut matrix[[i, j]];
            if cell.is_nan() {
                *cell = value;
            } else {
                *cell += value;
            }
        }
        Ok(matrix)
    }

    /// Evaluate `spec` against the full (pre, post) shape and write the
    /// resulting values to every matching connection of each locally owned
    /// post cell.
    ///
    /// Common names go through the homogeneity check and the model defaults;
    /// local names are written per connection, indexed by source. A
    /// heterogeneity failure leaves earlier writes in place.
    pub fn set(
        &mut self,
        engine: &mut dyn SimulationEngine,
        attribute: SynapseAttribute,
        spec: &ParameterSpec,
        rng: &mut StdRng,
    ) -> ProjectionResult<()> {
        let handles = self.connections(engine)?.to_vec();
        let Some(&sample) = handles.first() else {
            return Ok(());
        };
        if self.common_names.is_none() {
            self.classify_common_names(engine, sample)?;
        }

        let shape = (self.pre.size() as usize, self.post.size() as usize);
        let values = spec.evaluate(shape, rng)?;
        let sign = if attribute == SynapseAttribute::Weight {
            self.write_weight_sign()
        } else {
            1.0
        };
        let is_common = self
            .common_names
            .as_ref()
            .is_some_and(|names| names.contains(&attribute));

        let model = self.synapse_type.model().to_string();
        let unique_sources = {
            let mut s = self.sources.clone();
            s.sort_unstable();
            s.dedup();
            s
        };

        let local_posts: Vec<u32> = self.post.local_indices().collect();
        for j in local_posts {
            let cell_handles =
                engine.get_connections(&unique_sources, Some(&[self.post.id(j)]), &model);
            if cell_handles.is_empty() {
                continue;
            }
            if is_common {
                let value = match &values {
                    ParameterValues::Scalar(v) => AttributeValue::Scalar(v * sign),
                    ParameterValues::Matrix(m) => AttributeValue::Array(
                        m.column(j as usize).iter().map(|v| v * sign).collect(),
                    ),
                };
                self.set_common_property(engine, attribute, value)?;
            } else {
                let source_ids = engine.get_status(&cell_handles, SynapseAttribute::Source)?;
                let mut cell_values = Vec::with_capacity(source_ids.len());
                for src in source_ids {
                    let i = self.pre_index_of(src as CellId)?;
                    cell_values.push(values.at(i, j) * sign);
                }
                engine.set_status(&cell_handles, attribute, &cell_values)?;
            }
        }
        Ok(())
    }

    /// Values recorded so far for common synapse properties.
    pub fn common_properties(
        &self,
    ) -> impl Iterator<Item = (SynapseAttribute, &AttributeValue)> + '_ {
        self.common_properties.iter().map(|(&k, v)| (k, v))
    }

    /// Distinguish common from local names using one sample connection:
    /// every attribute the model declares that is absent from the
    /// connection's own status is a common property.
    pub(crate) fn classify_common_names(
        &mut self,
        engine: &dyn SimulationEngine,
        sample: ConnectionHandle,
    ) -> ProjectionResult<()> {
        let local: AHashSet<SynapseAttribute> = engine
            .connection_status(sample)?
            .keys()
            .copied()
            .collect();
        let common: AHashSet<SynapseAttribute> = engine
            .get_defaults(self.synapse_type.model())?
            .keys()
            .copied()
            .filter(|name| !local.contains(name))
            .collect();
        debug!(
            target: super::LOG_TARGET,
            "classified {} common synapse properties for model '{}'",
            common.len(),
            self.synapse_type.model()
        );
        self.common_names = Some(common);
        Ok(())
    }

    /// Route one build-time attribute value through the classifier.
    pub(crate) fn apply_classified(
        &mut self,
        engine: &mut dyn SimulationEngine,
        handles: &[ConnectionHandle],
        attribute: SynapseAttribute,
        value: f64,
    ) -> ProjectionResult<()> {
        let is_common = self
            .common_names
            .as_ref()
            .is_some_and(|names| names.contains(&attribute));
        if is_common {
            self.set_common_property(engine, attribute, AttributeValue::Scalar(value))
        } else {
            let values = vec![value; handles.len()];
            engine.set_status(handles, attribute, &values)?;
            Ok(())
        }
    }

    /// Set a common property, enforcing that its value can only ever be set
    /// to one value. Re-setting the same value is idempotent; any
    /// element-wise difference is a hard error and the projection stays
    /// partially updated.
    pub(crate) fn set_common_property(
        &mut self,
        engine: &mut dyn SimulationEngine,
        attribute: SynapseAttribute,
        value: AttributeValue,
    ) -> ProjectionResult<()> {
        if let Some(previous) = self.common_properties.get(&attribute) {
            if previous.differs_from(&value) {
                return Err(ProjectionError::Heterogeneity {
                    name: attribute.engine_key(),
                });
            }
        }
        engine.set_defaults(self.synapse_type.model(), attribute, &value)?;
        self.common_properties.insert(attribute, value);
        Ok(())
    }

    fn pre_index_of(&self, id: CellId) -> ProjectionResult<u32> {
        self.pre.index_of(id).ok_or_else(|| {
            ProjectionError::Configuration(format!(
                "engine returned source id {} outside population '{}'",
                id,
                self.pre.label()
            ))
        })
    }

    fn post_index_of(&self, id: CellId) -> ProjectionResult<u32> {
        self.post.index_of(id).ok_or_else(|| {
            ProjectionError::Configuration(format!(
                "engine returned target id {} outside population '{}'",
                id,
                self.post.label()
            ))
        })
    }
}
