// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*!
Interface to the external simulation engine.

The engine owns the cells and the physical synapses; this crate only ever
talks to it through [`SimulationEngine`]. Connections are referred to by
opaque handles, and bulk creation is driven by a translated
[`RuleDescriptor`] so the engine can realize simple rules without the host
materializing the pair set.
*/

use ahash::AHashMap;

use crate::parameters::{AttributeValue, SynapseAttribute, SynapseParameters};
use crate::types::CellId;

/// Opaque per-connection handle issued by the engine. The core never stores
/// any other per-connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
pub struct ConnectionHandle(pub u64);

/// Failures surfaced by the engine. Wrapped into
/// [`ProjectionError::Connection`](crate::ProjectionError::Connection) with
/// pair context at the projection-builder boundary.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("invalid cell id: {0}")]
    InvalidCell(CellId),

    #[error("unknown synapse model: {0}")]
    UnknownModel(String),

    #[error("unknown connection handle: {0:?}")]
    UnknownHandle(ConnectionHandle),

    #[error("rule not supported by engine: {0}")]
    UnsupportedRule(String),

    #[error("{0}")]
    Other(String),
}

/// Engine-native realization of a connection rule.
///
/// Field names follow the engine's wire vocabulary; `probability` is only
/// present for `pairwise_bernoulli`.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct RuleDescriptor {
    pub rule: &'static str,
    pub allow_autapses: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub probability: Option<f64>,
}

/// Low-level services consumed from the simulation engine.
///
/// All calls are synchronous: they may block on internal engine computation
/// but never hand control back to the caller mid-call.
pub trait SimulationEngine {
    /// Batched creation: realize `rule` over the given id lists, drawing any
    /// deferred distribution parameters from the engine's own random stream.
    fn bulk_connect(
        &mut self,
        pre_ids: &[CellId],
        post_ids: &[CellId],
        rule: &RuleDescriptor,
        synapse: &SynapseParameters,
    ) -> Result<(), EngineError>;

    /// Single-connection fallback for pairs the bulk primitive cannot express.
    fn connect_one(
        &mut self,
        pre_id: CellId,
        post_id: CellId,
        attributes: &[(SynapseAttribute, f64)],
        model: &str,
    ) -> Result<ConnectionHandle, EngineError>;

    /// Handles of connections from any of `source_ids` (optionally restricted
    /// to `target_ids`) under `model`, in engine-internal order.
    fn get_connections(
        &self,
        source_ids: &[CellId],
        target_ids: Option<&[CellId]>,
        model: &str,
    ) -> Vec<ConnectionHandle>;

    /// One value of `attribute` per handle, in handle order.
    fn get_status(
        &self,
        handles: &[ConnectionHandle],
        attribute: SynapseAttribute,
    ) -> Result<Vec<f64>, EngineError>;

    /// Write one value of `attribute` per handle. `values` must be the same
    /// length as `handles`.
    fn set_status(
        &mut self,
        handles: &[ConnectionHandle],
        attribute: SynapseAttribute,
        values: &[f64],
    ) -> Result<(), EngineError>;

    /// Every attribute physically present on one connection. Used to
    /// classify common versus local synapse properties.
    fn connection_status(
        &self,
        handle: ConnectionHandle,
    ) -> Result<AHashMap<SynapseAttribute, f64>, EngineError>;

    /// Model-level attribute defaults, including common synapse properties.
    fn get_defaults(&self, model: &str) -> Result<AHashMap<SynapseAttribute, f64>, EngineError>;

    /// Write a model-level (common) property.
    fn set_defaults(
        &mut self,
        model: &str,
        attribute: SynapseAttribute,
        value: &AttributeValue,
    ) -> Result<(), EngineError>;

    /// Number of connections that exist under `model` on this process.
    fn num_connections(&self, model: &str) -> Result<usize, EngineError>;

    /// Whether the engine can realize draws from the named distribution with
    /// its own random stream inside `bulk_connect`.
    fn supports_distribution(&self, name: &str) -> bool;
}
