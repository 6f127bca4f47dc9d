// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*!
# Synaptic Projections

This crate builds and manages the synaptic connectivity graph between two
populations of simulated neurons:

- Connection rules (all-to-all, one-to-one, fixed degrees, fixed total
  count, pairwise-probabilistic, distance-dependent, explicit lists, clones)
- Parameter space evaluation (scalars, arrays, random distributions) with
  shape checking and deferred engine-side realization
- Projection construction against an external simulation engine
- Per-connection attribute I/O with common/local property classification

## Architecture

The simulation engine (cells, integrator, physical synapses) is an external
collaborator reached through the [`SimulationEngine`] trait; this crate
never stores per-connection state beyond opaque handles. Populations may be
partitioned across cooperating processes; each process instantiates only
the connections whose post-synaptic cell it owns, while random rules draw
against the full populations so that seeded runs stay globally consistent.

Copyright 2025 Neuraville Inc.
Licensed under the Apache License, Version 2.0
*/

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod engine;
pub mod parameters;
pub mod population;
pub mod projection;
pub mod rules;
pub mod types;

pub use engine::{ConnectionHandle, EngineError, RuleDescriptor, SimulationEngine};
pub use parameters::{
    AttributeValue, ParameterSpec, ParameterValues, RandomDistribution, SynapseAttribute,
    SynapseParamValue, SynapseParameters, SynapseType,
};
pub use population::{CellType, PartitionLayout, Population, ReceptorType};
pub use projection::Projection;
pub use rules::{ConnectionRule, ExplicitPair, Pair};
pub use types::{CellId, ProjectionError, ProjectionResult};
