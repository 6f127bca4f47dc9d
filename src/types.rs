// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*!
Core types for projection construction.
*/

use crate::engine::EngineError;

/// Global cell identifier assigned by the simulation engine.
pub type CellId = u64;

/// Result type for projection operations
pub type ProjectionResult<T> = Result<T, ProjectionError>;

/// Errors that can occur during projection construction and attribute I/O.
///
/// All variants describe deterministic-input failures; retrying without
/// changing the input is meaningless, so no variant is retryable.
#[derive(Debug, thiserror::Error)]
pub enum ProjectionError {
    /// Invalid rule/population combination, detected before any engine call.
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// Parameter specification does not match the required shape.
    #[error("Shape mismatch: expected {expected:?}, got {actual:?}")]
    Shape {
        expected: (usize, usize),
        actual: (usize, usize),
    },

    /// The engine rejected a specific pair. Carries the pre/post indices
    /// that were being connected so the failure can be diagnosed.
    #[error("Connection ({pre_index}, {post_index}) rejected by engine: {source}")]
    Connection {
        pre_index: u32,
        post_index: u32,
        #[source]
        source: EngineError,
    },

    /// A common synapse property was set to two different values. The
    /// projection is left partially updated; the caller must reset the
    /// network and rebuild rather than attempt a partial rollback.
    #[error(
        "'{name}' cannot be heterogeneous within a single projection; \
         the projection was only partially initialized, reset the network and rebuild"
    )]
    Heterogeneity { name: &'static str },

    /// Engine failure outside the per-pair creation path (queries, defaults).
    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),
}
