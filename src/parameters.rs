// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*!
Parameter space evaluation for per-connection synapse attributes.

A [`ParameterSpec`] describes one attribute declaratively: a constant, an
explicit (pre × post) array, or a random distribution. Evaluation turns a
spec into concrete values for a target shape, either eagerly on the host
(one draw per coordinate from an explicit RNG handle) or deferred to the
engine's own random stream when the bulk-connect primitive supports the
distribution natively. The two modes are not bit-reproducible against each
other.
*/

use ahash::AHashMap;
use ndarray::Array2;
use rand::rngs::StdRng;
use rand::Rng;
use rand_distr::{Distribution, Exp, LogNormal, Normal, Uniform};

use crate::types::{ProjectionError, ProjectionResult};

/// Closed enumeration of recognized synapse attributes.
///
/// Attribute names are resolved through this mapping rather than passed
/// through as free-form strings; an unrecognized engine key is a
/// configuration error at the boundary, never a silent passthrough.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
pub enum SynapseAttribute {
    Weight,
    Delay,
    /// Utilization of synaptic efficacy (short-term plasticity).
    U,
    TauRec,
    TauFac,
    TauPsc,
    TauPlus,
    /// Pre-synaptic cell id, translated to a population index on read.
    Source,
    /// Post-synaptic cell id, translated to a population index on read.
    Target,
    /// Engine receptor port, used by non-standard receptor routing.
    Receptor,
}

impl SynapseAttribute {
    pub fn engine_key(self) -> &'static str {
        match self {
            SynapseAttribute::Weight => "weight",
            SynapseAttribute::Delay => "delay",
            SynapseAttribute::U => "U",
            SynapseAttribute::TauRec => "tau_rec",
            SynapseAttribute::TauFac => "tau_fac",
            SynapseAttribute::TauPsc => "tau_psc",
            SynapseAttribute::TauPlus => "tau_plus",
            SynapseAttribute::Source => "source",
            SynapseAttribute::Target => "target",
            SynapseAttribute::Receptor => "receptor",
        }
    }

    pub fn from_engine_key(key: &str) -> Option<Self> {
        match key {
            "weight" => Some(SynapseAttribute::Weight),
            "delay" => Some(SynapseAttribute::Delay),
            "U" => Some(SynapseAttribute::U),
            "tau_rec" => Some(SynapseAttribute::TauRec),
            "tau_fac" => Some(SynapseAttribute::TauFac),
            "tau_psc" => Some(SynapseAttribute::TauPsc),
            "tau_plus" => Some(SynapseAttribute::TauPlus),
            "source" => Some(SynapseAttribute::Source),
            "target" => Some(SynapseAttribute::Target),
            "receptor" => Some(SynapseAttribute::Receptor),
            _ => None,
        }
    }
}

/// A random-distribution descriptor, realizable either host-side or inside
/// the engine.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub enum RandomDistribution {
    Normal { mu: f64, sigma: f64 },
    Uniform { low: f64, high: f64 },
    LogNormal { mu: f64, sigma: f64 },
    Exponential { lambda: f64 },
}

impl RandomDistribution {
    /// Engine wire name of the distribution.
    pub fn name(&self) -> &'static str {
        match self {
            RandomDistribution::Normal { .. } => "normal",
            RandomDistribution::Uniform { .. } => "uniform",
            RandomDistribution::LogNormal { .. } => "lognormal",
            RandomDistribution::Exponential { .. } => "exponential",
        }
    }

    /// One draw from the host-side stream.
    pub fn sample(&self, rng: &mut StdRng) -> ProjectionResult<f64> {
        let bad = |e: &dyn std::fmt::Display| {
            ProjectionError::Configuration(format!("invalid distribution parameters: {}", e))
        };
        match *self {
            RandomDistribution::Normal { mu, sigma } => {
                Ok(Normal::new(mu, sigma).map_err(|e| bad(&e))?.sample(rng))
            }
            RandomDistribution::Uniform { low, high } => {
                if low >= high {
                    return Err(bad(&"uniform requires low < high"));
                }
                Ok(rng.sample(Uniform::new(low, high)))
            }
            RandomDistribution::LogNormal { mu, sigma } => {
                Ok(LogNormal::new(mu, sigma).map_err(|e| bad(&e))?.sample(rng))
            }
            RandomDistribution::Exponential { lambda } => {
                Ok(Exp::new(lambda).map_err(|e| bad(&e))?.sample(rng))
            }
        }
    }
}

/// Declarative specification of one per-connection attribute.
#[derive(Debug, Clone, PartialEq)]
pub enum ParameterSpec {
    Scalar(f64),
    /// Explicit values; must match the (pre, post) target shape exactly.
    Array(Array2<f64>),
    Random(RandomDistribution),
}

/// Concrete values produced by evaluation. A scalar spec stays a scalar even
/// for a 1×1 target so callers can pick their scalar code path cheaply.
#[derive(Debug, Clone, PartialEq)]
pub enum ParameterValues {
    Scalar(f64),
    Matrix(Array2<f64>),
}

impl ParameterValues {
    /// Value at (pre, post), broadcasting scalars.
    pub fn at(&self, pre_index: u32, post_index: u32) -> f64 {
        match self {
            ParameterValues::Scalar(v) => *v,
            ParameterValues::Matrix(m) => m[[pre_index as usize, post_index as usize]],
        }
    }
}

impl ParameterSpec {
    /// Evaluate against a concrete (n_pre, n_post) shape.
    ///
    /// Random specs draw one independent value per coordinate, consuming
    /// `rng` in (target, source)-nested order; reproducible seeding must fix
    /// that order exactly.
    pub fn evaluate(
        &self,
        shape: (usize, usize),
        rng: &mut StdRng,
    ) -> ProjectionResult<ParameterValues> {
        match self {
            ParameterSpec::Scalar(v) => Ok(ParameterValues::Scalar(*v)),
            ParameterSpec::Array(values) => {
                let actual = values.dim();
                if actual != shape {
                    return Err(ProjectionError::Shape {
                        expected: shape,
                        actual,
                    });
                }
                Ok(ParameterValues::Matrix(values.clone()))
            }
            ParameterSpec::Random(dist) => {
                let mut out = Array2::zeros(shape);
                for post in 0..shape.1 {
                    for pre in 0..shape.0 {
                        out[[pre, post]] = dist.sample(rng)?;
                    }
                }
                Ok(ParameterValues::Matrix(out))
            }
        }
    }

    /// The distribution to forward to the engine, when this spec is random
    /// and the engine can realize it natively inside `bulk_connect`.
    pub fn deferrable(&self, engine: &dyn crate::engine::SimulationEngine) -> Option<RandomDistribution> {
        match self {
            ParameterSpec::Random(dist) if engine.supports_distribution(dist.name()) => Some(*dist),
            _ => None,
        }
    }
}

/// A value recorded for a common synapse property. Arrays compare
/// element-wise; any element-wise inequality counts as heterogeneous.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub enum AttributeValue {
    Scalar(f64),
    Array(Vec<f64>),
}

impl AttributeValue {
    pub fn differs_from(&self, other: &AttributeValue) -> bool {
        match (self, other) {
            (AttributeValue::Scalar(a), AttributeValue::Scalar(b)) => a != b,
            (AttributeValue::Array(a), AttributeValue::Array(b)) => {
                a.len() != b.len() || a.iter().zip(b).any(|(x, y)| x != y)
            }
            _ => true,
        }
    }
}

/// A synapse model plus the declarative parameter space of its attributes.
#[derive(Debug, Clone)]
pub struct SynapseType {
    model: String,
    parameters: AHashMap<SynapseAttribute, ParameterSpec>,
}

impl SynapseType {
    pub fn new(
        model: impl Into<String>,
        parameters: AHashMap<SynapseAttribute, ParameterSpec>,
    ) -> Self {
        Self {
            model: model.into(),
            parameters,
        }
    }

    /// The engine's static synapse with just weight and delay.
    pub fn static_synapse(weight: ParameterSpec, delay: ParameterSpec) -> Self {
        let mut parameters = AHashMap::new();
        parameters.insert(SynapseAttribute::Weight, weight);
        parameters.insert(SynapseAttribute::Delay, delay);
        Self {
            model: "static_synapse".to_string(),
            parameters,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn parameters(&self) -> &AHashMap<SynapseAttribute, ParameterSpec> {
        &self.parameters
    }
}

/// Fully resolved synapse parameters handed to the engine's bulk-connect
/// primitive. Distributions are those the engine realizes with its own
/// stream.
#[derive(Debug, Clone)]
pub struct SynapseParameters {
    pub model: String,
    pub values: AHashMap<SynapseAttribute, SynapseParamValue>,
}

#[derive(Debug, Clone)]
pub enum SynapseParamValue {
    Scalar(f64),
    Matrix(Array2<f64>),
    Distribution(RandomDistribution),
}
