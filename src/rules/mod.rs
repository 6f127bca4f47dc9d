// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*!
Connection rules - interchangeable bulk-connectivity strategies.

Each rule decides which (pre-index, post-index) pairs exist between two
populations. Rules are either translated to an engine-native
[`RuleDescriptor`](crate::engine::RuleDescriptor) and realized inside the
engine's bulk-connect primitive, or realized host-side as an explicit pair
stream. Host-side randomness always comes from the caller's RNG handle so
runs are reproducible under a fixed seed.
*/

pub mod deterministic;
pub mod random;

use rand::rngs::StdRng;

use crate::engine::RuleDescriptor;
use crate::population::Population;
use crate::types::{ProjectionError, ProjectionResult};

/// Distance-to-probability mapping for the distance-dependent rule.
pub type DistanceProbability = fn(f64) -> f64;

/// One emitted connection, with optional per-pair attribute overrides
/// carried by explicit-list rules.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pair {
    pub pre_index: u32,
    pub post_index: u32,
    pub weight: Option<f64>,
    pub delay: Option<f64>,
}

impl Pair {
    pub fn new(pre_index: u32, post_index: u32) -> Self {
        Self {
            pre_index,
            post_index,
            weight: None,
            delay: None,
        }
    }
}

/// An explicitly listed connection with optional per-pair weight and delay,
/// used to reproduce a previously recorded connectivity graph.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExplicitPair {
    pub pre_index: u32,
    pub post_index: u32,
    pub weight: Option<f64>,
    pub delay: Option<f64>,
}

impl ExplicitPair {
    pub fn new(pre_index: u32, post_index: u32) -> Self {
        Self {
            pre_index,
            post_index,
            weight: None,
            delay: None,
        }
    }

    pub fn with_attributes(pre_index: u32, post_index: u32, weight: f64, delay: f64) -> Self {
        Self {
            pre_index,
            post_index,
            weight: Some(weight),
            delay: Some(delay),
        }
    }
}

/// Declarative connection rule. Exactly one rule is active per projection.
#[derive(Debug, Clone)]
pub enum ConnectionRule {
    /// Every (i, j) pair.
    AllToAll { allow_self_connections: bool },
    /// (i, i) pairs; requires equally sized populations.
    OneToOne,
    /// Exactly `n` distinct pre-synaptic sources per post-synaptic cell.
    FixedInDegree { n: u32, allow_self_connections: bool },
    /// Exactly `n` distinct post-synaptic targets per pre-synaptic cell.
    FixedOutDegree { n: u32, allow_self_connections: bool },
    /// Exactly `n` pairs drawn without replacement from the full product.
    FixedTotalCount { n: u64, allow_self_connections: bool },
    /// Independent Bernoulli trial per candidate pair, realized inside the
    /// engine's bulk-connect primitive.
    PairwiseProbability { p: f64, allow_self_connections: bool },
    /// Bernoulli trial with probability derived from cell distance.
    DistanceDependentProbability {
        probability: DistanceProbability,
        allow_self_connections: bool,
    },
    /// Verbatim pair list, no randomness.
    FromExplicitList { pairs: Vec<ExplicitPair> },
    /// Exact pair set of an already-built projection, typically to attach a
    /// different synapse model to the same topology. Build with
    /// [`Projection::cloning_rule`](crate::Projection::cloning_rule).
    CloneProjection { pairs: Vec<(u32, u32)> },
}

impl ConnectionRule {
    /// Validate rule/population preconditions. Runs before any engine call;
    /// a failure here means nothing was created.
    pub fn validate(&self, pre: &Population, post: &Population) -> ProjectionResult<()> {
        match self {
            ConnectionRule::AllToAll { .. } => Ok(()),
            ConnectionRule::OneToOne => {
                if pre.size() != post.size() {
                    return Err(ProjectionError::Configuration(format!(
                        "one-to-one rule requires equal population sizes, got |{}| = {} and |{}| = {}",
                        pre.label(),
                        pre.size(),
                        post.label(),
                        post.size()
                    )));
                }
                Ok(())
            }
            ConnectionRule::FixedInDegree {
                n,
                allow_self_connections,
            } => {
                let excluded = u32::from(!allow_self_connections && pre.overlaps(post));
                let pool = pre.size().saturating_sub(excluded);
                if *n > pool {
                    return Err(ProjectionError::Configuration(format!(
                        "in-degree {} exceeds the {} eligible pre-synaptic cells",
                        n, pool
                    )));
                }
                Ok(())
            }
            ConnectionRule::FixedOutDegree {
                n,
                allow_self_connections,
            } => {
                let excluded = u32::from(!allow_self_connections && pre.overlaps(post));
                let pool = post.size().saturating_sub(excluded);
                if *n > pool {
                    return Err(ProjectionError::Configuration(format!(
                        "out-degree {} exceeds the {} eligible post-synaptic cells",
                        n, pool
                    )));
                }
                Ok(())
            }
            ConnectionRule::FixedTotalCount {
                n,
                allow_self_connections,
            } => {
                let available = random::available_pair_count(pre, post, *allow_self_connections);
                if *n > available {
                    return Err(ProjectionError::Configuration(format!(
                        "total count {} exceeds the {} available pairs",
                        n, available
                    )));
                }
                Ok(())
            }
            ConnectionRule::PairwiseProbability { p, .. } => {
                if !(0.0..=1.0).contains(p) {
                    return Err(ProjectionError::Configuration(format!(
                        "connection probability must be in [0, 1], got {}",
                        p
                    )));
                }
                Ok(())
            }
            ConnectionRule::DistanceDependentProbability { .. } => {
                if !pre.has_positions() || !post.has_positions() {
                    return Err(ProjectionError::Configuration(
                        "distance-dependent rule requires cell positions on both populations"
                            .to_string(),
                    ));
                }
                Ok(())
            }
            ConnectionRule::FromExplicitList { pairs } => {
                for pair in pairs {
                    if pair.pre_index >= pre.size() || pair.post_index >= post.size() {
                        return Err(ProjectionError::Configuration(format!(
                            "explicit pair ({}, {}) out of range for {}x{} populations",
                            pair.pre_index,
                            pair.post_index,
                            pre.size(),
                            post.size()
                        )));
                    }
                }
                Ok(())
            }
            ConnectionRule::CloneProjection { pairs } => {
                for &(i, j) in pairs {
                    if i >= pre.size() || j >= post.size() {
                        return Err(ProjectionError::Configuration(format!(
                            "cloned pair ({}, {}) out of range for {}x{} populations",
                            i,
                            j,
                            pre.size(),
                            post.size()
                        )));
                    }
                }
                Ok(())
            }
        }
    }

    /// The tagged-variant to engine-descriptor mapping table. Rules the
    /// engine realizes natively get a descriptor; host-realized rules get
    /// `None` and go through [`ConnectionRule::pairs`].
    pub fn descriptor(&self) -> Option<RuleDescriptor> {
        match *self {
            ConnectionRule::AllToAll {
                allow_self_connections,
            } => Some(RuleDescriptor {
                rule: "all_to_all",
                allow_autapses: allow_self_connections,
                probability: None,
            }),
            ConnectionRule::OneToOne => Some(RuleDescriptor {
                rule: "one_to_one",
                allow_autapses: true,
                probability: None,
            }),
            ConnectionRule::PairwiseProbability {
                p,
                allow_self_connections,
            } => Some(RuleDescriptor {
                rule: "pairwise_bernoulli",
                allow_autapses: allow_self_connections,
                probability: Some(p),
            }),
            _ => None,
        }
    }

    /// Host-side pair stream, covering the full populations.
    ///
    /// Random rules draw against the complete post/pre ranges on every
    /// process so that identical seeds give identical streams; restricting
    /// instantiation to locally owned post cells is the builder's job.
    pub fn pairs(
        &self,
        pre: &Population,
        post: &Population,
        rng: &mut StdRng,
    ) -> ProjectionResult<Vec<Pair>> {
        match self {
            ConnectionRule::AllToAll {
                allow_self_connections,
            } => Ok(deterministic::all_to_all_pairs(
                pre,
                post,
                *allow_self_connections,
            )),
            ConnectionRule::OneToOne => Ok(deterministic::one_to_one_pairs(pre)),
            ConnectionRule::FixedInDegree {
                n,
                allow_self_connections,
            } => Ok(random::fixed_in_degree_pairs(
                pre,
                post,
                *n,
                *allow_self_connections,
                rng,
            )),
            ConnectionRule::FixedOutDegree {
                n,
                allow_self_connections,
            } => Ok(random::fixed_out_degree_pairs(
                pre,
                post,
                *n,
                *allow_self_connections,
                rng,
            )),
            ConnectionRule::FixedTotalCount {
                n,
                allow_self_connections,
            } => Ok(random::fixed_total_count_pairs(
                pre,
                post,
                *n,
                *allow_self_connections,
                rng,
            )),
            ConnectionRule::PairwiseProbability { .. } => Err(ProjectionError::Configuration(
                "pairwise-probability rule is realized inside the engine and has no host-side pair stream"
                    .to_string(),
            )),
            ConnectionRule::DistanceDependentProbability {
                probability,
                allow_self_connections,
            } => Ok(random::distance_dependent_pairs(
                pre,
                post,
                *probability,
                *allow_self_connections,
                rng,
            )),
            ConnectionRule::FromExplicitList { pairs } => {
                Ok(deterministic::explicit_pairs(pairs))
            }
            ConnectionRule::CloneProjection { pairs } => Ok(deterministic::cloned_pairs(pairs)),
        }
    }
}

/// Whether pre index `i` and post index `j` address the same physical cell.
pub(crate) fn is_self_pair(pre: &Population, post: &Population, i: u32, j: u32) -> bool {
    pre.id(i) == post.id(j)
}
