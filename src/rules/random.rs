// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*!
Randomized connection rules.

Every draw comes from the caller's RNG handle, and every rule draws against
the full populations regardless of which post cells the current process
owns. Identical seeds therefore produce identical pair streams on every
process, and the builder's locality filter carves out disjoint per-process
subsets with the correct global statistics.
*/

use rand::rngs::StdRng;
use rand::Rng;

use crate::population::Population;
use crate::rules::{is_self_pair, DistanceProbability, Pair};
use crate::types::CellId;

/// Number of candidate pairs in the (pre x post) product after self-pair
/// exclusion.
pub fn available_pair_count(pre: &Population, post: &Population, allow_self: bool) -> u64 {
    let total = pre.size() as u64 * post.size() as u64;
    if allow_self {
        total
    } else {
        total - excluded_ids(pre, post).count() as u64
    }
}

/// Global ids present in both populations; each contributes one excluded
/// self-pair.
fn excluded_ids(pre: &Population, post: &Population) -> std::ops::Range<CellId> {
    let lo = pre.first_id().max(post.first_id());
    let hi = (pre.first_id() + pre.size() as CellId).min(post.first_id() + post.size() as CellId);
    lo..hi.max(lo)
}

/// For every post cell, exactly `n` distinct pre sources drawn uniformly
/// without replacement. Independent draws per post cell, posts visited in
/// index order.
pub fn fixed_in_degree_pairs(
    pre: &Population,
    post: &Population,
    n: u32,
    allow_self: bool,
    rng: &mut StdRng,
) -> Vec<Pair> {
    let exclude = !allow_self && pre.overlaps(post);
    let mut pairs = Vec::with_capacity(n as usize * post.size() as usize);
    for j in 0..post.size() {
        let self_source = if exclude {
            pre.index_of(post.id(j))
        } else {
            None
        };
        let pool = pre.size() - u32::from(self_source.is_some());
        for idx in rand::seq::index::sample(rng, pool as usize, n as usize) {
            let mut i = idx as u32;
            // Skip over the excluded self source to keep draws uniform.
            if let Some(s) = self_source {
                if i >= s {
                    i += 1;
                }
            }
            pairs.push(Pair::new(i, j));
        }
    }
    pairs
}

/// For every pre cell, exactly `n` distinct post targets drawn uniformly
/// without replacement.
pub fn fixed_out_degree_pairs(
    pre: &Population,
    post: &Population,
    n: u32,
    allow_self: bool,
    rng: &mut StdRng,
) -> Vec<Pair> {
    let exclude = !allow_self && pre.overlaps(post);
    let mut pairs = Vec::with_capacity(n as usize * pre.size() as usize);
    for i in 0..pre.size() {
        let self_target = if exclude {
            post.index_of(pre.id(i))
        } else {
            None
        };
        let pool = post.size() - u32::from(self_target.is_some());
        for idx in rand::seq::index::sample(rng, pool as usize, n as usize) {
            let mut j = idx as u32;
            if let Some(t) = self_target {
                if j >= t {
                    j += 1;
                }
            }
            pairs.push(Pair::new(i, j));
        }
    }
    pairs
}

/// Exactly `n` pairs drawn uniformly without replacement from the product
/// minus excluded self-pairs. Emitted in (target, source)-nested order.
pub fn fixed_total_count_pairs(
    pre: &Population,
    post: &Population,
    n: u64,
    allow_self: bool,
    rng: &mut StdRng,
) -> Vec<Pair> {
    let n_pre = pre.size() as u64;
    let excluded: Vec<u64> = if allow_self {
        Vec::new()
    } else {
        // Target-major linearization is strictly increasing in the shared id,
        // so this list is already sorted.
        excluded_ids(pre, post)
            .map(|id| {
                let i = id - pre.first_id();
                let j = id - post.first_id();
                j * n_pre + i
            })
            .collect()
    };
    let available = n_pre * post.size() as u64 - excluded.len() as u64;

    let mut ranks: Vec<usize> =
        rand::seq::index::sample(rng, available as usize, n as usize).into_iter().collect();
    ranks.sort_unstable();

    ranks
        .into_iter()
        .map(|rank| {
            let linear = nth_allowed(rank as u64, &excluded);
            Pair::new((linear % n_pre) as u32, (linear / n_pre) as u32)
        })
        .collect()
}

/// Map a rank in the allowed-pair sequence to its linear index in the full
/// product, stepping over the sorted excluded indices.
fn nth_allowed(rank: u64, excluded_sorted: &[u64]) -> u64 {
    let mut linear = rank;
    for &e in excluded_sorted {
        if linear >= e {
            linear += 1;
        } else {
            break;
        }
    }
    linear
}

/// Independent Bernoulli trial per candidate pair with probability derived
/// from the Euclidean distance between the cells. Probabilities outside
/// [0, 1] are clamped.
pub fn distance_dependent_pairs(
    pre: &Population,
    post: &Population,
    probability: DistanceProbability,
    allow_self: bool,
    rng: &mut StdRng,
) -> Vec<Pair> {
    let exclude = !allow_self && pre.overlaps(post);
    let mut pairs = Vec::new();
    for j in 0..post.size() {
        for i in 0..pre.size() {
            if exclude && is_self_pair(pre, post, i, j) {
                continue;
            }
            let p = probability(pre.distance_to(i, post, j)).clamp(0.0, 1.0);
            if rng.gen::<f64>() < p {
                pairs.push(Pair::new(i, j));
            }
        }
    }
    pairs
}
