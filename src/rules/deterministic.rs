// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*!
Deterministic connection rules - pair streams with no randomness.

All streams are emitted in (target, source)-nested order, matching the
order in which eagerly evaluated random parameters are consumed.
*/

use crate::population::Population;
use crate::rules::{is_self_pair, ExplicitPair, Pair};

/// Every (i, j) pair. Self-pairs (same physical cell) are skipped only when
/// the populations can alias and autapses are disallowed.
pub fn all_to_all_pairs(pre: &Population, post: &Population, allow_self: bool) -> Vec<Pair> {
    let exclude_self = !allow_self && pre.overlaps(post);
    let mut pairs = Vec::with_capacity(pre.size() as usize * post.size() as usize);
    for j in 0..post.size() {
        for i in 0..pre.size() {
            if exclude_self && is_self_pair(pre, post, i, j) {
                continue;
            }
            pairs.push(Pair::new(i, j));
        }
    }
    pairs
}

/// (i, i) pairs. Equal sizes are checked during rule validation.
pub fn one_to_one_pairs(pre: &Population) -> Vec<Pair> {
    (0..pre.size()).map(|i| Pair::new(i, i)).collect()
}

/// Verbatim pairs with their per-pair attribute overrides.
pub fn explicit_pairs(list: &[ExplicitPair]) -> Vec<Pair> {
    list.iter()
        .map(|p| Pair {
            pre_index: p.pre_index,
            post_index: p.post_index,
            weight: p.weight,
            delay: p.delay,
        })
        .collect()
}

/// Pair set recovered from an already-built projection.
pub fn cloned_pairs(list: &[(u32, u32)]) -> Vec<Pair> {
    list.iter().map(|&(i, j)| Pair::new(i, j)).collect()
}
