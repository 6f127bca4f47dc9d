// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*!
Populations of simulated neurons and their process partitioning.

A [`Population`] is an ordered, globally indexed collection of cell
identities. The cells themselves live in the simulation engine; this type
only records the id range, the cell-type conventions that affect synaptic
weights, and which slice of the collection the current process owns.
*/

use serde::Serialize;

use crate::types::CellId;

/// Partition of the post-synaptic population across cooperating processes.
///
/// Cells are distributed round-robin by index, so every process can compute
/// any cell's owner without communication.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PartitionLayout {
    pub rank: u32,
    pub num_processes: u32,
}

impl PartitionLayout {
    /// Layout for a single-process simulation; every cell is local.
    pub fn single_process() -> Self {
        Self {
            rank: 0,
            num_processes: 1,
        }
    }

    pub fn new(rank: u32, num_processes: u32) -> Self {
        assert!(num_processes > 0, "partition requires at least one process");
        assert!(rank < num_processes, "rank must be below num_processes");
        Self {
            rank,
            num_processes,
        }
    }

    pub fn is_local(&self, index: u32) -> bool {
        index % self.num_processes == self.rank
    }
}

/// Receptor classification of a projection, affecting weight sign/scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ReceptorType {
    Excitatory,
    Inhibitory,
}

/// Electrophysiological conventions of a cell model that matter to
/// connectivity. The membrane equations themselves are engine business.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CellType {
    /// Conductance-based synapses require negated inhibitory weights.
    pub conductance_based: bool,
    /// Extra weight multiplier declared by some cell models.
    pub receptor_scale: Option<f64>,
    /// Whether the model uses the engine's standard receptor routing.
    /// Non-standard routing forces one-at-a-time connection creation.
    pub standard_receptors: bool,
}

impl CellType {
    pub fn current_based() -> Self {
        Self {
            conductance_based: false,
            receptor_scale: None,
            standard_receptors: true,
        }
    }

    pub fn conductance_based() -> Self {
        Self {
            conductance_based: true,
            receptor_scale: None,
            standard_receptors: true,
        }
    }

    pub fn with_receptor_scale(mut self, scale: f64) -> Self {
        self.receptor_scale = Some(scale);
        self
    }

    pub fn with_nonstandard_receptors(mut self) -> Self {
        self.standard_receptors = false;
        self
    }
}

/// An ordered, globally indexed collection of neuron identities.
///
/// Immutable once created. Ids are contiguous starting at `first_id`;
/// index `i` maps to id `first_id + i`.
#[derive(Debug, Clone, Serialize)]
pub struct Population {
    label: String,
    first_id: CellId,
    size: u32,
    cell_type: CellType,
    layout: PartitionLayout,
    /// Optional 3-D cell positions, required by distance-dependent rules.
    positions: Option<Vec<[f64; 3]>>,
}

impl Population {
    pub fn new(
        label: impl Into<String>,
        first_id: CellId,
        size: u32,
        cell_type: CellType,
        layout: PartitionLayout,
    ) -> Self {
        Self {
            label: label.into(),
            first_id,
            size,
            cell_type,
            layout,
            positions: None,
        }
    }

    pub fn with_positions(mut self, positions: Vec<[f64; 3]>) -> Self {
        assert_eq!(
            positions.len(),
            self.size as usize,
            "one position per cell required"
        );
        self.positions = Some(positions);
        self
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn first_id(&self) -> CellId {
        self.first_id
    }

    pub fn cell_type(&self) -> &CellType {
        &self.cell_type
    }

    pub fn layout(&self) -> PartitionLayout {
        self.layout
    }

    /// Global engine id of the cell at `index`.
    pub fn id(&self, index: u32) -> CellId {
        debug_assert!(index < self.size);
        self.first_id + index as CellId
    }

    /// Population index of a global id, if the id belongs to this population.
    pub fn index_of(&self, id: CellId) -> Option<u32> {
        if id >= self.first_id && id < self.first_id + self.size as CellId {
            Some((id - self.first_id) as u32)
        } else {
            None
        }
    }

    /// All global ids, in index order.
    pub fn all_ids(&self) -> Vec<CellId> {
        (0..self.size).map(|i| self.id(i)).collect()
    }

    /// Whether the cell at `index` is owned by the current process.
    pub fn is_local(&self, index: u32) -> bool {
        self.layout.is_local(index)
    }

    /// Indices owned by the current process, in ascending order.
    pub fn local_indices(&self) -> impl Iterator<Item = u32> + '_ {
        (0..self.size).filter(|&i| self.is_local(i))
    }

    /// Boolean ownership mask over all indices.
    pub fn local_mask(&self) -> Vec<bool> {
        (0..self.size).map(|i| self.is_local(i)).collect()
    }

    pub fn has_positions(&self) -> bool {
        self.positions.is_some()
    }

    /// Euclidean distance between this population's cell `i` and `other`'s
    /// cell `j`. Panics if either population lacks positions; rules check
    /// `has_positions` during validation.
    pub fn distance_to(&self, i: u32, other: &Population, j: u32) -> f64 {
        let a = self.positions.as_ref().expect("positions required")[i as usize];
        let b = other.positions.as_ref().expect("positions required")[j as usize];
        let dx = a[0] - b[0];
        let dy = a[1] - b[1];
        let dz = a[2] - b[2];
        (dx * dx + dy * dy + dz * dz).sqrt()
    }

    /// Whether two populations describe overlapping id ranges. Self-connection
    /// policies only apply when the pre and post ranges can alias.
    pub fn overlaps(&self, other: &Population) -> bool {
        let a0 = self.first_id;
        let a1 = self.first_id + self.size as CellId;
        let b0 = other.first_id;
        let b1 = other.first_id + other.size as CellId;
        a0 < b1 && b0 < a1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_robin_partition() {
        let layout = PartitionLayout::new(1, 3);
        assert!(!layout.is_local(0));
        assert!(layout.is_local(1));
        assert!(!layout.is_local(2));
        assert!(layout.is_local(4));
    }

    #[test]
    fn test_id_index_round_trip() {
        let pop = Population::new(
            "pre",
            100,
            8,
            CellType::current_based(),
            PartitionLayout::single_process(),
        );
        assert_eq!(pop.id(3), 103);
        assert_eq!(pop.index_of(103), Some(3));
        assert_eq!(pop.index_of(99), None);
        assert_eq!(pop.index_of(108), None);
    }

    #[test]
    fn test_local_indices_cover_population_across_ranks() {
        let mut seen = Vec::new();
        for rank in 0..2 {
            let pop = Population::new(
                "post",
                0,
                7,
                CellType::current_based(),
                PartitionLayout::new(rank, 2),
            );
            seen.extend(pop.local_indices());
        }
        seen.sort_unstable();
        assert_eq!(seen, vec![0, 1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn test_overlap_detection() {
        let layout = PartitionLayout::single_process();
        let a = Population::new("a", 0, 10, CellType::current_based(), layout);
        let b = Population::new("b", 10, 10, CellType::current_based(), layout);
        let c = Population::new("c", 5, 10, CellType::current_based(), layout);
        assert!(!a.overlaps(&b));
        assert!(a.overlaps(&c));
        assert!(a.overlaps(&a));
    }
}
