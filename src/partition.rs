//! Partition bookkeeping shared by the FM and QP refinement passes.
//!
//! The state tracks, incrementally, everything a boundary move touches:
//! per-vertex gains, external degrees, both gain heaps, the cut cost, the
//! side weights and the balance-penalized heuristic cost. A full rebuild
//! from a bare partition array costs O(nz); a single vertex flip costs
//! O(deg * log n).

use crate::algorithms::Error;
use crate::bheap::BoundaryHeap;
use crate::graph::Graph;
use crate::imbalance::balance_excess;
use crate::options::Options;

/// Cut cost plus the balance penalty for a side-1 weight of `w1`.
pub(crate) fn heuristic_cost(graph: &Graph, options: &Options, cut_cost: f64, w1: f64) -> f64 {
    cut_cost + balance_excess(graph, options, w1)
}

pub(crate) struct PartitionState {
    /// Side (0 or 1) of each vertex.
    pub partition: Vec<usize>,
    /// Weight to the opposite side minus weight to the own side; flipping a
    /// vertex lowers the cut by exactly its gain.
    pub gains: Vec<f64>,
    /// Number of incident edges crossing the cut.
    pub external_degree: Vec<usize>,
    /// Gain-ordered heaps of boundary vertices, one per side.
    pub heap: BoundaryHeap,
    pub cut_cost: f64,
    pub part_weights: [f64; 2],
    pub heu_cost: f64,
}

impl PartitionState {
    pub fn new(n: usize) -> Self {
        PartitionState {
            partition: vec![0; n],
            gains: vec![0.0; n],
            external_degree: vec![0; n],
            heap: BoundaryHeap::new(n),
            cut_cost: 0.0,
            part_weights: [0.0, 0.0],
            heu_cost: 0.0,
        }
    }

    /// Recompute every derived quantity from a bare partition array and
    /// rebuild both heaps. This is the projection step run at each
    /// uncoarsening level.
    pub fn reset_from_partition(&mut self, graph: &Graph, partition: &[usize], options: &Options) {
        let n = graph.len();
        debug_assert_eq!(partition.len(), n);
        self.partition.copy_from_slice(partition);
        self.part_weights = [0.0, 0.0];
        let mut cut_doubled = 0.0;
        for v in 0..n {
            let side = self.partition[v];
            self.part_weights[side] += graph.vertex_weights()[v];
            let mut to_same = 0.0;
            let mut to_opposite = 0.0;
            let mut crossing = 0;
            for (u, x) in graph.neighbors(v) {
                if self.partition[u] == side {
                    to_same += x;
                } else {
                    to_opposite += x;
                    crossing += 1;
                }
            }
            self.gains[v] = to_opposite - to_same;
            self.external_degree[v] = crossing;
            cut_doubled += to_opposite;
        }
        self.cut_cost = cut_doubled / 2.0;
        self.heu_cost = heuristic_cost(graph, options, self.cut_cost, self.part_weights[1]);
        self.rebuild_heaps();
    }

    /// Clear and repopulate both heaps with every boundary vertex, in vertex
    /// id order.
    pub fn rebuild_heaps(&mut self) {
        self.heap.clear();
        for v in 0..self.partition.len() {
            if self.external_degree[v] > 0 {
                self.heap.insert(self.partition[v], v, &self.gains);
            }
        }
    }

    /// Flip `v` to the other side, updating costs, neighbor gains, external
    /// degrees and the heaps. `v` itself must already be out of the heaps
    /// (the FM loop removes it when locking); `locked` vertices keep their
    /// gains current but are left out of the heaps.
    pub fn apply_move(&mut self, graph: &Graph, options: &Options, v: usize, locked: &[bool]) {
        self.flip(graph, options, v, Some(locked));
    }

    /// Flip `v` without touching the heaps. Used for rollback, after which
    /// the caller rebuilds the heaps wholesale.
    pub fn apply_move_raw(&mut self, graph: &Graph, options: &Options, v: usize) {
        self.flip(graph, options, v, None);
    }

    fn flip(&mut self, graph: &Graph, options: &Options, v: usize, locked: Option<&[bool]>) {
        debug_assert!(!self.heap.contains(v));
        let from = self.partition[v];
        let to = 1 - from;
        self.cut_cost -= self.gains[v];
        self.gains[v] = -self.gains[v];
        let wv = graph.vertex_weights()[v];
        self.part_weights[from] -= wv;
        self.part_weights[to] += wv;
        self.partition[v] = to;
        self.external_degree[v] = graph.degree(v) - self.external_degree[v];

        for (u, x) in graph.neighbors(v) {
            if self.partition[u] == to {
                // Edge left the cut.
                self.gains[u] -= 2.0 * x;
                self.external_degree[u] -= 1;
            } else {
                // Edge entered the cut.
                self.gains[u] += 2.0 * x;
                self.external_degree[u] += 1;
            }
            let Some(locked) = locked else { continue };
            if locked[u] {
                continue;
            }
            let side = self.partition[u];
            if self.external_degree[u] == 0 {
                if self.heap.contains(u) {
                    self.heap.remove(side, u, &self.gains);
                }
            } else if self.heap.contains(u) {
                self.heap.update(side, u, &self.gains);
            } else {
                self.heap.insert(side, u, &self.gains);
            }
        }
        self.heu_cost = heuristic_cost(graph, options, self.cut_cost, self.part_weights[1]);
    }

    /// Check every universal invariant against a from-scratch recomputation.
    /// Heap membership is only meaningful when no vertex is locked, i.e. at
    /// refinement entry and after heaps were rebuilt.
    pub fn validate(&self, graph: &Graph, options: &Options) -> Result<(), Error> {
        let n = graph.len();
        let mut w = [0.0, 0.0];
        let mut cut_doubled = 0.0;
        for v in 0..n {
            let side = self.partition[v];
            if side > 1 {
                return Err(Error::InternalInvariantBroken("vertex side out of range"));
            }
            w[side] += graph.vertex_weights()[v];
            let mut to_same = 0.0;
            let mut to_opposite = 0.0;
            let mut crossing = 0;
            for (u, x) in graph.neighbors(v) {
                if self.partition[u] == side {
                    to_same += x;
                } else {
                    to_opposite += x;
                    crossing += 1;
                }
            }
            if !close(self.gains[v], to_opposite - to_same) {
                log::warn!("vertex {v}: stored gain {} != recomputed {}", self.gains[v], to_opposite - to_same);
                return Err(Error::InternalInvariantBroken("stale vertex gain"));
            }
            if self.external_degree[v] != crossing {
                return Err(Error::InternalInvariantBroken("stale external degree"));
            }
            if self.heap.contains(v) != (crossing > 0) {
                return Err(Error::InternalInvariantBroken(
                    "heap membership disagrees with external degree",
                ));
            }
            cut_doubled += to_opposite;
        }
        if !close(self.cut_cost, cut_doubled / 2.0) {
            return Err(Error::InternalInvariantBroken("stale cut cost"));
        }
        if !close(self.part_weights[0], w[0]) || !close(self.part_weights[1], w[1]) {
            return Err(Error::InternalInvariantBroken("stale side weights"));
        }
        if !close(w[0] + w[1], graph.total_vertex_weight()) {
            return Err(Error::InternalInvariantBroken("side weights do not sum to W"));
        }
        if !close(
            self.heu_cost,
            heuristic_cost(graph, options, self.cut_cost, self.part_weights[1]),
        ) {
            return Err(Error::InternalInvariantBroken("stale heuristic cost"));
        }
        if !self.heap.is_consistent(&self.gains) {
            return Err(Error::InternalInvariantBroken("heap order violated"));
        }
        Ok(())
    }
}

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() <= 1e-9 * (1.0 + a.abs().max(b.abs()))
}
