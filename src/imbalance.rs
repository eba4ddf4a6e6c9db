//! Partition quality metrics over two-way [`Graph`] partitions.

use crate::graph::Graph;
use crate::options::Options;

/// Total vertex weight carried by each side of a two-way partition.
pub fn compute_parts_load(graph: &Graph, partition: &[usize]) -> [f64; 2] {
    debug_assert_eq!(graph.len(), partition.len());
    let mut loads = [0.0, 0.0];
    for (&side, &weight) in partition.iter().zip(graph.vertex_weights()) {
        if side < 2 {
            loads[side] += weight;
        }
    }
    loads
}

/// Deviation of the side weights from an even split, `|0.5 - w0 / W|`.
/// Zero means both sides carry the same vertex weight.
pub fn imbalance(graph: &Graph, partition: &[usize]) -> f64 {
    let [w0, w1] = compute_parts_load(graph, partition);
    let total = w0 + w1;
    if total == 0.0 {
        return 0.0;
    }
    (0.5 - w0 / total).abs()
}

/// The surcharge the refinement objective adds to the cut cost when the
/// side-1 weight strays outside the tolerance window around the target
/// split.
pub fn balance_penalty(graph: &Graph, options: &Options, partition: &[usize]) -> f64 {
    balance_excess(graph, options, compute_parts_load(graph, partition)[1])
}

/// Scalar core of [`balance_penalty`] for callers that track the side-1
/// weight incrementally: scaled by [`Graph::heuristic_scale`] so one unit
/// of misplaced weight costs about one heaviest edge.
pub(crate) fn balance_excess(graph: &Graph, options: &Options, w1: f64) -> f64 {
    let excess = (w1 / graph.total_vertex_weight() - options.target_split).abs()
        - options.soft_split_tolerance;
    graph.heuristic_scale() * excess.max(0.0)
}
