//! # GraphSep
//!
//! A multilevel 2-way graph edge separator. Given an undirected weighted
//! graph in CSR form, GraphSep produces a two-sided vertex partition that
//! minimizes the total weight of cut edges subject to a balance constraint
//! on the side weights.
//!
//! The pipeline coarsens the graph by heavy-edge-family matching, seeds a
//! partition at the coarsest level, and then walks back up, at every level
//! alternating continuous quadratic-programming refinement (projected
//! gradient with a knapsack projection) with Fiduccia-Mattheyses boundary
//! refinement.
//!
//! ```
//! use GraphSep::graph::Graph;
//!
//! // Two triangles joined by a single bridge edge.
//! let graph = Graph::from_csr(
//!     6,
//!     vec![0, 2, 4, 7, 10, 12, 14],
//!     vec![1, 2, 0, 2, 0, 1, 3, 2, 4, 5, 3, 5, 3, 4],
//!     vec![1.0; 14],
//!     None,
//! )?;
//! let cut = GraphSep::compute_edge_cut(&graph)?;
//! assert_eq!(cut.cut_cost, 1.0);
//! assert_eq!(cut.cut_size, 1);
//! assert_eq!(cut.w0, 3.0);
//! # Ok::<(), GraphSep::Error>(())
//! ```

pub mod algorithms;
mod bheap;
pub mod gen_weights;
pub mod graph;
pub mod imbalance;
pub mod io;
pub mod options;
mod partition;

pub use algorithms::Error;
pub use graph::Graph;
pub use options::{GuessCutType, MatchingStrategy, Options};

/// The result of one partitioning run.
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeCut {
    /// Side (0 or 1) of each vertex.
    pub partition: Vec<usize>,
    /// Total weight of the edges crossing the cut.
    pub cut_cost: f64,
    /// Number of edges crossing the cut.
    pub cut_size: usize,
    /// Vertex weight on side 0.
    pub w0: f64,
    /// Vertex weight on side 1.
    pub w1: f64,
    /// `|0.5 - w0 / (w0 + w1)|`; zero means a perfect split.
    pub imbalance: f64,
}

/// Partition `graph` with the default [`Options`].
pub fn compute_edge_cut(graph: &Graph) -> Result<EdgeCut, Error> {
    compute_edge_cut_with_options(graph, &Options::default())
}

/// Partition `graph` with caller-chosen [`Options`]. Runs with identical
/// inputs and the same `random_seed` produce identical results.
pub fn compute_edge_cut_with_options(graph: &Graph, options: &Options) -> Result<EdgeCut, Error> {
    algorithms::waterdance::compute(graph, options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::graph_from_edges_weighted;

    #[test]
    fn test_weighted_vertices_balance_by_weight() {
        // A path whose heavy end must sit alone to balance the weights.
        let g = graph_from_edges_weighted(
            4,
            &[(0, 1, 1.0), (1, 2, 1.0), (2, 3, 1.0)],
            Some(vec![1.0, 1.0, 1.0, 3.0]),
        );
        let cut = compute_edge_cut(&g).unwrap();
        assert_eq!(cut.cut_cost, 1.0);
        assert_eq!(cut.w0 + cut.w1, 6.0);
        assert_eq!(cut.w0.min(cut.w1), 3.0);
    }

    #[test]
    fn test_heavy_edges_are_kept_out_of_the_cut() {
        // A 4-cycle with two heavy opposite edges: the cut must cross the
        // two light ones.
        let g = graph_from_edges_weighted(
            4,
            &[(0, 1, 10.0), (1, 2, 1.0), (2, 3, 10.0), (3, 0, 1.0)],
            None,
        );
        let cut = compute_edge_cut(&g).unwrap();
        assert_eq!(cut.cut_cost, 2.0);
        assert_eq!(cut.cut_size, 2);
        assert_eq!(cut.w0, 2.0);
    }

    #[test]
    fn test_custom_options_round_trip() {
        let g = graph_from_edges_weighted(
            4,
            &[(0, 1, 1.0), (1, 2, 1.0), (2, 3, 1.0)],
            None,
        );
        let options = Options {
            guess_cut_type: GuessCutType::NaturalOrder,
            matching_strategy: MatchingStrategy::HeavyEdge,
            num_dances: 2,
            ..Options::default()
        };
        let cut = compute_edge_cut_with_options(&g, &options).unwrap();
        assert_eq!(cut.cut_cost, 1.0);
        assert_eq!(cut.imbalance, 0.0);
    }
}
