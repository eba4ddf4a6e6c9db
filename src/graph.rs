// This file has code from https://github.com/LIHPC-Computational-Geometry/coupe

use std::collections::VecDeque;
use std::iter::{Cloned, Zip};
use std::slice::Iter;

use itertools::Itertools;
use rayon::iter::{IntoParallelIterator, ParallelIterator};
use sprs::CsMat;

use crate::algorithms::Error;

/// An undirected weighted graph held as a symmetric CSR matrix, together
/// with per-vertex weights and the derived totals the refinement engines
/// read on every pass.
///
/// Every edge `(u, v)` is stored twice, once in each row, with equal weight.
/// The structure is validated once at construction; afterwards the
/// partitioner trusts it.
pub struct Graph {
    /// Adjacency in CSR form: no diagonal, rows sorted, symmetric.
    adjacency: CsMat<f64>,
    /// Positive vertex weights, one per vertex.
    vertex_weights: Vec<f64>,
    /// Sum of edge weights, each undirected edge counted once.
    total_edge_weight: f64,
    /// Sum of vertex weights.
    total_vertex_weight: f64,
    /// Scale of the balance penalty folded into the heuristic cost.
    heuristic_scale: f64,
}

impl Graph {
    /// Build and validate a graph from caller-provided CSR arrays.
    ///
    /// `indptr` must have `n + 1` monotone entries starting at 0; `indices`
    /// and `data` hold the neighbor lists and positive edge weights; `(u, v)`
    /// must appear iff `(v, u)` does, with equal weight. Rows need not be
    /// sorted on input. `vertex_weights` defaults to all ones.
    pub fn from_csr(
        n: usize,
        indptr: Vec<usize>,
        mut indices: Vec<usize>,
        mut data: Vec<f64>,
        vertex_weights: Option<Vec<f64>>,
    ) -> Result<Self, Error> {
        if n == 0 {
            return Err(Error::InvalidInput("graph has no vertices"));
        }
        if indptr.len() != n + 1 || indptr[0] != 0 {
            return Err(Error::InvalidInput("column pointers are malformed"));
        }
        if !indptr.iter().tuple_windows().all(|(a, b)| a <= b) {
            return Err(Error::InvalidInput("column pointers are not monotone"));
        }
        if indptr[n] != indices.len() || indices.len() != data.len() {
            return Err(Error::InvalidInput("pointer total disagrees with entry count"));
        }
        let weights = match vertex_weights {
            Some(w) => {
                if w.len() != n {
                    return Err(Error::InvalidInput("vertex weight vector has wrong length"));
                }
                w
            }
            None => vec![1.0; n],
        };
        if weights.iter().any(|&w| !w.is_finite() || w <= 0.0) {
            return Err(Error::InvalidInput("vertex weights must be positive"));
        }
        if data.iter().any(|&x| !x.is_finite() || x <= 0.0) {
            return Err(Error::InvalidInput("edge weights must be positive"));
        }

        // Per-row checks, then sort each row so the matrix is in canonical
        // CSR form before handing it to sprs.
        for v in 0..n {
            let (start, end) = (indptr[v], indptr[v + 1]);
            if indices[start..end].iter().any(|&u| u >= n) {
                return Err(Error::InvalidInput("neighbor index out of range"));
            }
            if indices[start..end].contains(&v) {
                return Err(Error::InvalidInput("graph contains a self-loop"));
            }
            let mut row: Vec<(usize, f64)> = indices[start..end]
                .iter()
                .copied()
                .zip(data[start..end].iter().copied())
                .collect();
            row.sort_unstable_by(|a, b| a.0.cmp(&b.0));
            if row.iter().tuple_windows().any(|(a, b)| a.0 == b.0) {
                return Err(Error::InvalidInput("duplicate edge in a neighbor list"));
            }
            for (k, (u, x)) in row.into_iter().enumerate() {
                indices[start + k] = u;
                data[start + k] = x;
            }
        }

        let adjacency = CsMat::new((n, n), indptr, indices, data);

        // Symmetry: every stored entry must have an equal-weight transpose.
        // The check is a pure all-reduction, so the parallel schedule cannot
        // change the outcome.
        let symmetric = (0..n).into_par_iter().all(|v| {
            let Some(row) = adjacency.outer_view(v) else {
                return true;
            };
            let (neighbors, edge_weights) = row.into_raw_storage();
            neighbors
                .iter()
                .zip(edge_weights)
                .all(|(&u, &x)| match adjacency.get(u, v) {
                    Some(&back) => (x - back).abs() <= 1e-12 * x.abs().max(back.abs()),
                    None => false,
                })
        });
        if !symmetric {
            return Err(Error::InvalidInput("adjacency is not symmetric"));
        }

        if !connected(&adjacency) {
            return Err(Error::InvalidInput("graph has more than one connected component"));
        }

        Ok(Self::from_parts_unchecked(adjacency, weights))
    }

    /// Build a graph from an sprs matrix already in CSR layout.
    pub fn from_csmat(
        adjacency: CsMat<f64>,
        vertex_weights: Option<Vec<f64>>,
    ) -> Result<Self, Error> {
        if adjacency.rows() != adjacency.cols() {
            return Err(Error::InvalidInput("adjacency matrix is not square"));
        }
        let n = adjacency.rows();
        let indptr = adjacency.indptr().into_raw_storage().to_vec();
        let indices = adjacency.indices().to_vec();
        let data = adjacency.data().to_vec();
        Self::from_csr(n, indptr, indices, data, vertex_weights)
    }

    /// Assemble a graph whose structure is known valid (used for the coarse
    /// graphs built by the matching engine) and cache the derived totals.
    pub(crate) fn from_parts_unchecked(adjacency: CsMat<f64>, vertex_weights: Vec<f64>) -> Self {
        let total_edge_weight = adjacency.data().iter().sum::<f64>() / 2.0;
        let total_vertex_weight = vertex_weights.iter().sum::<f64>();
        let max_edge_weight = adjacency.data().iter().fold(0.0f64, |m, &x| m.max(x));
        Graph {
            adjacency,
            vertex_weights,
            total_edge_weight,
            total_vertex_weight,
            heuristic_scale: total_vertex_weight * max_edge_weight,
        }
    }

    /// The number of vertices in the graph.
    pub fn len(&self) -> usize {
        self.adjacency.rows()
    }

    /// Whether the graph has no vertices.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The number of stored adjacency entries (twice the edge count).
    pub fn stored_entries(&self) -> usize {
        self.adjacency.nnz()
    }

    /// An iterator over the neighbors of the given vertex with edge weights.
    pub fn neighbors(&self, vertex: usize) -> Zip<Cloned<Iter<'_, usize>>, Cloned<Iter<'_, f64>>> {
        let (indices, data) = self.adjacency.outer_view(vertex).unwrap().into_raw_storage();
        indices.iter().cloned().zip(data.iter().cloned())
    }

    /// The number of edges incident to the given vertex.
    pub fn degree(&self, vertex: usize) -> usize {
        let indptr = self.adjacency.indptr().into_raw_storage();
        indptr[vertex + 1] - indptr[vertex]
    }

    /// Positive per-vertex weights.
    pub fn vertex_weights(&self) -> &[f64] {
        &self.vertex_weights
    }

    /// Sum of all vertex weights.
    pub fn total_vertex_weight(&self) -> f64 {
        self.total_vertex_weight
    }

    /// Sum of all edge weights, each undirected edge counted once.
    pub fn total_edge_weight(&self) -> f64 {
        self.total_edge_weight
    }

    /// Scale applied to the balance penalty in the heuristic cost.
    pub(crate) fn heuristic_scale(&self) -> f64 {
        self.heuristic_scale
    }

    /// The edge cut of a partition: total weight of the edges whose
    /// endpoints lie on different sides. Summed in fixed vertex order so
    /// repeated runs agree bitwise.
    pub fn edge_cut(&self, partition: &[usize]) -> f64 {
        debug_assert_eq!(self.len(), partition.len());
        let mut cut = 0.0;
        for v in 0..self.len() {
            for (u, x) in self.neighbors(v) {
                if u < v && partition[u] != partition[v] {
                    cut += x;
                }
            }
        }
        cut
    }

    /// The number of edges crossing the cut.
    pub fn cut_size(&self, partition: &[usize]) -> usize {
        debug_assert_eq!(self.len(), partition.len());
        let mut count = 0;
        for v in 0..self.len() {
            for (u, _) in self.neighbors(v) {
                if u < v && partition[u] != partition[v] {
                    count += 1;
                }
            }
        }
        count
    }
}

/// Breadth-first reachability from vertex 0.
fn connected(adjacency: &CsMat<f64>) -> bool {
    let n = adjacency.rows();
    let mut seen = vec![false; n];
    let mut queue = VecDeque::new();
    seen[0] = true;
    queue.push_back(0usize);
    let mut visited = 1;
    while let Some(v) = queue.pop_front() {
        if let Some(row) = adjacency.outer_view(v) {
            for &u in row.into_raw_storage().0 {
                if !seen[u] {
                    seen[u] = true;
                    visited += 1;
                    queue.push_back(u);
                }
            }
        }
    }
    visited == n
}

/// Build a graph from an undirected edge list; test helper shared by the
/// algorithm modules.
#[cfg(test)]
pub(crate) fn graph_from_edges(n: usize, edges: &[(usize, usize, f64)]) -> Graph {
    graph_from_edges_weighted(n, edges, None)
}

#[cfg(test)]
pub(crate) fn graph_from_edges_weighted(
    n: usize,
    edges: &[(usize, usize, f64)],
    vertex_weights: Option<Vec<f64>>,
) -> Graph {
    let mut rows: Vec<Vec<(usize, f64)>> = vec![Vec::new(); n];
    for &(u, v, x) in edges {
        rows[u].push((v, x));
        rows[v].push((u, x));
    }
    let mut indptr = Vec::with_capacity(n + 1);
    let mut indices = Vec::new();
    let mut data = Vec::new();
    indptr.push(0);
    for row in rows {
        for (u, x) in row {
            indices.push(u);
            data.push(x);
        }
        indptr.push(indices.len());
    }
    Graph::from_csr(n, indptr, indices, data, vertex_weights).expect("test graph must be valid")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_graph_metrics() {
        // 0 - 1 - 2 - 3
        let g = graph_from_edges(4, &[(0, 1, 1.0), (1, 2, 1.0), (2, 3, 1.0)]);
        assert_eq!(g.len(), 4);
        assert_eq!(g.stored_entries(), 6);
        assert_eq!(g.total_edge_weight(), 3.0);
        assert_eq!(g.total_vertex_weight(), 4.0);
        assert_eq!(g.degree(1), 2);

        let partition = [0, 0, 1, 1];
        assert_eq!(g.edge_cut(&partition), 1.0);
        assert_eq!(g.cut_size(&partition), 1);
    }

    #[test]
    fn test_neighbors_are_sorted_after_construction() {
        // Rows handed over unsorted.
        let indptr = vec![0, 2, 4, 6];
        let indices = vec![2, 1, 0, 2, 1, 0];
        let data = vec![3.0, 1.0, 1.0, 2.0, 2.0, 3.0];
        let g = Graph::from_csr(3, indptr, indices, data, None).unwrap();
        let row: Vec<_> = g.neighbors(0).collect();
        assert_eq!(row, vec![(1, 1.0), (2, 3.0)]);
    }

    #[test]
    fn test_rejects_empty_graph() {
        assert!(matches!(
            Graph::from_csr(0, vec![0], vec![], vec![], None),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_rejects_self_loop() {
        let indptr = vec![0, 2, 3, 4];
        let indices = vec![0, 1, 0, 0];
        let data = vec![1.0, 1.0, 1.0, 1.0];
        assert!(Graph::from_csr(3, indptr, indices, data, None).is_err());
    }

    #[test]
    fn test_rejects_asymmetric_weights() {
        let indptr = vec![0, 1, 2];
        let indices = vec![1, 0];
        let data = vec![1.0, 2.0];
        assert!(Graph::from_csr(2, indptr, indices, data, None).is_err());
    }

    #[test]
    fn test_rejects_missing_transpose_entry() {
        let indptr = vec![0, 2, 3, 3];
        let indices = vec![1, 2, 0];
        let data = vec![1.0, 1.0, 1.0];
        assert!(Graph::from_csr(3, indptr, indices, data, None).is_err());
    }

    #[test]
    fn test_rejects_disconnected_graph() {
        // Two separate edges: 0-1 and 2-3.
        let indptr = vec![0, 1, 2, 3, 4];
        let indices = vec![1, 0, 3, 2];
        let data = vec![1.0, 1.0, 1.0, 1.0];
        assert!(matches!(
            Graph::from_csr(4, indptr, indices, data, None),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_rejects_non_positive_weights() {
        let indptr = vec![0, 1, 2];
        let indices = vec![1, 0];
        assert!(Graph::from_csr(2, indptr.clone(), indices.clone(), vec![0.0, 0.0], None).is_err());
        assert!(Graph::from_csr(
            2,
            indptr,
            indices,
            vec![1.0, 1.0],
            Some(vec![1.0, -1.0])
        )
        .is_err());
    }

    #[test]
    fn test_single_vertex_is_connected() {
        let g = Graph::from_csr(1, vec![0, 0], vec![], vec![], None).unwrap();
        assert_eq!(g.len(), 1);
        assert_eq!(g.total_edge_weight(), 0.0);
    }

    #[test]
    fn test_heuristic_scale_tracks_totals() {
        let g = graph_from_edges_weighted(
            3,
            &[(0, 1, 2.0), (1, 2, 5.0), (0, 2, 1.0)],
            Some(vec![1.0, 2.0, 3.0]),
        );
        // W = 6, max edge weight = 5.
        assert_eq!(g.heuristic_scale(), 30.0);
    }
}
