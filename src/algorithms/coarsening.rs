//! Coarsening driver: repeat matching until the graph is small enough.

use rand::rngs::SmallRng;

use crate::algorithms::matching::{match_and_coarsen, Matching};
use crate::graph::Graph;
use crate::options::Options;

/// Hard ceiling on coarsening depth; each level at least shaves a tenth of
/// the vertices, so this is never the binding limit in practice.
const MAX_LEVELS: usize = 64;

/// A level that fails to shrink below this fraction of its parent is
/// discarded and coarsening stops.
const MIN_SHRINK: f64 = 0.9;

/// One coarsening level: the contracted graph together with the matching
/// that maps the finer graph onto it.
pub(crate) struct Level {
    pub graph: Graph,
    pub matching: Matching,
}

/// Build the coarse-graph stack, finest first. The returned vector is empty
/// when the input is already at or below the coarsening floor.
pub(crate) fn coarsen(root: &Graph, options: &Options, rng: &mut SmallRng) -> Vec<Level> {
    let mut levels: Vec<Level> = Vec::new();
    loop {
        let produced = {
            let current = levels.last().map_or(root, |level| &level.graph);
            if current.len() <= options.coarsen_limit || levels.len() >= MAX_LEVELS {
                break;
            }
            let fine_n = current.len();
            let (matching, coarse) = match_and_coarsen(current, options, rng);
            (fine_n, matching, coarse)
        };
        let (fine_n, matching, coarse) = produced;
        if (coarse.len() as f64) >= MIN_SHRINK * fine_n as f64 {
            log::debug!("coarsening stalled at {fine_n} vertices, keeping the stack as is");
            break;
        }
        log::debug!(
            "coarsening level {}: {} -> {} vertices",
            levels.len() + 1,
            fine_n,
            coarse.len()
        );
        levels.push(Level { graph: coarse, matching });
    }
    levels
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::graph_from_edges;
    use rand::SeedableRng;

    fn cycle(n: usize) -> Graph {
        let edges: Vec<(usize, usize, f64)> =
            (0..n).map(|v| (v, (v + 1) % n, 1.0)).collect();
        graph_from_edges(n, &edges)
    }

    #[test]
    fn test_small_graph_is_left_alone() {
        let g = cycle(10);
        let options = Options::default();
        let mut rng = SmallRng::seed_from_u64(0);
        assert!(coarsen(&g, &options, &mut rng).is_empty());
    }

    #[test]
    fn test_stack_reaches_the_floor() {
        let g = cycle(200);
        let options = Options { coarsen_limit: 16, ..Options::default() };
        let mut rng = SmallRng::seed_from_u64(0);
        let levels = coarsen(&g, &options, &mut rng);
        assert!(!levels.is_empty());
        let coarsest = &levels.last().unwrap().graph;
        // Either the floor was reached or the last level stalled above it.
        assert!(coarsest.len() < 200);
        // Vertex weight is conserved at every level.
        for level in &levels {
            assert!((level.graph.total_vertex_weight() - 200.0).abs() < 1e-9);
        }
        // Strictly shrinking stack.
        let mut previous = 200;
        for level in &levels {
            assert!(level.graph.len() < previous);
            previous = level.graph.len();
        }
    }

    #[test]
    fn test_matchings_compose_to_the_root() {
        let g = cycle(100);
        let options = Options { coarsen_limit: 8, ..Options::default() };
        let mut rng = SmallRng::seed_from_u64(5);
        let levels = coarsen(&g, &options, &mut rng);
        // Push every root vertex through the chain of matchmaps; each must
        // land on a valid coarsest vertex.
        let coarsest_n = levels.last().unwrap().graph.len();
        for v in 0..100 {
            let mut c = v;
            for level in &levels {
                c = level.matching.matchmap[c];
            }
            assert!(c < coarsest_n);
        }
    }
}
