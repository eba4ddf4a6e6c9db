//! Seeding the partition at the coarsest level.

use rand::rngs::SmallRng;
use rand::seq::SliceRandom;

use crate::algorithms::napsack::Workspace;
use crate::algorithms::{qp, Error};
use crate::graph::Graph;
use crate::options::{GuessCutType, Options};

/// Produce a starting partition for the coarsest graph. The caller settles
/// it with one FM pass afterwards.
pub(crate) fn initial_guess(
    graph: &Graph,
    options: &Options,
    rng: &mut SmallRng,
) -> Result<Vec<usize>, Error> {
    let n = graph.len();
    match options.guess_cut_type {
        GuessCutType::NaturalOrder => {
            let order: Vec<usize> = (0..n).collect();
            Ok(prefix_fill(graph, options, &order))
        }
        GuessCutType::Random => {
            let mut order: Vec<usize> = (0..n).collect();
            order.shuffle(rng);
            Ok(prefix_fill(graph, options, &order))
        }
        GuessCutType::GradProj => {
            let mut x = vec![options.target_split; n];
            let mut free_status = vec![0i8; n];
            let mut ws = Workspace::new(n)?;
            qp::grad_proj(graph, options, &mut x, &mut free_status, &mut ws)?;
            Ok(qp::round_partition(graph, options, &x))
        }
    }
}

/// Walk `order`, assigning to side 0 until the cumulative weight reaches the
/// target share, then to side 1.
fn prefix_fill(graph: &Graph, options: &Options, order: &[usize]) -> Vec<usize> {
    let target = options.target_split * graph.total_vertex_weight();
    let mut partition = vec![0; graph.len()];
    let mut cumulative = 0.0;
    for &v in order {
        if cumulative < target {
            partition[v] = 0;
            cumulative += graph.vertex_weights()[v];
        } else {
            partition[v] = 1;
        }
    }
    partition
}
