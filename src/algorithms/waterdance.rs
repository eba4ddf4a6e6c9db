//! The V-cycle driver: coarsen, seed, then alternate QP and FM refinement
//! while walking the level stack back to the input graph.

use rand::rngs::SmallRng;
use rand::SeedableRng;

use crate::algorithms::{coarsening, fm, guess, qp, Error};
use crate::graph::Graph;
use crate::imbalance::{compute_parts_load, imbalance};
use crate::options::Options;
use crate::partition::PartitionState;
use crate::EdgeCut;

/// Full pipeline behind `compute_edge_cut`.
pub(crate) fn compute(graph: &Graph, options: &Options) -> Result<EdgeCut, Error> {
    options.validate()?;
    let mut rng = SmallRng::seed_from_u64(options.random_seed);

    let levels = coarsening::coarsen(graph, options, &mut rng);
    let coarsest = levels.last().map_or(graph, |level| &level.graph);
    log::debug!(
        "coarsened {} vertices to {} across {} levels",
        graph.len(),
        coarsest.len(),
        levels.len()
    );

    // Seed the coarsest level and settle it with one FM run.
    let mut partition = guess::initial_guess(coarsest, options, &mut rng)?;
    if options.use_fm {
        let mut state = PartitionState::new(coarsest.len());
        state.reset_from_partition(coarsest, &partition, options);
        fm::refine(coarsest, options, &mut state)?;
        partition = state.partition;
    }

    if levels.is_empty() {
        run_dances(graph, options, &mut partition)?;
    } else {
        for level_index in (0..levels.len()).rev() {
            let finer = if level_index == 0 {
                graph
            } else {
                &levels[level_index - 1].graph
            };
            let matchmap = &levels[level_index].matching.matchmap;
            let mut projected = vec![0usize; finer.len()];
            for (v, slot) in projected.iter_mut().enumerate() {
                *slot = partition[matchmap[v]];
            }
            partition = projected;
            run_dances(finer, options, &mut partition)?;
        }
    }

    let cut_cost = graph.edge_cut(&partition);
    let cut_size = graph.cut_size(&partition);
    let [w0, w1] = compute_parts_load(graph, &partition);
    let imbalance = imbalance(graph, &partition);
    Ok(EdgeCut { partition, cut_cost, cut_size, w0, w1, imbalance })
}

/// Run `num_dances` rounds of QP-then-FM on one level, keeping the best
/// partition seen. A QP numeric failure abandons that pass (the level keeps
/// its best-known partition); anything else propagates.
fn run_dances(graph: &Graph, options: &Options, partition: &mut Vec<usize>) -> Result<(), Error> {
    let mut state = PartitionState::new(graph.len());
    state.reset_from_partition(graph, partition, options);
    let mut best_heu = state.heu_cost;
    let mut best = partition.clone();

    for dance in 0..options.num_dances {
        if options.use_qp_grad_proj {
            match qp::refine_partition(graph, options, partition) {
                Ok(()) => {}
                Err(Error::NumericFailure(why)) => {
                    log::warn!("qp refinement abandoned on this level: {why}");
                }
                Err(other) => return Err(other),
            }
        }
        if options.use_fm {
            state.reset_from_partition(graph, partition, options);
            fm::refine(graph, options, &mut state)?;
            partition.copy_from_slice(&state.partition);
        }
        state.reset_from_partition(graph, partition, options);
        log::debug!(
            "dance {dance} on {} vertices: heuristic cost {}",
            graph.len(),
            state.heu_cost
        );
        if state.heu_cost < best_heu {
            best_heu = state.heu_cost;
            best.copy_from_slice(partition);
        }
    }
    partition.copy_from_slice(&best);
    Ok(())
}
