//! Fiduccia-Mattheyses boundary refinement.
//!
//! Each pass walks the gain heaps, flipping one vertex at a time under a
//! balance-aware score, locking it for the rest of the pass. Moves are
//! logged so the pass can roll back to the best heuristic cost it saw;
//! a bounded run of non-improving moves is tolerated as lookahead before
//! the pass gives up. Across passes the heuristic cost never rises.

use crate::algorithms::Error;
use crate::graph::Graph;
use crate::options::Options;
use crate::partition::{heuristic_cost, PartitionState};

/// Run up to `fm_max_num_refinements` passes over `state`. The state must
/// enter consistent (fresh heaps, no locks); on an invariant violation the
/// partition is left untouched and the error is surfaced.
pub(crate) fn refine(
    graph: &Graph,
    options: &Options,
    state: &mut PartitionState,
) -> Result<(), Error> {
    state.validate(graph, options)?;

    let n = graph.len();
    let mut locked = vec![false; n];
    let mut move_log: Vec<usize> = Vec::with_capacity(n);

    for pass in 0..options.fm_max_num_refinements {
        let entry_heu = state.heu_cost;
        let mut best_heu = entry_heu;
        let mut best_len = 0usize;
        let mut non_improving = 0usize;
        locked.iter_mut().for_each(|flag| *flag = false);
        move_log.clear();

        for _ in 0..n {
            let Some(v) = select_move(graph, options, state) else {
                break;
            };
            let side = state.partition[v];
            state.heap.remove(side, v, &state.gains);
            locked[v] = true;
            state.apply_move(graph, options, v, &locked);
            move_log.push(v);

            if state.heu_cost < best_heu {
                best_heu = state.heu_cost;
                best_len = move_log.len();
                non_improving = 0;
            } else {
                non_improving += 1;
                if non_improving > options.fm_search_depth {
                    break;
                }
            }
        }

        // Undo the tail of the log beyond the best point.
        for &v in move_log[best_len..].iter().rev() {
            state.apply_move_raw(graph, options, v);
        }
        // Recompute from the surviving partition: this clears accumulated
        // float drift and restores the heap membership invariant.
        let partition = state.partition.clone();
        state.reset_from_partition(graph, &partition, options);

        log::trace!(
            "fm pass {pass}: heuristic cost {entry_heu} -> {} ({} of {} moves kept)",
            state.heu_cost,
            best_len,
            move_log.len()
        );
        if state.heu_cost >= entry_heu {
            break;
        }
    }
    Ok(())
}

/// Pick the next vertex to flip: among the top `fm_consider_count` entries
/// of both heaps, take the move with the lowest resulting heuristic cost if
/// any strictly improves it; otherwise fall back to the highest-gain entry,
/// preferring the heavier side, then lower vertex id.
fn select_move(graph: &Graph, options: &Options, state: &PartitionState) -> Option<usize> {
    let heavier = usize::from(state.part_weights[1] > state.part_weights[0]);
    let mut best_improving: Option<(f64, usize)> = None;
    let mut fallback: Option<(bool, f64, usize)> = None;

    for side in 0..2 {
        for v in state.heap.top_k(side, options.fm_consider_count, &state.gains) {
            let weight = graph.vertex_weights()[v];
            let w1_after = if side == 1 {
                state.part_weights[1] - weight
            } else {
                state.part_weights[1] + weight
            };
            let cut_after = state.cut_cost - state.gains[v];
            let heu_after = heuristic_cost(graph, options, cut_after, w1_after);

            if heu_after < state.heu_cost {
                let better = match best_improving {
                    None => true,
                    Some((best, best_v)) => {
                        heu_after < best || (heu_after == best && v < best_v)
                    }
                };
                if better {
                    best_improving = Some((heu_after, v));
                }
            }

            let on_heavier = side == heavier;
            let better_fallback = match fallback {
                None => true,
                Some((fb_heavier, fb_gain, fb_v)) => {
                    (on_heavier, state.gains[v], std::cmp::Reverse(v))
                        > (fb_heavier, fb_gain, std::cmp::Reverse(fb_v))
                }
            };
            if better_fallback {
                fallback = Some((on_heavier, state.gains[v], v));
            }
        }
    }

    best_improving
        .map(|(_, v)| v)
        .or(fallback.map(|(_, _, v)| v))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::graph_from_edges;

    fn refined(graph: &Graph, options: &Options, partition: &[usize]) -> PartitionState {
        let mut state = PartitionState::new(graph.len());
        state.reset_from_partition(graph, partition, options);
        refine(graph, options, &mut state).unwrap();
        state
    }

    #[test]
    fn test_untangles_alternating_path() {
        let g = graph_from_edges(4, &[(0, 1, 1.0), (1, 2, 1.0), (2, 3, 1.0)]);
        let options = Options::default();
        let state = refined(&g, &options, &[0, 1, 0, 1]);
        assert_eq!(state.cut_cost, 1.0);
        assert_eq!(state.part_weights[0], 2.0);
        assert!(state.validate(&g, &options).is_ok());
    }

    #[test]
    fn test_never_raises_the_heuristic_cost() {
        let g = graph_from_edges(
            6,
            &[
                (0, 1, 1.0),
                (0, 2, 1.0),
                (1, 2, 1.0),
                (3, 4, 1.0),
                (3, 5, 1.0),
                (4, 5, 1.0),
                (2, 3, 1.0),
            ],
        );
        let options = Options::default();
        // Several bad starting partitions; FM must end at or below each
        // entry cost.
        for start in [
            vec![0, 1, 0, 1, 0, 1],
            vec![1, 1, 0, 0, 1, 1],
            vec![0, 0, 0, 0, 0, 1],
        ] {
            let mut state = PartitionState::new(6);
            state.reset_from_partition(&g, &start, &options);
            let entry = state.heu_cost;
            refine(&g, &options, &mut state).unwrap();
            assert!(state.heu_cost <= entry);
            assert!(state.validate(&g, &options).is_ok());
        }
    }

    #[test]
    fn test_finds_the_bridge_between_triangles() {
        let g = graph_from_edges(
            6,
            &[
                (0, 1, 1.0),
                (0, 2, 1.0),
                (1, 2, 1.0),
                (3, 4, 1.0),
                (3, 5, 1.0),
                (4, 5, 1.0),
                (2, 3, 1.0),
            ],
        );
        let options = Options::default();
        let state = refined(&g, &options, &[0, 1, 0, 1, 0, 1]);
        assert_eq!(state.cut_cost, 1.0);
        assert_eq!(state.part_weights[0], 3.0);
    }

    #[test]
    fn test_already_optimal_partition_is_kept() {
        let g = graph_from_edges(4, &[(0, 1, 1.0), (1, 2, 1.0), (2, 3, 1.0)]);
        let options = Options::default();
        let state = refined(&g, &options, &[0, 0, 1, 1]);
        assert_eq!(state.partition, vec![0, 0, 1, 1]);
        assert_eq!(state.cut_cost, 1.0);
    }

    #[test]
    fn test_corrupted_state_is_rejected_untouched() {
        let g = graph_from_edges(4, &[(0, 1, 1.0), (1, 2, 1.0), (2, 3, 1.0)]);
        let options = Options::default();
        let mut state = PartitionState::new(4);
        state.reset_from_partition(&g, &[0, 1, 0, 1], &options);
        state.gains[2] += 5.0;
        let before = state.partition.clone();
        assert!(matches!(
            refine(&g, &options, &mut state),
            Err(Error::InternalInvariantBroken(_))
        ));
        assert_eq!(state.partition, before);
    }

    #[test]
    fn test_balance_penalty_blocks_degenerate_drains() {
        // A star tempts FM to move the center back and forth; the balance
        // term must keep the sides within one leaf of even.
        let g = graph_from_edges(
            6,
            &[(0, 1, 1.0), (0, 2, 1.0), (0, 3, 1.0), (0, 4, 1.0), (0, 5, 1.0)],
        );
        let options = Options::default();
        let state = refined(&g, &options, &[1, 0, 0, 1, 1, 0]);
        assert!((state.part_weights[0] - state.part_weights[1]).abs() <= 1.0 + 1e-9);
        assert!(state.validate(&g, &options).is_ok());
    }
}
