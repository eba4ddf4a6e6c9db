//! Continuous refinement by projected gradient.
//!
//! The discrete cut is relaxed to `min f(x) = x'(D - A)x` over
//! `0 <= x <= 1` with the side-1 weight `w'x` confined to the window
//! `[lo, hi]` around the target split. `D - A` is the weighted graph
//! Laplacian, so `f` restricted to 0/1 vectors is exactly the cut cost.
//! Each iteration projects a full gradient step onto the feasible set with
//! the knapsack projection, then minimizes `f` exactly along the segment to
//! the projection; both endpoints are feasible, so every iterate stays
//! feasible and the objective never increases.

use crate::algorithms::napsack::{self, Workspace};
use crate::algorithms::Error;
use crate::graph::Graph;
use crate::imbalance::{balance_penalty, compute_parts_load};
use crate::options::Options;

/// Minimize the relaxed objective in place. `x` must lie in the unit box;
/// `free_status` (+1 at 1, -1 at 0, 0 free) is kept in sync and also seeds
/// the knapsack multiplier between iterations.
pub(crate) fn grad_proj(
    graph: &Graph,
    options: &Options,
    x: &mut [f64],
    free_status: &mut [i8],
    ws: &mut Workspace,
) -> Result<(), Error> {
    let n = graph.len();
    let weights = graph.vertex_weights();
    let total = graph.total_vertex_weight();
    let lo = options.weight_lo(total);
    let hi = options.weight_hi(total);

    // Move the start into the feasible set before iterating.
    let mut lambda = napsack::napsack(x, lo, hi, weights, 0.0, Some(free_status), ws)?;
    update_free_status(x, free_status);
    let mut fx = objective(graph, x);

    let mut gradient = vec![0.0; n];
    let mut target = vec![0.0; n];

    for iteration in 0..options.grad_proj_iteration_limit {
        for v in 0..n {
            let mut ax = 0.0;
            let mut row_sum = 0.0;
            for (u, edge) in graph.neighbors(v) {
                ax += edge * x[u];
                row_sum += edge;
            }
            gradient[v] = 2.0 * (row_sum * x[v] - ax);
        }

        for v in 0..n {
            target[v] = x[v] - gradient[v];
        }
        lambda = napsack::napsack(&mut target, lo, hi, weights, lambda, Some(free_status), ws)?;

        // Search direction toward the projected point.
        let mut descent = 0.0;
        for v in 0..n {
            descent += gradient[v] * (target[v] - x[v]);
        }
        if descent >= 0.0 {
            log::trace!("gradient projection stationary after {iteration} iterations");
            break;
        }

        // Exact minimizer of the quadratic along the segment, clipped to it.
        let curvature = direction_curvature(graph, x, &target);
        let alpha = if curvature > 0.0 {
            (-descent / (2.0 * curvature)).min(1.0)
        } else {
            1.0
        };
        for v in 0..n {
            x[v] += alpha * (target[v] - x[v]);
        }
        update_free_status(x, free_status);

        let f_next = objective(graph, x);
        if f_next > fx + 1e-12 * (1.0 + fx.abs()) {
            return Err(Error::NumericFailure("line search failed to descend"));
        }
        let decrease = fx - f_next;
        fx = f_next;
        log::trace!("gradient projection iteration {iteration}: f = {fx}");
        if fx == 0.0 || decrease <= options.grad_proj_tolerance * fx.abs() {
            break;
        }
    }
    Ok(())
}

/// One full continuous pass over an existing partition: relax, minimize,
/// round back. `partition` is rewritten only on success.
pub(crate) fn refine_partition(
    graph: &Graph,
    options: &Options,
    partition: &mut [usize],
) -> Result<(), Error> {
    let n = graph.len();
    let mut x: Vec<f64> = partition.iter().map(|&side| side as f64).collect();
    let mut free_status: Vec<i8> = vec![0; n];
    update_free_status(&x, &mut free_status);
    let mut ws = Workspace::new(n)?;
    grad_proj(graph, options, &mut x, &mut free_status, &mut ws)?;
    let rounded = round_partition(graph, options, &x);

    // Rounding can undo what the continuous descent gained; keep the better
    // of the two discrete partitions.
    let before = graph.edge_cut(partition) + balance_penalty(graph, options, partition);
    let after = graph.edge_cut(&rounded) + balance_penalty(graph, options, &rounded);
    if after < before {
        partition.copy_from_slice(&rounded);
    }
    Ok(())
}

/// Threshold the relaxed solution at one half (ties to side 0), then sweep
/// the least-committed vertices across until the side-1 weight returns to
/// the admissible window.
pub(crate) fn round_partition(graph: &Graph, options: &Options, x: &[f64]) -> Vec<usize> {
    let n = graph.len();
    let weights = graph.vertex_weights();
    let total = graph.total_vertex_weight();
    let lo = options.weight_lo(total);
    let hi = options.weight_hi(total);

    let mut partition: Vec<usize> = x.iter().map(|&xi| usize::from(xi > 0.5)).collect();
    let mut w1 = compute_parts_load(graph, &partition)[1];

    if w1 > hi {
        let mut candidates: Vec<usize> = (0..n).filter(|&v| partition[v] == 1).collect();
        candidates.sort_unstable_by(|&a, &b| x[a].total_cmp(&x[b]).then(a.cmp(&b)));
        for v in candidates {
            if w1 <= hi {
                break;
            }
            partition[v] = 0;
            w1 -= weights[v];
        }
    } else if w1 < lo {
        let mut candidates: Vec<usize> = (0..n).filter(|&v| partition[v] == 0).collect();
        candidates.sort_unstable_by(|&a, &b| x[b].total_cmp(&x[a]).then(a.cmp(&b)));
        for v in candidates {
            if w1 >= lo {
                break;
            }
            partition[v] = 1;
            w1 += weights[v];
        }
    }
    partition
}

/// `f(x) = x'(D - A)x`, summed over edges in fixed order.
fn objective(graph: &Graph, x: &[f64]) -> f64 {
    let mut f = 0.0;
    for v in 0..graph.len() {
        for (u, edge) in graph.neighbors(v) {
            if u < v {
                let d = x[v] - x[u];
                f += edge * d * d;
            }
        }
    }
    f
}

/// `d'(D - A)d` for the direction `d = target - x`.
fn direction_curvature(graph: &Graph, x: &[f64], target: &[f64]) -> f64 {
    let mut q = 0.0;
    for v in 0..graph.len() {
        for (u, edge) in graph.neighbors(v) {
            if u < v {
                let d = (target[v] - x[v]) - (target[u] - x[u]);
                q += edge * d * d;
            }
        }
    }
    q
}

fn update_free_status(x: &[f64], free_status: &mut [i8]) {
    for (status, &xi) in free_status.iter_mut().zip(x) {
        *status = if xi <= 0.0 {
            -1
        } else if xi >= 1.0 {
            1
        } else {
            0
        };
    }
}
