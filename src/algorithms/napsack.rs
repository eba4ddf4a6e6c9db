//! Projection onto the intersection of the unit box and a weight slab.
//!
//! Given `y`, strictly positive weights `a`, and bounds `lo <= hi`, find the
//! `x` minimizing `||x - y||` subject to `0 <= x <= 1` and `lo <= a'x <= hi`.
//! Introducing a multiplier `lambda` for the slab gives a concave,
//! piecewise-linear dual whose maximizer `mu` yields the primal solution
//! `x = clip(y - mu * a)`. The dual slope at `lambda` is
//! `a' clip(y - lambda * a)` measured against `hi` (for `lambda > 0`) or `lo`
//! (for `lambda < 0`), and `lambda = 0` is optimal exactly when
//! `lo <= a' clip(y) <= hi`.
//!
//! Starting from a caller-provided guess, the solver dispatches on the signs
//! of the guess and of the initial slope, then walks the dual's break points
//! monotonically (`napup` with rising `lambda`, `napdown` with falling) until
//! the slope crosses its target. Each variable contributes at most two break
//! points, `(y_k - 1) / a_k` and `y_k / a_k`, held in a heap; the walk costs
//! O(n + h log n) where `h` counts boundary/free status changes.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

use crate::algorithms::Error;

/// Feasibility slack tolerated by the final projection check.
const CHECK_EPS: f64 = 1e-3;

/// Clamp to the unit interval.
pub(crate) fn clip(z: f64) -> f64 {
    if z < 0.0 {
        0.0
    } else if z > 1.0 {
        1.0
    } else {
        z
    }
}

/// The dual multiplier at which one variable crosses a bound of the unit box.
#[derive(Clone, Copy, Debug)]
struct BreakPoint {
    lambda: f64,
    vertex: usize,
    /// Whether the variable becomes free when the walk passes this point
    /// (otherwise it lands on a bound and leaves the free set).
    enters_free: bool,
}

impl PartialEq for BreakPoint {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for BreakPoint {}

impl PartialOrd for BreakPoint {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for BreakPoint {
    fn cmp(&self, other: &Self) -> Ordering {
        self.lambda
            .total_cmp(&other.lambda)
            .then_with(|| self.vertex.cmp(&other.vertex))
            .then_with(|| self.enters_free.cmp(&other.enters_free))
    }
}

/// Break-point buffers reused across the projections of one refinement call.
pub(crate) struct Workspace {
    rising: Vec<Reverse<BreakPoint>>,
    falling: Vec<BreakPoint>,
}

impl Workspace {
    /// Reserve for the worst case of two break points per variable up front,
    /// so the projection itself never reallocates.
    pub fn new(n: usize) -> Result<Self, Error> {
        let mut rising = Vec::new();
        rising
            .try_reserve_exact(2 * n + 2)
            .map_err(|_| Error::OutOfMemory)?;
        let mut falling = Vec::new();
        falling
            .try_reserve_exact(2 * n + 2)
            .map_err(|_| Error::OutOfMemory)?;
        Ok(Workspace { rising, falling })
    }
}

/// Project `x` (holding `y` on input) onto
/// `{x : 0 <= x <= 1, lo <= a'x <= hi}` and return the final multiplier.
///
/// `lambda_guess` seeds the dual search; when `free_status` is given
/// (+1 at 1, -1 at 0, 0 free) and the guess is nonzero, a better start is
/// estimated by zeroing the dual slope over the estimated free set.
pub(crate) fn napsack(
    x: &mut [f64],
    lo: f64,
    hi: f64,
    a: &[f64],
    lambda_guess: f64,
    free_status: Option<&[i8]>,
    ws: &mut Workspace,
) -> Result<f64, Error> {
    debug_assert!(lo <= hi);
    debug_assert_eq!(x.len(), a.len());
    let mut lambda = lambda_guess;

    if let Some(status) = free_status {
        if lambda != 0.0 {
            let mut asum = if lambda > 0.0 { -hi } else { -lo };
            let mut a2sum = 0.0;
            for (k, &s) in status.iter().enumerate() {
                if s == 1 {
                    asum += a[k];
                } else if s == 0 {
                    asum += x[k] * a[k];
                    a2sum += a[k] * a[k];
                }
            }
            if a2sum != 0.0 {
                lambda = asum / a2sum;
            }
        }
    }

    let slope = slope_at(x, a, lambda);

    if lambda >= 0.0 && slope >= hi {
        // The maximizer lies at or above the guess.
        if slope > hi {
            lambda = napup(x, a, lambda, hi, ws);
            lambda = lambda.max(0.0);
        }
    } else if lambda <= 0.0 && slope <= lo {
        // The maximizer lies at or below the guess.
        if slope < lo {
            lambda = napdown(x, a, lambda, lo, ws);
            lambda = lambda.min(0.0);
        }
    } else if lambda != 0.0 {
        // The slope at the guess points back toward zero; re-dispatch on the
        // slope at zero.
        let slope0 = slope_at(x, a, 0.0);
        if lambda >= 0.0 && slope < hi {
            if slope0 < lo {
                lambda = napdown(x, a, 0.0, lo, ws);
                if lambda > 0.0 {
                    lambda = 0.0;
                }
            } else if slope0 > hi {
                lambda = napdown(x, a, lambda, hi, ws);
                if lambda < 0.0 {
                    lambda = 0.0;
                }
            } else {
                lambda = 0.0;
            }
        } else {
            // lambda <= 0 and slope > lo: mirror of the branch above.
            if slope0 > hi {
                lambda = napup(x, a, 0.0, hi, ws);
                lambda = lambda.max(0.0);
            } else if slope0 < lo {
                lambda = napup(x, a, lambda, lo, ws);
                lambda = lambda.min(0.0);
            } else {
                lambda = 0.0;
            }
        }
    } else {
        // lambda == 0: dispatch directly on the slope at zero.
        if slope < hi {
            if slope < lo {
                lambda = napdown(x, a, lambda, lo, ws);
                lambda = lambda.min(0.0);
            }
        } else if slope > hi {
            lambda = napup(x, a, lambda, hi, ws);
            lambda = lambda.max(0.0);
        }
    }

    if lambda == 0.0 {
        for xi in x.iter_mut() {
            *xi = clip(*xi);
        }
    } else {
        for (xi, &ak) in x.iter_mut().zip(a) {
            *xi = clip(*xi - ak * lambda);
        }
    }
    checkatx(x, a, lo, hi)?;
    Ok(lambda)
}

/// Dual slope before the `-hi`/`-lo` shift: `a' clip(y - lambda * a)`.
fn slope_at(y: &[f64], a: &[f64], lambda: f64) -> f64 {
    let mut slope = 0.0;
    for (&yk, &ak) in y.iter().zip(a) {
        let xk = yk - ak * lambda;
        if xk >= 1.0 {
            slope += ak;
        } else if xk > 0.0 {
            slope += ak * xk;
        }
    }
    slope
}

/// Walk break points upward from `start` until the slope falls to `target`.
/// The slope is non-increasing in `lambda`, linear between break points with
/// derivative `-sum(a_k^2)` over the free set.
fn napup(y: &[f64], a: &[f64], start: f64, target: f64, ws: &mut Workspace) -> f64 {
    let mut buf = std::mem::take(&mut ws.rising);
    buf.clear();
    let mut slope = 0.0;
    let mut free_a2 = 0.0;
    for (k, (&yk, &ak)) in y.iter().zip(a).enumerate() {
        let xk = yk - ak * start;
        if xk >= 1.0 {
            slope += ak;
            buf.push(Reverse(BreakPoint {
                lambda: (yk - 1.0) / ak,
                vertex: k,
                enters_free: true,
            }));
            buf.push(Reverse(BreakPoint {
                lambda: yk / ak,
                vertex: k,
                enters_free: false,
            }));
        } else if xk > 0.0 {
            slope += ak * xk;
            free_a2 += ak * ak;
            buf.push(Reverse(BreakPoint {
                lambda: yk / ak,
                vertex: k,
                enters_free: false,
            }));
        }
        // Variables already at zero stay there as lambda grows.
    }

    let mut heap = BinaryHeap::from(buf);
    let mut lambda = start;
    while slope > target {
        match heap.pop() {
            Some(Reverse(bp)) => {
                let step = (bp.lambda - lambda).max(0.0);
                if free_a2 > 0.0 && slope - free_a2 * step <= target {
                    lambda += (slope - target) / free_a2;
                    break;
                }
                slope -= free_a2 * step;
                lambda = bp.lambda;
                let ak2 = a[bp.vertex] * a[bp.vertex];
                if bp.enters_free {
                    free_a2 += ak2;
                } else {
                    free_a2 = (free_a2 - ak2).max(0.0);
                }
            }
            None => {
                if free_a2 > 0.0 {
                    lambda += (slope - target) / free_a2;
                }
                break;
            }
        }
    }
    ws.rising = heap.into_vec();
    lambda
}

/// Walk break points downward from `start` until the slope rises to
/// `target`; the mirror of `napup`.
fn napdown(y: &[f64], a: &[f64], start: f64, target: f64, ws: &mut Workspace) -> f64 {
    let mut buf = std::mem::take(&mut ws.falling);
    buf.clear();
    let mut slope = 0.0;
    let mut free_a2 = 0.0;
    for (k, (&yk, &ak)) in y.iter().zip(a).enumerate() {
        let xk = yk - ak * start;
        if xk <= 0.0 {
            buf.push(BreakPoint {
                lambda: yk / ak,
                vertex: k,
                enters_free: true,
            });
            buf.push(BreakPoint {
                lambda: (yk - 1.0) / ak,
                vertex: k,
                enters_free: false,
            });
        } else if xk < 1.0 {
            slope += ak * xk;
            free_a2 += ak * ak;
            buf.push(BreakPoint {
                lambda: (yk - 1.0) / ak,
                vertex: k,
                enters_free: false,
            });
        } else {
            // Already saturated at one; stays there as lambda falls.
            slope += ak;
        }
    }

    let mut heap = BinaryHeap::from(buf);
    let mut lambda = start;
    while slope < target {
        match heap.pop() {
            Some(bp) => {
                let step = (lambda - bp.lambda).max(0.0);
                if free_a2 > 0.0 && slope + free_a2 * step >= target {
                    lambda -= (target - slope) / free_a2;
                    break;
                }
                slope += free_a2 * step;
                lambda = bp.lambda;
                let ak2 = a[bp.vertex] * a[bp.vertex];
                if bp.enters_free {
                    free_a2 += ak2;
                } else {
                    free_a2 = (free_a2 - ak2).max(0.0);
                }
            }
            None => {
                if free_a2 > 0.0 {
                    lambda -= (target - slope) / free_a2;
                }
                break;
            }
        }
    }
    ws.falling = heap.into_vec();
    lambda
}

/// Final validation of the projected point.
fn checkatx(x: &[f64], a: &[f64], lo: f64, hi: f64) -> Result<(), Error> {
    let mut atx = 0.0;
    for (k, (&xk, &ak)) in x.iter().zip(a).enumerate() {
        if !(0.0..=1.0).contains(&xk) {
            log::warn!("projection left the unit box: x[{k}] = {xk}");
            return Err(Error::NumericFailure("projection left the unit box"));
        }
        atx += ak * xk;
    }
    if atx < lo - CHECK_EPS || atx > hi + CHECK_EPS {
        log::warn!("projection missed the weight window: lo {lo}, a'x {atx}, hi {hi}");
        return Err(Error::NumericFailure("projection missed the weight window"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn project(
        y: &[f64],
        lo: f64,
        hi: f64,
        a: &[f64],
        guess: f64,
        status: Option<&[i8]>,
    ) -> (Vec<f64>, f64) {
        let mut x = y.to_vec();
        let mut ws = Workspace::new(y.len()).unwrap();
        let lambda = napsack(&mut x, lo, hi, a, guess, status, &mut ws).unwrap();
        (x, lambda)
    }

    #[test]
    fn test_uniform_tightening() {
        let (x, lambda) = project(&[0.6, 0.6, 0.6, 0.6], 2.0, 2.0, &[1.0; 4], 0.0, None);
        assert_abs_diff_eq!(lambda, 0.1, epsilon = 1e-12);
        for xi in x {
            assert_abs_diff_eq!(xi, 0.5, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_uniform_loosening_goes_negative() {
        let (x, lambda) = project(&[0.6, 0.6, 0.6, 0.6], 3.0, 3.0, &[1.0; 4], 0.0, None);
        assert_abs_diff_eq!(lambda, -0.15, epsilon = 1e-12);
        for xi in x {
            assert_abs_diff_eq!(xi, 0.75, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_interior_point_is_left_alone() {
        let (x, lambda) = project(&[0.6, 0.6, 0.6, 0.6], 2.0, 3.0, &[1.0; 4], 0.0, None);
        assert_eq!(lambda, 0.0);
        assert_eq!(x, vec![0.6, 0.6, 0.6, 0.6]);
    }

    #[test]
    fn test_clips_box_violations_at_lambda_zero() {
        let (x, lambda) = project(&[1.4, -0.3, 0.5], 0.0, 3.0, &[1.0; 3], 0.0, None);
        assert_eq!(lambda, 0.0);
        assert_eq!(x, vec![1.0, 0.0, 0.5]);
    }

    #[test]
    fn test_walk_crosses_break_points() {
        // The walk passes one break point (vertex 0 leaving its upper bound)
        // before the slope reaches the target.
        let (x, lambda) = project(&[1.2, 0.5, -0.2], 1.0, 1.0, &[1.0; 3], 0.0, None);
        assert_abs_diff_eq!(lambda, 0.35, epsilon = 1e-12);
        assert_abs_diff_eq!(x[0], 0.85, epsilon = 1e-12);
        assert_abs_diff_eq!(x[1], 0.15, epsilon = 1e-12);
        assert_abs_diff_eq!(x[2], 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_weighted_projection() {
        let (x, lambda) = project(&[1.0, 1.0], 1.5, 1.5, &[2.0, 1.0], 0.0, None);
        assert_abs_diff_eq!(lambda, 0.3, epsilon = 1e-12);
        assert_abs_diff_eq!(x[0], 0.4, epsilon = 1e-12);
        assert_abs_diff_eq!(x[1], 0.7, epsilon = 1e-12);
        assert_abs_diff_eq!(2.0 * x[0] + x[1], 1.5, epsilon = 1e-12);
    }

    #[test]
    fn test_warm_start_matches_cold_start() {
        let y = [1.2, 0.5, -0.2];
        let status = [1i8, 0, -1];
        let (cold_x, cold_lambda) = project(&y, 1.0, 1.0, &[1.0; 3], 0.0, None);
        let (warm_x, warm_lambda) = project(&y, 1.0, 1.0, &[1.0; 3], 0.2, Some(&status));
        assert_abs_diff_eq!(cold_lambda, warm_lambda, epsilon = 1e-12);
        for (c, w) in cold_x.iter().zip(&warm_x) {
            assert_abs_diff_eq!(c, w, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_positive_guess_with_interior_slope_resets_to_zero() {
        // At the guess the slope is below hi, and clip(y) itself sits inside
        // the window, so the multiplier collapses to zero.
        let (x, lambda) = project(&[0.5, 0.5], 0.5, 1.5, &[1.0; 2], 1.0, None);
        assert_eq!(lambda, 0.0);
        assert_eq!(x, vec![0.5, 0.5]);
    }

    #[test]
    fn test_result_always_satisfies_the_window() {
        // A spread of windows around a fixed y; a'x must land inside every
        // time (up to the documented slack).
        let y = [0.9, 0.1, 0.4, 0.7, 0.2];
        let a = [1.0, 2.0, 1.5, 1.0, 3.0];
        for (lo, hi) in [(1.0, 1.0), (0.5, 2.0), (3.0, 4.0), (6.0, 7.0)] {
            let (x, _) = project(&y, lo, hi, &a, 0.0, None);
            let atx: f64 = x.iter().zip(&a).map(|(xi, ai)| xi * ai).sum();
            assert!(atx >= lo - 1e-3 && atx <= hi + 1e-3, "a'x = {atx} outside [{lo}, {hi}]");
            assert!(x.iter().all(|&xi| (0.0..=1.0).contains(&xi)));
        }
    }
}
