//! Bisection root finding for monotonic physical relations.
//!
//! Every inversion in this crate (lifetime to progenitor mass, magnitude to
//! cooling time, minimum white dwarf mass at fixed magnitude) goes through
//! the same bisection kernel. The underlying relations are monotonic by
//! physical assumption, so a failure to converge is treated as evidence that
//! the assumption is broken and is surfaced as a hard error rather than a
//! best-effort answer.

use thiserror::Error;

/// Errors from bisection inversion.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RootError {
    /// The bracket endpoints do not straddle the target value.
    #[error(
        "bracket [{lo}, {hi}] does not straddle target {target} \
         (f(lo) = {f_lo}, f(hi) = {f_hi})"
    )]
    BracketInvalid {
        lo: f64,
        hi: f64,
        target: f64,
        f_lo: f64,
        f_hi: f64,
    },

    /// The iteration cap was reached before the residual fell below
    /// tolerance. The function is likely discontinuous or non-monotonic
    /// on the bracket.
    #[error(
        "bisection did not converge in {max_iter} iterations \
         (residual {residual:e}); relation is likely non-monotonic"
    )]
    MaxIterations { max_iter: usize, residual: f64 },
}

/// Invert a monotonic function by bisection.
///
/// Finds `x` in `[lo, hi]` with `|f(x) - target| < tol`. The function may be
/// increasing or decreasing; direction is inferred from the endpoint values.
/// The bracket is validated up front: if `f(lo)` and `f(hi)` do not straddle
/// the target, `RootError::BracketInvalid` is returned. This is a hard
/// runtime check, never a debug-only assertion, because a bad bracket means
/// the physical inputs are inconsistent.
///
/// # Arguments
/// * `f` - Monotonic function on `[lo, hi]`
/// * `target` - Value to invert for
/// * `lo`, `hi` - Bracket endpoints (`lo < hi`)
/// * `tol` - Absolute tolerance on `|f(x) - target|`
/// * `max_iter` - Iteration cap; exceeding it is an error
pub fn invert_monotonic<F>(
    f: F,
    target: f64,
    lo: f64,
    hi: f64,
    tol: f64,
    max_iter: usize,
) -> Result<f64, RootError>
where
    F: Fn(f64) -> f64,
{
    let f_lo = f(lo);
    let f_hi = f(hi);

    // Endpoints already within tolerance count as solutions.
    if (f_lo - target).abs() < tol {
        return Ok(lo);
    }
    if (f_hi - target).abs() < tol {
        return Ok(hi);
    }

    if (f_lo - target) * (f_hi - target) > 0.0 {
        return Err(RootError::BracketInvalid {
            lo,
            hi,
            target,
            f_lo,
            f_hi,
        });
    }

    let increasing = f_hi > f_lo;
    let (mut lo, mut hi) = (lo, hi);
    let mut residual = f64::INFINITY;

    for _ in 0..max_iter {
        let mid = 0.5 * (lo + hi);
        let f_mid = f(mid);
        residual = (f_mid - target).abs();
        if residual < tol {
            return Ok(mid);
        }
        if (f_mid < target) == increasing {
            lo = mid;
        } else {
            hi = mid;
        }
    }

    Err(RootError::MaxIterations { max_iter, residual })
}
