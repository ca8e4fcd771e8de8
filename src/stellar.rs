//! Composed stellar-physics solvers built on the model traits.
//!
//! Two inversions recur throughout the survey analysis: the main-sequence
//! turnoff mass at a given formation look-back time, and the minimum white
//! dwarf mass that can have reached a given magnitude within the age of the
//! population. Both assume monotonic underlying relations and fail hard when
//! that assumption breaks.

use crate::algo::RootError;
use crate::models::{AtmosphereType, CoolingModel, Filter, Ifmr, LifetimeModel};

/// Turnoff mass at a formation look-back time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TurnoffMass {
    /// Turnoff falls inside the lifetime model's mass range.
    Within(f64),
    /// Every modeled mass has already evolved off the main sequence.
    AllEvolved,
    /// Not even the most massive modeled star has evolved yet.
    NoneEvolved,
}

/// Main-sequence turnoff mass for stars formed `age` years ago.
///
/// Stars above the returned mass have left the main sequence; stars below
/// it are still burning hydrogen.
pub fn turnoff_mass(
    lifetime: &dyn LifetimeModel,
    age: f64,
    z: f64,
    y: f64,
) -> Result<TurnoffMass, RootError> {
    let (m_lo, m_hi) = lifetime.mass_range();
    if age >= lifetime.lifetime(m_lo, z, y) {
        return Ok(TurnoffMass::AllEvolved);
    }
    if age <= lifetime.lifetime(m_hi, z, y) {
        return Ok(TurnoffMass::NoneEvolved);
    }
    lifetime.progenitor_mass(age, z, y).map(TurnoffMass::Within)
}

/// Iteration cap for the minimum-mass bisection.
const MIN_MASS_MAX_ITER: usize = 200;

/// Lowest white dwarf mass whose progenitor lifetime plus cooling time to
/// `magnitude` does not exceed `age`.
///
/// The total-age function f(m) = lifetime(initial_mass(m)) + cooling_time(m)
/// is decreasing in white dwarf mass over `[wd_lo, wd_hi]`. The two-sided
/// pre-conditions `f(wd_lo) >= age` and `f(wd_hi) <= age` are hard runtime
/// checks: violation means the model inputs are inconsistent and yields
/// `RootError::BracketInvalid`.
#[allow(clippy::too_many_arguments)]
pub fn min_wd_mass(
    lifetime: &dyn LifetimeModel,
    ifmr: &dyn Ifmr,
    cooling: &dyn CoolingModel,
    magnitude: f64,
    age: f64,
    atmosphere: AtmosphereType,
    filter: Filter,
    z: f64,
    y: f64,
    wd_lo: f64,
    wd_hi: f64,
) -> Result<f64, RootError> {
    let total_age = |m: f64| -> Result<f64, RootError> {
        let t_cool = cooling.cooling_time(magnitude, m, atmosphere, filter)?;
        Ok(lifetime.lifetime(ifmr.initial_mass(m), z, y) + t_cool)
    };

    let f_lo = total_age(wd_lo)?;
    let f_hi = total_age(wd_hi)?;
    if !(f_lo >= age && f_hi <= age) {
        return Err(RootError::BracketInvalid {
            lo: wd_lo,
            hi: wd_hi,
            target: age,
            f_lo,
            f_hi,
        });
    }

    // Coarser than the inner cooling-time inversion, so its residual noise
    // cannot stall the outer bracket.
    let tol = (age * 1e-7).max(1.0);
    let (mut lo, mut hi) = (wd_lo, wd_hi);
    let mut residual = f64::INFINITY;
    for _ in 0..MIN_MASS_MAX_ITER {
        let mid = 0.5 * (lo + hi);
        let f_mid = total_age(mid)?;
        residual = (f_mid - age).abs();
        if residual < tol {
            return Ok(mid);
        }
        if f_mid > age {
            lo = mid;
        } else {
            hi = mid;
        }
    }

    Err(RootError::MaxIterations {
        max_iter: MIN_MASS_MAX_ITER,
        residual,
    })
}
