//! Density matching and star-formation-rate recovery.
//!
//! [`scale_to_observed_density`] reweights synthesized stars bin by bin so
//! the simulated luminosity function matches the observed one, propagating
//! both shot-noise and observational uncertainty into per-star variances.
//! [`get_sfr`] then reads the reweighted population back out as a formation
//! rate per look-back-time bin, correcting for white dwarfs outside survey
//! coverage and for progenitors that have not yet evolved.

use crate::algo::RootError;
use crate::lf::{BinnedStars, ObservedLuminosityFunction, EDGE_TOL};
use crate::models::{Imf, LifetimeModel};
use crate::stellar::{turnoff_mass, TurnoffMass};
use crate::synthesis::Star;
use log::warn;
use thiserror::Error;

/// Match the simulated magnitude-bin densities to the observed luminosity
/// function, returning the chi-squared of the pre-scaling mismatch.
///
/// Per bin: the simulated density is the weight sum over the bin width; the
/// correction `w = phi_obs / phi_sim` multiplies every star's weight, and
/// the bin's observational count variance `(sigma_obs * width)^2` is spread
/// across stars in proportion to their share of the bin weight. Together
/// with the `w^2` scaling of existing variances this reproduces
/// ratio-of-estimates error propagation at the bin level. Bins with no
/// simulated stars are skipped with a warning; their observed constraint
/// goes unused.
///
/// # Panics
/// Panics if the two magnitude grids differ. Matching across partitions is
/// a programming error.
pub fn scale_to_observed_density(
    stars: &mut BinnedStars,
    observed: &ObservedLuminosityFunction,
) -> f64 {
    assert!(
        stars.grid().matches(observed.grid(), EDGE_TOL),
        "synthesized and observed magnitude grids differ"
    );

    let mut chi2 = 0.0;
    for bin in 0..observed.grid().n_bins() {
        let width = observed.grid().width(bin);
        let (sum_w, _) = stars.bin_totals(bin);
        let phi_obs = observed.density(bin);
        let sigma_obs = observed.sigma(bin);

        if sum_w <= 0.0 {
            if phi_obs > 0.0 {
                warn!("no synthesized stars in magnitude bin {bin}; constraint unused");
            }
            continue;
        }

        let phi_sim = sum_w / width;
        if sigma_obs > 0.0 {
            let r = (phi_obs - phi_sim) / sigma_obs;
            chi2 += r * r;
        }

        let w = phi_obs / phi_sim;
        // Observational variance on the bin's represented count.
        let var_obs = (sigma_obs * width).powi(2);
        for star in stars.bin_mut(bin) {
            let share = star.weight() / sum_w;
            star.reweight(w, share * var_obs);
        }
    }
    chi2
}

/// Why an SFR estimate could not be formed for a time bin.
#[derive(Debug, Error)]
pub enum SfrError {
    /// No observed white dwarf has a progenitor formed in the bin. The
    /// caller skips or flags the bin and moves on.
    #[error("no observed white dwarfs formed in [{lo:.4e}, {hi:.4e}] yr")]
    NoConstraint { lo: f64, hi: f64 },
    /// Even the most massive IMF star formed in the bin is still on the
    /// main sequence; the bin cannot contain white dwarf progenitors.
    #[error("no white dwarf progenitors form in [{lo:.4e}, {hi:.4e}] yr")]
    NoWdProgenitors { lo: f64, hi: f64 },
    #[error(transparent)]
    Root(#[from] RootError),
}

/// One recovered SFR bin.
#[derive(Debug, Clone, Copy)]
pub struct SfrEstimate {
    /// Formation rate over the bin, per year, per unit synthesis draw rate.
    pub rate: f64,
    /// One-sigma uncertainty on `rate`.
    pub sigma: f64,
    /// Multiplier recovering white dwarfs outside survey coverage.
    pub unobserved_correction: f64,
    /// Multiplier recovering progenitors still on the main sequence.
    pub low_mass_correction: f64,
}

/// SFR recovery parameters.
#[derive(Debug, Clone)]
pub struct SfrParams {
    /// Synthesis draws per year of look-back time; normalizes the rate.
    /// Pass 1 for a rate in represented-star counts per year.
    pub stars_per_year: f64,
    /// Sub-intervals for the progenitor-fraction quadrature.
    pub n_strips: usize,
    pub z: f64,
    pub y: f64,
}

impl SfrParams {
    pub fn new(stars_per_year: f64) -> Self {
        assert!(stars_per_year > 0.0, "draw rate must be positive");
        Self {
            stars_per_year,
            n_strips: 20,
            z: 0.014,
            y: 0.27,
        }
    }

    pub fn with_n_strips(mut self, n_strips: usize) -> Self {
        assert!(n_strips > 0, "need at least one strip");
        self.n_strips = n_strips;
        self
    }

    pub fn with_composition(mut self, z: f64, y: f64) -> Self {
        self.z = z;
        self.y = y;
        self
    }
}

/// Fraction of stars formed in `time_bin` that are white dwarfs today.
///
/// Midpoint quadrature over `n_strips` sub-intervals: at each strip centre
/// the main-sequence turnoff mass is evaluated and the IMF integrated above
/// it. Returns [`SfrError::NoWdProgenitors`] when the fraction vanishes
/// over the whole bin.
pub fn fraction_wd_progenitors(
    lifetime: &dyn LifetimeModel,
    imf: &dyn Imf,
    time_bin: (f64, f64),
    n_strips: usize,
    z: f64,
    y: f64,
) -> Result<f64, SfrError> {
    let (lo, hi) = time_bin;
    assert!(hi > lo, "empty time bin");
    assert!(n_strips > 0, "need at least one strip");

    let dt = (hi - lo) / n_strips as f64;
    let mut total = 0.0;
    for k in 0..n_strips {
        let t = lo + (k as f64 + 0.5) * dt;
        total += match turnoff_mass(lifetime, t, z, y)? {
            TurnoffMass::AllEvolved => 1.0,
            TurnoffMass::NoneEvolved => 0.0,
            TurnoffMass::Within(m) => 1.0 - imf.integral(m),
        };
    }

    let fraction = total / n_strips as f64;
    if fraction <= 0.0 {
        return Err(SfrError::NoWdProgenitors { lo, hi });
    }
    Ok(fraction)
}

fn formed_in(star: &Star, lo: f64, hi: f64) -> bool {
    star.formation_time >= lo && star.formation_time < hi
}

/// Recover the star formation rate over a look-back-time bin from a
/// (typically density-matched) synthesized population.
///
/// Sums weight and variance over observed white dwarfs whose progenitors
/// formed in the bin, then applies two multiplicative corrections: the
/// unobserved correction (total white dwarfs per observed one, from raw
/// draw counts) and the low-mass correction (inverse of the progenitor
/// fraction from [`fraction_wd_progenitors`]).
pub fn get_sfr(
    stars: &BinnedStars,
    time_bin: (f64, f64),
    lifetime: &dyn LifetimeModel,
    imf: &dyn Imf,
    params: &SfrParams,
) -> Result<SfrEstimate, SfrError> {
    let (lo, hi) = time_bin;
    assert!(hi > lo, "empty time bin");

    let mut n_total = 0usize;
    let mut n_obs = 0usize;
    let mut weight = 0.0;
    let mut variance = 0.0;
    for star in stars.iter() {
        if !formed_in(star, lo, hi) {
            continue;
        }
        n_total += 1;
        if star.observed {
            n_obs += 1;
            weight += star.weight();
            variance += star.variance();
        }
    }

    if n_obs == 0 {
        return Err(SfrError::NoConstraint { lo, hi });
    }

    let unobserved_correction = n_total as f64 / n_obs as f64;
    let fraction = fraction_wd_progenitors(lifetime, imf, time_bin, params.n_strips, params.z, params.y)?;
    let low_mass_correction = 1.0 / fraction;

    let norm = (hi - lo) * params.stars_per_year;
    let scale = unobserved_correction * low_mass_correction / norm;
    Ok(SfrEstimate {
        rate: weight * scale,
        sigma: variance.sqrt() * scale,
        unobserved_correction,
        low_mass_correction,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lf::MagnitudeGrid;
    use crate::models::analytic::{PowerLawImf, PowerLawLifetime};
    use crate::models::AtmosphereType;
    use approx::assert_relative_eq;

    fn star_at(mag: f64, formed: f64, observed: bool) -> Star {
        Star::new_for_tests(mag, formed, observed, AtmosphereType::H)
    }

    fn two_bin_population() -> BinnedStars {
        let mut stars = BinnedStars::new(MagnitudeGrid::uniform(12.0, 16.0, 2));
        stars.insert(star_at(12.5, 5.0e9, true));
        stars.insert(star_at(13.0, 5.0e9, true));
        stars.insert(star_at(14.5, 5.0e9, true));
        stars
    }

    #[test]
    fn matching_reproduces_observed_densities() {
        let mut stars = two_bin_population();
        let grid = stars.grid().clone();
        let observed =
            ObservedLuminosityFunction::new(grid.clone(), vec![3.0, 0.25], vec![0.5, 0.1]);
        scale_to_observed_density(&mut stars, &observed);

        for bin in 0..grid.n_bins() {
            let (w, _) = stars.bin_totals(bin);
            assert_relative_eq!(w / grid.width(bin), observed.density(bin), epsilon = 1e-12);
        }
    }

    #[test]
    fn chi2_matches_hand_computation() {
        let mut stars = two_bin_population();
        let grid = stars.grid().clone();
        // Simulated densities are 2/2 = 1.0 and 1/2 = 0.5.
        let observed =
            ObservedLuminosityFunction::new(grid, vec![2.0, 0.5], vec![0.5, 0.1]);
        let chi2 = scale_to_observed_density(&mut stars, &observed);
        // ((2.0 - 1.0)/0.5)^2 + 0 = 4.
        assert_relative_eq!(chi2, 4.0, epsilon = 1e-12);
    }

    #[test]
    fn variance_carries_shot_and_observational_terms() {
        let mut stars = two_bin_population();
        let grid = stars.grid().clone();
        let observed =
            ObservedLuminosityFunction::new(grid.clone(), vec![3.0, 0.25], vec![0.5, 0.1]);
        scale_to_observed_density(&mut stars, &observed);

        // Bin 0: two unit-weight stars, w = 3.0*2.0/2.0 = 3.0; variance is
        // w^2 * 2 plus the observational term (0.5 * 2.0)^2.
        let (_, var) = stars.bin_totals(0);
        assert_relative_eq!(var, 9.0 * 2.0 + 1.0, epsilon = 1e-12);
    }

    #[test]
    fn second_pass_is_identity() {
        let mut stars = two_bin_population();
        let grid = stars.grid().clone();
        let observed =
            ObservedLuminosityFunction::new(grid.clone(), vec![3.0, 0.25], vec![0.5, 0.1]);
        scale_to_observed_density(&mut stars, &observed);
        let before: Vec<f64> = (0..grid.n_bins()).map(|b| stars.bin_totals(b).0).collect();
        let chi2 = scale_to_observed_density(&mut stars, &observed);
        assert_relative_eq!(chi2, 0.0, epsilon = 1e-18);
        for (bin, w) in before.iter().enumerate() {
            assert_relative_eq!(stars.bin_totals(bin).0, *w, epsilon = 1e-12);
        }
    }

    #[test]
    fn empty_simulated_bin_is_skipped() {
        let mut stars = BinnedStars::new(MagnitudeGrid::uniform(12.0, 16.0, 2));
        stars.insert(star_at(12.5, 5.0e9, true));
        let grid = stars.grid().clone();
        let observed =
            ObservedLuminosityFunction::new(grid, vec![1.0, 4.0], vec![0.2, 0.2]);
        let chi2 = scale_to_observed_density(&mut stars, &observed);
        // Only bin 0 contributes: ((1.0 - 0.5)/0.2)^2.
        assert_relative_eq!(chi2, 6.25, epsilon = 1e-12);
    }

    #[test]
    #[should_panic(expected = "magnitude grids differ")]
    fn mismatched_grids_panic() {
        let mut stars = BinnedStars::new(MagnitudeGrid::uniform(12.0, 16.0, 2));
        let observed = ObservedLuminosityFunction::new(
            MagnitudeGrid::uniform(12.0, 16.0, 4),
            vec![1.0; 4],
            vec![0.1; 4],
        );
        scale_to_observed_density(&mut stars, &observed);
    }

    #[test]
    fn progenitor_fraction_increases_with_age() {
        let lt = PowerLawLifetime::standard();
        let imf = PowerLawImf::salpeter(0.6, 8.0);
        let young = fraction_wd_progenitors(&lt, &imf, (1.0e8, 2.0e8), 20, 0.014, 0.27).unwrap();
        let old = fraction_wd_progenitors(&lt, &imf, (8.0e9, 9.0e9), 20, 0.014, 0.27).unwrap();
        assert!(old > young);
        assert!(young > 0.0 && old < 1.0);
    }

    #[test]
    fn progenitor_fraction_saturates_for_ancient_bins() {
        let lt = PowerLawLifetime::standard();
        let imf = PowerLawImf::salpeter(0.6, 8.0);
        // Older than the lifetime of the least massive modeled star.
        let f = fraction_wd_progenitors(&lt, &imf, (4.0e10, 5.0e10), 20, 0.014, 0.27).unwrap();
        assert_relative_eq!(f, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn no_progenitors_in_very_young_bin() {
        let lt = PowerLawLifetime::standard();
        let imf = PowerLawImf::salpeter(0.6, 8.0);
        // Shorter than the lifetime of the most massive modeled star.
        let err = fraction_wd_progenitors(&lt, &imf, (1.0e6, 2.0e6), 20, 0.014, 0.27).unwrap_err();
        assert!(matches!(err, SfrError::NoWdProgenitors { .. }));
    }

    #[test]
    fn sfr_with_all_observed_has_unit_corrections() {
        let lt = PowerLawLifetime::standard();
        let imf = PowerLawImf::salpeter(0.6, 8.0);
        let mut stars = BinnedStars::new(MagnitudeGrid::uniform(12.0, 16.0, 2));
        // An ancient bin where every modeled mass has evolved.
        stars.insert(star_at(12.5, 4.2e10, true));
        stars.insert(star_at(14.5, 4.6e10, true));

        let est = get_sfr(
            &stars,
            (4.0e10, 5.0e10),
            &lt,
            &imf,
            &SfrParams::new(1.0),
        )
        .unwrap();
        assert_relative_eq!(est.unobserved_correction, 1.0, epsilon = 1e-12);
        assert_relative_eq!(est.low_mass_correction, 1.0, epsilon = 1e-12);
        assert_relative_eq!(est.rate, 2.0 / 1.0e10, epsilon = 1e-18);
        assert_relative_eq!(est.sigma, 2.0_f64.sqrt() / 1.0e10, epsilon = 1e-18);
    }

    #[test]
    fn sfr_applies_unobserved_correction() {
        let lt = PowerLawLifetime::standard();
        let imf = PowerLawImf::salpeter(0.6, 8.0);
        let mut stars = BinnedStars::new(MagnitudeGrid::uniform(12.0, 16.0, 2));
        stars.insert(star_at(12.5, 4.2e10, true));
        // Outside the magnitude grid, not observed.
        stars.insert(star_at(20.0, 4.4e10, false));
        stars.insert(star_at(21.0, 4.6e10, false));

        let est = get_sfr(
            &stars,
            (4.0e10, 5.0e10),
            &lt,
            &imf,
            &SfrParams::new(1.0),
        )
        .unwrap();
        assert_relative_eq!(est.unobserved_correction, 3.0, epsilon = 1e-12);
        assert_relative_eq!(est.rate, 3.0 / 1.0e10, epsilon = 1e-18);
    }

    #[test]
    fn sfr_without_observed_stars_is_no_constraint() {
        let lt = PowerLawLifetime::standard();
        let imf = PowerLawImf::salpeter(0.6, 8.0);
        let mut stars = BinnedStars::new(MagnitudeGrid::uniform(12.0, 16.0, 2));
        stars.insert(star_at(20.0, 4.4e10, false));

        let err = get_sfr(
            &stars,
            (4.0e10, 5.0e10),
            &lt,
            &imf,
            &SfrParams::new(1.0),
        )
        .unwrap_err();
        assert!(matches!(err, SfrError::NoConstraint { .. }));

        // An empty bin is equally unconstrained.
        let err = get_sfr(
            &stars,
            (1.0e9, 2.0e9),
            &lt,
            &imf,
            &SfrParams::new(1.0),
        )
        .unwrap_err();
        assert!(matches!(err, SfrError::NoConstraint { .. }));
    }
}
