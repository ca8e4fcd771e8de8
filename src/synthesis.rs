//! Forward Monte Carlo population synthesis.
//!
//! Draws (formation time, initial mass, composition) from the SFR, IMF and
//! metallicity distributions, pushes each draw through the lifetime, IFMR
//! and cooling models to an observable magnitude, and bins the survivors on
//! the observed luminosity function's magnitude grid. Draws whose
//! progenitor is still on the main sequence are discarded, not errors.
//!
//! Synthesis is stateless and embarrassingly parallel: draws are chunked
//! across rayon workers, each chunk with its own deterministically seeded
//! RNG, and chunk results merged by summation.

use crate::lf::{BinnedStars, MagnitudeGrid};
use crate::models::{
    AtmosphereType, CoolingModel, Filter, Ifmr, Imf, LifetimeModel, MetallicityDist, Sfr,
};
use log::debug;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;

/// One synthesized white dwarf.
///
/// The weight is the number of real stars this draw represents, with its
/// variance alongside; both start at shot noise for a single draw and are
/// mutated only through [`Star::reweight`] during density matching. A star
/// is owned by exactly one magnitude bin for its whole life.
#[derive(Debug, Clone)]
pub struct Star {
    /// Progenitor initial mass, solar masses.
    pub initial_mass: f64,
    /// Formation look-back time, years.
    pub formation_time: f64,
    pub z: f64,
    pub y: f64,
    /// Remnant mass, solar masses.
    pub wd_mass: f64,
    /// Time spent cooling, years.
    pub cooling_time: f64,
    /// Observable magnitude in the synthesis filter.
    pub magnitude: f64,
    pub atmosphere: AtmosphereType,
    /// Whether the magnitude falls inside the observed luminosity
    /// function's range.
    pub observed: bool,
    weight: f64,
    variance: f64,
}

impl Star {
    /// A freshly drawn star: weight 1, shot-noise variance 1.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        initial_mass: f64,
        formation_time: f64,
        z: f64,
        y: f64,
        wd_mass: f64,
        cooling_time: f64,
        magnitude: f64,
        atmosphere: AtmosphereType,
        observed: bool,
    ) -> Self {
        Self {
            initial_mass,
            formation_time,
            z,
            y,
            wd_mass,
            cooling_time,
            magnitude,
            atmosphere,
            observed,
            weight: 1.0,
            variance: 1.0,
        }
    }

    /// Number of real stars represented.
    pub fn weight(&self) -> f64 {
        self.weight
    }

    /// Variance on the represented count.
    pub fn variance(&self) -> f64 {
        self.variance
    }

    /// Scale the weight and inject additional variance.
    ///
    /// The existing variance scales with the square of the factor (it
    /// tracks a multiplicative quantity); `variance_delta` is then added,
    /// carrying observational uncertainty spread over the bin.
    pub fn reweight(&mut self, factor: f64, variance_delta: f64) {
        self.weight *= factor;
        self.variance = self.variance * factor * factor + variance_delta;
    }

    #[cfg(test)]
    pub(crate) fn new_for_tests(
        magnitude: f64,
        formation_time: f64,
        observed: bool,
        atmosphere: AtmosphereType,
    ) -> Self {
        Self::new(
            2.0,
            formation_time,
            0.014,
            0.27,
            0.6,
            1.0e9,
            magnitude,
            atmosphere,
            observed,
        )
    }
}

/// The model set a synthesis run draws from.
#[derive(Clone, Copy)]
pub struct SynthesisModels<'a> {
    pub sfr: &'a dyn Sfr,
    pub imf: &'a dyn Imf,
    pub metallicity: &'a dyn MetallicityDist,
    pub ifmr: &'a dyn Ifmr,
    pub lifetime: &'a dyn LifetimeModel,
    pub cooling: &'a dyn CoolingModel,
}

/// Monte Carlo run parameters.
#[derive(Debug, Clone)]
pub struct SynthesisParams {
    /// Number of draws (not surviving white dwarfs).
    pub n_stars: usize,
    /// Base RNG seed; chunk c uses `seed + c`.
    pub seed: u64,
    /// Probability a white dwarf has a hydrogen atmosphere.
    pub h_fraction: f64,
    /// Filter the cooling magnitudes are evaluated in.
    pub filter: Filter,
    /// Draws per parallel chunk.
    pub chunk_size: usize,
}

impl SynthesisParams {
    pub fn new(n_stars: usize, seed: u64) -> Self {
        Self {
            n_stars,
            seed,
            h_fraction: 1.0,
            filter: Filter::Bolometric,
            chunk_size: 4096,
        }
    }

    pub fn with_h_fraction(mut self, h_fraction: f64) -> Self {
        assert!((0.0..=1.0).contains(&h_fraction), "fraction outside [0, 1]");
        self.h_fraction = h_fraction;
        self
    }

    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filter = filter;
        self
    }
}

/// Monte Carlo population synthesizer configured by [`SynthesisParams`].
pub struct PopulationSynthesizer {
    params: SynthesisParams,
}

impl PopulationSynthesizer {
    pub fn new(params: SynthesisParams) -> Self {
        Self { params }
    }

    /// Run a synthesis and bin the resulting white dwarfs on `grid`,
    /// normally the observed luminosity function's grid.
    ///
    /// Stars whose magnitude falls outside the grid are kept in the
    /// overflow bucket with `observed = false`. Deterministic for a given
    /// seed and parameter set regardless of worker count.
    pub fn synthesize(&self, models: &SynthesisModels<'_>, grid: &MagnitudeGrid) -> BinnedStars {
        let params = &self.params;
        let chunk = params.chunk_size.max(1);
        let n_chunks = params.n_stars.div_ceil(chunk);

        (0..n_chunks)
            .into_par_iter()
            .map(|chunk_idx| {
                let mut rng = StdRng::seed_from_u64(params.seed.wrapping_add(chunk_idx as u64));
                let count = chunk.min(params.n_stars - chunk_idx * chunk);
                let mut local = BinnedStars::new(grid.clone());
                for _ in 0..count {
                    if let Some(star) = draw_star(models, params, grid, &mut rng) {
                        local.insert(star);
                    }
                }
                local
            })
            .reduce(
                || BinnedStars::new(grid.clone()),
                |mut acc, part| {
                    acc.merge(part);
                    acc
                },
            )
    }
}

/// Convenience wrapper over [`PopulationSynthesizer::synthesize`].
pub fn synthesize(
    models: &SynthesisModels<'_>,
    params: &SynthesisParams,
    grid: &MagnitudeGrid,
) -> BinnedStars {
    PopulationSynthesizer::new(params.clone()).synthesize(models, grid)
}

fn draw_star(
    models: &SynthesisModels<'_>,
    params: &SynthesisParams,
    grid: &MagnitudeGrid,
    rng: &mut StdRng,
) -> Option<Star> {
    let formation_time = models.sfr.draw_formation_time(rng);
    let initial_mass = models.imf.draw_mass(rng);
    let (z, y) = models.metallicity.draw(rng);

    let t_ms = models.lifetime.lifetime(initial_mass, z, y);
    if t_ms > formation_time {
        // Progenitor is still on the main sequence.
        return None;
    }

    let wd_mass = models.ifmr.final_mass(initial_mass);
    let cooling_time = formation_time - t_ms;
    let atmosphere = if rng.gen::<f64>() < params.h_fraction {
        AtmosphereType::H
    } else {
        AtmosphereType::He
    };

    let magnitude = match models
        .cooling
        .magnitude(cooling_time, wd_mass, atmosphere, params.filter)
    {
        Ok(mag) => mag,
        Err(err) => {
            debug!("draw off the cooling grid, discarded: {err}");
            return None;
        }
    };

    let (lo, hi) = grid.range();
    let observed = magnitude >= lo && magnitude <= hi;
    Some(Star::new(
        initial_mass,
        formation_time,
        z,
        y,
        wd_mass,
        cooling_time,
        magnitude,
        atmosphere,
        observed,
    ))
}
