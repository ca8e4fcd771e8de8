//! Closed-form reference models.
//!
//! Simple concrete implementations of the model traits with analytic
//! normalizations: a single-slope power-law IMF, a constant star formation
//! rate, uniform and exponential-layer density profiles, a power-law
//! main-sequence lifetime relation, a linear IFMR and a grid-backed cooling
//! model. They serve tests and demos and double as sanity baselines for the
//! numerical machinery; production model grids plug in through the same
//! traits.

use super::{
    AtmosphereType, CoolingModel, DensityProfile, Filter, Ifmr, Imf, LifetimeModel,
    MetallicityDist, Sfr, Sightline,
};
use crate::algo::{invert_monotonic, GridError, GridInterpolator, RootError};
use rand::rngs::StdRng;
use rand::Rng;
use rand_distr::{Distribution, Normal};
use std::collections::HashMap;

/// Single-slope power-law IMF, dN/dm proportional to m^exponent.
///
/// Salpeter corresponds to `exponent = -2.35`. The cumulative integral and
/// the inverse-CDF draw are both closed form, which makes this the reference
/// IMF for convergence tests.
#[derive(Debug, Clone)]
pub struct PowerLawImf {
    exponent: f64,
    m_min: f64,
    m_max: f64,
}

impl PowerLawImf {
    /// # Panics
    /// Panics if the mass range is empty or `exponent == -1` (log-slope
    /// normalization is not supported).
    pub fn new(exponent: f64, m_min: f64, m_max: f64) -> Self {
        assert!(m_min > 0.0 && m_max > m_min, "empty IMF mass range");
        assert!(
            (exponent + 1.0).abs() > 1e-12,
            "exponent -1 has a logarithmic normalization; unsupported"
        );
        Self {
            exponent,
            m_min,
            m_max,
        }
    }

    /// Salpeter slope over the given mass range.
    pub fn salpeter(m_min: f64, m_max: f64) -> Self {
        Self::new(-2.35, m_min, m_max)
    }

    fn p(&self) -> f64 {
        self.exponent + 1.0
    }
}

impl Imf for PowerLawImf {
    fn draw_mass(&self, rng: &mut StdRng) -> f64 {
        let p = self.p();
        let a = self.m_min.powf(p);
        let b = self.m_max.powf(p);
        let u: f64 = rng.gen();
        (a + u * (b - a)).powf(1.0 / p)
    }

    fn integral(&self, mass: f64) -> f64 {
        let m = mass.clamp(self.m_min, self.m_max);
        let p = self.p();
        let a = self.m_min.powf(p);
        let b = self.m_max.powf(p);
        (m.powf(p) - a) / (b - a)
    }

    fn mass_range(&self) -> (f64, f64) {
        (self.m_min, self.m_max)
    }
}

/// Constant star formation rate over `[0, max_lookback]` years.
#[derive(Debug, Clone)]
pub struct ConstantSfr {
    /// Formation rate in stars per year.
    pub rate: f64,
    max_lookback: f64,
}

impl ConstantSfr {
    pub fn new(rate: f64, max_lookback: f64) -> Self {
        assert!(max_lookback > 0.0, "max_lookback must be positive");
        Self { rate, max_lookback }
    }
}

impl Sfr for ConstantSfr {
    fn draw_formation_time(&self, rng: &mut StdRng) -> f64 {
        rng.gen::<f64>() * self.max_lookback
    }

    fn max_lookback(&self) -> f64 {
        self.max_lookback
    }
}

/// Independent Gaussian draws for Z and Y, truncated at zero.
#[derive(Debug, Clone)]
pub struct GaussianMetallicity {
    z: Normal<f64>,
    y: Normal<f64>,
}

impl GaussianMetallicity {
    pub fn new(z_mean: f64, z_sigma: f64, y_mean: f64, y_sigma: f64) -> Self {
        Self {
            z: Normal::new(z_mean, z_sigma).expect("finite Z sigma"),
            y: Normal::new(y_mean, y_sigma).expect("finite Y sigma"),
        }
    }

    /// Solar-neighbourhood-like defaults.
    pub fn solar() -> Self {
        Self::new(0.014, 0.004, 0.27, 0.02)
    }
}

impl MetallicityDist for GaussianMetallicity {
    fn draw(&self, rng: &mut StdRng) -> (f64, f64) {
        let z = self.z.sample(rng).max(1e-5);
        let y = self.y.sample(rng).max(0.2);
        (z, y)
    }
}

/// Fixed composition, for tests that must not vary (Z, Y).
#[derive(Debug, Clone)]
pub struct FixedMetallicity {
    pub z: f64,
    pub y: f64,
}

impl MetallicityDist for FixedMetallicity {
    fn draw(&self, _rng: &mut StdRng) -> (f64, f64) {
        (self.z, self.y)
    }
}

/// Power-law main-sequence lifetime, t = t_solar * m^exponent years.
///
/// Composition dependence is deliberately omitted; the (z, y) arguments are
/// accepted and ignored so the model slots behind the trait.
#[derive(Debug, Clone)]
pub struct PowerLawLifetime {
    /// Lifetime of a 1 solar-mass star, years.
    pub t_solar: f64,
    /// Mass exponent, negative (lifetime falls with mass).
    pub exponent: f64,
    mass_lo: f64,
    mass_hi: f64,
}

impl PowerLawLifetime {
    pub fn new(t_solar: f64, exponent: f64, mass_lo: f64, mass_hi: f64) -> Self {
        assert!(exponent < 0.0, "lifetime must decrease with mass");
        assert!(mass_lo > 0.0 && mass_hi > mass_lo, "empty mass range");
        Self {
            t_solar,
            exponent,
            mass_lo,
            mass_hi,
        }
    }

    /// 10 Gyr at 1 solar mass with slope -2.5, over 0.6-8 solar masses.
    pub fn standard() -> Self {
        Self::new(1.0e10, -2.5, 0.6, 8.0)
    }
}

impl LifetimeModel for PowerLawLifetime {
    fn lifetime(&self, mass: f64, _z: f64, _y: f64) -> f64 {
        self.t_solar * mass.powf(self.exponent)
    }

    fn mass_range(&self) -> (f64, f64) {
        (self.mass_lo, self.mass_hi)
    }
}

/// Linear initial-final mass relation, monotonic increasing.
#[derive(Debug, Clone)]
pub struct LinearIfmr {
    pub slope: f64,
    pub intercept: f64,
}

impl LinearIfmr {
    pub fn new(slope: f64, intercept: f64) -> Self {
        assert!(slope > 0.0, "IFMR must be increasing");
        Self { slope, intercept }
    }

    /// A commonly fitted linear relation: m_f = 0.109 m_i + 0.394.
    pub fn standard() -> Self {
        Self::new(0.109, 0.394)
    }
}

impl Ifmr for LinearIfmr {
    fn final_mass(&self, initial_mass: f64) -> f64 {
        self.intercept + self.slope * initial_mass
    }

    fn initial_mass(&self, final_mass: f64) -> f64 {
        (final_mass - self.intercept) / self.slope
    }
}

/// Uniform (constant) density: generalized volume is the raw cone volume.
///
/// Used for spheroid populations, where the density gradient over survey
/// distances is negligible. The generalized volume has the closed form
/// (solid angle / 3) * d^3, which also anchors the quadrature tests.
#[derive(Debug, Clone, Default)]
pub struct UniformDensity;

impl DensityProfile for UniformDensity {
    fn generalized_volume(&self, distance: f64, sightline: &Sightline) -> f64 {
        sightline.solid_angle / 3.0 * distance.powi(3)
    }
}

/// Exponential vertical disk layer with the given scale height.
///
/// Density falls as exp(-|z|/H) with height above the plane; along a
/// sightline at Galactic latitude b this is exp(-d/lambda) with
/// lambda = H / |sin b|, and the generalized volume integral has a closed
/// form.
#[derive(Debug, Clone)]
pub struct ExponentialLayer {
    /// Scale height in parsecs.
    pub scale_height: f64,
}

impl ExponentialLayer {
    pub fn new(scale_height: f64) -> Self {
        assert!(scale_height > 0.0, "scale height must be positive");
        Self { scale_height }
    }
}

impl DensityProfile for ExponentialLayer {
    fn generalized_volume(&self, distance: f64, sightline: &Sightline) -> f64 {
        let sin_b = sightline.sin_abs_gal_lat.abs();
        if sin_b < 1e-12 {
            // In-plane sightline: no vertical falloff over the survey volume.
            return sightline.solid_angle / 3.0 * distance.powi(3);
        }
        let lambda = self.scale_height / sin_b;
        let x = distance / lambda;
        // integral_0^D d^2 exp(-d/lambda) dd = lambda^3 (2 - e^-x (x^2+2x+2))
        let shape = if x < 1e-3 {
            // Series expansion; the closed form cancels catastrophically.
            x.powi(3) / 3.0 - x.powi(4) / 4.0 + x.powi(5) / 10.0
        } else {
            2.0 - (-x).exp() * (x * x + 2.0 * x + 2.0)
        };
        sightline.solid_angle * lambda.powi(3) * shape
    }
}

/// Cooling model backed by bilinear (time x mass) magnitude grids.
///
/// One grid per (atmosphere, filter) pair. Querying a pair that was never
/// loaded is a construction-contract violation and panics.
pub struct GridCooling {
    tracks: HashMap<(AtmosphereType, Filter), GridInterpolator>,
}

impl GridCooling {
    pub fn new() -> Self {
        Self {
            tracks: HashMap::new(),
        }
    }

    /// Attach a magnitude grid for an (atmosphere, filter) pair.
    pub fn with_track(
        mut self,
        atmosphere: AtmosphereType,
        filter: Filter,
        grid: GridInterpolator,
    ) -> Self {
        self.tracks.insert((atmosphere, filter), grid);
        self
    }

    /// Build a track by sampling `f(cooling_time, mass)` on the given axes.
    pub fn track_from_fn<F>(times: Vec<f64>, masses: Vec<f64>, f: F) -> GridInterpolator
    where
        F: Fn(f64, f64) -> f64,
    {
        let mut data = ndarray::Array2::zeros((masses.len(), times.len()));
        for (j, &m) in masses.iter().enumerate() {
            for (i, &t) in times.iter().enumerate() {
                data[[j, i]] = f(t, m);
            }
        }
        GridInterpolator::new(times, masses, data)
            .expect("axes and data shapes agree by construction")
    }

    fn track(&self, atmosphere: AtmosphereType, filter: Filter) -> &GridInterpolator {
        self.tracks
            .get(&(atmosphere, filter))
            .unwrap_or_else(|| panic!("no cooling track loaded for {atmosphere:?}/{filter:?}"))
    }
}

impl Default for GridCooling {
    fn default() -> Self {
        Self::new()
    }
}

impl CoolingModel for GridCooling {
    fn magnitude(
        &self,
        cooling_time: f64,
        mass: f64,
        atmosphere: AtmosphereType,
        filter: Filter,
    ) -> Result<f64, GridError> {
        self.track(atmosphere, filter).interpolate(cooling_time, mass)
    }

    fn cooling_time(
        &self,
        magnitude: f64,
        mass: f64,
        atmosphere: AtmosphereType,
        filter: Filter,
    ) -> Result<f64, RootError> {
        let grid = self.track(atmosphere, filter);
        let (t_lo, t_hi) = grid.x_domain();
        invert_monotonic(
            |t| grid.interpolate_clamped(t, mass),
            magnitude,
            t_lo,
            t_hi,
            1e-9,
            200,
        )
    }
}
