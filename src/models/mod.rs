//! Trait contracts for the stellar-physics collaborators.
//!
//! The volume engine and synthesizer consume stellar models only through the
//! narrow numeric contracts below: main-sequence lifetimes, the
//! initial-final mass relation, cooling tracks, density profiles and the
//! formation-time / mass / composition distributions. Grid readers, fitted
//! colour transformations and the like live outside this crate; anything
//! satisfying these traits plugs in.

pub mod analytic;

use crate::algo::{invert_monotonic, GridError, RootError};
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

/// White dwarf atmosphere composition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AtmosphereType {
    /// Hydrogen-dominated (DA).
    H,
    /// Helium-dominated (DB).
    He,
}

/// Photometric filter a cooling track is tabulated in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Filter {
    Bolometric,
    JohnsonV,
    JohnsonB,
    JohnsonR,
    JohnsonI,
}

/// Line of sight through a survey field, as seen by a density profile.
///
/// Density profiles only need the field's solid angle and its inclination
/// out of the Galactic plane; the full field record stays in `survey`.
#[derive(Debug, Clone, Copy)]
pub struct Sightline {
    /// Field solid angle in steradians.
    pub solid_angle: f64,
    /// |sin b| for the field's Galactic latitude b.
    pub sin_abs_gal_lat: f64,
}

/// Main-sequence lifetime as a function of initial mass and composition.
///
/// Lifetime is monotonic decreasing in mass; the default inverse goes
/// through bisection and propagates a [`RootError`] if that assumption is
/// violated by the implementation.
pub trait LifetimeModel: Send + Sync {
    /// Main-sequence lifetime in years for `mass` solar masses at
    /// composition `(z, y)`.
    fn lifetime(&self, mass: f64, z: f64, y: f64) -> f64;

    /// Mass range (solar masses) the model is valid over.
    fn mass_range(&self) -> (f64, f64);

    /// Initial mass whose main-sequence lifetime equals `lifetime` years.
    fn progenitor_mass(&self, lifetime: f64, z: f64, y: f64) -> Result<f64, RootError> {
        let (lo, hi) = self.mass_range();
        let tol = (lifetime.abs() * 1e-8).max(1.0);
        invert_monotonic(|m| self.lifetime(m, z, y), lifetime, lo, hi, tol, 200)
    }
}

/// Initial-final mass relation, monotonic increasing.
pub trait Ifmr: Send + Sync {
    /// White dwarf mass left by a progenitor of `initial_mass` solar masses.
    fn final_mass(&self, initial_mass: f64) -> f64;

    /// Progenitor mass for a white dwarf of `final_mass` solar masses.
    fn initial_mass(&self, final_mass: f64) -> f64;
}

/// White dwarf cooling tracks: magnitude as a function of cooling time and
/// remnant mass, per atmosphere type and filter.
pub trait CoolingModel: Send + Sync {
    /// Magnitude after `cooling_time` years for a white dwarf of `mass`
    /// solar masses.
    fn magnitude(
        &self,
        cooling_time: f64,
        mass: f64,
        atmosphere: AtmosphereType,
        filter: Filter,
    ) -> Result<f64, GridError>;

    /// Cooling time in years at which the white dwarf reaches `magnitude`.
    /// Magnitude is monotonic increasing in cooling time at fixed mass.
    fn cooling_time(
        &self,
        magnitude: f64,
        mass: f64,
        atmosphere: AtmosphereType,
        filter: Filter,
    ) -> Result<f64, RootError>;
}

/// Stellar number-density profile along a sightline.
pub trait DensityProfile: Send + Sync {
    /// Generalized volume out to `distance` parsecs: the profile-weighted
    /// volume integral over the sightline's cone. Monotonic non-decreasing
    /// in distance.
    fn generalized_volume(&self, distance: f64, sightline: &Sightline) -> f64;
}

/// Initial mass function.
pub trait Imf: Send + Sync {
    /// Draw an initial mass in solar masses.
    fn draw_mass(&self, rng: &mut StdRng) -> f64;

    /// Cumulative fraction of stars with mass `<= mass`, in [0, 1].
    fn integral(&self, mass: f64) -> f64;

    /// Mass range (solar masses) the IMF covers.
    fn mass_range(&self) -> (f64, f64);
}

/// Star formation rate as a distribution over look-back time.
pub trait Sfr: Send + Sync {
    /// Draw a formation look-back time in years.
    fn draw_formation_time(&self, rng: &mut StdRng) -> f64;

    /// Largest look-back time the model assigns any formation to.
    fn max_lookback(&self) -> f64;
}

/// Joint metallicity distribution.
pub trait MetallicityDist: Send + Sync {
    /// Draw a `(Z, Y)` composition pair.
    fn draw(&self, rng: &mut StdRng) -> (f64, f64);
}
