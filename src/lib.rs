//! White dwarf survey selection volumes and star formation history inversion
//!
//! This crate computes generalized survey volumes (V, Vmax and their
//! velocity-marginalized variants) for magnitude- and proper-motion-limited
//! white dwarf surveys, synthesizes white dwarf populations by Monte Carlo
//! from star formation, initial mass and metallicity distributions, and
//! inverts an observed luminosity function into a star formation rate
//! history with the corrections that inversion requires.

pub mod algo;
pub mod inversion;
pub mod lf;
pub mod models;
pub mod stellar;
pub mod survey;
pub mod synthesis;

// Re-exports for easier access
pub use algo::{invert_monotonic, GridInterpolator, MonotonicInterp};
pub use inversion::{
    fraction_wd_progenitors, get_sfr, scale_to_observed_density, SfrEstimate, SfrParams,
};
pub use lf::{BinnedStars, MagnitudeGrid, ObservedLuminosityFunction};
pub use models::{AtmosphereType, Filter, Sightline};
pub use stellar::{min_wd_mass, turnoff_mass, TurnoffMass};
pub use survey::volume::{
    mean_v_over_vmax, PerPopulation, StarSightline, VolumeEngine, VolumeMatrix, VolumePair,
};
pub use survey::{Hemisphere, KinematicPopulation, Survey, SurveyConfig, SurveyField};
pub use synthesis::{synthesize, PopulationSynthesizer, Star, SynthesisModels, SynthesisParams};
