//! Survey description: fields, proper-motion limits, discovery fractions.
//!
//! A [`Survey`] is an immutable bundle of per-field magnitude and
//! proper-motion limits, per-population discovery-fraction tables and
//! density profiles. It is built once from a [`SurveyConfig`] and read-only
//! thereafter; historical survey phases with different proper-motion ranges
//! are separate `Survey` values whose engine outputs compose additively.
//!
//! The field table is data-driven: each field carries its own tabulated
//! lower proper-motion limit as a function of apparent magnitude, so survey
//! phases differ only in configuration, not in type.

pub mod volume;

use crate::algo::{InterpError, MonotonicInterp};
use crate::models::{DensityProfile, Sightline};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Tangential velocity in km/s per (parsec x arcsec/yr): v_t = 4.74 d mu.
pub const KM_S_PER_PC_ARCSEC_YR: f64 = 4.74;

/// Upper edge of the tabulated discovery-fraction domain, km/s.
pub const V_TAN_MAX: f64 = 599.0;

/// Survey hemisphere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Hemisphere {
    North,
    South,
}

/// Kinematically distinct Galactic population.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KinematicPopulation {
    ThinDisk,
    ThickDisk,
    Spheroid,
}

impl KinematicPopulation {
    /// All populations, in fixed matrix-row order.
    pub const ALL: [KinematicPopulation; 3] = [
        KinematicPopulation::ThinDisk,
        KinematicPopulation::ThickDisk,
        KinematicPopulation::Spheroid,
    ];

    /// Row index of this population in volume matrices.
    pub fn index(self) -> usize {
        match self {
            KinematicPopulation::ThinDisk => 0,
            KinematicPopulation::ThickDisk => 1,
            KinematicPopulation::Spheroid => 2,
        }
    }
}

/// Bright and faint apparent-magnitude limits in one band.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BandLimits {
    pub bright: f64,
    pub faint: f64,
}

/// One survey field: pointing, solid angle and detection limits.
///
/// Rejected fields stay in the table with `included = false` and contribute
/// zero volume.
#[derive(Debug, Clone)]
pub struct SurveyField {
    id: String,
    hemisphere: Hemisphere,
    solid_angle: f64,
    band_limits: Vec<BandLimits>,
    chi2_completeness: f64,
    included: bool,
    sin_abs_gal_lat: f64,
    mu_low: MonotonicInterp,
}

impl SurveyField {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn hemisphere(&self) -> Hemisphere {
        self.hemisphere
    }

    /// Solid angle in steradians.
    pub fn solid_angle(&self) -> f64 {
        self.solid_angle
    }

    pub fn band_limits(&self) -> &[BandLimits] {
        &self.band_limits
    }

    /// Reduced-chi-squared completeness correction, in (0, 1].
    pub fn chi2_completeness(&self) -> f64 {
        self.chi2_completeness
    }

    pub fn included(&self) -> bool {
        self.included
    }

    /// Line of sight as seen by density profiles.
    pub fn sightline(&self) -> Sightline {
        Sightline {
            solid_angle: self.solid_angle,
            sin_abs_gal_lat: self.sin_abs_gal_lat,
        }
    }

    /// Lower proper-motion limit (arcsec/yr) at an apparent magnitude in
    /// the survey's primary band. Flat beyond the tabulated range.
    pub fn mu_low(&self, apparent_mag: f64) -> f64 {
        self.mu_low.eval_clamped(apparent_mag)
    }

    /// Most permissive lower proper-motion limit the field ever reaches.
    /// Bounds the outer edge of volume sweeps.
    pub fn mu_low_floor(&self) -> f64 {
        self.mu_low.min_value()
    }
}

/// Serializable description of one field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldConfig {
    pub id: String,
    pub hemisphere: Hemisphere,
    /// Solid angle in steradians.
    pub solid_angle: f64,
    pub band_limits: Vec<BandLimits>,
    /// Reduced-chi-squared completeness correction, in (0, 1].
    pub chi2_completeness: f64,
    #[serde(default = "default_included")]
    pub included: bool,
    /// |sin b| for the field's Galactic latitude.
    pub sin_abs_gal_lat: f64,
    /// Apparent magnitudes (primary band) the lower proper-motion limit is
    /// tabulated at.
    pub mu_low_mags: Vec<f64>,
    /// Lower proper-motion limits (arcsec/yr) at those magnitudes.
    pub mu_low_limits: Vec<f64>,
}

fn default_included() -> bool {
    true
}

/// Serializable discovery-fraction table for one (population, hemisphere).
///
/// The fraction is cumulative in tangential velocity: the probability that
/// an object of the population with v_t at or below the tabulated value is
/// recovered. Must be non-decreasing with values in [0, 1] on a domain
/// inside [0, `V_TAN_MAX`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryTableConfig {
    pub population: KinematicPopulation,
    pub hemisphere: Hemisphere,
    pub v_tan: Vec<f64>,
    pub fraction: Vec<f64>,
}

/// Serializable survey description.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SurveyConfig {
    /// Fixed upper proper-motion limit, arcsec/yr.
    pub mu_high: f64,
    pub fields: Vec<FieldConfig>,
    pub discovery: Vec<DiscoveryTableConfig>,
}

/// Errors building a [`Survey`] from configuration.
#[derive(Debug, Error)]
pub enum SurveyConfigError {
    #[error("field {field}: completeness {value} outside (0, 1]")]
    BadCompleteness { field: String, value: f64 },

    #[error("field {field}: no band limits configured")]
    NoBands { field: String },

    #[error("upper proper-motion limit {value} must be positive")]
    BadMuHigh { value: f64 },

    #[error("no discovery-fraction table for {population:?}/{hemisphere:?}")]
    MissingDiscoveryTable {
        population: KinematicPopulation,
        hemisphere: Hemisphere,
    },

    #[error(
        "discovery table for {population:?}/{hemisphere:?} is not a cumulative \
         fraction (values must be non-decreasing within [0, 1] on [0, {v_max}])"
    )]
    BadDiscoveryTable {
        population: KinematicPopulation,
        hemisphere: Hemisphere,
        v_max: f64,
    },

    #[error("no density profile supplied for {population:?}")]
    MissingProfile { population: KinematicPopulation },

    #[error(transparent)]
    Interp(#[from] InterpError),
}

/// Immutable survey: fields, limits, discovery fractions, density profiles.
pub struct Survey {
    fields: Vec<SurveyField>,
    mu_high: f64,
    discovery: HashMap<(KinematicPopulation, Hemisphere), MonotonicInterp>,
    profiles: HashMap<KinematicPopulation, Box<dyn DensityProfile>>,
}

impl std::fmt::Debug for Survey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Survey")
            .field("fields", &self.fields)
            .field("mu_high", &self.mu_high)
            .field("discovery", &self.discovery)
            .finish_non_exhaustive()
    }
}

impl Survey {
    /// Build a survey from configuration plus one density profile per
    /// population.
    pub fn from_config(
        config: SurveyConfig,
        profiles: HashMap<KinematicPopulation, Box<dyn DensityProfile>>,
    ) -> Result<Self, SurveyConfigError> {
        if config.mu_high <= 0.0 {
            return Err(SurveyConfigError::BadMuHigh {
                value: config.mu_high,
            });
        }
        for population in KinematicPopulation::ALL {
            if !profiles.contains_key(&population) {
                return Err(SurveyConfigError::MissingProfile { population });
            }
        }

        let mut discovery = HashMap::new();
        for table in config.discovery {
            let ok_domain = table
                .v_tan
                .iter()
                .all(|&v| (0.0..=V_TAN_MAX).contains(&v));
            let ok_values = table.fraction.iter().all(|&f| (0.0..=1.0).contains(&f))
                && table.fraction.windows(2).all(|w| w[1] >= w[0]);
            if !(ok_domain && ok_values) {
                return Err(SurveyConfigError::BadDiscoveryTable {
                    population: table.population,
                    hemisphere: table.hemisphere,
                    v_max: V_TAN_MAX,
                });
            }
            let interp = MonotonicInterp::new(table.v_tan, table.fraction)?;
            discovery.insert((table.population, table.hemisphere), interp);
        }

        let mut fields = Vec::with_capacity(config.fields.len());
        for fc in config.fields {
            if !(fc.chi2_completeness > 0.0 && fc.chi2_completeness <= 1.0) {
                return Err(SurveyConfigError::BadCompleteness {
                    field: fc.id,
                    value: fc.chi2_completeness,
                });
            }
            if fc.band_limits.is_empty() {
                return Err(SurveyConfigError::NoBands { field: fc.id });
            }
            let mu_low = MonotonicInterp::new(fc.mu_low_mags, fc.mu_low_limits)?;
            fields.push(SurveyField {
                id: fc.id,
                hemisphere: fc.hemisphere,
                solid_angle: fc.solid_angle,
                band_limits: fc.band_limits,
                chi2_completeness: fc.chi2_completeness,
                included: fc.included,
                sin_abs_gal_lat: fc.sin_abs_gal_lat,
                mu_low,
            });
        }

        // Every (population, hemisphere) a field can reach needs a table.
        for field in &fields {
            for population in KinematicPopulation::ALL {
                if !discovery.contains_key(&(population, field.hemisphere)) {
                    return Err(SurveyConfigError::MissingDiscoveryTable {
                        population,
                        hemisphere: field.hemisphere,
                    });
                }
            }
        }

        Ok(Self {
            fields,
            mu_high: config.mu_high,
            discovery,
            profiles,
        })
    }

    pub fn fields(&self) -> &[SurveyField] {
        &self.fields
    }

    /// Fixed upper proper-motion limit, arcsec/yr.
    pub fn mu_high(&self) -> f64 {
        self.mu_high
    }

    /// Cumulative discovery fraction at a tangential velocity, clamped to
    /// the tabulated domain.
    pub fn discovery_fraction(
        &self,
        population: KinematicPopulation,
        hemisphere: Hemisphere,
        v_tan: f64,
    ) -> f64 {
        self.discovery[&(population, hemisphere)].eval_clamped(v_tan)
    }

    /// Density profile for a population.
    pub fn profile(&self, population: KinematicPopulation) -> &dyn DensityProfile {
        self.profiles[&population].as_ref()
    }
}
