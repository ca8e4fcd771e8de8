#![allow(dead_code)]

use std::collections::HashMap;
use wdlf::models::analytic::{ExponentialLayer, GridCooling, UniformDensity};
use wdlf::models::DensityProfile;
use wdlf::survey::{
    BandLimits, DiscoveryTableConfig, FieldConfig, SurveyConfig, V_TAN_MAX,
};
use wdlf::{AtmosphereType, Filter, Hemisphere, KinematicPopulation, Survey};

/// Standard three-population profile set: exponential thin and thick disk
/// layers plus a uniform spheroid.
pub fn galactic_profiles() -> HashMap<KinematicPopulation, Box<dyn DensityProfile>> {
    let mut profiles: HashMap<KinematicPopulation, Box<dyn DensityProfile>> = HashMap::new();
    profiles.insert(
        KinematicPopulation::ThinDisk,
        Box::new(ExponentialLayer::new(250.0)),
    );
    profiles.insert(
        KinematicPopulation::ThickDisk,
        Box::new(ExponentialLayer::new(780.0)),
    );
    profiles.insert(KinematicPopulation::Spheroid, Box::new(UniformDensity));
    profiles
}

/// Discovery fractions rising linearly from 0 to 1 over the full tabulated
/// velocity domain, for every population and hemisphere.
pub fn linear_discovery_tables() -> Vec<DiscoveryTableConfig> {
    let mut tables = Vec::new();
    for population in KinematicPopulation::ALL {
        for hemisphere in [Hemisphere::North, Hemisphere::South] {
            tables.push(DiscoveryTableConfig {
                population,
                hemisphere,
                v_tan: vec![0.0, V_TAN_MAX],
                fraction: vec![0.0, 1.0],
            });
        }
    }
    tables
}

/// A single-field survey whose proper-motion limits never truncate the
/// magnitude window for slow nearby stars: the lower limit is effectively
/// zero and the upper limit enormous. A 14th-absolute-magnitude star sees
/// the exact distance window [10, 100] pc.
pub fn wide_open_survey() -> Survey {
    let config = SurveyConfig {
        mu_high: 10.0,
        fields: vec![FieldConfig {
            id: "wide".into(),
            hemisphere: Hemisphere::North,
            solid_angle: 0.01,
            band_limits: vec![BandLimits {
                bright: 14.0,
                faint: 19.0,
            }],
            chi2_completeness: 1.0,
            included: true,
            sin_abs_gal_lat: 0.7,
            mu_low_mags: vec![0.0, 30.0],
            mu_low_limits: vec![1.0e-4, 1.0e-4],
        }],
        discovery: linear_discovery_tables(),
    };
    Survey::from_config(config, galactic_profiles()).expect("valid test survey")
}

/// Cooling model with an analytic magnitude surface over log-spaced cooling
/// times from 1 yr to 1e12 yr, loaded for both atmospheres.
pub fn log_cooling() -> GridCooling {
    let times: Vec<f64> = (0..=120).map(|k| 10.0_f64.powf(k as f64 * 0.1)).collect();
    let masses: Vec<f64> = (3..=14).map(|k| k as f64 * 0.1).collect();
    let surface = |t: f64, m: f64| 5.0 * (t / 1.0e9).log10() + 13.0 + 2.0 * (m - 0.6);
    let h = GridCooling::track_from_fn(times.clone(), masses.clone(), surface);
    let he = GridCooling::track_from_fn(times, masses, surface);
    GridCooling::new()
        .with_track(AtmosphereType::H, Filter::Bolometric, h)
        .with_track(AtmosphereType::He, Filter::Bolometric, he)
}
