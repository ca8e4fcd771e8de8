//! Selection-function volume integrators.
//!
//! The survey's sensitivity boundary for a star is the intersection of its
//! magnitude window (bright/faint limits per band) and its proper-motion
//! window (fixed upper limit, magnitude-dependent tabulated lower limit).
//! Because the lower proper-motion limit is not analytically invertible, the
//! distance window is swept in a geometric sequence of constant
//! fractional-magnitude annuli; each annulus is tested against the local
//! limit at its geometric midpoint and contributes the density-weighted
//! shell volume of the population's profile.
//!
//! [`VolumeEngine::vmax`] produces the classical V and Vmax per kinematic
//! population for one star; [`VolumeEngine::marginalized_vmax`] splits Vmax
//! by tangential-velocity sub-range with discovery-fraction and
//! chi-squared completeness weights, producing the design-matrix cells used
//! by population decomposition.

use super::{
    KinematicPopulation, Survey, SurveyField, KM_S_PER_PC_ARCSEC_YR, V_TAN_MAX,
};
use log::debug;
use ndarray::{Array2, ArrayView1};
use rayon::prelude::*;

/// Default fractional-magnitude annulus step, magnitudes.
pub const DEFAULT_MAG_STEP: f64 = 0.05;

/// A star as the selection function sees it: absolute magnitudes in the
/// survey bands (ordered as the fields' band limits) and a tangential
/// velocity in km/s.
#[derive(Debug, Clone)]
pub struct StarSightline {
    pub abs_mags: Vec<f64>,
    pub v_tan: f64,
}

/// Generalized volume to the star's distance (V) and to the survey limit
/// (Vmax), for one population.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct VolumePair {
    pub v: f64,
    pub vmax: f64,
}

impl VolumePair {
    /// The classical V/Vmax completeness statistic, uniform on [0, 1] for
    /// an unbiased, correctly modeled sample.
    pub fn completeness(&self) -> f64 {
        if self.vmax > 0.0 {
            self.v / self.vmax
        } else {
            f64::NAN
        }
    }
}

/// One value per kinematic population.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PerPopulation<T> {
    pub thin_disk: T,
    pub thick_disk: T,
    pub spheroid: T,
}

impl<T> PerPopulation<T> {
    pub fn get(&self, population: KinematicPopulation) -> &T {
        match population {
            KinematicPopulation::ThinDisk => &self.thin_disk,
            KinematicPopulation::ThickDisk => &self.thick_disk,
            KinematicPopulation::Spheroid => &self.spheroid,
        }
    }

    pub fn get_mut(&mut self, population: KinematicPopulation) -> &mut T {
        match population {
            KinematicPopulation::ThinDisk => &mut self.thin_disk,
            KinematicPopulation::ThickDisk => &mut self.thick_disk,
            KinematicPopulation::Spheroid => &mut self.spheroid,
        }
    }
}

impl PerPopulation<VolumePair> {
    fn merge(mut self, other: Self) -> Self {
        for population in KinematicPopulation::ALL {
            let pair = self.get_mut(population);
            let o = other.get(population);
            pair.v += o.v;
            pair.vmax += o.vmax;
        }
        self
    }
}

/// [population x velocity-bin] generalized-volume matrix.
///
/// Rows follow `KinematicPopulation::ALL` order. Entries are sums of
/// non-negative per-field contributions, so the matrix is non-negative by
/// construction.
#[derive(Debug, Clone)]
pub struct VolumeMatrix {
    velocity_edges: Vec<f64>,
    discrete: bool,
    data: Array2<f64>,
}

impl VolumeMatrix {
    pub fn get(&self, population: KinematicPopulation, bin: usize) -> f64 {
        self.data[[population.index(), bin]]
    }

    pub fn n_velocity_bins(&self) -> usize {
        self.velocity_edges.len() - 1
    }

    pub fn velocity_edges(&self) -> &[f64] {
        &self.velocity_edges
    }

    /// Whether the bins are discrete sub-ranges (true) or cumulative from
    /// the lowest edge (false).
    pub fn discrete(&self) -> bool {
        self.discrete
    }

    pub fn row(&self, population: KinematicPopulation) -> ArrayView1<'_, f64> {
        self.data.row(population.index())
    }

    /// Sum across velocity bins for one population. Physically meaningful
    /// for discrete bins, where the sub-ranges partition the velocity axis.
    pub fn population_total(&self, population: KinematicPopulation) -> f64 {
        self.row(population).sum()
    }
}

/// Distance (pc) at which a star of the given absolute magnitude shows the
/// given apparent magnitude.
fn limit_distance(apparent_mag: f64, abs_mag: f64) -> f64 {
    10.0_f64.powf(0.2 * (apparent_mag - abs_mag) + 1.0)
}

/// Annulus inclusion predicate: the star's tangential velocity must map to
/// a proper motion inside `[mu_low, mu_high]` at this distance.
pub fn annulus_admits(v_tan: f64, distance: f64, mu_low: f64, mu_high: f64) -> bool {
    let v_lo = mu_low * KM_S_PER_PC_ARCSEC_YR * distance;
    let v_hi = mu_high * KM_S_PER_PC_ARCSEC_YR * distance;
    v_tan >= v_lo && v_tan <= v_hi
}

/// Selection-function volume engine over one survey.
pub struct VolumeEngine<'a> {
    survey: &'a Survey,
    mag_step: f64,
}

impl<'a> VolumeEngine<'a> {
    pub fn new(survey: &'a Survey) -> Self {
        Self {
            survey,
            mag_step: DEFAULT_MAG_STEP,
        }
    }

    /// Override the annulus step in magnitudes.
    ///
    /// # Panics
    /// Panics unless `0 < mag_step <= 1`.
    pub fn with_mag_step(mut self, mag_step: f64) -> Self {
        assert!(
            mag_step > 0.0 && mag_step <= 1.0,
            "annulus step must be in (0, 1] mag"
        );
        self.mag_step = mag_step;
        self
    }

    /// Ratio between consecutive annulus edge distances.
    fn step_factor(&self) -> f64 {
        10.0_f64.powf(self.mag_step / 5.0)
    }

    /// Generalized V and Vmax per population for a star at `distance` pc.
    ///
    /// Fields contribute independently and are summed; excluded fields and
    /// empty sensitivity windows contribute zero. V caps the faint edge at
    /// the star's own distance, Vmax does not, so `v <= vmax` always.
    pub fn vmax(&self, star: &StarSightline, distance: f64) -> PerPopulation<VolumePair> {
        self.survey
            .fields()
            .par_iter()
            .map(|field| self.vmax_field(field, star, distance))
            .reduce(PerPopulation::default, PerPopulation::merge)
    }

    fn vmax_field(
        &self,
        field: &SurveyField,
        star: &StarSightline,
        distance: f64,
    ) -> PerPopulation<VolumePair> {
        let mut out = PerPopulation::<VolumePair>::default();
        if !field.included() {
            return out;
        }
        assert_eq!(
            star.abs_mags.len(),
            field.band_limits().len(),
            "star bands do not match field {} band limits",
            field.id()
        );

        let Some((d_lo, d_hi)) = self.sweep_window(field, &star.abs_mags, Some(star.v_tan))
        else {
            return out;
        };

        let sightline = field.sightline();
        let factor = self.step_factor();
        let mu_high = self.survey.mu_high();
        let mut d = d_lo;
        while d < d_hi {
            let d_next = (d * factor).min(d_hi);
            let mid = (d * d_next).sqrt();
            let m_app = star.abs_mags[0] + 5.0 * (mid / 10.0).log10();
            if annulus_admits(star.v_tan, mid, field.mu_low(m_app), mu_high) {
                for population in KinematicPopulation::ALL {
                    let profile = self.survey.profile(population);
                    let pair = out.get_mut(population);
                    pair.vmax += profile.generalized_volume(d_next, &sightline)
                        - profile.generalized_volume(d, &sightline);
                    if d < distance {
                        pair.v += profile.generalized_volume(d_next.min(distance), &sightline)
                            - profile.generalized_volume(d, &sightline);
                    }
                }
            }
            d = d_next;
        }
        out
    }

    /// Vmax split by tangential-velocity sub-range, weighted by discovery
    /// fraction and chi-squared completeness.
    ///
    /// With `discrete = true` bin `i` covers `[edges[i], edges[i+1]]`; with
    /// `discrete = false` bin `i` covers the cumulative `[edges[0],
    /// edges[i+1]]`. Per annulus, each sub-range is intersected with the
    /// local sensitivity window `[mu_low(m) 4.74 d, mu_high 4.74 d]`
    /// (clamped to the tabulated discovery domain) and weighted by the
    /// discovery-fraction increment across the intersection.
    ///
    /// # Panics
    /// Panics if fewer than two velocity edges are given or they are not
    /// strictly ascending.
    pub fn marginalized_vmax(
        &self,
        abs_mags: &[f64],
        velocity_edges: &[f64],
        discrete: bool,
    ) -> VolumeMatrix {
        assert!(
            velocity_edges.len() >= 2,
            "need at least two velocity edges"
        );
        for i in 1..velocity_edges.len() {
            assert!(
                velocity_edges[i] > velocity_edges[i - 1],
                "velocity edges must be strictly ascending"
            );
        }
        let n_bins = velocity_edges.len() - 1;

        let data = self
            .survey
            .fields()
            .par_iter()
            .map(|field| self.marginalized_field(field, abs_mags, velocity_edges, discrete))
            .reduce(
                || Array2::zeros((KinematicPopulation::ALL.len(), n_bins)),
                |mut acc, part| {
                    acc += &part;
                    acc
                },
            );

        VolumeMatrix {
            velocity_edges: velocity_edges.to_vec(),
            discrete,
            data,
        }
    }

    fn marginalized_field(
        &self,
        field: &SurveyField,
        abs_mags: &[f64],
        edges: &[f64],
        discrete: bool,
    ) -> Array2<f64> {
        let n_bins = edges.len() - 1;
        let mut out = Array2::zeros((KinematicPopulation::ALL.len(), n_bins));
        if !field.included() {
            return out;
        }
        assert_eq!(
            abs_mags.len(),
            field.band_limits().len(),
            "magnitudes do not match field {} band limits",
            field.id()
        );

        let Some((d_lo, d_hi)) = self.sweep_window(field, abs_mags, None) else {
            return out;
        };
        debug!(
            "field {}: marginalized sweep over [{d_lo:.1}, {d_hi:.1}] pc",
            field.id()
        );

        let sightline = field.sightline();
        let factor = self.step_factor();
        let mu_high = self.survey.mu_high();
        let chi2 = field.chi2_completeness();
        let mut d = d_lo;
        while d < d_hi {
            let d_next = (d * factor).min(d_hi);
            let mid = (d * d_next).sqrt();
            let m_app = abs_mags[0] + 5.0 * (mid / 10.0).log10();
            let vt_min = (field.mu_low(m_app) * KM_S_PER_PC_ARCSEC_YR * mid).clamp(0.0, V_TAN_MAX);
            let vt_max = (mu_high * KM_S_PER_PC_ARCSEC_YR * mid).clamp(0.0, V_TAN_MAX);
            if vt_max > vt_min {
                for population in KinematicPopulation::ALL {
                    let profile = self.survey.profile(population);
                    let shell = profile.generalized_volume(d_next, &sightline)
                        - profile.generalized_volume(d, &sightline);
                    for bin in 0..n_bins {
                        let (v_lo, v_hi) = if discrete {
                            (edges[bin], edges[bin + 1])
                        } else {
                            (edges[0], edges[bin + 1])
                        };
                        let lo = v_lo.max(vt_min);
                        let hi = v_hi.min(vt_max);
                        if hi <= lo {
                            continue;
                        }
                        let weight = self
                            .survey
                            .discovery_fraction(population, field.hemisphere(), hi)
                            - self
                                .survey
                                .discovery_fraction(population, field.hemisphere(), lo);
                        if weight > 0.0 {
                            out[[population.index(), bin]] += shell * weight * chi2;
                        }
                    }
                }
            }
            d = d_next;
        }
        out
    }

    /// Intersect the magnitude window with the proper-motion window.
    ///
    /// Returns `None` when the combined window is empty — a zero
    /// contribution, never an error.
    fn sweep_window(
        &self,
        field: &SurveyField,
        abs_mags: &[f64],
        v_tan: Option<f64>,
    ) -> Option<(f64, f64)> {
        let mut d_min = 0.0_f64;
        let mut d_max = f64::INFINITY;
        for (abs_mag, limits) in abs_mags.iter().zip(field.band_limits()) {
            d_min = d_min.max(limit_distance(limits.bright, *abs_mag));
            d_max = d_max.min(limit_distance(limits.faint, *abs_mag));
        }
        if let Some(v_tan) = v_tan {
            d_min = d_min.max(v_tan / (KM_S_PER_PC_ARCSEC_YR * self.survey.mu_high()));
            let floor = field.mu_low_floor();
            if floor > 0.0 {
                d_max = d_max.min(v_tan / (KM_S_PER_PC_ARCSEC_YR * floor));
            }
        }
        (d_max > d_min && d_min.is_finite()).then_some((d_min, d_max))
    }
}

/// Mean V/Vmax over a sample, skipping entries with zero Vmax.
///
/// Expected 0.5 for an unbiased, volume-complete sample.
pub fn mean_v_over_vmax(pairs: &[VolumePair]) -> f64 {
    let valid: Vec<f64> = pairs
        .iter()
        .filter(|p| p.vmax > 0.0)
        .map(VolumePair::completeness)
        .collect();
    if valid.is_empty() {
        return f64::NAN;
    }
    valid.iter().sum::<f64>() / valid.len() as f64
}
