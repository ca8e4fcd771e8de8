//! Magnitude binning and the observed luminosity function.
//!
//! The density matcher requires the synthesized and observed partitions of
//! the magnitude axis to agree exactly (edge for edge, to floating
//! tolerance), so binning is centralized here: a [`MagnitudeGrid`] defines
//! the partition, [`BinnedStars`] holds synthesized stars per bin plus an
//! overflow bucket for stars outside survey coverage, and
//! [`ObservedLuminosityFunction`] is the read-only matching target.

use crate::synthesis::Star;

/// Default tolerance for bin-edge equality checks, magnitudes.
pub const EDGE_TOL: f64 = 1e-9;

/// Ordered partition of the magnitude axis.
#[derive(Debug, Clone, PartialEq)]
pub struct MagnitudeGrid {
    edges: Vec<f64>,
}

impl MagnitudeGrid {
    /// Build a grid from bin edges.
    ///
    /// # Panics
    /// Panics unless at least two strictly ascending edges are given.
    pub fn new(edges: Vec<f64>) -> Self {
        assert!(edges.len() >= 2, "need at least two bin edges");
        for i in 1..edges.len() {
            assert!(
                edges[i] > edges[i - 1],
                "bin edges must be strictly ascending at index {i}"
            );
        }
        Self { edges }
    }

    /// Uniform grid of `n_bins` bins over `[lo, hi]`.
    pub fn uniform(lo: f64, hi: f64, n_bins: usize) -> Self {
        assert!(n_bins > 0 && hi > lo, "empty grid");
        let width = (hi - lo) / n_bins as f64;
        Self::new((0..=n_bins).map(|i| lo + i as f64 * width).collect())
    }

    pub fn n_bins(&self) -> usize {
        self.edges.len() - 1
    }

    pub fn edges(&self) -> &[f64] {
        &self.edges
    }

    pub fn centre(&self, bin: usize) -> f64 {
        0.5 * (self.edges[bin] + self.edges[bin + 1])
    }

    pub fn width(&self, bin: usize) -> f64 {
        self.edges[bin + 1] - self.edges[bin]
    }

    /// Full magnitude range covered by the grid.
    pub fn range(&self) -> (f64, f64) {
        (self.edges[0], self.edges[self.edges.len() - 1])
    }

    /// Bin containing `mag`. Bins are half-open `[lo, hi)`; the last bin
    /// also includes its upper edge.
    pub fn bin_index(&self, mag: f64) -> Option<usize> {
        let (lo, hi) = self.range();
        if mag < lo || mag > hi {
            return None;
        }
        if mag == hi {
            return Some(self.n_bins() - 1);
        }
        // partition_point: first edge strictly above mag.
        let upper = self.edges.partition_point(|&e| e <= mag);
        Some(upper - 1)
    }

    /// Edge-for-edge equality to within `tol` (centres and widths both).
    pub fn matches(&self, other: &MagnitudeGrid, tol: f64) -> bool {
        self.n_bins() == other.n_bins()
            && self
                .edges
                .iter()
                .zip(&other.edges)
                .all(|(a, b)| (a - b).abs() <= tol)
    }
}

/// Observed luminosity function: per-bin density and 1-sigma uncertainty.
#[derive(Debug, Clone)]
pub struct ObservedLuminosityFunction {
    grid: MagnitudeGrid,
    density: Vec<f64>,
    sigma: Vec<f64>,
}

impl ObservedLuminosityFunction {
    /// # Panics
    /// Panics if the density/uncertainty vectors do not match the grid.
    pub fn new(grid: MagnitudeGrid, density: Vec<f64>, sigma: Vec<f64>) -> Self {
        assert_eq!(density.len(), grid.n_bins(), "density length != bin count");
        assert_eq!(sigma.len(), grid.n_bins(), "sigma length != bin count");
        Self {
            grid,
            density,
            sigma,
        }
    }

    pub fn grid(&self) -> &MagnitudeGrid {
        &self.grid
    }

    pub fn density(&self, bin: usize) -> f64 {
        self.density[bin]
    }

    pub fn sigma(&self, bin: usize) -> f64 {
        self.sigma[bin]
    }
}

/// Synthesized stars partitioned by magnitude bin.
///
/// Stars whose magnitude falls outside the grid live in the overflow
/// bucket: they are retained for formation-time accounting but never
/// touched by density matching. Each star is owned by exactly one bin;
/// stars never move between bins.
#[derive(Debug, Clone)]
pub struct BinnedStars {
    grid: MagnitudeGrid,
    bins: Vec<Vec<Star>>,
    outside: Vec<Star>,
}

impl BinnedStars {
    pub fn new(grid: MagnitudeGrid) -> Self {
        let bins = vec![Vec::new(); grid.n_bins()];
        Self {
            grid,
            bins,
            outside: Vec::new(),
        }
    }

    pub fn grid(&self) -> &MagnitudeGrid {
        &self.grid
    }

    /// Route a star to its magnitude bin, or to the overflow bucket.
    pub fn insert(&mut self, star: Star) {
        match self.grid.bin_index(star.magnitude) {
            Some(bin) => self.bins[bin].push(star),
            None => self.outside.push(star),
        }
    }

    pub fn bin(&self, bin: usize) -> &[Star] {
        &self.bins[bin]
    }

    pub fn bin_mut(&mut self, bin: usize) -> &mut [Star] {
        &mut self.bins[bin]
    }

    pub fn outside(&self) -> &[Star] {
        &self.outside
    }

    /// All stars, binned and overflow alike.
    pub fn iter(&self) -> impl Iterator<Item = &Star> {
        self.bins.iter().flatten().chain(self.outside.iter())
    }

    /// Total count including overflow.
    pub fn len(&self) -> usize {
        self.bins.iter().map(Vec::len).sum::<usize>() + self.outside.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sum of weights and of variances in one bin.
    pub fn bin_totals(&self, bin: usize) -> (f64, f64) {
        self.bins[bin]
            .iter()
            .fold((0.0, 0.0), |(w, v), star| {
                (w + star.weight(), v + star.variance())
            })
    }

    /// Absorb another set binned on an identical grid.
    ///
    /// # Panics
    /// Panics if the grids differ — merging across partitions is a
    /// programming error.
    pub fn merge(&mut self, other: BinnedStars) {
        assert!(
            self.grid.matches(&other.grid, EDGE_TOL),
            "cannot merge stars binned on different grids"
        );
        for (mine, theirs) in self.bins.iter_mut().zip(other.bins) {
            mine.extend(theirs);
        }
        self.outside.extend(other.outside);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AtmosphereType;
    use approx::assert_relative_eq;

    fn star_at(mag: f64) -> Star {
        Star::new_for_tests(mag, 5.0e9, true, AtmosphereType::H)
    }

    #[test]
    fn uniform_grid_edges() {
        let grid = MagnitudeGrid::uniform(10.0, 15.0, 10);
        assert_eq!(grid.n_bins(), 10);
        assert_relative_eq!(grid.width(0), 0.5, epsilon = 1e-12);
        assert_relative_eq!(grid.centre(0), 10.25, epsilon = 1e-12);
        assert_eq!(grid.range(), (10.0, 15.0));
    }

    #[test]
    fn bin_index_half_open_with_closed_top() {
        let grid = MagnitudeGrid::uniform(0.0, 4.0, 4);
        assert_eq!(grid.bin_index(0.0), Some(0));
        assert_eq!(grid.bin_index(0.999), Some(0));
        assert_eq!(grid.bin_index(1.0), Some(1));
        assert_eq!(grid.bin_index(4.0), Some(3));
        assert_eq!(grid.bin_index(4.001), None);
        assert_eq!(grid.bin_index(-0.1), None);
    }

    #[test]
    fn grids_match_within_tolerance() {
        let a = MagnitudeGrid::uniform(10.0, 15.0, 5);
        let b = MagnitudeGrid::new(vec![10.0, 11.0 + 1e-12, 12.0, 13.0, 14.0, 15.0]);
        assert!(a.matches(&b, 1e-9));
        let c = MagnitudeGrid::uniform(10.0, 15.0, 10);
        assert!(!a.matches(&c, 1e-9));
    }

    #[test]
    fn insert_routes_to_overflow() {
        let mut stars = BinnedStars::new(MagnitudeGrid::uniform(12.0, 16.0, 4));
        stars.insert(star_at(12.5));
        stars.insert(star_at(20.0));
        assert_eq!(stars.bin(0).len(), 1);
        assert_eq!(stars.outside().len(), 1);
        assert_eq!(stars.len(), 2);
    }

    #[test]
    fn bin_totals_sum_weights() {
        let mut stars = BinnedStars::new(MagnitudeGrid::uniform(12.0, 16.0, 2));
        stars.insert(star_at(12.5));
        stars.insert(star_at(13.0));
        let (w, v) = stars.bin_totals(0);
        assert_relative_eq!(w, 2.0, epsilon = 1e-12);
        assert_relative_eq!(v, 2.0, epsilon = 1e-12);
    }

    #[test]
    fn merge_combines_bins() {
        let grid = MagnitudeGrid::uniform(12.0, 16.0, 2);
        let mut a = BinnedStars::new(grid.clone());
        a.insert(star_at(12.5));
        let mut b = BinnedStars::new(grid);
        b.insert(star_at(12.6));
        b.insert(star_at(17.0));
        a.merge(b);
        assert_eq!(a.bin(0).len(), 2);
        assert_eq!(a.outside().len(), 1);
    }

    #[test]
    #[should_panic(expected = "different grids")]
    fn merge_rejects_mismatched_grids() {
        let mut a = BinnedStars::new(MagnitudeGrid::uniform(12.0, 16.0, 2));
        let b = BinnedStars::new(MagnitudeGrid::uniform(12.0, 16.0, 4));
        a.merge(b);
    }
}
