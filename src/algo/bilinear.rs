//! Bilinear interpolation over rectilinear (cooling time x mass) grids.
//!
//! White dwarf cooling tracks arrive as tabulated magnitude grids indexed by
//! cooling time and remnant mass, one grid per atmosphere type and filter.
//! [`GridInterpolator`] serves those lookups: binary search on each axis,
//! standard four-corner bilinear blend, optional extrapolation for queries
//! just off the tabulated edge.

use ndarray::Array2;
use thiserror::Error;

/// Errors from grid interpolation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GridError {
    /// Query coordinate lies outside the grid on the named axis.
    #[error("{axis} coordinate {value} is outside grid range [{min}, {max}]")]
    OutOfBounds {
        axis: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    /// Grid shape does not match the axis lengths.
    #[error("grid shape {shape:?} does not match axes (x: {x_len}, y: {y_len})")]
    ShapeMismatch {
        x_len: usize,
        y_len: usize,
        shape: (usize, usize),
    },
}

/// Bilinear interpolator over a 2-D tabulated grid.
///
/// Data is indexed `[y_index, x_index]`; both axes must be strictly
/// ascending. For cooling tables the x axis is cooling time and the y axis
/// is white dwarf mass.
#[derive(Debug, Clone)]
pub struct GridInterpolator {
    x_coords: Vec<f64>,
    y_coords: Vec<f64>,
    data: Array2<f64>,
    allow_extrapolation: bool,
}

impl GridInterpolator {
    /// Build an interpolator from axes and grid data.
    ///
    /// # Panics
    /// Panics if either axis is not strictly ascending.
    pub fn new(
        x_coords: Vec<f64>,
        y_coords: Vec<f64>,
        data: Array2<f64>,
    ) -> Result<Self, GridError> {
        let (ny, nx) = data.dim();
        if nx != x_coords.len() || ny != y_coords.len() || nx < 2 || ny < 2 {
            return Err(GridError::ShapeMismatch {
                x_len: x_coords.len(),
                y_len: y_coords.len(),
                shape: (ny, nx),
            });
        }
        for axis in [&x_coords, &y_coords] {
            for i in 1..axis.len() {
                assert!(
                    axis[i] > axis[i - 1],
                    "grid axes must be strictly ascending at index {i}"
                );
            }
        }
        Ok(Self {
            x_coords,
            y_coords,
            data,
            allow_extrapolation: false,
        })
    }

    /// Enable extrapolation beyond the grid edges.
    pub fn with_extrapolation(mut self, allow: bool) -> Self {
        self.allow_extrapolation = allow;
        self
    }

    /// X-axis (cooling time) bounds.
    pub fn x_domain(&self) -> (f64, f64) {
        (self.x_coords[0], self.x_coords[self.x_coords.len() - 1])
    }

    /// Y-axis (mass) bounds.
    pub fn y_domain(&self) -> (f64, f64) {
        (self.y_coords[0], self.y_coords[self.y_coords.len() - 1])
    }

    fn locate(
        &self,
        coords: &[f64],
        value: f64,
        axis: &'static str,
    ) -> Result<(usize, f64), GridError> {
        let n = coords.len();
        let (min, max) = (coords[0], coords[n - 1]);
        if (value < min || value > max) && !self.allow_extrapolation {
            return Err(GridError::OutOfBounds {
                axis,
                value,
                min,
                max,
            });
        }
        if value <= coords[0] {
            return Ok((0, (value - coords[0]) / (coords[1] - coords[0])));
        }
        if value >= coords[n - 1] {
            let i = n - 2;
            return Ok((i, (value - coords[i]) / (coords[i + 1] - coords[i])));
        }
        let mut left = 0;
        let mut right = n - 1;
        while left < right - 1 {
            let mid = (left + right) / 2;
            if value < coords[mid] {
                right = mid;
            } else {
                left = mid;
            }
        }
        Ok((
            left,
            (value - coords[left]) / (coords[left + 1] - coords[left]),
        ))
    }

    /// Interpolate the grid at `(x, y)`.
    pub fn interpolate(&self, x: f64, y: f64) -> Result<f64, GridError> {
        let (xi, tx) = self.locate(&self.x_coords, x, "x")?;
        let (yi, ty) = self.locate(&self.y_coords, y, "y")?;

        let q11 = self.data[[yi, xi]];
        let q21 = self.data[[yi, xi + 1]];
        let q12 = self.data[[yi + 1, xi]];
        let q22 = self.data[[yi + 1, xi + 1]];

        Ok(q11 * (1.0 - tx) * (1.0 - ty)
            + q21 * tx * (1.0 - ty)
            + q12 * (1.0 - tx) * ty
            + q22 * tx * ty)
    }

    /// Interpolate with both coordinates clamped into the grid domain.
    ///
    /// Useful when the caller has already decided edge values are the right
    /// answer beyond the table (e.g. bisecting a cooling track in time).
    pub fn interpolate_clamped(&self, x: f64, y: f64) -> f64 {
        let (x0, x1) = self.x_domain();
        let (y0, y1) = self.y_domain();
        match self.interpolate(x.clamp(x0, x1), y.clamp(y0, y1)) {
            Ok(v) => v,
            // Unreachable after clamping; keep a defined value regardless.
            Err(_) => f64::NAN,
        }
    }
}
