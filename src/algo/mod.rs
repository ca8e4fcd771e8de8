//! Shared numeric kernels: root finding and tabulated interpolation.

pub mod bilinear;
pub mod interp;
pub mod roots;

pub use bilinear::{GridError, GridInterpolator};
pub use interp::{InterpError, MonotonicInterp};
pub use roots::{invert_monotonic, RootError};
