use std::ops::Deref;

use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

use crate::centroid::centroid;

mod builder;
pub use builder::FringeFilterBuilder;

/// Fourier fringe filter
///
/// A non-negative weight array with the shape of the centered interferogram spectrum,
/// localized around the carrier frequency sideband.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FringeFilter(DMatrix<f64>);

impl From<DMatrix<f64>> for FringeFilter {
    /// Uses an explicit frequency-domain region as the filter
    fn from(region: DMatrix<f64>) -> Self {
        Self(region)
    }
}

impl Deref for FringeFilter {
    type Target = DMatrix<f64>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl FringeFilter {
    /// Returns the `(x, y)` centroid of the filter in the centered spectrum
    pub fn carrier(&self) -> (f64, f64) {
        centroid(&self.0, 0.)
    }
    /// Returns the carrier `(rows, columns)` offset from the zero frequency rounded to the nearest bin
    pub fn carrier_offset(&self) -> (isize, isize) {
        let (nrows, ncols) = self.0.shape();
        let (x, y) = self.carrier();
        (
            y.round() as isize - (nrows / 2) as isize,
            x.round() as isize - (ncols / 2) as isize,
        )
    }
    /// Checks if the filter weights sum to (almost) zero
    pub fn is_vanishing(&self) -> bool {
        let s = self.0.sum();
        !s.is_finite() || s.abs() <= f64::EPSILON
    }
    pub fn as_matrix(&self) -> &DMatrix<f64> {
        &self.0
    }
    pub fn into_inner(self) -> DMatrix<f64> {
        self.0
    }
}
