use std::ops::Deref;

use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

use crate::{AoError, Result};

/// Circular pupil mask
///
/// The mask is a square boolean array of side `2 * radius` centered on the
/// array indices `(radius, radius)`; a pixel `(y, x)` is inside the pupil if
/// `(y - radius)² + (x - radius)² < radius²`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PupilMask {
    radius: usize,
    mask: DMatrix<bool>,
}

impl PupilMask {
    /// Creates a new pupil mask of the given radius in pixels
    pub fn new(radius: usize) -> Result<Self> {
        if radius == 0 {
            return Err(AoError::InvalidRadius(radius));
        }
        let side = 2 * radius;
        let r = radius as i64;
        let mask = DMatrix::from_fn(side, side, |i, j| {
            let y = i as i64 - r;
            let x = j as i64 - r;
            y * y + x * x < r * r
        });
        Ok(Self { radius, mask })
    }
    /// Creates the mask inscribed in a square array of the given side
    pub fn inscribed(side: usize) -> Result<Self> {
        if side == 0 || side % 2 != 0 {
            return Err(AoError::NotSquare(side, side));
        }
        Self::new(side / 2)
    }
    #[inline]
    pub fn radius(&self) -> usize {
        self.radius
    }
    #[inline]
    pub fn side(&self) -> usize {
        2 * self.radius
    }
    /// Returns the number of pixels inside the pupil
    pub fn area(&self) -> usize {
        self.mask.iter().filter(|x| **x).count()
    }
    /// Returns a copy of `data` with the pixels outside the pupil set to zero
    pub fn apply(&self, data: &DMatrix<f64>) -> Result<DMatrix<f64>> {
        if data.shape() != self.mask.shape() {
            return Err(AoError::shape_mismatch(self.mask.shape(), data.shape()));
        }
        Ok(data.zip_map(&self.mask, |x, m| if m { x } else { 0. }))
    }
    /// Returns the values of `data` inside the pupil, in column-major order
    pub fn valids(&self, data: &DMatrix<f64>) -> Result<Vec<f64>> {
        if data.shape() != self.mask.shape() {
            return Err(AoError::shape_mismatch(self.mask.shape(), data.shape()));
        }
        Ok(data
            .iter()
            .zip(self.mask.iter())
            .filter_map(|(x, b)| if *b { Some(*x) } else { None })
            .collect())
    }
    pub fn as_matrix(&self) -> &DMatrix<bool> {
        &self.mask
    }
}

impl Deref for PupilMask {
    type Target = DMatrix<bool>;

    fn deref(&self) -> &Self::Target {
        &self.mask
    }
}
