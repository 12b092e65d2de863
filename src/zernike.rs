//! Zernike polynomials
//!
//! The polynomials are evaluated with the `zernike` crate, Noll ordered and normalized to a
//! unit RMS over the sampled unit disk.
//! The modes are sampled on a square grid of `diameter` pixels with pixel-centered
//! coordinates `x = (j - diameter/2 + 1/2) / (diameter/2)`, `y` likewise along the rows,
//! and are zero outside the unit disk.

use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

use crate::{AoError, Result};

/// Orthogonal mode basis over a circular pupil
pub trait ModeBasis {
    /// Returns the number of modes in the basis
    fn capacity(&self) -> usize;
    /// Returns the support of the modes on a grid of `diameter` pixels
    fn pupil(&self, diameter: usize) -> DMatrix<bool>;
    /// Returns the mode with the zero-based `index` on a grid of `diameter` pixels
    fn mode(&self, index: usize, diameter: usize) -> Result<DMatrix<f64>>;
    /// Returns the first `n` modes
    fn modes(&self, n: usize, diameter: usize) -> Result<Vec<DMatrix<f64>>> {
        if n > self.capacity() {
            return Err(AoError::ModeCount {
                requested: n,
                available: self.capacity(),
            });
        }
        (0..n).map(|i| self.mode(i, diameter)).collect()
    }
    /// Returns the linear combination of the modes weighted by `coefficients`
    fn phase(&self, coefficients: &[f64], diameter: usize) -> Result<DMatrix<f64>> {
        let modes = self.modes(coefficients.len(), diameter)?;
        Ok(modes
            .iter()
            .zip(coefficients)
            .fold(DMatrix::zeros(diameter, diameter), |a, (m, c)| a + m * *c))
    }
}

/// Zernike polynomials basis up to a given radial order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Zernike {
    pub max_radial_order: usize,
}

impl Default for Zernike {
    fn default() -> Self {
        Self {
            max_radial_order: 20,
        }
    }
}

impl Zernike {
    pub fn new(max_radial_order: usize) -> Self {
        Self { max_radial_order }
    }
}

/// Returns the radial order `n` and the azimuthal frequency `m` of the Noll index `j` (`j>=1`)
///
/// Even `j` give cosine modes (`m>0`), odd `j` give sine modes (`m<0`).
pub fn noll_index(j: usize) -> (usize, isize) {
    let j = j.max(1);
    let n_radial_order = (0..).find(|n| (n + 1) * (n + 2) / 2 >= j).unwrap_or_default() + 1;
    let (_, n, m) = ::zernike::jnm(n_radial_order as u32);
    let (n, m) = (n[j - 1] as usize, (m[j - 1] as isize).abs());
    if m != 0 && j % 2 == 1 {
        (n, -m)
    } else {
        (n, m)
    }
}

#[inline]
fn coordinate(k: usize, diameter: usize) -> f64 {
    let h = 0.5 * diameter as f64;
    (k as f64 - h + 0.5) / h
}

impl ModeBasis for Zernike {
    fn capacity(&self) -> usize {
        let n = self.max_radial_order;
        (n + 1) * (n + 2) / 2
    }
    fn pupil(&self, diameter: usize) -> DMatrix<bool> {
        DMatrix::from_fn(diameter, diameter, |i, j| {
            let (x, y) = (coordinate(j, diameter), coordinate(i, diameter));
            x.hypot(y) <= 1.
        })
    }
    /// The mode is normalized to a unit RMS over the sampled pupil
    fn mode(&self, index: usize, diameter: usize) -> Result<DMatrix<f64>> {
        if index >= self.capacity() {
            return Err(AoError::ModeCount {
                requested: index + 1,
                available: self.capacity(),
            });
        }
        let (j, n, m) = ::zernike::jnm(self.max_radial_order as u32 + 1);
        let (j, n, m) = (j[index], n[index], m[index]);
        let mut mode = DMatrix::from_fn(diameter, diameter, |i, k| {
            let (x, y) = (coordinate(k, diameter), coordinate(i, diameter));
            let r = x.hypot(y);
            if r > 1. {
                0.
            } else {
                ::zernike::zernike(j, n, m, r, y.atan2(x))
            }
        });
        let area = self.pupil(diameter).iter().filter(|p| **p).count();
        let rms = (mode.norm_squared() / area.max(1) as f64).sqrt();
        if rms > 0. {
            mode /= rms;
        }
        Ok(mode)
    }
}

/// Returns the Zernike phase map of the given Noll ordered coefficients on a `diameter` grid
pub fn phase_from_modes(coefficients: &[f64], diameter: usize) -> Result<DMatrix<f64>> {
    Zernike::default().phase(coefficients, diameter)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noll_ordering() {
        let expected = [
            (1, (0, 0)),
            (2, (1, 1)),
            (3, (1, -1)),
            (4, (2, 0)),
            (5, (2, -2)),
            (6, (2, 2)),
            (7, (3, -1)),
            (8, (3, 1)),
            (9, (3, -3)),
            (10, (3, 3)),
            (11, (4, 0)),
            (22, (6, 0)),
        ];
        for (j, nm) in expected {
            assert_eq!(noll_index(j), nm, "Noll index {j}");
        }
    }

    #[test]
    fn defocus_profile() {
        let d = 64;
        let defocus = Zernike::default().mode(3, d).unwrap();
        let ratios: Vec<f64> = (0..d)
            .flat_map(|j| (0..d).map(move |i| (i, j)))
            .filter_map(|(i, j)| {
                let (x, y) = (coordinate(j, d), coordinate(i, d));
                let p = 2. * (x * x + y * y) - 1.;
                (x.hypot(y) <= 1. && p.abs() > 0.2).then(|| defocus[(i, j)] / p)
            })
            .collect();
        let r0 = ratios[0];
        assert!((r0 - 3f64.sqrt()).abs() < 0.1, "{r0}");
        ratios
            .iter()
            .for_each(|r| assert!((r - r0).abs() < 1e-9, "{r} vs {r0}"));
    }

    #[test]
    fn capacity() {
        let zernike = Zernike::default();
        assert_eq!(zernike.capacity(), 231);
        assert!(zernike.mode(230, 8).is_ok());
        assert!(matches!(
            zernike.mode(231, 8),
            Err(AoError::ModeCount {
                requested: 232,
                available: 231
            })
        ));
        assert!(zernike.modes(232, 8).is_err());
    }

    #[test]
    fn unit_rms_and_orthogonality() {
        let d = 128;
        let zernike = Zernike::default();
        let pupil = zernike.pupil(d);
        let area = pupil.iter().filter(|x| **x).count() as f64;
        let modes = zernike.modes(10, d).unwrap();
        for (i, zi) in modes.iter().enumerate() {
            for (j, zj) in modes.iter().enumerate() {
                let dot = zi.dot(zj) / area;
                let expected = if i == j { 1. } else { 0. };
                assert!((dot - expected).abs() < 0.05, "<Z{i},Z{j}> = {dot}");
            }
        }
    }

    #[test]
    fn tilt_orientation() {
        let d = 16;
        let tip = Zernike::default().mode(1, d).unwrap();
        let tilt = Zernike::default().mode(2, d).unwrap();
        // x along the columns, y along the rows
        assert!(tip[(8, 15)] > 0. && tip[(8, 0)] < 0.);
        assert!(tilt[(15, 8)] > 0. && tilt[(0, 8)] < 0.);
        let phase = phase_from_modes(&[0., 2., 0.], d).unwrap();
        assert_eq!(phase, tip * 2.);
    }
}
