//! Interferogram phase demodulation
//!
//! The wavefront phase is recovered from the sideband of the interferogram spectrum
//! selected by a [FringeFilter]: the sideband is moved to the zero frequency, transformed
//! back to the pupil plane and the argument of the complex field is unwrapped inside the
//! pupil.

use std::{borrow::Cow, f64::consts::PI, ops::Deref, time::Instant};

use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

use crate::{
    filter::{FringeFilter, FringeFilterBuilder},
    fourier::{centered_spectrum, ifftshift, roll, Interferogram, RustFft, Transform2D},
    unwrap::{PhaseUnwrapper, ReliabilitySorting},
    AoError, FromBuilder, PupilMask, Result,
};

mod builder;
pub use builder::DemodulatorBuilder;

/// Unwrapped phase map
///
/// The phase is zero outside the pupil mask it has been computed with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseMap {
    phase: DMatrix<f64>,
    mask: PupilMask,
}

impl PhaseMap {
    /// Creates a phase map from a phase array and a pupil, zeroing the phase outside the pupil
    pub fn new(phase: DMatrix<f64>, mask: PupilMask) -> Result<Self> {
        let phase = mask.apply(&phase)?;
        Ok(Self { phase, mask })
    }
    pub fn mask(&self) -> &PupilMask {
        &self.mask
    }
    pub fn as_matrix(&self) -> &DMatrix<f64> {
        &self.phase
    }
    pub fn into_inner(self) -> DMatrix<f64> {
        self.phase
    }
    /// Returns the number of horizontally or vertically adjacent pupil pixels with a phase difference larger than π
    pub fn discontinuities(&self) -> usize {
        let (nrows, ncols) = self.phase.shape();
        let mut count = 0;
        for j in 0..ncols {
            for i in 0..nrows {
                if !self.mask[(i, j)] {
                    continue;
                }
                let p = self.phase[(i, j)];
                if i + 1 < nrows && self.mask[(i + 1, j)] && (self.phase[(i + 1, j)] - p).abs() > PI
                {
                    count += 1;
                }
                if j + 1 < ncols && self.mask[(i, j + 1)] && (self.phase[(i, j + 1)] - p).abs() > PI
                {
                    count += 1;
                }
            }
        }
        count
    }
}

impl Deref for PhaseMap {
    type Target = DMatrix<f64>;

    fn deref(&self) -> &Self::Target {
        &self.phase
    }
}

/// Phase demodulator
///
/// The 2D Fourier transform and the phase unwrapping algorithm are type parameters,
/// [RustFft] and [ReliabilitySorting] by default.
#[derive(Debug, Clone)]
pub struct Demodulator<T = RustFft, U = ReliabilitySorting> {
    filter: FringeFilterBuilder,
    transform: T,
    unwrapper: U,
}

impl FromBuilder for Demodulator {
    type ComponentBuilder = DemodulatorBuilder;
}

impl<T, U> Demodulator<T, U> {
    /// Replaces the 2D Fourier transform
    pub fn with_transform<V: Transform2D>(self, transform: V) -> Demodulator<V, U> {
        Demodulator {
            filter: self.filter,
            transform,
            unwrapper: self.unwrapper,
        }
    }
    /// Replaces the phase unwrapper
    pub fn with_unwrapper<V: PhaseUnwrapper>(self, unwrapper: V) -> Demodulator<T, V> {
        Demodulator {
            filter: self.filter,
            transform: self.transform,
            unwrapper,
        }
    }
    pub fn filter_builder(&self) -> &FringeFilterBuilder {
        &self.filter
    }
}

impl<T: Transform2D, U: PhaseUnwrapper> Demodulator<T, U> {
    /// Designs the fringe filter of an interferogram
    pub fn fringe_filter<I: Interferogram + ?Sized>(&self, image: &I) -> Result<FringeFilter> {
        self.filter.design(&self.transform, image)
    }
    /// Returns the unwrapped phase of an interferogram
    ///
    /// The interferogram must be square with an even side; the phase is computed inside
    /// the inscribed pupil. If no fringe filter is given, one is designed from the
    /// interferogram itself.
    pub fn phase_unwrap<I: Interferogram + ?Sized>(
        &self,
        image: &I,
        filter: Option<&FringeFilter>,
    ) -> Result<PhaseMap> {
        let now = Instant::now();
        let (nrows, ncols) = image.shape();
        if nrows != ncols || nrows == 0 || nrows % 2 != 0 {
            return Err(AoError::NotSquare(nrows, ncols));
        }
        let mask = PupilMask::inscribed(nrows)?;

        let filter = match filter {
            Some(filter) => Cow::Borrowed(filter),
            None => Cow::Owned(self.fringe_filter(image)?),
        };
        if filter.shape() != (nrows, ncols) {
            return Err(AoError::shape_mismatch((nrows, ncols), filter.shape()));
        }
        if filter.is_vanishing() {
            return Err(AoError::VanishingFilter(filter.sum()));
        }

        let spectrum = centered_spectrum(&self.transform, image, self.filter.tukey_alpha)
            .zip_map(filter.as_matrix(), |c, w| c * w);
        let (dy, dx) = filter.carrier_offset();
        let mut field = ifftshift(&roll(&spectrum, (-dy, -dx)));
        self.transform.inverse(&mut field);

        let wrapped = mask.apply(&field.map(|c| c.im.atan2(c.re)))?;
        let unwrapped = self.unwrapper.unwrap(&wrapped, Some(mask.as_matrix()))?;
        let phase_map = PhaseMap::new(unwrapped, mask)?;
        log::debug!(
            "phase demodulated and unwrapped in {}ms",
            now.elapsed().as_millis()
        );
        Ok(phase_map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Builder;
    use rustfft::num_complex::Complex64;

    #[test]
    fn not_square() {
        let demod = DemodulatorBuilder::default().build().unwrap();
        let image = DMatrix::<f64>::zeros(32, 48);
        assert!(matches!(
            demod.phase_unwrap(&image, None),
            Err(AoError::NotSquare(32, 48))
        ));
        let image = DMatrix::<f64>::zeros(33, 33);
        assert!(matches!(
            demod.phase_unwrap(&image, None),
            Err(AoError::NotSquare(33, 33))
        ));
    }

    #[test]
    fn filter_errors() {
        let demod = Demodulator::builder().build().unwrap();
        let image = DMatrix::<f64>::from_element(32, 32, 1.);
        let wrong: FringeFilter = DMatrix::from_element(16, 16, 1.).into();
        assert!(matches!(
            demod.phase_unwrap(&image, Some(&wrong)),
            Err(AoError::ShapeMismatch { .. })
        ));
        let vanishing: FringeFilter = DMatrix::zeros(32, 32).into();
        let err = demod.phase_unwrap(&image, Some(&vanishing)).unwrap_err();
        assert!(matches!(err, AoError::VanishingFilter(_)));
        assert_eq!(err.kind(), crate::ErrorKind::DegenerateInput);
    }

    #[test]
    fn flat_wavefront() {
        let n = 64usize;
        let k = 16usize;
        let demod = Demodulator::builder().build().unwrap();
        let image = DMatrix::from_fn(n, n, |_, j| {
            let c = 2. * PI * (k * j) as f64 / n as f64;
            Complex64::new(1. + c.cos(), 0.)
        });
        let phase = demod.phase_unwrap(&image, None).unwrap();
        assert_eq!(phase.shape(), (n, n));
        assert_eq!(phase[(0, 0)], 0.);
        let values = phase.mask().valids(phase.as_matrix()).unwrap();
        let mean = values.iter().sum::<f64>() / values.len() as f64;
        let max_dev = values
            .iter()
            .map(|x| (x - mean).abs())
            .fold(0f64, f64::max);
        assert!(max_dev < 1e-2, "{max_dev}");
        assert_eq!(phase.discontinuities(), 0);
    }

    #[test]
    fn discontinuities() {
        let mask = PupilMask::new(8).unwrap();
        let phase = DMatrix::from_fn(16, 16, |_, j| if j < 8 { 0. } else { 4. });
        let map = PhaseMap::new(phase, mask).unwrap();
        let rows = (0..16).filter(|&i| map.mask()[(i, 7)] && map.mask()[(i, 8)]).count();
        assert_eq!(map.discontinuities(), rows);
    }
}
