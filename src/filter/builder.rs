use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

use crate::{
    centroid::centroid,
    fourier::{centered_spectrum, gaussian, Interferogram, Transform2D},
    AoError, Result,
};

use super::FringeFilter;

// Smallest carrier magnitude relative to the spectrum maximum
const CARRIER_CONTRAST: f64 = 1e-9;

/// [FringeFilter] builder
///
/// Default properties:
///  * DC exclusion half-width : 1/8 of the spectrum size
///  * Gaussian window size    : 5/16 of the spectrum size
///  * Gaussian window FWHM    : 3/8 of the window size
///  * peak refinement         : 10 iterations in a 51x51 window thresholded at half the window maximum
///  * Tukey apodization       : 0.1
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FringeFilterBuilder {
    pub dc_exclusion: f64,
    pub window: f64,
    pub fwhm: f64,
    pub peak_half_width: usize,
    pub peak_threshold: f64,
    pub refine_iterations: usize,
    pub tukey_alpha: f64,
}

impl Default for FringeFilterBuilder {
    fn default() -> Self {
        Self {
            dc_exclusion: 0.125,
            window: 5. / 16.,
            fwhm: 3. / 8.,
            peak_half_width: 25,
            peak_threshold: 0.5,
            refine_iterations: 10,
            tukey_alpha: 0.1,
        }
    }
}

impl FringeFilterBuilder {
    /// Set the half-width of the DC neighborhood ignored by the carrier search, as a fraction of the spectrum size
    pub fn dc_exclusion(self, dc_exclusion: f64) -> Self {
        Self {
            dc_exclusion,
            ..self
        }
    }
    /// Set the Gaussian window size as a fraction of the spectrum size
    pub fn window(self, window: f64) -> Self {
        Self { window, ..self }
    }
    /// Set the Gaussian full width at half maximum as a fraction of the window size
    pub fn fwhm(self, fwhm: f64) -> Self {
        Self { fwhm, ..self }
    }
    /// Set the carrier peak refinement parameters
    pub fn peak_refinement(self, half_width: usize, threshold: f64, iterations: usize) -> Self {
        Self {
            peak_half_width: half_width,
            peak_threshold: threshold,
            refine_iterations: iterations,
            ..self
        }
    }
    /// Set the Tukey window parameter of the interferogram apodization
    pub fn tukey_alpha(self, tukey_alpha: f64) -> Self {
        Self {
            tukey_alpha,
            ..self
        }
    }
    /// Designs the fringe filter of an interferogram
    ///
    /// The filter is a Gaussian bump centered on the carrier peak of the centered spectrum
    pub fn design<T, I>(&self, transform: &T, image: &I) -> Result<FringeFilter>
    where
        T: Transform2D + ?Sized,
        I: Interferogram + ?Sized,
    {
        let (nrows, ncols) = image.shape();
        if nrows == 0 || ncols == 0 {
            return Err(AoError::NotSquare(nrows, ncols));
        }
        let spectrum = centered_spectrum(transform, image, self.tukey_alpha);
        let mut magnitude = spectrum.map(|c| c.norm());
        let spectrum_max = magnitude.iter().cloned().fold(0f64, f64::max);

        let (cy, cx) = (nrows / 2, ncols / 2);
        let hy = (nrows as f64 * self.dc_exclusion).floor() as usize;
        let hx = (ncols as f64 * self.dc_exclusion).floor() as usize;
        for j in cx.saturating_sub(hx)..(cx + hx + 1).min(ncols) {
            for i in cy.saturating_sub(hy)..(cy + hy + 1).min(nrows) {
                magnitude[(i, j)] = 0.;
            }
        }

        let (k, peak) = magnitude
            .iter()
            .cloned()
            .enumerate()
            .fold((0, 0f64), |(k, a), (l, b)| if b > a { (l, b) } else { (k, a) });
        if !peak.is_finite() || peak <= 0. || peak <= CARRIER_CONTRAST * spectrum_max {
            return Err(AoError::NoCarrier);
        }
        let coarse = (k % nrows, k / nrows);
        let carrier = self.refine(&magnitude, coarse);
        log::debug!(
            "carrier peak: coarse {:?}, refined {:?} (DC at {:?})",
            coarse,
            carrier,
            (cy, cx)
        );
        // leakage around DC pulls the refined peak back onto DC
        if carrier.0.abs_diff(cy) <= hy && carrier.1.abs_diff(cx) <= hx {
            return Err(AoError::NoCarrier);
        }

        Ok(self.place_window((nrows, ncols), carrier))
    }
    // Moves the carrier estimate to the thresholded centroid of its neighborhood until it settles
    fn refine(&self, magnitude: &DMatrix<f64>, mut peak: (usize, usize)) -> (usize, usize) {
        let (nrows, ncols) = magnitude.shape();
        let hw = self.peak_half_width;
        for _ in 0..self.refine_iterations {
            let (r0, c0) = (peak.0.saturating_sub(hw), peak.1.saturating_sub(hw));
            let (r1, c1) = ((peak.0 + hw + 1).min(nrows), (peak.1 + hw + 1).min(ncols));
            let window = magnitude.view((r0, c0), (r1 - r0, c1 - c0)).clone_owned();
            let w_max = window.iter().cloned().fold(0f64, f64::max);
            if !(w_max > 0.) {
                break;
            }
            let (x, y) = centroid(&window, self.peak_threshold * w_max);
            let next = (
                (r0 + y.round() as usize).min(nrows - 1),
                (c0 + x.round() as usize).min(ncols - 1),
            );
            if next == peak {
                break;
            }
            peak = next;
        }
        peak
    }
    // Gaussian window centered on `center`, clipped at the array borders
    fn place_window(&self, shape: (usize, usize), center: (usize, usize)) -> FringeFilter {
        let (nrows, ncols) = shape;
        let gauss_dim = (nrows as f64 * self.window).floor();
        let fwhm = (self.fwhm * gauss_dim).floor().max(1.);
        let sigma = fwhm / (8. * 2f64.ln()).sqrt();
        let half = (gauss_dim / 2.).floor() as usize;
        let g = gaussian(2 * half + 1, sigma);
        let g_max = g.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let g_min = g.iter().cloned().fold(f64::INFINITY, f64::min);
        let floor = g_max * g_min;

        let mut filter = DMatrix::<f64>::zeros(nrows, ncols);
        for (b, gb) in g.iter().enumerate() {
            let Some(j) = (center.1 + b).checked_sub(half).filter(|j| *j < ncols) else {
                continue;
            };
            for (a, ga) in g.iter().enumerate() {
                let Some(i) = (center.0 + a).checked_sub(half).filter(|i| *i < nrows) else {
                    continue;
                };
                let w = ga * gb;
                filter[(i, j)] = if w <= floor { 0. } else { w };
            }
        }
        FringeFilter(filter)
    }
}

#[cfg(test)]
mod tests {
    use std::f64::consts::PI;

    use super::*;
    use crate::fourier::RustFft;

    fn fringes(n: usize, k: usize) -> DMatrix<f64> {
        DMatrix::from_fn(n, n, |_, j| {
            1. + (2. * PI * (k * j) as f64 / n as f64).cos()
        })
    }

    #[test]
    fn filter_on_carrier() {
        let (n, k) = (128usize, 30usize);
        let filter = FringeFilterBuilder::default()
            .design(&RustFft, &fringes(n, k))
            .unwrap();
        assert_eq!(filter.shape(), (n, n));
        let (i, j) = filter.iamax_full();
        assert_eq!(i, n / 2);
        assert_eq!((j as isize - (n / 2) as isize).unsigned_abs(), k);
        assert!((filter[(i, j)] - 1.).abs() < 1e-12);
        let (dy, dx) = filter.carrier_offset();
        assert_eq!(dy, 0);
        assert_eq!(dx.unsigned_abs(), k);
        assert!(filter.iter().all(|x| *x >= 0.));
    }

    #[test]
    fn window_support() {
        let (n, k) = (128usize, 30usize);
        let filter = FringeFilterBuilder::default()
            .design(&RustFft, &fringes(n, k))
            .unwrap();
        // 41 samples wide, the thresholded product of 1D windows is a disk of radius 20
        let (i, j) = filter.iamax_full();
        assert_eq!(filter[(i, j + 20)], 0.);
        assert_eq!(filter[(i + 20, j)], 0.);
        assert_eq!(filter[(i, j - 21)], 0.);
        assert!(filter[(i + 19, j)] > 0.);
        assert!(filter[(i + 14, j + 14)] > 0.);
        assert_eq!(filter[(i + 15, j + 14)], 0.);
        assert_eq!(filter[(i + 20, j + 20)], 0.);
        assert!((filter[(i + 3, j - 2)] - filter[(i - 3, j + 2)]).abs() < 1e-15);
    }

    #[test]
    fn no_carrier() {
        let builder = FringeFilterBuilder::default();
        let zero = DMatrix::<f64>::zeros(32, 32);
        assert!(matches!(
            builder.design(&RustFft, &zero),
            Err(AoError::NoCarrier)
        ));
        let flat = DMatrix::<f64>::from_element(32, 32, 3.);
        assert!(matches!(
            builder.clone().tukey_alpha(0.).design(&RustFft, &flat),
            Err(AoError::NoCarrier)
        ));
    }

    #[test]
    fn apodization_leakage_is_not_a_carrier() {
        let builder = FringeFilterBuilder::default();
        let flat = DMatrix::<f64>::from_element(64, 64, 3.);
        assert!(matches!(
            builder.design(&RustFft, &flat),
            Err(AoError::NoCarrier)
        ));
        let pupil = crate::PupilMask::new(32)
            .unwrap()
            .map(|m| if m { 1f64 } else { 0. });
        assert!(matches!(
            builder.design(&RustFft, &pupil),
            Err(AoError::NoCarrier)
        ));
    }
}
