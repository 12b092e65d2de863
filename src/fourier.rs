//! 2D discrete Fourier transform and spectral utilities
//!
//! The transform itself is a [Transform2D] capability so that any FFT library can be
//! substituted; [RustFft] is the default implementation.
//! The spectra handled by the crate are centered with [fftshift]: the zero frequency
//! is at the array indices `(nrows / 2, ncols / 2)`.

use std::f64::consts::PI;

use nalgebra::{DMatrix, Scalar};
pub use rustfft::num_complex::Complex64;
use rustfft::{FftDirection, FftPlanner};

/// 2D complex discrete Fourier transform
pub trait Transform2D {
    /// In-place forward transform
    fn forward(&self, data: &mut DMatrix<Complex64>);
    /// In-place inverse transform, normalized by the number of samples
    fn inverse(&self, data: &mut DMatrix<Complex64>);
}

/// [rustfft] backed [Transform2D]
#[derive(Debug, Default, Clone, Copy)]
pub struct RustFft;

impl RustFft {
    fn process(data: &mut DMatrix<Complex64>, direction: FftDirection) {
        let (nrows, ncols) = data.shape();
        if nrows == 0 || ncols == 0 {
            return;
        }
        let mut planner = FftPlanner::<f64>::new();
        // columns are contiguous
        planner
            .plan_fft(nrows, direction)
            .process(data.as_mut_slice());
        let mut transposed = data.transpose();
        planner
            .plan_fft(ncols, direction)
            .process(transposed.as_mut_slice());
        *data = transposed.transpose();
    }
}

impl Transform2D for RustFft {
    fn forward(&self, data: &mut DMatrix<Complex64>) {
        Self::process(data, FftDirection::Forward);
    }
    fn inverse(&self, data: &mut DMatrix<Complex64>) {
        Self::process(data, FftDirection::Inverse);
        let n = data.len();
        if n > 0 {
            let scale = (n as f64).recip();
            data.iter_mut().for_each(|c| *c *= scale);
        }
    }
}

/// Interferogram sample types
///
/// Real fringe patterns and complex field-modulated fringes are both accepted by the
/// filter builder and the demodulator.
pub trait Interferogram {
    fn shape(&self) -> (usize, usize);
    fn to_complex(&self) -> DMatrix<Complex64>;
}

impl Interferogram for DMatrix<f64> {
    fn shape(&self) -> (usize, usize) {
        (self.nrows(), self.ncols())
    }
    fn to_complex(&self) -> DMatrix<Complex64> {
        self.map(|x| Complex64::new(x, 0.))
    }
}

impl Interferogram for DMatrix<Complex64> {
    fn shape(&self) -> (usize, usize) {
        (self.nrows(), self.ncols())
    }
    fn to_complex(&self) -> DMatrix<Complex64> {
        self.clone()
    }
}

/// Circularly shifts `data` by `shift = (rows, columns)`, `out[i] = data[i - shift]`
pub fn roll<T: Scalar>(data: &DMatrix<T>, shift: (isize, isize)) -> DMatrix<T> {
    let (nrows, ncols) = data.shape();
    if nrows == 0 || ncols == 0 {
        return data.clone();
    }
    DMatrix::from_fn(nrows, ncols, |i, j| {
        let si = (i as isize - shift.0).rem_euclid(nrows as isize) as usize;
        let sj = (j as isize - shift.1).rem_euclid(ncols as isize) as usize;
        data[(si, sj)].clone()
    })
}

/// Moves the zero frequency to `(nrows / 2, ncols / 2)`
pub fn fftshift<T: Scalar>(data: &DMatrix<T>) -> DMatrix<T> {
    let (nrows, ncols) = data.shape();
    roll(data, ((nrows / 2) as isize, (ncols / 2) as isize))
}

/// Inverse of [fftshift]
pub fn ifftshift<T: Scalar>(data: &DMatrix<T>) -> DMatrix<T> {
    let (nrows, ncols) = data.shape();
    roll(data, (-((nrows / 2) as isize), -((ncols / 2) as isize)))
}

/// Symmetric Tukey (tapered cosine) window
///
/// `alpha` is the fraction of the window inside the cosine tapers; `alpha <= 0` gives a
/// rectangular window and `alpha >= 1` a Hann window.
pub fn tukey(len: usize, alpha: f64) -> Vec<f64> {
    if len < 2 || alpha <= 0. {
        return vec![1f64; len];
    }
    let m = (len - 1) as f64;
    let edge = 0.5 * alpha.min(1.) * m;
    (0..len)
        .map(|n| {
            let n = n as f64;
            let d = n.min(m - n);
            if d < edge {
                0.5 * (1. - (PI * d / edge).cos())
            } else {
                1.
            }
        })
        .collect()
}

/// Symmetric Gaussian window of standard deviation `std` samples and unit peak
pub fn gaussian(len: usize, std: f64) -> Vec<f64> {
    let c = 0.5 * len.saturating_sub(1) as f64;
    (0..len)
        .map(|n| {
            let u = (n as f64 - c) / std;
            (-0.5 * u * u).exp()
        })
        .collect()
}

/// Multiplies `data` by the separable Tukey window
pub fn apodize(data: &mut DMatrix<Complex64>, alpha: f64) {
    if alpha <= 0. {
        return;
    }
    let (nrows, ncols) = data.shape();
    let wr = tukey(nrows, alpha);
    let wc = tukey(ncols, alpha);
    for (j, c) in wc.iter().enumerate() {
        for (i, r) in wr.iter().enumerate() {
            data[(i, j)] *= r * c;
        }
    }
}

/// Returns the centered spectrum of the apodized interferogram
pub fn centered_spectrum<T, I>(transform: &T, image: &I, tukey_alpha: f64) -> DMatrix<Complex64>
where
    T: Transform2D + ?Sized,
    I: Interferogram + ?Sized,
{
    let mut data = image.to_complex();
    apodize(&mut data, tukey_alpha);
    transform.forward(&mut data);
    fftshift(&data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_inverse() {
        let data = DMatrix::from_fn(6, 10, |i, j| {
            Complex64::new((i * 3 + j) as f64, (i as f64 - j as f64) * 0.5)
        });
        let mut spectrum = data.clone();
        RustFft.forward(&mut spectrum);
        RustFft.inverse(&mut spectrum);
        spectrum
            .iter()
            .zip(data.iter())
            .for_each(|(a, b)| assert!((a - b).norm() < 1e-10));
    }

    #[test]
    fn plane_wave() {
        let (n, ky, kx) = (16usize, 3usize, 5usize);
        let mut data = DMatrix::from_fn(n, n, |i, j| {
            let phase = 2. * PI * (ky * i + kx * j) as f64 / n as f64;
            Complex64::new(phase.cos(), phase.sin())
        });
        RustFft.forward(&mut data);
        for j in 0..n {
            for i in 0..n {
                let expected = if (i, j) == (ky, kx) { n as f64 * n as f64 } else { 0. };
                assert!((data[(i, j)].norm() - expected).abs() < 1e-8);
            }
        }
    }

    #[test]
    fn shifts() {
        let data = DMatrix::from_fn(4, 5, |i, j| (i * 5 + j) as i32);
        let shifted = fftshift(&data);
        assert_eq!(shifted[(2, 2)], data[(0, 0)]);
        assert_eq!(ifftshift(&shifted), data);
        assert_eq!(roll(&data, (1, -1))[(1, 0)], data[(0, 1)]);
    }

    #[test]
    fn windows() {
        let w = tukey(11, 0.4);
        assert_eq!(w[0], 0.);
        assert_eq!(w[10], 0.);
        assert_eq!(w[5], 1.);
        assert!((w[1] - w[9]).abs() < 1e-15);
        assert_eq!(tukey(7, 0.), vec![1.; 7]);
        let g = gaussian(9, 2.);
        assert_eq!(g[4], 1.);
        assert!((g[0] - (-2f64).exp()).abs() < 1e-15);
        assert!((g[2] - g[6]).abs() < 1e-15);
    }
}
