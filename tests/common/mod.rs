#![allow(dead_code)]

use std::f64::consts::PI;

use fringe_ao::{
    fourier::{gaussian, Complex64},
    make_mask, phase_from_modes,
};
use nalgebra::DMatrix;

pub const RADIUS: usize = 128;
pub const CARRIER: usize = 44;

/// Masked fringes `50 + 50cos(2π·carrier·x/d)` of a `2·radius` wide pupil
pub fn interferogram(radius: usize, carrier: usize) -> DMatrix<f64> {
    let d = 2 * radius;
    let mask = make_mask(radius).unwrap();
    DMatrix::from_fn(d, d, |i, j| {
        if mask[(i, j)] {
            50. + 50. * (2. * PI * (carrier * j) as f64 / d as f64).cos()
        } else {
            0.
        }
    })
}

/// Gaussian window of `floor(d·5/16)` samples placed on the carrier, `[c - w/2, c + w/2)`
pub fn reference_filter(radius: usize, carrier: usize) -> DMatrix<f64> {
    let d = 2 * radius;
    let gauss_dim = d * 5 / 16;
    let fwhm = (3. / 8. * gauss_dim as f64).floor();
    let x = gaussian(gauss_dim, fwhm / (8. * 2f64.ln()).sqrt());
    let x_max = x.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let x_min = x.iter().cloned().fold(f64::INFINITY, f64::min);
    let mut filter = DMatrix::zeros(d, d);
    let (i0, j0) = (radius - gauss_dim / 2, radius - carrier - gauss_dim / 2);
    for (a, xa) in x.iter().enumerate() {
        for (b, xb) in x.iter().enumerate() {
            let g = xa * xb;
            filter[(i0 + a, j0 + b)] = if g > x_max * x_min { g } else { 0. };
        }
    }
    filter
}

/// Interferogram modulated by the complex field `amplitude·exp(i·phase)`
pub fn modulate(image: &DMatrix<f64>, phase: &DMatrix<f64>, amplitude: f64) -> DMatrix<Complex64> {
    image.zip_map(phase, |x, p| Complex64::from_polar(amplitude * x, p))
}

/// Zernike phase map with a single non-zero coefficient
pub fn zernike_phase(n_mode: usize, mode: usize, value: f64, diameter: usize) -> DMatrix<f64> {
    let mut coefs = vec![0f64; n_mode];
    coefs[mode] = value;
    phase_from_modes(&coefs, diameter).unwrap()
}
