//! Calibration pipeline functions with default settings

use nalgebra::{DMatrix, DVector};

pub use crate::centroid::mgcentroid;
use crate::{
    fourier::{Interferogram, RustFft},
    AoError, Builder, CalibrationBuilder, ControlMatrix, Demodulator, FringeFilter,
    FringeFilterBuilder, FromBuilder, ModalDecomposer, PhaseMap, PupilMask, Result,
};

/// Returns the circular pupil mask of the given radius
pub fn make_mask(radius: usize) -> Result<PupilMask> {
    PupilMask::new(radius)
}

/// Returns the Fourier fringe filter of an interferogram
///
/// If a frequency-domain region is given, it is used as the filter instead
pub fn make_fft_filter<I>(image: &I, region: Option<DMatrix<f64>>) -> Result<FringeFilter>
where
    I: Interferogram + ?Sized,
{
    match region {
        Some(region) => {
            if region.shape() != image.shape() {
                return Err(AoError::shape_mismatch(image.shape(), region.shape()));
            }
            Ok(region.into())
        }
        None => FringeFilterBuilder::default().design(&RustFft, image),
    }
}

/// Returns the unwrapped phase of an interferogram
pub fn phase_unwrap<I>(image: &I) -> Result<PhaseMap>
where
    I: Interferogram + ?Sized,
{
    Demodulator::builder().build()?.phase_unwrap(image, None)
}

/// Returns the first `n_mode` Zernike coefficients of a phase map
pub fn get_zernike_modes(phase: &DMatrix<f64>, n_mode: usize) -> Result<DVector<f64>> {
    ModalDecomposer::builder().build()?.decompose(phase, n_mode)
}

/// Returns the control matrix of a deformable mirror
///
/// `stack` holds one interferogram per actuator and poke amplitude, actuator first;
/// `pupil` optionally selects the actuators inside the pupil.
pub fn create_control_matrix<I>(
    stack: &[I],
    n_actuator: usize,
    n_mode: usize,
    poke_steps: &[f64],
    pupil: Option<Vec<bool>>,
    threshold: f64,
) -> Result<ControlMatrix>
where
    I: Interferogram + Sync,
{
    let builder = CalibrationBuilder::new()
        .n_actuator(n_actuator)
        .n_mode(n_mode)
        .poke_steps(poke_steps.to_vec())
        .threshold(threshold);
    let builder = match pupil {
        Some(pupil) => builder.pupil(pupil),
        None => builder,
    };
    Ok(builder.build()?.calibrate(stack, None)?.into_control_matrix())
}
