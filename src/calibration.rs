//! Deformable mirror calibration
//!
//! Each actuator of the deformable mirror is poked with the same sequence of amplitudes and an
//! interferogram is recorded for each poke. The interferograms are demodulated, the phase maps
//! are decomposed onto the mode basis and the modal coefficients are regressed against the poke
//! amplitudes. The slopes of the regressions form the `n_mode x n_actuator` system matrix and the
//! control matrix is its truncated pseudo-inverse.

use std::{borrow::Cow, fmt::Display, time::Instant};

use indicatif::ProgressBar;
use nalgebra::{DMatrix, DVector};
use rayon::prelude::*;
use serde::Serialize;

use crate::{
    fourier::Interferogram, AoError, Demodulator, FringeFilter, FromBuilder, ModalDecomposer,
    PupilMask, Result,
};

mod builder;
mod control_matrix;
mod regression;
pub use builder::{linspace, CalibrationBuilder, CalibrationBuilderError};
pub use control_matrix::ControlMatrix;
pub use regression::{Intercept, LinearFit};

/// Deformable mirror calibrator
#[derive(Debug, Clone)]
pub struct Calibrator {
    config: CalibrationBuilder,
    demodulator: Demodulator,
    modal: ModalDecomposer,
    progress: Option<ProgressBar>,
}

impl FromBuilder for Calibrator {
    type ComponentBuilder = CalibrationBuilder;
}

/// Deformable mirror calibration
#[derive(Debug, Clone, Serialize)]
pub struct Calibration {
    n_actuator: usize,
    n_mode: usize,
    poke_steps: Vec<f64>,
    filter: FringeFilter,
    coefficients: Vec<Option<DVector<f64>>>,
    rejected: Vec<usize>,
    system: DMatrix<f64>,
    offsets: DMatrix<f64>,
    correlation: DMatrix<f64>,
    control_matrix: ControlMatrix,
}

impl Calibrator {
    /// Reports the progress of the calibration with a progress bar
    pub fn progress(self, pb: ProgressBar) -> Self {
        Self {
            progress: Some(pb),
            ..self
        }
    }
    pub fn config(&self) -> &CalibrationBuilder {
        &self.config
    }
    pub fn demodulator(&self) -> &Demodulator {
        &self.demodulator
    }
    pub fn modal(&self) -> &ModalDecomposer {
        &self.modal
    }
    /// Returns true if the actuator is inside the pupil
    pub fn is_selected(&self, actuator: usize) -> bool {
        self.config
            .pupil
            .as_ref()
            .map_or(true, |pupil| pupil.get(actuator).cloned().unwrap_or(false))
    }
    /// Calibrates the deformable mirror from a stack of interferograms
    ///
    /// The stack is ordered actuator first, poke amplitude second.
    /// If no fringe filter is given, the filter is designed from the first interferogram of the stack
    /// and it is used to demodulate all the interferograms.
    pub fn calibrate<I>(&self, stack: &[I], filter: Option<&FringeFilter>) -> Result<Calibration>
    where
        I: Interferogram + Sync,
    {
        let now = Instant::now();
        let CalibrationBuilder {
            n_actuator,
            n_mode,
            ref poke_steps,
            threshold,
            intercept,
            max_discontinuity_fraction,
            ..
        } = self.config;
        let n_step = poke_steps.len();
        if stack.len() != n_actuator * n_step {
            return Err(AoError::StackLength {
                found: stack.len(),
                n_actuator,
                n_step,
            });
        }
        let shape = stack[0].shape();
        if let Some(other) = stack.iter().map(|image| image.shape()).find(|s| *s != shape) {
            return Err(AoError::shape_mismatch(shape, other));
        }
        let (side, ncols) = shape;
        if side != ncols || side == 0 || side % 2 != 0 {
            return Err(AoError::NotSquare(side, ncols));
        }

        let filter = match filter {
            Some(filter) => Cow::Borrowed(filter),
            None => Cow::Owned(self.demodulator.fringe_filter(&stack[0])?),
        };
        log::info!(
            "Calibrating {} actuators x {} poke steps with {} modes, fringe carrier offset: {:?}",
            n_actuator,
            n_step,
            n_mode,
            filter.carrier_offset()
        );
        let mask = PupilMask::inscribed(side)?;
        let max_discontinuities = max_discontinuity_fraction * mask.area() as f64;
        let projector = self.modal.projector(n_mode, side, Some(mask.as_matrix()))?;

        if let Some(pb) = self.progress.as_ref() {
            let n_selected = (0..n_actuator).filter(|a| self.is_selected(*a)).count();
            pb.set_length((n_selected * n_step) as u64);
        }
        let coefficients = stack
            .par_iter()
            .enumerate()
            .map(|(k, image)| {
                let actuator = k / n_step;
                if !self.is_selected(actuator) {
                    return Ok(None);
                }
                let phase = self.demodulator.phase_unwrap(image, Some(&*filter))?;
                if let Some(pb) = self.progress.as_ref() {
                    pb.inc(1);
                }
                let discontinuities = phase.discontinuities();
                if discontinuities as f64 > max_discontinuities {
                    log::warn!(
                        "interferogram #{} (actuator #{}, poke {}) rejected: {} phase discontinuities",
                        k,
                        actuator,
                        poke_steps[k % n_step],
                        discontinuities
                    );
                    return Ok(None);
                }
                let c = projector.project(&phase)?;
                log::debug!("interferogram #{k}: {:.3?}", c.as_slice());
                Ok(Some(c))
            })
            .collect::<Result<Vec<Option<DVector<f64>>>>>()?;
        if let Some(pb) = self.progress.as_ref() {
            pb.finish();
        }
        let rejected: Vec<usize> = coefficients
            .iter()
            .enumerate()
            .filter(|(k, c)| c.is_none() && self.is_selected(k / n_step))
            .map(|(k, _)| k)
            .collect();

        let mut system = DMatrix::<f64>::zeros(n_mode, n_actuator);
        let mut offsets = DMatrix::<f64>::zeros(n_mode, n_actuator);
        let mut correlation = DMatrix::<f64>::zeros(n_mode, n_actuator);
        for actuator in (0..n_actuator).filter(|a| self.is_selected(*a)) {
            let (pokes, modes): (Vec<f64>, Vec<&DVector<f64>>) = coefficients
                [actuator * n_step..(actuator + 1) * n_step]
                .iter()
                .zip(poke_steps)
                .filter_map(|(c, p)| c.as_ref().map(|c| (*p, c)))
                .unzip();
            if pokes.len() < 2 {
                log::warn!(
                    "actuator #{} skipped: {} valid interferograms",
                    actuator,
                    pokes.len()
                );
                continue;
            }
            for mode in 0..n_mode {
                let y: Vec<f64> = modes.iter().map(|c| c[mode]).collect();
                match LinearFit::new(&pokes, &y, intercept) {
                    Some(fit) => {
                        system[(mode, actuator)] = fit.slope;
                        offsets[(mode, actuator)] = fit.intercept;
                        correlation[(mode, actuator)] = fit.r;
                    }
                    None => log::warn!(
                        "actuator #{}, mode #{}: degenerate poke amplitudes",
                        actuator,
                        mode
                    ),
                }
            }
        }

        let control_matrix = ControlMatrix::from_system(&system, threshold)?;
        log::info!("Calibration completed in {}s", now.elapsed().as_secs());
        Ok(Calibration {
            n_actuator,
            n_mode,
            poke_steps: poke_steps.clone(),
            filter: filter.into_owned(),
            coefficients,
            rejected,
            system,
            offsets,
            correlation,
            control_matrix,
        })
    }
}

impl Calibration {
    pub fn n_actuator(&self) -> usize {
        self.n_actuator
    }
    pub fn n_mode(&self) -> usize {
        self.n_mode
    }
    pub fn poke_steps(&self) -> &[f64] {
        &self.poke_steps
    }
    /// Returns the fringe filter used to demodulate the interferograms
    pub fn filter(&self) -> &FringeFilter {
        &self.filter
    }
    /// Returns the `n_mode x n_actuator` system matrix
    pub fn system(&self) -> &DMatrix<f64> {
        &self.system
    }
    /// Returns the intercepts of the regressions
    pub fn offsets(&self) -> &DMatrix<f64> {
        &self.offsets
    }
    /// Returns the correlation coefficients of the regressions
    pub fn correlation(&self) -> &DMatrix<f64> {
        &self.correlation
    }
    pub fn control_matrix(&self) -> &ControlMatrix {
        &self.control_matrix
    }
    pub fn into_control_matrix(self) -> ControlMatrix {
        self.control_matrix
    }
    /// Returns the modal coefficients of each interferogram of the stack
    ///
    /// The coefficients are `None` for the interferograms of actuators outside the pupil and
    /// for the rejected interferograms
    pub fn coefficients(&self) -> &[Option<DVector<f64>>] {
        &self.coefficients
    }
    /// Returns the indices in the stack of the rejected interferograms
    pub fn rejected(&self) -> &[usize] {
        &self.rejected
    }
}

impl Display for Calibration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = self.control_matrix.singular_values();
        writeln!(
            f,
            "Calibration of {} actuators with {} modes and {} poke steps ({} rejected interferograms)",
            self.n_actuator,
            self.n_mode,
            self.poke_steps.len(),
            self.rejected.len()
        )?;
        write!(
            f,
            " . singular values: [{:e},{:e}], {} discarded",
            s.last().cloned().unwrap_or_default(),
            s.first().cloned().unwrap_or_default(),
            self.control_matrix.n_truncated()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Builder;

    #[test]
    fn stack_length() {
        let calibrator = CalibrationBuilder::new()
            .n_actuator(2)
            .n_mode(3)
            .poke_range(0.1, 0.5, 3)
            .build()
            .unwrap();
        let stack = vec![DMatrix::<f64>::zeros(32, 32); 5];
        assert!(matches!(
            calibrator.calibrate(&stack, None),
            Err(AoError::StackLength {
                found: 5,
                n_actuator: 2,
                n_step: 3
            })
        ));
    }

    #[test]
    fn stack_shapes() {
        let calibrator = Calibrator::builder()
            .n_actuator(1)
            .n_mode(3)
            .poke_range(0.1, 0.5, 2)
            .build()
            .unwrap();
        let stack = vec![DMatrix::<f64>::zeros(32, 32), DMatrix::<f64>::zeros(16, 16)];
        assert!(matches!(
            calibrator.calibrate(&stack, None),
            Err(AoError::ShapeMismatch {
                expected: (32, 32),
                found: (16, 16)
            })
        ));
    }

    #[test]
    fn pupil_selection() {
        let calibrator = Calibrator::builder()
            .n_actuator(3)
            .pupil(vec![true, false, true])
            .build()
            .unwrap();
        assert!(calibrator.is_selected(0));
        assert!(!calibrator.is_selected(1));
        assert!(!calibrator.is_selected(3));
    }
}
