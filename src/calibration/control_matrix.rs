use std::ops::{Deref, Mul};

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::{AoError, Result};

/// Control matrix
///
/// Truncated pseudo-inverse of the `n_mode x n_actuator` system matrix: it maps modal
/// coefficients to actuator commands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlMatrix {
    matrix: DMatrix<f64>,
    singular_values: Vec<f64>,
    threshold: f64,
    n_truncated: usize,
}

impl ControlMatrix {
    /// Computes the pseudo-inverse of the system matrix
    ///
    /// The singular values lower or equal to `threshold` times the largest singular value are discarded
    pub fn from_system(system: &DMatrix<f64>, threshold: f64) -> Result<Self> {
        if !(threshold >= 0.) {
            return Err(AoError::Configuration(format!(
                "the singular value threshold must be positive, found {threshold}"
            )));
        }
        let svd = system.clone().svd(true, true);
        let mut singular_values: Vec<f64> = svd.singular_values.iter().cloned().collect();
        singular_values.sort_by(|a, b| b.total_cmp(a));
        let (s_min, s_max) = (
            singular_values.last().cloned().unwrap_or_default(),
            singular_values.first().cloned().unwrap_or_default(),
        );
        log::info!(
            "Calibration singular values range: [{:e},{:e}]",
            s_min,
            s_max
        );
        let eps = threshold * s_max;
        let n_truncated = singular_values.iter().filter(|s| **s <= eps).count();
        if n_truncated > 0 {
            log::warn!(
                "{} singular values out of {} are lower than {:e} and are discarded",
                n_truncated,
                singular_values.len(),
                eps
            );
        }
        let matrix = svd
            .pseudo_inverse(eps)
            .map_err(|msg| AoError::PseudoInverse(msg.to_string()))?;
        Ok(Self {
            matrix,
            singular_values,
            threshold,
            n_truncated,
        })
    }
    pub fn n_actuator(&self) -> usize {
        self.matrix.nrows()
    }
    pub fn n_mode(&self) -> usize {
        self.matrix.ncols()
    }
    /// Returns the singular values of the system matrix in decreasing order
    pub fn singular_values(&self) -> &[f64] {
        &self.singular_values
    }
    /// Returns the number of discarded singular values
    pub fn n_truncated(&self) -> usize {
        self.n_truncated
    }
    pub fn threshold(&self) -> f64 {
        self.threshold
    }
    /// Returns the condition number of the inverted system
    pub fn condition_number(&self) -> f64 {
        let kept = &self.singular_values[..self.singular_values.len() - self.n_truncated];
        match (kept.first(), kept.last()) {
            (Some(max), Some(min)) => max / min,
            _ => f64::INFINITY,
        }
    }
    pub fn as_matrix(&self) -> &DMatrix<f64> {
        &self.matrix
    }
    pub fn into_inner(self) -> DMatrix<f64> {
        self.matrix
    }
    /// Returns the actuator commands that produce the given modal coefficients
    pub fn actuator_commands(&self, modes: &[f64]) -> Result<Vec<f64>> {
        if modes.len() != self.n_mode() {
            return Err(AoError::shape_mismatch(
                (self.n_mode(), 1),
                (modes.len(), 1),
            ));
        }
        Ok(self * modes)
    }
}

impl Deref for ControlMatrix {
    type Target = DMatrix<f64>;

    fn deref(&self) -> &Self::Target {
        &self.matrix
    }
}

impl<'a> Mul<&'a [f64]> for &'a ControlMatrix {
    type Output = Vec<f64>;

    fn mul(self, rhs: &'a [f64]) -> Self::Output {
        (&self.matrix * DVector::from_column_slice(rhs))
            .as_slice()
            .to_vec()
    }
}

impl Mul<Vec<f64>> for &ControlMatrix {
    type Output = Vec<f64>;

    fn mul(self, rhs: Vec<f64>) -> Self::Output {
        self * rhs.as_slice()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagonal_system() {
        let system = DMatrix::from_diagonal(&DVector::from_vec(vec![2., 4., 0.5]));
        let cm = ControlMatrix::from_system(&system, 0.005).unwrap();
        assert_eq!(cm.n_truncated(), 0);
        cm.singular_values()
            .iter()
            .zip([4., 2., 0.5])
            .for_each(|(s, e)| assert!((s - e).abs() < 1e-12));
        assert!((cm[(0, 0)] - 0.5).abs() < 1e-12);
        assert!((cm[(2, 2)] - 2.).abs() < 1e-12);
        assert!((cm.condition_number() - 8.).abs() < 1e-12);
        let commands = cm.actuator_commands(&[1., 1., 1.]).unwrap();
        assert!((commands[1] - 0.25).abs() < 1e-12);
        assert!(cm.actuator_commands(&[1.]).is_err());
    }

    #[test]
    fn truncation() {
        // rank 1 system of 3 modes by 2 actuators
        let system = DMatrix::from_row_slice(3, 2, &[1., 2., 2., 4., 3., 6.]);
        let cm = ControlMatrix::from_system(&system, 0.005).unwrap();
        assert_eq!(cm.shape(), (2, 3));
        assert_eq!(cm.n_truncated(), 1);
        let product = &system * cm.as_matrix() * &system;
        product
            .iter()
            .zip(system.iter())
            .for_each(|(a, b)| assert!((a - b).abs() < 1e-9));
    }

    #[test]
    fn negative_threshold() {
        let system = DMatrix::<f64>::identity(2, 2);
        assert!(matches!(
            ControlMatrix::from_system(&system, -1.),
            Err(AoError::Configuration(_))
        ));
    }
}
