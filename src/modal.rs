//! Modal decomposition of phase maps
//!
//! A phase map is block-averaged down to at most `resize` pixels across and projected
//! onto the first modes of a [ModeBasis] by linear least-squares.

use std::fmt::Display;

use nalgebra::{DMatrix, DVector};

use crate::{
    zernike::{ModeBasis, Zernike},
    AoError, FromBuilder, PhaseMap, Result,
};

mod builder;
pub use builder::ModalDecomposerBuilder;

/// Modal decomposer
#[derive(Debug, Clone)]
pub struct ModalDecomposer<B = Zernike> {
    resize: usize,
    basis: B,
}

impl FromBuilder for ModalDecomposer {
    type ComponentBuilder = ModalDecomposerBuilder;
}

/// Least-squares projector onto the modes of a basis
///
/// The projector is the pseudo-inverse of the modes sampled inside the pupil of the
/// binned grid; it is computed once and applied to any number of phase maps of the same size.
#[derive(Debug, Clone)]
pub struct ModalProjector {
    side: usize,
    factor: usize,
    valid: Vec<usize>,
    pinv: DMatrix<f64>,
}

impl Display for ModalProjector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Modal projector: {} modes from {}x{} maps binned by {} ({} pixels)",
            self.pinv.nrows(),
            self.side,
            self.side,
            self.factor,
            self.valid.len()
        )
    }
}

/// Block-averages `data` by `factor` along both dimensions
fn bin(data: &DMatrix<f64>, factor: usize) -> DMatrix<f64> {
    if factor == 1 {
        return data.clone();
    }
    let (nrows, ncols) = (data.nrows() / factor, data.ncols() / factor);
    let scale = ((factor * factor) as f64).recip();
    DMatrix::from_fn(nrows, ncols, |i, j| {
        data.view((i * factor, j * factor), (factor, factor)).sum() * scale
    })
}

/// Returns true for the blocks of `mask` that are entirely valid
fn bin_mask(mask: &DMatrix<bool>, factor: usize) -> DMatrix<bool> {
    let (nrows, ncols) = (mask.nrows() / factor, mask.ncols() / factor);
    DMatrix::from_fn(nrows, ncols, |i, j| {
        mask.view((i * factor, j * factor), (factor, factor))
            .iter()
            .all(|x| *x)
    })
}

impl<B> ModalDecomposer<B> {
    /// Replaces the mode basis
    pub fn with_basis<C: ModeBasis>(self, basis: C) -> ModalDecomposer<C> {
        ModalDecomposer {
            resize: self.resize,
            basis,
        }
    }
    /// Returns the size of the binned maps: the largest divisor of `side` not larger than `resize`
    pub fn binned_side(&self, side: usize) -> usize {
        (1..=self.resize.min(side).max(1))
            .rev()
            .find(|d| side % d == 0)
            .unwrap_or(1)
    }
}

impl<B: ModeBasis> ModalDecomposer<B> {
    pub fn basis(&self) -> &B {
        &self.basis
    }
    /// Computes the projector of `side`x`side` phase maps onto the first `n_mode` modes
    ///
    /// If a mask is given, only the binned pixels made entirely of valid pixels are used
    pub fn projector(
        &self,
        n_mode: usize,
        side: usize,
        mask: Option<&DMatrix<bool>>,
    ) -> Result<ModalProjector> {
        if n_mode == 0 || n_mode > self.basis.capacity() {
            return Err(AoError::ModeCount {
                requested: n_mode,
                available: self.basis.capacity(),
            });
        }
        if side == 0 {
            return Err(AoError::NotSquare(side, side));
        }
        let binned_side = self.binned_side(side);
        let factor = side / binned_side;
        let mut pupil = self.basis.pupil(binned_side);
        if let Some(mask) = mask {
            if mask.shape() != (side, side) {
                return Err(AoError::shape_mismatch((side, side), mask.shape()));
            }
            pupil = pupil.zip_map(&bin_mask(mask, factor), |p, m| p && m);
        }
        let valid: Vec<usize> = pupil
            .iter()
            .enumerate()
            .filter_map(|(k, p)| if *p { Some(k) } else { None })
            .collect();
        if valid.len() < n_mode {
            return Err(AoError::ModeCount {
                requested: n_mode,
                available: valid.len(),
            });
        }

        let modes = self.basis.modes(n_mode, binned_side)?;
        let b = DMatrix::from_fn(valid.len(), n_mode, |k, i| modes[i][valid[k]]);
        let svd = b.svd(true, true);
        let s_max = svd.singular_values.iter().cloned().fold(0f64, f64::max);
        let pinv = svd
            .pseudo_inverse(s_max * 1e-10)
            .map_err(|e| AoError::PseudoInverse(e.to_string()))?;
        let projector = ModalProjector {
            side,
            factor,
            valid,
            pinv,
        };
        log::debug!("{projector}");
        Ok(projector)
    }
    /// Returns the first `n_mode` modal coefficients of a square phase map
    pub fn decompose(&self, phase: &DMatrix<f64>, n_mode: usize) -> Result<DVector<f64>> {
        let (nrows, ncols) = phase.shape();
        if nrows != ncols {
            return Err(AoError::NotSquare(nrows, ncols));
        }
        self.projector(n_mode, nrows, None)?.project(phase)
    }
    /// Returns the first `n_mode` modal coefficients of a phase map restricted to its pupil
    pub fn decompose_phase_map(&self, phase: &PhaseMap, n_mode: usize) -> Result<DVector<f64>> {
        self.projector(n_mode, phase.nrows(), Some(phase.mask().as_matrix()))?
            .project(phase)
    }
}

impl ModalProjector {
    pub fn n_mode(&self) -> usize {
        self.pinv.nrows()
    }
    pub fn side(&self) -> usize {
        self.side
    }
    /// Returns the modal coefficients of a phase map
    pub fn project(&self, phase: &DMatrix<f64>) -> Result<DVector<f64>> {
        if phase.shape() != (self.side, self.side) {
            return Err(AoError::shape_mismatch(
                (self.side, self.side),
                phase.shape(),
            ));
        }
        let binned = bin(phase, self.factor);
        let values = DVector::from_iterator(self.valid.len(), self.valid.iter().map(|k| binned[*k]));
        Ok(&self.pinv * values)
    }
}
