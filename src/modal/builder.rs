use serde::{Deserialize, Serialize};

use crate::{zernike::Zernike, AoError, Builder, Result};

use super::ModalDecomposer;

/// [ModalDecomposer] builder
///
/// Default properties:
///  * binned map size : 128 pixels
///  * basis           : Zernike polynomials up to the radial order 20
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModalDecomposerBuilder {
    pub resize: usize,
    pub basis: Zernike,
}

impl Default for ModalDecomposerBuilder {
    fn default() -> Self {
        Self {
            resize: 128,
            basis: Zernike::default(),
        }
    }
}

impl ModalDecomposerBuilder {
    /// Set the largest size of the binned phase maps
    pub fn resize(self, resize: usize) -> Self {
        Self { resize, ..self }
    }
    /// Set the largest radial order of the Zernike basis
    pub fn max_radial_order(self, max_radial_order: usize) -> Self {
        Self {
            basis: Zernike::new(max_radial_order),
            ..self
        }
    }
}

impl Builder for ModalDecomposerBuilder {
    type Component = ModalDecomposer;

    fn build(self) -> Result<ModalDecomposer> {
        if self.resize == 0 {
            return Err(AoError::Configuration(
                "the binned phase map size must be strictly positive".to_string(),
            ));
        }
        Ok(ModalDecomposer {
            resize: self.resize,
            basis: self.basis,
        })
    }
}
