//!
//! # Interferometric adaptive optics calibration
//!
//! The crate extracts wavefront estimates from the interferograms of an off-axis
//! interferometer, decomposes them onto Zernike polynomials and derives the control matrix
//! of a deformable mirror from a sequence of actuator pokes.
//!
//! The components of the calibration pipeline are created using the builder associated to
//! each component:
//! ```rust
//! use fringe_ao::{make_mask, Builder, Demodulator, FromBuilder};
//! use nalgebra::DMatrix;
//!
//! let mask = make_mask(32)?;
//! let image = DMatrix::from_fn(64, 64, |i, j| {
//!     let fringes = 1. + (2. * std::f64::consts::PI * 16. * j as f64 / 64.).cos();
//!     if mask[(i, j)] { fringes } else { 0. }
//! });
//! let demodulator = Demodulator::builder().build()?;
//! let phase = demodulator.phase_unwrap(&image, None)?;
//! assert_eq!(phase.shape(), (64, 64));
//! # Ok::<(), fringe_ao::AoError>(())
//! ```
//! The same steps are available as functions with the default settings:
//! [make_mask], [make_fft_filter], [mgcentroid], [phase_unwrap], [get_zernike_modes]
//! and [create_control_matrix].

pub mod calibration;
pub mod centroid;
pub mod demodulation;
pub mod error;
pub mod filter;
pub mod fourier;
pub mod functions;
pub mod mask;
pub mod modal;
pub mod unwrap;
pub mod zernike;

#[doc(inline)]
pub use self::calibration::{
    linspace, Calibration, CalibrationBuilder, CalibrationBuilderError, Calibrator,
    ControlMatrix, Intercept, LinearFit,
};
#[doc(inline)]
pub use self::centroid::centroid;
#[doc(inline)]
pub use self::demodulation::{Demodulator, DemodulatorBuilder, PhaseMap};
#[doc(inline)]
pub use self::error::{AoError, ErrorKind};
#[doc(inline)]
pub use self::filter::{FringeFilter, FringeFilterBuilder};
#[doc(inline)]
pub use self::fourier::{Interferogram, RustFft, Transform2D};
pub use self::functions::*;
#[doc(inline)]
pub use self::mask::PupilMask;
#[doc(inline)]
pub use self::modal::{ModalDecomposer, ModalDecomposerBuilder, ModalProjector};
#[doc(inline)]
pub use self::unwrap::{PhaseUnwrapper, ReliabilitySorting};
#[doc(inline)]
pub use self::zernike::{noll_index, phase_from_modes, ModeBasis, Zernike};

pub type Result<T> = std::result::Result<T, AoError>;

/// Component builder type trait
pub trait Builder: Default {
    type Component;
    fn new() -> Self {
        Default::default()
    }
    fn build(self) -> Result<Self::Component>;
}

/// Component to builder link
///
/// ```
/// use fringe_ao::{Builder, FromBuilder, ModalDecomposer};
/// let modal = ModalDecomposer::builder().resize(64).build()?;
/// assert_eq!(modal.binned_side(256), 64);
/// # Ok::<(), fringe_ao::AoError>(())
/// ```
pub trait FromBuilder: Sized {
    type ComponentBuilder: Builder<Component = Self>;
    fn builder() -> Self::ComponentBuilder {
        Self::ComponentBuilder::new()
    }
}
