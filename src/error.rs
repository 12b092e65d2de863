use crate::calibration::CalibrationBuilderError;

/// Broad classes of [AoError]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Non-positive radius, non-square images or mismatched array shapes
    InvalidGeometry,
    /// No carrier frequency or a vanishing Fourier filter
    DegenerateInput,
    /// Stack length, mode count or actuator selection inconsistent with the configuration
    ConfigurationMismatch,
    /// Linear algebra failure
    Numerical,
    /// Configuration file I/O
    Io,
}

#[derive(Debug, thiserror::Error)]
pub enum AoError {
    #[error("invalid pupil radius {0}, the radius must be strictly positive")]
    InvalidRadius(usize),
    #[error("expected a square image with an even side, found {0}x{1}")]
    NotSquare(usize, usize),
    #[error("shape mismatch: expected {expected:?}, found {found:?}")]
    ShapeMismatch {
        expected: (usize, usize),
        found: (usize, usize),
    },
    #[error("no carrier frequency distinguishable from DC in the interferogram spectrum")]
    NoCarrier,
    #[error("the Fourier fringe filter vanishes (sum = {0:e})")]
    VanishingFilter(f64),
    #[error("the image stack has {found} entries, expected {n_actuator} actuators x {n_step} poke steps")]
    StackLength {
        found: usize,
        n_actuator: usize,
        n_step: usize,
    },
    #[error("cannot fit {requested} modes, the basis provides at most {available}")]
    ModeCount { requested: usize, available: usize },
    #[error("the pupil selection has {found} entries for {n_actuator} actuators")]
    PupilSelection { found: usize, n_actuator: usize },
    #[error("invalid configuration: {0}")]
    Configuration(String),
    #[error("pseudo-inverse: {0}")]
    PseudoInverse(String),
    #[error("calibration builder failed")]
    Builder(#[from] CalibrationBuilderError),
}

impl AoError {
    /// Returns the class of the error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidRadius(_) | Self::NotSquare(..) | Self::ShapeMismatch { .. } => {
                ErrorKind::InvalidGeometry
            }
            Self::NoCarrier | Self::VanishingFilter(_) => ErrorKind::DegenerateInput,
            Self::StackLength { .. }
            | Self::ModeCount { .. }
            | Self::PupilSelection { .. }
            | Self::Configuration(_) => ErrorKind::ConfigurationMismatch,
            Self::PseudoInverse(_) => ErrorKind::Numerical,
            Self::Builder(_) => ErrorKind::Io,
        }
    }
    pub(crate) fn shape_mismatch(expected: (usize, usize), found: (usize, usize)) -> Self {
        Self::ShapeMismatch { expected, found }
    }
}
