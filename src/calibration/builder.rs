use std::{
    fs::File,
    io::{Read, Write},
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::{
    zernike::ModeBasis, AoError, Builder, DemodulatorBuilder, ModalDecomposerBuilder, Result,
};

use super::{Calibrator, Intercept};

/// [Calibrator] builder
///
/// Default properties:
///  * actuators                 : 10
///  * modes                     : 10
///  * poke steps                : 5 steps evenly spaced in [0.05,0.95]
///  * singular value threshold  : 0.005
///  * intercept                 : free
///  * pupil actuators           : all
///  * discontinuities tolerance : 1e-3 of the pupil pixels
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationBuilder {
    pub n_actuator: usize,
    pub n_mode: usize,
    pub poke_steps: Vec<f64>,
    pub threshold: f64,
    pub intercept: Intercept,
    pub pupil: Option<Vec<bool>>,
    pub max_discontinuity_fraction: f64,
    pub demodulation: DemodulatorBuilder,
    pub modal: ModalDecomposerBuilder,
}

impl Default for CalibrationBuilder {
    fn default() -> Self {
        Self {
            n_actuator: 10,
            n_mode: 10,
            poke_steps: linspace(0.05, 0.95, 5),
            threshold: 0.005,
            intercept: Intercept::Free,
            pupil: None,
            max_discontinuity_fraction: 1e-3,
            demodulation: Default::default(),
            modal: Default::default(),
        }
    }
}

/// Returns `n` values evenly spaced in `[start,end]`
pub fn linspace(start: f64, end: f64, n: usize) -> Vec<f64> {
    match n {
        0 => vec![],
        1 => vec![start],
        _ => {
            let step = (end - start) / (n - 1) as f64;
            (0..n).map(|i| start + i as f64 * step).collect()
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CalibrationBuilderError {
    #[error("cannot open `::fringe_ao::CalibrationBuilder` toml file: {1}")]
    Open(#[source] std::io::Error, PathBuf),
    #[error("cannot create `::fringe_ao::CalibrationBuilder` toml file: {1}")]
    Create(#[source] std::io::Error, PathBuf),
    #[error("cannot read `::fringe_ao::CalibrationBuilder` toml file: {1}")]
    Read(#[source] std::io::Error, PathBuf),
    #[error("cannot write `::fringe_ao::CalibrationBuilder` toml file: {1}")]
    Write(#[source] std::io::Error, PathBuf),
    #[error("cannot deserialize `::fringe_ao::CalibrationBuilder` from toml")]
    Load(#[from] toml::de::Error),
    #[error("cannot serialize `::fringe_ao::CalibrationBuilder` into toml")]
    Save(#[from] toml::ser::Error),
}

/// ## `Calibrator` builder
impl CalibrationBuilder {
    /// Load the calibration builder from a toml file
    pub fn load<P: AsRef<Path>>(path: P) -> std::result::Result<Self, CalibrationBuilderError> {
        let mut file = File::open(&path)
            .map_err(|e| CalibrationBuilderError::Open(e, path.as_ref().to_path_buf()))?;
        let mut toml = String::new();
        file.read_to_string(&mut toml)
            .map_err(|e| CalibrationBuilderError::Read(e, path.as_ref().to_path_buf()))?;
        let builder: CalibrationBuilder = toml::from_str(&toml)?;
        Ok(builder)
    }
    /// Save the calibration builder into a toml file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> std::result::Result<(), CalibrationBuilderError> {
        let toml = toml::to_string_pretty(self)?;
        let mut file = File::create(&path)
            .map_err(|e| CalibrationBuilderError::Create(e, path.as_ref().to_path_buf()))?;
        write!(file, "# ::fringe_ao::CalibrationBuilder\n\n{}", toml)
            .map_err(|e| CalibrationBuilderError::Write(e, path.as_ref().to_path_buf()))?;
        Ok(())
    }
    /// Set the number of actuators
    pub fn n_actuator(self, n_actuator: usize) -> Self {
        Self { n_actuator, ..self }
    }
    /// Set the number of modes
    pub fn n_mode(self, n_mode: usize) -> Self {
        Self { n_mode, ..self }
    }
    /// Set the poke amplitudes applied to each actuator
    pub fn poke_steps(self, poke_steps: Vec<f64>) -> Self {
        Self { poke_steps, ..self }
    }
    /// Set `n` poke amplitudes evenly spaced in `[start,end]`
    pub fn poke_range(self, start: f64, end: f64, n: usize) -> Self {
        Self {
            poke_steps: linspace(start, end, n),
            ..self
        }
    }
    /// Set the singular value threshold relative to the largest singular value
    pub fn threshold(self, threshold: f64) -> Self {
        Self { threshold, ..self }
    }
    /// Set the intercept of the linear regressions
    pub fn intercept(self, intercept: Intercept) -> Self {
        Self { intercept, ..self }
    }
    /// Set the actuators inside the pupil
    pub fn pupil(self, pupil: Vec<bool>) -> Self {
        Self {
            pupil: Some(pupil),
            ..self
        }
    }
    /// Set the largest fraction of discontinuous pupil pixels in an accepted phase map
    pub fn max_discontinuity_fraction(self, max_discontinuity_fraction: f64) -> Self {
        Self {
            max_discontinuity_fraction,
            ..self
        }
    }
    /// Set the phase demodulator builder
    pub fn demodulation(self, demodulation: DemodulatorBuilder) -> Self {
        Self {
            demodulation,
            ..self
        }
    }
    /// Set the modal decomposer builder
    pub fn modal(self, modal: ModalDecomposerBuilder) -> Self {
        Self { modal, ..self }
    }
}

impl Builder for CalibrationBuilder {
    type Component = Calibrator;

    fn build(self) -> Result<Calibrator> {
        if self.n_actuator == 0 {
            return Err(AoError::Configuration(
                "the number of actuators must be strictly positive".to_string(),
            ));
        }
        if self.poke_steps.is_empty() {
            return Err(AoError::Configuration(
                "the poke sequence is empty".to_string(),
            ));
        }
        if self.poke_steps.iter().any(|x| !x.is_finite()) {
            return Err(AoError::Configuration(
                "the poke sequence has non finite amplitudes".to_string(),
            ));
        }
        if !(self.threshold >= 0.) {
            return Err(AoError::Configuration(format!(
                "the singular value threshold must be positive, found {}",
                self.threshold
            )));
        }
        if !(self.max_discontinuity_fraction >= 0.) {
            return Err(AoError::Configuration(format!(
                "the discontinuities tolerance must be positive, found {}",
                self.max_discontinuity_fraction
            )));
        }
        if let Some(pupil) = self.pupil.as_ref() {
            if pupil.len() != self.n_actuator {
                return Err(AoError::PupilSelection {
                    found: pupil.len(),
                    n_actuator: self.n_actuator,
                });
            }
        }
        let demodulator = self.demodulation.clone().build()?;
        let modal = self.modal.clone().build()?;
        let capacity = modal.basis().capacity();
        if self.n_mode == 0 || self.n_mode > capacity {
            return Err(AoError::ModeCount {
                requested: self.n_mode,
                available: capacity,
            });
        }
        Ok(Calibrator {
            config: self,
            demodulator,
            modal,
            progress: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn poke_range() {
        let builder = CalibrationBuilder::new().poke_range(0.05, 0.95, 5);
        let expected = [0.05, 0.275, 0.5, 0.725, 0.95];
        builder
            .poke_steps
            .iter()
            .zip(expected)
            .for_each(|(x, e)| assert!((x - e).abs() < 1e-12));
        assert_eq!(linspace(1., 2., 1), vec![1.]);
        assert!(linspace(1., 2., 0).is_empty());
    }

    #[test]
    fn validation() {
        let err = CalibrationBuilder::new().n_actuator(0).build().unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::ConfigurationMismatch);
        assert!(CalibrationBuilder::new()
            .poke_steps(vec![])
            .build()
            .is_err());
        assert!(CalibrationBuilder::new().threshold(-0.1).build().is_err());
        assert!(matches!(
            CalibrationBuilder::new().n_mode(300).build(),
            Err(AoError::ModeCount {
                requested: 300,
                available: 231
            })
        ));
        assert!(matches!(
            CalibrationBuilder::new().pupil(vec![true; 3]).build(),
            Err(AoError::PupilSelection {
                found: 3,
                n_actuator: 10
            })
        ));
        assert!(CalibrationBuilder::new().build().is_ok());
    }

    #[test]
    fn toml_round_trip() -> anyhow::Result<()> {
        let builder = CalibrationBuilder::new()
            .n_actuator(69)
            .n_mode(21)
            .intercept(Intercept::Zero)
            .pupil((0..69).map(|i| i % 7 != 0).collect())
            .threshold(0.01);
        let path = std::env::temp_dir().join(format!(
            "fringe-ao-calibration-builder-{}.toml",
            std::process::id()
        ));
        builder.save(&path)?;
        let loaded = CalibrationBuilder::load(&path)?;
        std::fs::remove_file(&path)?;
        assert_eq!(builder, loaded);
        Ok(())
    }

    #[test]
    fn missing_file() {
        let err = CalibrationBuilder::load("/nonexistent/calibration.toml").unwrap_err();
        assert!(matches!(err, CalibrationBuilderError::Open(..)));
        let err: AoError = err.into();
        assert_eq!(err.kind(), crate::ErrorKind::Io);
    }
}
