use serde::{Deserialize, Serialize};

use crate::{filter::FringeFilterBuilder, AoError, Builder, Result};

use super::Demodulator;

/// [Demodulator] builder
///
/// The demodulator is built with the [RustFft](crate::RustFft) transform and the
/// [ReliabilitySorting](crate::ReliabilitySorting) unwrapper; both can be replaced once built.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DemodulatorBuilder {
    pub filter: FringeFilterBuilder,
}

impl DemodulatorBuilder {
    /// Set the fringe filter builder
    pub fn filter(self, filter: FringeFilterBuilder) -> Self {
        Self { filter }
    }
}

impl Builder for DemodulatorBuilder {
    type Component = Demodulator;

    fn build(self) -> Result<Demodulator> {
        let FringeFilterBuilder {
            dc_exclusion,
            window,
            fwhm,
            peak_threshold,
            ..
        } = self.filter;
        if !(0f64..0.5).contains(&dc_exclusion) {
            return Err(AoError::Configuration(format!(
                "DC exclusion must be in [0,0.5), found {dc_exclusion}"
            )));
        }
        if !(window > 0. && window <= 1.) || !(fwhm > 0. && fwhm <= 1.) {
            return Err(AoError::Configuration(format!(
                "fringe filter window ({window}) and FWHM ({fwhm}) fractions must be in (0,1]"
            )));
        }
        if !(0f64..=1.).contains(&peak_threshold) {
            return Err(AoError::Configuration(format!(
                "peak threshold must be in [0,1], found {peak_threshold}"
            )));
        }
        Ok(Demodulator {
            filter: self.filter,
            transform: Default::default(),
            unwrapper: Default::default(),
        })
    }
}
