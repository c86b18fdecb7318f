pub mod array;
pub mod time;

use std::sync::Arc;

use serde::{
    Deserialize,
    Serialize,
};

pub use self::array::{
    ArrayKind,
    ArraySimilarity,
};
pub use self::time::{
    TimePenalty,
    TimePenaltyKind,
};
use crate::error::{
    ConfigError,
    SimilarityError,
};
use crate::peaks::Spectrum;

/// Scores a pair of peaks from their retention times and spectra.
///
/// Higher is more similar. NaN means the pair cannot be compared. Whether
/// `score(a, b) == score(b, a)` holds is declared by the caller through
/// `EngineConfig::assume_symmetric`, it is never checked.
pub trait ScalarArraySimilarity: Send + Sync {
    fn score(
        &self,
        rt_a: &[f64],
        rt_b: &[f64],
        ms_a: &Spectrum,
        ms_b: &Spectrum,
    ) -> Result<f64, SimilarityError>;
}

impl<F> ScalarArraySimilarity for F
where
    F: Fn(&[f64], &[f64], &Spectrum, &Spectrum) -> Result<f64, SimilarityError> + Send + Sync,
{
    fn score(
        &self,
        rt_a: &[f64],
        rt_b: &[f64],
        ms_a: &Spectrum,
        ms_b: &Spectrum,
    ) -> Result<f64, SimilarityError> {
        self(rt_a, rt_b, ms_a, ms_b)
    }
}

/// Retention time weight multiplied by the spectral similarity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProductSimilarity {
    pub time: TimePenalty,
    pub array: ArraySimilarity,
}

impl ScalarArraySimilarity for ProductSimilarity {
    fn score(
        &self,
        rt_a: &[f64],
        rt_b: &[f64],
        ms_a: &Spectrum,
        ms_b: &Spectrum,
    ) -> Result<f64, SimilarityError> {
        let weight = self.time.weight(rt_a, rt_b)?;
        if weight == 0. {
            return Ok(0.);
        }
        Ok(weight * self.array.score(ms_a, ms_b))
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy)]
pub struct SimilarityConfig {
    pub array: ArrayKind,
    pub mass_bin_width: f64,
    pub lp_exponent: f64,
    pub time_penalty: TimePenaltyKind,
    pub rt_tolerance: f64,
    pub rt2_tolerance: f64,
    pub rt_threshold: f64,
}

impl Default for SimilarityConfig {
    fn default() -> Self {
        SimilarityConfig {
            array: ArrayKind::Cosine,
            mass_bin_width: 1.0,
            lp_exponent: 2.0,
            time_penalty: TimePenaltyKind::Gaussian,
            rt_tolerance: 5.0,
            rt2_tolerance: 0.1,
            rt_threshold: 0.0,
        }
    }
}

impl SimilarityConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        positive("mass_bin_width", self.mass_bin_width)?;
        if self.array == ArrayKind::Lp {
            positive("lp_exponent", self.lp_exponent)?;
        }
        if self.time_penalty == TimePenaltyKind::Gaussian {
            positive("rt_tolerance", self.rt_tolerance)?;
            positive("rt2_tolerance", self.rt2_tolerance)?;
            if !(0. ..=1.).contains(&self.rt_threshold) {
                return Err(ConfigError::InvalidParameter {
                    name: "rt_threshold",
                    value: self.rt_threshold,
                    reason: "must be within [0, 1]",
                });
            }
        }
        Ok(())
    }

    pub fn build(&self) -> Result<Arc<dyn ScalarArraySimilarity>, ConfigError> {
        self.validate()?;
        let time = match self.time_penalty {
            TimePenaltyKind::Gaussian => TimePenalty::Gaussian {
                tolerance: self.rt_tolerance,
                tolerance2: self.rt2_tolerance,
                threshold: self.rt_threshold,
            },
            TimePenaltyKind::None => TimePenalty::None,
        };
        let array = ArraySimilarity {
            kind: self.array,
            mass_bin_width: self.mass_bin_width,
            lp_exponent: self.lp_exponent,
        };
        Ok(Arc::new(ProductSimilarity { time, array }))
    }
}

pub(crate) fn positive(
    name: &'static str,
    value: f64,
) -> Result<(), ConfigError> {
    if value > 0. && value.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::InvalidParameter {
            name,
            value,
            reason: "must be positive",
        })
    }
}

#[cfg(test)]
mod test_similarity {
    use super::*;

    fn spec() -> Spectrum {
        Spectrum::new(vec![50., 73.], vec![100., 20.])
    }

    #[test]
    fn test_product_similarity() {
        let sim = SimilarityConfig::default().build().unwrap();
        let s = spec();
        let same = sim.score(&[10.], &[10.], &s, &s).unwrap();
        assert!((same - 1.).abs() < 1e-12);

        let shifted = sim.score(&[10.], &[15.], &s, &s).unwrap();
        assert!((shifted - (-0.5f64).exp()).abs() < 1e-12);
    }

    #[test]
    fn test_closure_is_a_similarity() {
        let constant = |_: &[f64], _: &[f64], _: &Spectrum, _: &Spectrum| -> Result<f64, SimilarityError> {
            Ok(0.42)
        };
        let boxed: Arc<dyn ScalarArraySimilarity> = Arc::new(constant);
        assert_eq!(boxed.score(&[1.], &[2.], &spec(), &spec()).unwrap(), 0.42);
    }

    #[test]
    fn test_invalid_config() {
        let config = SimilarityConfig {
            mass_bin_width: 0.,
            ..Default::default()
        };
        assert!(matches!(
            config.build(),
            Err(ConfigError::InvalidParameter {
                name: "mass_bin_width",
                ..
            })
        ));

        let config = SimilarityConfig {
            rt_threshold: 1.5,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = SimilarityConfig {
            time_penalty: TimePenaltyKind::None,
            rt_tolerance: -1.,
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }
}
