use serde::{
    Deserialize,
    Serialize,
};

use crate::error::SimilarityError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimePenaltyKind {
    Gaussian,
    None,
}

/// Weight in `[0, 1]` for the retention time distance of two peaks.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TimePenalty {
    /// `exp(-d^2 / (2 * tolerance^2))` per dimension, 0 below `threshold`.
    Gaussian {
        tolerance: f64,
        tolerance2: f64,
        threshold: f64,
    },
    None,
}

impl TimePenalty {
    pub fn weight(
        &self,
        rt_a: &[f64],
        rt_b: &[f64],
    ) -> Result<f64, SimilarityError> {
        if rt_a.len() != rt_b.len() {
            return Err(SimilarityError::DimensionMismatch(rt_a.len(), rt_b.len()));
        }

        match self {
            TimePenalty::None => Ok(1.),
            TimePenalty::Gaussian {
                tolerance,
                tolerance2,
                threshold,
            } => {
                let mut weight = 1.;
                for (dim, (a, b)) in rt_a.iter().zip(rt_b).enumerate() {
                    let tol = if dim == 0 { *tolerance } else { *tolerance2 };
                    let diff = a - b;
                    weight *= (-(diff * diff) / (2. * tol * tol)).exp();
                }
                if weight < *threshold {
                    Ok(0.)
                } else {
                    Ok(weight)
                }
            },
        }
    }
}
