//! Fixed-length face embedding vectors.
//!
//! The embedding model itself is an external collaborator; this module only
//! owns the vector representation and the distance metric the matcher uses.

use crate::error::{Result, RollcallError};
use serde::{Deserialize, Serialize};

/// A face embedding captured during enrollment or recognition. All vectors
/// in one deployment share the dimensionality configured in `config.toml`
/// (128 for the model the enrollment camera flow uses).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Descriptor {
    pub values: Vec<f32>,
}

impl Descriptor {
    /// Wraps a raw vector, rejecting anything that does not match the
    /// configured dimensionality.
    pub fn new(values: Vec<f32>, expected_dim: usize) -> Result<Self> {
        if values.len() != expected_dim {
            return Err(RollcallError::InvalidDescriptor {
                expected: expected_dim,
                got: values.len(),
            });
        }
        Ok(Self { values })
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Euclidean distance to another descriptor. Lower is more similar;
    /// the matcher converts this into a confidence as `1 - distance`.
    pub fn euclidean_distance(&self, other: &Descriptor) -> f32 {
        self.values
            .iter()
            .zip(other.values.iter())
            .map(|(a, b)| (a - b).powi(2))
            .sum::<f32>()
            .sqrt()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distance_to_self_is_zero() {
        let d = Descriptor { values: vec![0.3, -0.1, 0.9] };
        assert_eq!(d.euclidean_distance(&d), 0.0);
    }

    #[test]
    fn distance_matches_hand_computed_value() {
        let a = Descriptor { values: vec![0.0, 0.0] };
        let b = Descriptor { values: vec![3.0, 4.0] };
        assert!((a.euclidean_distance(&b) - 5.0).abs() < 1e-6);
    }

    #[test]
    fn wrong_dimensionality_is_rejected() {
        let err = Descriptor::new(vec![0.1, 0.2, 0.3], 128).unwrap_err();
        assert!(matches!(
            err,
            crate::error::RollcallError::InvalidDescriptor { expected: 128, got: 3 }
        ));
    }

    #[test]
    fn correct_dimensionality_is_accepted() {
        assert!(Descriptor::new(vec![0.0; 128], 128).is_ok());
    }
}
