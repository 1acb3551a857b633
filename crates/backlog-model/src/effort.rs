//! Effort scale
//!
//! Provides [`Effort`], a size estimate that can only hold a member of the
//! fixed scale `1, 2, 3, 5, 8, 13, 21, 40, 100`. Raw numbers enter the model
//! either strictly ([`Effort::new`]) or snapped to the nearest member
//! ([`Effort::normalize`]).

use crate::error::ModelError;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};

/// A discretized effort estimate
///
/// Ordered by size. Serialized as its plain integer value; deserializing an
/// off-scale integer fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u32")]
pub struct Effort(u32);

impl Effort {
    /// The allowed effort values, ascending
    pub const SCALE: [u32; 9] = [1, 2, 3, 5, 8, 13, 21, 40, 100];

    /// Smallest effort on the scale
    pub const MIN: Self = Self(1);

    /// Largest effort on the scale
    pub const MAX: Self = Self(100);

    /// Create an effort from a raw value that must already be on the scale
    ///
    /// # Errors
    /// Returns [`ModelError::InvalidEffort`] if `raw` is not a scale member
    pub fn new(raw: i64) -> Result<Self, ModelError> {
        Self::SCALE
            .iter()
            .find(|&&v| i64::from(v) == raw)
            .map(|&v| Self(v))
            .ok_or(ModelError::InvalidEffort(raw))
    }

    /// Snap an arbitrary value to the nearest scale member
    ///
    /// Distance is absolute difference; ties resolve toward the smaller
    /// member, so `4` becomes `3` and `70` becomes `40`.
    #[must_use]
    pub fn normalize(raw: i64) -> Self {
        let mut best = Self::SCALE[0];
        let mut best_distance = raw.abs_diff(i64::from(best));
        for &candidate in &Self::SCALE[1..] {
            let distance = raw.abs_diff(i64::from(candidate));
            // strict comparison keeps the smaller member on a tie
            if distance < best_distance {
                best = candidate;
                best_distance = distance;
            }
        }
        Self(best)
    }

    /// Whether `raw` is a member of the scale
    #[inline]
    #[must_use]
    pub fn is_on_scale(raw: i64) -> bool {
        Self::SCALE.iter().any(|&v| i64::from(v) == raw)
    }

    /// Numeric value of this effort
    #[inline]
    #[must_use]
    pub const fn points(self) -> u32 {
        self.0
    }
}

impl Default for Effort {
    fn default() -> Self {
        Self(5)
    }
}

impl Display for Effort {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<i64> for Effort {
    type Error = ModelError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Effort> for u32 {
    fn from(value: Effort) -> Self {
        value.0
    }
}
