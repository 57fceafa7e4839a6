//! Shape constraints on the distance → influence curve.
//!
//! The basis family fixes the direction of the learned curve:
//! - `monotone_inc`: non-decreasing step functions of distance.
//! - `concave_inc`: non-decreasing, concave (`min(d, s)` hinges).
//! - `convex_dec`: non-increasing, convex (`max(s − d, 0)` hinges).
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use crate::mixing::errors::MixingError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShapeConstraint {
    MonotoneInc,
    ConcaveInc,
    ConvexDec,
}

impl ShapeConstraint {
    /// Identifier accepted by [`FromStr`].
    pub fn as_str(&self) -> &'static str {
        match self {
            ShapeConstraint::MonotoneInc => "monotone_inc",
            ShapeConstraint::ConcaveInc => "concave_inc",
            ShapeConstraint::ConvexDec => "convex_dec",
        }
    }

    /// `true` for families whose non-negative combinations increase with
    /// distance.
    pub fn is_increasing(&self) -> bool {
        !matches!(self, ShapeConstraint::ConvexDec)
    }

    /// Value of basis column with reference point `s` at distance `d`.
    #[inline]
    pub fn eval(&self, d: f64, s: f64) -> f64 {
        match self {
            ShapeConstraint::MonotoneInc => {
                let step = if d >= s { 1.0 } else { 0.0 };
                let anchor = if s <= 0.0 { 1.0 } else { 0.0 };
                step - anchor
            }
            ShapeConstraint::ConcaveInc => {
                let hinge = if d <= s { d - s } else { 0.0 };
                let offset = if s >= 0.0 { s } else { 0.0 };
                hinge + offset
            }
            ShapeConstraint::ConvexDec => (s - d).max(0.0),
        }
    }
}

impl fmt::Display for ShapeConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ShapeConstraint {
    type Err = MixingError;

    /// Case-insensitive; unknown identifiers are rejected, never defaulted.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "monotone_inc" => Ok(ShapeConstraint::MonotoneInc),
            "concave_inc" => Ok(ShapeConstraint::ConcaveInc),
            "convex_dec" => Ok(ShapeConstraint::ConvexDec),
            _ => Err(MixingError::UnknownShape { name: s.to_string() }),
        }
    }
}
