//! Bounded scoring primitives shared by delegation and aggregation.
//!
//! Confidence values are always clamped into `[0.70, 0.95]`; complexity is
//! an integer score between 1 and 10.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Lowest confidence any delegation or result may report.
pub const MIN_CONFIDENCE: f64 = 0.70;

/// Highest confidence any delegation or result may report.
pub const MAX_CONFIDENCE: f64 = 0.95;

/// Lowest complexity score.
pub const MIN_COMPLEXITY: u8 = 1;

/// Highest complexity score.
pub const MAX_COMPLEXITY: u8 = 10;

/// A confidence estimate clamped into `[MIN_CONFIDENCE, MAX_CONFIDENCE]`.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(from = "f64", into = "f64")]
pub struct Confidence(f64);

impl Confidence {
    /// Clamp a raw score into the allowed range. NaN maps to the floor.
    pub fn clamped(value: f64) -> Self {
        if value.is_nan() {
            return Self(MIN_CONFIDENCE);
        }
        Self(value.clamp(MIN_CONFIDENCE, MAX_CONFIDENCE))
    }

    pub fn value(&self) -> f64 {
        self.0
    }
}

impl From<f64> for Confidence {
    fn from(value: f64) -> Self {
        Self::clamped(value)
    }
}

impl From<Confidence> for f64 {
    fn from(confidence: Confidence) -> Self {
        confidence.0
    }
}

impl std::fmt::Display for Confidence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

/// Estimated complexity of a task, from 1 (trivial) to 10 (very large).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "u8", into = "u8")]
pub struct Complexity(u8);

impl Complexity {
    pub fn new(value: u8) -> Self {
        Self(value.clamp(MIN_COMPLEXITY, MAX_COMPLEXITY))
    }

    pub fn value(&self) -> u8 {
        self.0
    }

    /// Weight used when averaging confidences across tasks.
    pub fn weight(&self) -> f64 {
        f64::from(self.0)
    }
}

impl Default for Complexity {
    fn default() -> Self {
        Self(3)
    }
}

impl From<u8> for Complexity {
    fn from(value: u8) -> Self {
        Self::new(value)
    }
}

impl From<Complexity> for u8 {
    fn from(complexity: Complexity) -> Self {
        complexity.0
    }
}

impl std::fmt::Display for Complexity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Inclusive range of complexities a capability supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplexityRange {
    min: Complexity,
    max: Complexity,
}

impl ComplexityRange {
    /// Create a range, rejecting `min > max` and values outside 1..=10.
    pub fn new(min: u8, max: u8) -> Result<Self> {
        if !(MIN_COMPLEXITY..=MAX_COMPLEXITY).contains(&min)
            || !(MIN_COMPLEXITY..=MAX_COMPLEXITY).contains(&max)
        {
            return Err(Error::Validation(format!(
                "complexity range {}..={} must lie within {}..={}",
                min, max, MIN_COMPLEXITY, MAX_COMPLEXITY
            )));
        }
        if min > max {
            return Err(Error::Validation(format!(
                "complexity range {}..={} is inverted",
                min, max
            )));
        }
        Ok(Self {
            min: Complexity(min),
            max: Complexity(max),
        })
    }

    /// The full 1..=10 range.
    pub fn full() -> Self {
        Self {
            min: Complexity(MIN_COMPLEXITY),
            max: Complexity(MAX_COMPLEXITY),
        }
    }

    pub fn min(&self) -> Complexity {
        self.min
    }

    pub fn max(&self) -> Complexity {
        self.max
    }

    pub fn contains(&self, complexity: Complexity) -> bool {
        complexity >= self.min && complexity <= self.max
    }

    fn center(&self) -> f64 {
        (self.min.weight() + self.max.weight()) / 2.0
    }
}

/// How well a task's complexity fits a capability's supported range.
///
/// Returns 1.0 at the centre of the band, decays linearly to 0.5 at the
/// range edges, and 0.0 outside the range.
pub fn complexity_fit(task: Complexity, range: &ComplexityRange) -> f64 {
    if !range.contains(task) {
        return 0.0;
    }
    let half_width = (range.max.weight() - range.min.weight()) / 2.0;
    if half_width == 0.0 {
        return 1.0;
    }
    let distance = (task.weight() - range.center()).abs();
    1.0 - 0.5 * (distance / half_width)
}

/// The best fit any integer complexity can reach within `range`.
///
/// Below 1.0 when the band centre falls between two integers.
pub fn peak_fit(range: &ComplexityRange) -> f64 {
    (range.min.value()..=range.max.value())
        .map(|c| complexity_fit(Complexity(c), range))
        .fold(0.0, f64::max)
}
