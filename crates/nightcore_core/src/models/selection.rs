//! Command-line value types: stage selection, output ratio, publish limit.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::enums::Stage;

/// Errors from parsing command-line value types.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SelectionError {
    #[error("Invalid range format: `{0}`. Expected format: `start:end`")]
    MalformedRange(String),

    #[error("Invalid range `{value}`: start should be less or equal to end")]
    ReversedRange { value: String },

    #[error("Given range `{value}` is not within allowed range: `1:3`")]
    RangeOutOfBounds { value: String },

    #[error("Invalid step {0}. Allowed values: 1, 2, 3")]
    UnknownStage(u8),

    #[error("Invalid ratio format: `{0}`. Expected format: `width:height`")]
    MalformedRatio(String),

    #[error("Ratio `{0}` is outside the allowed range [16:9, 32:9]")]
    RatioOutOfBounds(String),

    #[error("{value}. Valid range: [1:{available}] or [-{available}:-1]")]
    LimitOutOfRange { value: i64, available: usize },
}

/// Inclusive range of stages to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageSelection {
    start: Stage,
    end: Stage,
}

impl StageSelection {
    /// Every stage.
    pub fn all() -> Self {
        Self {
            start: Stage::FIRST,
            end: Stage::LAST,
        }
    }

    /// A single stage.
    pub fn only(stage: Stage) -> Self {
        Self {
            start: stage,
            end: stage,
        }
    }

    /// Select stage `number` only (the `--step` option).
    pub fn single(number: u8) -> Result<Self, SelectionError> {
        Stage::from_number(number)
            .map(Self::only)
            .ok_or(SelectionError::UnknownStage(number))
    }

    pub fn contains(&self, stage: Stage) -> bool {
        self.start <= stage && stage <= self.end
    }
}

impl Default for StageSelection {
    fn default() -> Self {
        Self::all()
    }
}

impl FromStr for StageSelection {
    type Err = SelectionError;

    /// Parse `start:end`, e.g. `1:3` or `2:2`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (start, end) = s
            .split_once(':')
            .ok_or_else(|| SelectionError::MalformedRange(s.to_string()))?;
        let start: u8 = start
            .trim()
            .parse()
            .map_err(|_| SelectionError::MalformedRange(s.to_string()))?;
        let end: u8 = end
            .trim()
            .parse()
            .map_err(|_| SelectionError::MalformedRange(s.to_string()))?;

        if start > end {
            return Err(SelectionError::ReversedRange { value: s.to_string() });
        }

        match (Stage::from_number(start), Stage::from_number(end)) {
            (Some(start), Some(end)) => Ok(Self { start, end }),
            _ => Err(SelectionError::RangeOutOfBounds { value: s.to_string() }),
        }
    }
}

impl std::fmt::Display for StageSelection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.start.number(), self.end.number())
    }
}

/// Output aspect ratio as `width:height`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AspectRatio {
    pub width: u32,
    pub height: u32,
}

impl AspectRatio {
    pub fn value(&self) -> f64 {
        self.width as f64 / self.height as f64
    }
}

impl Default for AspectRatio {
    fn default() -> Self {
        Self {
            width: 16,
            height: 9,
        }
    }
}

impl FromStr for AspectRatio {
    type Err = SelectionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || SelectionError::MalformedRatio(s.to_string());

        let (width, height) = s.split_once(':').ok_or_else(malformed)?;
        let width: u32 = width.trim().parse().map_err(|_| malformed())?;
        let height: u32 = height.trim().parse().map_err(|_| malformed())?;
        if width == 0 || height == 0 {
            return Err(malformed());
        }

        let ratio = Self { width, height };
        // Bounds are 16:9 and 32:9, compared exactly by cross-multiplication
        let w = width as u64;
        let h = height as u64;
        if w * 9 < h * 16 || w * 9 > h * 32 {
            return Err(SelectionError::RatioOutOfBounds(s.to_string()));
        }

        Ok(ratio)
    }
}

impl std::fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.width, self.height)
    }
}

/// Subset of the release order to publish.
///
/// Positive `n` takes the first `n` entries, negative `n` the last `|n|`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishLimit(i64);

impl PublishLimit {
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    pub fn value(&self) -> i64 {
        self.0
    }

    /// Check the limit against the number of publishable videos.
    pub fn validate(&self, available: usize) -> Result<(), SelectionError> {
        let magnitude = self.0.unsigned_abs();
        if magnitude == 0 || magnitude > available as u64 {
            return Err(SelectionError::LimitOutOfRange {
                value: self.0,
                available,
            });
        }
        Ok(())
    }

    /// Apply the limit to an ordered sequence.
    pub fn apply<T>(&self, mut items: Vec<T>) -> Result<Vec<T>, SelectionError> {
        self.validate(items.len())?;
        let count = self.0.unsigned_abs() as usize;
        if self.0 > 0 {
            items.truncate(count);
            Ok(items)
        } else {
            let skip = items.len() - count;
            Ok(items.split_off(skip))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_stage_ranges() {
        let selection: StageSelection = "1:3".parse().unwrap();
        assert_eq!(selection, StageSelection::all());

        let selection: StageSelection = "2:3".parse().unwrap();
        assert!(!selection.contains(Stage::Generate));
        assert!(selection.contains(Stage::Render));
        assert!(selection.contains(Stage::Publish));
    }

    #[test]
    fn rejects_bad_stage_ranges() {
        assert!(matches!(
            "2:1".parse::<StageSelection>(),
            Err(SelectionError::ReversedRange { .. })
        ));
        assert!(matches!(
            "0:2".parse::<StageSelection>(),
            Err(SelectionError::RangeOutOfBounds { .. })
        ));
        assert!(matches!(
            "12".parse::<StageSelection>(),
            Err(SelectionError::MalformedRange(_))
        ));
    }

    #[test]
    fn single_step_selects_one_stage() {
        let selection = StageSelection::single(2).unwrap();
        assert_eq!(
            Stage::ALL.iter().filter(|s| selection.contains(**s)).count(),
            1
        );
        assert!(selection.contains(Stage::Render));
        assert_eq!(StageSelection::single(4), Err(SelectionError::UnknownStage(4)));
    }

    #[test]
    fn ratio_bounds_are_inclusive() {
        assert!("16:9".parse::<AspectRatio>().is_ok());
        assert!("32:9".parse::<AspectRatio>().is_ok());
        assert!("21:9".parse::<AspectRatio>().is_ok());
        assert!(matches!(
            "4:3".parse::<AspectRatio>(),
            Err(SelectionError::RatioOutOfBounds(_))
        ));
        assert!(matches!(
            "16/9".parse::<AspectRatio>(),
            Err(SelectionError::MalformedRatio(_))
        ));
    }

    #[test]
    fn negative_limit_takes_suffix() {
        let items = vec![1, 2, 3, 4, 5];
        assert_eq!(PublishLimit::new(-2).apply(items).unwrap(), vec![4, 5]);
    }

    #[test]
    fn positive_limit_takes_prefix() {
        let items = vec![1, 2, 3, 4, 5];
        assert_eq!(PublishLimit::new(3).apply(items).unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn limit_beyond_length_is_an_error() {
        let items = vec![1, 2, 3, 4, 5];
        assert_eq!(
            PublishLimit::new(-6).apply(items),
            Err(SelectionError::LimitOutOfRange {
                value: -6,
                available: 5
            })
        );
        assert!(PublishLimit::new(0).validate(5).is_err());
    }
}
