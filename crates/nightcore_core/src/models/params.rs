//! Variant parameters and their command-line parsing.
//!
//! A `(speed, reverb)` pair identifies one variant at every stage of the
//! pipeline. Speed is a percentage of the original tempo, reverb an
//! intensity where 0 means "none".

use std::fmt;
use std::ops::{Range, RangeInclusive};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Unmodified tempo, the split point between slowed and sped up variants.
pub const BASELINE_SPEED: u32 = 100;

/// Reverb value meaning "no reverb".
pub const NO_REVERB: u32 = 0;

/// Valid speed percentages.
pub const SPEED_RANGE: RangeInclusive<u32> = 50..=200;

/// Valid reverb intensities (upper bound exclusive).
pub const REVERB_RANGE: Range<u32> = 0..50;

/// Largest value accepted on the command line for either field.
pub const MAX_RAW_VALUE: u32 = 200;

/// Errors raised while validating variant parameters.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParamError {
    #[error("Speed {value} is out of range [50:200]")]
    SpeedOutOfRange { value: u32 },

    #[error("Reverb {value} is out of range [0:50)")]
    ReverbOutOfRange { value: u32 },

    #[error("{value} ({position}-th). Speed / Reverb valid ranges: [50:200] / [0:50)")]
    InvalidListValue { value: u32, position: usize },
}

/// One variant's parameter pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VariantParams {
    pub speed: u32,
    pub reverb: u32,
}

impl VariantParams {
    /// Create a validated parameter pair.
    pub fn new(speed: u32, reverb: u32) -> Result<Self, ParamError> {
        if !SPEED_RANGE.contains(&speed) {
            return Err(ParamError::SpeedOutOfRange { value: speed });
        }
        if !REVERB_RANGE.contains(&reverb) {
            return Err(ParamError::ReverbOutOfRange { value: reverb });
        }
        Ok(Self { speed, reverb })
    }

    /// Whether this variant plays slower than the original.
    pub fn is_slowed(&self) -> bool {
        self.speed < BASELINE_SPEED
    }

    /// Short tag used to prefix per-unit log lines (`" 80x5 : ..."`).
    pub fn log_tag(&self) -> String {
        format!("{:>3}x{:<2}", self.speed, self.reverb)
    }
}

impl fmt::Display for VariantParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "speed={}% reverb={}", self.speed, self.reverb)
    }
}

/// Turn the flat `[<speed> [reverb]]...` command-line list into pairs.
///
/// Values are consumed left to right. Each value in speed position must be a
/// valid speed. The value after a speed is taken as its reverb only when it
/// lies in the reverb range; otherwise reverb defaults to none and that value
/// starts the next pair.
pub fn parse_param_list(values: &[u32]) -> Result<Vec<VariantParams>, ParamError> {
    let mut pairs = Vec::new();
    let mut i = 0;

    while i < values.len() {
        let speed = values[i];
        if !SPEED_RANGE.contains(&speed) {
            return Err(ParamError::InvalidListValue {
                value: speed,
                position: i + 1,
            });
        }
        i += 1;

        let reverb = match values.get(i) {
            Some(&value) if REVERB_RANGE.contains(&value) => {
                i += 1;
                value
            }
            _ => NO_REVERB,
        };

        pairs.push(VariantParams { speed, reverb });
    }

    Ok(pairs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pairs_reverb_only_when_in_range() {
        let pairs = parse_param_list(&[120, 5, 80, 100, 60]).unwrap();
        assert_eq!(
            pairs,
            vec![
                VariantParams { speed: 120, reverb: 5 },
                VariantParams { speed: 80, reverb: 0 },
                VariantParams { speed: 100, reverb: 0 },
                VariantParams { speed: 60, reverb: 0 },
            ]
        );
    }

    #[test]
    fn rejects_speed_below_range_with_position() {
        let err = parse_param_list(&[40]).unwrap_err();
        assert_eq!(err, ParamError::InvalidListValue { value: 40, position: 1 });
        assert!(err.to_string().contains("1-th"));
    }

    #[test]
    fn rejects_out_of_range_value_after_reverb() {
        // 20 is consumed as reverb of 100, then 10 is in speed position
        let err = parse_param_list(&[100, 20, 10]).unwrap_err();
        assert_eq!(err, ParamError::InvalidListValue { value: 10, position: 3 });
    }

    #[test]
    fn empty_list_yields_no_pairs() {
        assert!(parse_param_list(&[]).unwrap().is_empty());
    }

    #[test]
    fn new_validates_both_fields() {
        assert!(VariantParams::new(50, 49).is_ok());
        assert!(VariantParams::new(201, 0).is_err());
        assert_eq!(
            VariantParams::new(100, 50),
            Err(ParamError::ReverbOutOfRange { value: 50 })
        );
    }

    #[test]
    fn log_tag_is_aligned() {
        assert_eq!(VariantParams { speed: 80, reverb: 5 }.log_tag(), " 80x5 ");
        assert_eq!(VariantParams { speed: 130, reverb: 10 }.log_tag(), "130x10");
    }
}
