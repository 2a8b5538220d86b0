//! Core enums used throughout the pipeline.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// x264 encoding preset for the render stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Preset {
    VerySlow,
    Slower,
    Slow,
    Medium,
    Fast,
    SuperFast,
    #[default]
    UltraFast,
}

impl Preset {
    /// All presets, slowest first.
    pub const ALL: [Preset; 7] = [
        Preset::VerySlow,
        Preset::Slower,
        Preset::Slow,
        Preset::Medium,
        Preset::Fast,
        Preset::SuperFast,
        Preset::UltraFast,
    ];

    /// Value passed to the encoder's `-preset` option.
    pub fn as_str(&self) -> &'static str {
        match self {
            Preset::VerySlow => "veryslow",
            Preset::Slower => "slower",
            Preset::Slow => "slow",
            Preset::Medium => "medium",
            Preset::Fast => "fast",
            Preset::SuperFast => "superfast",
            Preset::UltraFast => "ultrafast",
        }
    }
}

impl std::fmt::Display for Preset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Preset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Preset::ALL
            .iter()
            .copied()
            .find(|p| p.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| {
                let names: Vec<_> = Preset::ALL.iter().map(|p| p.as_str()).collect();
                format!("Unknown preset '{}'. Expected one of: {}", s, names.join(", "))
            })
    }
}

/// Pipeline stage, numbered in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// Produce audio variants through the remote effect app.
    Generate = 1,
    /// Mux every variant with the cover into a video.
    Render = 2,
    /// Upload rendered videos in release order.
    Publish = 3,
}

impl Stage {
    pub const ALL: [Stage; 3] = [Stage::Generate, Stage::Render, Stage::Publish];

    pub const FIRST: Stage = Stage::Generate;
    pub const LAST: Stage = Stage::Publish;

    /// 1-based stage number used on the command line.
    pub fn number(&self) -> u8 {
        *self as u8
    }

    pub fn from_number(number: u8) -> Option<Stage> {
        Stage::ALL.iter().copied().find(|s| s.number() == number)
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::Generate => write!(f, "generate"),
            Stage::Render => write!(f, "render"),
            Stage::Publish => write!(f, "publish"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preset_parses_case_insensitively() {
        assert_eq!("VerySlow".parse::<Preset>(), Ok(Preset::VerySlow));
        assert_eq!("ultrafast".parse::<Preset>(), Ok(Preset::UltraFast));
        assert!("warp".parse::<Preset>().is_err());
    }

    #[test]
    fn preset_default_is_fastest() {
        assert_eq!(Preset::default().as_str(), "ultrafast");
    }

    #[test]
    fn stages_round_trip_through_numbers() {
        for stage in Stage::ALL {
            assert_eq!(Stage::from_number(stage.number()), Some(stage));
        }
        assert_eq!(Stage::from_number(0), None);
        assert_eq!(Stage::from_number(4), None);
    }
}
