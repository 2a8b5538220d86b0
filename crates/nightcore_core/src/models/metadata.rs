//! Release metadata encoded in the cover art file name.
//!
//! The cover stem has the form `year_season_playlist-code`, e.g. `2024_2_w`.

use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Years a track may have been discovered in.
pub const DISCOVERY_YEARS: RangeInclusive<u16> = 2023..=2099;

/// Seasons of the year, 1-based.
pub const DISCOVERY_SEASONS: RangeInclusive<u8> = 1..=4;

/// Playlist code to label mapping.
pub const PLAYLISTS: &[(&str, &str)] = &[
    ("w", "west"),
    ("p", "phonk"),
    ("e", "electronic"),
    ("s", "east"),
];

const FIELD_SEPARATOR: char = '_';

/// Errors raised while parsing a metadata stem.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MetadataError {
    #[error("Metadata string can't be parsed: '{0}'. Expected `year_season_playlist`")]
    Malformed(String),

    #[error("Invalid discovery year: {0}. Allowed range: 2023 - 2099")]
    InvalidYear(u16),

    #[error("Invalid discovery season: {0}. Allowed values: 1, 2, 3, 4")]
    InvalidSeason(u8),

    #[error("Invalid playlist: '{0}'. Allowed values: 'w', 'p', 'e', 's'")]
    UnknownPlaylist(String),
}

/// Immutable metadata record attached to every upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    discovery_year: u16,
    discovery_season: u8,
    playlist: String,
}

impl Metadata {
    pub fn discovery_year(&self) -> u16 {
        self.discovery_year
    }

    pub fn discovery_season(&self) -> u8 {
        self.discovery_season
    }

    /// Playlist label (already mapped from its code).
    pub fn playlist(&self) -> &str {
        &self.playlist
    }

    /// Human-facing description, used as the upload description text.
    ///
    /// `Discovery year=2024, Discovery season=2, Playlist=West`
    pub fn describe(&self) -> String {
        format!(
            "Discovery year={}, Discovery season={}, Playlist={}",
            self.discovery_year,
            self.discovery_season,
            title_case(&self.playlist)
        )
    }
}

impl FromStr for Metadata {
    type Err = MetadataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || MetadataError::Malformed(s.to_string());

        let mut fields = s.split(FIELD_SEPARATOR);
        let (year, season, code) = match (fields.next(), fields.next(), fields.next(), fields.next()) {
            (Some(year), Some(season), Some(code), None) => (year, season, code),
            _ => return Err(malformed()),
        };

        let year: u16 = year.parse().map_err(|_| malformed())?;
        let season: u8 = season.parse().map_err(|_| malformed())?;

        if !DISCOVERY_YEARS.contains(&year) {
            return Err(MetadataError::InvalidYear(year));
        }
        if !DISCOVERY_SEASONS.contains(&season) {
            return Err(MetadataError::InvalidSeason(season));
        }

        let playlist = PLAYLISTS
            .iter()
            .find(|(known, _)| *known == code)
            .map(|(_, label)| label.to_string())
            .ok_or_else(|| MetadataError::UnknownPlaylist(code.to_string()))?;

        Ok(Self {
            discovery_year: year,
            discovery_season: season,
            playlist,
        })
    }
}

impl fmt::Display for Metadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}

fn title_case(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
