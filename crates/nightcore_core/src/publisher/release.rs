//! Release order, speed labels, titles and hashtags.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::{PublishError, PublishResult};
use crate::models::VariantParams;
use crate::workdir::decode_name;

/// Slowed labels, most extreme first.
pub const SLOWED_LABELS: [&str; 4] = [
    "Super Deeply Slowed",
    "Deeply Slowed",
    "Slowed",
    "Slightly Slowed",
];

/// Sped-up labels, least extreme first.
pub const SPED_UP_LABELS: [&str; 3] = ["Slightly Sped Up", "Sped Up", "Super Sped Up"];

/// Label indices used for each slowed count.
const SLOWED_SELECTIONS: [&[usize]; 5] = [&[], &[2], &[1, 2], &[1, 2, 3], &[0, 1, 2, 3]];

/// Label indices used for each sped-up count.
const SPED_UP_SELECTIONS: [&[usize]; 4] = [&[], &[1], &[1, 2], &[0, 1, 2]];

const TRACK_SEPARATOR: &str = " - ";

/// Which side of the baseline speed a release sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpeedFamily {
    Slowed,
    SpedUp,
}

impl SpeedFamily {
    pub fn of(params: &VariantParams) -> Self {
        if params.is_slowed() {
            SpeedFamily::Slowed
        } else {
            SpeedFamily::SpedUp
        }
    }

    /// Hashtags appended to every release of this family.
    pub fn hashtags(&self) -> [&'static str; 3] {
        match self {
            SpeedFamily::Slowed => ["slowed", "reverb", "slow"],
            SpeedFamily::SpedUp => ["sped", "spedup", "nightcore"],
        }
    }
}

impl std::fmt::Display for SpeedFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SpeedFamily::Slowed => write!(f, "slowed"),
            SpeedFamily::SpedUp => write!(f, "sped up"),
        }
    }
}

/// One video in release order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseEntry {
    pub video: PathBuf,
    pub params: VariantParams,
    pub label: String,
    pub family: SpeedFamily,
}

/// Labels for `slowed` slowed and `sped_up` sped-up releases, in ascending
/// speed order.
pub fn speed_labels(slowed: usize, sped_up: usize) -> PublishResult<Vec<(&'static str, SpeedFamily)>> {
    let slowed_indices = SLOWED_SELECTIONS.get(slowed).ok_or(PublishError::LabelTable {
        family: SpeedFamily::Slowed,
        count: slowed,
        max: SLOWED_SELECTIONS.len() - 1,
    })?;
    let sped_up_indices = SPED_UP_SELECTIONS.get(sped_up).ok_or(PublishError::LabelTable {
        family: SpeedFamily::SpedUp,
        count: sped_up,
        max: SPED_UP_SELECTIONS.len() - 1,
    })?;

    Ok(slowed_indices
        .iter()
        .map(|&i| (SLOWED_LABELS[i], SpeedFamily::Slowed))
        .chain(
            sped_up_indices
                .iter()
                .map(|&i| (SPED_UP_LABELS[i], SpeedFamily::SpedUp)),
        )
        .collect())
}

/// Sort rendered videos by speed and attach their labels.
pub fn release_order(videos: &[PathBuf]) -> PublishResult<Vec<ReleaseEntry>> {
    let mut decoded = videos
        .iter()
        .map(|video| Ok((video.clone(), decode_name(video)?)))
        .collect::<PublishResult<Vec<_>>>()?;
    decoded.sort_by_key(|(_, params)| params.speed);

    let slowed = decoded.iter().filter(|(_, p)| p.is_slowed()).count();
    let labels = speed_labels(slowed, decoded.len() - slowed)?;

    Ok(decoded
        .into_iter()
        .zip(labels)
        .map(|((video, params), (label, family))| ReleaseEntry {
            video,
            params,
            label: label.to_string(),
            family,
        })
        .collect())
}

/// Source track stem split into artist and title.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackName {
    pub artist: String,
    pub title: String,
}

impl TrackName {
    /// Split `"<artist> - <title>"` at the first separator.
    pub fn parse(stem: &str) -> PublishResult<Self> {
        let (artist, title) = stem
            .split_once(TRACK_SEPARATOR)
            .ok_or_else(|| PublishError::MalformedTrackName(stem.to_string()))?;
        Ok(Self {
            artist: artist.to_string(),
            title: title.to_string(),
        })
    }

    pub fn release_title(&self, label: &str) -> String {
        format!("{}{}{} ({})", self.artist, TRACK_SEPARATOR, self.title, label)
    }

    /// Artist and title tokens followed by the family's fixed tags.
    pub fn hashtags(&self, artist_separators: &str, family: SpeedFamily) -> Vec<String> {
        let artists = self
            .artist
            .split(|c: char| artist_separators.contains(c))
            .flat_map(tokens);

        let mut tags: Vec<String> = Vec::new();
        for tag in artists
            .chain(tokens(&self.title))
            .chain(family.hashtags().into_iter().map(str::to_string))
        {
            if !tags.contains(&tag) {
                tags.push(tag);
            }
        }
        tags
    }
}

/// Lower-cased alphanumeric words; punctuation is dropped, not split on.
fn tokens(text: &str) -> Vec<String> {
    text.chars()
        .filter(|c| c.is_ascii_alphanumeric() || c.is_whitespace())
        .collect::<String>()
        .to_lowercase()
        .split_whitespace()
        .map(str::to_string)
        .collect()
}
