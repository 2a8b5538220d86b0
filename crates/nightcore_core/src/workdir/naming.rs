//! File-name convention for the working directory.
//!
//! Artifact stems encode their parameters: `speed` or `speed_reverb`.
//! The extension marks the stage that produced the file.

use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

use crate::models::{ParamError, VariantParams, NO_REVERB};

/// Extensions of source tracks and generated variants.
pub const AUDIO_EXTENSIONS: &[&str] = &["mp3", "opus"];

/// Extensions of cover art.
pub const COVER_EXTENSIONS: &[&str] = &["png", "jpg"];

/// Extensions of rendered videos.
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4"];

/// Extension given to generated variants.
pub const VARIANT_EXTENSION: &str = "mp3";

/// Extension given to rendered videos.
pub const RENDERED_EXTENSION: &str = "mp4";

/// Separator between speed and reverb in an artifact stem.
pub const PARAM_SEPARATOR: char = '_';

static ARTIFACT_STEM: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\d+(?:_\d+)?$").expect("artifact stem pattern is valid")
});

/// Role of a file inside the working directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactKind {
    /// The original track (audio, non-numeric stem).
    Source,
    /// Cover art (any image).
    Cover,
    /// Generated audio variant (audio, numeric stem).
    Variant,
    /// Rendered video (video, numeric stem).
    Rendered,
    /// Anything else.
    Other,
}

impl std::fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArtifactKind::Source => write!(f, "track"),
            ArtifactKind::Cover => write!(f, "cover art"),
            ArtifactKind::Variant => write!(f, "nightcore"),
            ArtifactKind::Rendered => write!(f, "video"),
            ArtifactKind::Other => write!(f, "other"),
        }
    }
}

/// Errors decoding an artifact name.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NamingError {
    #[error("'{0}' is not an artifact name (expected `speed` or `speed_reverb`)")]
    NotAnArtifact(String),

    #[error("Artifact '{name}' has invalid parameters: {source}")]
    InvalidParams {
        name: String,
        #[source]
        source: ParamError,
    },
}

/// Classify a path by its file name alone.
pub fn classify(path: &Path) -> ArtifactKind {
    let Some(extension) = path.extension().and_then(|e| e.to_str()) else {
        return ArtifactKind::Other;
    };
    let artifact_stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .map(is_artifact_stem)
        .unwrap_or(false);

    if has_extension(extension, AUDIO_EXTENSIONS) {
        if artifact_stem {
            ArtifactKind::Variant
        } else {
            ArtifactKind::Source
        }
    } else if has_extension(extension, COVER_EXTENSIONS) {
        ArtifactKind::Cover
    } else if has_extension(extension, VIDEO_EXTENSIONS) && artifact_stem {
        ArtifactKind::Rendered
    } else {
        ArtifactKind::Other
    }
}

/// Whether a stem matches the `speed[_reverb]` pattern.
pub fn is_artifact_stem(stem: &str) -> bool {
    ARTIFACT_STEM.is_match(stem)
}

/// Build the canonical file name for a variant at some stage.
pub fn encode_name(params: VariantParams, extension: &str) -> String {
    format!(
        "{}{}{}.{}",
        params.speed, PARAM_SEPARATOR, params.reverb, extension
    )
}

/// Recover the parameters from an artifact's file name.
///
/// Accepts both `speed` and `speed_reverb` stems; a missing reverb is none.
pub fn decode_name(path: &Path) -> Result<VariantParams, NamingError> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| is_artifact_stem(s))
        .ok_or_else(|| NamingError::NotAnArtifact(name.clone()))?;

    let (speed, reverb) = match stem.split_once(PARAM_SEPARATOR) {
        Some((speed, reverb)) => (speed, Some(reverb)),
        None => (stem, None),
    };

    // Digit runs too long for u32 are not valid parameters either
    let parse = |digits: &str| {
        digits
            .parse::<u32>()
            .map_err(|_| NamingError::NotAnArtifact(name.clone()))
    };
    let speed = parse(speed)?;
    let reverb = match reverb {
        Some(reverb) => parse(reverb)?,
        None => NO_REVERB,
    };

    VariantParams::new(speed, reverb).map_err(|source| NamingError::InvalidParams {
        name: name.clone(),
        source,
    })
}

fn has_extension(extension: &str, allowed: &[&str]) -> bool {
    allowed.iter().any(|a| a.eq_ignore_ascii_case(extension))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{REVERB_RANGE, SPEED_RANGE};
    use std::path::PathBuf;

    #[test]
    fn encode_decode_round_trips_whole_domain() {
        for speed in SPEED_RANGE {
            for reverb in REVERB_RANGE {
                let params = VariantParams::new(speed, reverb).unwrap();
                let name = encode_name(params, VARIANT_EXTENSION);
                assert_eq!(decode_name(Path::new(&name)).unwrap(), params);
            }
        }
    }

    #[test]
    fn encoded_names_classify_by_extension_only() {
        let params = VariantParams::new(80, 5).unwrap();
        let audio = PathBuf::from(encode_name(params, VARIANT_EXTENSION));
        let video = PathBuf::from(encode_name(params, RENDERED_EXTENSION));

        assert_eq!(classify(&audio), ArtifactKind::Variant);
        assert_eq!(classify(&video), ArtifactKind::Rendered);
    }

    #[test]
    fn classification_covers_every_role() {
        let cases = [
            ("Artist - Title.mp3", ArtifactKind::Source),
            ("Artist - Title.OPUS", ArtifactKind::Source),
            ("2024_2_w.png", ArtifactKind::Cover),
            ("2024_2_w.JPG", ArtifactKind::Cover),
            ("120.mp3", ArtifactKind::Variant),
            ("120_5.opus", ArtifactKind::Variant),
            ("120_5.mp4", ArtifactKind::Rendered),
            ("trailer.mp4", ArtifactKind::Other),
            ("notes.txt", ArtifactKind::Other),
            ("120_5_1.mp3", ArtifactKind::Source),
            ("Makefile", ArtifactKind::Other),
        ];
        for (name, expected) in cases {
            assert_eq!(classify(Path::new(name)), expected, "{name}");
        }
    }

    #[test]
    fn decodes_speed_only_stem() {
        let params = decode_name(Path::new("/work/130.mp4")).unwrap();
        assert_eq!(params, VariantParams::new(130, 0).unwrap());
    }

    #[test]
    fn decode_rejects_non_artifacts_and_bad_values() {
        assert!(matches!(
            decode_name(Path::new("Artist - Title.mp3")),
            Err(NamingError::NotAnArtifact(_))
        ));
        assert!(matches!(
            decode_name(Path::new("300_0.mp4")),
            Err(NamingError::InvalidParams { .. })
        ));
        assert!(matches!(
            decode_name(Path::new("99999999999999999999.mp4")),
            Err(NamingError::NotAnArtifact(_))
        ));
    }

    #[test]
    fn distinct_params_never_share_a_name() {
        let a = encode_name(VariantParams::new(100, 10).unwrap(), VARIANT_EXTENSION);
        let b = encode_name(VariantParams::new(100, 1).unwrap(), VARIANT_EXTENSION);
        let c = encode_name(VariantParams::new(110, 0).unwrap(), VARIANT_EXTENSION);
        assert_ne!(a, b);
        assert_ne!(a, c);
        assert_ne!(b, c);
    }
}
