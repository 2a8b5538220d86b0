//! Working directory layout and artifact naming.

pub mod directory;
pub mod naming;

pub use directory::{DirectoryError, DirectoryResult, WorkingDirectory};
pub use naming::{
    classify, decode_name, encode_name, is_artifact_stem, ArtifactKind, NamingError,
    AUDIO_EXTENSIONS, COVER_EXTENSIONS, RENDERED_EXTENSION, VARIANT_EXTENSION, VIDEO_EXTENSIONS,
};
