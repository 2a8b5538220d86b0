//! The working directory: the only persistent store of the pipeline.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use super::naming::{classify, encode_name, ArtifactKind};
use crate::models::{Metadata, MetadataError, VariantParams};

/// Errors from inspecting or modifying the working directory.
#[derive(Error, Debug)]
pub enum DirectoryError {
    #[error("Working directory doesn't exist: `{}/`", .0.display())]
    Missing(PathBuf),

    #[error("Couldn't find {kind} file in directory: `{}/`", .dir.display())]
    NotFound { kind: ArtifactKind, dir: PathBuf },

    #[error("There are multiple {kind} files in directory: `{}/` ({})", .dir.display(), .names.join(", "))]
    Ambiguous {
        kind: ArtifactKind,
        dir: PathBuf,
        names: Vec<String>,
    },

    #[error("Invalid metadata in cover art name: {0}")]
    Metadata(#[from] MetadataError),

    #[error("I/O error in {operation}: {source}")]
    Io {
        operation: String,
        #[source]
        source: io::Error,
    },
}

impl DirectoryError {
    fn io(operation: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            operation: operation.into(),
            source,
        }
    }
}

pub type DirectoryResult<T> = Result<T, DirectoryError>;

/// Handle on the working directory.
///
/// Every query lists the directory afresh; stages take one listing at entry
/// and work from that snapshot.
#[derive(Debug, Clone)]
pub struct WorkingDirectory {
    path: PathBuf,
}

impl WorkingDirectory {
    /// Open an existing directory.
    pub fn open(path: impl Into<PathBuf>) -> DirectoryResult<Self> {
        let path = path.into();
        if !path.is_dir() {
            return Err(DirectoryError::Missing(path));
        }
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// List files of one kind, sorted by name.
    ///
    /// With `required`, an empty result is a `NotFound` error.
    pub fn list(&self, kind: ArtifactKind, required: bool) -> DirectoryResult<Vec<PathBuf>> {
        let entries = fs::read_dir(&self.path)
            .map_err(|e| DirectoryError::io(format!("listing {}", self.path.display()), e))?;

        let mut paths = Vec::new();
        for entry in entries {
            let entry = entry
                .map_err(|e| DirectoryError::io(format!("listing {}", self.path.display()), e))?;
            let path = entry.path();
            if path.is_file() && classify(&path) == kind {
                paths.push(path);
            }
        }
        paths.sort();

        if required && paths.is_empty() {
            return Err(DirectoryError::NotFound {
                kind,
                dir: self.path.clone(),
            });
        }
        Ok(paths)
    }

    /// The single source track.
    pub fn track(&self) -> DirectoryResult<PathBuf> {
        self.single(ArtifactKind::Source)
    }

    /// The single cover art file.
    pub fn cover(&self) -> DirectoryResult<PathBuf> {
        self.single(ArtifactKind::Cover)
    }

    /// Stem of the source track, `"<artist> - <title>"` by convention.
    pub fn track_stem(&self) -> DirectoryResult<String> {
        let track = self.track()?;
        Ok(stem_of(&track))
    }

    /// Metadata record parsed from the cover art stem.
    pub fn metadata(&self) -> DirectoryResult<Metadata> {
        let cover = self.cover()?;
        Ok(stem_of(&cover).parse()?)
    }

    /// Canonical path of a variant artifact with the given extension.
    pub fn artifact_path(&self, params: VariantParams, extension: &str) -> PathBuf {
        self.path.join(encode_name(params, extension))
    }

    /// Delete every file of one kind. Returns the names removed.
    pub fn clear(&self, kind: ArtifactKind) -> DirectoryResult<Vec<String>> {
        let paths = self.list(kind, false)?;
        let mut removed = Vec::with_capacity(paths.len());
        for path in paths {
            fs::remove_file(&path)
                .map_err(|e| DirectoryError::io(format!("removing {}", path.display()), e))?;
            removed.push(file_name_of(&path));
        }
        Ok(removed)
    }

    fn single(&self, kind: ArtifactKind) -> DirectoryResult<PathBuf> {
        let mut paths = self.list(kind, true)?;
        if paths.len() > 1 {
            return Err(DirectoryError::Ambiguous {
                kind,
                dir: self.path.clone(),
                names: paths.iter().map(|p| file_name_of(p)).collect(),
            });
        }
        Ok(paths.remove(0))
    }
}

pub(crate) fn stem_of(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default()
}

pub(crate) fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default()
}
