// ============================================================
// Layer 3 — Error Taxonomy
// ============================================================
// Every failure in the library maps to one of these variants.
// All of them are fatal: the binaries log the error and exit
// non-zero, nothing is retried and partial outputs stay on disk.

use std::{io, path::{Path, PathBuf}};
use thiserror::Error;

/// Errors raised while exporting, binding or scoring.
#[derive(Error, Debug)]
pub enum ExportError {
    /// A command-line value outside its allowed set
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Missing input file, bucket or parameter
    #[error("not found: {0}")]
    NotFound(String),

    /// Malformed key, JSON document or graph description
    #[error("format error: {0}")]
    Format(String),

    /// Tensor shapes incompatible with what the graph expects
    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),

    /// Read or write failure on a concrete path; the io::Error is the source
    #[error("I/O error on '{}'", path.display())]
    Io {
        path:   PathBuf,
        #[source]
        source: io::Error,
    },

    /// The tensor runtime refused an operation (e.g. a dtype conversion)
    #[error("tensor backend error: {0}")]
    Backend(String),
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ExportError>;

impl ExportError {
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn format(msg: impl Into<String>) -> Self {
        Self::Format(msg.into())
    }

    pub fn shape_mismatch(msg: impl Into<String>) -> Self {
        Self::ShapeMismatch(msg.into())
    }

    pub fn backend(msg: impl Into<String>) -> Self {
        Self::Backend(msg.into())
    }

    /// Wrap an I/O error for `path`.
    /// A missing file on read becomes `NotFound` rather than `Io`.
    pub fn io(path: impl AsRef<Path>, source: io::Error) -> Self {
        let path = path.as_ref();
        if source.kind() == io::ErrorKind::NotFound {
            return Self::NotFound(format!("'{}' does not exist", path.display()));
        }
        Self::Io { path: path.to_path_buf(), source }
    }

    /// Wrap a failed write to `path`. Always `Io`, even when the
    /// parent directory is missing.
    pub fn write(path: impl AsRef<Path>, source: io::Error) -> Self {
        Self::Io { path: path.as_ref().to_path_buf(), source }
    }

    /// Short machine-friendly kind, used in log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidArgument(_) => "InvalidArgument",
            Self::NotFound(_)        => "NotFound",
            Self::Format(_)          => "FormatError",
            Self::ShapeMismatch(_)   => "ShapeMismatch",
            Self::Io { .. }          => "IOError",
            Self::Backend(_)         => "BackendError",
        }
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_maps_to_not_found() {
        let err = ExportError::io(
            "/no/such/file",
            io::Error::new(io::ErrorKind::NotFound, "gone"),
        );
        assert!(matches!(err, ExportError::NotFound(_)));
        assert_eq!(err.kind(), "NotFound");
    }

    #[test]
    fn test_other_io_errors_keep_path() {
        let err = ExportError::io(
            "/read/only",
            io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        );
        assert_eq!(err.kind(), "IOError");
        assert!(err.to_string().contains("/read/only"));
        assert!(!err.to_string().contains("denied"));
        let chain = format!("{:#}", anyhow::Error::from(err));
        assert_eq!(chain.matches("denied").count(), 1);
    }

    #[test]
    fn test_write_into_missing_directory_is_io_error() {
        let err = ExportError::write(
            "/no/such/dir/out.json",
            io::Error::new(io::ErrorKind::NotFound, "gone"),
        );
        assert_eq!(err.kind(), "IOError");
    }
}
