//! Error types for the servreg-core library.
//!
//! This module provides error handling using the `thiserror` crate. Every
//! variant except [`Error::PlaceholderNotFound`] and [`Error::Pattern`] is
//! local to a single source file: the pipeline records it in that file's
//! report and carries on with the next candidate.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for servreg operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for all servreg operations
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// No file or directory exists at the given path
    #[error("file does not exist: '{path}'")]
    PathNotFound {
        /// The missing path
        path: PathBuf,
    },

    /// The path exists but is a directory, socket or similar
    #[error("path is not a regular file: '{path}'")]
    NotARegularFile {
        /// The offending path
        path: PathBuf,
    },

    /// Failed to read input file
    #[error("failed to read file '{path}': {source}")]
    FileRead {
        /// Path to the file that failed to read
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Failed to write a rewritten file back to disk
    #[error("failed to write file '{path}': {source}")]
    FileWrite {
        /// Path to the file that failed to write
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The template has no placeholder function to substitute
    #[error("could not find placeholder function to replace in '{path}'")]
    PlaceholderNotFound {
        /// Path of the template that was searched
        path: PathBuf,
    },

    /// A configured identifier produced an invalid pattern
    #[error("invalid pattern: {0}")]
    Pattern(#[from] regex::Error),
}

impl Error {
    /// Creates a new path-not-found error
    pub fn path_not_found(path: impl Into<PathBuf>) -> Self {
        Self::PathNotFound { path: path.into() }
    }

    /// Creates a new not-a-regular-file error
    pub fn not_a_regular_file(path: impl Into<PathBuf>) -> Self {
        Self::NotARegularFile { path: path.into() }
    }

    /// Creates a new file read error
    pub fn file_read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileRead {
            path: path.into(),
            source,
        }
    }

    /// Creates a new file write error
    pub fn file_write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileWrite {
            path: path.into(),
            source,
        }
    }

    /// Creates a new placeholder-not-found error
    pub fn placeholder_not_found(path: impl Into<PathBuf>) -> Self {
        Self::PlaceholderNotFound { path: path.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::path_not_found("/src/missing.h");
        assert!(err.to_string().contains("does not exist"));
        assert!(err.to_string().contains("/src/missing.h"));

        let err = Error::placeholder_not_found("include/ServerFactoryInit.h");
        assert!(err.to_string().contains("placeholder"));
    }
}
