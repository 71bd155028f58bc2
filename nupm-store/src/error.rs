//! Error handling for nupm-store.

use std::path::PathBuf;

/// The error that can occur when working with the package store.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// A [`nupm_package::Error`].
    #[error(transparent)]
    Package(#[from] nupm_package::Error),

    /// An I/O error occurred at a path.
    #[error("I/O error at {path} while {context}: {source}")]
    IoPath {
        /// The path at which the error occurred.
        path: PathBuf,
        /// The operation that failed.
        context: &'static str,
        /// The source error.
        source: std::io::Error,
    },
}
