//! Error handling for nupm-package.

use std::path::PathBuf;

use nupm_types::{FrameworkName, PackageIdentity};

/// The error that can occur when working with package archives.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// A [`nupm_types::Error`].
    #[error(transparent)]
    Types(#[from] nupm_types::Error),

    /// The archive has no nuspec document at its root.
    #[error("Package archive contains no nuspec document")]
    MissingNuspec,

    /// The nuspec document could not be parsed.
    #[error("Malformed nuspec: {reason}")]
    NuspecParse {
        /// What went wrong.
        reason: String,
    },

    /// The zip container could not be read or written.
    #[error("Error while {context}: {source}")]
    Archive {
        /// The operation that failed.
        context: &'static str,
        /// The source error.
        source: zip::result::ZipError,
    },

    /// The package has framework-specific content but none of it is
    /// compatible with the project.
    #[error("Package {identity} has no items compatible with {framework}")]
    NoCompatibleItems {
        /// The package in question.
        identity: PackageIdentity,
        /// The project's target framework.
        framework: FrameworkName,
    },

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
