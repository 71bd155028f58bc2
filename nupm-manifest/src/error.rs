//! Error handling for nupm-manifest.

use std::path::PathBuf;

use nupm_types::PackageId;

/// The error that can occur when working with package manifests.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// A [`nupm_types::Error`].
    #[error(transparent)]
    Types(#[from] nupm_types::Error),

    /// The manifest XML could not be parsed.
    #[error("Malformed manifest at {path}: {reason}")]
    Parse {
        /// The path of the manifest file.
        path: PathBuf,
        /// What went wrong.
        reason: String,
    },

    /// A required attribute is missing from a `<package>` element.
    #[error("Manifest at {path} has a <package> element without a {attribute} attribute")]
    MissingAttribute {
        /// The path of the manifest file.
        path: PathBuf,
        /// The name of the missing attribute.
        attribute: &'static str,
    },

    /// Two references share a package id.
    #[error("Manifest contains more than one reference for package {id}")]
    DuplicateReference {
        /// The duplicated package id.
        id: PackageId,
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
