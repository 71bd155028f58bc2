//! Error handling for nupm-solve.

use nupm_types::PackageId;

/// The error that can occur during dependency resolution.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// A [`nupm_source::Error`].
    #[error(transparent)]
    Source(#[from] nupm_source::Error),

    /// No source carries any version of the id.
    #[error("Package {id} was not found in any source")]
    PackageNotFound {
        /// The id no source carries.
        id: PackageId,
    },

    /// The version requirements on an id cannot be satisfied jointly.
    #[error("Unable to resolve a version of {id}: {details}")]
    DependencyConflict {
        /// The id the conflict is about.
        id: PackageId,
        /// The conflicting requirements, naming both sides.
        details: String,
    },
}
