//! Error handling for nupm-source.

use nupm_types::{PackageId, PackageIdentity};

/// The error that can occur when working with package sources.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// A [`nupm_package::Error`].
    #[error(transparent)]
    Package(#[from] nupm_package::Error),

    /// The identity is not resolvable in any source.
    #[error("Package {identity} was not found in any source")]
    PackageNotFound {
        /// The identity that could not be found.
        identity: PackageIdentity,
    },

    /// No permissible version of the id is available.
    #[error("No latest version of {id} is available under the current policy")]
    NoLatestVersion {
        /// The id that has no admissible version.
        id: PackageId,
    },

    /// Every configured source failed to answer.
    #[error("All sources failed while {context}: {reasons}")]
    SourceUnavailable {
        /// The operation that failed.
        context: String,
        /// The per-source failure messages.
        reasons: String,
    },

    /// A single source failed to answer.
    #[error("Source {source_name} failed: {reason}")]
    SourceFailed {
        /// The name of the failing source.
        source_name: String,
        /// What went wrong.
        reason: String,
    },
}
