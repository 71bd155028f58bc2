//! Error handling for nupm-core.

use nupm_types::{PackageId, PackageIdentity, Version};

/// The error that can occur when planning or applying package operations.
///
/// Errors from the lower layers pass through transparently, so a caller can
/// unwrap to the original cause through [`std::error::Error::source`].
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// A [`nupm_types::Error`].
    #[error(transparent)]
    Types(#[from] nupm_types::Error),

    /// A [`nupm_manifest::Error`].
    #[error(transparent)]
    Manifest(#[from] nupm_manifest::Error),

    /// A [`nupm_package::Error`].
    #[error(transparent)]
    Package(#[from] nupm_package::Error),

    /// A [`nupm_store::Error`].
    #[error(transparent)]
    Store(#[from] nupm_store::Error),

    /// A [`nupm_source::Error`].
    #[error(transparent)]
    Source(#[from] nupm_source::Error),

    /// A [`nupm_solve::Error`].
    #[error(transparent)]
    Resolve(#[from] nupm_solve::Error),

    /// The identity is already present in the project.
    #[error("Package {identity} already exists in project {project}")]
    PackageAlreadyInstalled {
        /// The identity that is already installed.
        identity: PackageIdentity,
        /// The name of the project.
        project: String,
    },

    /// The id is not installed in the project.
    #[error("Package {id} does not exist in project {project}")]
    PackageNotInstalled {
        /// The id that is not installed.
        id: PackageId,
        /// The name of the project.
        project: String,
    },

    /// An id-only install would move the package to a lower version.
    #[error(
        "Installing {id} would downgrade it from {installed} to {latest}; \
         pin the version to downgrade deliberately"
    )]
    UnexpectedDowngrade {
        /// The id that would be downgraded.
        id: PackageId,
        /// The currently installed version.
        installed: Version,
        /// The latest version the policy admits.
        latest: Version,
    },

    /// Uninstalling the package would break its dependents.
    #[error("Unable to uninstall {identity} because {dependents:?} depend on it")]
    PackageHasDependents {
        /// The identity that was to be uninstalled.
        identity: PackageIdentity,
        /// The display names of the remaining dependents.
        dependents: Vec<String>,
    },

    /// The package requires capabilities this implementation lacks.
    #[error("Package {identity} cannot be installed: {reason}")]
    VersionNotSatisfied {
        /// The identity that was refused.
        identity: PackageIdentity,
        /// Why the package was refused.
        reason: String,
    },

    /// The operation was cancelled cooperatively.
    #[error("The operation was cancelled")]
    Cancelled,
}
