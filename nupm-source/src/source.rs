//! The package source contract.

use std::{
    fmt::{Debug, Display, Formatter},
    hash::{Hash, Hasher},
};

use nupm_types::{FrameworkName, PackageDependency, PackageId, PackageIdentity, Version};
use serde::{Deserialize, Serialize};

use crate::Error;

/// A named package source.
///
/// The source URL is the stable key: equality and hashing use only the URL,
/// so a renamed feed is still the same source.
#[derive(Clone, Debug, Deserialize, Eq, Serialize)]
pub struct PackageSource {
    /// The display name of the source.
    pub name: String,
    /// The source URL used for equality and attribution.
    pub url: String,
}

impl PackageSource {
    /// Creates a new [`PackageSource`].
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        PackageSource {
            name: name.into(),
            url: url.into(),
        }
    }
}

impl PartialEq for PackageSource {
    fn eq(&self, other: &Self) -> bool {
        self.url == other.url
    }
}

impl Hash for PackageSource {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.url.hash(state);
    }
}

impl Display for PackageSource {
    fn fmt(&self, fmt: &mut Formatter) -> std::fmt::Result {
        write!(fmt, "{}", self.name)
    }
}

/// Dependency information for one package identity, as served by a source.
///
/// The dependency list is already reduced to the framework the query asked
/// for.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ResolvedDependencyInfo {
    /// The identity the information describes.
    pub identity: PackageIdentity,
    /// Whether the version is listed; unlisted versions are hidden from
    /// latest-version selection but remain installable when pinned.
    pub listed: bool,
    /// The package's dependencies for the queried framework.
    pub dependencies: Vec<PackageDependency>,
    /// The source that served the information.
    pub source: PackageSource,
}

/// A package feed.
///
/// Implementations must be safe to share across threads; the gateway probes
/// sources concurrently with other work.
pub trait Source: Debug + Send + Sync {
    /// Returns the identification of this source.
    fn package_source(&self) -> &PackageSource;

    /// Lists all versions of `id` available in this source.
    ///
    /// Unlisted versions are excluded unless `include_unlisted` is set. An
    /// unknown id yields an empty list.
    ///
    /// # Errors
    ///
    /// Returns an error if the source cannot answer.
    fn list_versions(&self, id: &PackageId, include_unlisted: bool) -> Result<Vec<Version>, Error>;

    /// Returns dependency information for `identity`, reduced to
    /// `framework`, or [`None`] if this source does not carry the identity.
    ///
    /// # Errors
    ///
    /// Returns an error if the source cannot answer.
    fn dependency_info(
        &self,
        identity: &PackageIdentity,
        framework: &FrameworkName,
    ) -> Result<Option<ResolvedDependencyInfo>, Error>;

    /// Copies the package bytes for `identity`, or [`None`] if this source
    /// does not carry the identity.
    ///
    /// # Errors
    ///
    /// Returns an error if the source cannot answer.
    fn copy_bytes(&self, identity: &PackageIdentity) -> Result<Option<Vec<u8>>, Error>;
}
