//! Inputs and outputs of a resolution.

use std::collections::BTreeMap;

use nupm_source::ResolvedDependencyInfo;
use nupm_types::{PackageId, PackageIdentity, VersionRange};

/// One thing the caller wants in the project.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ResolutionTarget {
    /// Exactly this identity.
    Identity(PackageIdentity),
    /// The latest admissible version of this id.
    Latest(PackageId),
}

impl ResolutionTarget {
    /// Returns the id the target is about.
    pub fn id(&self) -> &PackageId {
        match self {
            ResolutionTarget::Identity(identity) => &identity.id,
            ResolutionTarget::Latest(id) => id,
        }
    }
}

/// The resolver's view of one installed package.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct InstalledPackage {
    /// The installed identity.
    pub identity: PackageIdentity,
    /// The user-authored lock on admissible versions, if any.
    pub allowed_versions: Option<VersionRange>,
}

impl InstalledPackage {
    /// Creates an unlocked installed package.
    pub fn new(identity: PackageIdentity) -> Self {
        InstalledPackage {
            identity,
            allowed_versions: None,
        }
    }

    /// Creates an installed package with an allowed-versions lock.
    pub fn with_lock(identity: PackageIdentity, allowed_versions: VersionRange) -> Self {
        InstalledPackage {
            identity,
            allowed_versions: Some(allowed_versions),
        }
    }
}

/// A consistent set of package identities, the outcome of a resolution.
#[derive(Debug, Default)]
pub struct Resolution {
    /// The resolved identities, ordered by id.
    pub set: Vec<PackageIdentity>,
    /// Dependency information for every identity the resolver examined.
    ///
    /// Installed packages that were left untouched and never examined have
    /// no entry here.
    pub info: BTreeMap<PackageId, ResolvedDependencyInfo>,
}

impl Resolution {
    /// Returns the resolved version for `id`, if the id is in the set.
    pub fn version_of(&self, id: &PackageId) -> Option<&PackageIdentity> {
        self.set.iter().find(|identity| &identity.id == id)
    }
}
