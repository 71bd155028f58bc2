//! An in-memory package source.

use std::sync::Mutex;

use nupm_package::{Nuspec, PackageArchive};
use nupm_types::{FrameworkName, PackageId, PackageIdentity, Version};

use crate::{Error, PackageSource, ResolvedDependencyInfo, Source};

/// One package held by an [`InMemorySource`].
#[derive(Debug)]
struct StoredPackage {
    nuspec: Nuspec,
    listed: bool,
    bytes: Vec<u8>,
}

/// A package source backed by process memory.
///
/// Serves archives previously added to it, the way a local folder feed
/// serves nupkg files. Doubles as the feed implementation for the test
/// suites of the higher-level crates.
///
/// ## Examples
/// ```
/// use std::str::FromStr;
///
/// use nupm_package::PackageBuilder;
/// use nupm_source::{InMemorySource, Source};
/// use nupm_types::{PackageId, PackageIdentity, Version};
///
/// let source = InMemorySource::new("local");
/// let identity = PackageIdentity::new(
///     PackageId::from_str("Demo").unwrap(),
///     Version::from_str("1.0.0").unwrap(),
/// );
/// source.add(PackageBuilder::new(identity).build().unwrap()).unwrap();
///
/// let versions = source
///     .list_versions(&PackageId::from_str("demo").unwrap(), false)
///     .unwrap();
/// assert_eq!(versions.len(), 1);
/// ```
#[derive(Debug)]
pub struct InMemorySource {
    source: PackageSource,
    packages: Mutex<Vec<StoredPackage>>,
}

impl InMemorySource {
    /// Creates an empty source named `name`.
    pub fn new(name: &str) -> Self {
        InMemorySource {
            source: PackageSource::new(name, format!("memory://{name}")),
            packages: Mutex::new(Vec::new()),
        }
    }

    /// Adds a package archive to the source.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes are not a valid package archive.
    pub fn add(&self, bytes: Vec<u8>) -> Result<(), Error> {
        self.add_package(bytes, true)
    }

    /// Adds a package archive as unlisted.
    ///
    /// Unlisted versions do not appear in version listings (and therefore in
    /// latest-version selection) but remain resolvable when pinned.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes are not a valid package archive.
    pub fn add_unlisted(&self, bytes: Vec<u8>) -> Result<(), Error> {
        self.add_package(bytes, false)
    }

    fn add_package(&self, bytes: Vec<u8>, listed: bool) -> Result<(), Error> {
        let archive = PackageArchive::from_bytes(bytes.clone())?;
        let mut packages = self.packages.lock().expect("source mutex is never poisoned");
        packages.push(StoredPackage {
            nuspec: archive.nuspec().clone(),
            listed,
            bytes,
        });
        Ok(())
    }

    fn find<R>(&self, identity: &PackageIdentity, map: impl FnOnce(&StoredPackage) -> R) -> Option<R> {
        let packages = self.packages.lock().expect("source mutex is never poisoned");
        packages
            .iter()
            .find(|package| &package.nuspec.identity == identity)
            .map(map)
    }
}

impl Source for InMemorySource {
    fn package_source(&self) -> &PackageSource {
        &self.source
    }

    fn list_versions(&self, id: &PackageId, include_unlisted: bool) -> Result<Vec<Version>, Error> {
        let packages = self.packages.lock().expect("source mutex is never poisoned");
        let mut versions: Vec<Version> = packages
            .iter()
            .filter(|package| &package.nuspec.identity.id == id)
            .filter(|package| include_unlisted || package.listed)
            .map(|package| package.nuspec.identity.version.clone())
            .collect();
        versions.sort();
        versions.dedup();
        Ok(versions)
    }

    fn dependency_info(
        &self,
        identity: &PackageIdentity,
        framework: &FrameworkName,
    ) -> Result<Option<ResolvedDependencyInfo>, Error> {
        Ok(self.find(identity, |package| ResolvedDependencyInfo {
            identity: package.nuspec.identity.clone(),
            listed: package.listed,
            dependencies: package.nuspec.dependencies_for(framework),
            source: self.source.clone(),
        }))
    }

    fn copy_bytes(&self, identity: &PackageIdentity) -> Result<Option<Vec<u8>>, Error> {
        Ok(self.find(identity, |package| package.bytes.clone()))
    }
}
