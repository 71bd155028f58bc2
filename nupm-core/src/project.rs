//! Projects with a `packages.config` manifest.

use std::{
    fmt::Debug,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use nupm_manifest::{PackageReference, PackagesConfig};
use nupm_types::{FrameworkName, PackageIdentity};

use crate::Error;

/// The build-system side of a project.
///
/// The applier calls these hooks while executing a plan; everything the
/// build system does with them (assembly references, binding redirects) is
/// outside the package management core.
pub trait ProjectSystem: Debug + Send + Sync {
    /// Adds the framework-compatible `items` of a freshly installed package.
    ///
    /// # Errors
    ///
    /// Returns an error if the project system rejects the references.
    fn add_references(&self, identity: &PackageIdentity, items: &[String]) -> Result<(), Error>;

    /// Removes the references of a package being uninstalled.
    ///
    /// # Errors
    ///
    /// Returns an error if the project system rejects the removal.
    fn remove_references(&self, identity: &PackageIdentity) -> Result<(), Error>;

    /// Rewrites assembly binding redirects after a successful apply.
    ///
    /// # Errors
    ///
    /// Returns an error if the rewrite fails.
    fn write_binding_redirects(&self) -> Result<(), Error>;
}

/// A project system that accepts everything and does nothing.
///
/// The default for projects whose build integration is handled elsewhere.
#[derive(Debug, Default)]
pub struct NullProjectSystem;

impl ProjectSystem for NullProjectSystem {
    fn add_references(&self, _: &PackageIdentity, _: &[String]) -> Result<(), Error> {
        Ok(())
    }

    fn remove_references(&self, _: &PackageIdentity) -> Result<(), Error> {
        Ok(())
    }

    fn write_binding_redirects(&self) -> Result<(), Error> {
        Ok(())
    }
}

/// A project whose installed packages live in a `packages.config` manifest.
///
/// All manifest mutation goes through [`PackagesConfigProject::edit`], which
/// holds the project mutex across the read-modify-write and writes through
/// the manifest's atomic replace. Plain readers load the manifest without
/// the mutex and observe either the pre- or the post-image of a concurrent
/// edit, never a torn file.
#[derive(Debug)]
pub struct PackagesConfigProject {
    name: String,
    manifest_path: PathBuf,
    target_framework: FrameworkName,
    project_system: Arc<dyn ProjectSystem>,
    edit_mutex: Mutex<()>,
}

impl PackagesConfigProject {
    /// Creates a project with a [`NullProjectSystem`].
    pub fn new(
        name: impl Into<String>,
        manifest_path: impl Into<PathBuf>,
        target_framework: FrameworkName,
    ) -> Self {
        Self::with_project_system(
            name,
            manifest_path,
            target_framework,
            Arc::new(NullProjectSystem),
        )
    }

    /// Creates a project with the given project system.
    pub fn with_project_system(
        name: impl Into<String>,
        manifest_path: impl Into<PathBuf>,
        target_framework: FrameworkName,
        project_system: Arc<dyn ProjectSystem>,
    ) -> Self {
        PackagesConfigProject {
            name: name.into(),
            manifest_path: manifest_path.into(),
            target_framework,
            project_system,
            edit_mutex: Mutex::new(()),
        }
    }

    /// Returns the project name used in messages.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the manifest path.
    pub fn manifest_path(&self) -> &Path {
        &self.manifest_path
    }

    /// Returns the project's target framework.
    pub fn target_framework(&self) -> &FrameworkName {
        &self.target_framework
    }

    /// Returns the project system.
    pub fn project_system(&self) -> &Arc<dyn ProjectSystem> {
        &self.project_system
    }

    /// Returns a snapshot of the installed references in manifest order.
    ///
    /// # Errors
    ///
    /// Returns an error if the manifest exists but cannot be read or parsed.
    pub fn installed_references(&self) -> Result<Vec<PackageReference>, Error> {
        Ok(PackagesConfig::load(&self.manifest_path)?
            .references()
            .to_vec())
    }

    /// Returns the installed identities in manifest order.
    ///
    /// # Errors
    ///
    /// Returns an error if the manifest exists but cannot be read or parsed.
    pub fn installed_identities(&self) -> Result<Vec<PackageIdentity>, Error> {
        Ok(self
            .installed_references()?
            .into_iter()
            .map(|reference| reference.identity)
            .collect())
    }

    /// Runs one read-modify-write cycle against the manifest.
    ///
    /// The project mutex is held across the cycle, so concurrent edits
    /// serialize; the write itself replaces the file atomically.
    ///
    /// # Errors
    ///
    /// Returns an error if loading, `edit` itself, or writing fails.
    pub(crate) fn edit<R>(
        &self,
        edit: impl FnOnce(&mut PackagesConfig) -> Result<R, Error>,
    ) -> Result<R, Error> {
        let _guard = self
            .edit_mutex
            .lock()
            .expect("project mutex is never poisoned");
        let mut manifest = PackagesConfig::load(&self.manifest_path)?;
        let result = edit(&mut manifest)?;
        manifest.write_to(&self.manifest_path)?;
        Ok(result)
    }
}
