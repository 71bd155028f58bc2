//! The solution: shared store, several projects.

use std::{
    path::PathBuf,
    sync::{Arc, Mutex},
};

use nupm_store::FolderStore;
use nupm_types::PackageIdentity;

use crate::{Error, PackagesConfigProject};

/// The projects of a solution and the store they share.
///
/// Store directories are owned collectively: an identity may only be
/// deleted from the store when no registered project references it anymore.
/// The solution manager answers that question; the store itself stays
/// policy-free.
#[derive(Debug)]
pub struct SolutionManager {
    store: FolderStore,
    projects: Mutex<Vec<Arc<PackagesConfigProject>>>,
}

impl SolutionManager {
    /// Creates a solution manager with a store under `packages_root`.
    pub fn new(packages_root: impl Into<PathBuf>) -> Self {
        SolutionManager {
            store: FolderStore::new(packages_root),
            projects: Mutex::new(Vec::new()),
        }
    }

    /// Returns the shared store.
    pub fn store(&self) -> &FolderStore {
        &self.store
    }

    /// Registers a project with the solution.
    pub fn add_project(&self, project: Arc<PackagesConfigProject>) {
        self.projects
            .lock()
            .expect("solution mutex is never poisoned")
            .push(project);
    }

    /// Returns the registered projects.
    pub fn projects(&self) -> Vec<Arc<PackagesConfigProject>> {
        self.projects
            .lock()
            .expect("solution mutex is never poisoned")
            .clone()
    }

    /// Returns `true` if any project other than `except` references
    /// `identity`.
    ///
    /// # Errors
    ///
    /// Returns an error if another project's manifest cannot be read.
    pub fn is_referenced_elsewhere(
        &self,
        identity: &PackageIdentity,
        except: &PackagesConfigProject,
    ) -> Result<bool, Error> {
        for project in self.projects() {
            if std::ptr::eq(project.as_ref(), except) {
                continue;
            }
            let references_it = project
                .installed_references()?
                .iter()
                .any(|reference| reference.identity == *identity);
            if references_it {
                return Ok(true);
            }
        }
        Ok(false)
    }
}
