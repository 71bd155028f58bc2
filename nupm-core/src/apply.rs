//! Execution of action plans against a project.

use std::collections::BTreeMap;

use log::{debug, warn};
use nupm_manifest::PackageReference;
use nupm_package::{PackageArchive, client_version};
use nupm_source::SourceGateway;
use nupm_types::PackageId;

use crate::{
    Action,
    ActionPlan,
    Cancellation,
    Error,
    PackagesConfigProject,
    ProjectContext,
    SolutionManager,
};

/// Executes action plans.
///
/// Actions run strictly in plan order, one at a time. Each action is atomic
/// from the manifest's point of view: the store is brought up to date before
/// a manifest entry is added, and the entry is removed before the store
/// content is, so a manifest reference always points at restored content.
/// Across actions there is no transaction; a cancelled or failed plan leaves
/// the project consistent up to the last completed action.
#[derive(Debug)]
pub struct Applier<'a> {
    gateway: &'a SourceGateway,
    solution: &'a SolutionManager,
}

impl<'a> Applier<'a> {
    /// Creates an applier over a gateway and the solution.
    pub fn new(gateway: &'a SourceGateway, solution: &'a SolutionManager) -> Self {
        Applier { gateway, solution }
    }

    /// Executes `plan` against `project`.
    ///
    /// For an update (uninstall followed by install of the same id), every
    /// manifest attribute of the old entry that the applier does not itself
    /// set is carried over to the new entry. After a plan containing at
    /// least one install, the project system's binding-redirect hook runs
    /// once, unless the context disables it.
    ///
    /// # Errors
    ///
    /// Returns the first action's error; subsequent actions do not run.
    /// Honors `cancel` between actions.
    pub fn execute(
        &self,
        project: &PackagesConfigProject,
        plan: &ActionPlan,
        context: &ProjectContext,
        cancel: &Cancellation,
    ) -> Result<(), Error> {
        // attribute preservation: remember the outgoing entries of ids the
        // plan reinstalls at a different version
        let mut previous: BTreeMap<PackageId, PackageReference> = BTreeMap::new();
        for reference in project.installed_references()? {
            previous.insert(reference.identity.id.clone(), reference);
        }

        for action in plan.actions() {
            cancel.check()?;
            match action {
                Action::Uninstall(identity) => self.uninstall(project, identity)?,
                Action::Install(identity, source) => {
                    self.install(project, plan, context, identity, source, &previous)?;
                }
            }
        }

        let installed_any = plan
            .actions()
            .iter()
            .any(|action| matches!(action, Action::Install(..)));
        if installed_any && !context.binding_redirects_disabled {
            project.project_system().write_binding_redirects()?;
        }
        Ok(())
    }

    fn uninstall(
        &self,
        project: &PackagesConfigProject,
        identity: &nupm_types::PackageIdentity,
    ) -> Result<(), Error> {
        debug!("uninstalling {identity} from {}", project.name());
        project.project_system().remove_references(identity)?;
        let removed = project.edit(|manifest| Ok(manifest.remove(&identity.id)))?;
        if removed.is_none() {
            warn!("{identity} was not referenced by {}", project.name());
        }

        // the store directory is shared; delete only the last reference
        if self.solution.is_referenced_elsewhere(identity, project)? {
            debug!("keeping {identity} in the store, another project references it");
        } else {
            self.solution.store().remove(identity)?;
        }
        Ok(())
    }

    fn install(
        &self,
        project: &PackagesConfigProject,
        plan: &ActionPlan,
        context: &ProjectContext,
        identity: &nupm_types::PackageIdentity,
        source: &nupm_source::PackageSource,
        previous: &BTreeMap<PackageId, PackageReference>,
    ) -> Result<(), Error> {
        debug!("installing {identity} into {}", project.name());
        let (bytes, _) = self.gateway.fetch(identity, Some(source))?;
        let archive = PackageArchive::from_bytes(bytes)?;

        // gates that must hold before any mutation
        if let Some(required) = &archive.nuspec().min_client_version {
            let current = client_version();
            if *required > current {
                return Err(Error::VersionNotSatisfied {
                    identity: identity.clone(),
                    reason: format!(
                        "the package requires client version {required}, this is {current}",
                    ),
                });
            }
        }
        if let Some(package_type) = archive.nuspec().unsupported_package_type() {
            return Err(Error::VersionNotSatisfied {
                identity: identity.clone(),
                reason: format!("the package type {package_type} is not understood"),
            });
        }
        let items = archive.items_for(project.target_framework())?;

        self.solution.store().add(&archive)?;
        project.project_system().add_references(identity, &items)?;

        let reference = match previous.get(&identity.id) {
            // an update: keep everything the applier does not own
            Some(old) => {
                let mut updated = old.with_identity(identity.clone());
                updated.target_framework = Some(*project.target_framework());
                updated
            }
            None => PackageReference::new(identity.clone(), Some(*project.target_framework())),
        };
        project.edit(|manifest| {
            manifest.add(reference)?;
            Ok(())
        })?;

        if plan.is_direct(&identity.id) {
            if let Some(execution) = &context.execution_context {
                if let Some(readme) = self.solution.store().readme_path(identity) {
                    execution.open_file(readme);
                }
            }
        }
        Ok(())
    }
}
