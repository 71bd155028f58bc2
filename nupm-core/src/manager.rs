//! The package manager facade.

use std::{collections::BTreeSet, sync::Arc};

use log::debug;
use nupm_manifest::PackageReference;
use nupm_package::{Nuspec, PackageArchive};
use nupm_solve::{InstalledPackage, Resolution, ResolutionContext, ResolutionTarget, Resolver};
use nupm_source::SourceGateway;
use nupm_types::{PackageId, PackageIdentity, VersionConstraints};

use crate::{
    ActionPlan,
    Applier,
    Cancellation,
    DependencyMap,
    Error,
    PackagesConfigProject,
    Planner,
    ProjectContext,
    SolutionManager,
    UninstallationContext,
};

/// What an update operation should touch.
#[derive(Clone, Debug)]
pub enum UpdateTarget {
    /// Update every installed package to its latest permissible version.
    All,
    /// Update the named ids (and coerce dependencies as needed).
    Ids(Vec<PackageId>),
    /// Update to exactly these identities; downgrades are deliberate here.
    Identities(Vec<PackageIdentity>),
}

/// The top-level facade over resolver, planner and applier.
///
/// Previews produce an [`ActionPlan`] without touching anything; `execute`
/// applies a plan to a project. One project undergoes at most one apply at a
/// time (the project's own mutex serializes manifest edits), while reads and
/// applies of different projects proceed concurrently.
#[derive(Debug)]
pub struct PackageManager {
    gateway: SourceGateway,
    solution: Arc<SolutionManager>,
}

impl PackageManager {
    /// Creates a manager over a gateway and a solution.
    pub fn new(gateway: SourceGateway, solution: Arc<SolutionManager>) -> Self {
        PackageManager { gateway, solution }
    }

    /// Returns the source gateway.
    pub fn gateway(&self) -> &SourceGateway {
        &self.gateway
    }

    /// Returns the solution manager.
    pub fn solution(&self) -> &Arc<SolutionManager> {
        &self.solution
    }

    /// Previews installing exactly `identity` into `project`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PackageAlreadyInstalled`] if the identity is already
    /// referenced, and any resolver error otherwise.
    pub fn preview_install(
        &self,
        project: &PackagesConfigProject,
        identity: &PackageIdentity,
        context: &ResolutionContext,
        cancel: &Cancellation,
    ) -> Result<ActionPlan, Error> {
        cancel.check()?;
        let references = project.installed_references()?;
        if references
            .iter()
            .any(|reference| reference.identity == *identity)
        {
            return Err(Error::PackageAlreadyInstalled {
                identity: identity.clone(),
                project: project.name().to_string(),
            });
        }

        let targets = vec![ResolutionTarget::Identity(identity.clone())];
        let resolution = self.resolve(project, &references, &targets, context, cancel)?;
        let mut plan = self.plan(project, &references, &resolution, false)?;
        plan.mark_direct(identity.id.clone());
        Ok(plan)
    }

    /// Previews installing the latest admissible version of `id`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PackageAlreadyInstalled`] if the latest version is
    /// the installed one, and [`Error::UnexpectedDowngrade`] if the policy
    /// admits nothing above a newer installed version.
    pub fn preview_install_latest(
        &self,
        project: &PackagesConfigProject,
        id: &PackageId,
        context: &ResolutionContext,
        cancel: &Cancellation,
    ) -> Result<ActionPlan, Error> {
        cancel.check()?;
        let latest = self.gateway.latest_version(
            id,
            context.include_prerelease,
            context.include_unlisted,
        )?;

        let references = project.installed_references()?;
        if let Some(reference) = references
            .iter()
            .find(|reference| &reference.identity.id == id)
        {
            let installed = &reference.identity.version;
            if *installed == latest {
                return Err(Error::PackageAlreadyInstalled {
                    identity: reference.identity.clone(),
                    project: project.name().to_string(),
                });
            }
            if *installed > latest {
                return Err(Error::UnexpectedDowngrade {
                    id: id.clone(),
                    installed: installed.clone(),
                    latest,
                });
            }
        }

        self.preview_install(
            project,
            &PackageIdentity::new(id.clone(), latest),
            context,
            cancel,
        )
    }

    /// Previews an update of `project` per `target`.
    ///
    /// With every [`VersionConstraints`] bit set this is a reinstall: every
    /// installed package is planned as an uninstall/install pair at its
    /// current version.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PackageNotInstalled`] for an id-target that is not
    /// installed, and any resolver error otherwise.
    pub fn preview_update(
        &self,
        project: &PackagesConfigProject,
        target: &UpdateTarget,
        context: &ResolutionContext,
        cancel: &Cancellation,
    ) -> Result<ActionPlan, Error> {
        cancel.check()?;
        let references = project.installed_references()?;
        let reinstall = context
            .version_constraints
            .contains(VersionConstraints::ALL);

        let mut targets: Vec<ResolutionTarget> = Vec::new();
        let mut direct: Vec<PackageId> = Vec::new();
        match target {
            UpdateTarget::All => {
                for reference in &references {
                    if let Some(identity) = self.update_target(reference, reinstall, context)? {
                        direct.push(identity.id.clone());
                        targets.push(ResolutionTarget::Identity(identity));
                    }
                }
            }
            UpdateTarget::Ids(ids) => {
                for id in ids {
                    let reference = references
                        .iter()
                        .find(|reference| &reference.identity.id == id)
                        .ok_or_else(|| Error::PackageNotInstalled {
                            id: id.clone(),
                            project: project.name().to_string(),
                        })?;
                    if let Some(identity) = self.update_target(reference, reinstall, context)? {
                        direct.push(identity.id.clone());
                        targets.push(ResolutionTarget::Identity(identity));
                    }
                }
            }
            UpdateTarget::Identities(identities) => {
                for identity in identities {
                    direct.push(identity.id.clone());
                    targets.push(ResolutionTarget::Identity(identity.clone()));
                }
            }
        }

        let resolution = self.resolve(project, &references, &targets, context, cancel)?;
        let mut plan = self.plan(project, &references, &resolution, reinstall)?;
        for id in direct {
            plan.mark_direct(id);
        }
        Ok(plan)
    }

    /// Previews uninstalling `id` from `project`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PackageNotInstalled`] if the id is absent and
    /// [`Error::PackageHasDependents`] when the guard refuses.
    pub fn preview_uninstall(
        &self,
        project: &PackagesConfigProject,
        id: &PackageId,
        context: &UninstallationContext,
    ) -> Result<ActionPlan, Error> {
        let references = project.installed_references()?;
        let installed: Vec<PackageIdentity> = references
            .iter()
            .map(|reference| reference.identity.clone())
            .collect();
        if !installed.iter().any(|identity| &identity.id == id) {
            return Err(Error::PackageNotInstalled {
                id: id.clone(),
                project: project.name().to_string(),
            });
        }

        let local = self.local_dependency_map(project, &references)?;
        let targets: BTreeSet<PackageId> = [id.clone()].into();
        Planner::plan_uninstall(&installed, &targets, &local, context)
    }

    /// Uninstalls `id` from `project`.
    ///
    /// # Errors
    ///
    /// See [`PackageManager::preview_uninstall`] and
    /// [`PackageManager::execute`].
    pub fn uninstall(
        &self,
        project: &PackagesConfigProject,
        id: &PackageId,
        context: &UninstallationContext,
        project_context: &ProjectContext,
        cancel: &Cancellation,
    ) -> Result<(), Error> {
        let plan = self.preview_uninstall(project, id, context)?;
        self.execute(project, &plan, project_context, cancel)
    }

    /// Installs exactly `identity` into `project`.
    ///
    /// # Errors
    ///
    /// See [`PackageManager::preview_install`] and
    /// [`PackageManager::execute`].
    pub fn install(
        &self,
        project: &PackagesConfigProject,
        identity: &PackageIdentity,
        context: &ResolutionContext,
        project_context: &ProjectContext,
        cancel: &Cancellation,
    ) -> Result<(), Error> {
        let plan = self.preview_install(project, identity, context, cancel)?;
        self.execute(project, &plan, project_context, cancel)
    }

    /// Installs the latest admissible version of `id` into `project`.
    ///
    /// # Errors
    ///
    /// See [`PackageManager::preview_install_latest`] and
    /// [`PackageManager::execute`].
    pub fn install_latest(
        &self,
        project: &PackagesConfigProject,
        id: &PackageId,
        context: &ResolutionContext,
        project_context: &ProjectContext,
        cancel: &Cancellation,
    ) -> Result<(), Error> {
        let plan = self.preview_install_latest(project, id, context, cancel)?;
        self.execute(project, &plan, project_context, cancel)
    }

    /// Updates `project` per `target`.
    ///
    /// # Errors
    ///
    /// See [`PackageManager::preview_update`] and
    /// [`PackageManager::execute`].
    pub fn update(
        &self,
        project: &PackagesConfigProject,
        target: &UpdateTarget,
        context: &ResolutionContext,
        project_context: &ProjectContext,
        cancel: &Cancellation,
    ) -> Result<(), Error> {
        let plan = self.preview_update(project, target, context, cancel)?;
        self.execute(project, &plan, project_context, cancel)
    }

    /// Executes a previously planned list of actions against `project`.
    ///
    /// # Errors
    ///
    /// Returns the error of the first failing action; the rest of the plan
    /// does not run. Honors `cancel` between actions.
    pub fn execute(
        &self,
        project: &PackagesConfigProject,
        plan: &ActionPlan,
        project_context: &ProjectContext,
        cancel: &Cancellation,
    ) -> Result<(), Error> {
        Applier::new(&self.gateway, &self.solution).execute(
            project,
            plan,
            project_context,
            cancel,
        )
    }

    /// Returns the project's references in manifest order.
    ///
    /// # Errors
    ///
    /// Returns an error if the manifest cannot be read.
    pub fn get_installed_packages(
        &self,
        project: &PackagesConfigProject,
    ) -> Result<Vec<PackageReference>, Error> {
        project.installed_references()
    }

    /// Returns the installed identities sorted dependencies-first.
    ///
    /// The order is derived from the nuspec documents in the local store. If
    /// the store content of any reference is missing, the project counts as
    /// unrestored and the result is empty.
    ///
    /// # Errors
    ///
    /// Returns an error if the manifest cannot be read or the order is
    /// undefined because of a cycle.
    pub fn get_installed_in_dependency_order(
        &self,
        project: &PackagesConfigProject,
    ) -> Result<Vec<PackageIdentity>, Error> {
        let references = project.installed_references()?;
        let store = self.solution.store();
        if references
            .iter()
            .any(|reference| !store.is_restored(&reference.identity))
        {
            debug!("{} has unrestored references", project.name());
            return Ok(Vec::new());
        }

        let local = self.local_dependency_map(project, &references)?;
        let ids: BTreeSet<PackageId> = references
            .iter()
            .map(|reference| reference.identity.id.clone())
            .collect();
        let ordered = local.dependency_order(&ids)?;
        Ok(ordered
            .into_iter()
            .map(|id| {
                references
                    .iter()
                    .find(|reference| reference.identity.id == id)
                    .expect("ordered ids come from the references")
                    .identity
                    .clone()
            })
            .collect())
    }

    /// Materializes `identity` into the store without touching any
    /// manifest.
    ///
    /// A no-op if the identity is already restored.
    ///
    /// # Errors
    ///
    /// Returns an error if no source carries the identity or extraction
    /// fails.
    pub fn restore_package(
        &self,
        identity: &PackageIdentity,
        cancel: &Cancellation,
    ) -> Result<(), Error> {
        cancel.check()?;
        if self.solution.store().is_restored(identity) {
            return Ok(());
        }
        let (bytes, _) = self.gateway.fetch(identity, None)?;
        let archive = PackageArchive::from_bytes(bytes)?;
        self.solution.store().add(&archive)?;
        Ok(())
    }

    /// Expands one installed reference into its update target, if any.
    ///
    /// A reinstall targets the current version. Otherwise the target is the
    /// greatest version admitted by the prerelease policy, the reference's
    /// allowed-versions lock and the version constraints; a package with no
    /// admissible candidate (for example one whose source has vanished) is
    /// left untouched.
    fn update_target(
        &self,
        reference: &PackageReference,
        reinstall: bool,
        context: &ResolutionContext,
    ) -> Result<Option<PackageIdentity>, Error> {
        if reinstall {
            return Ok(Some(reference.identity.clone()));
        }
        let id = &reference.identity.id;
        let current = &reference.identity.version;
        let versions = self.gateway.list_versions(id, context.include_unlisted)?;
        let latest = versions
            .into_iter()
            .filter(|version| {
                context.include_prerelease || !version.is_prerelease() || version == current
            })
            .filter(|version| match &reference.allowed_versions {
                Some(lock) => lock
                    .clone()
                    .with_prerelease(context.include_prerelease || version == current)
                    .satisfies(version),
                None => true,
            })
            .filter(|version| context.version_constraints.admits(current, version))
            .max();
        Ok(latest.map(|version| PackageIdentity::new(id.clone(), version)))
    }

    fn resolve(
        &self,
        project: &PackagesConfigProject,
        references: &[PackageReference],
        targets: &[ResolutionTarget],
        context: &ResolutionContext,
        cancel: &Cancellation,
    ) -> Result<Resolution, Error> {
        cancel.check()?;
        let installed: Vec<InstalledPackage> = references
            .iter()
            .map(|reference| InstalledPackage {
                identity: reference.identity.clone(),
                allowed_versions: reference.allowed_versions.clone(),
            })
            .collect();
        let resolver = Resolver::new(&self.gateway, context, *project.target_framework());
        Ok(resolver.resolve(targets, &installed)?)
    }

    fn plan(
        &self,
        project: &PackagesConfigProject,
        references: &[PackageReference],
        resolution: &Resolution,
        force_reinstall: bool,
    ) -> Result<ActionPlan, Error> {
        let installed: Vec<PackageIdentity> = references
            .iter()
            .map(|reference| reference.identity.clone())
            .collect();
        let local = self.local_dependency_map(project, references)?;
        Planner::plan(&installed, resolution, &local, force_reinstall)
    }

    /// Builds the dependency edges of the installed set from the local
    /// store.
    ///
    /// References whose store content is missing contribute no edges.
    fn local_dependency_map(
        &self,
        project: &PackagesConfigProject,
        references: &[PackageReference],
    ) -> Result<DependencyMap, Error> {
        let store = self.solution.store();
        let mut map = DependencyMap::new();
        for reference in references {
            let identity = &reference.identity;
            let Some(nuspec) = read_store_nuspec(store, identity)? else {
                map.insert(identity.id.clone(), Vec::new());
                continue;
            };
            let dependencies = nuspec
                .dependencies_for(project.target_framework())
                .into_iter()
                .map(|dependency| dependency.id)
                .collect();
            map.insert(identity.id.clone(), dependencies);
        }
        Ok(map)
    }
}

/// Reads the nuspec of a restored identity out of the store, if present.
fn read_store_nuspec(
    store: &nupm_store::FolderStore,
    identity: &PackageIdentity,
) -> Result<Option<Nuspec>, Error> {
    let dir = store.dir_for(identity);
    if !dir.is_dir() {
        return Ok(None);
    }
    let entries = std::fs::read_dir(&dir).map_err(|source| nupm_store::Error::IoPath {
        path: dir.clone(),
        context: "reading a store directory",
        source,
    })?;
    for entry in entries {
        let entry = entry.map_err(|source| nupm_store::Error::IoPath {
            path: dir.clone(),
            context: "reading a store directory entry",
            source,
        })?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if !name.to_ascii_lowercase().ends_with(".nuspec") {
            continue;
        }
        let content =
            std::fs::read_to_string(entry.path()).map_err(|source| nupm_store::Error::IoPath {
                path: entry.path(),
                context: "reading a stored nuspec",
                source,
            })?;
        return Ok(Some(Nuspec::parse_str(&content)?));
    }
    Ok(None)
}
