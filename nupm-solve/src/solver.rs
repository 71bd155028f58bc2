//! The dependency resolution walk.

use std::collections::{BTreeMap, VecDeque};

use log::debug;
use nupm_source::{ResolvedDependencyInfo, SourceGateway};
use nupm_types::{
    FrameworkName,
    PackageDependency,
    PackageId,
    PackageIdentity,
    Version,
    VersionRange,
};

use crate::{
    DependencyBehavior,
    Error,
    InstalledPackage,
    Resolution,
    ResolutionContext,
    ResolutionTarget,
};

/// Rounds of walk-then-reconcile before resolution is declared divergent.
///
/// Real dependency graphs settle within a handful of rounds; an identity
/// level cycle oscillates forever and is cut off here.
const MAX_ROUNDS: usize = 64;

/// One package chosen during the walk.
#[derive(Clone, Debug)]
struct Chosen {
    version: Version,
    /// The version was requested explicitly and must not be re-picked.
    pinned: bool,
    /// The version differs from the installed one, or the id is new.
    moved: bool,
    info: Option<ResolvedDependencyInfo>,
}

/// A dependency resolver over a source gateway.
///
/// The resolver walks the dependency graph of the targets, adopts installed
/// packages as fixed points as long as nothing forces them to move, and
/// reconciles edges from untouched installed packages onto moved ones by
/// upgrading the parent (see [`Resolver::resolve`]).
#[derive(Debug)]
pub struct Resolver<'a> {
    gateway: &'a SourceGateway,
    context: &'a ResolutionContext,
    framework: FrameworkName,
}

impl<'a> Resolver<'a> {
    /// Creates a resolver for one project framework.
    pub fn new(
        gateway: &'a SourceGateway,
        context: &'a ResolutionContext,
        framework: FrameworkName,
    ) -> Self {
        Resolver {
            gateway,
            context,
            framework,
        }
    }

    /// Resolves `targets` against `installed` into a consistent set.
    ///
    /// - Id-only targets are expanded to the latest admissible version
    ///   first.
    /// - Target identities are honored exactly; a requirement that rejects a
    ///   target can only be reconciled by moving the requiring parent.
    /// - Installed packages keep their version unless a requirement forces a
    ///   re-pick; their own dependencies are not re-walked unless they move.
    /// - An installed package whose range no longer admits a moved child is
    ///   upgraded to the lowest of its versions that admits the child.
    ///
    /// # Errors
    ///
    /// Returns an error if a target cannot be expanded or found, if the
    /// requirements on some id cannot be satisfied jointly, or if the walk
    /// does not converge (an identity-level dependency cycle).
    pub fn resolve(
        &self,
        targets: &[ResolutionTarget],
        installed: &[InstalledPackage],
    ) -> Result<Resolution, Error> {
        let installed_map: BTreeMap<PackageId, &InstalledPackage> = installed
            .iter()
            .map(|package| (package.identity.id.clone(), package))
            .collect();

        // expand id-only targets under the prerelease/unlisted policy
        let mut pinned: Vec<PackageIdentity> = Vec::new();
        for target in targets {
            let identity = match target {
                ResolutionTarget::Identity(identity) => identity.clone(),
                ResolutionTarget::Latest(id) => {
                    let version = self.gateway.latest_version(
                        id,
                        self.context.include_prerelease,
                        self.context.include_unlisted,
                    )?;
                    PackageIdentity::new(id.clone(), version)
                }
            };
            debug!("resolution target {identity}");
            pinned.push(identity);
        }

        let mut state: BTreeMap<PackageId, Chosen> = BTreeMap::new();
        for package in installed {
            state.insert(
                package.identity.id.clone(),
                Chosen {
                    version: package.identity.version.clone(),
                    pinned: false,
                    moved: false,
                    info: None,
                },
            );
        }
        let mut queue: VecDeque<PackageId> = VecDeque::new();
        for identity in &pinned {
            let moved = installed_map
                .get(&identity.id)
                .map(|package| package.identity.version != identity.version)
                .unwrap_or(true);
            state.insert(
                identity.id.clone(),
                Chosen {
                    version: identity.version.clone(),
                    pinned: true,
                    moved,
                    info: None,
                },
            );
            queue.push_back(identity.id.clone());
        }

        if self.context.dependency_behavior == DependencyBehavior::Ignore {
            // no expansion: fetch info for the targets only, so the planner
            // can still order them
            for identity in &pinned {
                self.ensure_info(&mut state, &identity.id)?;
            }
            return Ok(self.into_resolution(state));
        }

        // dependency id -> requirements keyed by the requiring parent
        let mut requirements: BTreeMap<PackageId, BTreeMap<PackageId, VersionRange>> =
            BTreeMap::new();

        for _ in 0..MAX_ROUNDS {
            while let Some(id) = queue.pop_front() {
                let info = self.ensure_info(&mut state, &id)?;
                // the parent's version may have changed; its old requirements
                // no longer apply
                for entries in requirements.values_mut() {
                    entries.remove(&id);
                }
                for dependency in &info.dependencies {
                    self.apply_edge(
                        &mut state,
                        &mut requirements,
                        &mut queue,
                        &id,
                        dependency,
                        &installed_map,
                    )?;
                }
            }

            if !self.reconcile_untouched(&mut state, &mut queue, &installed_map)? {
                return Ok(self.into_resolution(state));
            }
        }

        let cycle = queue
            .front()
            .cloned()
            .or_else(|| pinned.first().map(|identity| identity.id.clone()))
            .or_else(|| state.keys().next().cloned());
        match cycle {
            Some(id) => Err(Error::DependencyConflict {
                id,
                details: "the dependency graph contains an identity-level cycle".to_string(),
            }),
            None => Ok(self.into_resolution(state)),
        }
    }

    /// Fetches (once) and returns the dependency info for the chosen version
    /// of `id`.
    fn ensure_info(
        &self,
        state: &mut BTreeMap<PackageId, Chosen>,
        id: &PackageId,
    ) -> Result<ResolvedDependencyInfo, Error> {
        let chosen = state.get_mut(id).expect("queued ids are always chosen");
        if let Some(info) = &chosen.info {
            return Ok(info.clone());
        }
        let identity = PackageIdentity::new(id.clone(), chosen.version.clone());
        let info = self.gateway.dependency_info(
            &self.context.gather_cache,
            &identity,
            &self.framework,
        )?;
        chosen.info = Some(info.clone());
        Ok(info)
    }

    /// Applies one dependency edge from `parent` to the walk state.
    fn apply_edge(
        &self,
        state: &mut BTreeMap<PackageId, Chosen>,
        requirements: &mut BTreeMap<PackageId, BTreeMap<PackageId, VersionRange>>,
        queue: &mut VecDeque<PackageId>,
        parent: &PackageId,
        dependency: &PackageDependency,
        installed: &BTreeMap<PackageId, &InstalledPackage>,
    ) -> Result<(), Error> {
        let entries = requirements.entry(dependency.id.clone()).or_default();
        entries.insert(parent.clone(), dependency.range.clone());
        let combined = combine_requirements(&dependency.id, entries)?;

        let Some(chosen) = state.get(&dependency.id) else {
            let version = self.pick_version(&dependency.id, &combined, installed)?;
            debug!("adding {}/{version} required by {parent}", dependency.id);
            state.insert(
                dependency.id.clone(),
                Chosen {
                    version,
                    pinned: false,
                    moved: true,
                    info: None,
                },
            );
            queue.push_back(dependency.id.clone());
            return Ok(());
        };

        if self.version_admitted(&dependency.id, &chosen.version, &combined, installed) {
            return Ok(());
        }

        if chosen.pinned {
            // the child cannot move; the requiring parent has to
            self.upgrade_parent(state, queue, parent, &dependency.id, installed)?;
            return Ok(());
        }

        let version = self.pick_version(&dependency.id, &combined, installed)?;
        let chosen = state.get_mut(&dependency.id).expect("checked above");
        if version != chosen.version {
            debug!(
                "moving {} from {} to {version} to satisfy {parent}",
                dependency.id, chosen.version,
            );
            chosen.version = version;
            chosen.moved = true;
            chosen.info = None;
            queue.push_back(dependency.id.clone());
        }
        Ok(())
    }

    /// Checks edges from untouched installed packages onto moved ones and
    /// upgrades violated parents.
    ///
    /// Returns `true` if anything changed and another round is needed.
    ///
    /// Edges pointing at ids that are not part of the resolution are
    /// ignored: a pre-existing gap in the installed graph (for example after
    /// a forced uninstall) is not this resolution's to repair. Installed
    /// packages whose own version is no longer served by any source are
    /// skipped for the same reason.
    fn reconcile_untouched(
        &self,
        state: &mut BTreeMap<PackageId, Chosen>,
        queue: &mut VecDeque<PackageId>,
        installed: &BTreeMap<PackageId, &InstalledPackage>,
    ) -> Result<bool, Error> {
        let untouched: Vec<PackageId> = state
            .iter()
            .filter(|(_, chosen)| !chosen.moved && chosen.info.is_none())
            .map(|(id, _)| id.clone())
            .collect();

        let mut changed = false;
        for id in untouched {
            let version = state[&id].version.clone();
            let identity = PackageIdentity::new(id.clone(), version);
            let info = match self.gateway.dependency_info(
                &self.context.gather_cache,
                &identity,
                &self.framework,
            ) {
                Ok(info) => info,
                Err(nupm_source::Error::PackageNotFound { .. }) => continue,
                Err(error) => return Err(error.into()),
            };

            let mut violated_child: Option<PackageId> = None;
            for dependency in &info.dependencies {
                match state.get(&dependency.id) {
                    Some(child) if child.moved => {
                        let admitted = dependency
                            .range
                            .clone()
                            .with_prerelease(
                                self.context.include_prerelease
                                    || dependency.range.include_prerelease(),
                            )
                            .satisfies(&child.version);
                        if !admitted {
                            violated_child = Some(dependency.id.clone());
                            break;
                        }
                    }
                    _ => {}
                }
            }

            match violated_child {
                Some(child) => {
                    self.upgrade_parent(state, queue, &id, &child, installed)?;
                    changed = true;
                }
                None => {
                    // remember the info so the next round skips the fetch
                    if let Some(chosen) = state.get_mut(&id) {
                        chosen.info = Some(info);
                    }
                }
            }
        }
        Ok(changed)
    }

    /// Moves `parent` to the lowest of its versions whose range admits the
    /// chosen version of `child`.
    fn upgrade_parent(
        &self,
        state: &mut BTreeMap<PackageId, Chosen>,
        queue: &mut VecDeque<PackageId>,
        parent: &PackageId,
        child: &PackageId,
        installed: &BTreeMap<PackageId, &InstalledPackage>,
    ) -> Result<(), Error> {
        let child_version = state[child].version.clone();
        let parent_chosen = state.get(parent).expect("edges come from chosen parents");
        let parent_version = parent_chosen.version.clone();
        if parent_chosen.pinned {
            return Err(Error::DependencyConflict {
                id: child.clone(),
                details: format!(
                    "{parent}/{parent_version} does not admit the explicitly requested \
                     {child}/{child_version}, and {parent}/{parent_version} was itself \
                     explicitly requested",
                ),
            });
        }

        let versions = self
            .gateway
            .list_versions(parent, self.context.include_unlisted)?;
        for candidate in versions {
            if candidate == parent_version {
                continue;
            }
            if !self.candidate_admissible(&candidate, installed.get(parent).copied()) {
                continue;
            }
            let identity = PackageIdentity::new(parent.clone(), candidate.clone());
            let info = match self.gateway.dependency_info(
                &self.context.gather_cache,
                &identity,
                &self.framework,
            ) {
                Ok(info) => info,
                Err(nupm_source::Error::PackageNotFound { .. }) => continue,
                Err(error) => return Err(error.into()),
            };
            let admits = match info
                .dependencies
                .iter()
                .find(|dependency| &dependency.id == child)
            {
                // the candidate may have dropped the dependency entirely
                None => true,
                Some(dependency) => dependency
                    .range
                    .clone()
                    .with_prerelease(
                        self.context.include_prerelease || dependency.range.include_prerelease(),
                    )
                    .satisfies(&child_version),
            };
            if admits {
                debug!(
                    "upgrading {parent} from {parent_version} to {candidate} \
                     to admit {child}/{child_version}",
                );
                state.insert(
                    parent.clone(),
                    Chosen {
                        version: candidate,
                        pinned: false,
                        moved: true,
                        info: Some(info),
                    },
                );
                queue.push_back(parent.clone());
                return Ok(());
            }
        }

        Err(Error::DependencyConflict {
            id: parent.clone(),
            details: format!(
                "no available version of {parent} admits {child}/{child_version}, \
                 required because {parent}/{parent_version} does not",
            ),
        })
    }

    /// Picks a version of `id` satisfying `requirement` per the dependency
    /// behavior.
    fn pick_version(
        &self,
        id: &PackageId,
        requirement: &VersionRange,
        installed: &BTreeMap<PackageId, &InstalledPackage>,
    ) -> Result<Version, Error> {
        let versions = self
            .gateway
            .list_versions(id, self.context.include_unlisted)?;
        if versions.is_empty() {
            return Err(Error::PackageNotFound { id: id.clone() });
        }

        let installed = installed.get(id).copied();
        let admissible: Vec<Version> = versions
            .iter()
            .filter(|version| {
                requirement
                    .clone()
                    .with_prerelease(self.prerelease_admitted(version, installed, requirement))
                    .satisfies(version)
                    && self.candidate_admissible(version, installed)
            })
            .cloned()
            .collect();
        if admissible.is_empty() {
            return Err(Error::DependencyConflict {
                id: id.clone(),
                details: format!(
                    "none of the {} available versions satisfies {requirement}",
                    versions.len(),
                ),
            });
        }

        let installed_version = installed.map(|package| &package.identity.version);
        let picked = match self.context.dependency_behavior {
            DependencyBehavior::Lowest => admissible.first(),
            DependencyBehavior::Highest => admissible.last(),
            DependencyBehavior::HighestPatch => admissible
                .iter()
                .filter(|version| {
                    installed_version.is_some_and(|current| {
                        version.major() == current.major() && version.minor() == current.minor()
                    })
                })
                .next_back()
                .or_else(|| admissible.last()),
            DependencyBehavior::HighestMinor => admissible
                .iter()
                .filter(|version| {
                    installed_version.is_some_and(|current| version.major() == current.major())
                })
                .next_back()
                .or_else(|| admissible.last()),
            DependencyBehavior::Ignore => unreachable!("ignore never expands dependencies"),
        };
        Ok(picked.expect("admissible is non-empty").clone())
    }

    /// Returns `true` if the chosen version of `id` passes `requirement` and
    /// the id's own admission rules.
    fn version_admitted(
        &self,
        id: &PackageId,
        version: &Version,
        requirement: &VersionRange,
        installed: &BTreeMap<PackageId, &InstalledPackage>,
    ) -> bool {
        let installed = installed.get(id).copied();
        requirement
            .clone()
            .with_prerelease(self.prerelease_admitted(version, installed, requirement))
            .satisfies(version)
    }

    /// Applies the admission rules that do not depend on a requirement:
    /// the allowed-versions lock and the version constraints.
    fn candidate_admissible(
        &self,
        version: &Version,
        installed: Option<&InstalledPackage>,
    ) -> bool {
        let Some(installed) = installed else {
            return true;
        };
        if let Some(lock) = &installed.allowed_versions {
            let prerelease_ok =
                self.context.include_prerelease || *version == installed.identity.version;
            if !lock.clone().with_prerelease(prerelease_ok).satisfies(version) {
                return false;
            }
        }
        self.context
            .version_constraints
            .admits(&installed.identity.version, version)
    }

    /// A prerelease is admissible under the policy, or as the version that
    /// is already installed.
    fn prerelease_admitted(
        &self,
        version: &Version,
        installed: Option<&InstalledPackage>,
        requirement: &VersionRange,
    ) -> bool {
        self.context.include_prerelease
            || requirement.include_prerelease()
            || installed.is_some_and(|package| package.identity.version == *version)
    }

    fn into_resolution(&self, state: BTreeMap<PackageId, Chosen>) -> Resolution {
        let mut resolution = Resolution::default();
        for (id, chosen) in state {
            resolution
                .set
                .push(PackageIdentity::new(id.clone(), chosen.version));
            if let Some(info) = chosen.info {
                resolution.info.insert(id, info);
            }
        }
        resolution
    }
}

/// Intersects every recorded requirement on `id` into one range.
fn combine_requirements(
    id: &PackageId,
    entries: &BTreeMap<PackageId, VersionRange>,
) -> Result<VersionRange, Error> {
    let mut combined = VersionRange::any();
    for range in entries.values() {
        combined = match combined.intersect(range) {
            Some(intersection) => intersection,
            None => {
                let details = entries
                    .iter()
                    .map(|(parent, range)| format!("{parent} requires {id} {range}"))
                    .collect::<Vec<_>>()
                    .join(", ");
                return Err(Error::DependencyConflict {
                    id: id.clone(),
                    details,
                });
            }
        };
    }
    Ok(combined)
}
