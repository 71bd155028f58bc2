//! Action plans and the planner.

use std::collections::{BTreeMap, BTreeSet};

use log::debug;
use nupm_solve::{Error as SolveError, Resolution};
use nupm_source::PackageSource;
use nupm_types::{PackageId, PackageIdentity};
use serde::Serialize;

use crate::{Error, UninstallationContext};

/// One step of an action plan.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub enum Action {
    /// Remove the identity from the project (and, when unreferenced, from
    /// the store).
    Uninstall(PackageIdentity),
    /// Install the identity from the attributed source.
    Install(PackageIdentity, PackageSource),
}

impl Action {
    /// Returns the identity the action is about.
    pub fn identity(&self) -> &PackageIdentity {
        match self {
            Action::Uninstall(identity) => identity,
            Action::Install(identity, _) => identity,
        }
    }
}

/// An ordered list of actions against one project.
///
/// All uninstalls precede all installs; uninstalls are ordered
/// dependents-first, installs dependencies-first. The plan additionally
/// remembers which ids were direct targets of the operation, which the
/// applier uses to surface package readmes.
#[derive(Debug, Default, Serialize)]
pub struct ActionPlan {
    actions: Vec<Action>,
    direct: BTreeSet<PackageId>,
}

impl ActionPlan {
    /// Returns the actions in execution order.
    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    /// Returns the number of actions.
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// Returns `true` if the plan changes nothing.
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Returns `true` if `id` was a direct target of the operation.
    pub fn is_direct(&self, id: &PackageId) -> bool {
        self.direct.contains(id)
    }

    /// Marks `id` as a direct target.
    pub(crate) fn mark_direct(&mut self, id: PackageId) {
        self.direct.insert(id);
    }
}

/// Dependency edges between installed packages, id to direct dependencies.
///
/// Built from the nuspec documents in the local store (or from a
/// resolution), and consulted for action ordering and the uninstall guard.
#[derive(Debug, Default)]
pub struct DependencyMap {
    edges: BTreeMap<PackageId, Vec<PackageId>>,
}

impl DependencyMap {
    /// Creates an empty map.
    pub fn new() -> Self {
        DependencyMap::default()
    }

    /// Records the direct dependencies of `id`.
    pub fn insert(&mut self, id: PackageId, dependencies: Vec<PackageId>) {
        self.edges.insert(id, dependencies);
    }

    /// Returns the direct dependencies of `id`.
    pub fn dependencies_of(&self, id: &PackageId) -> &[PackageId] {
        self.edges.get(id).map(Vec::as_slice).unwrap_or_default()
    }

    /// Returns the ids that directly depend on `id`.
    pub fn dependents_of(&self, id: &PackageId) -> Vec<PackageId> {
        self.edges
            .iter()
            .filter(|(_, dependencies)| dependencies.contains(id))
            .map(|(dependent, _)| dependent.clone())
            .collect()
    }

    /// Builds a map from the dependency info of a resolution.
    pub fn from_resolution(resolution: &Resolution) -> Self {
        let mut map = DependencyMap::new();
        for (id, info) in &resolution.info {
            map.insert(
                id.clone(),
                info.dependencies
                    .iter()
                    .map(|dependency| dependency.id.clone())
                    .collect(),
            );
        }
        map
    }

    /// Orders `ids` dependencies-first.
    ///
    /// Edges to ids outside of `ids` are ignored. Ties break towards the
    /// smaller id, which keeps the order deterministic.
    ///
    /// # Errors
    ///
    /// Returns a dependency conflict if the ids form a cycle.
    pub fn dependency_order(&self, ids: &BTreeSet<PackageId>) -> Result<Vec<PackageId>, Error> {
        let mut remaining: BTreeMap<PackageId, BTreeSet<PackageId>> = ids
            .iter()
            .map(|id| {
                let dependencies: BTreeSet<PackageId> = self
                    .dependencies_of(id)
                    .iter()
                    .filter(|dependency| ids.contains(*dependency) && *dependency != id)
                    .cloned()
                    .collect();
                (id.clone(), dependencies)
            })
            .collect();

        let mut ordered = Vec::with_capacity(ids.len());
        while !remaining.is_empty() {
            let next = remaining
                .iter()
                .find(|(_, dependencies)| dependencies.is_empty())
                .map(|(id, _)| id.clone());
            let Some(next) = next else {
                let id = remaining
                    .keys()
                    .next()
                    .cloned()
                    .expect("remaining is non-empty");
                return Err(SolveError::DependencyConflict {
                    id,
                    details: "the affected packages form a dependency cycle".to_string(),
                }
                .into());
            };
            remaining.remove(&next);
            for dependencies in remaining.values_mut() {
                dependencies.remove(&next);
            }
            ordered.push(next);
        }
        Ok(ordered)
    }
}

/// The planner: diffs resolved-vs-installed into ordered actions.
#[derive(Debug, Default)]
pub struct Planner;

impl Planner {
    /// Plans the transition from `installed` to the resolution's set.
    ///
    /// Identities present on both sides produce no action, unless
    /// `force_reinstall` is set, in which case every resolved identity gets
    /// an uninstall/install pair. Uninstall ordering uses the installed
    /// dependency edges (`local`), install ordering the resolved ones.
    ///
    /// # Errors
    ///
    /// Returns a dependency conflict if the affected identities form a
    /// cycle.
    pub fn plan(
        installed: &[PackageIdentity],
        resolution: &Resolution,
        local: &DependencyMap,
        force_reinstall: bool,
    ) -> Result<ActionPlan, Error> {
        let installed_map: BTreeMap<&PackageId, &PackageIdentity> = installed
            .iter()
            .map(|identity| (&identity.id, identity))
            .collect();
        let resolved_map: BTreeMap<&PackageId, &PackageIdentity> = resolution
            .set
            .iter()
            .map(|identity| (&identity.id, identity))
            .collect();

        let mut uninstalls: BTreeSet<PackageId> = BTreeSet::new();
        let mut installs: BTreeSet<PackageId> = BTreeSet::new();

        for (id, identity) in &installed_map {
            match resolved_map.get(*id) {
                None => {
                    uninstalls.insert((*id).clone());
                }
                Some(resolved) if resolved.version != identity.version || force_reinstall => {
                    uninstalls.insert((*id).clone());
                    installs.insert((*id).clone());
                }
                Some(_) => {}
            }
        }
        for id in resolved_map.keys() {
            if !installed_map.contains_key(*id) {
                installs.insert((*id).clone());
            }
        }

        let resolved_edges = DependencyMap::from_resolution(resolution);

        let mut plan = ActionPlan::default();
        // dependents first: reverse of the dependencies-first order
        for id in local.dependency_order(&uninstalls)?.into_iter().rev() {
            let identity = installed_map[&id];
            plan.actions.push(Action::Uninstall((*identity).clone()));
        }
        for id in resolved_edges.dependency_order(&installs)? {
            let identity = resolved_map[&id];
            let source = resolution
                .info
                .get(&id)
                .map(|info| info.source.clone())
                .unwrap_or_else(|| PackageSource::new("", ""));
            plan.actions.push(Action::Install((*identity).clone(), source));
        }
        debug!(
            "planned {} uninstalls and {} installs",
            uninstalls.len(),
            installs.len(),
        );
        Ok(plan)
    }

    /// Plans an uninstall of `targets` from `installed`.
    ///
    /// Without options the dependent guard refuses to remove a package some
    /// remaining package depends on. `remove_dependencies` expands the
    /// removal set with dependencies that would become orphans;
    /// `force_remove` bypasses the guard.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PackageHasDependents`] when the guard refuses, or a
    /// dependency conflict if the removal set forms a cycle.
    pub fn plan_uninstall(
        installed: &[PackageIdentity],
        targets: &BTreeSet<PackageId>,
        local: &DependencyMap,
        context: &UninstallationContext,
    ) -> Result<ActionPlan, Error> {
        let installed_map: BTreeMap<&PackageId, &PackageIdentity> = installed
            .iter()
            .map(|identity| (&identity.id, identity))
            .collect();

        let mut removal: BTreeSet<PackageId> = targets.clone();
        if context.remove_dependencies {
            // grow with dependencies whose every dependent is being removed
            loop {
                let mut grew = false;
                let candidates: BTreeSet<PackageId> = removal
                    .iter()
                    .flat_map(|id| local.dependencies_of(id).to_vec())
                    .filter(|id| installed_map.contains_key(id) && !removal.contains(id))
                    .collect();
                for candidate in candidates {
                    let orphaned = local
                        .dependents_of(&candidate)
                        .into_iter()
                        .filter(|dependent| installed_map.contains_key(dependent))
                        .all(|dependent| removal.contains(&dependent));
                    if orphaned {
                        removal.insert(candidate);
                        grew = true;
                    }
                }
                if !grew {
                    break;
                }
            }
        }

        if !context.force_remove {
            for id in &removal {
                let dependents: Vec<String> = local
                    .dependents_of(id)
                    .into_iter()
                    .filter(|dependent| {
                        installed_map.contains_key(dependent) && !removal.contains(dependent)
                    })
                    .map(|dependent| installed_map[&dependent].to_string())
                    .collect();
                if !dependents.is_empty() {
                    return Err(Error::PackageHasDependents {
                        identity: installed_map[id].clone(),
                        dependents,
                    });
                }
            }
        }

        let mut plan = ActionPlan::default();
        for id in local.dependency_order(&removal)?.into_iter().rev() {
            plan.actions.push(Action::Uninstall(installed_map[&id].clone()));
        }
        Ok(plan)
    }
}
