//! Package dependency declarations.

use serde::{Deserialize, Serialize};

use crate::{FrameworkName, PackageId, VersionRange};

/// A dependency on another package: an id and the admissible version range.
#[derive(Clone, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub struct PackageDependency {
    /// The id of the package depended upon.
    pub id: PackageId,
    /// The range of admissible versions.
    pub range: VersionRange,
}

impl PackageDependency {
    /// Creates a new [`PackageDependency`].
    pub fn new(id: PackageId, range: VersionRange) -> Self {
        PackageDependency { id, range }
    }
}

/// The dependencies of a package for one target framework group.
///
/// A group without a target framework is the fallback group and applies to
/// any project no more specific group matches.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct DependencyGroup {
    /// The framework this group applies to; [`None`] for the fallback group.
    pub target_framework: Option<FrameworkName>,
    /// The dependencies of this group.
    pub dependencies: Vec<PackageDependency>,
}

impl DependencyGroup {
    /// Creates a new [`DependencyGroup`].
    pub fn new(
        target_framework: Option<FrameworkName>,
        dependencies: Vec<PackageDependency>,
    ) -> Self {
        DependencyGroup {
            target_framework,
            dependencies,
        }
    }
}

/// Selects the dependency group that applies to a project framework.
///
/// Framework-specific groups are matched with [`FrameworkName::best_match`];
/// the fallback group (no target framework) is used when no specific group is
/// compatible. Returns [`None`] if the package declares no applicable group.
///
/// ## Examples
/// ```
/// use std::str::FromStr;
///
/// use nupm_types::{DependencyGroup, FrameworkName, select_dependency_group};
///
/// let groups = vec![
///     DependencyGroup::new(Some(FrameworkName::from_str("net45").unwrap()), vec![]),
///     DependencyGroup::new(None, vec![]),
/// ];
/// let project = FrameworkName::from_str("net472").unwrap();
/// let selected = select_dependency_group(&groups, &project).unwrap();
/// assert_eq!(
///     selected.target_framework,
///     Some(FrameworkName::from_str("net45").unwrap()),
/// );
/// ```
pub fn select_dependency_group<'a>(
    groups: &'a [DependencyGroup],
    project: &FrameworkName,
) -> Option<&'a DependencyGroup> {
    let frameworks: Vec<FrameworkName> = groups
        .iter()
        .filter_map(|group| group.target_framework)
        .collect();
    if let Some(best) = project.best_match(&frameworks) {
        return groups
            .iter()
            .find(|group| group.target_framework.as_ref() == Some(best));
    }
    groups.iter().find(|group| group.target_framework.is_none())
}
