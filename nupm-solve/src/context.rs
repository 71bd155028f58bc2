//! Resolution policy and per-operation state.

use nupm_source::GatherCache;
use nupm_types::VersionConstraints;
use strum::{Display, EnumString};

/// Governs which in-range version of a dependency the resolver prefers.
#[derive(Clone, Copy, Debug, Default, Display, EnumString, Eq, PartialEq)]
#[strum(serialize_all = "lowercase")]
pub enum DependencyBehavior {
    /// Install only the direct targets; dependencies are not expanded.
    Ignore,
    /// The smallest candidate satisfying the requirements.
    #[default]
    Lowest,
    /// The greatest candidate with the installed major and minor segments,
    /// or the greatest in range when none matches.
    HighestPatch,
    /// The greatest candidate with the installed major segment, or the
    /// greatest in range when none matches.
    HighestMinor,
    /// The greatest candidate satisfying the requirements.
    Highest,
}

/// The policy bundle of one resolution, together with its gather cache.
///
/// A context lives for one operation; dropping it drops the cache, so no
/// dependency information leaks between operations.
#[derive(Debug, Default)]
pub struct ResolutionContext {
    /// The dependency selection behavior.
    pub dependency_behavior: DependencyBehavior,
    /// Whether prerelease versions are admissible without being pinned or
    /// already installed.
    pub include_prerelease: bool,
    /// Whether unlisted versions participate in listings and candidate sets.
    pub include_unlisted: bool,
    /// Segment locks against the installed versions, used by reinstalls.
    pub version_constraints: VersionConstraints,
    /// The dependency info cache for this operation.
    pub gather_cache: GatherCache,
}

impl ResolutionContext {
    /// Creates a context with the given behavior and default policies.
    pub fn new(dependency_behavior: DependencyBehavior) -> Self {
        ResolutionContext {
            dependency_behavior,
            ..Default::default()
        }
    }

    /// Returns a copy of `self` with prerelease admission switched.
    pub fn with_prerelease(mut self, include_prerelease: bool) -> Self {
        self.include_prerelease = include_prerelease;
        self
    }

    /// Returns a copy of `self` with unlisted admission switched.
    pub fn with_unlisted(mut self, include_unlisted: bool) -> Self {
        self.include_unlisted = include_unlisted;
        self
    }

    /// Returns a copy of `self` with the given version constraints.
    pub fn with_constraints(mut self, version_constraints: VersionConstraints) -> Self {
        self.version_constraints = version_constraints;
        self
    }
}
