//! Version constraint flags.

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::Version;

/// Flags forcing segments of a chosen version to match the installed one.
///
/// Used during reinstall and constrained updates: each set flag pins the
/// corresponding version segment of a candidate to the segment of the
/// currently installed version. [`VersionConstraints::ALL`] pins every
/// segment and the release label, which restricts a package to its exact
/// installed version.
///
/// ## Examples
/// ```
/// use std::str::FromStr;
///
/// use nupm_types::{Version, VersionConstraints};
///
/// let installed = Version::from_str("1.2.3").unwrap();
/// let candidate = Version::from_str("1.2.9").unwrap();
///
/// let minor = VersionConstraints::EXACT_MAJOR | VersionConstraints::EXACT_MINOR;
/// assert!(minor.admits(&installed, &candidate));
/// assert!(!VersionConstraints::ALL.admits(&installed, &candidate));
/// ```
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub struct VersionConstraints(u8);

impl VersionConstraints {
    /// No constraint; any candidate version is admitted.
    pub const NONE: VersionConstraints = VersionConstraints(0);
    /// The candidate's major segment must equal the installed one.
    pub const EXACT_MAJOR: VersionConstraints = VersionConstraints(1);
    /// The candidate's minor segment must equal the installed one.
    pub const EXACT_MINOR: VersionConstraints = VersionConstraints(1 << 1);
    /// The candidate's patch segment must equal the installed one.
    pub const EXACT_PATCH: VersionConstraints = VersionConstraints(1 << 2);
    /// The candidate's revision and prerelease label must equal the installed
    /// ones.
    pub const EXACT_RELEASE: VersionConstraints = VersionConstraints(1 << 3);
    /// All segments pinned; only the installed version itself is admitted.
    pub const ALL: VersionConstraints = VersionConstraints(0b1111);

    /// Returns `true` if every flag in `other` is set in `self`.
    pub fn contains(self, other: VersionConstraints) -> bool {
        self.0 & other.0 == other.0
    }

    /// Returns `true` if no flag is set.
    pub fn is_none(self) -> bool {
        self.0 == 0
    }

    /// Returns `true` if `candidate` is admitted next to `installed`.
    pub fn admits(self, installed: &Version, candidate: &Version) -> bool {
        if self.contains(Self::EXACT_MAJOR) && candidate.major() != installed.major() {
            return false;
        }
        if self.contains(Self::EXACT_MINOR) && candidate.minor() != installed.minor() {
            return false;
        }
        if self.contains(Self::EXACT_PATCH) && candidate.patch() != installed.patch() {
            return false;
        }
        if self.contains(Self::EXACT_RELEASE)
            && (candidate.revision() != installed.revision()
                || candidate.prerelease() != installed.prerelease())
        {
            return false;
        }
        true
    }
}

impl std::ops::BitOr for VersionConstraints {
    type Output = VersionConstraints;

    fn bitor(self, rhs: VersionConstraints) -> VersionConstraints {
        VersionConstraints(self.0 | rhs.0)
    }
}

impl Display for VersionConstraints {
    fn fmt(&self, fmt: &mut Formatter) -> std::fmt::Result {
        if self.is_none() {
            return write!(fmt, "none");
        }
        let mut labels = Vec::new();
        if self.contains(Self::EXACT_MAJOR) {
            labels.push("major");
        }
        if self.contains(Self::EXACT_MINOR) {
            labels.push("minor");
        }
        if self.contains(Self::EXACT_PATCH) {
            labels.push("patch");
        }
        if self.contains(Self::EXACT_RELEASE) {
            labels.push("release");
        }
        write!(fmt, "{}", labels.join("+"))
    }
}
