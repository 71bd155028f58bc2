//! Package references as stored in a manifest.

use nupm_types::{FrameworkName, PackageIdentity, VersionRange};

/// One `<package>` entry of a manifest.
///
/// Beyond the typed fields, a reference carries every attribute the library
/// does not own (`extra`) and any child XML of the element verbatim, so that
/// user-authored and forward-compatible data survives manifest rewrites.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PackageReference {
    /// The referenced package identity.
    pub identity: PackageIdentity,
    /// The target framework recorded at install time.
    pub target_framework: Option<FrameworkName>,
    /// A user-authored lock on admissible update versions.
    pub allowed_versions: Option<VersionRange>,
    /// Whether the package is only needed at development time.
    pub development_dependency: bool,
    /// Attributes not owned by this library, in authored order.
    pub extra: Vec<(String, String)>,
    /// Raw inner XML of the element, if any.
    pub children_xml: Option<String>,
}

impl PackageReference {
    /// Creates a reference with only the canonical fields set.
    pub fn new(identity: PackageIdentity, target_framework: Option<FrameworkName>) -> Self {
        PackageReference {
            identity,
            target_framework,
            allowed_versions: None,
            development_dependency: false,
            extra: Vec::new(),
            children_xml: None,
        }
    }

    /// Returns a copy with `identity` replaced and all sibling data kept.
    ///
    /// This is the manifest-edit primitive used when a package moves to a
    /// different version: everything except the identity is carried over.
    pub fn with_identity(&self, identity: PackageIdentity) -> Self {
        let mut updated = self.clone();
        updated.identity = identity;
        updated
    }
}
