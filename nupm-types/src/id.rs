//! Package ids and identities.

use std::{
    cmp::Ordering,
    fmt::{Display, Formatter},
    hash::{Hash, Hasher},
    str::FromStr,
};

use serde::{Deserialize, Deserializer, Serialize, Serializer, de};

use crate::{Error, Version};

/// A package id.
///
/// Package ids may contain ASCII letters, digits, `.`, `_` and `-`, and must
/// not be empty. Comparison, equality and hashing are case-insensitive; the
/// authored casing is preserved for display.
///
/// ## Examples
/// ```
/// use std::str::FromStr;
///
/// use nupm_types::PackageId;
///
/// let id = PackageId::from_str("Newtonsoft.Json").unwrap();
/// assert_eq!(id, PackageId::from_str("newtonsoft.json").unwrap());
/// assert_eq!(id.to_string(), "Newtonsoft.Json");
/// assert!(PackageId::from_str("").is_err());
/// ```
#[derive(Clone, Debug, Eq)]
pub struct PackageId(String);

impl PackageId {
    /// Creates a new [`PackageId`] from a string.
    ///
    /// # Errors
    ///
    /// Returns an error if the string is empty or contains characters outside
    /// of `[A-Za-z0-9._-]`.
    pub fn new(id: String) -> Result<Self, Error> {
        if id.is_empty()
            || !id
                .bytes()
                .all(|byte| byte.is_ascii_alphanumeric() || matches!(byte, b'.' | b'_' | b'-'))
        {
            return Err(Error::InvalidPackageId(id));
        }
        Ok(PackageId(id))
    }

    /// Returns a reference to the inner string in its authored casing.
    pub fn inner(&self) -> &str {
        &self.0
    }

    fn folded(&self) -> impl Iterator<Item = u8> + '_ {
        self.0.bytes().map(|byte| byte.to_ascii_lowercase())
    }
}

impl FromStr for PackageId {
    type Err = Error;

    /// Creates a [`PackageId`] from a string slice.
    fn from_str(input: &str) -> Result<PackageId, Self::Err> {
        PackageId::new(input.to_string())
    }
}

impl Display for PackageId {
    fn fmt(&self, fmt: &mut Formatter) -> std::fmt::Result {
        write!(fmt, "{}", self.inner())
    }
}

impl Ord for PackageId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.folded().cmp(other.folded())
    }
}

impl PartialOrd for PackageId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for PackageId {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other).is_eq()
    }
}

impl Hash for PackageId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for byte in self.folded() {
            byte.hash(state);
        }
    }
}

impl Serialize for PackageId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.inner())
    }
}

impl<'de> Deserialize<'de> for PackageId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let input = String::deserialize(deserializer)?;
        PackageId::new(input).map_err(de::Error::custom)
    }
}

/// A package identity: an id paired with a concrete version.
///
/// Identities are the atomic unit of install and uninstall actions. Equality
/// uses the case-insensitive id and the normalized version.
///
/// ## Examples
/// ```
/// use std::str::FromStr;
///
/// use nupm_types::{PackageId, PackageIdentity, Version};
///
/// let identity = PackageIdentity::new(
///     PackageId::from_str("jQuery").unwrap(),
///     Version::from_str("1.4.4").unwrap(),
/// );
/// assert_eq!(identity.to_string(), "jQuery/1.4.4");
/// ```
#[derive(Clone, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct PackageIdentity {
    /// The package id.
    pub id: PackageId,
    /// The package version.
    pub version: Version,
}

impl PackageIdentity {
    /// Creates a new [`PackageIdentity`].
    pub fn new(id: PackageId, version: Version) -> Self {
        PackageIdentity { id, version }
    }

    /// Returns the directory name used for this identity in a package store.
    ///
    /// The name combines the authored id casing with the normalized version,
    /// e.g. `jQuery.1.4.4`.
    pub fn dir_name(&self) -> String {
        format!("{}.{}", self.id, self.version.normalized())
    }
}

impl Display for PackageIdentity {
    fn fmt(&self, fmt: &mut Formatter) -> std::fmt::Result {
        write!(fmt, "{}/{}", self.id, self.version)
    }
}
