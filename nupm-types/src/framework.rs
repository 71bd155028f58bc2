//! Target framework monikers and compatibility.

use std::{
    fmt::{Display, Formatter},
    str::FromStr,
};

use serde::{Deserialize, Deserializer, Serialize, Serializer, de};
use strum::{Display as StrumDisplay, EnumString};

use crate::Error;

/// The family a target framework belongs to.
#[derive(
    Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize, StrumDisplay, EnumString,
)]
#[strum(serialize_all = "lowercase")]
pub enum FrameworkIdentifier {
    /// No framework affinity; compatible with everything.
    Any,
    /// The classic .NET Framework (`net45`, `net472`).
    #[strum(to_string = "net")]
    NetFramework,
    /// .NET Standard contract libraries (`netstandard2.0`).
    #[strum(to_string = "netstandard")]
    NetStandard,
    /// .NET Core and .NET 5+ (`netcoreapp3.1`, `net6.0`).
    #[strum(to_string = "netcoreapp")]
    NetCoreApp,
}

/// The version part of a target framework moniker.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct FrameworkVersion {
    /// The major version.
    pub major: u16,
    /// The minor version.
    pub minor: u16,
    /// The patch version.
    pub patch: u16,
}

impl FrameworkVersion {
    /// Creates a new [`FrameworkVersion`].
    pub const fn new(major: u16, minor: u16, patch: u16) -> Self {
        FrameworkVersion {
            major,
            minor,
            patch,
        }
    }

    /// Parses a dotted version (`3.1`) or a compact digit run (`472`).
    fn parse(input: &str) -> Option<Self> {
        if input.is_empty() {
            return None;
        }
        let mut segments = [0u16; 3];
        if input.contains('.') {
            for (index, part) in input.split('.').enumerate() {
                if index >= 3 {
                    return None;
                }
                segments[index] = part.parse().ok()?;
            }
        } else {
            // compact digits: one segment per digit, `472` is 4.7.2
            if input.len() > 3 || !input.bytes().all(|byte| byte.is_ascii_digit()) {
                return None;
            }
            for (index, byte) in input.bytes().enumerate() {
                segments[index] = u16::from(byte - b'0');
            }
        }
        Some(FrameworkVersion::new(segments[0], segments[1], segments[2]))
    }
}

/// A parsed target framework moniker.
///
/// ## Examples
/// ```
/// use std::str::FromStr;
///
/// use nupm_types::FrameworkName;
///
/// let net45 = FrameworkName::from_str("net45").unwrap();
/// let net472 = FrameworkName::from_str("net472").unwrap();
/// let netstandard = FrameworkName::from_str("netstandard2.0").unwrap();
///
/// // a net472 project can consume net45 and netstandard2.0 assets
/// assert!(net472.supports(&net45));
/// assert!(net472.supports(&netstandard));
/// // a net45 project cannot consume net472 assets
/// assert!(!net45.supports(&net472));
/// ```
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct FrameworkName {
    identifier: FrameworkIdentifier,
    version: FrameworkVersion,
}

impl FrameworkName {
    /// The framework-agnostic name.
    pub const ANY: FrameworkName = FrameworkName {
        identifier: FrameworkIdentifier::Any,
        version: FrameworkVersion::new(0, 0, 0),
    };

    /// Creates a new [`FrameworkName`].
    pub fn new(identifier: FrameworkIdentifier, version: FrameworkVersion) -> Self {
        FrameworkName {
            identifier,
            version,
        }
    }

    /// Returns the framework family.
    pub fn identifier(&self) -> FrameworkIdentifier {
        self.identifier
    }

    /// Returns the framework version.
    pub fn version(&self) -> FrameworkVersion {
        self.version
    }

    /// Returns `true` if a project targeting `self` can consume assets built
    /// for `package`.
    ///
    /// Within one family a lower or equal framework version is compatible.
    /// `netstandard` assets are additionally consumable from .NET Framework
    /// and .NET Core projects, gated by the standard support table.
    pub fn supports(&self, package: &FrameworkName) -> bool {
        if self.identifier == FrameworkIdentifier::Any
            || package.identifier == FrameworkIdentifier::Any
        {
            return true;
        }
        if self.identifier == package.identifier {
            return package.version <= self.version;
        }
        if package.identifier == FrameworkIdentifier::NetStandard {
            return match self.max_supported_standard() {
                Some(max) => package.version <= max,
                None => false,
            };
        }
        false
    }

    /// Returns the highest `netstandard` version consumable by this
    /// framework, if any.
    fn max_supported_standard(&self) -> Option<FrameworkVersion> {
        let version = self.version;
        match self.identifier {
            FrameworkIdentifier::NetStandard => Some(version),
            FrameworkIdentifier::NetCoreApp => {
                if version >= FrameworkVersion::new(3, 0, 0) {
                    Some(FrameworkVersion::new(2, 1, 0))
                } else if version >= FrameworkVersion::new(2, 0, 0) {
                    Some(FrameworkVersion::new(2, 0, 0))
                } else {
                    Some(FrameworkVersion::new(1, 6, 0))
                }
            }
            FrameworkIdentifier::NetFramework => {
                if version >= FrameworkVersion::new(4, 6, 1) {
                    Some(FrameworkVersion::new(2, 0, 0))
                } else if version >= FrameworkVersion::new(4, 6, 0) {
                    Some(FrameworkVersion::new(1, 3, 0))
                } else if version >= FrameworkVersion::new(4, 5, 1) {
                    Some(FrameworkVersion::new(1, 2, 0))
                } else if version >= FrameworkVersion::new(4, 5, 0) {
                    Some(FrameworkVersion::new(1, 1, 0))
                } else {
                    None
                }
            }
            FrameworkIdentifier::Any => None,
        }
    }

    /// Picks the best matching candidate for a project targeting `self`.
    ///
    /// Candidates from the project's own family are preferred over
    /// `netstandard` fallbacks, which in turn are preferred over agnostic
    /// content; within a group the highest compatible version wins.
    pub fn best_match<'a, I>(&self, candidates: I) -> Option<&'a FrameworkName>
    where
        I: IntoIterator<Item = &'a FrameworkName>,
    {
        candidates
            .into_iter()
            .filter(|candidate| self.supports(candidate))
            .max_by_key(|candidate| {
                let family_rank = if candidate.identifier == self.identifier {
                    2
                } else if candidate.identifier == FrameworkIdentifier::NetStandard {
                    1
                } else {
                    0
                };
                (family_rank, candidate.version)
            })
    }
}

impl FromStr for FrameworkName {
    type Err = Error;

    /// Creates a [`FrameworkName`] from a target framework moniker.
    ///
    /// # Errors
    ///
    /// Returns an error if the moniker is not recognized.
    fn from_str(input: &str) -> Result<FrameworkName, Self::Err> {
        let moniker = input.trim().to_ascii_lowercase();
        if moniker.is_empty() || moniker == "any" {
            return Ok(FrameworkName::ANY);
        }
        if let Some(version) = moniker.strip_prefix("netstandard") {
            let version = FrameworkVersion::parse(version)
                .ok_or_else(|| Error::UnknownFramework(input.to_string()))?;
            return Ok(FrameworkName::new(FrameworkIdentifier::NetStandard, version));
        }
        if let Some(version) = moniker.strip_prefix("netcoreapp") {
            let version = FrameworkVersion::parse(version)
                .ok_or_else(|| Error::UnknownFramework(input.to_string()))?;
            return Ok(FrameworkName::new(FrameworkIdentifier::NetCoreApp, version));
        }
        if let Some(version) = moniker.strip_prefix("net") {
            let parsed = FrameworkVersion::parse(version)
                .ok_or_else(|| Error::UnknownFramework(input.to_string()))?;
            // dotted `net5.0`-style monikers belong to the core family
            let identifier = if version.contains('.') {
                FrameworkIdentifier::NetCoreApp
            } else {
                FrameworkIdentifier::NetFramework
            };
            return Ok(FrameworkName::new(identifier, parsed));
        }
        Err(Error::UnknownFramework(input.to_string()))
    }
}

impl Display for FrameworkName {
    fn fmt(&self, fmt: &mut Formatter) -> std::fmt::Result {
        let version = self.version;
        match self.identifier {
            FrameworkIdentifier::Any => write!(fmt, "any"),
            FrameworkIdentifier::NetFramework => {
                write!(fmt, "net{}{}", version.major, version.minor)?;
                if version.patch != 0 {
                    write!(fmt, "{}", version.patch)?;
                }
                Ok(())
            }
            FrameworkIdentifier::NetStandard => {
                write!(fmt, "netstandard{}.{}", version.major, version.minor)
            }
            FrameworkIdentifier::NetCoreApp => {
                if version.major >= 5 {
                    write!(fmt, "net{}.{}", version.major, version.minor)
                } else {
                    write!(fmt, "netcoreapp{}.{}", version.major, version.minor)
                }
            }
        }
    }
}

impl Serialize for FrameworkName {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for FrameworkName {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let input = String::deserialize(deserializer)?;
        FrameworkName::from_str(&input).map_err(de::Error::custom)
    }
}
