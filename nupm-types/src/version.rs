//! Package version handling.

use std::{
    cmp::Ordering,
    fmt::{Display, Formatter},
    hash::{Hash, Hasher},
    str::FromStr,
};

use serde::{Deserialize, Deserializer, Serialize, Serializer, de};
use winnow::{
    ModalResult,
    Parser,
    ascii::digit1,
    combinator::{opt, preceded, separated},
    token::take_while,
};

use crate::Error;

/// A single dot-separated identifier in a prerelease label.
///
/// Identifiers consisting only of digits compare numerically; all other
/// identifiers compare lexically. Any numeric identifier orders before any
/// alphanumeric one.
///
/// ## Examples
/// ```
/// use std::str::FromStr;
///
/// use nupm_types::Version;
///
/// let alpha = Version::from_str("1.0.0-alpha.2").unwrap();
/// let beta = Version::from_str("1.0.0-alpha.10").unwrap();
/// assert!(alpha < beta);
/// ```
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum PrereleaseIdentifier {
    /// A purely numeric identifier, e.g. the `2` in `alpha.2`.
    Numeric(u64),
    /// An alphanumeric identifier, e.g. the `alpha` in `alpha.2`.
    AlphaNumeric(String),
}

impl PrereleaseIdentifier {
    fn from_segment(segment: &str) -> Self {
        if !segment.is_empty() && segment.bytes().all(|byte| byte.is_ascii_digit()) {
            match segment.parse() {
                Ok(numeric) => return PrereleaseIdentifier::Numeric(numeric),
                Err(_) => return PrereleaseIdentifier::AlphaNumeric(segment.to_string()),
            }
        }
        PrereleaseIdentifier::AlphaNumeric(segment.to_string())
    }
}

impl Display for PrereleaseIdentifier {
    fn fmt(&self, fmt: &mut Formatter) -> std::fmt::Result {
        match self {
            PrereleaseIdentifier::Numeric(numeric) => write!(fmt, "{numeric}"),
            PrereleaseIdentifier::AlphaNumeric(alphanumeric) => write!(fmt, "{alphanumeric}"),
        }
    }
}

/// A package version.
///
/// A `Version` tracks up to four numeric segments
/// (`major.minor.patch.revision`), an optional prerelease label and optional
/// build metadata. The parser accepts two, three or four numeric segments; a
/// missing patch or revision segment is treated as `0`.
///
/// Ordering follows the numeric tuple first. A version without a prerelease
/// label orders *after* any prerelease of the same tuple. Prerelease labels
/// order by their dot-separated identifiers (see [`PrereleaseIdentifier`]).
/// Build metadata is ignored for ordering and equality.
///
/// The [`Display`] implementation renders the normalized form: three numeric
/// segments, the revision only when it is non-zero, and no build metadata.
///
/// ## Examples
/// ```
/// use std::str::FromStr;
///
/// use nupm_types::Version;
///
/// let version = Version::from_str("1.6.4").unwrap();
/// assert_eq!(version.to_string(), "1.6.4");
///
/// // two-segment input, four-segment input
/// assert_eq!(Version::from_str("2.2").unwrap().to_string(), "2.2.0");
/// assert_eq!(Version::from_str("2.2.22.0").unwrap().to_string(), "2.2.22");
///
/// // metadata is ignored for equality
/// assert_eq!(
///     Version::from_str("1.0.0+build.5").unwrap(),
///     Version::from_str("1.0.0").unwrap(),
/// );
///
/// // prereleases order before the release
/// assert!(Version::from_str("1.0.0-rc.1").unwrap() < Version::from_str("1.0.0").unwrap());
/// ```
#[derive(Clone, Debug, Eq)]
pub struct Version {
    major: u64,
    minor: u64,
    patch: u64,
    revision: u64,
    prerelease: Vec<PrereleaseIdentifier>,
    metadata: Option<String>,
}

impl Version {
    /// Creates a release version from three numeric segments.
    pub fn new(major: u64, minor: u64, patch: u64) -> Self {
        Version {
            major,
            minor,
            patch,
            revision: 0,
            prerelease: Vec::new(),
            metadata: None,
        }
    }

    /// Returns the major segment.
    pub fn major(&self) -> u64 {
        self.major
    }

    /// Returns the minor segment.
    pub fn minor(&self) -> u64 {
        self.minor
    }

    /// Returns the patch segment.
    pub fn patch(&self) -> u64 {
        self.patch
    }

    /// Returns the revision segment (`0` when absent in the input).
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Returns the prerelease identifiers (empty for a release version).
    pub fn prerelease(&self) -> &[PrereleaseIdentifier] {
        &self.prerelease
    }

    /// Returns the build metadata, if any.
    pub fn metadata(&self) -> Option<&str> {
        self.metadata.as_deref()
    }

    /// Returns `true` if this version carries a prerelease label.
    pub fn is_prerelease(&self) -> bool {
        !self.prerelease.is_empty()
    }

    /// Returns the four numeric segments as a tuple.
    pub fn release_tuple(&self) -> (u64, u64, u64, u64) {
        (self.major, self.minor, self.patch, self.revision)
    }

    /// Returns the normalized string rendering.
    ///
    /// This is the form used for store directory names: three segments, the
    /// revision only when non-zero, the prerelease label when present, and no
    /// build metadata.
    pub fn normalized(&self) -> String {
        let mut rendered = format!("{}.{}.{}", self.major, self.minor, self.patch);
        if self.revision != 0 {
            rendered.push_str(&format!(".{}", self.revision));
        }
        if !self.prerelease.is_empty() {
            rendered.push('-');
            rendered.push_str(&self.prerelease_label());
        }
        rendered
    }

    fn prerelease_label(&self) -> String {
        self.prerelease
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(".")
    }

    /// Recognizes a [`Version`] in an input string.
    pub fn parser(input: &mut &str) -> ModalResult<Version> {
        fn segment(input: &mut &str) -> ModalResult<u64> {
            digit1.try_map(str::parse).parse_next(input)
        }

        fn prerelease_identifier(input: &mut &str) -> ModalResult<PrereleaseIdentifier> {
            take_while(1.., |c: char| c.is_ascii_alphanumeric() || c == '-')
                .map(PrereleaseIdentifier::from_segment)
                .parse_next(input)
        }

        let major = segment.parse_next(input)?;
        let minor = preceded('.', segment).parse_next(input)?;
        let patch = opt(preceded('.', segment)).parse_next(input)?;
        let revision = match patch {
            Some(_) => opt(preceded('.', segment)).parse_next(input)?,
            None => None,
        };
        let prerelease: Option<Vec<PrereleaseIdentifier>> = opt(preceded(
            '-',
            separated(1.., prerelease_identifier, '.'),
        ))
        .parse_next(input)?;
        let metadata = opt(preceded(
            '+',
            take_while(1.., |c: char| c.is_ascii_alphanumeric() || c == '-' || c == '.'),
        ))
        .parse_next(input)?;

        Ok(Version {
            major,
            minor,
            patch: patch.unwrap_or(0),
            revision: revision.unwrap_or(0),
            prerelease: prerelease.unwrap_or_default(),
            metadata: metadata.map(str::to_string),
        })
    }
}

impl FromStr for Version {
    type Err = Error;

    /// Creates a [`Version`] from a string slice.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is not a valid version.
    fn from_str(input: &str) -> Result<Version, Self::Err> {
        Version::parser
            .parse(input)
            .map_err(|error| Error::ParseError(error.to_string()))
    }
}

impl Display for Version {
    fn fmt(&self, fmt: &mut Formatter) -> std::fmt::Result {
        write!(fmt, "{}", self.normalized())
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.release_tuple()
            .cmp(&other.release_tuple())
            .then_with(|| {
                match (self.prerelease.is_empty(), other.prerelease.is_empty()) {
                    (true, true) => Ordering::Equal,
                    // a release orders after any of its prereleases
                    (true, false) => Ordering::Greater,
                    (false, true) => Ordering::Less,
                    (false, false) => self.prerelease.cmp(&other.prerelease),
                }
            })
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.release_tuple() == other.release_tuple() && self.prerelease == other.prerelease
    }
}

impl Hash for Version {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.release_tuple().hash(state);
        self.prerelease.hash(state);
    }
}

impl Serialize for Version {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.normalized())
    }
}

impl<'de> Deserialize<'de> for Version {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let input = String::deserialize(deserializer)?;
        Version::from_str(&input).map_err(de::Error::custom)
    }
}
