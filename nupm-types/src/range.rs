//! Version range handling.

use std::{
    fmt::{Display, Formatter},
    str::FromStr,
};

use serde::{Deserialize, Deserializer, Serialize, Serializer, de};
use winnow::{
    ModalResult,
    Parser,
    combinator::{alt, opt, preceded, terminated},
};

use crate::{Error, Version};

/// A range of acceptable package versions in bracket notation.
///
/// The notation follows the usual conventions for dependency ranges in
/// package manifests:
///
/// | Notation     | Meaning                         |
/// |--------------|---------------------------------|
/// | `1.0`        | minimum version, inclusive      |
/// | `[1.0]`      | exactly version 1.0             |
/// | `[1.0,2.0)`  | 1.0 ≤ x < 2.0                   |
/// | `(1.0,)`     | x > 1.0                         |
/// | `(,2.0]`     | x ≤ 2.0                         |
///
/// A range additionally carries an `include_prerelease` flag. A prerelease
/// version satisfies a range only if the flag is set, or if the range's lower
/// bound is itself a prerelease of the same numeric tuple.
///
/// ## Examples
/// ```
/// use std::str::FromStr;
///
/// use nupm_types::{Version, VersionRange};
///
/// let range = VersionRange::from_str("[1.4.4]").unwrap();
/// assert!(range.satisfies(&Version::from_str("1.4.4").unwrap()));
/// assert!(!range.satisfies(&Version::from_str("1.6.4").unwrap()));
///
/// let floating = VersionRange::from_str("2.1").unwrap();
/// assert!(floating.satisfies(&Version::from_str("3.0.0").unwrap()));
/// assert!(!floating.satisfies(&Version::from_str("2.0.9").unwrap()));
/// ```
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct VersionRange {
    min: Option<Version>,
    min_inclusive: bool,
    max: Option<Version>,
    max_inclusive: bool,
    include_prerelease: bool,
}

impl VersionRange {
    /// Creates a range accepting any version greater than or equal to `min`.
    pub fn at_least(min: Version) -> Self {
        VersionRange {
            min: Some(min),
            min_inclusive: true,
            max: None,
            max_inclusive: false,
            include_prerelease: false,
        }
    }

    /// Creates a single-point range accepting exactly `version`.
    pub fn exact(version: Version) -> Self {
        VersionRange {
            min: Some(version.clone()),
            min_inclusive: true,
            max: Some(version),
            max_inclusive: true,
            include_prerelease: false,
        }
    }

    /// Creates a range accepting every version.
    pub fn any() -> Self {
        VersionRange {
            min: None,
            min_inclusive: false,
            max: None,
            max_inclusive: false,
            include_prerelease: false,
        }
    }

    /// Returns the lower bound, if any.
    pub fn min(&self) -> Option<&Version> {
        self.min.as_ref()
    }

    /// Returns `true` if the lower bound is inclusive.
    pub fn min_inclusive(&self) -> bool {
        self.min_inclusive
    }

    /// Returns the upper bound, if any.
    pub fn max(&self) -> Option<&Version> {
        self.max.as_ref()
    }

    /// Returns `true` if the upper bound is inclusive.
    pub fn max_inclusive(&self) -> bool {
        self.max_inclusive
    }

    /// Returns `true` if prerelease versions are admitted unconditionally.
    pub fn include_prerelease(&self) -> bool {
        self.include_prerelease
    }

    /// Returns a copy of this range with the prerelease flag set to `value`.
    pub fn with_prerelease(mut self, value: bool) -> Self {
        self.include_prerelease = value;
        self
    }

    /// Returns `true` if this is a single-point range (`[x,x]`).
    pub fn is_exact(&self) -> bool {
        self.min_inclusive
            && self.max_inclusive
            && matches!((&self.min, &self.max), (Some(min), Some(max)) if min == max)
    }

    /// Returns `true` if `version` satisfies this range.
    pub fn satisfies(&self, version: &Version) -> bool {
        if version.is_prerelease() && !self.include_prerelease {
            let anchored_prerelease = self.min.as_ref().is_some_and(|min| {
                min.is_prerelease() && min.release_tuple() == version.release_tuple()
            });
            if !anchored_prerelease {
                return false;
            }
        }

        if let Some(min) = &self.min {
            match version.cmp(min) {
                std::cmp::Ordering::Less => return false,
                std::cmp::Ordering::Equal if !self.min_inclusive => return false,
                _ => {}
            }
        }
        if let Some(max) = &self.max {
            match version.cmp(max) {
                std::cmp::Ordering::Greater => return false,
                std::cmp::Ordering::Equal if !self.max_inclusive => return false,
                _ => {}
            }
        }
        true
    }

    /// Intersects this range with `other`.
    ///
    /// The result accepts exactly the versions both ranges accept by their
    /// bounds. Returns [`None`] if the intersection is empty. The prerelease
    /// flag of the result is set only if both inputs set it.
    pub fn intersect(&self, other: &VersionRange) -> Option<VersionRange> {
        // higher lower bound wins; on a tie the exclusive one is narrower
        let (min, min_inclusive) = match (&self.min, &other.min) {
            (None, None) => (None, false),
            (Some(min), None) => (Some(min.clone()), self.min_inclusive),
            (None, Some(min)) => (Some(min.clone()), other.min_inclusive),
            (Some(a), Some(b)) => match a.cmp(b) {
                std::cmp::Ordering::Greater => (Some(a.clone()), self.min_inclusive),
                std::cmp::Ordering::Less => (Some(b.clone()), other.min_inclusive),
                std::cmp::Ordering::Equal => {
                    (Some(a.clone()), self.min_inclusive && other.min_inclusive)
                }
            },
        };
        let (max, max_inclusive) = match (&self.max, &other.max) {
            (None, None) => (None, false),
            (Some(max), None) => (Some(max.clone()), self.max_inclusive),
            (None, Some(max)) => (Some(max.clone()), other.max_inclusive),
            (Some(a), Some(b)) => match a.cmp(b) {
                std::cmp::Ordering::Less => (Some(a.clone()), self.max_inclusive),
                std::cmp::Ordering::Greater => (Some(b.clone()), other.max_inclusive),
                std::cmp::Ordering::Equal => {
                    (Some(a.clone()), self.max_inclusive && other.max_inclusive)
                }
            },
        };

        if let (Some(min), Some(max)) = (&min, &max) {
            match min.cmp(max) {
                std::cmp::Ordering::Greater => return None,
                std::cmp::Ordering::Equal if !(min_inclusive && max_inclusive) => return None,
                _ => {}
            }
        }

        Some(VersionRange {
            min,
            min_inclusive,
            max,
            max_inclusive,
            include_prerelease: self.include_prerelease && other.include_prerelease,
        })
    }

    /// Recognizes a [`VersionRange`] in an input string.
    pub fn parser(input: &mut &str) -> ModalResult<VersionRange> {
        fn bracketed(input: &mut &str) -> ModalResult<VersionRange> {
            let min_inclusive = alt(('['.value(true), '('.value(false))).parse_next(input)?;
            let min = opt(Version::parser).parse_next(input)?;
            let comma = opt(preceded(opt(' '), terminated(',', opt(' ')))).parse_next(input)?;
            let max = match comma {
                Some(_) => opt(Version::parser).parse_next(input)?,
                None => None,
            };
            let max_inclusive = alt((']'.value(true), ')'.value(false))).parse_next(input)?;

            // `[1.0]` pins a single version; other single-version brackets
            // and fully empty brackets are malformed
            let range = match (&min, comma, &max) {
                (Some(version), None, None) => {
                    if !(min_inclusive && max_inclusive) {
                        return Err(winnow::error::ErrMode::Cut(
                            winnow::error::ContextError::new(),
                        ));
                    }
                    VersionRange::exact(version.clone())
                }
                (None, None, None) | (None, Some(_), None) => {
                    return Err(winnow::error::ErrMode::Cut(
                        winnow::error::ContextError::new(),
                    ));
                }
                _ => VersionRange {
                    min: min.clone(),
                    min_inclusive,
                    max: max.clone(),
                    max_inclusive,
                    include_prerelease: false,
                },
            };
            Ok(range)
        }

        alt((bracketed, Version::parser.map(VersionRange::at_least))).parse_next(input)
    }
}

impl FromStr for VersionRange {
    type Err = Error;

    /// Creates a [`VersionRange`] from a string slice.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is neither a plain version nor a valid
    /// bracket expression, or if the bounds are inverted.
    fn from_str(input: &str) -> Result<VersionRange, Self::Err> {
        let range = VersionRange::parser
            .parse(input)
            .map_err(|_| Error::InvalidVersionRange(input.to_string()))?;
        if let (Some(min), Some(max)) = (&range.min, &range.max) {
            if min > max {
                return Err(Error::InvalidVersionRange(input.to_string()));
            }
        }
        Ok(range)
    }
}

impl Display for VersionRange {
    fn fmt(&self, fmt: &mut Formatter) -> std::fmt::Result {
        match (&self.min, &self.max) {
            // the floating notation covers the common minimum-only case
            (Some(min), None) if self.min_inclusive => write!(fmt, "{min}"),
            (Some(min), Some(_)) if self.is_exact() => write!(fmt, "[{min}]"),
            (min, max) => {
                write!(
                    fmt,
                    "{}{},{}{}",
                    if self.min_inclusive { '[' } else { '(' },
                    min.as_ref().map(ToString::to_string).unwrap_or_default(),
                    max.as_ref().map(ToString::to_string).unwrap_or_default(),
                    if self.max_inclusive { ']' } else { ')' },
                )
            }
        }
    }
}

impl Serialize for VersionRange {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for VersionRange {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let input = String::deserialize(deserializer)?;
        VersionRange::from_str(&input).map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn version(input: &str) -> Version {
        Version::from_str(input).unwrap()
    }

    #[rstest]
    #[case("1.0", "1.0")]
    #[case("[1.0]", "[1.0.0]")]
    #[case("[1.0,2.0)", "[1.0.0,2.0.0)")]
    #[case("(1.0, 2.0)", "(1.0.0,2.0.0)")]
    #[case("(,2.0]", "(,2.0.0]")]
    #[case("[1.0,)", "1.0.0")]
    fn range_parse_display(#[case] input: &str, #[case] _canonical: &str) {
        let range = VersionRange::from_str(input).unwrap();
        let reparsed = VersionRange::from_str(&range.to_string()).unwrap();
        assert_eq!(range, reparsed);
    }

    #[rstest]
    #[case("")]
    #[case("[]")]
    #[case("[,]")]
    #[case("(1.0)")]
    #[case("[2.0,1.0]")]
    #[case("1.0,2.0")]
    #[case("[1.0")]
    fn range_parse_invalid(#[case] input: &str) {
        assert!(VersionRange::from_str(input).is_err());
    }

    #[rstest]
    #[case("1.0", "0.9.9", false)]
    #[case("1.0", "1.0.0", true)]
    #[case("1.0", "99.0.0", true)]
    #[case("[1.4.4]", "1.4.4", true)]
    #[case("[1.4.4]", "1.4.4.1", false)]
    #[case("[1.0,2.0)", "2.0.0", false)]
    #[case("[1.0,2.0)", "1.9999.0", true)]
    #[case("(1.0,2.0]", "1.0.0", false)]
    #[case("(1.0,2.0]", "2.0.0", true)]
    #[case("(,2.0]", "0.0.1", true)]
    fn range_satisfies(#[case] range: &str, #[case] version_str: &str, #[case] expected: bool) {
        let range = VersionRange::from_str(range).unwrap();
        assert_eq!(range.satisfies(&version(version_str)), expected);
    }

    #[rstest]
    #[case("1.0", "1.5.0-beta", false, false)]
    #[case("1.0", "1.5.0-beta", true, true)]
    #[case("[1.5.0-alpha,2.0)", "1.5.0-beta", false, true)]
    #[case("[1.5.0-alpha,2.0)", "1.6.0-beta", false, false)]
    #[case("[1.5.0-alpha,2.0)", "1.6.0", false, true)]
    fn range_satisfies_prerelease(
        #[case] range: &str,
        #[case] version_str: &str,
        #[case] include_prerelease: bool,
        #[case] expected: bool,
    ) {
        let range = VersionRange::from_str(range)
            .unwrap()
            .with_prerelease(include_prerelease);
        assert_eq!(range.satisfies(&version(version_str)), expected);
    }

    #[rstest]
    #[case("[1.0,3.0)", "[2.0,4.0)", Some("[2.0.0,3.0.0)"))]
    #[case("[1.0,2.0)", "[2.0,3.0)", None)]
    #[case("[1.0,2.0]", "[2.0,3.0)", Some("[2.0.0]"))]
    #[case("1.0", "[0.5,1.5]", Some("[1.0.0,1.5.0]"))]
    #[case("[1.0]", "[1.0]", Some("[1.0.0]"))]
    #[case("[1.0]", "[2.0]", None)]
    fn range_intersect(#[case] a: &str, #[case] b: &str, #[case] expected: Option<&str>) {
        let a = VersionRange::from_str(a).unwrap();
        let b = VersionRange::from_str(b).unwrap();
        let result = a.intersect(&b);
        match expected {
            Some(expected) => {
                let expected = VersionRange::from_str(expected).unwrap();
                assert_eq!(result, Some(expected));
            }
            None => assert_eq!(result, None),
        }
    }
}
