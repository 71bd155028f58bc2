//! Error handling for nupm-types.

/// The error that can occur when working with package management types.
#[derive(Debug, PartialEq, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// An invalid package id.
    #[error("Invalid package id: {0}")]
    InvalidPackageId(String),

    /// A winnow parser for a type didn't work and produced an error.
    #[error("Parser error: {0}")]
    ParseError(String),

    /// An invalid version range.
    #[error("Invalid version range: {0}")]
    InvalidVersionRange(String),

    /// An unknown target framework moniker.
    #[error("Unknown target framework moniker: {0}")]
    UnknownFramework(String),
}
