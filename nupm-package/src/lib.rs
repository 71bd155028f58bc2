#![doc = include_str!("../README.md")]
#![forbid(unsafe_code)]

use nupm_types::Version;

mod archive;
pub use archive::{PackageArchive, README_FILE_NAME};

mod builder;
pub use builder::PackageBuilder;

mod error;
pub use error::Error;

mod nuspec;
pub use nuspec::Nuspec;

/// Returns the client version this implementation advertises.
///
/// Packages declaring a higher `minClientVersion` are refused before any
/// mutation happens.
pub fn client_version() -> Version {
    Version::new(3, 5, 0)
}
