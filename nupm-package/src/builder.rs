//! Package archive creation.

use std::io::{Cursor, Write};

use nupm_types::{DependencyGroup, PackageIdentity, Version};
use zip::{ZipWriter, write::SimpleFileOptions};

use crate::{Error, Nuspec};

/// A builder for minimal package archives.
///
/// Produces a zip container with a nuspec document at the root and arbitrary
/// content entries. Feeds serve the produced bytes as-is; the test suites of
/// the higher-level crates use the builder to fabricate packages.
///
/// ## Examples
/// ```
/// use std::str::FromStr;
///
/// use nupm_package::{PackageArchive, PackageBuilder};
/// use nupm_types::{PackageId, PackageIdentity, Version};
///
/// let identity = PackageIdentity::new(
///     PackageId::from_str("Demo").unwrap(),
///     Version::from_str("1.0.0").unwrap(),
/// );
/// let bytes = PackageBuilder::new(identity)
///     .file("lib/net45/Demo.dll", b"binary")
///     .build()
///     .unwrap();
/// assert!(PackageArchive::from_bytes(bytes).is_ok());
/// ```
#[derive(Debug)]
pub struct PackageBuilder {
    nuspec: Nuspec,
    files: Vec<(String, Vec<u8>)>,
}

impl PackageBuilder {
    /// Creates a builder for a package with the given identity.
    pub fn new(identity: PackageIdentity) -> Self {
        PackageBuilder {
            nuspec: Nuspec::new(identity),
            files: Vec::new(),
        }
    }

    /// Sets the minimum client version the package requires.
    pub fn min_client_version(mut self, version: Version) -> Self {
        self.nuspec.min_client_version = Some(version);
        self
    }

    /// Declares a package type.
    pub fn package_type(mut self, name: &str) -> Self {
        self.nuspec.package_types.push(name.to_string());
        self
    }

    /// Adds a dependency group.
    pub fn dependency_group(mut self, group: DependencyGroup) -> Self {
        self.nuspec.dependency_groups.push(group);
        self
    }

    /// Adds a content entry.
    pub fn file(mut self, name: &str, bytes: &[u8]) -> Self {
        self.files.push((name.to_string(), bytes.to_vec()));
        self
    }

    /// Builds the archive and returns its bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if writing the zip container fails.
    pub fn build(self) -> Result<Vec<u8>, Error> {
        let archive_error = |source: zip::result::ZipError| Error::Archive {
            context: "writing a package archive",
            source,
        };
        let io_error = |source: std::io::Error| Error::IoPath {
            path: self.nuspec.file_name().into(),
            context: "writing a package archive entry",
            source,
        };

        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        writer
            .start_file(self.nuspec.file_name(), SimpleFileOptions::default())
            .map_err(archive_error)?;
        writer
            .write_all(self.nuspec.render().as_bytes())
            .map_err(io_error)?;

        for (name, bytes) in &self.files {
            writer
                .start_file(name.as_str(), SimpleFileOptions::default())
                .map_err(archive_error)?;
            writer.write_all(bytes).map_err(io_error)?;
        }

        let cursor = writer.finish().map_err(archive_error)?;
        Ok(cursor.into_inner())
    }
}
