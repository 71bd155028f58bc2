//! Package archive reading and extraction.

use std::{
    collections::BTreeMap,
    fs,
    io::{Cursor, Read},
    path::{Path, PathBuf},
    str::FromStr,
};

use log::debug;
use nupm_types::{FrameworkName, PackageIdentity};
use zip::ZipArchive;

use crate::{Error, Nuspec};

/// The file name of the optional readme surfaced on direct installs.
pub const README_FILE_NAME: &str = "ReadMe.txt";

/// A readable package archive.
///
/// The archive holds its bytes in memory, which gives random access to the
/// nuspec and the content entries regardless of where the bytes came from.
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
/// let bytes = PackageBuilder::new(identity.clone())
///     .file("lib/net45/Demo.dll", b"binary")
///     .build()
///     .unwrap();
///
/// let archive = PackageArchive::from_bytes(bytes).unwrap();
/// assert_eq!(archive.identity(), &identity);
/// ```
#[derive(Debug)]
pub struct PackageArchive {
    bytes: Vec<u8>,
    nuspec: Nuspec,
    entries: Vec<String>,
}

impl PackageArchive {
    /// Opens the package archive at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not a valid package
    /// archive.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(|source| Error::IoPath {
            path: path.to_path_buf(),
            context: "reading a package archive",
            source,
        })?;
        Self::from_bytes(bytes)
    }

    /// Opens a package archive from its raw bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes are not a zip container or no nuspec
    /// document exists at the archive root.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, Error> {
        let mut zip = ZipArchive::new(Cursor::new(&bytes)).map_err(|source| Error::Archive {
            context: "opening a package archive",
            source,
        })?;

        let entries: Vec<String> = (0..zip.len())
            .filter_map(|index| zip.name_for_index(index).map(str::to_string))
            .collect();

        let nuspec_entry = entries
            .iter()
            .find(|name| !name.contains('/') && name.to_ascii_lowercase().ends_with(".nuspec"))
            .cloned()
            .ok_or(Error::MissingNuspec)?;

        let mut content = String::new();
        zip.by_name(&nuspec_entry)
            .map_err(|source| Error::Archive {
                context: "locating the nuspec document",
                source,
            })?
            .read_to_string(&mut content)
            .map_err(|source| Error::IoPath {
                path: PathBuf::from(&nuspec_entry),
                context: "reading the nuspec document",
                source,
            })?;
        let nuspec = Nuspec::parse_str(&content)?;

        Ok(PackageArchive {
            bytes,
            nuspec,
            entries,
        })
    }

    /// Returns the parsed nuspec document.
    pub fn nuspec(&self) -> &Nuspec {
        &self.nuspec
    }

    /// Returns the identity the package declares.
    pub fn identity(&self) -> &PackageIdentity {
        &self.nuspec.identity
    }

    /// Returns the names of all entries in the archive.
    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    /// Returns `true` if the package carries framework-partitioned content.
    pub fn has_framework_content(&self) -> bool {
        self.entries
            .iter()
            .any(|entry| entry.starts_with("lib/") || entry.starts_with("ref/"))
    }

    /// Returns the content entries compatible with a project framework.
    ///
    /// The entries under `lib/<framework>/` and `ref/<framework>/` are
    /// partitioned by their folder framework; the folder best matching
    /// `project` is selected. Entries directly under `lib/` or `ref/` count
    /// as framework-agnostic content.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoCompatibleItems`] if the package has
    /// framework-partitioned content but none of it is compatible with
    /// `project`. A package without such content yields an empty list.
    pub fn items_for(&self, project: &FrameworkName) -> Result<Vec<String>, Error> {
        if !self.has_framework_content() {
            return Ok(Vec::new());
        }

        // folder framework -> entries below it; the agnostic folder is ANY
        let mut folders: BTreeMap<FrameworkName, Vec<String>> = BTreeMap::new();
        for entry in &self.entries {
            let mut parts = entry.splitn(3, '/');
            let root = parts.next().unwrap_or_default();
            if root != "lib" && root != "ref" {
                continue;
            }
            match (parts.next(), parts.next()) {
                (Some(file), None) if !file.is_empty() => {
                    folders.entry(FrameworkName::ANY).or_default().push(entry.clone());
                }
                (Some(folder), Some(file)) if !file.is_empty() => {
                    // unparsable folder names hold content for frameworks
                    // this implementation does not know; skip them
                    if let Ok(framework) = FrameworkName::from_str(folder) {
                        folders.entry(framework).or_default().push(entry.clone());
                    }
                }
                _ => {}
            }
        }

        let frameworks: Vec<FrameworkName> = folders.keys().copied().collect();
        let best = project
            .best_match(&frameworks)
            .ok_or_else(|| Error::NoCompatibleItems {
                identity: self.identity().clone(),
                framework: *project,
            })?;
        debug!(
            "selected {best} assets of {} for a {project} project",
            self.identity(),
        );
        Ok(folders.remove(best).unwrap_or_default())
    }

    /// Returns the archive-relative path of the root readme, if present.
    pub fn readme(&self) -> Option<&str> {
        self.entries
            .iter()
            .map(String::as_str)
            .find(|entry| entry.eq_ignore_ascii_case(README_FILE_NAME))
    }

    /// Extracts every entry of the archive below `target`.
    ///
    /// Existing files are overwritten; extraction of the same archive to the
    /// same directory is idempotent.
    ///
    /// # Errors
    ///
    /// Returns an error if an entry escapes `target` or a file cannot be
    /// written.
    pub fn extract_to(&self, target: impl AsRef<Path>) -> Result<(), Error> {
        let target = target.as_ref();
        let mut zip =
            ZipArchive::new(Cursor::new(&self.bytes)).map_err(|source| Error::Archive {
                context: "opening a package archive",
                source,
            })?;

        for index in 0..zip.len() {
            let mut entry = zip.by_index(index).map_err(|source| Error::Archive {
                context: "reading an archive entry",
                source,
            })?;
            if entry.is_dir() {
                continue;
            }
            let relative = entry.enclosed_name().ok_or_else(|| Error::IoPath {
                path: PathBuf::from(entry.name()),
                context: "validating an archive entry path",
                source: std::io::Error::other("entry escapes the extraction directory"),
            })?;
            let destination = target.join(relative);
            if let Some(parent) = destination.parent() {
                fs::create_dir_all(parent).map_err(|source| Error::IoPath {
                    path: parent.to_path_buf(),
                    context: "creating an extraction directory",
                    source,
                })?;
            }
            let mut file =
                fs::File::create(&destination).map_err(|source| Error::IoPath {
                    path: destination.clone(),
                    context: "creating an extracted file",
                    source,
                })?;
            std::io::copy(&mut entry, &mut file).map_err(|source| Error::IoPath {
                path: destination.clone(),
                context: "writing an extracted file",
                source,
            })?;
        }
        debug!("extracted {} to {target:?}", self.identity());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use nupm_types::{PackageId, Version};
    use testresult::TestResult;

    use super::*;
    use crate::PackageBuilder;

    fn identity(id: &str, version: &str) -> PackageIdentity {
        PackageIdentity::new(
            PackageId::from_str(id).unwrap(),
            Version::from_str(version).unwrap(),
        )
    }

    #[test]
    fn open_reads_nuspec_and_entries() -> TestResult {
        let bytes = PackageBuilder::new(identity("Demo", "1.2.3"))
            .file("lib/net45/Demo.dll", b"binary")
            .file("content/readme.md", b"docs")
            .build()?;
        let archive = PackageArchive::from_bytes(bytes)?;
        assert_eq!(archive.identity(), &identity("Demo", "1.2.3"));
        assert!(archive.entries().contains(&"lib/net45/Demo.dll".to_string()));
        Ok(())
    }

    #[test]
    fn missing_nuspec_is_rejected() {
        // a zip with no nuspec at the root
        let bytes = {
            use std::io::Write;
            let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
            writer
                .start_file("lib/net45/Demo.dll", zip::write::SimpleFileOptions::default())
                .unwrap();
            writer.write_all(b"binary").unwrap();
            writer.finish().unwrap().into_inner()
        };
        assert!(matches!(
            PackageArchive::from_bytes(bytes),
            Err(Error::MissingNuspec),
        ));
    }

    #[test]
    fn items_for_picks_best_framework_folder() -> TestResult {
        let bytes = PackageBuilder::new(identity("Demo", "1.0.0"))
            .file("lib/net40/Demo.dll", b"a")
            .file("lib/net45/Demo.dll", b"b")
            .file("lib/netstandard2.0/Demo.dll", b"c")
            .build()?;
        let archive = PackageArchive::from_bytes(bytes)?;

        let net472 = FrameworkName::from_str("net472")?;
        assert_eq!(
            archive.items_for(&net472)?,
            vec!["lib/net45/Demo.dll".to_string()],
        );
        Ok(())
    }

    #[test]
    fn items_for_fails_without_compatible_folder() -> TestResult {
        let bytes = PackageBuilder::new(identity("Demo", "1.0.0"))
            .file("lib/net45/Demo.dll", b"a")
            .build()?;
        let archive = PackageArchive::from_bytes(bytes)?;

        let net40 = FrameworkName::from_str("net40")?;
        assert!(matches!(
            archive.items_for(&net40),
            Err(Error::NoCompatibleItems { .. }),
        ));
        Ok(())
    }

    #[test]
    fn items_for_accepts_content_free_packages() -> TestResult {
        let bytes = PackageBuilder::new(identity("Demo", "1.0.0"))
            .file("content/site.css", b"css")
            .build()?;
        let archive = PackageArchive::from_bytes(bytes)?;

        let net40 = FrameworkName::from_str("net40")?;
        assert_eq!(archive.items_for(&net40)?, Vec::<String>::new());
        Ok(())
    }

    #[test]
    fn readme_is_detected_at_root_only() -> TestResult {
        let with_readme = PackageBuilder::new(identity("Demo", "1.0.0"))
            .file(README_FILE_NAME, b"hello")
            .build()?;
        let archive = PackageArchive::from_bytes(with_readme)?;
        assert_eq!(archive.readme(), Some(README_FILE_NAME));

        let nested = PackageBuilder::new(identity("Demo", "1.0.0"))
            .file("docs/ReadMe.txt", b"hello")
            .build()?;
        let archive = PackageArchive::from_bytes(nested)?;
        assert_eq!(archive.readme(), None);
        Ok(())
    }

    #[test]
    fn extract_is_idempotent() -> TestResult {
        let bytes = PackageBuilder::new(identity("Demo", "1.0.0"))
            .file("lib/net45/Demo.dll", b"binary")
            .build()?;
        let archive = PackageArchive::from_bytes(bytes)?;

        let dir = tempfile::tempdir()?;
        archive.extract_to(dir.path())?;
        archive.extract_to(dir.path())?;
        assert!(dir.path().join("lib/net45/Demo.dll").exists());
        assert!(dir.path().join("Demo.nuspec").exists());
        Ok(())
    }
}
