//! The `packages.config` file format.

use std::{
    fs,
    io::Write,
    path::Path,
    str::FromStr,
};

use log::debug;
use nupm_types::{
    FrameworkName,
    PackageId,
    PackageIdentity,
    Version,
    VersionRange,
};
use quick_xml::{
    Reader,
    Writer,
    events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event},
};

use crate::{Error, PackageReference};

/// Appends `reference`, refusing a second entry for the same id.
fn push_reference(
    references: &mut Vec<PackageReference>,
    reference: PackageReference,
) -> Result<(), Error> {
    if references
        .iter()
        .any(|existing| existing.identity.id == reference.identity.id)
    {
        return Err(Error::DuplicateReference {
            id: reference.identity.id,
        });
    }
    references.push(reference);
    Ok(())
}

/// An ordered `packages.config` manifest.
///
/// The element order is significant: after a successful apply it is the
/// dependency order of the project. No two references may share a package id.
///
/// ## Examples
/// ```
/// use nupm_manifest::PackagesConfig;
///
/// let xml = r#"<?xml version="1.0" encoding="utf-8"?>
/// <packages>
///   <package id="jQuery" version="1.4.4" targetFramework="net45" />
/// </packages>"#;
///
/// let manifest = PackagesConfig::parse_str(xml, "packages.config").unwrap();
/// assert_eq!(manifest.references().len(), 1);
/// assert_eq!(manifest.references()[0].identity.to_string(), "jQuery/1.4.4");
/// ```
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct PackagesConfig {
    references: Vec<PackageReference>,
}

impl PackagesConfig {
    /// Creates an empty manifest.
    pub fn new() -> Self {
        PackagesConfig::default()
    }

    /// Loads the manifest at `path`, or an empty one if the file is missing.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(PackagesConfig::new());
        }
        let content = fs::read_to_string(path).map_err(|source| Error::IoPath {
            path: path.to_path_buf(),
            context: "reading the manifest",
            source,
        })?;
        Self::parse_str(&content, path)
    }

    /// Parses a manifest from a string.
    ///
    /// `path` is only used for error reporting.
    ///
    /// # Errors
    ///
    /// Returns an error if the XML is malformed, a `<package>` element lacks
    /// an `id` or `version` attribute, an owned attribute has an invalid
    /// value, or two elements share a package id. No partial parse is
    /// returned.
    pub fn parse_str(content: &str, path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let parse_error = |reason: String| Error::Parse {
            path: path.to_path_buf(),
            reason,
        };

        let mut reader = Reader::from_str(content);
        reader.config_mut().trim_text(true);

        let mut references: Vec<PackageReference> = Vec::new();
        let mut inside_packages = false;
        let mut saw_packages = false;
        loop {
            let event = reader.read_event().map_err(|e| parse_error(e.to_string()))?;
            match event {
                Event::Start(element) if element.name().as_ref() == b"packages" => {
                    inside_packages = true;
                    saw_packages = true;
                }
                Event::Empty(element) if element.name().as_ref() == b"packages" => {
                    saw_packages = true;
                }
                Event::End(element) if element.name().as_ref() == b"packages" => {
                    inside_packages = false;
                }
                Event::Start(element)
                    if element.name().as_ref() == b"package" && inside_packages =>
                {
                    let mut reference = parse_package_element(&element, path)?;
                    let children = reader
                        .read_text(element.name())
                        .map_err(|e| parse_error(e.to_string()))?;
                    let children = children.trim();
                    if !children.is_empty() {
                        reference.children_xml = Some(children.to_string());
                    }
                    push_reference(&mut references, reference)?;
                }
                Event::Empty(element)
                    if element.name().as_ref() == b"package" && inside_packages =>
                {
                    let reference = parse_package_element(&element, path)?;
                    push_reference(&mut references, reference)?;
                }
                Event::Start(element) | Event::Empty(element) => {
                    return Err(parse_error(format!(
                        "unexpected element <{}>",
                        String::from_utf8_lossy(element.name().as_ref()),
                    )));
                }
                Event::End(_) => {}
                Event::Eof => {
                    if inside_packages {
                        return Err(parse_error("unclosed <packages> element".to_string()));
                    }
                    break;
                }
                // declarations, comments, whitespace and other markup
                _ => {}
            }
        }
        if !saw_packages {
            return Err(parse_error("missing <packages> root element".to_string()));
        }

        Ok(PackagesConfig { references })
    }

    /// Returns the references in manifest order.
    pub fn references(&self) -> &[PackageReference] {
        &self.references
    }

    /// Returns the reference for `id`, if present.
    pub fn find(&self, id: &PackageId) -> Option<&PackageReference> {
        self.references
            .iter()
            .find(|reference| &reference.identity.id == id)
    }

    /// Returns `true` if a reference for `id` exists.
    pub fn contains(&self, id: &PackageId) -> bool {
        self.find(id).is_some()
    }

    /// Returns the number of references.
    pub fn len(&self) -> usize {
        self.references.len()
    }

    /// Returns `true` if the manifest has no references.
    pub fn is_empty(&self) -> bool {
        self.references.is_empty()
    }

    /// Appends a reference.
    ///
    /// # Errors
    ///
    /// Returns an error if a reference with the same id already exists.
    pub fn add(&mut self, reference: PackageReference) -> Result<(), Error> {
        if self.contains(&reference.identity.id) {
            return Err(Error::DuplicateReference {
                id: reference.identity.id,
            });
        }
        self.references.push(reference);
        Ok(())
    }

    /// Removes and returns the reference for `id`, if present.
    pub fn remove(&mut self, id: &PackageId) -> Option<PackageReference> {
        let position = self
            .references
            .iter()
            .position(|reference| &reference.identity.id == id)?;
        Some(self.references.remove(position))
    }

    /// Renders the manifest as an XML document.
    pub fn render(&self) -> String {
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
        // the writer only fails on I/O and Vec<u8> cannot fail
        let _ = writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)));
        let _ = writer.write_event(Event::Start(BytesStart::new("packages")));
        for reference in &self.references {
            let mut element = BytesStart::new("package");
            element.push_attribute(("id", reference.identity.id.inner()));
            element.push_attribute(("version", reference.identity.version.normalized().as_str()));
            if let Some(framework) = &reference.target_framework {
                element.push_attribute(("targetFramework", framework.to_string().as_str()));
            }
            if let Some(allowed) = &reference.allowed_versions {
                element.push_attribute(("allowedVersions", allowed.to_string().as_str()));
            }
            if reference.development_dependency {
                element.push_attribute(("developmentDependency", "true"));
            }
            for (key, value) in &reference.extra {
                element.push_attribute((key.as_str(), value.as_str()));
            }
            match &reference.children_xml {
                None => {
                    let _ = writer.write_event(Event::Empty(element));
                }
                Some(children) => {
                    let _ = writer.write_event(Event::Start(element));
                    let _ = writer
                        .write_event(Event::Text(BytesText::from_escaped(children.as_str())));
                    let _ = writer.write_event(Event::End(BytesEnd::new("package")));
                }
            }
        }
        let _ = writer.write_event(Event::End(BytesEnd::new("packages")));
        let mut rendered = writer.into_inner();
        rendered.push(b'\n');
        String::from_utf8(rendered).expect("rendered XML is valid UTF-8")
    }

    /// Writes the manifest to `path` atomically.
    ///
    /// The document is written to a temporary file in the manifest's
    /// directory and renamed into place, so concurrent readers observe either
    /// the previous or the new content.
    ///
    /// # Errors
    ///
    /// Returns an error if the temporary file cannot be created, written or
    /// renamed.
    pub fn write_to(&self, path: impl AsRef<Path>) -> Result<(), Error> {
        let path = path.as_ref();
        let parent = path.parent().map(Path::to_path_buf).unwrap_or_default();
        let io_error = |context: &'static str| {
            move |source: std::io::Error| Error::IoPath {
                path: path.to_path_buf(),
                context,
                source,
            }
        };

        let mut temp_file = tempfile::NamedTempFile::new_in(&parent)
            .map_err(io_error("creating a temporary manifest"))?;
        temp_file
            .write_all(self.render().as_bytes())
            .map_err(io_error("writing the manifest"))?;
        temp_file
            .persist(path)
            .map_err(|persist_error| Error::IoPath {
                path: path.to_path_buf(),
                context: "replacing the manifest",
                source: persist_error.error,
            })?;
        debug!("wrote manifest with {} references to {path:?}", self.len());
        Ok(())
    }
}

/// Parses the attributes of one `<package>` element.
fn parse_package_element(
    element: &BytesStart,
    path: &Path,
) -> Result<PackageReference, Error> {
    let mut id: Option<PackageId> = None;
    let mut version: Option<Version> = None;
    let mut target_framework: Option<FrameworkName> = None;
    let mut allowed_versions: Option<VersionRange> = None;
    let mut development_dependency = false;
    let mut extra: Vec<(String, String)> = Vec::new();

    for attribute in element.attributes() {
        let attribute = attribute.map_err(|e| Error::Parse {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let key = String::from_utf8_lossy(attribute.key.as_ref()).to_string();
        let value = attribute
            .unescape_value()
            .map_err(|e| Error::Parse {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?
            .to_string();
        match key.as_str() {
            "id" => id = Some(PackageId::from_str(&value)?),
            "version" => version = Some(Version::from_str(&value)?),
            "targetFramework" => target_framework = Some(FrameworkName::from_str(&value)?),
            "allowedVersions" => allowed_versions = Some(VersionRange::from_str(&value)?),
            "developmentDependency" => {
                development_dependency = value.eq_ignore_ascii_case("true");
            }
            _ => extra.push((key, value)),
        }
    }

    let id = id.ok_or(Error::MissingAttribute {
        path: path.to_path_buf(),
        attribute: "id",
    })?;
    let version = version.ok_or(Error::MissingAttribute {
        path: path.to_path_buf(),
        attribute: "version",
    })?;

    Ok(PackageReference {
        identity: PackageIdentity::new(id, version),
        target_framework,
        allowed_versions,
        development_dependency,
        extra,
        children_xml: None,
    })
}
