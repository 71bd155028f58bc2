//! The nuspec metadata document.

use std::str::FromStr;

use nupm_types::{
    DependencyGroup,
    FrameworkName,
    PackageDependency,
    PackageId,
    PackageIdentity,
    Version,
    VersionRange,
    select_dependency_group,
};
use quick_xml::{
    Reader,
    Writer,
    events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event},
};

use crate::Error;

/// The package type every client understands.
const DEPENDENCY_PACKAGE_TYPE: &str = "Dependency";

/// The declarative metadata document at the root of a package archive.
///
/// ## Examples
/// ```
/// use nupm_package::Nuspec;
///
/// let xml = r#"<package>
///   <metadata>
///     <id>jQuery.Validation</id>
///     <version>1.13.1</version>
///     <dependencies>
///       <dependency id="jQuery" version="[1.4.4]" />
///     </dependencies>
///   </metadata>
/// </package>"#;
///
/// let nuspec = Nuspec::parse_str(xml).unwrap();
/// assert_eq!(nuspec.identity.to_string(), "jQuery.Validation/1.13.1");
/// assert_eq!(nuspec.dependency_groups.len(), 1);
/// ```
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Nuspec {
    /// The identity the package declares.
    pub identity: PackageIdentity,
    /// The minimum client version required to install the package.
    pub min_client_version: Option<Version>,
    /// The declared package types; empty means a plain dependency package.
    pub package_types: Vec<String>,
    /// The declared dependencies, one group per target framework.
    pub dependency_groups: Vec<DependencyGroup>,
}

impl Nuspec {
    /// Creates a nuspec declaring only an identity.
    pub fn new(identity: PackageIdentity) -> Self {
        Nuspec {
            identity,
            min_client_version: None,
            package_types: Vec::new(),
            dependency_groups: Vec::new(),
        }
    }

    /// Returns the file name of this document inside an archive.
    pub fn file_name(&self) -> String {
        format!("{}.nuspec", self.identity.id)
    }

    /// Returns the dependencies applying to a project framework.
    pub fn dependencies_for(&self, project: &FrameworkName) -> Vec<PackageDependency> {
        select_dependency_group(&self.dependency_groups, project)
            .map(|group| group.dependencies.clone())
            .unwrap_or_default()
    }

    /// Returns the first declared package type this implementation does not
    /// understand, if any.
    pub fn unsupported_package_type(&self) -> Option<&str> {
        self.package_types
            .iter()
            .map(String::as_str)
            .find(|name| !name.eq_ignore_ascii_case(DEPENDENCY_PACKAGE_TYPE))
    }

    /// Parses a nuspec document from a string.
    ///
    /// Both the flat `<dependencies><dependency/></dependencies>` form and
    /// the grouped `<group targetFramework="...">` form are accepted; a flat
    /// list becomes the fallback group.
    ///
    /// # Errors
    ///
    /// Returns an error if the XML is malformed or the mandatory `id` and
    /// `version` elements are missing or invalid.
    pub fn parse_str(content: &str) -> Result<Self, Error> {
        let parse_error = |reason: String| Error::NuspecParse { reason };

        let mut reader = Reader::from_str(content);
        reader.config_mut().trim_text(true);

        let mut id: Option<PackageId> = None;
        let mut version: Option<Version> = None;
        let mut min_client_version: Option<Version> = None;
        let mut package_types: Vec<String> = Vec::new();
        let mut groups: Vec<DependencyGroup> = Vec::new();
        let mut flat_dependencies: Vec<PackageDependency> = Vec::new();

        // the element path from the document root to the current position
        let mut path: Vec<String> = Vec::new();
        let mut current_group: Option<DependencyGroup> = None;

        loop {
            let event = reader.read_event().map_err(|e| parse_error(e.to_string()))?;
            match event {
                Event::Start(element) => {
                    let name = local_name(&element);
                    match (path_key(&path), name.as_str()) {
                        ("package", "metadata") => {
                            min_client_version = attribute(&element, "minClientVersion")?
                                .map(|value| Version::from_str(&value))
                                .transpose()?;
                        }
                        ("package/metadata/dependencies", "group") => {
                            let framework = attribute(&element, "targetFramework")?
                                .map(|value| FrameworkName::from_str(&value))
                                .transpose()?;
                            current_group = Some(DependencyGroup::new(framework, Vec::new()));
                        }
                        _ => {}
                    }
                    path.push(name);
                }
                Event::Empty(element) => {
                    let name = local_name(&element);
                    match (path_key(&path), name.as_str()) {
                        ("package/metadata/dependencies", "dependency") => {
                            flat_dependencies.push(parse_dependency(&element)?);
                        }
                        ("package/metadata/dependencies", "group") => {
                            let framework = attribute(&element, "targetFramework")?
                                .map(|value| FrameworkName::from_str(&value))
                                .transpose()?;
                            groups.push(DependencyGroup::new(framework, Vec::new()));
                        }
                        ("package/metadata/dependencies/group", "dependency") => {
                            if let Some(group) = current_group.as_mut() {
                                group.dependencies.push(parse_dependency(&element)?);
                            }
                        }
                        ("package/metadata/packageTypes", "packageType") => {
                            if let Some(name) = attribute(&element, "name")? {
                                package_types.push(name);
                            }
                        }
                        _ => {}
                    }
                }
                Event::Text(text) => {
                    let value = text
                        .unescape()
                        .map_err(|e| parse_error(e.to_string()))?
                        .to_string();
                    match path_key(&path) {
                        "package/metadata/id" => id = Some(PackageId::from_str(value.trim())?),
                        "package/metadata/version" => {
                            version = Some(Version::from_str(value.trim())?);
                        }
                        _ => {}
                    }
                }
                Event::End(element) => {
                    let name = String::from_utf8_lossy(element.local_name().as_ref()).to_string();
                    if name == "group" && path_key(&path) == "package/metadata/dependencies/group" {
                        if let Some(group) = current_group.take() {
                            groups.push(group);
                        }
                    }
                    path.pop();
                }
                Event::Eof => break,
                _ => {}
            }
        }

        let id = id.ok_or_else(|| parse_error("missing <id> element".to_string()))?;
        let version =
            version.ok_or_else(|| parse_error("missing <version> element".to_string()))?;

        if !flat_dependencies.is_empty() {
            groups.push(DependencyGroup::new(None, flat_dependencies));
        }

        Ok(Nuspec {
            identity: PackageIdentity::new(id, version),
            min_client_version,
            package_types,
            dependency_groups: groups,
        })
    }

    /// Renders the document as XML.
    pub fn render(&self) -> String {
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
        let _ = writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)));
        let _ = writer.write_event(Event::Start(BytesStart::new("package")));

        let mut metadata = BytesStart::new("metadata");
        if let Some(min_client) = &self.min_client_version {
            metadata.push_attribute(("minClientVersion", min_client.to_string().as_str()));
        }
        let _ = writer.write_event(Event::Start(metadata));

        write_text_element(&mut writer, "id", self.identity.id.inner());
        write_text_element(&mut writer, "version", &self.identity.version.normalized());

        if !self.package_types.is_empty() {
            let _ = writer.write_event(Event::Start(BytesStart::new("packageTypes")));
            for package_type in &self.package_types {
                let mut element = BytesStart::new("packageType");
                element.push_attribute(("name", package_type.as_str()));
                let _ = writer.write_event(Event::Empty(element));
            }
            let _ = writer.write_event(Event::End(BytesEnd::new("packageTypes")));
        }

        if !self.dependency_groups.is_empty() {
            let _ = writer.write_event(Event::Start(BytesStart::new("dependencies")));
            for group in &self.dependency_groups {
                let mut element = BytesStart::new("group");
                if let Some(framework) = &group.target_framework {
                    element.push_attribute(("targetFramework", framework.to_string().as_str()));
                }
                let _ = writer.write_event(Event::Start(element));
                for dependency in &group.dependencies {
                    let mut element = BytesStart::new("dependency");
                    element.push_attribute(("id", dependency.id.inner()));
                    element.push_attribute(("version", dependency.range.to_string().as_str()));
                    let _ = writer.write_event(Event::Empty(element));
                }
                let _ = writer.write_event(Event::End(BytesEnd::new("group")));
            }
            let _ = writer.write_event(Event::End(BytesEnd::new("dependencies")));
        }

        let _ = writer.write_event(Event::End(BytesEnd::new("metadata")));
        let _ = writer.write_event(Event::End(BytesEnd::new("package")));
        let mut rendered = writer.into_inner();
        rendered.push(b'\n');
        String::from_utf8(rendered).expect("rendered XML is valid UTF-8")
    }
}

fn local_name(element: &BytesStart) -> String {
    String::from_utf8_lossy(element.local_name().as_ref()).to_string()
}

fn path_key(path: &[String]) -> &str {
    // only shallow paths are inspected, so a joined key would allocate for
    // nothing; compare against the small fixed set instead
    match path.len() {
        1 if path[0] == "package" => "package",
        2 if path[0] == "package" && path[1] == "metadata" => "package/metadata",
        3 if path[1] == "metadata" && path[2] == "id" => "package/metadata/id",
        3 if path[1] == "metadata" && path[2] == "version" => "package/metadata/version",
        3 if path[1] == "metadata" && path[2] == "dependencies" => {
            "package/metadata/dependencies"
        }
        3 if path[1] == "metadata" && path[2] == "packageTypes" => {
            "package/metadata/packageTypes"
        }
        4 if path[2] == "dependencies" && path[3] == "group" => {
            "package/metadata/dependencies/group"
        }
        _ => "",
    }
}

fn attribute(element: &BytesStart, name: &str) -> Result<Option<String>, Error> {
    for attribute in element.attributes() {
        let attribute = attribute.map_err(|e| Error::NuspecParse {
            reason: e.to_string(),
        })?;
        if attribute.key.local_name().as_ref() == name.as_bytes() {
            let value = attribute.unescape_value().map_err(|e| Error::NuspecParse {
                reason: e.to_string(),
            })?;
            return Ok(Some(value.to_string()));
        }
    }
    Ok(None)
}

fn parse_dependency(element: &BytesStart) -> Result<PackageDependency, Error> {
    let id = attribute(element, "id")?.ok_or_else(|| Error::NuspecParse {
        reason: "<dependency> element without an id attribute".to_string(),
    })?;
    let range = attribute(element, "version")?
        .map(|value| VersionRange::from_str(&value))
        .transpose()?
        .unwrap_or_else(VersionRange::any);
    Ok(PackageDependency::new(PackageId::from_str(&id)?, range))
}

fn write_text_element(writer: &mut Writer<Vec<u8>>, name: &str, text: &str) {
    let _ = writer.write_event(Event::Start(BytesStart::new(name)));
    let _ = writer.write_event(Event::Text(BytesText::new(text)));
    let _ = writer.write_event(Event::End(BytesEnd::new(name)));
}
