//! Readers for the dependency metadata shipped with a checked-out project.

use crate::error::{FixtureError, Result};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::HashMap;
use std::path::Path;

/// A direct dependency declared in `pom.xml`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PomDependency {
    pub artifact_id: String,
    pub version: Option<String>,
}

/// The parts of a POM the canonicalizer needs.
#[derive(Debug, Clone, Default)]
pub struct Pom {
    pub properties: HashMap<String, String>,
    pub dependencies: Vec<PomDependency>,
}

impl Pom {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(FixtureError::fs(path))?;
        Self::parse(path, &content)
    }

    pub fn parse(path: &Path, xml: &str) -> Result<Self> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(true);

        let mut pom = Pom::default();
        let mut stack: Vec<String> = Vec::new();
        let mut current: Option<PomDependency> = None;

        loop {
            let event = reader.read_event().map_err(|source| FixtureError::Xml {
                path: path.to_path_buf(),
                source,
            })?;
            match event {
                Event::Start(ref e) => {
                    stack.push(tag_name(e));
                    if is_direct_dependency(&stack) {
                        current = Some(PomDependency::default());
                    }
                }
                Event::Text(ref e) => {
                    let text = e.unescape().unwrap_or_default().to_string();
                    match stack.as_slice() {
                        [project, section, name] if project == "project" && section == "properties" => {
                            pom.properties.insert(name.clone(), text);
                        }
                        [project, deps, dep, field]
                            if project == "project" && deps == "dependencies" && dep == "dependency" =>
                        {
                            if let Some(ref mut dependency) = current {
                                match field.as_str() {
                                    "artifactId" => dependency.artifact_id = text,
                                    "version" => dependency.version = Some(text),
                                    _ => {}
                                }
                            }
                        }
                        _ => {}
                    }
                }
                Event::End(_) => {
                    if is_direct_dependency(&stack) {
                        if let Some(dependency) = current.take() {
                            pom.dependencies.push(dependency);
                        }
                    }
                    stack.pop();
                }
                Event::Eof => break,
                _ => {}
            }
        }

        Ok(pom)
    }

    /// Substitute `${name}` once against the `properties` block.
    ///
    /// Property values that themselves reference properties are returned as
    /// written, and unknown properties keep their literal form.
    pub fn resolve(&self, value: &str) -> String {
        match value
            .strip_prefix("${")
            .and_then(|rest| rest.strip_suffix('}'))
        {
            Some(name) => self
                .properties
                .get(name)
                .cloned()
                .unwrap_or_else(|| value.to_string()),
            None => value.to_string(),
        }
    }

    /// Direct dependencies with an explicit version, after property substitution.
    pub fn pinned_dependencies(&self) -> impl Iterator<Item = (&str, String)> + '_ {
        self.dependencies.iter().filter_map(|dependency| {
            dependency
                .version
                .as_deref()
                .map(|version| (dependency.artifact_id.as_str(), self.resolve(version)))
        })
    }
}

fn is_direct_dependency(stack: &[String]) -> bool {
    matches!(stack, [project, deps, dep] if project == "project" && deps == "dependencies" && dep == "dependency")
}

fn tag_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.local_name().as_ref()).to_string()
}

/// Every `location` attribute of `project/path/pathelement` in an ant build file.
pub fn ant_path_locations(path: &Path) -> Result<Vec<String>> {
    let content = std::fs::read_to_string(path).map_err(FixtureError::fs(path))?;
    parse_ant_path_locations(path, &content)
}

pub fn parse_ant_path_locations(path: &Path, xml: &str) -> Result<Vec<String>> {
    let mut reader = Reader::from_str(xml);
    let mut locations = Vec::new();
    let mut stack: Vec<String> = Vec::new();

    loop {
        let event = reader.read_event().map_err(|source| FixtureError::Xml {
            path: path.to_path_buf(),
            source,
        })?;
        match event {
            Event::Start(ref e) => {
                if let Some(location) = path_element_location(&stack, e) {
                    locations.push(location);
                }
                stack.push(tag_name(e));
            }
            Event::Empty(ref e) => {
                if let Some(location) = path_element_location(&stack, e) {
                    locations.push(location);
                }
            }
            Event::End(_) => {
                stack.pop();
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(locations)
}

fn path_element_location(stack: &[String], e: &BytesStart<'_>) -> Option<String> {
    let top_level_path = matches!(stack, [project, path] if project == "project" && path == "path");
    if !top_level_path || tag_name(e) != "pathelement" {
        return None;
    }
    e.attributes()
        .flatten()
        .find(|attr| attr.key.local_name().as_ref() == b"location")
        .map(|attr| String::from_utf8_lossy(&attr.value).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const POM: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<project xmlns="http://maven.apache.org/POM/4.0.0">
  <properties>
    <commons.io.version>2.4</commons.io.version>
    <chained.version>${commons.io.version}</chained.version>
  </properties>
  <dependencyManagement>
    <dependencies>
      <dependency>
        <groupId>managed</groupId>
        <artifactId>managed-only</artifactId>
        <version>9.9</version>
      </dependency>
    </dependencies>
  </dependencyManagement>
  <dependencies>
    <dependency>
      <groupId>junit</groupId>
      <artifactId>junit</artifactId>
      <version>4.11</version>
    </dependency>
    <dependency>
      <groupId>commons-io</groupId>
      <artifactId>commons-io</artifactId>
      <version>${commons.io.version}</version>
    </dependency>
    <dependency>
      <groupId>org.example</groupId>
      <artifactId>chained</artifactId>
      <version>${chained.version}</version>
    </dependency>
    <dependency>
      <groupId>org.example</groupId>
      <artifactId>unversioned</artifactId>
    </dependency>
  </dependencies>
</project>
"#;

    #[test]
    fn test_direct_dependencies_only() {
        let pom = Pom::parse(Path::new("pom.xml"), POM).unwrap();
        let artifacts: Vec<&str> = pom
            .dependencies
            .iter()
            .map(|d| d.artifact_id.as_str())
            .collect();
        assert_eq!(artifacts, vec!["junit", "commons-io", "chained", "unversioned"]);
        assert_eq!(pom.dependencies[3].version, None);
    }

    #[test]
    fn test_pinned_dependencies_resolve_one_level() {
        let pom = Pom::parse(Path::new("pom.xml"), POM).unwrap();
        let pinned: Vec<(&str, String)> = pom.pinned_dependencies().collect();
        assert_eq!(
            pinned,
            vec![
                ("junit", "4.11".to_string()),
                ("commons-io", "2.4".to_string()),
                ("chained", "${commons.io.version}".to_string()),
            ]
        );
    }

    #[test]
    fn test_unknown_property_keeps_literal() {
        let pom = Pom::default();
        assert_eq!(pom.resolve("${missing}"), "${missing}");
        assert_eq!(pom.resolve("1.0"), "1.0");
    }

    #[test]
    fn test_ant_path_locations() {
        let xml = r#"<project name="x">
  <path id="build.classpath">
    <pathelement location="${maven.repo.local}/commons-io/commons-io/2.4/commons-io-2.4.jar"/>
    <pathelement location="lib/local.jar"></pathelement>
  </path>
  <target name="compile">
    <pathelement location="ignored.jar"/>
    <path id="nested">
      <pathelement location="nested.jar"/>
    </path>
  </target>
</project>"#;
        let locations = parse_ant_path_locations(Path::new("maven-build.xml"), xml).unwrap();
        assert_eq!(
            locations,
            vec![
                "${maven.repo.local}/commons-io/commons-io/2.4/commons-io-2.4.jar".to_string(),
                "lib/local.jar".to_string(),
            ]
        );
    }

    #[test]
    fn test_malformed_xml_is_an_error() {
        let err = Pom::parse(Path::new("pom.xml"), "<project><a></b></project>").unwrap_err();
        assert!(matches!(err, FixtureError::Xml { .. }));
    }
}
