//! Reading manifests into [`ManifestNode`] trees.
//!
//! A manifest is a YAML mapping over a closed set of fields. Each entry of
//! `dependencies` and `development-dependencies` is either an inline mapping
//! or a string:
//!
//! - `path/to/x.yaml` loads that manifest file (it must exist)
//! - `path/to/dir` loads `dir/.bom.yaml` when present, and otherwise means
//!   `{root: path/to/dir}`
//!
//! Paths in an entry are relative to the root directory of the node that
//! declares it.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_yaml::{Mapping, Sequence, Value};
use tracing::debug;

use crate::error::BomError;
use crate::manifest::node::{parent_dir, ManifestNode};
use crate::manifest::position::{Location, PositionIndex};
use crate::models::SourcePosition;
use crate::path_util::normalize;

pub const MANIFEST_FILE_NAME: &str = ".bom.yaml";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Shape {
    String,
    Boolean,
    Strings,
    Entries,
}

impl Shape {
    fn expected(self) -> &'static str {
        match self {
            Shape::String => "string",
            Shape::Boolean => "boolean",
            Shape::Strings | Shape::Entries => "sequence",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Name,
    Root,
    Origin,
    RootMatchesOrigin,
    License,
    LicenseFile,
    Files,
    CopyrightHolders,
    Licensees,
    PotentialLicenseConflicts,
    Dependencies,
    DevelopmentDependencies,
}

impl Field {
    const ALL: [Field; 12] = [
        Field::Name,
        Field::Root,
        Field::Origin,
        Field::RootMatchesOrigin,
        Field::License,
        Field::LicenseFile,
        Field::Files,
        Field::CopyrightHolders,
        Field::Licensees,
        Field::PotentialLicenseConflicts,
        Field::Dependencies,
        Field::DevelopmentDependencies,
    ];

    fn parse(key: &str) -> Option<Field> {
        Self::ALL.into_iter().find(|field| field.key() == key)
    }

    fn key(self) -> &'static str {
        match self {
            Field::Name => "name",
            Field::Root => "root",
            Field::Origin => "origin",
            Field::RootMatchesOrigin => "root-matches-origin",
            Field::License => "license",
            Field::LicenseFile => "license-file",
            Field::Files => "files",
            Field::CopyrightHolders => "copyright-holders",
            Field::Licensees => "licensees",
            Field::PotentialLicenseConflicts => "potential-license-conflicts",
            Field::Dependencies => "dependencies",
            Field::DevelopmentDependencies => "development-dependencies",
        }
    }

    fn shape(self) -> Shape {
        match self {
            Field::RootMatchesOrigin => Shape::Boolean,
            Field::Files
            | Field::CopyrightHolders
            | Field::Licensees
            | Field::PotentialLicenseConflicts => Shape::Strings,
            Field::Dependencies | Field::DevelopmentDependencies => Shape::Entries,
            _ => Shape::String,
        }
    }
}

/// Manifest files currently being loaded, outermost first.
#[derive(Debug, Default)]
struct LoadContext {
    active: Vec<PathBuf>,
}

/// Loads the manifest at `path` together with every manifest it references.
pub fn load_file(path: &Path) -> Result<ManifestNode, BomError> {
    load_file_with(path, None, &mut LoadContext::default())
}

/// Loads a manifest from `text`. `source_name` labels positions and
/// `base_dir` anchors relative paths.
pub fn load_str(text: &str, source_name: &str, base_dir: &Path) -> Result<ManifestNode, BomError> {
    parse_document(text, source_name, base_dir, &mut LoadContext::default())
}

fn load_file_with(
    path: &Path,
    position: Option<SourcePosition>,
    ctx: &mut LoadContext,
) -> Result<ManifestNode, BomError> {
    let key = std::fs::canonicalize(path).unwrap_or_else(|_| normalize(path));
    if ctx.active.contains(&key) {
        return Err(BomError::new(
            format!(
                "Manifest '{}' includes itself through its dependencies",
                path.display()
            ),
            position,
        ));
    }

    let text = std::fs::read_to_string(path).map_err(|e| {
        BomError::new(
            format!("Cannot read BOM file '{}': {e}", path.display()),
            position.clone(),
        )
    })?;
    debug!("loading manifest {}", path.display());

    ctx.active.push(key);
    let result = parse_document(&text, &path.display().to_string(), &parent_dir(path), ctx);
    ctx.active.pop();
    result
}

fn parse_document(
    text: &str,
    source_name: &str,
    base_dir: &Path,
    ctx: &mut LoadContext,
) -> Result<ManifestNode, BomError> {
    let value: Value = serde_yaml::from_str(text).map_err(|e| {
        let position = e
            .location()
            .map(|loc| SourcePosition::new(loc.line(), loc.column(), source_name));
        BomError::new(format!("Invalid YAML: {e}"), position)
    })?;

    let location = Location::new(Arc::new(PositionIndex::build(source_name, text)));
    match value {
        // A manifest holding only comments is an empty one.
        Value::Null => node_from_mapping(&Mapping::new(), base_dir, location, ctx),
        Value::Mapping(mapping) => node_from_mapping(&mapping, base_dir, location, ctx),
        other => Err(type_error("mapping", &other, location.file_position())),
    }
}

fn node_from_mapping(
    mapping: &Mapping,
    base_dir: &Path,
    location: Location,
    ctx: &mut LoadContext,
) -> Result<ManifestNode, BomError> {
    let mut node = ManifestNode {
        base_dir: base_dir.to_path_buf(),
        location: location.clone(),
        ..ManifestNode::default()
    };
    let mut dependencies = None;
    let mut development_dependencies = None;

    for (key, value) in mapping {
        let key = match key {
            Value::String(key) => key.clone(),
            other => scalar_text(other),
        };
        let Some(field) = Field::parse(&key) else {
            return Err(BomError::new(
                format!("Unexpected field '{key}'"),
                location.key_position(&key),
            ));
        };

        match (field.shape(), value) {
            (Shape::Boolean, Value::Bool(flag)) => node.root_matches_origin = Some(*flag),
            (Shape::Entries, Value::Sequence(items)) => match field {
                Field::Dependencies => dependencies = Some(items),
                _ => development_dependencies = Some(items),
            },
            (Shape::Strings, Value::Sequence(items)) => {
                let items = string_items(items, field.key(), &location)?;
                match field {
                    Field::Files => node.files = Some(items),
                    Field::CopyrightHolders => node.copyright_holders = items,
                    Field::Licensees => node.licensees = items,
                    _ => node.potential_license_conflicts = items,
                }
            }
            (Shape::String, Value::String(text)) => {
                let text = Some(text.clone());
                match field {
                    Field::Name => node.name = text,
                    Field::Root => node.root = text,
                    Field::Origin => node.origin = text,
                    Field::License => node.license = text,
                    _ => node.license_file = text,
                }
            }
            (shape, other) => {
                return Err(type_error(
                    shape.expected(),
                    other,
                    location.value_position(field.key()),
                ));
            }
        }
    }

    // Entries resolve against the declaring node's root, so load them last.
    let root_dir = node.root_dir();
    if let Some(items) = dependencies {
        node.dependencies = load_entries(items, Field::Dependencies.key(), &root_dir, &location, ctx)?;
    }
    if let Some(items) = development_dependencies {
        node.development_dependencies = load_entries(
            items,
            Field::DevelopmentDependencies.key(),
            &root_dir,
            &location,
            ctx,
        )?;
    }

    Ok(node)
}

fn string_items(items: &Sequence, key: &str, location: &Location) -> Result<Vec<String>, BomError> {
    items
        .iter()
        .enumerate()
        .map(|(i, item)| match item {
            Value::String(s) => Ok(s.clone()),
            other => Err(type_error("string", other, location.item_position(key, i))),
        })
        .collect()
}

fn load_entries(
    items: &Sequence,
    key: &str,
    base_dir: &Path,
    location: &Location,
    ctx: &mut LoadContext,
) -> Result<Vec<ManifestNode>, BomError> {
    let mut nodes = Vec::with_capacity(items.len());
    for (i, item) in items.iter().enumerate() {
        let item_location = location.child(&format!("{key}/{i}"));
        let node = match item {
            Value::String(entry) => resolve_entry(entry, base_dir, item_location, ctx)?,
            Value::Mapping(mapping) => node_from_mapping(mapping, base_dir, item_location, ctx)?,
            other => return Err(type_error("mapping", other, item_location.position())),
        };
        nodes.push(node);
    }
    Ok(nodes)
}

fn resolve_entry(
    entry: &str,
    base_dir: &Path,
    location: Location,
    ctx: &mut LoadContext,
) -> Result<ManifestNode, BomError> {
    let path = base_dir.join(entry);
    let position = location.position();

    if path.extension().is_some_and(|ext| ext == "yaml") {
        if !path.is_file() {
            return Err(BomError::new(
                format!("BOM file not found at '{}'", path.display()),
                position,
            ));
        }
        return load_reference(&path, entry, position, ctx);
    }

    let nested = path.join(MANIFEST_FILE_NAME);
    if nested.is_file() {
        return load_reference(&nested, entry, position, ctx);
    }

    Ok(ManifestNode {
        base_dir: base_dir.to_path_buf(),
        root: Some(entry.to_string()),
        location,
        ..ManifestNode::default()
    })
}

fn load_reference(
    path: &Path,
    entry: &str,
    position: Option<SourcePosition>,
    ctx: &mut LoadContext,
) -> Result<ManifestNode, BomError> {
    let mut node = load_file_with(path, position, ctx)?;
    node.reference = Some(entry.to_string());
    Ok(node)
}

/// YAML type name as reported in type errors.
pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "float",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Sequence(_) => "sequence",
        Value::Mapping(_) => "mapping",
        Value::Tagged(_) => "tagged value",
    }
}

fn type_error(expected: &str, value: &Value, position: Option<SourcePosition>) -> BomError {
    BomError::new(
        format!("Expected type '{expected}', but got '{}'", type_name(value)),
        position,
    )
}

fn scalar_text(value: &Value) -> String {
    serde_yaml::to_string(value)
        .map(|s| s.trim_end().to_string())
        .unwrap_or_else(|_| type_name(value).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn load(text: &str) -> Result<ManifestNode, BomError> {
        load_str(text, "foo", Path::new("."))
    }

    fn pos(line: usize, column: usize) -> Option<SourcePosition> {
        Some(SourcePosition::new(line, column, "foo"))
    }

    #[test]
    fn test_empty_manifest() {
        let node = load("").unwrap();
        assert!(node.dependencies.is_empty());
        assert_eq!(node.root_dir(), PathBuf::from("."));

        let node = load("# nothing here\n").unwrap();
        assert!(node.license.is_none());
    }

    #[test]
    fn test_fields() {
        let node = load(
            "name: app\nlicense: MIT\nlicense-file: COPYING\nfiles: [a.c, b.c]\n\
             copyright-holders: [Acme]\nlicensees: [Initech]\nroot-matches-origin: true\n",
        )
        .unwrap();
        assert_eq!(node.name.as_deref(), Some("app"));
        assert_eq!(node.license.as_deref(), Some("MIT"));
        assert_eq!(node.license_file.as_deref(), Some("COPYING"));
        assert_eq!(node.files, Some(vec!["a.c".to_string(), "b.c".to_string()]));
        assert_eq!(node.copyright_holders, vec!["Acme"]);
        assert_eq!(node.licensees, vec!["Initech"]);
        assert_eq!(node.root_matches_origin, Some(true));
    }

    #[test]
    fn test_unexpected_field() {
        let err = load("license: MIT\nbogus: 1\n").unwrap_err();
        assert_eq!(err.message, "Unexpected field 'bogus'");
        assert_eq!(err.position, pos(2, 1));
    }

    #[test]
    fn test_type_errors() {
        let err = load("license: 3\n").unwrap_err();
        assert_eq!(err.message, "Expected type 'string', but got 'integer'");
        assert_eq!(err.position, pos(1, 10));

        let err = load("dependencies: foo\n").unwrap_err();
        assert_eq!(err.message, "Expected type 'sequence', but got 'string'");

        let err = load("dependencies:\n  - 4.5\n").unwrap_err();
        assert_eq!(err.message, "Expected type 'mapping', but got 'float'");
        assert_eq!(err.position, pos(2, 5));

        let err = load("licensees:\n  - [a]\n").unwrap_err();
        assert_eq!(err.message, "Expected type 'string', but got 'sequence'");

        let err = load("- a\n").unwrap_err();
        assert_eq!(err.message, "Expected type 'mapping', but got 'sequence'");
        assert_eq!(err.position, pos(1, 1));
    }

    #[test]
    fn test_flow_type_errors_have_positions() {
        let err = load("root-matches-origin: yes please\n").unwrap_err();
        assert_eq!(err.message, "Expected type 'boolean', but got 'string'");
        assert_eq!(err.position, pos(1, 22));

        let err = load("dependencies: [{root: a, license: [MIT]}]\n").unwrap_err();
        assert_eq!(err.message, "Expected type 'string', but got 'sequence'");
        assert_eq!(err.position, pos(1, 35));

        let err = load("copyright-holders: [Acme, 3]\n").unwrap_err();
        assert_eq!(err.message, "Expected type 'string', but got 'integer'");
        assert_eq!(err.position, pos(1, 27));
    }

    #[test]
    fn test_invalid_yaml_has_position() {
        let err = load("a: [b\n").unwrap_err();
        assert!(err.message.starts_with("Invalid YAML"));
        assert!(err.position.is_some());
    }

    #[test]
    fn test_inline_dependencies_resolve_against_parent_root() {
        let node = load_str(
            "root: src\ndependencies:\n  - root: foss\n    license: GPL-3.0\n",
            "foo",
            Path::new("app"),
        )
        .unwrap();
        let dep = &node.dependencies[0];
        assert_eq!(dep.root_dir(), PathBuf::from("app/src/foss"));
        assert_eq!(dep.license.as_deref(), Some("GPL-3.0"));
        assert_eq!(dep.value_position("license"), pos(4, 14));
    }

    #[test]
    fn test_directory_entry_without_manifest() {
        let tmp = TempDir::new().unwrap();
        let node = load_str("dependencies: [foss]\n", "foo", tmp.path()).unwrap();
        let dep = &node.dependencies[0];
        assert_eq!(dep.root.as_deref(), Some("foss"));
        assert_eq!(dep.root_dir(), tmp.path().join("foss"));
        assert!(dep.reference.is_none());
    }

    #[test]
    fn test_directory_entry_with_manifest() {
        let tmp = TempDir::new().unwrap();
        let foo_dir = tmp.path().join("foo");
        fs::create_dir(&foo_dir).unwrap();
        fs::write(foo_dir.join(".bom.yaml"), "license: MIT\n").unwrap();

        let node = load_str("dependencies:\n  - foo\n", "bar", tmp.path()).unwrap();
        let dep = &node.dependencies[0];
        assert_eq!(dep.root_dir(), foo_dir);
        assert_eq!(dep.license.as_deref(), Some("MIT"));
        assert_eq!(dep.reference.as_deref(), Some("foo"));
        assert_eq!(
            dep.file_position().map(|p| p.source_name),
            Some(foo_dir.join(".bom.yaml").display().to_string())
        );
    }

    #[test]
    fn test_yaml_entry() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("zlib.yaml"), "root: vendor/zlib\nlicense: Zlib\n").unwrap();

        let node = load_str("dependencies: [zlib.yaml]\n", "bar", tmp.path()).unwrap();
        assert_eq!(node.dependencies[0].root_dir(), tmp.path().join("vendor/zlib"));

        let err = load_str("dependencies:\n  - missing.yaml\n", "foo", tmp.path()).unwrap_err();
        assert_eq!(
            err.message,
            format!("BOM file not found at '{}'", tmp.path().join("missing.yaml").display())
        );
        assert_eq!(err.position, pos(2, 5));
    }

    #[test]
    fn test_self_inclusion_is_rejected() {
        let tmp = TempDir::new().unwrap();
        let manifest = tmp.path().join(".bom.yaml");
        fs::write(&manifest, "dependencies: [a]\n").unwrap();
        fs::create_dir(tmp.path().join("a")).unwrap();
        fs::write(tmp.path().join("a/.bom.yaml"), "dependencies: ['..']\n").unwrap();

        let err = load_file(&manifest).unwrap_err();
        assert!(err.message.contains("includes itself through its dependencies"));
    }

    #[test]
    fn test_shared_manifest_is_not_a_cycle() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("zlib.yaml"), "license: Zlib\n").unwrap();
        let node = load_str(
            "dependencies: [zlib.yaml]\ndevelopment-dependencies: [zlib.yaml]\n",
            "foo",
            tmp.path(),
        )
        .unwrap();
        assert_eq!(node.dependencies.len(), 1);
        assert_eq!(node.development_dependencies.len(), 1);
    }

    #[test]
    fn test_type_names() {
        let value: Value = serde_yaml::from_str("[1, 1.5, true, ~, a, {}, []]").unwrap();
        let names: Vec<_> = value.as_sequence().unwrap().iter().map(type_name).collect();
        assert_eq!(
            names,
            vec!["integer", "float", "boolean", "null", "string", "mapping", "sequence"]
        );
    }
}
