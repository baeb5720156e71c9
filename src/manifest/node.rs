use std::path::{Path, PathBuf};

use serde_yaml::{Mapping, Value};

use crate::manifest::position::Location;
use crate::models::SourcePosition;
use crate::path_util::normalize;

/// One component of a bill of materials.
///
/// Relative paths (`root`, `license_file`, nested manifest entries) are kept
/// as written and resolved against `base_dir`: the root directory of the
/// declaring node, or the manifest file's directory for a top-level node.
#[derive(Debug, Clone, Default)]
pub struct ManifestNode {
    pub base_dir: PathBuf,
    pub name: Option<String>,
    pub root: Option<String>,
    pub origin: Option<String>,
    pub root_matches_origin: Option<bool>,
    pub license: Option<String>,
    pub license_file: Option<String>,
    pub files: Option<Vec<String>>,
    pub copyright_holders: Vec<String>,
    pub licensees: Vec<String>,
    pub potential_license_conflicts: Vec<String>,
    pub dependencies: Vec<ManifestNode>,
    pub development_dependencies: Vec<ManifestNode>,
    /// The string entry this node was loaded from, when it lives in its own manifest file.
    pub reference: Option<String>,
    pub location: Location,
}

impl ManifestNode {
    /// Directory the component's files live in.
    pub fn root_dir(&self) -> PathBuf {
        normalize(&self.base_dir.join(self.root.as_deref().unwrap_or(".")))
    }

    pub fn license_file_path(&self) -> Option<PathBuf> {
        self.license_file
            .as_deref()
            .map(|file| normalize(&self.root_dir().join(file)))
    }

    /// Declared name, else the last segment of the origin, else the root directory's name.
    pub fn display_name(&self) -> String {
        if let Some(name) = &self.name {
            return name.clone();
        }
        if let Some(origin) = &self.origin {
            let path = reqwest::Url::parse(origin)
                .map(|url| url.path().to_string())
                .unwrap_or_else(|_| origin.clone());
            if let Some(last) = path.trim_end_matches('/').rsplit('/').next() {
                if !last.is_empty() {
                    return last.to_string();
                }
            }
        }
        let root_dir = self.root_dir();
        match root_dir.file_name() {
            Some(name) => name.to_string_lossy().into_owned(),
            None => root_dir.display().to_string(),
        }
    }

    /// Dependencies that ship with the component: development dependencies
    /// count only for a source distribution.
    pub fn selected_dependencies(&self, is_source_dist: bool) -> impl Iterator<Item = &ManifestNode> {
        let dev: &[ManifestNode] = if is_source_dist {
            &self.development_dependencies
        } else {
            &[]
        };
        self.dependencies.iter().chain(dev)
    }

    pub fn all_dependencies(&self) -> impl Iterator<Item = &ManifestNode> {
        self.dependencies.iter().chain(&self.development_dependencies)
    }

    pub fn file_position(&self) -> Option<SourcePosition> {
        self.location.file_position()
    }

    pub fn position(&self) -> Option<SourcePosition> {
        self.location.position()
    }

    pub fn key_position(&self, key: &str) -> Option<SourcePosition> {
        self.location.key_position(key)
    }

    pub fn value_position(&self, key: &str) -> Option<SourcePosition> {
        self.location.value_position(key)
    }

    pub fn item_position(&self, key: &str, idx: usize) -> Option<SourcePosition> {
        self.location.item_position(key, idx)
    }

    /// Renders the node back into manifest form. Dependencies loaded from
    /// their own manifest files are written as the entry they were loaded from.
    pub fn to_document(&self) -> Value {
        let mut map = Mapping::new();
        let mut put = |key: &str, value: Value| {
            map.insert(Value::String(key.to_string()), value);
        };

        if let Some(name) = &self.name {
            put("name", name.as_str().into());
        }
        if let Some(root) = &self.root {
            put("root", root.as_str().into());
        }
        if let Some(origin) = &self.origin {
            put("origin", origin.as_str().into());
        }
        if let Some(matches) = self.root_matches_origin {
            put("root-matches-origin", Value::Bool(matches));
        }
        if let Some(license) = &self.license {
            put("license", license.as_str().into());
        }
        if let Some(file) = &self.license_file {
            put("license-file", file.as_str().into());
        }
        if let Some(files) = &self.files {
            put("files", strings(files));
        }
        if !self.copyright_holders.is_empty() {
            put("copyright-holders", strings(&self.copyright_holders));
        }
        if !self.licensees.is_empty() {
            put("licensees", strings(&self.licensees));
        }
        if !self.potential_license_conflicts.is_empty() {
            put("potential-license-conflicts", strings(&self.potential_license_conflicts));
        }
        if !self.dependencies.is_empty() {
            put("dependencies", entries(&self.dependencies));
        }
        if !self.development_dependencies.is_empty() {
            put("development-dependencies", entries(&self.development_dependencies));
        }

        Value::Mapping(map)
    }
}

fn strings(items: &[String]) -> Value {
    Value::Sequence(items.iter().map(|s| s.as_str().into()).collect())
}

fn entries(nodes: &[ManifestNode]) -> Value {
    Value::Sequence(
        nodes
            .iter()
            .map(|node| match &node.reference {
                Some(entry) => entry.as_str().into(),
                None => node.to_document(),
            })
            .collect(),
    )
}

/// Directory containing `file`, `.` for a bare file name.
pub fn parent_dir(file: &Path) -> PathBuf {
    match file.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}
