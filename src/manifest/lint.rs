use std::collections::HashSet;

use crate::error::BomError;
use crate::license::ids::{is_valid_license, suggest};
use crate::manifest::ManifestNode;

/// State shared across one lint pass over a manifest tree.
#[derive(Debug, Default)]
pub struct LintContext {
    names: HashSet<String>,
}

/// Checks a loaded tree against the filesystem, pre-order. The first problem aborts.
pub fn lint(node: &ManifestNode) -> Result<(), BomError> {
    LintContext::default().lint(node)
}

impl LintContext {
    pub fn lint(&mut self, node: &ManifestNode) -> Result<(), BomError> {
        if let Some(name) = node.name.as_deref().filter(|name| !name.is_empty()) {
            if !self.names.insert(name.to_string()) {
                return Err(BomError::new(
                    format!("Name '{name}' already defined"),
                    node.value_position("name"),
                ));
            }
        }

        let root_dir = node.root_dir();
        if !root_dir.is_dir() {
            return Err(BomError::new(
                format!("Directory '{}' not found", root_dir.display()),
                node.value_position("root").or_else(|| node.position()),
            ));
        }

        for (i, file) in node.files.iter().flatten().enumerate() {
            let path = root_dir.join(file);
            if !path.is_file() {
                return Err(BomError::new(
                    format!("File '{}' not found", path.display()),
                    node.item_position("files", i),
                ));
            }
        }

        if let Some(license_file) = &node.license_file {
            if !root_dir.join(license_file).is_file() {
                return Err(BomError::new(
                    format!(
                        "License file '{license_file}' not found in directory '{}'",
                        root_dir.display()
                    ),
                    node.value_position("license-file"),
                ));
            }
        }

        if let Some(license) = &node.license {
            if !is_valid_license(license) {
                let hint = suggest(license)
                    .map(|id| format!(". Did you mean '{id}'?"))
                    .unwrap_or_default();
                return Err(BomError::new(
                    format!("Unrecognized license ID '{license}'{hint}"),
                    node.value_position("license"),
                ));
            }
        }

        for dep in node.all_dependencies() {
            self.lint(dep)?;
        }
        Ok(())
    }
}
