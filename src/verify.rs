//! Consistency checks between a manifest and the files it describes.
//!
//! Verification walks the tree in pre-order and fails on the first
//! inconsistency. License files that look like a different license than the
//! one declared only produce warnings. On success the verified declarations
//! are rendered back as a manifest document.

use std::path::Path;

use serde_yaml::{Mapping, Value};

use crate::analyze::{conflict_warning, license_position};
use crate::error::BomError;
use crate::license::identifier::{TemplateCache, MATCH_THRESHOLD};
use crate::license::ids::LICENSE_IDS;
use crate::manifest::ManifestNode;
use crate::models::Warning;
use crate::path_util::{relative_to, to_slash};

#[derive(Debug, Clone, Copy, Default)]
pub struct VerifyOptions {
    pub is_source_dist: bool,
    /// Origins are checked separately; this only keeps them in the output.
    pub check_origins: bool,
}

#[derive(Debug, Clone)]
pub struct Verification {
    pub document: Value,
    pub warnings: Vec<Warning>,
}

pub fn verify_manifest(
    tree: &ManifestNode,
    options: &VerifyOptions,
    templates: &TemplateCache,
) -> Result<Verification, BomError> {
    let mut verifier = Verifier {
        options,
        templates,
        warnings: Vec::new(),
    };
    let document = verifier.verify(tree, &tree.base_dir)?;
    Ok(Verification {
        document: Value::Mapping(document),
        warnings: verifier.warnings,
    })
}

/// A warning when `license_path` looks more like another license than the
/// declared `license_id`.
///
/// Nothing is reported when no template exists for the declared license or
/// when the file matches it closely.
pub fn license_mismatch(license_path: &Path, license_id: &str, templates: &TemplateCache) -> Option<String> {
    if !templates.corpus(&[license_id]).contains(license_id) {
        return None;
    }
    let declared = templates.identify(license_path, &[license_id]);
    if declared.score >= MATCH_THRESHOLD {
        return None;
    }

    let guessed = templates.identify(license_path, LICENSE_IDS);
    let guessed_id = guessed.license_id.as_deref()?;
    (guessed.score > declared.score).then(|| {
        format!(
            "License file '{}' declared as {license_id}, but it looks more like {guessed_id}.",
            license_path.display()
        )
    })
}

struct Verifier<'a> {
    options: &'a VerifyOptions,
    templates: &'a TemplateCache,
    warnings: Vec<Warning>,
}

impl Verifier<'_> {
    fn verify(&mut self, node: &ManifestNode, parent_dir: &Path) -> Result<Mapping, BomError> {
        let mut out = Mapping::new();

        let root_dir = node.root_dir();
        let root = relative_to(&root_dir, parent_dir).unwrap_or_else(|| to_slash(&root_dir));

        if let Some(name) = &node.name {
            put(&mut out, "name", name.as_str().into());
        }
        if root != "." {
            put(&mut out, "root", root.into());
        }
        if self.options.check_origins {
            if let Some(origin) = &node.origin {
                put(&mut out, "origin", origin.as_str().into());
            }
        }
        if let Some(license) = &node.license {
            put(&mut out, "license", license.as_str().into());
        }

        if let (Some(license_file), Some(path)) = (&node.license_file, node.license_file_path()) {
            let text = std::fs::read(&path).map_err(|e| {
                BomError::new(
                    format!("Cannot read license file '{}': {e}", path.display()),
                    node.value_position("license-file"),
                )
            })?;
            let text = String::from_utf8_lossy(&text);
            for (i, holder) in node.copyright_holders.iter().enumerate() {
                if !text.contains(holder.as_str()) {
                    return Err(BomError::new(
                        format!(
                            "Copyright holder '{holder}' not found in license file '{}'",
                            path.display()
                        ),
                        node.item_position("copyright-holders", i),
                    ));
                }
            }

            let declared = node.license.as_deref().unwrap_or(crate::license::UNKNOWN);
            if let Some(message) = license_mismatch(&path, declared, self.templates) {
                self.warnings
                    .push(Warning::new(message, node.value_position("license-file")));
            }
            put(&mut out, "license-file", license_file.as_str().into());
        }

        if let Some(files) = node.files.as_ref().filter(|f| !f.is_empty()) {
            put(&mut out, "files", strings(files));
        }
        for (key, values) in [
            ("copyright-holders", &node.copyright_holders),
            ("licensees", &node.licensees),
            ("potential-license-conflicts", &node.potential_license_conflicts),
        ] {
            if !values.is_empty() {
                put(&mut out, key, strings(values));
            }
        }

        let mut dependencies = Vec::new();
        for dep in &node.dependencies {
            dependencies.push(Value::Mapping(self.verify(dep, &root_dir)?));
        }
        if self.options.is_source_dist {
            for dep in &node.development_dependencies {
                dependencies.push(Value::Mapping(self.verify(dep, &root_dir)?));
            }
        }
        if !dependencies.is_empty() {
            put(&mut out, "dependencies", Value::Sequence(dependencies));
        }
        if !self.options.is_source_dist {
            let dev_roots: Vec<Value> = node
                .development_dependencies
                .iter()
                .map(|dep| {
                    let dir = dep.root_dir();
                    relative_to(&dir, &root_dir).unwrap_or_else(|| to_slash(&dir))
                })
                .filter(|root| root != ".")
                .map(Value::from)
                .collect();
            if !dev_roots.is_empty() {
                put(&mut out, "development-dependencies", Value::Sequence(dev_roots));
            }
        }

        let is_source_dist = self.options.is_source_dist;
        if let Some(warning) = node
            .selected_dependencies(is_source_dist)
            .find_map(|dep| conflict_warning(node, dep, is_source_dist))
        {
            return Err(BomError::new(warning.message, license_position(node)));
        }

        Ok(out)
    }
}

fn put(out: &mut Mapping, key: &str, value: Value) {
    out.insert(Value::String(key.to_string()), value);
}

fn strings(items: &[String]) -> Value {
    Value::Sequence(items.iter().map(|s| s.as_str().into()).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::load_str;
    use std::fs;
    use tempfile::TempDir;

    const APACHE_GRANT: &str = "Licensed under the Apache License, Version 2.0 (the \"License\"); \
you may not use this file except in compliance with the License. You may obtain a copy of the \
License at http://www.apache.org/licenses/LICENSE-2.0 Unless required by applicable law or agreed \
to in writing, software distributed under the License is distributed on an \"AS IS\" BASIS, WITHOUT \
WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied. See the License for the specific \
language governing permissions and limitations under the License.";

    fn verify(text: &str, dir: &Path, is_source_dist: bool) -> Result<Verification, BomError> {
        let tree = load_str(text, "foo", dir).unwrap();
        let options = VerifyOptions {
            is_source_dist,
            check_origins: false,
        };
        verify_manifest(&tree, &options, &TemplateCache::new(dir.join("templates")))
    }

    fn yaml(v: &Verification) -> String {
        serde_yaml::to_string(&v.document).unwrap()
    }

    #[test]
    fn test_copyright_holders() {
        let tmp = TempDir::new().unwrap();
        assert!(verify("copyright-holders: []\n", tmp.path(), false).is_ok());
        assert!(verify("copyright-holders: [a, b]\n", tmp.path(), false).is_ok());

        fs::write(tmp.path().join("bad-lic.txt"), "Copyright A").unwrap();
        let err = verify("copyright-holders: [A, B]\nlicense-file: bad-lic.txt\n", tmp.path(), false).unwrap_err();
        assert_eq!(
            err.message,
            format!(
                "Copyright holder 'B' not found in license file '{}'",
                tmp.path().join("bad-lic.txt").display()
            )
        );

        fs::write(tmp.path().join("good-lic.txt"), "Copyright A B").unwrap();
        assert!(verify("copyright-holders: [A, B]\nlicense-file: good-lic.txt\n", tmp.path(), false).is_ok());
    }

    #[test]
    fn test_dependencies() {
        let tmp = TempDir::new().unwrap();
        assert!(verify("dependencies: []\n", tmp.path(), false).is_ok());
        let v = verify("dependencies: [{license: MIT}]\n", tmp.path(), false).unwrap();
        assert_eq!(yaml(&v), "dependencies:\n- license: MIT\n");
    }

    #[test]
    fn test_development_dependencies() {
        let tmp = TempDir::new().unwrap();
        assert!(verify("development-dependencies: []\n", tmp.path(), false).is_ok());

        let v = verify("development-dependencies: [{root: foss}]\n", tmp.path(), false).unwrap();
        assert_eq!(yaml(&v), "development-dependencies:\n- foss\n");

        let v = verify("development-dependencies: [{root: foss, license: MIT}]\n", tmp.path(), true).unwrap();
        assert_eq!(yaml(&v), "dependencies:\n- root: foss\n  license: MIT\n");
    }

    #[test]
    fn test_conflict_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let text = "license: AllRightsReserved\ndependencies:\n  - {root: foss, license: GPL-3.0}\n";
        let err = verify(text, tmp.path(), false).unwrap_err();
        assert!(err.message.starts_with(
            "The license 'AllRightsReserved' may be incompatible with the license 'GPL-3.0' in '"
        ));
        assert_eq!(err.position.map(|p| (p.line, p.column)), Some((1, 10)));

        let acknowledged = "license: AllRightsReserved\ncopyright-holders: [Q]\n\
            potential-license-conflicts: [foss]\ndependencies:\n  - {root: foss, license: GPL-3.0}\n";
        assert!(verify(acknowledged, tmp.path(), false).is_ok());
    }

    #[test]
    fn test_development_conflicts_only_in_source_distribution() {
        let tmp = TempDir::new().unwrap();
        let text = "development-dependencies:\n  - license: AllRightsReserved\n    dependencies: [{license: GPL-3.0}]\n";
        assert!(verify(text, tmp.path(), false).is_ok());
        assert!(verify(text, tmp.path(), true).is_err());
    }

    #[test]
    fn test_license_mismatch_warning() {
        let tmp = TempDir::new().unwrap();
        let templates = tmp.path().join("templates");
        fs::create_dir(&templates).unwrap();
        fs::write(templates.join("Apache-2.0.txt"), APACHE_GRANT).unwrap();
        fs::write(templates.join("Apache-1.1.txt"), "Apache License 1.1 Copyright (c) 2000 The Apache Software Foundation. All rights reserved. Redistribution and use in source and binary forms, with or without modification, are permitted provided that the following conditions are met").unwrap();
        fs::write(tmp.path().join("LICENSE"), APACHE_GRANT).unwrap();

        let v = verify("license: Apache-1.1\nlicense-file: LICENSE\n", tmp.path(), false).unwrap();
        assert_eq!(
            v.warnings.iter().map(|w| w.message.clone()).collect::<Vec<_>>(),
            vec![format!(
                "License file '{}' declared as Apache-1.1, but it looks more like Apache-2.0.",
                tmp.path().join("LICENSE").display()
            )]
        );
        assert_eq!(yaml(&v), "license: Apache-1.1\nlicense-file: LICENSE\n");

        let v = verify("license: Apache-2.0\nlicense-file: LICENSE\n", tmp.path(), false).unwrap();
        assert!(v.warnings.is_empty());

        // No template for the declared license: nothing to compare against.
        let v = verify("license: GPL-3.0\nlicense-file: LICENSE\n", tmp.path(), false).unwrap();
        assert!(v.warnings.is_empty());
    }

    #[test]
    fn test_output_keeps_declared_fields() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir(tmp.path().join("foss")).unwrap();
        let text = "\
name: app
license: MIT
origin: http://a.com/app.tar.gz#app-1.0
copyright-holders: [Acme]
dependencies:
  - {root: foss, license: Zlib, licensees: [Acme]}
";
        let v = verify(text, tmp.path(), false).unwrap();
        assert_eq!(
            yaml(&v),
            "name: app\nlicense: MIT\ncopyright-holders:\n- Acme\ndependencies:\n- root: foss\n  license: Zlib\n  licensees:\n  - Acme\n"
        );

        let tree = load_str(text, "foo", tmp.path()).unwrap();
        let options = VerifyOptions {
            is_source_dist: false,
            check_origins: true,
        };
        let v = verify_manifest(&tree, &options, &TemplateCache::new(tmp.path())).unwrap();
        assert!(yaml(&v).contains("origin: http://a.com/app.tar.gz#app-1.0\n"));
    }
}
