//! License conflict analysis over a manifest tree.

use serde::Serialize;

use crate::license::compat::is_dependent_license_compatible;
use crate::license::restrictiveness::restrictiveness;
use crate::license::UNKNOWN;
use crate::manifest::ManifestNode;
use crate::models::{Restrictiveness, SourcePosition, Warning};
use crate::path_util::to_slash;

/// One row of the analysis report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComponentSummary {
    pub name: String,
    pub root: String,
    pub license: String,
    pub restrictiveness: Restrictiveness,
    /// Reached only through development dependencies.
    pub development: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct Analysis {
    pub components: Vec<ComponentSummary>,
    pub warnings: Vec<Warning>,
}

impl Analysis {
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }
}

/// Collects conflict warnings for the whole tree, deepest first.
///
/// For each selected dependency the dependency's own subtree is reported
/// before the edge from `node` to it, so the most specific conflict leads.
/// Development dependencies are selected only for a source distribution.
pub fn collect_warnings(node: &ManifestNode, is_source_dist: bool) -> Vec<Warning> {
    let mut warnings = Vec::new();
    for dep in node.selected_dependencies(is_source_dist) {
        warnings.extend(collect_warnings(dep, is_source_dist));
        warnings.extend(conflict_warning(node, dep, is_source_dist));
    }
    warnings
}

/// The warning for the edge `node -> dep`, unless the edge is compatible or
/// `node` lists the dependency's root under `potential-license-conflicts`.
pub fn conflict_warning(node: &ManifestNode, dep: &ManifestNode, is_source_dist: bool) -> Option<Warning> {
    if !is_conflict(node, dep) {
        return None;
    }

    let mut message = format!(
        "The license '{}' may be incompatible with the license '{}' in '{}'.",
        node.license.as_deref().unwrap_or(UNKNOWN),
        dep.license.as_deref().unwrap_or(UNKNOWN),
        to_slash(&dep.root_dir()),
    );
    message.push_str(
        " Specify 'copyright-holders' and/or 'licensees' to state the license is authorized in this context.",
    );
    if !is_source_dist {
        message.push_str(
            " If this dependency is used only for development, move it to the 'development-dependencies' section.",
        );
    }
    Some(Warning::new(message, license_position(node)))
}

/// True when `node` may not depend on `dep` and has not acknowledged it.
pub fn is_conflict(node: &ManifestNode, dep: &ManifestNode) -> bool {
    let acknowledged = dep
        .root
        .as_ref()
        .is_some_and(|root| node.potential_license_conflicts.contains(root));
    !acknowledged && !is_dependent_license_compatible(node, dep)
}

/// Where a node's license is declared, else where the node itself starts.
pub fn license_position(node: &ManifestNode) -> Option<SourcePosition> {
    node.value_position("license").or_else(|| node.position())
}

pub fn analyze_manifest(tree: &ManifestNode, is_source_dist: bool) -> Analysis {
    let mut components = Vec::new();
    summarize(tree, false, &mut components);
    Analysis {
        components,
        warnings: collect_warnings(tree, is_source_dist),
    }
}

fn summarize(node: &ManifestNode, development: bool, out: &mut Vec<ComponentSummary>) {
    let license = node.license.clone().unwrap_or_else(|| UNKNOWN.to_string());
    out.push(ComponentSummary {
        name: node.display_name(),
        root: to_slash(&node.root_dir()),
        restrictiveness: restrictiveness(&license),
        license,
        development,
    });
    for dep in &node.dependencies {
        summarize(dep, development, out);
    }
    for dep in &node.development_dependencies {
        summarize(dep, true, out);
    }
}
