//! Directory license scan: finds license files a manifest does not declare.
//!
//! Each directory under a component root is classified as an independent
//! unit of work. Units read the filesystem and the shared template corpus
//! and return their declarations; results are concatenated in directory
//! pre-order whichever executor ran them.

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::future::{join_all, BoxFuture, FutureExt};
use indicatif::ProgressBar;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::BomError;
use crate::license::identifier::{identify_license, TemplateCache, TemplateCorpus};
use crate::license::ids::LICENSE_IDS;
use crate::license::UNKNOWN;
use crate::manifest::ManifestNode;
use crate::models::{Coalesce, Declaration};
use crate::path_util::{normalize, relative_to, to_slash};

const VCS_DIRS: &[&str] = &[".git"];

/// Where per-directory classification runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Executor {
    /// Inline on the calling task, one directory after another.
    Sequential,
    /// On tokio's blocking pool, one task per directory.
    #[default]
    Pooled,
}

impl Executor {
    /// Applies `f` to every item, returning results in input order.
    pub async fn map_ordered<T, R, F>(&self, items: Vec<T>, f: F) -> Result<Vec<R>, BomError>
    where
        T: Send + 'static,
        R: Send + 'static,
        F: Fn(T) -> R + Send + Sync + 'static,
    {
        match self {
            Executor::Sequential => Ok(items.into_iter().map(f).collect()),
            Executor::Pooled => {
                let f = Arc::new(f);
                let handles = items.into_iter().map(|item| {
                    let f = Arc::clone(&f);
                    tokio::task::spawn_blocking(move || f(item))
                });
                join_all(handles)
                    .await
                    .into_iter()
                    .map(|result| {
                        result.map_err(|e| {
                            if e.is_panic() {
                                std::panic::resume_unwind(e.into_panic());
                            }
                            BomError::new(format!("Scan worker did not finish: {e}"), None)
                        })
                    })
                    .collect()
            }
        }
    }
}

/// Per-invocation scan state shared by every directory unit.
#[derive(Debug)]
pub struct ScanContext {
    templates: TemplateCache,
    executor: Executor,
    progress: ProgressBar,
}

impl ScanContext {
    pub fn new(templates: TemplateCache, executor: Executor) -> Self {
        Self {
            templates,
            executor,
            progress: ProgressBar::hidden(),
        }
    }

    /// Ticks `progress` once per classified directory.
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = progress;
        self
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ScanOptions {
    /// Also scan development dependencies.
    pub is_source_dist: bool,
    /// Enter dependencies that live in their own manifest files.
    pub scan_components: bool,
    /// Fill in what was found instead of failing on it.
    pub add_declarations: bool,
    pub coalesce: Coalesce,
}

/// A directory and the names of the files directly inside it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryFiles {
    pub dir: PathBuf,
    pub files: Vec<String>,
}

/// True for `LICENSE`, `license.md`, `License.txt` and the like.
pub fn is_license_file_name(name: &str) -> bool {
    Path::new(name)
        .file_stem()
        .is_some_and(|stem| stem.to_string_lossy().eq_ignore_ascii_case("license"))
}

/// Lists `root` and its subdirectories in pre-order with their files, both
/// sorted by name. Version-control directories and `subroots` are pruned.
pub fn discover_directories(root: &Path, subroots: &[PathBuf]) -> Vec<DirectoryFiles> {
    let mut dirs: Vec<DirectoryFiles> = Vec::new();
    let mut index: HashMap<PathBuf, usize> = HashMap::new();

    let walker = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| entry.depth() == 0 || !entry.file_type().is_dir() || should_walk(entry.path(), subroots));

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("skipping unreadable path during scan: {e}");
                continue;
            }
        };

        if entry.file_type().is_dir() {
            index.insert(entry.path().to_path_buf(), dirs.len());
            dirs.push(DirectoryFiles {
                dir: entry.path().to_path_buf(),
                files: Vec::new(),
            });
        } else if entry.path().is_file() {
            let slot = entry.path().parent().and_then(|parent| index.get(parent));
            if let Some(&i) = slot {
                dirs[i].files.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
    }

    dirs
}

fn should_walk(path: &Path, subroots: &[PathBuf]) -> bool {
    let is_vcs = path
        .file_name()
        .is_some_and(|name| VCS_DIRS.iter().any(|vcs| name == *vcs));
    if is_vcs {
        return false;
    }
    let normalized = normalize(path);
    if subroots.contains(&normalized) {
        debug!(dir = %normalized.display(), "skipping declared component");
        return false;
    }
    true
}

/// Declarations for the license files in one directory.
///
/// A file is reported when it is named LICENSE or when it classifies
/// confidently; a LICENSE file that matches no template is reported as
/// `Unknown`.
pub fn check_for_licenses(
    root: &Path,
    dir: &DirectoryFiles,
    coalesce: Coalesce,
    corpus: &TemplateCorpus,
) -> Vec<Declaration> {
    let rel_dir = relative_to(&dir.dir, root).unwrap_or_else(|| to_slash(&dir.dir));

    let mut found = Vec::new();
    for name in &dir.files {
        let identification = identify_license(&dir.dir.join(name), corpus);
        let license = identification.confident_id();
        if license.is_none() && !is_license_file_name(name) {
            continue;
        }
        found.push(Declaration {
            root: rel_dir.clone(),
            license_file: name.clone(),
            license: license.unwrap_or(UNKNOWN).to_string(),
            files: Some(vec![name.clone()]),
        });
    }

    match coalesce {
        Coalesce::None => found,
        Coalesce::All => coalesce_declarations(found, dir.files.len()),
    }
}

/// Merges one directory's declarations.
///
/// The first file named LICENSE becomes the directory default and covers
/// every file sharing its license. Remaining declarations are merged by
/// license, sorted by identifier, and a lone declaration that covers every
/// file in the directory drops its file list.
pub fn coalesce_declarations(found: Vec<Declaration>, num_files: usize) -> Vec<Declaration> {
    let default_idx = found.iter().position(|d| is_license_file_name(&d.license_file));
    let default = default_idx.map(|i| Declaration {
        files: None,
        ..found[i].clone()
    });

    let mut by_license: BTreeMap<String, Declaration> = BTreeMap::new();
    for (i, decl) in found.into_iter().enumerate() {
        if Some(i) == default_idx {
            continue;
        }
        if default.as_ref().is_some_and(|d| d.license == decl.license) {
            continue;
        }
        match by_license.entry(decl.license.clone()) {
            Entry::Occupied(mut slot) => {
                let files = slot.get_mut().files.get_or_insert_with(Vec::new);
                files.extend(decl.files.unwrap_or_default());
            }
            Entry::Vacant(slot) => {
                slot.insert(decl);
            }
        }
    }

    let mut merged: Vec<Declaration> = by_license.into_values().collect();
    if merged.len() == 1 && merged[0].files.as_ref().map_or(0, Vec::len) == num_files {
        merged[0].files = None;
    }
    if let Some(default) = default {
        merged.insert(0, default);
    }
    merged
}

/// Scans `root` for license declarations, skipping `subroots`.
pub async fn walk_for_licenses(
    root: &Path,
    subroots: &[PathBuf],
    coalesce: Coalesce,
    ctx: &ScanContext,
) -> Result<Vec<Declaration>, BomError> {
    let dirs = discover_directories(root, subroots);
    let corpus = ctx.templates.corpus(LICENSE_IDS);
    if corpus.is_empty() {
        warn!(
            dir = %ctx.templates.dir().display(),
            "no license templates available; only files named LICENSE will be found"
        );
    }
    debug!(root = %root.display(), dirs = dirs.len(), executor = ?ctx.executor, "scanning for licenses");

    ctx.progress.inc_length(dirs.len() as u64);
    let progress = ctx.progress.clone();
    let root = root.to_path_buf();
    let per_dir = ctx
        .executor
        .map_ordered(dirs, move |dir| {
            let found = check_for_licenses(&root, &dir, coalesce, &corpus);
            progress.inc(1);
            found
        })
        .await?;

    Ok(per_dir.into_iter().flatten().collect())
}

/// Root directories of every dependency below `node`, excluding `node`'s own.
fn subroots(node: &ManifestNode) -> Vec<PathBuf> {
    fn collect(node: &ManifestNode, out: &mut Vec<PathBuf>) {
        for dep in node.all_dependencies() {
            out.push(dep.root_dir());
            collect(dep, out);
        }
    }

    let root_dir = node.root_dir();
    let mut roots = Vec::new();
    collect(node, &mut roots);
    roots.retain(|dir| *dir != root_dir);
    roots
}

/// Scans the tree for undeclared license files and licenses.
///
/// Without `add_declarations` the first finding is an error and `Ok(None)`
/// means the tree is complete. With it, the findings are filled into a copy
/// of the tree which is returned; `tree` itself is never modified.
pub async fn scan_manifest(
    tree: &ManifestNode,
    options: &ScanOptions,
    ctx: &ScanContext,
) -> Result<Option<ManifestNode>, BomError> {
    let scanned = scan_node(tree, options, ctx).await?;
    Ok(options.add_declarations.then_some(scanned))
}

fn scan_node<'a>(
    node: &'a ManifestNode,
    options: &'a ScanOptions,
    ctx: &'a ScanContext,
) -> BoxFuture<'a, Result<ManifestNode, BomError>> {
    async move {
        let mut scanned = node.clone();
        let root_dir = node.root_dir();
        let mut added = Vec::new();

        match (node.license_file_path(), &node.license) {
            (None, _) => {
                let found = walk_for_licenses(&root_dir, &subroots(node), options.coalesce, ctx).await?;
                if options.add_declarations {
                    for decl in found {
                        added.extend(add_declaration(&mut scanned, decl));
                    }
                } else if let Some(decl) = found.first() {
                    let path = normalize(&Path::new(&decl.root).join(&decl.license_file));
                    return Err(BomError::new(
                        format!(
                            "Undeclared {}license file '{}' in directory '{}'",
                            license_prefix(Some(decl.license.as_str()).filter(|id| *id != UNKNOWN)),
                            to_slash(&path),
                            root_dir.display()
                        ),
                        node.key_position("root").or_else(|| node.position()),
                    ));
                }
            }
            (Some(path), None) => {
                let identification = ctx.templates.identify(&path, LICENSE_IDS);
                let license = identification.confident_id();
                if options.add_declarations {
                    scanned.license = Some(license.unwrap_or(UNKNOWN).to_string());
                } else {
                    return Err(BomError::new(
                        format!(
                            "Undeclared {}license in license file '{}'",
                            license_prefix(license),
                            path.display()
                        ),
                        node.key_position("license-file"),
                    ));
                }
            }
            (Some(_), Some(_)) => {}
        }

        for (i, dep) in node.dependencies.iter().enumerate() {
            if enters(dep, options) {
                scanned.dependencies[i] = scan_child(dep, &root_dir, options, ctx).await?;
            }
        }
        if options.is_source_dist {
            for (i, dep) in node.development_dependencies.iter().enumerate() {
                if enters(dep, options) {
                    scanned.development_dependencies[i] = scan_child(dep, &root_dir, options, ctx).await?;
                }
            }
        }

        scanned.dependencies.extend(added);
        Ok(scanned)
    }
    .boxed()
}

fn license_prefix(license: Option<&str>) -> String {
    license.map(|id| format!("{id} ")).unwrap_or_default()
}

/// Inline entries are always scanned; separate manifests only on request.
fn enters(dep: &ManifestNode, options: &ScanOptions) -> bool {
    options.scan_components || dep.reference.is_none()
}

async fn scan_child(
    dep: &ManifestNode,
    parent_root: &Path,
    options: &ScanOptions,
    ctx: &ScanContext,
) -> Result<ManifestNode, BomError> {
    let mut child = scan_node(dep, options, ctx).await?;
    // A scanned manifest file is written back inline, so its findings show up
    // in the parent's output.
    if options.add_declarations && child.reference.take().is_some() {
        let dir = child.root_dir();
        child.root = Some(relative_to(&dir, parent_root).unwrap_or_else(|| to_slash(&dir)));
        child.base_dir = parent_root.to_path_buf();
    }
    Ok(child)
}

/// Records `decl` on `node`. The first declaration for the node's own
/// directory becomes its license; anything else is returned as a new
/// dependency.
fn add_declaration(node: &mut ManifestNode, decl: Declaration) -> Option<ManifestNode> {
    if decl.root == "." && node.license_file.is_none() {
        node.license_file = Some(decl.license_file);
        node.license = Some(decl.license);
        return None;
    }
    Some(ManifestNode {
        base_dir: node.root_dir(),
        root: Some(decl.root),
        license_file: Some(decl.license_file),
        license: Some(decl.license),
        files: decl.files,
        ..ManifestNode::default()
    })
}
