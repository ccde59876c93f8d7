//! The configuration model: every file reachable from the root files through
//! include directives, keyed by project-relative path.
//!
//! The graph is rebuilt from scratch by [`ConfigModel::discover_files`] and
//! patched one file at a time by [`ConfigModel::update_file`]. Readers get
//! owned copies, never references into the graph.

use std::collections::HashMap;
use std::sync::Arc;

use futures_util::future::{join_all, BoxFuture, FutureExt};
use indexmap::IndexMap;
use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use crate::fs::FileAccessor;

mod error;
mod file;
mod graph;
mod roots;
mod tree;
mod types;

#[cfg(test)]
mod tests;

pub use error::ConfigFileError;
pub use file::{is_script_context, ConfigFile, CONFIG_EXTENSION, MAIN_CONFIG};
pub use graph::{build_include_graph, include_cycles, IncludeGraph};
pub use roots::{locate_root_files, RootFiles, ROOT_FILES, ROOT_FOLDERS};
pub use tree::{parse_tree, Entry, Node, NodeKind, SyntaxTree, MAX_DEPTH};
pub use types::{
    CustomTag, IncludeKind, IncludeReference, IncludedFile, Problem, ScriptDefinition, Severity,
    UnresolvedInclude, UpdateOutcome, Validity, MAX_REPORTED_MESSAGES,
};

/// Path to file, in discovery order.
pub type FileGraph = IndexMap<String, ConfigFile>;

pub struct ConfigModel {
    accessor: Arc<dyn FileAccessor>,
    files: FileGraph,
    implicit_root: Option<String>,
}

impl std::fmt::Debug for ConfigModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigModel")
            .field("files", &self.files.keys().collect::<Vec<_>>())
            .field("implicit_root", &self.implicit_root)
            .finish()
    }
}

impl ConfigModel {
    pub fn new(accessor: Arc<dyn FileAccessor>) -> ConfigModel {
        ConfigModel {
            accessor,
            files: FileGraph::new(),
            implicit_root: None,
        }
    }

    pub fn accessor(&self) -> &Arc<dyn FileAccessor> {
        &self.accessor
    }

    /// Rebuild the graph from the root files. The previous graph is replaced
    /// only once the new one is complete.
    pub async fn discover_files(&mut self) {
        let listing = self.accessor.get_files_in_folder("").await;
        let roots = locate_root_files(&listing);

        if roots.files.is_empty() {
            warn!("No root configuration files found in {} listed files", listing.len());
        }
        if let Some(root) = &roots.implicit_root {
            info!("Using {root}/ as the configuration root");
        }

        let graph = Mutex::new(FileGraph::new());
        for file in &roots.files {
            discover_core(
                self.accessor.as_ref(),
                roots.project_path(file),
                file.clone(),
                true,
                &graph,
            )
            .await;
        }

        let graph = graph.into_inner();
        info!("Discovered {} configuration files", graph.len());
        self.files = graph;
        self.implicit_root = roots.implicit_root;
    }

    /// Re-read one known file in place.
    ///
    /// `new_files_found` tells the caller that the structure changed and a
    /// full [`ConfigModel::discover_files`] is needed: either `path` is not
    /// part of the graph yet, or it now includes a file that is not.
    pub async fn update_file(&mut self, path: &str) -> UpdateOutcome {
        let Some(existing) = self.files.get(path) else {
            debug!("{path} is not part of the configuration yet");
            return UpdateOutcome {
                is_valid_yaml: true,
                new_files_found: true,
            };
        };

        let context_path = existing.context_path.clone();
        let file = ConfigFile::load(self.accessor.as_ref(), path, &context_path).await;

        let new_files_found = file
            .includes()
            .iter()
            .any(|include| !self.files.contains_key(&include.target_file));
        let is_valid_yaml = file.is_valid().is_valid;

        self.files.insert(path.to_string(), file);
        UpdateOutcome {
            is_valid_yaml,
            new_files_found,
        }
    }

    pub fn get_all_files(&self) -> Vec<IncludedFile> {
        self.files
            .values()
            .map(|file| IncludedFile {
                path: file.path.clone(),
                context_path: file.context_path.clone(),
            })
            .collect()
    }

    /// Include references keyed by target file. When two directives reach
    /// the same file, the one from the later file in discovery order wins.
    pub fn get_includes(&self) -> HashMap<String, IncludeReference> {
        self.valid_files()
            .flat_map(ConfigFile::includes)
            .map(|include| (include.target_file.clone(), include.clone()))
            .collect()
    }

    /// Script definitions keyed by script name, last definition wins.
    pub fn get_scripts(&self) -> HashMap<String, ScriptDefinition> {
        self.valid_files()
            .flat_map(ConfigFile::scripts)
            .map(|script| (script.key.clone(), script.clone()))
            .collect()
    }

    pub fn file(&self, path: &str) -> Option<ConfigFile> {
        self.files.get(path).cloned()
    }

    pub fn files(&self) -> impl Iterator<Item = &ConfigFile> {
        self.files.values()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.files.contains_key(path)
    }

    /// Include references of `path` whose directive covers byte `offset`.
    pub fn include_at(&self, path: &str, offset: usize) -> Vec<IncludeReference> {
        self.files
            .get(path)
            .map(|file| file.includes_at(offset).into_iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn include_graph(&self) -> IncludeGraph {
        build_include_graph(self.valid_files().flat_map(ConfigFile::includes))
    }

    pub fn include_cycles(&self) -> Vec<Vec<String>> {
        include_cycles(&self.include_graph())
    }

    /// The folder discovery treated as the configuration root, when the
    /// root files were not found at the top of the project.
    pub fn implicit_root(&self) -> Option<&str> {
        self.implicit_root.as_deref()
    }

    fn valid_files(&self) -> impl Iterator<Item = &ConfigFile> {
        self.files.values().filter(|file| file.is_valid().is_valid)
    }
}

/// Visit `path` and everything it includes.
///
/// The stub is registered before the first await, so sibling branches and
/// include cycles see the path as taken and never load it twice.
fn discover_core<'a>(
    accessor: &'a dyn FileAccessor,
    path: String,
    context_path: String,
    is_root: bool,
    graph: &'a Mutex<FileGraph>,
) -> BoxFuture<'a, ()> {
    async move {
        {
            let mut graph = graph.lock();
            if graph.contains_key(&path) {
                return;
            }
            graph.insert(path.clone(), ConfigFile::pending(&path, &context_path));
        }

        let file = ConfigFile::load(accessor, &path, &context_path).await;
        let validity = file.is_valid();
        if !validity.is_valid {
            if is_root {
                error!("Root file {path} is invalid: {}", validity.summary());
            } else {
                warn!("Included file {path} is invalid: {}", validity.summary());
            }
        }

        let targets: Vec<(String, String)> = file
            .includes()
            .iter()
            .map(|include| (include.target_file.clone(), include.context_path.clone()))
            .collect();
        graph.lock().insert(path, file);

        join_all(
            targets
                .into_iter()
                .map(|(target, context)| discover_core(accessor, target, context, false, graph)),
        )
        .await;
    }
    .boxed()
}
