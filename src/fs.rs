//! File access capability used by the configuration model.
//!
//! All paths crossing this boundary are project-relative strings with `/`
//! separators, e.g. `scripts/lights.yaml`. Accessors never fail loudly: a
//! missing folder is an empty listing and only reads report an error, which
//! the parser downgrades to a warning.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use parking_lot::RwLock;
use pathdiff::diff_paths;
use tower_lsp::lsp_types::Url;
use tracing::warn;
use walkdir::WalkDir;

#[async_trait]
pub trait FileAccessor: Send + Sync {
    async fn get_file_contents(&self, path: &str) -> std::io::Result<String>;

    /// Every file below `folder`, recursively. `""` lists the whole project.
    async fn get_files_in_folder(&self, folder: &str) -> Vec<String>;

    /// Immediate files of `folder`, where `folder` is relative to the
    /// directory containing `from_file`.
    async fn get_files_in_folder_relative_from(&self, folder: &str, from_file: &str)
        -> Vec<String>;

    async fn get_files_in_folder_relative_from_as_uri(
        &self,
        folder: &str,
        from_file: &str,
    ) -> Vec<Url> {
        self.get_files_in_folder_relative_from(folder, from_file)
            .await
            .iter()
            .filter_map(|path| self.path_to_uri(path))
            .collect()
    }

    /// `target` as written inside `from_file`, made project-relative.
    fn get_relative_path(&self, from_file: &str, target: &str) -> String {
        join_relative(from_file, target)
    }

    fn path_to_uri(&self, path: &str) -> Option<Url>;

    fn uri_to_path(&self, uri: &Url) -> Option<String>;
}

/// Resolve `target` against the directory of `from_file` and normalize `.`
/// and `..` segments.
pub fn join_relative(from_file: &str, target: &str) -> String {
    let base = Path::new(from_file).parent().unwrap_or(Path::new(""));
    normalize(&base.join(target))
}

fn normalize(path: &Path) -> String {
    let mut parts: Vec<String> = vec![];
    for component in path.components() {
        match component {
            Component::CurDir | Component::RootDir | Component::Prefix(_) => {}
            Component::ParentDir => {
                if parts.last().is_some_and(|last| last != "..") {
                    parts.pop();
                } else {
                    parts.push("..".to_string());
                }
            }
            Component::Normal(part) => parts.push(part.to_string_lossy().into_owned()),
        }
    }
    parts.join("/")
}

fn relative_to(root: &Path, path: &Path) -> Option<String> {
    diff_paths(path, root).map(|diff| normalize(&diff))
}

/// Files below `folder` up to `max_depth`, skipping hidden entries.
fn list_blocking(root: &Path, folder: &Path, max_depth: usize) -> Vec<String> {
    WalkDir::new(folder)
        .min_depth(1)
        .max_depth(max_depth)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| !is_hidden(entry))
        .flatten()
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| relative_to(root, entry.path()))
        .collect()
}

fn is_hidden(entry: &walkdir::DirEntry) -> bool {
    entry.depth() > 0
        && entry
            .file_name()
            .to_str()
            .is_some_and(|name| name.starts_with('.'))
}

/// Reads from disk below a project root, preferring unsaved editor buffers.
#[derive(Debug)]
pub struct DiskFileAccessor {
    root: PathBuf,
    overlays: RwLock<HashMap<String, String>>,
}

impl DiskFileAccessor {
    pub fn new(root: impl Into<PathBuf>) -> DiskFileAccessor {
        DiskFileAccessor {
            root: root.into(),
            overlays: RwLock::new(HashMap::new()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Serve `text` for `path` until the overlay is cleared.
    pub fn set_overlay(&self, path: &str, text: String) {
        self.overlays.write().insert(path.to_string(), text);
    }

    pub fn clear_overlay(&self, path: &str) {
        self.overlays.write().remove(path);
    }

    fn absolute(&self, path: &str) -> PathBuf {
        self.root.join(path)
    }

    fn relative(&self, path: &Path) -> Option<String> {
        relative_to(&self.root, path)
    }

    /// Directory walks block, so they run on the blocking pool.
    async fn list(&self, folder: PathBuf, max_depth: usize) -> Vec<String> {
        let root = self.root.clone();
        let folder_name = folder.display().to_string();
        tokio::task::spawn_blocking(move || list_blocking(&root, &folder, max_depth))
            .await
            .unwrap_or_else(|err| {
                warn!("Listing {folder_name} failed: {err}");
                vec![]
            })
    }
}

#[async_trait]
impl FileAccessor for DiskFileAccessor {
    async fn get_file_contents(&self, path: &str) -> std::io::Result<String> {
        let overlay = self.overlays.read().get(path).cloned();
        match overlay {
            Some(text) => Ok(text),
            None => tokio::fs::read_to_string(self.absolute(path)).await,
        }
    }

    async fn get_files_in_folder(&self, folder: &str) -> Vec<String> {
        self.list(self.absolute(folder), usize::MAX).await
    }

    async fn get_files_in_folder_relative_from(
        &self,
        folder: &str,
        from_file: &str,
    ) -> Vec<String> {
        let folder = join_relative(from_file, folder);
        self.list(self.absolute(&folder), 1).await
    }

    fn path_to_uri(&self, path: &str) -> Option<Url> {
        Url::from_file_path(self.absolute(path)).ok()
    }

    fn uri_to_path(&self, uri: &Url) -> Option<String> {
        let path = uri.to_file_path().ok()?;
        self.relative(&path)
    }
}
