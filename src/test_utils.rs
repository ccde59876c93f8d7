//! Shared test utilities for hassle.
//!
//! This module provides common helpers used across multiple test modules.
//! It is only compiled when running tests.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tempfile::TempDir;
use tower_lsp::lsp_types::Url;

use crate::fs::{join_relative, FileAccessor};
use crate::model::ConfigModel;

/// Creates a temporary configuration directory for testing.
///
/// Returns a tuple of (TempDir, PathBuf) where:
/// - TempDir: The temp directory handle (must be kept alive for the test duration)
/// - PathBuf: The path to the config subdirectory
///
/// Listings skip hidden directories, and on some systems temp directories
/// live under paths like `/tmp/.tmpXXXXX`, so files go into a non-hidden
/// `config` subdirectory.
pub fn create_test_config_dir() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let config_dir = temp_dir.path().join("config");
    fs::create_dir(&config_dir).expect("Failed to create config subdirectory");
    (temp_dir, config_dir)
}

/// In-memory accessor that counts reads per path.
#[derive(Debug, Default)]
pub struct MemoryFileAccessor {
    files: Mutex<BTreeMap<String, String>>,
    reads: Mutex<HashMap<String, usize>>,
}

impl MemoryFileAccessor {
    pub fn new(files: &[(&str, &str)]) -> MemoryFileAccessor {
        MemoryFileAccessor {
            files: Mutex::new(
                files
                    .iter()
                    .map(|(path, text)| (path.to_string(), text.to_string()))
                    .collect(),
            ),
            reads: Mutex::new(HashMap::new()),
        }
    }

    pub fn write(&self, path: &str, text: &str) {
        self.files.lock().insert(path.to_string(), text.to_string());
    }

    pub fn reads(&self, path: &str) -> usize {
        self.reads.lock().get(path).copied().unwrap_or(0)
    }

    pub fn total_reads(&self) -> usize {
        self.reads.lock().values().sum()
    }

    pub fn reset_reads(&self) {
        self.reads.lock().clear();
    }
}

#[async_trait]
impl FileAccessor for MemoryFileAccessor {
    async fn get_file_contents(&self, path: &str) -> std::io::Result<String> {
        *self.reads.lock().entry(path.to_string()).or_default() += 1;
        self.files.lock().get(path).cloned().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::NotFound, format!("{path} not found"))
        })
    }

    async fn get_files_in_folder(&self, folder: &str) -> Vec<String> {
        let prefix = if folder.is_empty() {
            String::new()
        } else {
            format!("{}/", folder.trim_end_matches('/'))
        };
        self.files
            .lock()
            .keys()
            .filter(|path| path.starts_with(&prefix))
            .cloned()
            .collect()
    }

    async fn get_files_in_folder_relative_from(
        &self,
        folder: &str,
        from_file: &str,
    ) -> Vec<String> {
        let folder = join_relative(from_file, folder);
        self.files
            .lock()
            .keys()
            .filter(|path| {
                let parent = path.rsplit_once('/').map(|(parent, _)| parent).unwrap_or("");
                parent == folder
            })
            .cloned()
            .collect()
    }

    fn path_to_uri(&self, path: &str) -> Option<Url> {
        Url::parse(&format!("file:///config/{path}")).ok()
    }

    fn uri_to_path(&self, uri: &Url) -> Option<String> {
        uri.path().strip_prefix("/config/").map(String::from)
    }
}

/// Builds a model over an in-memory project and runs discovery.
pub async fn discovered_model(
    files: &[(&str, &str)],
) -> (Arc<MemoryFileAccessor>, ConfigModel) {
    let accessor = Arc::new(MemoryFileAccessor::new(files));
    let mut model = ConfigModel::new(accessor.clone());
    model.discover_files().await;
    (accessor, model)
}
