//! Debounced re-validation of edited files.
//!
//! Every edit marks its file dirty and restarts a single timer. When the
//! timer runs out, all dirty files are re-read through
//! [`ConfigModel::update_file`]; if any of them reaches a file the model has
//! not seen, the whole graph is rediscovered. A pass that has started runs to
//! completion even if new edits arrive meanwhile.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use indexmap::IndexSet;
use parking_lot::Mutex;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::model::{ConfigModel, UpdateOutcome};

/// What one re-validation pass did.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Revalidation {
    pub updated: Vec<(String, UpdateOutcome)>,
    pub rediscovered: bool,
}

/// Notified after every completed pass, with the model already updated.
#[async_trait]
pub trait RevalidationObserver: Send + Sync {
    async fn revalidated(&self, revalidation: Revalidation);
}

#[derive(Clone)]
pub struct EditSession {
    inner: Arc<Inner>,
}

struct Inner {
    model: Arc<RwLock<ConfigModel>>,
    observer: Arc<dyn RevalidationObserver>,
    debounce: Duration,
    dirty: Mutex<IndexSet<String>>,
    timer: Mutex<Option<CancellationToken>>,
}

impl EditSession {
    pub fn new(
        model: Arc<RwLock<ConfigModel>>,
        observer: Arc<dyn RevalidationObserver>,
        debounce: Duration,
    ) -> EditSession {
        EditSession {
            inner: Arc::new(Inner {
                model,
                observer,
                debounce,
                dirty: Mutex::new(IndexSet::new()),
                timer: Mutex::new(None),
            }),
        }
    }

    /// Record an edit of `path` and restart the quiet period.
    pub fn file_changed(&self, path: &str) {
        self.inner.dirty.lock().insert(path.to_string());

        let token = CancellationToken::new();
        if let Some(previous) = self.inner.timer.lock().replace(token.clone()) {
            previous.cancel();
        }

        let session = self.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => return,
                _ = tokio::time::sleep(session.inner.debounce) => {}
            }
            session.revalidate().await;
        });
    }

    /// Paths edited since the last pass.
    pub fn dirty_paths(&self) -> Vec<String> {
        self.inner.dirty.lock().iter().cloned().collect()
    }

    /// Drop a pending timer without running its pass. Dirty paths are kept.
    pub fn cancel(&self) {
        if let Some(token) = self.inner.timer.lock().take() {
            token.cancel();
        }
    }

    /// Re-validate every dirty file now.
    pub async fn revalidate(&self) -> Revalidation {
        let dirty: Vec<String> = self.inner.dirty.lock().drain(..).collect();
        if dirty.is_empty() {
            return Revalidation::default();
        }
        debug!("Re-validating {} edited file(s)", dirty.len());

        let revalidation = {
            let mut model = self.inner.model.write().await;
            let mut updated = Vec::with_capacity(dirty.len());
            for path in dirty {
                let outcome = model.update_file(&path).await;
                updated.push((path, outcome));
            }

            let rediscovered = updated.iter().any(|(_, outcome)| outcome.new_files_found);
            if rediscovered {
                info!("Edits reached new files, rediscovering the configuration");
                model.discover_files().await;
            }

            Revalidation {
                updated,
                rediscovered,
            }
        };

        self.inner.observer.revalidated(revalidation.clone()).await;
        revalidation
    }
}
