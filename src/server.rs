//! The language server: editor events in, diagnostics and locations out.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tower_lsp::jsonrpc::Result;
use tower_lsp::lsp_types::*;
use tower_lsp::{Client, LanguageServer};
use tracing::{debug, info, warn};

use crate::config::Settings;
use crate::diagnostics::all_diagnostics;
use crate::fs::{DiskFileAccessor, FileAccessor};
use crate::gotodef::goto_definition;
use crate::model::ConfigModel;
use crate::session::{EditSession, Revalidation, RevalidationObserver};

pub struct Backend {
    client: Client,
    workspace: RwLock<Option<Workspace>>,
}

#[derive(Clone)]
struct Workspace {
    accessor: Arc<DiskFileAccessor>,
    model: Arc<RwLock<ConfigModel>>,
    settings: Settings,
    session: EditSession,
    publisher: Arc<Publisher>,
}

/// Publishes diagnostics for the whole model after every pass.
struct Publisher {
    client: Client,
    accessor: Arc<DiskFileAccessor>,
    model: Arc<RwLock<ConfigModel>>,
    settings: Settings,
    /// Paths that received diagnostics last time.
    published: parking_lot::Mutex<HashSet<String>>,
}

impl Publisher {
    async fn publish(&self) {
        let mut diagnostics = {
            let model = self.model.read().await;
            all_diagnostics(&model, &self.settings)
        };

        let stale = {
            let mut published = self.published.lock();
            let stale = stale_paths(&published, &diagnostics);
            *published = diagnostics.iter().map(|(path, _)| path.clone()).collect();
            stale
        };
        if !stale.is_empty() {
            debug!("Clearing diagnostics of {} dropped file(s)", stale.len());
        }
        diagnostics.extend(stale.into_iter().map(|path| (path, vec![])));

        for (path, diags) in diagnostics {
            match self.accessor.path_to_uri(&path) {
                Some(uri) => self.client.publish_diagnostics(uri, diags, None).await,
                None => warn!("Cannot publish diagnostics for {path}: not a file path"),
            }
        }
    }
}

/// Previously published paths missing from `current`, sorted.
fn stale_paths(previous: &HashSet<String>, current: &[(String, Vec<Diagnostic>)]) -> Vec<String> {
    let current: HashSet<&str> = current.iter().map(|(path, _)| path.as_str()).collect();
    let mut stale: Vec<String> = previous
        .iter()
        .filter(|path| !current.contains(path.as_str()))
        .cloned()
        .collect();
    stale.sort();
    stale
}

#[async_trait]
impl RevalidationObserver for Publisher {
    async fn revalidated(&self, revalidation: Revalidation) {
        debug!(
            "Re-validated {} file(s), rediscovered: {}",
            revalidation.updated.len(),
            revalidation.rediscovered
        );
        self.publish().await;
    }
}

impl Backend {
    pub fn new(client: Client) -> Backend {
        Backend {
            client,
            workspace: RwLock::new(None),
        }
    }

    async fn workspace(&self) -> Option<Workspace> {
        self.workspace.read().await.clone()
    }

    async fn path_of(&self, uri: &Url) -> Option<(Workspace, String)> {
        let workspace = self.workspace().await?;
        let path = workspace.accessor.uri_to_path(uri)?;
        Some((workspace, path))
    }

    async fn edited(&self, uri: &Url, text: Option<String>) {
        let Some((workspace, path)) = self.path_of(uri).await else {
            return;
        };

        match text {
            Some(text) => workspace.accessor.set_overlay(&path, text),
            None => workspace.accessor.clear_overlay(&path),
        }
        workspace.session.file_changed(&path);
    }
}

fn root_dir(params: &InitializeParams) -> Option<PathBuf> {
    let from_folders = params
        .workspace_folders
        .as_ref()
        .and_then(|folders| folders.first())
        .and_then(|folder| folder.uri.to_file_path().ok());

    #[allow(deprecated)]
    let from_root_uri = params.root_uri.as_ref().and_then(|uri| uri.to_file_path().ok());

    from_folders
        .or(from_root_uri)
        .or_else(|| std::env::current_dir().ok())
}

#[tower_lsp::async_trait]
impl LanguageServer for Backend {
    async fn initialize(&self, params: InitializeParams) -> Result<InitializeResult> {
        let Some(root) = root_dir(&params) else {
            return Err(tower_lsp::jsonrpc::Error::invalid_params(
                "No workspace folder to serve",
            ));
        };
        info!("Serving configuration at {}", root.display());

        let settings = match Settings::new(&root, &params.capabilities) {
            Ok(settings) => settings,
            Err(err) => {
                warn!("Falling back to default settings: {err}");
                Settings::default()
            }
        };

        let accessor = Arc::new(DiskFileAccessor::new(root));
        let model = Arc::new(RwLock::new(ConfigModel::new(accessor.clone())));
        let publisher = Arc::new(Publisher {
            client: self.client.clone(),
            accessor: accessor.clone(),
            model: model.clone(),
            settings: settings.clone(),
            published: parking_lot::Mutex::new(HashSet::new()),
        });
        let session = EditSession::new(
            model.clone(),
            publisher.clone(),
            Duration::from_millis(settings.debounce_ms),
        );

        *self.workspace.write().await = Some(Workspace {
            accessor,
            model,
            settings,
            session,
            publisher,
        });

        Ok(InitializeResult {
            capabilities: ServerCapabilities {
                text_document_sync: Some(TextDocumentSyncCapability::Kind(
                    TextDocumentSyncKind::FULL,
                )),
                definition_provider: Some(OneOf::Left(true)),
                ..Default::default()
            },
            server_info: Some(ServerInfo {
                name: "hassle".to_string(),
                version: Some(env!("CARGO_PKG_VERSION").to_string()),
            }),
        })
    }

    async fn initialized(&self, _: InitializedParams) {
        let Some(workspace) = self.workspace().await else {
            return;
        };

        let (count, implicit_root) = {
            let mut model = workspace.model.write().await;
            model.discover_files().await;
            (model.get_all_files().len(), model.implicit_root().map(String::from))
        };

        let message = match implicit_root {
            Some(root) => format!("Found {count} configuration files under {root}/"),
            None => format!("Found {count} configuration files"),
        };
        self.client.log_message(MessageType::INFO, message).await;

        workspace.publisher.publish().await;
    }

    async fn shutdown(&self) -> Result<()> {
        if let Some(workspace) = self.workspace().await {
            workspace.session.cancel();
        }
        Ok(())
    }

    async fn did_open(&self, params: DidOpenTextDocumentParams) {
        self.edited(&params.text_document.uri, Some(params.text_document.text))
            .await;
    }

    async fn did_change(&self, params: DidChangeTextDocumentParams) {
        if let Some(change) = params.content_changes.into_iter().last() {
            self.edited(&params.text_document.uri, Some(change.text))
                .await;
        }
    }

    async fn did_save(&self, params: DidSaveTextDocumentParams) {
        let Some((workspace, path)) = self.path_of(&params.text_document.uri).await else {
            return;
        };
        if let Some(text) = params.text {
            workspace.accessor.set_overlay(&path, text);
        }
        workspace.session.file_changed(&path);
    }

    async fn did_close(&self, params: DidCloseTextDocumentParams) {
        self.edited(&params.text_document.uri, None).await;
    }

    async fn goto_definition(
        &self,
        params: GotoDefinitionParams,
    ) -> Result<Option<GotoDefinitionResponse>> {
        let position = params.text_document_position_params;
        let Some((workspace, path)) = self.path_of(&position.text_document.uri).await else {
            return Ok(None);
        };
        if !workspace.settings.goto_definition {
            return Ok(None);
        }

        let model = workspace.model.read().await;
        Ok(goto_definition(&model, &path, position.position)
            .filter(|locations| !locations.is_empty())
            .map(GotoDefinitionResponse::Array))
    }
}
