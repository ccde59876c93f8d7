//! hassle: editor support for Home Assistant YAML configuration
//!
//! A Home Assistant configuration is a tree of YAML files stitched together
//! with include tags (`!include`, `!include_dir_named`, ...). This crate
//! discovers that tree starting from the well-known root files, keeps a graph
//! of every reachable file with its validity, include references and script
//! definitions, and serves go-to-definition and diagnostics over LSP.
//!
//! # Architecture
//!
//! - [`model`]: discovery, the file graph and the per-file parser
//! - [`fs`]: the file access capability the model reads through
//! - [`session`]: debounced re-validation while files are edited
//! - [`gotodef`], [`diagnostics`]: LSP features over the model
//! - [`server`]: the tower-lsp backend
//! - [`cli`]: the `check` command
//!
//! ```ignore
//! use std::sync::Arc;
//! use hassle::fs::DiskFileAccessor;
//! use hassle::model::ConfigModel;
//!
//! let mut model = ConfigModel::new(Arc::new(DiskFileAccessor::new(root)));
//! model.discover_files().await;
//! let scripts = model.get_scripts();
//! ```

// Core
pub mod fs;
pub mod model;
pub mod position;

// LSP feature modules
pub mod diagnostics;
pub mod gotodef;
pub mod server;
pub mod session;

// Configuration and entry points
pub mod cli;
pub mod config;

// Test utilities (only available in test builds)
#[cfg(test)]
pub mod test_utils;
