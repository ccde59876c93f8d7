//! One-shot validation of a configuration folder from the command line.

use std::fmt::Write as _;
use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, Context};
use serde::Serialize;

use crate::fs::DiskFileAccessor;
use crate::model::{ConfigModel, Validity};

#[derive(Debug, Clone, Serialize)]
pub struct CheckReport {
    pub implicit_root: Option<String>,
    pub files: Vec<FileReport>,
    pub scripts: Vec<String>,
    pub include_cycles: Vec<Vec<String>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FileReport {
    pub path: String,
    pub context_path: String,
    pub validity: Validity,
    pub includes: usize,
}

impl CheckReport {
    pub fn invalid_files(&self) -> usize {
        self.files.iter().filter(|file| !file.validity.is_valid).count()
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        if let Some(root) = &self.implicit_root {
            let _ = writeln!(out, "configuration root: {root}/");
        }
        for file in &self.files {
            let status = if file.validity.is_valid { "ok" } else { "invalid" };
            let _ = writeln!(out, "{status:>7}  {}", file.path);
            for error in &file.validity.errors {
                let _ = writeln!(out, "         error: {error}");
            }
            for warning in &file.validity.warnings {
                let _ = writeln!(out, "         warning: {warning}");
            }
        }
        for cycle in &self.include_cycles {
            let _ = writeln!(out, "include cycle: {}", cycle.join(" <-> "));
        }
        let _ = writeln!(
            out,
            "{} files, {} invalid, {} scripts",
            self.files.len(),
            self.invalid_files(),
            self.scripts.len()
        );
        out
    }
}

/// Discover the configuration below `root` and summarize every file.
pub async fn check(root: &Path) -> anyhow::Result<CheckReport> {
    let root = root
        .canonicalize()
        .with_context(|| format!("Cannot open {}", root.display()))?;
    if !root.is_dir() {
        return Err(anyhow!("{} is not a directory", root.display()));
    }

    let mut model = ConfigModel::new(Arc::new(DiskFileAccessor::new(root)));
    model.discover_files().await;

    let files = model
        .files()
        .map(|file| FileReport {
            path: file.path.clone(),
            context_path: file.context_path.clone(),
            validity: file.is_valid().clone(),
            includes: file.includes().len(),
        })
        .collect();

    let mut scripts: Vec<String> = model.get_scripts().into_keys().collect();
    scripts.sort();

    Ok(CheckReport {
        implicit_root: model.implicit_root().map(String::from),
        files,
        scripts,
        include_cycles: model.include_cycles(),
    })
}

/// Run `check` and print the report, as text or JSON.
pub async fn run_check(root: &Path, json: bool) -> anyhow::Result<()> {
    let report = check(root).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", report.render());
    }

    match report.invalid_files() {
        0 => Ok(()),
        n => Err(anyhow!("{n} invalid configuration file(s)")),
    }
}
