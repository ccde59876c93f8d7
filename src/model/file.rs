//! One configuration file: read, parse, walk, resolve.
//!
//! Loading happens in two halves. [`ConfigFile::parse`] is pure: it builds the
//! syntax tree and walks it, collecting script blocks and the raw include
//! directives. [`ConfigFile::load`] wraps it with the asynchronous parts, the
//! read and the resolution of directives against the file accessor.

use std::ops::Range;
use std::path::Path;

use tracing::{debug, info, warn};

use super::error::ConfigFileError;
use super::tree::{parse_tree, Node, NodeKind, MAX_DEPTH};
use super::types::{
    CustomTag, IncludeKind, IncludeReference, Problem, ScriptDefinition, UnresolvedInclude,
    Validity,
};
use crate::fs::FileAccessor;
use crate::position::LineIndex;

/// The extension directory includes are filtered to.
pub const CONFIG_EXTENSION: &str = ".yaml";

/// The file every logical context path of the main configuration starts with.
pub const MAIN_CONFIG: &str = "configuration.yaml";

#[derive(Debug, Clone, PartialEq)]
pub struct ConfigFile {
    pub path: String,
    pub context_path: String,
    text: String,
    line_index: LineIndex,
    tree: Option<Node>,
    directives: Vec<Directive>,
    includes: Vec<IncludeReference>,
    unresolved: Vec<UnresolvedInclude>,
    scripts: Vec<ScriptDefinition>,
    problems: Vec<Problem>,
    validity: Validity,
    loaded: bool,
}

/// An include directive as written, before it is resolved to files.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Directive {
    kind: IncludeKind,
    argument: String,
    range: Range<usize>,
    context_path: String,
}

impl ConfigFile {
    /// A placeholder registered before the file is read.
    pub fn pending(path: &str, context_path: &str) -> ConfigFile {
        ConfigFile {
            path: path.to_string(),
            context_path: context_path.to_string(),
            text: String::new(),
            line_index: LineIndex::default(),
            tree: None,
            directives: vec![],
            includes: vec![],
            unresolved: vec![],
            scripts: vec![],
            problems: vec![],
            validity: Validity {
                is_valid: false,
                errors: vec![],
                warnings: vec!["File has not been loaded yet".to_string()],
            },
            loaded: false,
        }
    }

    /// Read, parse, and resolve `path`. Never fails: every problem ends up in
    /// the returned file's validity.
    pub async fn load(accessor: &dyn FileAccessor, path: &str, context_path: &str) -> ConfigFile {
        let text = match accessor.get_file_contents(path).await {
            Ok(text) => text,
            Err(err) => {
                warn!("could not read {path}: {err}");
                let mut file = ConfigFile::parse(path, context_path, String::new());
                file.problems = vec![Problem::warning(format!("Could not read file: {err}"), None)];
                file.validity = Validity::from_problems(&file.problems);
                return file;
            }
        };

        let mut file = ConfigFile::parse(path, context_path, text);
        file.resolve_includes(accessor).await;
        file
    }

    /// Parse `text` as the contents of `path`. Directives are collected but
    /// not resolved; see [`ConfigFile::resolve_includes`].
    pub fn parse(path: &str, context_path: &str, text: String) -> ConfigFile {
        let line_index = LineIndex::new(&text);
        let mut problems = vec![];
        let mut tree = None;
        let mut directives = vec![];
        let mut scripts = vec![];

        if text.trim().is_empty() {
            problems.push(Problem::warning("File is empty", None));
        }

        match parse_tree(&text, &line_index) {
            Ok(parsed) => {
                problems.extend(parsed.problems);
                if let Some(root) = &parsed.root {
                    let mut walker = Walker {
                        path,
                        text: &text,
                        index: &line_index,
                        directives: vec![],
                        scripts: vec![],
                        problems: vec![],
                    };
                    match walker.walk(root, context_path, 0) {
                        Ok(()) => {
                            directives = walker.directives;
                            scripts = walker.scripts;
                            problems.extend(walker.problems);
                        }
                        Err(err) => problems.push(Problem::error(err.to_string(), err.position())),
                    }
                }
                tree = parsed.root;
            }
            Err(err) => problems.push(Problem::error(err.to_string(), err.position())),
        }

        let validity = Validity::from_problems(&problems);
        if !validity.is_valid {
            directives.clear();
        }

        ConfigFile {
            path: path.to_string(),
            context_path: context_path.to_string(),
            text,
            line_index,
            tree,
            directives,
            includes: vec![],
            unresolved: vec![],
            scripts,
            problems,
            validity,
            loaded: true,
        }
    }

    /// Turn the collected directives into include references.
    pub async fn resolve_includes(&mut self, accessor: &dyn FileAccessor) {
        let mut includes = vec![];
        let mut unresolved = vec![];

        for directive in &self.directives {
            let start = self.line_index.resolve(directive.range.start).unwrap_or_default();
            let end = self.line_index.resolve(directive.range.end).unwrap_or_default();

            let targets = match directive.kind {
                IncludeKind::Include => {
                    vec![accessor.get_relative_path(&self.path, &directive.argument)]
                }
                _ => accessor
                    .get_files_in_folder_relative_from(&directive.argument, &self.path)
                    .await
                    .into_iter()
                    .filter(|file| file.ends_with(CONFIG_EXTENSION))
                    .collect(),
            };

            if targets.is_empty() {
                info!(
                    "{} {} in {} matched no files",
                    directive.kind.tag(),
                    directive.argument,
                    self.path
                );
                unresolved.push(UnresolvedInclude {
                    argument: directive.argument.clone(),
                    kind: directive.kind,
                    start,
                    end,
                });
                continue;
            }

            debug!(
                "{} {} in {} resolved to {} file(s)",
                directive.kind.tag(),
                directive.argument,
                self.path,
                targets.len()
            );
            includes.extend(targets.into_iter().map(|target| IncludeReference {
                source_file: self.path.clone(),
                target_file: target,
                context_path: directive.context_path.clone(),
                kind: directive.kind,
                range: directive.range.clone(),
                start,
                end,
            }));
        }

        self.includes = includes;
        self.unresolved = unresolved;
    }

    pub fn is_valid(&self) -> &Validity {
        &self.validity
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn includes(&self) -> &[IncludeReference] {
        &self.includes
    }

    pub fn scripts(&self) -> &[ScriptDefinition] {
        &self.scripts
    }

    pub fn unresolved_includes(&self) -> &[UnresolvedInclude] {
        &self.unresolved
    }

    pub fn problems(&self) -> &[Problem] {
        &self.problems
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn line_index(&self) -> &LineIndex {
        &self.line_index
    }

    pub fn tree(&self) -> Option<&Node> {
        self.tree.as_ref()
    }

    /// Include references whose directive covers `offset`. A directory
    /// include yields one reference per resolved file.
    pub fn includes_at(&self, offset: usize) -> Vec<&IncludeReference> {
        self.includes
            .iter()
            .filter(|include| include.range.start <= offset && offset <= include.range.end)
            .collect()
    }
}

/// True for the logical paths whose block mapping holds script definitions:
/// the top-level `script` key and its equivalent inside a package.
pub fn is_script_context(context_path: &str) -> bool {
    let Some(rest) = context_path.strip_prefix(MAIN_CONFIG) else {
        return false;
    };

    match rest.strip_prefix("/homeassistant/packages/") {
        Some(package) => {
            package == "script"
                || package
                    .strip_suffix("/script")
                    .is_some_and(|name| !name.is_empty() && !name.contains('/'))
        }
        None => rest == "/script",
    }
}

struct Walker<'a> {
    path: &'a str,
    text: &'a str,
    index: &'a LineIndex,
    directives: Vec<Directive>,
    scripts: Vec<ScriptDefinition>,
    problems: Vec<Problem>,
}

impl Walker<'_> {
    fn walk(&mut self, node: &Node, context: &str, depth: usize) -> Result<(), ConfigFileError> {
        if depth > MAX_DEPTH {
            return Err(ConfigFileError::TooDeep(MAX_DEPTH));
        }

        match &node.tag {
            Some(CustomTag::Include(kind)) => {
                self.record_directive(*kind, node, context);
                return Ok(());
            }
            Some(CustomTag::Secret | CustomTag::EnvVar | CustomTag::Input) => return Ok(()),
            Some(CustomTag::Unknown(tag)) => self.problems.push(Problem::warning(
                format!("Unresolved tag: {tag}"),
                self.index.resolve(node.range.start),
            )),
            None => {}
        }

        // Script bodies are collected, not walked
        if is_script_context(context) && node.is_block_mapping() {
            self.collect_scripts(node);
            return Ok(());
        }

        match &node.kind {
            NodeKind::Mapping { entries, .. } => {
                for entry in entries {
                    let key = entry.key.as_str().unwrap_or("?");
                    self.walk(&entry.value, &format!("{context}/{key}"), depth + 1)?;
                }
            }
            NodeKind::Sequence { items, .. } => {
                for item in items {
                    self.walk(item, context, depth + 1)?;
                }
            }
            NodeKind::Scalar(_) | NodeKind::Alias => {}
        }

        Ok(())
    }

    fn record_directive(&mut self, kind: IncludeKind, node: &Node, context: &str) {
        let argument = node.as_str().map(str::trim).unwrap_or_default();
        if argument.is_empty() {
            self.problems.push(Problem::warning(
                format!("{} expects a path argument", kind.tag()),
                self.index.resolve(node.range.start),
            ));
            return;
        }

        self.directives.push(Directive {
            kind,
            argument: argument.trim_end_matches('/').to_string(),
            range: self.tag_start(kind, node.range.start)..node.range.end,
            context_path: context.to_string(),
        });
    }

    /// The tag precedes its scalar on the same line; fall back to the scalar.
    fn tag_start(&self, kind: IncludeKind, scalar_start: usize) -> usize {
        let head = &self.text[..scalar_start];
        let line_start = head.rfind('\n').map(|i| i + 1).unwrap_or(0);
        head[line_start..]
            .rfind(kind.tag())
            .map(|i| line_start + i)
            .unwrap_or(scalar_start)
    }

    fn collect_scripts(&mut self, node: &Node) {
        if node.get("sequence").is_some() {
            let key = Path::new(self.path)
                .file_stem()
                .and_then(|stem| stem.to_str())
                .unwrap_or(self.path);
            self.push_script(key, node.range.start, node.range.end);
            return;
        }

        for entry in node.entries() {
            if let Some(key) = entry.key.as_str() {
                self.push_script(key, entry.key.range.start, entry.value.range.end);
            }
        }
    }

    fn push_script(&mut self, key: &str, start: usize, end: usize) {
        self.scripts.push(ScriptDefinition {
            key: key.to_string(),
            file: self.path.to_string(),
            start: self.index.resolve(start).unwrap_or_default(),
            end: self.index.resolve(end).unwrap_or_default(),
        });
    }
}
