//! Core value types shared by the parser and the configuration model.

use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::position::LineCol;

/// How an include directive splices its target(s) into the including file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IncludeKind {
    /// `!include file.yaml`
    Include,
    /// `!include_dir_list folder`
    DirList,
    /// `!include_dir_named folder`
    DirNamed,
    /// `!include_dir_merge_list folder`
    DirMergeList,
    /// `!include_dir_merge_named folder`
    DirMergeNamed,
}

impl IncludeKind {
    pub fn tag(&self) -> &'static str {
        match self {
            IncludeKind::Include => "!include",
            IncludeKind::DirList => "!include_dir_list",
            IncludeKind::DirNamed => "!include_dir_named",
            IncludeKind::DirMergeList => "!include_dir_merge_list",
            IncludeKind::DirMergeNamed => "!include_dir_merge_named",
        }
    }

    pub fn is_directory(&self) -> bool {
        !matches!(self, IncludeKind::Include)
    }

    /// Directory results are consumed as a `filename -> contents` dictionary.
    pub fn is_named(&self) -> bool {
        matches!(self, IncludeKind::DirNamed | IncludeKind::DirMergeNamed)
    }
}

/// The closed set of custom YAML tags the loader understands.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CustomTag {
    Include(IncludeKind),
    Secret,
    EnvVar,
    Input,
    /// Any other tag. Kept so it can be reported, never fatal.
    Unknown(String),
}

impl CustomTag {
    pub fn from_tag(tag: &str) -> CustomTag {
        match tag {
            "!include" => CustomTag::Include(IncludeKind::Include),
            "!include_dir_list" => CustomTag::Include(IncludeKind::DirList),
            "!include_dir_named" => CustomTag::Include(IncludeKind::DirNamed),
            "!include_dir_merge_list" => CustomTag::Include(IncludeKind::DirMergeList),
            "!include_dir_merge_named" => CustomTag::Include(IncludeKind::DirMergeNamed),
            "!secret" => CustomTag::Secret,
            "!env_var" => CustomTag::EnvVar,
            "!input" => CustomTag::Input,
            other => CustomTag::Unknown(other.to_string()),
        }
    }

    pub fn include_kind(&self) -> Option<IncludeKind> {
        match self {
            CustomTag::Include(kind) => Some(*kind),
            _ => None,
        }
    }
}

/// One resolved include directive.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IncludeReference {
    pub source_file: String,
    pub target_file: String,
    pub context_path: String,
    pub kind: IncludeKind,
    /// Byte range of the directive (tag and argument) in the source file.
    pub range: Range<usize>,
    pub start: LineCol,
    pub end: LineCol,
}

/// An include directive that resolved to no file at all.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UnresolvedInclude {
    pub argument: String,
    pub kind: IncludeKind,
    pub start: LineCol,
    pub end: LineCol,
}

/// A named script block.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScriptDefinition {
    pub key: String,
    pub file: String,
    pub start: LineCol,
    pub end: LineCol,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Severity {
    Error,
    Warning,
}

/// A positioned parse or load problem. Validity messages are derived from these.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Problem {
    pub severity: Severity,
    pub message: String,
    pub position: Option<LineCol>,
}

impl Problem {
    pub fn error(message: impl Into<String>, position: Option<LineCol>) -> Problem {
        Problem {
            severity: Severity::Error,
            message: message.into(),
            position,
        }
    }

    pub fn warning(message: impl Into<String>, position: Option<LineCol>) -> Problem {
        Problem {
            severity: Severity::Warning,
            message: message.into(),
            position,
        }
    }
}

/// Number of messages reported before the rest collapse into `+N more`.
pub const MAX_REPORTED_MESSAGES: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Validity {
    pub is_valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl Validity {
    pub fn from_problems(problems: &[Problem]) -> Validity {
        let messages = |severity: Severity| {
            problems
                .iter()
                .filter(|problem| problem.severity == severity)
                .map(|problem| problem.message.clone())
                .collect::<Vec<_>>()
        };

        let errors = truncate_messages(messages(Severity::Error));
        Validity {
            is_valid: errors.is_empty(),
            errors,
            warnings: messages(Severity::Warning),
        }
    }

    /// One-line summary for logs.
    pub fn summary(&self) -> String {
        self.errors
            .iter()
            .chain(self.warnings.iter())
            .cloned()
            .collect::<Vec<_>>()
            .join("; ")
    }
}

fn truncate_messages(mut messages: Vec<String>) -> Vec<String> {
    if messages.len() > MAX_REPORTED_MESSAGES {
        let rest = messages.len() - MAX_REPORTED_MESSAGES;
        messages.truncate(MAX_REPORTED_MESSAGES);
        messages.push(format!("+{rest} more"));
    }
    messages
}

/// A known file together with the logical path it was reached through.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IncludedFile {
    pub path: String,
    pub context_path: String,
}

/// Result of re-parsing a single file after an edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateOutcome {
    pub is_valid_yaml: bool,
    pub new_files_found: bool,
}
