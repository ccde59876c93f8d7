use tower_lsp::lsp_types::{Diagnostic, DiagnosticSeverity, Position, Range};

use crate::config::Settings;
use crate::model::{ConfigFile, ConfigModel, Problem, Severity};
use crate::position::LineCol;

pub const SOURCE: &str = "hassle";

/// Diagnostics for one file of the model, or `None` when diagnostics are
/// disabled or the file is unknown.
pub fn diagnostics(model: &ConfigModel, settings: &Settings, path: &str) -> Option<Vec<Diagnostic>> {
    if !settings.diagnostics {
        return None;
    }

    let file = model.file(path)?;
    let cycles = match settings.cycle_diagnostics {
        true => model.include_cycles(),
        false => vec![],
    };

    Some(file_diagnostics(&file, &cycles))
}

/// Diagnostics for every file of the model, including files with none so a
/// client can clear what it showed before.
pub fn all_diagnostics(model: &ConfigModel, settings: &Settings) -> Vec<(String, Vec<Diagnostic>)> {
    if !settings.diagnostics {
        return vec![];
    }

    let cycles = match settings.cycle_diagnostics {
        true => model.include_cycles(),
        false => vec![],
    };

    model
        .files()
        .map(|file| (file.path.clone(), file_diagnostics(file, &cycles)))
        .collect()
}

fn file_diagnostics(file: &ConfigFile, cycles: &[Vec<String>]) -> Vec<Diagnostic> {
    let problems = file
        .problems()
        .iter()
        .map(|problem| problem_diagnostic(file, problem));

    let unresolved = file.unresolved_includes().iter().map(|unresolved| {
        diagnostic(
            range(file, unresolved.start, unresolved.end),
            DiagnosticSeverity::WARNING,
            format!("{} {} matched no files", unresolved.kind.tag(), unresolved.argument),
        )
    });

    let cyclic = file.includes().iter().filter_map(|include| {
        let cycle = cycles.iter().find(|cycle| {
            cycle.contains(&include.source_file) && cycle.contains(&include.target_file)
        })?;
        Some(diagnostic(
            range(file, include.start, include.end),
            DiagnosticSeverity::WARNING,
            format!("Include cycle between {}", cycle.join(", ")),
        ))
    });

    problems.chain(unresolved).chain(cyclic).collect()
}

fn problem_diagnostic(file: &ConfigFile, problem: &Problem) -> Diagnostic {
    let start = lsp_position(file, problem.position.unwrap_or_default());
    let end = Position {
        line: start.line,
        character: start.character.saturating_add(1),
    };
    let severity = match problem.severity {
        Severity::Error => DiagnosticSeverity::ERROR,
        Severity::Warning => DiagnosticSeverity::WARNING,
    };
    diagnostic(Range { start, end }, severity, problem.message.clone())
}

fn lsp_position(file: &ConfigFile, position: LineCol) -> Position {
    file.line_index().to_lsp(file.text(), position)
}

fn range(file: &ConfigFile, start: LineCol, end: LineCol) -> Range {
    Range {
        start: lsp_position(file, start),
        end: lsp_position(file, end),
    }
}

fn diagnostic(range: Range, severity: DiagnosticSeverity, message: String) -> Diagnostic {
    Diagnostic {
        range,
        severity: Some(severity),
        source: Some(SOURCE.into()),
        message,
        ..Default::default()
    }
}
