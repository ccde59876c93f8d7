use once_cell::sync::Lazy;
use regex::Regex;
use tower_lsp::lsp_types::{Location, Position, Range};

use crate::model::ConfigModel;

static SCRIPT_REFERENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\bscript\.([A-Za-z0-9_]+)").expect("valid script reference regex"));

/// Definitions for the symbol under `cursor` in `path`: the files an include
/// directive pulls in, or the block defining a `script.<name>` reference.
pub fn goto_definition(
    model: &ConfigModel,
    path: &str,
    cursor: Position,
) -> Option<Vec<Location>> {
    let file = model.file(path)?;
    let offset = file.line_index().offset_from_lsp(file.text(), cursor)?;

    let includes = model.include_at(path, offset);
    if !includes.is_empty() {
        return Some(
            includes
                .iter()
                .filter_map(|include| {
                    Some(Location {
                        uri: model.accessor().path_to_uri(&include.target_file)?,
                        range: Range::default(),
                    })
                })
                .collect(),
        );
    }

    let name = script_reference_at(file.text(), offset)?;
    let script = model.get_scripts().remove(name)?;
    let target = model.file(&script.file)?;
    let index = target.line_index();
    Some(vec![Location {
        uri: model.accessor().path_to_uri(&script.file)?,
        range: Range {
            start: index.to_lsp(target.text(), script.start),
            end: index.to_lsp(target.text(), script.end),
        },
    }])
}

/// The `<name>` of a `script.<name>` token covering the byte `offset`.
fn script_reference_at(text: &str, offset: usize) -> Option<&str> {
    let head = text.get(..offset)?;
    let start = head.rfind('\n').map(|i| i + 1).unwrap_or(0);
    let end = text[offset..].find('\n').map(|i| offset + i).unwrap_or(text.len());
    let line_text = &text[start..end];
    let column = offset - start;

    SCRIPT_REFERENCE
        .captures_iter(line_text)
        .find(|captures| {
            captures
                .get(0)
                .is_some_and(|whole| whole.start() <= column && column <= whole.end())
        })
        .and_then(|captures| captures.get(1))
        .map(|name| name.as_str())
}
