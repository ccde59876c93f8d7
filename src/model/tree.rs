//! Span-preserving YAML syntax tree.
//!
//! `yaml-rust2` hands out marked events; this module folds them into a small
//! node tree where every node knows its byte range in the source and which of
//! the recognized custom tags (if any) it carries.

use std::collections::HashSet;
use std::ops::Range;

use ropey::Rope;
use yaml_rust2::parser::{Event, MarkedEventReceiver, Parser, Tag};
use yaml_rust2::scanner::{Marker, TScalarStyle};

use super::error::ConfigFileError;
use super::types::{CustomTag, Problem};
use crate::position::LineIndex;

/// Nodes nested deeper than this abort the walk.
pub const MAX_DEPTH: usize = 128;

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub kind: NodeKind,
    pub tag: Option<CustomTag>,
    pub range: Range<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Scalar(String),
    Mapping { entries: Vec<Entry>, flow: bool },
    Sequence { items: Vec<Node>, flow: bool },
    Alias,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub key: Node,
    pub value: Node,
}

impl Node {
    pub fn as_str(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Scalar(value) => Some(value),
            _ => None,
        }
    }

    pub fn entries(&self) -> &[Entry] {
        match &self.kind {
            NodeKind::Mapping { entries, .. } => entries,
            _ => &[],
        }
    }

    pub fn get(&self, key: &str) -> Option<&Node> {
        self.entries()
            .iter()
            .find(|entry| entry.key.as_str() == Some(key))
            .map(|entry| &entry.value)
    }

    pub fn is_block_mapping(&self) -> bool {
        matches!(self.kind, NodeKind::Mapping { flow: false, .. })
    }
}

/// The first document of a file. `root` is `None` for an empty stream.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SyntaxTree {
    pub root: Option<Node>,
    /// Non-fatal findings, such as repeated mapping keys.
    pub problems: Vec<Problem>,
}

#[derive(Default)]
struct EventCollector {
    events: Vec<(Event, Marker)>,
}

impl MarkedEventReceiver for EventCollector {
    fn on_event(&mut self, ev: Event, mark: Marker) {
        self.events.push((ev, mark));
    }
}

pub fn parse_tree(text: &str, index: &LineIndex) -> Result<SyntaxTree, ConfigFileError> {
    let rope = Rope::from_str(text);
    let mut collector = EventCollector::default();

    Parser::new(text.chars())
        .load(&mut collector, false)
        .map_err(|err| ConfigFileError::Syntax {
            message: err.info().to_string(),
            position: index.resolve(char_to_byte(&rope, err.marker().index())),
        })?;

    let mut builder = TreeBuilder {
        text,
        rope,
        index,
        events: collector.events,
        pos: 0,
        problems: vec![],
    };

    let root = builder.document()?;

    Ok(SyntaxTree {
        root,
        problems: builder.problems,
    })
}

fn char_to_byte(rope: &Rope, char_idx: usize) -> usize {
    rope.char_to_byte(char_idx.min(rope.len_chars()))
}

fn classify(tag: Option<Tag>) -> Option<CustomTag> {
    tag.map(|tag| CustomTag::from_tag(&format!("{}{}", tag.handle, tag.suffix)))
}

struct TreeBuilder<'a> {
    text: &'a str,
    rope: Rope,
    index: &'a LineIndex,
    events: Vec<(Event, Marker)>,
    pos: usize,
    problems: Vec<Problem>,
}

impl TreeBuilder<'_> {
    fn document(&mut self) -> Result<Option<Node>, ConfigFileError> {
        while let Some((event, _)) = self.events.get(self.pos) {
            match event {
                Event::StreamStart | Event::DocumentStart | Event::Nothing => self.pos += 1,
                Event::StreamEnd | Event::DocumentEnd => return Ok(None),
                _ => return self.node(0).map(Some),
            }
        }
        Ok(None)
    }

    fn offset_at(&self, pos: usize) -> usize {
        self.events
            .get(pos)
            .map(|(_, mark)| char_to_byte(&self.rope, mark.index()))
            .unwrap_or(self.text.len())
    }

    fn next_is_end(&self) -> bool {
        matches!(
            self.events.get(self.pos),
            Some((Event::MappingEnd | Event::SequenceEnd, _)) | None
        )
    }

    fn node(&mut self, depth: usize) -> Result<Node, ConfigFileError> {
        if depth > MAX_DEPTH {
            return Err(ConfigFileError::TooDeep(MAX_DEPTH));
        }

        let start = self.offset_at(self.pos);
        let event = self
            .events
            .get_mut(self.pos)
            .map(|(event, _)| std::mem::replace(event, Event::Nothing))
            .ok_or_else(|| ConfigFileError::UnexpectedEvent("end of stream".to_string()))?;
        self.pos += 1;

        match event {
            Event::Scalar(value, style, _, tag) => {
                // A key without a value yields `~` marked at the following token
                let range = if matches!(style, TScalarStyle::Plain)
                    && value == "~"
                    && !self.text[start..].starts_with('~')
                {
                    let end = self.trimmed_end_before(start);
                    end..end
                } else {
                    start..self.scalar_end(start, &value, style)
                };
                Ok(Node {
                    kind: NodeKind::Scalar(value),
                    tag: classify(tag),
                    range,
                })
            }
            Event::SequenceStart(_, tag) => {
                let flow = self.text[start..].starts_with('[');
                let mut items = vec![];
                while !self.next_is_end() {
                    items.push(self.node(depth + 1)?);
                }
                let start = match items.first() {
                    Some(first) if !flow => start.min(first.range.start),
                    _ => start,
                };
                let end = self.close(start, flow, items.last().map(|item| item.range.end));
                Ok(Node {
                    kind: NodeKind::Sequence { items, flow },
                    tag: classify(tag),
                    range: start..end,
                })
            }
            Event::MappingStart(_, tag) => {
                let flow = self.text[start..].starts_with('{');
                let mut entries: Vec<Entry> = vec![];
                let mut seen = HashSet::new();
                while !self.next_is_end() {
                    let key = self.node(depth + 1)?;
                    let value = self.node(depth + 1)?;
                    if let Some(name) = key.as_str() {
                        if !seen.insert(name.to_string()) {
                            self.problems.push(Problem::error(
                                format!("Map keys must be unique; \"{name}\" is repeated"),
                                self.index.resolve(key.range.start),
                            ));
                        }
                    }
                    entries.push(Entry { key, value });
                }
                // Block mappings are marked at the first key's colon
                let start = match entries.first() {
                    Some(first) if !flow => first.key.range.start,
                    _ => start,
                };
                let end = self.close(start, flow, entries.last().map(|entry| entry.value.range.end));
                Ok(Node {
                    kind: NodeKind::Mapping { entries, flow },
                    tag: classify(tag),
                    range: start..end,
                })
            }
            Event::Alias(_) => {
                let len = self.text[start..]
                    .find(|c: char| c.is_whitespace() || matches!(c, ',' | ']' | '}'))
                    .unwrap_or(self.text.len() - start);
                Ok(Node {
                    kind: NodeKind::Alias,
                    tag: None,
                    range: start..start + len,
                })
            }
            other => Err(ConfigFileError::UnexpectedEvent(format!("{other:?}"))),
        }
    }

    /// Consume the closing event of a collection and compute the collection's end.
    fn close(&mut self, start: usize, flow: bool, last_child_end: Option<usize>) -> usize {
        let close_at = self.offset_at(self.pos);
        if self.pos < self.events.len() {
            self.pos += 1;
        }

        match (flow, last_child_end) {
            (true, _) => (close_at + 1).min(self.text.len()),
            (false, Some(end)) => end,
            (false, None) => start,
        }
    }

    fn scalar_end(&self, start: usize, value: &str, style: TScalarStyle) -> usize {
        let rest = &self.text[start..];
        let quoted = match style {
            TScalarStyle::SingleQuoted => closing_quote(rest, '\''),
            TScalarStyle::DoubleQuoted => closing_quote(rest, '"'),
            _ if !value.is_empty() && rest.starts_with(value) => Some(value.len()),
            _ => None,
        };

        quoted
            .map(|len| start + len)
            .unwrap_or_else(|| start.max(self.trimmed_end_before(self.offset_at(self.pos))))
    }

    /// End of the last meaningful text before `offset`, skipping blank lines,
    /// comment lines, and dangling sequence dashes.
    fn trimmed_end_before(&self, offset: usize) -> usize {
        let mut head = self.text[..offset].trim_end();
        loop {
            let line_start = head.rfind('\n').map(|i| i + 1).unwrap_or(0);
            let last_line = head[line_start..].trim();
            if last_line == "-" || last_line.starts_with('#') {
                head = head[..line_start].trim_end();
            } else {
                return head.len();
            }
        }
    }
}

/// Byte length of a quoted scalar including both quotes.
fn closing_quote(rest: &str, quote: char) -> Option<usize> {
    let mut chars = rest.char_indices().skip(1).peekable();
    while let Some((i, c)) = chars.next() {
        match c {
            '\\' if quote == '"' => {
                chars.next();
            }
            c if c == quote => {
                if quote == '\'' && matches!(chars.peek(), Some((_, '\''))) {
                    chars.next();
                } else {
                    return Some(i + c.len_utf8());
                }
            }
            _ => {}
        }
    }
    None
}
