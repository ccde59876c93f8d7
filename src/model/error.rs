use thiserror::Error;

use crate::position::LineCol;

/// Failures while turning one file's text into a walked syntax tree.
///
/// These never leave the parser: they are folded into the file's validity.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigFileError {
    #[error("{message}")]
    Syntax {
        message: String,
        position: Option<LineCol>,
    },
    #[error("document nests deeper than {0} levels")]
    TooDeep(usize),
    #[error("unexpected {0} while building the syntax tree")]
    UnexpectedEvent(String),
}

impl ConfigFileError {
    pub fn position(&self) -> Option<LineCol> {
        match self {
            ConfigFileError::Syntax { position, .. } => *position,
            ConfigFileError::TooDeep(_) | ConfigFileError::UnexpectedEvent(_) => None,
        }
    }
}
