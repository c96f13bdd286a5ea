use std::path::PathBuf;
use std::{fmt, io};

use crate::lexer::Lexeme;
use crate::util::SelectorError;

/// A malformed token, such as an unterminated quoted string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message} (line {line}, offset {offset})")]
pub struct LexError {
    pub message: String,
    /// 1-based line of the failure.
    pub line: usize,
    /// Byte offset of the failure.
    pub offset: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum ParseError {
    #[error("{name}: {source}")]
    Lex { name: String, source: LexError },
    /// The declarations are out of order; `token` is the lexeme that broke the grammar.
    #[error("{name}:{line}: {message}{}", found(.token.as_ref()))]
    Syntax {
        name: String,
        message: String,
        line: usize,
        token: Option<Lexeme>,
    },
    #[error("{name}: imports/exports are not yet supported: {token}")]
    Unsupported { name: String, token: Lexeme },
}

fn found(token: Option<&Lexeme>) -> String {
    token.map(|token| format!(", found {token}")).unwrap_or_default()
}

/// The step of an atomic write that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Create,
    Write,
    Chmod,
    Sync,
    Rename,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::Create => "create".fmt(f),
            Self::Write => "write".fmt(f),
            Self::Chmod => "chmod".fmt(f),
            Self::Sync => "sync".fmt(f),
            Self::Rename => "rename".fmt(f),
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    #[error("config {0:?} is already loaded")]
    ConfigAlreadyLoaded(String),
    #[error("config {0:?} not found")]
    ConfigNotFound(String),
    #[error("section {config}.{section} not found")]
    SectionNotFound { config: String, section: String },
    #[error("option {config}.{section}.{option} not found")]
    OptionNotFound {
        config: String,
        section: String,
        option: String,
    },
    #[error("type mismatch for {config}.{section}, got {existing}, want {requested}")]
    SectionTypeMismatch {
        config: String,
        section: String,
        existing: String,
        requested: String,
    },
    /// A section type, section name or option name that could not be written back.
    #[error("invalid {what} name {name:?}")]
    InvalidName { what: &'static str, name: String },
    #[error("{value:?} is not a boolean")]
    NotABoolean { value: String },
    #[error("failed to read config {name:?}")]
    Read {
        name: String,
        #[source]
        source: io::Error,
    },
    #[error("{phase} {}: {source}", .path.display())]
    Persist {
        path: PathBuf,
        phase: Phase,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Selector(#[from] SelectorError),
}

impl Error {
    /// Whether the error reports something absent rather than broken.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::ConfigNotFound(_) | Self::SectionNotFound { .. } | Self::OptionNotFound { .. } => {
                true
            }
            Self::Read { source, .. } => source.kind() == io::ErrorKind::NotFound,
            _ => false,
        }
    }
}
