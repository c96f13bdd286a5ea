use tracing::trace;

use crate::config::Config;
use crate::error::{LexError, ParseError};
use crate::lexer::Lexeme;
use crate::scanner::{Scanner, Token};
use crate::section::OptionKind;
use crate::util::line_at;

/// Parses `input` into a document called `name`.
pub fn parse(name: &str, input: &str) -> Result<Config, ParseError> {
    Parser::new(name, input).into_config()
}

/// Represents an on-going parse.
#[derive(Debug, Clone)]
pub struct Parser<'a> {
    name: &'a str,
    input: &'a str,
    scanner: Scanner<'a>,
}

impl<'a> Parser<'a> {
    #[must_use]
    pub fn new(name: &'a str, input: &'a str) -> Self {
        Self {
            name,
            input,
            scanner: Scanner::new(name, input),
        }
    }
}

impl Parser<'_> {
    /// Folds every declaration into one document. Repeated section names merge into the first
    /// declaration instead of producing duplicates.
    pub fn into_config(self) -> Result<Config, ParseError> {
        let Self {
            name,
            input,
            scanner,
        } = self;

        let mut config = Config::new(name);
        let mut current = None::<usize>;

        for token in scanner {
            match token {
                Token::Eof => break,
                Token::Package { name: token } => {
                    return Err(ParseError::Unsupported {
                        name: name.to_owned(),
                        token,
                    });
                }
                Token::Section { kind, name: section } => {
                    let position = config.declare(kind.text(), section.as_ref().map(Lexeme::text));
                    current = Some(position);
                }
                Token::Option { name: option, value } => {
                    merge(&mut config, current, option, value, OptionKind::Single)
                        .map_err(|found| syntax_error(name, input, found))?;
                }
                Token::List { name: option, value } => {
                    merge(&mut config, current, option, value, OptionKind::List)
                        .map_err(|found| syntax_error(name, input, found))?;
                }
                Token::Error {
                    message,
                    offset,
                    found: None,
                } => {
                    return Err(ParseError::Lex {
                        name: name.to_owned(),
                        source: LexError {
                            message,
                            line: line_at(input, offset),
                            offset,
                        },
                    });
                }
                Token::Error {
                    message,
                    offset,
                    found,
                } => {
                    return Err(ParseError::Syntax {
                        name: name.to_owned(),
                        message,
                        line: line_at(input, offset),
                        token: found,
                    });
                }
            }
        }

        trace!(name, sections = config.sections().len(), "parsed config");
        Ok(config)
    }
}

/// Returns the option name back when there is no section to put it in.
fn merge(
    config: &mut Config,
    current: Option<usize>,
    name: Lexeme,
    value: Lexeme,
    kind: OptionKind,
) -> Result<(), Lexeme> {
    let Some(section) = current.and_then(|i| config.section_at_mut(i)) else {
        return Err(name);
    };

    section.merge(name.into_text(), value.into_text(), kind);
    Ok(())
}

fn syntax_error(name: &str, input: &str, found: Lexeme) -> ParseError {
    ParseError::Syntax {
        name: name.to_owned(),
        message: "expected config declaration".to_owned(),
        line: line_at(input, found.offset()),
        token: Some(found),
    }
}
