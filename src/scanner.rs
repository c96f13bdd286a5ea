use std::fmt;
use std::iter::FusedIterator;

use crate::lexer::{Lexeme, LexemeKind, Lexer};

/// A declaration grouped from one or more lexemes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// `package <string>`
    Package { name: Lexeme },
    /// `config <ident> [<string>]`
    Section { kind: Lexeme, name: Option<Lexeme> },
    /// `option <ident> <string>`
    Option { name: Lexeme, value: Lexeme },
    /// `list <ident> <string>`
    List { name: Lexeme, value: Lexeme },
    /// Scanning stopped. `found` holds the lexeme that broke the grammar; it is `None` when the
    /// lexer itself failed.
    Error {
        message: String,
        offset: usize,
        found: Option<Lexeme>,
    },
    Eof,
}

impl Token {
    fn lexical(lexeme: Lexeme) -> Self {
        Self::Error {
            offset: lexeme.offset(),
            message: lexeme.into_text(),
            found: None,
        }
    }

    fn unexpected(message: &str, found: Lexeme) -> Self {
        Self::Error {
            message: message.to_owned(),
            offset: found.offset(),
            found: Some(found),
        }
    }

    fn keyword(&self) -> &'static str {
        match self {
            Self::Package { .. } => "package",
            Self::Section { .. } => "config",
            Self::Option { .. } => "option",
            Self::List { .. } => "list",
            Self::Error { .. } => "error",
            Self::Eof => "eof",
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[", self.keyword())?;
        match self {
            Self::Package { name } => write!(f, "{name}")?,
            Self::Section { kind, name } => {
                write!(f, "{kind}")?;
                if let Some(name) = name {
                    write!(f, " {name}")?;
                }
            }
            Self::Option { name, value } | Self::List { name, value } => {
                write!(f, "{name} {value}")?;
            }
            Self::Error { message, .. } => write!(f, "{message:?}")?,
            Self::Eof => {}
        }
        "]".fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Start,
    Options,
    Done,
}

/// Groups the lexeme stream into declarations.
///
/// Produces tokens until (and including) a terminal [`Token::Eof`] or [`Token::Error`].
#[derive(Debug, Clone)]
pub struct Scanner<'a> {
    lexer: Lexer<'a>,
    pushback: Option<Lexeme>,
    state: State,
}

impl<'a> Scanner<'a> {
    #[must_use]
    pub fn new(name: &'a str, input: &'a str) -> Self {
        Self {
            lexer: Lexer::new(name, input),
            pushback: None,
            state: State::Start,
        }
    }
}

impl Scanner<'_> {
    fn next_lexeme(&mut self) -> Option<Lexeme> {
        self.pushback.take().or_else(|| self.lexer.next())
    }

    fn scan_start(&mut self) -> Token {
        let Some(lexeme) = self.next_lexeme() else {
            return Token::Eof;
        };

        let result = match lexeme.kind() {
            LexemeKind::Eof => Ok(Token::Eof),
            LexemeKind::Error => Err(Token::lexical(lexeme)),
            LexemeKind::Package => self
                .expect(LexemeKind::String, "expected package name")
                .map(|name| Token::Package { name }),
            LexemeKind::Config => self.scan_section(),
            LexemeKind::Option | LexemeKind::List => {
                Err(Token::unexpected("expected config declaration", lexeme))
            }
            LexemeKind::Ident | LexemeKind::String => {
                Err(Token::unexpected("expected keyword", lexeme))
            }
        };

        result.unwrap_or_else(|error| error)
    }

    fn scan_section(&mut self) -> Result<Token, Token> {
        let kind = self.expect(LexemeKind::Ident, "expected section type")?;
        let name = match self.next_lexeme() {
            Some(lexeme) if lexeme.kind() == LexemeKind::String => Some(lexeme),
            other => {
                self.pushback = other;
                None
            }
        };

        self.state = State::Options;
        Ok(Token::Section { kind, name })
    }

    /// Returns `None` once the section body ends, handing the lexeme back to the start state.
    fn scan_option(&mut self) -> Option<Token> {
        let lexeme = self.next_lexeme();
        let list = match lexeme.as_ref().map(Lexeme::kind) {
            Some(LexemeKind::Option) => false,
            Some(LexemeKind::List) => true,
            _ => {
                self.pushback = lexeme;
                self.state = State::Start;
                return None;
            }
        };

        let result = self
            .expect(LexemeKind::Ident, "expected option name")
            .and_then(|name| {
                let value = self.expect(LexemeKind::String, "expected option value")?;
                Ok(if list {
                    Token::List { name, value }
                } else {
                    Token::Option { name, value }
                })
            });

        Some(result.unwrap_or_else(|error| error))
    }

    fn expect(&mut self, kind: LexemeKind, message: &str) -> Result<Lexeme, Token> {
        match self.next_lexeme() {
            Some(lexeme) if lexeme.kind() == kind => Ok(lexeme),
            Some(lexeme) if lexeme.kind() == LexemeKind::Error => Err(Token::lexical(lexeme)),
            Some(lexeme) => Err(Token::unexpected(message, lexeme)),
            None => Err(Token::unexpected(
                message,
                Lexeme::new(LexemeKind::Eof, "", self.lexer.offset()),
            )),
        }
    }
}

impl Iterator for Scanner<'_> {
    type Item = Token;

    fn next(&mut self) -> Option<Self::Item> {
        let token = loop {
            match self.state {
                State::Done => return None,
                State::Start => break self.scan_start(),
                State::Options => {
                    if let Some(token) = self.scan_option() {
                        break token;
                    }
                }
            }
        };

        if matches!(token, Token::Error { .. } | Token::Eof) {
            self.state = State::Done;
        }
        Some(token)
    }
}

impl FusedIterator for Scanner<'_> {}
