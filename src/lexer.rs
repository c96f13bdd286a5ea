use std::collections::VecDeque;
use std::fmt;
use std::iter::FusedIterator;

use tracing::trace;

const PACKAGE: &str = "package";
const CONFIG: &str = "config";
const OPTION: &str = "option";
const LIST: &str = "list";

/// Longest value rendered in full by `Lexeme`'s `Display` implementation.
const DISPLAY_WIDTH: usize = 25;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LexemeKind {
    /// Lexing failed; the lexeme text holds the message.
    Error,
    Eof,
    Package,
    Config,
    Option,
    List,
    Ident,
    String,
}

impl fmt::Display for LexemeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::Error => "Error".fmt(f),
            Self::Eof => "EOF".fmt(f),
            Self::Package => "Package".fmt(f),
            Self::Config => "Config".fmt(f),
            Self::Option => "Option".fmt(f),
            Self::List => "List".fmt(f),
            Self::Ident => "Ident".fmt(f),
            Self::String => "String".fmt(f),
        }
    }
}

/// The smallest lexical unit of a UCI file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lexeme {
    kind: LexemeKind,
    text: String,
    offset: usize,
}

impl Lexeme {
    #[must_use]
    pub fn new(kind: LexemeKind, text: impl Into<String>, offset: usize) -> Self {
        Self {
            kind,
            text: text.into(),
            offset,
        }
    }

    #[must_use]
    pub fn kind(&self) -> LexemeKind {
        self.kind
    }

    /// Raw text of the lexeme. Quoted strings have their quotes removed, but escape sequences
    /// are kept verbatim.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Byte offset of the lexeme within the input.
    #[must_use]
    pub fn offset(&self) -> usize {
        self.offset
    }

    pub(crate) fn into_text(self) -> String {
        self.text
    }
}

impl fmt::Display for Lexeme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.kind != LexemeKind::Error && self.text.chars().count() > DISPLAY_WIDTH {
            let head = self.text.chars().take(DISPLAY_WIDTH).collect::<String>();
            write!(f, "({} {head:?}... {})", self.kind, self.offset)
        } else {
            write!(f, "({} {:?} {})", self.kind, self.text, self.offset)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Keyword,
    Comment,
    Package,
    PackageName,
    Config,
    SectionType,
    SectionName,
    Option,
    List,
    OptionName,
    Value,
    Quoted,
    Unquoted,
    Done,
}

/// Pull-based lexer over UCI text.
///
/// The stream always ends with exactly one [`LexemeKind::Eof`] or one [`LexemeKind::Error`]
/// lexeme; nothing is produced after that.
#[derive(Debug, Clone)]
pub struct Lexer<'a> {
    name: &'a str,
    input: &'a str,
    start: usize,
    pos: usize,
    state: State,
    pending: VecDeque<Lexeme>,
}

impl<'a> Lexer<'a> {
    /// `name` is only used for diagnostics.
    #[must_use]
    pub fn new(name: &'a str, input: &'a str) -> Self {
        Self {
            name,
            input,
            start: 0,
            pos: 0,
            state: State::Keyword,
            pending: VecDeque::with_capacity(2),
        }
    }
}

impl Lexer<'_> {
    /// Current byte position within the input.
    #[must_use]
    pub fn offset(&self) -> usize {
        self.pos
    }

    fn step(&mut self) -> State {
        match self.state {
            State::Keyword => self.lex_keyword(),
            State::Comment => self.lex_comment(),
            State::Package => self.lex_keyword_token(PACKAGE, LexemeKind::Package),
            State::PackageName => self.lex_package_name(),
            State::Config => self.lex_keyword_token(CONFIG, LexemeKind::Config),
            State::SectionType => self.lex_section_type(),
            State::SectionName => self.lex_section_name(),
            State::Option => self.lex_keyword_token(OPTION, LexemeKind::Option),
            State::List => self.lex_keyword_token(LIST, LexemeKind::List),
            State::OptionName => self.lex_option_name(),
            State::Value => self.lex_value(),
            State::Quoted => self.lex_quoted(),
            State::Unquoted => self.lex_unquoted(),
            State::Done => State::Done,
        }
    }

    fn lex_keyword(&mut self) -> State {
        while matches!(self.peek(), Some(' ' | '\t' | '\n')) {
            _ = self.bump();
        }
        self.ignore();

        let rest = self.rest();
        if rest.starts_with('#') {
            State::Comment
        } else if rest.starts_with(PACKAGE) {
            State::Package
        } else if rest.starts_with(CONFIG) {
            State::Config
        } else if rest.starts_with(OPTION) {
            State::Option
        } else if rest.starts_with(LIST) {
            State::List
        } else if rest.is_empty() {
            self.emit(LexemeKind::Eof);
            State::Done
        } else {
            self.fail("expected keyword (package, config, option, list) or eof")
        }
    }

    /// Comments run until the end of the line; the newline itself is left for `lex_keyword`.
    fn lex_comment(&mut self) -> State {
        while self.peek().is_some_and(|c| c != '\n') {
            _ = self.bump();
        }
        self.ignore();
        State::Keyword
    }

    fn lex_keyword_token(&mut self, keyword: &str, kind: LexemeKind) -> State {
        self.pos += keyword.len();
        self.emit(kind);
        self.skip_blanks();

        match kind {
            LexemeKind::Package => State::PackageName,
            LexemeKind::Config => State::SectionType,
            _ => State::OptionName,
        }
    }

    fn lex_package_name(&mut self) -> State {
        self.skip_blanks();
        match self.peek() {
            Some('\'' | '"') => State::Quoted,
            _ => self.fail("incomplete package name"),
        }
    }

    fn lex_section_type(&mut self) -> State {
        self.accept_ident();
        self.emit_non_empty(LexemeKind::Ident);
        self.skip_blanks();
        State::SectionName
    }

    fn lex_section_name(&mut self) -> State {
        match self.peek() {
            Some('\n') => {
                _ = self.bump();
                self.ignore();
                State::Keyword
            }
            Some('\'' | '"') => State::Quoted,
            Some(c) if is_ident(c) => {
                self.accept_ident();
                self.emit(LexemeKind::String);
                State::Keyword
            }
            _ => State::Keyword,
        }
    }

    fn lex_option_name(&mut self) -> State {
        self.accept_ident();
        self.emit_non_empty(LexemeKind::Ident);
        self.skip_blanks();
        State::Value
    }

    fn lex_value(&mut self) -> State {
        match self.peek() {
            Some('\'' | '"') => State::Quoted,
            _ => State::Unquoted,
        }
    }

    fn lex_quoted(&mut self) -> State {
        let quote = match self.bump() {
            Some(q @ ('\'' | '"')) => q,
            _ => return self.fail("expected quotation"),
        };

        loop {
            match self.peek() {
                None | Some('\n') => return self.fail("unterminated quoted string"),
                Some('\\') => {
                    _ = self.bump();
                    if self.bump().is_none() {
                        return self.fail("unterminated quoted string");
                    }
                }
                Some(c) => {
                    _ = self.bump();
                    if c == quote {
                        break;
                    }
                }
            }
        }

        self.emit_quoted();
        self.skip_blanks();
        State::Keyword
    }

    fn lex_unquoted(&mut self) -> State {
        loop {
            match self.peek() {
                None => return self.fail("unterminated unquoted string"),
                Some(' ' | '\t' | '\n') => break,
                Some('\\') => {
                    _ = self.bump();
                    if self.bump().is_none() {
                        return self.fail("unterminated unquoted string");
                    }
                }
                Some(_) => {
                    _ = self.bump();
                }
            }
        }

        self.emit_non_empty(LexemeKind::String);
        self.skip_blanks();
        if self.peek() == Some('\n') {
            _ = self.bump();
        }
        self.ignore();
        State::Keyword
    }

    fn rest(&self) -> &str {
        &self.input[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn ignore(&mut self) {
        self.start = self.pos;
    }

    fn skip_blanks(&mut self) {
        while matches!(self.peek(), Some(' ' | '\t')) {
            _ = self.bump();
        }
        self.ignore();
    }

    fn accept_ident(&mut self) {
        while self.peek().is_some_and(is_ident) {
            _ = self.bump();
        }
    }

    fn emit(&mut self, kind: LexemeKind) {
        let text = &self.input[self.start..self.pos];
        self.pending.push_back(Lexeme::new(kind, text, self.start));
        self.start = self.pos;
    }

    fn emit_non_empty(&mut self, kind: LexemeKind) {
        if self.pos > self.start {
            self.emit(kind);
        }
    }

    /// Emits the pending input without its surrounding quotes.
    fn emit_quoted(&mut self) {
        let text = &self.input[self.start + 1..self.pos - 1];
        self.pending
            .push_back(Lexeme::new(LexemeKind::String, text, self.start));
        self.start = self.pos;
    }

    fn fail(&mut self, message: &str) -> State {
        trace!(name = self.name, offset = self.pos, error = message, "lexing failed");
        self.pending
            .push_back(Lexeme::new(LexemeKind::Error, message, self.pos));
        State::Done
    }
}

impl Iterator for Lexer<'_> {
    type Item = Lexeme;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(lexeme) = self.pending.pop_front() {
                return Some(lexeme);
            }
            if self.state == State::Done {
                return None;
            }
            self.state = self.step();
        }
    }
}

impl FusedIterator for Lexer<'_> {}

pub(crate) fn is_ident(c: char) -> bool {
    c == '-' || c == '_' || c.is_ascii_alphanumeric()
}

#[cfg(test)]
mod tests {
    use super::*;

    use LexemeKind::{Config, Eof, Error, Ident, List, Option, Package, String};

    fn lex(input: &str) -> Vec<(LexemeKind, std::string::String)> {
        Lexer::new("test", input)
            .map(|lexeme| (lexeme.kind(), lexeme.text().to_owned()))
            .collect()
    }

    fn expected(items: &[(LexemeKind, &str)]) -> Vec<(LexemeKind, std::string::String)> {
        items
            .iter()
            .map(|&(kind, text)| (kind, text.to_owned()))
            .collect()
    }

    #[test]
    fn empty_input() {
        assert_eq!(lex(""), expected(&[(Eof, "")]));
        assert_eq!(lex("  \n\t\n\n \n "), expected(&[(Eof, "")]));
    }

    #[test]
    fn simple_section() {
        let input = "config sectiontype 'sectionname'\n\toption optionname 'optionvalue'\n";

        assert_eq!(
            lex(input),
            expected(&[
                (Config, "config"),
                (Ident, "sectiontype"),
                (String, "sectionname"),
                (Option, "option"),
                (Ident, "optionname"),
                (String, "optionvalue"),
                (Eof, ""),
            ])
        );
    }

    #[test]
    fn package_and_quoting_styles() {
        let input = r#"package "pkgname"
config empty
config squoted 'sqname'
config dquoted "dqname"
config multiline 'line1\
	line2'
"#;

        assert_eq!(
            lex(input),
            expected(&[
                (Package, "package"),
                (String, "pkgname"),
                (Config, "config"),
                (Ident, "empty"),
                (Config, "config"),
                (Ident, "squoted"),
                (String, "sqname"),
                (Config, "config"),
                (Ident, "dquoted"),
                (String, "dqname"),
                (Config, "config"),
                (Ident, "multiline"),
                (String, "line1\\\n\tline2"),
                (Eof, ""),
            ])
        );
    }

    #[test]
    fn unquoted_values() {
        assert_eq!(
            lex("config foo bar\noption answer 42\n"),
            expected(&[
                (Config, "config"),
                (Ident, "foo"),
                (String, "bar"),
                (Option, "option"),
                (Ident, "answer"),
                (String, "42"),
                (Eof, ""),
            ])
        );
    }

    #[test]
    fn lists_and_hyphenated_identifiers() {
        let input = "
config wifi-device wl0
	option type    'broadcom'
	list channels 1
	list channels '6'
";

        assert_eq!(
            lex(input),
            expected(&[
                (Config, "config"),
                (Ident, "wifi-device"),
                (String, "wl0"),
                (Option, "option"),
                (Ident, "type"),
                (String, "broadcom"),
                (List, "list"),
                (Ident, "channels"),
                (String, "1"),
                (List, "list"),
                (Ident, "channels"),
                (String, "6"),
                (Eof, ""),
            ])
        );
    }

    #[test]
    fn comments_are_skipped() {
        let input = "
# heading

# another heading
config foo
	option opt1 1
	# option opt1 2
	option opt2 3 # baa
	option opt3 hello

# eof
";

        assert_eq!(
            lex(input),
            expected(&[
                (Config, "config"),
                (Ident, "foo"),
                (Option, "option"),
                (Ident, "opt1"),
                (String, "1"),
                (Option, "option"),
                (Ident, "opt2"),
                (String, "3"),
                (Option, "option"),
                (Ident, "opt3"),
                (String, "hello"),
                (Eof, ""),
            ])
        );
    }

    #[test]
    fn empty_quoted_value() {
        assert_eq!(
            lex("config foo\n\toption empty ''\n"),
            expected(&[
                (Config, "config"),
                (Ident, "foo"),
                (Option, "option"),
                (Ident, "empty"),
                (String, ""),
                (Eof, ""),
            ])
        );
    }

    #[test]
    fn not_a_uci_file() {
        let input = "\n<?xml version=\"1.0\">\n<error message=\"not a UCI file\" />\n";

        assert_eq!(
            lex(input),
            expected(&[(
                Error,
                "expected keyword (package, config, option, list) or eof"
            )])
        );
    }

    #[test]
    fn incomplete_package_name() {
        assert_eq!(
            lex("\npackage\n"),
            expected(&[(Package, "package"), (Error, "incomplete package name")])
        );
        assert_eq!(
            lex("package pkgname\n"),
            expected(&[(Package, "package"), (Error, "incomplete package name")])
        );
    }

    #[test]
    fn unterminated_quoted_string() {
        assert_eq!(
            lex("\nconfig foo \"bar\n"),
            expected(&[
                (Config, "config"),
                (Ident, "foo"),
                (Error, "unterminated quoted string"),
            ])
        );
        assert_eq!(
            lex("config foo 'bar\\"),
            expected(&[
                (Config, "config"),
                (Ident, "foo"),
                (Error, "unterminated quoted string"),
            ])
        );
    }

    #[test]
    fn unterminated_unquoted_string() {
        assert_eq!(
            lex("\nconfig foo\n\toption opt opt\\\n"),
            expected(&[
                (Config, "config"),
                (Ident, "foo"),
                (Option, "option"),
                (Ident, "opt"),
                (Error, "unterminated unquoted string"),
            ])
        );
    }

    #[test]
    fn nothing_after_error() {
        let mut lexer = Lexer::new("test", "config foo \"bar\nconfig baz\n");

        let lexemes = lexer.by_ref().collect::<Vec<_>>();
        assert_eq!(lexemes.last().map(Lexeme::kind), Some(Error));
        assert_eq!(lexer.next(), None);
    }

    #[test]
    fn offsets_point_at_lexeme_start() {
        let lexemes = Lexer::new("test", "config foo 'bar'\n").collect::<Vec<_>>();

        let offsets = lexemes.iter().map(Lexeme::offset).collect::<Vec<_>>();
        assert_eq!(offsets, vec![0, 7, 11, 17]);
    }

    #[test]
    fn lexeme_display() {
        assert_eq!(
            Lexeme::new(String, "foo", 42).to_string(),
            r#"(String "foo" 42)"#
        );
        assert_eq!(
            Lexeme::new(String, "foo 0123456789 bar 0123456789", 42).to_string(),
            r#"(String "foo 0123456789 bar 012345"... 42)"#
        );
        assert_eq!(
            Lexeme::new(Error, "foo 0123456789 bar 0123456789", 42).to_string(),
            r#"(Error "foo 0123456789 bar 0123456789" 42)"#
        );
    }
}
