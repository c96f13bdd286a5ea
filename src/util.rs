use std::borrow::Cow;
use std::num::ParseIntError;

use crate::lexer::is_ident;

/// UTF-8 encoded Byte Order Mark, occasionally left behind by editors on other platforms.
const BOM_UTF8: &[u8] = &[0xEF, 0xBB, 0xBF];

/// Splits an unnamed-section selector such as `@interface[-1]` into its type and index.
///
/// Negative indices count from the end of the same-type group.
pub fn parse_selector(selector: &str) -> Result<(&str, isize), SelectorError> {
    if selector.len() < 5 {
        return Err(SelectorError::TooShort);
    }
    let Some(rest) = selector.strip_prefix('@') else {
        return Err(SelectorError::MissingAt);
    };
    if rest.contains('@') {
        return Err(SelectorError::MultipleAt);
    }
    if rest.matches('[').count() > 1 {
        return Err(SelectorError::MultipleOpenBrackets);
    }
    if rest.matches(']').count() > 1 {
        return Err(SelectorError::MultipleClosedBrackets);
    }

    let (kind, index) = rest
        .strip_suffix(']')
        .and_then(|rest| rest.split_once('['))
        .filter(|(kind, _)| !kind.is_empty())
        .ok_or(SelectorError::Format)?;

    let index = index.parse().map_err(|source| SelectorError::Index {
        index: index.to_owned(),
        source,
    })?;

    Ok((kind, index))
}

/// Decodes the boolean vocabulary understood by UCI consumers.
#[must_use]
pub fn parse_bool(value: &str) -> Option<bool> {
    match value {
        "1" | "on" | "true" | "yes" | "enabled" => Some(true),
        "0" | "off" | "false" | "no" | "disabled" => Some(false),
        _ => None,
    }
}

/// Whether `name` can be written unquoted as a section type or option name.
pub(crate) fn is_identifier(name: &str) -> bool {
    !name.is_empty() && name.chars().all(is_ident)
}

/// UCI files are UTF-8; anything else is decoded lossily rather than rejected.
pub(crate) fn decode(data: &[u8]) -> Cow<'_, str> {
    String::from_utf8_lossy(data.strip_prefix(BOM_UTF8).unwrap_or(data))
}

/// 1-based line number of the byte at `offset`.
pub(crate) fn line_at(input: &str, offset: usize) -> usize {
    let head = input.get(..offset).unwrap_or(input);
    head.matches('\n').count() + 1
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SelectorError {
    #[error("implausible section selector: must be at least 5 characters long")]
    TooShort,
    #[error("invalid syntax: section selector must start with @ sign")]
    MissingAt,
    #[error("invalid syntax: multiple @ signs found")]
    MultipleAt,
    #[error("invalid syntax: multiple open brackets found")]
    MultipleOpenBrackets,
    #[error("invalid syntax: multiple closed brackets found")]
    MultipleClosedBrackets,
    #[error("invalid syntax: section selector must have format '@type[index]'")]
    Format,
    #[error("invalid section index {index:?}: {source}")]
    Index {
        index: String,
        source: ParseIntError,
    },
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("@a[0]", "a", 0)]
    #[case("@a[4223]", "a", 4223)]
    #[case("@a[-1]", "a", -1)]
    #[case("@abcdEFGHijkl[-255]", "abcdEFGHijkl", -255)]
    #[case("@wifi-iface[2]", "wifi-iface", 2)]
    fn valid_selectors(#[case] selector: &str, #[case] kind: &str, #[case] index: isize) {
        assert_eq!(parse_selector(selector), Ok((kind, index)));
    }

    #[rstest]
    #[case("", "implausible section selector: must be at least 5 characters long")]
    #[case("aa[0]", "invalid syntax: section selector must start with @ sign")]
    #[case("@@[0]", "invalid syntax: multiple @ signs found")]
    #[case("@@@@@@@@@@@", "invalid syntax: multiple @ signs found")]
    #[case("@[[0]", "invalid syntax: multiple open brackets found")]
    #[case("@][0]", "invalid syntax: multiple closed brackets found")]
    #[case("@aa0]", "invalid syntax: section selector must have format '@type[index]'")]
    #[case("@[00]", "invalid syntax: section selector must have format '@type[index]'")]
    fn malformed_selectors(#[case] selector: &str, #[case] message: &str) {
        let error = parse_selector(selector).expect_err("selector should be rejected");
        assert_eq!(error.to_string(), message);
    }

    #[rstest]
    #[case("@a[b]", "b")]
    #[case("@abcdEFGHijkl[0xff]", "0xff")]
    fn non_integer_index(#[case] selector: &str, #[case] expected: &str) {
        match parse_selector(selector) {
            Err(SelectorError::Index { index, .. }) => assert_eq!(index, expected),
            other => panic!("expected index error, got {other:?}"),
        }
    }

    #[rstest]
    #[case("1", Some(true))]
    #[case("on", Some(true))]
    #[case("true", Some(true))]
    #[case("yes", Some(true))]
    #[case("enabled", Some(true))]
    #[case("0", Some(false))]
    #[case("off", Some(false))]
    #[case("false", Some(false))]
    #[case("no", Some(false))]
    #[case("disabled", Some(false))]
    #[case("ap", None)]
    #[case("", None)]
    fn boolean_vocabulary(#[case] value: &str, #[case] expected: Option<bool>) {
        assert_eq!(parse_bool(value), expected);
    }

    #[test]
    fn decode_strips_bom() {
        assert_eq!(decode(b"\xEF\xBB\xBFconfig foo\n"), "config foo\n");
        assert_eq!(decode(b"config foo\n"), "config foo\n");
    }

    #[rstest]
    #[case("interface", true)]
    #[case("wifi-iface", true)]
    #[case("log_size", true)]
    #[case("", false)]
    #[case("two words", false)]
    #[case("a.b", false)]
    #[case("it's", false)]
    fn identifiers(#[case] name: &str, #[case] expected: bool) {
        assert_eq!(is_identifier(name), expected);
    }

    #[test]
    fn line_numbers() {
        let input = "config foo\n\toption bar 'baz\n";
        assert_eq!(line_at(input, 0), 1);
        assert_eq!(line_at(input, 11), 2);
        assert_eq!(line_at(input, input.len()), 3);
    }
}
