//! Parsing surface text into [`Sexp`] trees.
//!
//! Built from nom combinators plus a few hand-rolled token loops (string
//! escapes, symbol escapes). Grammar summary:
//!
//! - `&v` — box of `v`
//! - `(a b)` / `(a . b)` / `(a b . c)` — pair chains, `()` is nothing
//! - `{k . v ...}` — record with symbol keys
//! - `"..."` — string with `\t \n \r \" \\` escapes
//! - `true` / `false` — booleans
//! - decimal integers, promoted to bignums when wider than `i64`
//! - anything else — a symbol; `\` escapes the token-terminating
//!   characters (whitespace, `" & ( ) { }`) and a lone `.` is the
//!   dotted-tail marker rather than a symbol
//!
//! Nesting is capped at [`MAX_READ_DEPTH`] to keep hostile input from
//! overflowing the parse stack.

use std::cell::RefCell;
use std::rc::Rc;

use indexmap::IndexMap;
use nom::{
    IResult, Parser,
    branch::alt,
    character::complete::{char, multispace0},
    error::ErrorKind,
    sequence::{preceded, terminated},
};
use num_bigint::BigInt;

use crate::ast::Sexp;
use crate::intern::{Interner, Sym};
use crate::{Error, MAX_READ_DEPTH};

/// The interner, shared across the closure-shaped sub-parsers.
type Syms<'i> = RefCell<&'i mut Interner>;

/// Parse one complete value from `input`, consuming all of it (trailing
/// whitespace allowed).
pub fn read(input: &str, syms: &mut Interner) -> Result<Sexp, Error> {
    let syms = RefCell::new(syms);
    match terminated(|i| parse_sexp(i, &syms, 0), multispace0).parse(input) {
        Ok(("", value)) => Ok(value),
        Ok((remaining, _)) => Err(Error::ReadError(format!(
            "unexpected trailing input: '{remaining}'"
        ))),
        Err(e) => Err(Error::ReadError(read_error_message(input, e))),
    }
}

fn parse_sexp<'a>(input: &'a str, syms: &Syms<'_>, depth: usize) -> IResult<&'a str, Sexp> {
    if depth >= MAX_READ_DEPTH {
        return Err(nom::Err::Failure(nom::error::Error::new(
            input,
            ErrorKind::TooLarge,
        )));
    }
    preceded(
        multispace0,
        alt((
            |i| parse_box(i, syms, depth),
            |i| parse_list(i, syms, depth),
            |i| parse_record(i, syms, depth),
            parse_string,
            |i| parse_token(i, syms),
        )),
    )
    .parse(input)
}

fn parse_box<'a>(input: &'a str, syms: &Syms<'_>, depth: usize) -> IResult<&'a str, Sexp> {
    let (input, _) = char('&').parse(input)?;
    let (input, value) = parse_sexp(input, syms, depth + 1)?;
    Ok((input, Sexp::boxed(value)))
}

fn parse_list<'a>(input: &'a str, syms: &Syms<'_>, depth: usize) -> IResult<&'a str, Sexp> {
    let (mut rest, _) = char('(').parse(input)?;
    let mut elems = Vec::new();
    let mut tail = Sexp::Nothing;
    loop {
        let (r, _) = multispace0.parse(rest)?;
        if let Some(r) = r.strip_prefix(')') {
            rest = r;
            break;
        }
        if let Some(after) = strip_dot_marker(r) {
            // dotted tail: exactly one value, then the closer
            let (r, value) = parse_sexp(after, syms, depth + 1)?;
            let (r, _) = multispace0.parse(r)?;
            let Some(r) = r.strip_prefix(')') else {
                return Err(nom::Err::Failure(nom::error::Error::new(
                    r,
                    ErrorKind::Char,
                )));
            };
            tail = value;
            rest = r;
            break;
        }
        if r.is_empty() {
            return Err(nom::Err::Failure(nom::error::Error::new(r, ErrorKind::Eof)));
        }
        let (r, value) = parse_sexp(r, syms, depth + 1)?;
        elems.push(value);
        rest = r;
    }
    Ok((rest, Sexp::list_with_tail(elems, tail)))
}

fn parse_record<'a>(input: &'a str, syms: &Syms<'_>, depth: usize) -> IResult<&'a str, Sexp> {
    let (mut rest, _) = char('{').parse(input)?;
    let mut entries: IndexMap<Sym, Sexp> = IndexMap::new();
    loop {
        let (r, _) = multispace0.parse(rest)?;
        if let Some(r) = r.strip_prefix('}') {
            rest = r;
            break;
        }
        if r.is_empty() {
            return Err(nom::Err::Failure(nom::error::Error::new(r, ErrorKind::Eof)));
        }
        let (r, key) = parse_sexp(r, syms, depth + 1)?;
        let Sexp::Symbol(key) = key else {
            return Err(nom::Err::Failure(nom::error::Error::new(
                rest,
                ErrorKind::Verify,
            )));
        };
        let (r, _) = multispace0.parse(r)?;
        let Some(after) = strip_dot_marker(r) else {
            // a dot must sit between key and value
            return Err(nom::Err::Failure(nom::error::Error::new(
                r,
                ErrorKind::Char,
            )));
        };
        let (r, value) = parse_sexp(after, syms, depth + 1)?;
        entries.insert(key, value);
        rest = r;
    }
    Ok((rest, Sexp::Record(Rc::new(RefCell::new(entries)))))
}

fn parse_string(input: &str) -> IResult<&str, Sexp> {
    let (mut remaining, _) = char('"').parse(input)?;
    let mut text = String::new();
    loop {
        let mut iter = remaining.chars();
        match iter.next() {
            Some('"') => return Ok((iter.as_str(), Sexp::text(&text))),
            Some('\\') => {
                match iter.next() {
                    Some('t') => text.push('\t'),
                    Some('n') => text.push('\n'),
                    Some('r') => text.push('\r'),
                    Some('"') => text.push('"'),
                    Some('\\') => text.push('\\'),
                    _ => {
                        return Err(nom::Err::Failure(nom::error::Error::new(
                            remaining,
                            ErrorKind::Escaped,
                        )));
                    }
                }
                remaining = iter.as_str();
            }
            Some(c) => {
                text.push(c);
                remaining = iter.as_str();
            }
            None => {
                return Err(nom::Err::Failure(nom::error::Error::new(
                    remaining,
                    ErrorKind::Eof,
                )));
            }
        }
    }
}

/// Parse a bare token and classify it as boolean, number, or symbol.
/// A token containing an escape is always a symbol.
fn parse_token<'a>(input: &'a str, syms: &Syms<'_>) -> IResult<&'a str, Sexp> {
    let mut rest = input;
    let mut text = String::new();
    let mut had_escape = false;
    loop {
        let mut iter = rest.chars();
        match iter.next() {
            None => break,
            Some(c) if is_delimiter(c) => break,
            Some('\\') => {
                had_escape = true;
                match iter.next() {
                    Some('t') => text.push('\t'),
                    Some('n') => text.push('\n'),
                    Some('r') => text.push('\r'),
                    Some(c @ (' ' | '"' | '\\' | '&' | '(' | ')' | '.' | '{' | '}')) => {
                        text.push(c);
                    }
                    _ => {
                        return Err(nom::Err::Failure(nom::error::Error::new(
                            rest,
                            ErrorKind::Escaped,
                        )));
                    }
                }
                rest = iter.as_str();
            }
            Some(c) => {
                text.push(c);
                rest = iter.as_str();
            }
        }
    }
    if text.is_empty() {
        return Err(nom::Err::Error(nom::error::Error::new(
            input,
            ErrorKind::TakeWhile1,
        )));
    }

    if !had_escape {
        if text == "true" {
            return Ok((rest, Sexp::Bool(true)));
        }
        if text == "false" {
            return Ok((rest, Sexp::Bool(false)));
        }
        let digits = text.strip_prefix('-').unwrap_or(&text);
        if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(n) = text.parse::<i64>() {
                return Ok((rest, Sexp::Int(n)));
            }
            if let Ok(n) = text.parse::<BigInt>() {
                return Ok((rest, Sexp::Big(Rc::new(n))));
            }
        } else if starts_like_number(&text) {
            // digit-led tokens that are not integers ("1.5", "12abc")
            return Err(nom::Err::Failure(nom::error::Error::new(
                input,
                ErrorKind::Digit,
            )));
        }
    }

    Ok((rest, Sexp::Symbol(syms.borrow_mut().intern(&text))))
}

fn starts_like_number(text: &str) -> bool {
    let mut chars = text.chars();
    match chars.next() {
        Some(c) if c.is_ascii_digit() => true,
        Some('-') => chars.next().is_some_and(|c| c.is_ascii_digit()),
        _ => false,
    }
}

fn is_delimiter(c: char) -> bool {
    c.is_whitespace() || "\"&(){}".contains(c)
}

/// A bare `.` (followed by a delimiter or the end of input) marks a
/// dotted tail. An escaped `\.` stays an ordinary symbol.
fn strip_dot_marker(input: &str) -> Option<&str> {
    let after = input.strip_prefix('.')?;
    match after.chars().next() {
        None => Some(after),
        Some(c) if is_delimiter(c) => Some(after),
        Some(_) => None,
    }
}

fn read_error_message(input: &str, error: nom::Err<nom::error::Error<&str>>) -> String {
    match error {
        nom::Err::Error(e) | nom::Err::Failure(e) => {
            let position = input.len().saturating_sub(e.input.len());
            match e.code {
                ErrorKind::TooLarge => {
                    format!("nesting exceeds the depth limit ({MAX_READ_DEPTH})")
                }
                ErrorKind::Digit => format!("malformed number at position {position}"),
                ErrorKind::Escaped => format!("unknown escape at position {position}"),
                ErrorKind::Verify => format!("record key must be a symbol at position {position}"),
                ErrorKind::Eof => "unterminated form".to_owned(),
                _ => {
                    if position < input.len() {
                        let near: String = input.chars().skip(position).take(10).collect();
                        format!("invalid syntax near '{near}'")
                    } else {
                        "unexpected end of input".to_owned()
                    }
                }
            }
        }
        nom::Err::Incomplete(_) => "incomplete input".to_owned(),
    }
}

#[cfg(test)]
#[expect(clippy::unwrap_used)] // test code OK
mod tests {
    use super::*;
    use crate::printer::print;

    /// Expected outcome of reading one input.
    #[derive(Debug)]
    enum ReadTestResult {
        /// Reading succeeds and the value prints back as this text.
        Prints(&'static str),
        /// Reading fails with an error containing this text.
        FailsWith(&'static str),
        /// Reading fails (any error).
        Fails,
    }
    use ReadTestResult::*;

    /// Run read tests; successful cases are also round-tripped through
    /// the printer and re-read to check `print . read` stability.
    fn run_read_tests(cases: Vec<(&str, ReadTestResult)>) {
        for (i, (input, expected)) in cases.iter().enumerate() {
            let test_id = format!("Read test #{}", i + 1);
            let mut syms = Interner::new();
            let result = read(input, &mut syms);
            match (result, expected) {
                (Ok(value), Prints(expected_text)) => {
                    let printed = print(&value, &syms);
                    assert_eq!(&printed, expected_text, "{test_id}: print mismatch");

                    let reread = read(&printed, &mut syms).unwrap_or_else(|e| {
                        panic!("{test_id}: round-trip read failed for '{printed}': {e}")
                    });
                    assert_eq!(
                        print(&reread, &syms),
                        printed,
                        "{test_id}: round-trip print mismatch for '{input}'"
                    );
                }
                (Err(_), Fails) => {}
                (Err(err), FailsWith(expected_text)) => {
                    let message = format!("{err}");
                    assert!(
                        message.contains(expected_text),
                        "{test_id}: error '{message}' should contain '{expected_text}'"
                    );
                }
                (Ok(value), Fails | FailsWith(_)) => {
                    panic!("{test_id}: expected an error, got {value:?}");
                }
                (Err(err), Prints(_)) => {
                    panic!("{test_id}: expected success, got error {err}");
                }
            }
        }
    }

    #[test]
    fn test_reader_comprehensive() {
        let cases = vec![
            // ===== NUMBERS =====
            ("0", Prints("0")),
            ("1", Prints("1")),
            ("100", Prints("100")),
            ("-5", Prints("-5")),
            ("9223372036854775807", Prints("9223372036854775807")),
            ("-9223372036854775808", Prints("-9223372036854775808")),
            // wider than i64: read as a bignum
            ("99999999999999999999", Prints("99999999999999999999")),
            ("-99999999999999999999", Prints("-99999999999999999999")),
            // digit-led non-integers are rejected, not read as symbols
            ("3.14", FailsWith("malformed number")),
            ("12abc", FailsWith("malformed number")),
            ("-42x", FailsWith("malformed number")),
            // ===== BOOLEANS =====
            ("true", Prints("true")),
            ("false", Prints("false")),
            // ===== STRINGS =====
            ("\"\"", Prints("\"\"")),
            ("\"abc\"", Prints("\"abc\"")),
            (r#""ab\tc""#, Prints(r#""ab\tc""#)),
            (r#""ab\nc""#, Prints(r#""ab\nc""#)),
            (r#""ab\r\nc""#, Prints(r#""ab\r\nc""#)),
            (r#""ab\\c""#, Prints(r#""ab\\c""#)),
            (r#""ab\"c""#, Prints(r#""ab\"c""#)),
            (r#""bad\x""#, FailsWith("unknown escape")),
            (r#""unterminated"#, FailsWith("unterminated")),
            // ===== SYMBOLS =====
            ("abc", Prints("abc")),
            ("-abc", Prints("-abc")),
            ("a.b", Prints("a.b")),
            (r"a\tb", Prints(r"a\tb")),
            (r"a\ b", Prints(r"a\ b")),
            (r"a\\b", Prints(r"a\\b")),
            (r"a\&b", Prints(r"a\&b")),
            (r"a\(\)b", Prints(r"a\(\)b")),
            (r"a\{\}b", Prints(r"a\{\}b")),
            (r"\.", Prints(r"\.")),
            (r"a\zb", FailsWith("unknown escape")),
            // ===== NOTHING AND LISTS =====
            ("()", Prints("()")),
            ("(   )", Prints("()")),
            ("(true . false)", Prints("(true . false)")),
            ("(1 2 . 3)", Prints("(1 2 . 3)")),
            ("(true)", Prints("(true)")),
            ("(true false)", Prints("(true false)")),
            ("((1) 2 . &())", Prints("((1) 2 . &())")),
            ("( 1   2\t\n3 )", Prints("(1 2 3)")),
            ("(. 5)", Prints("5")), // a bare dotted tail is just the tail
            ("(1 . 2 3)", Fails),
            ("(1 2", FailsWith("unterminated")),
            ("1 2 3)", Fails),
            // ===== BOXES =====
            ("&123", Prints("&123")),
            ("&&123", Prints("&&123")),
            ("& 123", Prints("&123")),
            ("&()", Prints("&()")),
            // ===== RECORDS =====
            ("{}", Prints("{}")),
            ("{a . 1}", Prints("{a . 1}")),
            ("{a . 1 b . 2}", Prints("{a . 1 b . 2}")),
            ("{a . (\"a\" 1) b . &2}", Prints("{a . (\"a\" 1) b . &2}")),
            // duplicate keys: last entry wins, key stays unique
            ("{a . 1 a . 2}", Prints("{a . 2}")),
            ("{1 . 2}", FailsWith("record key must be a symbol")),
            ("{a 1}", Fails),
            ("{a . 1", FailsWith("unterminated")),
            // ===== GENERAL ERRORS =====
            ("", FailsWith("unexpected end of input")),
            ("   ", Fails),
            (")", Fails),
            ("1 2", FailsWith("trailing input")),
        ];
        run_read_tests(cases);
    }

    #[test]
    fn test_reader_escaped_token_is_symbol() {
        // an escape anywhere makes the token a symbol, so "1\.5" is the
        // symbol named "1.5", not a malformed number
        let mut syms = Interner::new();
        let value = read(r"1\.5", &mut syms).unwrap();
        assert_eq!(value, Sexp::Symbol(syms.intern("1.5")));
    }

    #[test]
    fn test_reader_depth_limit() {
        let mut syms = Interner::new();

        let under = format!(
            "{}1{}",
            "(".repeat(MAX_READ_DEPTH - 1),
            ")".repeat(MAX_READ_DEPTH - 1)
        );
        assert!(read(&under, &mut syms).is_ok());

        let over = format!(
            "{}1{}",
            "(".repeat(MAX_READ_DEPTH + 1),
            ")".repeat(MAX_READ_DEPTH + 1)
        );
        let err = read(&over, &mut syms).unwrap_err();
        assert!(format!("{err}").contains("depth limit"));
    }

    #[test]
    fn test_reader_interns_identical_symbols() {
        let mut syms = Interner::new();
        let value = read("(abc abc)", &mut syms).unwrap();
        let first = value.head().unwrap();
        let second = value.tail().unwrap().head().unwrap();
        // same name, same interned id
        assert_eq!(first, second);
    }
}
