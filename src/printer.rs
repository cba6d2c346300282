//! Rendering values back to text.
//!
//! The printer is the inverse of the reader over the data the reader can
//! produce: strings and symbols are re-escaped so that
//! `read(print(v))` yields an equal value. Callables print as opaque
//! `#<...>` forms. Symbols are interned ids, so printing needs the shared
//! [`Interner`].

use crate::ast::Sexp;
use crate::intern::Interner;

/// Render a value as surface text.
pub fn print(sexp: &Sexp, syms: &Interner) -> String {
    match sexp {
        Sexp::Nothing => "()".to_owned(),
        Sexp::Int(n) => n.to_string(),
        Sexp::Big(n) => n.to_string(),
        Sexp::Bool(true) => "true".to_owned(),
        Sexp::Bool(false) => "false".to_owned(),
        Sexp::Str(s) => format!("\"{}\"", escape_string(s)),
        Sexp::Symbol(sym) => escape_symbol(syms.resolve(*sym)),
        Sexp::Pair(_) => {
            let mut parts = Vec::new();
            let mut cursor = sexp.clone();
            while let Sexp::Pair(cell) = cursor {
                let pair = cell.borrow();
                parts.push(print(&pair.head, syms));
                let next = pair.tail.clone();
                drop(pair);
                cursor = next;
            }
            if !matches!(cursor, Sexp::Nothing) {
                parts.push(".".to_owned());
                parts.push(print(&cursor, syms));
            }
            format!("({})", parts.join(" "))
        }
        Sexp::Box(cell) => format!("&{}", print(&cell.borrow(), syms)),
        Sexp::Record(cells) => {
            let mut parts = Vec::new();
            for (key, value) in cells.borrow().iter() {
                parts.push(escape_symbol(syms.resolve(*key)));
                parts.push(".".to_owned());
                parts.push(print(value, syms));
            }
            format!("{{{}}}", parts.join(" "))
        }
        Sexp::Closure(closure) => {
            format!("#<closure {}>", escape_symbol(syms.resolve(closure.param)))
        }
        Sexp::Continuation(_) => "#<continuation>".to_owned(),
        Sexp::Subroutine(sub) => format!("#<subroutine {}>", sub.name),
    }
}

fn escape_string(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '\t' => out.push_str("\\t"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            c => out.push(c),
        }
    }
    out
}

/// Escape a symbol name so the reader tokenizes it back whole. The
/// token-terminating characters and whitespace must be escaped; a lone
/// `.` must be escaped so it does not read as the dotted-tail marker.
fn escape_symbol(raw: &str) -> String {
    if raw == "." {
        return "\\.".to_owned();
    }
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '\t' => out.push_str("\\t"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            ' ' => out.push_str("\\ "),
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '&' => out.push_str("\\&"),
            '(' => out.push_str("\\("),
            ')' => out.push_str("\\)"),
            '{' => out.push_str("\\{"),
            '}' => out.push_str("\\}"),
            c => out.push(c),
        }
    }
    out
}
