//! The front end: recognizing special forms in a value tree.
//!
//! `transform` classifies a [`Sexp`] into the surface control tree
//! [`Expr`]. A pair is dispatched on its (interned) head symbol —
//! `quote`, `f`, `let`, `if`, `begin` — and anything else is an
//! application. Validation here is minimal but immediate: a form with
//! the wrong shape fails with [`Error::BadForm`] carrying the offending
//! form's printed text, and nothing is recovered.
//!
//! Two conventions besides the table: a standalone box in expression
//! position becomes a one-argument call of that box with `()` as the
//! argument, and records, closures, continuations, and subroutines in
//! expression position are self-quoting.

use crate::Error;
use crate::ast::Sexp;
use crate::intern::{Interner, Sym};
use crate::printer::print;

/// The surface control tree: multi-parameter, multi-argument,
/// multi-binding forms as written, before normalization.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Quoted or self-quoting data, used as-is at runtime.
    Lit(Sexp),
    /// A variable reference.
    Ref(Sym),
    /// `(f (p...) body...)` — procedure of zero or more parameters with
    /// an implicit body sequence.
    Proc { params: Vec<Sym>, body: Vec<Expr> },
    /// `(callee arg...)` — n-ary application, n >= 1.
    Call { callee: Box<Expr>, args: Vec<Expr> },
    /// `(let ((v e)...) body...)` — bindings then an implicit sequence.
    Let {
        bindings: Vec<(Sym, Expr)>,
        body: Vec<Expr>,
    },
    /// `(if test then else?)` — the alternative defaults to `()`.
    If {
        test: Box<Expr>,
        then: Box<Expr>,
        els: Box<Expr>,
    },
    /// `(begin e...)` — ordered sequence, value of the last.
    Begin(Vec<Expr>),
}

/// The special-form head symbols, interned once per transform.
struct Keywords {
    quote: Sym,
    f: Sym,
    let_: Sym,
    if_: Sym,
    begin: Sym,
}

/// Classify a value tree into a surface control tree.
pub fn transform(sexp: &Sexp, syms: &mut Interner) -> Result<Expr, Error> {
    let kw = Keywords {
        quote: syms.intern("quote"),
        f: syms.intern("f"),
        let_: syms.intern("let"),
        if_: syms.intern("if"),
        begin: syms.intern("begin"),
    };
    transform_sexp(sexp, &kw, syms)
}

fn transform_sexp(sexp: &Sexp, kw: &Keywords, syms: &Interner) -> Result<Expr, Error> {
    match sexp {
        Sexp::Symbol(sym) => Ok(Expr::Ref(*sym)),

        Sexp::Pair(_) => {
            if let Sexp::Symbol(tag) = sexp.head()? {
                if tag == kw.quote {
                    return transform_quote(sexp, syms);
                }
                if tag == kw.f {
                    return transform_proc(sexp, kw, syms);
                }
                if tag == kw.let_ {
                    return transform_let(sexp, kw, syms);
                }
                if tag == kw.if_ {
                    return transform_if(sexp, kw, syms);
                }
                if tag == kw.begin {
                    return transform_begin(sexp, kw, syms);
                }
            }
            transform_call(sexp, kw, syms)
        }

        // a bare box is called with () as its argument
        Sexp::Box(_) => Ok(Expr::Call {
            callee: Box::new(Expr::Lit(sexp.clone())),
            args: vec![Expr::Lit(Sexp::Nothing)],
        }),

        // nothing, numbers, booleans, and strings are literals; records
        // and callables in expression position are opaque literal data
        other => Ok(Expr::Lit(other.clone())),
    }
}

fn transform_quote(form: &Sexp, syms: &Interner) -> Result<Expr, Error> {
    if form.spine_len() != 2 {
        return Err(Error::BadForm(format!(
            "quote takes exactly one argument: {}",
            print(form, syms)
        )));
    }
    Ok(Expr::Lit(form.tail()?.head()?))
}

fn transform_proc(form: &Sexp, kw: &Keywords, syms: &Interner) -> Result<Expr, Error> {
    if form.spine_len() < 3 {
        return Err(Error::BadForm(format!(
            "procedure form needs a parameter list and a body: {}",
            print(form, syms)
        )));
    }

    let mut params = Vec::new();
    let mut cursor = form.tail()?.head()?;
    while let Sexp::Pair(_) = cursor {
        match cursor.head()? {
            Sexp::Symbol(sym) => params.push(sym),
            other => {
                return Err(Error::BadForm(format!(
                    "parameter must be a symbol, got: {}",
                    print(&other, syms)
                )));
            }
        }
        cursor = cursor.tail()?;
    }
    if !matches!(cursor, Sexp::Nothing) {
        return Err(Error::BadForm(format!(
            "parameter list must be a proper list: {}",
            print(form, syms)
        )));
    }

    let body = transform_each(&form.tail()?.tail()?, kw, syms)?;
    Ok(Expr::Proc { params, body })
}

fn transform_let(form: &Sexp, kw: &Keywords, syms: &Interner) -> Result<Expr, Error> {
    if form.spine_len() < 3 {
        return Err(Error::BadForm(format!(
            "let form needs a binding list and a body: {}",
            print(form, syms)
        )));
    }

    let binding_forms = form.tail()?.head()?;
    if !binding_forms.is_pair() && !matches!(binding_forms, Sexp::Nothing) {
        return Err(Error::BadForm(format!(
            "let bindings must be a list: {}",
            print(form, syms)
        )));
    }

    let mut bindings = Vec::new();
    let mut cursor = binding_forms;
    while let Sexp::Pair(_) = cursor {
        let binding = cursor.head()?;
        if !binding.is_pair() || binding.spine_len() != 2 {
            return Err(Error::BadForm(format!(
                "let binding must be a (symbol expression) pair: {}",
                print(&binding, syms)
            )));
        }
        let Sexp::Symbol(name) = binding.head()? else {
            return Err(Error::BadForm(format!(
                "let binding name must be a symbol, got: {}",
                print(&binding.head()?, syms)
            )));
        };
        let value = transform_sexp(&binding.tail()?.head()?, kw, syms)?;
        bindings.push((name, value));
        cursor = cursor.tail()?;
    }
    if !matches!(cursor, Sexp::Nothing) {
        return Err(Error::BadForm(format!(
            "let bindings must be a proper list: {}",
            print(form, syms)
        )));
    }

    let body = transform_each(&form.tail()?.tail()?, kw, syms)?;
    Ok(Expr::Let { bindings, body })
}

fn transform_if(form: &Sexp, kw: &Keywords, syms: &Interner) -> Result<Expr, Error> {
    let len = form.spine_len();
    if !(3..=4).contains(&len) {
        return Err(Error::BadForm(format!(
            "if takes a test, a consequent, and an optional alternative: {}",
            print(form, syms)
        )));
    }

    let test = transform_sexp(&form.tail()?.head()?, kw, syms)?;
    let then = transform_sexp(&form.tail()?.tail()?.head()?, kw, syms)?;
    let els = if len == 4 {
        transform_sexp(&form.tail()?.tail()?.tail()?.head()?, kw, syms)?
    } else {
        Expr::Lit(Sexp::Nothing)
    };
    Ok(Expr::If {
        test: Box::new(test),
        then: Box::new(then),
        els: Box::new(els),
    })
}

fn transform_begin(form: &Sexp, kw: &Keywords, syms: &Interner) -> Result<Expr, Error> {
    if form.spine_len() < 2 {
        return Err(Error::BadForm(format!(
            "begin needs at least one expression: {}",
            print(form, syms)
        )));
    }
    Ok(Expr::Begin(transform_each(&form.tail()?, kw, syms)?))
}

fn transform_call(form: &Sexp, kw: &Keywords, syms: &Interner) -> Result<Expr, Error> {
    if form.spine_len() < 2 {
        return Err(Error::BadForm(format!(
            "a call needs a callee and at least one argument: {}",
            print(form, syms)
        )));
    }
    let callee = transform_sexp(&form.head()?, kw, syms)?;
    let args = transform_each(&form.tail()?, kw, syms)?;
    Ok(Expr::Call {
        callee: Box::new(callee),
        args,
    })
}

/// Transform every element of a pair chain's proper prefix.
fn transform_each(forms: &Sexp, kw: &Keywords, syms: &Interner) -> Result<Vec<Expr>, Error> {
    forms
        .spine()
        .iter()
        .map(|form| transform_sexp(form, kw, syms))
        .collect()
}

#[cfg(test)]
#[expect(clippy::unwrap_used)] // test code OK
mod tests {
    use super::*;
    use crate::reader::read;

    fn transformed(source: &str, syms: &mut Interner) -> Result<Expr, Error> {
        let sexp = read(source, syms).unwrap();
        transform(&sexp, syms)
    }

    #[test]
    fn test_primitives_and_references() {
        let mut syms = Interner::new();
        assert_eq!(
            transformed("5", &mut syms).unwrap(),
            Expr::Lit(Sexp::Int(5))
        );
        assert_eq!(
            transformed("true", &mut syms).unwrap(),
            Expr::Lit(Sexp::Bool(true))
        );
        assert_eq!(
            transformed("()", &mut syms).unwrap(),
            Expr::Lit(Sexp::Nothing)
        );
        let x = syms.intern("x");
        assert_eq!(transformed("x", &mut syms).unwrap(), Expr::Ref(x));
    }

    #[test]
    fn test_quote_is_unevaluated_data() {
        let mut syms = Interner::new();
        match transformed("(quote (a b))", &mut syms).unwrap() {
            Expr::Lit(value) => assert_eq!(value.spine_len(), 2),
            other => panic!("expected a literal, got {other:?}"),
        }
    }

    #[test]
    fn test_proc_forms() {
        let mut syms = Interner::new();
        let x = syms.intern("x");
        let y = syms.intern("y");

        match transformed("(f (x y) x y)", &mut syms).unwrap() {
            Expr::Proc { params, body } => {
                assert_eq!(params, vec![x, y]);
                assert_eq!(body, vec![Expr::Ref(x), Expr::Ref(y)]);
            }
            other => panic!("expected a procedure, got {other:?}"),
        }

        // zero parameters are allowed
        match transformed("(f () 1)", &mut syms).unwrap() {
            Expr::Proc { params, body } => {
                assert!(params.is_empty());
                assert_eq!(body.len(), 1);
            }
            other => panic!("expected a procedure, got {other:?}"),
        }
    }

    #[test]
    fn test_let_forms() {
        let mut syms = Interner::new();
        let a = syms.intern("a");
        let b = syms.intern("b");

        match transformed("(let ((a 1) (b a)) b)", &mut syms).unwrap() {
            Expr::Let { bindings, body } => {
                assert_eq!(bindings.len(), 2);
                assert_eq!(bindings[0], (a, Expr::Lit(Sexp::Int(1))));
                assert_eq!(bindings[1], (b, Expr::Ref(a)));
                assert_eq!(body, vec![Expr::Ref(b)]);
            }
            other => panic!("expected a let, got {other:?}"),
        }

        // an empty binding list is allowed
        match transformed("(let () 1)", &mut syms).unwrap() {
            Expr::Let { bindings, .. } => assert!(bindings.is_empty()),
            other => panic!("expected a let, got {other:?}"),
        }
    }

    #[test]
    fn test_if_default_alternative() {
        let mut syms = Interner::new();
        match transformed("(if true 1)", &mut syms).unwrap() {
            Expr::If { els, .. } => assert_eq!(*els, Expr::Lit(Sexp::Nothing)),
            other => panic!("expected an if, got {other:?}"),
        }
    }

    #[test]
    fn test_call_dispatch() {
        let mut syms = Interner::new();
        let g = syms.intern("g");
        match transformed("(g 1 2)", &mut syms).unwrap() {
            Expr::Call { callee, args } => {
                assert_eq!(*callee, Expr::Ref(g));
                assert_eq!(args, vec![Expr::Lit(Sexp::Int(1)), Expr::Lit(Sexp::Int(2))]);
            }
            other => panic!("expected a call, got {other:?}"),
        }
    }

    #[test]
    fn test_bare_box_becomes_implicit_call() {
        let mut syms = Interner::new();
        match transformed("&5", &mut syms).unwrap() {
            Expr::Call { callee, args } => {
                assert!(matches!(*callee, Expr::Lit(Sexp::Box(_))));
                assert_eq!(args, vec![Expr::Lit(Sexp::Nothing)]);
            }
            other => panic!("expected a call, got {other:?}"),
        }
    }

    #[test]
    fn test_record_in_expression_position_is_self_quoting() {
        let mut syms = Interner::new();
        match transformed("{a . 1}", &mut syms).unwrap() {
            Expr::Lit(Sexp::Record(_)) => {}
            other => panic!("expected a record literal, got {other:?}"),
        }
    }

    #[test]
    fn test_malformed_forms() {
        // (source, expected substring of the BadForm message)
        let cases = vec![
            ("(quote)", "quote takes exactly one argument"),
            ("(quote 1 2)", "quote takes exactly one argument"),
            ("(f (x))", "parameter list and a body"),
            ("(f x x)", "parameter list must be a proper list"),
            ("(f (1) x)", "parameter must be a symbol"),
            ("(let ((a 1)))", "binding list and a body"),
            ("(let a 1)", "let bindings must be a list"),
            ("(let ((a)) 1)", "(symbol expression) pair"),
            ("(let ((1 2)) 1)", "let binding name must be a symbol"),
            ("(if true)", "if takes a test"),
            ("(if true 1 2 3)", "if takes a test"),
            ("(begin)", "begin needs at least one expression"),
            ("(x)", "a callee and at least one argument"),
        ];
        for (i, (source, expected)) in cases.iter().enumerate() {
            let mut syms = Interner::new();
            match transformed(source, &mut syms) {
                Err(Error::BadForm(msg)) => assert!(
                    msg.contains(expected),
                    "case {}: '{msg}' should contain '{expected}'",
                    i + 1
                ),
                other => panic!("case {}: expected BadForm, got {other:?}", i + 1),
            }
        }
    }
}
