//! The base library: construction of the initial environment.
//!
//! This is configuration data for the machine, not machine logic: a
//! chain of bindings from library names to host [`Subroutine`]s and
//! closure values. Because the machine's calling convention is unary,
//! multi-argument operations are curried closures whose innermost body
//! calls a host subroutine that reads the accumulated parameters back
//! out of the calling environment — the same trick a user-level
//! procedure's compiled form uses.

use std::rc::Rc;

use crate::Error;
use crate::ast::{Atom, Closure, Ctrl, Sexp, Subroutine};
use crate::intern::{Interner, Sym};
use crate::machine::Env;

/// Build the initial environment.
pub fn base_env(syms: &mut Interner) -> Env {
    let entries: Vec<(&str, Sexp)> = vec![
        // pair operations
        ("car", unary("car", |v| v.head())),
        ("cdr", unary("cdr", |v| v.tail())),
        ("cons", binary(syms, "cons", |a, b, _| Ok(Sexp::cons(a, b)))),
        ("set-car", binary(syms, "set-car", |p, v, _| p.set_head(v))),
        ("set-cdr", binary(syms, "set-cdr", |p, v, _| p.set_tail(v))),
        // boxes
        ("box", unary("box", |v| Ok(Sexp::boxed(v)))),
        ("unbox", unary("unbox", |v| v.unbox())),
        ("set-box", binary(syms, "set-box", |b, v, _| b.set_box(v))),
        // records
        (
            "get",
            binary(syms, "get", |rec, key, syms| {
                rec.get(symbol_key(&key)?, syms)
            }),
        ),
        (
            "put",
            ternary(syms, "put", |rec, key, value, _| {
                rec.put(symbol_key(&key)?, value)
            }),
        ),
        // type predicates
        ("pair?", predicate("pair?", |v| v.is_pair())),
        (
            "nothing?",
            predicate("nothing?", |v| matches!(v, Sexp::Nothing)),
        ),
        (
            "symbol?",
            predicate("symbol?", |v| matches!(v, Sexp::Symbol(_))),
        ),
        ("box?", predicate("box?", |v| matches!(v, Sexp::Box(_)))),
        (
            "record?",
            predicate("record?", |v| matches!(v, Sexp::Record(_))),
        ),
    ];

    let mut env = Env::empty();
    for (name, value) in entries {
        env = env.extend(syms.intern(name), value);
    }
    env
}

fn symbol_key(key: &Sexp) -> Result<Sym, Error> {
    match key {
        Sexp::Symbol(sym) => Ok(*sym),
        other => Err(Error::TypeError(format!(
            "record key must be a symbol, got {}",
            other.kind_name()
        ))),
    }
}

/// A single-argument host subroutine.
fn unary(name: &'static str, f: impl Fn(Sexp) -> Result<Sexp, Error> + 'static) -> Sexp {
    Sexp::Subroutine(Subroutine::new(name, move |arg, _env, _syms| f(arg)))
}

fn predicate(name: &'static str, f: impl Fn(&Sexp) -> bool + 'static) -> Sexp {
    unary(name, move |v| Ok(Sexp::Bool(f(&v))))
}

/// A two-argument operation as a curried closure: applying it binds `x`,
/// applying the result binds `y`, and the innermost control calls a host
/// subroutine that looks both up in the calling environment.
fn binary(
    syms: &mut Interner,
    name: &'static str,
    f: impl Fn(Sexp, Sexp, &Interner) -> Result<Sexp, Error> + 'static,
) -> Sexp {
    let x = syms.intern("x");
    let y = syms.intern("y");
    let inner = Subroutine::new(name, move |_arg, env, syms| {
        let a = lookup(env, x, "x")?;
        let b = lookup(env, y, "y")?;
        f(a, b, syms)
    });
    let body = Rc::new(Ctrl::Call {
        callee: Atom::Lit(Sexp::Subroutine(inner)),
        arg: Atom::Lit(Sexp::Nothing),
    });
    Sexp::Closure(Rc::new(Closure {
        param: x,
        env: Env::empty(),
        body: Rc::new(Ctrl::Proc { param: y, body }),
    }))
}

/// A three-argument operation, curried one level deeper than [`binary`].
fn ternary(
    syms: &mut Interner,
    name: &'static str,
    f: impl Fn(Sexp, Sexp, Sexp, &Interner) -> Result<Sexp, Error> + 'static,
) -> Sexp {
    let x = syms.intern("x");
    let y = syms.intern("y");
    let z = syms.intern("z");
    let inner = Subroutine::new(name, move |_arg, env, syms| {
        let a = lookup(env, x, "x")?;
        let b = lookup(env, y, "y")?;
        let c = lookup(env, z, "z")?;
        f(a, b, c, syms)
    });
    let body = Rc::new(Ctrl::Call {
        callee: Atom::Lit(Sexp::Subroutine(inner)),
        arg: Atom::Lit(Sexp::Nothing),
    });
    Sexp::Closure(Rc::new(Closure {
        param: x,
        env: Env::empty(),
        body: Rc::new(Ctrl::Proc {
            param: y,
            body: Rc::new(Ctrl::Proc { param: z, body }),
        }),
    }))
}

fn lookup(env: &Env, sym: Sym, name: &str) -> Result<Sexp, Error> {
    env.lookup(sym)
        .ok_or_else(|| Error::Unbound(name.to_owned()))
}
