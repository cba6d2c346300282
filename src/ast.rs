//! The shared value and control-tree vocabulary.
//!
//! [`Sexp`] is the only value currency in the system: the reader produces
//! it, the front end consumes it, quoted literals embed it, and the
//! machine computes with it. Pairs, boxes, and records are mutable in
//! place and shared by reference; every other variant is immutable once
//! constructed. Symbols are interned ids (see [`crate::intern`]), so
//! equality on them is identity.
//!
//! [`Atom`] and [`Ctrl`] are the normalized control trees the machine
//! executes. Their shape *is* the ANF contract: a call, a conditional
//! test, and an application operand can only ever hold an [`Atom`]
//! (literal or reference), never a nested compound form. Closures embed a
//! normalized body together with their defining environment.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use num_bigint::BigInt;

use crate::Error;
use crate::intern::{Interner, Sym};
use crate::machine::{Env, Stack};

/// A tagged S-expression value.
#[derive(Clone)]
pub enum Sexp {
    /// The empty value, written `()`.
    Nothing,
    /// Fixed-width integer.
    Int(i64),
    /// Arbitrary-precision integer, for literals wider than `i64`.
    Big(Rc<BigInt>),
    Bool(bool),
    Str(Rc<str>),
    /// Interned symbol; compares by identity.
    Symbol(Sym),
    /// Mutable ordered pair, also the list building block.
    Pair(Rc<RefCell<Pair>>),
    /// Single mutable reference cell, written `&v`.
    Box(Rc<RefCell<Sexp>>),
    /// Symbol-keyed mapping with unique keys, insertion-ordered for
    /// display, written `{k . v ...}`.
    Record(Rc<RefCell<IndexMap<Sym, Sexp>>>),
    /// Captured single-parameter procedure.
    Closure(Rc<Closure>),
    /// Reified rest-of-computation; invoking it resumes the captured
    /// control stack.
    Continuation(Rc<Stack>),
    /// Opaque host procedure.
    Subroutine(Rc<Subroutine>),
}

/// The two cells of a pair. Chains of pairs ending in [`Sexp::Nothing`]
/// encode proper lists; any other final tail makes the list improper.
#[derive(Debug, Clone)]
pub struct Pair {
    pub head: Sexp,
    pub tail: Sexp,
}

/// A procedure value: one parameter, the environment in effect at its
/// creation, and a normalized body.
#[derive(Debug, Clone)]
pub struct Closure {
    pub param: Sym,
    pub env: Env,
    pub body: Rc<Ctrl>,
}

/// A host procedure callable from the language. Receives the (single)
/// argument, the caller's environment, and the shared symbol table (so
/// host code can resolve symbol arguments and build readable errors).
pub struct Subroutine {
    pub name: &'static str,
    run: Box<dyn Fn(Sexp, &Env, &Interner) -> Result<Sexp, Error>>,
}

impl Subroutine {
    pub fn new(
        name: &'static str,
        run: impl Fn(Sexp, &Env, &Interner) -> Result<Sexp, Error> + 'static,
    ) -> Rc<Self> {
        Rc::new(Subroutine {
            name,
            run: Box::new(run),
        })
    }

    pub fn call(&self, arg: Sexp, env: &Env, syms: &Interner) -> Result<Sexp, Error> {
        (self.run)(arg, env, syms)
    }
}

impl fmt::Debug for Subroutine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Subroutine({})", self.name)
    }
}

/// An already-reduced operand: the only thing allowed in call, argument,
/// and conditional-test position of a normalized tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Atom {
    Lit(Sexp),
    Ref(Sym),
}

/// A normalized control tree, as executed by the machine.
#[derive(Debug, Clone, PartialEq)]
pub enum Ctrl {
    /// A literal value, produced as-is.
    Lit(Sexp),
    /// An environment reference.
    Ref(Sym),
    /// A single-parameter procedure; evaluates to a closure.
    Proc { param: Sym, body: Rc<Ctrl> },
    /// A single-argument application of an already-reduced callee to an
    /// already-reduced argument.
    Call { callee: Atom, arg: Atom },
    /// Evaluate `expr`, bind its value to `var`, continue with `body`.
    Bind {
        var: Sym,
        expr: Rc<Ctrl>,
        body: Rc<Ctrl>,
    },
    /// Two-way branch on an already-reduced test.
    If {
        test: Atom,
        then: Rc<Ctrl>,
        els: Rc<Ctrl>,
    },
    /// Non-empty sequence; the value is the value of the last element,
    /// earlier elements run for effect only.
    Seq(Vec<Rc<Ctrl>>),
}

impl Sexp {
    pub fn text(s: &str) -> Sexp {
        Sexp::Str(Rc::from(s))
    }

    pub fn cons(head: Sexp, tail: Sexp) -> Sexp {
        Sexp::Pair(Rc::new(RefCell::new(Pair { head, tail })))
    }

    pub fn boxed(value: Sexp) -> Sexp {
        Sexp::Box(Rc::new(RefCell::new(value)))
    }

    pub fn record() -> Sexp {
        Sexp::Record(Rc::new(RefCell::new(IndexMap::new())))
    }

    /// Build a proper list from the elements.
    pub fn list(elems: Vec<Sexp>) -> Sexp {
        Self::list_with_tail(elems, Sexp::Nothing)
    }

    /// Build a pair chain over `elems` ending in `tail`.
    pub fn list_with_tail(elems: Vec<Sexp>, tail: Sexp) -> Sexp {
        elems
            .into_iter()
            .rev()
            .fold(tail, |acc, elem| Sexp::cons(elem, acc))
    }

    /// Short value-kind name for error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Sexp::Nothing => "nothing",
            Sexp::Int(_) | Sexp::Big(_) => "integer",
            Sexp::Bool(_) => "boolean",
            Sexp::Str(_) => "string",
            Sexp::Symbol(_) => "symbol",
            Sexp::Pair(_) => "pair",
            Sexp::Box(_) => "box",
            Sexp::Record(_) => "record",
            Sexp::Closure(_) => "closure",
            Sexp::Continuation(_) => "continuation",
            Sexp::Subroutine(_) => "subroutine",
        }
    }

    /// Everything is truthy except boolean `false`.
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Sexp::Bool(false))
    }

    pub fn is_pair(&self) -> bool {
        matches!(self, Sexp::Pair(_))
    }

    /// True for the variants with no interior structure: nothing,
    /// numbers, booleans, strings, and symbols.
    pub fn is_primitive(&self) -> bool {
        matches!(
            self,
            Sexp::Nothing
                | Sexp::Int(_)
                | Sexp::Big(_)
                | Sexp::Bool(_)
                | Sexp::Str(_)
                | Sexp::Symbol(_)
        )
    }

    pub fn head(&self) -> Result<Sexp, Error> {
        match self {
            Sexp::Pair(cell) => Ok(cell.borrow().head.clone()),
            other => Err(Error::TypeError(format!(
                "expected a pair, got {}",
                other.kind_name()
            ))),
        }
    }

    pub fn tail(&self) -> Result<Sexp, Error> {
        match self {
            Sexp::Pair(cell) => Ok(cell.borrow().tail.clone()),
            other => Err(Error::TypeError(format!(
                "expected a pair, got {}",
                other.kind_name()
            ))),
        }
    }

    /// Replace the head cell in place; visible through every alias.
    pub fn set_head(&self, value: Sexp) -> Result<Sexp, Error> {
        match self {
            Sexp::Pair(cell) => {
                cell.borrow_mut().head = value.clone();
                Ok(value)
            }
            other => Err(Error::TypeError(format!(
                "expected a pair, got {}",
                other.kind_name()
            ))),
        }
    }

    /// Replace the tail cell in place; visible through every alias.
    pub fn set_tail(&self, value: Sexp) -> Result<Sexp, Error> {
        match self {
            Sexp::Pair(cell) => {
                cell.borrow_mut().tail = value.clone();
                Ok(value)
            }
            other => Err(Error::TypeError(format!(
                "expected a pair, got {}",
                other.kind_name()
            ))),
        }
    }

    pub fn unbox(&self) -> Result<Sexp, Error> {
        match self {
            Sexp::Box(cell) => Ok(cell.borrow().clone()),
            other => Err(Error::TypeError(format!(
                "expected a box, got {}",
                other.kind_name()
            ))),
        }
    }

    /// Replace the boxed value in place; visible through every alias.
    pub fn set_box(&self, value: Sexp) -> Result<Sexp, Error> {
        match self {
            Sexp::Box(cell) => {
                *cell.borrow_mut() = value.clone();
                Ok(value)
            }
            other => Err(Error::TypeError(format!(
                "expected a box, got {}",
                other.kind_name()
            ))),
        }
    }

    /// Fetch a record entry. Missing keys are an error, not a default.
    pub fn get(&self, key: Sym, syms: &Interner) -> Result<Sexp, Error> {
        match self {
            Sexp::Record(cells) => cells
                .borrow()
                .get(&key)
                .cloned()
                .ok_or_else(|| Error::MissingKey(syms.resolve(key).to_owned())),
            other => Err(Error::TypeError(format!(
                "expected a record, got {}",
                other.kind_name()
            ))),
        }
    }

    /// Insert or overwrite a record entry in place.
    pub fn put(&self, key: Sym, value: Sexp) -> Result<Sexp, Error> {
        match self {
            Sexp::Record(cells) => {
                cells.borrow_mut().insert(key, value.clone());
                Ok(value)
            }
            other => Err(Error::TypeError(format!(
                "expected a record, got {}",
                other.kind_name()
            ))),
        }
    }

    /// Number of pairs in the spine of a pair chain. Improper tails and
    /// non-pairs count as zero further elements.
    pub fn spine_len(&self) -> usize {
        let mut n = 0;
        let mut cursor = self.clone();
        while let Sexp::Pair(cell) = cursor {
            n += 1;
            cursor = cell.borrow().tail.clone();
        }
        n
    }

    /// Collect the proper-list prefix of a pair chain.
    pub fn spine(&self) -> Vec<Sexp> {
        let mut elems = Vec::new();
        let mut cursor = self.clone();
        while let Sexp::Pair(cell) = cursor {
            let pair = cell.borrow();
            elems.push(pair.head.clone());
            let next = pair.tail.clone();
            drop(pair);
            cursor = next;
        }
        elems
    }
}

impl PartialEq for Sexp {
    /// Primitives compare structurally; pairs, boxes, records, and
    /// callables compare by identity, matching the sharing semantics of
    /// in-place mutation.
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Sexp::Nothing, Sexp::Nothing) => true,
            (Sexp::Int(a), Sexp::Int(b)) => a == b,
            (Sexp::Big(a), Sexp::Big(b)) => a == b,
            (Sexp::Bool(a), Sexp::Bool(b)) => a == b,
            (Sexp::Str(a), Sexp::Str(b)) => a == b,
            (Sexp::Symbol(a), Sexp::Symbol(b)) => a == b,
            (Sexp::Pair(a), Sexp::Pair(b)) => Rc::ptr_eq(a, b),
            (Sexp::Box(a), Sexp::Box(b)) => Rc::ptr_eq(a, b),
            (Sexp::Record(a), Sexp::Record(b)) => Rc::ptr_eq(a, b),
            (Sexp::Closure(a), Sexp::Closure(b)) => Rc::ptr_eq(a, b),
            (Sexp::Continuation(a), Sexp::Continuation(b)) => Rc::ptr_eq(a, b),
            (Sexp::Subroutine(a), Sexp::Subroutine(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for Sexp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sexp::Nothing => write!(f, "Nothing"),
            Sexp::Int(n) => write!(f, "Int({n})"),
            Sexp::Big(n) => write!(f, "Big({n})"),
            Sexp::Bool(b) => write!(f, "Bool({b})"),
            Sexp::Str(s) => write!(f, "Str({s:?})"),
            Sexp::Symbol(sym) => write!(f, "Symbol({sym:?})"),
            Sexp::Pair(cell) => {
                let pair = cell.borrow();
                write!(f, "Pair({:?}, {:?})", pair.head, pair.tail)
            }
            Sexp::Box(cell) => write!(f, "Box({:?})", cell.borrow()),
            Sexp::Record(cells) => {
                write!(f, "Record(")?;
                for (i, (key, value)) in cells.borrow().iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{key:?} => {value:?}")?;
                }
                write!(f, ")")
            }
            Sexp::Closure(closure) => write!(f, "Closure({:?})", closure.param),
            Sexp::Continuation(_) => write!(f, "Continuation"),
            Sexp::Subroutine(sub) => write!(f, "Subroutine({})", sub.name),
        }
    }
}

#[cfg(test)]
#[expect(clippy::unwrap_used)] // test code OK
mod tests {
    use super::*;
    use crate::intern::Interner;

    #[test]
    fn test_list_construction_and_spine() {
        let list = Sexp::list(vec![Sexp::Int(1), Sexp::Int(2), Sexp::Int(3)]);
        assert_eq!(list.spine_len(), 3);
        assert_eq!(list.head().unwrap(), Sexp::Int(1));
        assert_eq!(list.tail().unwrap().head().unwrap(), Sexp::Int(2));

        let improper = Sexp::list_with_tail(vec![Sexp::Int(1)], Sexp::Int(2));
        assert_eq!(improper.spine_len(), 1);
        assert_eq!(improper.tail().unwrap(), Sexp::Int(2));
    }

    #[test]
    fn test_pair_mutation_is_shared() {
        let pair = Sexp::cons(Sexp::Int(1), Sexp::Nothing);
        let alias = pair.clone();
        pair.set_head(Sexp::Int(9)).unwrap();
        assert_eq!(alias.head().unwrap(), Sexp::Int(9));
    }

    #[test]
    fn test_box_mutation_is_shared() {
        let cell = Sexp::boxed(Sexp::Int(1));
        let alias = cell.clone();
        cell.set_box(Sexp::Bool(true)).unwrap();
        assert_eq!(alias.unbox().unwrap(), Sexp::Bool(true));
    }

    #[test]
    fn test_record_access() {
        let mut syms = Interner::new();
        let key = syms.intern("k");
        let missing = syms.intern("m");

        let rec = Sexp::record();
        rec.put(key, Sexp::Int(5)).unwrap();
        assert_eq!(rec.get(key, &syms).unwrap(), Sexp::Int(5));
        assert_eq!(
            rec.get(missing, &syms).unwrap_err(),
            Error::MissingKey("m".to_owned())
        );

        // overwriting keeps the key unique
        rec.put(key, Sexp::Int(6)).unwrap();
        assert_eq!(rec.get(key, &syms).unwrap(), Sexp::Int(6));
    }

    #[test]
    fn test_accessor_type_errors() {
        assert!(matches!(Sexp::Int(1).head(), Err(Error::TypeError(_))));
        assert!(matches!(Sexp::Nothing.unbox(), Err(Error::TypeError(_))));
        assert!(matches!(
            Sexp::Bool(true).put(Interner::new().intern("k"), Sexp::Nothing),
            Err(Error::TypeError(_))
        ));
    }

    #[test]
    fn test_equality_identity_vs_structure() {
        // primitives: structural
        assert_eq!(Sexp::Int(3), Sexp::Int(3));
        assert_eq!(Sexp::text("ab"), Sexp::text("ab"));
        // pairs: identity
        let p = Sexp::cons(Sexp::Int(1), Sexp::Nothing);
        let q = Sexp::cons(Sexp::Int(1), Sexp::Nothing);
        assert_eq!(p, p.clone());
        assert_ne!(p, q);
    }

    #[test]
    fn test_truthiness() {
        assert!(Sexp::Int(0).is_truthy());
        assert!(Sexp::Nothing.is_truthy());
        assert!(Sexp::Bool(true).is_truthy());
        assert!(!Sexp::Bool(false).is_truthy());
    }
}
