//! sexpvm - A minimal Lisp on an explicit-continuation abstract machine
//!
//! This crate implements a small Lisp-like language in three stages:
//!
//! 1. The **reader** (`reader`) parses text into a tagged S-expression
//!    value tree; the **printer** (`printer`) renders values back to text.
//! 2. The **front end** (`transform`) recognizes the language's special
//!    forms (`quote`, `f`, `let`, `if`, `begin`, application) and produces
//!    a surface control tree; the **normalizer** (`normalize`) rewrites it
//!    into administrative normal form, where every operand position holds a
//!    literal or a variable reference and all compound subexpressions are
//!    hoisted into named bindings evaluated in order.
//! 3. The **abstract machine** (`machine`) executes normalized control
//!    trees as a small-step transition system over (control, environment,
//!    continuation-stack) triples, driven by a trampoline. The control
//!    stack is an explicit persistent structure, which gives the language
//!    proper tail calls and first-class, re-invocable continuations.
//!
//! ```text
//! text --reader--> Sexp --transform--> Expr --normalize--> Ctrl --machine--> Sexp
//! ```
//!
//! The base library lives in `builtins`; `compile` glues the pipeline
//! together. A rustyline REPL ships as the `repl` binary.
//!
//! ## Modules
//!
//! - `intern`: interned symbols (identity comparison for lookup/dispatch)
//! - `ast`: the shared value and control-tree vocabulary
//! - `reader` / `printer`: external text syntax
//! - `transform`: special-form recognition
//! - `normalize`: ANF rewriting
//! - `machine`: the state-transition runtime
//! - `builtins`: the initial environment
//! - `compile`: pipeline entry points

use std::fmt;

/// Maximum reader recursion depth, limiting nesting in hostile input.
pub const MAX_READ_DEPTH: usize = 64;

/// Error type for the whole pipeline.
///
/// Every error is fatal to the evaluation in progress: there is no
/// in-language recovery construct. Callers (such as the REPL) report the
/// message and reset to a fresh top-level state.
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// The reader could not parse the input text.
    ReadError(String),
    /// A special form had the wrong shape (arity, non-symbol binder, ...).
    BadForm(String),
    /// An accessor was applied to the wrong kind of value.
    TypeError(String),
    /// A call's callee was not a closure, continuation, or subroutine.
    NotCallable(String),
    /// A referenced symbol had no binding in the environment chain.
    Unbound(String),
    /// A record was accessed with a key it does not contain.
    MissingKey(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::ReadError(msg) => write!(f, "Read error: {msg}"),
            Error::BadForm(msg) => write!(f, "Malformed form: {msg}"),
            Error::TypeError(msg) => write!(f, "Type error: {msg}"),
            Error::NotCallable(msg) => write!(f, "Not callable: {msg}"),
            Error::Unbound(name) => write!(f, "Unbound symbol: {name}"),
            Error::MissingKey(key) => write!(f, "Record has no key: {key}"),
        }
    }
}

impl std::error::Error for Error {}

pub mod ast;
pub mod builtins;
pub mod compile;
pub mod intern;
pub mod machine;
pub mod normalize;
pub mod printer;
pub mod reader;
pub mod transform;
