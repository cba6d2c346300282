//! Pipeline entry points: transform then normalize, plus string-to-value
//! conveniences used by the REPL and the integration tests.

use std::rc::Rc;

use tracing::debug;

use crate::Error;
use crate::ast::{Ctrl, Sexp};
use crate::builtins::base_env;
use crate::intern::Interner;
use crate::machine::{Env, State, run};
use crate::normalize::Normalizer;
use crate::reader::read;
use crate::transform::transform;

/// Compile a value tree into a normalized control tree.
pub fn compile(sexp: &Sexp, norm: &mut Normalizer, syms: &mut Interner) -> Result<Rc<Ctrl>, Error> {
    let surface = transform(sexp, syms)?;
    debug!(?surface, "front end");
    let ctrl = norm.normalize(surface, syms);
    debug!(?ctrl, "normalized");
    Ok(ctrl)
}

/// Read, compile, and run one program under a fresh base environment.
pub fn eval_str(source: &str, syms: &mut Interner) -> Result<Sexp, Error> {
    let mut norm = Normalizer::new();
    let env = base_env(syms);
    eval_str_in(source, &mut norm, &env, syms)
}

/// Read, compile, and run one program under a caller-provided
/// environment and normalizer (the REPL keeps both across lines).
pub fn eval_str_in(
    source: &str,
    norm: &mut Normalizer,
    env: &Env,
    syms: &mut Interner,
) -> Result<Sexp, Error> {
    let sexp = read(source, syms)?;
    debug!(?sexp, "read");
    let ctrl = compile(&sexp, norm, syms)?;
    run(State::start(ctrl, env.clone()), syms)
}
