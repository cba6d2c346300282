//! The abstract machine: a small-step transition system over
//! (control, environment, continuation-stack) triples.
//!
//! [`run`] is a trampoline: it applies [`step`] until the state is
//! [`State::Done`], never recursing in the host stack across program
//! calls. A closure call therefore pushes nothing — it just swaps in the
//! closure's body and extended environment — which makes every call in
//! tail position a proper tail call.
//!
//! The control stack ([`Stack`]) is reified as a persistent linked
//! structure. Frames are never mutated after being linked in, so
//! capturing the current stack is a single reference clone, and a
//! captured [`crate::ast::Sexp::Continuation`] stays valid and
//! re-invocable any number of times, including after the machine has
//! moved past the capture point.

use std::rc::Rc;

use tracing::debug;

use crate::Error;
use crate::ast::{Atom, Closure, Ctrl, Sexp};
use crate::intern::{Interner, Sym};

/// A persistent chain of single-binding frames.
///
/// Extension allocates a new frame pointing at the old chain; existing
/// frames are never mutated, so environments captured by closures and
/// continuations at different times share structure safely. Lookup walks
/// innermost-out and the first match wins, which is what makes shadowing
/// work.
#[derive(Debug, Clone, Default)]
pub struct Env {
    head: Option<Rc<Frame>>,
}

#[derive(Debug)]
struct Frame {
    symbol: Sym,
    value: Sexp,
    parent: Option<Rc<Frame>>,
}

impl Env {
    pub fn empty() -> Env {
        Env { head: None }
    }

    /// A new environment with one more binding, sharing this chain.
    pub fn extend(&self, symbol: Sym, value: Sexp) -> Env {
        Env {
            head: Some(Rc::new(Frame {
                symbol,
                value,
                parent: self.head.clone(),
            })),
        }
    }

    pub fn lookup(&self, symbol: Sym) -> Option<Sexp> {
        let mut frame = self.head.as_deref();
        while let Some(f) = frame {
            if f.symbol == symbol {
                return Some(f.value.clone());
            }
            frame = f.parent.as_deref();
        }
        None
    }
}

/// The reified control stack.
///
/// `Seq` frames discard the value they are resumed with and run their
/// stored control for the sequence's next element; `Bind` frames extend
/// their stored environment with the value and run their stored control
/// under it.
#[derive(Debug)]
pub enum Stack {
    /// Nothing left to do: resuming with a value finishes the program.
    Halt,
    Seq {
        env: Env,
        ctrl: Rc<Ctrl>,
        next: Rc<Stack>,
    },
    Bind {
        var: Sym,
        env: Env,
        ctrl: Rc<Ctrl>,
        next: Rc<Stack>,
    },
}

/// A machine state: either mid-computation or finished.
#[derive(Debug)]
pub enum State {
    Running {
        ctrl: Rc<Ctrl>,
        env: Env,
        stack: Rc<Stack>,
    },
    Done(Sexp),
}

impl State {
    /// Initial state for a whole program: its control tree, the library
    /// environment, and an empty stack.
    pub fn start(ctrl: Rc<Ctrl>, env: Env) -> State {
        State::Running {
            ctrl,
            env,
            stack: Rc::new(Stack::Halt),
        }
    }
}

/// Drive a state to completion.
pub fn run(state: State, syms: &Interner) -> Result<Sexp, Error> {
    let mut state = state;
    let mut steps: u64 = 0;
    loop {
        match state {
            State::Done(value) => {
                debug!(steps, "machine finished");
                return Ok(value);
            }
            State::Running { ctrl, env, stack } => {
                steps += 1;
                state = step(ctrl, env, stack, syms)?;
            }
        }
    }
}

/// One transition. Total over well-formed (normalized) control trees;
/// every failure is a fatal error surfaced to the caller of [`run`].
fn step(ctrl: Rc<Ctrl>, env: Env, stack: Rc<Stack>, syms: &Interner) -> Result<State, Error> {
    match &*ctrl {
        Ctrl::Lit(value) => Ok(resume(stack, value.clone())),

        Ctrl::Ref(symbol) => {
            let value = env
                .lookup(*symbol)
                .ok_or_else(|| Error::Unbound(syms.resolve(*symbol).to_owned()))?;
            Ok(resume(stack, value))
        }

        Ctrl::Proc { param, body } => {
            let closure = Sexp::Closure(Rc::new(Closure {
                param: *param,
                env: env.clone(),
                body: body.clone(),
            }));
            Ok(resume(stack, closure))
        }

        Ctrl::Call { callee, arg } => {
            let callable = resolve(callee, &env, syms)?;
            let value = resolve(arg, &env, syms)?;
            match callable {
                // Entering a closure body replaces control and
                // environment but leaves the stack alone: the tail-call
                // step.
                Sexp::Closure(closure) => Ok(State::Running {
                    ctrl: closure.body.clone(),
                    env: closure.env.extend(closure.param, value),
                    stack,
                }),
                // Invoking a continuation abandons the current stack
                // entirely and resumes the captured one.
                Sexp::Continuation(captured) => Ok(resume(captured, value)),
                Sexp::Subroutine(sub) => {
                    let result = sub.call(value, &env, syms)?;
                    Ok(resume(stack, result))
                }
                other => Err(Error::NotCallable(format!(
                    "cannot apply {}",
                    other.kind_name()
                ))),
            }
        }

        Ctrl::Bind { var, expr, body } => Ok(State::Running {
            ctrl: expr.clone(),
            env: env.clone(),
            stack: Rc::new(Stack::Bind {
                var: *var,
                env,
                ctrl: body.clone(),
                next: stack,
            }),
        }),

        Ctrl::If { test, then, els } => {
            let branch = if resolve(test, &env, syms)?.is_truthy() {
                then.clone()
            } else {
                els.clone()
            };
            Ok(State::Running {
                ctrl: branch,
                env,
                stack,
            })
        }

        Ctrl::Seq(ctrls) => {
            let Some((first, rest)) = ctrls.split_first() else {
                // the normalizer never emits an empty sequence
                return Ok(resume(stack, Sexp::Nothing));
            };
            let mut stack = stack;
            for ctrl in rest.iter().rev() {
                stack = Rc::new(Stack::Seq {
                    env: env.clone(),
                    ctrl: ctrl.clone(),
                    next: stack,
                });
            }
            Ok(State::Running {
                ctrl: first.clone(),
                env,
                stack,
            })
        }
    }
}

/// Resume a stack with a value.
fn resume(stack: Rc<Stack>, value: Sexp) -> State {
    match &*stack {
        Stack::Halt => State::Done(value),
        Stack::Seq { env, ctrl, next } => State::Running {
            ctrl: ctrl.clone(),
            env: env.clone(),
            stack: next.clone(),
        },
        Stack::Bind {
            var,
            env,
            ctrl,
            next,
        } => State::Running {
            ctrl: ctrl.clone(),
            env: env.extend(*var, value),
            stack: next.clone(),
        },
    }
}

/// Resolve an operand. By the ANF contract this never needs a control
/// transfer: the operand is a literal or a direct lookup.
fn resolve(atom: &Atom, env: &Env, syms: &Interner) -> Result<Sexp, Error> {
    match atom {
        Atom::Lit(value) => Ok(value.clone()),
        Atom::Ref(symbol) => env
            .lookup(*symbol)
            .ok_or_else(|| Error::Unbound(syms.resolve(*symbol).to_owned())),
    }
}
