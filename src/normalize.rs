//! Rewriting surface control trees into administrative normal form.
//!
//! The rewrite is a compile-time continuation-passing transformation: a
//! transformation-time continuation (a Rust closure) describes what
//! control tree to build around an expression's eventual compiled value.
//! This is a device of the compiler only — it is unrelated to the
//! machine's runtime continuation stack.
//!
//! The central move is **atomization** ([`Normalizer::normalize_atom`]):
//! to place an expression where only a literal or reference is allowed,
//! either use it directly (it already is one) or hoist it into a
//! single-binding sequencer under a fresh temporary and refer to the
//! temporary instead. Applied everywhere, this serializes evaluation into
//! strict left-to-right binding order and leaves every operand position
//! trivially reducible, which is exactly the contract the machine's
//! `Call`/`If` steps rely on.
//!
//! Multi-parameter procedures and multi-argument calls are curried into
//! single-parameter, single-argument form. Multi-binding `let` is
//! **sequential**: each binding is hygienically renamed and the renaming
//! is substituted through everything that follows it (remaining binding
//! expressions and the body), so later bindings see earlier ones.

use std::rc::Rc;

use crate::ast::{Atom, Ctrl, Sexp};
use crate::intern::{Interner, Sym};
use crate::transform::Expr;

/// Transformation-time continuation over compiled expression trees.
type Cont = Rc<dyn Fn(&mut Normalizer, &mut Interner, Ctrl) -> Ctrl>;

/// Transformation-time continuation expecting an already-reduced operand.
type AtomCont = Rc<dyn Fn(&mut Normalizer, &mut Interner, Atom) -> Ctrl>;

/// The normalizer's compiler state: a counter making generated names
/// fresh for the lifetime of this instance. Keep one instance per
/// compilation session (the REPL keeps one for its whole life) so
/// temporaries never collide across inputs.
pub struct Normalizer {
    counter: u64,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Normalizer {
    pub fn new() -> Self {
        Normalizer { counter: 0 }
    }

    /// Normalize a whole surface tree.
    pub fn normalize(&mut self, expr: Expr, syms: &mut Interner) -> Rc<Ctrl> {
        Rc::new(self.normalize_expr(expr, syms, identity()))
    }

    /// A fresh symbol spelled `%base.N`. The `%`-and-counter spelling
    /// keeps generated names apart from anything a user plausibly writes.
    fn fresh(&mut self, base: &str, syms: &mut Interner) -> Sym {
        let name = format!("%{base}.{}", self.counter);
        self.counter += 1;
        syms.intern(&name)
    }

    fn normalize_expr(&mut self, expr: Expr, syms: &mut Interner, cont: Cont) -> Ctrl {
        match expr {
            Expr::Lit(value) => cont(self, syms, Ctrl::Lit(value)),
            Expr::Ref(sym) => cont(self, syms, Ctrl::Ref(sym)),
            Expr::Proc { params, body } => self.normalize_proc(params, body, syms, cont),
            Expr::Call { callee, args } => self.normalize_call(*callee, args, syms, cont),
            Expr::Let { bindings, body } => self.normalize_let(bindings, body, syms, cont),
            Expr::If { test, then, els } => self.normalize_if(*test, *then, *els, syms, cont),
            Expr::Begin(exprs) => self.normalize_begin(exprs, syms, cont),
        }
    }

    /// Reduce an expression to an operand: literals and references pass
    /// through; anything compound is bound to a fresh temporary first.
    fn normalize_atom(&mut self, expr: Expr, syms: &mut Interner, cont: AtomCont) -> Ctrl {
        match expr {
            Expr::Lit(value) => cont(self, syms, Atom::Lit(value)),
            Expr::Ref(sym) => cont(self, syms, Atom::Ref(sym)),
            compound => {
                let tmp = self.fresh("tmp", syms);
                self.normalize_expr(
                    compound,
                    syms,
                    Rc::new(move |n, syms, compiled| Ctrl::Bind {
                        var: tmp,
                        expr: Rc::new(compiled),
                        body: Rc::new(cont(n, syms, Atom::Ref(tmp))),
                    }),
                )
            }
        }
    }

    /// `(f (p1 ... pn) body...)` becomes n nested single-parameter
    /// procedures around the body sequence; zero parameters still take
    /// one (ignored) argument under the curried calling convention.
    fn normalize_proc(
        &mut self,
        params: Vec<Sym>,
        body: Vec<Expr>,
        syms: &mut Interner,
        cont: Cont,
    ) -> Ctrl {
        let mut params = params;
        if params.is_empty() {
            params.push(self.fresh("drop", syms));
        }
        let mut ctrl = self.normalize_expr(Expr::Begin(body), syms, identity());
        for &param in params[1..].iter().rev() {
            ctrl = Ctrl::Proc {
                param,
                body: Rc::new(ctrl),
            };
        }
        cont(
            self,
            syms,
            Ctrl::Proc {
                param: params[0],
                body: Rc::new(ctrl),
            },
        )
    }

    /// An n-ary call is curried one argument at a time. The callee and
    /// first argument are atomized (left to right) into a unary call;
    /// its result, bound to a temporary, is applied to the next argument,
    /// and so on. Every operand is evaluated exactly once, left to right.
    fn normalize_call(
        &mut self,
        callee: Expr,
        args: Vec<Expr>,
        syms: &mut Interner,
        cont: Cont,
    ) -> Ctrl {
        let mut args = args.into_iter();
        let Some(first) = args.next() else {
            // the front end guarantees at least one argument
            return self.normalize_expr(callee, syms, cont);
        };
        let rest: Vec<Expr> = args.collect();

        if rest.is_empty() {
            self.normalize_atom(
                callee,
                syms,
                Rc::new(move |n, syms, callee_atom| {
                    let cont = cont.clone();
                    n.normalize_atom(
                        first.clone(),
                        syms,
                        Rc::new(move |n, syms, arg_atom| {
                            cont(
                                n,
                                syms,
                                Ctrl::Call {
                                    callee: callee_atom.clone(),
                                    arg: arg_atom,
                                },
                            )
                        }),
                    )
                }),
            )
        } else {
            let single = Expr::Call {
                callee: Box::new(callee),
                args: vec![first],
            };
            self.normalize_atom(
                single,
                syms,
                Rc::new(move |n, syms, callee_atom| {
                    n.normalize_call(atom_expr(callee_atom), rest.clone(), syms, cont.clone())
                }),
            )
        }
    }

    /// Bindings are processed left to right. The bound name is replaced
    /// by a fresh one, substituted through the remaining bindings and the
    /// body, and the binding's expression is sequenced ahead of them.
    /// Later bindings therefore see earlier ones in scope.
    fn normalize_let(
        &mut self,
        bindings: Vec<(Sym, Expr)>,
        body: Vec<Expr>,
        syms: &mut Interner,
        cont: Cont,
    ) -> Ctrl {
        let mut bindings = bindings.into_iter();
        let Some((var, expr)) = bindings.next() else {
            return self.normalize_expr(Expr::Begin(body), syms, cont);
        };

        let base = syms.resolve(var).to_owned();
        let renamed = self.fresh(&base, syms);

        let rest: Vec<(Sym, Expr)> = bindings
            .map(|(v, e)| {
                (
                    if v == var { renamed } else { v },
                    rename(var, renamed, e),
                )
            })
            .collect();
        let body: Vec<Expr> = body.into_iter().map(|e| rename(var, renamed, e)).collect();

        let next = if rest.is_empty() {
            Expr::Begin(body)
        } else {
            Expr::Let {
                bindings: rest,
                body,
            }
        };

        self.normalize_expr(
            expr,
            syms,
            Rc::new(move |n, syms, compiled| Ctrl::Bind {
                var: renamed,
                expr: Rc::new(compiled),
                body: Rc::new(n.normalize_expr(next.clone(), syms, cont.clone())),
            }),
        )
    }

    /// The test is atomized; both branches are normalized independently
    /// under the same continuation. The duplicated continuation is static
    /// code, not runtime state, so the copy is sound.
    fn normalize_if(
        &mut self,
        test: Expr,
        then: Expr,
        els: Expr,
        syms: &mut Interner,
        cont: Cont,
    ) -> Ctrl {
        self.normalize_atom(
            test,
            syms,
            Rc::new(move |n, syms, test_atom| Ctrl::If {
                test: test_atom,
                then: Rc::new(n.normalize_expr(then.clone(), syms, cont.clone())),
                els: Rc::new(n.normalize_expr(els.clone(), syms, cont.clone())),
            }),
        )
    }

    /// All elements but the last are normalized for effect only (under
    /// the identity continuation); the last runs under the caller's.
    fn normalize_begin(&mut self, exprs: Vec<Expr>, syms: &mut Interner, cont: Cont) -> Ctrl {
        let mut exprs = exprs;
        let Some(last) = exprs.pop() else {
            // the front end never produces an empty sequence
            return cont(self, syms, Ctrl::Lit(Sexp::Nothing));
        };
        if exprs.is_empty() {
            return self.normalize_expr(last, syms, cont);
        }
        let mut ctrls = Vec::with_capacity(exprs.len() + 1);
        for expr in exprs {
            ctrls.push(Rc::new(self.normalize_expr(expr, syms, identity())));
        }
        ctrls.push(Rc::new(self.normalize_expr(last, syms, cont)));
        Ctrl::Seq(ctrls)
    }
}

fn identity() -> Cont {
    Rc::new(|_, _, ctrl| ctrl)
}

fn atom_expr(atom: Atom) -> Expr {
    match atom {
        Atom::Lit(value) => Expr::Lit(value),
        Atom::Ref(sym) => Expr::Ref(sym),
    }
}

/// Substitute `after` for every occurrence of `target`, including
/// binder positions: renaming a binder together with all its uses keeps
/// the program's binding structure intact, and any enclosed binder of
/// the same name is itself renamed afresh when its own form is reached.
/// Binding expressions of nested `let`s are substituted too — they
/// evaluate in the scope where `target` is visible.
fn rename(target: Sym, after: Sym, expr: Expr) -> Expr {
    let sub = |sym: Sym| if sym == target { after } else { sym };
    match expr {
        Expr::Lit(value) => Expr::Lit(value),
        Expr::Ref(sym) => Expr::Ref(sub(sym)),
        Expr::Proc { params, body } => Expr::Proc {
            params: params.into_iter().map(sub).collect(),
            body: body.into_iter().map(|e| rename(target, after, e)).collect(),
        },
        Expr::Call { callee, args } => Expr::Call {
            callee: Box::new(rename(target, after, *callee)),
            args: args.into_iter().map(|e| rename(target, after, e)).collect(),
        },
        Expr::Let { bindings, body } => Expr::Let {
            bindings: bindings
                .into_iter()
                .map(|(v, e)| (sub(v), rename(target, after, e)))
                .collect(),
            body: body.into_iter().map(|e| rename(target, after, e)).collect(),
        },
        Expr::If { test, then, els } => Expr::If {
            test: Box::new(rename(target, after, *test)),
            then: Box::new(rename(target, after, *then)),
            els: Box::new(rename(target, after, *els)),
        },
        Expr::Begin(exprs) => Expr::Begin(
            exprs
                .into_iter()
                .map(|e| rename(target, after, e))
                .collect(),
        ),
    }
}
