//! Symbol interning.
//!
//! Symbols are interned: two symbols with the same name resolve to the
//! same [`Sym`] id, so environment lookup and special-form dispatch
//! compare by identity instead of by string. Everything that creates or
//! displays symbols (reader, front end, normalizer, printer, REPL) shares
//! one [`Interner`].

use string_interner::{DefaultBackend, StringInterner};

/// Interned symbol id. Copyable, hashable, identity-comparable.
pub type Sym = string_interner::DefaultSymbol;

/// Shared symbol table mapping names to [`Sym`] ids and back.
#[derive(Debug, Default)]
pub struct Interner {
    inner: StringInterner<DefaultBackend>,
}

impl Interner {
    pub fn new() -> Self {
        Interner {
            inner: StringInterner::new(),
        }
    }

    /// Intern a name, returning the existing id if already present.
    pub fn intern(&mut self, name: &str) -> Sym {
        self.inner.get_or_intern(name)
    }

    /// Look up an id without interning.
    pub fn get(&self, name: &str) -> Option<Sym> {
        self.inner.get(name)
    }

    /// Resolve an id back to its name.
    pub fn resolve(&self, sym: Sym) -> &str {
        self.inner.resolve(sym).unwrap_or("<unresolved>")
    }
}
