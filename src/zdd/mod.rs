//! Embedded zero-suppressed binary decision diagram engine.
//!
//! No published crate exposes a ZBDD façade shaped like SAPPOROBDD's (a
//! single global variable universe, reference-counted handles, `Change`/
//! `OnSet0`/`OffSet` primitives); this module provides an equivalent one so
//! the rest of the crate can be written exactly as it would be against that
//! library. [`node`] holds the arena and the recursive set-algebra; this
//! module wraps it in a safe, reference-counted handle and a process-global
//! singleton guarded by a [`parking_lot::Mutex`].
//!
//! Variables never get reordered by this engine, so a variable's id and its
//! level in the diagram are the same number; [`Zdd::lev_of_var`] is provided
//! purely for façade symmetry with libraries that do support reordering.

mod node;

use std::sync::OnceLock;

use parking_lot::Mutex;

use node::{Engine, NodeId, VarId, FALSE, TRUE};

static ENGINE: OnceLock<Mutex<Engine>> = OnceLock::new();

/// Initializes the global ZDD universe with `total_vars` variables
/// (numbered `1..=total_vars`). Idempotent: a second call is only valid if
/// `total_vars` does not exceed the value used the first time.
///
/// # Panics
///
/// Panics if called twice with an incompatible (larger) `total_vars`; this
/// mirrors the "declare a compatible variable count or panic" contract
/// every [`crate::storage::Storage`] relies on.
pub(crate) fn init(total_vars: u32) {
    let mutex = ENGINE.get_or_init(|| Mutex::new(Engine::new(total_vars)));
    let engine = mutex.lock();
    assert!(
        total_vars <= engine.total_vars(),
        "ZDD universe already initialized with {} variables, cannot grow to {total_vars}",
        engine.total_vars(),
    );
}

fn with_engine<R>(f: impl FnOnce(&mut Engine) -> R) -> R {
    let mutex = ENGINE.get().expect("zdd::init must run before any Zdd use");
    let mut engine = mutex.lock();
    f(&mut engine)
}

/// Forces a best-effort reclamation pass on the global engine. See
/// [`node::Engine::gc`] for what this does and does not reclaim.
pub(crate) fn gc() {
    with_engine(Engine::gc);
}

pub(crate) fn node_count() -> usize {
    with_engine(Engine::node_count)
}

/// A reference-counted handle to a node in the global ZDD. Cloning bumps
/// the node's refcount, dropping decrements it; the raw arena index is
/// never exposed outside this module.
pub(crate) struct Zdd(NodeId);

impl Zdd {
    fn from_raw(id: NodeId) -> Self {
        with_engine(|e| e.incref(id));
        Self(id)
    }

    pub(crate) fn is_false(&self) -> bool {
        self.0 == FALSE
    }

    pub(crate) fn is_true(&self) -> bool {
        self.0 == TRUE
    }

    /// The topmost variable of this node's diagram, or `None` for a terminal.
    pub(crate) fn top(&self) -> Option<VarId> {
        with_engine(|e| e.top(self.0))
    }

    /// A variable's level. Identity in this engine: variables are never
    /// reordered once created.
    pub(crate) fn lev_of_var(v: VarId) -> VarId {
        v
    }

    /// Toggles membership of variable `v` in every combination represented
    /// by this diagram.
    pub(crate) fn change(&self, v: VarId) -> Zdd {
        let id = with_engine(|e| e.change(self.0, v));
        Zdd::from_raw(id)
    }

    /// Combinations containing `v`, with `v` stripped from the representation.
    pub(crate) fn on_set0(&self, v: VarId) -> Zdd {
        let id = with_engine(|e| e.on_set0(self.0, v));
        Zdd::from_raw(id)
    }

    /// Combinations containing `v`, `v` kept in the representation.
    pub(crate) fn on_set(&self, v: VarId) -> Zdd {
        let id = with_engine(|e| e.on_set(self.0, v));
        Zdd::from_raw(id)
    }

    /// Combinations not containing `v`.
    pub(crate) fn off_set(&self, v: VarId) -> Zdd {
        let id = with_engine(|e| e.off_set(self.0, v));
        Zdd::from_raw(id)
    }

    /// The terminal representing the empty family of combinations.
    pub(crate) fn empty() -> Zdd {
        Zdd::from_raw(FALSE)
    }

    /// The terminal representing the family containing only the empty
    /// combination (SAPPOROBDD's `Single`).
    pub(crate) fn single() -> Zdd {
        Zdd::from_raw(TRUE)
    }
}

impl Clone for Zdd {
    fn clone(&self) -> Self {
        Zdd::from_raw(self.0)
    }
}

impl Drop for Zdd {
    fn drop(&mut self) {
        with_engine(|e| e.decref(self.0));
    }
}

impl PartialEq for Zdd {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for Zdd {}

impl std::ops::Add for &Zdd {
    type Output = Zdd;

    /// Set union.
    fn add(self, rhs: &Zdd) -> Zdd {
        let id = with_engine(|e| e.union(self.0, rhs.0));
        Zdd::from_raw(id)
    }
}

impl std::ops::Sub for &Zdd {
    type Output = Zdd;

    /// Set difference.
    fn sub(self, rhs: &Zdd) -> Zdd {
        let id = with_engine(|e| e.difference(self.0, rhs.0));
        Zdd::from_raw(id)
    }
}

impl std::fmt::Debug for Zdd {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_false() {
            write!(f, "Zdd(∅)")
        } else if self.is_true() {
            write!(f, "Zdd({{∅}})")
        } else {
            write!(f, "Zdd(#{})", self.0)
        }
    }
}
