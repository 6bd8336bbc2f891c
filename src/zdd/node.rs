//! Node arena and unique table for the embedded ZDD engine.
//!
//! A node is a `(var, low, high)` triple; `var` numbers grow downward (1 is
//! topmost). The unique table guarantees structurally identical subdiagrams
//! share a single arena slot, and the zero-suppression rule (`high == FALSE`
//! collapses a node to its `low` child) is applied in [`Engine::mk_node`]
//! rather than by callers.

use std::collections::HashMap;

pub(crate) type VarId = u32;
pub(crate) type NodeId = u32;

/// Terminal representing the empty family of combinations.
pub(crate) const FALSE: NodeId = 0;
/// Terminal representing the family containing only the empty combination.
pub(crate) const TRUE: NodeId = 1;

#[derive(Clone, Copy, Debug)]
struct Node {
    var: VarId,
    low: NodeId,
    high: NodeId,
}

/// Process-wide ZDD state: the node arena, its unique table, and the apply
/// caches for the binary/unary set operations.
///
/// Dead-node reclamation is intentionally not implemented here (see
/// `DESIGN.md`): the arena only grows. [`Engine::gc`] exists to satisfy the
/// façade contract and is where a mark-and-sweep pass would live if the
/// crate ever needed to cap memory growth instead of relying on whole-shard
/// rebuilds to bound diagram size.
pub(crate) struct Engine {
    nodes: Vec<Node>,
    unique: HashMap<(VarId, NodeId, NodeId), NodeId>,
    refcount: Vec<u32>,
    total_vars: u32,
    union_cache: HashMap<(NodeId, NodeId), NodeId>,
    diff_cache: HashMap<(NodeId, NodeId), NodeId>,
}

impl Engine {
    pub(crate) fn new(total_vars: u32) -> Self {
        let mut nodes = Vec::with_capacity(2);
        // index FALSE and TRUE are both "terminal" nodes; var = 0 marks a
        // terminal and is never a valid user variable id (variables start
        // at 1).
        nodes.push(Node { var: 0, low: 0, high: 0 });
        nodes.push(Node { var: 0, low: 1, high: 1 });
        Self {
            nodes,
            unique: HashMap::new(),
            refcount: vec![u32::MAX, u32::MAX],
            total_vars,
            union_cache: HashMap::new(),
            diff_cache: HashMap::new(),
        }
    }

    pub(crate) fn total_vars(&self) -> u32 {
        self.total_vars
    }

    #[inline]
    fn is_terminal(id: NodeId) -> bool {
        id == FALSE || id == TRUE
    }

    #[inline]
    fn var(&self, id: NodeId) -> VarId {
        self.nodes[id as usize].var
    }

    #[inline]
    fn low(&self, id: NodeId) -> NodeId {
        self.nodes[id as usize].low
    }

    #[inline]
    fn high(&self, id: NodeId) -> NodeId {
        self.nodes[id as usize].high
    }

    pub(crate) fn top(&self, id: NodeId) -> Option<VarId> {
        if Self::is_terminal(id) {
            None
        } else {
            Some(self.var(id))
        }
    }

    /// Creates (or reuses, via the unique table) the node `(var, low, high)`,
    /// applying the zero-suppression rule.
    pub(crate) fn mk_node(&mut self, var: VarId, low: NodeId, high: NodeId) -> NodeId {
        if high == FALSE {
            return low;
        }
        let key = (var, low, high);
        if let Some(&id) = self.unique.get(&key) {
            return id;
        }
        let id = self.nodes.len() as NodeId;
        self.nodes.push(Node { var, low, high });
        self.refcount.push(0);
        self.unique.insert(key, id);
        id
    }

    pub(crate) fn incref(&mut self, id: NodeId) {
        if !Self::is_terminal(id) {
            self.refcount[id as usize] += 1;
        }
    }

    pub(crate) fn decref(&mut self, id: NodeId) {
        if !Self::is_terminal(id) {
            let rc = &mut self.refcount[id as usize];
            debug_assert!(*rc > 0, "refcount underflow on node {id}");
            *rc = rc.saturating_sub(1);
        }
    }

    /// Best-effort hook for the façade's global GC. Real reclamation is out
    /// of scope (see module docs); this clears the apply caches, which are
    /// the only structures that can grow unboundedly independent of the
    /// live node set.
    pub(crate) fn gc(&mut self) {
        self.union_cache.clear();
        self.diff_cache.clear();
    }

    pub(crate) fn node_count(&self) -> usize {
        self.nodes.len() - 2
    }

    // --- set algebra -----------------------------------------------------

    pub(crate) fn union(&mut self, f: NodeId, g: NodeId) -> NodeId {
        if f == FALSE {
            return g;
        }
        if g == FALSE || f == g {
            return f;
        }
        let key = (f.min(g), f.max(g));
        if let Some(&cached) = self.union_cache.get(&key) {
            return cached;
        }
        let result = match (Self::is_terminal(f), Self::is_terminal(g)) {
            (true, true) => TRUE, // f,g in {TRUE} here since FALSE/equal handled above
            (true, false) => {
                // f == TRUE: the empty combination must be present in the result.
                let (v, l, h) = (self.var(g), self.low(g), self.high(g));
                let new_low = self.union(TRUE, l);
                self.mk_node(v, new_low, h)
            }
            (false, true) => {
                let (v, l, h) = (self.var(f), self.low(f), self.high(f));
                let new_low = self.union(l, TRUE);
                self.mk_node(v, new_low, h)
            }
            (false, false) => {
                let (vf, vg) = (self.var(f), self.var(g));
                if vf == vg {
                    let (lf, hf) = (self.low(f), self.high(f));
                    let (lg, hg) = (self.low(g), self.high(g));
                    let new_low = self.union(lf, lg);
                    let new_high = self.union(hf, hg);
                    self.mk_node(vf, new_low, new_high)
                } else if vf < vg {
                    let (lf, hf) = (self.low(f), self.high(f));
                    let new_low = self.union(lf, g);
                    self.mk_node(vf, new_low, hf)
                } else {
                    let (lg, hg) = (self.low(g), self.high(g));
                    let new_low = self.union(f, lg);
                    self.mk_node(vg, new_low, hg)
                }
            }
        };
        self.union_cache.insert(key, result);
        result
    }

    pub(crate) fn difference(&mut self, f: NodeId, g: NodeId) -> NodeId {
        if f == FALSE || g == FALSE {
            return f;
        }
        if f == g {
            return FALSE;
        }
        let key = (f, g);
        if let Some(&cached) = self.diff_cache.get(&key) {
            return cached;
        }
        let result = if f == TRUE {
            // g != FALSE, g != TRUE (f==g handled above): the empty
            // combination survives unless g's high side covers it, which it
            // can't (every member of g's high branch contains g's top var).
            // So subtracting any g that still has TRUE in its low chain removes it.
            let (v, l, h) = (self.var(g), self.low(g), self.high(g));
            let _ = (v, h);
            self.difference(TRUE, l)
        } else if g == TRUE {
            // Removing the empty combination from f, if present.
            let (v, l, h) = (self.var(f), self.low(f), self.high(f));
            let new_low = self.difference(l, TRUE);
            self.mk_node(v, new_low, h)
        } else {
            let (vf, vg) = (self.var(f), self.var(g));
            if vf == vg {
                let (lf, hf) = (self.low(f), self.high(f));
                let (lg, hg) = (self.low(g), self.high(g));
                let new_low = self.difference(lf, lg);
                let new_high = self.difference(hf, hg);
                self.mk_node(vf, new_low, new_high)
            } else if vf < vg {
                let (lf, hf) = (self.low(f), self.high(f));
                let new_low = self.difference(lf, g);
                self.mk_node(vf, new_low, hf)
            } else {
                let lg = self.low(g);
                self.difference(f, lg)
            }
        };
        self.diff_cache.insert(key, result);
        result
    }

    /// Toggles membership of `v` in every combination of `f`.
    pub(crate) fn change(&mut self, f: NodeId, v: VarId) -> NodeId {
        if f == FALSE {
            return FALSE;
        }
        if f == TRUE {
            return self.mk_node(v, FALSE, TRUE);
        }
        let t = self.var(f);
        let (l, h) = (self.low(f), self.high(f));
        if t == v {
            // Swap: combinations without v gain it, combinations with v lose it.
            self.mk_node(t, h, l)
        } else if t < v {
            let new_low = self.change(l, v);
            let new_high = self.change(h, v);
            self.mk_node(t, new_low, new_high)
        } else {
            // v does not occur in f: every combination gains it.
            self.mk_node(v, FALSE, f)
        }
    }

    /// Combinations of `f` that contain `v`, with `v` stripped from the
    /// representation (SAPPOROBDD's `OnSet0`).
    pub(crate) fn on_set0(&mut self, f: NodeId, v: VarId) -> NodeId {
        if Self::is_terminal(f) {
            return FALSE;
        }
        let t = self.var(f);
        if t == v {
            self.high(f)
        } else if t > v {
            FALSE
        } else {
            let (l, h) = (self.low(f), self.high(f));
            let new_low = self.on_set0(l, v);
            let new_high = self.on_set0(h, v);
            self.mk_node(t, new_low, new_high)
        }
    }

    /// Combinations of `f` that do not contain `v`.
    pub(crate) fn off_set(&mut self, f: NodeId, v: VarId) -> NodeId {
        if Self::is_terminal(f) {
            return f;
        }
        let t = self.var(f);
        if t == v {
            self.low(f)
        } else if t > v {
            f
        } else {
            let (l, h) = (self.low(f), self.high(f));
            let new_low = self.off_set(l, v);
            let new_high = self.off_set(h, v);
            self.mk_node(t, new_low, new_high)
        }
    }

    /// Combinations of `f` that contain `v`, `v` kept in the representation.
    pub(crate) fn on_set(&mut self, f: NodeId, v: VarId) -> NodeId {
        let stripped = self.on_set0(f, v);
        if stripped == FALSE {
            FALSE
        } else {
            self.mk_node(v, FALSE, stripped)
        }
    }
}
