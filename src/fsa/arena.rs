use std::mem;

use smallvec::SmallVec;

use super::state_id::StateId;
use super::FsaError;

/// Maximum number of bytes an inline zpath run may carry.
pub const MAX_ZPATH: usize = 254;

/// One state: sorted transitions, terminal flag, optional inline zpath.
#[derive(Clone, Debug, Default)]
struct StateRepr<Id> {
    /// Outgoing transitions, kept sorted and unique by label.
    trans: SmallVec<[(u8, Id); 2]>,
    /// Inline byte run consumed on arrival. Empty unless path-zipped.
    zpath: SmallVec<[u8; 8]>,
    term: bool,
    free: bool,
}

/// Growable store of automaton states addressed by integer id.
///
/// The arena owns every state of one automaton under construction. Freed
/// ids go onto a free-list and are handed out again by [`new_state`]
/// (`StateArena::new_state`), so id stability is only guaranteed for live
/// states. State 0 is always the initial state and is never freed.
///
/// # Examples
///
/// ```
/// use libfsa::fsa::StateArena;
///
/// let mut arena = StateArena::<u32>::new();
/// let s = arena.new_state().unwrap();
/// arena.add_transition(StateArena::<u32>::initial_state(), b'a', s);
/// arena.set_term(s, true);
/// assert_eq!(arena.target(0, b'a'), Some(s));
/// assert_eq!(arena.num_used_states(), 2);
/// ```
#[derive(Clone, Debug)]
pub struct StateArena<Id: StateId> {
    states: Vec<StateRepr<Id>>,
    free: Vec<Id>,
}

impl<Id: StateId> StateArena<Id> {
    /// Creates an arena holding only the initial state.
    pub fn new() -> Self {
        StateArena {
            states: vec![StateRepr::default()],
            free: Vec::new(),
        }
    }

    /// Creates an arena with `n` empty states (state 0 is the initial one).
    pub(crate) fn with_states(n: usize) -> Result<Self, FsaError> {
        if n == 0 || (n - 1) as u64 > Id::MAX_ID {
            return Err(FsaError::CapacityExceeded { max_id: Id::MAX_ID });
        }
        Ok(StateArena {
            states: vec![StateRepr::default(); n],
            free: Vec::new(),
        })
    }

    /// Returns the id of the initial state.
    #[inline]
    pub fn initial_state() -> Id {
        Id::from_u64(0)
    }

    /// Allocates a state, reusing a freed slot when one is available.
    ///
    /// # Errors
    ///
    /// Returns [`FsaError::CapacityExceeded`] when the id range of `Id`
    /// is exhausted.
    pub fn new_state(&mut self) -> Result<Id, FsaError> {
        if let Some(id) = self.free.pop() {
            let s = &mut self.states[id.index()];
            debug_assert!(s.free);
            s.free = false;
            return Ok(id);
        }
        if self.states.len() as u64 > Id::MAX_ID {
            return Err(FsaError::CapacityExceeded { max_id: Id::MAX_ID });
        }
        let id = Id::from_usize(self.states.len());
        self.states.push(StateRepr::default());
        Ok(id)
    }

    /// Checks that `extra` more states can be allocated without exhausting
    /// the id range. Lets callers fail before mutating anything.
    pub fn ensure_capacity(&self, extra: usize) -> Result<(), FsaError> {
        let fresh = extra.saturating_sub(self.free.len());
        if fresh > 0 && (self.states.len() + fresh - 1) as u64 > Id::MAX_ID {
            return Err(FsaError::CapacityExceeded { max_id: Id::MAX_ID });
        }
        Ok(())
    }

    /// Allocates a copy of `src` (same transitions and terminal flag).
    pub fn clone_state(&mut self, src: Id) -> Result<Id, FsaError> {
        let id = self.new_state()?;
        let copy = StateRepr {
            trans: self.states[src.index()].trans.clone(),
            zpath: self.states[src.index()].zpath.clone(),
            term: self.states[src.index()].term,
            free: false,
        };
        self.states[id.index()] = copy;
        Ok(id)
    }

    /// Returns `id` to the free-list. The initial state cannot be freed.
    pub fn free_state(&mut self, id: Id) {
        assert!(id.to_u64() != 0, "cannot free the initial state");
        let s = &mut self.states[id.index()];
        debug_assert!(!s.free);
        s.trans.clear();
        s.zpath.clear();
        s.term = false;
        s.free = true;
        self.free.push(id);
    }

    /// Adds a transition. The label must not already be present.
    pub fn add_transition(&mut self, state: Id, label: u8, target: Id) {
        let trans = &mut self.states[state.index()].trans;
        match trans.binary_search_by_key(&label, |&(c, _)| c) {
            Ok(_) => panic!("add_transition: label already present"),
            Err(pos) => trans.insert(pos, (label, target)),
        }
    }

    /// Replaces the target of an existing transition, returning the old one.
    pub fn set_transition(&mut self, state: Id, label: u8, target: Id) -> Id {
        let trans = &mut self.states[state.index()].trans;
        match trans.binary_search_by_key(&label, |&(c, _)| c) {
            Ok(pos) => mem::replace(&mut trans[pos].1, target),
            Err(_) => panic!("set_transition: label not found"),
        }
    }

    /// Removes an existing transition.
    pub fn remove_transition(&mut self, state: Id, label: u8) {
        let trans = &mut self.states[state.index()].trans;
        match trans.binary_search_by_key(&label, |&(c, _)| c) {
            Ok(pos) => {
                trans.remove(pos);
            }
            Err(_) => panic!("remove_transition: label not found"),
        }
    }

    /// Returns the target of the transition on `label`, if any.
    #[inline]
    pub fn target(&self, state: Id, label: u8) -> Option<Id> {
        let trans = &self.states[state.index()].trans;
        trans
            .binary_search_by_key(&label, |&(c, _)| c)
            .ok()
            .map(|pos| trans[pos].1)
    }

    /// Returns the sorted transition list of a state.
    #[inline]
    pub fn transitions(&self, state: Id) -> &[(u8, Id)] {
        &self.states[state.index()].trans
    }

    /// True if `state` accepts (a word ends here).
    #[inline]
    pub fn is_term(&self, state: Id) -> bool {
        self.states[state.index()].term
    }

    /// Sets the terminal flag.
    #[inline]
    pub fn set_term(&mut self, state: Id, term: bool) {
        self.states[state.index()].term = term;
    }

    /// Returns the inline zpath run of a state (empty unless zipped).
    #[inline]
    pub fn zpath(&self, state: Id) -> &[u8] {
        &self.states[state.index()].zpath
    }

    /// Attaches an inline zpath run to a state.
    pub fn set_zpath(&mut self, state: Id, zpath: &[u8]) {
        assert!(zpath.len() <= MAX_ZPATH, "zpath run too long");
        let s = &mut self.states[state.index()];
        s.zpath.clear();
        s.zpath.extend_from_slice(zpath);
    }

    /// True if `state` is on the free-list.
    #[inline]
    pub fn is_free(&self, state: Id) -> bool {
        self.states[state.index()].free
    }

    /// Total number of slots, live and free.
    #[inline]
    pub fn total_states(&self) -> usize {
        self.states.len()
    }

    /// Number of live states.
    #[inline]
    pub fn num_used_states(&self) -> usize {
        self.states.len() - self.free.len()
    }

    /// Approximate heap footprint in bytes.
    pub fn mem_size(&self) -> usize {
        let mut size = self.states.capacity() * mem::size_of::<StateRepr<Id>>()
            + self.free.capacity() * mem::size_of::<Id>();
        for s in &self.states {
            if s.trans.spilled() {
                size += s.trans.capacity() * mem::size_of::<(u8, Id)>();
            }
            if s.zpath.spilled() {
                size += s.zpath.capacity();
            }
        }
        size
    }

    /// Computes the in-degree of every state reachable from `root`.
    /// Unreachable and free slots report 0.
    pub fn compute_in_degree(&self, root: Id) -> Vec<u32> {
        let mut indeg = vec![0u32; self.states.len()];
        let mut seen = vec![false; self.states.len()];
        let mut stack = vec![root];
        seen[root.index()] = true;
        while let Some(s) = stack.pop() {
            for &(_, t) in self.transitions(s) {
                indeg[t.index()] += 1;
                if !seen[t.index()] {
                    seen[t.index()] = true;
                    stack.push(t);
                }
            }
        }
        indeg
    }
}

impl<Id: StateId> Default for StateArena<Id> {
    fn default() -> Self {
        Self::new()
    }
}
