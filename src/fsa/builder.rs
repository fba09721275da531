use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use hashbrown::HashMap;
use smallvec::SmallVec;
use tracing::debug;

use super::arena::StateArena;
use super::automaton::Automaton;
use super::state_id::StateId;
use super::FsaError;

/// Trait for types that can be used as a word when building an automaton.
///
/// Implemented for common string and byte-sequence types so that
/// `add_word` and friends accept them directly without manual conversion.
pub trait IntoWord {
    /// Collects this word into a byte buffer.
    fn collect_word(self) -> SmallVec<[u8; 32]>;
}

impl IntoWord for &str {
    fn collect_word(self) -> SmallVec<[u8; 32]> {
        SmallVec::from_slice(self.as_bytes())
    }
}

impl IntoWord for &&str {
    fn collect_word(self) -> SmallVec<[u8; 32]> {
        SmallVec::from_slice(self.as_bytes())
    }
}

impl IntoWord for String {
    fn collect_word(self) -> SmallVec<[u8; 32]> {
        SmallVec::from_slice(self.as_bytes())
    }
}

impl IntoWord for &String {
    fn collect_word(self) -> SmallVec<[u8; 32]> {
        SmallVec::from_slice(self.as_bytes())
    }
}

impl IntoWord for &[u8] {
    fn collect_word(self) -> SmallVec<[u8; 32]> {
        SmallVec::from_slice(self)
    }
}

impl IntoWord for Vec<u8> {
    fn collect_word(self) -> SmallVec<[u8; 32]> {
        SmallVec::from_vec(self)
    }
}

impl IntoWord for &Vec<u8> {
    fn collect_word(self) -> SmallVec<[u8; 32]> {
        SmallVec::from_slice(self)
    }
}

impl<const N: usize> IntoWord for [u8; N] {
    fn collect_word(self) -> SmallVec<[u8; 32]> {
        SmallVec::from_slice(&self)
    }
}

impl<const N: usize> IntoWord for &[u8; N] {
    fn collect_word(self) -> SmallVec<[u8; 32]> {
        SmallVec::from_slice(self)
    }
}

/// Canonical signature of a state: terminal flag plus sorted
/// `(label, child-id)` pairs. Children must already be canonical, so
/// comparing child ids is enough — no recursion into subtrees.
#[derive(Clone, PartialEq, Eq, Hash)]
struct Sig<Id> {
    term: bool,
    trans: SmallVec<[(u8, Id); 4]>,
}

fn sig_of<Id: StateId>(arena: &StateArena<Id>, s: Id) -> Sig<Id> {
    Sig {
        term: arena.is_term(s),
        trans: SmallVec::from_slice(arena.transitions(s)),
    }
}

/// Returns true if this line of a word-list file is a comment.
pub(crate) fn is_comment(line: &str) -> bool {
    line.trim_start().starts_with('#')
}

fn for_each_word_line(
    path: &Path,
    mut f: impl FnMut(&[u8]) -> Result<(), FsaError>,
) -> Result<(), FsaError> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);
    // Reuse one line buffer instead of allocating per line.
    let mut buf = String::with_capacity(80);
    loop {
        match reader.read_line(&mut buf) {
            Ok(0) => break,
            Err(e) => return Err(e.into()),
            _ => {}
        }
        let word = buf.trim_end();
        if !word.is_empty() && !is_comment(word) {
            f(word.as_bytes())?;
        }
        buf.clear();
    }
    Ok(())
}

// --- Ordered variant ---

/// A pending (not yet frozen) state on the ordered builder's stack.
struct Pending<Id> {
    /// Edge label from the parent pending state. Unused for the root.
    label: u8,
    term: bool,
    /// Frozen children, labels strictly ascending.
    trans: SmallVec<[(u8, Id); 4]>,
}

/// Minimizing builder for lexicographically sorted input.
///
/// Keeps a stack mirroring the current word's path. On each insertion,
/// every suffix state that sorted order guarantees can never be extended
/// again is frozen — hash-consed into the register — so construction runs
/// in amortized O(word length) with no lookups outside the stack.
///
/// # Examples
///
/// ```
/// use libfsa::fsa::OrderedBuilder;
///
/// let mut b = OrderedBuilder::<u32>::new();
/// for word in ["car", "cart", "cat", "dog"] {
///     b.add_word(word).unwrap();
/// }
/// let auto = b.finish().unwrap();
/// assert_eq!(auto.num_words(), 4);
/// assert!(auto.contains("cart"));
/// ```
pub struct OrderedBuilder<Id: StateId = u32> {
    arena: StateArena<Id>,
    stack: Vec<Pending<Id>>,
    register: HashMap<Sig<Id>, Id>,
    prev: SmallVec<[u8; 32]>,
    n_words: u64,
}

impl<Id: StateId> OrderedBuilder<Id> {
    /// Creates an empty builder.
    pub fn new() -> Self {
        OrderedBuilder {
            arena: StateArena::new(),
            stack: vec![Pending {
                label: 0,
                term: false,
                trans: SmallVec::new(),
            }],
            register: HashMap::new(),
            prev: SmallVec::new(),
            n_words: 0,
        }
    }

    /// Adds a word. Words must arrive in non-decreasing lexicographic
    /// order.
    ///
    /// Returns `Ok(true)` if the word was new, `Ok(false)` if it repeats
    /// the previous word.
    ///
    /// # Errors
    ///
    /// [`FsaError::OutOfOrder`] if `word` sorts before the previous word;
    /// [`FsaError::CapacityExceeded`] if the id range runs out.
    pub fn add_word(&mut self, word: impl IntoWord) -> Result<bool, FsaError> {
        let word = word.collect_word();
        if self.n_words > 0 {
            match word.as_slice().cmp(self.prev.as_slice()) {
                std::cmp::Ordering::Less => {
                    return Err(FsaError::OutOfOrder {
                        prev: self.prev.to_vec(),
                        curr: word.to_vec(),
                    })
                }
                std::cmp::Ordering::Equal => return Ok(false),
                std::cmp::Ordering::Greater => {}
            }
        }
        let k = word
            .iter()
            .zip(self.prev.iter())
            .take_while(|(a, b)| a == b)
            .count();
        self.freeze_to(k)?;
        if word.is_empty() {
            self.stack[0].term = true;
        }
        let last = word.len().saturating_sub(1);
        for (i, &b) in word.iter().enumerate().skip(k) {
            self.stack.push(Pending {
                label: b,
                term: i == last,
                trans: SmallVec::new(),
            });
        }
        self.prev = word;
        self.n_words += 1;
        Ok(true)
    }

    /// Adds every word from a newline-delimited file. Blank lines and
    /// lines starting with `#` are skipped. Words must be sorted.
    pub fn add_words_from_file(&mut self, path: impl AsRef<Path>) -> Result<(), FsaError> {
        for_each_word_line(path.as_ref(), |w| self.add_word(w).map(|_| ()))
    }

    /// Pops and freezes stack entries until only `depth + 1` remain.
    fn freeze_to(&mut self, depth: usize) -> Result<(), FsaError> {
        while self.stack.len() > depth + 1 {
            let p = self.stack.pop().expect("stack holds at least the root");
            let id = self.freeze(&p)?;
            self.stack
                .last_mut()
                .expect("stack holds at least the root")
                .trans
                .push((p.label, id));
        }
        Ok(())
    }

    /// Hash-conses a pending state: reuses a registered equivalent or
    /// materializes a new arena state.
    fn freeze(&mut self, p: &Pending<Id>) -> Result<Id, FsaError> {
        let sig = Sig {
            term: p.term,
            trans: p.trans.clone(),
        };
        if let Some(&id) = self.register.get(&sig) {
            return Ok(id);
        }
        let id = self.arena.new_state()?;
        self.arena.set_term(id, p.term);
        for &(c, t) in &p.trans {
            self.arena.add_transition(id, c, t);
        }
        self.register.insert(sig, id);
        Ok(id)
    }

    /// Number of words inserted so far.
    pub fn num_words(&self) -> u64 {
        self.n_words
    }

    /// Freezes the remaining path and seals the automaton. The register
    /// is discarded here.
    pub fn finish(mut self) -> Result<Automaton<Id>, FsaError> {
        self.freeze_to(0)?;
        let root_pending = self.stack.pop().expect("root pending remains");
        let root = StateArena::<Id>::initial_state();
        self.arena.set_term(root, root_pending.term);
        for &(c, t) in &root_pending.trans {
            self.arena.add_transition(root, c, t);
        }
        debug!(
            states = self.arena.num_used_states(),
            words = self.n_words,
            "ordered build finished"
        );
        Ok(Automaton::from_parts(self.arena, self.n_words, 0, 0, true))
    }
}

impl<Id: StateId> Default for OrderedBuilder<Id> {
    fn default() -> Self {
        Self::new()
    }
}

// --- General variant ---

/// Minimizing builder for arbitrary insertion order, with deletion.
///
/// After every complete operation the graph is the unique minimal DAG for
/// the current word set. Shared (confluence) states on a mutation path are
/// cloned before being touched, then the affected path is re-registered
/// bottom-up: an equal signature reuses the existing state and frees the
/// new one, a distinct signature registers it.
///
/// Each operation is atomic with respect to the visible word set: capacity
/// is checked before the first mutation, so a failed insertion leaves the
/// previous word set intact.
///
/// # Examples
///
/// ```
/// use libfsa::fsa::Builder;
///
/// let mut b = Builder::<u32>::new();
/// assert!(b.add_word("dog").unwrap());
/// assert!(b.add_word("cat").unwrap());
/// assert!(!b.add_word("dog").unwrap()); // already present
/// assert!(b.remove_word("cat").unwrap());
/// let auto = b.finish();
/// assert_eq!(auto.num_words(), 1);
/// ```
pub struct Builder<Id: StateId = u32> {
    arena: StateArena<Id>,
    register: HashMap<Sig<Id>, Id>,
    /// In-degree per state slot, maintained across all mutations.
    indeg: Vec<u32>,
    n_words: u64,
}

impl<Id: StateId> Builder<Id> {
    /// Creates an empty builder.
    pub fn new() -> Self {
        Builder {
            arena: StateArena::new(),
            register: HashMap::new(),
            indeg: vec![0],
            n_words: 0,
        }
    }

    /// Re-opens a sealed automaton for further insertion or deletion.
    ///
    /// The register and in-degrees are rebuilt from the graph.
    ///
    /// # Errors
    ///
    /// [`FsaError::TypeMismatch`] if the automaton carries zpath runs
    /// (path-zipped graphs are frozen for good); [`FsaError::Cyclic`] if
    /// it is not a DAG.
    pub fn from_automaton(auto: Automaton<Id>) -> Result<Self, FsaError> {
        if auto.num_zpath_states() > 0 {
            return Err(FsaError::TypeMismatch {
                expected: "automaton without zpath runs",
                found: "path-zipped automaton".to_string(),
            });
        }
        let n_words = auto.num_words();
        let arena = auto.into_arena();
        let root = StateArena::<Id>::initial_state();
        let indeg = arena.compute_in_degree(root);

        // Post-order walk: register every state bottom-up, detecting
        // cycles with the usual three colors.
        let mut register = HashMap::new();
        let mut color = vec![0u8; arena.total_states()];
        let mut stack: Vec<(Id, usize)> = vec![(root, 0)];
        color[root.index()] = 1;
        while let Some(&mut (s, ref mut child)) = stack.last_mut() {
            let trans = arena.transitions(s);
            if *child < trans.len() {
                let t = trans[*child].1;
                *child += 1;
                match color[t.index()] {
                    0 => {
                        color[t.index()] = 1;
                        stack.push((t, 0));
                    }
                    1 => return Err(FsaError::Cyclic),
                    _ => {}
                }
            } else {
                color[s.index()] = 2;
                if s != root {
                    register.entry(sig_of(&arena, s)).or_insert(s);
                }
                stack.pop();
            }
        }

        Ok(Builder {
            arena,
            register,
            indeg,
            n_words,
        })
    }

    #[inline]
    fn indeg(&self, s: Id) -> u32 {
        self.indeg[s.index()]
    }

    #[inline]
    fn indeg_inc(&mut self, s: Id) {
        self.indeg[s.index()] += 1;
    }

    #[inline]
    fn indeg_dec(&mut self, s: Id) {
        debug_assert!(self.indeg[s.index()] > 0);
        self.indeg[s.index()] -= 1;
    }

    /// Allocates a state, keeping the in-degree table in sync.
    fn new_state(&mut self) -> Result<Id, FsaError> {
        let id = self.arena.new_state()?;
        if id.index() >= self.indeg.len() {
            self.indeg.resize(id.index() + 1, 0);
        }
        self.indeg[id.index()] = 0;
        Ok(id)
    }

    /// Clones `src`, counting the new edges into its children.
    fn clone_state(&mut self, src: Id) -> Result<Id, FsaError> {
        let id = self.arena.clone_state(src)?;
        if id.index() >= self.indeg.len() {
            self.indeg.resize(id.index() + 1, 0);
        }
        self.indeg[id.index()] = 0;
        let children: SmallVec<[Id; 8]> =
            self.arena.transitions(id).iter().map(|&(_, t)| t).collect();
        for t in children {
            self.indeg_inc(t);
        }
        Ok(id)
    }

    /// Drops the register entry owned by `s`, if any. Must be called
    /// before mutating a state, while its old signature is still current.
    fn unregister(&mut self, s: Id) {
        let sig = sig_of(&self.arena, s);
        if self.register.get(&sig) == Some(&s) {
            self.register.remove(&sig);
        }
    }

    /// True if the word set currently contains `word`.
    pub fn contains(&self, word: impl IntoWord) -> bool {
        let word = word.collect_word();
        let mut s = StateArena::<Id>::initial_state();
        for &b in &word {
            match self.arena.target(s, b) {
                Some(t) => s = t,
                None => return false,
            }
        }
        self.arena.is_term(s)
    }

    /// Number of words currently in the set.
    pub fn num_words(&self) -> u64 {
        self.n_words
    }

    /// Inserts a word in any order. Returns `Ok(true)` if it was new,
    /// `Ok(false)` if already present (idempotent).
    ///
    /// # Errors
    ///
    /// [`FsaError::CapacityExceeded`] if the id range runs out. The word
    /// set is unchanged in that case.
    pub fn add_word(&mut self, word: impl IntoWord) -> Result<bool, FsaError> {
        let word = word.collect_word();
        let root = StateArena::<Id>::initial_state();

        // Phase 1: longest existing prefix.
        let mut path: SmallVec<[Id; 32]> = SmallVec::new();
        path.push(root);
        let mut n_prefix = 0;
        for &b in &word {
            match self.arena.target(path[n_prefix], b) {
                Some(t) => {
                    path.push(t);
                    n_prefix += 1;
                }
                None => break,
            }
        }
        if n_prefix == word.len() && self.arena.is_term(path[n_prefix]) {
            return Ok(false);
        }

        // Phase 2: clone confluence states so the path is exclusively
        // owned. Capacity is reserved up front to keep the insertion
        // atomic.
        let first_conf = (1..=n_prefix).find(|&j| self.indeg(path[j]) > 1);
        let clones = first_conf.map_or(0, |j| n_prefix - j + 1);
        self.arena
            .ensure_capacity(clones + (word.len() - n_prefix))?;
        if let Some(conf) = first_conf {
            for j in conf..=n_prefix {
                let clone = self.clone_state(path[j])?;
                self.indeg_dec(path[j]);
                self.indeg[clone.index()] = 1;
                self.unregister(path[j - 1]);
                self.arena.set_transition(path[j - 1], word[j - 1], clone);
                path[j] = clone;
            }
        }

        // Phase 3: attach the new suffix.
        let tail = path[n_prefix];
        self.unregister(tail);
        if n_prefix == word.len() {
            self.arena.set_term(tail, true);
        } else {
            let mut cur = tail;
            for &b in &word[n_prefix..] {
                let ns = self.new_state()?;
                self.indeg[ns.index()] = 1;
                self.arena.add_transition(cur, b, ns);
                path.push(ns);
                cur = ns;
            }
            self.arena.set_term(cur, true);
        }

        // Phase 4: re-minimize the whole path bottom-up.
        self.replace_or_register(&mut path, &word);
        self.n_words += 1;
        Ok(true)
    }

    /// Removes a word. Returns `Ok(true)` if it was present. States that
    /// become unreachable are reclaimed through the free-list.
    pub fn remove_word(&mut self, word: impl IntoWord) -> Result<bool, FsaError> {
        let word = word.collect_word();
        let root = StateArena::<Id>::initial_state();

        let mut path: SmallVec<[Id; 32]> = SmallVec::new();
        path.push(root);
        for &b in &word {
            match self.arena.target(*path.last().unwrap(), b) {
                Some(t) => path.push(t),
                None => return Ok(false),
            }
        }
        if !self.arena.is_term(path[word.len()]) {
            return Ok(false);
        }

        // Clone shared states so the mutation stays private to this word.
        let first_conf = (1..=word.len()).find(|&j| self.indeg(path[j]) > 1);
        if let Some(conf) = first_conf {
            self.arena.ensure_capacity(word.len() - conf + 1)?;
            for j in conf..=word.len() {
                let clone = self.clone_state(path[j])?;
                self.indeg_dec(path[j]);
                self.indeg[clone.index()] = 1;
                self.unregister(path[j - 1]);
                self.arena.set_transition(path[j - 1], word[j - 1], clone);
                path[j] = clone;
            }
        }

        let tail = path[word.len()];
        self.unregister(tail);
        self.arena.set_term(tail, false);

        // Prune the now-dead suffix chain.
        while path.len() > 1 {
            let last = *path.last().unwrap();
            if self.arena.is_term(last) || !self.arena.transitions(last).is_empty() {
                break;
            }
            let parent = path[path.len() - 2];
            self.unregister(parent);
            self.arena.remove_transition(parent, word[path.len() - 2]);
            self.indeg_dec(last);
            self.arena.free_state(last);
            path.pop();
        }

        self.replace_or_register(&mut path, &word);
        self.n_words -= 1;
        Ok(true)
    }

    /// Removes every word starting with `prefix` (including the prefix
    /// itself when it is a word). Returns the number of words removed.
    pub fn remove_by_prefix(&mut self, prefix: impl IntoWord) -> Result<usize, FsaError> {
        let prefix = prefix.collect_word();
        let root = StateArena::<Id>::initial_state();

        if prefix.is_empty() {
            let removed = self.n_words as usize;
            self.arena = StateArena::new();
            self.register.clear();
            self.indeg = vec![0];
            self.n_words = 0;
            return Ok(removed);
        }

        let mut path: SmallVec<[Id; 32]> = SmallVec::new();
        path.push(root);
        for &b in &prefix {
            match self.arena.target(*path.last().unwrap(), b) {
                Some(t) => path.push(t),
                None => return Ok(0),
            }
        }
        let removed = self.count_words_from(path[prefix.len()]);

        let p = prefix.len();
        // Clone shared states strictly above the detached subtree.
        let first_conf = (1..p).find(|&j| self.indeg(path[j]) > 1);
        if let Some(conf) = first_conf {
            self.arena.ensure_capacity(p - conf)?;
            for j in conf..p {
                let clone = self.clone_state(path[j])?;
                self.indeg_dec(path[j]);
                self.indeg[clone.index()] = 1;
                self.unregister(path[j - 1]);
                self.arena.set_transition(path[j - 1], prefix[j - 1], clone);
                path[j] = clone;
            }
        }

        let doomed = path[p];
        self.unregister(path[p - 1]);
        self.arena.remove_transition(path[p - 1], prefix[p - 1]);
        self.indeg_dec(doomed);
        self.cascade_free(doomed);
        path.pop();

        // Prune ancestors left empty by the detachment.
        while path.len() > 1 {
            let last = *path.last().unwrap();
            if self.arena.is_term(last) || !self.arena.transitions(last).is_empty() {
                break;
            }
            let parent = path[path.len() - 2];
            self.unregister(parent);
            self.arena.remove_transition(parent, prefix[path.len() - 2]);
            self.indeg_dec(last);
            self.arena.free_state(last);
            path.pop();
        }

        self.replace_or_register(&mut path, &prefix);
        self.n_words -= removed;
        Ok(removed as usize)
    }

    /// Frees `s` and, transitively, every child whose in-degree drops
    /// to zero.
    fn cascade_free(&mut self, s: Id) {
        if self.indeg(s) > 0 {
            return;
        }
        let mut dead = vec![s];
        while let Some(d) = dead.pop() {
            self.unregister(d);
            let children: SmallVec<[Id; 8]> =
                self.arena.transitions(d).iter().map(|&(_, t)| t).collect();
            self.arena.free_state(d);
            for t in children {
                self.indeg_dec(t);
                if self.indeg(t) == 0 {
                    dead.push(t);
                }
            }
        }
    }

    /// Bottom-up pass over a mutation path: each state is either merged
    /// into a registered equivalent (freeing it) or registered itself.
    /// `labels[j]` is the edge label from `path[j]` to `path[j + 1]`.
    fn replace_or_register(&mut self, path: &mut [Id], labels: &[u8]) {
        for j in (1..path.len()).rev() {
            let s = path[j];
            let sig = sig_of(&self.arena, s);
            match self.register.get(&sig) {
                Some(&existing) if existing != s => {
                    let parent = path[j - 1];
                    self.unregister(parent);
                    self.arena.set_transition(parent, labels[j - 1], existing);
                    self.indeg_inc(existing);
                    self.indeg_dec(s);
                    debug_assert_eq!(self.indeg(s), 0);
                    let children: SmallVec<[Id; 8]> =
                        self.arena.transitions(s).iter().map(|&(_, t)| t).collect();
                    self.arena.free_state(s);
                    for t in children {
                        self.indeg_dec(t);
                    }
                    path[j] = existing;
                }
                Some(_) => {}
                None => {
                    self.register.insert(sig, s);
                }
            }
        }
    }

    /// Counts accepting paths from `s` with a memoized post-order walk.
    fn count_words_from(&self, s: Id) -> u64 {
        let mut memo: HashMap<Id, u64> = HashMap::new();
        let mut stack: Vec<(Id, usize, u64)> = vec![(s, 0, 0)];
        while let Some(&mut (cur, ref mut child, ref mut acc)) = stack.last_mut() {
            let trans = self.arena.transitions(cur);
            if *child < trans.len() {
                let t = trans[*child].1;
                *child += 1;
                if let Some(&c) = memo.get(&t) {
                    *acc += c;
                } else {
                    stack.push((t, 0, 0));
                }
            } else {
                let total = *acc + self.arena.is_term(cur) as u64;
                memo.insert(cur, total);
                stack.pop();
                if let Some(&mut (_, _, ref mut parent_acc)) = stack.last_mut() {
                    *parent_acc += total;
                }
            }
        }
        memo[&s]
    }

    /// Adds every word from a newline-delimited file. Blank lines and
    /// lines starting with `#` are skipped; any order is accepted.
    pub fn add_words_from_file(&mut self, path: impl AsRef<Path>) -> Result<(), FsaError> {
        for_each_word_line(path.as_ref(), |w| self.add_word(w).map(|_| ()))
    }

    /// Seals the automaton. The register and in-degrees are discarded.
    pub fn finish(self) -> Automaton<Id> {
        debug!(
            states = self.arena.num_used_states(),
            words = self.n_words,
            "general build finished"
        );
        Automaton::from_parts(self.arena, self.n_words, 0, 0, true)
    }
}

impl<Id: StateId> Default for Builder<Id> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn words_of(auto: &Automaton<u32>) -> Vec<Vec<u8>> {
        let mut out = Vec::new();
        auto.for_each_word(|w| out.push(w.to_vec()));
        out
    }

    #[test]
    fn ordered_accepts_exactly_the_input() {
        let mut b = OrderedBuilder::<u32>::new();
        for w in ["ALFA", "BRAVO", "CHARLIE", "DELTA"] {
            assert!(b.add_word(w).unwrap());
        }
        let auto = b.finish().unwrap();
        assert_eq!(auto.num_words(), 4);
        for w in ["ALFA", "BRAVO", "CHARLIE", "DELTA"] {
            assert!(auto.contains(w));
        }
        assert!(!auto.contains("ALF"));
        assert!(!auto.contains("ECHO"));
    }

    #[test]
    fn ordered_rejects_unsorted_input() {
        let mut b = OrderedBuilder::<u32>::new();
        b.add_word("GOLF").unwrap();
        let err = b.add_word("FOXTROT").unwrap_err();
        match err {
            FsaError::OutOfOrder { prev, curr } => {
                assert_eq!(prev, b"GOLF");
                assert_eq!(curr, b"FOXTROT");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn ordered_duplicate_is_idempotent() {
        let mut b = OrderedBuilder::<u32>::new();
        assert!(b.add_word("CHARLIE").unwrap());
        assert!(!b.add_word("CHARLIE").unwrap());
        let auto = b.finish().unwrap();
        assert_eq!(auto.num_words(), 1);
    }

    #[test]
    fn ordered_shares_suffixes() {
        // A single word needs len + 1 states; the shared suffix must not
        // add more than the diverging prefixes do.
        let mut b1 = OrderedBuilder::<u32>::new();
        b1.add_word("ABCDEF").unwrap();
        let one = b1.finish().unwrap();
        assert_eq!(one.num_used_states(), 7);

        let mut b2 = OrderedBuilder::<u32>::new();
        for w in ["ABCDEF", "ABDEF", "ABEF", "AF"] {
            b2.add_word(w).unwrap();
        }
        let shared = b2.finish().unwrap();
        assert_eq!(shared.num_used_states(), one.num_used_states());
    }

    #[test]
    fn general_accepts_any_order() {
        use itertools::Itertools;
        const WORDS: [&str; 5] = ["cart", "cat", "car", "dog", "do"];
        for perm in WORDS.iter().permutations(WORDS.len()) {
            let mut b = Builder::<u32>::new();
            for w in &perm {
                assert!(b.add_word(**w).unwrap());
            }
            let auto = b.finish();
            assert_eq!(auto.num_words(), 5);
            for w in WORDS {
                assert!(auto.contains(w), "{w} missing after order {perm:?}");
            }
            assert!(!auto.contains("ca"));
            assert!(!auto.contains("d"));
        }
    }

    #[test]
    fn general_matches_ordered_state_count() {
        use itertools::Itertools;
        const WORDS: [&str; 6] = ["bake", "cake", "fake", "lake", "make", "sake"];
        let mut ordered = OrderedBuilder::<u32>::new();
        for w in WORDS {
            ordered.add_word(w).unwrap();
        }
        let reference = ordered.finish().unwrap().num_used_states();

        for perm in WORDS.iter().permutations(WORDS.len()).take(24) {
            let mut b = Builder::<u32>::new();
            for w in perm {
                b.add_word(*w).unwrap();
            }
            assert_eq!(b.finish().num_used_states(), reference);
        }
    }

    #[test]
    fn general_insert_is_idempotent() {
        let mut b = Builder::<u32>::new();
        assert!(b.add_word("cart").unwrap());
        let states = b.arena.num_used_states();
        assert!(!b.add_word("cart").unwrap());
        assert_eq!(b.arena.num_used_states(), states);
        assert_eq!(b.num_words(), 1);
    }

    #[test]
    fn prefix_and_extension_insertions() {
        let mut b = Builder::<u32>::new();
        b.add_word("cart").unwrap();
        assert!(b.add_word("car").unwrap());
        assert!(b.contains("car"));
        assert!(b.contains("cart"));

        let mut b = Builder::<u32>::new();
        b.add_word("car").unwrap();
        assert!(b.add_word("cart").unwrap());
        assert!(b.contains("car"));
        assert!(b.contains("cart"));
    }

    #[test]
    fn remove_word_restores_minimal_set() {
        let mut b = Builder::<u32>::new();
        for w in ["cat", "car", "cart", "dog"] {
            b.add_word(w).unwrap();
        }
        assert!(b.remove_word("cart").unwrap());
        assert!(!b.remove_word("cart").unwrap());
        assert_eq!(b.num_words(), 3);
        assert!(!b.contains("cart"));
        for w in ["cat", "car", "dog"] {
            assert!(b.contains(w));
        }

        // Removing down to the same set as a fresh build gives the same
        // state count (the graph stays minimal).
        let mut fresh = Builder::<u32>::new();
        for w in ["cat", "car", "dog"] {
            fresh.add_word(w).unwrap();
        }
        assert_eq!(
            b.finish().num_used_states(),
            fresh.finish().num_used_states()
        );
    }

    #[test]
    fn remove_word_on_shared_suffix() {
        let mut b = Builder::<u32>::new();
        for w in ["bake", "cake", "lake"] {
            b.add_word(w).unwrap();
        }
        assert!(b.remove_word("cake").unwrap());
        assert!(b.contains("bake"));
        assert!(b.contains("lake"));
        assert!(!b.contains("cake"));
        assert_eq!(b.num_words(), 2);
    }

    #[test]
    fn remove_last_word_empties_the_graph() {
        let mut b = Builder::<u32>::new();
        b.add_word("solo").unwrap();
        assert!(b.remove_word("solo").unwrap());
        assert_eq!(b.num_words(), 0);
        assert!(!b.contains("solo"));
        assert_eq!(b.arena.num_used_states(), 1); // only the root remains
    }

    #[test]
    fn remove_by_prefix_counts_words() {
        let mut b = Builder::<u32>::new();
        for w in ["car", "cart", "carts", "cat", "dog"] {
            b.add_word(w).unwrap();
        }
        assert_eq!(b.remove_by_prefix("car").unwrap(), 3);
        assert_eq!(b.num_words(), 2);
        assert!(b.contains("cat"));
        assert!(b.contains("dog"));
        assert!(!b.contains("car"));
        assert!(!b.contains("carts"));
        assert_eq!(b.remove_by_prefix("zebra").unwrap(), 0);
    }

    #[test]
    fn remove_by_empty_prefix_clears_everything() {
        let mut b = Builder::<u32>::new();
        for w in ["a", "b", "c"] {
            b.add_word(w).unwrap();
        }
        assert_eq!(b.remove_by_prefix("").unwrap(), 3);
        assert_eq!(b.num_words(), 0);
        assert!(!b.contains("a"));
    }

    #[test]
    fn empty_word_is_a_word() {
        let mut b = Builder::<u32>::new();
        assert!(b.add_word("").unwrap());
        assert!(b.contains(""));
        b.add_word("a").unwrap();
        assert_eq!(b.num_words(), 2);
        assert!(b.remove_word("").unwrap());
        assert!(!b.contains(""));
        assert!(b.contains("a"));
    }

    #[test]
    fn reopen_sealed_automaton() {
        let mut b = Builder::<u32>::new();
        for w in ["cat", "car", "cart", "dog"] {
            b.add_word(w).unwrap();
        }
        let auto = b.finish();

        let mut b = Builder::from_automaton(auto).unwrap();
        assert_eq!(b.num_words(), 4);
        assert!(b.remove_word("cart").unwrap());
        assert!(b.add_word("dot").unwrap());
        let auto = b.finish();
        assert_eq!(auto.num_words(), 4);
        assert!(auto.contains("dot"));
        assert!(!auto.contains("cart"));
    }

    #[test]
    fn ordered_and_general_accept_same_language() {
        let words = ["", "a", "ab", "abc", "b", "ba", "bab"];
        let mut ob = OrderedBuilder::<u32>::new();
        for w in words {
            ob.add_word(w).unwrap();
        }
        let oa = ob.finish().unwrap();

        let mut gb = Builder::<u32>::new();
        for w in words.iter().rev() {
            gb.add_word(*w).unwrap();
        }
        let ga = gb.finish();

        assert_eq!(oa.num_words(), ga.num_words());
        assert_eq!(words_of(&oa), words_of(&ga));
        assert_eq!(oa.num_used_states(), ga.num_used_states());
    }
}
