use tracing::debug;

use super::arena::StateArena;
use super::builder::IntoWord;
use super::state_id::StateId;

/// A sealed, read-only automaton.
///
/// Produced by the builders in [`builder`](super::builder) or by
/// [`path_zip`](super::zip::path_zip), and reloaded by
/// [`persist`](super::persist). Once sealed the graph never changes, so a
/// shared reference can be queried from any number of threads without
/// locking; further insertions or deletions require going back through
/// [`Builder::from_automaton`](super::builder::Builder::from_automaton).
///
/// # Examples
///
/// ```
/// use libfsa::fsa::Builder;
///
/// let mut b = Builder::<u32>::new();
/// for word in ["cat", "car", "dog"] {
///     b.add_word(word).unwrap();
/// }
/// let auto = b.finish();
/// assert!(auto.contains("car"));
/// assert!(!auto.contains("ca"));
/// assert_eq!(auto.num_words(), 3);
/// ```
#[derive(Clone, Debug)]
pub struct Automaton<Id: StateId = u32> {
    arena: StateArena<Id>,
    n_words: u64,
    zpath_states: u64,
    total_zpath_len: u64,
    is_dag: bool,
}

impl<Id: StateId> Automaton<Id> {
    pub(crate) fn from_parts(
        arena: StateArena<Id>,
        n_words: u64,
        zpath_states: u64,
        total_zpath_len: u64,
        is_dag: bool,
    ) -> Self {
        debug!(
            states = arena.num_used_states(),
            n_words, zpath_states, "sealed automaton"
        );
        Automaton {
            arena,
            n_words,
            zpath_states,
            total_zpath_len,
            is_dag,
        }
    }

    /// Returns the id of the initial state.
    #[inline]
    pub fn root(&self) -> Id {
        StateArena::<Id>::initial_state()
    }

    pub(crate) fn arena(&self) -> &StateArena<Id> {
        &self.arena
    }

    pub(crate) fn into_arena(self) -> StateArena<Id> {
        self.arena
    }

    /// Number of words the automaton accepts.
    #[inline]
    pub fn num_words(&self) -> u64 {
        self.n_words
    }

    /// Total state slots, live and free.
    #[inline]
    pub fn total_states(&self) -> usize {
        self.arena.total_states()
    }

    /// Number of live states.
    #[inline]
    pub fn num_used_states(&self) -> usize {
        self.arena.num_used_states()
    }

    /// Number of states carrying an inline zpath run.
    #[inline]
    pub fn num_zpath_states(&self) -> u64 {
        self.zpath_states
    }

    /// Total bytes held in zpath runs.
    #[inline]
    pub fn total_zpath_len(&self) -> u64 {
        self.total_zpath_len
    }

    /// True if the graph is acyclic.
    #[inline]
    pub fn is_dag(&self) -> bool {
        self.is_dag
    }

    /// Approximate heap footprint in bytes.
    pub fn mem_size(&self) -> usize {
        self.arena.mem_size()
    }

    /// True if the automaton accepts `word`.
    ///
    /// A state's zpath run is consumed on arrival, before its terminal
    /// flag applies; a word ending inside a run is not accepted.
    pub fn contains(&self, word: impl IntoWord) -> bool {
        let word = word.collect_word();
        let mut s = self.root();
        let mut i = 0;
        loop {
            let zp = self.arena.zpath(s);
            if !zp.is_empty() {
                if word.len() - i < zp.len() || &word[i..i + zp.len()] != zp {
                    return false;
                }
                i += zp.len();
            }
            if i == word.len() {
                return self.arena.is_term(s);
            }
            match self.arena.target(s, word[i]) {
                Some(t) => s = t,
                None => return false,
            }
            i += 1;
        }
    }

    /// Calls `f` for every accepted word, in traversal (lexicographic)
    /// order. Each word is emitted exactly once.
    ///
    /// ```
    /// use libfsa::fsa::Builder;
    ///
    /// let mut b = Builder::<u32>::new();
    /// for word in ["dog", "cat", "car"] {
    ///     b.add_word(word).unwrap();
    /// }
    /// let mut words = Vec::new();
    /// b.finish().for_each_word(|w| words.push(w.to_vec()));
    /// assert_eq!(words, vec![b"car".to_vec(), b"cat".to_vec(), b"dog".to_vec()]);
    /// ```
    pub fn for_each_word(&self, mut f: impl FnMut(&[u8])) {
        let mut buf: Vec<u8> = Vec::new();
        // (state, next child index, buffer length after this state's zpath)
        let mut stack: Vec<(Id, usize, usize)> = Vec::new();

        let root = self.root();
        buf.extend_from_slice(self.arena.zpath(root));
        if self.arena.is_term(root) {
            f(&buf);
        }
        stack.push((root, 0, buf.len()));

        while let Some(&mut (s, ref mut child, base)) = stack.last_mut() {
            let trans = self.arena.transitions(s);
            if *child >= trans.len() {
                stack.pop();
                continue;
            }
            let (c, t) = trans[*child];
            *child += 1;
            buf.truncate(base);
            buf.push(c);
            buf.extend_from_slice(self.arena.zpath(t));
            if self.arena.is_term(t) {
                f(&buf);
            }
            stack.push((t, 0, buf.len()));
        }
    }

    /// Histogram of out-degrees over live states: entry `k` counts states
    /// with exactly `k` outgoing transitions.
    pub fn out_degree_histogram(&self) -> Vec<u64> {
        let mut hist = vec![0u64; 257];
        for i in 0..self.arena.total_states() {
            let id = Id::from_usize(i);
            if !self.arena.is_free(id) {
                hist[self.arena.transitions(id).len()] += 1;
            }
        }
        while hist.len() > 1 && *hist.last().unwrap() == 0 {
            hist.pop();
        }
        hist
    }

    /// Histogram of zpath run lengths over live states: entry `k` counts
    /// states whose zpath holds exactly `k` bytes.
    pub fn zpath_len_histogram(&self) -> Vec<u64> {
        let mut hist = vec![0u64; 255];
        for i in 0..self.arena.total_states() {
            let id = Id::from_usize(i);
            if !self.arena.is_free(id) {
                hist[self.arena.zpath(id).len()] += 1;
            }
        }
        while hist.len() > 1 && *hist.last().unwrap() == 0 {
            hist.pop();
        }
        hist
    }
}
