use tracing::debug;

use super::automaton::Automaton;
use super::builder::IntoWord;
use super::state_id::StateId;
use super::FsaError;

/// An automaton compiled into an ordered dictionary.
///
/// Compilation computes, for every state, the number of accepting paths in
/// its subtree (the suffix count). With counts in hand, [`index`](Dawg::index)
/// and [`nth_word`](Dawg::nth_word) navigate word ↔ rank in O(depth) without
/// scanning the word set; ranks are lexicographic ordinals.
///
/// # Examples
///
/// ```
/// use libfsa::fsa::{Builder, Dawg};
///
/// let mut b = Builder::<u32>::new();
/// for word in ["cat", "car", "cart", "dog"] {
///     b.add_word(word).unwrap();
/// }
/// let dawg = Dawg::compile(b.finish()).unwrap();
/// assert_eq!(dawg.num_words(), 4);
/// assert_eq!(dawg.nth_word(0).unwrap(), b"car");
/// assert_eq!(dawg.index("cat"), Some(2));
/// assert_eq!(dawg.index("cab"), None);
/// ```
#[derive(Clone, Debug)]
pub struct Dawg<Id: StateId = u32> {
    auto: Automaton<Id>,
    /// Suffix count per state slot; free slots hold 0.
    counts: Vec<u64>,
}

impl<Id: StateId> Dawg<Id> {
    /// Compiles suffix counts over a sealed automaton (zipped or not).
    ///
    /// # Errors
    ///
    /// [`FsaError::Cyclic`] if the graph is not a DAG.
    pub fn compile(auto: Automaton<Id>) -> Result<Self, FsaError> {
        let arena = auto.arena();
        let root = auto.root();
        let mut counts = vec![0u64; arena.total_states()];
        let mut color = vec![0u8; arena.total_states()];

        // Post-order with the usual three colors; a grey child is a cycle.
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
                let mut n = arena.is_term(s) as u64;
                for &(_, t) in trans {
                    n += counts[t.index()];
                }
                counts[s.index()] = n;
                color[s.index()] = 2;
                stack.pop();
            }
        }

        debug_assert_eq!(counts[root.index()], auto.num_words());
        debug!(words = counts[root.index()], "dawg compiled");
        Ok(Dawg { auto, counts })
    }

    /// The underlying sealed automaton.
    pub fn automaton(&self) -> &Automaton<Id> {
        &self.auto
    }

    /// Discards the rank layer, returning the automaton.
    pub fn into_automaton(self) -> Automaton<Id> {
        self.auto
    }

    pub(crate) fn from_parts(auto: Automaton<Id>, counts: Vec<u64>) -> Self {
        Dawg { auto, counts }
    }

    pub(crate) fn counts(&self) -> &[u64] {
        &self.counts
    }

    /// Number of words in the dictionary.
    #[inline]
    pub fn num_words(&self) -> u64 {
        self.counts[self.auto.root().index()]
    }

    /// Returns the lexicographic rank of `word`, or `None` if the word is
    /// not in the dictionary. Absence is a normal result, not an error.
    pub fn index(&self, word: impl IntoWord) -> Option<u64> {
        let word = word.collect_word();
        let arena = self.auto.arena();
        let mut s = self.auto.root();
        let mut idx = 0u64;
        let mut i = 0;
        loop {
            let zp = arena.zpath(s);
            if !zp.is_empty() {
                if word.len() - i < zp.len() || &word[i..i + zp.len()] != zp {
                    return None;
                }
                i += zp.len();
            }
            if i == word.len() {
                return arena.is_term(s).then_some(idx);
            }
            let b = word[i];
            let mut next = None;
            for &(c, t) in arena.transitions(s) {
                if c < b {
                    idx += self.counts[t.index()];
                } else {
                    if c == b {
                        next = Some(t);
                    }
                    break;
                }
            }
            let t = next?;
            if arena.is_term(s) {
                idx += 1;
            }
            s = t;
            i += 1;
        }
    }

    /// Returns the word with lexicographic rank `nth`, or `None` when
    /// `nth >= num_words()`.
    ///
    /// `index(nth_word(r)) == r` for every valid rank, and `nth_word` is
    /// strictly increasing in `r` under byte-wise lexicographic order.
    pub fn nth_word(&self, nth: u64) -> Option<Vec<u8>> {
        if nth >= self.num_words() {
            return None;
        }
        let arena = self.auto.arena();
        let mut s = self.auto.root();
        let mut r = nth;
        let mut word = Vec::new();
        loop {
            word.extend_from_slice(arena.zpath(s));
            if arena.is_term(s) {
                if r == 0 {
                    return Some(word);
                }
                r -= 1;
            }
            let mut advanced = false;
            for &(c, t) in arena.transitions(s) {
                let cnt = self.counts[t.index()];
                if r < cnt {
                    word.push(c);
                    s = t;
                    advanced = true;
                    break;
                }
                r -= cnt;
            }
            debug_assert!(advanced, "rank ran past the subtree counts");
            if !advanced {
                return None;
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::fsa::builder::{Builder, OrderedBuilder};
    use crate::fsa::zip::path_zip;
    use crate::fsa::WalkOrder;

    fn sample() -> Dawg<u32> {
        let mut b = Builder::<u32>::new();
        for w in ["cat", "car", "cart", "dog"] {
            b.add_word(w).unwrap();
        }
        Dawg::compile(b.finish()).unwrap()
    }

    #[test]
    fn ranks_follow_lexicographic_order() {
        let dawg = sample();
        assert_eq!(dawg.num_words(), 4);
        assert_eq!(dawg.nth_word(0).unwrap(), b"car");
        assert_eq!(dawg.nth_word(1).unwrap(), b"cart");
        assert_eq!(dawg.nth_word(2).unwrap(), b"cat");
        assert_eq!(dawg.nth_word(3).unwrap(), b"dog");
        assert_eq!(dawg.nth_word(4), None);
    }

    #[test]
    fn index_inverts_nth_word() {
        let dawg = sample();
        for r in 0..dawg.num_words() {
            let w = dawg.nth_word(r).unwrap();
            assert_eq!(dawg.index(w), Some(r));
        }
        assert_eq!(dawg.index("cab"), None);
        assert_eq!(dawg.index("ca"), None);
        assert_eq!(dawg.index(""), None);
    }

    #[test]
    fn nth_word_is_strictly_increasing() {
        let mut b = OrderedBuilder::<u32>::new();
        let words = ["a", "ab", "abc", "abd", "b", "ba", "bc", "zzz"];
        for w in words {
            b.add_word(w).unwrap();
        }
        let dawg = Dawg::compile(b.finish().unwrap()).unwrap();
        let mut prev: Option<Vec<u8>> = None;
        for r in 0..dawg.num_words() {
            let w = dawg.nth_word(r).unwrap();
            if let Some(p) = &prev {
                assert!(p < &w);
            }
            prev = Some(w);
        }
    }

    #[test]
    fn ranks_survive_path_zip() {
        let mut b = Builder::<u32>::new();
        let words = ["carthorse", "cartoon", "cartoons", "dogma", "dogmatic"];
        for w in words {
            b.add_word(w).unwrap();
        }
        let plain = Dawg::compile(b.finish()).unwrap();
        let zipped = Dawg::compile(
            path_zip(plain.automaton(), WalkOrder::BreadthFirst, 2).unwrap(),
        )
        .unwrap();
        assert!(zipped.automaton().num_zpath_states() > 0);
        assert_eq!(plain.num_words(), zipped.num_words());
        for r in 0..plain.num_words() {
            assert_eq!(plain.nth_word(r), zipped.nth_word(r));
        }
        for w in words {
            assert_eq!(plain.index(w), zipped.index(w));
        }
        assert_eq!(zipped.index("cart"), None);
    }

    #[test]
    fn empty_word_ranks_first() {
        let mut b = Builder::<u32>::new();
        for w in ["", "a", "b"] {
            b.add_word(w).unwrap();
        }
        let dawg = Dawg::compile(b.finish()).unwrap();
        assert_eq!(dawg.nth_word(0).unwrap(), b"");
        assert_eq!(dawg.index(""), Some(0));
        assert_eq!(dawg.index("a"), Some(1));
    }

    #[test]
    fn deletion_then_compile_shifts_ranks() {
        let mut b = Builder::<u32>::new();
        for w in ["cat", "car", "cart", "dog"] {
            b.add_word(w).unwrap();
        }
        b.remove_word("cart").unwrap();
        let dawg = Dawg::compile(b.finish()).unwrap();
        assert_eq!(dawg.num_words(), 3);
        assert_eq!(dawg.index("cart"), None);
        assert_eq!(dawg.nth_word(0).unwrap(), b"car");
        assert_eq!(dawg.nth_word(1).unwrap(), b"cat");
        assert_eq!(dawg.nth_word(2).unwrap(), b"dog");
    }
}
