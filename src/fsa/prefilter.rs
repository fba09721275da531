use hashbrown::HashSet;
use tracing::debug;

use super::ac::{AcBuilder, PatternId};
use super::double_array::DoubleArrayAc;
use super::WalkOrder;

/// Boundary to an external, exact matching engine.
///
/// The prefilter only gates work: it hands over candidate patterns whose
/// literal atoms appeared in the text, and the confirmer decides. A
/// confirmer that always returns `true` degrades the prefilter to the
/// atom scan; it can never introduce false negatives.
pub trait Confirm {
    /// True if `pattern` really matches somewhere in `text`.
    fn confirm(&self, text: &[u8], pattern: PatternId) -> bool;
}

impl<F: Fn(&[u8], PatternId) -> bool> Confirm for F {
    fn confirm(&self, text: &[u8], pattern: PatternId) -> bool {
        self(text, pattern)
    }
}

/// With the `regex` feature, a slice of compiled regexes (indexed by
/// pattern id) acts as the confirmer directly.
#[cfg(feature = "regex")]
impl Confirm for [regex::bytes::Regex] {
    fn confirm(&self, text: &[u8], pattern: PatternId) -> bool {
        self.get(pattern as usize)
            .is_some_and(|re| re.is_match(text))
    }
}

/// Collects literal atoms for a [`LiteralPrefilter`].
///
/// Each atom belongs to one pattern of a larger external pattern set
/// (typically a required literal extracted from a regex). A pattern may
/// contribute any number of atoms; a pattern with no atoms is never
/// surfaced by the prefilter and must be handled by the caller.
pub struct PrefilterBuilder {
    ac: AcBuilder,
    /// Owner pattern per atom id.
    owners: Vec<PatternId>,
}

impl PrefilterBuilder {
    /// Creates an empty builder.
    pub fn new() -> Self {
        PrefilterBuilder {
            ac: AcBuilder::new(),
            owners: Vec::new(),
        }
    }

    /// Registers a literal atom owned by `pattern`.
    ///
    /// # Panics
    ///
    /// Panics if the atom is empty.
    pub fn add_atom(&mut self, pattern: PatternId, atom: impl AsRef<[u8]>) {
        let (atom_id, fresh) = self.ac.add_pattern(atom);
        if fresh {
            debug_assert_eq!(atom_id as usize, self.owners.len());
            self.owners.push(pattern);
        }
    }

    /// Compiles the atom set into a dense scanner.
    pub fn build(self, order: WalkOrder) -> LiteralPrefilter {
        let scanner = DoubleArrayAc::compact(&self.ac.compile(), order);
        debug!(atoms = self.owners.len(), "prefilter built");
        LiteralPrefilter {
            scanner,
            owners: self.owners,
        }
    }
}

impl Default for PrefilterBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Two-stage matcher: a dense atom scan gates an external exact engine.
///
/// # Examples
///
/// ```
/// use libfsa::fsa::{LiteralPrefilter, PrefilterBuilder, WalkOrder};
///
/// // Pattern 0 ~ "foo[0-9]+", pattern 1 ~ "barbaz?" — the atoms are the
/// // required literals of each.
/// let mut b = PrefilterBuilder::new();
/// b.add_atom(0, "foo");
/// b.add_atom(1, "barba");
/// let pf = b.build(WalkOrder::BreadthFirst);
///
/// // Only candidates whose atoms occur reach the (expensive) confirmer.
/// let confirmed = pf.confirmed(b"foo123", &|text: &[u8], pat| {
///     assert_eq!(pat, 0);
///     text.windows(4).any(|w| w.starts_with(b"foo") && w[3].is_ascii_digit())
/// });
/// assert_eq!(confirmed, vec![0]);
/// ```
pub struct LiteralPrefilter {
    scanner: DoubleArrayAc,
    owners: Vec<PatternId>,
}

impl LiteralPrefilter {
    /// Number of registered atoms.
    pub fn num_atoms(&self) -> usize {
        self.owners.len()
    }

    /// The dense atom scanner.
    pub fn scanner(&self) -> &DoubleArrayAc {
        &self.scanner
    }

    /// Patterns whose atoms occur in `text`, sorted and deduplicated.
    /// A superset of the truly matching patterns.
    pub fn candidates(&self, text: &[u8]) -> Vec<PatternId> {
        let mut seen: HashSet<PatternId> = HashSet::new();
        self.scanner.scan(text, |_, atoms| {
            for &a in atoms {
                seen.insert(self.owners[a as usize]);
            }
        });
        let mut out: Vec<PatternId> = seen.into_iter().collect();
        out.sort_unstable();
        out
    }

    /// Patterns confirmed by the external engine, sorted. Each candidate
    /// is confirmed at most once however many of its atoms hit.
    pub fn confirmed<C: Confirm + ?Sized>(&self, text: &[u8], confirmer: &C) -> Vec<PatternId> {
        let candidates = self.candidates(text);
        candidates
            .into_iter()
            .filter(|&p| confirmer.confirm(text, p))
            .collect()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn sample() -> LiteralPrefilter {
        let mut b = PrefilterBuilder::new();
        b.add_atom(0, "err");
        b.add_atom(0, "fail");
        b.add_atom(1, "warn");
        b.add_atom(2, "panic");
        b.build(WalkOrder::BreadthFirst)
    }

    #[test]
    fn candidates_are_deduped_and_sorted() {
        let pf = sample();
        // Both atoms of pattern 0 hit; pattern 1 hits once.
        let c = pf.candidates(b"error: fail after warn");
        assert_eq!(c, vec![0, 1]);
        assert_eq!(pf.candidates(b"all quiet"), Vec::<PatternId>::new());
    }

    #[test]
    fn confirmer_runs_once_per_candidate() {
        let pf = sample();
        let calls = std::cell::RefCell::new(Vec::new());
        let confirmed = pf.confirmed(b"err err err warn", &|_: &[u8], p: PatternId| {
            calls.borrow_mut().push(p);
            p == 0
        });
        assert_eq!(confirmed, vec![0]);
        assert_eq!(*calls.borrow(), vec![0, 1]);
    }

    #[test]
    fn missed_filter_only_costs_work() {
        // A confirmer that rejects everything still never panics or
        // reports: the prefilter is not correctness-critical.
        let pf = sample();
        let confirmed = pf.confirmed(b"panic: fail", &|_: &[u8], _| false);
        assert!(confirmed.is_empty());
    }

    #[cfg(feature = "regex")]
    #[test]
    fn regex_confirmer() {
        let regexes = vec![
            regex::bytes::Regex::new(r"foo[0-9]+").unwrap(),
            regex::bytes::Regex::new(r"barbaz?").unwrap(),
        ];
        let mut b = PrefilterBuilder::new();
        b.add_atom(0, "foo");
        b.add_atom(1, "barba");
        let pf = b.build(WalkOrder::BreadthFirst);
        assert_eq!(pf.confirmed(b"foo123 and barba", regexes.as_slice()), vec![0, 1]);
        assert_eq!(pf.confirmed(b"foo bar", regexes.as_slice()), Vec::<PatternId>::new());
    }
}
