use std::collections::VecDeque;

use smallvec::SmallVec;
use tracing::debug;

/// Identifier of a pattern inside one scanner, assigned in insertion order.
pub type PatternId = u32;

const NO_WORD: u32 = u32::MAX;
const ROOT: u32 = 0;

#[derive(Clone, Debug, Default)]
struct TrieState {
    trans: SmallVec<[(u8, u32); 4]>,
    /// Pattern ending exactly here, or `NO_WORD`.
    word: u32,
}

impl TrieState {
    #[inline]
    fn target(&self, label: u8) -> Option<u32> {
        self.trans
            .binary_search_by_key(&label, |&(c, _)| c)
            .ok()
            .map(|pos| self.trans[pos].1)
    }
}

/// Collects patterns and compiles them into an [`AhoCorasick`] scanner.
///
/// # Examples
///
/// ```
/// use libfsa::fsa::AcBuilder;
///
/// let mut b = AcBuilder::new();
/// for pat in ["he", "she", "his", "hers"] {
///     b.add_pattern(pat);
/// }
/// let ac = b.compile();
/// let mut hits = Vec::new();
/// ac.scan(b"ushers", |end, pats| {
///     for &p in pats {
///         hits.push((end, p));
///     }
/// });
/// assert_eq!(hits, vec![(4, 1), (4, 0), (6, 3)]); // she, he, hers
/// ```
pub struct AcBuilder {
    states: Vec<TrieState>,
    pattern_lens: Vec<u32>,
}

impl AcBuilder {
    /// Creates an empty builder.
    pub fn new() -> Self {
        AcBuilder {
            states: vec![TrieState::default()],
            pattern_lens: Vec::new(),
        }
    }

    /// Adds a pattern and returns its id plus whether it was new; a
    /// duplicate pattern returns the existing id with `false`.
    ///
    /// # Panics
    ///
    /// Panics if the pattern is empty.
    pub fn add_pattern(&mut self, pattern: impl AsRef<[u8]>) -> (PatternId, bool) {
        let pattern = pattern.as_ref();
        assert!(!pattern.is_empty(), "empty patterns are not allowed");
        let mut cur = ROOT;
        for &b in pattern {
            cur = match self.states[cur as usize].target(b) {
                Some(t) => t,
                None => {
                    let id = self.states.len() as u32;
                    self.states.push(TrieState::default());
                    let trans = &mut self.states[cur as usize].trans;
                    let pos = trans.partition_point(|&(c, _)| c < b);
                    trans.insert(pos, (b, id));
                    id
                }
            };
        }
        let slot = &mut self.states[cur as usize].word;
        if *slot != NO_WORD {
            return (*slot, false);
        }
        let id = self.pattern_lens.len() as PatternId;
        *slot = id;
        self.pattern_lens.push(pattern.len() as u32);
        (id, true)
    }

    /// Number of distinct patterns added so far.
    pub fn num_patterns(&self) -> usize {
        self.pattern_lens.len()
    }

    /// Computes failure links and merged output sets, sealing the scanner.
    pub fn compile(self) -> AhoCorasick {
        let n = self.states.len();
        let mut fail = vec![ROOT; n];

        // BFS order; fail links of shallower states are final before any
        // deeper state needs them.
        let mut order = Vec::with_capacity(n);
        let mut queue = VecDeque::new();
        queue.push_back(ROOT);
        while let Some(s) = queue.pop_front() {
            order.push(s);
            for &(_, t) in &self.states[s as usize].trans {
                queue.push_back(t);
            }
        }

        for &s in &order {
            let trans: SmallVec<[(u8, u32); 4]> = self.states[s as usize].trans.clone();
            for (c, t) in trans {
                let mut back = fail[s as usize];
                let f = loop {
                    if let Some(next) = self.states[back as usize].target(c) {
                        if next != t {
                            break next;
                        }
                    }
                    if back == ROOT {
                        break ROOT;
                    }
                    back = fail[back as usize];
                };
                fail[t as usize] = if s == ROOT { ROOT } else { f };
            }
        }

        // Merged output sizes: own pattern plus everything the fail chain
        // reports; in BFS order the fail target's size is already final.
        let mut cnt = vec![0u32; n];
        for &s in &order {
            let own = (self.states[s as usize].word != NO_WORD) as u32;
            cnt[s as usize] = own + if s == ROOT { 0 } else { cnt[fail[s as usize] as usize] };
        }
        let mut offsets = vec![0u32; n + 1];
        for i in 0..n {
            offsets[i + 1] = offsets[i] + cnt[i];
        }
        let mut output = vec![0u32; offsets[n] as usize];
        for &s in &order {
            let mut pos = offsets[s as usize] as usize;
            if self.states[s as usize].word != NO_WORD {
                output[pos] = self.states[s as usize].word;
                pos += 1;
            }
            if s != ROOT {
                let f = fail[s as usize] as usize;
                let (f0, f1) = (offsets[f] as usize, offsets[f + 1] as usize);
                output.copy_within(f0..f1, pos);
            }
        }

        debug!(
            states = n,
            patterns = self.pattern_lens.len(),
            outputs = output.len(),
            "aho-corasick compiled"
        );
        AhoCorasick {
            states: self.states,
            fail,
            offsets,
            output,
            pattern_lens: self.pattern_lens,
        }
    }
}

impl Default for AcBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Resumable scan position; the scanner's current state is the only cursor
/// state, so long inputs can be fed in chunks.
#[derive(Clone, Copy, Debug, Default)]
pub struct ScanCursor {
    state: u32,
    offset: usize,
}

impl ScanCursor {
    #[inline]
    pub(crate) fn parts(&self) -> (u32, usize) {
        (self.state, self.offset)
    }

    #[inline]
    pub(crate) fn set_parts(&mut self, state: u32, offset: usize) {
        self.state = state;
        self.offset = offset;
    }
}

/// A compiled multi-pattern scanner with failure links.
///
/// Sealed and read-only: one instance can serve any number of concurrent
/// scans, each with its own [`ScanCursor`].
pub struct AhoCorasick {
    states: Vec<TrieState>,
    fail: Vec<u32>,
    /// Output range of state `s` is `offsets[s]..offsets[s + 1]`.
    offsets: Vec<u32>,
    output: Vec<PatternId>,
    pattern_lens: Vec<u32>,
}

impl AhoCorasick {
    /// Number of patterns.
    pub fn num_patterns(&self) -> usize {
        self.pattern_lens.len()
    }

    /// Number of trie states.
    pub fn num_states(&self) -> usize {
        self.states.len()
    }

    /// Length in bytes of the given pattern.
    pub fn pattern_len(&self, pattern: PatternId) -> usize {
        self.pattern_lens[pattern as usize] as usize
    }

    /// Approximate heap footprint in bytes.
    pub fn mem_size(&self) -> usize {
        let mut size = self.states.capacity() * std::mem::size_of::<TrieState>()
            + self.fail.capacity() * 4
            + self.offsets.capacity() * 4
            + self.output.capacity() * 4
            + self.pattern_lens.capacity() * 4;
        for s in &self.states {
            if s.trans.spilled() {
                size += s.trans.capacity() * std::mem::size_of::<(u8, u32)>();
            }
        }
        size
    }

    /// Exact lookup: the id of the pattern equal to `word`, if any.
    pub fn find(&self, word: impl AsRef<[u8]>) -> Option<PatternId> {
        let mut cur = ROOT;
        for &b in word.as_ref() {
            cur = self.states[cur as usize].target(b)?;
        }
        let w = self.states[cur as usize].word;
        (w != NO_WORD).then_some(w)
    }

    /// Scans `text`, calling `on_hit(end_offset, pattern_ids)` once per
    /// position where at least one pattern ends. Each `(end, pattern)`
    /// pair is reported exactly once.
    pub fn scan(&self, text: &[u8], on_hit: impl FnMut(usize, &[PatternId])) {
        let mut cursor = ScanCursor::default();
        self.scan_chunk(&mut cursor, text, on_hit);
    }

    /// Scans with a byte translation table (e.g. case folding) applied to
    /// the text before matching. Patterns are matched as built.
    pub fn scan_with(
        &self,
        text: &[u8],
        translate: &[u8; 256],
        on_hit: impl FnMut(usize, &[PatternId]),
    ) {
        let mut cursor = ScanCursor::default();
        self.scan_imp(&mut cursor, text, |b| translate[b as usize], on_hit);
    }

    /// Feeds one chunk of a longer input; end offsets count from the first
    /// chunk. Reuse the cursor across calls to resume.
    ///
    /// ```
    /// use libfsa::fsa::{AcBuilder, ScanCursor};
    ///
    /// let mut b = AcBuilder::new();
    /// b.add_pattern("ab");
    /// let ac = b.compile();
    /// let mut hits = Vec::new();
    /// let mut cur = ScanCursor::default();
    /// ac.scan_chunk(&mut cur, b"xa", |end, _| hits.push(end));
    /// ac.scan_chunk(&mut cur, b"by", |end, _| hits.push(end));
    /// assert_eq!(hits, vec![3]); // "ab" straddles the chunk boundary
    /// ```
    pub fn scan_chunk(
        &self,
        cursor: &mut ScanCursor,
        chunk: &[u8],
        on_hit: impl FnMut(usize, &[PatternId]),
    ) {
        self.scan_imp(cursor, chunk, |b| b, on_hit);
    }

    fn scan_imp(
        &self,
        cursor: &mut ScanCursor,
        chunk: &[u8],
        tr: impl Fn(u8) -> u8,
        mut on_hit: impl FnMut(usize, &[PatternId]),
    ) {
        let mut s = cursor.state;
        for (i, &raw) in chunk.iter().enumerate() {
            let c = tr(raw);
            loop {
                if let Some(t) = self.states[s as usize].target(c) {
                    s = t;
                    break;
                }
                if s == ROOT {
                    break;
                }
                s = self.fail[s as usize];
            }
            let (o0, o1) = (
                self.offsets[s as usize] as usize,
                self.offsets[s as usize + 1] as usize,
            );
            if o0 < o1 {
                on_hit(cursor.offset + i + 1, &self.output[o0..o1]);
            }
        }
        cursor.state = s;
        cursor.offset += chunk.len();
    }

    pub(crate) fn fail_links(&self) -> &[u32] {
        &self.fail
    }

    pub(crate) fn output_range(&self, s: u32) -> &[PatternId] {
        &self.output[self.offsets[s as usize] as usize..self.offsets[s as usize + 1] as usize]
    }

    pub(crate) fn transitions(&self, s: u32) -> &[(u8, u32)] {
        &self.states[s as usize].trans
    }

    pub(crate) fn pattern_lens(&self) -> &[u32] {
        &self.pattern_lens
    }
}
