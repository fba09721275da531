use std::collections::BinaryHeap;
use std::collections::VecDeque;

use smallvec::SmallVec;
use tracing::debug;

use super::ac::{AhoCorasick, PatternId, ScanCursor};
use super::{FsaError, WalkOrder};

/// Free slot marker in `check`.
const FREE: u32 = u32::MAX;
/// `base` of a state with no children; `NO_BASE + 255` stays below
/// `u32::MAX`, so the probe lands out of bounds instead of wrapping.
const NO_BASE: u32 = u32::MAX - 255;

/// A compiled scanner re-expressed as two parallel arrays.
///
/// `goto(s, c) = base[s] + c`, valid iff `check[base[s] + c] == s`; a miss
/// falls back through the failure link. Transitions are O(1) with no
/// per-state search, at the cost of some empty slots between states.
///
/// # Examples
///
/// ```
/// use libfsa::fsa::{AcBuilder, DoubleArrayAc, WalkOrder};
///
/// let mut b = AcBuilder::new();
/// for pat in ["he", "she", "his", "hers"] {
///     b.add_pattern(pat);
/// }
/// let dense = DoubleArrayAc::compact(&b.compile(), WalkOrder::BreadthFirst);
/// let mut hits = Vec::new();
/// dense.scan(b"ushers", |end, pats| hits.extend(pats.iter().map(|&p| (end, p))));
/// assert_eq!(hits, vec![(4, 1), (4, 0), (6, 3)]);
/// ```
pub struct DoubleArrayAc {
    base: Vec<u32>,
    check: Vec<u32>,
    fail: Vec<u32>,
    /// Output range of slot `s` is `offsets[s]..offsets[s + 1]`.
    offsets: Vec<u32>,
    output: Vec<PatternId>,
    pattern_lens: Vec<u32>,
    n_states: u32,
}

impl DoubleArrayAc {
    /// Compacts a compiled scanner. `order` selects the walk that assigns
    /// slots — it shifts the layout (and how tightly slots pack), never
    /// what the scanner matches.
    pub fn compact(ac: &AhoCorasick, order: WalkOrder) -> DoubleArrayAc {
        let n = ac.num_states();
        let mut base = vec![NO_BASE; 1];
        let mut check = vec![FREE; 1];
        let mut slot_of = vec![FREE; n];
        slot_of[0] = 0;
        check[0] = 0;

        // First free slot candidate; slots below it are all taken.
        let mut search_start: u32 = 1;

        let mut queue: VecDeque<u32> = VecDeque::new();
        let mut stack: Vec<u32> = Vec::new();
        let mut heap: BinaryHeap<std::cmp::Reverse<u32>> = BinaryHeap::new();
        let push = |s: u32, queue: &mut VecDeque<u32>, stack: &mut Vec<u32>, heap: &mut BinaryHeap<std::cmp::Reverse<u32>>| match order {
            WalkOrder::BreadthFirst => queue.push_back(s),
            WalkOrder::DepthFirst => stack.push(s),
            WalkOrder::PriorityFirst => heap.push(std::cmp::Reverse(s)),
        };
        push(0, &mut queue, &mut stack, &mut heap);

        loop {
            let s = match order {
                WalkOrder::BreadthFirst => queue.pop_front(),
                WalkOrder::DepthFirst => stack.pop(),
                WalkOrder::PriorityFirst => heap.pop().map(|r| r.0),
            };
            let Some(s) = s else { break };
            let slot = slot_of[s as usize];
            let labels: SmallVec<[u8; 8]> = ac.transitions(s).iter().map(|&(c, _)| c).collect();
            if labels.is_empty() {
                continue;
            }
            let b = find_base(&check, &labels, search_start);
            let end = b as usize + 255;
            if end >= check.len() {
                check.resize(end + 1, FREE);
                base.resize(end + 1, NO_BASE);
            }
            base[slot as usize] = b;
            for &(c, t) in ac.transitions(s) {
                let child_slot = b + c as u32;
                debug_assert_eq!(check[child_slot as usize], FREE);
                check[child_slot as usize] = slot;
                slot_of[t as usize] = child_slot;
                push(t, &mut queue, &mut stack, &mut heap);
            }
            while (search_start as usize) < check.len() && check[search_start as usize] != FREE {
                search_start += 1;
            }
        }

        let slots = check.len();
        let mut fail = vec![0u32; slots];
        let mut cnt = vec![0u32; slots];
        for s in 0..n {
            let slot = slot_of[s] as usize;
            fail[slot] = slot_of[ac.fail_links()[s] as usize];
            cnt[slot] = ac.output_range(s as u32).len() as u32;
        }
        let mut offsets = vec![0u32; slots + 1];
        for i in 0..slots {
            offsets[i + 1] = offsets[i] + cnt[i];
        }
        let mut output = vec![0u32; offsets[slots] as usize];
        for s in 0..n {
            let slot = slot_of[s] as usize;
            let o = offsets[slot] as usize;
            output[o..o + cnt[slot] as usize].copy_from_slice(ac.output_range(s as u32));
        }

        debug!(
            states = n,
            slots,
            ?order,
            "double-array compaction finished"
        );
        DoubleArrayAc {
            base,
            check,
            fail,
            offsets,
            output,
            pattern_lens: ac.pattern_lens().to_vec(),
            n_states: n as u32,
        }
    }

    pub(crate) fn from_raw(
        base: Vec<u32>,
        check: Vec<u32>,
        fail: Vec<u32>,
        offsets: Vec<u32>,
        output: Vec<PatternId>,
        pattern_lens: Vec<u32>,
        n_states: u32,
    ) -> Result<Self, FsaError> {
        if base.is_empty()
            || check.len() != base.len()
            || fail.len() != base.len()
            || offsets.len() != base.len() + 1
        {
            return Err(FsaError::CorruptData("double-array table sizes disagree"));
        }
        if offsets.last().copied().unwrap_or(0) as usize != output.len() {
            return Err(FsaError::CorruptData("output block length mismatch"));
        }
        let slots = base.len() as u32;
        if fail.iter().any(|&f| f >= slots) {
            return Err(FsaError::CorruptData("fail link out of range"));
        }
        if base.iter().any(|&b| b > NO_BASE) {
            return Err(FsaError::CorruptData("base value out of range"));
        }
        if offsets.windows(2).any(|w| w[0] > w[1]) {
            return Err(FsaError::CorruptData("output offsets not monotonic"));
        }
        Ok(DoubleArrayAc {
            base,
            check,
            fail,
            offsets,
            output,
            pattern_lens,
            n_states,
        })
    }

    /// Number of live states.
    pub fn num_states(&self) -> usize {
        self.n_states as usize
    }

    /// Number of slots in the dense arrays (live states plus padding).
    pub fn num_slots(&self) -> usize {
        self.check.len()
    }

    /// Number of patterns.
    pub fn num_patterns(&self) -> usize {
        self.pattern_lens.len()
    }

    /// Length in bytes of the given pattern.
    pub fn pattern_len(&self, pattern: PatternId) -> usize {
        self.pattern_lens[pattern as usize] as usize
    }

    /// Approximate heap footprint in bytes.
    pub fn mem_size(&self) -> usize {
        (self.base.capacity()
            + self.check.capacity()
            + self.fail.capacity()
            + self.offsets.capacity()
            + self.output.capacity()
            + self.pattern_lens.capacity())
            * 4
    }

    pub(crate) fn blocks(&self) -> (&[u32], &[u32], &[u32], &[u32], &[u32], &[u32]) {
        (
            &self.base,
            &self.check,
            &self.fail,
            &self.offsets,
            &self.output,
            &self.pattern_lens,
        )
    }

    /// Scans `text`; same contract as [`AhoCorasick::scan`].
    pub fn scan(&self, text: &[u8], on_hit: impl FnMut(usize, &[PatternId])) {
        let mut cursor = ScanCursor::default();
        self.scan_chunk(&mut cursor, text, on_hit);
    }

    /// Scans with a byte translation table applied to the text.
    pub fn scan_with(
        &self,
        text: &[u8],
        translate: &[u8; 256],
        on_hit: impl FnMut(usize, &[PatternId]),
    ) {
        let mut cursor = ScanCursor::default();
        self.scan_imp(&mut cursor, text, |b| translate[b as usize], on_hit);
    }

    /// Feeds one chunk of a longer input; see [`AhoCorasick::scan_chunk`].
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
        let (mut s, base_offset) = cursor.parts();
        for (i, &raw) in chunk.iter().enumerate() {
            let c = tr(raw) as u32;
            loop {
                let idx = (self.base[s as usize] + c) as usize;
                if idx < self.check.len() && self.check[idx] == s {
                    s = idx as u32;
                    break;
                }
                if s == 0 {
                    break;
                }
                s = self.fail[s as usize];
            }
            let (o0, o1) = (
                self.offsets[s as usize] as usize,
                self.offsets[s as usize + 1] as usize,
            );
            if o0 < o1 {
                on_hit(base_offset + i + 1, &self.output[o0..o1]);
            }
        }
        cursor.set_parts(s, base_offset + chunk.len());
    }
}

/// First-fit search for a base where every child slot is free. Base 0 is
/// excluded so `base + c` can never alias the root slot.
fn find_base(check: &[u32], labels: &[u8], search_start: u32) -> u32 {
    let first = labels[0] as u32;
    let mut b = search_start.saturating_sub(first).max(1);
    'outer: loop {
        for &c in labels {
            let idx = (b + c as u32) as usize;
            if idx < check.len() && check[idx] != FREE {
                b += 1;
                continue 'outer;
            }
        }
        return b;
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::fsa::ac::AcBuilder;

    fn classic() -> AhoCorasick {
        let mut b = AcBuilder::new();
        for p in ["he", "she", "his", "hers"] {
            b.add_pattern(p);
        }
        b.compile()
    }

    fn collect_hits(
        scan: impl FnOnce(&mut dyn FnMut(usize, &[PatternId])),
    ) -> Vec<(usize, PatternId)> {
        let mut hits = Vec::new();
        scan(&mut |end, pats| {
            for &p in pats {
                hits.push((end, p));
            }
        });
        hits
    }

    #[test]
    fn dense_scan_agrees_with_sparse_scan() {
        let ac = classic();
        let texts: [&[u8]; 4] = [b"ushers", b"shehishehers", b"xyz", b""];
        for order in [
            WalkOrder::BreadthFirst,
            WalkOrder::DepthFirst,
            WalkOrder::PriorityFirst,
        ] {
            let dense = DoubleArrayAc::compact(&ac, order);
            for text in texts {
                let sparse_hits = collect_hits(|f| ac.scan(text, f));
                let dense_hits = collect_hits(|f| dense.scan(text, f));
                assert_eq!(sparse_hits, dense_hits, "{order:?} {text:?}");
            }
        }
    }

    #[test]
    fn ushers_scenario_on_dense_form() {
        let dense = DoubleArrayAc::compact(&classic(), WalkOrder::BreadthFirst);
        let hits = collect_hits(|f| dense.scan(b"ushers", f));
        assert!(hits.contains(&(4, 0)));
        assert!(hits.contains(&(4, 1)));
        assert!(hits.contains(&(6, 3)));
        assert_eq!(hits.len(), 3);
    }

    #[test]
    fn chunked_dense_scan() {
        let dense = DoubleArrayAc::compact(&classic(), WalkOrder::BreadthFirst);
        let text = b"ushers";
        let whole = collect_hits(|f| dense.scan(text, f));
        for split in 0..=text.len() {
            let mut hits = Vec::new();
            let mut cur = ScanCursor::default();
            for chunk in [&text[..split], &text[split..]] {
                dense.scan_chunk(&mut cur, chunk, |end, pats| {
                    for &p in pats {
                        hits.push((end, p));
                    }
                });
            }
            assert_eq!(hits, whole, "split at {split}");
        }
    }

    #[test]
    fn case_folded_dense_scan() {
        let mut table = [0u8; 256];
        for i in 0..256 {
            table[i] = (i as u8).to_ascii_lowercase();
        }
        let mut b = AcBuilder::new();
        b.add_pattern("needle");
        let dense = DoubleArrayAc::compact(&b.compile(), WalkOrder::BreadthFirst);
        let mut hits = Vec::new();
        dense.scan_with(b"haystack NEEDLE haystack", &table, |end, _| hits.push(end));
        assert_eq!(hits, vec![15]);
    }

    #[test]
    fn single_byte_patterns_hit_everywhere() {
        let mut b = AcBuilder::new();
        b.add_pattern("a");
        let dense = DoubleArrayAc::compact(&b.compile(), WalkOrder::BreadthFirst);
        let hits = collect_hits(|f| dense.scan(b"aaa", f));
        assert_eq!(hits, vec![(1, 0), (2, 0), (3, 0)]);
    }

    #[test]
    fn raw_tables_are_validated() {
        let dense = DoubleArrayAc::compact(&classic(), WalkOrder::BreadthFirst);
        let (base, check, fail, offsets, output, lens) = dense.blocks();
        let mut bad_fail = fail.to_vec();
        bad_fail[0] = u32::MAX;
        assert!(matches!(
            DoubleArrayAc::from_raw(
                base.to_vec(),
                check.to_vec(),
                bad_fail,
                offsets.to_vec(),
                output.to_vec(),
                lens.to_vec(),
                dense.num_states() as u32,
            ),
            Err(FsaError::CorruptData("fail link out of range"))
        ));
        let mut bad_offsets = offsets.to_vec();
        bad_offsets[0] = u32::MAX;
        assert!(matches!(
            DoubleArrayAc::from_raw(
                base.to_vec(),
                check.to_vec(),
                fail.to_vec(),
                bad_offsets,
                output.to_vec(),
                lens.to_vec(),
                dense.num_states() as u32,
            ),
            Err(FsaError::CorruptData(_))
        ));
    }

    #[test]
    fn walk_order_changes_slots_not_matches() {
        let mut b = AcBuilder::new();
        for p in ["abc", "bcd", "cde", "zz"] {
            b.add_pattern(p);
        }
        let ac = b.compile();
        let bfs = DoubleArrayAc::compact(&ac, WalkOrder::BreadthFirst);
        let dfs = DoubleArrayAc::compact(&ac, WalkOrder::DepthFirst);
        assert_eq!(bfs.num_states(), dfs.num_states());
        let text = b"zabcdezz";
        assert_eq!(
            collect_hits(|f| bfs.scan(text, f)),
            collect_hits(|f| dfs.scan(text, f))
        );
    }
}
