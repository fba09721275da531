use std::collections::BinaryHeap;
use std::collections::VecDeque;

use smallvec::SmallVec;
use tracing::debug;

use super::arena::{StateArena, MAX_ZPATH};
use super::automaton::Automaton;
use super::state_id::StateId;
use super::{FsaError, WalkOrder};

/// Yields unvisited states in the configured order. Chain interiors are
/// never enqueued: their single incoming edge lies inside the chain.
struct Walker<Id: StateId> {
    order: WalkOrder,
    queue: VecDeque<Id>,
    heap: BinaryHeap<std::cmp::Reverse<u64>>,
    seen: Vec<bool>,
}

impl<Id: StateId> Walker<Id> {
    fn new(order: WalkOrder, total: usize, root: Id) -> Self {
        let mut w = Walker {
            order,
            queue: VecDeque::new(),
            heap: BinaryHeap::new(),
            seen: vec![false; total],
        };
        w.seen[root.index()] = true;
        w.push(root);
        w
    }

    fn push(&mut self, s: Id) {
        match self.order {
            WalkOrder::BreadthFirst | WalkOrder::DepthFirst => self.queue.push_back(s),
            WalkOrder::PriorityFirst => self.heap.push(std::cmp::Reverse(s.to_u64())),
        }
    }

    fn next(&mut self) -> Option<Id> {
        match self.order {
            WalkOrder::BreadthFirst => self.queue.pop_front(),
            WalkOrder::DepthFirst => self.queue.pop_back(),
            WalkOrder::PriorityFirst => self.heap.pop().map(|r| Id::from_u64(r.0)),
        }
    }

    /// Enqueues the unvisited children of a chain tail.
    fn put_children(&mut self, arena: &StateArena<Id>, tail: Id) {
        // Reversed so a stack pop visits children in label order.
        let children: SmallVec<[Id; 8]> = arena.transitions(tail).iter().map(|&(_, t)| t).collect();
        for &t in children.iter().rev() {
            if !self.seen[t.index()] {
                self.seen[t.index()] = true;
                self.push(t);
            }
        }
    }
}

/// Collects the maximal compressible chain starting at `head`.
///
/// `path` holds the chain states, `labels[j]` the edge from `path[j]` to
/// `path[j + 1]`. A chain extends while the current state is non-terminal
/// with exactly one child and the child is not a confluence; a terminal or
/// branching state ends the chain and becomes its tail.
fn get_one_path<Id: StateId>(
    arena: &StateArena<Id>,
    confluence: &[bool],
    head: Id,
    path: &mut SmallVec<[Id; 32]>,
    labels: &mut SmallVec<[u8; 32]>,
) {
    path.clear();
    labels.clear();
    path.push(head);
    let trans = arena.transitions(head);
    if arena.is_term(head) || trans.len() != 1 {
        return;
    }
    let (mut ch, mut next) = trans[0];
    while labels.len() < MAX_ZPATH && !confluence[next.index()] {
        labels.push(ch);
        path.push(next);
        let trans = arena.transitions(next);
        if arena.is_term(next) || trans.len() != 1 {
            break;
        }
        (ch, next) = trans[0];
    }
}

/// Rewrites non-branching chains of `src` into inline zpath runs.
///
/// Every chain of at least `min_run` labels whose interior states have a
/// single parent and a single child becomes one state carrying the chain's
/// labels as its zpath. The result accepts exactly the same word set; only
/// `mem_size` and fan-out change. `order` selects the walk that lays out
/// the new state ids (locality, not semantics).
///
/// # Errors
///
/// [`FsaError::TypeMismatch`] if `src` already carries zpath runs.
///
/// # Examples
///
/// ```
/// use libfsa::fsa::{path_zip, Builder, WalkOrder};
///
/// let mut b = Builder::<u32>::new();
/// for word in ["cartography", "cartoon", "dog"] {
///     b.add_word(word).unwrap();
/// }
/// let plain = b.finish();
/// let zipped = path_zip(&plain, WalkOrder::BreadthFirst, 2).unwrap();
/// assert!(zipped.num_zpath_states() > 0);
/// assert!(zipped.num_used_states() < plain.num_used_states());
/// for word in ["cartography", "cartoon", "dog"] {
///     assert!(zipped.contains(word));
/// }
/// assert_eq!(zipped.num_words(), plain.num_words());
/// ```
pub fn path_zip<Id: StateId>(
    src: &Automaton<Id>,
    order: WalkOrder,
    min_run: usize,
) -> Result<Automaton<Id>, FsaError> {
    if src.num_zpath_states() > 0 {
        return Err(FsaError::TypeMismatch {
            expected: "automaton without zpath runs",
            found: "path-zipped automaton".to_string(),
        });
    }
    let arena = src.arena();
    let root = src.root();
    let total = arena.total_states();
    let min_run = min_run.max(1);

    let indeg = arena.compute_in_degree(root);
    let confluence: Vec<bool> = indeg.iter().map(|&d| d > 1).collect();

    const NIL: u64 = u64::MAX;
    let mut s2d = vec![NIL; total];
    s2d[root.index()] = 0;
    let mut ds: u64 = 1;

    let mut path: SmallVec<[Id; 32]> = SmallVec::new();
    let mut labels: SmallVec<[u8; 32]> = SmallVec::new();

    // Pass 1: assign destination ids. A compressed chain maps its head and
    // tail to one id; short chains keep a state per node.
    let mut walker = Walker::new(order, total, root);
    while let Some(head) = walker.next() {
        get_one_path(arena, &confluence, head, &mut path, &mut labels);
        let tail = *path.last().unwrap();
        if labels.len() >= min_run {
            if s2d[head.index()] == NIL {
                s2d[head.index()] = ds;
                ds += 1;
            }
            s2d[tail.index()] = s2d[head.index()];
        } else {
            let start = if s2d[head.index()] == NIL { 0 } else { 1 };
            for &s in &path[start..] {
                s2d[s.index()] = ds;
                ds += 1;
            }
        }
        walker.put_children(arena, tail);
    }

    // Pass 2: emit the destination automaton.
    let mut dest = StateArena::<Id>::with_states(ds as usize)?;
    let mut zpath_states = 0u64;
    let mut total_zpath_len = 0u64;
    let mut walker = Walker::new(order, total, root);
    while let Some(head) = walker.next() {
        get_one_path(arena, &confluence, head, &mut path, &mut labels);
        let tail = *path.last().unwrap();
        let zs = Id::from_u64(s2d[tail.index()]);
        for &(c, t) in arena.transitions(tail) {
            dest.add_transition(zs, c, Id::from_u64(s2d[t.index()]));
        }
        dest.set_term(zs, arena.is_term(tail));
        if labels.len() >= min_run {
            dest.set_zpath(zs, &labels);
            zpath_states += 1;
            total_zpath_len += labels.len() as u64;
        } else {
            for j in 0..labels.len() {
                let parent = Id::from_u64(s2d[path[j].index()]);
                let child = Id::from_u64(s2d[path[j + 1].index()]);
                dest.add_transition(parent, labels[j], child);
            }
        }
        walker.put_children(arena, tail);
    }

    debug!(
        src_states = src.num_used_states(),
        dest_states = ds,
        zpath_states,
        total_zpath_len,
        ?order,
        "path zip finished"
    );
    Ok(Automaton::from_parts(
        dest,
        src.num_words(),
        zpath_states,
        total_zpath_len,
        src.is_dag(),
    ))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::fsa::builder::Builder;

    const WORDS: [&str; 6] = [
        "confabulate",
        "confabulation",
        "conspire",
        "inspire",
        "inspiration",
        "x",
    ];

    fn build() -> Automaton<u32> {
        let mut b = Builder::<u32>::new();
        for w in WORDS {
            b.add_word(w).unwrap();
        }
        b.finish()
    }

    fn assert_same_language(zipped: &Automaton<u32>) {
        for w in WORDS {
            assert!(zipped.contains(w), "{w}");
        }
        for w in ["conf", "confabulat", "inspirat", "conspires", ""] {
            assert!(!zipped.contains(w), "{w}");
        }
        assert_eq!(zipped.num_words(), WORDS.len() as u64);
        let mut words = Vec::new();
        zipped.for_each_word(|w| words.push(w.to_vec()));
        let mut expected: Vec<Vec<u8>> = WORDS.iter().map(|w| w.as_bytes().to_vec()).collect();
        expected.sort();
        assert_eq!(words, expected);
    }

    #[test]
    fn zip_preserves_language_in_every_walk_order() {
        let plain = build();
        for order in [
            WalkOrder::BreadthFirst,
            WalkOrder::DepthFirst,
            WalkOrder::PriorityFirst,
        ] {
            let zipped = path_zip(&plain, order, 2).unwrap();
            assert!(zipped.num_zpath_states() > 0, "{order:?}");
            assert!(zipped.num_used_states() < plain.num_used_states());
            assert_same_language(&zipped);
        }
    }

    #[test]
    fn walk_order_changes_layout_not_size() {
        let plain = build();
        let bfs = path_zip(&plain, WalkOrder::BreadthFirst, 2).unwrap();
        let dfs = path_zip(&plain, WalkOrder::DepthFirst, 2).unwrap();
        assert_eq!(bfs.num_used_states(), dfs.num_used_states());
        assert_eq!(bfs.num_zpath_states(), dfs.num_zpath_states());
        assert_eq!(bfs.total_zpath_len(), dfs.total_zpath_len());
    }

    #[test]
    fn min_run_gates_compression() {
        let mut b = Builder::<u32>::new();
        b.add_word("ab").unwrap();
        b.add_word("ac").unwrap();
        let plain = b.finish();
        // The only chains here are single labels; a threshold of 2 keeps
        // everything uncompressed.
        let zipped = path_zip(&plain, WalkOrder::BreadthFirst, 2).unwrap();
        assert_eq!(zipped.num_zpath_states(), 0);
        assert_eq!(zipped.num_used_states(), plain.num_used_states());
        assert!(zipped.contains("ab"));
        assert!(zipped.contains("ac"));
    }

    #[test]
    fn terminal_states_end_chains() {
        let mut b = Builder::<u32>::new();
        b.add_word("abcdef").unwrap();
        b.add_word("abc").unwrap();
        let zipped = path_zip(&b.finish(), WalkOrder::BreadthFirst, 2).unwrap();
        // "abc" must stay accepted even though it sits inside the long
        // word's path.
        assert!(zipped.contains("abc"));
        assert!(zipped.contains("abcdef"));
        assert!(!zipped.contains("abcd"));
    }

    #[test]
    fn double_zip_is_rejected() {
        let plain = build();
        let zipped = path_zip(&plain, WalkOrder::BreadthFirst, 2).unwrap();
        assert!(matches!(
            path_zip(&zipped, WalkOrder::BreadthFirst, 2),
            Err(FsaError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn single_long_word_collapses_to_root_run() {
        let mut b = Builder::<u32>::new();
        b.add_word("abcdefgh").unwrap();
        let zipped = path_zip(&b.finish(), WalkOrder::BreadthFirst, 2).unwrap();
        assert!(zipped.contains("abcdefgh"));
        assert!(!zipped.contains("abcd"));
        // Root chain: the whole word ends up as root zpath + final state.
        assert_eq!(zipped.num_zpath_states(), 1);
    }
}
