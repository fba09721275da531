//! Incremental finite-automaton construction and compaction.
//!
//! The submodules layer on top of each other: [`arena`] owns states and
//! transitions, [`builder`] folds words into a minimal acyclic graph,
//! [`zip`] splices non-branching chains into inline byte runs, [`dawg`]
//! and [`map`] add word/rank navigation, [`ac`] and [`double_array`]
//! provide multi-pattern scanning, and [`persist`] converts the sealed
//! structures to and from a flat byte image.

/// Aho-Corasick trie, failure links, and the sparse scanner.
pub mod ac;
/// State arena: id-addressed states with sorted transitions.
pub mod arena;
/// Sealed, read-only automaton and its query surface.
pub mod automaton;
/// Incremental minimizing builders (ordered and general variants).
pub mod builder;
/// DAWG rank layer: word ↔ rank navigation over suffix counts.
pub mod dawg;
/// Dense double-array compaction of a compiled scanner.
pub mod double_array;
/// Key → value dictionary over a compiled DAWG.
pub mod map;
/// Flat byte-image persistence for sealed structures.
pub mod persist;
/// Literal-atom prefilter driving an external confirmer.
pub mod prefilter;
/// State-id widths selected per build.
pub mod state_id;
/// Path-zip compression of non-branching chains.
pub mod zip;

pub use ac::{AcBuilder, AhoCorasick, PatternId, ScanCursor};
pub use arena::StateArena;
pub use automaton::Automaton;
pub use builder::{Builder, IntoWord, OrderedBuilder};
pub use dawg::Dawg;
pub use double_array::DoubleArrayAc;
pub use map::{DawgMap, DawgMapBuilder, DuplicatePolicy};
pub use prefilter::{Confirm, LiteralPrefilter, PrefilterBuilder};
pub use state_id::{StateId, U40, U48};
pub use zip::path_zip;

/// Traversal order used when a pass relayouts states.
///
/// The order changes the id/slot layout of the result (and therefore its
/// access locality), never the language it accepts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WalkOrder {
    /// Visit states level by level from the root.
    BreadthFirst,
    /// Visit states depth first, children in label order.
    DepthFirst,
    /// Visit the pending state with the smallest source id first.
    PriorityFirst,
}

/// Errors raised by builders, compilation passes, and the persistence codec.
#[derive(Debug)]
pub enum FsaError {
    /// The id range of the chosen state-id width is exhausted. Rebuild with
    /// a wider id type to recover.
    CapacityExceeded {
        /// Largest id the chosen width can represent.
        max_id: u64,
    },
    /// The same key was inserted twice under [`DuplicatePolicy::Fail`].
    DuplicateKey(Vec<u8>),
    /// The ordered builder received words out of lexicographic order.
    OutOfOrder {
        /// The previously inserted word.
        prev: Vec<u8>,
        /// The offending word.
        curr: Vec<u8>,
    },
    /// A rank compilation pass found a cycle.
    Cyclic,
    /// A persisted image (or an input automaton) is not the representation
    /// the caller asked for. Never coerced silently.
    TypeMismatch {
        /// What the caller requested.
        expected: &'static str,
        /// What was actually found.
        found: String,
    },
    /// A persisted image is internally inconsistent. Always fatal on load.
    CorruptData(&'static str),
    /// An I/O error from the underlying reader or writer.
    Io(std::io::Error),
}

impl std::fmt::Display for FsaError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FsaError::CapacityExceeded { max_id } => {
                write!(f, "state id range exhausted (max id {max_id})")
            }
            FsaError::DuplicateKey(key) => {
                write!(f, "duplicate key: {:?}", String::from_utf8_lossy(key))
            }
            FsaError::OutOfOrder { prev, curr } => write!(
                f,
                "words out of order: {:?} came before {:?}",
                String::from_utf8_lossy(prev),
                String::from_utf8_lossy(curr)
            ),
            FsaError::Cyclic => write!(f, "automaton contains a cycle"),
            FsaError::TypeMismatch { expected, found } => {
                write!(f, "type mismatch: expected {expected}, found {found}")
            }
            FsaError::CorruptData(what) => write!(f, "corrupt data: {what}"),
            FsaError::Io(e) => write!(f, "i/o error: {e}"),
        }
    }
}

impl std::error::Error for FsaError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FsaError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for FsaError {
    fn from(e: std::io::Error) -> Self {
        FsaError::Io(e)
    }
}
