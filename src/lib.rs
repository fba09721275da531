//! # libfsa
//!
//! Incremental construction and compaction of minimal finite automata.
//!
//! Words stream into a minimizing builder and come out as a
//! [DAWG](https://en.wikipedia.org/wiki/Deterministic_acyclic_finite_state_automaton)
//! — a minimal acyclic automaton whose shared suffixes keep large word sets
//! small. The sealed graph can then be path-zipped (long non-branching
//! chains collapse into inline byte runs), compiled into an ordered
//! dictionary with word ↔ rank navigation, scanned for multiple patterns at
//! once through an Aho-Corasick automaton with an optional dense
//! double-array form, and persisted to a flat byte image that reloads
//! behavior-identically.
//!
//! ## Features
//!
//! - **Any insertion order**: a fast stack-based builder for pre-sorted
//!   input and a general builder (with deletion) for arbitrary order
//! - **Compact**: hash-consed minimization plus path-zip compression
//! - **Ordered**: `index(word)` and `nth_word(rank)` in O(word length)
//! - **Shareable**: sealed structures are read-only and lock-free for any
//!   number of concurrent readers
//!
//! ## Quick Start
//!
//! Build a dictionary and navigate it by rank:
//!
//! ```
//! use libfsa::fsa::{Builder, Dawg};
//!
//! let mut b = Builder::<u32>::new();
//! for word in ["cat", "car", "cart", "dog"] {
//!     b.add_word(word).unwrap();
//! }
//! let dawg = Dawg::compile(b.finish()).unwrap();
//! assert_eq!(dawg.num_words(), 4);
//! assert_eq!(dawg.nth_word(0).unwrap(), b"car");
//! assert_eq!(dawg.index("dog"), Some(3));
//! ```
//!
//! Scan a text for many patterns in one pass:
//!
//! ```
//! use libfsa::fsa::AcBuilder;
//!
//! let mut b = AcBuilder::new();
//! for pat in ["he", "she", "his", "hers"] {
//!     b.add_pattern(pat);
//! }
//! let ac = b.compile();
//! let mut ends = Vec::new();
//! ac.scan(b"ushers", |end, _pats| ends.push(end));
//! assert_eq!(ends, vec![4, 6]);
//! ```

pub mod fsa;
pub mod trb;
