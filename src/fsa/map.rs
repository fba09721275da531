use hashbrown::HashMap;

use super::builder::{IntoWord, OrderedBuilder};
use super::dawg::Dawg;
use super::state_id::StateId;
use super::FsaError;

/// What to do when the same key is inserted twice with a value attached.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DuplicatePolicy {
    /// Keep the first value and report the insertion as a no-op.
    KeepFirst,
    /// Fail the insertion with [`FsaError::DuplicateKey`].
    Fail,
}

/// Collects key/value pairs for a [`DawgMap`].
///
/// Values cannot live on terminal states — minimization shares those
/// between keys — so the builder gathers pairs and the finished map stores
/// values in an array indexed by word rank.
pub struct DawgMapBuilder<V> {
    pairs: Vec<(Vec<u8>, V)>,
    seen: HashMap<Vec<u8>, usize>,
    policy: DuplicatePolicy,
}

impl<V> DawgMapBuilder<V> {
    /// Creates a builder with the given duplicate-key policy.
    pub fn new(policy: DuplicatePolicy) -> Self {
        DawgMapBuilder {
            pairs: Vec::new(),
            seen: HashMap::new(),
            policy,
        }
    }

    /// Inserts a key with an attached value, in any order.
    ///
    /// Returns `Ok(true)` if the key was new. Under
    /// [`DuplicatePolicy::KeepFirst`] a repeated key returns `Ok(false)`
    /// and keeps the first value; under [`DuplicatePolicy::Fail`] it
    /// returns [`FsaError::DuplicateKey`].
    pub fn insert(&mut self, key: impl IntoWord, value: V) -> Result<bool, FsaError> {
        let key = key.collect_word().to_vec();
        if self.seen.contains_key(&key) {
            return match self.policy {
                DuplicatePolicy::KeepFirst => Ok(false),
                DuplicatePolicy::Fail => Err(FsaError::DuplicateKey(key)),
            };
        }
        self.seen.insert(key.clone(), self.pairs.len());
        self.pairs.push((key, value));
        Ok(true)
    }

    /// Number of distinct keys collected so far.
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// True if nothing has been inserted.
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Builds the dictionary: keys go through the minimizing builder in
    /// sorted order, values land at their key's rank.
    pub fn finish<Id: StateId>(mut self) -> Result<DawgMap<V, Id>, FsaError> {
        self.pairs.sort_by(|a, b| a.0.cmp(&b.0));
        let mut builder = OrderedBuilder::<Id>::new();
        for (key, _) in &self.pairs {
            builder.add_word(key.as_slice())?;
        }
        let dawg = Dawg::compile(builder.finish()?)?;
        // Sorted insertion order is rank order, so the values are already
        // in place.
        debug_assert!(self
            .pairs
            .first()
            .is_none_or(|(k, _)| dawg.index(k.as_slice()) == Some(0)));
        let values = self.pairs.into_iter().map(|(_, v)| v).collect();
        Ok(DawgMap { dawg, values })
    }
}

/// An ordered key → value dictionary backed by a compiled DAWG.
///
/// Keys are stored once in the shared minimal graph; values sit in a flat
/// array indexed by word rank. Lookup is a rank query plus one array read.
///
/// # Examples
///
/// ```
/// use libfsa::fsa::{DawgMapBuilder, DuplicatePolicy};
///
/// let mut b = DawgMapBuilder::new(DuplicatePolicy::KeepFirst);
/// b.insert("dog", 7u32).unwrap();
/// b.insert("car", 1u32).unwrap();
/// let map = b.finish::<u32>().unwrap();
/// assert_eq!(map.get("car"), Some(&1));
/// assert_eq!(map.get("cab"), None);
/// assert_eq!(map.nth_key(1).unwrap(), b"dog");
/// ```
pub struct DawgMap<V, Id: StateId = u32> {
    dawg: Dawg<Id>,
    values: Vec<V>,
}

impl<V, Id: StateId> DawgMap<V, Id> {
    /// Number of key/value pairs.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True if the map holds no pairs.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// The rank layer the map is built on.
    pub fn dawg(&self) -> &Dawg<Id> {
        &self.dawg
    }

    /// Returns the value for `key`, if present.
    pub fn get(&self, key: impl IntoWord) -> Option<&V> {
        let rank = self.dawg.index(key)?;
        Some(&self.values[rank as usize])
    }

    /// Returns a mutable reference to the value for `key`, if present.
    pub fn get_mut(&mut self, key: impl IntoWord) -> Option<&mut V> {
        let rank = self.dawg.index(key)?;
        Some(&mut self.values[rank as usize])
    }

    /// Returns the key with rank `nth`.
    pub fn nth_key(&self, nth: u64) -> Option<Vec<u8>> {
        self.dawg.nth_word(nth)
    }

    /// Returns the value at rank `nth`.
    pub fn nth_value(&self, nth: u64) -> Option<&V> {
        self.values.get(nth as usize)
    }

    /// Iterates `(key, value)` pairs in lexicographic key order.
    pub fn iter(&self) -> impl Iterator<Item = (Vec<u8>, &V)> + '_ {
        (0..self.dawg.num_words())
            .map(|r| (self.dawg.nth_word(r).expect("rank in range"), &self.values[r as usize]))
    }
}
