//! Flat byte-image persistence.
//!
//! Every image starts with a fixed header — magic, format version, kind,
//! state-id width, flags, counts — followed by a block descriptor table
//! (offset + length per block, relative to the image start) and the block
//! bytes themselves, guarded by an FNV-1a checksum. Loading validates the
//! kind and id width against the requested representation and fails with
//! [`FsaError::TypeMismatch`] instead of reinterpreting bytes; structural
//! inconsistencies are [`FsaError::CorruptData`] and never partially
//! accepted. Exact offsets are an internal contract of this module.

use std::io::{Read, Write};

use byteorder::{LittleEndian as LE, ReadBytesExt, WriteBytesExt};
use tracing::debug;

use super::arena::{StateArena, MAX_ZPATH};
use super::automaton::Automaton;
use super::dawg::Dawg;
use super::double_array::DoubleArrayAc;
use super::state_id::StateId;
use super::FsaError;

const MAGIC: &[u8; 4] = b"FSA1";
const VERSION: u8 = 1;

const KIND_DAG: u8 = 1;
const KIND_DA_AC: u8 = 2;

const FLAG_IS_DAG: u8 = 1;
const FLAG_HAS_COUNTS: u8 = 2;

/// Node-record flags in the state block.
const NODE_TERM: u8 = 1;
const NODE_FREE: u8 = 2;

fn kind_name(kind: u8) -> &'static str {
    match kind {
        KIND_DAG => "dag automaton",
        KIND_DA_AC => "double-array scanner",
        _ => "unknown kind",
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    let mut h: u64 = 0xcbf2_9ce4_8422_2325;
    for &b in bytes {
        h ^= b as u64;
        h = h.wrapping_mul(0x0000_0100_0000_01b3);
    }
    h
}

/// Fixed-size header fields plus the block descriptor table.
struct Header {
    kind: u8,
    id_width: u8,
    flags: u8,
    n_states: u64,
    n_words: u64,
    zpath_states: u64,
    total_zpath_len: u64,
    checksum: u64,
    blocks: Vec<(u64, u64)>,
}

impl Header {
    fn byte_len(n_blocks: usize) -> usize {
        // magic + version + kind + width + flags + 5 u64 fields
        // + block count byte + descriptors.
        4 + 4 + 5 * 8 + 1 + n_blocks * 16
    }

    fn write(&self, w: &mut impl Write) -> Result<(), FsaError> {
        w.write_all(MAGIC)?;
        w.write_u8(VERSION)?;
        w.write_u8(self.kind)?;
        w.write_u8(self.id_width)?;
        w.write_u8(self.flags)?;
        w.write_u64::<LE>(self.n_states)?;
        w.write_u64::<LE>(self.n_words)?;
        w.write_u64::<LE>(self.zpath_states)?;
        w.write_u64::<LE>(self.total_zpath_len)?;
        w.write_u64::<LE>(self.checksum)?;
        w.write_u8(self.blocks.len() as u8)?;
        for &(off, len) in &self.blocks {
            w.write_u64::<LE>(off)?;
            w.write_u64::<LE>(len)?;
        }
        Ok(())
    }

    fn read(bytes: &[u8]) -> Result<Header, FsaError> {
        let mut r = bytes;
        let mut magic = [0u8; 4];
        r.read_exact(&mut magic)
            .map_err(|_| FsaError::CorruptData("image shorter than the header"))?;
        if &magic != MAGIC {
            return Err(FsaError::CorruptData("bad magic number"));
        }
        let version = read_u8(&mut r)?;
        if version != VERSION {
            return Err(FsaError::CorruptData("unsupported format version"));
        }
        let kind = read_u8(&mut r)?;
        let id_width = read_u8(&mut r)?;
        let flags = read_u8(&mut r)?;
        let n_states = read_u64(&mut r)?;
        let n_words = read_u64(&mut r)?;
        let zpath_states = read_u64(&mut r)?;
        let total_zpath_len = read_u64(&mut r)?;
        let checksum = read_u64(&mut r)?;
        let n_blocks = read_u8(&mut r)? as usize;
        let mut blocks = Vec::with_capacity(n_blocks);
        for _ in 0..n_blocks {
            let off = read_u64(&mut r)?;
            let len = read_u64(&mut r)?;
            blocks.push((off, len));
        }
        Ok(Header {
            kind,
            id_width,
            flags,
            n_states,
            n_words,
            zpath_states,
            total_zpath_len,
            checksum,
            blocks,
        })
    }

    /// Bounds-checks every descriptor and verifies the checksum over the
    /// concatenated block bytes.
    fn validate_blocks<'a>(&self, image: &'a [u8]) -> Result<Vec<&'a [u8]>, FsaError> {
        let mut slices = Vec::with_capacity(self.blocks.len());
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
        for &(off, len) in &self.blocks {
            let end = off
                .checked_add(len)
                .ok_or(FsaError::CorruptData("block descriptor overflows"))?;
            if end > image.len() as u64 {
                return Err(FsaError::CorruptData(
                    "block length inconsistent with image size",
                ));
            }
            let slice = &image[off as usize..end as usize];
            for &b in slice {
                hash ^= b as u64;
                hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
            }
            slices.push(slice);
        }
        if hash != self.checksum {
            return Err(FsaError::CorruptData("checksum mismatch"));
        }
        Ok(slices)
    }
}

fn read_u8(r: &mut &[u8]) -> Result<u8, FsaError> {
    r.read_u8()
        .map_err(|_| FsaError::CorruptData("image shorter than the header"))
}

fn read_u64(r: &mut &[u8]) -> Result<u64, FsaError> {
    r.read_u64::<LE>()
        .map_err(|_| FsaError::CorruptData("image shorter than the header"))
}

fn write_id<Id: StateId>(buf: &mut Vec<u8>, id: Id) {
    let v = id.to_u64();
    buf.extend_from_slice(&v.to_le_bytes()[..Id::BYTES as usize]);
}

fn read_id<Id: StateId>(r: &mut &[u8]) -> Result<Id, FsaError> {
    let mut raw = [0u8; 8];
    let w = Id::BYTES as usize;
    if r.len() < w {
        return Err(FsaError::CorruptData("truncated state block"));
    }
    raw[..w].copy_from_slice(&r[..w]);
    *r = &r[w..];
    Ok(Id::from_u64(u64::from_le_bytes(raw)))
}

/// Serializes the state table into (node block, zpath pool). Free slots
/// are kept so state ids stay stable across a round trip.
fn encode_states<Id: StateId>(arena: &StateArena<Id>) -> (Vec<u8>, Vec<u8>) {
    let mut nodes = Vec::new();
    let mut pool = Vec::new();
    for i in 0..arena.total_states() {
        let id = Id::from_usize(i);
        let mut flags = 0u8;
        if arena.is_term(id) {
            flags |= NODE_TERM;
        }
        if arena.is_free(id) {
            flags |= NODE_FREE;
        }
        nodes.push(flags);
        let trans = arena.transitions(id);
        nodes.extend_from_slice(&(trans.len() as u16).to_le_bytes());
        for &(c, t) in trans {
            nodes.push(c);
            write_id(&mut nodes, t);
        }
        let zp = arena.zpath(id);
        nodes.push(zp.len() as u8);
        pool.extend_from_slice(zp);
    }
    (nodes, pool)
}

fn decode_states<Id: StateId>(
    n_states: u64,
    nodes: &[u8],
    pool: &[u8],
) -> Result<StateArena<Id>, FsaError> {
    if n_states == 0 {
        return Err(FsaError::CorruptData("image declares zero states"));
    }
    // Each node record is at least flags + transition count + zpath length.
    if (nodes.len() as u64) < n_states.saturating_mul(4) {
        return Err(FsaError::CorruptData("state block shorter than declared count"));
    }
    let mut arena = StateArena::<Id>::with_states(n_states as usize)?;
    let mut r = nodes;
    let mut pool_pos = 0usize;
    let mut free_ids = Vec::new();
    for i in 0..n_states {
        let id = Id::from_u64(i);
        let flags = read_u8(&mut r).map_err(|_| FsaError::CorruptData("truncated state block"))?;
        let n_trans = {
            if r.len() < 2 {
                return Err(FsaError::CorruptData("truncated state block"));
            }
            let v = u16::from_le_bytes([r[0], r[1]]);
            r = &r[2..];
            v
        };
        let mut prev: Option<u8> = None;
        for _ in 0..n_trans {
            if r.is_empty() {
                return Err(FsaError::CorruptData("truncated state block"));
            }
            let c = r[0];
            r = &r[1..];
            let t: Id = read_id(&mut r)?;
            if t.to_u64() >= n_states {
                return Err(FsaError::CorruptData("transition target out of range"));
            }
            if prev.is_some_and(|p| p >= c) {
                return Err(FsaError::CorruptData("transition labels not sorted"));
            }
            prev = Some(c);
            arena.add_transition(id, c, t);
        }
        let zlen = read_u8(&mut r).map_err(|_| FsaError::CorruptData("truncated state block"))? as usize;
        if zlen > MAX_ZPATH {
            return Err(FsaError::CorruptData("zpath run longer than the format allows"));
        }
        if pool_pos + zlen > pool.len() {
            return Err(FsaError::CorruptData("zpath pool shorter than declared"));
        }
        arena.set_zpath(id, &pool[pool_pos..pool_pos + zlen]);
        pool_pos += zlen;
        arena.set_term(id, flags & NODE_TERM != 0);
        if flags & NODE_FREE != 0 {
            if i == 0 {
                return Err(FsaError::CorruptData("initial state marked free"));
            }
            free_ids.push(id);
        }
    }
    if !r.is_empty() || pool_pos != pool.len() {
        return Err(FsaError::CorruptData("trailing bytes after the state table"));
    }
    for id in free_ids {
        arena.free_state(id);
    }
    Ok(arena)
}

fn assemble(header: &mut Header, blocks: Vec<Vec<u8>>) -> Result<Vec<u8>, FsaError> {
    let mut offset = Header::byte_len(blocks.len()) as u64;
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for block in &blocks {
        header.blocks.push((offset, block.len() as u64));
        offset += block.len() as u64;
        for &b in block {
            hash ^= b as u64;
            hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
        }
    }
    header.checksum = hash;
    let mut out = Vec::with_capacity(offset as usize);
    header.write(&mut out)?;
    debug_assert_eq!(out.len(), Header::byte_len(blocks.len()));
    for block in blocks {
        out.extend_from_slice(&block);
    }
    Ok(out)
}

fn u32s_to_block(values: &[u32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(values.len() * 4);
    for &v in values {
        out.extend_from_slice(&v.to_le_bytes());
    }
    out
}

fn block_to_u32s(block: &[u8]) -> Result<Vec<u32>, FsaError> {
    if block.len() % 4 != 0 {
        return Err(FsaError::CorruptData("misaligned u32 block"));
    }
    Ok(block
        .chunks_exact(4)
        .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect())
}

impl<Id: StateId> Automaton<Id> {
    /// Writes the automaton as a flat byte image.
    pub fn save<W: Write>(&self, mut w: W) -> Result<(), FsaError> {
        let image = self.to_image(None)?;
        w.write_all(&image)?;
        Ok(())
    }

    fn to_image(&self, counts: Option<&[u64]>) -> Result<Vec<u8>, FsaError> {
        let (nodes, pool) = encode_states(self.arena());
        let mut blocks = vec![nodes, pool];
        let mut flags = 0u8;
        if self.is_dag() {
            flags |= FLAG_IS_DAG;
        }
        if let Some(counts) = counts {
            flags |= FLAG_HAS_COUNTS;
            let mut block = Vec::with_capacity(counts.len() * 8);
            for &c in counts {
                block.extend_from_slice(&c.to_le_bytes());
            }
            blocks.push(block);
        }
        let mut header = Header {
            kind: KIND_DAG,
            id_width: Id::BYTES,
            flags,
            n_states: self.total_states() as u64,
            n_words: self.num_words(),
            zpath_states: self.num_zpath_states(),
            total_zpath_len: self.total_zpath_len(),
            checksum: 0,
            blocks: Vec::new(),
        };
        let image = assemble(&mut header, blocks)?;
        debug!(bytes = image.len(), "automaton image written");
        Ok(image)
    }

    /// Reads an automaton image produced by [`save`](Automaton::save) (or
    /// by [`Dawg::save`]; the rank counts are ignored here).
    ///
    /// # Errors
    ///
    /// [`FsaError::TypeMismatch`] if the image holds a different kind or
    /// id width; [`FsaError::CorruptData`] if the declared blocks do not
    /// match the image or the checksum fails.
    pub fn load<R: Read>(mut r: R) -> Result<Self, FsaError> {
        let mut image = Vec::new();
        r.read_to_end(&mut image)?;
        Ok(Self::decode(&image)?.0)
    }

    fn decode(image: &[u8]) -> Result<(Self, Option<Vec<u64>>), FsaError> {
        let header = Header::read(image)?;
        if header.kind != KIND_DAG {
            return Err(FsaError::TypeMismatch {
                expected: "dag automaton",
                found: kind_name(header.kind).to_string(),
            });
        }
        if header.id_width != Id::BYTES {
            return Err(FsaError::TypeMismatch {
                expected: "matching state-id width",
                found: format!(
                    "width {} (loader expects {})",
                    header.id_width,
                    Id::BYTES
                ),
            });
        }
        let expected_blocks = if header.flags & FLAG_HAS_COUNTS != 0 { 3 } else { 2 };
        if header.blocks.len() != expected_blocks {
            return Err(FsaError::CorruptData("unexpected block count"));
        }
        let slices = header.validate_blocks(image)?;
        let arena = decode_states::<Id>(header.n_states, slices[0], slices[1])?;
        let counts = if header.flags & FLAG_HAS_COUNTS != 0 {
            let block = slices[2];
            if block.len() != header.n_states as usize * 8 {
                return Err(FsaError::CorruptData("rank count block length mismatch"));
            }
            Some(
                block
                    .chunks_exact(8)
                    .map(|c| u64::from_le_bytes(c.try_into().expect("8-byte chunk")))
                    .collect(),
            )
        } else {
            None
        };
        let auto = Automaton::from_parts(
            arena,
            header.n_words,
            header.zpath_states,
            header.total_zpath_len,
            header.flags & FLAG_IS_DAG != 0,
        );
        Ok((auto, counts))
    }
}

impl<Id: StateId> Dawg<Id> {
    /// Writes the automaton together with its rank counts.
    pub fn save<W: Write>(&self, mut w: W) -> Result<(), FsaError> {
        let image = self.automaton().to_image(Some(self.counts()))?;
        w.write_all(&image)?;
        Ok(())
    }

    /// Reads a compiled DAWG image. An image without rank counts is a
    /// [`FsaError::TypeMismatch`] — recompile instead of guessing.
    pub fn load<R: Read>(mut r: R) -> Result<Self, FsaError> {
        let mut image = Vec::new();
        r.read_to_end(&mut image)?;
        let (auto, counts) = Automaton::<Id>::decode(&image)?;
        match counts {
            Some(counts) => Ok(Dawg::from_parts(auto, counts)),
            None => Err(FsaError::TypeMismatch {
                expected: "compiled dawg with rank counts",
                found: "dag automaton without rank counts".to_string(),
            }),
        }
    }
}

impl DoubleArrayAc {
    /// Writes the dense scanner as a flat byte image.
    pub fn save<W: Write>(&self, mut w: W) -> Result<(), FsaError> {
        let (base, check, fail, offsets, output, pattern_lens) = self.blocks();
        let blocks = vec![
            u32s_to_block(base),
            u32s_to_block(check),
            u32s_to_block(fail),
            u32s_to_block(offsets),
            u32s_to_block(output),
            u32s_to_block(pattern_lens),
        ];
        let mut header = Header {
            kind: KIND_DA_AC,
            id_width: 4,
            flags: 0,
            n_states: self.num_states() as u64,
            n_words: self.num_patterns() as u64,
            zpath_states: 0,
            total_zpath_len: 0,
            checksum: 0,
            blocks: Vec::new(),
        };
        let image = assemble(&mut header, blocks)?;
        debug!(bytes = image.len(), "double-array image written");
        w.write_all(&image)?;
        Ok(())
    }

    /// Reads a dense scanner image.
    pub fn load<R: Read>(mut r: R) -> Result<Self, FsaError> {
        let mut image = Vec::new();
        r.read_to_end(&mut image)?;
        let header = Header::read(&image)?;
        if header.kind != KIND_DA_AC {
            return Err(FsaError::TypeMismatch {
                expected: "double-array scanner",
                found: kind_name(header.kind).to_string(),
            });
        }
        if header.blocks.len() != 6 {
            return Err(FsaError::CorruptData("unexpected block count"));
        }
        let slices = header.validate_blocks(&image)?;
        DoubleArrayAc::from_raw(
            block_to_u32s(slices[0])?,
            block_to_u32s(slices[1])?,
            block_to_u32s(slices[2])?,
            block_to_u32s(slices[3])?,
            block_to_u32s(slices[4])?,
            block_to_u32s(slices[5])?,
            header.n_states as u32,
        )
    }
}
