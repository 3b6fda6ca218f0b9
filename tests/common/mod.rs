// Shared helpers for integration tests and benches: a patch writer that
// emits raw BPS instructions, plus deterministic data generation.

#![allow(dead_code)]

use oxibps::bps::checksum::crc32;
use oxibps::bps::varint::{write_i64, write_u64};
use oxibps::bps::{Action, BPS_MAGIC};

/// Builds BPS patches instruction by instruction.
///
/// Offsets passed to the copy methods are absolute; the builder turns them
/// into deltas against its own running registers. `raw_*` methods write
/// exactly what they are given, which lets tests produce invalid streams.
pub struct PatchWriter {
    source: Vec<u8>,
    target: Vec<u8>,
    metadata: Vec<u8>,
    body: Vec<u8>,
    source_rel: i64,
    target_rel: i64,
    declared_target: Option<u64>,
}

impl PatchWriter {
    pub fn new(source: &[u8]) -> Self {
        Self {
            source: source.to_vec(),
            target: Vec::new(),
            metadata: Vec::new(),
            body: Vec::new(),
            source_rel: 0,
            target_rel: 0,
            declared_target: None,
        }
    }

    pub fn metadata(mut self, data: &[u8]) -> Self {
        self.metadata = data.to_vec();
        self
    }

    /// Override the target size written in the header.
    pub fn declare_target_size(mut self, size: u64) -> Self {
        self.declared_target = Some(size);
        self
    }

    pub fn raw_word(mut self, action: Action, size: u64) -> Self {
        write_u64(&mut self.body, ((size - 1) << 2) | action as u64).unwrap();
        self
    }

    pub fn raw_delta(mut self, delta: i64) -> Self {
        write_i64(&mut self.body, delta).unwrap();
        self
    }

    pub fn raw_bytes(mut self, bytes: &[u8]) -> Self {
        self.body.extend_from_slice(bytes);
        self
    }

    pub fn source_read(self, size: usize) -> Self {
        let mut this = self.raw_word(Action::SourceRead, size as u64);
        let at = this.target.len();
        let bytes = this.source[at..at + size].to_vec();
        this.target.extend_from_slice(&bytes);
        this
    }

    pub fn target_read(self, bytes: &[u8]) -> Self {
        let mut this = self
            .raw_word(Action::TargetRead, bytes.len() as u64)
            .raw_bytes(bytes);
        this.target.extend_from_slice(bytes);
        this
    }

    pub fn source_copy(self, offset: usize, size: usize) -> Self {
        let delta = offset as i64 - self.source_rel;
        let mut this = self
            .raw_word(Action::SourceCopy, size as u64)
            .raw_delta(delta);
        this.source_rel = (offset + size) as i64;
        let bytes = this.source[offset..offset + size].to_vec();
        this.target.extend_from_slice(&bytes);
        this
    }

    pub fn target_copy(self, offset: usize, size: usize) -> Self {
        let delta = offset as i64 - self.target_rel;
        let mut this = self
            .raw_word(Action::TargetCopy, size as u64)
            .raw_delta(delta);
        this.target_rel = (offset + size) as i64;
        for i in 0..size {
            let byte = this.target[offset + i];
            this.target.push(byte);
        }
        this
    }

    /// The target produced by the well-formed instructions so far.
    pub fn target(&self) -> &[u8] {
        &self.target
    }

    /// Serialize with correct checksums. Returns `(patch, target)`.
    pub fn finish(self) -> (Vec<u8>, Vec<u8>) {
        let target_size = self.declared_target.unwrap_or(self.target.len() as u64);
        let mut out = BPS_MAGIC.to_vec();
        write_u64(&mut out, self.source.len() as u64).unwrap();
        write_u64(&mut out, target_size).unwrap();
        write_u64(&mut out, self.metadata.len() as u64).unwrap();
        out.extend_from_slice(&self.metadata);
        out.extend_from_slice(&self.body);
        out.extend_from_slice(&crc32(&self.source).to_le_bytes());
        out.extend_from_slice(&crc32(&self.target).to_le_bytes());
        let file_crc = crc32(&out);
        out.extend_from_slice(&file_crc.to_le_bytes());
        (out, self.target)
    }
}

/// Recompute the trailing file CRC after a test mutated the patch body.
pub fn reseal(patch: &mut [u8]) {
    let n = patch.len() - 4;
    let crc = crc32(&patch[..n]);
    patch[n..].copy_from_slice(&crc.to_le_bytes());
}

/// Deterministic pseudo-random bytes (LCG).
pub fn gen_data(size: usize, seed: u64) -> Vec<u8> {
    let mut s = seed;
    let mut out = Vec::with_capacity(size);
    for _ in 0..size {
        s = s.wrapping_mul(6364136223846793005).wrapping_add(1);
        out.push((s >> 33) as u8);
    }
    out
}

/// A patch that rewrites every `stride`-th byte of `source` and appends a
/// repeated tail, exercising all four actions.
pub fn mutation_patch(source: &[u8], stride: usize) -> (Vec<u8>, Vec<u8>) {
    let stride = stride.max(2);
    let mut w = PatchWriter::new(source);
    let mut pos = 0;
    while pos + stride <= source.len() {
        w = w.source_read(stride - 1);
        let flipped = source[pos + stride - 1].wrapping_add(1);
        w = w.target_read(&[flipped]);
        pos += stride;
    }
    if pos < source.len() {
        w = w.source_copy(pos, source.len() - pos);
    }
    if !source.is_empty() {
        let tail = source.len().min(64);
        w = w.source_copy(0, tail);
        let len = w.target().len();
        w = w.target_copy(len - tail, tail);
    }
    w.finish()
}
