// Test-only patch builder. Emits well-formed patches and simulates the
// target they produce.

use super::checksum::crc32;
use super::decoder::Action;
use super::header::BPS_MAGIC;
use super::varint::{write_i64, write_u64};

pub struct PatchBuilder {
    source: Vec<u8>,
    target: Vec<u8>,
    metadata: Vec<u8>,
    body: Vec<u8>,
    source_rel: i64,
    target_rel: i64,
    target_crc: Option<u32>,
}

impl PatchBuilder {
    pub fn new(source: &[u8]) -> Self {
        Self {
            source: source.to_vec(),
            target: Vec::new(),
            metadata: Vec::new(),
            body: Vec::new(),
            source_rel: 0,
            target_rel: 0,
            target_crc: None,
        }
    }

    fn word(&mut self, action: Action, size: usize) {
        write_u64(&mut self.body, ((size as u64 - 1) << 2) | action as u64).unwrap();
    }

    pub fn metadata(&mut self, data: &[u8]) -> &mut Self {
        self.metadata = data.to_vec();
        self
    }

    pub fn target_crc(&mut self, crc: u32) -> &mut Self {
        self.target_crc = Some(crc);
        self
    }

    pub fn source_read(&mut self, size: usize) -> &mut Self {
        self.word(Action::SourceRead, size);
        let at = self.target.len();
        self.target.extend_from_slice(&self.source[at..at + size]);
        self
    }

    pub fn target_read(&mut self, bytes: &[u8]) -> &mut Self {
        self.word(Action::TargetRead, bytes.len());
        self.body.extend_from_slice(bytes);
        self.target.extend_from_slice(bytes);
        self
    }

    pub fn source_copy(&mut self, offset: usize, size: usize) -> &mut Self {
        self.word(Action::SourceCopy, size);
        write_i64(&mut self.body, offset as i64 - self.source_rel).unwrap();
        self.source_rel = (offset + size) as i64;
        self.target.extend_from_slice(&self.source[offset..offset + size]);
        self
    }

    pub fn target_copy(&mut self, offset: usize, size: usize) -> &mut Self {
        self.word(Action::TargetCopy, size);
        write_i64(&mut self.body, offset as i64 - self.target_rel).unwrap();
        self.target_rel = (offset + size) as i64;
        for i in 0..size {
            let byte = self.target[offset + i];
            self.target.push(byte);
        }
        self
    }

    /// Return `(patch, expected_target)`.
    pub fn finish(&self) -> (Vec<u8>, Vec<u8>) {
        let mut out = BPS_MAGIC.to_vec();
        write_u64(&mut out, self.source.len() as u64).unwrap();
        write_u64(&mut out, self.target.len() as u64).unwrap();
        write_u64(&mut out, self.metadata.len() as u64).unwrap();
        out.extend_from_slice(&self.metadata);
        out.extend_from_slice(&self.body);
        out.extend_from_slice(&crc32(&self.source).to_le_bytes());
        let target_crc = self.target_crc.unwrap_or_else(|| crc32(&self.target));
        out.extend_from_slice(&target_crc.to_le_bytes());
        let file_crc = crc32(&out);
        out.extend_from_slice(&file_crc.to_le_bytes());
        (out, self.target.clone())
    }
}
