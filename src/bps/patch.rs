// Parsed BPS patch file.
//
// `PatchFile` owns the patch bytes (TargetRead literals are read from
// them at apply time) together with the decoded instruction list. It is
// immutable once built, so a single patch can be applied to any number of
// sources, concurrently if need be.

use std::ops::Range;

use log::debug;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use super::apply::apply_instructions;
use super::checksum::{self, ChecksumKind, Verify};
use super::decoder::{Action, PatchInstruction, decode_instructions};
use super::header::{Header, check_envelope};
use crate::error::PatchError;

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Largest target a patch may declare by default (1 GiB).
pub const DEFAULT_MAX_TARGET_SIZE: u64 = 1 << 30;

/// Configuration for parsing and applying patches.
#[derive(Debug, Clone)]
pub struct PatchOptions {
    /// Buffer checksums verified by [`PatchFile::apply`].
    pub verify: Verify,
    /// Reject patches whose declared target is larger than this.
    pub max_target_size: u64,
}

impl Default for PatchOptions {
    fn default() -> Self {
        Self {
            verify: Verify::empty(),
            max_target_size: DEFAULT_MAX_TARGET_SIZE,
        }
    }
}

// ---------------------------------------------------------------------------
// PatchFile
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct PatchFile {
    data: Vec<u8>,
    header: Header,
    source_crc: u32,
    target_crc: u32,
    file_crc: u32,
    instructions: Vec<PatchInstruction>,
    verify: Verify,
}

/// Per-action instruction statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ActionCounts {
    pub instructions: u64,
    pub bytes: u64,
}

impl PatchFile {
    /// Parse a patch with default options.
    pub fn parse(data: Vec<u8>) -> Result<Self, PatchError> {
        Self::parse_with(data, &PatchOptions::default())
    }

    /// Parse a patch from a borrowed buffer (copies it).
    pub fn from_slice(data: &[u8]) -> Result<Self, PatchError> {
        Self::parse(data.to_vec())
    }

    /// Parse a patch, validating the file checksum and decoding every
    /// instruction.
    pub fn parse_with(data: Vec<u8>, opts: &PatchOptions) -> Result<Self, PatchError> {
        let footer = check_envelope(&data)?;
        let header = Header::parse(&data, opts.max_target_size)?;
        let instructions = decode_instructions(&data, &header)?;

        debug!(
            "parsed BPS patch: {} bytes, source {} -> target {}, {} instructions, {} bytes metadata",
            data.len(),
            header.source_size,
            header.target_size,
            instructions.len(),
            header.metadata.len()
        );

        Ok(Self {
            data,
            header,
            source_crc: footer.source_crc,
            target_crc: footer.target_crc,
            file_crc: footer.file_crc,
            instructions,
            verify: opts.verify,
        })
    }

    pub fn source_size(&self) -> u64 {
        self.header.source_size
    }

    pub fn target_size(&self) -> u64 {
        self.header.target_size
    }

    /// Opaque metadata block, verbatim.
    pub fn metadata(&self) -> &[u8] {
        &self.data[self.header.metadata.clone()]
    }

    /// Byte span of the metadata within the patch file.
    pub fn metadata_range(&self) -> Range<usize> {
        self.header.metadata.clone()
    }

    /// Expected CRC-32 of the original source.
    pub fn source_crc(&self) -> u32 {
        self.source_crc
    }

    /// Expected CRC-32 of the produced target.
    pub fn target_crc(&self) -> u32 {
        self.target_crc
    }

    pub fn file_crc(&self) -> u32 {
        self.file_crc
    }

    /// Decoded instructions in execution order.
    pub fn instructions(&self) -> &[PatchInstruction] {
        &self.instructions
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    /// The raw patch file.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Verification level used by [`apply`](Self::apply).
    pub fn verify(&self) -> Verify {
        self.verify
    }

    // -----------------------------------------------------------------------
    // Apply
    // -----------------------------------------------------------------------

    /// Apply the patch to `source` at the configured verification level.
    pub fn apply(&self, source: &[u8]) -> Result<Vec<u8>, PatchError> {
        self.apply_with(source, self.verify)
    }

    /// Apply the patch to `source`, verifying the buffer checksums named by
    /// `verify`.
    ///
    /// A source of the wrong length fails before any allocation.
    pub fn apply_with(&self, source: &[u8], verify: Verify) -> Result<Vec<u8>, PatchError> {
        if source.len() as u64 != self.header.source_size {
            return Err(PatchError::SizeMismatch {
                expected: self.header.source_size,
                actual: source.len() as u64,
            });
        }
        if verify.contains(Verify::SOURCE) {
            checksum::check(ChecksumKind::Source, source, self.source_crc)?;
        }

        // Header::parse guarantees target_size fits in usize.
        let target = apply_instructions(
            &self.data,
            &self.instructions,
            source,
            self.header.target_size as usize,
        );

        if verify.contains(Verify::TARGET) {
            checksum::check(ChecksumKind::Target, &target, self.target_crc)?;
        }

        debug!(
            "applied BPS patch: {} instructions, {} bytes out",
            self.instructions.len(),
            target.len()
        );
        Ok(target)
    }

    /// Apply the patch to each of `sources`, returning results in input
    /// order. Runs on the rayon pool with the `parallel` feature.
    pub fn apply_batch(
        &self,
        sources: &[&[u8]],
        verify: Verify,
    ) -> Vec<Result<Vec<u8>, PatchError>> {
        #[cfg(feature = "parallel")]
        {
            sources
                .par_iter()
                .map(|source| self.apply_with(source, verify))
                .collect()
        }
        #[cfg(not(feature = "parallel"))]
        {
            sources
                .iter()
                .map(|source| self.apply_with(source, verify))
                .collect()
        }
    }

    // -----------------------------------------------------------------------
    // Inspection
    // -----------------------------------------------------------------------

    /// Target ranges that differ from a straight pass-through of the source.
    ///
    /// SourceRead, and SourceCopy from the same position it writes to, keep
    /// bytes in place; every other instruction marks its output range as
    /// modified. Adjacent modified ranges are merged.
    pub fn modified_ranges(&self) -> Vec<Range<u64>> {
        let mut ranges = Vec::new();
        let mut out = 0u64;
        let mut open: Option<u64> = None;

        for inst in &self.instructions {
            let in_place = match inst.action {
                Action::SourceRead => true,
                Action::SourceCopy => inst.offset == out,
                Action::TargetRead | Action::TargetCopy => false,
            };
            match (in_place, open) {
                (true, Some(start)) => {
                    ranges.push(start..out);
                    open = None;
                }
                (false, None) => open = Some(out),
                _ => {}
            }
            out += inst.size;
        }

        if let Some(start) = open {
            ranges.push(start..out);
        }
        ranges
    }

    /// Instruction count and payload bytes per action, indexed by
    /// `Action as usize`.
    pub fn instruction_counts(&self) -> [ActionCounts; 4] {
        let mut counts = [ActionCounts::default(); 4];
        for inst in &self.instructions {
            let c = &mut counts[inst.action as usize];
            c.instructions += 1;
            c.bytes += inst.size;
        }
        counts
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
