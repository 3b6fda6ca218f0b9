// BPS header and footer parsing.
//
// Layout:
//   "BPS1" | source_size | target_size | metadata_size | metadata
//   | instruction stream ... | source_crc | target_crc | file_crc
//
// Sizes are varints; the three CRCs are 4-byte little-endian. The file
// CRC covers every byte before itself.

use std::ops::Range;

use super::checksum::{self, ChecksumKind};
use super::varint;
use crate::error::PatchError;

pub const BPS_MAGIC: [u8; 4] = *b"BPS1";

/// source_crc + target_crc + file_crc.
pub const FOOTER_LEN: usize = 12;

/// Magic, three single-byte varints and the footer.
pub const MIN_PATCH_LEN: usize = BPS_MAGIC.len() + 3 + FOOTER_LEN;

// ---------------------------------------------------------------------------
// Header
// ---------------------------------------------------------------------------

/// Parsed fields between the magic and the instruction stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub source_size: u64,
    pub target_size: u64,
    /// Byte span of the opaque metadata block within the patch.
    pub metadata: Range<usize>,
    /// Offset of the first instruction.
    pub body_offset: usize,
    /// Offset of the footer; the instruction stream ends here.
    pub footer_offset: usize,
}

impl Header {
    /// Parse the header of `data`, which must already have passed
    /// [`check_envelope`].
    ///
    /// `max_target_size` rejects patches that would need an output buffer
    /// larger than the caller is willing to allocate.
    pub fn parse(data: &[u8], max_target_size: u64) -> Result<Self, PatchError> {
        let footer_offset = data
            .len()
            .checked_sub(FOOTER_LEN)
            .filter(|&end| end >= BPS_MAGIC.len())
            .ok_or_else(|| PatchError::format(data.len(), "truncated patch"))?;
        let bounded = &data[..footer_offset];
        let mut pos = BPS_MAGIC.len();

        let source_size = read_size(bounded, &mut pos, "source size")?;
        if usize::try_from(source_size).is_err() {
            return Err(PatchError::format(
                BPS_MAGIC.len(),
                format!("source size {source_size} does not fit in memory"),
            ));
        }

        let target_field = pos;
        let target_size = read_size(bounded, &mut pos, "target size")?;
        if target_size > max_target_size || usize::try_from(target_size).is_err() {
            return Err(PatchError::format(
                target_field,
                format!("target size {target_size} exceeds limit {max_target_size}"),
            ));
        }

        let metadata_field = pos;
        let metadata_size = read_size(bounded, &mut pos, "metadata size")?;
        let metadata_end = usize::try_from(metadata_size)
            .ok()
            .and_then(|len| pos.checked_add(len))
            .filter(|&end| end <= footer_offset)
            .ok_or_else(|| {
                PatchError::format(
                    metadata_field,
                    format!("metadata size {metadata_size} runs past the instruction stream"),
                )
            })?;

        Ok(Self {
            source_size,
            target_size,
            metadata: pos..metadata_end,
            body_offset: metadata_end,
            footer_offset,
        })
    }
}

fn read_size(bounded: &[u8], pos: &mut usize, what: &str) -> Result<u64, PatchError> {
    let (val, len) = varint::read_u64(&bounded[*pos..])
        .map_err(|e| PatchError::format(*pos, format!("{what}: {e}")))?;
    *pos += len;
    Ok(val)
}

// ---------------------------------------------------------------------------
// Footer
// ---------------------------------------------------------------------------

/// The three trailing checksums.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Footer {
    pub source_crc: u32,
    pub target_crc: u32,
    pub file_crc: u32,
}

impl Footer {
    /// Read the footer from the last [`FOOTER_LEN`] bytes of `data`.
    pub fn read(data: &[u8]) -> Result<Self, PatchError> {
        let Some((_, tail)) = data.split_last_chunk::<FOOTER_LEN>() else {
            return Err(PatchError::format(data.len(), "truncated footer"));
        };
        let word = |i: usize| u32::from_le_bytes([tail[i], tail[i + 1], tail[i + 2], tail[i + 3]]);
        Ok(Self {
            source_crc: word(0),
            target_crc: word(4),
            file_crc: word(8),
        })
    }
}

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// Validate length, magic and file checksum, returning the footer.
///
/// This runs before any varint is decoded so that a corrupted patch is
/// rejected as an integrity failure rather than as whatever malformed
/// structure the corruption happens to produce.
pub fn check_envelope(data: &[u8]) -> Result<Footer, PatchError> {
    if data.len() < MIN_PATCH_LEN {
        return Err(PatchError::format(
            data.len(),
            format!(
                "truncated patch: {} bytes, need at least {MIN_PATCH_LEN}",
                data.len()
            ),
        ));
    }
    if data[..BPS_MAGIC.len()] != BPS_MAGIC {
        return Err(PatchError::format(
            0,
            format!(
                "invalid BPS magic: expected {:02X?}, got {:02X?}",
                BPS_MAGIC,
                &data[..BPS_MAGIC.len()]
            ),
        ));
    }

    let footer = Footer::read(data)?;
    checksum::check(ChecksumKind::File, &data[..data.len() - 4], footer.file_crc)?;
    Ok(footer)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
