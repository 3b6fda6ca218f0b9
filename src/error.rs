//! Error type shared by patch parsing and application.

use crate::bps::checksum::ChecksumKind;
use crate::bps::decoder::Action;

/// Error raised while parsing or applying a BPS patch.
///
/// Every variant aborts the operation; nothing partially decoded or
/// partially written is handed back.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PatchError {
    /// The patch is not well formed: bad magic, truncation, a varint
    /// running past its boundary, or output sizes that do not add up.
    #[error("invalid patch at byte {offset}: {reason}")]
    Format { offset: u64, reason: String },

    /// A read or copy references bytes outside the buffer it addresses.
    #[error(
        "{action} at byte {offset} addresses {position}+{size}, outside the {limit}-byte buffer"
    )]
    OffsetOutOfRange {
        /// Byte offset of the instruction in the patch file.
        offset: u64,
        action: Action,
        /// Resolved (possibly negative) start position.
        position: i128,
        size: u64,
        /// Length of the addressed buffer.
        limit: u64,
    },

    /// A CRC-32 did not match.
    #[error("{kind} checksum mismatch: expected {expected:#010X}, got {actual:#010X}")]
    Integrity {
        kind: ChecksumKind,
        expected: u32,
        actual: u32,
    },

    /// The source buffer length differs from the size declared by the patch.
    #[error("source size mismatch: patch expects {expected} bytes, got {actual}")]
    SizeMismatch { expected: u64, actual: u64 },
}

/// Payload-free discriminant of [`PatchError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Format,
    OffsetOutOfRange,
    Integrity,
    SizeMismatch,
}

impl PatchError {
    pub(crate) fn format(offset: usize, reason: impl Into<String>) -> Self {
        Self::Format {
            offset: offset as u64,
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Format { .. } => ErrorKind::Format,
            Self::OffsetOutOfRange { .. } => ErrorKind::OffsetOutOfRange,
            Self::Integrity { .. } => ErrorKind::Integrity,
            Self::SizeMismatch { .. } => ErrorKind::SizeMismatch,
        }
    }

    /// Byte offset in the patch file where the problem was detected, if
    /// the error is tied to a location.
    pub fn offset(&self) -> Option<u64> {
        match self {
            Self::Format { offset, .. } | Self::OffsetOutOfRange { offset, .. } => Some(*offset),
            Self::Integrity { .. } | Self::SizeMismatch { .. } => None,
        }
    }
}
