// BPS patch format.
//
// # Modules
//
// - `varint`   — Variable-length integers with shift accumulation
// - `header`   — Magic, size fields, metadata span and CRC footer
// - `checksum` — CRC-32 and the `Verify` levels
// - `decoder`  — Instruction stream decoding with running offset registers
// - `apply`    — Instruction replay against a source buffer
// - `patch`    — `PatchFile`: parse once, apply many times

pub mod apply;
pub mod checksum;
pub mod decoder;
pub mod header;
pub mod patch;
pub mod varint;

#[cfg(test)]
pub(crate) mod test_support;

// Re-export key types for convenience.
pub use checksum::{ChecksumKind, Verify};
pub use decoder::{Action, DecodeState, InstructionIterator, PatchInstruction};
pub use header::{BPS_MAGIC, Footer, Header};
pub use patch::{ActionCounts, DEFAULT_MAX_TARGET_SIZE, PatchFile, PatchOptions};
