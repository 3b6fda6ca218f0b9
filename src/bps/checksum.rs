// CRC-32 checks and verification levels.
//
// All three checksums in a BPS footer use CRC-32/ISO-HDLC (zlib, PNG).
// The file checksum is always verified when a patch is parsed; the source
// and target checksums are opt-in through `Verify`.

use std::fmt;

use bitflags::bitflags;

use crate::error::PatchError;

bitflags! {
    /// Which buffer checksums to verify when applying a patch.
    ///
    /// The empty set verifies only the file checksum, which is always
    /// checked at parse time.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Verify: u8 {
        /// Check the source buffer against `source_crc` before applying.
        const SOURCE = 1 << 0;
        /// Check the produced target against `target_crc`.
        const TARGET = 1 << 1;
        const STRICT = Self::SOURCE.bits() | Self::TARGET.bits();
    }
}

/// Which checksum a mismatch refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChecksumKind {
    File,
    Source,
    Target,
}

impl fmt::Display for ChecksumKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::File => "file",
            Self::Source => "source",
            Self::Target => "target",
        })
    }
}

#[inline]
pub fn crc32(data: &[u8]) -> u32 {
    crc32fast::hash(data)
}

/// Compare the CRC-32 of `data` with `expected`.
pub fn check(kind: ChecksumKind, data: &[u8], expected: u32) -> Result<(), PatchError> {
    let actual = crc32(data);
    if actual != expected {
        return Err(PatchError::Integrity {
            kind,
            expected,
            actual,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crc32_matches_iso_hdlc_check_value() {
        assert_eq!(crc32(b"123456789"), 0xCBF4_3926);
        assert_eq!(crc32(b""), 0);
    }

    #[test]
    fn check_reports_both_values() {
        assert!(check(ChecksumKind::Source, b"123456789", 0xCBF4_3926).is_ok());
        let err = check(ChecksumKind::Target, b"123456789", 7).unwrap_err();
        assert_eq!(
            err,
            PatchError::Integrity {
                kind: ChecksumKind::Target,
                expected: 7,
                actual: 0xCBF4_3926,
            }
        );
    }

    #[test]
    fn default_verifies_nothing_beyond_file() {
        let v = Verify::default();
        assert!(v.is_empty());
        assert!(Verify::STRICT.contains(Verify::SOURCE | Verify::TARGET));
    }
}
