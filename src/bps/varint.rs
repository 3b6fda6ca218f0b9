// BPS variable-length integer encoding.
//
// Little-endian groups of 7 bits. The final byte has bit 7 SET (the
// opposite of LEB128), and every continuation adds the next shift value
// into the result, so each encoded length covers its own value range
// with no redundant encodings:
//
//   [0x80]       = 0      [0xFF]       = 127
//   [0x00, 0x80] = 128    [0x7F, 0xFF] = 16511

use std::io::{self, Write};

/// Maximum encoded length for a 64-bit value (ceil(64/7) = 10).
pub const MAX_VARINT_LEN: usize = 10;

// ---------------------------------------------------------------------------
// Decoding from byte slices
// ---------------------------------------------------------------------------

/// Decode an unsigned varint from the front of `data`.
/// Returns `(value, bytes_consumed)`.
///
/// `data` must end at the boundary the integer may not cross; reaching
/// the end of the slice before a terminating byte is `Underflow`.
pub fn read_u64(data: &[u8]) -> Result<(u64, usize), VarIntError> {
    let mut num: u64 = 0;
    let mut shift: u64 = 1;
    for (i, &byte) in data.iter().enumerate() {
        let part = u64::from(byte & 0x7F)
            .checked_mul(shift)
            .ok_or(VarIntError::Overflow)?;
        num = num.checked_add(part).ok_or(VarIntError::Overflow)?;
        if byte & 0x80 != 0 {
            return Ok((num, i + 1));
        }
        shift = shift.checked_mul(0x80).ok_or(VarIntError::Overflow)?;
        num = num.checked_add(shift).ok_or(VarIntError::Overflow)?;
    }
    Err(VarIntError::Underflow)
}

/// Decode a signed varint: an unsigned varint whose low bit is the sign
/// (1 = negative) and whose remaining bits are the magnitude.
pub fn read_i64(data: &[u8]) -> Result<(i64, usize), VarIntError> {
    let (raw, len) = read_u64(data)?;
    // raw >> 1 is at most i64::MAX.
    let magnitude = (raw >> 1) as i64;
    let value = if raw & 1 != 0 { -magnitude } else { magnitude };
    Ok((value, len))
}

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

/// Encode a `u64` into `buf`, returning the number of bytes written.
/// The encoding occupies `buf[..len]`.
#[inline]
pub fn encode_u64(mut num: u64, buf: &mut [u8; MAX_VARINT_LEN]) -> usize {
    let mut i = 0;
    loop {
        let low = (num & 0x7F) as u8;
        num >>= 7;
        if num == 0 {
            buf[i] = low | 0x80;
            return i + 1;
        }
        buf[i] = low;
        i += 1;
        num -= 1;
    }
}

/// Encode a signed value as `(|v| << 1) | sign`.
///
/// `i64::MIN` has no representable magnitude and encodes as
/// `-i64::MAX`.
#[inline]
pub fn encode_i64(num: i64, buf: &mut [u8; MAX_VARINT_LEN]) -> usize {
    encode_u64(zigzag(num), buf)
}

/// Encode a `u64` and write it to a `Write` sink.
pub fn write_u64<W: Write>(w: &mut W, num: u64) -> io::Result<()> {
    let mut buf = [0u8; MAX_VARINT_LEN];
    let len = encode_u64(num, &mut buf);
    w.write_all(&buf[..len])
}

/// Encode a signed value and write it to a `Write` sink.
pub fn write_i64<W: Write>(w: &mut W, num: i64) -> io::Result<()> {
    let mut buf = [0u8; MAX_VARINT_LEN];
    let len = encode_i64(num, &mut buf);
    w.write_all(&buf[..len])
}

/// Return the encoded byte-length of a `u64` value.
pub fn sizeof_u64(mut num: u64) -> usize {
    let mut len = 1;
    while num >= 0x80 {
        num = (num >> 7) - 1;
        len += 1;
    }
    len
}

fn zigzag(num: i64) -> u64 {
    let magnitude = num.unsigned_abs().min(i64::MAX as u64);
    (magnitude << 1) | u64::from(num < 0)
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum VarIntError {
    /// The boundary was reached before a terminating byte.
    #[error("varint underflow (truncated input)")]
    Underflow,
    /// Value does not fit the target integer type.
    #[error("varint overflow")]
    Overflow,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(val: u64) -> Vec<u8> {
        let mut out = Vec::new();
        write_u64(&mut out, val).unwrap();
        out
    }

    #[test]
    fn roundtrip_power_of_128_boundaries() {
        let cases: &[u64] = &[
            0,
            1,
            126,
            127,
            128,
            16383,
            16384,
            16511,
            16512,
            2097151,
            2113663,
            2113664,
            u32::MAX as u64,
            u64::MAX - 1,
            u64::MAX,
        ];
        for &val in cases {
            let bytes = encode(val);
            let (decoded, consumed) = read_u64(&bytes).unwrap();
            assert_eq!(decoded, val, "roundtrip failed for {val}");
            assert_eq!(consumed, bytes.len(), "length mismatch for {val}");
            assert_eq!(sizeof_u64(val), bytes.len(), "sizeof mismatch for {val}");
        }
    }

    #[test]
    fn roundtrip_signed() {
        let cases: &[i64] = &[0, 1, -1, 63, -63, 64, -64, 1_000_000, -1_000_000, i64::MAX];
        let mut buf = [0u8; MAX_VARINT_LEN];
        for &val in cases {
            let len = encode_i64(val, &mut buf);
            let (decoded, consumed) = read_i64(&buf[..len]).unwrap();
            assert_eq!(decoded, val);
            assert_eq!(consumed, len);
        }
    }

    #[test]
    fn shift_accumulates_into_value() {
        assert_eq!(encode(0), [0x80]);
        assert_eq!(encode(127), [0xFF]);
        assert_eq!(encode(128), [0x00, 0x80]);
        assert_eq!(encode(16511), [0x7F, 0xFF]);
        assert_eq!(encode(16512), [0x00, 0x00, 0x80]);

        // A flat base-128 reading of [0x00, 0x80] would give 0.
        assert_eq!(read_u64(&[0x00, 0x80]), Ok((128, 2)));
        assert_eq!(read_u64(&[0x01, 0x81]), Ok((128 + 1 + 128, 2)));
    }

    #[test]
    fn negative_zero_decodes_as_zero() {
        assert_eq!(read_i64(&[0x81]), Ok((0, 1)));
    }

    #[test]
    fn trailing_bytes_are_not_consumed() {
        let (val, len) = read_u64(&[0x85, 0xFF, 0xFF]).unwrap();
        assert_eq!((val, len), (5, 1));
    }

    #[test]
    fn underflow_detection() {
        assert_eq!(read_u64(&[]), Err(VarIntError::Underflow));
        assert_eq!(read_u64(&[0x00, 0x00, 0x7F]), Err(VarIntError::Underflow));
    }

    #[test]
    fn overflow_detection() {
        let data = [0x7F; 11];
        let mut terminated = data.to_vec();
        terminated.push(0x80);
        assert_eq!(read_u64(&terminated), Err(VarIntError::Overflow));
    }

    #[test]
    fn signed_extremes() {
        let bytes = encode(u64::MAX);
        assert_eq!(read_i64(&bytes).map(|(v, _)| v), Ok(-i64::MAX));
        let bytes = encode(u64::MAX - 1);
        assert_eq!(read_i64(&bytes).map(|(v, _)| v), Ok(i64::MAX));
    }

    #[test]
    fn i64_min_saturates() {
        let mut buf = [0u8; MAX_VARINT_LEN];
        let len = encode_i64(i64::MIN, &mut buf);
        assert_eq!(read_i64(&buf[..len]), Ok((-i64::MAX, len)));
    }
}
