#![no_main]
use libfuzzer_sys::fuzz_target;
use oxibps::bps::varint::{MAX_VARINT_LEN, encode_u64, read_i64, read_u64};

fuzz_target!(|data: &[u8]| {
    // Any value that decodes must re-encode to exactly the bytes consumed.
    if let Ok((value, len)) = read_u64(data) {
        let mut buf = [0u8; MAX_VARINT_LEN];
        let n = encode_u64(value, &mut buf);
        assert_eq!(&buf[..n], &data[..len]);
    }
    let _ = read_i64(data);
});
