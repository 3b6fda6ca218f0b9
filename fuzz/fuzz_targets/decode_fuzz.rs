#![no_main]
use libfuzzer_sys::fuzz_target;
use oxibps::bps::checksum::crc32;
use oxibps::bps::{PatchFile, Verify};

fuzz_target!(|data: &[u8]| {
    // Parsing and applying must never panic, only return errors.
    let _ = PatchFile::from_slice(data);

    // Most inputs die at the file checksum. Reseal them so the header and
    // instruction decoder see the fuzzed bytes too.
    if data.len() < 2 {
        return;
    }
    let split = (data[0] as usize).min(data.len() - 1);
    let (source, body) = data[1..].split_at(split);
    let mut patch = b"BPS1".to_vec();
    patch.extend_from_slice(body);
    patch.extend_from_slice(&[0; 8]);
    let crc = crc32(&patch);
    patch.extend_from_slice(&crc.to_le_bytes());

    if let Ok(parsed) = PatchFile::parse(patch) {
        if let Ok(out) = parsed.apply_with(source, Verify::empty()) {
            assert_eq!(out.len() as u64, parsed.target_size());
        }
    }
});
