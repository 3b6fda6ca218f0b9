// Instruction replay.
//
// Works only on instructions produced by the decoder, whose offsets and
// sizes have already been bounds-checked against the source, the patch
// and the target; nothing here re-validates them.

use super::decoder::{Action, PatchInstruction};

/// Replay `instructions` against `source`, producing a target of
/// `target_size` bytes.
///
/// `patch` is the full patch file; TargetRead offsets point into it.
pub fn apply_instructions(
    patch: &[u8],
    instructions: &[PatchInstruction],
    source: &[u8],
    target_size: usize,
) -> Vec<u8> {
    let mut target = vec![0u8; target_size];
    let mut out = 0usize;

    for inst in instructions {
        let offset = inst.offset as usize;
        let size = inst.size as usize;
        let dst = out..out + size;

        match inst.action {
            Action::SourceRead => {
                debug_assert_eq!(offset, out);
                target[dst].copy_from_slice(&source[out..out + size]);
            }
            Action::TargetRead => {
                target[dst].copy_from_slice(&patch[offset..offset + size]);
            }
            Action::SourceCopy => {
                target[dst].copy_from_slice(&source[offset..offset + size]);
            }
            Action::TargetCopy => {
                // Strictly forward, one byte at a time: when the read range
                // overlaps the write range, bytes written earlier in this
                // copy are read back, replicating the pattern.
                for i in 0..size {
                    target[out + i] = target[offset + i];
                }
            }
        }

        out += size;
    }

    debug_assert_eq!(out, target_size);
    target
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inst(action: Action, offset: u64, size: u64) -> PatchInstruction {
        PatchInstruction {
            action,
            offset,
            size,
        }
    }

    #[test]
    fn source_read_passes_through() {
        let source = b"ABCDEF";
        let out = apply_instructions(&[], &[inst(Action::SourceRead, 0, 6)], source, 6);
        assert_eq!(out, source);
    }

    #[test]
    fn target_read_copies_from_patch() {
        let patch = b"....hello....";
        let out = apply_instructions(patch, &[inst(Action::TargetRead, 4, 5)], &[], 5);
        assert_eq!(out, b"hello");
    }

    #[test]
    fn source_copy_reads_anywhere_in_source() {
        let source = [0x00, 0x11, 0x22];
        let out = apply_instructions(
            &[],
            &[
                inst(Action::SourceRead, 0, 3),
                inst(Action::SourceCopy, 1, 2),
            ],
            &source,
            5,
        );
        assert_eq!(out, [0x00, 0x11, 0x22, 0x11, 0x22]);
    }

    #[test]
    fn overlapping_target_copy_replicates() {
        let out = apply_instructions(
            &[],
            &[
                inst(Action::SourceRead, 0, 1),
                inst(Action::TargetCopy, 0, 4),
            ],
            &[0x41],
            5,
        );
        assert_eq!(out, [0x41; 5]);
    }

    #[test]
    fn overlapping_target_copy_repeats_period() {
        let patch = b"xyz";
        let out = apply_instructions(
            patch,
            &[
                inst(Action::TargetRead, 0, 3),
                inst(Action::TargetCopy, 0, 7),
            ],
            &[],
            10,
        );
        assert_eq!(out, b"xyzxyzxyzx");
    }

    #[test]
    fn forward_target_copy_reads_unwritten_zeroes() {
        let out = apply_instructions(
            b"ab",
            &[
                inst(Action::TargetCopy, 2, 2),
                inst(Action::TargetRead, 0, 2),
            ],
            &[],
            4,
        );
        assert_eq!(out, [0, 0, b'a', b'b']);
    }
}
