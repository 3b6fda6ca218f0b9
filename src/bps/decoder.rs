// BPS instruction stream decoder.
//
// Each instruction is one varint `n`: the low two bits select the action,
// `(n >> 2) + 1` is the payload size. TargetRead is followed by its literal
// bytes; SourceCopy and TargetCopy by a signed delta applied to their own
// running offset register. Offsets are resolved here, once, so that
// applying a decoded patch is plain copying.

use std::fmt;

use log::trace;

use super::header::Header;
use super::varint;
use crate::error::PatchError;

// ---------------------------------------------------------------------------
// Instructions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Action {
    /// Copy from source at the current output position.
    SourceRead = 0,
    /// Copy literal bytes embedded in the patch.
    TargetRead = 1,
    /// Copy from source at the source-relative register.
    SourceCopy = 2,
    /// Copy from already-produced target at the target-relative register.
    TargetCopy = 3,
}

impl Action {
    pub const ALL: [Action; 4] = [
        Action::SourceRead,
        Action::TargetRead,
        Action::SourceCopy,
        Action::TargetCopy,
    ];

    #[inline]
    fn from_word(word: u64) -> Self {
        match word & 3 {
            0 => Self::SourceRead,
            1 => Self::TargetRead,
            2 => Self::SourceCopy,
            _ => Self::TargetCopy,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::SourceRead => "SourceRead",
            Self::TargetRead => "TargetRead",
            Self::SourceCopy => "SourceCopy",
            Self::TargetCopy => "TargetCopy",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One decoded instruction with its offset resolved.
///
/// `offset` addresses the source for SourceRead/SourceCopy, the patch file
/// for TargetRead (start of the literal), and the target for TargetCopy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatchInstruction {
    pub action: Action,
    pub offset: u64,
    /// Payload length, always >= 1.
    pub size: u64,
}

impl fmt::Display for PatchInstruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:<10} offset={} size={}", self.action, self.offset, self.size)
    }
}

// ---------------------------------------------------------------------------
// Decode state
// ---------------------------------------------------------------------------

/// Running registers of the instruction stream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecodeState {
    /// Position of the next instruction in the patch file.
    pub cursor: usize,
    /// Bytes of target produced so far.
    pub output_pos: u64,
    /// Source-relative offset register.
    pub source_rel: i64,
    /// Target-relative offset register.
    pub target_rel: i64,
}

impl DecodeState {
    pub fn new(body_offset: usize) -> Self {
        Self {
            cursor: body_offset,
            ..Self::default()
        }
    }

    /// Decode the instruction at `cursor` and advance.
    ///
    /// On error the state is left untouched.
    pub fn step(&mut self, data: &[u8], header: &Header) -> Result<PatchInstruction, PatchError> {
        let stream = &data[..header.footer_offset];
        let start = self.cursor;

        let (word, len) = varint::read_u64(&stream[start..])
            .map_err(|e| PatchError::format(start, format!("instruction: {e}")))?;
        let mut cursor = start + len;
        let action = Action::from_word(word);
        let size = (word >> 2) + 1;

        let output_end = self
            .output_pos
            .checked_add(size)
            .filter(|&end| end <= header.target_size)
            .ok_or_else(|| {
                PatchError::format(
                    start,
                    format!(
                        "{action} of {size} bytes at output {} overruns target size {}",
                        self.output_pos, header.target_size
                    ),
                )
            })?;

        let out_of_range = |position: i128, limit: u64| PatchError::OffsetOutOfRange {
            offset: start as u64,
            action,
            position,
            size,
            limit,
        };

        let mut source_rel = self.source_rel;
        let mut target_rel = self.target_rel;

        let offset = match action {
            Action::SourceRead => {
                if output_end > header.source_size {
                    return Err(out_of_range(self.output_pos.into(), header.source_size));
                }
                self.output_pos
            }
            Action::TargetRead => {
                let literal = cursor;
                cursor = usize::try_from(size)
                    .ok()
                    .and_then(|size| literal.checked_add(size))
                    .filter(|&end| end <= header.footer_offset)
                    .ok_or_else(|| {
                        PatchError::format(
                            start,
                            format!("TargetRead literal of {size} bytes runs past the instruction stream"),
                        )
                    })?;
                literal as u64
            }
            Action::SourceCopy => {
                let (position, next, register) =
                    relative(stream, cursor, source_rel, size, header.source_size, false)
                        .map_err(|e| e.resolve(|pos| out_of_range(pos, header.source_size)))?;
                cursor = next;
                source_rel = register;
                position
            }
            Action::TargetCopy => {
                let (position, next, register) =
                    relative(stream, cursor, target_rel, size, header.target_size, true)
                        .map_err(|e| e.resolve(|pos| out_of_range(pos, header.target_size)))?;
                cursor = next;
                target_rel = register;
                position
            }
        };

        self.cursor = cursor;
        self.output_pos = output_end;
        self.source_rel = source_rel;
        self.target_rel = target_rel;

        Ok(PatchInstruction {
            action,
            offset,
            size,
        })
    }
}

enum RelativeError {
    Delta(PatchError),
    OutOfRange(i128),
}

impl RelativeError {
    fn resolve(self, out_of_range: impl FnOnce(i128) -> PatchError) -> PatchError {
        match self {
            Self::Delta(e) => e,
            Self::OutOfRange(pos) => out_of_range(pos),
        }
    }
}

/// Read the signed delta at `cursor`, apply it to `register` and
/// bounds-check a copy of `size` bytes against `limit`.
///
/// Returns `(position, next_cursor, next_register)`.
fn relative(
    stream: &[u8],
    cursor: usize,
    register: i64,
    size: u64,
    limit: u64,
    must_start_inside: bool,
) -> Result<(u64, usize, i64), RelativeError> {
    let (delta, len) = varint::read_i64(&stream[cursor..])
        .map_err(|e| RelativeError::Delta(PatchError::format(cursor, format!("copy delta: {e}"))))?;

    let position = i128::from(register) + i128::from(delta);
    let end = position + i128::from(size);
    let limit = i128::from(limit);
    if position < 0 || end > limit || (must_start_inside && position >= limit) {
        return Err(RelativeError::OutOfRange(position));
    }
    // end <= limit, but the register itself is signed.
    let register = i64::try_from(end).map_err(|_| RelativeError::OutOfRange(position))?;

    Ok((position as u64, cursor + len, register))
}

// ---------------------------------------------------------------------------
// Iterator
// ---------------------------------------------------------------------------

/// Iterate over the instructions of a patch whose envelope and header have
/// been validated.
///
/// Yields at most one error, after which iteration ends. Reaching the
/// footer with fewer output bytes than `target_size` is reported as a
/// final error.
pub struct InstructionIterator<'a> {
    data: &'a [u8],
    header: &'a Header,
    state: DecodeState,
    done: bool,
}

impl<'a> InstructionIterator<'a> {
    pub fn new(data: &'a [u8], header: &'a Header) -> Self {
        Self {
            data,
            header,
            state: DecodeState::new(header.body_offset),
            done: false,
        }
    }

    pub fn state(&self) -> &DecodeState {
        &self.state
    }
}

impl Iterator for InstructionIterator<'_> {
    type Item = Result<PatchInstruction, PatchError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        if self.state.cursor >= self.header.footer_offset {
            self.done = true;
            if self.state.output_pos != self.header.target_size {
                return Some(Err(PatchError::format(
                    self.header.footer_offset,
                    format!(
                        "instructions produce {} bytes, header declares {}",
                        self.state.output_pos, self.header.target_size
                    ),
                )));
            }
            return None;
        }

        match self.state.step(self.data, self.header) {
            Ok(inst) => {
                trace!("decoded {inst} (output now {})", self.state.output_pos);
                Some(Ok(inst))
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

/// Decode the whole instruction stream.
pub fn decode_instructions(
    data: &[u8],
    header: &Header,
) -> Result<Vec<PatchInstruction>, PatchError> {
    InstructionIterator::new(data, header).collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
