// File-level I/O helpers for patch application.
//
// Provides `read_patch()`, `apply_to_writer()` and `apply_file()`. The
// source and patch are read fully into memory; output goes through a
// `BufWriter`. Optionally computes a SHA-256 of the written output
// (feature-gated behind `file-io`).

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

#[cfg(feature = "file-io")]
use sha2::Digest;

use crate::bps::{PatchFile, PatchOptions};
use crate::error::PatchError;

// ---------------------------------------------------------------------------
// Stats
// ---------------------------------------------------------------------------

/// Statistics returned by `apply_file()` and `apply_to_writer()`.
#[derive(Debug, Clone)]
pub struct ApplyStats {
    /// Source file size in bytes.
    pub source_size: u64,
    /// Patch file size in bytes.
    pub patch_size: u64,
    /// Written output size in bytes.
    pub output_size: u64,
    /// Number of decoded instructions.
    pub instructions: u64,
    /// SHA-256 of the output (if `file-io` feature is enabled).
    pub output_sha256: Option<[u8; 32]>,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Error type for file I/O operations.
#[derive(Debug, thiserror::Error)]
pub enum IoError {
    /// I/O error (file open, read, write).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// Patch parsing or application error.
    #[error("{0}")]
    Patch(#[from] PatchError),
}

const BUF_SIZE: usize = 64 * 1024; // 64 KiB

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

/// Read and parse a patch file.
pub fn read_patch(path: &Path, opts: &PatchOptions) -> Result<PatchFile, IoError> {
    let data = std::fs::read(path)?;
    Ok(PatchFile::parse_with(data, opts)?)
}

/// Apply the patch at `patch_path` to the file at `source_path`, writing
/// the target to `writer`.
///
/// Nothing is written unless the patch parses and applies successfully.
pub fn apply_to_writer<W: Write>(
    source_path: &Path,
    patch_path: &Path,
    writer: &mut W,
    opts: &PatchOptions,
) -> Result<ApplyStats, IoError> {
    let produced = produce(source_path, patch_path, opts)?;
    produced.write_to(writer)
}

/// Apply a patch file to a source file, writing the target to `output_path`.
///
/// The output file is only created once the target has been produced.
pub fn apply_file(
    source_path: &Path,
    patch_path: &Path,
    output_path: &Path,
    opts: &PatchOptions,
) -> Result<ApplyStats, IoError> {
    let produced = produce(source_path, patch_path, opts)?;
    let mut writer = BufWriter::with_capacity(BUF_SIZE, File::create(output_path)?);
    produced.write_to(&mut writer)
}

struct Produced {
    patch: PatchFile,
    source_size: u64,
    target: Vec<u8>,
}

fn produce(
    source_path: &Path,
    patch_path: &Path,
    opts: &PatchOptions,
) -> Result<Produced, IoError> {
    let patch = read_patch(patch_path, opts)?;
    let source = std::fs::read(source_path)?;
    let target = patch.apply(&source)?;
    Ok(Produced {
        patch,
        source_size: source.len() as u64,
        target,
    })
}

impl Produced {
    fn write_to<W: Write>(&self, writer: &mut W) -> Result<ApplyStats, IoError> {
        writer.write_all(&self.target)?;
        writer.flush()?;

        #[cfg(feature = "file-io")]
        let output_sha256 = Some(sha2::Sha256::digest(&self.target).into());
        #[cfg(not(feature = "file-io"))]
        let output_sha256: Option<[u8; 32]> = None;

        Ok(ApplyStats {
            source_size: self.source_size,
            patch_size: self.patch.len() as u64,
            output_size: self.target.len() as u64,
            instructions: self.patch.instructions().len() as u64,
            output_sha256,
        })
    }
}

/// Lower-case hex rendering of a digest.
pub fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
