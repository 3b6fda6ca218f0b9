//! Oxibps: BPS binary patch decoding and application in Rust.
//!
//! The crate provides:
//! - The BPS format decoder and applier (`bps`)
//! - The shared error type (`error`)
//! - File-oriented helpers (`io`)
//! - An optional CLI (`cli` feature)
//!
//! # Quick Start
//!
//! ```no_run
//! use oxibps::bps::{PatchFile, Verify};
//!
//! let patch = PatchFile::parse(std::fs::read("fix.bps").unwrap()).unwrap();
//! let source = std::fs::read("original.bin").unwrap();
//! let target = patch.apply_with(&source, Verify::STRICT).unwrap();
//! assert_eq!(target.len() as u64, patch.target_size());
//! ```

pub mod bps;
pub mod error;
pub mod io;

#[cfg(feature = "cli")]
pub mod cli;

pub use bps::{PatchFile, PatchOptions, Verify};
pub use error::{ErrorKind, PatchError};
