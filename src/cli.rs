// Command-line interface for Oxibps.
//
// Subcommands apply a patch, describe it, list its instructions, or check
// its checksums against files on disk.

use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};
use std::process;

use clap::{ArgAction, Args, Parser, Subcommand, ValueHint};
use log::info;

use crate::bps::checksum::{self, ChecksumKind};
use crate::bps::{Action, DEFAULT_MAX_TARGET_SIZE, PatchFile, PatchOptions, Verify};
use crate::error::PatchError;
use crate::io::{self as file_io, ApplyStats};

const BUF_SIZE: usize = 64 * 1024;

// ---------------------------------------------------------------------------
// Byte size parsing (supports K, M, G suffixes)
// ---------------------------------------------------------------------------

fn parse_byte_size(s: &str) -> Result<u64, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty size string".into());
    }
    let (num_part, multiplier) = match s.as_bytes().last() {
        Some(b'k' | b'K') => (&s[..s.len() - 1], 1024u64),
        Some(b'm' | b'M') => (&s[..s.len() - 1], 1024 * 1024),
        Some(b'g' | b'G') => (&s[..s.len() - 1], 1024 * 1024 * 1024),
        _ => (s, 1u64),
    };
    let num: u64 = num_part
        .trim()
        .parse()
        .map_err(|e| format!("invalid size '{s}': {e}"))?;
    num.checked_mul(multiplier)
        .ok_or_else(|| format!("size overflow: '{s}'"))
}

// ---------------------------------------------------------------------------
// Clap CLI definition
// ---------------------------------------------------------------------------

/// BPS binary patch applier.
#[derive(Parser, Debug)]
#[command(
    name = "oxibps",
    version,
    about = "BPS binary patch applier",
    arg_required_else_help = true
)]
struct Cli {
    #[command(subcommand)]
    command: Cmd,

    /// Force overwrite existing output files.
    #[arg(short = 'f', long, global = true)]
    force: bool,

    /// Quiet mode (suppress non-error output).
    #[arg(short = 'q', long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// Verbose mode (use multiple times for more detail).
    #[arg(short = 'v', long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Output stats as JSON to stderr.
    #[arg(long = "json", global = true)]
    json_output: bool,

    /// Largest target a patch may declare (supports K/M/G suffix).
    #[arg(long = "max-target-size", global = true, value_parser = parse_byte_size, default_value_t = DEFAULT_MAX_TARGET_SIZE)]
    max_target_size: u64,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Apply a patch to a source file.
    Apply(ApplyArgs),
    /// Print header, checksums and a summary of a patch.
    Info(PrintArgs),
    /// Print every decoded instruction of a patch.
    Instructions(PrintArgs),
    /// Check a patch's checksums, and optionally source/target files.
    Verify(VerifyArgs),
    /// Print build/configuration details.
    Config,
}

#[derive(Args, Debug)]
struct ApplyArgs {
    /// Source file the patch was made against.
    #[arg(long, short = 's', value_hint = ValueHint::FilePath)]
    source: PathBuf,

    /// Patch file.
    #[arg(long, value_hint = ValueHint::FilePath, conflicts_with = "input_pos")]
    input: Option<PathBuf>,

    /// Output file (default: stdout).
    #[arg(long, value_hint = ValueHint::FilePath, conflicts_with = "output_pos")]
    output: Option<PathBuf>,

    /// Write output to stdout.
    #[arg(short = 'c', long)]
    stdout: bool,

    /// Check/compute only (do not write output).
    #[arg(long = "check-only")]
    no_output: bool,

    /// Verify the source CRC-32 before applying.
    #[arg(long = "verify-source")]
    verify_source: bool,

    /// Verify the target CRC-32 after applying.
    #[arg(long = "verify-target")]
    verify_target: bool,

    /// Verify both source and target CRC-32.
    #[arg(long)]
    strict: bool,

    /// Patch file (positional form).
    #[arg(value_hint = ValueHint::FilePath)]
    input_pos: Option<PathBuf>,

    /// Output file (positional form).
    #[arg(value_hint = ValueHint::FilePath)]
    output_pos: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct PrintArgs {
    /// BPS patch file.
    #[arg(value_hint = ValueHint::FilePath)]
    input: PathBuf,
}

#[derive(Args, Debug)]
struct VerifyArgs {
    /// BPS patch file.
    #[arg(value_hint = ValueHint::FilePath)]
    input: PathBuf,

    /// Source file to check against the patch's source size and CRC-32.
    #[arg(long, short = 's', value_hint = ValueHint::FilePath)]
    source: Option<PathBuf>,

    /// Target file to check against the patch's target size and CRC-32.
    #[arg(long, short = 't', value_hint = ValueHint::FilePath)]
    target: Option<PathBuf>,
}

// ---------------------------------------------------------------------------
// Resolved command + options (flattened from Cli)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Apply,
    Info,
    Instructions,
    Verify,
    Config,
}

struct Options {
    command: Command,
    use_stdout: bool,
    force: bool,
    quiet: bool,
    verbose: u8,
    no_output: bool,
    verify: Verify,
    max_target_size: u64,
    source_file: Option<PathBuf>,
    input_file: Option<PathBuf>,
    output_file: Option<PathBuf>,
    target_file: Option<PathBuf>,
    json_output: bool,
}

impl Options {
    fn base(command: Command, cli: &Cli) -> Self {
        Self {
            command,
            use_stdout: false,
            force: cli.force,
            quiet: cli.quiet,
            verbose: cli.verbose.min(2),
            no_output: false,
            verify: Verify::empty(),
            max_target_size: cli.max_target_size,
            source_file: None,
            input_file: None,
            output_file: None,
            target_file: None,
            json_output: cli.json_output,
        }
    }

    fn patch_options(&self) -> PatchOptions {
        PatchOptions {
            verify: self.verify,
            max_target_size: self.max_target_size,
        }
    }
}

fn resolve_options(cli: Cli) -> Options {
    match cli.command {
        Cmd::Apply(ref args) => {
            let mut verify = Verify::empty();
            if args.verify_source || args.strict {
                verify |= Verify::SOURCE;
            }
            if args.verify_target || args.strict {
                verify |= Verify::TARGET;
            }
            Options {
                use_stdout: args.stdout,
                no_output: args.no_output,
                verify,
                source_file: Some(args.source.clone()),
                input_file: args.input.clone().or(args.input_pos.clone()),
                output_file: args.output.clone().or(args.output_pos.clone()),
                ..Options::base(Command::Apply, &cli)
            }
        }
        Cmd::Info(ref args) => Options {
            input_file: Some(args.input.clone()),
            ..Options::base(Command::Info, &cli)
        },
        Cmd::Instructions(ref args) => Options {
            input_file: Some(args.input.clone()),
            ..Options::base(Command::Instructions, &cli)
        },
        Cmd::Verify(ref args) => Options {
            input_file: Some(args.input.clone()),
            source_file: args.source.clone(),
            target_file: args.target.clone(),
            ..Options::base(Command::Verify, &cli)
        },
        Cmd::Config => Options::base(Command::Config, &cli),
    }
}

#[cfg(any(test, feature = "fuzzing"))]
pub fn fuzz_try_parse_args(args: &[String]) {
    let argv: Vec<String> = std::iter::once("oxibps".to_string())
        .chain(args.iter().cloned())
        .collect();
    if let Ok(cli) = Cli::try_parse_from(argv) {
        let _ = resolve_options(cli);
    }
}

fn print_json(value: &serde_json::Value) {
    if let Ok(s) = serde_json::to_string_pretty(value) {
        eprintln!("{s}");
    }
}

fn load_patch(opts: &Options) -> Result<(PathBuf, PatchFile), i32> {
    let Some(path) = opts.input_file.clone() else {
        eprintln!("oxibps: a patch file is required");
        return Err(1);
    };
    match file_io::read_patch(&path, &opts.patch_options()) {
        Ok(patch) => Ok((path, patch)),
        Err(e) => {
            eprintln!("oxibps: {}: {e}", path.display());
            Err(1)
        }
    }
}

// ---------------------------------------------------------------------------
// Config command
// ---------------------------------------------------------------------------

fn cmd_config() -> i32 {
    let version = env!("CARGO_PKG_VERSION");
    eprintln!("oxibps version {version} (Rust), Copyright (C) oxibps contributors");
    eprintln!("Licensed under the MIT License");

    let file_io = cfg!(feature = "file-io") as u8;
    let parallel = cfg!(feature = "parallel") as u8;
    let ptr_size = std::mem::size_of::<*const ()>();

    eprintln!("FILE_IO={file_io}");
    eprintln!("PARALLEL={parallel}");
    eprintln!("DEFAULT_MAX_TARGET_SIZE={DEFAULT_MAX_TARGET_SIZE}");
    eprintln!("sizeof(usize)={ptr_size}");

    0
}

// ---------------------------------------------------------------------------
// Apply command
// ---------------------------------------------------------------------------

fn cmd_apply(opts: &Options) -> i32 {
    let Some(source_path) = opts.source_file.as_deref() else {
        eprintln!("oxibps: apply requires --source");
        return 1;
    };
    let Some(patch_path) = opts.input_file.as_deref() else {
        eprintln!("oxibps: apply requires a patch file");
        return 1;
    };
    let patch_opts = opts.patch_options();

    info!(
        "applying {} to {}",
        patch_path.display(),
        source_path.display()
    );

    let result = if opts.no_output {
        file_io::apply_to_writer(source_path, patch_path, &mut io::sink(), &patch_opts)
    } else {
        match (opts.use_stdout, opts.output_file.as_deref()) {
            (false, Some(path)) => {
                if path.exists() && !opts.force {
                    eprintln!(
                        "oxibps: output file exists, use -f to overwrite: {}",
                        path.display()
                    );
                    return 1;
                }
                file_io::apply_file(source_path, patch_path, path, &patch_opts)
            }
            _ => {
                let mut out = BufWriter::with_capacity(BUF_SIZE, io::stdout().lock());
                file_io::apply_to_writer(source_path, patch_path, &mut out, &patch_opts)
            }
        }
    };

    match result {
        Ok(stats) => {
            report_apply(opts, &stats);
            0
        }
        Err(e) => {
            eprintln!("oxibps: apply error: {e}");
            1
        }
    }
}

fn report_apply(opts: &Options, stats: &ApplyStats) {
    let digest = stats.output_sha256.map(|d| file_io::hex(&d));
    if opts.verbose > 0 && !opts.quiet {
        eprintln!(
            "oxibps: applied {} instructions: source {} bytes, patch {} bytes, output {} bytes",
            stats.instructions, stats.source_size, stats.patch_size, stats.output_size
        );
        if let Some(ref hex) = digest {
            eprintln!("oxibps: output sha256: {hex}");
        }
    }
    if opts.json_output {
        print_json(&serde_json::json!({
            "command": "apply",
            "source_size": stats.source_size,
            "patch_size": stats.patch_size,
            "output_size": stats.output_size,
            "instructions": stats.instructions,
            "output_sha256": digest,
        }));
    }
}

// ---------------------------------------------------------------------------
// Print commands (info, instructions)
// ---------------------------------------------------------------------------

fn cmd_info(opts: &Options) -> i32 {
    let (_, patch) = match load_patch(opts) {
        Ok(p) => p,
        Err(code) => return code,
    };

    let counts = patch.instruction_counts();
    let ranges = patch.modified_ranges();
    let modified_bytes: u64 = ranges.iter().map(|r| r.end - r.start).sum();

    if !opts.quiet {
        println!("BPS patch size:               {}", patch.len());
        println!("BPS source size:              {}", patch.source_size());
        println!("BPS target size:              {}", patch.target_size());
        println!("BPS metadata size:            {}", patch.metadata().len());
        if !patch.metadata().is_empty() {
            let s = String::from_utf8_lossy(patch.metadata());
            println!("BPS metadata:                 {s}");
        }
        println!("BPS source CRC-32:            {:08X}", patch.source_crc());
        println!("BPS target CRC-32:            {:08X}", patch.target_crc());
        println!("BPS file CRC-32:              {:08X}", patch.file_crc());
        println!("BPS instructions:             {}", patch.instructions().len());
        for action in Action::ALL {
            let c = counts[action as usize];
            println!(
                "  {:<28}{} instructions, {} bytes",
                format!("{action}:"),
                c.instructions,
                c.bytes
            );
        }
        println!(
            "BPS modified ranges:          {} ({modified_bytes} bytes)",
            ranges.len()
        );
        if opts.verbose > 0 {
            for r in &ranges {
                println!("  {:#010X}..{:#010X}", r.start, r.end);
            }
        }
    }

    if opts.json_output {
        let by_action: serde_json::Map<String, serde_json::Value> = Action::ALL
            .iter()
            .map(|&action| {
                let c = counts[action as usize];
                (
                    action.name().to_string(),
                    serde_json::json!({ "instructions": c.instructions, "bytes": c.bytes }),
                )
            })
            .collect();
        print_json(&serde_json::json!({
            "command": "info",
            "patch_size": patch.len(),
            "source_size": patch.source_size(),
            "target_size": patch.target_size(),
            "metadata_size": patch.metadata().len(),
            "source_crc": patch.source_crc(),
            "target_crc": patch.target_crc(),
            "file_crc": patch.file_crc(),
            "instructions": patch.instructions().len(),
            "actions": by_action,
            "modified_ranges": ranges.len(),
            "modified_bytes": modified_bytes,
        }));
    }

    0
}

fn cmd_instructions(opts: &Options) -> i32 {
    let (_, patch) = match load_patch(opts) {
        Ok(p) => p,
        Err(code) => return code,
    };

    println!("  Index  Output      Instruction");
    let mut out = 0u64;
    for (i, inst) in patch.instructions().iter().enumerate() {
        println!("{i:>7}  {out:<10}  {inst}");
        out += inst.size;
    }
    0
}

// ---------------------------------------------------------------------------
// Verify command
// ---------------------------------------------------------------------------

fn check_file(
    path: &Path,
    kind: ChecksumKind,
    expected_size: u64,
    expected_crc: u32,
) -> Result<(), String> {
    let data = std::fs::read(path).map_err(|e| format!("{}: {e}", path.display()))?;
    if data.len() as u64 != expected_size {
        return Err(format!(
            "{kind} size mismatch: patch expects {expected_size} bytes, got {}",
            data.len()
        ));
    }
    checksum::check(kind, &data, expected_crc).map_err(|e: PatchError| e.to_string())
}

fn cmd_verify(opts: &Options) -> i32 {
    let (path, patch) = match load_patch(opts) {
        Ok(p) => p,
        Err(code) => return code,
    };
    if !opts.quiet {
        println!("{}: patch OK", path.display());
    }

    let mut failures = 0;
    let checks = [
        (
            opts.source_file.as_deref(),
            ChecksumKind::Source,
            patch.source_size(),
            patch.source_crc(),
        ),
        (
            opts.target_file.as_deref(),
            ChecksumKind::Target,
            patch.target_size(),
            patch.target_crc(),
        ),
    ];
    for (file, kind, size, crc) in checks {
        let Some(file) = file else { continue };
        match check_file(file, kind, size, crc) {
            Ok(()) => {
                if !opts.quiet {
                    println!("{}: {kind} OK", file.display());
                }
            }
            Err(msg) => {
                eprintln!("oxibps: {msg}");
                failures += 1;
            }
        }
    }

    if opts.json_output {
        print_json(&serde_json::json!({
            "command": "verify",
            "patch": path.display().to_string(),
            "failures": failures,
        }));
    }

    if failures == 0 { 0 } else { 1 }
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

pub fn run() -> ! {
    let cli = Cli::parse();
    let opts = resolve_options(cli);

    let default_filter = match opts.verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp(None)
        .format_target(false)
        .init();

    if opts.use_stdout && !opts.quiet {
        if let Some(path) = &opts.output_file {
            eprintln!(
                "oxibps: warning: -c option overrides output filename: {}",
                path.display()
            );
        }
    }

    let exit_code = match opts.command {
        Command::Apply => cmd_apply(&opts),
        Command::Info => cmd_info(&opts),
        Command::Instructions => cmd_instructions(&opts),
        Command::Verify => cmd_verify(&opts),
        Command::Config => cmd_config(),
    };

    process::exit(exit_code);
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
