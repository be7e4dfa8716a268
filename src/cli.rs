//! Command-line interface.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::searcher::SearchMode;

/// Vanity key search for Nostr npub prefixes over secp256k1.
///
/// Patterns are prefixes over the Bech32 data alphabet
/// `qpzry9x8gf2tvdw0s3jn54khce6mua7l`, optionally written with the
/// leading `npub`/`npub1`. `?` matches one character, a trailing `*`
/// matches the rest.
#[derive(Parser, Debug, Clone)]
#[command(name = "npubgrind", version, about)]
pub struct Args {
    /// Patterns to search for (e.g. `npub1dead`, `ace?`, `qqq*`)
    #[arg(required = true, value_name = "PATTERN")]
    pub patterns: Vec<String>,

    /// Worker threads (default: all cores)
    #[arg(short = 't', long, value_name = "N")]
    pub threads: Option<usize>,

    /// Compression mode for the legacy hash paths / reported WIF
    #[arg(short = 'm', long, value_enum, default_value = "compressed")]
    pub mode: CliMode,

    /// Stop once every pattern has been found
    #[arg(short = 's', long)]
    pub stop_on_find: bool,

    /// Rekey every N million keys with fresh random base keys
    #[arg(long, value_name = "N", default_value_t = 0)]
    pub rekey: u64,

    /// Accelerator hit-buffer capacity
    #[arg(long, value_name = "N", default_value_t = 65536)]
    pub max_found: u32,

    /// Seed for the start key (default: process-local entropy)
    #[arg(long)]
    pub seed: Option<String>,

    /// SEC1 public key (hex); candidates become P + start_pub and reported
    /// keys are partial
    #[arg(long, value_name = "HEX")]
    pub start_pub: Option<String>,

    /// Write hit records to this file instead of stdout
    #[arg(short = 'o', long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Use an accelerator if one is available (falls back to CPU)
    #[arg(long)]
    pub gpu: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CliMode {
    Compressed,
    Uncompressed,
    Both,
}

impl From<CliMode> for SearchMode {
    fn from(mode: CliMode) -> Self {
        match mode {
            CliMode::Compressed => SearchMode::Compressed,
            CliMode::Uncompressed => SearchMode::Uncompressed,
            CliMode::Both => SearchMode::Both,
        }
    }
}
