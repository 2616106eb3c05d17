//! Command-line interface definitions for dupelink.
//!
//! This module defines all CLI arguments, subcommands, and options using the clap derive API.
//! Global options (verbosity, color, config file) apply to every subcommand.
//!
//! # Example
//!
//! ```bash
//! # List duplicate groups under two trees
//! dupelink list ~/Music /mnt/backup/Music
//!
//! # List as JSON, ignoring files under 1 MiB
//! dupelink list ~/Downloads --min-size 1MiB --output json
//!
//! # Replace duplicates with hard links, keeping files with different owners apart
//! dupelink link ~/Photos --distinguish user,group
//!
//! # The same, with criterion letters run together
//! dupelink link ~/Photos -b ug
//!
//! # Replace duplicates with copy-on-write clones
//! dupelink -v link ~/src --kind clone
//! ```

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::actions::LinkKind;
use crate::duplicates::Criterion;

/// Find duplicate files and replace them with links.
///
/// dupelink compares files by size, then by BLAKE3 hashes of their leading
/// bytes and finally of their whole content, hashing only what it must.
#[derive(Debug, Parser)]
#[command(name = "dupelink")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase verbosity level (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    pub no_color: bool,

    /// Print errors as JSON on stderr
    #[arg(long, global = true)]
    pub json_errors: bool,

    /// Configuration file to use instead of the default location
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands for dupelink.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Report groups of duplicate files
    List(ListArgs),
    /// Replace duplicates with links to the first file of their group
    Link(LinkArgs),
}

impl Commands {
    /// Scan arguments shared by every subcommand.
    #[must_use]
    pub fn scan_args(&self) -> &ScanArgs {
        match self {
            Self::List(args) => &args.scan,
            Self::Link(args) => &args.scan,
        }
    }
}

/// Arguments controlling which files are compared and how.
#[derive(Debug, Clone, Args)]
pub struct ScanArgs {
    /// Directories to search for duplicates
    #[arg(value_name = "PATH", required = true)]
    pub paths: Vec<PathBuf>,

    /// Minimum file size to consider (e.g., 4K, 1M, 2G)
    ///
    /// Suffixes K, M, G, T, P, E are powers of 1024
    #[arg(long, value_name = "SIZE", value_parser = parse_size)]
    pub min_size: Option<u64>,

    /// Maximum file size to consider (e.g., 4K, 1M, 2G)
    ///
    /// Suffixes K, M, G, T, P, E are powers of 1024
    #[arg(long, value_name = "SIZE", value_parser = parse_size)]
    pub max_size: Option<u64>,

    /// Do not descend into directories on other filesystems
    #[arg(short = 'x', long)]
    pub one_file_system: bool,

    /// Treat files that differ in these attributes as distinct
    ///
    /// Names (ctime, device, group, links, mtime, mode, user) are
    /// comma-separated. Their letters c, d, g, l, m, p, u may also be run
    /// together, as in `-b mu`.
    #[arg(
        short = 'b',
        long,
        value_parser = parse_criteria,
        value_delimiter = ',',
        value_name = "CRITERIA"
    )]
    pub distinguish: Vec<CriteriaArg>,

    /// Bytes hashed before the full content is compared (e.g., 16M)
    #[arg(long, value_name = "SIZE", value_parser = parse_size)]
    pub partial_hash_size: Option<u64>,
}

impl ScanArgs {
    /// Every criterion named by `--distinguish`, in order.
    #[must_use]
    pub fn criteria(&self) -> Vec<Criterion> {
        self.distinguish
            .iter()
            .flat_map(|arg| arg.0.iter().copied())
            .collect()
    }
}

/// One `--distinguish` value: a criterion name or a run of criterion letters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CriteriaArg(pub Vec<Criterion>);

/// Parse a criterion name, or a run of single-letter criteria such as `mu`.
///
/// # Errors
///
/// Returns an error naming the first character that is not a criterion
/// letter.
pub fn parse_criteria(s: &str) -> Result<CriteriaArg, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("Criteria cannot be empty".to_string());
    }
    if let Ok(criterion) = Criterion::from_str(s, true) {
        return Ok(CriteriaArg(vec![criterion]));
    }

    s.chars()
        .map(|letter| {
            Criterion::from_str(letter.encode_utf8(&mut [0; 4]), true)
                .map_err(|_| format!("Unknown criterion '{letter}' in '{s}'"))
        })
        .collect::<Result<_, _>>()
        .map(CriteriaArg)
}

/// Arguments for the list subcommand.
#[derive(Debug, Args)]
pub struct ListArgs {
    #[command(flatten)]
    pub scan: ScanArgs,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    pub output: OutputFormat,
}

/// Arguments for the link subcommand.
#[derive(Debug, Args)]
pub struct LinkArgs {
    #[command(flatten)]
    pub scan: ScanArgs,

    /// Kind of link that replaces each duplicate
    #[arg(short, long, value_enum, default_value = "hard")]
    pub kind: LinkKind,

    /// Abort a link when the duplicate's times, owner or mode cannot be kept
    #[arg(long)]
    pub strict: bool,

    /// Stop at the first failed link instead of continuing
    #[arg(long)]
    pub stop_on_error: bool,
}

/// Output format for the list subcommand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// One path per line, groups separated by a blank line
    Text,
    /// JSON document with groups and a summary
    Json,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

/// Parse a byte count with an optional binary suffix.
///
/// `K`, `M`, `G`, `T`, `P` and `E` multiply by successive powers of 1024. A
/// trailing `B` or `iB` is accepted, so `4K`, `4KB` and `4KiB` all mean 4096.
/// Case-insensitive.
///
/// # Examples
///
/// ```
/// use dupelink::cli::parse_size;
///
/// assert_eq!(parse_size("1024").unwrap(), 1024);
/// assert_eq!(parse_size("1K").unwrap(), 1024);
/// assert_eq!(parse_size("16M").unwrap(), 16 * 1024 * 1024);
/// assert_eq!(parse_size("1GiB").unwrap(), 1 << 30);
/// ```
/// # Errors
///
/// Returns an error if the string is empty, does not start with a whole
/// number, carries an unknown suffix, or overflows 64 bits.
pub fn parse_size(s: &str) -> Result<u64, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("Size cannot be empty".to_string());
    }

    let (digits, suffix) = s.split_at(s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len()));
    let value: u64 = digits
        .parse()
        .map_err(|_| format!("Invalid number: '{s}'"))?;

    let shift = match suffix.trim().to_ascii_uppercase().as_str() {
        "" | "B" => 0,
        "K" | "KB" | "KIB" => 10,
        "M" | "MB" | "MIB" => 20,
        "G" | "GB" | "GIB" => 30,
        "T" | "TB" | "TIB" => 40,
        "P" | "PB" | "PIB" => 50,
        "E" | "EB" | "EIB" => 60,
        other => return Err(format!("Unknown size suffix: '{other}'")),
    };

    value
        .checked_mul(1 << shift)
        .ok_or_else(|| format!("Size out of range: '{s}'"))
}
