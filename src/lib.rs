//! dupelink - Duplicate File Finder and Linker
//!
//! A Rust CLI application that finds duplicate files across directory trees
//! and either lists them or replaces the duplicates with hard links, symbolic
//! links or copy-on-write clones.
//!
//! Files are compared by size first, then by BLAKE3 digests of their leading
//! bytes, and only then by digests of their full content. Each digest is
//! computed at most once per file, and only when a comparison needs it.

pub mod actions;
pub mod cli;
pub mod config;
pub mod duplicates;
pub mod error;
pub mod logging;
pub mod output;
pub mod progress;
pub mod scanner;
pub mod signal;

use std::io::{self, BufWriter};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use bytesize::ByteSize;

use crate::actions::{link_duplicates, LinkConfig, LinkKind};
use crate::cli::{Cli, Commands, LinkArgs, ListArgs, OutputFormat};
use crate::config::Config;
use crate::duplicates::{Criterion, DuplicateGroup, Matcher};
use crate::error::{ExitCode, Interrupted};
use crate::output::{JsonOutput, ScanSummary, TextOutput};
use crate::progress::{Progress, ProgressCallback};
use crate::scanner::Walker;

/// Run the application for parsed command-line arguments.
///
/// Returns the exit code for a run that completed, possibly with skipped
/// files or failed links.
///
/// # Errors
///
/// Returns an error if the configuration is invalid, matching fails, output
/// cannot be written, or the run is interrupted (an [`Interrupted`] error).
pub fn run_app(cli: Cli) -> anyhow::Result<ExitCode> {
    logging::init_logging(cli.verbose, cli.quiet, cli.no_color);
    let shutdown = signal::install_handler().context("cannot install Ctrl+C handler")?;
    let flag = shutdown.get_flag();

    let mut config = Config::load(cli.config.as_deref()).context("cannot load configuration")?;
    config.apply_scan_args(cli.command.scan_args())?;

    let progress = Arc::new(Progress::new(cli.quiet));
    let started = Instant::now();

    match cli.command {
        Commands::List(args) => run_list(&args, &config, &progress, &flag, started),
        Commands::Link(args) => {
            config.strict |= args.strict;
            run_link(&args, &config, &progress, &flag)
        }
    }
}

fn run_list(
    args: &ListArgs,
    config: &Config,
    progress: &Arc<Progress>,
    flag: &Arc<AtomicBool>,
    started: Instant,
) -> anyhow::Result<ExitCode> {
    let mut summary = ScanSummary::default();
    let mut matcher = collect(&args.scan.paths, config, None, progress, flag, &mut summary)?;

    let exit_code = if summary.scan_errors > 0 {
        ExitCode::PartialSuccess
    } else {
        ExitCode::Success
    };

    match args.output {
        OutputFormat::Text => {
            let mut out = TextOutput::new(BufWriter::new(io::stdout().lock()));
            for group in matcher.groups() {
                if flag.load(Ordering::SeqCst) {
                    return Err(Interrupted.into());
                }
                let group = group.context("matching failed")?;
                summary.record_group(&group);
                out.write_group(&group).context("cannot write report")?;
            }
            out.finish().context("cannot write report")?;
        }
        OutputFormat::Json => {
            let groups: Vec<DuplicateGroup> = matcher
                .groups()
                .collect::<Result<_, _>>()
                .context("matching failed")?;
            for group in &groups {
                summary.record_group(group);
            }
            summary.stats = matcher.stats();
            summary.scan_duration = started.elapsed();

            let mut stdout = io::stdout().lock();
            JsonOutput::new(&groups, &summary, exit_code)
                .write_to(&mut stdout, true)
                .context("cannot write report")?;
        }
    }

    log::info!(
        "{} duplicate group(s), {} duplicate file(s), {} reclaimable",
        summary.duplicate_groups,
        summary.duplicate_files,
        ByteSize(summary.reclaimable_space)
    );

    Ok(exit_code)
}

fn run_link(
    args: &LinkArgs,
    config: &Config,
    progress: &Arc<Progress>,
    flag: &Arc<AtomicBool>,
) -> anyhow::Result<ExitCode> {
    let mut summary = ScanSummary::default();
    let mut matcher = collect(
        &args.scan.paths,
        config,
        Some(args.kind),
        progress,
        flag,
        &mut summary,
    )?;

    let link_config = LinkConfig::default()
        .with_strict(config.strict)
        .with_continue_on_error(!args.stop_on_error);

    progress.on_phase_start("linking", 0);
    let result = link_duplicates(
        matcher.groups(),
        &args.kind,
        &link_config,
        Some(progress.as_ref()),
        Some(flag.as_ref()),
    )
    .context("matching failed")?;

    if result.interrupted {
        return Err(Interrupted.into());
    }

    if summary.scan_errors > 0 || !result.all_succeeded() {
        Ok(ExitCode::PartialSuccess)
    } else {
        Ok(ExitCode::Success)
    }
}

/// Walk every root into a new matcher and finalize it.
///
/// Hard links force the `device` criterion, since a hard link cannot cross
/// devices. Names already sharing the original's inode are left alone by
/// [`link_file`](crate::actions::link_file).
fn collect(
    roots: &[PathBuf],
    config: &Config,
    kind: Option<LinkKind>,
    progress: &Arc<Progress>,
    flag: &Arc<AtomicBool>,
    summary: &mut ScanSummary,
) -> anyhow::Result<Matcher> {
    let mut criteria = config.criteria();
    if kind == Some(LinkKind::Hard) {
        criteria = criteria.with(Criterion::Device);
    }
    log::debug!("Distinguishing by: {:?}", criteria.enabled());

    let mut matcher = Matcher::new(criteria)
        .context("cannot create record store")?
        .with_partial_hash_size(config.partial_hash_size)
        .with_progress_callback(Arc::clone(progress) as Arc<dyn ProgressCallback>);

    let walker_config = config.walker_config();
    progress.on_phase_start("walking", 0);
    for root in roots {
        let walker = Walker::new(root, walker_config.clone())
            .with_shutdown_flag(Arc::clone(flag));

        for entry in walker.walk() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    log::warn!("{}", e);
                    summary.scan_errors += 1;
                    continue;
                }
            };

            if let Err(e) = matcher.register_file(&entry.path, entry.meta) {
                log::warn!("Skipping {}: {}", entry.path.display(), e);
                summary.scan_errors += 1;
                continue;
            }
            progress.on_progress(matcher.file_count(), &entry.path.to_string_lossy());
        }
    }
    progress.on_phase_end("walking");

    if flag.load(Ordering::SeqCst) {
        return Err(Interrupted.into());
    }

    summary.total_files = matcher.file_count();
    log::info!(
        "Registered {} file(s) from {} root(s)",
        summary.total_files,
        roots.len()
    );

    matcher.finalize().context("matching failed")?;
    Ok(matcher)
}
