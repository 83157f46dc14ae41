// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use clap::builder::NonEmptyStringValueParser;
use colored::Colorize;
use console::Emoji;
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

use trackpull::{
    DEFAULT_OUTPUT_DIR, NoopReporter, ProgressEvent, ProgressReporter, RunConfig,
    SharedProgressReporter, SiteConfig, TransportConfig, run,
};

// Emoji with fallback for terminals without Unicode support
static NOTES: Emoji<'_, '_> = Emoji("🎶 ", "");
static SEARCH: Emoji<'_, '_> = Emoji("🔍 ", "[~] ");
static HEADPHONES: Emoji<'_, '_> = Emoji("🎧 ", "[i] ");
static DOWNLOAD: Emoji<'_, '_> = Emoji("📥 ", "[v] ");
static SUCCESS: Emoji<'_, '_> = Emoji("✅ ", "[+] ");
static SKIPPED: Emoji<'_, '_> = Emoji("⏭️  ", "[=] ");
static FAILURE: Emoji<'_, '_> = Emoji("❌ ", "[!] ");
static BROOM: Emoji<'_, '_> = Emoji("🧹 ", "[-] ");
static PARTY: Emoji<'_, '_> = Emoji("🎉 ", "[*] ");
static FOLDER: Emoji<'_, '_> = Emoji("📁 ", "");
static CROSS: Emoji<'_, '_> = Emoji("✗ ", "x ");

/// Download the tracks listed on an account's profile page
#[derive(Parser, Debug)]
#[command(name = "trackpull")]
#[command(about = "Download the tracks listed on an account's profile page")]
#[command(version)]
struct Args {
    /// Account name whose listing is downloaded
    #[arg(long, value_parser = NonEmptyStringValueParser::new())]
    account: String,

    /// Listing page number
    #[arg(long)]
    page: u32,

    /// Maximum number of tracks to download (0 = all)
    #[arg(long, default_value_t = 0)]
    limit: usize,

    /// Output directory for downloaded tracks
    #[arg(short, long, default_value = DEFAULT_OUTPUT_DIR)]
    output_dir: PathBuf,

    /// File that receives a copy of all log output
    #[arg(long, default_value = "program.log")]
    log_file: PathBuf,

    /// Per-request timeout in seconds (waits indefinitely when unset)
    #[arg(long)]
    timeout: Option<u64>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode - suppress progress output
    #[arg(short, long)]
    quiet: bool,
}

/// Console writer that hides progress bars while a log line is printed
struct SuspendingWriter {
    multi: MultiProgress,
}

impl Write for SuspendingWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.multi.suspend(|| io::stderr().write(buf))
    }

    fn flush(&mut self) -> io::Result<()> {
        self.multi.suspend(|| io::stderr().flush())
    }
}

/// Route log events to the console and to the log file
///
/// `RUST_LOG` takes precedence over the verbosity flag.
fn init_tracing(args: &Args, multi: &MultiProgress) -> Result<()> {
    let default_level = match args.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&args.log_file)
        .with_context(|| format!("Failed to open log file {}", args.log_file.display()))?;

    let multi = multi.clone();
    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(move || SuspendingWriter {
            multi: multi.clone(),
        });

    let file_layer = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_writer(Mutex::new(log_file));

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    Ok(())
}

/// Progress reporter using indicatif for terminal output
struct IndicatifReporter {
    multi: MultiProgress,
    main_bar: ProgressBar,
    track_bar: Mutex<Option<ProgressBar>>,
}

impl IndicatifReporter {
    fn new(multi: MultiProgress) -> Self {
        let main_style = ProgressStyle::default_bar()
            .template("{spinner:.green} {wide_msg}")
            .expect("valid progress template");

        let main_bar = multi.add(ProgressBar::new_spinner());
        main_bar.set_style(main_style);
        main_bar.enable_steady_tick(Duration::from_millis(100));

        Self {
            multi,
            main_bar,
            track_bar: Mutex::new(None),
        }
    }

    fn start_track_bar(&self, content_length: Option<u64>, message: String) {
        let style = ProgressStyle::default_bar()
            .template(&format!(
                "  {DOWNLOAD}[{{bar:30.cyan/blue}}] {{bytes}}/{{total_bytes}} {{wide_msg}}"
            ))
            .expect("valid progress template")
            .progress_chars("█▓░");

        let bar = self.multi.add(ProgressBar::new(content_length.unwrap_or(0)));
        bar.set_style(style);
        bar.set_message(message);

        if let Some(previous) = self.track_bar.lock().ok().and_then(|mut c| c.replace(bar)) {
            previous.finish_and_clear();
        }
    }

    fn with_track_bar(&self, f: impl FnOnce(&ProgressBar)) {
        if let Ok(current) = self.track_bar.lock() {
            if let Some(bar) = current.as_ref() {
                f(bar);
            }
        }
    }

    fn take_track_bar(&self) -> Option<ProgressBar> {
        self.track_bar.lock().ok().and_then(|mut current| current.take())
    }

    fn println(&self, line: String) {
        let _ = self.multi.println(line);
    }
}

impl ProgressReporter for IndicatifReporter {
    fn report(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::InitializingSession { url } => {
                self.main_bar
                    .set_message(format!("{SEARCH}Initializing session: {}", url.cyan()));
            }

            ProgressEvent::FetchingTrackList { url } => {
                self.main_bar
                    .set_message(format!("{SEARCH}Fetching track list: {}", url.cyan()));
            }

            ProgressEvent::TrackListReady {
                account,
                total_tracks,
                to_process,
            } => {
                self.main_bar.set_message(format!(
                    "{HEADPHONES}{} • {} tracks listed, {} selected",
                    account.bold().green(),
                    total_tracks.to_string().cyan(),
                    to_process.to_string().yellow()
                ));
            }

            ProgressEvent::PartialFilesCleanedUp { count } => {
                self.println(format!(
                    "{BROOM}Removed {} partial files from an interrupted run",
                    count.to_string().yellow()
                ));
            }

            ProgressEvent::ResolvingTrack {
                track_index,
                total_tracks,
                display_name,
            } => {
                self.main_bar.set_message(format!(
                    "[{}/{}] Resolving {}",
                    (track_index + 1).to_string().cyan(),
                    total_tracks.to_string().cyan(),
                    truncate_title(&display_name, 50)
                ));
            }

            ProgressEvent::TrackSkipped { file_name, .. } => {
                self.println(format!(
                    "{SKIPPED}{} {}",
                    truncate_title(&file_name, 50).dimmed(),
                    "already downloaded".dimmed()
                ));
            }

            ProgressEvent::DownloadStarting {
                track_index,
                total_tracks,
                display_name,
                content_length,
            } => {
                self.start_track_bar(
                    content_length,
                    format!(
                        "[{}/{}] {}",
                        (track_index + 1).to_string().cyan(),
                        total_tracks.to_string().cyan(),
                        truncate_title(&display_name, 40)
                    ),
                );
            }

            ProgressEvent::DownloadProgress {
                bytes_downloaded,
                total_bytes,
                ..
            } => {
                self.with_track_bar(|bar| {
                    if let Some(total) = total_bytes {
                        bar.set_length(total);
                    }
                    bar.set_position(bytes_downloaded);
                });
            }

            ProgressEvent::Finalizing { .. } => {}

            ProgressEvent::DownloadCompleted { display_name, .. } => {
                if let Some(bar) = self.take_track_bar() {
                    bar.finish_and_clear();
                }
                self.println(format!(
                    "{SUCCESS}{}",
                    truncate_title(&display_name, 60).green()
                ));
            }

            ProgressEvent::TrackFailed {
                display_name,
                error,
                ..
            } => {
                if let Some(bar) = self.take_track_bar() {
                    bar.finish_and_clear();
                }
                self.println(format!(
                    "{FAILURE}{} - {}",
                    truncate_title(&display_name, 40).red(),
                    error.red()
                ));
            }

            ProgressEvent::RunCompleted {
                downloaded_count,
                skipped_count,
                failed_count,
            } => {
                self.main_bar.finish_and_clear();
                println!(
                    "\n{PARTY}{} {} downloaded, {} skipped, {} failed",
                    "Run complete:".bold().green(),
                    downloaded_count.to_string().green().bold(),
                    skipped_count.to_string().yellow(),
                    if failed_count > 0 {
                        failed_count.to_string().red().bold()
                    } else {
                        failed_count.to_string().green()
                    }
                );
            }
        }
    }
}

fn truncate_title(title: &str, max_chars: usize) -> String {
    if title.chars().count() <= max_chars {
        title.to_string()
    } else {
        let kept: String = title.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{kept}...")
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Usage errors print the help text and exit cleanly
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            e.print()?;
            return Ok(());
        }
    };

    let multi = if args.quiet {
        MultiProgress::with_draw_target(ProgressDrawTarget::hidden())
    } else {
        MultiProgress::new()
    };

    init_tracing(&args, &multi)?;
    debug!(?args, "CLI arguments parsed");

    if !args.quiet {
        println!(
            "\n{}{} {}\n",
            NOTES,
            "trackpull".bold().magenta(),
            "- Track Downloader".dimmed()
        );
    }

    let config = RunConfig {
        account: args.account.clone(),
        page: args.page,
        limit: args.limit,
    };

    let transport = TransportConfig {
        timeout: args.timeout.map(Duration::from_secs),
        ..Default::default()
    };

    let reporter: SharedProgressReporter = if args.quiet {
        NoopReporter::shared()
    } else {
        Arc::new(IndicatifReporter::new(multi.clone()))
    };

    let summary = match run(
        &config,
        &transport,
        SiteConfig::default(),
        &args.output_dir,
        reporter,
    )
    .await
    {
        Ok(summary) => summary,
        Err(e) => {
            error!(kind = ?e.kind(), error = %e, "Run aborted");
            std::process::exit(1);
        }
    };

    if !args.quiet && !summary.failed_tracks.is_empty() {
        println!("\n{}", "Failed tracks:".red().bold());
        for (name, error) in &summary.failed_tracks {
            println!("  {}{} - {}", CROSS, name.yellow(), error.dimmed());
        }
    }

    if !args.quiet {
        println!(
            "\n{FOLDER}Output: {}\n",
            args.output_dir.display().to_string().cyan()
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn args_definition_is_valid() {
        Args::command().debug_assert();
    }

    #[test]
    fn parses_required_arguments_with_defaults() {
        let args = Args::try_parse_from(["trackpull", "--account", "testartist", "--page", "2"])
            .unwrap();

        assert_eq!(args.account, "testartist");
        assert_eq!(args.page, 2);
        assert_eq!(args.limit, 0);
        assert_eq!(args.output_dir, PathBuf::from("downloads"));
        assert_eq!(args.log_file, PathBuf::from("program.log"));
        assert!(args.timeout.is_none());
    }

    #[test]
    fn parses_limit() {
        let args = Args::try_parse_from([
            "trackpull", "--account", "a", "--page", "1", "--limit", "5",
        ])
        .unwrap();
        assert_eq!(args.limit, 5);
    }

    #[test]
    fn rejects_missing_page() {
        assert!(Args::try_parse_from(["trackpull", "--account", "a"]).is_err());
    }

    #[test]
    fn rejects_empty_account() {
        assert!(Args::try_parse_from(["trackpull", "--account", "", "--page", "1"]).is_err());
    }

    #[test]
    fn rejects_non_numeric_page() {
        assert!(Args::try_parse_from(["trackpull", "--account", "a", "--page", "two"]).is_err());
    }

    #[test]
    fn truncate_title_counts_characters() {
        assert_eq!(truncate_title("short", 10), "short");
        assert_eq!(truncate_title("Sigur Rós - Hoppípolla", 10), "Sigur R...");
        assert_eq!(truncate_title("ééééé", 4), "é...");
    }
}
