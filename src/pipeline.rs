// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::{Path, PathBuf};

use tracing::{error, info, warn};

use crate::error::RunError;
use crate::http::{HttpClient, TransportConfig};
use crate::listing::{Track, fetch_track_list, listing_url};
use crate::progress::{ProgressEvent, SharedProgressReporter};
use crate::retry::{ResilientFetcher, Sleeper};
use crate::session::{Session, SiteConfig};
use crate::state::prepare_output_dir;
use crate::track::{
    TransferContext, TransferResult, download_track, output_file_name, resolve_download,
};

/// Default directory tracks are written to
pub const DEFAULT_OUTPUT_DIR: &str = "downloads";

/// What to download in a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    pub account: String,
    pub page: u32,
    /// Maximum number of tracks to process (0 = all)
    pub limit: usize,
}

/// Result of a download run
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    /// Number of tracks successfully downloaded
    pub downloaded: usize,
    /// Number of tracks skipped (file already present)
    pub skipped: usize,
    /// Number of tracks that failed to resolve or download
    pub failed: usize,
    /// Details of failed tracks (display name, error message)
    pub failed_tracks: Vec<(String, String)>,
}

enum TrackOutcome {
    Downloaded(TransferResult),
    Skipped(String),
}

/// Download a page of tracks for an account
///
/// This is the main entry point for the library. It builds the transport
/// from `transport`, then runs [`download_tracks`] with the production
/// retry timing.
pub async fn run(
    config: &RunConfig,
    transport: &TransportConfig,
    site: SiteConfig,
    output_dir: &Path,
    reporter: SharedProgressReporter,
) -> Result<RunSummary, RunError> {
    let session = Session::connect(transport, site)?;
    let fetcher = ResilientFetcher::default();

    download_tracks(&session, &fetcher, config, output_dir, reporter).await
}

/// Run the whole pipeline on an existing session
///
/// 1. Bootstraps the session cookies
/// 2. Fetches and decodes the listing page
/// 3. Prepares the output directory
/// 4. Resolves and downloads each selected track in listing order
///
/// Failures in steps 1-3 abort the run. Failures for a single track are
/// logged and recorded in the summary, and the run moves on.
pub async fn download_tracks<C: HttpClient, S: Sleeper>(
    session: &Session<C>,
    fetcher: &ResilientFetcher<S>,
    config: &RunConfig,
    output_dir: &Path,
    reporter: SharedProgressReporter,
) -> Result<RunSummary, RunError> {
    info!(
        account = %config.account,
        page = config.page,
        limit = config.limit,
        "Starting run"
    );

    reporter.report(ProgressEvent::InitializingSession {
        url: session.site().base_url().to_string(),
    });
    session.bootstrap(fetcher).await?;

    let listing = listing_url(session.site(), &config.account, config.page).to_string();
    reporter.report(ProgressEvent::FetchingTrackList {
        url: listing.clone(),
    });
    let tracks = fetch_track_list(session, fetcher, &config.account, config.page).await?;

    let state = prepare_output_dir(output_dir)?;
    if state.partial_files_cleaned > 0 {
        info!(
            count = state.partial_files_cleaned,
            "Removed partial files from an interrupted run"
        );
        reporter.report(ProgressEvent::PartialFilesCleanedUp {
            count: state.partial_files_cleaned,
        });
    }

    let selected = select_tracks(&tracks, config.limit);
    let total_tracks = selected.len();

    reporter.report(ProgressEvent::TrackListReady {
        account: config.account.clone(),
        total_tracks: tracks.len(),
        to_process: total_tracks,
    });

    let mut summary = RunSummary::default();

    for (track_index, track) in selected.iter().enumerate() {
        let context = TransferContext {
            track_index,
            total_tracks,
        };

        let outcome =
            process_track(session, track, &listing, output_dir, &context, &reporter).await;

        match outcome {
            Ok(TrackOutcome::Downloaded(result)) => {
                info!(
                    track = %track.display_name(),
                    bytes = result.bytes_downloaded,
                    hash = %result.content_hash,
                    "Track downloaded"
                );
                summary.downloaded += 1;
            }
            Ok(TrackOutcome::Skipped(file_name)) => {
                warn!(track = %track.display_name(), "File exists, skipping track");
                reporter.report(ProgressEvent::TrackSkipped {
                    track_index,
                    display_name: track.display_name(),
                    file_name,
                });
                summary.skipped += 1;
            }
            Err(e) if !e.kind().is_fatal() => {
                error!(
                    track = %track.display_name(),
                    kind = ?e.kind(),
                    error = %e,
                    "Error downloading track"
                );
                reporter.report(ProgressEvent::TrackFailed {
                    track_index,
                    display_name: track.display_name(),
                    error: e.to_string(),
                });
                summary.failed += 1;
                summary
                    .failed_tracks
                    .push((track.display_name(), e.to_string()));
            }
            Err(e) => return Err(e),
        }
    }

    info!(
        downloaded = summary.downloaded,
        skipped = summary.skipped,
        failed = summary.failed,
        "Finished"
    );
    reporter.report(ProgressEvent::RunCompleted {
        downloaded_count: summary.downloaded,
        skipped_count: summary.skipped,
        failed_count: summary.failed,
    });

    Ok(summary)
}

/// First `limit` tracks in listing order, or all of them when `limit` is 0
fn select_tracks(tracks: &[Track], limit: usize) -> &[Track] {
    if limit == 0 {
        tracks
    } else {
        &tracks[..limit.min(tracks.len())]
    }
}

/// Resolve, check and download one track
async fn process_track<C: HttpClient>(
    session: &Session<C>,
    track: &Track,
    listing: &str,
    output_dir: &Path,
    context: &TransferContext,
    reporter: &SharedProgressReporter,
) -> Result<TrackOutcome, RunError> {
    reporter.report(ProgressEvent::ResolvingTrack {
        track_index: context.track_index,
        total_tracks: context.total_tracks,
        display_name: track.display_name(),
    });

    let info = resolve_download(session, track, listing)
        .await
        .map_err(|e| RunError::DownloadResolution {
            track: track.display_name(),
            source: e,
        })?;

    let file_name = output_file_name(track, &info);
    let output_path: PathBuf = output_dir.join(&file_name);

    if output_path.exists() {
        return Ok(TrackOutcome::Skipped(file_name));
    }

    info!(track = %track.display_name(), file = %file_name, "Downloading track");

    let result = download_track(session, track, &info, &output_path, context, reporter)
        .await
        .map_err(|e| RunError::Transfer {
            track: track.display_name(),
            source: e,
        })?;

    Ok(TrackOutcome::Downloaded(result))
}
