// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::sync::Arc;

/// Events emitted during a download run for progress reporting
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    /// The bootstrap request is being made
    InitializingSession { url: String },

    /// The listing page is being fetched
    FetchingTrackList { url: String },

    /// The listing page has been decoded
    TrackListReady {
        account: String,
        total_tracks: usize,
        /// Tracks left after applying the limit
        to_process: usize,
    },

    /// Partial files from an interrupted run were removed
    PartialFilesCleanedUp { count: usize },

    /// A track's download URL is being resolved
    ResolvingTrack {
        /// Index of this track in the processing order
        track_index: usize,
        total_tracks: usize,
        display_name: String,
    },

    /// The destination file already exists
    TrackSkipped {
        track_index: usize,
        display_name: String,
        file_name: String,
    },

    /// A transfer is starting
    DownloadStarting {
        track_index: usize,
        total_tracks: usize,
        display_name: String,
        /// Expected content length in bytes, if known
        content_length: Option<u64>,
    },

    /// Transfer progress update
    DownloadProgress {
        track_index: usize,
        bytes_downloaded: u64,
        total_bytes: Option<u64>,
    },

    /// The partial file is being moved into place
    Finalizing {
        track_index: usize,
        display_name: String,
    },

    /// A transfer completed successfully
    DownloadCompleted {
        track_index: usize,
        display_name: String,
        bytes_downloaded: u64,
    },

    /// Resolving or downloading a track failed; the run continues
    TrackFailed {
        track_index: usize,
        display_name: String,
        error: String,
    },

    /// The run went through every selected track
    RunCompleted {
        downloaded_count: usize,
        skipped_count: usize,
        failed_count: usize,
    },
}

/// Trait for reporting progress events during a run.
///
/// Implementations can use this to display progress bars, log messages,
/// or collect statistics.
pub trait ProgressReporter: Send + Sync {
    /// Report a progress event
    fn report(&self, event: ProgressEvent);
}

/// A shared reference to a progress reporter
pub type SharedProgressReporter = Arc<dyn ProgressReporter>;

/// A no-op progress reporter that silently ignores all events.
/// Useful for tests or quiet mode.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopReporter;

impl ProgressReporter for NoopReporter {
    fn report(&self, _event: ProgressEvent) {}
}

impl NoopReporter {
    /// Create a new NoopReporter wrapped in an Arc
    pub fn shared() -> SharedProgressReporter {
        Arc::new(Self)
    }
}
