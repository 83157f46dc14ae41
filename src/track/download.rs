// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use futures::StreamExt;
use sha2::{Digest, Sha256};
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::error::TransferError;
use crate::http::HttpClient;
use crate::listing::Track;
use crate::progress::{ProgressEvent, SharedProgressReporter};
use crate::session::Session;
use crate::state::PARTIAL_SUFFIX;

use super::resolve::DownloadInfo;

/// Position of a transfer within the run
#[derive(Debug, Clone)]
pub struct TransferContext {
    /// Index of this track in the processing order
    pub track_index: usize,
    /// Total number of tracks selected for the run
    pub total_tracks: usize,
}

/// Result of a completed transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferResult {
    pub bytes_downloaded: u64,
    /// "sha256:<hex>" of the written content
    pub content_hash: String,
}

/// Path a transfer writes to before it is moved into place
pub fn partial_path(output_path: &Path) -> PathBuf {
    let mut name = output_path
        .file_name()
        .map(OsString::from)
        .unwrap_or_default();
    name.push(PARTIAL_SUFFIX);
    output_path.with_file_name(name)
}

/// Stream a track's media to `output_path`
///
/// Bytes go to a `.partial` sibling first, which is renamed to `output_path`
/// only once the body has been written completely. On failure the partial
/// file is removed, so `output_path` never holds a truncated download.
pub async fn download_track<C: HttpClient>(
    session: &Session<C>,
    track: &Track,
    info: &DownloadInfo,
    output_path: &Path,
    context: &TransferContext,
    reporter: &SharedProgressReporter,
) -> Result<TransferResult, TransferError> {
    let partial = partial_path(output_path);

    let result = stream_to_file(session, track, info, &partial, context, reporter).await;

    let result = match result {
        Ok(result) => {
            reporter.report(ProgressEvent::Finalizing {
                track_index: context.track_index,
                display_name: track.display_name(),
            });

            tokio::fs::rename(&partial, output_path)
                .await
                .map(|()| result)
                .map_err(|e| TransferError::FinalizeFailed {
                    from: partial.clone(),
                    to: output_path.to_path_buf(),
                    source: e,
                })
        }
        Err(e) => Err(e),
    };

    match result {
        Ok(result) => {
            reporter.report(ProgressEvent::DownloadCompleted {
                track_index: context.track_index,
                display_name: track.display_name(),
                bytes_downloaded: result.bytes_downloaded,
            });
            Ok(result)
        }
        Err(e) => {
            if tokio::fs::remove_file(&partial).await.is_ok() {
                debug!(path = %partial.display(), "Removed partial file");
            }
            Err(e)
        }
    }
}

async fn stream_to_file<C: HttpClient>(
    session: &Session<C>,
    track: &Track,
    info: &DownloadInfo,
    partial: &Path,
    context: &TransferContext,
    reporter: &SharedProgressReporter,
) -> Result<TransferResult, TransferError> {
    let url = info.source_url.as_str();
    let options = session.request_options(None);

    let response = session
        .client()
        .get_stream(url, &options)
        .await
        .map_err(|e| TransferError::HttpFailed {
            url: url.to_string(),
            source: e,
        })?;

    if response.status >= 400 {
        return Err(TransferError::HttpStatus {
            url: url.to_string(),
            status: response.status,
        });
    }

    reporter.report(ProgressEvent::DownloadStarting {
        track_index: context.track_index,
        total_tracks: context.total_tracks,
        display_name: track.display_name(),
        content_length: response.content_length,
    });

    let mut file = File::create(partial)
        .await
        .map_err(|e| TransferError::FileCreateFailed {
            path: partial.to_path_buf(),
            source: e,
        })?;

    let mut hasher = Sha256::new();
    let mut bytes_downloaded: u64 = 0;
    let mut stream = response.body;

    while let Some(chunk_result) = stream.next().await {
        let chunk = chunk_result.map_err(|e| TransferError::StreamFailed {
            url: url.to_string(),
            source: e,
        })?;

        file.write_all(&chunk)
            .await
            .map_err(|e| TransferError::FileWriteFailed {
                path: partial.to_path_buf(),
                source: e,
            })?;

        hasher.update(&chunk);
        bytes_downloaded += chunk.len() as u64;

        reporter.report(ProgressEvent::DownloadProgress {
            track_index: context.track_index,
            bytes_downloaded,
            total_bytes: response.content_length,
        });
    }

    file.flush()
        .await
        .map_err(|e| TransferError::FileWriteFailed {
            path: partial.to_path_buf(),
            source: e,
        })?;

    Ok(TransferResult {
        bytes_downloaded,
        content_hash: format!("sha256:{:x}", hasher.finalize()),
    })
}
