// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::PathBuf;
use thiserror::Error;

/// A retried operation never produced a non-empty response
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{operation} returned no response after {attempts} attempts")]
pub struct RetryExhausted {
    pub operation: String,
    pub attempts: u32,
}

/// Errors that can occur while bootstrapping the session
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),

    #[error("Invalid site base URL {url}: cannot be used as a base")]
    InvalidBaseUrl { url: String },

    #[error("Could not initialize session: {0}")]
    Exhausted(#[from] RetryExhausted),
}

/// Errors that can occur when fetching or decoding a listing page
#[derive(Error, Debug)]
pub enum TrackListError {
    #[error("Could not retrieve track list: {0}")]
    Exhausted(#[from] RetryExhausted),

    #[error("Listing page {url} has no '{selector}' data block")]
    MissingData { url: String, selector: String },

    #[error("Failed to decode track list from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Errors that can occur when resolving a track's download URL
#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("HTTP request failed for {url}: {source}")]
    HttpFailed {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Empty response from {url}")]
    EmptyResponse { url: String },

    #[error("Failed to decode download info from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Download info from {url} has an invalid source URL '{source_url}'")]
    InvalidSourceUrl { url: String, source_url: String },
}

/// Errors that can occur while streaming a track to disk
#[derive(Error, Debug)]
pub enum TransferError {
    #[error("HTTP request failed for {url}: {source}")]
    HttpFailed {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("HTTP error {status} for {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("Failed to create file {path}: {source}")]
    FileCreateFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write to file {path}: {source}")]
    FileWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Stream error while downloading {url}: {source}")]
    StreamFailed {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Failed to move {from} into place at {to}: {source}")]
    FinalizeFailed {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors that can occur when preparing the output directory
#[derive(Error, Debug)]
pub enum StateError {
    #[error("Failed to read directory {path}: {source}")]
    ReadDirectoryFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to create directory {path}: {source}")]
    CreateDirectoryFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Classification used by the pipeline to decide between abort and continue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    SessionInit,
    TrackListFetch,
    OutputDirectory,
    DownloadResolution,
    Transfer,
}

impl ErrorKind {
    /// Fatal kinds stop the run; the rest only skip the current track
    pub fn is_fatal(self) -> bool {
        match self {
            ErrorKind::SessionInit | ErrorKind::TrackListFetch | ErrorKind::OutputDirectory => {
                true
            }
            ErrorKind::DownloadResolution | ErrorKind::Transfer => false,
        }
    }
}

/// Top-level errors for a download run
#[derive(Error, Debug)]
pub enum RunError {
    #[error(transparent)]
    SessionInit(#[from] SessionError),

    #[error(transparent)]
    TrackListFetch(#[from] TrackListError),

    #[error("Output directory error: {0}")]
    OutputDirectory(#[from] StateError),

    #[error("Could not resolve download for '{track}': {source}")]
    DownloadResolution {
        track: String,
        #[source]
        source: ResolveError,
    },

    #[error("Could not download '{track}': {source}")]
    Transfer {
        track: String,
        #[source]
        source: TransferError,
    },
}

impl RunError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RunError::SessionInit(_) => ErrorKind::SessionInit,
            RunError::TrackListFetch(_) => ErrorKind::TrackListFetch,
            RunError::OutputDirectory(_) => ErrorKind::OutputDirectory,
            RunError::DownloadResolution { .. } => ErrorKind::DownloadResolution,
            RunError::Transfer { .. } => ErrorKind::Transfer,
        }
    }
}
