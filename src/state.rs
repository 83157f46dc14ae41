// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::StateError;

/// Suffix of files that are still being written
pub const PARTIAL_SUFFIX: &str = ".partial";

/// State of the output directory after preparation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputState {
    /// The output directory path
    pub output_dir: PathBuf,
    /// Number of partial files that were cleaned up during the scan
    pub partial_files_cleaned: usize,
}

/// Make sure the output directory exists and holds no partial files
///
/// Only completed transfers are renamed to their final name, so any partial
/// file found here is the leftover of an interrupted run.
pub fn prepare_output_dir(output_dir: &Path) -> Result<OutputState, StateError> {
    if !output_dir.exists() {
        std::fs::create_dir_all(output_dir).map_err(|e| StateError::CreateDirectoryFailed {
            path: output_dir.to_path_buf(),
            source: e,
        })?;
        debug!(path = %output_dir.display(), "Created output directory");

        return Ok(OutputState {
            output_dir: output_dir.to_path_buf(),
            partial_files_cleaned: 0,
        });
    }

    let entries = std::fs::read_dir(output_dir).map_err(|e| StateError::ReadDirectoryFailed {
        path: output_dir.to_path_buf(),
        source: e,
    })?;

    let mut partial_files_cleaned = 0;

    for entry in entries {
        let entry = entry.map_err(|e| StateError::ReadDirectoryFailed {
            path: output_dir.to_path_buf(),
            source: e,
        })?;

        let path = entry.path();
        let is_partial = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.ends_with(PARTIAL_SUFFIX));

        if is_partial && path.is_file() {
            match std::fs::remove_file(&path) {
                Ok(()) => partial_files_cleaned += 1,
                Err(e) => warn!(path = %path.display(), error = %e, "Could not remove partial file"),
            }
        }
    }

    Ok(OutputState {
        output_dir: output_dir.to_path_buf(),
        partial_files_cleaned,
    })
}
