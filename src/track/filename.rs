// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use sanitize_filename::{Options, sanitize_with_options};

use crate::listing::Track;

use super::resolve::{DEFAULT_EXTENSION, DownloadInfo};

/// Maximum length in bytes for the stem of a file name
///
/// Leaves room for the extension and the `.partial` suffix within the
/// 255 byte limit of common file systems.
const MAX_STEM_BYTES: usize = 200;

fn options() -> Options<'static> {
    // Windows naming rules apply on every platform
    Options {
        truncate: true,
        windows: true,
        replacement: "",
    }
}

/// Strip every character that is not allowed in a file name
///
/// Idempotent: sanitizing an already sanitized name returns it unchanged.
pub fn sanitize_file_name(name: &str) -> String {
    let mut current = sanitize_with_options(name, options());
    loop {
        let next = sanitize_with_options(&current, options());
        if next == current {
            return current;
        }
        current = next;
    }
}

/// File name for a track: "artist - title.ext", sanitized
///
/// Falls back to the track id when only the " - " separator survives
/// sanitization.
pub fn output_file_name(track: &Track, info: &DownloadInfo) -> String {
    let mut stem = truncate_stem(&sanitize_file_name(&track.display_name()), MAX_STEM_BYTES);
    if is_blank_stem(&stem) {
        stem = truncate_stem(&sanitize_file_name(&track.id), MAX_STEM_BYTES);
    }
    if is_blank_stem(&stem) {
        stem = "track".to_string();
    }

    let mut ext = sanitize_file_name(info.file_extension());
    if ext.is_empty() {
        ext = DEFAULT_EXTENSION.to_string();
    }

    format!("{}.{}", stem, ext)
}

fn is_blank_stem(stem: &str) -> bool {
    stem.trim_matches(|c: char| c == '-' || c.is_whitespace()).is_empty()
}

/// Cut a stem to at most `max_bytes` on a char boundary
fn truncate_stem(stem: &str, max_bytes: usize) -> String {
    if stem.len() <= max_bytes {
        return stem.to_string();
    }

    let mut end = max_bytes;
    while !stem.is_char_boundary(end) {
        end -= 1;
    }

    // Trailing dots and spaces are invalid on Windows
    stem[..end].trim_end_matches(['.', ' ']).to_string()
}
