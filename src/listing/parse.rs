// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use scraper::{Html, Selector};
use serde::Deserialize;

use crate::error::TrackListError;

/// Element on a listing page that embeds the track list as JSON
pub const TRACK_DATA_SELECTOR: &str = "#displayList-data";

static TRACK_DATA: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(TRACK_DATA_SELECTOR).expect("valid selector"));

/// One track listed on a profile page
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Track {
    /// Source type reported by the site
    #[serde(rename = "type", default)]
    pub kind: String,
    pub id: String,
    /// Length in seconds
    #[serde(rename = "time", default)]
    pub duration: u64,
    /// Unix timestamp of the post that listed the track
    #[serde(rename = "ts", default)]
    pub timestamp: i64,
    #[serde(rename = "postid", default)]
    pub post_id: u64,
    #[serde(rename = "posturl", default)]
    pub post_url: String,
    #[serde(rename = "fav", default)]
    pub favorite_count: u64,
    /// Opaque token required alongside `id` to resolve a download
    pub key: String,
    pub artist: String,
    #[serde(rename = "song")]
    pub title: String,
    #[serde(rename = "is_sc", default)]
    pub is_soundcloud: bool,
    #[serde(rename = "is_bc", default)]
    pub is_bandcamp: bool,
}

impl Track {
    /// "artist - title", used for logging and as the file name stem
    pub fn display_name(&self) -> String {
        format!("{} - {}", self.artist, self.title)
    }

    pub fn posted_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.timestamp, 0)
    }
}

#[derive(Deserialize)]
struct DisplayList {
    tracks: Vec<Track>,
}

/// Decode the embedded track list of a listing page, preserving order
pub fn parse_track_list(document: &Html, url: &str) -> Result<Vec<Track>, TrackListError> {
    let element =
        document
            .select(&TRACK_DATA)
            .next()
            .ok_or_else(|| TrackListError::MissingData {
                url: url.to_string(),
                selector: TRACK_DATA_SELECTOR.to_string(),
            })?;

    let json: String = element.text().collect();

    let list: DisplayList =
        serde_json::from_str(json.trim()).map_err(|e| TrackListError::Decode {
            url: url.to_string(),
            source: e,
        })?;

    Ok(list.tracks)
}
