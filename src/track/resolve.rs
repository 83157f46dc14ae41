// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use serde::Deserialize;
use tracing::debug;
use url::Url;

use crate::error::ResolveError;
use crate::http::HttpClient;
use crate::listing::Track;
use crate::session::{Session, SiteConfig};

/// Extension used when the site does not report one
pub const DEFAULT_EXTENSION: &str = "mp3";

/// Where a track's media can be downloaded from
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DownloadInfo {
    #[serde(rename = "url")]
    pub source_url: String,
    #[serde(rename = "ext", default)]
    pub extension: Option<String>,
}

impl DownloadInfo {
    /// Reported extension, or `mp3` when absent or blank
    pub fn file_extension(&self) -> &str {
        self.extension
            .as_deref()
            .map(str::trim)
            .filter(|ext| !ext.is_empty())
            .unwrap_or(DEFAULT_EXTENSION)
    }
}

/// The "serve source" endpoint addressed by a track's id and key
pub fn source_endpoint(site: &SiteConfig, track: &Track) -> Url {
    site.endpoint(&["serve", "source", &track.id, &track.key])
}

/// Ask the site where to download `track` from
///
/// This is a single request without retries; callers decide what a failure
/// means for the run. `referer` is the listing page the track came from.
pub async fn resolve_download<C: HttpClient>(
    session: &Session<C>,
    track: &Track,
    referer: &str,
) -> Result<DownloadInfo, ResolveError> {
    let url = source_endpoint(session.site(), track).to_string();

    let mut options = session.request_options(Some(referer.to_string()));
    options.json = true;

    let body = session
        .client()
        .get_text(&url, &options)
        .await
        .map_err(|e| ResolveError::HttpFailed {
            url: url.clone(),
            source: e,
        })?;

    if body.trim().is_empty() {
        return Err(ResolveError::EmptyResponse { url });
    }

    let info: DownloadInfo = serde_json::from_str(&body).map_err(|e| ResolveError::Decode {
        url: url.clone(),
        source: e,
    })?;

    if Url::parse(&info.source_url).is_err() {
        return Err(ResolveError::InvalidSourceUrl {
            url,
            source_url: info.source_url,
        });
    }

    debug!(track = %track.display_name(), source = %info.source_url, "Download resolved");
    Ok(info)
}
