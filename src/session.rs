// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use tracing::{info, warn};
use url::Url;

use crate::error::SessionError;
use crate::http::{HttpClient, ReqwestClient, RequestOptions, TransportConfig};
use crate::retry::{ResilientFetcher, Sleeper};

/// Root of the site the tracks are listed on
pub const DEFAULT_BASE_URL: &str = "http://hypem.com/";

/// Referer sent with the bootstrap request, as if arriving from a search engine
pub const DEFAULT_BOOTSTRAP_REFERER: &str = "https://www.google.ca";

pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 6.3; WOW64; Trident/7.0; rv:11.0) like Gecko";

/// Fixed outbound identity and location of the target site
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteConfig {
    base_url: Url,
    pub bootstrap_referer: String,
    pub user_agent: String,
}

impl SiteConfig {
    /// Create a site configuration rooted at `base_url`
    pub fn new(base_url: Url) -> Result<Self, SessionError> {
        if base_url.cannot_be_a_base() {
            return Err(SessionError::InvalidBaseUrl {
                url: base_url.to_string(),
            });
        }

        Ok(Self {
            base_url,
            bootstrap_referer: DEFAULT_BOOTSTRAP_REFERER.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Build a URL below the base by appending path segments
    ///
    /// Segments are percent-encoded, so account names cannot escape the path.
    pub fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// Base URL in the form sent as a referer (no trailing slash)
    pub fn base_referer(&self) -> String {
        self.base_url.as_str().trim_end_matches('/').to_string()
    }
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            base_url: Url::parse(DEFAULT_BASE_URL).expect("default base URL is valid"),
            bootstrap_referer: DEFAULT_BOOTSTRAP_REFERER.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

/// Cookie state and identity shared by every request of a run
///
/// The cookie jar lives inside the HTTP client; every request made through
/// the session carries it and every response updates it.
pub struct Session<C: HttpClient> {
    client: C,
    site: SiteConfig,
}

impl Session<ReqwestClient> {
    /// Build the transport once and attach it to a fresh session
    pub fn connect(transport: &TransportConfig, site: SiteConfig) -> Result<Self, SessionError> {
        let client = ReqwestClient::new(transport).map_err(SessionError::ClientBuild)?;
        Ok(Self::with_client(client, site))
    }
}

impl<C: HttpClient> Session<C> {
    pub fn with_client(client: C, site: SiteConfig) -> Self {
        Self { client, site }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn site(&self) -> &SiteConfig {
        &self.site
    }

    /// Request options carrying the session identity and the given referer
    pub fn request_options(&self, referer: Option<String>) -> RequestOptions {
        RequestOptions {
            user_agent: Some(self.site.user_agent.clone()),
            referer,
            json: false,
        }
    }

    /// Visit the site root once to collect session cookies
    pub async fn bootstrap<S: Sleeper>(
        &self,
        fetcher: &ResilientFetcher<S>,
    ) -> Result<(), SessionError> {
        let url = self.site.base_url.to_string();
        let options = self.request_options(Some(self.site.bootstrap_referer.clone()));

        fetcher
            .execute("session bootstrap", || self.fetch_text(&url, &options))
            .await?;

        info!(url = %url, "Session initialized");
        Ok(())
    }

    /// Single GET whose failure is logged and reported as an absent body
    pub(crate) async fn fetch_text(&self, url: &str, options: &RequestOptions) -> Option<String> {
        match self.client.get_text(url, options).await {
            Ok(body) => Some(body),
            Err(e) => {
                warn!(url, error = %e, "Request failed");
                None
            }
        }
    }
}
