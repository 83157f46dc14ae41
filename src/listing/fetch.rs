// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use tracing::info;
use url::Url;

use crate::error::TrackListError;
use crate::http::HttpClient;
use crate::retry::{ResilientFetcher, Sleeper};
use crate::session::{Session, SiteConfig};

use super::parse::{Track, parse_track_list};

/// URL of one listing page of an account
pub fn listing_url(site: &SiteConfig, account: &str, page: u32) -> Url {
    site.endpoint(&[account, &page.to_string()])
}

/// Fetch a listing page through the retry engine and decode its tracks
pub async fn fetch_track_list<C: HttpClient, S: Sleeper>(
    session: &Session<C>,
    fetcher: &ResilientFetcher<S>,
    account: &str,
    page: u32,
) -> Result<Vec<Track>, TrackListError> {
    let url = listing_url(session.site(), account, page).to_string();
    let options = session.request_options(Some(session.site().base_referer()));

    let fetched = fetcher
        .execute("track list", || session.fetch_text(&url, &options))
        .await?;

    let tracks = parse_track_list(&fetched.document, &url)?;

    info!(url = %url, tracks = tracks.len(), "Track list retrieved");
    Ok(tracks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{HttpResponse, RequestOptions};
    use crate::retry::RetryPolicy;
    use crate::retry::tests::RecordingSleeper;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct MockHttpClient {
        body: String,
        requests: Mutex<Vec<(String, RequestOptions)>>,
    }

    impl MockHttpClient {
        fn answering(body: &str) -> Self {
            Self {
                body: body.to_string(),
                requests: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl HttpClient for MockHttpClient {
        async fn get_text(
            &self,
            url: &str,
            options: &RequestOptions,
        ) -> Result<String, reqwest::Error> {
            self.requests
                .lock()
                .unwrap()
                .push((url.to_string(), options.clone()));
            Ok(self.body.clone())
        }

        async fn get_stream(
            &self,
            _url: &str,
            _options: &RequestOptions,
        ) -> Result<HttpResponse, reqwest::Error> {
            unreachable!("listing never streams")
        }
    }

    fn fetcher() -> ResilientFetcher<RecordingSleeper> {
        ResilientFetcher::with_sleeper(RetryPolicy::default(), RecordingSleeper::default())
    }

    const LISTING: &str = r#"<html><body><script id="displayList-data">
        {"tracks":[{"id":"t1","key":"k1","artist":"A","song":"One"},
                   {"id":"t2","key":"k2","artist":"B","song":"Two"}]}
    </script></body></html>"#;

    #[test]
    fn listing_url_uses_account_and_page() {
        let url = listing_url(&SiteConfig::default(), "testartist", 3);
        assert_eq!(url.as_str(), "http://hypem.com/testartist/3");
    }

    #[tokio::test]
    async fn fetch_requests_listing_with_base_referer() {
        let session = Session::with_client(MockHttpClient::answering(LISTING), SiteConfig::default());

        let tracks = fetch_track_list(&session, &fetcher(), "testartist", 1)
            .await
            .unwrap();

        assert_eq!(tracks.len(), 2);
        assert_eq!(tracks[1].title, "Two");

        let requests = session.client().requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].0, "http://hypem.com/testartist/1");
        assert_eq!(requests[0].1.referer.as_deref(), Some("http://hypem.com"));
    }

    #[tokio::test]
    async fn fetch_fails_after_retries_on_empty_responses() {
        let session = Session::with_client(MockHttpClient::answering(""), SiteConfig::default());

        let err = fetch_track_list(&session, &fetcher(), "testartist", 1)
            .await
            .unwrap_err();

        assert!(matches!(err, TrackListError::Exhausted(_)));
        assert_eq!(session.client().requests.lock().unwrap().len(), 10);
    }

    #[tokio::test]
    async fn fetch_fails_when_page_has_no_track_data() {
        let session = Session::with_client(
            MockHttpClient::answering("<html><body>Not found</body></html>"),
            SiteConfig::default(),
        );

        let err = fetch_track_list(&session, &fetcher(), "nobody", 1)
            .await
            .unwrap_err();

        assert!(matches!(err, TrackListError::MissingData { .. }));
        // A page without data is a successful fetch, so it is not retried
        assert_eq!(session.client().requests.lock().unwrap().len(), 1);
    }
}
