// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! End-to-end runs against a mock site using the real reqwest transport.

use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;
use trackpull::{
    NoopReporter, ResilientFetcher, RetryPolicy, RunConfig, RunError, Session, SiteConfig,
    Sleeper, TransportConfig, download_tracks,
};
use url::Url;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const BOOTSTRAP_REFERER: &str = "https://www.google.ca";

/// Sleeper that returns immediately
struct NoSleep;

#[async_trait]
impl Sleeper for NoSleep {
    async fn sleep(&self, _duration: Duration) {}
}

fn listing_page(tracks: &str) -> String {
    format!(
        r#"<html><body><script type="application/json" id="displayList-data">{{"tracks":[{tracks}]}}</script></body></html>"#
    )
}

fn session_for(server: &MockServer) -> Session<trackpull::ReqwestClient> {
    let site = SiteConfig::new(Url::parse(&server.uri()).unwrap()).unwrap();
    Session::connect(&TransportConfig::default(), site).unwrap()
}

fn fetcher() -> ResilientFetcher<NoSleep> {
    ResilientFetcher::with_sleeper(RetryPolicy::default(), NoSleep)
}

fn config(limit: usize) -> RunConfig {
    RunConfig {
        account: "testartist".to_string(),
        page: 1,
        limit,
    }
}

async fn mount_bootstrap(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/"))
        .and(header("referer", BOOTSTRAP_REFERER))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("set-cookie", "AUTH=session42; Path=/")
                .set_body_string("<html><body>home</body></html>"),
        )
        .expect(1)
        .mount(server)
        .await;
}

async fn mount_listing(server: &MockServer, tracks: &str) {
    Mock::given(method("GET"))
        .and(path("/testartist/1"))
        .and(header("cookie", "AUTH=session42"))
        .and(header("referer", server.uri().as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_string(listing_page(tracks)))
        .expect(1)
        .mount(server)
        .await;
}

async fn mount_source(server: &MockServer, id: &str, key: &str, body: String) {
    let listing = format!("{}/testartist/1", server.uri());
    Mock::given(method("GET"))
        .and(path(format!("/serve/source/{id}/{key}")))
        .and(header("cookie", "AUTH=session42"))
        .and(header("referer", listing.as_str()))
        .and(header("content-type", "application/json"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

async fn mount_media(server: &MockServer, media_path: &str, status: u16, content: &[u8]) {
    Mock::given(method("GET"))
        .and(path(media_path))
        .respond_with(ResponseTemplate::new(status).set_body_bytes(content.to_vec()))
        .mount(server)
        .await;
}

#[tokio::test]
async fn downloads_listed_tracks_with_session_cookie() {
    let server = MockServer::start().await;
    mount_bootstrap(&server).await;
    mount_listing(
        &server,
        r#"{"id":"t1","key":"k1","artist":"Daft Punk","song":"Digital Love"},
           {"id":"t2","key":"k2","artist":"AC/DC","song":"Back: In Black"}"#,
    )
    .await;
    mount_source(
        &server,
        "t1",
        "k1",
        format!(r#"{{"url":"{}/media/t1","ext":"mp3"}}"#, server.uri()),
    )
    .await;
    mount_source(
        &server,
        "t2",
        "k2",
        format!(r#"{{"url":"{}/media/t2","ext":null}}"#, server.uri()),
    )
    .await;
    mount_media(&server, "/media/t1", 200, b"first track bytes").await;
    mount_media(&server, "/media/t2", 200, b"second track bytes").await;

    let output = TempDir::new().unwrap();
    let summary = download_tracks(
        &session_for(&server),
        &fetcher(),
        &config(0),
        output.path(),
        NoopReporter::shared(),
    )
    .await
    .unwrap();

    assert_eq!(summary.downloaded, 2);
    assert_eq!(summary.failed, 0);
    assert_eq!(
        std::fs::read(output.path().join("Daft Punk - Digital Love.mp3")).unwrap(),
        b"first track bytes"
    );
    assert_eq!(
        std::fs::read(output.path().join("ACDC - Back In Black.mp3")).unwrap(),
        b"second track bytes"
    );
}

#[tokio::test]
async fn failed_tracks_do_not_stop_the_run() {
    let server = MockServer::start().await;
    mount_bootstrap(&server).await;
    mount_listing(
        &server,
        r#"{"id":"t1","key":"k1","artist":"A","song":"Empty"},
           {"id":"t2","key":"k2","artist":"B","song":"Gone"},
           {"id":"t3","key":"k3","artist":"C","song":"Fine"}"#,
    )
    .await;
    mount_source(&server, "t1", "k1", String::new()).await;
    mount_source(
        &server,
        "t2",
        "k2",
        format!(r#"{{"url":"{}/media/t2","ext":"mp3"}}"#, server.uri()),
    )
    .await;
    mount_source(
        &server,
        "t3",
        "k3",
        format!(r#"{{"url":"{}/media/t3","ext":"m4a"}}"#, server.uri()),
    )
    .await;
    mount_media(&server, "/media/t2", 404, b"not found").await;
    mount_media(&server, "/media/t3", 200, b"ok").await;

    let output = TempDir::new().unwrap();
    let summary = download_tracks(
        &session_for(&server),
        &fetcher(),
        &config(0),
        output.path(),
        NoopReporter::shared(),
    )
    .await
    .unwrap();

    assert_eq!(summary.downloaded, 1);
    assert_eq!(summary.failed, 2);
    assert!(output.path().join("C - Fine.m4a").exists());
    assert!(!output.path().join("B - Gone.mp3").exists());
    assert!(!output.path().join("B - Gone.mp3.partial").exists());
}

#[tokio::test]
async fn existing_files_are_not_requested_again() {
    let server = MockServer::start().await;
    mount_bootstrap(&server).await;
    mount_listing(&server, r#"{"id":"t1","key":"k1","artist":"A","song":"One"}"#).await;
    mount_source(
        &server,
        "t1",
        "k1",
        format!(r#"{{"url":"{}/media/t1","ext":"mp3"}}"#, server.uri()),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/media/t1"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"new".to_vec()))
        .expect(0)
        .mount(&server)
        .await;

    let output = TempDir::new().unwrap();
    std::fs::write(output.path().join("A - One.mp3"), b"old").unwrap();

    let summary = download_tracks(
        &session_for(&server),
        &fetcher(),
        &config(0),
        output.path(),
        NoopReporter::shared(),
    )
    .await
    .unwrap();

    assert_eq!(summary.skipped, 1);
    assert_eq!(std::fs::read(output.path().join("A - One.mp3")).unwrap(), b"old");
}

#[tokio::test]
async fn unreachable_site_aborts_after_ten_attempts() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(500))
        .expect(10)
        .mount(&server)
        .await;

    let output = TempDir::new().unwrap();
    let output_dir = output.path().join("downloads");

    let err = download_tracks(
        &session_for(&server),
        &fetcher(),
        &config(0),
        &output_dir,
        NoopReporter::shared(),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, RunError::SessionInit(_)));
    assert!(!output_dir.exists());
}
