pub mod error;
pub mod http;
pub mod listing;
pub mod pipeline;
pub mod progress;
pub mod retry;
pub mod session;
pub mod state;
pub mod track;

// Re-export main types for convenience
pub use error::{
    ErrorKind, ResolveError, RetryExhausted, RunError, SessionError, StateError, TrackListError,
    TransferError,
};
pub use http::{HttpClient, HttpResponse, ReqwestClient, RequestOptions, TransportConfig};
pub use listing::{Track, fetch_track_list, listing_url, parse_track_list};
pub use pipeline::{DEFAULT_OUTPUT_DIR, RunConfig, RunSummary, download_tracks, run};
pub use progress::{NoopReporter, ProgressEvent, ProgressReporter, SharedProgressReporter};
pub use retry::{FetchedPage, ResilientFetcher, RetryPolicy, Sleeper, TokioSleeper};
pub use session::{Session, SiteConfig};
pub use track::{
    DownloadInfo, download_track, output_file_name, resolve_download, sanitize_file_name,
};
