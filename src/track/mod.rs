mod download;
mod filename;
mod resolve;

pub use download::{TransferContext, TransferResult, download_track, partial_path};
pub use filename::{output_file_name, sanitize_file_name};
pub use resolve::{DEFAULT_EXTENSION, DownloadInfo, resolve_download, source_endpoint};
