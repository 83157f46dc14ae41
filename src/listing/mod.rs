mod fetch;
mod parse;

pub use fetch::{fetch_track_list, listing_url};
pub use parse::{TRACK_DATA_SELECTOR, Track, parse_track_list};
