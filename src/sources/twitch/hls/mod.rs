pub mod fetcher;
pub mod parser;
pub mod types;
pub mod utils;

pub use fetcher::fetch_playlist;
pub use parser::parse_m3u8;
pub use types::{Playlist, Segment, Variant};
