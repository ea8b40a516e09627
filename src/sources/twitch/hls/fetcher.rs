use super::{parser::parse_m3u8, types::Playlist};
use crate::common::types::AnyResult;

/// Loads and parses the playlist at `url`.
pub async fn fetch_playlist(client: &reqwest::Client, url: &str) -> AnyResult<Playlist> {
    let res = client
        .get(url)
        .header("Accept", "application/vnd.apple.mpegurl, */*")
        .send()
        .await?;

    if !res.status().is_success() {
        return Err(format!("HLS fetch failed {}: {}", res.status(), url).into());
    }

    let text = res.text().await?;
    Ok(parse_m3u8(&text, url))
}
