use super::{
    types::{Playlist, Segment, Variant},
    utils::{extract_attr_str, extract_attr_u64, is_audio_only, resolve_url},
};

const TOTAL_SECS_TAG: &str = "#EXT-X-TWITCH-TOTAL-SECS:";

/// Small M3U8 parser covering what Twitch VOD playlists use.
pub fn parse_m3u8(text: &str, base_url: &str) -> Playlist {
    let lines: Vec<&str> = text.lines().map(str::trim).collect();

    if lines.iter().any(|l| l.starts_with("#EXT-X-STREAM-INF")) {
        return Playlist::Master {
            variants: parse_variants(&lines, base_url),
        };
    }

    let mut segments = Vec::new();
    let mut total_secs = None;

    for (i, line) in lines.iter().enumerate() {
        if let Some(total) = line.strip_prefix(TOTAL_SECS_TAG) {
            total_secs = total.trim().parse::<f64>().ok();
        } else if let Some(rest) = line.strip_prefix("#EXTINF:") {
            let duration = rest
                .split(',')
                .next()
                .and_then(|d| d.trim().parse::<f64>().ok())
                .unwrap_or(0.0);

            if let Some(uri) = next_uri(&lines, i + 1) {
                segments.push(Segment {
                    url: resolve_url(base_url, uri),
                    duration,
                });
            }
        }
    }

    Playlist::Media {
        segments,
        total_secs,
    }
}

fn parse_variants(lines: &[&str], base_url: &str) -> Vec<Variant> {
    let mut variants = Vec::new();
    for (i, line) in lines.iter().enumerate() {
        if !line.starts_with("#EXT-X-STREAM-INF") {
            continue;
        }
        let codecs = extract_attr_str(line, "CODECS").unwrap_or_default();
        if let Some(uri) = next_uri(lines, i + 1) {
            variants.push(Variant {
                url: resolve_url(base_url, uri),
                bandwidth: extract_attr_u64(line, "BANDWIDTH").unwrap_or(0),
                is_audio_only: is_audio_only(&codecs),
                codecs,
                group: extract_attr_str(line, "VIDEO"),
            });
        }
    }
    variants
}

/// First non-tag, non-empty line at or after `from`.
fn next_uri<'a>(lines: &[&'a str], from: usize) -> Option<&'a str> {
    lines[from.min(lines.len())..]
        .iter()
        .find(|l| !l.is_empty() && !l.starts_with('#'))
        .copied()
}
