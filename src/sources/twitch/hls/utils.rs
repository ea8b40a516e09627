const AUDIO_CODECS: &[&str] = &["mp4a", "opus", "aac"];
const VIDEO_CODECS: &[&str] = &[
    "avc1", "hvc1", "hev1", "dvh1", "vp09", "av01", "vp9", "av1", "vp8", "h264", "h265", "mp4v",
];

pub fn extract_attr_u64(line: &str, key: &str) -> Option<u64> {
    extract_attr_str(line, key)?.parse().ok()
}

pub fn extract_attr_str(line: &str, key: &str) -> Option<String> {
    let key_eq = format!("{}=", key);
    // Attributes follow #TAG: or a comma
    let pos = line
        .find(&format!(":{}", key_eq))
        .or_else(|| line.find(&format!(",{}", key_eq)))?
        + 1;

    let rest = &line[pos + key_eq.len()..];

    match rest.strip_prefix('"') {
        Some(quoted) => quoted.find('"').map(|end| quoted[..end].to_string()),
        None => {
            let end = rest.find(',').unwrap_or(rest.len());
            Some(rest[..end].trim().to_string())
        }
    }
}

pub fn is_audio_only(codecs: &str) -> bool {
    AUDIO_CODECS.iter().any(|c| codecs.contains(c)) && !VIDEO_CODECS.iter().any(|c| codecs.contains(c))
}

pub fn resolve_url(base: &str, maybe_relative: &str) -> String {
    if maybe_relative.starts_with("http://") || maybe_relative.starts_with("https://") {
        return maybe_relative.to_string();
    }

    let base_clean = base.split(['?', '#']).next().unwrap_or(base);

    if maybe_relative.starts_with('/') {
        if let Some(scheme_end) = base_clean.find("://") {
            let host_start = scheme_end + 3;
            let host_end = base_clean[host_start..]
                .find('/')
                .map_or(base_clean.len(), |p| host_start + p);
            return format!("{}{}", &base_clean[..host_end], maybe_relative);
        }
    }

    let base_dir = base_clean
        .rfind('/')
        .map_or(base_clean, |i| &base_clean[..=i]);
    format!("{}{}", base_dir, maybe_relative)
}
