use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;
use thiserror::Error;
use time::{OffsetDateTime, format_description::well_known::{Rfc2822, Rfc3339}};

static DURATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:(\d+)h)?(?:(\d+)m)?(?:(\d+)s)?$").expect("static duration pattern")
});

static HM_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new("[hm]").expect("static pattern"));

/// A record from the upstream API that lacks a field we rely on.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("malformed {kind} record: missing or invalid `{field}`")]
pub struct MalformedRecord {
    pub kind: &'static str,
    pub field: &'static str,
}

fn required(v: &Value, kind: &'static str, field: &'static str) -> Result<String, MalformedRecord> {
    match v.get(field).and_then(Value::as_str) {
        Some(s) if !s.is_empty() => Ok(s.to_string()),
        _ => Err(MalformedRecord { kind, field }),
    }
}

fn optional(v: &Value, field: &str) -> Option<String> {
    v.get(field)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Channel {
    pub id: String,
    pub login: String,
    pub display_name: String,
    pub profile_image_url: String,
}

impl TryFrom<&Value> for Channel {
    type Error = MalformedRecord;

    fn try_from(v: &Value) -> Result<Self, Self::Error> {
        const KIND: &str = "channel";
        let id = required(v, KIND, "id")?;
        let display_name = required(v, KIND, "display_name")?;
        Ok(Self {
            login: optional(v, "login").unwrap_or_else(|| display_name.to_lowercase()),
            profile_image_url: optional(v, "profile_image_url").unwrap_or_default(),
            id,
            display_name,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Video {
    pub id: String,
    /// Set while the broadcast that produced this video may still be running.
    pub stream_id: Option<String>,
    pub title: String,
    pub description: String,
    pub created_at: OffsetDateTime,
    pub published_at: Option<String>,
    pub url: String,
    pub thumbnail_url: String,
    /// Raw duration as delivered, e.g. `1h2m3s`.
    pub duration: String,
    pub video_type: Option<String>,
}

impl TryFrom<&Value> for Video {
    type Error = MalformedRecord;

    fn try_from(v: &Value) -> Result<Self, Self::Error> {
        const KIND: &str = "video";
        let created_raw = required(v, KIND, "created_at")?;
        let created_at = OffsetDateTime::parse(&created_raw, &Rfc3339).map_err(|_| MalformedRecord {
            kind: KIND,
            field: "created_at",
        })?;

        let duration = required(v, KIND, "duration")?;
        if parse_duration(&duration).is_none() {
            return Err(MalformedRecord {
                kind: KIND,
                field: "duration",
            });
        }

        Ok(Self {
            id: required(v, KIND, "id")?,
            stream_id: optional(v, "stream_id"),
            title: optional(v, "title").unwrap_or_default(),
            description: optional(v, "description").unwrap_or_default(),
            created_at,
            published_at: optional(v, "published_at"),
            url: required(v, KIND, "url")?,
            thumbnail_url: optional(v, "thumbnail_url").unwrap_or_default(),
            duration,
            video_type: optional(v, "type"),
        })
    }
}

impl Video {
    /// Length in whole seconds.
    pub fn duration_secs(&self) -> u64 {
        parse_duration(&self.duration).unwrap_or(0)
    }

    /// `1h2m3s` becomes `1:2:3`.
    pub fn itunes_duration(&self) -> String {
        HM_RE.replace_all(&self.duration, ":").replace('s', "")
    }

    pub fn pub_date(&self) -> String {
        self.created_at.format(&Rfc2822).unwrap_or_default()
    }

    pub fn thumbnail(&self) -> String {
        self.thumbnail_url
            .replace("%{width}", "512")
            .replace("%{height}", "288")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveStream {
    pub id: String,
    pub user_login: Option<String>,
    pub stream_type: Option<String>,
}

impl TryFrom<&Value> for LiveStream {
    type Error = MalformedRecord;

    fn try_from(v: &Value) -> Result<Self, Self::Error> {
        Ok(Self {
            id: required(v, "stream", "id")?,
            user_login: optional(v, "user_login"),
            stream_type: optional(v, "type"),
        })
    }
}

/// Parses `XhYmZs` (each part optional) into seconds.
pub fn parse_duration(raw: &str) -> Option<u64> {
    if raw.is_empty() {
        return None;
    }
    let caps = DURATION_RE.captures(raw)?;
    let part = |i: usize| {
        caps.get(i)
            .and_then(|m| m.as_str().parse::<u64>().ok())
            .unwrap_or(0)
    };
    Some(part(1) * 3600 + part(2) * 60 + part(3))
}
