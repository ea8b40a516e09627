#[derive(Clone, Debug, PartialEq)]
pub struct Segment {
    pub url: String,
    /// Seconds, from `#EXTINF`.
    pub duration: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Variant {
    pub url: String,
    pub bandwidth: u64,
    pub codecs: String,
    /// CODECS lists an audio codec and no video codec.
    pub is_audio_only: bool,
    /// Rendition group from the `VIDEO` attribute (`audio_only`, `chunked`, `720p60`, ...).
    pub group: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Playlist {
    Master {
        variants: Vec<Variant>,
    },
    Media {
        segments: Vec<Segment>,
        /// Value of `#EXT-X-TWITCH-TOTAL-SECS` when present.
        total_secs: Option<f64>,
    },
}

impl Playlist {
    /// Length of a media playlist: the provider's total when given,
    /// otherwise the sum of segment durations.
    pub fn duration_secs(&self) -> Option<f64> {
        match self {
            Playlist::Master { .. } => None,
            Playlist::Media {
                segments,
                total_secs,
            } => total_secs.or_else(|| {
                (!segments.is_empty()).then(|| segments.iter().map(|s| s.duration).sum())
            }),
        }
    }

    /// The audio-only rendition of a master playlist, or its cheapest variant.
    pub fn audio_variant(&self) -> Option<&Variant> {
        let Playlist::Master { variants } = self else {
            return None;
        };
        variants
            .iter()
            .find(|v| v.is_audio_only || v.group.as_deref() == Some("audio_only"))
            .or_else(|| variants.iter().min_by_key(|v| v.bandwidth))
    }
}
