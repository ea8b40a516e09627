use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct TranscodeConfig {
    /// Emit transcode-proxy links by default and serve `/transcode`.
    #[serde(default)]
    pub enabled: bool,
    /// Target mp3 bitrate in kbit/s.
    #[serde(default = "default_bitrate_kbps")]
    pub bitrate_kbps: u32,
    /// Encoder rate-control buffer, in seconds of output.
    #[serde(default = "default_buffer_seconds")]
    pub buffer_seconds: u32,
    /// Upper bound on output rate in kbit/s.
    #[serde(default = "default_max_bandwidth_kbps")]
    pub max_bandwidth_kbps: u32,
    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: String,
}

impl Default for TranscodeConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            bitrate_kbps: default_bitrate_kbps(),
            buffer_seconds: default_buffer_seconds(),
            max_bandwidth_kbps: default_max_bandwidth_kbps(),
            ffmpeg_path: default_ffmpeg_path(),
        }
    }
}

impl TranscodeConfig {
    pub fn bitrate_bps(&self) -> u64 {
        u64::from(self.bitrate_kbps) * 1000
    }
}

fn default_bitrate_kbps() -> u32 {
    64
}

fn default_buffer_seconds() -> u32 {
    10
}

fn default_max_bandwidth_kbps() -> u32 {
    256
}

fn default_ffmpeg_path() -> String {
    "ffmpeg".to_string()
}
