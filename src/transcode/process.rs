use std::{io, process::Stdio};

use tokio::process::{Child, Command};

/// Everything the transcoder needs to produce one response body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscodeJob {
    pub input_url: String,
    pub start_secs: u64,
    pub bitrate_kbps: u32,
    pub max_bandwidth_kbps: u32,
    pub buffer_seconds: u32,
}

impl TranscodeJob {
    pub fn ffmpeg_args(&self) -> Vec<String> {
        let bufsize = u64::from(self.bitrate_kbps) * u64::from(self.buffer_seconds);
        [
            "-hide_banner",
            "-loglevel",
            "error",
            "-nostdin",
            "-ss",
            &self.start_secs.to_string(),
            "-i",
            &self.input_url,
            "-vn",
            "-acodec",
            "libmp3lame",
            "-b:a",
            &format!("{}k", self.bitrate_kbps),
            "-maxrate",
            &format!("{}k", self.max_bandwidth_kbps),
            "-bufsize",
            &format!("{bufsize}k"),
            "-f",
            "mp3",
            "pipe:1",
        ]
        .into_iter()
        .map(str::to_string)
        .collect()
    }
}

/// Starts the transcoder process for a job. The returned child must have
/// piped stdout and stderr.
pub trait Launcher: Send + Sync {
    fn launch(&self, job: &TranscodeJob) -> io::Result<Child>;
}

pub struct FfmpegLauncher {
    path: String,
}

impl FfmpegLauncher {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }
}

impl Launcher for FfmpegLauncher {
    fn launch(&self, job: &TranscodeJob) -> io::Result<Child> {
        Command::new(&self.path)
            .args(job.ffmpeg_args())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_seeking_mp3_pipeline() {
        let job = TranscodeJob {
            input_url: "https://cdn.example/audio_only/index-dvr.m3u8".into(),
            start_secs: 1862,
            bitrate_kbps: 64,
            max_bandwidth_kbps: 256,
            buffer_seconds: 10,
        };
        let args = job.ffmpeg_args();
        let after = |flag: &str| {
            let i = args.iter().position(|a| a == flag).unwrap();
            args[i + 1].clone()
        };

        assert_eq!(after("-ss"), "1862");
        assert_eq!(after("-i"), "https://cdn.example/audio_only/index-dvr.m3u8");
        assert_eq!(after("-b:a"), "64k");
        assert_eq!(after("-maxrate"), "256k");
        assert_eq!(after("-bufsize"), "640k");
        assert_eq!(after("-f"), "mp3");
        assert_eq!(args.last().map(String::as_str), Some("pipe:1"));
        assert!(args.iter().position(|a| a == "-ss") < args.iter().position(|a| a == "-i"));
    }
}
