pub mod process;
pub mod range;
pub mod session;

use std::{io, sync::Arc};

use bytes::{Bytes, BytesMut};
use futures::Stream;
use thiserror::Error;
use tokio::{
    io::AsyncReadExt,
    process::{ChildStderr, ChildStdout},
    task::JoinHandle,
};
use tracing::{debug, error, info, warn};

pub use process::{FfmpegLauncher, Launcher, TranscodeJob};
pub use range::{RangeNotSatisfiable, StreamPlan, estimated_bytes, parse_range_start, plan_stream};
pub use session::{ActiveProcess, SessionRegistry};

use crate::{
    common::types::SessionId,
    configs::TranscodeConfig,
    sources::{BoxedResolver, ResolveError, twitch::resolver::playlist_duration},
};

/// Bytes forwarded per read of the transcoder's stdout.
pub const CHUNK_SIZE: usize = 16 * 1024;
const STDERR_LIMIT: usize = 8 * 1024;

#[derive(Debug, Error)]
pub enum TranscodeError {
    #[error(transparent)]
    NoMediaStream(#[from] ResolveError),
    #[error("could not read source playlist: {0}")]
    Playlist(String),
    #[error(transparent)]
    Range(#[from] RangeNotSatisfiable),
    #[error("failed to start transcoder: {0}")]
    Spawn(#[source] io::Error),
}

/// A transcode that has been sized and positioned but not started.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedTranscode {
    pub video_id: String,
    pub input_url: String,
    pub duration_secs: f64,
    pub plan: StreamPlan,
}

pub fn video_page_url(video_id: &str) -> String {
    format!("https://www.twitch.tv/videos/{video_id}")
}

/// Owns the per-session transcoder lifecycle.
pub struct TranscodeManager {
    resolver: BoxedResolver,
    http: reqwest::Client,
    launcher: Arc<dyn Launcher>,
    registry: Arc<SessionRegistry>,
    config: TranscodeConfig,
}

impl TranscodeManager {
    pub fn new(
        resolver: BoxedResolver,
        http: reqwest::Client,
        launcher: Arc<dyn Launcher>,
        config: TranscodeConfig,
    ) -> Self {
        Self {
            resolver,
            http,
            launcher,
            registry: Arc::new(SessionRegistry::new()),
            config,
        }
    }

    pub fn config(&self) -> &TranscodeConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// Resolves the source, reads its length and positions `range_start`
    /// inside the estimated output. Starts nothing.
    pub async fn prepare(
        &self,
        video_id: &str,
        range_start: Option<u64>,
    ) -> Result<PreparedTranscode, TranscodeError> {
        // Straight to the resolver: playlist URLs carry short-lived tokens.
        let input_url = self.resolver.resolve(&video_page_url(video_id)).await?;
        let duration_secs = playlist_duration(&self.http, &input_url)
            .await
            .map_err(|e| TranscodeError::Playlist(e.to_string()))?;
        let plan = plan_stream(duration_secs, self.config.bitrate_bps(), range_start)?;

        debug!(
            "Prepared transcode of {}: {:.0}s, ~{} bytes, start {}s",
            video_id, duration_secs, plan.total_bytes, plan.start_secs
        );
        Ok(PreparedTranscode {
            video_id: video_id.to_string(),
            input_url,
            duration_secs,
            plan,
        })
    }

    /// Replaces whatever the session is running with a transcode of `prepared`.
    ///
    /// Nothing is awaited between registering the new process and handing
    /// out its `TranscodeOutput`, so a cancelled request cannot leave an
    /// unowned process in the registry.
    pub async fn launch(
        &self,
        session: &SessionId,
        prepared: &PreparedTranscode,
    ) -> Result<TranscodeOutput, TranscodeError> {
        if let Some(previous) = self.registry.take(session) {
            info!(
                "Session {} switched from video {} to {}, stopping previous transcode",
                session, previous.video_id, prepared.video_id
            );
            previous.stop();
        }

        let job = TranscodeJob {
            input_url: prepared.input_url.clone(),
            start_secs: prepared.plan.start_secs,
            bitrate_kbps: self.config.bitrate_kbps,
            max_bandwidth_kbps: self.config.max_bandwidth_kbps,
            buffer_seconds: self.config.buffer_seconds,
        };
        let mut child = self.launcher.launch(&job).map_err(TranscodeError::Spawn)?;

        let stdout = match child.stdout.take() {
            Some(stdout) => stdout,
            None => {
                let _ = child.start_kill();
                return Err(TranscodeError::Spawn(io::Error::other(
                    "transcoder stdout is not piped",
                )));
            }
        };
        let stderr_task = child.stderr.take().map(|s| tokio::spawn(read_capped(s)));

        let (generation, displaced) =
            self.registry
                .register(session.clone(), prepared.video_id.clone(), child);
        let output = TranscodeOutput {
            stdout,
            stderr_task,
            registry: self.registry.clone(),
            session: session.clone(),
            video_id: prepared.video_id.clone(),
            generation,
            finished: false,
        };
        if let Some(displaced) = displaced {
            debug!(
                "Concurrent start on session {} displaced video {}",
                session, displaced.video_id
            );
            displaced.stop();
        }

        info!(
            "Started transcode of {} for session {} at {}s",
            prepared.video_id, session, job.start_secs
        );
        Ok(output)
    }
}

/// Drains stderr so the transcoder never blocks on a full pipe, keeping the
/// last `STDERR_LIMIT` bytes.
async fn read_capped(mut stderr: ChildStderr) -> String {
    let mut tail = Vec::with_capacity(STDERR_LIMIT);
    let mut buf = [0u8; 4096];
    loop {
        match stderr.read(&mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                tail.extend_from_slice(&buf[..n]);
                if tail.len() > STDERR_LIMIT {
                    tail.drain(..tail.len() - STDERR_LIMIT);
                }
            }
        }
    }
    String::from_utf8_lossy(&tail).into_owned()
}

/// The transcoder's stdout as a sequence of chunks. Dropping it before the
/// end kills the process.
pub struct TranscodeOutput {
    stdout: ChildStdout,
    stderr_task: Option<JoinHandle<String>>,
    registry: Arc<SessionRegistry>,
    session: SessionId,
    video_id: String,
    generation: u64,
    finished: bool,
}

impl TranscodeOutput {
    pub async fn next_chunk(&mut self) -> Option<io::Result<Bytes>> {
        if self.finished {
            return None;
        }

        let mut buf = BytesMut::with_capacity(CHUNK_SIZE);
        match self.stdout.read_buf(&mut buf).await {
            Ok(0) => {
                self.finish().await;
                None
            }
            Ok(_) => Some(Ok(buf.freeze())),
            Err(e) => {
                warn!("Reading transcoder output for {} failed: {}", self.video_id, e);
                self.abort();
                Some(Err(e))
            }
        }
    }

    pub fn into_stream(self) -> impl Stream<Item = io::Result<Bytes>> + Send + 'static {
        futures::stream::unfold(self, |mut output| async move {
            output.next_chunk().await.map(|chunk| (chunk, output))
        })
    }

    async fn finish(&mut self) {
        let released = self.registry.release(&self.session, self.generation);
        self.finished = true;

        let stderr = match self.stderr_task.take() {
            Some(task) => task.await.unwrap_or_default(),
            None => String::new(),
        };

        let Some(mut process) = released else {
            debug!("Transcode of {} for session {} was superseded", self.video_id, self.session);
            return;
        };

        match process.child.wait().await {
            Ok(status) if status.success() => {
                info!("Transcode of {} for session {} finished", self.video_id, self.session);
            }
            Ok(status) => {
                error!(
                    "Transcoder for {} exited with {}: {}",
                    self.video_id,
                    status,
                    stderr.trim()
                );
            }
            Err(e) => error!("Could not reap transcoder for {}: {}", self.video_id, e),
        }
    }

    fn abort(&mut self) {
        self.finished = true;
        if let Some(task) = self.stderr_task.take() {
            task.abort();
        }
        if let Some(mut process) = self.registry.release(&self.session, self.generation) {
            process.kill();
        }
    }
}

impl Drop for TranscodeOutput {
    fn drop(&mut self) {
        if !self.finished {
            info!(
                "Client left transcode of {} for session {}, stopping",
                self.video_id, self.session
            );
            self.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;
    use futures::FutureExt;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{method, path},
    };

    use super::*;
    use crate::{common::http::HttpClient, sources::MediaResolver};

    struct FixedResolver(String);

    #[async_trait]
    impl MediaResolver for FixedResolver {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn resolve(&self, _video_url: &str) -> Result<String, ResolveError> {
            Ok(self.0.clone())
        }
    }

    /// Runs a shell snippet instead of ffmpeg.
    #[cfg(unix)]
    struct ShellLauncher(&'static str);

    #[cfg(unix)]
    impl Launcher for ShellLauncher {
        fn launch(&self, _job: &TranscodeJob) -> io::Result<tokio::process::Child> {
            tokio::process::Command::new("sh")
                .arg("-c")
                .arg(self.0)
                .stdin(std::process::Stdio::null())
                .stdout(std::process::Stdio::piped())
                .stderr(std::process::Stdio::piped())
                .kill_on_drop(true)
                .spawn()
        }
    }

    fn manager(input_url: &str, launcher: Arc<dyn Launcher>) -> TranscodeManager {
        TranscodeManager::new(
            Arc::new(FixedResolver(input_url.to_string())),
            HttpClient::media().unwrap(),
            launcher,
            TranscodeConfig::default(),
        )
    }

    fn prepared() -> PreparedTranscode {
        PreparedTranscode {
            video_id: "123".into(),
            input_url: "https://cdn.example/audio_only/index-dvr.m3u8".into(),
            duration_secs: 3723.0,
            plan: plan_stream(3723.0, 64_000, None).unwrap(),
        }
    }

    async fn playlist_server() -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/audio_only/index-dvr.m3u8"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                "#EXTM3U\n#EXT-X-TWITCH-TOTAL-SECS:3723\n#EXTINF:10.0,\n0.ts\n#EXT-X-ENDLIST\n",
            ))
            .mount(&server)
            .await;
        server
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn prepare_sizes_and_positions_the_output() {
        let server = playlist_server().await;
        let manager = manager(
            &format!("{}/audio_only/index-dvr.m3u8", server.uri()),
            Arc::new(ShellLauncher("true")),
        );

        let full = manager.prepare("123", Some(0)).await.unwrap();
        assert_eq!(full.plan.total_bytes, 29_784_000);
        assert!(!full.plan.partial);

        let half = manager.prepare("123", Some(14_892_000)).await.unwrap();
        assert_eq!(half.plan.start_secs, 1862);
        assert!(half.plan.partial);

        let err = manager.prepare("123", Some(29_784_000)).await.unwrap_err();
        assert!(matches!(err, TranscodeError::Range(_)));
        assert_eq!(manager.registry().active_count(), 0);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn forwards_output_and_unregisters_on_exit() {
        let manager = manager("unused", Arc::new(ShellLauncher("printf 'ID3hello'")));
        let session = SessionId::generate();

        let mut output = manager.launch(&session, &prepared()).await.unwrap();
        let mut body = Vec::new();
        while let Some(chunk) = output.next_chunk().await {
            body.extend_from_slice(&chunk.unwrap());
        }

        assert_eq!(body, b"ID3hello");
        assert_eq!(manager.registry().active_count(), 0);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn failing_transcoder_is_cleaned_up() {
        let manager = manager("unused", Arc::new(ShellLauncher("echo broken >&2; exit 3")));
        let session = SessionId::generate();

        let mut output = manager.launch(&session, &prepared()).await.unwrap();
        assert!(output.next_chunk().await.is_none());
        assert_eq!(manager.registry().active_count(), 0);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn second_start_supersedes_the_first() {
        let manager = manager("unused", Arc::new(ShellLauncher("exec sleep 30")));
        let session = SessionId::generate();

        let mut first = manager.launch(&session, &prepared()).await.unwrap();
        let _second = manager.launch(&session, &prepared()).await.unwrap();

        let ended = tokio::time::timeout(Duration::from_secs(5), first.next_chunk()).await;
        assert!(matches!(ended, Ok(None)));
        assert_eq!(manager.registry().active_count(), 1);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn superseding_launch_cannot_be_cancelled_half_way() {
        let manager = Arc::new(manager("unused", Arc::new(ShellLauncher("exec sleep 30"))));
        let session = SessionId::generate();
        let first = manager.launch(&session, &prepared()).await.unwrap();

        // Completes on its first poll: there is no await point a dropped
        // request could stop at after the new process is registered.
        let second = manager
            .launch(&session, &prepared())
            .now_or_never()
            .expect("launch finished without yielding")
            .unwrap();
        assert_eq!(manager.registry().active_count(), 1);

        // A request aborted while holding the superseding output.
        let task = {
            let manager = manager.clone();
            let session = session.clone();
            tokio::spawn(async move {
                let _output = manager.launch(&session, &prepared()).await;
                std::future::pending::<()>().await;
            })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        task.abort();
        let _ = task.await;
        assert_eq!(manager.registry().active_count(), 0);

        drop(second);
        drop(first);
        assert_eq!(manager.registry().active_count(), 0);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn dropping_the_output_stops_the_process() {
        let manager = manager("unused", Arc::new(ShellLauncher("exec sleep 30")));
        let session = SessionId::generate();

        let output = manager.launch(&session, &prepared()).await.unwrap();
        assert_eq!(manager.registry().active_count(), 1);
        drop(output);
        assert_eq!(manager.registry().active_count(), 0);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn separate_sessions_run_side_by_side() {
        let manager = manager("unused", Arc::new(ShellLauncher("exec sleep 30")));
        let _a = manager.launch(&SessionId::generate(), &prepared()).await.unwrap();
        let _b = manager.launch(&SessionId::generate(), &prepared()).await.unwrap();
        assert_eq!(manager.registry().active_count(), 2);
    }
}
