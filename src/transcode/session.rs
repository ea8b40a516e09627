use std::{
    collections::HashMap,
    sync::atomic::{AtomicU64, Ordering},
};

use parking_lot::Mutex;
use tokio::process::Child;

use crate::common::types::SessionId;

/// A transcoder process registered to a session.
pub struct ActiveProcess {
    /// Distinguishes successive processes of the same session.
    pub generation: u64,
    pub video_id: String,
    pub child: Child,
}

impl ActiveProcess {
    /// Sends the kill signal without waiting for the exit.
    pub fn kill(&mut self) {
        let _ = self.child.start_kill();
    }

    /// Kills the process now and reaps it on a background task, so the
    /// caller never waits while holding an unregistered child.
    pub fn stop(mut self) {
        self.kill();
        tokio::spawn(async move {
            let _ = self.child.wait().await;
        });
    }
}

/// At most one live transcoder per session.
///
/// The lock is only held to swap entries; waiting on and reading from
/// processes happens outside it.
#[derive(Default)]
pub struct SessionRegistry {
    processes: Mutex<HashMap<SessionId, ActiveProcess>>,
    next_generation: AtomicU64,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Removes whatever process the session has.
    pub fn take(&self, session: &SessionId) -> Option<ActiveProcess> {
        self.processes.lock().remove(session)
    }

    /// Registers `child` for the session. Returns its generation and the
    /// process it displaced, if another launch raced in.
    pub fn register(
        &self,
        session: SessionId,
        video_id: impl Into<String>,
        child: Child,
    ) -> (u64, Option<ActiveProcess>) {
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let displaced = self.processes.lock().insert(
            session,
            ActiveProcess {
                generation,
                video_id: video_id.into(),
                child,
            },
        );
        (generation, displaced)
    }

    /// Removes the session's process only if it is still `generation`.
    pub fn release(&self, session: &SessionId, generation: u64) -> Option<ActiveProcess> {
        let mut processes = self.processes.lock();
        if processes.get(session)?.generation != generation {
            return None;
        }
        processes.remove(session)
    }

    pub fn active_count(&self) -> usize {
        self.processes.lock().len()
    }

    #[cfg(test)]
    pub(crate) fn video_of(&self, session: &SessionId) -> Option<String> {
        self.processes
            .lock()
            .get(session)
            .map(|p| p.video_id.clone())
    }
}
