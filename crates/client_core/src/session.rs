use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use shared::domain::{ResultImage, UploadedImage};
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};

use crate::{
    error::ClientError,
    files::save_result,
    progress::ProgressTimers,
    relay_client::RelayClient,
    state::{AttemptId, ControllerSnapshot, ControllerState, PROGRESS_DONE},
};

/// Pause between the relay answering and the outcome being shown.
pub const SETTLE_DELAY: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Progress { attempt: AttemptId, value: f32 },
    StateChanged(ControllerSnapshot),
}

/// Drives one user's upload/display flow against a relay.
pub struct RemovalSession<R: RelayClient> {
    relay: R,
    state: Arc<Mutex<ControllerState>>,
    timers: Mutex<Option<ProgressTimers>>,
    events: broadcast::Sender<SessionEvent>,
}

impl<R: RelayClient> RemovalSession<R> {
    pub fn new(relay: R) -> Self {
        let (events, _) = broadcast::channel(256);
        Self {
            relay,
            state: Arc::new(Mutex::new(ControllerState::new())),
            timers: Mutex::new(None),
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub async fn snapshot(&self) -> ControllerSnapshot {
        self.state.lock().await.snapshot()
    }

    /// Handles a file selection. `None` means nothing was picked: no request
    /// is made and the state is left alone.
    pub async fn submit(&self, selection: Option<UploadedImage>) -> ControllerSnapshot {
        let Some(image) = selection else {
            debug!("no file selected; nothing to submit");
            return self.snapshot().await;
        };

        let attempt = {
            let mut state = self.state.lock().await;
            let attempt = state.select(image.clone());
            self.publish(&state);
            attempt
        };
        // a new upload supersedes whatever the previous attempt was doing
        self.stop_timers().await;
        debug!(attempt = attempt.0, filename = %image.filename, "image selected");

        let preview = image.preview_data_uri();
        {
            let mut state = self.state.lock().await;
            if !state.preview_loaded(attempt, preview) {
                return state.snapshot();
            }
            self.publish(&state);
        }

        self.process(attempt, image).await
    }

    async fn process(&self, attempt: AttemptId, image: UploadedImage) -> ControllerSnapshot {
        {
            let mut state = self.state.lock().await;
            if !state.begin_processing(attempt) {
                return state.snapshot();
            }
            self.publish(&state);
        }
        self.start_timers(attempt).await;

        let outcome = self.relay.remove_background(&image).await;
        self.stop_timers_for(attempt).await;

        let settled: Result<ResultImage, String> = match outcome {
            Ok(result) => {
                {
                    let mut state = self.state.lock().await;
                    if !state.complete_progress(attempt) {
                        debug!(attempt = attempt.0, "dropping superseded relay response");
                        return state.snapshot();
                    }
                    let _ = self.events.send(SessionEvent::Progress {
                        attempt,
                        value: PROGRESS_DONE,
                    });
                }
                tokio::time::sleep(SETTLE_DELAY).await;
                Ok(result)
            }
            Err(err) => {
                warn!(attempt = attempt.0, error = %err, "background removal failed");
                tokio::time::sleep(SETTLE_DELAY).await;
                Err(err.user_message())
            }
        };

        let mut state = self.state.lock().await;
        if state.settle(attempt, settled) {
            info!(attempt = attempt.0, phase = ?state.phase(), "attempt settled");
            self.publish(&state);
        } else {
            debug!(attempt = attempt.0, "dropping superseded relay response");
        }
        state.snapshot()
    }

    /// Clears the session back to Idle. Refused while processing.
    pub async fn reset(&self) -> bool {
        let reset = {
            let mut state = self.state.lock().await;
            let reset = state.reset();
            if reset {
                self.publish(&state);
            }
            reset
        };
        if reset {
            self.stop_timers().await;
        }
        reset
    }

    /// Writes the processed image into `dir` under the fixed download name.
    pub async fn download(&self, dir: &Path) -> Result<PathBuf, ClientError> {
        let result = {
            let state = self.state.lock().await;
            if !state.can_download() {
                return Err(ClientError::NothingToDownload);
            }
            state.result().cloned().ok_or(ClientError::NothingToDownload)?
        };
        let path = save_result(&result, dir).await?;
        info!(path = %path.display(), "processed image saved");
        Ok(path)
    }

    fn publish(&self, state: &ControllerState) {
        let _ = self
            .events
            .send(SessionEvent::StateChanged(state.snapshot()));
    }

    /// Installs timers only while `attempt` is still current. Lock order is
    /// slot then state.
    async fn start_timers(&self, attempt: AttemptId) {
        let mut slot = self.timers.lock().await;
        if !self.state.lock().await.is_current(attempt) {
            debug!(attempt = attempt.0, "not starting timers for superseded attempt");
            return;
        }
        *slot = Some(ProgressTimers::start(
            self.state.clone(),
            self.events.clone(),
            attempt,
        ));
    }

    async fn stop_timers(&self) {
        self.timers.lock().await.take();
    }

    async fn stop_timers_for(&self, attempt: AttemptId) {
        let mut timers = self.timers.lock().await;
        if timers.as_ref().map(ProgressTimers::attempt) == Some(attempt) {
            timers.take();
        }
    }

    #[cfg(test)]
    pub(crate) async fn timers_running(&self) -> bool {
        self.timers.lock().await.is_some()
    }
}

#[cfg(test)]
#[path = "tests/session_tests.rs"]
mod tests;
