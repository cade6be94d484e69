use std::{sync::Arc, time::Duration};

use rand::Rng;
use tokio::{
    sync::{broadcast, Mutex},
    task::JoinHandle,
    time::{interval, MissedTickBehavior},
};

use crate::{
    session::SessionEvent,
    state::{AttemptId, ControllerState},
};

pub const COARSE_TICK: Duration = Duration::from_millis(500);
pub const COARSE_MAX_STEP: f32 = 15.0;
pub const FINE_TICK: Duration = Duration::from_millis(300);
pub const FINE_MAX_STEP: f32 = 5.0;

/// The two simulated-progress tickers of one attempt. Dropping the guard
/// aborts both.
pub(crate) struct ProgressTimers {
    attempt: AttemptId,
    tasks: Vec<JoinHandle<()>>,
}

impl ProgressTimers {
    pub(crate) fn start(
        state: Arc<Mutex<ControllerState>>,
        events: broadcast::Sender<SessionEvent>,
        attempt: AttemptId,
    ) -> Self {
        let tasks = [(COARSE_TICK, COARSE_MAX_STEP), (FINE_TICK, FINE_MAX_STEP)]
            .into_iter()
            .map(|(period, max_step)| {
                tokio::spawn(tick_progress(
                    state.clone(),
                    events.clone(),
                    attempt,
                    period,
                    max_step,
                ))
            })
            .collect();
        Self { attempt, tasks }
    }

    pub(crate) fn attempt(&self) -> AttemptId {
        self.attempt
    }
}

impl Drop for ProgressTimers {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

async fn tick_progress(
    state: Arc<Mutex<ControllerState>>,
    events: broadcast::Sender<SessionEvent>,
    attempt: AttemptId,
    period: Duration,
    max_step: f32,
) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // first tick completes immediately
    ticker.tick().await;

    loop {
        ticker.tick().await;
        let step = rand::thread_rng().gen_range(0.0..max_step);

        let mut guard = state.lock().await;
        if !guard.is_current(attempt) || !guard.is_processing() {
            break;
        }
        if let Some(value) = guard.advance_progress(attempt, step) {
            let _ = events.send(SessionEvent::Progress { attempt, value });
        }
    }
}
