use super::*;
use std::{
    collections::VecDeque,
    sync::atomic::{AtomicUsize, Ordering},
};

use async_trait::async_trait;
use shared::error::CLIENT_FALLBACK_MESSAGE;
use tokio::sync::broadcast::error::TryRecvError;

use crate::state::{ProcessingState, PROGRESS_CAP};

enum Reply {
    Image(&'static str),
    Rejected(u16, Option<&'static str>),
}

struct ScriptedRelay {
    script: std::sync::Mutex<VecDeque<(Duration, Reply)>>,
    calls: AtomicUsize,
}

impl ScriptedRelay {
    fn new(script: Vec<(Duration, Reply)>) -> Self {
        Self {
            script: std::sync::Mutex::new(script.into()),
            calls: AtomicUsize::new(0),
        }
    }

    fn single(delay: Duration, reply: Reply) -> Self {
        Self::new(vec![(delay, reply)])
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RelayClient for ScriptedRelay {
    async fn remove_background(&self, _image: &UploadedImage) -> Result<ResultImage, ClientError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let (delay, reply) = self
            .script
            .lock()
            .expect("script lock")
            .pop_front()
            .expect("unexpected relay call");
        tokio::time::sleep(delay).await;
        match reply {
            Reply::Image(payload) => Ok(ResultImage::from_png_base64(payload)),
            Reply::Rejected(status, message) => Err(ClientError::Relay {
                status,
                message: message.map(str::to_string),
            }),
        }
    }
}

fn cat() -> UploadedImage {
    UploadedImage::new("cat.jpg", "image/jpeg", b"\xff\xd8jpeg".to_vec())
}

fn drain(rx: &mut broadcast::Receiver<SessionEvent>) -> Vec<SessionEvent> {
    let mut events = Vec::new();
    loop {
        match rx.try_recv() {
            Ok(event) => events.push(event),
            Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return events,
            Err(TryRecvError::Lagged(skipped)) => panic!("lagged by {skipped} events"),
        }
    }
}

#[tokio::test(start_paused = true)]
async fn cat_upload_ends_succeeded_with_png_data_uri() {
    let session = RemovalSession::new(ScriptedRelay::single(
        Duration::from_millis(1200),
        Reply::Image("AAAA"),
    ));

    let snapshot = session.submit(Some(cat())).await;

    assert_eq!(snapshot.phase, ProcessingState::Succeeded);
    assert_eq!(
        snapshot.result.as_ref().map(ResultImage::as_data_uri),
        Some("data:image/png;base64,AAAA")
    );
    assert!(snapshot.error.is_none());
    assert_eq!(snapshot.progress, PROGRESS_DONE);
    assert!(!session.timers_running().await);
}

#[tokio::test(start_paused = true)]
async fn no_selection_sends_nothing_and_stays_idle() {
    let session = RemovalSession::new(ScriptedRelay::new(Vec::new()));
    let mut rx = session.subscribe();

    let snapshot = session.submit(None).await;

    assert_eq!(snapshot.phase, ProcessingState::Idle);
    assert_eq!(session.relay.calls(), 0);
    assert!(drain(&mut rx).is_empty());
}

#[tokio::test(start_paused = true)]
async fn provider_rejection_ends_failed_with_its_message() {
    let session = RemovalSession::new(ScriptedRelay::single(
        Duration::from_millis(300),
        Reply::Rejected(400, Some("Insufficient credits")),
    ));

    let snapshot = session.submit(Some(cat())).await;

    assert_eq!(snapshot.phase, ProcessingState::Failed);
    assert_eq!(snapshot.error.as_deref(), Some("Insufficient credits"));
    assert!(snapshot.result.is_none());
    assert!(!session.timers_running().await);
}

#[tokio::test(start_paused = true)]
async fn rejection_without_message_uses_fallback() {
    let session = RemovalSession::new(ScriptedRelay::single(
        Duration::from_millis(300),
        Reply::Rejected(500, None),
    ));

    let snapshot = session.submit(Some(cat())).await;

    assert_eq!(snapshot.phase, ProcessingState::Failed);
    assert_eq!(snapshot.error.as_deref(), Some(CLIENT_FALLBACK_MESSAGE));
}

#[tokio::test(start_paused = true)]
async fn progress_climbs_monotonically_and_hits_100_before_success() {
    let session = RemovalSession::new(ScriptedRelay::single(
        Duration::from_secs(5),
        Reply::Image("AAAA"),
    ));
    let mut rx = session.subscribe();

    session.submit(Some(cat())).await;
    let events = drain(&mut rx);

    let progress: Vec<f32> = events
        .iter()
        .filter_map(|event| match event {
            SessionEvent::Progress { value, .. } => Some(*value),
            SessionEvent::StateChanged(_) => None,
        })
        .collect();
    assert!(progress.len() >= 2, "timers never ticked: {progress:?}");
    assert!(progress.windows(2).all(|pair| pair[0] <= pair[1]));
    assert!(progress.iter().all(|value| (0.0..=100.0).contains(value)));
    assert!(progress[..progress.len() - 1]
        .iter()
        .all(|value| *value <= PROGRESS_CAP));
    assert_eq!(progress.last().copied(), Some(PROGRESS_DONE));

    let done_at = events
        .iter()
        .position(|event| matches!(event, SessionEvent::Progress { value, .. } if *value == PROGRESS_DONE))
        .expect("progress reached 100");
    let succeeded_at = events
        .iter()
        .position(|event| {
            matches!(event, SessionEvent::StateChanged(snapshot) if snapshot.phase == ProcessingState::Succeeded)
        })
        .expect("succeeded");
    assert!(done_at < succeeded_at);
}

#[tokio::test(start_paused = true)]
async fn timers_stop_once_processing_ends() {
    let session = RemovalSession::new(ScriptedRelay::single(
        Duration::from_secs(2),
        Reply::Rejected(400, Some("nope")),
    ));
    let mut rx = session.subscribe();

    let settled = session.submit(Some(cat())).await;
    drain(&mut rx);

    tokio::time::sleep(Duration::from_secs(10)).await;

    assert!(drain(&mut rx).is_empty());
    assert_eq!(session.snapshot().await.progress, settled.progress);
}

#[tokio::test(start_paused = true)]
async fn reset_is_refused_while_processing_and_clears_afterwards() {
    let session = Arc::new(RemovalSession::new(ScriptedRelay::single(
        Duration::from_secs(2),
        Reply::Rejected(400, Some("Insufficient credits")),
    )));

    let running = tokio::spawn({
        let session = session.clone();
        async move { session.submit(Some(cat())).await }
    });
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(session.snapshot().await.phase, ProcessingState::Processing);
    assert!(!session.reset().await);

    let settled = running.await.expect("join");
    assert_eq!(settled.phase, ProcessingState::Failed);

    assert!(session.reset().await);
    let snapshot = session.snapshot().await;
    assert_eq!(snapshot.phase, ProcessingState::Idle);
    assert!(snapshot.filename.is_none());
    assert!(snapshot.result.is_none());
    assert!(snapshot.error.is_none());
}

#[tokio::test(start_paused = true)]
async fn late_response_of_superseded_upload_is_dropped() {
    let session = Arc::new(RemovalSession::new(ScriptedRelay::new(vec![
        (Duration::from_secs(3), Reply::Image("T0xE")),
        (Duration::from_secs(1), Reply::Image("TkVX")),
    ])));

    let first = tokio::spawn({
        let session = session.clone();
        async move { session.submit(Some(cat())).await }
    });
    tokio::time::sleep(Duration::from_millis(100)).await;

    let dog = UploadedImage::new("dog.png", "image/png", b"png".to_vec());
    let second = session.submit(Some(dog)).await;
    assert_eq!(second.phase, ProcessingState::Succeeded);

    first.await.expect("join");

    let snapshot = session.snapshot().await;
    assert_eq!(snapshot.attempt, second.attempt);
    assert_eq!(snapshot.filename.as_deref(), Some("dog.png"));
    assert_eq!(
        snapshot.result.as_ref().map(ResultImage::as_data_uri),
        Some("data:image/png;base64,TkVX")
    );
    assert_eq!(session.relay.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn download_writes_decoded_result_under_fixed_name() {
    let session = RemovalSession::new(ScriptedRelay::single(
        Duration::from_millis(200),
        Reply::Image("aGVsbG8="),
    ));
    let dir = tempfile::tempdir().expect("tempdir");

    let err = session.download(dir.path()).await.expect_err("nothing yet");
    assert!(matches!(err, ClientError::NothingToDownload));

    session.submit(Some(cat())).await;
    let path = session.download(dir.path()).await.expect("download");

    assert_eq!(path, dir.path().join("imagem-sem-fundo.png"));
    assert_eq!(std::fs::read(&path).expect("read"), b"hello");
}

#[tokio::test(start_paused = true)]
async fn superseded_attempt_cannot_replace_current_timers() {
    let session = RemovalSession::new(ScriptedRelay::new(Vec::new()));
    let (stale, current) = {
        let mut state = session.state.lock().await;
        let stale = state.select(cat());
        let current = state.select(cat());
        (stale, current)
    };

    session.start_timers(current).await;
    session.start_timers(stale).await;

    let installed = session.timers.lock().await.as_ref().map(ProgressTimers::attempt);
    assert_eq!(installed, Some(current));
}

#[tokio::test(start_paused = true)]
async fn timers_are_not_started_for_a_superseded_attempt() {
    let session = RemovalSession::new(ScriptedRelay::new(Vec::new()));
    let stale = {
        let mut state = session.state.lock().await;
        let stale = state.select(cat());
        state.select(cat());
        stale
    };

    session.start_timers(stale).await;

    assert!(!session.timers_running().await);
}
