//! Pure controller state: every transition is synchronous and checked against
//! the attempt it was issued for.

use shared::{
    domain::{ResultImage, UploadedImage},
    error::CLIENT_FALLBACK_MESSAGE,
};

pub const PROGRESS_CAP: f32 = 95.0;
pub const PROGRESS_DONE: f32 = 100.0;

/// Generation counter; bumped on every upload and every reset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AttemptId(pub u64);

impl AttemptId {
    fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ProcessingState {
    #[default]
    Idle,
    Previewing,
    Processing,
    Succeeded,
    Failed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ControllerSnapshot {
    pub phase: ProcessingState,
    pub attempt: AttemptId,
    pub progress: f32,
    pub filename: Option<String>,
    pub has_preview: bool,
    pub result: Option<ResultImage>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ControllerState {
    phase: ProcessingState,
    attempt: AttemptId,
    upload: Option<UploadedImage>,
    preview: Option<String>,
    progress: f32,
    result: Option<ResultImage>,
    error: Option<String>,
}

impl ControllerState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> ProcessingState {
        self.phase
    }

    pub fn attempt(&self) -> AttemptId {
        self.attempt
    }

    pub fn progress(&self) -> f32 {
        self.progress
    }

    pub fn upload(&self) -> Option<&UploadedImage> {
        self.upload.as_ref()
    }

    pub fn preview(&self) -> Option<&str> {
        self.preview.as_deref()
    }

    pub fn result(&self) -> Option<&ResultImage> {
        self.result.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_current(&self, attempt: AttemptId) -> bool {
        self.attempt == attempt
    }

    pub fn is_processing(&self) -> bool {
        self.phase == ProcessingState::Processing
    }

    /// Starts a new attempt, superseding whatever was in flight.
    pub fn select(&mut self, image: UploadedImage) -> AttemptId {
        self.attempt = self.attempt.next();
        self.phase = ProcessingState::Previewing;
        self.upload = Some(image);
        self.preview = None;
        self.progress = 0.0;
        self.result = None;
        self.error = None;
        self.attempt
    }

    pub fn preview_loaded(&mut self, attempt: AttemptId, data_uri: String) -> bool {
        if !self.is_current(attempt) || self.phase != ProcessingState::Previewing {
            return false;
        }
        self.preview = Some(data_uri);
        true
    }

    pub fn begin_processing(&mut self, attempt: AttemptId) -> bool {
        if !self.is_current(attempt) || self.phase != ProcessingState::Previewing {
            return false;
        }
        self.phase = ProcessingState::Processing;
        self.progress = 0.0;
        true
    }

    /// Returns the new value when the increment was applied.
    pub fn advance_progress(&mut self, attempt: AttemptId, increment: f32) -> Option<f32> {
        if !self.is_current(attempt) || !self.is_processing() || self.progress >= PROGRESS_CAP {
            return None;
        }
        let next = (self.progress + increment.max(0.0)).min(PROGRESS_CAP);
        if next <= self.progress {
            return None;
        }
        self.progress = next;
        Some(next)
    }

    pub fn complete_progress(&mut self, attempt: AttemptId) -> bool {
        if !self.is_current(attempt) || !self.is_processing() {
            return false;
        }
        self.progress = PROGRESS_DONE;
        true
    }

    /// Leaves Processing with either a result or an error, never both.
    pub fn settle(&mut self, attempt: AttemptId, outcome: Result<ResultImage, String>) -> bool {
        if !self.is_current(attempt) || !self.is_processing() {
            return false;
        }
        match outcome {
            Ok(result) => {
                self.progress = PROGRESS_DONE;
                self.result = Some(result);
                self.error = None;
                self.phase = ProcessingState::Succeeded;
            }
            Err(message) => {
                let message = message.trim();
                self.error = Some(if message.is_empty() {
                    CLIENT_FALLBACK_MESSAGE.to_string()
                } else {
                    message.to_string()
                });
                self.result = None;
                self.phase = ProcessingState::Failed;
            }
        }
        true
    }

    /// Refused while processing; otherwise clears everything back to Idle.
    pub fn reset(&mut self) -> bool {
        if self.is_processing() {
            return false;
        }
        self.attempt = self.attempt.next();
        self.phase = ProcessingState::Idle;
        self.upload = None;
        self.preview = None;
        self.progress = 0.0;
        self.result = None;
        self.error = None;
        true
    }

    pub fn can_download(&self) -> bool {
        self.result.is_some() && !self.is_processing()
    }

    pub fn snapshot(&self) -> ControllerSnapshot {
        ControllerSnapshot {
            phase: self.phase,
            attempt: self.attempt,
            progress: self.progress,
            filename: self.upload.as_ref().map(|image| image.filename.clone()),
            has_preview: self.preview.is_some(),
            result: self.result.clone(),
            error: self.error.clone(),
        }
    }
}

#[cfg(test)]
#[path = "tests/state_tests.rs"]
mod tests;
