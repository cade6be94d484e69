//! Client side of the background remover: the upload/display state machine,
//! its simulated progress, and the relay it talks to.

pub mod error;
mod files;
mod progress;
pub mod relay_client;
pub mod session;
pub mod state;

pub use error::ClientError;
pub use files::{load_image, DOWNLOAD_FILENAME};
pub use progress::{COARSE_MAX_STEP, COARSE_TICK, FINE_MAX_STEP, FINE_TICK};
pub use relay_client::{HttpRelayClient, RelayClient};
pub use session::{RemovalSession, SessionEvent, SETTLE_DELAY};
pub use state::{
    AttemptId, ControllerSnapshot, ControllerState, ProcessingState, PROGRESS_CAP, PROGRESS_DONE,
};
