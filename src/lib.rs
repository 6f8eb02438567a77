//! pet-watcher
//!
//! Single-node, single-camera motion watcher. The `watcherd` daemon pulls
//! frames from a camera, compares each against a rolling baseline, and when
//! a sustained change settles down it saves a snapshot and sends one email
//! with the image attached, then holds off for a cooldown window.
//!
//! # Pipeline
//!
//! Data flows strictly one way:
//!
//! ```text
//! FrameSource -> MotionDetector -> MotionDebouncer -> NotifyThrottle -> Notifier
//!                                                                    -> SnapshotWriter
//! ```
//!
//! - `ingest`: camera sources (HTTP still/MJPEG, V4L2, synthetic stub)
//! - `detect`: frame differencing against a baseline, region extraction
//! - `debounce`: one trigger event per motion episode, on the trailing edge
//! - `throttle`: cooldown between outbound notifications
//! - `notify`: SMTP delivery with the snapshot attached
//! - `snapshot` / `state`: JPEG persistence and the last-notified ledger
//! - `watcher`: the sequential loop tying the stages together

pub mod config;
pub mod debounce;
pub mod detect;
pub mod frame;
pub mod ingest;
pub mod notify;
pub mod snapshot;
pub mod state;
pub mod throttle;
pub mod watcher;

pub use config::WatcherConfig;
pub use debounce::{MotionDebouncer, MotionEvent};
pub use detect::{BaselinePolicy, DetectorSettings, MotionDetector, MotionRegion};
pub use frame::Frame;
#[cfg(feature = "camera-http")]
pub use ingest::HttpCameraSource;
#[cfg(feature = "camera-v4l2")]
pub use ingest::V4l2Source;
pub use ingest::{CameraConfig, CameraSource, CaptureError, FrameSource, SourceStats, SyntheticSource};
pub use notify::{ConsoleNotifier, MailSettings, Notifier, SmtpNotifier};
pub use snapshot::SnapshotWriter;
pub use state::NotifyLedger;
pub use throttle::NotifyThrottle;
pub use watcher::{StopReason, Watcher, MAX_CONSECUTIVE_READ_FAILURES};
