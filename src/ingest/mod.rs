//! Frame ingestion sources.
//!
//! This module provides the sources the watcher can pull frames from:
//! - HTTP still/MJPEG cameras (feature: camera-http)
//! - Local V4L2 devices (feature: camera-v4l2)
//! - Synthetic scene (stub:// URLs, always available, used by tests)
//!
//! Every source produces [`Frame`] instances and reports failures through
//! the [`CaptureError`] taxonomy so the watcher loop can tell a skippable
//! bad cycle from a dead camera. [`CameraSource`] dispatches on the
//! configured URL so deployments pick a backend with configuration, not
//! code.

pub mod camera;
#[cfg(feature = "camera-http")]
pub mod http;
#[cfg(feature = "camera-v4l2")]
pub(crate) mod normalize;
pub mod synthetic;
#[cfg(feature = "camera-v4l2")]
pub mod v4l2;

pub use camera::{CameraConfig, CameraSource};
#[cfg(feature = "camera-http")]
pub use http::HttpCameraSource;
pub use synthetic::SyntheticSource;
#[cfg(feature = "camera-v4l2")]
pub use v4l2::V4l2Source;

#[cfg(any(feature = "camera-http", feature = "camera-v4l2"))]
use std::time::Duration;

use thiserror::Error;

use crate::frame::Frame;

/// Why a capture attempt failed.
///
/// `Unavailable` and `EndOfStream` are terminal; `Timeout` and `Other`
/// cover single bad cycles the loop may skip.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("frame source unavailable: {0}")]
    Unavailable(String),
    #[error("timed out waiting for a frame")]
    Timeout,
    #[error("frame source reached end of stream")]
    EndOfStream,
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CaptureError {
    /// Whether the loop may skip this cycle and try again.
    pub fn is_transient(&self) -> bool {
        matches!(self, CaptureError::Timeout | CaptureError::Other(_))
    }
}

/// A camera the watcher can pull frames from.
///
/// `next_frame` is the loop's suspension point: it may block on device or
/// network I/O. Sources pace themselves to their target frame rate where
/// the transport allows; polled sources rely on the watcher's poll
/// interval.
pub trait FrameSource {
    fn connect(&mut self) -> Result<(), CaptureError>;

    fn next_frame(&mut self) -> Result<Frame, CaptureError>;

    fn is_healthy(&self) -> bool {
        true
    }

    fn stats(&self) -> SourceStats;
}

/// Capture statistics, shared by every source.
#[derive(Clone, Debug)]
pub struct SourceStats {
    pub frames_captured: u64,
    /// The URL or device path frames come from.
    pub origin: String,
}

/// Minimum spacing between frames for a target rate; zero fps means
/// source-paced.
#[cfg(feature = "camera-http")]
pub(crate) fn frame_interval(target_fps: u32) -> Duration {
    if target_fps == 0 {
        Duration::ZERO
    } else {
        Duration::from_millis((1000 / target_fps).max(1) as u64)
    }
}

/// How long a source may go without a frame before it reports unhealthy.
#[cfg(any(feature = "camera-http", feature = "camera-v4l2"))]
pub(crate) fn health_grace(target_fps: u32) -> Duration {
    let base_ms = if target_fps == 0 {
        2_000
    } else {
        (1000 / target_fps).saturating_mul(6)
    };
    Duration::from_millis(base_ms.max(2_000) as u64)
}
