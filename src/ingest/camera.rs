//! URL-dispatched camera source.
//!
//! One concrete source type for the daemon: the configured URL selects the
//! backend, so swapping a synthetic scene for an HTTP camera or a local
//! V4L2 device is a configuration change.

use super::{CaptureError, FrameSource, SourceStats, SyntheticSource};
use crate::frame::Frame;

/// Configuration for a camera source.
#[derive(Clone, Debug)]
pub struct CameraConfig {
    /// Camera URL. Supported schemes: `stub://` (synthetic), `http(s)://`
    /// (still or MJPEG camera, feature camera-http), `v4l2://` or a plain
    /// device path (feature camera-v4l2).
    pub url: String,
    /// Target frame rate; sources decimate to this where the transport
    /// allows. Zero means source-paced.
    pub target_fps: u32,
    /// Preferred frame width.
    pub width: u32,
    /// Preferred frame height.
    pub height: u32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            url: "stub://camera".to_string(),
            target_fps: 10,
            width: 640,
            height: 480,
        }
    }
}

/// Camera frame source, dispatching on the URL scheme.
pub struct CameraSource {
    backend: CameraBackend,
}

enum CameraBackend {
    Synthetic(SyntheticSource),
    #[cfg(feature = "camera-http")]
    Http(super::http::HttpCameraSource),
    #[cfg(feature = "camera-v4l2")]
    V4l2(super::v4l2::V4l2Source),
}

impl CameraSource {
    pub fn new(config: CameraConfig) -> Result<Self, CaptureError> {
        let backend = if config.url.starts_with("stub://") {
            CameraBackend::Synthetic(SyntheticSource::new(
                config.width,
                config.height,
                config.url.clone(),
            ))
        } else if config.url.starts_with("http://") || config.url.starts_with("https://") {
            #[cfg(feature = "camera-http")]
            {
                CameraBackend::Http(super::http::HttpCameraSource::new(config)?)
            }
            #[cfg(not(feature = "camera-http"))]
            {
                return Err(CaptureError::Unavailable(
                    "HTTP cameras require the camera-http feature".to_string(),
                ));
            }
        } else if config.url.starts_with("v4l2://") || config.url.starts_with('/') {
            #[cfg(feature = "camera-v4l2")]
            {
                CameraBackend::V4l2(super::v4l2::V4l2Source::new(config)?)
            }
            #[cfg(not(feature = "camera-v4l2"))]
            {
                return Err(CaptureError::Unavailable(
                    "V4L2 devices require the camera-v4l2 feature".to_string(),
                ));
            }
        } else {
            return Err(CaptureError::Unavailable(format!(
                "unsupported camera url '{}'",
                config.url
            )));
        };
        Ok(Self { backend })
    }
}

impl FrameSource for CameraSource {
    fn connect(&mut self) -> Result<(), CaptureError> {
        match &mut self.backend {
            CameraBackend::Synthetic(source) => source.connect(),
            #[cfg(feature = "camera-http")]
            CameraBackend::Http(source) => source.connect(),
            #[cfg(feature = "camera-v4l2")]
            CameraBackend::V4l2(source) => source.connect(),
        }
    }

    fn next_frame(&mut self) -> Result<Frame, CaptureError> {
        match &mut self.backend {
            CameraBackend::Synthetic(source) => source.next_frame(),
            #[cfg(feature = "camera-http")]
            CameraBackend::Http(source) => source.next_frame(),
            #[cfg(feature = "camera-v4l2")]
            CameraBackend::V4l2(source) => source.next_frame(),
        }
    }

    fn is_healthy(&self) -> bool {
        match &self.backend {
            CameraBackend::Synthetic(source) => source.is_healthy(),
            #[cfg(feature = "camera-http")]
            CameraBackend::Http(source) => source.is_healthy(),
            #[cfg(feature = "camera-v4l2")]
            CameraBackend::V4l2(source) => source.is_healthy(),
        }
    }

    fn stats(&self) -> SourceStats {
        match &self.backend {
            CameraBackend::Synthetic(source) => source.stats(),
            #[cfg(feature = "camera-http")]
            CameraBackend::Http(source) => source.stats(),
            #[cfg(feature = "camera-v4l2")]
            CameraBackend::V4l2(source) => source.stats(),
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stub_url_selects_the_synthetic_backend() {
        let mut source = CameraSource::new(CameraConfig::default()).unwrap();
        source.connect().unwrap();

        let frame = source.next_frame().unwrap();
        assert_eq!(frame.width(), 640);
        assert_eq!(frame.height(), 480);
        assert_eq!(source.stats().origin, "stub://camera");
    }

    #[test]
    fn unsupported_scheme_is_rejected() {
        let config = CameraConfig {
            url: "rtsp://camera".to_string(),
            ..CameraConfig::default()
        };
        let err = CameraSource::new(config).err().expect("scheme must be rejected");
        assert!(matches!(err, CaptureError::Unavailable(_)));
    }
}
