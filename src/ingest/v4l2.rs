//! V4L2 frame source.
//!
//! Captures frames from a local V4L2 device node (e.g. `/dev/video0`) over
//! memory-mapped buffers. RGB24 output is requested; devices that only
//! deliver YUYV are normalized to RGB in software.

use std::time::{Instant, SystemTime};

use anyhow::{anyhow, Context};
use ouroboros::self_referencing;

use super::normalize::{normalize_to_rgb, PixelFormat};
use super::{health_grace, CameraConfig, CaptureError, FrameSource, SourceStats};
use crate::frame::Frame;

/// V4L2 device frame source.
pub struct V4l2Source {
    config: CameraConfig,
    device_path: String,
    state: Option<DeviceState>,
    frame_count: u64,
    last_frame_at: Option<Instant>,
    last_error: Option<String>,
    active_width: u32,
    active_height: u32,
    active_format: PixelFormat,
}

#[self_referencing]
struct DeviceState {
    device: v4l::Device,
    #[borrows(mut device)]
    #[covariant]
    stream: v4l::prelude::MmapStream<'this, v4l::Device>,
}

impl V4l2Source {
    pub fn new(config: CameraConfig) -> Result<Self, CaptureError> {
        let device_path = config
            .url
            .strip_prefix("v4l2://")
            .unwrap_or(&config.url)
            .to_string();
        if device_path.trim().is_empty() {
            return Err(CaptureError::Unavailable("empty v4l2 device path".to_string()));
        }
        Ok(Self {
            active_width: config.width,
            active_height: config.height,
            active_format: PixelFormat::Rgb24,
            config,
            device_path,
            state: None,
            frame_count: 0,
            last_frame_at: None,
            last_error: None,
        })
    }
}

impl FrameSource for V4l2Source {
    fn connect(&mut self) -> Result<(), CaptureError> {
        use v4l::buffer::Type;
        use v4l::video::Capture;

        let mut device = v4l::Device::with_path(&self.device_path).map_err(|e| {
            CaptureError::Unavailable(format!("open v4l2 device {}: {}", self.device_path, e))
        })?;

        let mut format = device
            .format()
            .map_err(|e| CaptureError::Unavailable(format!("read v4l2 format: {}", e)))?;
        format.width = self.config.width;
        format.height = self.config.height;
        format.fourcc = v4l::FourCC::new(b"RGB3");

        let format = match device.set_format(&format) {
            Ok(format) => format,
            Err(err) => {
                log::warn!(
                    "V4l2Source: failed to set format on {}: {}",
                    self.device_path,
                    err
                );
                device.format().map_err(|e| {
                    CaptureError::Unavailable(format!("read v4l2 format after set failure: {}", e))
                })?
            }
        };

        self.active_format = match &format.fourcc.repr {
            b"RGB3" => PixelFormat::Rgb24,
            b"YUYV" => PixelFormat::Yuyv,
            other => {
                return Err(CaptureError::Unavailable(format!(
                    "unsupported v4l2 pixel format '{}'",
                    String::from_utf8_lossy(other)
                )))
            }
        };

        if self.config.target_fps > 0 {
            let params = v4l::video::capture::Parameters::with_fps(self.config.target_fps);
            if let Err(err) = device.set_params(&params) {
                log::warn!("V4l2Source: failed to set fps on {}: {}", self.device_path, err);
            }
        }

        self.active_width = format.width;
        self.active_height = format.height;
        self.last_error = None;

        let state = DeviceStateBuilder {
            device,
            stream_builder: |device| {
                v4l::prelude::MmapStream::with_buffers(device, Type::VideoCapture, 4)
                    .map_err(|err| anyhow::Error::new(err).context("create v4l2 buffer stream"))
            },
        }
        .try_build()
        .map_err(|err| CaptureError::Unavailable(err.to_string()))?;
        self.state = Some(state);

        log::info!(
            "V4l2Source: connected to {} ({}x{}, {:?})",
            self.device_path,
            self.active_width,
            self.active_height,
            self.active_format
        );
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Frame, CaptureError> {
        use v4l::io::traits::CaptureStream;

        let state = self
            .state
            .as_mut()
            .ok_or_else(|| CaptureError::Unavailable("v4l2 device not connected".to_string()))?;

        let pixels = {
            let (buf, _meta) = state.with_mut(|fields| fields.stream.next()).map_err(|err| {
                self.last_error = Some(err.to_string());
                CaptureError::Other(anyhow!("capture v4l2 frame: {}", err))
            })?;
            normalize_to_rgb(buf, self.active_width, self.active_height, self.active_format)
                .context("normalize v4l2 frame")?
        };

        self.frame_count += 1;
        self.last_frame_at = Some(Instant::now());
        self.last_error = None;

        Ok(Frame::new(
            pixels,
            self.active_width,
            self.active_height,
            SystemTime::now(),
        )?)
    }

    fn is_healthy(&self) -> bool {
        if self.last_error.is_some() {
            return false;
        }
        let Some(last_frame_at) = self.last_frame_at else {
            return true;
        };
        last_frame_at.elapsed() <= health_grace(self.config.target_fps)
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.frame_count,
            origin: self.device_path.clone(),
        }
    }
}
