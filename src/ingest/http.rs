//! HTTP camera source.
//!
//! Pulls frames from HTTP cameras and streamers (camera-streamer, ESP32-cam
//! style firmwares):
//! - a `multipart/x-mixed-replace` endpoint is consumed as an MJPEG stream;
//! - anything else is treated as a still endpoint and fetched per frame.
//!
//! JPEG payloads are decoded in-memory to RGB8. The source decimates to the
//! configured target frame rate.

use std::io::Read;
use std::time::{Duration, Instant, SystemTime};

use anyhow::{anyhow, Context, Result};
use url::Url;

use super::{frame_interval, health_grace, CameraConfig, CaptureError, FrameSource, SourceStats};
use crate::frame::Frame;

const MAX_JPEG_BYTES: usize = 5 * 1024 * 1024;

/// HTTP still/MJPEG camera source.
pub struct HttpCameraSource {
    config: CameraConfig,
    stream: Option<HttpStream>,
    last_frame_at: Option<Instant>,
    connected_at: Option<Instant>,
    frame_count: u64,
    last_error: Option<String>,
}

enum HttpStream {
    Mjpeg(MjpegStream),
    SingleJpeg,
}

impl HttpCameraSource {
    pub fn new(config: CameraConfig) -> Result<Self, CaptureError> {
        let url = Url::parse(&config.url)
            .map_err(|e| CaptureError::Unavailable(format!("invalid camera url '{}': {}", config.url, e)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(CaptureError::Unavailable(format!(
                "expected an http(s) url, got '{}'",
                config.url
            )));
        }
        Ok(Self {
            config,
            stream: None,
            last_frame_at: None,
            connected_at: None,
            frame_count: 0,
            last_error: None,
        })
    }

    fn read_jpeg(&mut self) -> Result<Vec<u8>, CaptureError> {
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| CaptureError::Unavailable("http camera not connected".to_string()))?;
        match stream {
            HttpStream::Mjpeg(stream) => stream.read_next_jpeg(),
            HttpStream::SingleJpeg => fetch_single_jpeg(&self.config.url),
        }
    }
}

impl FrameSource for HttpCameraSource {
    fn connect(&mut self) -> Result<(), CaptureError> {
        let response = ureq::get(&self.config.url).call().map_err(|e| {
            CaptureError::Unavailable(format!("connect to {}: {}", self.config.url, e))
        })?;
        let content_type = response.header("Content-Type").unwrap_or("");
        if content_type.to_lowercase().contains("multipart") {
            let reader = response.into_reader();
            self.stream = Some(HttpStream::Mjpeg(MjpegStream::new(Box::new(reader))));
            log::info!("HttpCameraSource: connected to {} (mjpeg)", self.config.url);
        } else {
            self.stream = Some(HttpStream::SingleJpeg);
            log::info!("HttpCameraSource: connected to {} (still)", self.config.url);
        }
        self.connected_at = Some(Instant::now());
        self.last_error = None;
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Frame, CaptureError> {
        let min_interval = frame_interval(self.config.target_fps);
        loop {
            let jpeg_bytes = match self.read_jpeg() {
                Ok(bytes) => bytes,
                Err(e) => {
                    self.last_error = Some(e.to_string());
                    return Err(e);
                }
            };

            // Decimate to the target rate; MJPEG streams may run faster.
            let now = Instant::now();
            if let Some(last) = self.last_frame_at {
                if now.duration_since(last) < min_interval {
                    continue;
                }
            }

            let (pixels, width, height) = decode_jpeg(&jpeg_bytes)?;
            self.frame_count += 1;
            self.last_frame_at = Some(now);
            self.last_error = None;

            return Ok(Frame::new(pixels, width, height, SystemTime::now())?);
        }
    }

    fn is_healthy(&self) -> bool {
        if self.last_error.is_some() {
            return false;
        }
        let Some(connected_at) = self.connected_at else {
            return false;
        };
        let Some(last_frame_at) = self.last_frame_at else {
            return connected_at.elapsed() <= Duration::from_secs(5);
        };
        last_frame_at.elapsed() <= health_grace(self.config.target_fps)
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.frame_count,
            origin: self.config.url.clone(),
        }
    }
}

fn fetch_single_jpeg(url: &str) -> Result<Vec<u8>, CaptureError> {
    let response = ureq::get(url)
        .call()
        .map_err(|e| CaptureError::Other(anyhow!("fetch still frame from {}: {}", url, e)))?;
    let mut bytes = Vec::new();
    response
        .into_reader()
        .take(MAX_JPEG_BYTES as u64)
        .read_to_end(&mut bytes)
        .context("read still frame body")?;
    Ok(bytes)
}

fn decode_jpeg(bytes: &[u8]) -> Result<(Vec<u8>, u32, u32)> {
    let decoded = image::load_from_memory(bytes).context("decode jpeg frame")?;
    let rgb = decoded.to_rgb8();
    let (width, height) = rgb.dimensions();
    Ok((rgb.into_raw(), width, height))
}

// ----------------------------------------------------------------------------
// MJPEG multipart stream
// ----------------------------------------------------------------------------

struct MjpegStream {
    reader: Box<dyn Read + Send>,
    buffer: Vec<u8>,
}

impl MjpegStream {
    fn new(reader: Box<dyn Read + Send>) -> Self {
        Self {
            reader,
            buffer: Vec::with_capacity(64 * 1024),
        }
    }

    fn read_next_jpeg(&mut self) -> Result<Vec<u8>, CaptureError> {
        let mut chunk = vec![0u8; 8192];
        loop {
            if let Some((start, end)) = find_jpeg_bounds(&self.buffer) {
                let frame = self.buffer[start..end].to_vec();
                self.buffer.drain(..end);
                return Ok(frame);
            }

            let read = self
                .reader
                .read(&mut chunk)
                .map_err(|e| CaptureError::Other(anyhow!("read mjpeg chunk: {}", e)))?;
            if read == 0 {
                return Err(CaptureError::EndOfStream);
            }
            self.buffer.extend_from_slice(&chunk[..read]);

            // Bound the scan buffer against streams that never produce a
            // complete frame.
            if self.buffer.len() > MAX_JPEG_BYTES * 2 {
                let drain_len = self.buffer.len() - 2;
                self.buffer.drain(..drain_len);
            }
        }
    }
}

/// Locate one complete JPEG (SOI..EOI inclusive) in `buffer`.
fn find_jpeg_bounds(buffer: &[u8]) -> Option<(usize, usize)> {
    let start = buffer.windows(2).position(|w| w == [0xFF, 0xD8])?;
    let end = buffer[start..]
        .windows(2)
        .position(|w| w == [0xFF, 0xD9])
        .map(|offset| start + offset + 2)?;
    Some((start, end))
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_jpeg_bounds_amid_multipart_noise() {
        let mut data = b"--frame\r\nContent-Type: image/jpeg\r\n\r\n".to_vec();
        data.extend_from_slice(&[0xFF, 0xD8, 1, 2, 3, 0xFF, 0xD9]);
        data.extend_from_slice(b"\r\n--frame");

        let (start, end) = find_jpeg_bounds(&data).unwrap();
        assert_eq!(&data[start..start + 2], &[0xFF, 0xD8]);
        assert_eq!(&data[end - 2..end], &[0xFF, 0xD9]);
        assert_eq!(end - start, 7);
    }

    #[test]
    fn incomplete_jpeg_is_not_extracted() {
        let data = [0xFF, 0xD8, 1, 2, 3];
        assert!(find_jpeg_bounds(&data).is_none());
    }

    #[test]
    fn mjpeg_stream_splits_consecutive_frames() {
        let mut payload = Vec::new();
        payload.extend_from_slice(&[0xFF, 0xD8, 0xAA, 0xFF, 0xD9]);
        payload.extend_from_slice(b"\r\n--frame\r\n");
        payload.extend_from_slice(&[0xFF, 0xD8, 0xBB, 0xFF, 0xD9]);

        let mut stream = MjpegStream::new(Box::new(std::io::Cursor::new(payload)));
        assert_eq!(stream.read_next_jpeg().unwrap(), vec![0xFF, 0xD8, 0xAA, 0xFF, 0xD9]);
        assert_eq!(stream.read_next_jpeg().unwrap(), vec![0xFF, 0xD8, 0xBB, 0xFF, 0xD9]);
        assert!(matches!(stream.read_next_jpeg(), Err(CaptureError::EndOfStream)));
    }

    #[test]
    fn non_http_url_is_rejected() {
        let config = CameraConfig {
            url: "ftp://camera/frame".to_string(),
            ..CameraConfig::default()
        };
        assert!(HttpCameraSource::new(config).is_err());
    }

    #[test]
    fn decodes_an_encoded_frame() {
        let frame = Frame::new(vec![128u8; 16 * 16 * 3], 16, 16, SystemTime::now()).unwrap();
        let jpeg = frame.encode_jpeg().unwrap();

        let (pixels, width, height) = decode_jpeg(&jpeg).unwrap();
        assert_eq!((width, height), (16, 16));
        assert_eq!(pixels.len(), 16 * 16 * 3);
    }
}
