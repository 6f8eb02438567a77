//! Captured frames.
//!
//! A [`Frame`] is an immutable grid of tightly packed RGB8 samples,
//! timestamped at capture. Sources construct frames through the validating
//! constructor; downstream stages never mutate a frame in place, they derive
//! new buffers (grayscale, JPEG) from it.

use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{anyhow, Result};
use image::codecs::jpeg::JpegEncoder;
use image::{ExtendedColorType, GrayImage, RgbImage};

/// JPEG quality used for snapshots and email attachments.
const JPEG_QUALITY: u8 = 85;

/// One captured video frame: RGB8 pixels plus the wall-clock capture time.
#[derive(Clone)]
pub struct Frame {
    pixels: Vec<u8>,
    width: u32,
    height: u32,
    captured_at: SystemTime,
}

impl Frame {
    /// Create a frame, validating that the buffer matches the dimensions.
    pub fn new(pixels: Vec<u8>, width: u32, height: u32, captured_at: SystemTime) -> Result<Self> {
        let expected = width
            .checked_mul(height)
            .and_then(|v| v.checked_mul(3))
            .ok_or_else(|| anyhow!("frame dimensions overflow"))? as usize;
        if pixels.len() != expected {
            return Err(anyhow!(
                "frame buffer length mismatch: expected {} bytes for {}x{} RGB, got {}",
                expected,
                width,
                height,
                pixels.len()
            ));
        }
        Ok(Self {
            pixels,
            width,
            height,
            captured_at,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn captured_at(&self) -> SystemTime {
        self.captured_at
    }

    /// Capture time as whole seconds since the Unix epoch.
    pub fn epoch_seconds(&self) -> u64 {
        self.captured_at
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    }

    /// Raw RGB8 byte length (for buffer accounting in logs).
    pub fn byte_len(&self) -> usize {
        self.pixels.len()
    }

    /// Convert to a single-channel grayscale image.
    pub fn to_luma(&self) -> Result<GrayImage> {
        let rgb = RgbImage::from_raw(self.width, self.height, self.pixels.clone()).ok_or_else(
            || anyhow!("frame buffer does not form a {}x{} RGB image", self.width, self.height),
        )?;
        Ok(image::imageops::grayscale(&rgb))
    }

    /// Encode the frame as a JPEG.
    ///
    /// The same bytes feed both the on-disk snapshot and the email
    /// attachment, so the frame is encoded once per event.
    pub fn encode_jpeg(&self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        let mut encoder = JpegEncoder::new_with_quality(&mut out, JPEG_QUALITY);
        encoder
            .encode(&self.pixels, self.width, self.height, ExtendedColorType::Rgb8)
            .map_err(|e| anyhow!("jpeg encode failed: {}", e))?;
        Ok(out)
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
