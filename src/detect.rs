//! Frame-differencing motion detection.
//!
//! [`MotionDetector`] owns the rolling baseline and turns each incoming
//! frame into a set of [`MotionRegion`]s:
//!
//! 1. Convert the frame to grayscale and smooth it with a Gaussian blur to
//!    suppress sensor noise.
//! 2. Take the absolute per-pixel difference against the baseline and apply
//!    a binary threshold to get a motion mask.
//! 3. Dilate the mask to close small gaps inside a moving blob.
//! 4. Label 8-connected components and keep those whose pixel count exceeds
//!    the minimum area.
//!
//! The first frame after startup (or after [`MotionDetector::clear_baseline`])
//! only establishes the baseline and never yields regions.

use std::collections::BTreeMap;

use anyhow::Result;
use image::{GrayImage, Luma};
use imageproc::distance_transform::Norm;
use imageproc::filter::gaussian_blur_f32;
use imageproc::map::map_colors2;
use imageproc::morphology::dilate;
use imageproc::region_labelling::{connected_components, Connectivity};
use serde::Deserialize;

use crate::frame::Frame;

/// How the baseline frame is maintained between detection cycles.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BaselinePolicy {
    /// Compare everything to the last known-still frame. The watcher clears
    /// the baseline once an event resolves, so the next frame re-seeds it.
    #[default]
    FixedReference,
    /// Blend the baseline toward every frame (background-model style).
    /// More robust to lighting drift, costlier per cycle.
    Rolling,
}

/// Tuning knobs for the detection pipeline.
#[derive(Clone, Copy, Debug)]
pub struct DetectorSettings {
    /// Per-pixel difference cutoff on a 0-255 scale. Differences must
    /// exceed this to land in the motion mask.
    pub threshold: u8,
    /// Regions must cover strictly more than this many pixels to survive.
    pub min_area: u32,
    /// Gaussian blur sigma; 3.5 is the equivalent of a 21x21 kernel.
    /// Zero disables the blur.
    pub blur_sigma: f32,
    /// Dilation steps applied to the motion mask. Zero disables dilation.
    pub dilate_iterations: u8,
    pub baseline: BaselinePolicy,
    /// Blend factor for [`BaselinePolicy::Rolling`], in (0, 1].
    pub rolling_alpha: f32,
}

impl Default for DetectorSettings {
    fn default() -> Self {
        Self {
            threshold: 25,
            min_area: 500,
            blur_sigma: 3.5,
            dilate_iterations: 2,
            baseline: BaselinePolicy::FixedReference,
            rolling_alpha: 0.05,
        }
    }
}

/// A connected region of changed pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MotionRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    /// Pixel count of the component, not the bounding-box area.
    pub area: u32,
}

impl MotionRegion {
    /// Union bounding box over a set of regions, with their combined pixel
    /// count. Returns `None` for an empty set.
    pub fn union_of(regions: &[MotionRegion]) -> Option<MotionRegion> {
        let first = regions.first()?;
        let mut min_x = first.x;
        let mut min_y = first.y;
        let mut max_x = first.x + first.width;
        let mut max_y = first.y + first.height;
        let mut area = 0u32;
        for region in regions {
            min_x = min_x.min(region.x);
            min_y = min_y.min(region.y);
            max_x = max_x.max(region.x + region.width);
            max_y = max_y.max(region.y + region.height);
            area = area.saturating_add(region.area);
        }
        Some(MotionRegion {
            x: min_x,
            y: min_y,
            width: max_x - min_x,
            height: max_y - min_y,
            area,
        })
    }
}

/// Stateful change detector. Owns the baseline; everything else is
/// recomputed per call.
pub struct MotionDetector {
    settings: DetectorSettings,
    baseline: Option<GrayImage>,
}

impl MotionDetector {
    pub fn new(settings: DetectorSettings) -> Self {
        Self {
            settings,
            baseline: None,
        }
    }

    pub fn settings(&self) -> &DetectorSettings {
        &self.settings
    }

    pub fn has_baseline(&self) -> bool {
        self.baseline.is_some()
    }

    /// Explicitly establish the baseline from a frame.
    pub fn seed(&mut self, frame: &Frame) -> Result<()> {
        self.baseline = Some(self.prepare(frame)?);
        Ok(())
    }

    /// Drop the baseline; the next frame re-seeds it and yields no regions.
    pub fn clear_baseline(&mut self) {
        self.baseline = None;
    }

    /// Detect motion regions in `frame` relative to the baseline.
    ///
    /// Seeds the baseline (returning no regions) when none exists yet or
    /// when the frame dimensions change mid-stream.
    pub fn detect(&mut self, frame: &Frame) -> Result<Vec<MotionRegion>> {
        let gray = self.prepare(frame)?;

        let Some(baseline) = self.baseline.as_ref() else {
            log::debug!("baseline established from {}x{} frame", frame.width(), frame.height());
            self.baseline = Some(gray);
            return Ok(Vec::new());
        };

        if baseline.dimensions() != gray.dimensions() {
            log::warn!(
                "frame size changed from {:?} to {:?}; re-seeding baseline",
                baseline.dimensions(),
                gray.dimensions()
            );
            self.baseline = Some(gray);
            return Ok(Vec::new());
        }

        let threshold = self.settings.threshold;
        let mask = map_colors2(baseline, &gray, |p, q| {
            if p.0[0].abs_diff(q.0[0]) > threshold {
                Luma([255u8])
            } else {
                Luma([0u8])
            }
        });

        let updated_baseline = match self.settings.baseline {
            BaselinePolicy::FixedReference => None,
            BaselinePolicy::Rolling => {
                let alpha = self.settings.rolling_alpha;
                Some(map_colors2(baseline, &gray, |p, q| {
                    let blended = (1.0 - alpha) * p.0[0] as f32 + alpha * q.0[0] as f32;
                    Luma([blended.round() as u8])
                }))
            }
        };

        let mask = if self.settings.dilate_iterations > 0 {
            dilate(&mask, Norm::LInf, self.settings.dilate_iterations)
        } else {
            mask
        };

        let regions = self.label_regions(&mask);

        if let Some(baseline) = updated_baseline {
            self.baseline = Some(baseline);
        }

        Ok(regions)
    }

    fn prepare(&self, frame: &Frame) -> Result<GrayImage> {
        let gray = frame.to_luma()?;
        if self.settings.blur_sigma > 0.0 {
            Ok(gaussian_blur_f32(&gray, self.settings.blur_sigma))
        } else {
            Ok(gray)
        }
    }

    /// Label connected components in the mask and keep those whose pixel
    /// count strictly exceeds `min_area`. Regions come out in scan order;
    /// downstream only cares whether the set is empty and what the union
    /// bounding box is.
    fn label_regions(&self, mask: &GrayImage) -> Vec<MotionRegion> {
        struct Blob {
            min_x: u32,
            min_y: u32,
            max_x: u32,
            max_y: u32,
            area: u32,
        }

        let labels = connected_components(mask, Connectivity::Eight, Luma([0u8]));

        let mut blobs: BTreeMap<u32, Blob> = BTreeMap::new();
        for (x, y, label) in labels.enumerate_pixels() {
            let id = label.0[0];
            if id == 0 {
                continue;
            }
            blobs
                .entry(id)
                .and_modify(|blob| {
                    blob.min_x = blob.min_x.min(x);
                    blob.min_y = blob.min_y.min(y);
                    blob.max_x = blob.max_x.max(x);
                    blob.max_y = blob.max_y.max(y);
                    blob.area += 1;
                })
                .or_insert(Blob {
                    min_x: x,
                    min_y: y,
                    max_x: x,
                    max_y: y,
                    area: 1,
                });
        }

        blobs
            .values()
            .filter(|blob| blob.area > self.settings.min_area)
            .map(|blob| MotionRegion {
                x: blob.min_x,
                y: blob.min_y,
                width: blob.max_x - blob.min_x + 1,
                height: blob.max_y - blob.min_y + 1,
                area: blob.area,
            })
            .collect()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::SystemTime;

    const W: u32 = 64;
    const H: u32 = 64;

    /// Blur and dilation off so region geometry is exact.
    fn exact_settings(min_area: u32) -> DetectorSettings {
        DetectorSettings {
            threshold: 25,
            min_area,
            blur_sigma: 0.0,
            dilate_iterations: 0,
            baseline: BaselinePolicy::FixedReference,
            rolling_alpha: 0.05,
        }
    }

    fn gray_frame(value: u8) -> Frame {
        Frame::new(vec![value; (W * H * 3) as usize], W, H, SystemTime::now()).unwrap()
    }

    /// Uniform background with one bright block.
    fn frame_with_block(x0: u32, y0: u32, bw: u32, bh: u32) -> Frame {
        frame_with_blocks(&[(x0, y0, bw, bh)])
    }

    fn frame_with_blocks(blocks: &[(u32, u32, u32, u32)]) -> Frame {
        let mut pixels = vec![0u8; (W * H * 3) as usize];
        for &(x0, y0, bw, bh) in blocks {
            for y in y0..y0 + bh {
                for x in x0..x0 + bw {
                    let i = ((y * W + x) * 3) as usize;
                    pixels[i] = 200;
                    pixels[i + 1] = 200;
                    pixels[i + 2] = 200;
                }
            }
        }
        Frame::new(pixels, W, H, SystemTime::now()).unwrap()
    }

    #[test]
    fn first_frame_only_seeds_the_baseline() {
        let mut detector = MotionDetector::new(exact_settings(100));

        // Even a frame full of "motion" content yields nothing on first sight.
        let regions = detector.detect(&frame_with_block(10, 10, 40, 40)).unwrap();
        assert!(regions.is_empty());
        assert!(detector.has_baseline());
    }

    #[test]
    fn still_scene_yields_no_regions() {
        let mut detector = MotionDetector::new(exact_settings(100));
        detector.seed(&gray_frame(0)).unwrap();

        for _ in 0..5 {
            assert!(detector.detect(&gray_frame(0)).unwrap().is_empty());
        }
    }

    #[test]
    fn moving_block_yields_one_region_with_exact_geometry() {
        let mut detector = MotionDetector::new(exact_settings(100));
        detector.seed(&gray_frame(0)).unwrap();

        let regions = detector.detect(&frame_with_block(10, 12, 30, 20)).unwrap();
        assert_eq!(regions.len(), 1);
        let region = regions[0];
        assert_eq!((region.x, region.y), (10, 12));
        assert_eq!((region.width, region.height), (30, 20));
        assert_eq!(region.area, 600);
    }

    #[test]
    fn area_equal_to_min_area_is_excluded() {
        // 30x30 block = exactly 900 pixels.
        let mut detector = MotionDetector::new(exact_settings(900));
        detector.seed(&gray_frame(0)).unwrap();
        assert!(detector.detect(&frame_with_block(5, 5, 30, 30)).unwrap().is_empty());

        // 31x31 = 961 pixels exceeds the cutoff.
        let mut detector = MotionDetector::new(exact_settings(900));
        detector.seed(&gray_frame(0)).unwrap();
        assert_eq!(detector.detect(&frame_with_block(5, 5, 31, 31)).unwrap().len(), 1);
    }

    #[test]
    fn dilation_bridges_nearby_blobs() {
        let split = frame_with_blocks(&[(10, 10, 10, 10), (22, 10, 10, 10)]);

        let mut detector = MotionDetector::new(exact_settings(10));
        detector.seed(&gray_frame(0)).unwrap();
        assert_eq!(detector.detect(&split).unwrap().len(), 2);

        let mut settings = exact_settings(10);
        settings.dilate_iterations = 1;
        let mut detector = MotionDetector::new(settings);
        detector.seed(&gray_frame(0)).unwrap();
        assert_eq!(detector.detect(&split).unwrap().len(), 1);
    }

    #[test]
    fn fixed_baseline_holds_until_cleared() {
        let mut detector = MotionDetector::new(exact_settings(100));
        detector.seed(&gray_frame(0)).unwrap();

        let moved = frame_with_block(10, 10, 30, 30);
        assert_eq!(detector.detect(&moved).unwrap().len(), 1);
        // Baseline did not absorb the change.
        assert_eq!(detector.detect(&moved).unwrap().len(), 1);

        // After the event resolves the watcher clears the baseline; the next
        // frame re-seeds and reports nothing.
        detector.clear_baseline();
        assert!(detector.detect(&moved).unwrap().is_empty());
        assert!(detector.detect(&moved).unwrap().is_empty());
    }

    #[test]
    fn rolling_baseline_absorbs_a_static_change() {
        let mut settings = exact_settings(10);
        settings.baseline = BaselinePolicy::Rolling;
        settings.rolling_alpha = 0.5;
        let mut detector = MotionDetector::new(settings);
        detector.seed(&gray_frame(0)).unwrap();

        let moved = frame_with_block(10, 10, 30, 30);
        // Deltas decay 200 -> 100 -> 50 -> 25; the mask needs a strict
        // exceedance of threshold 25, so the fourth cycle goes quiet.
        assert!(!detector.detect(&moved).unwrap().is_empty());
        assert!(!detector.detect(&moved).unwrap().is_empty());
        assert!(!detector.detect(&moved).unwrap().is_empty());
        assert!(detector.detect(&moved).unwrap().is_empty());
    }

    #[test]
    fn frame_size_change_reseeds_the_baseline() {
        let mut detector = MotionDetector::new(exact_settings(10));
        detector.seed(&gray_frame(0)).unwrap();

        let small =
            Frame::new(vec![200u8; (32 * 32 * 3) as usize], 32, 32, SystemTime::now()).unwrap();
        assert!(detector.detect(&small).unwrap().is_empty());
        // Baseline now tracks the new geometry.
        assert!(detector.detect(&small).unwrap().is_empty());
    }

    #[test]
    fn union_covers_all_regions() {
        let regions = [
            MotionRegion { x: 10, y: 10, width: 10, height: 10, area: 100 },
            MotionRegion { x: 40, y: 30, width: 5, height: 20, area: 100 },
        ];
        let union = MotionRegion::union_of(&regions).unwrap();
        assert_eq!((union.x, union.y), (10, 10));
        assert_eq!((union.width, union.height), (35, 40));
        assert_eq!(union.area, 200);

        assert!(MotionRegion::union_of(&[]).is_none());
    }
}
