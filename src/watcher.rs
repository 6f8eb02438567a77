//! The watcher loop.
//!
//! One sequential cycle: pull a frame, detect change against the baseline,
//! advance the debouncer, and on a confirmed event persist a snapshot and
//! (cooldown permitting) notify. Capture and notification are the only
//! blocking points; detection pauses while a notification is in flight.
//!
//! The loop never terminates on its own except for a cancelled flag, the
//! source ending, or an unrecoverable source failure. A single bad capture
//! cycle is logged and skipped; three consecutive failures are fatal.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant, SystemTime};

use anyhow::{anyhow, Context, Result};

use crate::config::WatcherConfig;
use crate::debounce::{MotionDebouncer, MotionEvent};
use crate::detect::{BaselinePolicy, MotionDetector, MotionRegion};
use crate::ingest::{CaptureError, FrameSource};
use crate::notify::Notifier;
use crate::snapshot::SnapshotWriter;
use crate::state::NotifyLedger;
use crate::throttle::NotifyThrottle;

/// Consecutive transient capture failures tolerated before giving up.
pub const MAX_CONSECUTIVE_READ_FAILURES: u32 = 3;

const HEALTH_LOG_INTERVAL: Duration = Duration::from_secs(5);

/// Why a run ended cleanly.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopReason {
    /// The cancel flag was set (interrupt signal).
    Interrupted,
    /// The frame source reported end of stream.
    EndOfStream,
}

/// Ties a frame source and a notifier to the detection pipeline.
pub struct Watcher<S: FrameSource, N: Notifier> {
    source: S,
    notifier: N,
    detector: MotionDetector,
    debouncer: MotionDebouncer,
    throttle: NotifyThrottle,
    snapshots: SnapshotWriter,
    ledger: Option<NotifyLedger>,
    baseline_policy: BaselinePolicy,
    poll_interval: Duration,
}

impl<S: FrameSource, N: Notifier> Watcher<S, N> {
    pub fn new(source: S, notifier: N, config: &WatcherConfig) -> Result<Self> {
        let snapshots = SnapshotWriter::new(&config.output_dir)?;
        let mut throttle = NotifyThrottle::new(config.notify_cooldown);

        let ledger = config.state_path.clone().map(NotifyLedger::new);
        if let Some(ledger) = &ledger {
            if let Some(elapsed) = ledger.elapsed_since_last(SystemTime::now()) {
                if elapsed <= config.notify_cooldown {
                    log::info!(
                        "cooldown pre-armed: last notification {}s ago per {}",
                        elapsed.as_secs(),
                        ledger.path().display()
                    );
                    throttle.preload(elapsed, Instant::now());
                }
            }
        }

        Ok(Self {
            source,
            notifier,
            detector: MotionDetector::new(config.detector),
            debouncer: MotionDebouncer::new(config.settle_delay),
            throttle,
            snapshots,
            ledger,
            baseline_policy: config.detector.baseline,
            poll_interval: config.poll_interval,
        })
    }

    /// Run until cancelled, end of stream, or fatal source failure.
    ///
    /// `cancel` is checked between cycles; setting it from a signal handler
    /// stops the loop at the next cycle boundary.
    pub fn run(&mut self, cancel: &AtomicBool) -> Result<StopReason> {
        self.source
            .connect()
            .map_err(|e| anyhow!("frame source failed to start: {}", e))?;

        let mut consecutive_failures = 0u32;
        let mut last_health_log = Instant::now();

        loop {
            if cancel.load(Ordering::Relaxed) {
                log::info!("interrupt received; stopping");
                self.debouncer.reset();
                return Ok(StopReason::Interrupted);
            }

            let frame = match self.source.next_frame() {
                Ok(frame) => {
                    consecutive_failures = 0;
                    frame
                }
                Err(CaptureError::EndOfStream) => {
                    log::info!("frame source reached end of stream; stopping");
                    self.debouncer.reset();
                    return Ok(StopReason::EndOfStream);
                }
                Err(err @ CaptureError::Unavailable(_)) => {
                    self.debouncer.reset();
                    return Err(anyhow!("frame source became unavailable: {}", err));
                }
                Err(err) => {
                    consecutive_failures += 1;
                    log::warn!(
                        "frame capture failed ({} consecutive): {}",
                        consecutive_failures,
                        err
                    );
                    if consecutive_failures >= MAX_CONSECUTIVE_READ_FAILURES {
                        self.debouncer.reset();
                        return Err(anyhow!(
                            "giving up after {} consecutive capture failures",
                            consecutive_failures
                        ));
                    }
                    self.sleep_poll_interval();
                    continue;
                }
            };

            let regions = self.detector.detect(&frame).context("motion detection failed")?;
            if let Some(union) = MotionRegion::union_of(&regions) {
                log::debug!(
                    "motion: {} region(s), union {}x{} at ({}, {}), {} px changed",
                    regions.len(),
                    union.width,
                    union.height,
                    union.x,
                    union.y,
                    union.area
                );
            }

            if let Some(event) = self.debouncer.advance(&regions, &frame, Instant::now()) {
                self.handle_event(event)?;
                if self.baseline_policy == BaselinePolicy::FixedReference {
                    // Event resolved; the next frame becomes the new
                    // known-still reference.
                    self.detector.clear_baseline();
                }
            }

            if last_health_log.elapsed() >= HEALTH_LOG_INTERVAL {
                let stats = self.source.stats();
                log::info!(
                    "source health={} frames={} origin={}",
                    self.source.is_healthy(),
                    stats.frames_captured,
                    stats.origin
                );
                last_health_log = Instant::now();
            }

            self.sleep_poll_interval();
        }
    }

    fn handle_event(&mut self, event: MotionEvent) -> Result<()> {
        log::info!(
            "motion confirmed: window {}..{} (unix seconds), {:.1}s",
            event.first_seen_epoch(),
            event.last_seen_epoch(),
            event.duration().as_secs_f64()
        );

        let jpeg = event.frame.encode_jpeg()?;

        match self.snapshots.save(&jpeg, event.frame.epoch_seconds()) {
            Ok(path) => log::info!("snapshot saved to {}", path.display()),
            Err(e) => log::error!("snapshot write failed: {:#}", e),
        }

        if !self.throttle.should_notify(Instant::now()) {
            log::info!("notification suppressed (cooldown active)");
            return Ok(());
        }

        if self.notifier.notify(&event, &jpeg) {
            self.throttle.record_success(Instant::now());
            if let Some(ledger) = &self.ledger {
                if let Err(e) = ledger.record(SystemTime::now()) {
                    log::warn!("failed to update notify ledger: {:#}", e);
                }
            }
            log::info!("notification sent");
        } else {
            log::warn!("notification failed; next event will retry");
        }
        Ok(())
    }

    fn sleep_poll_interval(&self) {
        if !self.poll_interval.is_zero() {
            std::thread::sleep(self.poll_interval);
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
