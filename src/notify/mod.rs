//! Outbound notifications.
//!
//! The watcher only knows the [`Notifier`] contract: hand over a confirmed
//! motion event plus its JPEG snapshot, get back whether delivery worked.
//! Delivery failures stay inside the notifier; the loop never unwinds
//! because a mail relay was down.

pub mod smtp;

pub use smtp::{MailSettings, SmtpNotifier};

use crate::debounce::MotionEvent;

/// Delivers a motion notification.
///
/// Implementations must not panic or propagate errors: any failure is
/// logged internally and reported as `false`, so the caller can leave its
/// cooldown window unarmed and retry on the next event.
pub trait Notifier {
    fn notify(&mut self, event: &MotionEvent, jpeg: &[u8]) -> bool;
}

/// Logs events instead of delivering them. Used by `watcherd --dry-run`.
pub struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn notify(&mut self, event: &MotionEvent, jpeg: &[u8]) -> bool {
        log::info!(
            "motion event: window {}..{} (unix seconds), {:.1}s, {} byte snapshot",
            event.first_seen_epoch(),
            event.last_seen_epoch(),
            event.duration().as_secs_f64(),
            jpeg.len()
        );
        true
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
