//! watcherd - single-camera motion watcher daemon
//!
//! This daemon:
//! 1. Opens the configured camera source (HTTP, V4L2, or synthetic stub)
//! 2. Runs frame differencing against a rolling baseline
//! 3. Debounces per-frame motion into one event per episode
//! 4. Saves a JPEG snapshot for each event
//! 5. Emails the snapshot, holding off for the configured cooldown

use anyhow::{anyhow, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use pet_watcher::{
    CameraSource, ConsoleNotifier, SmtpNotifier, StopReason, Watcher, WatcherConfig,
};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(long, env = "WATCHER_CONFIG")]
    config: Option<PathBuf>,
    /// Camera URL override (stub://, http(s)://, v4l2:// or a device path).
    #[arg(long)]
    camera: Option<String>,
    /// Log motion events instead of sending email.
    #[arg(long)]
    dry_run: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let mut config = WatcherConfig::load(args.config.as_deref())?;
    if let Some(url) = args.camera {
        config.camera.url = url;
    }

    log::info!(
        "motion settings: threshold={} min_area={} blur_sigma={} settle={:.1}s baseline={:?}",
        config.detector.threshold,
        config.detector.min_area,
        config.detector.blur_sigma,
        config.settle_delay.as_secs_f64(),
        config.detector.baseline
    );
    log::info!(
        "camera: {} ({}x{} @ {} fps)",
        config.camera.url,
        config.camera.width,
        config.camera.height,
        config.camera.target_fps
    );
    log::info!(
        "snapshots in {}, notify cooldown {}s",
        config.output_dir.display(),
        config.notify_cooldown.as_secs()
    );

    let cancel = Arc::new(AtomicBool::new(false));
    let handler_flag = cancel.clone();
    ctrlc::set_handler(move || handler_flag.store(true, Ordering::Relaxed))
        .map_err(|e| anyhow!("failed to install interrupt handler: {}", e))?;

    let source = CameraSource::new(config.camera.clone())
        .map_err(|e| anyhow!("camera initialization failed: {}", e))?;

    let stop = if args.dry_run {
        log::info!("dry run: motion events will be logged, not emailed");
        Watcher::new(source, ConsoleNotifier, &config)?.run(&cancel)?
    } else {
        let mail = config.mail.as_ref().ok_or_else(|| {
            anyhow!(
                "email settings are required; configure [email] in the config file \
                 (or WATCHER_MAIL_* env vars), or run with --dry-run"
            )
        })?;
        log::info!("email: {} -> {} via {}:{}", mail.username, mail.to, mail.smtp_server, mail.smtp_port);
        let notifier = SmtpNotifier::new(mail)?;
        Watcher::new(source, notifier, &config)?.run(&cancel)?
    };

    match stop {
        StopReason::Interrupted => log::info!("watcherd stopped on interrupt"),
        StopReason::EndOfStream => log::info!("watcherd stopped at end of stream"),
    }
    Ok(())
}
