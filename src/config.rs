//! Daemon configuration.
//!
//! Settings come from a TOML file (sections `[motion]`, `[camera]`,
//! `[email]`, `[watcher]`), every field optional with a default, followed by
//! environment-variable overrides and a validation pass. The file path
//! comes from `--config` or `WATCHER_CONFIG`.

use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::detect::{BaselinePolicy, DetectorSettings};
use crate::ingest::CameraConfig;
use crate::notify::MailSettings;

const DEFAULT_SETTLE_DELAY_S: f64 = 1.0;
const DEFAULT_OUTPUT_DIR: &str = "motion_images";
const DEFAULT_COOLDOWN_SECS: u64 = 3600;
const DEFAULT_POLL_INTERVAL_S: f64 = 1.0;

#[derive(Debug, Deserialize, Default)]
struct WatcherConfigFile {
    motion: Option<MotionSection>,
    camera: Option<CameraSection>,
    email: Option<EmailSection>,
    watcher: Option<WatcherSection>,
}

#[derive(Debug, Deserialize, Default)]
struct MotionSection {
    threshold: Option<u8>,
    min_area: Option<u32>,
    blur_sigma: Option<f32>,
    dilate_iterations: Option<u8>,
    settle_delay_seconds: Option<f64>,
    baseline: Option<BaselinePolicy>,
    rolling_alpha: Option<f32>,
}

#[derive(Debug, Deserialize, Default)]
struct CameraSection {
    url: Option<String>,
    target_fps: Option<u32>,
    width: Option<u32>,
    height: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct EmailSection {
    username: Option<String>,
    password: Option<String>,
    to: Option<String>,
    from: Option<String>,
    smtp_server: Option<String>,
    smtp_port: Option<u16>,
    subject: Option<String>,
    message: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct WatcherSection {
    output_dir: Option<PathBuf>,
    notify_cooldown_seconds: Option<u64>,
    poll_interval_seconds: Option<f64>,
    state_path: Option<PathBuf>,
}

/// Resolved daemon configuration.
#[derive(Debug, Clone)]
pub struct WatcherConfig {
    pub detector: DetectorSettings,
    pub settle_delay: Duration,
    pub camera: CameraConfig,
    /// Present when an `[email]` section or mail env vars are configured.
    pub mail: Option<MailSettings>,
    pub output_dir: PathBuf,
    pub notify_cooldown: Duration,
    pub poll_interval: Duration,
    /// Last-notified ledger location; `None` disables cross-run seeding.
    pub state_path: Option<PathBuf>,
}

impl WatcherConfig {
    /// Load configuration: explicit path, else `WATCHER_CONFIG`, else
    /// defaults only. Env overrides apply on top of the file either way.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        let config_path = explicit_path
            .map(PathBuf::from)
            .or_else(|| std::env::var("WATCHER_CONFIG").ok().map(PathBuf::from));
        let file_cfg = match config_path.as_deref() {
            Some(path) => Some(read_config_file(path)?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default())?;
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: WatcherConfigFile) -> Result<Self> {
        let defaults = DetectorSettings::default();
        let motion = file.motion.unwrap_or_default();
        let detector = DetectorSettings {
            threshold: motion.threshold.unwrap_or(defaults.threshold),
            min_area: motion.min_area.unwrap_or(defaults.min_area),
            blur_sigma: motion.blur_sigma.unwrap_or(defaults.blur_sigma),
            dilate_iterations: motion.dilate_iterations.unwrap_or(defaults.dilate_iterations),
            baseline: motion.baseline.unwrap_or(defaults.baseline),
            rolling_alpha: motion.rolling_alpha.unwrap_or(defaults.rolling_alpha),
        };
        let settle_delay = duration_from_secs_f64(
            "motion.settle_delay_seconds",
            motion.settle_delay_seconds.unwrap_or(DEFAULT_SETTLE_DELAY_S),
        )?;

        let camera_defaults = CameraConfig::default();
        let camera_file = file.camera.unwrap_or_default();
        let camera = CameraConfig {
            url: camera_file.url.unwrap_or(camera_defaults.url),
            target_fps: camera_file.target_fps.unwrap_or(camera_defaults.target_fps),
            width: camera_file.width.unwrap_or(camera_defaults.width),
            height: camera_file.height.unwrap_or(camera_defaults.height),
        };

        let mail = file.email.map(|email| {
            let defaults = MailSettings::default();
            MailSettings {
                username: email.username.unwrap_or_default(),
                password: email.password.unwrap_or_default(),
                to: email.to.unwrap_or_default(),
                from: email.from.unwrap_or_default(),
                smtp_server: email.smtp_server.unwrap_or(defaults.smtp_server.clone()),
                smtp_port: email.smtp_port.unwrap_or(defaults.smtp_port),
                subject: email.subject.unwrap_or(defaults.subject.clone()),
                message: email.message.unwrap_or(defaults.message.clone()),
            }
        });

        let watcher = file.watcher.unwrap_or_default();
        let output_dir = watcher
            .output_dir
            .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR));
        let notify_cooldown = Duration::from_secs(
            watcher.notify_cooldown_seconds.unwrap_or(DEFAULT_COOLDOWN_SECS),
        );
        let poll_interval = duration_from_secs_f64(
            "watcher.poll_interval_seconds",
            watcher.poll_interval_seconds.unwrap_or(DEFAULT_POLL_INTERVAL_S),
        )?;

        Ok(Self {
            detector,
            settle_delay,
            camera,
            mail,
            output_dir,
            notify_cooldown,
            poll_interval,
            state_path: watcher.state_path,
        })
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(url) = std::env::var("WATCHER_CAMERA_URL") {
            if !url.trim().is_empty() {
                self.camera.url = url;
            }
        }
        if let Ok(dir) = std::env::var("WATCHER_OUTPUT_DIR") {
            if !dir.trim().is_empty() {
                self.output_dir = PathBuf::from(dir);
            }
        }
        if let Ok(cooldown) = std::env::var("WATCHER_COOLDOWN_SECS") {
            let seconds: u64 = cooldown.parse().map_err(|_| {
                anyhow!("WATCHER_COOLDOWN_SECS must be an integer number of seconds")
            })?;
            self.notify_cooldown = Duration::from_secs(seconds);
        }

        let mail_env = [
            non_empty_env("WATCHER_MAIL_USERNAME"),
            non_empty_env("WATCHER_MAIL_PASSWORD"),
            non_empty_env("WATCHER_MAIL_TO"),
        ];
        if mail_env.iter().any(|v| v.is_some()) {
            let mut mail = self.mail.take().unwrap_or_default();
            if let Some(username) = &mail_env[0] {
                mail.username = username.clone();
            }
            if let Some(password) = &mail_env[1] {
                mail.password = password.clone();
            }
            if let Some(to) = &mail_env[2] {
                mail.to = to.clone();
            }
            self.mail = Some(mail);
        }
        Ok(())
    }

    fn validate(&mut self) -> Result<()> {
        if self.camera.url.trim().is_empty() {
            return Err(anyhow!("camera.url must be set"));
        }
        if self.camera.width == 0 || self.camera.height == 0 {
            return Err(anyhow!("camera dimensions must be non-zero"));
        }
        if self.notify_cooldown.is_zero() {
            return Err(anyhow!("watcher.notify_cooldown_seconds must be greater than zero"));
        }
        if self.detector.blur_sigma < 0.0 || !self.detector.blur_sigma.is_finite() {
            return Err(anyhow!("motion.blur_sigma must be a non-negative number"));
        }
        if !(0.0..=1.0).contains(&self.detector.rolling_alpha)
            || self.detector.rolling_alpha == 0.0
        {
            return Err(anyhow!("motion.rolling_alpha must be in (0, 1]"));
        }
        if let Some(mail) = &self.mail {
            mail.validate()?;
        }
        Ok(())
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn read_config_file(path: &Path) -> Result<WatcherConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = toml::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}

fn duration_from_secs_f64(name: &str, value: f64) -> Result<Duration> {
    if !value.is_finite() || value < 0.0 {
        return Err(anyhow!("{} must be a non-negative number of seconds", name));
    }
    Ok(Duration::from_secs_f64(value))
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
