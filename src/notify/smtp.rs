//! SMTP email notifier.
//!
//! Composes a multipart message (plain-text body + JPEG attachment) and
//! submits it over STARTTLS. Addresses and the transport are validated at
//! construction so missing credentials fail the process at startup, not on
//! the first motion event.

use std::fmt;

use anyhow::{anyhow, Result};
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, Message, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{SmtpTransport, Transport};
use zeroize::Zeroize;

use super::Notifier;
use crate::debounce::MotionEvent;

const DEFAULT_SMTP_SERVER: &str = "smtp.gmail.com";
const DEFAULT_SMTP_PORT: u16 = 587;
const DEFAULT_SUBJECT: &str = "Motion Detected";
const DEFAULT_MESSAGE: &str =
    "Motion has been detected by the pet watcher. Please see the attached image.";

/// Email account and message options.
#[derive(Clone)]
pub struct MailSettings {
    /// SMTP login, normally the sending address.
    pub username: String,
    /// SMTP password or app key.
    pub password: String,
    /// Recipients, comma separated.
    pub to: String,
    /// Sender mailbox; empty means use `username`.
    pub from: String,
    pub smtp_server: String,
    pub smtp_port: u16,
    pub subject: String,
    /// Plain-text body prefix.
    pub message: String,
}

impl Default for MailSettings {
    fn default() -> Self {
        Self {
            username: String::new(),
            password: String::new(),
            to: String::new(),
            from: String::new(),
            smtp_server: DEFAULT_SMTP_SERVER.to_string(),
            smtp_port: DEFAULT_SMTP_PORT,
            subject: DEFAULT_SUBJECT.to_string(),
            message: DEFAULT_MESSAGE.to_string(),
        }
    }
}

impl MailSettings {
    /// Check the required fields. Called from config validation and again
    /// at notifier construction.
    pub fn validate(&self) -> Result<()> {
        if self.username.trim().is_empty() {
            return Err(anyhow!("email username must be set"));
        }
        if self.password.trim().is_empty() {
            return Err(anyhow!("email password must be set"));
        }
        if self.to.trim().is_empty() {
            return Err(anyhow!("email recipient list must be set"));
        }
        if self.smtp_server.trim().is_empty() {
            return Err(anyhow!("smtp server must be set"));
        }
        if self.smtp_port == 0 {
            return Err(anyhow!("smtp port must be non-zero"));
        }
        Ok(())
    }
}

impl Drop for MailSettings {
    fn drop(&mut self) {
        self.password.zeroize();
    }
}

impl fmt::Debug for MailSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MailSettings")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("to", &self.to)
            .field("from", &self.from)
            .field("smtp_server", &self.smtp_server)
            .field("smtp_port", &self.smtp_port)
            .field("subject", &self.subject)
            .finish()
    }
}

/// Sends motion notifications over SMTP.
pub struct SmtpNotifier {
    from: Mailbox,
    recipients: Vec<Mailbox>,
    subject: String,
    body: String,
    transport: SmtpTransport,
}

impl SmtpNotifier {
    pub fn new(settings: &MailSettings) -> Result<Self> {
        settings.validate()?;

        let from_addr = if settings.from.trim().is_empty() {
            settings.username.as_str()
        } else {
            settings.from.as_str()
        };
        let from: Mailbox = from_addr
            .parse()
            .map_err(|e| anyhow!("invalid sender address '{}': {}", from_addr, e))?;
        let recipients = parse_recipients(&settings.to)?;

        let transport = SmtpTransport::starttls_relay(&settings.smtp_server)
            .map_err(|e| anyhow!("smtp relay {} rejected: {}", settings.smtp_server, e))?
            .port(settings.smtp_port)
            .credentials(Credentials::new(
                settings.username.clone(),
                settings.password.clone(),
            ))
            .build();

        Ok(Self {
            from,
            recipients,
            subject: settings.subject.clone(),
            body: settings.message.clone(),
            transport,
        })
    }

    fn build_message(&self, event: &MotionEvent, jpeg: &[u8]) -> Result<Message> {
        let mut builder = Message::builder()
            .from(self.from.clone())
            .subject(self.subject.clone());
        for to in &self.recipients {
            builder = builder.to(to.clone());
        }

        let body = format!(
            "{}\n\nMotion window: {}..{} (unix seconds), duration {:.1}s.",
            self.body,
            event.first_seen_epoch(),
            event.last_seen_epoch(),
            event.duration().as_secs_f64()
        );

        let filename = format!("motion_{}.jpg", event.frame.epoch_seconds());
        let content_type =
            ContentType::parse("image/jpeg").map_err(|e| anyhow!("jpeg content type: {}", e))?;
        let attachment = Attachment::new(filename).body(jpeg.to_vec(), content_type);

        builder
            .multipart(
                MultiPart::mixed()
                    .singlepart(SinglePart::plain(body))
                    .singlepart(attachment),
            )
            .map_err(|e| anyhow!("assemble email: {}", e))
    }

    fn send(&self, event: &MotionEvent, jpeg: &[u8]) -> Result<()> {
        let message = self.build_message(event, jpeg)?;
        self.transport
            .send(&message)
            .map_err(|e| anyhow!("smtp send: {}", e))?;
        Ok(())
    }
}

impl Notifier for SmtpNotifier {
    fn notify(&mut self, event: &MotionEvent, jpeg: &[u8]) -> bool {
        match self.send(event, jpeg) {
            Ok(()) => {
                log::info!("email sent to {} recipient(s)", self.recipients.len());
                true
            }
            Err(e) => {
                log::error!("email send failed: {:#}", e);
                false
            }
        }
    }
}

fn parse_recipients(to: &str) -> Result<Vec<Mailbox>> {
    let recipients = to
        .split(',')
        .map(|entry| entry.trim())
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            entry
                .parse::<Mailbox>()
                .map_err(|e| anyhow!("invalid recipient '{}': {}", entry, e))
        })
        .collect::<Result<Vec<_>>>()?;
    if recipients.is_empty() {
        return Err(anyhow!("email recipient list must be set"));
    }
    Ok(recipients)
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::Frame;
    use std::time::{Duration, UNIX_EPOCH};

    fn test_settings() -> MailSettings {
        let mut settings = MailSettings::default();
        settings.username = "watcher@example.com".to_string();
        settings.password = "app-key".to_string();
        settings.to = "alice@example.com, bob@example.com".to_string();
        settings
    }

    fn test_event() -> MotionEvent {
        let t = UNIX_EPOCH + Duration::from_secs(1_700_000_000);
        MotionEvent {
            frame: Frame::new(vec![0u8; 4 * 4 * 3], 4, 4, t).unwrap(),
            first_seen: t - Duration::from_secs(3),
            last_seen: t,
        }
    }

    #[test]
    fn missing_credentials_fail_construction() {
        let mut settings = test_settings();
        settings.password = String::new();
        assert!(SmtpNotifier::new(&settings).is_err());

        let mut settings = test_settings();
        settings.to = String::new();
        assert!(SmtpNotifier::new(&settings).is_err());
    }

    #[test]
    fn invalid_recipient_fails_construction() {
        let mut settings = test_settings();
        settings.to = "not an address".to_string();
        assert!(SmtpNotifier::new(&settings).is_err());
    }

    #[test]
    fn recipient_list_is_split_and_trimmed() {
        let recipients = parse_recipients(" a@example.com ,b@example.com,, ").unwrap();
        assert_eq!(recipients.len(), 2);
        assert_eq!(recipients[0].email.to_string(), "a@example.com");
    }

    #[test]
    fn message_carries_subject_body_and_attachment() {
        let notifier = SmtpNotifier::new(&test_settings()).unwrap();
        let message = notifier.build_message(&test_event(), &[0xFF, 0xD8, 0xFF, 0xD9]).unwrap();

        let formatted = String::from_utf8_lossy(&message.formatted()).to_string();
        assert!(formatted.contains("Subject: Motion Detected"));
        assert!(formatted.contains("image/jpeg"));
        assert!(formatted.contains("motion_1700000000.jpg"));
        assert!(formatted.contains("duration 3.0s"));
    }

    #[test]
    fn debug_output_redacts_the_password() {
        let rendered = format!("{:?}", test_settings());
        assert!(rendered.contains("<redacted>"));
        assert!(!rendered.contains("app-key"));
    }
}
