//! SMTP alert transport.
//!
//! Implements [`AlertTransport`] with `lettre`: one plain-text e-mail per
//! alert, sent synchronously from the dispatcher thread (never from a sensor
//! watcher).  STARTTLS is used unless `smtp_tls = off`.

use lettre::message::Mailbox;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use log::{debug, info};

use crate::app::events::Alert;
use crate::app::ports::AlertTransport;
use crate::config::NotifyConfig;
use crate::error::NotificationError;

const DEFAULT_FROM: &str = "doorwatch@localhost";

pub struct SmtpAlertTransport {
    mailer: SmtpTransport,
    from: Mailbox,
    to: Mailbox,
}

impl SmtpAlertTransport {
    pub fn from_config(cfg: &NotifyConfig) -> Result<Self, NotificationError> {
        let host = cfg
            .smtp_host
            .as_deref()
            .ok_or(NotificationError::NotConfigured("smtp_host"))?;
        let to = cfg
            .recipient
            .as_deref()
            .ok_or(NotificationError::NotConfigured("notify"))?;

        let to = parse_mailbox(to)?;
        let from = parse_mailbox(cfg.from.as_deref().unwrap_or(DEFAULT_FROM))?;

        let mut builder = if cfg.smtp_tls {
            SmtpTransport::starttls_relay(host)
                .map_err(|e| NotificationError::Build(format!("relay {host}: {e}")))?
        } else {
            SmtpTransport::builder_dangerous(host)
        };
        builder = builder.port(cfg.smtp_port);
        if let (Some(user), Some(pass)) = (&cfg.smtp_user, &cfg.smtp_pass) {
            builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }

        info!(
            "smtp: relay {}:{} (tls={}) -> {}",
            host, cfg.smtp_port, cfg.smtp_tls, to
        );
        Ok(Self {
            mailer: builder.build(),
            from,
            to,
        })
    }

    fn message(&self, alert: &Alert) -> Result<Message, NotificationError> {
        build_message(&self.from, &self.to, alert)
    }
}

fn parse_mailbox(addr: &str) -> Result<Mailbox, NotificationError> {
    addr.parse()
        .map_err(|e| NotificationError::Build(format!("address {addr:?}: {e}")))
}

fn build_message(from: &Mailbox, to: &Mailbox, alert: &Alert) -> Result<Message, NotificationError> {
    Message::builder()
        .from(from.clone())
        .to(to.clone())
        .subject(alert.subject())
        .header(ContentType::TEXT_PLAIN)
        .body(alert.body())
        .map_err(|e| NotificationError::Build(e.to_string()))
}

impl AlertTransport for SmtpAlertTransport {
    fn name(&self) -> &'static str {
        "smtp"
    }

    fn send(&mut self, alert: &Alert) -> Result<(), NotificationError> {
        let msg = self.message(alert)?;
        let response = self
            .mailer
            .send(&msg)
            .map_err(|e| NotificationError::Transport(e.to_string()))?;
        debug!("smtp: accepted ({:?})", response.code());
        Ok(())
    }
}
