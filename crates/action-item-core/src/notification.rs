//! Email notifications for action item events.
//!
//! The `ActionItemNotifier` reacts to item events whose new status is listed
//! in the action's `notify_on`, renders a plain-text message and hands it to
//! a `Mailer`. Two mailers exist: `SmtpMailer` (lettre, blocking SMTP) and
//! `OutboxMailer`, which writes each message as a YAML file so that a
//! deployment without SMTP still keeps a record.

use crate::action_item::ActionItem;
use crate::config::{MailTransport, NotificationConfig};
use crate::db::ActionDb;
use crate::error::{ActionError, Result};
use crate::events::WorkflowEvent;
use crate::io;
use crate::registry::SiteActionItems;
use crate::types::ActionStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// NotificationMessage
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationMessage {
    pub from: String,
    pub to: Vec<String>,
    pub subject: String,
    pub body: String,
    pub action_identifier: String,
    pub created_at: DateTime<Utc>,
}

impl NotificationMessage {
    pub fn render(
        config: &NotificationConfig,
        display_name: &str,
        item: &ActionItem,
        status: ActionStatus,
    ) -> Self {
        let subject = format!(
            "{} {} ({}) for subject {}",
            config.subject_prefix, display_name, status, item.subject_identifier
        );
        let mut body = format!(
            "Action: {display_name}\n\
             Action identifier: {}\n\
             Subject: {}\n\
             Status: {status}\n\
             Priority: {}\n\
             Report date: {}\n",
            item.action_identifier,
            item.subject_identifier,
            item.priority,
            item.report_datetime.format("%Y-%m-%d %H:%M UTC"),
        );
        if let Some(parent) = &item.parent_action_identifier {
            body.push_str(&format!("Parent action: {parent}\n"));
        }
        if let Some(instructions) = &item.instructions {
            body.push_str(&format!("\n{instructions}\n"));
        }
        Self {
            from: config.from_address.clone(),
            to: config.recipients_for(&item.action_type).to_vec(),
            subject,
            body,
            action_identifier: item.action_identifier.clone(),
            created_at: Utc::now(),
        }
    }
}

// ---------------------------------------------------------------------------
// Mailer
// ---------------------------------------------------------------------------

pub trait Mailer {
    fn send(&self, message: &NotificationMessage) -> Result<()>;
}

/// Writes messages to `<dir>/<action_identifier>-<timestamp>.yaml`.
pub struct OutboxMailer {
    dir: PathBuf,
}

impl OutboxMailer {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl Mailer for OutboxMailer {
    fn send(&self, message: &NotificationMessage) -> Result<()> {
        let name = format!(
            "{}-{}.yaml",
            message.action_identifier,
            message.created_at.format("%Y%m%dT%H%M%S%.6f")
        );
        io::write_yaml(&self.dir.join(name), message)
    }
}

pub struct SmtpMailer {
    host: String,
    port: u16,
    user: Option<String>,
    password: Option<String>,
}

impl SmtpMailer {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            user: None,
            password: None,
        }
    }

    pub fn with_credentials(mut self, user: Option<String>, password: Option<String>) -> Self {
        self.user = user;
        self.password = password;
        self
    }
}

fn mail_err<E: std::fmt::Display>(e: E) -> ActionError {
    ActionError::Notification(e.to_string())
}

impl Mailer for SmtpMailer {
    fn send(&self, message: &NotificationMessage) -> Result<()> {
        use lettre::{
            message::header::ContentType, transport::smtp::authentication::Credentials,
            Message, SmtpTransport, Transport,
        };

        let mut builder = Message::builder()
            .from(message.from.parse().map_err(mail_err)?)
            .subject(message.subject.clone())
            .header(ContentType::TEXT_PLAIN);
        for to in &message.to {
            builder = builder.to(to.parse().map_err(mail_err)?);
        }
        let email = builder.body(message.body.clone()).map_err(mail_err)?;

        let mut transport = SmtpTransport::starttls_relay(&self.host)
            .map_err(mail_err)?
            .port(self.port);
        if let (Some(user), Some(pass)) = (&self.user, &self.password) {
            transport = transport.credentials(Credentials::new(user.clone(), pass.clone()));
        }
        transport.build().send(&email).map_err(mail_err)?;

        tracing::info!(
            to = ?message.to,
            action_identifier = %message.action_identifier,
            "notification email sent"
        );
        Ok(())
    }
}

/// The mailer for `transport`; outbox messages go under `root`.
pub fn mailer_for(transport: &MailTransport, root: &Path) -> Box<dyn Mailer> {
    match transport {
        MailTransport::Outbox => Box::new(OutboxMailer::new(crate::paths::outbox_dir(root))),
        MailTransport::Smtp {
            host,
            port,
            user,
            password,
        } => Box::new(
            SmtpMailer::new(host.clone(), *port).with_credentials(user.clone(), password.clone()),
        ),
    }
}

// ---------------------------------------------------------------------------
// ActionItemNotifier
// ---------------------------------------------------------------------------

pub struct ActionItemNotifier {
    config: NotificationConfig,
    mailer: Box<dyn Mailer>,
}

impl ActionItemNotifier {
    pub fn new(config: NotificationConfig, mailer: Box<dyn Mailer>) -> Self {
        Self { config, mailer }
    }

    /// A notifier using the configured transport, or `None` when
    /// notifications are disabled.
    pub fn from_config(config: &NotificationConfig, root: &Path) -> Option<Self> {
        if !config.enabled {
            return None;
        }
        let mailer = mailer_for(&config.effective_transport(), root);
        Some(Self::new(config.clone(), mailer))
    }

    /// Send a notification for `event` if its action asks for one. Returns
    /// whether a message was sent; the item is marked emailed on success.
    pub fn notify(
        &self,
        db: &ActionDb,
        site: &SiteActionItems,
        event: &WorkflowEvent,
    ) -> Result<bool> {
        let Some((action_identifier, status)) = event.notify_status() else {
            return Ok(false);
        };
        let Some(mut item) = db.get_item(action_identifier)? else {
            return Ok(false);
        };
        let Ok(definition) = site.get(&item.action_type) else {
            return Ok(false);
        };
        if !definition.notifies_on(status) {
            return Ok(false);
        }

        let message =
            NotificationMessage::render(&self.config, &definition.display_name(), &item, status);
        if message.to.is_empty() {
            tracing::debug!(action = %item.action_type, "no notification recipients");
            return Ok(false);
        }
        self.mailer.send(&message)?;

        item.mark_emailed();
        db.update_item(&item)?;
        Ok(true)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
