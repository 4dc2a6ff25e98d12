//! Parent notification boundary.
//!
//! Delivery mechanics live in the SMTP relay; this module only owns the
//! input shape and the per-recipient result reporting. One bounced
//! recipient never aborts the rest of the batch.

use crate::error::RollcallError;
use crate::models::Status;
use chrono::NaiveDate;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use serde::Deserialize;

/// SMTP details from `config.toml`; the password comes from the
/// `SMTP_PASSWORD` environment variable.
#[derive(Debug, Clone, Deserialize)]
pub struct SmtpSettings {
    pub relay: String,
    pub sender: String,
    pub cc: Option<String>,
}

/// What the summary logic hands over for one student.
#[derive(Debug, Clone)]
pub struct Notification {
    pub student_name: String,
    pub roll_no: String,
    /// Parent email address.
    pub contact: String,
    pub status: Status,
    pub class_name: String,
    pub date: NaiveDate,
}

impl Notification {
    fn subject(&self) -> String {
        format!("Attendance alert: {} marked {}", self.student_name, self.status)
    }

    fn body(&self) -> String {
        format!(
            "{} ({}) was marked {} for {} on {}.",
            self.student_name, self.roll_no, self.status, self.class_name, self.date
        )
    }
}

/// Per-recipient delivery result.
#[derive(Debug, Clone)]
pub struct NotifyOutcome {
    pub roll_no: String,
    pub error: Option<String>,
}

impl NotifyOutcome {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Sends one message per notification over a STARTTLS relay, collecting a
/// result for every item. A transport that cannot be built fails every
/// item with the same reason rather than erroring the call.
pub fn send_notifications(
    settings: &SmtpSettings,
    password: &str,
    batch: &[Notification],
) -> Vec<NotifyOutcome> {
    let transport = match build_transport(settings, password) {
        Ok(transport) => transport,
        Err(reason) => {
            tracing::warn!(%reason, "SMTP transport unavailable");
            return batch
                .iter()
                .map(|item| NotifyOutcome {
                    roll_no: item.roll_no.clone(),
                    error: Some(reason.clone()),
                })
                .collect();
        }
    };

    batch
        .iter()
        .map(|item| NotifyOutcome {
            roll_no: item.roll_no.clone(),
            error: send_one(&transport, settings, item)
                .err()
                .map(|err| err.to_string()),
        })
        .collect()
}

fn build_transport(settings: &SmtpSettings, password: &str) -> Result<SmtpTransport, String> {
    let credentials = Credentials::new(settings.sender.clone(), password.to_string());
    Ok(SmtpTransport::starttls_relay(&settings.relay)
        .map_err(|err| err.to_string())?
        .credentials(credentials)
        .build())
}

fn send_one(
    transport: &SmtpTransport,
    settings: &SmtpSettings,
    item: &Notification,
) -> crate::error::Result<()> {
    let from: Mailbox = settings.sender.parse().map_err(|_| {
        RollcallError::Validation(format!("invalid sender address {:?}", settings.sender))
    })?;
    let to: Mailbox = item.contact.parse().map_err(|_| {
        RollcallError::Validation(format!("invalid contact address {:?}", item.contact))
    })?;

    let mut builder = Message::builder().from(from).to(to).subject(item.subject());
    if let Some(cc) = &settings.cc {
        let cc: Mailbox = cc
            .parse()
            .map_err(|_| RollcallError::Validation(format!("invalid cc address {cc:?}")))?;
        builder = builder.cc(cc);
    }

    let message = builder
        .body(item.body())
        .map_err(|err| RollcallError::ExternalService(err.to_string()))?;

    transport
        .send(&message)
        .map_err(|err| RollcallError::ExternalService(err.to_string()))?;
    tracing::info!(roll_no = %item.roll_no, status = %item.status, "notification sent");
    Ok(())
}
