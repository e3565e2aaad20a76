use std::{fmt::Write, time::Duration};

use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    Message, SmtpTransport, Transport,
};

use super::{Channel, NotificationEvent};
use crate::{config::SmtpConfig, error::NotificationError};

/// One summary message per run over SMTP with TLS, implicit on port 465 and
/// STARTTLS otherwise.
pub struct Email {
    config: SmtpConfig,
    timeout: Duration,
}

impl Email {
    pub fn new(config: SmtpConfig, timeout: Duration) -> Self {
        Self { config, timeout }
    }

    pub fn message(&self, events: &[NotificationEvent]) -> Result<Message, NotificationError> {
        let from: Mailbox = self
            .config
            .user
            .parse()
            .map_err(|e| NotificationError::Email(format!("invalid SMTP_USER: {e}")))?;

        let mut builder = Message::builder().from(from).subject(subject(events));
        for to in self.config.to.split(',').map(str::trim).filter(|x| !x.is_empty()) {
            let to: Mailbox = to
                .parse()
                .map_err(|e| NotificationError::Email(format!("invalid SMTP_TO {to:?}: {e}")))?;
            builder = builder.to(to);
        }

        builder
            .header(ContentType::TEXT_PLAIN)
            .body(body(events))
            .map_err(|e| NotificationError::Email(e.to_string()))
    }

    fn transport(&self) -> Result<SmtpTransport, NotificationError> {
        let builder = if self.config.port == 465 {
            SmtpTransport::relay(&self.config.host)
        } else {
            SmtpTransport::starttls_relay(&self.config.host)
        }
        .map_err(|e| NotificationError::Email(e.to_string()))?;

        Ok(builder
            .port(self.config.port)
            .credentials(Credentials::new(
                self.config.user.clone(),
                self.config.password.clone(),
            ))
            .timeout(Some(self.timeout))
            .build())
    }
}

impl Channel for Email {
    fn name(&self) -> &'static str {
        "email"
    }

    fn dispatch(&self, events: &[NotificationEvent]) -> Result<(), NotificationError> {
        let message = self.message(events)?;
        self.transport()?
            .send(&message)
            .map_err(|e| NotificationError::Email(e.to_string()))?;
        Ok(())
    }
}

pub fn subject(events: &[NotificationEvent]) -> String {
    match events {
        [x] => format!("Price Drop Alert: {}", x.model),
        _ => format!("Price Drop Alert: {} listings", events.len()),
    }
}

pub fn body(events: &[NotificationEvent]) -> String {
    let mut output = String::from("Price Drop Alert!\n");
    for x in events {
        // writing to a String can't fail
        let _ = write!(
            output,
            "\n{} ({})\n  Previous price: {}\n  New price:      {}\n  Savings:        {} ({:.1}% drop)\n",
            x.model,
            x.source,
            dollars(x.old_price),
            dollars(x.new_price),
            dollars(x.old_price - x.new_price),
            x.drop_pct,
        );
        if let Some(url) = &x.url {
            let _ = writeln!(output, "  {url}");
        }
    }
    output.push_str("\nCheck it out now!\n");
    output
}

fn dollars(amount: f64) -> String {
    let cents = (amount * 100.0).round() as i64;
    let whole = (cents / 100).to_string();
    let mut grouped = String::new();
    for (i, c) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    format!("${grouped}.{:02}", cents % 100)
}
