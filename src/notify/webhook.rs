use ureq::{Agent, AgentBuilder};

use super::{Channel, NotificationEvent};
use crate::{config::FetchConfig, error::NotificationError};

/// POSTs the run's events as one JSON array.
pub struct Webhook {
    url: String,
    agent: Agent,
}

impl Webhook {
    pub fn new(url: String, config: &FetchConfig) -> Self {
        let agent = AgentBuilder::new()
            .user_agent(concat!("pricewatch/", env!("CARGO_PKG_VERSION")))
            .timeout(config.timeout)
            .build();
        Self { url, agent }
    }
}

impl Channel for Webhook {
    fn name(&self) -> &'static str {
        "webhook"
    }

    fn dispatch(&self, events: &[NotificationEvent]) -> Result<(), NotificationError> {
        match self.agent.post(&self.url).send_json(events) {
            Ok(x) if (200..300).contains(&x.status()) => Ok(()),
            Ok(x) => Err(NotificationError::WebhookStatus(x.status())),
            Err(ureq::Error::Status(status, _)) => Err(NotificationError::WebhookStatus(status)),
            Err(e) => Err(NotificationError::Webhook(e.to_string())),
        }
    }
}
