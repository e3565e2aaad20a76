use _model::{Model, Source};
use serde::Serialize;
use tracing::{error, info};

use crate::{config::Config, error::NotificationError};

mod email;
mod webhook;

pub use email::Email;
pub use webhook::Webhook;

/// A detected drop, built by the comparator and gone once dispatched.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NotificationEvent {
    pub model: Model,
    pub source: Source,
    pub old_price: f64,
    pub new_price: f64,
    pub drop_pct: f64,
    pub url: Option<String>,
}

/// A delivery channel. One call per run carries every event.
pub trait Channel: Send + Sync {
    fn name(&self) -> &'static str;
    fn dispatch(&self, events: &[NotificationEvent]) -> Result<(), NotificationError>;
}

pub struct Notifier {
    channels: Vec<Box<dyn Channel>>,
}

impl Notifier {
    pub fn new(channels: Vec<Box<dyn Channel>>) -> Self {
        Self { channels }
    }

    /// Channels without configuration are left out.
    pub fn from_config(config: &Config) -> Self {
        let mut channels: Vec<Box<dyn Channel>> = Vec::new();
        if let Some(smtp) = &config.email {
            channels.push(Box::new(Email::new(smtp.clone(), config.fetch.timeout)));
        }
        if let Some(url) = &config.webhook_url {
            channels.push(Box::new(Webhook::new(url.clone(), &config.fetch)));
        }
        Self::new(channels)
    }

    pub fn channels(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.channels.iter().map(|x| x.name())
    }

    /// Failures are logged and dropped, nothing is queued for a later run.
    /// Returns how many channels accepted the events.
    pub fn notify(&self, events: &[NotificationEvent]) -> usize {
        if events.is_empty() {
            return 0;
        }
        if self.channels.is_empty() {
            info!("{} price drops, no notification channel configured", events.len());
            return 0;
        }

        let mut delivered = 0;
        for channel in &self.channels {
            match channel.dispatch(events) {
                Ok(()) => {
                    info!("Sent {} price drops via {}", events.len(), channel.name());
                    delivered += 1;
                }
                Err(e) => error!("{} notification failed: {e}", channel.name()),
            }
        }
        delivered
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::config::Config;

    struct Recorder {
        fail: bool,
        seen: Arc<Mutex<Vec<usize>>>,
    }

    impl Channel for Recorder {
        fn name(&self) -> &'static str {
            "recorder"
        }

        fn dispatch(&self, events: &[NotificationEvent]) -> Result<(), NotificationError> {
            self.seen.lock().unwrap().push(events.len());
            if self.fail {
                Err(NotificationError::Webhook("boom".to_string()))
            } else {
                Ok(())
            }
        }
    }

    fn event() -> NotificationEvent {
        NotificationEvent {
            model: Model::Iphone15ProMax,
            source: Source::AppleRefurbished,
            old_price: 1200.0,
            new_price: 1100.0,
            drop_pct: 8.333333333333332,
            url: None,
        }
    }

    #[test]
    fn failing_channel_does_not_stop_others() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let notifier = Notifier::new(vec![
            Box::new(Recorder {
                fail: true,
                seen: seen.clone(),
            }),
            Box::new(Recorder {
                fail: false,
                seen: seen.clone(),
            }),
        ]);
        assert_eq!(notifier.notify(&[event(), event()]), 1);
        assert_eq!(*seen.lock().unwrap(), vec![2, 2]);
    }

    #[test]
    fn nothing_to_send() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let notifier = Notifier::new(vec![Box::new(Recorder {
            fail: false,
            seen: seen.clone(),
        })]);
        assert_eq!(notifier.notify(&[]), 0);
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn channels_follow_config() {
        let notifier = Notifier::from_config(&Config::from_vars([(
            "WEBHOOK_URL",
            "https://hooks.example.com/x",
        )]));
        assert_eq!(notifier.channels().collect::<Vec<_>>(), vec!["webhook"]);

        let notifier = Notifier::from_config(&Config::from_vars([("SMTP_HOST", "smtp.example.com")]));
        assert_eq!(notifier.channels().count(), 0);
    }

    #[test]
    fn payload_shape() {
        let value = serde_json::to_value([event()]).unwrap();
        assert_eq!(
            value,
            serde_json::json!([{
                "model": "iPhone 15 Pro Max",
                "source": "apple_refurbished",
                "old_price": 1200.0,
                "new_price": 1100.0,
                "drop_pct": 8.333333333333332,
                "url": null,
            }])
        );
    }
}
