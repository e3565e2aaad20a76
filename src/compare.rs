use _model::PriceRecord;
use tracing::{debug, info};

use crate::{config::Thresholds, history::History, notify::NotificationEvent};

pub fn drop_pct(old: f64, new: f64) -> f64 {
    (old - new) / old * 100.0
}

/// Compares one new observation with the last one before it. The threshold
/// check runs on whole cents and hundredths of a percent so a drop of exactly
/// the threshold fires.
pub fn evaluate(
    prior: &PriceRecord,
    current: &PriceRecord,
    threshold: f64,
) -> Option<NotificationEvent> {
    let (old, new) = (prior.cents(), current.cents());
    if new >= old {
        return None;
    }
    // hundredths of a percent
    let threshold = (threshold * 100.0).round() as i64;
    if (old - new) * 10_000 < threshold * old {
        return None;
    }

    Some(NotificationEvent {
        model: current.model,
        source: current.source,
        old_price: prior.price.get(),
        new_price: current.price.get(),
        drop_pct: drop_pct(prior.price.get(), current.price.get()),
        url: current.url.clone(),
    })
}

/// Checks every record appended this run against the newest record that was
/// already persisted for the same pair.
pub fn detect_drops(history: &History, thresholds: &Thresholds) -> Vec<NotificationEvent> {
    let mut events = Vec::new();
    for current in history.pending() {
        let prior = match history.latest_persisted(current.model, current.source) {
            Some(x) => x,
            None => {
                debug!(
                    "{} @ {}: first observation, baseline only",
                    current.model, current.source
                );
                continue;
            }
        };

        let threshold = thresholds.get(current.model);
        match evaluate(prior, current, threshold) {
            Some(event) => {
                info!(
                    "Price drop for {} @ {}: ${:.2} -> ${:.2} ({:.2}%)",
                    event.model, event.source, event.old_price, event.new_price, event.drop_pct
                );
                events.push(event);
            }
            None => debug!(
                "{} @ {}: ${:.2} -> ${:.2}, below {threshold}%",
                current.model,
                current.source,
                prior.price.get(),
                current.price.get()
            ),
        }
    }
    events
}
