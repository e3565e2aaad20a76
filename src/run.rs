use _model::{PriceRecord, Source};
use chrono::{DateTime, Utc};
use itertools::Itertools;
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::{
    compare::detect_drops,
    config::Config,
    error::PersistenceError,
    fetch::{Fetch, SourceSession},
    history::History,
    notify::Notifier,
    sources::{fallback_image, parser, select, Target},
    utils::progress_bar,
};

#[derive(Debug)]
enum Outcome {
    Recorded(PriceRecord),
    NoListing,
    Discarded,
    Failed,
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct RunReport {
    pub attempted: usize,
    pub recorded: usize,
    pub no_listing: usize,
    pub discarded: usize,
    pub failed: usize,
    pub notifications: usize,
}

/// One pass over the targets. Sources are fetched in parallel, the targets of
/// one source one after the other with the configured spacing.
pub struct Engine<'a> {
    pub config: &'a Config,
    pub fetcher: &'a dyn Fetch,
    pub notifier: &'a Notifier,
    /// Fetch, parse and compare only.
    pub dry_run: bool,
}

impl Engine<'_> {
    /// Only a failure to persist the history is an error, every per-target
    /// problem is logged and counted.
    pub fn run(
        &self,
        targets: &[Target],
        history: &mut History,
        now: DateTime<Utc>,
    ) -> Result<RunReport, PersistenceError> {
        let mut report = RunReport {
            attempted: targets.len(),
            ..RunReport::default()
        };

        let groups: Vec<(Source, Vec<(usize, &Target)>)> = targets
            .iter()
            .enumerate()
            .into_group_map_by(|(_, x)| x.source)
            .into_iter()
            .sorted_by_key(|(source, _)| *source)
            .collect();

        let pb = progress_bar(targets.len() as u64);
        let mut outcomes: Vec<(usize, Outcome)> = groups
            .par_iter()
            .map(|(source, targets)| {
                let mut session = SourceSession::new(self.fetcher, *source, &self.config.fetch);
                targets
                    .iter()
                    .map(|(i, target)| {
                        pb.set_message(format!("{} @ {}", target.model, target.source));
                        let outcome = observe(&mut session, target, now);
                        pb.inc(1);
                        (*i, outcome)
                    })
                    .collect::<Vec<_>>()
            })
            .flatten()
            .collect();
        pb.finish_and_clear();

        // merge back into target order so the file reads the same whichever source finished first
        outcomes.sort_by_key(|(i, _)| *i);
        let mut records = Vec::new();
        for (_, outcome) in outcomes {
            match outcome {
                Outcome::Recorded(x) => {
                    report.recorded += 1;
                    records.push(x);
                }
                Outcome::NoListing => report.no_listing += 1,
                Outcome::Discarded => report.discarded += 1,
                Outcome::Failed => report.failed += 1,
            }
        }
        history.append(records);

        let events = detect_drops(history, &self.config.thresholds);
        report.notifications = events.len();

        if self.dry_run {
            info!(
                "Dry run, not notifying {} drops or saving {} records",
                events.len(),
                history.pending().len()
            );
        } else {
            self.notifier.notify(&events);
            history.save()?;
        }

        info!(
            "Run finished: {} targets, {} recorded, {} without listing, {} discarded, {} failed, {} drops",
            report.attempted,
            report.recorded,
            report.no_listing,
            report.discarded,
            report.failed,
            report.notifications
        );
        Ok(report)
    }
}

fn observe(session: &mut SourceSession, target: &Target, now: DateTime<Utc>) -> Outcome {
    let Target { model, source, url } = target;

    let content = match session.get(url) {
        Ok(x) => x,
        Err(e) => {
            warn!("{model} @ {source}: {e}");
            return Outcome::Failed;
        }
    };

    let candidates = match parser(*source).parse(&content, *model) {
        Ok(x) => x,
        Err(e) => {
            warn!("{model} @ {source}: {e}");
            return Outcome::Failed;
        }
    };
    debug!("{model} @ {source}: {} candidates", candidates.len());

    let candidate = match select(*source, candidates) {
        Some(x) => x,
        None => {
            info!("{model} @ {source}: no listing");
            return Outcome::NoListing;
        }
    };

    let record = PriceRecord::new(
        now,
        *model,
        *source,
        candidate.cents as f64 / 100.0,
        candidate.url.or_else(|| Some(url.clone())),
        candidate
            .image_url
            .or_else(|| fallback_image(*model).map(String::from)),
    );
    match record {
        Ok(x) => {
            info!("{model} @ {source}: ${:.2}", x.price.get());
            Outcome::Recorded(x)
        }
        Err(e) => {
            debug!("{model} @ {source}: discarding candidate, {e}");
            Outcome::Discarded
        }
    }
}
