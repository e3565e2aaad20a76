use std::{
    collections::BTreeMap,
    fs::read_to_string,
    io::{self, Write},
    path::{Path, PathBuf},
};

use _model::{Model, PriceRecord, Source};
use tempfile::NamedTempFile;
use tracing::info;

use crate::error::PersistenceError;

/// Append-only price history backed by one pretty printed JSON array.
///
/// Records loaded from disk and records appended during this run are kept
/// apart so comparisons only ever look at what existed before the run.
#[derive(Debug)]
pub struct History {
    path: PathBuf,
    records: Vec<PriceRecord>,
    persisted: usize,
}

impl History {
    /// A missing file is an empty history. An unreadable or malformed one is
    /// an error, overwriting it would lose everything.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, PersistenceError> {
        let path = path.into();
        let records: Vec<PriceRecord> = if path.exists() {
            let raw = read_to_string(&path).map_err(|cause| PersistenceError::Read {
                path: path.clone(),
                cause,
            })?;
            if raw.trim().is_empty() {
                Vec::new()
            } else {
                let entries: Vec<serde_json::Value> =
                    serde_json::from_str(&raw).map_err(|cause| PersistenceError::Corrupt {
                        path: path.clone(),
                        cause,
                    })?;
                entries
                    .into_iter()
                    .enumerate()
                    .map(|(i, x)| {
                        serde_json::from_value::<PriceRecord>(x).map_err(|cause| {
                            PersistenceError::InvalidRecord {
                                path: path.clone(),
                                entry: i + 1,
                                cause,
                            }
                        })
                    })
                    .collect::<Result<_, _>>()?
            }
        } else {
            Vec::new()
        };

        info!("Loaded {} records from {}", records.len(), path.display());
        Ok(Self {
            persisted: records.len(),
            path,
            records,
        })
    }

    pub fn records(&self) -> &[PriceRecord] {
        &self.records
    }

    /// Records added since the last load or save.
    pub fn pending(&self) -> &[PriceRecord] {
        &self.records[self.persisted..]
    }

    pub fn append(&mut self, records: impl IntoIterator<Item = PriceRecord>) {
        self.records.extend(records);
    }

    /// All records for a pair, oldest first. File order is not trusted.
    pub fn query(&self, model: Model, source: Source) -> Vec<&PriceRecord> {
        let mut output: Vec<_> = self
            .records
            .iter()
            .filter(|x| x.pair() == (model, source))
            .collect();
        output.sort_by_key(|x| x.timestamp);
        output
    }

    /// Most recent record for a pair that was already on disk when the run
    /// started.
    pub fn latest_persisted(&self, model: Model, source: Source) -> Option<&PriceRecord> {
        self.records[..self.persisted]
            .iter()
            .filter(|x| x.pair() == (model, source))
            .max_by_key(|x| x.timestamp)
    }

    pub fn latest(&self) -> BTreeMap<(Model, Source), &PriceRecord> {
        let mut output: BTreeMap<_, &PriceRecord> = BTreeMap::new();
        for record in &self.records {
            let entry = output.entry(record.pair()).or_insert(record);
            if record.timestamp >= entry.timestamp {
                *entry = record;
            }
        }
        output
    }

    /// Rewrites the whole file through a temporary sibling and a rename, a
    /// crash part way leaves the previous file untouched.
    pub fn save(&mut self) -> Result<(), PersistenceError> {
        let write_error = |cause: io::Error| PersistenceError::Write {
            path: self.path.clone(),
            cause,
        };

        let mut output = serde_json::to_string_pretty(&self.records)?;
        output.push('\n');

        let dir = match self.path.parent() {
            Some(x) if !x.as_os_str().is_empty() => x,
            _ => Path::new("."),
        };
        let mut file = NamedTempFile::new_in(dir).map_err(write_error)?;
        file.write_all(output.as_bytes()).map_err(write_error)?;
        file.as_file().sync_all().map_err(write_error)?;
        file.persist(&self.path).map_err(|e| write_error(e.error))?;

        self.persisted = self.records.len();
        info!(
            "Saved {} records to {}",
            self.records.len(),
            self.path.display()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::fs::write;

    use chrono::{DateTime, TimeZone, Utc};

    use super::*;

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, day, 12, 0, 0).unwrap()
    }

    fn record(day: u32, model: Model, source: Source, price: f64) -> PriceRecord {
        PriceRecord::new(at(day), model, source, price, None, None).unwrap()
    }

    #[test]
    fn missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let history = History::load(dir.path().join("prices.json")).unwrap();
        assert!(history.records().is_empty());
    }

    #[test]
    fn round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prices.json");

        let mut history = History::load(&path).unwrap();
        history.append([
            record(3, Model::Iphone15ProMax, Source::AppleRefurbished, 1100.0),
            record(1, Model::Iphone16ProMax, Source::Reebelo, 875.5),
            PriceRecord::new(
                at(2),
                Model::Iphone17ProMax,
                Source::Reebelo,
                1299.99,
                Some("https://www.reebelo.com/products/x".to_string()),
                Some("https://cdn.reebelo.com/x.jpg".to_string()),
            )
            .unwrap(),
        ]);
        assert_eq!(history.pending().len(), 3);
        history.save().unwrap();
        assert!(history.pending().is_empty());

        let loaded = History::load(&path).unwrap();
        assert_eq!(loaded.records(), history.records());
        assert!(read_to_string(&path).unwrap().ends_with("]\n"));
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prices.json");
        write(&path, "[{\"timestamp\": ").unwrap();
        assert!(matches!(
            History::load(&path),
            Err(PersistenceError::Corrupt { .. })
        ));
    }

    #[test]
    fn zero_price_entry_is_named() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prices.json");
        write(
            &path,
            r#"[
  {"timestamp": "2024-01-01T00:00:00Z", "model": "iPhone 15 Pro Max", "price": 1200.0,
   "source": "apple_refurbished", "url": null, "image_url": null},
  {"timestamp": "2024-01-02T00:00:00Z", "model": "iPhone 15 Pro Max", "price": 0.0,
   "source": "apple_refurbished", "url": null, "image_url": null}
]"#,
        )
        .unwrap();
        let err = History::load(&path).unwrap_err();
        assert!(matches!(err, PersistenceError::InvalidRecord { entry: 2, .. }));
        let message = err.to_string();
        assert!(message.contains("entry 2"));
        assert!(message.contains("got 0"));
    }

    #[test]
    fn unwritable_location_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut history = History::load(dir.path().join("missing").join("prices.json")).unwrap();
        history.append([record(1, Model::Iphone15ProMax, Source::Reebelo, 900.0)]);
        assert!(matches!(
            history.save(),
            Err(PersistenceError::Write { .. })
        ));
    }

    #[test]
    fn query_sorts_by_timestamp() {
        let dir = tempfile::tempdir().unwrap();
        let mut history = History::load(dir.path().join("prices.json")).unwrap();
        history.append([
            record(5, Model::Iphone15ProMax, Source::Reebelo, 950.0),
            record(2, Model::Iphone15ProMax, Source::Reebelo, 990.0),
            record(4, Model::Iphone15ProMax, Source::AppleRefurbished, 1000.0),
            record(3, Model::Iphone15ProMax, Source::Reebelo, 970.0),
        ]);
        let prices: Vec<_> = history
            .query(Model::Iphone15ProMax, Source::Reebelo)
            .iter()
            .map(|x| x.price.get())
            .collect();
        assert_eq!(prices, vec![990.0, 970.0, 950.0]);
    }

    #[test]
    fn latest_persisted_ignores_pending() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prices.json");
        let mut history = History::load(&path).unwrap();
        history.append([
            record(9, Model::Iphone15ProMax, Source::Reebelo, 980.0),
            record(2, Model::Iphone15ProMax, Source::Reebelo, 990.0),
        ]);
        history.save().unwrap();

        let mut history = History::load(&path).unwrap();
        history.append([record(10, Model::Iphone15ProMax, Source::Reebelo, 900.0)]);
        let prior = history
            .latest_persisted(Model::Iphone15ProMax, Source::Reebelo)
            .unwrap();
        assert_eq!(prior.price.get(), 980.0);
        assert_eq!(
            history.latest()[&(Model::Iphone15ProMax, Source::Reebelo)]
                .price
                .get(),
            900.0
        );
        assert!(history
            .latest_persisted(Model::Iphone16ProMax, Source::Reebelo)
            .is_none());
    }
}
