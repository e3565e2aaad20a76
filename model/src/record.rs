use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

use crate::{Model, Price, Source};

#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("price must be positive and finite, got {0}")]
    NonPositivePrice(f64),
    #[error("malformed price: {0:?}")]
    MalformedPrice(String),
    #[error("unknown model: {0}")]
    UnknownModel(String),
    #[error("unknown source: {0}")]
    UnknownSource(String),
}

/// One observation of one model at one source. Field order matches the
/// history file consumed by the dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceRecord {
    #[serde(deserialize_with = "timestamp")]
    pub timestamp: DateTime<Utc>,
    pub model: Model,
    #[serde(deserialize_with = "price")]
    pub price: Price,
    pub source: Source,
    #[serde(default, deserialize_with = "non_empty")]
    pub url: Option<String>,
    #[serde(default, deserialize_with = "non_empty")]
    pub image_url: Option<String>,
}

impl PriceRecord {
    pub fn new(
        timestamp: DateTime<Utc>,
        model: Model,
        source: Source,
        price: f64,
        url: Option<String>,
        image_url: Option<String>,
    ) -> Result<Self, ValidationError> {
        let price = Price::new(price).map_err(|_| ValidationError::NonPositivePrice(price))?;
        Ok(Self {
            timestamp,
            model,
            price,
            source,
            url: url.filter(|x| !x.is_empty()),
            image_url: image_url.filter(|x| !x.is_empty()),
        })
    }

    pub fn pair(&self) -> (Model, Source) {
        (self.model, self.source)
    }

    pub fn cents(&self) -> i64 {
        (self.price.get() * 100.0).round() as i64
    }
}

// older files were written with naive local timestamps, treat them as utc
fn timestamp<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
    let raw = String::deserialize(deserializer)?;
    if let Ok(x) = DateTime::parse_from_rfc3339(&raw) {
        return Ok(x.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(&raw, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|x| x.and_utc())
        .map_err(serde::de::Error::custom)
}

fn price<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Price, D::Error> {
    let raw = f64::deserialize(deserializer)?;
    Price::new(raw).map_err(|_| serde::de::Error::custom(ValidationError::NonPositivePrice(raw)))
}

fn non_empty<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.filter(|x| !x.is_empty()))
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn jan_first() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn rejects_non_positive_prices() {
        for price in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            assert!(PriceRecord::new(
                jan_first(),
                Model::Iphone15ProMax,
                Source::Reebelo,
                price,
                None,
                None
            )
            .is_err());
        }
    }

    #[test]
    fn serialized_shape() {
        let record = PriceRecord::new(
            jan_first(),
            Model::Iphone15ProMax,
            Source::AppleRefurbished,
            1200.0,
            Some("https://www.apple.com/shop/refurbished/iphone".to_string()),
            None,
        )
        .unwrap();
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "timestamp": "2024-01-01T00:00:00Z",
                "model": "iPhone 15 Pro Max",
                "price": 1200.0,
                "source": "apple_refurbished",
                "url": "https://www.apple.com/shop/refurbished/iphone",
                "image_url": null,
            })
        );
        let back: PriceRecord = serde_json::from_value(value).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn loads_legacy_entries() {
        let record: PriceRecord = serde_json::from_str(
            r#"{
                "timestamp": "2024-01-01T09:30:00.123456",
                "model": "iPhone 16 Pro Max",
                "price": 999.0,
                "source": "reebelo",
                "url": "https://www.reebelo.com/search?q=iphone+16+pro+max+256gb",
                "image_url": ""
            }"#,
        )
        .unwrap();
        assert_eq!(record.timestamp.to_rfc3339(), "2024-01-01T09:30:00.123456+00:00");
        assert_eq!(record.image_url, None);
        assert_eq!(record.cents(), 99900);
    }

    #[test]
    fn refuses_zero_price_on_load() {
        let result: Result<PriceRecord, _> = serde_json::from_str(
            r#"{"timestamp": "2024-01-01T00:00:00Z", "model": "iPhone 16 Pro Max",
                "price": 0.0, "source": "reebelo", "url": null, "image_url": null}"#,
        );
        assert!(result.is_err());
    }
}
