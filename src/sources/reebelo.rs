use _model::{Model, Source};
use scraper::Html;
use tracing::debug;

use super::{absolute, image, matches_model, parse_price, selector, text, Candidate, Parse};
use crate::error::ParseError;

const ORIGIN: &str = "https://www.reebelo.com";

// below this it's a case or a deposit, above it a bundle
const PLAUSIBLE_CENTS: std::ops::RangeInclusive<u64> = 100_00..=5000_00;

/// Reebelo search results. Every matching card is a separate seller listing,
/// the run keeps the cheapest.
pub struct Reebelo;

impl Parse for Reebelo {
    fn parse(&self, content: &str, model: Model) -> Result<Vec<Candidate>, ParseError> {
        let card = selector("[data-testid='product-card'], .product-card")?;
        let title = selector("[data-testid='product-title'], .product-title, h2, h3")?;
        let price = selector("[data-testid='product-price'], .product-price, .price")?;
        let link = selector("a[href]")?;
        let img = selector("img")?;

        let document = Html::parse_document(content);
        let cards: Vec<_> = document.select(&card).collect();
        if cards.is_empty() {
            return Err(ParseError::MissingStructure {
                site: Source::Reebelo,
                expected: "product cards",
            });
        }

        let mut found = Vec::new();
        for card in cards {
            let name = match card.select(&title).next() {
                Some(x) => text(x),
                None => continue,
            };
            if !matches_model(&name, model) {
                continue;
            }

            let label = match card.value().attr("data-price") {
                Some(x) => x.to_string(),
                None => match card.select(&price).next() {
                    Some(x) => text(x),
                    None => {
                        debug!("no price on card {name:?}");
                        continue;
                    }
                },
            };
            let cents = match parse_price(&label) {
                Ok(x) => x,
                Err(e) => {
                    debug!("skipping card {name:?}: {e}");
                    continue;
                }
            };
            if !PLAUSIBLE_CENTS.contains(&cents) {
                debug!("skipping card {name:?}: implausible price {label:?}");
                continue;
            }

            let href = match card.value().attr("href") {
                Some(x) => Some(x),
                None => card
                    .select(&link)
                    .next()
                    .and_then(|x| x.value().attr("href")),
            };
            found.push(Candidate {
                cents,
                url: href.map(|x| absolute(ORIGIN, x)),
                image_url: image(card, &img, ORIGIN),
            });
        }

        Ok(found)
    }
}
