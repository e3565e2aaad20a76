use _model::{Model, Source};
use itertools::Itertools;
use scraper::Html;
use tracing::{debug, warn};

use super::{absolute, image, matches_model, parse_price, selector, text, Candidate, Parse};
use crate::error::ParseError;

const ORIGIN: &str = "https://www.apple.com";

/// Apple Certified Refurbished listing grid. Each tile is one product in one
/// colour, so a model can show up several times at the same price.
pub struct AppleRefurbished;

impl Parse for AppleRefurbished {
    fn parse(&self, content: &str, model: Model) -> Result<Vec<Candidate>, ParseError> {
        let tile = selector(".rf-refurb-producttile, [data-autom='producttile']")?;
        let title = selector("h3 a, .rf-refurb-producttile-title a")?;
        let price = selector(
            ".rf-refurb-producttile-currentprice, .as-price-currentprice, [data-autom='price']",
        )?;
        let img = selector("img")?;

        let document = Html::parse_document(content);
        let tiles: Vec<_> = document.select(&tile).collect();
        if tiles.is_empty() {
            return Err(ParseError::MissingStructure {
                site: Source::AppleRefurbished,
                expected: "product tiles",
            });
        }

        let mut found = Vec::new();
        for tile in tiles {
            let link = match tile.select(&title).next() {
                Some(x) => x,
                None => continue,
            };
            let name = text(link);
            if !matches_model(&name, model) {
                continue;
            }

            let label = match tile.select(&price).next() {
                Some(x) => text(x),
                None => {
                    debug!("no price on tile {name:?}");
                    continue;
                }
            };
            let cents = match parse_price(&label) {
                Ok(x) => x,
                Err(e) => {
                    debug!("skipping tile {name:?}: {e}");
                    continue;
                }
            };

            found.push(Candidate {
                cents,
                url: link.value().attr("href").map(|x| absolute(ORIGIN, x)),
                image_url: image(tile, &img, ORIGIN),
            });
        }

        // colours share a price, anything else means we can't tell which is canonical
        if found.iter().map(|x| x.cents).all_equal() {
            found.truncate(1);
            Ok(found)
        } else {
            warn!(
                "{model}: ambiguous refurbished prices {:?}, skipping",
                found.iter().map(|x| x.cents).collect_vec()
            );
            Ok(Vec::new())
        }
    }
}
