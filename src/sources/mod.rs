use _model::{Model, Source, ValidationError};
use scraper::{ElementRef, Selector};

use crate::error::ParseError;

mod apple;
mod reebelo;

pub use apple::AppleRefurbished;
pub use reebelo::Reebelo;

/// A listing price found on a page, before it becomes a record.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub cents: u64,
    pub url: Option<String>,
    pub image_url: Option<String>,
}

/// Extracts the listings for one model from a retailer page. A page without
/// a matching listing is `Ok(vec![])`, only unrecognisable markup is an error.
pub trait Parse: Sync {
    fn parse(&self, content: &str, model: Model) -> Result<Vec<Candidate>, ParseError>;
}

pub fn parser(source: Source) -> &'static dyn Parse {
    match source {
        Source::AppleRefurbished => &AppleRefurbished,
        Source::Reebelo => &Reebelo,
    }
}

/// Picks the one candidate a run keeps for a (model, source) pair.
pub fn select(source: Source, candidates: Vec<Candidate>) -> Option<Candidate> {
    match source {
        Source::AppleRefurbished => candidates.into_iter().next(),
        // min_by keeps the first of equal elements
        Source::Reebelo => candidates.into_iter().min_by(|a, b| a.cents.cmp(&b.cents)),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Target {
    pub model: Model,
    pub source: Source,
    pub url: String,
}

pub fn catalog() -> Vec<Target> {
    let mut targets = Vec::new();
    for source in Source::all() {
        for model in Model::all() {
            let url = match source {
                Source::AppleRefurbished => format!(
                    "https://www.apple.com/shop/refurbished/iphone/{}",
                    model.slug()
                ),
                Source::Reebelo => format!(
                    "https://www.reebelo.com/search?q={}+{}",
                    model.slug().replace('-', "+"),
                    model.capacity().to_lowercase()
                ),
            };
            targets.push(Target { model, source, url });
        }
    }
    targets
}

pub fn fallback_image(model: Model) -> Option<&'static str> {
    match model {
        Model::Iphone15ProMax => Some("https://store.storeimages.cdn-apple.com/4982/as-images.apple.com/is/refurb-iphone-15-pro-max-naturaltitanium-256gb?wid=200&hei=200&fmt=jpeg&qlt=90&.v=1694026287138"),
        Model::Iphone16ProMax => Some("https://store.storeimages.cdn-apple.com/4982/as-images.apple.com/is/iphone-16-pro-max-naturaltitanium-select?wid=200&hei=200&fmt=jpeg&qlt=90&.v=1726616109456"),
        Model::Iphone17ProMax => None,
    }
}

fn compact(s: &str) -> String {
    s.chars()
        .filter(|x| x.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Listing titles name the model and capacity in varying spacing and case.
pub fn matches_model(title: &str, model: Model) -> bool {
    let title = compact(title);
    title.contains(&compact(model.name())) && title.contains(&compact(model.capacity()))
}

/// Parses the first amount in a price label into cents.
pub fn parse_price(raw: &str) -> Result<u64, ValidationError> {
    let invalid = || ValidationError::MalformedPrice(raw.to_string());

    let start = raw.find(|x: char| x.is_ascii_digit()).ok_or_else(invalid)?;
    let amount: String = raw[start..]
        .chars()
        .take_while(|x| x.is_ascii_digit() || *x == ',' || *x == '.')
        .filter(|x| *x != ',')
        .collect();
    let amount = amount.trim_end_matches('.');

    if let Some((a, b)) = amount.split_once('.') {
        let a: u64 = a.parse().map_err(|_| invalid())?;
        let b: u64 = match b.len() {
            1 => b.parse::<u64>().map_err(|_| invalid())? * 10,
            2 => b.parse().map_err(|_| invalid())?,
            _ => return Err(invalid()),
        };
        a.checked_mul(100)
            .and_then(|x| x.checked_add(b))
            .ok_or_else(invalid)
    } else {
        let a: u64 = amount.parse().map_err(|_| invalid())?;
        a.checked_mul(100).ok_or_else(invalid)
    }
}

fn selector(css: &'static str) -> Result<Selector, ParseError> {
    Selector::parse(css).map_err(|_| ParseError::Selector(css))
}

fn text(element: ElementRef) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

fn absolute(origin: &str, href: &str) -> String {
    if href.starts_with("http://") || href.starts_with("https://") {
        href.to_string()
    } else if let Some(x) = href.strip_prefix("//") {
        format!("https://{x}")
    } else {
        format!("{origin}/{}", href.trim_start_matches('/'))
    }
}

fn image(element: ElementRef, img: &Selector, origin: &str) -> Option<String> {
    let img = element.select(img).next()?;
    // lazy loaded images keep a data: placeholder in src
    let src = ["src", "data-src"]
        .into_iter()
        .filter_map(|x| img.value().attr(x))
        .find(|x| !x.is_empty() && !x.starts_with("data:"))?;
    Some(absolute(origin, src))
}
