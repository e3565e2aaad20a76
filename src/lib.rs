pub mod compare;
pub mod config;
pub mod error;
pub mod fetch;
pub mod history;
pub mod notify;
pub mod run;
pub mod sources;
pub mod utils;

pub use _model::{Model, Price, PriceRecord, Source, ValidationError};
