use std::{collections::BTreeMap, env, fmt, time::Duration};

use _model::Model;
use itertools::Itertools;
use tracing::warn;

pub const DEFAULT_THRESHOLD: f64 = 5.0;

pub const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

const SMTP_KEYS: [&str; 5] = [
    "SMTP_HOST",
    "SMTP_PORT",
    "SMTP_USER",
    "SMTP_PASSWORD",
    "SMTP_TO",
];

/// Settings for one run. Built once at start-up and handed to each
/// component, nothing below `main` reads the environment.
#[derive(Debug, Clone)]
pub struct Config {
    pub thresholds: Thresholds,
    pub email: Option<SmtpConfig>,
    pub webhook_url: Option<String>,
    pub fetch: FetchConfig,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Thresholds(BTreeMap<Model, f64>);

impl Thresholds {
    pub fn uniform(percent: f64) -> Self {
        Self(Model::all().into_iter().map(|x| (x, percent)).collect())
    }

    pub fn with(mut self, model: Model, percent: f64) -> Self {
        self.0.insert(model, percent);
        self
    }

    pub fn get(&self, model: Model) -> f64 {
        self.0.get(&model).copied().unwrap_or(DEFAULT_THRESHOLD)
    }

    pub fn key(model: Model) -> String {
        format!("PRICE_THRESHOLD_{}", model.generation())
    }
}

impl Default for Thresholds {
    fn default() -> Self {
        Self::uniform(DEFAULT_THRESHOLD)
    }
}

#[derive(Clone, PartialEq)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub to: String,
}

impl fmt::Debug for SmtpConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmtpConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("to", &self.to)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FetchConfig {
    pub user_agent: String,
    pub timeout: Duration,
    /// Minimum spacing between two requests to the same source.
    pub delay: Duration,
    /// Extra attempts after a failed fetch, zero disables retrying.
    pub retries: u32,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: USER_AGENT.to_string(),
            timeout: Duration::from_secs(10),
            delay: Duration::from_millis(2500),
            retries: 0,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_vars(env::vars())
    }

    pub fn from_vars<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let vars: BTreeMap<String, String> = vars
            .into_iter()
            .map(|(k, v)| (k.into(), v.into().trim().to_string()))
            .filter(|(_, v)| !v.is_empty())
            .collect();

        let mut thresholds = Thresholds::default();
        for model in Model::all() {
            let key = Thresholds::key(model);
            if let Some(raw) = vars.get(&key) {
                match raw.parse::<f64>() {
                    Ok(x) if x.is_finite() && x >= 0.0 => thresholds = thresholds.with(model, x),
                    _ => warn!("ignoring {key}={raw:?}, using {DEFAULT_THRESHOLD}"),
                }
            }
        }

        Self {
            thresholds,
            email: smtp(&vars),
            webhook_url: vars.get("WEBHOOK_URL").cloned(),
            fetch: FetchConfig::default(),
        }
    }
}

fn smtp(vars: &BTreeMap<String, String>) -> Option<SmtpConfig> {
    let (present, missing): (Vec<&str>, Vec<&str>) = SMTP_KEYS
        .iter()
        .copied()
        .partition(|x| vars.contains_key(*x));
    if present.is_empty() {
        return None;
    }
    if !missing.is_empty() {
        warn!(
            "email disabled, partial smtp configuration (missing {})",
            missing.iter().join(", ")
        );
        return None;
    }

    let port = match vars["SMTP_PORT"].parse() {
        Ok(x) => x,
        Err(_) => {
            warn!("email disabled, invalid SMTP_PORT {:?}", vars["SMTP_PORT"]);
            return None;
        }
    };
    Some(SmtpConfig {
        host: vars["SMTP_HOST"].clone(),
        port,
        user: vars["SMTP_USER"].clone(),
        password: vars["SMTP_PASSWORD"].clone(),
        to: vars["SMTP_TO"].clone(),
    })
}
