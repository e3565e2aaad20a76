use std::{
    thread::sleep,
    time::{Duration, Instant},
};

use _model::Source;
use tracing::{debug, warn};
use ureq::{Agent, AgentBuilder};

use crate::{config::FetchConfig, error::FetchError};

/// Retrieves a page body. Implementations must be idempotent so callers can
/// retry freely.
pub trait Fetch: Sync {
    fn fetch(&self, site: Source, url: &str) -> Result<String, FetchError>;
}

pub struct HttpFetcher {
    agent: Agent,
}

impl HttpFetcher {
    pub fn new(config: &FetchConfig) -> Self {
        let agent = AgentBuilder::new()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .build();
        Self { agent }
    }
}

impl Fetch for HttpFetcher {
    fn fetch(&self, site: Source, url: &str) -> Result<String, FetchError> {
        debug!("GET {url}");
        let response = self
            .agent
            .get(url)
            .set("Accept", "text/html,application/xhtml+xml")
            .set("Accept-Language", "en-US,en;q=0.9")
            .call()
            .map_err(|e| match e {
                ureq::Error::Status(status, _) => FetchError::Status {
                    site,
                    url: url.to_string(),
                    status,
                },
                ureq::Error::Transport(x) => FetchError::Network {
                    site,
                    url: url.to_string(),
                    cause: x.to_string(),
                },
            })?;

        response.into_string().map_err(|e| FetchError::Network {
            site,
            url: url.to_string(),
            cause: e.to_string(),
        })
    }
}

impl FetchError {
    /// Whether another attempt could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Network { .. } => true,
            Self::Status { status, .. } => *status == 429 || *status >= 500,
        }
    }
}

/// Enforces a minimum gap between consecutive calls.
pub struct Pacer {
    delay: Duration,
    last: Option<Instant>,
}

impl Pacer {
    pub fn new(delay: Duration) -> Self {
        Self { delay, last: None }
    }

    pub fn wait(&mut self) {
        if let Some(last) = self.last {
            let elapsed = last.elapsed();
            if elapsed < self.delay {
                sleep(self.delay - elapsed);
            }
        }
        self.last = Some(Instant::now());
    }
}

/// Every request one source receives during a run goes through here, so the
/// spacing holds across models and retries.
pub struct SourceSession<'a> {
    fetcher: &'a dyn Fetch,
    site: Source,
    pacer: Pacer,
    retries: u32,
}

impl<'a> SourceSession<'a> {
    pub fn new(fetcher: &'a dyn Fetch, site: Source, config: &FetchConfig) -> Self {
        Self {
            fetcher,
            site,
            pacer: Pacer::new(config.delay),
            retries: config.retries,
        }
    }

    pub fn get(&mut self, url: &str) -> Result<String, FetchError> {
        let mut attempt = 0;
        loop {
            self.pacer.wait();
            match self.fetcher.fetch(self.site, url) {
                Ok(x) => return Ok(x),
                Err(e) if attempt < self.retries && e.is_transient() => {
                    attempt += 1;
                    warn!("{e}, retrying ({attempt}/{})", self.retries);
                    // linear backoff on top of the regular spacing
                    sleep(self.pacer.delay * attempt);
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    struct Flaky {
        failures: u32,
        status: u16,
        calls: AtomicU32,
    }

    impl Fetch for Flaky {
        fn fetch(&self, site: Source, url: &str) -> Result<String, FetchError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                Err(FetchError::Status {
                    site,
                    url: url.to_string(),
                    status: self.status,
                })
            } else {
                Ok("<html></html>".to_string())
            }
        }
    }

    fn config(retries: u32) -> FetchConfig {
        FetchConfig {
            delay: Duration::from_millis(1),
            retries,
            ..FetchConfig::default()
        }
    }

    #[test]
    fn retries_transient_failures() {
        let flaky = Flaky {
            failures: 2,
            status: 503,
            calls: AtomicU32::new(0),
        };
        let mut session = SourceSession::new(&flaky, Source::Reebelo, &config(2));
        assert!(session.get("https://example.com").is_ok());
        assert_eq!(flaky.calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn gives_up_after_retries() {
        let flaky = Flaky {
            failures: 5,
            status: 503,
            calls: AtomicU32::new(0),
        };
        let mut session = SourceSession::new(&flaky, Source::Reebelo, &config(1));
        let err = session.get("https://example.com").unwrap_err();
        assert_eq!(err.site(), Source::Reebelo);
        assert_eq!(flaky.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn does_not_retry_client_errors() {
        let flaky = Flaky {
            failures: 1,
            status: 404,
            calls: AtomicU32::new(0),
        };
        let mut session = SourceSession::new(&flaky, Source::AppleRefurbished, &config(3));
        assert!(session.get("https://example.com").is_err());
        assert_eq!(flaky.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn pacer_spaces_calls() {
        let mut pacer = Pacer::new(Duration::from_millis(30));
        let start = Instant::now();
        pacer.wait();
        pacer.wait();
        pacer.wait();
        assert!(start.elapsed() >= Duration::from_millis(60));
    }
}
