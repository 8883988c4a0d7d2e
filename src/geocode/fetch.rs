//! The fetch capability: a URL in, a response body out.

use std::time::Duration;

use super::types::FetchError;

const USER_AGENT: &str = concat!("geocodeable/", env!("CARGO_PKG_VERSION"));

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Retrieves a provider response. Implementations must be shareable across threads.
pub trait Fetcher: Send + Sync {
    /// GET `url`. `timeout` overrides the implementation's default when set.
    fn fetch(&self, url: &str, timeout: Option<Duration>) -> Result<String, FetchError>;
}

/// Blocking HTTP fetcher backed by a `ureq` agent.
pub struct HttpFetcher {
    agent: ureq::Agent,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build();
        Self { agent }
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT)
    }
}

impl Fetcher for HttpFetcher {
    fn fetch(&self, url: &str, timeout: Option<Duration>) -> Result<String, FetchError> {
        let mut request = self.agent.get(url);
        if let Some(t) = timeout {
            request = request.timeout(t);
        }

        let response = request.call().map_err(|e| match e {
            ureq::Error::Status(code, _) => FetchError::Status(code),
            ureq::Error::Transport(t) => FetchError::Transport(t.to_string()),
        })?;

        let body = response
            .into_string()
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        if body.trim().is_empty() {
            return Err(FetchError::EmptyBody);
        }
        Ok(body)
    }
}
