use std::time::Duration;

/// Default per-request timeout when talking to the content service.
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Runtime configuration describing how to reach the session-content service.
#[derive(Debug, Clone)]
pub struct HttpDirectoryConfig {
    pub base_url: String,
    pub bearer_token: Option<String>,
    pub request_timeout: Duration,
}

impl HttpDirectoryConfig {
    /// Construct a configuration from the service base URL.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            bearer_token: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Attach a bearer token sent with every request.
    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    /// Read the optional token from `CONTENT_SERVICE_TOKEN`.
    pub fn with_env_token(self) -> Self {
        match std::env::var("CONTENT_SERVICE_TOKEN") {
            Ok(token) if !token.is_empty() => self.with_bearer_token(token),
            _ => self,
        }
    }
}
