use crate::error::Error;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, CACHE_CONTROL};
use reqwest::{Client, RequestBuilder, Url};
use std::time::Duration;

pub const DEFAULT_URL: &str = "http://localhost:8765/mcp/claude/sse/ian";
pub const DEFAULT_DURATION: Duration = Duration::from_secs(10);
pub const DEFAULT_CHANNELS: [&str; 2] = ["ping", "init"];

/// Everything a probe run needs to know up front.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeConfig {
    pub url: String,
    /// Extra static headers, sent after the fixed SSE ones.
    pub headers: Vec<(String, String)>,
    pub duration: Duration,
    /// Named event types reported on their own. Anything else that is not a
    /// default-channel event is dropped.
    pub channels: Vec<String>,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_URL.to_owned(),
            headers: Vec::new(),
            duration: DEFAULT_DURATION,
            channels: DEFAULT_CHANNELS.iter().map(|c| c.to_string()).collect(),
        }
    }
}

impl ProbeConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    pub fn parsed_url(&self) -> Result<Url, Error> {
        Url::parse(&self.url).map_err(|err| Error::InvalidUrl {
            url: self.url.clone(),
            reason: err.to_string(),
        })
    }

    /// `Accept` and `Cache-Control` for SSE, then the configured extras. An extra
    /// header with the same name replaces the fixed one.
    pub fn header_map(&self) -> Result<HeaderMap, Error> {
        let mut map = HeaderMap::new();
        map.insert(ACCEPT, HeaderValue::from_static("text/event-stream"));
        map.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
        for (name, value) in &self.headers {
            let invalid = || Error::InvalidHeader(format!("{}: {}", name, value));
            let name = HeaderName::from_bytes(name.as_bytes()).map_err(|_| invalid())?;
            let value = HeaderValue::from_str(value).map_err(|_| invalid())?;
            map.insert(name, value);
        }
        Ok(map)
    }

    pub fn request(&self, client: &Client) -> Result<RequestBuilder, Error> {
        Ok(client.get(self.parsed_url()?).headers(self.header_map()?))
    }

    pub fn is_channel(&self, name: &str) -> bool {
        self.channels.iter().any(|c| c == name)
    }
}

/// Parse a curl-style `Name: value` header argument.
pub fn parse_header(raw: &str) -> Result<(String, String), Error> {
    let (name, value) = raw
        .split_once(':')
        .ok_or_else(|| Error::InvalidHeader(raw.to_owned()))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::InvalidHeader(raw.to_owned()));
    }
    Ok((name.to_owned(), value.trim().to_owned()))
}
