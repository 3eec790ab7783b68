//! Connects to one Server Sent Events (SSE) endpoint, reports everything that arrives for a
//! bounded window of time, and tells the caller how the run ended. You can learn more about
//! SSE in [the MDN
//! docs](https://developer.mozilla.org/en-US/docs/Web/API/Server-sent_events/Using_server-sent_events)
//! This crate uses [`eventsource_stream`] to wrap the underlying Bytes stream of a [`reqwest`]
//! response. A failed or dropped connection is never retried.
//!
//! # Example
//!
//! ```ignore
//! let config = ProbeConfig::new("http://localhost:7020/notifications");
//! let source = config.request(&Client::new())?.eventsource();
//! let mut probe = Probe::new(config, source, std::io::stdout(), std::io::stderr());
//!
//! let reason = probe.run(async { tokio::signal::ctrl_c().await.ok(); }).await?;
//! std::process::exit(reason.exit_code().into());
//! ```

mod config;
mod error;
mod event_source;
mod probe;

pub use config::{parse_header, ProbeConfig, DEFAULT_CHANNELS, DEFAULT_DURATION, DEFAULT_URL};
pub use error::Error;
pub use event_source::{Event, EventSource, EventStreamError, MessageEvent, ReadyState};
pub use probe::{Connection, Probe, ProbeEvent, ShutdownReason};

use reqwest::RequestBuilder;

/// Provides an easy interface to build an [`EventSource`] from a [`RequestBuilder`]
pub trait RequestBuilderExt {
    fn eventsource(self) -> EventSource;
}

impl RequestBuilderExt for RequestBuilder {
    fn eventsource(self) -> EventSource {
        EventSource::new(self)
    }
}
