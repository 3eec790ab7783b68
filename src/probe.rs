//! The probe run: one connection, one deadline, one interrupt source, and a single
//! loop that turns whichever fires first into a [`ProbeEvent`] and dispatches it.
//!
//! Handlers never run concurrently. Once [`Probe::shutdown`] has run, the
//! connection is closed, the deadline is gone and no handler produces output again.

use crate::config::ProbeConfig;
use crate::error::Error;
use crate::event_source::{Event, EventSource, MessageEvent, ReadyState};
use futures_core::stream::Stream;
use futures_timer::Delay;
use futures_util::stream::StreamExt;
use std::future::{self, Future};
use std::io::Write;
use tracing::{debug, info};

/// The transport side of a probe run.
pub trait Connection: Stream<Item = Result<Event, Error>> + Unpin {
    fn ready_state(&self) -> ReadyState;

    /// Stop delivery. Afterwards the stream yields `None`.
    fn close(&mut self);
}

impl Connection for EventSource {
    fn ready_state(&self) -> ReadyState {
        EventSource::ready_state(self)
    }

    fn close(&mut self) {
        EventSource::close(self)
    }
}

/// Everything the dispatch loop reacts to.
#[derive(Debug)]
pub enum ProbeEvent {
    Open,
    Message(MessageEvent),
    Named(String, MessageEvent),
    Error(Error),
    Deadline,
    Interrupt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    Timeout,
    Error,
    Interrupt,
}

impl ShutdownReason {
    pub fn exit_code(self) -> u8 {
        match self {
            ShutdownReason::Timeout | ShutdownReason::Interrupt => 0,
            ShutdownReason::Error => 1,
        }
    }
}

/// Run context: the connection, the deadline timer and the message counter,
/// plus the two console sinks the report is written to.
pub struct Probe<C, O, E> {
    config: ProbeConfig,
    connection: C,
    timer: Option<Delay>,
    messages: u64,
    opened: bool,
    outcome: Option<ShutdownReason>,
    out: O,
    err: E,
}

impl<C, O, E> Probe<C, O, E>
where
    C: Connection,
    O: Write,
    E: Write,
{
    /// Takes ownership of the connection and arms the deadline.
    pub fn new(config: ProbeConfig, connection: C, out: O, err: E) -> Self {
        let timer = Some(Delay::new(config.duration));
        Self {
            config,
            connection,
            timer,
            messages: 0,
            opened: false,
            outcome: None,
            out,
            err,
        }
    }

    pub fn messages(&self) -> u64 {
        self.messages
    }

    pub fn outcome(&self) -> Option<ShutdownReason> {
        self.outcome
    }

    pub fn timer_armed(&self) -> bool {
        self.timer.is_some()
    }

    pub fn connection(&self) -> &C {
        &self.connection
    }

    pub fn into_writers(self) -> (O, E) {
        (self.out, self.err)
    }

    /// Dispatch events until one of the shutdown paths fires.
    pub async fn run<I>(&mut self, interrupt: I) -> Result<ShutdownReason, Error>
    where
        I: Future<Output = ()>,
    {
        tokio::pin!(interrupt);
        writeln!(self.out, "Testing SSE connection...\n")?;
        writeln!(self.out, "Press Ctrl+C to stop\n")?;
        loop {
            if let Some(reason) = self.outcome {
                return Ok(reason);
            }
            let event = tokio::select! {
                biased;
                _ = &mut interrupt => ProbeEvent::Interrupt,
                _ = expired(&mut self.timer) => ProbeEvent::Deadline,
                item = self.connection.next() => match item {
                    Some(item) => self.classify(item),
                    None => ProbeEvent::Error(Error::StreamEnded),
                },
            };
            self.dispatch(event)?;
        }
    }

    fn classify(&self, item: Result<Event, Error>) -> ProbeEvent {
        match item {
            Ok(Event::Open) => ProbeEvent::Open,
            Ok(Event::Message(event)) if is_default_channel(&event.event) => {
                ProbeEvent::Message(event)
            }
            Ok(Event::Message(event)) => ProbeEvent::Named(event.event.clone(), event),
            Err(err) => ProbeEvent::Error(err),
        }
    }

    /// Handle a single event. Does nothing once the run has shut down.
    pub fn dispatch(&mut self, event: ProbeEvent) -> Result<(), Error> {
        if self.outcome.is_some() {
            debug!(?event, "dropping event after shutdown");
            return Ok(());
        }
        match event {
            ProbeEvent::Open => self.on_open(),
            ProbeEvent::Message(event) => self.on_message(&event),
            ProbeEvent::Named(name, event) => self.on_named_event(&name, &event),
            ProbeEvent::Error(err) => self.on_error(&err),
            ProbeEvent::Deadline => {
                self.shutdown(ShutdownReason::Timeout);
                writeln!(self.out, "\nTest completed. Closing connection...")?;
                Ok(())
            }
            ProbeEvent::Interrupt => {
                self.shutdown(ShutdownReason::Interrupt);
                writeln!(self.out, "\n\nInterrupted. Closing connection...")?;
                Ok(())
            }
        }
    }

    fn on_open(&mut self) -> Result<(), Error> {
        if self.opened {
            debug!("ignoring repeated open");
            return Ok(());
        }
        self.opened = true;
        debug!(url = %self.config.url, "connection open");
        writeln!(self.out, "✓ Connected to SSE endpoint")?;
        writeln!(self.out, "  URL: {}", self.config.url)?;
        writeln!(self.out, "  Waiting for messages...\n")?;
        Ok(())
    }

    fn on_message(&mut self, event: &MessageEvent) -> Result<(), Error> {
        self.messages += 1;
        let kind = if event.event.is_empty() {
            "message"
        } else {
            event.event.as_str()
        };
        let id = if event.id.is_empty() {
            "none"
        } else {
            event.id.as_str()
        };
        writeln!(self.out, "Message {}:", self.messages)?;
        writeln!(self.out, "  Event: {}", kind)?;
        writeln!(self.out, "  Data: {}", event.data)?;
        writeln!(self.out, "  ID: {}", id)?;
        writeln!(self.out)?;
        if let Some(parsed) = pretty_json(&event.data) {
            writeln!(self.out, "  Parsed data: {}", parsed)?;
        }
        Ok(())
    }

    fn on_named_event(&mut self, name: &str, event: &MessageEvent) -> Result<(), Error> {
        if !self.config.is_channel(name) {
            debug!(name, "no handler registered for event type");
            return Ok(());
        }
        writeln!(self.out, "Received {} event: {}", name, event.data)?;
        Ok(())
    }

    fn on_error(&mut self, error: &Error) -> Result<(), Error> {
        self.shutdown(ShutdownReason::Error);
        writeln!(self.err, "✗ SSE Error occurred:")?;
        writeln!(self.err, "  Connection error - is the server running?")?;
        writeln!(
            self.err,
            "  Make sure the service behind {} is up and reachable.",
            self.config.url
        )?;
        if error.is_response_err() {
            writeln!(
                self.err,
                "  The server answered, but not with an event stream."
            )?;
            writeln!(self.err, "  Check that {} is an SSE endpoint.", self.config.url)?;
        }
        write!(self.err, "  Error details: {}", error)?;
        let mut source = std::error::Error::source(error);
        while let Some(cause) = source {
            write!(self.err, ": {}", cause)?;
            source = std::error::Error::source(cause);
        }
        writeln!(self.err)?;
        Ok(())
    }

    /// Cancel the deadline, close the connection and record the outcome. Only the
    /// first call has any effect; later calls return the recorded reason.
    pub fn shutdown(&mut self, reason: ShutdownReason) -> ShutdownReason {
        if let Some(first) = self.outcome {
            debug!(?first, ?reason, "already shut down");
            return first;
        }
        self.timer.take();
        self.connection.close();
        self.outcome = Some(reason);
        info!(?reason, messages = self.messages, "probe finished");
        reason
    }
}

async fn expired(timer: &mut Option<Delay>) {
    match timer {
        Some(delay) => delay.await,
        None => future::pending().await,
    }
}

fn is_default_channel(kind: &str) -> bool {
    kind.is_empty() || kind == "message"
}

/// Pretty-printed JSON, or `None` when the payload is not JSON.
fn pretty_json(data: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(data).ok()?;
    serde_json::to_string_pretty(&value).ok()
}
