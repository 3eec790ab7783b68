use crate::error::Error;
use core::pin::Pin;
use eventsource_stream::Eventsource;
pub use eventsource_stream::{Event as MessageEvent, EventStreamError};
use futures_core::future::{BoxFuture, Future};
use futures_core::stream::{BoxStream, Stream};
use futures_core::task::{Context, Poll};
use pin_project_lite::pin_project;
use reqwest::header::HeaderValue;
use reqwest::Error as ReqwestError;
use reqwest::StatusCode;
use reqwest::{RequestBuilder, Response};

type ResponseFuture = BoxFuture<'static, Result<Response, ReqwestError>>;
type EventStream = BoxStream<'static, Result<MessageEvent, EventStreamError<ReqwestError>>>;

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadyState {
    Connecting = 0,
    Open = 1,
    Errored = 2,
    Closed = 3,
}

pin_project! {
/// Provides the [`Stream`] implementation for the [`Event`] items. This wraps the
/// [`RequestBuilder`] and makes exactly one attempt: the first error ends the stream.
#[project = EventSourceProjection]
pub struct EventSource {
    #[pin]
    next_response: Option<ResponseFuture>,
    #[pin]
    cur_stream: Option<EventStream>,
    ready_state: ReadyState,
}
}

impl EventSource {
    /// Wrap a [`RequestBuilder`]
    pub fn new(builder: RequestBuilder) -> Self {
        Self {
            next_response: Some(Box::pin(builder.send())),
            cur_stream: None,
            ready_state: ReadyState::Connecting,
        }
    }

    pub fn ready_state(&self) -> ReadyState {
        self.ready_state
    }

    /// Drop the pending request or open body. No further items are produced.
    pub fn close(&mut self) {
        self.next_response.take();
        self.cur_stream.take();
        self.ready_state = ReadyState::Closed;
    }
}

impl<'a> EventSourceProjection<'a> {
    fn clear_fetch(&mut self) {
        self.next_response.take();
        self.cur_stream.take();
    }

    fn fail(&mut self, error: Error) -> Poll<Option<Result<Event, Error>>> {
        self.clear_fetch();
        *self.ready_state = ReadyState::Errored;
        Poll::Ready(Some(Err(error)))
    }
}

fn check_response(response: &Response) -> Result<(), Error> {
    if !matches!(response.status(), StatusCode::OK) {
        return Err(Error::InvalidStatusCode(response.status()));
    }
    let content_type = response
        .headers()
        .get(&reqwest::header::CONTENT_TYPE)
        .ok_or(Error::InvalidContentType(HeaderValue::from_static("")))?;
    let mime_type: mime::Mime = content_type
        .to_str()
        .map_err(|_| Error::InvalidContentType(content_type.clone()))?
        .parse()
        .map_err(|_| Error::InvalidContentType(content_type.clone()))?;
    if !matches!(
        (mime_type.type_(), mime_type.subtype()),
        (mime::TEXT, mime::EVENT_STREAM)
    ) {
        return Err(Error::InvalidContentType(content_type.clone()));
    }
    Ok(())
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Event {
    Open,
    Message(MessageEvent),
}

impl From<MessageEvent> for Event {
    fn from(event: MessageEvent) -> Self {
        Event::Message(event)
    }
}

impl Stream for EventSource {
    type Item = Result<Event, Error>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context) -> Poll<Option<Self::Item>> {
        let mut this = self.project();

        if matches!(this.ready_state, ReadyState::Closed | ReadyState::Errored) {
            this.clear_fetch();
            return Poll::Ready(None);
        }

        if let Some(response_future) = this.next_response.as_mut().as_pin_mut() {
            match response_future.poll(cx) {
                Poll::Ready(Ok(res)) => {
                    this.clear_fetch();
                    if let Err(err) = check_response(&res) {
                        return this.fail(err);
                    }
                    this.cur_stream
                        .replace(Box::pin(res.bytes_stream().eventsource()));
                    *this.ready_state = ReadyState::Open;
                    return Poll::Ready(Some(Ok(Event::Open)));
                }
                Poll::Ready(Err(err)) => {
                    return this.fail(Error::Transport(err));
                }
                Poll::Pending => {
                    return Poll::Pending;
                }
            }
        }

        let stream = match this.cur_stream.as_mut().as_pin_mut() {
            Some(stream) => stream,
            None => return Poll::Ready(None),
        };
        match stream.get_mut().as_mut().poll_next(cx) {
            Poll::Ready(Some(Err(err))) => this.fail(err.into()),
            Poll::Ready(Some(Ok(event))) => Poll::Ready(Some(Ok(event.into()))),
            Poll::Ready(None) => this.fail(Error::StreamEnded),
            Poll::Pending => Poll::Pending,
        }
    }
}
