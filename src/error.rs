use eventsource_stream::EventStreamError;
use nom::error::Error as NomError;
use reqwest::header::HeaderValue;
use reqwest::Error as ReqwestError;
use reqwest::StatusCode;
use std::io;
use std::string::FromUtf8Error;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Utf8(FromUtf8Error),
    #[error(transparent)]
    Parser(NomError<String>),
    #[error(transparent)]
    Transport(ReqwestError),
    #[error("Invalid header value: {0:?}")]
    InvalidContentType(HeaderValue),
    #[error("Invalid status code: {0}")]
    InvalidStatusCode(StatusCode),
    #[error("Stream ended")]
    StreamEnded,
    #[error("Invalid URL {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("Invalid header {0:?}: expected `Name: value`")]
    InvalidHeader(String),
    #[error("Console write failed")]
    Io(#[from] io::Error),
}

impl Error {
    /// True when the server answered, but not with an event stream.
    pub fn is_response_err(&self) -> bool {
        matches!(
            self,
            Error::InvalidContentType(_) | Error::InvalidStatusCode(_)
        )
    }
}

impl From<EventStreamError<ReqwestError>> for Error {
    fn from(err: EventStreamError<ReqwestError>) -> Self {
        match err {
            EventStreamError::Utf8(err) => Self::Utf8(err),
            EventStreamError::Parser(err) => Self::Parser(err),
            EventStreamError::Transport(err) => Self::Transport(err),
        }
    }
}
