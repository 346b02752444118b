//! Error types for the request pipeline.
//!
//! # Design
//! Configuration errors (`InvalidOption`, `InvalidOptionValue`) surface at
//! the moment an option is set and never reach execution. The two execution
//! failures, `HttpStatus` and `Transport`, both carry the decoded response so
//! callers can inspect the partial headers and body before deciding to retry.
//! A pre-request hook veto is not an error; see [`crate::Outcome`].

use crate::options::{OptionKind, RequestOption};
use crate::response::Response;

/// Errors returned by [`crate::RequestOptions`] setters and [`crate::Client`].
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The option name is not part of the recognized set.
    #[error("invalid option: {0}")]
    InvalidOption(String),

    /// The option is recognized but the value has the wrong kind.
    #[error("invalid value for option {option}: expected {expected}")]
    InvalidOptionValue {
        option: RequestOption,
        expected: OptionKind,
    },

    /// The final hop reported a 4xx or 5xx status.
    #[error("HTTP error: {status}")]
    HttpStatus { status: u16, response: Box<Response> },

    /// The transport itself failed (connect, TLS, DNS, timeout, ...).
    #[error("transport error {code}: {message}")]
    Transport {
        code: i32,
        message: String,
        response: Box<Response>,
    },
}

impl Error {
    /// The response decoded before the failure was classified, if any.
    pub fn response(&self) -> Option<&Response> {
        match self {
            Error::HttpStatus { response, .. } | Error::Transport { response, .. } => {
                Some(response)
            }
            Error::InvalidOption(_) | Error::InvalidOptionValue { .. } => None,
        }
    }

    /// The HTTP status for `HttpStatus`, or the transport code for `Transport`.
    pub fn code(&self) -> Option<i32> {
        match self {
            Error::HttpStatus { status, .. } => Some(i32::from(*status)),
            Error::Transport { code, .. } => Some(*code),
            Error::InvalidOption(_) | Error::InvalidOptionValue { .. } => None,
        }
    }
}
