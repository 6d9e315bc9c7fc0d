//! Fetch error taxonomy and transport-error classification.

use std::io;

use reqwest::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub(crate) enum FetchError {
    /// A non-200, non-5xx status. Terminal, never retried.
    #[error("server responded \"{url}\" with status: {status}")]
    UnexpectedStatus { url: String, status: StatusCode },

    /// The retry budget ran out; `last` describes the final failure.
    #[error("failed to fetch \"{url}\" after {attempts} attempts: {last}")]
    Exhausted {
        url: String,
        attempts: usize,
        last: String,
    },

    /// A non-recoverable error while streaming the body to the destination.
    #[error("transfer from \"{url}\" failed: {source}")]
    Copy {
        url: String,
        #[source]
        source: io::Error,
    },

    /// The destination could not be rewound for a transfer restart.
    #[error("failed to rewind destination for \"{url}\": {source}")]
    Rewind {
        url: String,
        #[source]
        source: io::Error,
    },
}

/// Timeout or temporary transport condition during a body copy.
pub(crate) fn is_timeout_error(err: &io::Error) -> bool {
    matches!(err.kind(), io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock)
}

/// Server-initiated stream abort. HTTP/2 GOAWAY surfaces with no structured
/// signal on the transport, so this is matched on message content.
pub(crate) fn is_stream_abort_error(err: &io::Error) -> bool {
    err.to_string().contains("GOAWAY")
}

/// Peer reset or disconnect.
pub(crate) fn is_disconnected_error(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe
    ) || err.to_string().contains("connection reset")
}

pub(crate) fn is_recoverable_copy_error(err: &io::Error) -> bool {
    is_timeout_error(err) || is_stream_abort_error(err) || is_disconnected_error(err)
}
