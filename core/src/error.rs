//! Error types for the alias API client.
//!
//! # Design
//! The taxonomy is closed: every status code the service documents gets its
//! own variant, anything else lands in `UnknownStatus` with the raw code.
//! Transport failures are reported by the host (which owns the socket) via
//! `ApiError::transport`. None of these are retried by the core.

use thiserror::Error;

/// Errors returned by `AliasClient` parse methods and by `ContactSync`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// 401: the API key was rejected.
    #[error("invalid API key")]
    InvalidApiKey,

    /// 409 on a create request: the alias or contact already exists.
    #[error("resource already exists")]
    Duplicated,

    /// 500
    #[error("internal server error")]
    InternalServerError,

    /// 502
    #[error("bad gateway")]
    BadGateway,

    /// The host could not supply a status code for the response.
    #[error("unknown response status code")]
    UnknownResponseStatus,

    /// Any status the operation does not expect and the taxonomy does not name.
    #[error("unknown error (HTTP {status})")]
    UnknownStatus { status: u16 },

    /// The request never produced a response (DNS, TLS, connection reset...).
    #[error("transport error: {0}")]
    Transport(String),

    /// A success body could not be deserialized into `target`.
    #[error("failed to parse {target}: {message}")]
    Parse {
        target: &'static str,
        message: String,
    },

    /// The request payload could not be serialized to JSON.
    #[error("serialization failed: {0}")]
    Serialization(String),
}

impl ApiError {
    /// Wrap a transport-level failure raised by the host's HTTP stack.
    pub fn transport(err: impl std::fmt::Display) -> Self {
        ApiError::Transport(err.to_string())
    }

    pub(crate) fn parse<T>(err: serde_json::Error) -> Self {
        ApiError::Parse {
            target: short_type_name::<T>(),
            message: err.to_string(),
        }
    }

    /// True when the key must be re-entered before any further call can work.
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, ApiError::InvalidApiKey)
    }
}

fn short_type_name<T>() -> &'static str {
    let full = std::any::type_name::<T>();
    // `alloc::vec::Vec<alias_core::types::Contact>` keeps its generic suffix.
    match full.find('<') {
        Some(idx) => {
            let head = &full[..idx];
            let start = head.rfind("::").map_or(0, |i| i + 2);
            &full[start..]
        }
        None => full.rsplit("::").next().unwrap_or(full),
    }
}
