//! Errors raised while polling a CouchDB server.

use thiserror::Error;

/// Upper bound for the response body kept in a [`FetchError::Status`].
pub const MAX_BODY_SNIPPET: usize = 512;

pub type FetchResult<T> = Result<T, FetchError>;

/// Every failure a poll can hit. None of them is retried: the first error
/// aborts the poll and the exporter reports the target as down.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {uri} failed: {source}")]
    Transport {
        uri: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("status {status} from {uri}: {body}")]
    Status {
        uri: String,
        status: u16,
        body: String,
    },

    #[error("failed to decode {what}: {reason}")]
    Decode { what: String, reason: String },

    #[error("unparseable server version {version:?}: {source}")]
    VersionParse {
        version: String,
        #[source]
        source: semver::Error,
    },

    #[error("invalid uri {uri}: {source}")]
    InvalidUri {
        uri: String,
        #[source]
        source: url::ParseError,
    },

    #[error("cluster membership lists no nodes")]
    EmptyMembership,
}

impl FetchError {
    pub(crate) fn decode(what: impl Into<String>, err: &serde_json::Error) -> Self {
        Self::Decode {
            what: what.into(),
            reason: err.to_string(),
        }
    }

    /// Builds a [`FetchError::Status`] keeping at most [`MAX_BODY_SNIPPET`]
    /// bytes of the body, cut on a char boundary.
    pub(crate) fn status(uri: impl Into<String>, status: u16, body: &[u8]) -> Self {
        let body = String::from_utf8_lossy(body);
        let mut end = body.len().min(MAX_BODY_SNIPPET);
        while !body.is_char_boundary(end) {
            end -= 1;
        }

        Self::Status {
            uri: uri.into(),
            status,
            body: body.get(..end).unwrap_or_default().trim_end().to_string(),
        }
    }
}
