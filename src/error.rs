//! Error taxonomy shared by the capture and drain pipelines.
//!
//! | Situation | Representation |
//! |-----------|----------------|
//! | Document or queue entry absent | `Ok(None)` from the read call, not an error |
//! | Revision mismatch on a conditional write | [`Error::Conflict`] |
//! | Store / model / enricher returned a failure status | [`Error::Upstream`] |
//! | Classifier output does not match the schema | [`Error::MalformedResponse`] |
//! | Enrichment failed | never surfaced; the enricher returns `None` |

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// The store rejected a conditional write because the revision moved.
    #[error("write conflict on {path}")]
    Conflict { path: String },

    /// An external service answered with a non-success status.
    #[error("{service} request failed: {status} {message}")]
    Upstream {
        service: &'static str,
        status: u16,
        message: String,
    },

    /// The classifier answered with something that is not the expected JSON.
    #[error("malformed classification response: {0}")]
    MalformedResponse(String),

    /// The language model answered successfully but with no content.
    #[error("empty response from language model")]
    EmptyCompletion,

    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("queue database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl Error {
    pub fn upstream(service: &'static str, status: u16, message: impl Into<String>) -> Self {
        Error::Upstream {
            service,
            status,
            message: message.into(),
        }
    }

    /// HTTP status carried by the error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Conflict { .. } => Some(409),
            Error::Upstream { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether a failed write should be retried under an alternate filename.
    ///
    /// True for revision conflicts and for 422 (unprocessable content), which
    /// the contents API returns when a create races with another create.
    pub fn is_write_retryable(&self) -> bool {
        matches!(self, Error::Conflict { .. })
            || matches!(self, Error::Upstream { status: 422, .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upstream_display_embeds_status() {
        let err = Error::upstream("github", 500, "server error");
        assert_eq!(err.to_string(), "github request failed: 500 server error");
        assert_eq!(err.status(), Some(500));
    }

    #[test]
    fn test_write_retryable() {
        assert!(Error::Conflict {
            path: "a.md".to_string()
        }
        .is_write_retryable());
        assert!(Error::upstream("github", 422, "sha wasn't supplied").is_write_retryable());
        assert!(!Error::upstream("github", 403, "forbidden").is_write_retryable());
        assert!(!Error::EmptyCompletion.is_write_retryable());
    }
}
