//! Error types raised at the annotation service seam.

use thiserror::Error;

/// Errors surfaced by an [`AnnotationService`](crate::client::AnnotationService).
///
/// Only [`ServiceError::RemoteService`] on a required GET is fatal to a run; the
/// window scanner and the batch resolver absorb every variant and record the
/// failure instead.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The service answered a required request with a non-success status.
    #[error("remote service returned HTTP {status} for {url}")]
    RemoteService { status: u16, url: String },

    /// The request never produced a usable response (connection, timeout, TLS).
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The response body was not the JSON we asked for.
    #[error("could not decode response from {url}: {message}")]
    Decode { url: String, message: String },
}

impl ServiceError {
    /// The HTTP status carried by the error, if the service answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            ServiceError::RemoteService { status, .. } => Some(*status),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_and_message() {
        let e = ServiceError::RemoteService {
            status: 503,
            url: String::from("https://rest.ensembl.org/info/assembly/homo_sapiens"),
        };
        assert_eq!(e.status(), Some(503));
        assert!(e.to_string().contains("HTTP 503"));

        let d = ServiceError::Decode {
            url: String::from("x"),
            message: String::from("expected value"),
        };
        assert_eq!(d.status(), None);
    }
}
