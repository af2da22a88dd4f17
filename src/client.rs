//! Blocking client for the annotation service.
//!
//! Every fetch component talks to the service through the [`AnnotationService`]
//! trait, so a run can be driven by [`EnsemblClient`] or by a scripted stand-in.
//! The client performs no retry or backoff; what to do after a failure is
//! decided by the caller.

use crate::error::ServiceError;
use crate::options::FetchOptions;
use anyhow::Context;
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE};
use serde_json::{Map, Value};
use tracing::{debug, error, warn};

/// The two calls the retrieval stage needs from the annotation service.
pub trait AnnotationService {
    /// Issues a GET request. A non-success status is an error.
    fn get(&self, endpoint: &str, params: &[(&str, &str)]) -> Result<Value, ServiceError>;

    /// Issues a batch POST request. A non-success status yields an empty JSON
    /// object rather than an error, and must be read as "no data for this batch".
    fn post_batch(&self, endpoint: &str, body: &Value) -> Result<Value, ServiceError>;
}

/// [`AnnotationService`] backed by the Ensembl REST API.
pub struct EnsemblClient {
    client: Client,
    server: String,
}

impl EnsemblClient {
    /// Builds a client sending `Content-Type: application/json` and the configured
    /// user agent with every request.
    pub fn new(options: &FetchOptions) -> anyhow::Result<EnsemblClient> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .default_headers(headers)
            .user_agent(options.user_agent.as_str())
            .timeout(options.timeout)
            .build()
            .context("Could not build the HTTP client")?;

        Ok(EnsemblClient {
            client,
            server: options.server.clone(),
        })
    }

    pub fn server(&self) -> &str {
        &self.server
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.server, endpoint)
    }
}

impl AnnotationService for EnsemblClient {
    fn get(&self, endpoint: &str, params: &[(&str, &str)]) -> Result<Value, ServiceError> {
        let url = self.url(endpoint);
        debug!("GET {} {:?}", url, params);

        let response = self
            .client
            .get(&url)
            .query(params)
            .send()
            .map_err(|source| ServiceError::Transport {
                url: url.clone(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            error!(
                "The annotation service call failed with HTTP {}: {}",
                status.as_u16(),
                url
            );
            return Err(ServiceError::RemoteService {
                status: status.as_u16(),
                url,
            });
        }

        response.json::<Value>().map_err(|e| ServiceError::Decode {
            url,
            message: e.to_string(),
        })
    }

    fn post_batch(&self, endpoint: &str, body: &Value) -> Result<Value, ServiceError> {
        let url = self.url(endpoint);
        debug!("POST {}", url);

        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .map_err(|source| ServiceError::Transport {
                url: url.clone(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            warn!("Batch lookup failed with HTTP {}: {}", status.as_u16(), url);
            return Ok(Value::Object(Map::new()));
        }

        response.json::<Value>().map_err(|e| ServiceError::Decode {
            url,
            message: e.to_string(),
        })
    }
}
