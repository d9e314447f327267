//! HTTP transport to a Sony TV.
//!
//! The transport performs exactly one POST per call and never retries. Callers list the failure
//! kinds they expect (e.g. a timeout while the TV is booting) in
//! [`TransportRequest::ignored_errors`]; such failures are still returned as errors but are only
//! traced at debug level.

use std::time::Duration;

use async_trait::async_trait;
use log::{debug, info};

use crate::error::{TransportError, TransportErrorKind};
use crate::helpers::device_endpoint;

/// A single POST to a TV endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportRequest {
    pub host: String,
    /// Path below `/sony/`, e.g. `system` or `IRCC`.
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
    pub ignored_errors: Vec<TransportErrorKind>,
}

impl TransportRequest {
    pub fn url(&self) -> String {
        device_endpoint(&self.host, &self.path)
    }

    pub fn is_ignored(&self, error: &TransportError) -> bool {
        self.ignored_errors.contains(&error.kind)
    }
}

/// Sends requests to a TV and returns the raw response body.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn post(&self, request: &TransportRequest) -> Result<String, TransportError>;
}

// ------------------------------------------------------------------------------------------------
// reqwest implementation

/// [`Transport`] backed by a `reqwest` client with fixed connect and total timeouts.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(connect_timeout: Duration, request_timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(request_timeout)
            .build()
            .map_err(|e| {
                TransportError::new(
                    TransportErrorKind::Request,
                    format!("Could not create HTTP client: {}", e),
                )
            })?;

        Ok(HttpTransport { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn post(&self, request: &TransportRequest) -> Result<String, TransportError> {
        let url = request.url();
        debug!("POST {} :: {}", &url, &request.body);

        let mut builder = self.client.post(&url).body(request.body.clone());

        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let result = match builder.send().await {
            Ok(response) => response.text().await.map_err(classify_reqwest_error),
            Err(e) => Err(classify_reqwest_error(e)),
        };

        match &result {
            Ok(body) => debug!("Response from {} :: {}", &url, body),
            Err(e) if request.is_ignored(e) => debug!("Ignored transport error for {}: {}", &url, e),
            Err(e) => info!("Transport error for {}: {}", &url, e),
        }

        result
    }
}

fn classify_reqwest_error(error: reqwest::Error) -> TransportError {
    let kind = if error.is_timeout() {
        TransportErrorKind::Timeout
    } else if error.is_connect() {
        TransportErrorKind::Connect
    } else if error.is_body() || error.is_decode() {
        TransportErrorKind::Body
    } else {
        TransportErrorKind::Request
    };

    TransportError::new(kind, error.to_string())
}

// ================================================================================================
// Tests
