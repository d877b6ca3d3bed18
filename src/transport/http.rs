//! `ureq`-backed transport.
//!
//! Each [`HttpTransport`] owns a `ureq::Agent` so connections to its
//! endpoint are pooled across flushes. The per-request timeout bounds every
//! attempt, which in turn bounds how long a flush holds the cache lock.

use std::{sync::Arc, time::Duration};

use ureq::{Agent, AgentBuilder};

use super::{Payload, SendOutcome, Transport, classify_response};
use crate::{
    batch::Endpoint,
    error::{ConfigError, TransportError},
};

/// Value of the integration type header.
pub const LIB_NAME: &str = "rust";
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Transport posting batches to one endpoint.
pub struct HttpTransport {
    endpoint: Endpoint,
    type_header: String,
    version_header: String,
    count_header: String,
    agent: Agent,
}

impl HttpTransport {
    /// Build a transport for `endpoint`, bounding each request by `timeout`.
    pub fn new(endpoint: Endpoint, timeout: Duration) -> Result<Self, ConfigError> {
        let tls = native_tls::TlsConnector::new()
            .map_err(|err| ConfigError::Tls(err.to_string()))?;
        let agent = AgentBuilder::new()
            .timeout(timeout)
            .tls_connector(Arc::new(tls))
            .build();
        Ok(Self {
            type_header: endpoint.header_name("Type"),
            version_header: endpoint.header_name("Version"),
            count_header: endpoint.header_name("Count"),
            endpoint,
            agent,
        })
    }

    fn connection_error(&self, reason: impl ToString) -> TransportError {
        TransportError::Connection {
            endpoint: self.endpoint.url.clone(),
            reason: reason.to_string(),
        }
    }
}

impl Transport for HttpTransport {
    fn endpoint(&self) -> &str {
        &self.endpoint.url
    }

    fn send(&self, payload: &Payload) -> Result<SendOutcome, TransportError> {
        let count = payload.record_count().to_string();
        let request = self
            .agent
            .post(&self.endpoint.url)
            .set("appid", &self.endpoint.app_id)
            .set("user-agent", &self.endpoint.user_agent)
            .set("version", VERSION)
            .set("compress", payload.compression().as_str())
            .set(&self.type_header, LIB_NAME)
            .set(&self.version_header, VERSION)
            .set(&self.count_header, &count);

        match request.send_bytes(payload.body()) {
            Ok(response) => {
                let status = response.status();
                if status != 200 {
                    return Ok(SendOutcome::Failed(status));
                }
                let body = response
                    .into_string()
                    .map_err(|err| self.connection_error(err))?;
                Ok(classify_response(status, &body))
            }
            Err(ureq::Error::Status(code, _)) => Ok(SendOutcome::Failed(code)),
            Err(ureq::Error::Transport(err)) => Err(self.connection_error(err)),
        }
    }
}

impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransport")
            .field("url", &self.endpoint.url)
            .field("app_id", &self.endpoint.app_id)
            .field("user_agent", &self.endpoint.user_agent)
            .finish()
    }
}
