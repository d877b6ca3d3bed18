//! Delivery of encoded batches to a single ingestion endpoint.
//!
//! A [`Transport`] performs one POST and classifies the outcome. It keeps no
//! state between calls, so the batch deliverer can hold an ordered list of
//! transports (primary first) and walk it on every attempt.
//!
//! # Response classification
//!
//! - **HTTP 200, `Code` 0**: [`SendOutcome::Accepted`].
//! - **HTTP 200, non-zero `Code`**: [`SendOutcome::Rejected`]; the batch is
//!   consumed without retry.
//! - **HTTP 200, unparseable body**: rejected as invalid format.
//! - **Any other status**: [`SendOutcome::Failed`]; retryable.
//! - **Network errors**: [`TransportError::Connection`]; retryable.

mod compress;
mod http;

use std::io;

use serde::Deserialize;

use crate::error::{RejectReason, TransportError};

pub use compress::gzip;
pub use http::{HttpTransport, LIB_NAME};

/// Outcome of a request that reached the endpoint.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SendOutcome {
    /// HTTP 200 with result code 0.
    Accepted,
    /// HTTP 200 with a non-zero result code.
    Rejected(RejectReason),
    /// Any status other than 200.
    Failed(u16),
}

/// How the payload body was encoded.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Compression {
    Gzip,
    None,
}

impl Compression {
    /// Value of the `compress` request header.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gzip => "gzip",
            Self::None => "none",
        }
    }
}

/// Body encoder applied when compression is enabled.
pub type Compressor = fn(&[u8]) -> io::Result<Vec<u8>>;

/// Encoded request body for one batch.
#[derive(Clone, Debug)]
pub struct Payload {
    body: Vec<u8>,
    record_count: usize,
    compression: Compression,
}

impl Payload {
    /// Wrap a serialized JSON array of `record_count` records, gzip encoding
    /// it when `compress` is set.
    pub fn encode(
        json: Vec<u8>,
        record_count: usize,
        compress: bool,
    ) -> Result<Self, TransportError> {
        Self::encode_with(json, record_count, compress.then_some(gzip as Compressor))
    }

    /// Like [`encode`](Self::encode) with the gzip step supplied by the
    /// caller. An encoder error becomes [`TransportError::Compression`].
    pub fn encode_with(
        json: Vec<u8>,
        record_count: usize,
        compressor: Option<Compressor>,
    ) -> Result<Self, TransportError> {
        let (body, compression) = match compressor {
            Some(compress) => {
                let encoded = compress(&json).map_err(TransportError::Compression)?;
                (encoded, Compression::Gzip)
            }
            None => (json, Compression::None),
        };
        Ok(Self {
            body,
            record_count,
            compression,
        })
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn record_count(&self) -> usize {
        self.record_count
    }

    pub fn compression(&self) -> Compression {
        self.compression
    }
}

/// A single ingestion endpoint.
pub trait Transport: Send + Sync {
    /// Endpoint identity used in error messages and logs.
    fn endpoint(&self) -> &str;

    /// POST `payload` and classify the response.
    fn send(&self, payload: &Payload) -> Result<SendOutcome, TransportError>;
}

#[derive(Deserialize)]
struct ResponseBody {
    #[serde(rename = "Code")]
    code: i64,
}

/// Classifies a response from its status code and body.
pub fn classify_response(status: u16, body: &str) -> SendOutcome {
    if status != 200 {
        return SendOutcome::Failed(status);
    }
    match serde_json::from_str::<ResponseBody>(body) {
        Ok(ResponseBody { code: 0 }) => SendOutcome::Accepted,
        Ok(ResponseBody { code }) => SendOutcome::Rejected(RejectReason::from_code(code)),
        Err(_) => SendOutcome::Rejected(RejectReason::InvalidFormat),
    }
}
