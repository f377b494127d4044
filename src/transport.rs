//! Blocking HTTP collaborator. The connector builds and interprets wire
//! bodies; actually moving them is delegated to this trait so callers can
//! plug in their own client (or a scripted one in tests). Retry, timeout and
//! cancellation policy live behind this seam, not in the connector.

use thiserror::Error;

use crate::errors::CustomResult;

/// Network-level failure raised by a [`Transport`] implementation. The
/// originating error stays attached to the report.
#[derive(Debug, Error)]
#[error("gateway transport request failed")]
pub struct TransportError;

/// POSTs a form-encoded body to a gateway URL and returns the raw response
/// body. Implementations must be safe to share across threads; the connector
/// itself keeps no mutable state between calls.
pub trait Transport: Send + Sync {
    fn post(&self, url: &str, body: &str) -> CustomResult<String, TransportError>;
}

#[cfg(feature = "reqwest")]
mod reqwest_transport {
    use error_stack::{report, ResultExt};

    use super::{Transport, TransportError};
    use crate::errors::CustomResult;

    /// Default [`Transport`] backed by a blocking reqwest client with rustls.
    pub struct ReqwestTransport {
        client: reqwest::blocking::Client,
    }

    impl ReqwestTransport {
        pub fn new() -> CustomResult<Self, TransportError> {
            let client = reqwest::blocking::Client::builder()
                .build()
                .change_context(TransportError)?;
            Ok(Self { client })
        }
    }

    impl Transport for ReqwestTransport {
        fn post(&self, url: &str, body: &str) -> CustomResult<String, TransportError> {
            let response = self
                .client
                .post(url)
                .header(
                    reqwest::header::CONTENT_TYPE,
                    "application/x-www-form-urlencoded",
                )
                .body(body.to_owned())
                .send()
                .change_context(TransportError)
                .attach_printable_lazy(|| format!("POST {url}"))?;
            let status = response.status();
            let text = response.text().change_context(TransportError)?;
            if !status.is_success() {
                return Err(report!(TransportError)
                    .attach_printable(format!("POST {url} returned HTTP {status}")));
            }
            Ok(text)
        }
    }
}

#[cfg(feature = "reqwest")]
pub use reqwest_transport::ReqwestTransport;
