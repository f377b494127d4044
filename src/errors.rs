//! Error types surfaced by the connector.

use thiserror::Error;

/// Result alias carrying an error-stack report.
pub type CustomResult<T, E> = error_stack::Result<T, E>;

/// Failures the connector itself can produce. Transport-level failures keep
/// their original report attached when they are given this context, so the
/// underlying cause is never lost.
#[derive(Debug, Error)]
pub enum ConnectorError {
    /// The caller passed a capture/void/credit token that is not in the
    /// `reference;amount;transaction-code` shape.
    #[error("invalid authorization token, expected `reference;amount;transaction-code`")]
    InvalidAuthorizationToken,
    #[error("failed to convert amount to the gateway decimal format")]
    AmountConversionFailed,
    #[error("failed to encode the gateway request")]
    RequestEncodingFailed,
    #[error("failed to deserialize the gateway response")]
    ResponseDeserializationFailed,
    #[error("transport failure while contacting the gateway")]
    TransportFailure,
}
