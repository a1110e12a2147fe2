use thiserror::Error;

/// Failures of the queue transport
///
/// None of these are fatal to a benchmark run: senders degrade to no-ops and a
/// receiver that cannot prepare ends the queue scenario with a zero count.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("unsupported endpoint address '{0}' (expected ipc:// or inproc://)")]
    InvalidEndpoint(String),

    #[error("endpoint '{0}' already has a receiver")]
    AddressInUse(String),

    #[error("send queue for '{0}' is not activated")]
    NotActivated(String),

    #[error("high-water mark of {high_water} reached on '{endpoint}', message dropped")]
    HighWaterMark { endpoint: String, high_water: usize },

    #[error("receiver of '{0}' is gone, message dropped")]
    Disconnected(String),
}
