use thiserror::Error;

/// Error taxonomy for the signal pipeline.
///
/// `DataUnavailable` and `ComputationDegraded` are non-fatal: the
/// affected instrument/timeframe is skipped for the current cycle and
/// retried on the next one. `Configuration` is surfaced to the caller of
/// the specific operation (e.g. position sizing for an unknown symbol).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SignalError {
    #[error("data unavailable: {0}")]
    DataUnavailable(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("computation degraded: {0}")]
    ComputationDegraded(String),
}
