use async_trait::async_trait;

use crate::{Candle, Quote, SignalError, Timeframe};

/// Supplies completed candles for one instrument/timeframe.
///
/// Implementations live outside the core (broker clients, fixtures).
/// Missing or partial data is reported as `DataUnavailable`, never as a
/// fatal error.
#[async_trait]
pub trait CandleSource: Send + Sync {
    async fn candles(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        count: usize,
    ) -> Result<Vec<Candle>, SignalError>;
}

/// Supplies the current quote for one instrument on demand. `Ok(None)`
/// is a valid state consumed by the spread check and proximity ranker.
#[async_trait]
pub trait QuoteSource: Send + Sync {
    async fn quote(&self, symbol: &str) -> Result<Option<Quote>, SignalError>;
}
