use serde::{Deserialize, Serialize};
use signal_core::{Candle, IndicatorParams, IndicatorValues, SignalError};

use crate::indicators::{atr, bollinger_bands, macd, rolling_max, rolling_min, rsi, sma, stochastic};

/// Full set of derived values for one candle. Present only once every
/// indicator in the set is defined at that candle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotValues {
    pub rsi: f64,
    pub macd: f64,
    pub macd_signal: f64,
    pub macd_hist: f64,
    pub sma_fast: f64,
    pub sma_slow: f64,
    pub bb_upper: f64,
    pub bb_middle: f64,
    pub bb_lower: f64,
    pub atr: f64,
    pub stoch_k: f64,
    pub stoch_d: f64,
    pub support: f64,
    pub resistance: f64,
    /// +1 bullish, -1 bearish, 0 sideways.
    pub trend: i8,
}

impl SnapshotValues {
    /// Subset published alongside a signal.
    pub fn to_indicator_values(&self) -> IndicatorValues {
        IndicatorValues {
            rsi: self.rsi,
            macd: self.macd,
            macd_signal: self.macd_signal,
            macd_hist: self.macd_hist,
            sma_fast: self.sma_fast,
            sma_slow: self.sma_slow,
            atr: self.atr,
        }
    }
}

/// One candle with its derived indicator values, aligned 1:1 with the
/// input window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSnapshot {
    pub candle: Candle,
    pub values: Option<SnapshotValues>,
}

/// Computes the fixed indicator set over an OHLC window.
#[derive(Debug, Clone)]
pub struct IndicatorEngine {
    params: IndicatorParams,
}

impl IndicatorEngine {
    pub fn new(params: IndicatorParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &IndicatorParams {
        &self.params
    }

    /// Enrich a candle window into an aligned snapshot sequence.
    ///
    /// Returns `DataUnavailable` when the window is shorter than the
    /// required warm-up and `ComputationDegraded` when the window is
    /// malformed; both mean no signal for this instrument/timeframe
    /// this cycle.
    pub fn enrich(&self, candles: &[Candle]) -> Result<Vec<IndicatorSnapshot>, SignalError> {
        let required = self.params.required_periods();
        if candles.len() < required {
            return Err(SignalError::DataUnavailable(format!(
                "insufficient data: {} candles, need at least {}",
                candles.len(),
                required
            )));
        }

        validate_window(candles)?;

        let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
        let highs: Vec<f64> = candles.iter().map(|c| c.high).collect();
        let lows: Vec<f64> = candles.iter().map(|c| c.low).collect();

        let p = &self.params;
        let rsi_series = rsi(&closes, p.rsi_period);
        let macd_result = macd(&closes, p.macd_fast, p.macd_slow, p.macd_signal);
        let sma_fast = sma(&closes, p.sma_fast);
        let sma_slow = sma(&closes, p.sma_slow);
        let bb = bollinger_bands(&closes, p.bb_period, p.bb_std_dev);
        let atr_series = atr(candles, p.atr_period);
        let stoch = stochastic(candles, p.stoch_k_period, p.stoch_d_period, p.stoch_d_period);
        let resistance = rolling_max(&highs, p.sr_window);
        let support = rolling_min(&lows, p.sr_window);

        let n = candles.len();
        // Each series is tail-aligned with the window: the value for
        // candle i lives at i - (n - series.len()).
        let at = |series: &[f64], i: usize| -> Option<f64> {
            i.checked_sub(n - series.len()).map(|j| series[j])
        };

        let snapshots = candles
            .iter()
            .enumerate()
            .map(|(i, candle)| {
                let values = (|| {
                    let sma_fast_v = at(&sma_fast, i)?;
                    let sma_slow_v = at(&sma_slow, i)?;
                    let close = candle.close;
                    let trend = if sma_fast_v > sma_slow_v && close > sma_fast_v {
                        1
                    } else if sma_fast_v < sma_slow_v && close < sma_fast_v {
                        -1
                    } else {
                        0
                    };

                    Some(SnapshotValues {
                        rsi: at(&rsi_series, i)?,
                        macd: at(&macd_result.macd_line, i)?,
                        macd_signal: at(&macd_result.signal_line, i)?,
                        macd_hist: at(&macd_result.histogram, i)?,
                        sma_fast: sma_fast_v,
                        sma_slow: sma_slow_v,
                        bb_upper: at(&bb.upper, i)?,
                        bb_middle: at(&bb.middle, i)?,
                        bb_lower: at(&bb.lower, i)?,
                        atr: at(&atr_series, i)?,
                        stoch_k: at(&stoch.k, i)?,
                        stoch_d: at(&stoch.d, i)?,
                        support: at(&support, i)?,
                        resistance: at(&resistance, i)?,
                        trend,
                    })
                })();

                IndicatorSnapshot {
                    candle: candle.clone(),
                    values,
                }
            })
            .collect();

        Ok(snapshots)
    }
}

impl Default for IndicatorEngine {
    fn default() -> Self {
        Self::new(IndicatorParams::default())
    }
}

/// Ordered, strictly increasing timestamps with no duplicates.
fn validate_window(candles: &[Candle]) -> Result<(), SignalError> {
    for pair in candles.windows(2) {
        if pair[1].timestamp <= pair[0].timestamp {
            return Err(SignalError::ComputationDegraded(format!(
                "candle window not strictly ordered at {}",
                pair[1].timestamp
            )));
        }
    }
    Ok(())
}

/// Last two snapshots with complete indicator values, in (previous,
/// current) order. The evaluator consumes exactly this pair.
pub fn last_two_complete(
    snapshots: &[IndicatorSnapshot],
) -> Option<(&IndicatorSnapshot, &IndicatorSnapshot)> {
    let n = snapshots.len();
    if n < 2 {
        return None;
    }
    let current = &snapshots[n - 1];
    let previous = &snapshots[n - 2];
    if current.values.is_some() && previous.values.is_some() {
        Some((previous, current))
    } else {
        None
    }
}

/// Latest snapshot with complete values, used by higher-timeframe
/// confirmation.
pub fn latest_complete(snapshots: &[IndicatorSnapshot]) -> Option<&IndicatorSnapshot> {
    snapshots.iter().rev().find(|s| s.values.is_some())
}

/// Trailing ATR values (oldest first) for the volatility check.
pub fn trailing_atr(snapshots: &[IndicatorSnapshot], lookback: usize) -> Vec<f64> {
    let values: Vec<f64> = snapshots
        .iter()
        .filter_map(|s| s.values.as_ref().map(|v| v.atr))
        .collect();
    let start = values.len().saturating_sub(lookback);
    values[start..].to_vec()
}
