use std::collections::HashMap;

use indicator_engine::{IndicatorSnapshot, SnapshotValues};
use log::debug;
use signal_core::{ConfirmationResult, Direction, RawSignal, Timeframe, TimeframeSettings};

/// Adds a higher-timeframe confirmation score to raw signals.
///
/// Each signal timeframe has a fixed set of confirming timeframes
/// (`Timeframe::confirmers`). A higher timeframe agrees when its trend
/// supports the signal direction; its configured weight then counts
/// toward the confirmation score. The percentage is taken against the
/// weights of the higher timeframes that actually had data, so a
/// missing feed does not penalize the signal.
#[derive(Debug, Clone)]
pub struct MultiTimeframeConfirmer {
    weights: HashMap<Timeframe, f64>,
    threshold_pct: f64,
}

/// How strongly a higher timeframe agrees with a direction.
enum Agreement {
    Strong,
    WeakBias,
    None,
}

impl MultiTimeframeConfirmer {
    pub fn new(timeframes: &[TimeframeSettings], threshold_pct: f64) -> Self {
        Self {
            weights: timeframes
                .iter()
                .map(|t| (t.timeframe, t.confirmation_weight))
                .collect(),
            threshold_pct,
        }
    }

    /// Confirm one raw signal against the latest complete snapshot of
    /// each available higher timeframe.
    pub fn confirm(
        &self,
        signal: &RawSignal,
        latest_by_timeframe: &HashMap<Timeframe, IndicatorSnapshot>,
    ) -> ConfirmationResult {
        let mut score = 0.0;
        let mut available_weight = 0.0;
        let mut reasons = Vec::new();

        for &higher_tf in signal.timeframe.confirmers() {
            let Some(snapshot) = latest_by_timeframe.get(&higher_tf) else {
                debug!(
                    "{} {}: no data on confirming timeframe {}",
                    signal.symbol,
                    signal.timeframe.code(),
                    higher_tf.code()
                );
                continue;
            };
            let Some(values) = snapshot.values.as_ref() else {
                continue;
            };

            let weight = self.weights.get(&higher_tf).copied().unwrap_or(1.0);
            available_weight += weight;

            match agreement(signal.direction, snapshot.candle.close, values) {
                Agreement::Strong => {
                    score += weight;
                    reasons.push(match signal.direction {
                        Direction::Buy => format!(
                            "{}: strong bullish trend (price > fast MA > slow MA, MACD positive)",
                            higher_tf.code()
                        ),
                        Direction::Sell => format!(
                            "{}: strong bearish trend (price < fast MA < slow MA, MACD negative)",
                            higher_tf.code()
                        ),
                    });
                }
                Agreement::WeakBias => {
                    score += weight;
                    reasons.push(match signal.direction {
                        Direction::Buy => {
                            format!("{}: bullish bias (price above slow MA)", higher_tf.code())
                        }
                        Direction::Sell => {
                            format!("{}: bearish bias (price below slow MA)", higher_tf.code())
                        }
                    });
                }
                Agreement::None => {}
            }
        }

        let percentage = if available_weight > 0.0 {
            score / available_weight * 100.0
        } else {
            0.0
        };

        ConfirmationResult {
            score,
            percentage,
            confirmed: percentage >= self.threshold_pct,
            reasons,
        }
    }
}

fn agreement(direction: Direction, close: f64, values: &SnapshotValues) -> Agreement {
    match direction {
        Direction::Buy => {
            if close > values.sma_fast && values.sma_fast > values.sma_slow && values.macd_hist > 0.0
            {
                Agreement::Strong
            } else if close > values.sma_slow {
                Agreement::WeakBias
            } else {
                Agreement::None
            }
        }
        Direction::Sell => {
            if close < values.sma_fast && values.sma_fast < values.sma_slow && values.macd_hist < 0.0
            {
                Agreement::Strong
            } else if close < values.sma_slow {
                Agreement::WeakBias
            } else {
                Agreement::None
            }
        }
    }
}
