pub mod rules;

pub use rules::{RuleContext, ScoringRule, SCORING_RULES};

use indicator_engine::IndicatorSnapshot;
use signal_core::{
    Direction, EvaluatorParams, InstrumentConfig, RawSignal, Timeframe,
};
use tracing::debug;

/// Scores bullish and bearish evidence from the last two indicator
/// snapshots and emits a raw directional signal with entry, stop and
/// take-profit levels.
#[derive(Debug, Clone)]
pub struct SignalEvaluator {
    params: EvaluatorParams,
}

impl SignalEvaluator {
    pub fn new(params: EvaluatorParams) -> Self {
        Self { params }
    }

    /// Evaluate one (instrument, timeframe) pair. Returns `None` when
    /// no direction qualifies, including the tie case where both
    /// scores reach the minimum, or when indicator values are missing.
    pub fn evaluate(
        &self,
        previous: &IndicatorSnapshot,
        current: &IndicatorSnapshot,
        instrument: &InstrumentConfig,
        timeframe: Timeframe,
    ) -> Option<RawSignal> {
        let prev_values = previous.values.as_ref()?;
        let curr_values = current.values.as_ref()?;

        let ctx = RuleContext {
            current: curr_values,
            previous: prev_values,
            current_close: current.candle.close,
            previous_close: previous.candle.close,
            params: &self.params,
        };

        let mut bullish_score = 0u32;
        let mut bearish_score = 0u32;
        let mut reasons = Vec::new();

        for rule in SCORING_RULES {
            if (rule.fires)(&ctx) {
                match rule.side {
                    Direction::Buy => bullish_score += rule.points,
                    Direction::Sell => bearish_score += rule.points,
                }
                reasons.push(rule.label.to_string());
            }
        }

        let min = self.params.min_score;
        // Strict inequality: a tie at or above the threshold is no
        // signal.
        let (direction, winning_score) = if bullish_score >= min && bullish_score > bearish_score {
            (Direction::Buy, bullish_score)
        } else if bearish_score >= min && bearish_score > bullish_score {
            (Direction::Sell, bearish_score)
        } else {
            debug!(
                symbol = %instrument.symbol,
                timeframe = timeframe.code(),
                bullish_score,
                bearish_score,
                "no qualifying direction"
            );
            return None;
        };

        let strength =
            (winning_score as f64 / self.params.score_ceiling as f64).min(1.0);

        let atr = curr_values.atr;
        if atr <= 0.0 {
            debug!(
                symbol = %instrument.symbol,
                timeframe = timeframe.code(),
                "non-positive ATR, cannot place stop"
            );
            return None;
        }

        let entry = current.candle.close;
        let stop_distance = atr * self.params.atr_multiplier;
        let (stop_loss, tp1, tp2, tp3) = match direction {
            Direction::Buy => {
                let stop = entry - stop_distance;
                let risk = entry - stop;
                (stop, entry + risk, entry + risk * 2.0, entry + risk * 3.0)
            }
            Direction::Sell => {
                let stop = entry + stop_distance;
                let risk = stop - entry;
                (stop, entry - risk, entry - risk * 2.0, entry - risk * 3.0)
            }
        };

        let dp = instrument.pip_position;
        Some(RawSignal {
            symbol: instrument.symbol.clone(),
            timeframe,
            direction,
            strength,
            reasons,
            entry_price: round_to(entry, dp),
            stop_loss: round_to(stop_loss, dp),
            take_profit_1: round_to(tp1, dp),
            take_profit_2: round_to(tp2, dp),
            take_profit_3: round_to(tp3, dp),
            risk_reward_1: 1.0,
            risk_reward_2: 2.0,
            risk_reward_3: 3.0,
            timestamp: current.candle.timestamp,
            current_price: current.candle.close,
            indicators: curr_values.to_indicator_values(),
        })
    }
}

impl Default for SignalEvaluator {
    fn default() -> Self {
        Self::new(EvaluatorParams::default())
    }
}

/// Round to the instrument's pip decimal position.
fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round() / factor
}
