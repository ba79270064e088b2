use indicator_engine::SnapshotValues;
use signal_core::{Direction, EvaluatorParams};

/// Inputs available to a scoring rule: the last two complete snapshots
/// and the evaluator thresholds.
pub struct RuleContext<'a> {
    pub current: &'a SnapshotValues,
    pub previous: &'a SnapshotValues,
    pub current_close: f64,
    pub previous_close: f64,
    pub params: &'a EvaluatorParams,
}

/// One entry of the declarative scoring table. Rules are evaluated in
/// order; each contributes its points to one side when it fires and
/// records its label.
pub struct ScoringRule {
    pub label: &'static str,
    pub points: u32,
    pub side: Direction,
    pub fires: fn(&RuleContext) -> bool,
}

/// The fixed scoring table: five bullish/bearish rule pairs.
pub const SCORING_RULES: &[ScoringRule] = &[
    ScoringRule {
        label: "RSI oversold recovery",
        points: 2,
        side: Direction::Buy,
        fires: |ctx| {
            ctx.current.rsi < ctx.params.rsi_oversold && ctx.current.rsi > ctx.previous.rsi
        },
    },
    ScoringRule {
        label: "RSI overbought decline",
        points: 2,
        side: Direction::Sell,
        fires: |ctx| {
            ctx.current.rsi > ctx.params.rsi_overbought && ctx.current.rsi < ctx.previous.rsi
        },
    },
    ScoringRule {
        label: "MACD bullish crossover",
        points: 2,
        side: Direction::Buy,
        fires: |ctx| ctx.current.macd_hist > 0.0 && ctx.previous.macd_hist <= 0.0,
    },
    ScoringRule {
        label: "MACD bearish crossover",
        points: 2,
        side: Direction::Sell,
        fires: |ctx| ctx.current.macd_hist < 0.0 && ctx.previous.macd_hist >= 0.0,
    },
    ScoringRule {
        label: "Golden cross with price above moving averages",
        points: 3,
        side: Direction::Buy,
        fires: |ctx| {
            ctx.current_close > ctx.current.sma_fast
                && ctx.current.sma_fast > ctx.current.sma_slow
                && ctx.previous.sma_fast <= ctx.previous.sma_slow
        },
    },
    ScoringRule {
        label: "Death cross with price below moving averages",
        points: 3,
        side: Direction::Sell,
        fires: |ctx| {
            ctx.current_close < ctx.current.sma_fast
                && ctx.current.sma_fast < ctx.current.sma_slow
                && ctx.previous.sma_fast >= ctx.previous.sma_slow
        },
    },
    ScoringRule {
        label: "Bounce from lower Bollinger band",
        points: 1,
        side: Direction::Buy,
        fires: |ctx| {
            ctx.current_close <= ctx.current.bb_lower && ctx.current_close > ctx.previous_close
        },
    },
    ScoringRule {
        label: "Rejection from upper Bollinger band",
        points: 1,
        side: Direction::Sell,
        fires: |ctx| {
            ctx.current_close >= ctx.current.bb_upper && ctx.current_close < ctx.previous_close
        },
    },
    ScoringRule {
        label: "Stochastic bullish cross in oversold zone",
        points: 1,
        side: Direction::Buy,
        fires: |ctx| ctx.current.stoch_k < 20.0 && ctx.current.stoch_k > ctx.current.stoch_d,
    },
    ScoringRule {
        label: "Stochastic bearish cross in overbought zone",
        points: 1,
        side: Direction::Sell,
        fires: |ctx| ctx.current.stoch_k > 80.0 && ctx.current.stoch_k < ctx.current.stoch_d,
    },
];
