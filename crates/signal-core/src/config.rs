use serde::{Deserialize, Serialize};

use crate::{AssetCategory, InstrumentConfig, Session, Timeframe};

/// Indicator periods used by the indicator engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorParams {
    pub rsi_period: usize,
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,
    pub sma_fast: usize,
    pub sma_slow: usize,
    pub bb_period: usize,
    pub bb_std_dev: f64,
    pub atr_period: usize,
    pub stoch_k_period: usize,
    pub stoch_d_period: usize,
    /// Rolling high/low window for support/resistance.
    pub sr_window: usize,
}

impl IndicatorParams {
    /// Minimum window length required before any indicator output is
    /// considered defined. Shorter windows produce no signal.
    pub fn required_periods(&self) -> usize {
        self.rsi_period
            .max(self.macd_slow)
            .max(self.sma_slow)
            .max(self.atr_period)
            + 50
    }
}

impl Default for IndicatorParams {
    fn default() -> Self {
        Self {
            rsi_period: 14,
            macd_fast: 12,
            macd_slow: 26,
            macd_signal: 9,
            sma_fast: 50,
            sma_slow: 200,
            bb_period: 20,
            bb_std_dev: 2.0,
            atr_period: 14,
            stoch_k_period: 14,
            stoch_d_period: 3,
            sr_window: 20,
        }
    }
}

/// Thresholds for the rule-based direction/strength scoring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluatorParams {
    pub rsi_oversold: f64,
    pub rsi_overbought: f64,
    /// Stop distance = ATR * this multiplier.
    pub atr_multiplier: f64,
    /// Minimum winning score for a direction to qualify.
    pub min_score: u32,
    /// Score at which strength saturates at 1.0.
    pub score_ceiling: u32,
}

impl Default for EvaluatorParams {
    fn default() -> Self {
        Self {
            rsi_oversold: 30.0,
            rsi_overbought: 70.0,
            atr_multiplier: 2.0,
            min_score: 3,
            score_ceiling: 8,
        }
    }
}

/// One session window expressed against a fixed UTC offset. Local hours
/// may wrap past midnight (open > close).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionWindow {
    pub session: Session,
    pub utc_offset_hours: i32,
    pub open_hour: u32,
    pub close_hour: u32,
}

/// Parameters for the session/volatility/spread/news gate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateParams {
    pub session_filtering: bool,
    pub news_blackout: bool,
    pub sessions: Vec<SessionWindow>,
    /// Global ATR floor in price units.
    pub atr_floor: f64,
    /// Volatility threshold = baseline spread * this multiplier,
    /// floored by `atr_floor`.
    pub atr_threshold_multiplier: f64,
    /// Trailing ATR values considered for the percentile rank.
    pub volatility_lookback: usize,
    /// Minimum percentile rank of the current ATR, in [0, 100].
    pub volatility_percentile_floor: f64,
    /// Minimum number of data points required by the volatility check.
    pub min_volatility_points: usize,
    /// Max acceptable spread = baseline spread * this multiplier.
    pub max_spread_multiplier: f64,
}

impl Default for GateParams {
    fn default() -> Self {
        Self {
            session_filtering: true,
            news_blackout: true,
            sessions: vec![
                SessionWindow {
                    session: Session::Sydney,
                    utc_offset_hours: 10,
                    open_hour: 7,
                    close_hour: 16,
                },
                SessionWindow {
                    session: Session::Tokyo,
                    utc_offset_hours: 9,
                    open_hour: 9,
                    close_hour: 18,
                },
                SessionWindow {
                    session: Session::London,
                    utc_offset_hours: 0,
                    open_hour: 8,
                    close_hour: 17,
                },
                SessionWindow {
                    session: Session::NewYork,
                    utc_offset_hours: -5,
                    open_hour: 8,
                    close_hour: 17,
                },
            ],
            atr_floor: 0.0005,
            atr_threshold_multiplier: 2.0,
            volatility_lookback: 100,
            volatility_percentile_floor: 20.0,
            min_volatility_points: 20,
            max_spread_multiplier: 3.0,
        }
    }
}

/// Risk-percent bounds and forex lot constants for position sizing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskParams {
    pub default_risk_percent: f64,
    pub max_risk_percent: f64,
    /// Monetary value of one pip per standard lot for USD-quoted pairs.
    pub pip_value_per_lot: f64,
    pub units_per_lot: f64,
}

impl Default for RiskParams {
    fn default() -> Self {
        Self {
            default_risk_percent: 1.0,
            max_risk_percent: 5.0,
            pip_value_per_lot: 10.0,
            units_per_lot: 100_000.0,
        }
    }
}

/// Deduplication and expiry rules applied by the lifecycle manager.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LifecycleParams {
    /// Minimum minutes between publishes for one (instrument,
    /// timeframe) key. Takes precedence over direction-change
    /// replacement.
    pub dedup_interval_minutes: i64,
    /// Active signals older than this (by creation time) are evicted.
    pub signal_ttl_hours: i64,
    pub history_cap: usize,
    /// Strength gain required to replace a same-direction signal.
    pub strength_replace_delta: f64,
}

impl Default for LifecycleParams {
    fn default() -> Self {
        Self {
            dedup_interval_minutes: 15,
            signal_ttl_hours: 24,
            history_cap: 1000,
            strength_replace_delta: 0.2,
        }
    }
}

/// Cycle-level knobs for the orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineParams {
    pub candle_count: usize,
    pub cycle_interval_secs: u64,
    pub fetch_timeout_secs: u64,
    pub proximity_threshold_pips: f64,
    pub mtf_confirmation: bool,
    /// Confirmation percentage at or above which a signal counts as
    /// confirmed.
    pub confirmation_threshold_pct: f64,
}

impl Default for PipelineParams {
    fn default() -> Self {
        Self {
            candle_count: 500,
            cycle_interval_secs: 300,
            fetch_timeout_secs: 10,
            proximity_threshold_pips: 15.0,
            mtf_confirmation: true,
            confirmation_threshold_pct: 60.0,
        }
    }
}

/// Per-timeframe confirmation weight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeframeSettings {
    pub timeframe: Timeframe,
    pub confirmation_weight: f64,
}

/// Read-only engine configuration, loaded once at startup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    pub instruments: Vec<InstrumentConfig>,
    /// Timeframes scanned for signals each cycle.
    pub scan_timeframes: Vec<Timeframe>,
    pub timeframes: Vec<TimeframeSettings>,
    pub indicators: IndicatorParams,
    pub evaluator: EvaluatorParams,
    pub gate: GateParams,
    pub risk: RiskParams,
    pub lifecycle: LifecycleParams,
    pub pipeline: PipelineParams,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            instruments: default_instruments(),
            scan_timeframes: vec![Timeframe::H1, Timeframe::H4, Timeframe::D1],
            timeframes: vec![
                TimeframeSettings { timeframe: Timeframe::M15, confirmation_weight: 0.5 },
                TimeframeSettings { timeframe: Timeframe::M30, confirmation_weight: 0.7 },
                TimeframeSettings { timeframe: Timeframe::H1, confirmation_weight: 1.0 },
                TimeframeSettings { timeframe: Timeframe::H4, confirmation_weight: 1.5 },
                TimeframeSettings { timeframe: Timeframe::D1, confirmation_weight: 2.0 },
                TimeframeSettings { timeframe: Timeframe::W1, confirmation_weight: 3.0 },
            ],
            indicators: IndicatorParams::default(),
            evaluator: EvaluatorParams::default(),
            gate: GateParams::default(),
            risk: RiskParams::default(),
            lifecycle: LifecycleParams::default(),
            pipeline: PipelineParams::default(),
        }
    }
}

impl EngineConfig {
    /// Defaults overridden by environment variables where present.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        let mut config = Self::default();

        if let Some(v) = env_parse::<bool>("SESSION_FILTERING_ENABLED") {
            config.gate.session_filtering = v;
        }
        if let Some(v) = env_parse::<bool>("NEWS_BLACKOUT_ENABLED") {
            config.gate.news_blackout = v;
        }
        if let Some(v) = env_parse::<bool>("MTF_CONFIRMATION_ENABLED") {
            config.pipeline.mtf_confirmation = v;
        }
        if let Some(v) = env_parse::<f64>("PROXIMITY_THRESHOLD_PIPS") {
            config.pipeline.proximity_threshold_pips = v;
        }
        if let Some(v) = env_parse::<f64>("DEFAULT_RISK_PERCENT") {
            config.risk.default_risk_percent = v;
        }
        if let Some(v) = env_parse::<f64>("MAX_RISK_PERCENT") {
            config.risk.max_risk_percent = v;
        }
        if let Some(v) = env_parse::<u64>("CYCLE_INTERVAL_SECS") {
            config.pipeline.cycle_interval_secs = v;
        }
        if let Some(v) = env_parse::<usize>("MAX_CANDLES") {
            config.pipeline.candle_count = v;
        }

        config
    }

    pub fn instrument(&self, symbol: &str) -> Option<&InstrumentConfig> {
        self.instruments.iter().find(|i| i.symbol == symbol)
    }

    pub fn confirmation_weight(&self, timeframe: Timeframe) -> Option<f64> {
        self.timeframes
            .iter()
            .find(|t| t.timeframe == timeframe)
            .map(|t| t.confirmation_weight)
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

fn default_instruments() -> Vec<InstrumentConfig> {
    vec![
        InstrumentConfig {
            symbol: "EUR_USD".into(),
            display_name: "EUR/USD".into(),
            pip_value: 0.0001,
            pip_position: 4,
            category: AssetCategory::Forex,
            preferred_session: Some(Session::London),
            baseline_spread: 0.0001,
        },
        InstrumentConfig {
            symbol: "GBP_USD".into(),
            display_name: "GBP/USD".into(),
            pip_value: 0.0001,
            pip_position: 4,
            category: AssetCategory::Forex,
            preferred_session: Some(Session::London),
            baseline_spread: 0.00015,
        },
        InstrumentConfig {
            symbol: "USD_JPY".into(),
            display_name: "USD/JPY".into(),
            pip_value: 0.01,
            pip_position: 2,
            category: AssetCategory::Forex,
            preferred_session: Some(Session::Tokyo),
            baseline_spread: 0.015,
        },
        InstrumentConfig {
            symbol: "AUD_USD".into(),
            display_name: "AUD/USD".into(),
            pip_value: 0.0001,
            pip_position: 4,
            category: AssetCategory::Forex,
            preferred_session: Some(Session::Sydney),
            baseline_spread: 0.00015,
        },
        InstrumentConfig {
            symbol: "USD_CAD".into(),
            display_name: "USD/CAD".into(),
            pip_value: 0.0001,
            pip_position: 4,
            category: AssetCategory::Forex,
            preferred_session: Some(Session::NewYork),
            baseline_spread: 0.0002,
        },
        InstrumentConfig {
            symbol: "XAU_USD".into(),
            display_name: "Gold/USD".into(),
            pip_value: 0.01,
            pip_position: 2,
            category: AssetCategory::Commodity,
            preferred_session: None,
            baseline_spread: 0.3,
        },
        InstrumentConfig {
            symbol: "BTC_USD".into(),
            display_name: "Bitcoin/USD".into(),
            pip_value: 1.0,
            pip_position: 0,
            category: AssetCategory::Crypto,
            preferred_session: None,
            baseline_spread: 25.0,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn required_periods_uses_longest_indicator() {
        let params = IndicatorParams::default();
        assert_eq!(params.required_periods(), 250);

        let short = IndicatorParams {
            sma_fast: 10,
            sma_slow: 20,
            ..IndicatorParams::default()
        };
        assert_eq!(short.required_periods(), 76);
    }

    #[test]
    fn instrument_lookup() {
        let config = EngineConfig::default();
        let jpy = config.instrument("USD_JPY").unwrap();
        assert_eq!(jpy.pip_value, 0.01);
        assert_eq!(jpy.pip_position, 2);
        assert!(config.instrument("EUR_GBP").is_none());
    }

    #[test]
    fn confirmation_weights_cover_all_timeframes() {
        let config = EngineConfig::default();
        for tf in Timeframe::all() {
            assert!(config.confirmation_weight(tf).is_some(), "{:?}", tf);
        }
    }
}
