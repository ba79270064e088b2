use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One completed OHLCV observation for a fixed time bucket.
///
/// Windows handed to the pipeline are ordered by strictly increasing
/// timestamp with no duplicates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Live quote for one instrument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub timestamp: DateTime<Utc>,
    pub bid: f64,
    pub ask: f64,
}

impl Quote {
    pub fn mid(&self) -> f64 {
        (self.bid + self.ask) / 2.0
    }

    pub fn spread(&self) -> f64 {
        self.ask - self.bid
    }
}

/// Signal direction. Absence of a qualifying direction yields no signal
/// at all rather than a neutral variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Buy,
    Sell,
}

impl Direction {
    pub fn label(&self) -> &'static str {
        match self {
            Direction::Buy => "BUY",
            Direction::Sell => "SELL",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetCategory {
    Forex,
    Commodity,
    Crypto,
}

/// Named trading session. Instruments without a preference trade in any
/// active session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Session {
    Sydney,
    Tokyo,
    London,
    NewYork,
}

impl Session {
    pub fn name(&self) -> &'static str {
        match self {
            Session::Sydney => "sydney",
            Session::Tokyo => "tokyo",
            Session::London => "london",
            Session::NewYork => "newyork",
        }
    }
}

/// Static per-instrument metadata, looked up by symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentConfig {
    pub symbol: String,
    pub display_name: String,
    /// Smallest standard price increment (e.g. 0.0001 for EUR_USD).
    pub pip_value: f64,
    /// Decimal position prices are rounded to when published.
    pub pip_position: u32,
    pub category: AssetCategory,
    /// `None` means the instrument trades in any active session.
    pub preferred_session: Option<Session>,
    /// Typical spread in price units, used by the volatility and spread
    /// checks.
    pub baseline_spread: f64,
}

/// Supported chart timeframes.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum Timeframe {
    M15,
    M30,
    H1,
    H4,
    D1,
    W1,
}

impl Timeframe {
    pub fn code(&self) -> &'static str {
        match self {
            Timeframe::M15 => "M15",
            Timeframe::M30 => "M30",
            Timeframe::H1 => "H1",
            Timeframe::H4 => "H4",
            Timeframe::D1 => "D1",
            Timeframe::W1 => "W1",
        }
    }

    pub fn minutes(&self) -> i64 {
        match self {
            Timeframe::M15 => 15,
            Timeframe::M30 => 30,
            Timeframe::H1 => 60,
            Timeframe::H4 => 240,
            Timeframe::D1 => 1440,
            Timeframe::W1 => 10080,
        }
    }

    /// Fixed confirmation hierarchy: the higher timeframes consulted
    /// when confirming a signal on this one.
    pub fn confirmers(&self) -> &'static [Timeframe] {
        match self {
            Timeframe::M15 => &[Timeframe::M30, Timeframe::H1],
            Timeframe::M30 => &[Timeframe::H1, Timeframe::H4],
            Timeframe::H1 => &[Timeframe::H4, Timeframe::D1],
            Timeframe::H4 => &[Timeframe::D1, Timeframe::W1],
            Timeframe::D1 => &[Timeframe::W1],
            Timeframe::W1 => &[],
        }
    }

    pub fn all() -> Vec<Timeframe> {
        vec![
            Timeframe::M15,
            Timeframe::M30,
            Timeframe::H1,
            Timeframe::H4,
            Timeframe::D1,
            Timeframe::W1,
        ]
    }
}

/// Unique key for the active-signal map: at most one active signal per
/// (instrument, timeframe) at any time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SignalKey {
    pub symbol: String,
    pub timeframe: Timeframe,
}

impl SignalKey {
    pub fn new(symbol: impl Into<String>, timeframe: Timeframe) -> Self {
        Self {
            symbol: symbol.into(),
            timeframe,
        }
    }
}

impl std::fmt::Display for SignalKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}_{}", self.symbol, self.timeframe.code())
    }
}

/// Indicator values captured at signal time, published alongside the
/// signal for traceability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorValues {
    pub rsi: f64,
    pub macd: f64,
    pub macd_signal: f64,
    pub macd_hist: f64,
    pub sma_fast: f64,
    pub sma_slow: f64,
    pub atr: f64,
}

/// Raw directional signal produced by the evaluator, before
/// confirmation, gating and ranking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawSignal {
    pub symbol: String,
    pub timeframe: Timeframe,
    pub direction: Direction,
    /// Normalized winning score, in [0, 1].
    pub strength: f64,
    /// Ordered labels of the rules that fired.
    pub reasons: Vec<String>,
    pub entry_price: f64,
    pub stop_loss: f64,
    pub take_profit_1: f64,
    pub take_profit_2: f64,
    pub take_profit_3: f64,
    pub risk_reward_1: f64,
    pub risk_reward_2: f64,
    pub risk_reward_3: f64,
    /// Timestamp of the candle the signal was derived from.
    pub timestamp: DateTime<Utc>,
    pub current_price: f64,
    pub indicators: IndicatorValues,
}

impl RawSignal {
    pub fn key(&self) -> SignalKey {
        SignalKey::new(self.symbol.clone(), self.timeframe)
    }
}

/// Higher-timeframe confirmation attached to a raw signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfirmationResult {
    /// Sum of the weights of agreeing higher timeframes.
    pub score: f64,
    /// score / available weight * 100, in [0, 100]. 0 when no higher
    /// timeframe had data.
    pub percentage: f64,
    pub confirmed: bool,
    pub reasons: Vec<String>,
}

impl ConfirmationResult {
    /// Result used when no higher timeframe exists or confirmation is
    /// disabled.
    pub fn unavailable() -> Self {
        Self {
            score: 0.0,
            percentage: 0.0,
            confirmed: false,
            reasons: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateCheckKind {
    Session,
    Volatility,
    Spread,
    News,
}

/// Outcome of one veto-capable gate check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateCheck {
    pub kind: GateCheckKind,
    pub passed: bool,
    pub reason: String,
}

/// Combined gate outcome. A single failing check rejects the signal for
/// this cycle; checks never combine partial scores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateVerdict {
    pub accepted: bool,
    pub checks: Vec<GateCheck>,
}

impl GateVerdict {
    pub fn check(&self, kind: GateCheckKind) -> Option<&GateCheck> {
        self.checks.iter().find(|c| c.kind == kind)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SignalStatus {
    Active,
    Replaced,
    Expired,
}

/// The published signal entity: raw signal plus confirmation, proximity
/// and lifecycle fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradingSignal {
    pub id: String,
    #[serde(flatten)]
    pub raw: RawSignal,
    pub confirmation: ConfirmationResult,
    pub gate: GateVerdict,
    /// Distance between entry and current market price, in pips.
    pub distance_pips: f64,
    /// Normalized closeness to market, in [0, 1]; decreases with
    /// distance.
    pub proximity_score: f64,
    pub status: SignalStatus,
    pub created_at: DateTime<Utc>,
}

impl TradingSignal {
    pub fn key(&self) -> SignalKey {
        self.raw.key()
    }
}

/// Computed position size for one instrument category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PositionSize {
    /// Forex: standardized lots plus the equivalent unit count.
    Lots {
        lots: f64,
        units: i64,
        pip_value_per_lot: f64,
        pips_distance: f64,
    },
    /// Commodity/crypto: unit count sized from absolute price distance.
    Units { units: f64, price_distance: f64 },
}

/// Position sizing result. Pure function of (signal, balance, risk
/// percent); never stored by the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionSizing {
    pub symbol: String,
    pub category: AssetCategory,
    pub account_balance: f64,
    pub risk_percent: f64,
    /// Monetary amount at risk if the stop is hit.
    pub risk_amount: f64,
    pub entry_price: f64,
    pub stop_loss: f64,
    pub size: PositionSize,
    pub max_loss: f64,
    pub position_value: f64,
}
