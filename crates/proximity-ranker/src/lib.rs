use signal_core::TradingSignal;
use tracing::debug;

/// Filters signals whose entry price has drifted too far from the
/// market and ranks the survivors by how actionable they still are.
///
/// Distance is measured in pips against the instrument's pip value.
/// The proximity score is linear: 1.0 at zero distance, 0.0 at the
/// threshold, and anything beyond the threshold is dropped entirely.
#[derive(Debug, Clone)]
pub struct ProximityRanker {
    threshold_pips: f64,
}

impl ProximityRanker {
    pub fn new(threshold_pips: f64) -> Self {
        Self { threshold_pips }
    }

    /// Pip distance between the signal entry and the current market price.
    pub fn distance_pips(entry: f64, current: f64, pip_value: f64) -> f64 {
        (entry - current).abs() / pip_value
    }

    /// Score for a given pip distance, clamped to [0, 1].
    pub fn score(&self, distance_pips: f64) -> f64 {
        ((self.threshold_pips - distance_pips) / self.threshold_pips).clamp(0.0, 1.0)
    }

    /// Annotate a signal with its distance and proximity score. Returns
    /// false when the entry has drifted past the threshold and the
    /// signal should not be published.
    pub fn admit(&self, signal: &mut TradingSignal, pip_value: f64) -> bool {
        let distance =
            Self::distance_pips(signal.raw.entry_price, signal.raw.current_price, pip_value);
        signal.distance_pips = distance;
        signal.proximity_score = self.score(distance);

        if distance > self.threshold_pips {
            debug!(
                symbol = %signal.raw.symbol,
                timeframe = signal.raw.timeframe.code(),
                distance_pips = distance,
                "entry too far from market, dropping signal"
            );
            return false;
        }
        true
    }

    /// Order signals best-first. Ties on score fall back to symbol and
    /// then timeframe so repeated cycles produce a stable ordering.
    pub fn rank(&self, signals: &mut [TradingSignal]) {
        signals.sort_by(|a, b| {
            b.proximity_score
                .partial_cmp(&a.proximity_score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.raw.symbol.cmp(&b.raw.symbol))
                .then_with(|| a.raw.timeframe.minutes().cmp(&b.raw.timeframe.minutes()))
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use signal_core::{
        ConfirmationResult, Direction, GateVerdict, IndicatorValues, RawSignal, SignalStatus,
        Timeframe,
    };

    fn signal(symbol: &str, timeframe: Timeframe, entry: f64, current: f64) -> TradingSignal {
        let raw = RawSignal {
            symbol: symbol.into(),
            timeframe,
            direction: Direction::Buy,
            strength: 0.5,
            reasons: vec![],
            entry_price: entry,
            stop_loss: entry - 0.0020,
            take_profit_1: entry + 0.0020,
            take_profit_2: entry + 0.0040,
            take_profit_3: entry + 0.0060,
            risk_reward_1: 1.0,
            risk_reward_2: 2.0,
            risk_reward_3: 3.0,
            timestamp: Utc.with_ymd_and_hms(2024, 3, 4, 10, 0, 0).unwrap(),
            current_price: current,
            indicators: IndicatorValues {
                rsi: 50.0,
                macd: 0.0,
                macd_signal: 0.0,
                macd_hist: 0.0,
                sma_fast: entry,
                sma_slow: entry,
                atr: 0.0010,
            },
        };
        TradingSignal {
            id: format!("{}-test", symbol),
            raw,
            confirmation: ConfirmationResult::unavailable(),
            gate: GateVerdict { accepted: true, checks: vec![] },
            distance_pips: 0.0,
            proximity_score: 0.0,
            status: SignalStatus::Active,
            created_at: Utc.with_ymd_and_hms(2024, 3, 4, 10, 0, 0).unwrap(),
        }
    }

    #[test]
    fn five_pip_drift_scores_two_thirds() {
        let ranker = ProximityRanker::new(15.0);
        let mut s = signal("EUR_USD", Timeframe::H1, 1.1000, 1.0995);

        assert!(ranker.admit(&mut s, 0.0001));
        assert!((s.distance_pips - 5.0).abs() < 1e-9);
        assert!((s.proximity_score - 10.0 / 15.0).abs() < 1e-9);
    }

    #[test]
    fn entry_at_market_scores_one() {
        let ranker = ProximityRanker::new(15.0);
        let mut s = signal("EUR_USD", Timeframe::H1, 1.1000, 1.1000);

        assert!(ranker.admit(&mut s, 0.0001));
        assert_eq!(s.proximity_score, 1.0);
    }

    #[test]
    fn drift_beyond_threshold_is_dropped() {
        let ranker = ProximityRanker::new(15.0);
        let mut s = signal("EUR_USD", Timeframe::H1, 1.1000, 1.0980);

        assert!(!ranker.admit(&mut s, 0.0001));
        assert!((s.distance_pips - 20.0).abs() < 1e-9);
        assert_eq!(s.proximity_score, 0.0);
    }

    #[test]
    fn threshold_boundary_is_retained_at_zero_score() {
        let ranker = ProximityRanker::new(15.0);
        let mut s = signal("EUR_USD", Timeframe::H1, 1.1000, 1.0985);

        assert!(ranker.admit(&mut s, 0.0001));
        assert_eq!(s.proximity_score, 0.0);
    }

    #[test]
    fn jpy_pip_value_scales_distance() {
        let ranker = ProximityRanker::new(15.0);
        let mut s = signal("USD_JPY", Timeframe::H1, 150.00, 149.95);

        assert!(ranker.admit(&mut s, 0.01));
        assert!((s.distance_pips - 5.0).abs() < 1e-6);
    }

    #[test]
    fn ranking_is_best_first_and_deterministic() {
        let ranker = ProximityRanker::new(15.0);
        let mut far = signal("EUR_USD", Timeframe::H1, 1.1000, 1.0990);
        let mut near = signal("GBP_USD", Timeframe::H1, 1.2700, 1.2699);
        let mut tie_a = signal("AUD_USD", Timeframe::H4, 0.6600, 0.6595);
        let mut tie_b = signal("AUD_USD", Timeframe::H1, 0.6600, 0.6595);
        for s in [&mut far, &mut near, &mut tie_a, &mut tie_b] {
            assert!(ranker.admit(s, 0.0001));
        }

        let mut all = vec![far, tie_a, near, tie_b];
        ranker.rank(&mut all);

        assert_eq!(all[0].raw.symbol, "GBP_USD");
        // Equal scores order by symbol, then by ascending timeframe.
        assert_eq!(all[1].raw.symbol, "AUD_USD");
        assert_eq!(all[1].raw.timeframe, Timeframe::H1);
        assert_eq!(all[2].raw.timeframe, Timeframe::H4);
        assert_eq!(all[3].raw.symbol, "EUR_USD");
    }
}
