use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use signal_core::{LifecycleParams, SignalKey, SignalStatus, Timeframe, TradingSignal};
use tracing::{debug, info};

/// Everything the lifecycle manager owns: the active-signal map, the
/// last-publish-time map and the bounded publish history.
///
/// The state is immutable from the outside. Each cycle builds a new
/// state from the previous one, and readers only ever see a fully
/// applied cycle.
#[derive(Debug, Clone, Default)]
pub struct LifecycleState {
    active: HashMap<SignalKey, TradingSignal>,
    last_publish: HashMap<SignalKey, DateTime<Utc>>,
    history: VecDeque<TradingSignal>,
}

/// Per-cycle bookkeeping, used for logging and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleOutcome {
    pub published: usize,
    pub replaced: usize,
    pub suppressed: usize,
    pub expired: usize,
}

impl LifecycleState {
    /// Active signals ordered best-first by proximity score, with a
    /// deterministic tie-break on the key.
    pub fn active_signals(&self) -> Vec<&TradingSignal> {
        let mut signals: Vec<&TradingSignal> = self.active.values().collect();
        signals.sort_by(|a, b| {
            b.proximity_score
                .partial_cmp(&a.proximity_score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.raw.symbol.cmp(&b.raw.symbol))
                .then_with(|| a.raw.timeframe.minutes().cmp(&b.raw.timeframe.minutes()))
        });
        signals
    }

    pub fn signal(&self, key: &SignalKey) -> Option<&TradingSignal> {
        self.active.get(key)
    }

    pub fn signals_for_instrument(&self, symbol: &str) -> Vec<&TradingSignal> {
        self.active_signals()
            .into_iter()
            .filter(|s| s.raw.symbol == symbol)
            .collect()
    }

    pub fn signals_for_timeframe(&self, timeframe: Timeframe) -> Vec<&TradingSignal> {
        self.active_signals()
            .into_iter()
            .filter(|s| s.raw.timeframe == timeframe)
            .collect()
    }

    /// Strongest active signals at or above a strength floor.
    pub fn best_signals(&self, min_strength: f64) -> Vec<&TradingSignal> {
        let mut signals: Vec<&TradingSignal> = self
            .active
            .values()
            .filter(|s| s.raw.strength >= min_strength)
            .collect();
        signals.sort_by(|a, b| {
            b.raw
                .strength
                .partial_cmp(&a.raw.strength)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.raw.symbol.cmp(&b.raw.symbol))
        });
        signals
    }

    /// Most recent publishes, newest first.
    pub fn recent_history(&self, limit: usize) -> Vec<&TradingSignal> {
        self.history.iter().rev().take(limit).collect()
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    /// JSON snapshot of active signals and history for external
    /// consumers.
    pub fn export_json(&self) -> serde_json::Result<String> {
        #[derive(Serialize)]
        struct Export<'a> {
            active: Vec<&'a TradingSignal>,
            history: Vec<&'a TradingSignal>,
        }
        serde_json::to_string_pretty(&Export {
            active: self.active_signals(),
            history: self.history.iter().collect(),
        })
    }
}

/// Applies each cycle's gated and ranked candidates to the lifecycle
/// state: publish, replace, suppress, then expire.
#[derive(Debug, Clone)]
pub struct SignalLifecycleManager {
    params: LifecycleParams,
}

impl SignalLifecycleManager {
    pub fn new(params: LifecycleParams) -> Self {
        Self { params }
    }

    /// Build the next state from the previous one. The input candidates
    /// must already be gated and ranked; this only decides publication.
    pub fn apply(
        &self,
        previous: &LifecycleState,
        candidates: Vec<TradingSignal>,
        now: DateTime<Utc>,
    ) -> (LifecycleState, CycleOutcome) {
        let mut state = previous.clone();
        let mut outcome = CycleOutcome::default();
        let dedup_interval = Duration::minutes(self.params.dedup_interval_minutes);

        for candidate in candidates {
            let key = candidate.key();

            // The minimum publish interval dominates every replacement
            // rule, including a direction change.
            if let Some(last) = state.last_publish.get(&key) {
                if now - *last < dedup_interval {
                    debug!(key = %key, "within dedup interval, suppressing");
                    outcome.suppressed += 1;
                    continue;
                }
            }

            match state.active.get(&key) {
                None => {
                    info!(
                        key = %key,
                        direction = candidate.raw.direction.label(),
                        strength = candidate.raw.strength,
                        "publishing new signal"
                    );
                    self.publish(&mut state, key, candidate, now);
                    outcome.published += 1;
                }
                Some(existing) => {
                    let flipped = existing.raw.direction != candidate.raw.direction;
                    let stronger = candidate.raw.strength
                        > existing.raw.strength + self.params.strength_replace_delta;
                    if flipped || stronger {
                        info!(
                            key = %key,
                            direction = candidate.raw.direction.label(),
                            reason = if flipped { "direction changed" } else { "strength improved" },
                            "replacing active signal"
                        );
                        let old_id = existing.id.clone();
                        close_in_history(&mut state.history, &old_id, SignalStatus::Replaced);
                        self.publish(&mut state, key, candidate, now);
                        outcome.replaced += 1;
                    } else {
                        debug!(key = %key, "duplicate signal, suppressing");
                        outcome.suppressed += 1;
                    }
                }
            }
        }

        outcome.expired = self.expire(&mut state, now);
        (state, outcome)
    }

    fn publish(
        &self,
        state: &mut LifecycleState,
        key: SignalKey,
        signal: TradingSignal,
        now: DateTime<Utc>,
    ) {
        state.last_publish.insert(key.clone(), now);
        state.history.push_back(signal.clone());
        while state.history.len() > self.params.history_cap {
            state.history.pop_front();
        }
        state.active.insert(key, signal);
    }

    /// Evict active signals older than the TTL, measured from creation
    /// time rather than last update.
    fn expire(&self, state: &mut LifecycleState, now: DateTime<Utc>) -> usize {
        let ttl = Duration::hours(self.params.signal_ttl_hours);
        let expired: Vec<SignalKey> = state
            .active
            .iter()
            .filter(|(_, s)| now - s.created_at >= ttl)
            .map(|(k, _)| k.clone())
            .collect();

        for key in &expired {
            if let Some(signal) = state.active.remove(key) {
                info!(key = %key, "signal expired");
                close_in_history(&mut state.history, &signal.id, SignalStatus::Expired);
            }
        }
        expired.len()
    }
}

/// Record a signal's terminal status on its history entry, if the entry
/// has not already been displaced by the cap.
fn close_in_history(history: &mut VecDeque<TradingSignal>, id: &str, status: SignalStatus) {
    if let Some(entry) = history.iter_mut().rev().find(|s| s.id == id) {
        entry.status = status;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use signal_core::{
        ConfirmationResult, Direction, GateVerdict, IndicatorValues, RawSignal, Timeframe,
    };

    fn manager() -> SignalLifecycleManager {
        SignalLifecycleManager::new(LifecycleParams::default())
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 4, 10, 0, 0).unwrap()
    }

    fn candidate(
        symbol: &str,
        timeframe: Timeframe,
        direction: Direction,
        strength: f64,
        created_at: DateTime<Utc>,
    ) -> TradingSignal {
        let raw = RawSignal {
            symbol: symbol.into(),
            timeframe,
            direction,
            strength,
            reasons: vec![],
            entry_price: 1.1000,
            stop_loss: 1.0980,
            take_profit_1: 1.1020,
            take_profit_2: 1.1040,
            take_profit_3: 1.1060,
            risk_reward_1: 1.0,
            risk_reward_2: 2.0,
            risk_reward_3: 3.0,
            timestamp: created_at,
            current_price: 1.1000,
            indicators: IndicatorValues {
                rsi: 50.0,
                macd: 0.0,
                macd_signal: 0.0,
                macd_hist: 0.0,
                sma_fast: 1.1,
                sma_slow: 1.1,
                atr: 0.001,
            },
        };
        TradingSignal {
            id: format!("{}-{}-{}", symbol, timeframe.code(), created_at.timestamp()),
            raw,
            confirmation: ConfirmationResult::unavailable(),
            gate: GateVerdict { accepted: true, checks: vec![] },
            distance_pips: 0.0,
            proximity_score: 1.0,
            status: signal_core::SignalStatus::Active,
            created_at,
        }
    }

    #[test]
    fn first_publish_creates_active_entry() {
        let (state, outcome) = manager().apply(
            &LifecycleState::default(),
            vec![candidate("EUR_USD", Timeframe::H1, Direction::Buy, 0.5, t0())],
            t0(),
        );

        assert_eq!(outcome.published, 1);
        assert_eq!(state.active_count(), 1);
        assert_eq!(state.history_len(), 1);
    }

    #[test]
    fn duplicate_within_interval_is_suppressed() {
        let mgr = manager();
        let (state, _) = mgr.apply(
            &LifecycleState::default(),
            vec![candidate("EUR_USD", Timeframe::H1, Direction::Buy, 0.5, t0())],
            t0(),
        );

        // Ten minutes later, same direction, much stronger: still
        // suppressed because the interval has not elapsed.
        let later = t0() + Duration::minutes(10);
        let (next, outcome) = mgr.apply(
            &state,
            vec![candidate("EUR_USD", Timeframe::H1, Direction::Buy, 0.9, later)],
            later,
        );

        assert_eq!(outcome.suppressed, 1);
        assert_eq!(outcome.published + outcome.replaced, 0);
        let key = SignalKey { symbol: "EUR_USD".into(), timeframe: Timeframe::H1 };
        assert_eq!(next.signal(&key).unwrap().raw.strength, 0.5);
    }

    #[test]
    fn interval_dominates_direction_change() {
        let mgr = manager();
        let (state, _) = mgr.apply(
            &LifecycleState::default(),
            vec![candidate("EUR_USD", Timeframe::H1, Direction::Buy, 0.5, t0())],
            t0(),
        );

        let later = t0() + Duration::minutes(5);
        let (next, outcome) = mgr.apply(
            &state,
            vec![candidate("EUR_USD", Timeframe::H1, Direction::Sell, 0.8, later)],
            later,
        );

        assert_eq!(outcome.suppressed, 1);
        let key = SignalKey { symbol: "EUR_USD".into(), timeframe: Timeframe::H1 };
        assert_eq!(next.signal(&key).unwrap().raw.direction, Direction::Buy);
    }

    #[test]
    fn direction_change_replaces_after_interval() {
        let mgr = manager();
        let (state, _) = mgr.apply(
            &LifecycleState::default(),
            vec![candidate("EUR_USD", Timeframe::H1, Direction::Buy, 0.5, t0())],
            t0(),
        );

        let later = t0() + Duration::minutes(20);
        let (next, outcome) = mgr.apply(
            &state,
            vec![candidate("EUR_USD", Timeframe::H1, Direction::Sell, 0.5, later)],
            later,
        );

        assert_eq!(outcome.replaced, 1);
        let key = SignalKey { symbol: "EUR_USD".into(), timeframe: Timeframe::H1 };
        assert_eq!(next.signal(&key).unwrap().raw.direction, Direction::Sell);
        // The replaced publish keeps its history entry, marked replaced.
        let replaced: Vec<_> = next
            .recent_history(10)
            .into_iter()
            .filter(|s| s.status == signal_core::SignalStatus::Replaced)
            .collect();
        assert_eq!(replaced.len(), 1);
    }

    #[test]
    fn small_strength_gain_is_a_duplicate() {
        let mgr = manager();
        let (state, _) = mgr.apply(
            &LifecycleState::default(),
            vec![candidate("EUR_USD", Timeframe::H1, Direction::Buy, 0.5, t0())],
            t0(),
        );

        // +0.20 exactly does not qualify; the rule requires more.
        let later = t0() + Duration::minutes(20);
        let (_, outcome) = mgr.apply(
            &state,
            vec![candidate("EUR_USD", Timeframe::H1, Direction::Buy, 0.7, later)],
            later,
        );
        assert_eq!(outcome.suppressed, 1);

        let (_, outcome) = mgr.apply(
            &state,
            vec![candidate("EUR_USD", Timeframe::H1, Direction::Buy, 0.71, later)],
            later,
        );
        assert_eq!(outcome.replaced, 1);
    }

    #[test]
    fn unchanged_input_is_idempotent() {
        let mgr = manager();
        let signal = candidate("EUR_USD", Timeframe::H1, Direction::Buy, 0.5, t0());
        let (state, _) = mgr.apply(&LifecycleState::default(), vec![signal.clone()], t0());

        // Re-running the same cycle output changes nothing.
        let (next, outcome) = mgr.apply(&state, vec![signal], t0());
        assert_eq!(outcome, CycleOutcome { suppressed: 1, ..CycleOutcome::default() });
        assert_eq!(next.active_count(), 1);
        assert_eq!(next.history_len(), 1);
    }

    #[test]
    fn signals_expire_after_ttl_by_creation_time() {
        let mgr = manager();
        let (state, _) = mgr.apply(
            &LifecycleState::default(),
            vec![candidate("EUR_USD", Timeframe::H1, Direction::Buy, 0.5, t0())],
            t0(),
        );

        let almost = t0() + Duration::hours(23);
        let (state, outcome) = mgr.apply(&state, vec![], almost);
        assert_eq!(outcome.expired, 0);
        assert_eq!(state.active_count(), 1);

        let past_ttl = t0() + Duration::hours(24);
        let (state, outcome) = mgr.apply(&state, vec![], past_ttl);
        assert_eq!(outcome.expired, 1);
        assert_eq!(state.active_count(), 0);
        assert_eq!(
            state.recent_history(1)[0].status,
            signal_core::SignalStatus::Expired
        );
    }

    #[test]
    fn history_is_capped_oldest_first() {
        let mgr = SignalLifecycleManager::new(LifecycleParams {
            history_cap: 3,
            dedup_interval_minutes: 0,
            ..LifecycleParams::default()
        });

        let mut state = LifecycleState::default();
        for (i, symbol) in ["EUR_USD", "GBP_USD", "AUD_USD", "USD_CAD"].iter().enumerate() {
            let at = t0() + Duration::minutes(i as i64);
            let (next, _) = mgr.apply(
                &state,
                vec![candidate(symbol, Timeframe::H1, Direction::Buy, 0.5, at)],
                at,
            );
            state = next;
        }

        assert_eq!(state.history_len(), 3);
        let symbols: Vec<&str> = state
            .recent_history(10)
            .iter()
            .map(|s| s.raw.symbol.as_str())
            .collect();
        // Newest first; the oldest publish fell off the buffer.
        assert_eq!(symbols, vec!["USD_CAD", "AUD_USD", "GBP_USD"]);
    }

    #[test]
    fn independent_keys_do_not_interfere() {
        let mgr = manager();
        let (state, outcome) = mgr.apply(
            &LifecycleState::default(),
            vec![
                candidate("EUR_USD", Timeframe::H1, Direction::Buy, 0.5, t0()),
                candidate("EUR_USD", Timeframe::H4, Direction::Sell, 0.6, t0()),
                candidate("GBP_USD", Timeframe::H1, Direction::Buy, 0.7, t0()),
            ],
            t0(),
        );

        assert_eq!(outcome.published, 3);
        assert_eq!(state.signals_for_instrument("EUR_USD").len(), 2);
        assert_eq!(state.signals_for_timeframe(Timeframe::H1).len(), 2);
    }

    #[test]
    fn best_signals_filters_and_sorts_by_strength() {
        let mgr = manager();
        let (state, _) = mgr.apply(
            &LifecycleState::default(),
            vec![
                candidate("EUR_USD", Timeframe::H1, Direction::Buy, 0.4, t0()),
                candidate("GBP_USD", Timeframe::H1, Direction::Buy, 0.9, t0()),
                candidate("AUD_USD", Timeframe::H1, Direction::Sell, 0.7, t0()),
            ],
            t0(),
        );

        let best = state.best_signals(0.6);
        assert_eq!(best.len(), 2);
        assert_eq!(best[0].raw.symbol, "GBP_USD");
        assert_eq!(best[1].raw.symbol, "AUD_USD");
    }

    #[test]
    fn export_json_round_trips() {
        let mgr = manager();
        let (state, _) = mgr.apply(
            &LifecycleState::default(),
            vec![candidate("EUR_USD", Timeframe::H1, Direction::Buy, 0.5, t0())],
            t0(),
        );

        let json = state.export_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["active"][0]["symbol"], "EUR_USD");
        assert_eq!(value["history"].as_array().unwrap().len(), 1);
    }
}
