use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use indicator_engine::{last_two_complete, latest_complete, trailing_atr, IndicatorEngine};
use multi_timeframe::MultiTimeframeConfirmer;
use proximity_ranker::ProximityRanker;
use risk_sizer::RiskSizer;
use session_gate::SessionVolatilityGate;
use signal_core::{
    Candle, CandleSource, EngineConfig, PositionSizing, Quote, QuoteSource, SignalError,
    SignalStatus, Timeframe, TradingSignal,
};
use signal_evaluator::SignalEvaluator;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::lifecycle::{CycleOutcome, LifecycleState, SignalLifecycleManager};

/// Summary of one pipeline cycle, for logging and tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct CycleReport {
    /// (instrument, timeframe) keys that had enough data to evaluate.
    pub keys_evaluated: usize,
    /// Candidates that survived evaluation, confirmation, gate and
    /// proximity filtering.
    pub candidates: usize,
    /// True when the global news blackout suppressed the whole cycle.
    pub news_blackout: bool,
    pub outcome: CycleOutcome,
}

/// Drives the full signal pipeline: concurrent fetch, indicator
/// enrichment, evaluation, confirmation, gating, ranking and lifecycle
/// application, on a fixed cycle interval.
///
/// All mutable state lives in the lifecycle snapshot behind an
/// `Arc` swap, so external readers always observe a complete cycle.
pub struct SignalPipeline {
    config: EngineConfig,
    candles: Arc<dyn CandleSource>,
    quotes: Arc<dyn QuoteSource>,
    engine: IndicatorEngine,
    evaluator: SignalEvaluator,
    confirmer: MultiTimeframeConfirmer,
    gate: SessionVolatilityGate,
    ranker: ProximityRanker,
    sizer: RiskSizer,
    lifecycle: SignalLifecycleManager,
    state: RwLock<Arc<LifecycleState>>,
}

impl SignalPipeline {
    pub fn new(
        config: EngineConfig,
        candles: Arc<dyn CandleSource>,
        quotes: Arc<dyn QuoteSource>,
    ) -> Self {
        let engine = IndicatorEngine::new(config.indicators.clone());
        let evaluator = SignalEvaluator::new(config.evaluator.clone());
        let confirmer = MultiTimeframeConfirmer::new(
            &config.timeframes,
            config.pipeline.confirmation_threshold_pct,
        );
        let gate = SessionVolatilityGate::new(config.gate.clone());
        let ranker = ProximityRanker::new(config.pipeline.proximity_threshold_pips);
        let sizer = RiskSizer::new(config.risk.clone());
        let lifecycle = SignalLifecycleManager::new(config.lifecycle.clone());

        Self {
            config,
            candles,
            quotes,
            engine,
            evaluator,
            confirmer,
            gate,
            ranker,
            sizer,
            lifecycle,
            state: RwLock::new(Arc::new(LifecycleState::default())),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Run cycles forever on the configured interval. The next cycle
    /// never starts before the previous one finishes.
    pub async fn run(&self) -> anyhow::Result<()> {
        let mut ticker = tokio::time::interval(StdDuration::from_secs(
            self.config.pipeline.cycle_interval_secs,
        ));
        info!(
            instruments = self.config.instruments.len(),
            interval_secs = self.config.pipeline.cycle_interval_secs,
            "signal pipeline started"
        );
        loop {
            ticker.tick().await;
            let report = self.run_cycle(Utc::now()).await;
            info!(
                keys = report.keys_evaluated,
                candidates = report.candidates,
                published = report.outcome.published,
                replaced = report.outcome.replaced,
                suppressed = report.outcome.suppressed,
                expired = report.outcome.expired,
                "cycle complete"
            );
        }
    }

    /// One full pipeline cycle at the given instant. Failures on
    /// individual (instrument, timeframe) keys are isolated; only the
    /// news blackout suppresses the entire cycle's output.
    pub async fn run_cycle(&self, now: DateTime<Utc>) -> CycleReport {
        let mut report = CycleReport::default();

        let news = self.gate.news_check(now);
        if !news.passed {
            warn!(reason = %news.reason, "news blackout, skipping cycle output");
            report.news_blackout = true;
            // Expiry still runs so stale signals do not outlive a
            // blackout window.
            report.outcome = self.apply_lifecycle(Vec::new(), now).await;
            return report;
        }

        let timeframes = self.required_timeframes();
        let (candles, quotes) = self.fetch_snapshot(&timeframes).await;

        // Enrich every fetched window; a degraded computation drops
        // only its own key.
        let mut snapshots = HashMap::new();
        for ((symbol, timeframe), window) in &candles {
            match self.engine.enrich(window) {
                Ok(series) => {
                    snapshots.insert((symbol.clone(), *timeframe), series);
                }
                Err(e) => {
                    debug!(symbol = %symbol, timeframe = timeframe.code(), error = %e, "skipping key");
                }
            }
        }

        let mut candidates = Vec::new();
        for instrument in &self.config.instruments {
            let quote = quotes.get(&instrument.symbol);

            let latest_by_timeframe: HashMap<Timeframe, indicator_engine::IndicatorSnapshot> =
                timeframes
                    .iter()
                    .filter_map(|&tf| {
                        let series = snapshots.get(&(instrument.symbol.clone(), tf))?;
                        latest_complete(series).map(|s| (tf, s.clone()))
                    })
                    .collect();

            for &timeframe in &self.config.scan_timeframes {
                let Some(series) = snapshots.get(&(instrument.symbol.clone(), timeframe)) else {
                    continue;
                };
                let Some((previous, current)) = last_two_complete(series) else {
                    continue;
                };
                report.keys_evaluated += 1;

                let Some(mut raw) =
                    self.evaluator.evaluate(previous, current, instrument, timeframe)
                else {
                    continue;
                };
                if let Some(q) = quote {
                    raw.current_price = q.mid();
                }

                let confirmation = if self.config.pipeline.mtf_confirmation {
                    let result = self.confirmer.confirm(&raw, &latest_by_timeframe);
                    if !result.confirmed {
                        debug!(
                            symbol = %raw.symbol,
                            timeframe = timeframe.code(),
                            percentage = result.percentage,
                            "higher timeframes disagree, dropping signal"
                        );
                        continue;
                    }
                    result
                } else {
                    signal_core::ConfirmationResult::unavailable()
                };

                let atr_series = trailing_atr(series, self.config.gate.volatility_lookback);
                let verdict =
                    self.gate
                        .evaluate(instrument, &atr_series, quote, now, news.clone());
                if !verdict.accepted {
                    continue;
                }

                let mut signal = TradingSignal {
                    id: format!("{}-{}-{}", raw.symbol, timeframe.code(), now.timestamp()),
                    raw,
                    confirmation,
                    gate: verdict,
                    distance_pips: 0.0,
                    proximity_score: 0.0,
                    status: SignalStatus::Active,
                    created_at: now,
                };
                if self.ranker.admit(&mut signal, instrument.pip_value) {
                    candidates.push(signal);
                }
            }
        }

        self.ranker.rank(&mut candidates);
        report.candidates = candidates.len();
        report.outcome = self.apply_lifecycle(candidates, now).await;
        report
    }

    /// Scan timeframes plus every timeframe needed to confirm them.
    fn required_timeframes(&self) -> Vec<Timeframe> {
        let mut timeframes = self.config.scan_timeframes.clone();
        for tf in &self.config.scan_timeframes {
            for &higher in tf.confirmers() {
                if !timeframes.contains(&higher) {
                    timeframes.push(higher);
                }
            }
        }
        timeframes
    }

    /// Fetch all candle windows and quotes for the cycle concurrently.
    /// A timeout or error on one request only leaves that key absent.
    async fn fetch_snapshot(
        &self,
        timeframes: &[Timeframe],
    ) -> (
        HashMap<(String, Timeframe), Vec<Candle>>,
        HashMap<String, Quote>,
    ) {
        let timeout = StdDuration::from_secs(self.config.pipeline.fetch_timeout_secs);
        let count = self.config.pipeline.candle_count;

        let candle_futures: Vec<_> = self
            .config
            .instruments
            .iter()
            .flat_map(|instrument| {
                timeframes.iter().map(move |&timeframe| {
                    let source = Arc::clone(&self.candles);
                    let symbol = instrument.symbol.clone();
                    async move {
                        match tokio::time::timeout(
                            timeout,
                            source.candles(&symbol, timeframe, count),
                        )
                        .await
                        {
                            Ok(Ok(window)) if !window.is_empty() => {
                                Some(((symbol, timeframe), window))
                            }
                            Ok(Ok(_)) => {
                                debug!(symbol = %symbol, timeframe = timeframe.code(), "no candles");
                                None
                            }
                            Ok(Err(e)) => {
                                debug!(symbol = %symbol, timeframe = timeframe.code(), error = %e, "candle fetch failed");
                                None
                            }
                            Err(_) => {
                                debug!(symbol = %symbol, timeframe = timeframe.code(), "candle fetch timed out");
                                None
                            }
                        }
                    }
                })
            })
            .collect();

        let quote_futures: Vec<_> = self
            .config
            .instruments
            .iter()
            .map(|instrument| {
                let source = Arc::clone(&self.quotes);
                let symbol = instrument.symbol.clone();
                async move {
                    match tokio::time::timeout(timeout, source.quote(&symbol)).await {
                        Ok(Ok(Some(quote))) => Some((symbol, quote)),
                        Ok(Ok(None)) => None,
                        Ok(Err(e)) => {
                            debug!(symbol = %symbol, error = %e, "quote fetch failed");
                            None
                        }
                        Err(_) => {
                            debug!(symbol = %symbol, "quote fetch timed out");
                            None
                        }
                    }
                }
            })
            .collect();

        let (candle_results, quote_results) =
            tokio::join!(join_all(candle_futures), join_all(quote_futures));

        (
            candle_results.into_iter().flatten().collect(),
            quote_results.into_iter().flatten().collect(),
        )
    }

    async fn apply_lifecycle(
        &self,
        candidates: Vec<TradingSignal>,
        now: DateTime<Utc>,
    ) -> CycleOutcome {
        let mut guard = self.state.write().await;
        let (next, outcome) = self.lifecycle.apply(&guard, candidates, now);
        *guard = Arc::new(next);
        outcome
    }

    /// Immutable snapshot of the lifecycle state for external readers.
    pub async fn snapshot(&self) -> Arc<LifecycleState> {
        Arc::clone(&*self.state.read().await)
    }

    pub async fn active_signals(&self) -> Vec<TradingSignal> {
        let state = self.snapshot().await;
        state.active_signals().into_iter().cloned().collect()
    }

    pub async fn signals_for_instrument(&self, symbol: &str) -> Vec<TradingSignal> {
        let state = self.snapshot().await;
        state
            .signals_for_instrument(symbol)
            .into_iter()
            .cloned()
            .collect()
    }

    pub async fn signals_for_timeframe(&self, timeframe: Timeframe) -> Vec<TradingSignal> {
        let state = self.snapshot().await;
        state
            .signals_for_timeframe(timeframe)
            .into_iter()
            .cloned()
            .collect()
    }

    pub async fn recent_history(&self, limit: usize) -> Vec<TradingSignal> {
        let state = self.snapshot().await;
        state.recent_history(limit).into_iter().cloned().collect()
    }

    pub async fn best_signals(&self, min_strength: f64) -> Vec<TradingSignal> {
        let state = self.snapshot().await;
        state.best_signals(min_strength).into_iter().cloned().collect()
    }

    pub async fn export_json(&self) -> serde_json::Result<String> {
        self.snapshot().await.export_json()
    }

    /// Position sizing for a published signal, computed on demand and
    /// never stored.
    pub fn size_position(
        &self,
        signal: &TradingSignal,
        account_balance: f64,
        risk_percent: Option<f64>,
    ) -> Result<PositionSizing, SignalError> {
        let instrument = self.config.instrument(&signal.raw.symbol).ok_or_else(|| {
            SignalError::Configuration(format!("unknown instrument {}", signal.raw.symbol))
        })?;
        self.sizer.size(
            instrument,
            account_balance,
            risk_percent,
            signal.raw.entry_price,
            signal.raw.stop_loss,
        )
    }
}
