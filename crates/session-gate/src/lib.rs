pub mod sessions;

pub use sessions::active_session;

use chrono::{DateTime, Datelike, Timelike, Utc, Weekday};
use signal_core::{
    GateCheck, GateCheckKind, GateParams, GateVerdict, InstrumentConfig, Quote,
};
use tracing::debug;

/// Accepts or rejects confirmed signals based on trading-session
/// activity, volatility sufficiency, spread and news blackout windows.
///
/// Every check is veto-capable: one failure discards the signal for the
/// current cycle only. Passing checks attach their reason strings for
/// traceability.
#[derive(Debug, Clone)]
pub struct SessionVolatilityGate {
    params: GateParams,
}

impl SessionVolatilityGate {
    pub fn new(params: GateParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &GateParams {
        &self.params
    }

    /// Global news-blackout check, evaluated once per cycle. When it
    /// fails, the entire cycle publishes zero signals.
    pub fn news_check(&self, now: DateTime<Utc>) -> GateCheck {
        if !self.params.news_blackout {
            return pass(GateCheckKind::News, "news blackout disabled");
        }

        let hour = now.hour();
        let minute = now.minute();

        // 30 minutes either side of the major session opens.
        if (hour == 7 && minute >= 30) || (hour == 8 && minute <= 30) {
            return fail(GateCheckKind::News, "London session opening volatility");
        }
        if (hour == 12 && minute >= 30) || (hour == 13 && minute <= 30) {
            return fail(GateCheckKind::News, "New York session opening volatility");
        }
        // Weekly high-impact release slot (NFP).
        if now.weekday() == Weekday::Fri && hour == 13 && (30..=45).contains(&minute) {
            return fail(GateCheckKind::News, "potential NFP release window");
        }

        pass(GateCheckKind::News, "no major news events detected")
    }

    /// Run the per-signal checks in order (session, volatility,
    /// spread), prefixed by the cycle's news check. Stops at the first
    /// failure.
    pub fn evaluate(
        &self,
        instrument: &InstrumentConfig,
        atr_series: &[f64],
        quote: Option<&Quote>,
        now: DateTime<Utc>,
        news: GateCheck,
    ) -> GateVerdict {
        let mut checks = Vec::with_capacity(4);

        let news_passed = news.passed;
        checks.push(news);
        if !news_passed {
            return GateVerdict { accepted: false, checks };
        }

        for check in [
            self.session_check(instrument, now),
            self.volatility_check(instrument, atr_series),
            self.spread_check(instrument, quote),
        ] {
            let passed = check.passed;
            if !passed {
                debug!(
                    symbol = %instrument.symbol,
                    kind = ?check.kind,
                    reason = %check.reason,
                    "gate veto"
                );
            }
            checks.push(check);
            if !passed {
                return GateVerdict { accepted: false, checks };
            }
        }

        GateVerdict { accepted: true, checks }
    }

    fn session_check(&self, instrument: &InstrumentConfig, now: DateTime<Utc>) -> GateCheck {
        if !self.params.session_filtering {
            return pass(GateCheckKind::Session, "session filtering disabled");
        }

        match instrument.preferred_session {
            Some(preferred) => {
                let window = self
                    .params
                    .sessions
                    .iter()
                    .find(|w| w.session == preferred);
                match window {
                    Some(w) if sessions::window_active(w, now) => pass(
                        GateCheckKind::Session,
                        format!("{} session active", preferred.name()),
                    ),
                    Some(_) => fail(
                        GateCheckKind::Session,
                        format!("{} session inactive", preferred.name()),
                    ),
                    None => fail(
                        GateCheckKind::Session,
                        format!("{} session not configured", preferred.name()),
                    ),
                }
            }
            None => match active_session(&self.params.sessions, now) {
                Some(session) => pass(
                    GateCheckKind::Session,
                    format!("{} session active", session.name()),
                ),
                None => fail(GateCheckKind::Session, "no active session"),
            },
        }
    }

    fn volatility_check(&self, instrument: &InstrumentConfig, atr_series: &[f64]) -> GateCheck {
        if atr_series.len() < self.params.min_volatility_points {
            return fail(
                GateCheckKind::Volatility,
                "insufficient data for volatility analysis",
            );
        }

        let current = *atr_series.last().unwrap_or(&0.0);
        let threshold = (instrument.baseline_spread * self.params.atr_threshold_multiplier)
            .max(self.params.atr_floor);

        let start = atr_series.len().saturating_sub(self.params.volatility_lookback);
        let trailing = &atr_series[start..];
        let below = trailing.iter().filter(|v| **v <= current).count();
        let percentile = below as f64 / trailing.len() as f64 * 100.0;

        if current < threshold {
            fail(
                GateCheckKind::Volatility,
                format!("ATR too low: {current:.5} < {threshold:.5}"),
            )
        } else if percentile < self.params.volatility_percentile_floor {
            fail(
                GateCheckKind::Volatility,
                format!(
                    "ATR percentile too low: {percentile:.1}% < {:.0}%",
                    self.params.volatility_percentile_floor
                ),
            )
        } else {
            pass(
                GateCheckKind::Volatility,
                format!("sufficient volatility: ATR {current:.5} ({percentile:.1}th percentile)"),
            )
        }
    }

    fn spread_check(&self, instrument: &InstrumentConfig, quote: Option<&Quote>) -> GateCheck {
        let Some(quote) = quote else {
            return fail(GateCheckKind::Spread, "no live quote available");
        };

        let current = quote.spread();
        let max_spread = instrument.baseline_spread * self.params.max_spread_multiplier;

        if current <= max_spread {
            let ratio = if instrument.baseline_spread > 0.0 {
                current / instrument.baseline_spread
            } else {
                0.0
            };
            pass(
                GateCheckKind::Spread,
                format!("spread acceptable: {current:.5} <= {max_spread:.5} ({ratio:.1}x baseline)"),
            )
        } else {
            fail(
                GateCheckKind::Spread,
                format!("spread too wide: {current:.5} > {max_spread:.5}"),
            )
        }
    }
}

impl Default for SessionVolatilityGate {
    fn default() -> Self {
        Self::new(GateParams::default())
    }
}

fn pass(kind: GateCheckKind, reason: impl Into<String>) -> GateCheck {
    GateCheck {
        kind,
        passed: true,
        reason: reason.into(),
    }
}

fn fail(kind: GateCheckKind, reason: impl Into<String>) -> GateCheck {
    GateCheck {
        kind,
        passed: false,
        reason: reason.into(),
    }
}
