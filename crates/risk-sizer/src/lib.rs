use signal_core::{
    AssetCategory, InstrumentConfig, PositionSize, PositionSizing, RiskParams, SignalError,
};
use tracing::warn;

/// Turns a signal's entry/stop distance into a position size for a
/// given account balance and risk percentage.
///
/// Sizing is a pure calculation invoked on demand; the pipeline never
/// stores its output. Forex pairs size in standardized lots, while
/// commodities and crypto size in raw units of the instrument.
#[derive(Debug, Clone)]
pub struct RiskSizer {
    params: RiskParams,
}

impl RiskSizer {
    pub fn new(params: RiskParams) -> Self {
        Self { params }
    }

    /// Clamp a requested risk percentage to the configured bounds.
    /// Out-of-range requests fall back to the default rather than
    /// erroring so a bad query parameter cannot block sizing.
    fn effective_risk_percent(&self, requested: Option<f64>) -> f64 {
        match requested {
            Some(pct) if pct > 0.0 && pct <= self.params.max_risk_percent => pct,
            Some(pct) => {
                warn!(
                    requested = pct,
                    max = self.params.max_risk_percent,
                    "risk percent out of range, using default"
                );
                self.params.default_risk_percent
            }
            None => self.params.default_risk_percent,
        }
    }

    pub fn size(
        &self,
        instrument: &InstrumentConfig,
        account_balance: f64,
        risk_percent: Option<f64>,
        entry_price: f64,
        stop_loss: f64,
    ) -> Result<PositionSizing, SignalError> {
        if account_balance <= 0.0 {
            return Err(SignalError::Configuration(format!(
                "account balance must be positive, got {account_balance}"
            )));
        }
        let price_distance = (entry_price - stop_loss).abs();
        if price_distance <= 0.0 {
            return Err(SignalError::Configuration(
                "entry and stop loss are identical, cannot size position".into(),
            ));
        }

        let risk_percent = self.effective_risk_percent(risk_percent);
        let risk_amount = account_balance * risk_percent / 100.0;

        let (size, max_loss, position_value) = match instrument.category {
            AssetCategory::Forex => {
                let pips_distance = price_distance / instrument.pip_value;
                let raw_lots = risk_amount / (pips_distance * self.params.pip_value_per_lot);
                let lots = round_lots(raw_lots);
                let units = (lots * self.params.units_per_lot).round() as i64;
                let max_loss = pips_distance * self.params.pip_value_per_lot * lots;
                let position_value = units as f64 * entry_price;
                (
                    PositionSize::Lots {
                        lots,
                        units,
                        pip_value_per_lot: self.params.pip_value_per_lot,
                        pips_distance,
                    },
                    max_loss,
                    position_value,
                )
            }
            AssetCategory::Commodity => {
                let units = (risk_amount / price_distance).floor();
                let max_loss = units * price_distance;
                (
                    PositionSize::Units { units, price_distance },
                    max_loss,
                    units * entry_price,
                )
            }
            AssetCategory::Crypto => {
                let units = round_to(risk_amount / price_distance, 6);
                let max_loss = units * price_distance;
                (
                    PositionSize::Units { units, price_distance },
                    max_loss,
                    units * entry_price,
                )
            }
        };

        Ok(PositionSizing {
            symbol: instrument.symbol.clone(),
            category: instrument.category,
            account_balance,
            risk_percent,
            risk_amount,
            entry_price,
            stop_loss,
            size,
            max_loss,
            position_value,
        })
    }
}

/// Lot precision depends on magnitude: standard lots round to 0.01,
/// mini-lot sizes to 0.001, micro and below to 0.0001.
fn round_lots(lots: f64) -> f64 {
    if lots >= 1.0 {
        round_to(lots, 2)
    } else if lots >= 0.1 {
        round_to(lots, 3)
    } else {
        round_to(lots, 4)
    }
}

fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;
    use signal_core::Session;

    fn sizer() -> RiskSizer {
        RiskSizer::new(RiskParams::default())
    }

    fn eur_usd() -> InstrumentConfig {
        InstrumentConfig {
            symbol: "EUR_USD".into(),
            display_name: "EUR/USD".into(),
            pip_value: 0.0001,
            pip_position: 4,
            category: AssetCategory::Forex,
            preferred_session: Some(Session::London),
            baseline_spread: 0.0001,
        }
    }

    fn gold() -> InstrumentConfig {
        InstrumentConfig {
            symbol: "XAU_USD".into(),
            display_name: "Gold".into(),
            pip_value: 0.01,
            pip_position: 2,
            category: AssetCategory::Commodity,
            preferred_session: None,
            baseline_spread: 0.30,
        }
    }

    fn bitcoin() -> InstrumentConfig {
        InstrumentConfig {
            symbol: "BTC_USD".into(),
            display_name: "Bitcoin".into(),
            pip_value: 1.0,
            pip_position: 0,
            category: AssetCategory::Crypto,
            preferred_session: None,
            baseline_spread: 25.0,
        }
    }

    #[test]
    fn one_percent_of_ten_thousand_over_twenty_pips_is_half_a_lot() {
        let sizing = sizer()
            .size(&eur_usd(), 10_000.0, Some(1.0), 1.1000, 1.0980)
            .unwrap();

        assert_eq!(sizing.risk_amount, 100.0);
        match sizing.size {
            PositionSize::Lots { lots, units, pips_distance, .. } => {
                assert!((lots - 0.5).abs() < 1e-9);
                assert_eq!(units, 50_000);
                assert!((pips_distance - 20.0).abs() < 1e-6);
            }
            _ => panic!("forex must size in lots"),
        }
        // Max loss recovers the risked amount.
        assert!((sizing.max_loss - 100.0).abs() < 1e-6);
    }

    #[test]
    fn small_accounts_get_finer_lot_precision() {
        // 0.5% of 1,000 over 30 pips: 0.016666 lots, micro precision.
        let sizing = sizer()
            .size(&eur_usd(), 1_000.0, Some(0.5), 1.1000, 1.0970)
            .unwrap();

        match sizing.size {
            PositionSize::Lots { lots, .. } => assert!((lots - 0.0167).abs() < 1e-9),
            _ => panic!("forex must size in lots"),
        }
    }

    #[test]
    fn out_of_range_risk_falls_back_to_default() {
        let sizing = sizer()
            .size(&eur_usd(), 10_000.0, Some(12.0), 1.1000, 1.0980)
            .unwrap();
        assert_eq!(sizing.risk_percent, 1.0);

        let sizing = sizer()
            .size(&eur_usd(), 10_000.0, Some(-1.0), 1.1000, 1.0980)
            .unwrap();
        assert_eq!(sizing.risk_percent, 1.0);
    }

    #[test]
    fn commodity_sizes_in_whole_units() {
        // $200 at risk over a $2.50 stop distance: 80 units of gold.
        let sizing = sizer()
            .size(&gold(), 10_000.0, Some(2.0), 2_350.00, 2_347.50)
            .unwrap();

        match sizing.size {
            PositionSize::Units { units, price_distance } => {
                assert_eq!(units, 80.0);
                assert!((price_distance - 2.5).abs() < 1e-9);
            }
            _ => panic!("commodities must size in units"),
        }
        assert!((sizing.max_loss - 200.0).abs() < 1e-9);
    }

    #[test]
    fn crypto_sizes_in_fractional_units() {
        // $100 at risk over a $1,250 stop distance: 0.08 BTC.
        let sizing = sizer()
            .size(&bitcoin(), 10_000.0, Some(1.0), 65_000.0, 63_750.0)
            .unwrap();

        match sizing.size {
            PositionSize::Units { units, .. } => assert!((units - 0.08).abs() < 1e-9),
            _ => panic!("crypto must size in units"),
        }
    }

    #[test]
    fn non_positive_balance_is_a_configuration_error() {
        let err = sizer()
            .size(&eur_usd(), 0.0, None, 1.1000, 1.0980)
            .unwrap_err();
        assert!(matches!(err, SignalError::Configuration(_)));
    }

    #[test]
    fn identical_entry_and_stop_is_a_configuration_error() {
        let err = sizer()
            .size(&eur_usd(), 10_000.0, None, 1.1000, 1.1000)
            .unwrap_err();
        assert!(matches!(err, SignalError::Configuration(_)));
    }
}
