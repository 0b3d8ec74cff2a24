use crate::portfolio::EquitySample;
use rust_decimal::{prelude::ToPrimitive, Decimal};
use serde::{Deserialize, Serialize};

/// Configuration for generating a [`TradingSummary`].
#[derive(Copy, Clone, PartialEq, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct SummaryConfig {
    pub trading_days_per_year: u32,
    /// Annual risk-free rate used by the Sharpe ratio.
    pub risk_free_return: f64,
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            trading_days_per_year: 252,
            risk_free_return: 0.0,
        }
    }
}

/// Key performance metrics of a completed backtest.
#[derive(Copy, Clone, PartialEq, Debug, Default, Deserialize, Serialize)]
pub struct TradingSummary {
    pub initial_capital: f64,
    pub final_value: f64,
    pub total_return: f64,
    pub annualized_return: f64,
    /// Annualized standard deviation of per-step returns.
    pub volatility: f64,
    pub sharpe_ratio: f64,
    /// Worst peak-to-trough drawdown, as a negative fraction.
    pub max_drawdown: f64,
    pub total_trades: usize,
}

impl TradingSummary {
    /// Generate the summary from the portfolio's equity curve and per-step returns.
    pub fn generate(
        config: SummaryConfig,
        initial_capital: Decimal,
        equity_curve: &[EquitySample],
        returns: &[f64],
        total_trades: usize,
    ) -> Self {
        let initial_capital = initial_capital.to_f64().unwrap_or(0.0);
        let final_value = equity_curve
            .last()
            .and_then(|sample| sample.total_value.to_f64())
            .unwrap_or(initial_capital);

        let total_return = if initial_capital > 0.0 {
            (final_value - initial_capital) / initial_capital
        } else {
            0.0
        };

        let periods_per_year = f64::from(config.trading_days_per_year);
        let annualized_return = if returns.is_empty() {
            0.0
        } else {
            (1.0 + total_return).powf(periods_per_year / returns.len() as f64) - 1.0
        };

        let (volatility, sharpe_ratio) = match dispersion(returns) {
            Some((mean, std)) if std > 0.0 => {
                let annual_factor = periods_per_year.sqrt();
                let excess = mean - config.risk_free_return / periods_per_year;
                (std * annual_factor, excess / std * annual_factor)
            }
            _ => (0.0, 0.0),
        };

        Self {
            initial_capital,
            final_value,
            total_return,
            annualized_return,
            volatility,
            sharpe_ratio,
            max_drawdown: max_drawdown(equity_curve),
            total_trades,
        }
    }
}

/// Mean and sample standard deviation of a return series.
fn dispersion(returns: &[f64]) -> Option<(f64, f64)> {
    if returns.len() < 2 {
        return None;
    }
    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;
    let variance = returns
        .iter()
        .map(|value| (value - mean).powi(2))
        .sum::<f64>()
        / (n - 1.0);
    Some((mean, variance.sqrt()))
}

/// Worst drawdown over the curve: `min((value - running_peak) / running_peak)`.
fn max_drawdown(equity_curve: &[EquitySample]) -> f64 {
    let mut peak = f64::MIN;
    let mut worst = 0.0_f64;
    for sample in equity_curve {
        let value = sample.total_value.to_f64().unwrap_or(0.0);
        peak = peak.max(value);
        if peak > 0.0 {
            worst = worst.min((value - peak) / peak);
        }
    }
    worst
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Days, Utc};
    use rust_decimal_macros::dec;

    fn curve(values: &[Decimal]) -> Vec<EquitySample> {
        let base = Utc::now();
        values
            .iter()
            .enumerate()
            .map(|(index, value)| EquitySample {
                time: base
                    .checked_add_days(Days::new(index as u64))
                    .unwrap(),
                total_value: *value,
                cash: *value,
                holdings: Decimal::ZERO,
            })
            .collect()
    }

    #[test]
    fn total_return_from_first_and_last_samples() {
        let curve = curve(&[dec!(1000000), dec!(1050000), dec!(1100000)]);
        let summary = TradingSummary::generate(
            SummaryConfig::default(),
            dec!(1000000),
            &curve,
            &[0.05, 0.047_6],
            4,
        );
        assert!((summary.total_return - 0.10).abs() < 1e-9);
        assert_eq!(summary.total_trades, 4);
        assert!(summary.volatility > 0.0);
    }

    #[test]
    fn drawdown_tracks_the_running_peak() {
        let curve = curve(&[
            dec!(100),
            dec!(120),
            dec!(90), // -25% from the 120 peak
            dec!(110),
        ]);
        let summary =
            TradingSummary::generate(SummaryConfig::default(), dec!(100), &curve, &[], 0);
        assert!((summary.max_drawdown + 0.25).abs() < 1e-9);
    }

    #[test]
    fn empty_curve_degrades_to_zeros() {
        let summary =
            TradingSummary::generate(SummaryConfig::default(), dec!(1000), &[], &[], 0);
        assert_eq!(summary.total_return, 0.0);
        assert_eq!(summary.max_drawdown, 0.0);
    }
}
