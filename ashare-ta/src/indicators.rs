use rust_decimal::{Decimal, MathematicalOps};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Simple moving average over a fixed window.
///
/// Yields `None` until the window is full.
#[derive(Debug, Clone)]
pub struct Sma {
    period: usize,
    window: VecDeque<Decimal>,
    sum: Decimal,
}

impl Sma {
    pub fn new(period: usize) -> Self {
        assert!(period > 0, "Sma period must be positive");
        Self {
            period,
            window: VecDeque::with_capacity(period + 1),
            sum: Decimal::ZERO,
        }
    }

    pub fn update(&mut self, value: Decimal) -> Option<Decimal> {
        self.window.push_back(value);
        self.sum += value;
        if self.window.len() > self.period {
            if let Some(old) = self.window.pop_front() {
                self.sum -= old;
            }
        }
        self.value()
    }

    pub fn value(&self) -> Option<Decimal> {
        (self.window.len() == self.period)
            .then(|| self.sum / Decimal::from(self.period as u64))
    }
}

/// Exponential moving average, `alpha = 2 / (period + 1)`, seeded with the first observation.
///
/// The recursion is kept in rational form, `(2·value + (period-1)·previous) / (period+1)`, so
/// no rounded `alpha` constant leaks into every step. Masked (`None`) until `period`
/// observations have arrived, matching a `min_periods = period` rolling computation.
#[derive(Debug, Clone)]
pub struct Ema {
    period: usize,
    value: Option<Decimal>,
    count: usize,
}

impl Ema {
    pub fn new(period: usize) -> Self {
        assert!(period > 0, "Ema period must be positive");
        Self {
            period,
            value: None,
            count: 0,
        }
    }

    pub fn update(&mut self, value: Decimal) -> Option<Decimal> {
        self.count += 1;
        self.value = Some(match self.value {
            Some(previous) => {
                let period = Decimal::from(self.period as u64);
                (Decimal::TWO * value + (period - Decimal::ONE) * previous)
                    / (period + Decimal::ONE)
            }
            None => value,
        });
        self.value()
    }

    pub fn value(&self) -> Option<Decimal> {
        (self.count >= self.period).then_some(self.value).flatten()
    }
}

/// Relative strength index using simple averages of the last `period` gains and losses.
#[derive(Debug, Clone)]
pub struct Rsi {
    period: usize,
    deltas: VecDeque<Decimal>,
    previous: Option<Decimal>,
}

impl Rsi {
    pub fn new(period: usize) -> Self {
        assert!(period > 0, "Rsi period must be positive");
        Self {
            period,
            deltas: VecDeque::with_capacity(period + 1),
            previous: None,
        }
    }

    pub fn update(&mut self, close: Decimal) -> Option<Decimal> {
        if let Some(previous) = self.previous {
            self.deltas.push_back(close - previous);
            if self.deltas.len() > self.period {
                self.deltas.pop_front();
            }
        }
        self.previous = Some(close);
        self.value()
    }

    pub fn value(&self) -> Option<Decimal> {
        if self.deltas.len() < self.period {
            return None;
        }

        let period = Decimal::from(self.period as u64);
        let mut gain = Decimal::ZERO;
        let mut loss = Decimal::ZERO;
        for delta in &self.deltas {
            if delta.is_sign_positive() {
                gain += delta;
            } else {
                loss -= delta;
            }
        }
        let avg_gain = gain / period;
        let avg_loss = loss / period;

        if avg_loss.is_zero() {
            return Some(Decimal::ONE_HUNDRED);
        }

        let rs = avg_gain / avg_loss;
        Some(Decimal::ONE_HUNDRED - Decimal::ONE_HUNDRED / (Decimal::ONE + rs))
    }
}

/// MACD(12, 26, 9) output.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Deserialize, Serialize)]
pub struct MacdOutput {
    pub dif: Decimal,
    pub dea: Decimal,
    pub histogram: Decimal,
}

/// Moving average convergence divergence: `dif = ema(fast) - ema(slow)`,
/// `dea = ema(signal)` of dif, `histogram = dif - dea`.
#[derive(Debug, Clone)]
pub struct Macd {
    fast: Ema,
    slow: Ema,
    signal: Ema,
}

impl Macd {
    pub fn new(fast: usize, slow: usize, signal: usize) -> Self {
        Self {
            fast: Ema::new(fast),
            slow: Ema::new(slow),
            signal: Ema::new(signal),
        }
    }

    pub fn update(&mut self, close: Decimal) -> Option<MacdOutput> {
        let fast = self.fast.update(close);
        let slow = self.slow.update(close);

        let dif = match (fast, slow) {
            (Some(fast), Some(slow)) => fast - slow,
            _ => return None,
        };
        let dea = self.signal.update(dif)?;

        Some(MacdOutput {
            dif,
            dea,
            histogram: dif - dea,
        })
    }
}

/// Bollinger band values for one step.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Deserialize, Serialize)]
pub struct BollingerBands {
    pub upper: Decimal,
    pub middle: Decimal,
    pub lower: Decimal,
    pub width: Decimal,
}

/// Bollinger bands over `period` closes with a `multiplier`-sigma envelope.
/// Uses the sample standard deviation (n - 1 divisor).
#[derive(Debug, Clone)]
pub struct Bollinger {
    period: usize,
    multiplier: Decimal,
    window: VecDeque<Decimal>,
}

impl Bollinger {
    pub fn new(period: usize, multiplier: Decimal) -> Self {
        assert!(period > 1, "Bollinger period must exceed 1");
        Self {
            period,
            multiplier,
            window: VecDeque::with_capacity(period + 1),
        }
    }

    pub fn update(&mut self, close: Decimal) -> Option<BollingerBands> {
        self.window.push_back(close);
        if self.window.len() > self.period {
            self.window.pop_front();
        }
        self.value()
    }

    pub fn value(&self) -> Option<BollingerBands> {
        if self.window.len() < self.period {
            return None;
        }

        let n = Decimal::from(self.period as u64);
        let mean = self.window.iter().sum::<Decimal>() / n;
        let variance = self
            .window
            .iter()
            .map(|value| {
                let diff = *value - mean;
                diff * diff
            })
            .sum::<Decimal>()
            / (n - Decimal::ONE);
        let std = variance.sqrt()?;

        let upper = mean + self.multiplier * std;
        let lower = mean - self.multiplier * std;
        let width = if mean.is_zero() {
            Decimal::ZERO
        } else {
            (upper - lower) / mean
        };

        Some(BollingerBands {
            upper,
            middle: mean,
            lower,
            width,
        })
    }
}

/// KDJ values for one step.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Deserialize, Serialize)]
pub struct KdjOutput {
    pub k: Decimal,
    pub d: Decimal,
    pub j: Decimal,
}

/// KDJ(period, 3, 3): `rsv = 100 * (close - low_n) / (high_n - low_n)`, K and D smoothed with
/// a 1/3 weight on the newest value, `j = 3k - 2d`.
#[derive(Debug, Clone)]
pub struct Kdj {
    period: usize,
    highs: VecDeque<Decimal>,
    lows: VecDeque<Decimal>,
    k: Option<Decimal>,
    d: Option<Decimal>,
    count: usize,
}

impl Kdj {
    const SMOOTH: Decimal = Decimal::from_parts(3, 0, 0, false, 0);

    pub fn new(period: usize) -> Self {
        assert!(period > 0, "Kdj period must be positive");
        Self {
            period,
            highs: VecDeque::with_capacity(period + 1),
            lows: VecDeque::with_capacity(period + 1),
            k: None,
            d: None,
            count: 0,
        }
    }

    pub fn update(&mut self, high: Decimal, low: Decimal, close: Decimal) -> Option<KdjOutput> {
        self.count += 1;
        self.highs.push_back(high);
        self.lows.push_back(low);
        if self.highs.len() > self.period {
            self.highs.pop_front();
            self.lows.pop_front();
        }

        let highest = *self.highs.iter().max()?;
        let lowest = *self.lows.iter().min()?;
        let range = highest - lowest;
        // Flat window: neutral RSV rather than a division by zero.
        let rsv = if range.is_zero() {
            Decimal::from(50u64)
        } else {
            Decimal::ONE_HUNDRED * (close - lowest) / range
        };

        let k = match self.k {
            Some(previous) => (Decimal::TWO * previous + rsv) / Self::SMOOTH,
            None => rsv,
        };
        let d = match self.d {
            Some(previous) => (Decimal::TWO * previous + k) / Self::SMOOTH,
            None => k,
        };
        self.k = Some(k);
        self.d = Some(d);

        self.value()
    }

    pub fn value(&self) -> Option<KdjOutput> {
        if self.count < self.period {
            return None;
        }
        let (k, d) = (self.k?, self.d?);
        Some(KdjOutput {
            k,
            d,
            j: Self::SMOOTH * k - Decimal::TWO * d,
        })
    }
}

/// Average true range: simple mean of the last `period` true ranges.
#[derive(Debug, Clone)]
pub struct Atr {
    period: usize,
    ranges: VecDeque<Decimal>,
    previous_close: Option<Decimal>,
}

impl Atr {
    pub fn new(period: usize) -> Self {
        assert!(period > 0, "Atr period must be positive");
        Self {
            period,
            ranges: VecDeque::with_capacity(period + 1),
            previous_close: None,
        }
    }

    pub fn update(&mut self, high: Decimal, low: Decimal, close: Decimal) -> Option<Decimal> {
        let mut true_range = high - low;
        if let Some(previous) = self.previous_close {
            true_range = true_range
                .max((high - previous).abs())
                .max((low - previous).abs());
        }
        self.previous_close = Some(close);

        self.ranges.push_back(true_range);
        if self.ranges.len() > self.period {
            self.ranges.pop_front();
        }
        self.value()
    }

    pub fn value(&self) -> Option<Decimal> {
        (self.ranges.len() == self.period)
            .then(|| self.ranges.iter().sum::<Decimal>() / Decimal::from(self.period as u64))
    }
}
