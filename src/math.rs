// src/math.rs
use anyhow::Result;

use crate::shared::types::Balance;

pub const SECONDS_PER_DAY: u64 = 24 * 60 * 60;
pub const SECONDS_PER_YEAR: f64 = 365.0 * 24.0 * 60.0 * 60.0;
pub const MILLIS_PER_YEAR: f64 = SECONDS_PER_YEAR * 1000.0;

/// Block roughly `days` ago, assuming a fixed block time
pub fn reference_block(current: u64, block_time_secs: u64, days: u64) -> u64 {
    let blocks_per_day = SECONDS_PER_DAY / block_time_secs.max(1);
    current.saturating_sub(blocks_per_day * days)
}

/// Compounded annual growth implied by a rate moving from `begin` to `current`
/// over `elapsed` units, where a year is `units_per_year` units.
pub fn annualized_growth(begin_rate: f64, current_rate: f64, elapsed: f64, units_per_year: f64) -> Result<f64> {
    if begin_rate <= 0.0 || current_rate <= 0.0 {
        return Err(anyhow::anyhow!(
            "Invalid exchange rates: begin={}, current={}",
            begin_rate,
            current_rate
        ));
    }
    if elapsed <= 0.0 {
        return Err(anyhow::anyhow!("Invalid elapsed time: {}", elapsed));
    }

    Ok((current_rate / begin_rate).powf(units_per_year / elapsed) - 1.0)
}

/// APY from two rate samples with timestamps in seconds
pub fn annualized_yield(begin_rate: f64, current_rate: f64, elapsed_secs: f64) -> Result<f64> {
    annualized_growth(begin_rate, current_rate, elapsed_secs, SECONDS_PER_YEAR)
}

/// APY from two rate samples with chain timestamps in milliseconds
pub fn annualized_yield_ms(begin_rate: f64, current_rate: f64, begin_ms: u64, current_ms: u64) -> Result<f64> {
    let elapsed = current_ms.saturating_sub(begin_ms) as f64;
    annualized_growth(begin_rate, current_rate, elapsed, MILLIS_PER_YEAR)
}

/// Origin token amount worth `amount` of a derivative token at `exchange_rate`
pub fn convert_derivative_to_origin(
    amount: Balance,
    exchange_rate: f64,
    derivative_decimals: u8,
    origin_decimals: u8,
) -> f64 {
    let scale = i32::from(origin_decimals) - i32::from(derivative_decimals);
    amount as f64 * exchange_rate * 10_f64.powi(scale)
}

/// Slippage bound: `percent` of `value`, floored
pub fn min_output_amount(value: f64, percent: f64) -> Balance {
    let weighted = (value * percent).floor();
    if weighted.is_finite() && weighted > 0.0 {
        weighted as Balance
    } else {
        0
    }
}

/// Amount a cross-chain step must move: what is missing locally plus the fee
pub fn xcm_transfer_amount(requested: Balance, local_balance: Balance, xcm_fee: Balance) -> Balance {
    requested.saturating_sub(local_balance).saturating_add(xcm_fee)
}

/// Fixed-point chain value to float
pub fn from_fixed_point(raw: f64, decimals: u32) -> f64 {
    raw / 10_f64.powi(decimals as i32)
}
