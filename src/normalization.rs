// src/normalization.rs
//
// Raw on-chain amounts to human units: decimal heuristics, exact scaling and K/M display.

use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;

/// Decimal places assumed for a denom when no registry data is available.
///
/// Micro-unit denoms (`uosmo`, `factory/.../uatom`) use 6, ether-style units (`...-wei`, `ETH`)
/// use 18, everything else falls back to 6.
pub fn decimals_for_denom(denom: &str) -> u32 {
    if denom.starts_with('u') || denom.contains("/u") {
        6
    } else if denom.contains("wei") || denom.contains("ETH") {
        18
    } else {
        6
    }
}

/// 10^n as u128, `None` past u128 range.
#[inline]
pub fn pow10(n: u32) -> Option<u128> {
    10u128.checked_pow(n)
}

/// Scales an integer amount string by 10^decimals without going through floating point.
///
/// Returns `None` for non-integer input or amounts outside `Decimal` range.
pub fn scale_amount(raw: &str, decimals: u32) -> Option<Decimal> {
    let amount: u128 = raw.trim().parse().ok()?;
    let divisor = pow10(decimals)?;
    let whole = Decimal::from_u128(amount / divisor)?;
    let frac = Decimal::from_u128(amount % divisor)?;
    let frac = frac.checked_div(Decimal::from_u128(divisor)?)?;
    whole.checked_add(frac)
}

/// Human display of a raw amount: whole units, collapsing to `K`/`M` with two decimals above
/// 1,000 and 1,000,000 whole units.
pub fn format_amount(raw: &str, denom: &str) -> String {
    let amount: u128 = match raw.trim() {
        "" => 0,
        s => match s.parse() {
            Ok(v) => v,
            Err(_) => return raw.to_string(),
        },
    };
    let divisor = pow10(decimals_for_denom(denom)).unwrap_or(1);
    let whole = amount / divisor;

    if whole > 1_000_000 {
        format!("{:.2}M", whole as f64 / 1_000_000.0)
    } else if whole > 1_000 {
        format!("{:.2}K", whole as f64 / 1_000.0)
    } else {
        whole.to_string()
    }
}

/// Fee fraction string (`"0.002000000000000000"`) as a percentage with two decimals.
pub fn format_fee_percent(fee: &str) -> Option<String> {
    let fee: Decimal = fee.trim().parse().ok()?;
    let mut pct = (fee * Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(2, rust_decimal::RoundingStrategy::MidpointAwayFromZero);
    pct.rescale(2);
    Some(format!("{}%", pct))
}
