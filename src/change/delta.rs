/// Near-singular guard for `1 + r`
const SINGULAR_EPSILON: f64 = 1e-9;

/// USD delta implied by a 24h percent change on the current value.
///
/// With `value_now = value_24h_ago * (1 + r)` and `r = pct / 100`, the delta
/// is `value_now * r / (1 + r)`. Returns 0 for a non-positive value, a
/// non-finite `r`, or `|1 + r| < 1e-9`.
pub fn holding_delta_usd(value_usd: f64, pct: f64) -> f64 {
    if !value_usd.is_finite() || value_usd <= 0.0 {
        return 0.0;
    }
    let r = pct / 100.0;
    if !r.is_finite() || (1.0 + r).abs() < SINGULAR_EPSILON {
        return 0.0;
    }
    value_usd * r / (1.0 + r)
}

/// Percent change from a price 24h ago to now, 0 when it cannot be computed
pub fn pct_from_prices(price_now: f64, price_then: f64) -> f64 {
    if !price_now.is_finite() || !price_then.is_finite() || price_then <= 0.0 {
        return 0.0;
    }
    (price_now - price_then) / price_then * 100.0
}
