//! Largest-remainder apportionment on a fixed decimal grid
//!
//! Splits a total over non-negative weights so that every part sits on the
//! `10^-places` grid and the parts add up to the total exactly. Each part is
//! the exact proportional share rounded down to the grid; the units left
//! over go one each to the parts with the largest remainders, earlier parts
//! first on ties.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

/// Apportion `total` over `weights` on the `places` grid.
///
/// Returns `None` when the weights sum to zero. A negative total is
/// apportioned by magnitude and the sign applied to every part.
pub fn apportion(total: Decimal, weights: &[Decimal], places: u32) -> Option<Vec<Decimal>> {
    let weight_sum: Decimal = weights.iter().copied().sum();
    if weight_sum.is_zero() {
        return None;
    }

    let negative = total.is_sign_negative();
    let magnitude = total.abs().round_dp(places);
    let unit = Decimal::new(1, places);

    let mut parts = Vec::with_capacity(weights.len());
    let mut remainders = Vec::with_capacity(weights.len());
    for weight in weights {
        let exact = magnitude * *weight / weight_sum;
        let floored = (exact / unit).floor() * unit;
        remainders.push(exact - floored);
        parts.push(floored);
    }

    let assigned: Decimal = parts.iter().copied().sum();
    let leftover = ((magnitude - assigned) / unit)
        .round()
        .to_usize()
        .unwrap_or(0);

    let mut order: Vec<usize> = (0..weights.len()).collect();
    order.sort_by(|&a, &b| remainders[b].cmp(&remainders[a]).then(a.cmp(&b)));
    for &index in order.iter().take(leftover) {
        parts[index] += unit;
    }

    if negative {
        for part in &mut parts {
            *part = -*part;
        }
    }

    Some(parts)
}
