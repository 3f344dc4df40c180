//! Monthly breakdown of yearly projections
//!
//! Revenue follows the seasonal curve from the policy; expenses are spread
//! evenly. Whole rupees are allocated by largest remainder, so the months
//! always add up to the year exactly and never flip sign.

use chrono::Month;

use crate::models::{MonthRecord, YearRecord};
use crate::scoring::Seasonality;

/// Split one year into twelve months
pub fn expand_year(year: &YearRecord, seasonality: &Seasonality) -> Vec<MonthRecord> {
    let weights = normalized_weights(&seasonality.weights);
    let revenues = distribute(year.revenue, &weights);
    let expenses = distribute(year.expenses, &[1.0 / 12.0; 12]);

    revenues
        .into_iter()
        .zip(expenses)
        .enumerate()
        .map(|(i, (revenue, expenses))| {
            let month = i as u32 + 1;
            MonthRecord {
                month,
                label: month_label(month),
                revenue,
                expenses,
                profit: revenue - expenses,
            }
        })
        .collect()
}

/// Attach monthly records to every year in place
pub fn attach_months(years: &mut [YearRecord], seasonality: &Seasonality) {
    for year in years.iter_mut() {
        year.months = expand_year(year, seasonality);
    }
}

/// Weights scaled to sum to exactly 1 (uniform if the curve is degenerate)
fn normalized_weights(weights: &[f64; 12]) -> [f64; 12] {
    let sum: f64 = weights.iter().filter(|w| w.is_finite() && **w > 0.0).sum();
    if sum <= f64::EPSILON {
        return [1.0 / 12.0; 12];
    }
    weights.map(|w| if w.is_finite() && w > 0.0 { w / sum } else { 0.0 })
}

/// Split `total` by weight in whole rupees using largest remainder
///
/// Each month gets the floor of its share; the leftover rupees go one each to
/// the months with the largest fractional parts (earlier month on ties).
fn distribute(total: i64, weights: &[f64; 12]) -> [i64; 12] {
    let sign = total.signum();
    let magnitude = total.abs();

    let shares = weights.map(|w| magnitude as f64 * w);
    let mut parts = shares.map(|s| s.floor() as i64);
    let leftover = (magnitude - parts.iter().sum::<i64>()).max(0) as usize;

    let mut order: Vec<usize> = (0..12).collect();
    order.sort_by(|&a, &b| {
        let fa = shares[a] - shares[a].floor();
        let fb = shares[b] - shares[b].floor();
        fb.total_cmp(&fa)
    });
    for i in order.into_iter().cycle().take(leftover) {
        parts[i] += 1;
    }

    parts.map(|p| p * sign)
}

fn month_label(month: u32) -> String {
    u8::try_from(month)
        .ok()
        .and_then(|m| Month::try_from(m).ok())
        .map(|m| m.name()[..3].to_string())
        .unwrap_or_default()
}
