//! Rating/tenor credit spreads and the spread PV01 used to reprice a
//! position after a rating migration.

use crate::credit_state::rating::Rating;

/// Tenor grid (years) of the spread table.
pub const SPREAD_TENORS: [f64; 6] = [1.0, 2.0, 3.0, 5.0, 7.0, 10.0];

/// Reference yield used for the duration approximation.
pub const REFERENCE_YIELD: f64 = 0.05;

/// Representative credit spreads (bp) by rating, aligned with [`SPREAD_TENORS`].
fn spread_curve(rating: Rating) -> [f64; 6] {
    match rating {
        Rating::AAA => [15.0, 18.0, 20.0, 25.0, 30.0, 35.0],
        Rating::AA => [25.0, 30.0, 35.0, 45.0, 55.0, 65.0],
        Rating::A => [45.0, 55.0, 65.0, 80.0, 95.0, 110.0],
        Rating::BBB => [90.0, 105.0, 120.0, 150.0, 175.0, 200.0],
        Rating::BB => [200.0, 240.0, 280.0, 350.0, 400.0, 450.0],
        Rating::B => [400.0, 480.0, 550.0, 650.0, 720.0, 800.0],
        Rating::CCC => [1000.0, 1100.0, 1200.0, 1350.0, 1450.0, 1550.0],
        Rating::D => [5000.0; 6],
    }
}

/// Credit spread in basis points, linearly interpolated in tenor and flat
/// outside the grid.
pub fn credit_spread_bps(rating: Rating, tenor_years: f64) -> f64 {
    let curve = spread_curve(rating);
    if tenor_years <= SPREAD_TENORS[0] {
        return curve[0];
    }
    let last = SPREAD_TENORS.len() - 1;
    if tenor_years >= SPREAD_TENORS[last] {
        return curve[last];
    }
    for i in 0..last {
        let (t1, t2) = (SPREAD_TENORS[i], SPREAD_TENORS[i + 1]);
        if tenor_years <= t2 {
            let w = (tenor_years - t1) / (t2 - t1);
            return curve[i] + w * (curve[i + 1] - curve[i]);
        }
    }
    curve[last]
}

/// Modified duration at [`REFERENCE_YIELD`], capped at maturity.
pub fn modified_duration(tenor_years: f64, coupon_rate: f64) -> f64 {
    if tenor_years <= 0.0 {
        return 0.0;
    }
    let y = REFERENCE_YIELD;
    if coupon_rate <= 0.0 {
        return tenor_years / (1.0 + y);
    }
    let annuity = (1.0 - (1.0 + y).powf(-tenor_years)) / y;
    (annuity / (1.0 + y)).min(tenor_years)
}

/// Price change for a 1bp spread move.
pub fn spread_pv01(notional: f64, tenor_years: f64, coupon_rate: f64) -> f64 {
    notional * modified_duration(tenor_years, coupon_rate) * 1e-4
}
