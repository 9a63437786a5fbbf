pub mod baselines;
pub mod dvp;
pub mod positions;
pub mod scoring;

/// Rounds half away from zero to `places` decimals.
pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}
