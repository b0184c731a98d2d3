//! Effective confidence (exponential decay since `updated_at`), spec §4.2.

use chrono::{DateTime, Utc};

/// Half-life in days at `stability = 1.0`.
const BASE_HALF_LIFE_DAYS: f64 = 30.0;

/// `eff(b) = b.confidence * 2^(-Δdays / (30 * b.stability))`, where `Δdays`
/// is the whole-day gap between `now` and `updated_at`. Never written back
/// to `confidence` — used only for ranking and pruning.
pub fn effective_confidence(
    confidence: f64,
    stability: f64,
    updated_at: DateTime<Utc>,
    now: DateTime<Utc>,
) -> f64 {
    let delta_days = (now - updated_at).num_days() as f64;
    let stability = stability.max(f64::MIN_POSITIVE);
    let half_life = BASE_HALF_LIFE_DAYS * stability;
    confidence * 2f64.powf(-delta_days / half_life)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn decay_at_zero_days_is_unchanged() {
        let now = Utc::now();
        let eff = effective_confidence(0.8, 1.0, now, now);
        assert!((eff - 0.8).abs() < 0.01);
    }

    #[test]
    fn decay_halves_after_one_half_life() {
        let now = Utc::now();
        let updated = now - Duration::days(30);
        let eff = effective_confidence(0.8, 1.0, updated, now);
        assert!((eff - 0.4).abs() < 0.01, "got {eff}");
    }

    #[test]
    fn stability_scales_half_life() {
        let now = Utc::now();
        let updated = now - Duration::days(30);
        // stability=2.0 doubles the half-life, so 30 days of age decays much less.
        let eff = effective_confidence(0.8, 2.0, updated, now);
        assert!(eff > 0.5, "got {eff}");
    }
}
