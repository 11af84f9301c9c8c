// src/core/verify/keystroke.rs
use serde::Serialize;

use crate::utils::error::{BiometricError, Result};
use super::delegate::DelegateDecision;

/// Widening of the delegate's learned threshold. Natural intra-user typing
/// variance on an 11-character phrase routinely exceeds a strict
/// autoencoder threshold; the band trades false rejections for a controlled
/// increase in false acceptance. Policy knob, not an accident.
pub const ACCEPT_TOLERANCE: f64 = 0.50;

/// Absolute fallback ceiling: reconstruction error below this passes even
/// when the learned threshold is tighter.
pub const ABSOLUTE_MSE_CEILING: f64 = 0.50;

#[derive(Debug, Clone, Serialize)]
pub struct KeystrokeMatch {
    pub authenticated: bool,
    pub score: f64,
    pub mse: f64,
    pub threshold: f64,
}

/// Lenient acceptance policy over the delegated verdict. Accepts when the
/// delegate authenticated, when the error sits inside the tolerance band,
/// or when it is under the absolute ceiling.
pub fn evaluate(decision: &DelegateDecision) -> Result<KeystrokeMatch> {
    if !decision.mse.is_finite() || !decision.threshold.is_finite() {
        return Err(BiometricError::VerifierUnavailable(
            "delegate returned non-finite mse or threshold".into(),
        ));
    }

    let authenticated = decision.authenticated
        || decision.mse < decision.threshold + ACCEPT_TOLERANCE
        || decision.mse < ABSOLUTE_MSE_CEILING;

    Ok(KeystrokeMatch {
        authenticated,
        score: (1.0 - decision.mse).max(0.0),
        mse: decision.mse,
        threshold: decision.threshold,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decision(mse: f64, threshold: f64, authenticated: bool) -> DelegateDecision {
        DelegateDecision {
            mse,
            threshold,
            authenticated,
        }
    }

    #[test]
    fn delegate_acceptance_wins_outright() {
        let m = evaluate(&decision(0.9, 0.1, true)).unwrap();
        assert!(m.authenticated);
    }

    #[test]
    fn tolerance_band_absorbs_natural_variance() {
        // 0.65 < 0.2 + 0.5, so the band accepts what the delegate rejected.
        let m = evaluate(&decision(0.65, 0.2, false)).unwrap();
        assert!(m.authenticated);
        assert!((m.score - 0.35).abs() < 1e-12);
    }

    #[test]
    fn absolute_ceiling_accepts_small_errors() {
        // Threshold is tighter than the ceiling, but mse < 0.5 still passes.
        let m = evaluate(&decision(0.4, -0.2, false)).unwrap();
        assert!(m.authenticated);
    }

    #[test]
    fn rejects_when_every_check_fails() {
        // 0.6 >= 0.05 + 0.5 exhausts the band and 0.6 >= 0.5 the ceiling.
        let m = evaluate(&decision(0.6, 0.05, false)).unwrap();
        assert!(!m.authenticated);
        assert!((m.score - 0.4).abs() < 1e-12);
    }

    #[test]
    fn band_acceptance_is_threshold_relative() {
        // Same error, looser learned threshold: 0.6 < 0.2 + 0.5 accepts.
        let m = evaluate(&decision(0.6, 0.2, false)).unwrap();
        assert!(m.authenticated);
        assert!((m.score - 0.4).abs() < 1e-12);
    }

    #[test]
    fn self_similar_samples_score_high() {
        // A near-identical sample reconstructs almost perfectly.
        let m = evaluate(&decision(0.02, 0.2, true)).unwrap();
        assert!(m.score >= 0.9);
        assert!(m.authenticated);
    }

    #[test]
    fn score_is_floored_at_zero() {
        let m = evaluate(&decision(3.0, 0.1, false)).unwrap();
        assert_eq!(m.score, 0.0);
        assert!(!m.authenticated);
    }

    #[test]
    fn score_decreases_monotonically_with_mse() {
        let mut last = f64::INFINITY;
        for mse in [0.0, 0.1, 0.3, 0.6, 0.9, 1.2] {
            let m = evaluate(&decision(mse, 0.2, false)).unwrap();
            assert!(m.score <= last);
            last = m.score;
        }
    }

    #[test]
    fn non_finite_delegate_data_fails_closed() {
        let err = evaluate(&decision(f64::NAN, 0.2, true)).unwrap_err();
        assert!(matches!(err, BiometricError::VerifierUnavailable(_)));
    }
}
