// src/core/verify/voice.rs
use serde::Serialize;

use crate::core::features::VoiceFeatures;
use crate::utils::error::Result;

// Weighting deliberately discounts MFCC similarity: in this feature
// pipeline MFCCs are strongly content-dependent (they encode what was said,
// not just who said it), so spectral and pitch statistics carry more of the
// speaker-specific signal. Known accuracy limitation, kept for behavioral
// compatibility; true speaker recognition would use formant/jitter features
// or learned embeddings.
const MFCC_WEIGHT: f64 = 0.35;
const SPECTRAL_WEIGHT: f64 = 0.35;
const TEMPO_WEIGHT: f64 = 0.15;
const PITCH_WEIGHT: f64 = 0.15;

const MFCC_RMSE_SCALE: f64 = 4.0;
const CENTROID_SCALE: f64 = 1.0;
const FLATNESS_SCALE: f64 = 0.3;
const ZCR_SCALE: f64 = 0.5;
const ENERGY_SCALE: f64 = 1.0;
const PITCH_LOG_SCALE: f64 = 1.0;

/// Neutral sub-score used when pitch detection failed on either side.
const PITCH_DEFAULT_SIM: f64 = 0.5;

/// Deliberately permissive acceptance threshold, preserved as-is.
pub const VOICE_THRESHOLD: f64 = 0.30;

#[derive(Debug, Clone, Serialize)]
pub struct VoiceSubScores {
    pub mfcc: f64,
    pub spectral: f64,
    pub tempo: f64,
    pub pitch: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct VoiceMatch {
    pub authenticated: bool,
    pub overall: f64,
    /// Agreement across the four sub-scores: high when they tell the same
    /// story, low when they diverge.
    pub confidence: f64,
    pub sub_scores: VoiceSubScores,
}

/// Compares a fresh sample against the stored averaged reference.
///
/// Four independent sub-similarities in [0,1] are combined by fixed
/// weights. MFCC arrays of mismatched length are truncated to the shorter
/// length (documented lossy behavior); empty arrays are rejected upstream
/// by sample validation.
pub fn compare(sample: &VoiceFeatures, reference: &VoiceFeatures) -> Result<VoiceMatch> {
    sample.validate_sample()?;

    let mfcc = mfcc_similarity(&sample.mfcc_mean, &reference.mfcc_mean);
    let spectral = spectral_similarity(sample, reference);
    let tempo = tempo_similarity(sample, reference);
    let pitch = pitch_similarity(sample.pitch_mean, reference.pitch_mean);

    let overall = MFCC_WEIGHT * mfcc
        + SPECTRAL_WEIGHT * spectral
        + TEMPO_WEIGHT * tempo
        + PITCH_WEIGHT * pitch;

    let sims = [mfcc, spectral, tempo, pitch];
    let mean = sims.iter().sum::<f64>() / sims.len() as f64;
    let variance = sims.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / sims.len() as f64;
    let confidence = (1.0 - 2.0 * variance).max(0.0);

    Ok(VoiceMatch {
        authenticated: overall >= VOICE_THRESHOLD,
        overall,
        confidence,
        sub_scores: VoiceSubScores {
            mfcc,
            spectral,
            tempo,
            pitch,
        },
    })
}

fn mfcc_similarity(a: &[f64], b: &[f64]) -> f64 {
    let len = a.len().min(b.len());
    if len == 0 {
        return 0.0;
    }
    let mse = a[..len]
        .iter()
        .zip(&b[..len])
        .map(|(x, y)| (x - y).powi(2))
        .sum::<f64>()
        / len as f64;
    (1.0 - mse.sqrt() / MFCC_RMSE_SCALE).max(0.0)
}

fn spectral_similarity(sample: &VoiceFeatures, reference: &VoiceFeatures) -> f64 {
    let centroid_delta =
        (sample.spectral_centroid_mean - reference.spectral_centroid_mean).abs() / CENTROID_SCALE;
    let flatness_delta =
        (sample.spectral_flatness_mean - reference.spectral_flatness_mean).abs() / FLATNESS_SCALE;
    (1.0 - (centroid_delta + flatness_delta) / 2.0).max(0.0)
}

fn tempo_similarity(sample: &VoiceFeatures, reference: &VoiceFeatures) -> f64 {
    let zcr_delta = (sample.zcr_mean - reference.zcr_mean).abs() / ZCR_SCALE;
    let energy_delta = (sample.energy_mean - reference.energy_mean).abs() / ENERGY_SCALE;
    (1.0 - (zcr_delta + energy_delta) / 2.0).max(0.0)
}

fn pitch_similarity(sample: Option<f64>, reference: Option<f64>) -> f64 {
    match (sample, reference) {
        (Some(a), Some(b)) if a > 0.0 && b > 0.0 => {
            (1.0 - (a.ln() - b.ln()).abs() / PITCH_LOG_SCALE).max(0.0)
        }
        _ => PITCH_DEFAULT_SIM,
    }
}
