// src/core/features.rs
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::utils::error::{BiometricError, Result};

/// Dimensionality of a keystroke sample: 11 hold durations, 10 down-down
/// latencies, 10 up-down latencies, 4 aggregate scalars.
pub const KEYSTROKE_DIMS: usize = 35;

/// Number of cepstral coefficients carried in a voice sample.
pub const MFCC_COEFFS: usize = 13;

/// Index of the mean press pressure scalar, the one keystroke dimension that
/// is device-reported and not required to be non-negative.
const PRESSURE_INDEX: usize = 34;

/// One biometric channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Modality {
    Keystroke,
    Voice,
}

impl Modality {
    /// Minimum enrollment samples required before a template may exist.
    pub fn required_samples(self) -> usize {
        match self {
            Modality::Keystroke => 5,
            Modality::Voice => 3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Modality::Keystroke => "keystroke",
            Modality::Voice => "voice",
        }
    }
}

impl fmt::Display for Modality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single keystroke dynamics capture for the 11-character reference phrase.
///
/// Layout: `[0,11)` per-key hold durations, `[11,21)` down-down latencies,
/// `[21,31)` up-down (flight) latencies, then typing speed, mean flight
/// time, error rate, mean press pressure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeystrokeSample(Vec<f64>);

impl KeystrokeSample {
    pub fn new(values: Vec<f64>) -> Self {
        Self(values)
    }

    pub fn values(&self) -> &[f64] {
        &self.0
    }

    pub fn validate(&self) -> Result<()> {
        if self.0.len() != KEYSTROKE_DIMS {
            return Err(BiometricError::Validation(format!(
                "keystroke sample must have {} dimensions, got {}",
                KEYSTROKE_DIMS,
                self.0.len()
            )));
        }
        for (i, value) in self.0.iter().enumerate() {
            if !value.is_finite() {
                return Err(BiometricError::Validation(format!(
                    "keystroke sample contains a non-finite value at index {i}"
                )));
            }
            if i != PRESSURE_INDEX && *value < 0.0 {
                return Err(BiometricError::Validation(format!(
                    "keystroke sample contains a negative value at index {i}"
                )));
            }
        }
        Ok(())
    }
}

impl From<Vec<f64>> for KeystrokeSample {
    fn from(values: Vec<f64>) -> Self {
        Self::new(values)
    }
}

/// Named voice feature statistics extracted from one utterance.
///
/// `mfcc_mean` and `mfcc_variance` are aligned index-for-index with
/// coefficient order. The pitch block is absent when pitch detection failed
/// on the capture side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceFeatures {
    pub mfcc_mean: Vec<f64>,
    pub mfcc_variance: Vec<f64>,
    pub spectral_centroid_mean: f64,
    pub spectral_centroid_variance: f64,
    pub spectral_flatness_mean: f64,
    pub spectral_flatness_variance: f64,
    pub zcr_mean: f64,
    pub zcr_variance: f64,
    pub rms_mean: f64,
    pub rms_variance: f64,
    pub energy_mean: f64,
    pub energy_variance: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pitch_mean: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pitch_variance: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pitch_range: Option<f64>,
}

impl VoiceFeatures {
    /// Strict validation applied to enrollment samples.
    pub fn validate_enrollment(&self) -> Result<()> {
        self.validate_sample()?;
        if self.mfcc_mean.len() != MFCC_COEFFS {
            return Err(BiometricError::Validation(format!(
                "voice sample must carry {} MFCC coefficients, got {}",
                MFCC_COEFFS,
                self.mfcc_mean.len()
            )));
        }
        if self.mfcc_variance.len() != self.mfcc_mean.len() {
            return Err(BiometricError::Validation(format!(
                "mfccMean and mfccVariance lengths differ ({} vs {})",
                self.mfcc_mean.len(),
                self.mfcc_variance.len()
            )));
        }
        Ok(())
    }

    /// Lenient validation applied to verification samples. Length mismatch
    /// against the stored template is tolerated downstream (truncated to the
    /// shorter length), but empty or non-finite MFCC data fails fast.
    pub fn validate_sample(&self) -> Result<()> {
        if self.mfcc_mean.is_empty() {
            return Err(BiometricError::Validation(
                "voice sample has an empty mfccMean array".into(),
            ));
        }
        if self
            .mfcc_mean
            .iter()
            .chain(self.mfcc_variance.iter())
            .any(|v| !v.is_finite())
        {
            return Err(BiometricError::Validation(
                "voice sample contains non-finite MFCC values".into(),
            ));
        }
        let scalars = [
            self.spectral_centroid_mean,
            self.spectral_centroid_variance,
            self.spectral_flatness_mean,
            self.spectral_flatness_variance,
            self.zcr_mean,
            self.zcr_variance,
            self.rms_mean,
            self.rms_variance,
            self.energy_mean,
            self.energy_variance,
        ];
        if scalars.iter().any(|v| !v.is_finite()) {
            return Err(BiometricError::Validation(
                "voice sample contains non-finite spectral or temporal values".into(),
            ));
        }
        for pitch in [self.pitch_mean, self.pitch_variance, self.pitch_range]
            .into_iter()
            .flatten()
        {
            if !pitch.is_finite() {
                return Err(BiometricError::Validation(
                    "voice sample contains non-finite pitch values".into(),
                ));
            }
        }
        Ok(())
    }

    /// Sample-wise mean across enrollment samples. This is the reference
    /// payload persisted for the voice modality. Optional pitch fields
    /// average over the samples where present and stay absent when no sample
    /// carried them.
    pub fn average(samples: &[VoiceFeatures]) -> Result<VoiceFeatures> {
        let first = samples.first().ok_or_else(|| {
            BiometricError::Validation("cannot average an empty voice sample set".into())
        })?;
        let coeffs = first.mfcc_mean.len();
        for sample in samples {
            if sample.mfcc_mean.len() != coeffs || sample.mfcc_variance.len() != coeffs {
                return Err(BiometricError::Validation(
                    "voice samples disagree on MFCC coefficient count".into(),
                ));
            }
        }

        let n = samples.len() as f64;
        let mut mfcc_mean = vec![0.0; coeffs];
        let mut mfcc_variance = vec![0.0; coeffs];
        for sample in samples {
            for (acc, v) in mfcc_mean.iter_mut().zip(&sample.mfcc_mean) {
                *acc += v;
            }
            for (acc, v) in mfcc_variance.iter_mut().zip(&sample.mfcc_variance) {
                *acc += v;
            }
        }
        for v in mfcc_mean.iter_mut().chain(mfcc_variance.iter_mut()) {
            *v /= n;
        }

        let mean_of = |pick: fn(&VoiceFeatures) -> f64| -> f64 {
            samples.iter().map(pick).sum::<f64>() / n
        };
        let mean_present = |pick: fn(&VoiceFeatures) -> Option<f64>| -> Option<f64> {
            let present: Vec<f64> = samples.iter().filter_map(pick).collect();
            if present.is_empty() {
                None
            } else {
                Some(present.iter().sum::<f64>() / present.len() as f64)
            }
        };

        Ok(VoiceFeatures {
            mfcc_mean,
            mfcc_variance,
            spectral_centroid_mean: mean_of(|s| s.spectral_centroid_mean),
            spectral_centroid_variance: mean_of(|s| s.spectral_centroid_variance),
            spectral_flatness_mean: mean_of(|s| s.spectral_flatness_mean),
            spectral_flatness_variance: mean_of(|s| s.spectral_flatness_variance),
            zcr_mean: mean_of(|s| s.zcr_mean),
            zcr_variance: mean_of(|s| s.zcr_variance),
            rms_mean: mean_of(|s| s.rms_mean),
            rms_variance: mean_of(|s| s.rms_variance),
            energy_mean: mean_of(|s| s.energy_mean),
            energy_variance: mean_of(|s| s.energy_variance),
            pitch_mean: mean_present(|s| s.pitch_mean),
            pitch_variance: mean_present(|s| s.pitch_variance),
            pitch_range: mean_present(|s| s.pitch_range),
        })
    }
}
