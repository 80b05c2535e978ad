//! Formant tracking using Linear Predictive Coding (LPC)
//!
//! Formants are resonance frequencies of the vocal tract (F1, F2, ...). The
//! track is computed once over the whole recording:
//!
//! 1. Resample to twice the formant ceiling
//! 2. Pre-emphasize to flatten the spectral slope
//! 3. Cut overlapping frames with a Gaussian window
//! 4. Fit LPC coefficients per frame with Burg's method
//! 5. Turn the poles of the LPC polynomial into frequency/bandwidth pairs

use crate::interpolation::Interpolation;
use crate::utils::lpc::{lpc_burg, lpc_to_formants};
use crate::window::gaussian_formant_window;
use crate::{FrequencyUnit, Result, Sound, VowelError};

/// Parameters of the Burg formant analysis
#[derive(Debug, Clone, PartialEq)]
pub struct FormantSettings {
    /// Seconds between frame centres; `0.0` means a quarter of `window_length`
    pub time_step: f64,
    /// Number of formants to track
    pub max_formants: usize,
    /// Formant ceiling in Hz (~5500 for female or mixed speakers, ~5000 for male)
    pub max_formant_hz: f64,
    /// Effective window length in seconds; each frame spans twice this
    pub window_length: f64,
    /// Pre-emphasis corner frequency in Hz
    pub pre_emphasis_from: f64,
}

impl Default for FormantSettings {
    fn default() -> Self {
        Self {
            time_step: 0.0,
            max_formants: 5,
            max_formant_hz: 5500.0,
            window_length: 0.025,
            pre_emphasis_from: 50.0,
        }
    }
}

impl FormantSettings {
    /// Check ranges before running an analysis
    pub fn validate(&self) -> Result<()> {
        if !(1..=10).contains(&self.max_formants) {
            return Err(VowelError::InvalidParameter(format!(
                "number of formants must be between 1 and 10, got {}",
                self.max_formants
            )));
        }
        if self.time_step < 0.0 || !self.time_step.is_finite() {
            return Err(VowelError::InvalidParameter(format!(
                "time step must be >= 0, got {}",
                self.time_step
            )));
        }
        if self.window_length <= 0.0 || !self.window_length.is_finite() {
            return Err(VowelError::InvalidParameter(format!(
                "window length must be > 0, got {}",
                self.window_length
            )));
        }
        if self.max_formant_hz <= 0.0 || !self.max_formant_hz.is_finite() {
            return Err(VowelError::InvalidParameter(format!(
                "formant ceiling must be > 0 Hz, got {}",
                self.max_formant_hz
            )));
        }
        Ok(())
    }

    /// The time step actually used between frames
    pub fn effective_time_step(&self) -> f64 {
        if self.time_step > 0.0 {
            self.time_step
        } else {
            self.window_length / 4.0
        }
    }
}

/// A single formant measurement
#[derive(Debug, Clone, Copy)]
pub struct FormantPoint {
    /// Frequency in Hz (NaN if undefined)
    pub frequency: f64,
    /// Bandwidth in Hz (NaN if undefined)
    pub bandwidth: f64,
}

impl FormantPoint {
    const UNDEFINED: FormantPoint = FormantPoint {
        frequency: f64::NAN,
        bandwidth: f64::NAN,
    };
}

/// Formant contour: one frame of `max_formants` points per time step
#[derive(Debug, Clone)]
pub struct Formant {
    frames: Vec<Vec<FormantPoint>>,
    /// Time of the first frame centre
    start_time: f64,
    time_step: f64,
    max_formants: usize,
}

impl Formant {
    /// Compute formant tracks from a Sound using Burg's LPC method
    pub fn from_sound_burg(sound: &Sound, settings: &FormantSettings) -> Result<Self> {
        settings.validate()?;
        let max_formants = settings.max_formants;
        let time_step = settings.effective_time_step();
        let ceiling = settings.max_formant_hz.min(sound.sample_rate() / 2.0);

        // LPC sees only the band below the ceiling
        let target_rate = 2.0 * ceiling;
        let resampled = if sound.sample_rate() > target_rate {
            sound.resample(target_rate)
        } else {
            sound.clone()
        };
        let emphasized = if settings.pre_emphasis_from > 0.0 {
            resampled.pre_emphasis(settings.pre_emphasis_from)
        } else {
            resampled
        };

        let sample_rate = emphasized.sample_rate();
        let samples = emphasized.samples();
        let dx = emphasized.dx();
        let x1 = emphasized.x1();

        let frame_duration = 2.0 * settings.window_length;
        let frame_len = (frame_duration / dx).floor() as usize;
        let half_len = frame_len / 2;
        let window = gaussian_formant_window(frame_len);

        let physical_duration = samples.len() as f64 * dx;
        if samples.is_empty() || physical_duration < frame_duration {
            log::debug!(
                "sound of {physical_duration:.3} s is shorter than one analysis frame ({frame_duration:.3} s)"
            );
            return Ok(Self {
                frames: Vec::new(),
                start_time: sound.start_time(),
                time_step,
                max_formants,
            });
        }

        let num_frames = 1 + ((physical_duration - frame_duration) / time_step).floor() as usize;
        // Frames are centred within the signal
        let first_frame_time = x1 + 0.5 * (physical_duration - dx - (num_frames - 1) as f64 * time_step);
        let lpc_order = 2 * max_formants;

        let frames = (0..num_frames)
            .map(|frame_idx| {
                let t = first_frame_time + frame_idx as f64 * time_step;
                let left = ((t - x1) / dx).floor() as isize;
                let first = (left + 1 - half_len as isize).max(0) as usize;
                let last = ((left + half_len as isize).max(0) as usize).min(samples.len() - 1);

                let windowed: Vec<f64> = samples[first..=last.max(first)]
                    .iter()
                    .zip(&window)
                    .map(|(s, w)| s * w)
                    .collect();

                let mut points: Vec<FormantPoint> = lpc_burg(&windowed, lpc_order)
                    .map(|lpc| lpc_to_formants(&lpc.coefficients, sample_rate))
                    .unwrap_or_default()
                    .into_iter()
                    .filter(|c| {
                        c.frequency < ceiling
                            && c.bandwidth > 0.0
                            && c.bandwidth < ceiling
                            && c.bandwidth < 2.0 * c.frequency
                    })
                    .take(max_formants)
                    .map(|c| FormantPoint {
                        frequency: c.frequency,
                        bandwidth: c.bandwidth,
                    })
                    .collect();
                points.resize(max_formants, FormantPoint::UNDEFINED);
                points
            })
            .collect();

        Ok(Self {
            frames,
            start_time: first_frame_time,
            time_step,
            max_formants,
        })
    }

    /// Formant frequency `formant_number` (1 = F1) at `time`
    ///
    /// Returns `None` when the time lies outside the track or the formant is
    /// undefined in the frame nearest to it.
    pub fn value_at_time(
        &self,
        formant_number: usize,
        time: f64,
        unit: FrequencyUnit,
        interpolation: Interpolation,
    ) -> Option<f64> {
        self.query(formant_number, time, interpolation, |p| p.frequency)
            .map(|hz| unit.from_hertz(hz))
    }

    /// Formant bandwidth `formant_number` at `time`, in Hz
    pub fn bandwidth_at_time(
        &self,
        formant_number: usize,
        time: f64,
        interpolation: Interpolation,
    ) -> Option<f64> {
        self.query(formant_number, time, interpolation, |p| p.bandwidth)
    }

    fn query(
        &self,
        formant_number: usize,
        time: f64,
        interpolation: Interpolation,
        field: impl Fn(&FormantPoint) -> f64,
    ) -> Option<f64> {
        if formant_number == 0 || formant_number > self.max_formants {
            return None;
        }
        let track: Vec<f64> = self
            .frames
            .iter()
            .map(|frame| field(&frame[formant_number - 1]))
            .collect();
        let position = (time - self.start_time) / self.time_step;
        interpolation.interpolate_with_undefined(&track, position)
    }

    /// Time of the centre of `frame`
    pub fn frame_time(&self, frame: usize) -> f64 {
        self.start_time + frame as f64 * self.time_step
    }

    pub fn num_frames(&self) -> usize {
        self.frames.len()
    }

    pub fn max_formants(&self) -> usize {
        self.max_formants
    }

    pub fn time_step(&self) -> f64 {
        self.time_step
    }

    pub fn start_time(&self) -> f64 {
        self.start_time
    }
}

impl Sound {
    /// Compute formant tracks from this sound using Burg's LPC method
    pub fn to_formant_burg(&self, settings: &FormantSettings) -> Result<Formant> {
        Formant::from_sound_burg(self, settings)
    }
}

/// Synthetic vowel-like test signals
#[cfg(test)]
pub(crate) mod synth {
    use std::f64::consts::PI;

    /// Pulse train at `f0` with a -6 dB/octave source tilt, passed through a
    /// cascade of two-pole resonators, one per `(frequency, bandwidth)` pair
    pub fn vowel(formants: &[(f64, f64)], f0: f64, duration: f64, sample_rate: f64) -> Vec<f64> {
        let n = (duration * sample_rate).round() as usize;
        let period = (sample_rate / f0).round() as usize;
        let mut tilt = 0.0;
        let mut signal: Vec<f64> = (0..n)
            .map(|i| {
                let pulse = if i % period == 0 { 1.0 } else { 0.0 };
                tilt = pulse + 0.95 * tilt;
                tilt
            })
            .collect();

        for &(frequency, bandwidth) in formants {
            let r = (-PI * bandwidth / sample_rate).exp();
            let theta = 2.0 * PI * frequency / sample_rate;
            let (a1, a2) = (2.0 * r * theta.cos(), -r * r);
            let gain = 1.0 - a1 - a2;
            let (mut y1, mut y2) = (0.0, 0.0);
            for s in signal.iter_mut() {
                let y = gain * *s + a1 * y1 + a2 * y2;
                y2 = y1;
                y1 = y;
                *s = y;
            }
        }

        let peak = signal.iter().fold(0.0_f64, |m, v| m.max(v.abs()));
        signal.iter().map(|v| 0.8 * v / peak).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VOWEL: [(f64, f64); 5] = [
        (700.0, 80.0),
        (1220.0, 90.0),
        (2600.0, 120.0),
        (3500.0, 150.0),
        (4500.0, 200.0),
    ];

    #[test]
    fn test_formant_basic() {
        let sound = Sound::create_tone(200.0, 0.5, 16000.0, 0.5, 0.0);
        let formant = sound.to_formant_burg(&FormantSettings::default()).unwrap();

        assert!(formant.num_frames() > 0);
        assert_eq!(formant.max_formants(), 5);
        assert!((formant.time_step() - 0.00625).abs() < 1e-12);
    }

    #[test]
    fn test_frames_are_centred() {
        let sound = Sound::create_tone(200.0, 0.5, 16000.0, 0.5, 0.0);
        let settings = FormantSettings {
            time_step: 0.01,
            ..Default::default()
        };
        let formant = sound.to_formant_burg(&settings).unwrap();

        let first = formant.frame_time(0);
        let last = formant.frame_time(formant.num_frames() - 1);
        assert!((first + last - sound.duration()).abs() < 1e-6);
        assert!(first >= settings.window_length - 1e-9);
    }

    #[test]
    fn test_synthetic_vowel_formants() {
        let samples = synth::vowel(&VOWEL, 120.0, 0.5, 16000.0);
        let sound = Sound::from_samples_owned(samples, 16000.0);
        let formant = sound.to_formant_burg(&FormantSettings::default()).unwrap();

        let t = 0.25;
        let f1 = formant
            .value_at_time(1, t, FrequencyUnit::Hertz, Interpolation::Linear)
            .unwrap();
        let f2 = formant
            .value_at_time(2, t, FrequencyUnit::Hertz, Interpolation::Linear)
            .unwrap();
        assert!((f1 - 700.0).abs() < 100.0, "F1 = {f1}");
        assert!((f2 - 1220.0).abs() < 150.0, "F2 = {f2}");

        let bark = formant
            .value_at_time(1, t, FrequencyUnit::Bark, Interpolation::Linear)
            .unwrap();
        assert!((bark - FrequencyUnit::Bark.from_hertz(f1)).abs() < 1e-9);
    }

    #[test]
    fn test_bandwidth_at_time() {
        let samples = synth::vowel(&VOWEL, 120.0, 0.5, 16000.0);
        let sound = Sound::from_samples_owned(samples, 16000.0);
        let formant = sound.to_formant_burg(&FormantSettings::default()).unwrap();

        let b1 = formant.bandwidth_at_time(1, 0.25, Interpolation::Linear).unwrap();
        assert!(b1.is_finite() && b1 > 0.0 && b1 < 1000.0, "B1 = {b1}");
        assert!(formant.bandwidth_at_time(1, 10.0, Interpolation::Linear).is_none());
        assert!(formant.bandwidth_at_time(0, 0.25, Interpolation::Linear).is_none());
    }

    #[test]
    fn test_query_outside_track() {
        let sound = Sound::create_tone(200.0, 0.3, 16000.0, 0.5, 0.0);
        let formant = sound.to_formant_burg(&FormantSettings::default()).unwrap();

        assert!(formant
            .value_at_time(1, 10.0, FrequencyUnit::Hertz, Interpolation::Linear)
            .is_none());
        assert!(formant
            .value_at_time(0, 0.15, FrequencyUnit::Hertz, Interpolation::Linear)
            .is_none());
        assert!(formant
            .value_at_time(6, 0.15, FrequencyUnit::Hertz, Interpolation::Linear)
            .is_none());
    }

    #[test]
    fn test_silence_is_undefined() {
        let sound = Sound::create_silence(0.3, 16000.0);
        let formant = sound.to_formant_burg(&FormantSettings::default()).unwrap();

        assert!(formant.num_frames() > 0);
        assert!(formant
            .value_at_time(1, 0.15, FrequencyUnit::Hertz, Interpolation::Linear)
            .is_none());
    }

    #[test]
    fn test_too_short_sound_has_no_frames() {
        let sound = Sound::create_tone(200.0, 0.02, 16000.0, 0.5, 0.0);
        let formant = sound.to_formant_burg(&FormantSettings::default()).unwrap();
        assert_eq!(formant.num_frames(), 0);
    }

    #[test]
    fn test_invalid_settings() {
        let sound = Sound::create_tone(200.0, 0.3, 16000.0, 0.5, 0.0);
        let settings = FormantSettings {
            max_formants: 0,
            ..Default::default()
        };
        assert!(matches!(
            sound.to_formant_burg(&settings),
            Err(VowelError::InvalidParameter(_))
        ));
    }
}
