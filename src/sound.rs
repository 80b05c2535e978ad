//! Mono audio signal used as input to formant analysis
//!
//! Recordings are decoded with symphonia (WAV, FLAC, MP3, OGG) and fall back to
//! hound for WAV files symphonia rejects. Multichannel input is averaged down to
//! one channel.

use std::f64::consts::PI;
use std::fs::File;
use std::path::Path;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::utils::fft::Fft;
use crate::{Result, VowelError};

/// Zero padding on both sides of the signal before the anti-alias FFT
const ANTI_TURN_AROUND: usize = 1000;
/// Half-width (in samples) of the windowed sinc used for resampling
const SINC_DEPTH: usize = 50;

/// Audio samples with associated sample rate
#[derive(Debug, Clone)]
pub struct Sound {
    /// Mono samples in [-1, 1]
    samples: Vec<f64>,
    sample_rate: f64,
    /// Time of the left edge of the first sample
    start_time: f64,
}

impl Sound {
    /// Create a Sound from raw samples
    ///
    /// # Example
    /// ```
    /// use vowelspace::Sound;
    ///
    /// let sound = Sound::from_samples(&[0.0, 0.5, 1.0, 0.5], 16000.0);
    /// assert_eq!(sound.num_samples(), 4);
    /// ```
    pub fn from_samples(samples: &[f64], sample_rate: f64) -> Self {
        Self::from_samples_owned(samples.to_vec(), sample_rate)
    }

    /// Create a Sound from owned samples
    pub fn from_samples_owned(samples: Vec<f64>, sample_rate: f64) -> Self {
        Self {
            samples,
            sample_rate,
            start_time: 0.0,
        }
    }

    /// Load a recording from disk
    ///
    /// # Errors
    /// `FileNotFound` if the path does not exist, otherwise a decoding error
    /// when neither symphonia nor hound can read the file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(VowelError::FileNotFound {
                kind: "audio",
                path: path.to_path_buf(),
            });
        }

        match Self::decode_symphonia(path) {
            Ok(sound) => Ok(sound),
            Err(err) if is_wav(path) => {
                log::debug!("symphonia could not decode {}: {err}; trying hound", path.display());
                Self::decode_wav(path)
            }
            Err(err) => Err(err),
        }
    }

    fn decode_symphonia(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = path.extension() {
            hint.with_extension(&ext.to_string_lossy());
        }

        let probed = symphonia::default::get_probe()
            .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
            .map_err(|e| VowelError::Analysis(format!("Failed to probe audio format: {e}")))?;
        let mut format = probed.format;

        let track = format
            .default_track()
            .ok_or_else(|| VowelError::Analysis("No audio track found".to_string()))?;
        let track_id = track.id;
        let sample_rate = track
            .codec_params
            .sample_rate
            .ok_or_else(|| VowelError::Analysis("Unknown sample rate".to_string()))?
            as f64;
        let channels = track.codec_params.channels.map(|c| c.count()).unwrap_or(1);

        let mut decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(|e| VowelError::Analysis(format!("Failed to create decoder: {e}")))?;

        let mut interleaved: Vec<f32> = Vec::new();
        loop {
            let packet = match format.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(ref e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    break
                }
                Err(e) => return Err(VowelError::Analysis(format!("Error reading packet: {e}"))),
            };
            if packet.track_id() != track_id {
                continue;
            }

            let decoded = match decoder.decode(&packet) {
                Ok(decoded) => decoded,
                Err(SymphoniaError::DecodeError(_)) => continue,
                Err(e) => return Err(VowelError::Analysis(format!("Decode error: {e}"))),
            };
            let mut buffer = SampleBuffer::<f32>::new(decoded.capacity() as u64, *decoded.spec());
            buffer.copy_interleaved_ref(decoded);
            interleaved.extend_from_slice(buffer.samples());
        }

        let samples = downmix(interleaved.iter().map(|&s| s as f64), channels);
        Ok(Self::from_samples_owned(samples, sample_rate))
    }

    fn decode_wav(path: &Path) -> Result<Self> {
        let reader = hound::WavReader::open(path)?;
        let spec = reader.spec();
        let channels = spec.channels as usize;

        let interleaved: Vec<f64> = match spec.sample_format {
            hound::SampleFormat::Int => {
                let full_scale = (1_i64 << (spec.bits_per_sample - 1)) as f64;
                reader
                    .into_samples::<i32>()
                    .map(|s| s.map(|v| v as f64 / full_scale))
                    .collect::<std::result::Result<_, _>>()?
            }
            hound::SampleFormat::Float => reader
                .into_samples::<f32>()
                .map(|s| s.map(|v| v as f64))
                .collect::<std::result::Result<_, _>>()?,
        };

        Ok(Self::from_samples_owned(
            downmix(interleaved.into_iter(), channels),
            spec.sample_rate as f64,
        ))
    }

    /// Sample rate in Hz
    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    pub fn samples(&self) -> &[f64] {
        &self.samples
    }

    pub fn num_samples(&self) -> usize {
        self.samples.len()
    }

    /// Duration in seconds
    pub fn duration(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate
    }

    pub fn start_time(&self) -> f64 {
        self.start_time
    }

    /// Sample period (1 / sample rate)
    pub fn dx(&self) -> f64 {
        1.0 / self.sample_rate
    }

    /// Time of the centre of the first sample
    pub fn x1(&self) -> f64 {
        self.start_time + 0.5 * self.dx()
    }

    /// First-order high-pass that flattens the spectral slope above `from_frequency`
    ///
    /// `y[n] = x[n] - α·x[n-1]` with `α = exp(-2π·from / fs)`
    pub fn pre_emphasis(&self, from_frequency: f64) -> Sound {
        let alpha = (-2.0 * PI * from_frequency / self.sample_rate).exp();
        let mut filtered = self.samples.clone();
        for i in (1..filtered.len()).rev() {
            filtered[i] -= alpha * filtered[i - 1];
        }
        Sound { samples: filtered, ..*self }
    }

    /// Resample to `new_sample_rate` with windowed sinc interpolation
    ///
    /// Downsampling first removes everything above the new Nyquist frequency
    /// in the FFT domain. The output keeps the same time domain as the input,
    /// with its samples centred inside it.
    pub fn resample(&self, new_sample_rate: f64) -> Sound {
        let ratio = new_sample_rate / self.sample_rate;
        if self.samples.is_empty() || (ratio - 1.0).abs() < 1e-6 {
            return self.clone();
        }

        let duration = self.duration();
        let new_len = (duration * new_sample_rate).round() as usize;
        let source = if ratio < 1.0 {
            self.lowpass(ratio)
        } else {
            self.samples.clone()
        };

        let new_dx = 1.0 / new_sample_rate;
        let new_x1 = self.start_time + 0.5 * (duration - (new_len as f64 - 1.0) * new_dx);
        let old_x1 = self.x1();

        let samples = (0..new_len)
            .map(|i| {
                let t = new_x1 + i as f64 * new_dx;
                sinc_interpolate(&source, (t - old_x1) * self.sample_rate, SINC_DEPTH)
            })
            .collect();

        Sound {
            samples,
            sample_rate: new_sample_rate,
            start_time: self.start_time,
        }
    }

    /// Zero every spectral component at or above `ratio` × the current Nyquist
    fn lowpass(&self, ratio: f64) -> Vec<f64> {
        let n = self.samples.len();
        let nfft = (n + 2 * ANTI_TURN_AROUND).next_power_of_two();
        let half = nfft / 2;

        let mut padded = vec![0.0; nfft];
        padded[ANTI_TURN_AROUND..ANTI_TURN_AROUND + n].copy_from_slice(&self.samples);

        let mut fft = Fft::new();
        let mut spectrum = fft.real_fft(&padded, nfft);

        let cutoff = ((ratio * half as f64).floor() as usize).clamp(1, half);
        for bin in cutoff..=half {
            spectrum[bin] = Default::default();
            if bin != half {
                spectrum[nfft - bin] = Default::default();
            }
        }

        let filtered = fft.inverse_fft(&spectrum);
        filtered[ANTI_TURN_AROUND..ANTI_TURN_AROUND + n]
            .iter()
            .map(|c| c.re)
            .collect()
    }

    /// Create a pure tone (sine wave)
    pub fn create_tone(
        frequency: f64,
        duration: f64,
        sample_rate: f64,
        amplitude: f64,
        phase: f64,
    ) -> Sound {
        let n_samples = (duration * sample_rate).round() as usize;
        let omega = 2.0 * PI * frequency / sample_rate;
        let samples = (0..n_samples)
            .map(|i| amplitude * (omega * i as f64 + phase).sin())
            .collect();
        Self::from_samples_owned(samples, sample_rate)
    }

    /// Create silence
    pub fn create_silence(duration: f64, sample_rate: f64) -> Sound {
        let n_samples = (duration * sample_rate).round() as usize;
        Self::from_samples_owned(vec![0.0; n_samples], sample_rate)
    }
}

fn is_wav(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().eq_ignore_ascii_case("wav"))
        .unwrap_or(false)
}

/// Average interleaved frames down to one channel
fn downmix(interleaved: impl Iterator<Item = f64>, channels: usize) -> Vec<f64> {
    if channels <= 1 {
        return interleaved.collect();
    }
    let all: Vec<f64> = interleaved.collect();
    all.chunks(channels)
        .map(|frame| frame.iter().sum::<f64>() / channels as f64)
        .collect()
}

/// Hann-windowed sinc interpolation at fractional index `x` (0 = first sample)
///
/// Positions outside the signal take the nearest edge value. Near the edges the
/// kernel shrinks so that it never reads past the ends.
fn sinc_interpolate(samples: &[f64], x: f64, depth: usize) -> f64 {
    let n = samples.len();
    if n == 0 {
        return f64::NAN;
    }
    if x <= 0.0 {
        return samples[0];
    }
    if x >= (n - 1) as f64 {
        return samples[n - 1];
    }

    let left = x.floor() as usize;
    let frac = x - left as f64;
    if frac == 0.0 {
        return samples[left];
    }

    let right = left + 1;
    let depth = depth.min(left + 1).min(n - right);
    if depth <= 1 {
        return samples[left] + frac * (samples[right] - samples[left]);
    }

    let half_width = depth as f64 + 0.5;
    let kernel = |distance: f64| {
        let phase = PI * distance;
        let window = 0.5 * (1.0 + (phase / half_width).cos());
        phase.sin() / phase * window
    };

    let lower = (0..depth).map(|k| samples[left - k] * kernel(frac + k as f64));
    let upper = (0..depth).map(|k| samples[right + k] * kernel(1.0 - frac + k as f64));
    lower.chain(upper).sum()
}
