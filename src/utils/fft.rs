//! Thin wrapper around rustfft for the resampler's anti-alias filter

use num_complex::Complex;
use rustfft::FftPlanner;

/// FFT processor with cached plans
pub struct Fft {
    planner: FftPlanner<f64>,
}

impl Default for Fft {
    fn default() -> Self {
        Self::new()
    }
}

impl Fft {
    pub fn new() -> Self {
        Self {
            planner: FftPlanner::new(),
        }
    }

    /// Forward FFT of real input, zero-padded to `output_size`
    pub fn real_fft(&mut self, input: &[f64], output_size: usize) -> Vec<Complex<f64>> {
        let size = output_size.max(input.len());
        let mut buffer: Vec<Complex<f64>> = input
            .iter()
            .map(|&x| Complex::new(x, 0.0))
            .chain(std::iter::repeat(Complex::new(0.0, 0.0)))
            .take(size)
            .collect();

        self.planner.plan_fft_forward(size).process(&mut buffer);
        buffer
    }

    /// Inverse FFT, scaled by 1/N so that it undoes [`Fft::real_fft`]
    pub fn inverse_fft(&mut self, input: &[Complex<f64>]) -> Vec<Complex<f64>> {
        let mut buffer = input.to_vec();
        self.planner.plan_fft_inverse(buffer.len()).process(&mut buffer);

        let scale = 1.0 / buffer.len() as f64;
        buffer.iter_mut().for_each(|c| *c *= scale);
        buffer
    }
}
