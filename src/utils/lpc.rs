//! Linear Predictive Coding (LPC) with Burg's method
//!
//! Formant candidates are the angles and radii of the poles of the all-pole
//! model. Poles come from the eigenvalues of the predictor polynomial's
//! companion matrix, polished with Newton-Raphson.

use nalgebra::DMatrix;
use num_complex::Complex;
use std::f64::consts::PI;

/// Newton-Raphson iterations per root
const POLISH_ITERATIONS: usize = 80;
/// Poles closer than this to 0 Hz or Nyquist are not formants
const SAFETY_MARGIN_HZ: f64 = 50.0;

/// Result of LPC analysis
#[derive(Debug, Clone)]
pub struct LpcResult {
    /// Predictor coefficients a[1..m] (no leading 1.0)
    pub coefficients: Vec<f64>,
    /// Residual mean-square prediction error
    pub gain: f64,
}

/// Compute LPC coefficients of order `order` using Burg's method
///
/// Returns `None` only if `order` is zero.
pub fn lpc_burg(samples: &[f64], order: usize) -> Option<LpcResult> {
    if order == 0 {
        return None;
    }
    let n = samples.len();
    let mut a = vec![0.0; order];

    if n <= 2 {
        a[0] = -1.0;
        let gain = samples.iter().map(|s| s * s).sum::<f64>() / n.max(1) as f64;
        return Some(LpcResult { coefficients: a, gain });
    }

    let mut gain = samples.iter().map(|s| s * s).sum::<f64>() / n as f64;
    if gain <= 0.0 {
        return Some(LpcResult { coefficients: a, gain });
    }

    // Forward and backward prediction errors
    let mut forward: Vec<f64> = samples[..n - 1].to_vec();
    let mut backward: Vec<f64> = samples[1..].to_vec();
    let mut previous = vec![0.0; order];

    for i in 0..order {
        let len = n - i - 1;
        let (num, den) = forward[..len]
            .iter()
            .zip(&backward[..len])
            .fold((0.0, 0.0), |(num, den), (&f, &b)| (num + f * b, den + f * f + b * b));

        if den <= 0.0 {
            return Some(LpcResult { coefficients: a, gain: 0.0 });
        }

        a[i] = 2.0 * num / den;
        gain *= 1.0 - a[i] * a[i];
        for j in 0..i {
            a[j] = previous[j] - a[i] * previous[i - j - 1];
        }

        if i + 1 < order {
            previous[..=i].copy_from_slice(&a[..=i]);
            for j in 0..len - 1 {
                forward[j] -= previous[i] * backward[j];
                backward[j] = backward[j + 1] - previous[i] * forward[j + 1];
            }
        }
    }

    Some(LpcResult { coefficients: a, gain })
}

/// A pole of the LPC model expressed as frequency and bandwidth
#[derive(Debug, Clone, Copy)]
pub struct FormantCandidate {
    /// Frequency in Hz
    pub frequency: f64,
    /// Bandwidth in Hz
    pub bandwidth: f64,
}

/// Convert Burg coefficients to formant candidates, sorted by frequency
///
/// Roots outside the unit circle are reflected inside; only roots in the upper
/// half-plane between the safety margins are reported.
pub fn lpc_to_formants(coefficients: &[f64], sample_rate: f64) -> Vec<FormantCandidate> {
    if coefficients.is_empty() {
        return Vec::new();
    }
    let nyquist = sample_rate / 2.0;

    // z^m - a1 z^(m-1) - ... - am, lowest degree first
    let mut polynomial: Vec<f64> = coefficients.iter().rev().map(|c| -c).collect();
    polynomial.push(1.0);

    let mut roots = polynomial_roots(&polynomial);
    for root in roots.iter_mut() {
        polish_root(&polynomial, root);
        let radius = root.norm();
        if radius > 1.0 {
            *root /= radius * radius;
        }
    }

    let mut formants: Vec<FormantCandidate> = roots
        .iter()
        .filter(|root| root.im >= 0.0)
        .filter_map(|root| {
            let frequency = root.im.atan2(root.re).abs() * nyquist / PI;
            if !(SAFETY_MARGIN_HZ..=nyquist - SAFETY_MARGIN_HZ).contains(&frequency) {
                return None;
            }
            let radius = root.norm();
            let bandwidth = if radius > 0.0 {
                -radius.ln() * nyquist / PI
            } else {
                nyquist
            };
            Some(FormantCandidate { frequency, bandwidth })
        })
        .collect();

    formants.sort_by(|a, b| a.frequency.total_cmp(&b.frequency));
    formants
}

/// Horner evaluation of a real polynomial and its derivative at `z`
fn evaluate_with_derivative(polynomial: &[f64], z: Complex<f64>) -> (Complex<f64>, Complex<f64>) {
    let mut value = Complex::new(0.0, 0.0);
    let mut derivative = Complex::new(0.0, 0.0);
    for &c in polynomial.iter().rev() {
        derivative = derivative * z + value;
        value = value * z + c;
    }
    (value, derivative)
}

/// Newton-Raphson polishing that stops as soon as the residual stops shrinking
fn polish_root(polynomial: &[f64], root: &mut Complex<f64>) {
    let mut best = *root;
    let mut best_residual = f64::MAX;

    for _ in 0..POLISH_ITERATIONS {
        let (value, derivative) = evaluate_with_derivative(polynomial, *root);
        let residual = value.norm();
        if residual >= best_residual {
            break;
        }
        best = *root;
        best_residual = residual;
        if derivative.norm() == 0.0 {
            break;
        }
        *root -= value / derivative;
    }
    *root = best;
}

/// Roots of a polynomial (lowest degree first) from its companion matrix
fn polynomial_roots(coefficients: &[f64]) -> Vec<Complex<f64>> {
    let degree = match coefficients.iter().rposition(|c| c.abs() > 1e-15) {
        Some(d) if d > 0 => d,
        _ => return Vec::new(),
    };
    let leading = coefficients[degree];
    if coefficients[..degree].iter().all(|c| c.abs() <= 1e-15) {
        // z^degree: every root is zero
        return vec![Complex::new(0.0, 0.0); degree];
    }

    let mut companion = DMatrix::<f64>::zeros(degree, degree);
    for i in 1..degree {
        companion[(i, i - 1)] = 1.0;
    }
    for i in 0..degree {
        companion[(i, degree - 1)] = -coefficients[i] / leading;
    }

    companion
        .complex_eigenvalues()
        .iter()
        .map(|c| Complex::new(c.re, c.im))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_lpc_burg_basic() {
        let samples: Vec<f64> = (0..100)
            .map(|i| (2.0 * PI * 440.0 * i as f64 / 8000.0).sin())
            .collect();

        let result = lpc_burg(&samples, 10).unwrap();
        assert_eq!(result.coefficients.len(), 10);
        assert!(result.gain >= 0.0);
    }

    #[test]
    fn test_lpc_burg_recovers_ar2_process() {
        // x[n] = 1.2 x[n-1] - 0.5 x[n-2] + e[n], e uniform from a fixed LCG
        let mut state: u64 = 12345;
        let mut noise = || {
            state = state
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            (state >> 11) as f64 / (1u64 << 53) as f64 - 0.5
        };
        let mut samples = vec![0.0, 0.0];
        for i in 2..4002 {
            let next = 1.2 * samples[i - 1] - 0.5 * samples[i - 2] + noise();
            samples.push(next);
        }

        let result = lpc_burg(&samples, 2).unwrap();
        assert_relative_eq!(result.coefficients[0], 1.2, epsilon = 0.05);
        assert_relative_eq!(result.coefficients[1], -0.5, epsilon = 0.05);
    }

    #[test]
    fn test_polynomial_roots_quadratic() {
        // x^2 - 5x + 6 = 0 has roots 2 and 3
        let mut roots: Vec<f64> = polynomial_roots(&[6.0, -5.0, 1.0]).iter().map(|r| r.re).collect();
        roots.sort_by(f64::total_cmp);

        assert_relative_eq!(roots[0], 2.0, epsilon = 1e-10);
        assert_relative_eq!(roots[1], 3.0, epsilon = 1e-10);
    }

    #[test]
    fn test_polynomial_roots_complex() {
        // x^2 + 1 = 0 has roots i and -i
        let roots = polynomial_roots(&[1.0, 0.0, 1.0]);
        assert_eq!(roots.len(), 2);
        for root in &roots {
            assert_relative_eq!(root.re, 0.0, epsilon = 1e-10);
            assert_relative_eq!(root.im.abs(), 1.0, epsilon = 1e-10);
        }
    }

    #[test]
    fn test_single_resonance_to_formant() {
        // One pole pair at 1000 Hz with radius 0.95, fs = 10 kHz
        let fs = 10000.0;
        let radius: f64 = 0.95;
        let theta = 2.0 * PI * 1000.0 / fs;
        // Burg convention: x[n] = a1 x[n-1] + a2 x[n-2]
        let coefficients = [2.0 * radius * theta.cos(), -radius * radius];

        let formants = lpc_to_formants(&coefficients, fs);
        assert_eq!(formants.len(), 1);
        assert_relative_eq!(formants[0].frequency, 1000.0, epsilon = 1e-6);
        assert_relative_eq!(formants[0].bandwidth, -radius.ln() * fs / (2.0 * PI), epsilon = 1e-6);
    }
}
