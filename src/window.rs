//! Analysis window for Burg formant frames

/// Gaussian window used for formant frames
///
/// `w[i] = (exp(-48 (i - imid)² / (n + 1)²) - e) / (1 - e)` with `e = exp(-12)`,
/// so the window falls to exactly zero just outside both ends.
pub fn gaussian_formant_window(size: usize) -> Vec<f64> {
    let edge = (-12.0_f64).exp();
    let imid = (size as f64 - 1.0) / 2.0;
    let denom = (size + 1) as f64;

    (0..size)
        .map(|i| {
            let diff = i as f64 - imid;
            let gaussian = (-48.0 * diff * diff / (denom * denom)).exp();
            (gaussian - edge) / (1.0 - edge)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_gaussian_formant_window_shape() {
        let window = gaussian_formant_window(551);
        assert_eq!(window.len(), 551);

        for i in 0..275 {
            assert_relative_eq!(window[i], window[550 - i], epsilon = 1e-12);
        }
        assert_relative_eq!(window[275], 1.0, epsilon = 1e-12);
        assert!(window[0] > 0.0 && window[0] < 1e-4);
    }

    #[test]
    fn test_empty_window() {
        assert!(gaussian_formant_window(0).is_empty());
    }
}
