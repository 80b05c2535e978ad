//! Covariance confidence ellipses for vowel-space scatter plots

use std::f64::consts::PI;

use nalgebra::Matrix2;

use crate::{Result, VowelError};

/// Sample covariance matrix (`n - 1` normalisation) of paired values
pub fn covariance(x: &[f64], y: &[f64]) -> Result<Matrix2<f64>> {
    if x.len() != y.len() {
        return Err(VowelError::InvalidParameter(format!(
            "x and y must be the same size ({} vs {})",
            x.len(),
            y.len()
        )));
    }
    let n = x.len();
    if n < 2 {
        return Err(VowelError::InvalidParameter(format!(
            "covariance needs at least 2 points, got {n}"
        )));
    }

    let mean_x = x.iter().sum::<f64>() / n as f64;
    let mean_y = y.iter().sum::<f64>() / n as f64;
    let (mut sxx, mut syy, mut sxy) = (0.0, 0.0, 0.0);
    for (&xi, &yi) in x.iter().zip(y) {
        let (dx, dy) = (xi - mean_x, yi - mean_y);
        sxx += dx * dx;
        syy += dy * dy;
        sxy += dx * dy;
    }
    let norm = (n - 1) as f64;
    Ok(Matrix2::new(sxx / norm, sxy / norm, sxy / norm, syy / norm))
}

/// Ellipse covering `n_std` standard deviations of a 2-D point cloud
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConfidenceEllipse {
    pub center_x: f64,
    pub center_y: f64,
    /// Full extent along the dominant axis
    pub width: f64,
    /// Full extent along the minor axis
    pub height: f64,
    /// Direction of the dominant axis in degrees, in `[0, 180)`
    pub angle_degrees: f64,
}

impl ConfidenceEllipse {
    /// Fit from the eigen-decomposition of the sample covariance:
    /// `width = 2·n_std·√λ₁`, `height = 2·n_std·√λ₂` with `λ₁ ≥ λ₂`
    pub fn fit(x: &[f64], y: &[f64], n_std: f64) -> Result<Self> {
        if !(n_std > 0.0 && n_std.is_finite()) {
            return Err(VowelError::InvalidParameter(format!(
                "n_std must be positive, got {n_std}"
            )));
        }
        let cov = covariance(x, y)?;
        let eigen = cov.symmetric_eigen();

        let (major, minor) = if eigen.eigenvalues[0] >= eigen.eigenvalues[1] {
            (0, 1)
        } else {
            (1, 0)
        };
        let direction = eigen.eigenvectors.column(major);
        let angle_degrees = direction[1].atan2(direction[0]).to_degrees().rem_euclid(180.0);

        let n = x.len() as f64;
        Ok(Self {
            center_x: x.iter().sum::<f64>() / n,
            center_y: y.iter().sum::<f64>() / n,
            // Rounding can leave a tiny negative eigenvalue for collinear points
            width: 2.0 * n_std * eigen.eigenvalues[major].max(0.0).sqrt(),
            height: 2.0 * n_std * eigen.eigenvalues[minor].max(0.0).sqrt(),
            angle_degrees,
        })
    }

    /// Points on the outline, counter-clockwise, first point not repeated
    pub fn outline(&self, segments: usize) -> Vec<(f64, f64)> {
        let (sin, cos) = self.angle_degrees.to_radians().sin_cos();
        let (a, b) = (self.width / 2.0, self.height / 2.0);
        (0..segments)
            .map(|i| {
                let t = 2.0 * PI * i as f64 / segments as f64;
                let (u, v) = (a * t.cos(), b * t.sin());
                (self.center_x + u * cos - v * sin, self.center_y + u * sin + v * cos)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    /// Four points with variances 4 (x) and 1 (y), no correlation
    fn cloud() -> (Vec<f64>, Vec<f64>) {
        let (a, b) = (6.0_f64.sqrt(), 1.5_f64.sqrt());
        (vec![a, -a, 0.0, 0.0], vec![0.0, 0.0, b, -b])
    }

    /// Distance of an angle from 0° modulo 180°
    fn off_horizontal(angle: f64) -> f64 {
        angle.min(180.0 - angle)
    }

    #[test]
    fn test_covariance() {
        let (x, y) = cloud();
        let cov = covariance(&x, &y).unwrap();
        assert_relative_eq!(cov[(0, 0)], 4.0, epsilon = 1e-12);
        assert_relative_eq!(cov[(1, 1)], 1.0, epsilon = 1e-12);
        assert_relative_eq!(cov[(0, 1)], 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_diagonal_covariance_ellipse() {
        let (x, y) = cloud();
        let ellipse = ConfidenceEllipse::fit(&x, &y, 2.0).unwrap();

        assert_relative_eq!(ellipse.width, 8.0, epsilon = 1e-9);
        assert_relative_eq!(ellipse.height, 4.0, epsilon = 1e-9);
        assert_relative_eq!(ellipse.width / ellipse.height, 2.0, epsilon = 1e-9);
        assert!(off_horizontal(ellipse.angle_degrees) < 1e-6, "{}", ellipse.angle_degrees);

        // Swapping the axes turns the dominant direction vertical
        let swapped = ConfidenceEllipse::fit(&y, &x, 2.0).unwrap();
        assert_relative_eq!(swapped.width / swapped.height, 2.0, epsilon = 1e-9);
        assert_relative_eq!(swapped.angle_degrees, 90.0, epsilon = 1e-6);
    }

    #[test]
    fn test_correlated_cloud_is_tilted() {
        let x = [1.0, 2.0, 3.0, 4.0, 5.0];
        let y = [1.1, 1.9, 3.2, 3.9, 5.1];
        let ellipse = ConfidenceEllipse::fit(&x, &y, 2.0).unwrap();

        assert!((ellipse.angle_degrees - 45.0).abs() < 5.0, "{}", ellipse.angle_degrees);
        assert!(ellipse.width > 5.0 * ellipse.height);
        assert_relative_eq!(ellipse.center_x, 3.0);
    }

    #[test]
    fn test_outline_lies_on_ellipse() {
        let (x, y) = cloud();
        let ellipse = ConfidenceEllipse::fit(&x, &y, 1.0).unwrap();
        let outline = ellipse.outline(64);
        assert_eq!(outline.len(), 64);

        let (a, b) = (ellipse.width / 2.0, ellipse.height / 2.0);
        for (px, py) in outline {
            // Axis-aligned, so the implicit equation applies directly
            let r = (px / a).powi(2) + (py / b).powi(2);
            assert_relative_eq!(r, 1.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_invalid_input() {
        assert!(ConfidenceEllipse::fit(&[1.0, 2.0], &[1.0], 2.0).is_err());
        assert!(ConfidenceEllipse::fit(&[1.0], &[1.0], 2.0).is_err());
        assert!(ConfidenceEllipse::fit(&[1.0, 2.0], &[1.0, 3.0], 0.0).is_err());
    }
}
