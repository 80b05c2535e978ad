//! Interpolation of frame-based tracks at arbitrary positions
//!
//! Tracks may contain undefined (NaN) frames, e.g. where no formant candidate
//! survived. A query is undefined when the frame nearest to it is undefined;
//! an undefined far neighbour only switches linear interpolation off.

/// Interpolation methods
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Interpolation {
    /// Value of the nearest frame
    Nearest,
    /// Linear interpolation between the nearest frame and its other neighbour
    #[default]
    Linear,
}

impl Interpolation {
    /// Interpolate at fractional frame `position` (0.0 = centre of first frame)
    ///
    /// Positions up to half a frame beyond either end are accepted and take the
    /// edge value. Returns `None` further out, or when the nearest frame is
    /// undefined.
    pub fn interpolate_with_undefined(self, samples: &[f64], position: f64) -> Option<f64> {
        let n = samples.len();
        if n == 0 || position < -0.5 || position >= n as f64 - 0.5 {
            return None;
        }

        let left = position.floor();
        let phase = position - left;
        let (near, far, weight) = if phase < 0.5 {
            (left, left + 1.0, phase)
        } else {
            (left + 1.0, left, 1.0 - phase)
        };

        let frame = |index: f64| -> Option<f64> {
            if index < 0.0 || index >= n as f64 {
                return None;
            }
            let value = samples[index as usize];
            (!value.is_nan()).then_some(value)
        };

        let near_value = frame(near)?;
        match self {
            Interpolation::Nearest => Some(near_value),
            Interpolation::Linear => Some(match frame(far) {
                Some(far_value) => near_value + weight * (far_value - near_value),
                None => near_value,
            }),
        }
    }
}
