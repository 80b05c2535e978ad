//! Low-level signal processing used by the formant tracker

pub mod fft;
pub mod lpc;

pub use fft::Fft;
pub use lpc::{lpc_burg, lpc_to_formants};
