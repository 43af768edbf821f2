//! Statistics pooling.
//!
//! Collapses the variable-length time axis into per-channel mean and
//! standard deviation, concatenated into one fixed-size vector. The
//! standard deviation uses Bessel's correction (divide by T − 1), matching
//! the reference implementation.

use candle_core::{D, Tensor};

use crate::{Error, Result};

/// Mean ‖ std pooling over the time axis. No learned parameters.
#[derive(Debug, Clone, Default)]
pub struct StatsPool;

impl StatsPool {
    pub fn new() -> Self {
        Self
    }

    /// Forward pass.
    ///
    /// Input: `[B, C, T]` with `T >= 2` → Output: `[B, 2C]` (mean ‖ std).
    pub fn forward(&self, x: &Tensor) -> Result<Tensor> {
        let (_b, _c, frames) = x.dims3().map_err(|_| {
            Error::ShapeMismatch(format!(
                "stats pooling expects a rank-3 (batch, channel, frame) tensor, got {:?}",
                x.shape()
            ))
        })?;
        if frames < 2 {
            return Err(Error::ShapeMismatch(format!(
                "stats pooling needs at least 2 frames for an unbiased std, got {frames}"
            )));
        }
        let mean = x.mean(D::Minus1)?;
        let centered = x.broadcast_sub(&mean.unsqueeze(D::Minus1)?)?;
        let var = (centered.sqr()?.sum(D::Minus1)? / (frames - 1) as f64)?;
        let std = var.sqrt()?;
        Ok(Tensor::cat(&[&mean, &std], 1)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::Device;

    #[test]
    fn pooled_shape() {
        let dev = Device::Cpu;
        let x = Tensor::randn(0f32, 1.0, (4, 1500, 23), &dev).unwrap();
        let y = StatsPool::new().forward(&x).unwrap();
        assert_eq!(y.dims(), &[4, 3000]);
    }

    #[test]
    fn known_statistics() {
        let dev = Device::Cpu;
        // One channel, frames [1, 2, 3, 4]: mean 2.5, std sqrt(5/3).
        let x = Tensor::new(&[[[1f32, 2.0, 3.0, 4.0]]], &dev).unwrap();
        let y = StatsPool::new().forward(&x).unwrap();
        let vals = y.flatten_all().unwrap().to_vec1::<f32>().unwrap();
        assert!((vals[0] - 2.5).abs() < 1e-6);
        assert!((vals[1] - (5.0f32 / 3.0).sqrt()).abs() < 1e-6);
    }

    #[test]
    fn constant_input_has_zero_std() {
        let dev = Device::Cpu;
        let x = Tensor::full(0.7f32, (2, 3, 10), &dev).unwrap();
        let y = StatsPool::new().forward(&x).unwrap();
        let vals = y.to_vec2::<f32>().unwrap();
        for row in vals {
            for (i, v) in row.iter().enumerate() {
                let expected = if i < 3 { 0.7 } else { 0.0 };
                assert!((v - expected).abs() < 1e-6);
            }
        }
    }

    #[test]
    fn single_frame_rejected() {
        let dev = Device::Cpu;
        let x = Tensor::randn(0f32, 1.0, (1, 8, 1), &dev).unwrap();
        assert!(matches!(
            StatsPool::new().forward(&x),
            Err(Error::ShapeMismatch(_))
        ));
    }
}
