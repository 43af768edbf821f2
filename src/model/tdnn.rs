//! Time-delay neural network (TDNN) context stage.
//!
//! One parameterized stage type covers all five context stages of the
//! X-Vector network; only the configuration (offsets, widths, full-context
//! flag) differs per instance. The context offsets compile down to a 1D
//! convolution:
//!
//! ```text
//! full_context = true   → contiguous kernel spanning max − min + 1 frames
//! full_context = false  → kernel of len(context) taps, dilation = spacing
//! ```
//!
//! Either way the stage slides over the time axis, producing one output
//! frame per valid window position, followed by ReLU.

use candle_core::{Module, Tensor};
use candle_nn::{self as nn, Conv1dConfig, VarBuilder};

use crate::config::TdnnConfig;
use crate::{Error, Result};

/// One TDNN context stage: dilated `Conv1d` + ReLU.
#[derive(Debug, Clone)]
pub struct Tdnn {
    temporal_conv: nn::Conv1d,
    input_channels: usize,
    output_channels: usize,
    kernel_size: usize,
    dilation: usize,
}

impl Tdnn {
    pub fn new(config: &TdnnConfig, vb: VarBuilder) -> Result<Self> {
        let (kernel_size, dilation) = config.kernel_and_dilation()?;
        let conv_cfg = Conv1dConfig {
            dilation,
            ..Default::default()
        };
        let temporal_conv = nn::conv1d(
            config.input_channels,
            config.output_channels,
            kernel_size,
            conv_cfg,
            vb.pp("temporal_conv"),
        )?;
        Ok(Self {
            temporal_conv,
            input_channels: config.input_channels,
            output_channels: config.output_channels,
            kernel_size,
            dilation,
        })
    }

    /// Declared input channel width.
    pub fn input_channels(&self) -> usize {
        self.input_channels
    }

    /// Output channel width.
    pub fn output_channels(&self) -> usize {
        self.output_channels
    }

    /// Frames consumed by the context window: output = input − reduction.
    pub fn frame_reduction(&self) -> usize {
        self.dilation * (self.kernel_size - 1)
    }

    /// Smallest number of input frames producing at least one output frame.
    pub fn min_frames(&self) -> usize {
        self.frame_reduction() + 1
    }

    /// Forward pass.
    ///
    /// Input: `[B, input_channels, T]` → Output: `[B, output_channels, T − reduction]`
    pub fn forward(&self, x: &Tensor) -> Result<Tensor> {
        let (_b, channels, frames) = x.dims3().map_err(|_| {
            Error::ShapeMismatch(format!(
                "TDNN expects a rank-3 (batch, channel, frame) tensor, got {:?}",
                x.shape()
            ))
        })?;
        if channels != self.input_channels {
            return Err(Error::ShapeMismatch(format!(
                "TDNN expects {} input channels, got {}",
                self.input_channels, channels
            )));
        }
        if frames < self.min_frames() {
            return Err(Error::ShapeMismatch(format!(
                "TDNN context window needs at least {} frames, got {}",
                self.min_frames(),
                frames
            )));
        }
        Ok(self.temporal_conv.forward(x)?.relu()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::{DType, Device};

    fn stage(context: &[i64], input: usize, output: usize, full: bool) -> Tdnn {
        let dev = Device::Cpu;
        let vb = VarBuilder::zeros(DType::F32, &dev);
        let cfg = TdnnConfig {
            context: context.to_vec(),
            input_channels: input,
            output_channels: output,
            full_context: full,
        };
        Tdnn::new(&cfg, vb.pp("frame")).unwrap()
    }

    #[test]
    fn full_context_window_slides() {
        let dev = Device::Cpu;
        let tdnn = stage(&[-2, 2], 8, 16, true);
        let x = Tensor::randn(0f32, 1.0, (2, 8, 20), &dev).unwrap();
        let y = tdnn.forward(&x).unwrap();
        assert_eq!(y.dims(), &[2, 16, 16]);
    }

    #[test]
    fn dilated_context_window() {
        let dev = Device::Cpu;
        let tdnn = stage(&[-3, 0, 3], 8, 8, false);
        assert_eq!(tdnn.frame_reduction(), 6);
        let x = Tensor::randn(0f32, 1.0, (1, 8, 10), &dev).unwrap();
        let y = tdnn.forward(&x).unwrap();
        assert_eq!(y.dims(), &[1, 8, 4]);
    }

    #[test]
    fn single_offset_preserves_frames() {
        let dev = Device::Cpu;
        let tdnn = stage(&[0], 8, 32, true);
        let x = Tensor::randn(0f32, 1.0, (1, 8, 7), &dev).unwrap();
        let y = tdnn.forward(&x).unwrap();
        assert_eq!(y.dims(), &[1, 32, 7]);
    }

    #[test]
    fn output_is_rectified() {
        let dev = Device::Cpu;
        let varmap = candle_nn::VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &dev);
        let cfg = TdnnConfig {
            context: vec![-2, 0, 2],
            input_channels: 4,
            output_channels: 6,
            full_context: false,
        };
        let tdnn = Tdnn::new(&cfg, vb.pp("frame")).unwrap();
        let x = Tensor::randn(0f32, 1.0, (3, 4, 12), &dev).unwrap();
        let y = tdnn.forward(&x).unwrap();
        let min = y.flatten_all().unwrap().min(0).unwrap().to_scalar::<f32>().unwrap();
        assert!(min >= 0.0);
    }

    #[test]
    fn wrong_channel_count_rejected() {
        let dev = Device::Cpu;
        let tdnn = stage(&[0], 8, 8, true);
        let x = Tensor::randn(0f32, 1.0, (1, 4, 10), &dev).unwrap();
        assert!(matches!(tdnn.forward(&x), Err(Error::ShapeMismatch(_))));
    }

    #[test]
    fn too_few_frames_rejected() {
        let dev = Device::Cpu;
        let tdnn = stage(&[-2, 2], 8, 8, true);
        let x = Tensor::randn(0f32, 1.0, (1, 8, 4), &dev).unwrap();
        assert!(matches!(tdnn.forward(&x), Err(Error::ShapeMismatch(_))));
    }
}
