//! Configuration for the X-Vector embedding model.
//!
//! The defaults reproduce the reference configuration exactly: a SincNet
//! front-end emitting 60 channels, five TDNN context stages widening
//! 60 → 512 → 512 → 512 → 512 → 1500, statistics pooling to 3000, and two
//! segment layers projecting 3000 → 512 → 512. The stage sequence and each
//! stage's declared width IS the architecture — [`XVectorConfig::validate`]
//! enforces the channel chain at construction so a mismatch surfaces as a
//! deterministic configuration error instead of a downstream tensor error.

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// SincNet front-end configuration.
///
/// Three convolutional stages, each followed by max-pooling, instance
/// normalization and leaky ReLU:
///
/// ```text
/// sinc filterbank (1 → num_filters, k=kernel_size, stride)  + |·|
/// conv1d (num_filters → out_channels, k=conv_kernel_size)
/// conv1d (out_channels → out_channels, k=conv_kernel_size)
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SincNetConfig {
    /// Number of learnable sinc band-pass filters.
    pub num_filters: usize,
    /// Sinc filter length in samples. Must be odd (symmetric filters).
    pub kernel_size: usize,
    /// Stride of the sinc convolution.
    pub stride: usize,
    /// Lower bound on filter low cutoff, in Hz.
    pub min_low_hz: f64,
    /// Lower bound on filter bandwidth, in Hz.
    pub min_band_hz: f64,
    /// Kernel size of the two plain conv stages.
    pub conv_kernel_size: usize,
    /// Max-pool window (and stride) after every conv stage.
    pub pool_size: usize,
    /// Output channel width. The first context stage consumes this.
    pub out_channels: usize,
}

impl Default for SincNetConfig {
    fn default() -> Self {
        Self {
            num_filters: 80,
            kernel_size: 251,
            stride: 10,
            min_low_hz: 50.0,
            min_band_hz: 50.0,
            conv_kernel_size: 5,
            pool_size: 3,
            out_channels: 60,
        }
    }
}

/// Configuration of one TDNN context stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TdnnConfig {
    /// Context offsets relative to the current frame, sorted ascending.
    pub context: Vec<i64>,
    /// Declared input channel width.
    pub input_channels: usize,
    /// Output channel width.
    pub output_channels: usize,
    /// When set, the offsets define one aggregate window: the stage uses a
    /// contiguous kernel spanning `max − min + 1` frames. When unset, the
    /// offsets are applied as-is via a dilated kernel and must be evenly
    /// spaced.
    pub full_context: bool,
}

impl TdnnConfig {
    /// Derive the conv kernel size and dilation implementing `context`.
    pub fn kernel_and_dilation(&self) -> Result<(usize, usize)> {
        if self.context.is_empty() {
            return Err(Error::Config("TDNN context must not be empty".into()));
        }
        if !self.context.is_sorted() {
            return Err(Error::Config(format!(
                "TDNN context must be sorted ascending, got {:?}",
                self.context
            )));
        }
        let first = self.context[0];
        let last = self.context[self.context.len() - 1];
        if self.full_context {
            return Ok(((last - first) as usize + 1, 1));
        }
        if self.context.len() == 1 {
            return Ok((1, 1));
        }
        let delta = (self.context[1] - first) as usize;
        let evenly_spaced = self
            .context
            .windows(2)
            .all(|w| (w[1] - w[0]) as usize == delta);
        if delta == 0 || !evenly_spaced {
            return Err(Error::Config(format!(
                "TDNN context offsets must be evenly spaced when full_context \
                 is unset, got {:?}",
                self.context
            )));
        }
        Ok((self.context.len(), delta))
    }

    /// Frames consumed by this stage's window: output = input − reduction.
    pub fn frame_reduction(&self) -> Result<usize> {
        let (kernel, dilation) = self.kernel_and_dilation()?;
        Ok(dilation * (kernel - 1))
    }
}

/// Top-level model configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct XVectorConfig {
    /// Expected waveform sample rate in Hz.
    pub sample_rate: u32,
    /// Expected waveform channel count.
    pub num_channels: usize,
    /// Front-end configuration.
    pub sincnet: SincNetConfig,
    /// The five context stages, in execution order.
    pub frames: Vec<TdnnConfig>,
    /// Output widths of the two segment (projection) layers. The second is
    /// the embedding dimension.
    pub segment_dims: [usize; 2],
}

impl Default for XVectorConfig {
    fn default() -> Self {
        let frame = |context: &[i64], input, output, full_context| TdnnConfig {
            context: context.to_vec(),
            input_channels: input,
            output_channels: output,
            full_context,
        };
        Self {
            sample_rate: 16_000,
            num_channels: 1,
            sincnet: SincNetConfig::default(),
            frames: vec![
                frame(&[-2, 2], 60, 512, true),
                frame(&[-2, 0, 2], 512, 512, false),
                frame(&[-3, 0, 3], 512, 512, false),
                frame(&[0], 512, 512, true),
                frame(&[0], 512, 1500, true),
            ],
            segment_dims: [512, 512],
        }
    }
}

impl XVectorConfig {
    /// The width of the final embedding.
    pub fn embedding_dim(&self) -> usize {
        self.segment_dims[1]
    }

    /// The width of the pooled statistics vector (mean ‖ std).
    pub fn pooled_dim(&self) -> usize {
        2 * self.frames.last().map_or(0, |f| f.output_channels)
    }

    /// Verify construction parameters and the channel chain.
    ///
    /// Every adjacent stage pair must agree on channel width: the SincNet
    /// output feeds the first context stage, each context stage feeds the
    /// next, and twice the last stage's width feeds the first segment layer.
    pub fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(Error::Config("sample_rate must be positive".into()));
        }
        if self.num_channels == 0 {
            return Err(Error::Config("num_channels must be positive".into()));
        }
        if self.sincnet.num_filters == 0 || self.sincnet.out_channels == 0 {
            return Err(Error::Config("sincnet channel widths must be positive".into()));
        }
        if self.sincnet.kernel_size < 3 || self.sincnet.kernel_size % 2 == 0 {
            return Err(Error::Config(format!(
                "sincnet kernel_size must be odd and >= 3, got {}",
                self.sincnet.kernel_size
            )));
        }
        if self.sincnet.stride == 0 || self.sincnet.pool_size == 0 {
            return Err(Error::Config("sincnet stride and pool_size must be positive".into()));
        }
        if self.frames.is_empty() {
            return Err(Error::Config("at least one context stage is required".into()));
        }

        let mut width = self.sincnet.out_channels;
        for (i, frame) in self.frames.iter().enumerate() {
            if frame.input_channels != width {
                return Err(Error::Config(format!(
                    "context stage {} declares {} input channels but receives {}",
                    i + 1,
                    frame.input_channels,
                    width
                )));
            }
            if frame.output_channels == 0 {
                return Err(Error::Config(format!(
                    "context stage {} output width must be positive",
                    i + 1
                )));
            }
            frame.kernel_and_dilation()?;
            width = frame.output_channels;
        }

        if self.segment_dims.iter().any(|&d| d == 0) {
            return Err(Error::Config("segment widths must be positive".into()));
        }
        Ok(())
    }
}
