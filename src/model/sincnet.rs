//! SincNet front-end: raw waveform → frame-level features.
//!
//! Three convolutional stages, each followed by max-pooling, instance
//! normalization and leaky ReLU:
//!
//! ```text
//! waveform [B, C, S]
//!   → instance norm
//!   → sinc filterbank conv (C → 80, k=251, stride=10) → |·|
//!   → pool(3) → norm → leaky ReLU
//!   → conv1d (80 → 60, k=5) → pool(3) → norm → leaky ReLU
//!   → conv1d (60 → 60, k=5) → pool(3) → norm → leaky ReLU
//! output [B, 60, frames]
//! ```
//!
//! The first stage is a parameterized sinc filterbank: each of the 80
//! filters is an ideal band-pass whose low cutoff and bandwidth are the
//! learnable parameters, windowed by a Hamming window. Filters are
//! materialized from the cutoffs on every forward pass.

use candle_core::{D, Module, Tensor};
use candle_nn::{self as nn, VarBuilder, init::Init, ops::leaky_relu};

use crate::config::{SincNetConfig, XVectorConfig};
use crate::{Error, Result};

const LEAKY_SLOPE: f64 = 0.01;
const NORM_EPS: f64 = 1e-5;

/// Per-channel instance normalization over the time axis, with affine
/// scale and shift.
#[derive(Debug, Clone)]
struct InstanceNorm1d {
    weight: Tensor,
    bias: Tensor,
    channels: usize,
}

impl InstanceNorm1d {
    fn new(channels: usize, vb: VarBuilder) -> Result<Self> {
        let weight = vb.get_with_hints(channels, "weight", Init::Const(1.0))?;
        let bias = vb.get_with_hints(channels, "bias", Init::Const(0.0))?;
        Ok(Self {
            weight,
            bias,
            channels,
        })
    }

    /// Input and output: `[B, C, T]`.
    fn forward(&self, x: &Tensor) -> Result<Tensor> {
        let mean = x.mean_keepdim(D::Minus1)?;
        let centered = x.broadcast_sub(&mean)?;
        let var = centered.sqr()?.mean_keepdim(D::Minus1)?;
        let normed = centered.broadcast_div(&(&var + NORM_EPS)?.sqrt()?)?;
        let weight = self.weight.reshape((1, self.channels, 1))?;
        let bias = self.bias.reshape((1, self.channels, 1))?;
        Ok(normed.broadcast_mul(&weight)?.broadcast_add(&bias)?)
    }
}

/// Parameterized sinc band-pass filterbank convolution.
///
/// Learnable parameters are `low_hz` and `band_hz`, both `(num_filters, 1)`.
/// Fresh parameters draw random band edges; pretrained checkpoints replace
/// them.
#[derive(Debug, Clone)]
struct SincConv {
    low_hz: Tensor,
    band_hz: Tensor,
    /// `2π · n / sample_rate` for the negative half of the kernel, divided
    /// by 2 — the left-lobe denominator. Shape `(1, (k−1)/2)`.
    n_half: Tensor,
    /// Hamming window over the left half of the kernel. Shape `(1, (k−1)/2)`.
    window: Tensor,
    kernel_size: usize,
    stride: usize,
    in_channels: usize,
    sample_rate: f64,
    min_low_hz: f64,
    min_band_hz: f64,
}

impl SincConv {
    fn new(config: &SincNetConfig, sample_rate: u32, in_channels: usize, vb: VarBuilder) -> Result<Self> {
        let sample_rate = sample_rate as f64;
        let num_filters = config.num_filters;
        let kernel_size = config.kernel_size;
        let half = (kernel_size - 1) / 2;

        let max_hz = sample_rate / 2.0 - (config.min_low_hz + config.min_band_hz);
        let low_hz = vb.get_with_hints(
            (num_filters, 1),
            "low_hz",
            Init::Uniform {
                lo: 0.0,
                up: max_hz,
            },
        )?;
        let band_hz = vb.get_with_hints(
            (num_filters, 1),
            "band_hz",
            Init::Uniform {
                lo: 0.0,
                up: max_hz / num_filters as f64,
            },
        )?;

        let n: Vec<f32> = (0..half)
            .map(|i| {
                let t = (i as f64 - half as f64) * 2.0 * std::f64::consts::PI / sample_rate;
                (t / 2.0) as f32
            })
            .collect();
        let n_half = Tensor::from_vec(n, (1, half), vb.device())?.to_dtype(vb.dtype())?;

        let window: Vec<f32> = (0..half)
            .map(|i| {
                let arg = 2.0 * std::f64::consts::PI * i as f64 / kernel_size as f64;
                (0.54 - 0.46 * arg.cos()) as f32
            })
            .collect();
        let window = Tensor::from_vec(window, (1, half), vb.device())?.to_dtype(vb.dtype())?;

        Ok(Self {
            low_hz,
            band_hz,
            n_half,
            window,
            kernel_size,
            stride: config.stride,
            in_channels,
            sample_rate,
            min_low_hz: config.min_low_hz,
            min_band_hz: config.min_band_hz,
        })
    }

    /// Materialize the filterbank as a conv kernel `(num_filters, in_channels, k)`.
    fn filters(&self) -> Result<Tensor> {
        let low = (&self.low_hz.abs()? + self.min_low_hz)?;
        let high = ((&low + &self.band_hz.abs()?)? + self.min_band_hz)?
            .clamp(self.min_low_hz, self.sample_rate / 2.0)?;
        let band = (&high - &low)?; // (F, 1)

        // f·t products over the left half of the kernel: (F, 1) × (1, half).
        let f_low = low.broadcast_mul(&(&self.n_half * 2.0)?)?;
        let f_high = high.broadcast_mul(&(&self.n_half * 2.0)?)?;

        let left = f_high
            .sin()?
            .sub(&f_low.sin()?)?
            .broadcast_div(&self.n_half)?
            .broadcast_mul(&self.window)?;
        let center = (&band * 2.0)?;
        let right = left.flip(&[1])?;

        let band_pass = Tensor::cat(&[&left, &center, &right], 1)?;
        let band_pass = band_pass.broadcast_div(&(&band * 2.0)?)?;

        let num_filters = self.low_hz.dim(0)?;
        let filters = band_pass.reshape((num_filters, 1, self.kernel_size))?;
        // Multi-channel waveforms are filtered jointly: every filter spans
        // all input channels, as a Conv1d with in_channels > 1 would.
        if self.in_channels > 1 {
            Ok(filters.repeat((1, self.in_channels, 1))?)
        } else {
            Ok(filters)
        }
    }

    fn forward(&self, x: &Tensor) -> Result<Tensor> {
        let filters = self.filters()?;
        Ok(x.conv1d(&filters, 0, self.stride, 1, 1)?)
    }
}

/// The SincNet front-end.
#[derive(Debug, Clone)]
pub struct SincNet {
    wav_norm: InstanceNorm1d,
    sinc: SincConv,
    norm1: InstanceNorm1d,
    conv2: nn::Conv1d,
    norm2: InstanceNorm1d,
    conv3: nn::Conv1d,
    norm3: InstanceNorm1d,
    config: SincNetConfig,
    num_channels: usize,
}

impl SincNet {
    pub fn new(config: &XVectorConfig, vb: VarBuilder) -> Result<Self> {
        let sn = &config.sincnet;
        let wav_norm = InstanceNorm1d::new(config.num_channels, vb.pp("wav_norm"))?;
        let sinc = SincConv::new(sn, config.sample_rate, config.num_channels, vb.pp("sinc"))?;
        let norm1 = InstanceNorm1d::new(sn.num_filters, vb.pp("norm1"))?;
        let conv2 = nn::conv1d(
            sn.num_filters,
            sn.out_channels,
            sn.conv_kernel_size,
            Default::default(),
            vb.pp("conv2"),
        )?;
        let norm2 = InstanceNorm1d::new(sn.out_channels, vb.pp("norm2"))?;
        let conv3 = nn::conv1d(
            sn.out_channels,
            sn.out_channels,
            sn.conv_kernel_size,
            Default::default(),
            vb.pp("conv3"),
        )?;
        let norm3 = InstanceNorm1d::new(sn.out_channels, vb.pp("norm3"))?;
        Ok(Self {
            wav_norm,
            sinc,
            norm1,
            conv2,
            norm2,
            conv3,
            norm3,
            config: sn.clone(),
            num_channels: config.num_channels,
        })
    }

    /// Output channel width (the first context stage consumes this).
    pub fn output_channels(&self) -> usize {
        self.config.out_channels
    }

    /// Number of output frames for `num_samples` input samples, or `None`
    /// when the input is shorter than the receptive field.
    pub fn num_frames(&self, num_samples: usize) -> Option<usize> {
        let n = conv_frames(num_samples, self.config.kernel_size, self.config.stride)?;
        let n = pool_frames(n, self.config.pool_size)?;
        let n = conv_frames(n, self.config.conv_kernel_size, 1)?;
        let n = pool_frames(n, self.config.pool_size)?;
        let n = conv_frames(n, self.config.conv_kernel_size, 1)?;
        pool_frames(n, self.config.pool_size)
    }

    /// Smallest sample count producing at least one output frame.
    pub fn min_num_samples(&self) -> usize {
        self.min_samples_for_frames(1)
    }

    /// Smallest sample count producing at least `min_frames` output frames.
    pub fn min_samples_for_frames(&self, min_frames: usize) -> usize {
        let frames = |s: usize| self.num_frames(s).unwrap_or(0);
        let mut hi = self.config.kernel_size;
        while frames(hi) < min_frames {
            hi *= 2;
        }
        let mut lo = 1;
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            if frames(mid) < min_frames {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        lo
    }

    /// Forward pass.
    ///
    /// Input: `[B, num_channels, S]` → Output: `[B, out_channels, frames]`.
    pub fn forward(&self, x: &Tensor) -> Result<Tensor> {
        let (_b, channels, samples) = x.dims3().map_err(|_| {
            Error::ShapeMismatch(format!(
                "SincNet expects a rank-3 (batch, channel, sample) tensor, got {:?}",
                x.shape()
            ))
        })?;
        if channels != self.num_channels {
            return Err(Error::ShapeMismatch(format!(
                "SincNet expects {} waveform channels, got {}",
                self.num_channels, channels
            )));
        }
        if self.num_frames(samples).is_none() {
            return Err(Error::ShapeMismatch(format!(
                "waveform of {} samples is shorter than the front-end receptive \
                 field ({} samples minimum)",
                samples,
                self.min_num_samples()
            )));
        }

        let pool = self.config.pool_size;
        let x = self.wav_norm.forward(x)?;
        let x = self.sinc.forward(&x)?.abs()?;
        let x = leaky_relu(&self.norm1.forward(&max_pool1d(&x, pool)?)?, LEAKY_SLOPE)?;
        let x = self.conv2.forward(&x)?;
        let x = leaky_relu(&self.norm2.forward(&max_pool1d(&x, pool)?)?, LEAKY_SLOPE)?;
        let x = self.conv3.forward(&x)?;
        let x = leaky_relu(&self.norm3.forward(&max_pool1d(&x, pool)?)?, LEAKY_SLOPE)?;
        Ok(x)
    }
}

/// Valid (no-padding) conv output length.
fn conv_frames(n: usize, kernel: usize, stride: usize) -> Option<usize> {
    if n < kernel {
        None
    } else {
        Some((n - kernel) / stride + 1)
    }
}

/// Max-pool output length with stride = kernel.
fn pool_frames(n: usize, kernel: usize) -> Option<usize> {
    if n < kernel { None } else { Some(n / kernel) }
}

/// Max-pool over the time axis of a `[B, C, T]` tensor.
fn max_pool1d(x: &Tensor, kernel: usize) -> Result<Tensor> {
    Ok(x.unsqueeze(2)?.max_pool2d((1, kernel))?.squeeze(2)?)
}
