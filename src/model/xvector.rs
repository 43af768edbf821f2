//! The X-Vector embedding network.
//!
//! Fixed sequential composition, no branching and no recurrence:
//!
//! ```text
//! SincNet → frame1..frame5 (TDNN) → stats pool → segment6 → segment7
//! ```
//!
//! The per-stage channel widths and context windows come from
//! [`XVectorConfig`]; the chain is validated before any weights are
//! created, so a mismatched table fails as a configuration error rather
//! than a tensor error deep inside a forward pass.

use candle_core::{Module, Tensor};
use candle_nn::{self as nn, VarBuilder};

use crate::config::XVectorConfig;
use crate::model::pooling::StatsPool;
use crate::model::sincnet::SincNet;
use crate::model::tdnn::Tdnn;
use crate::task::EmbeddingTask;
use crate::{Error, Result};

/// The composed X-Vector network.
#[derive(Debug, Clone)]
pub struct XVector {
    sincnet: SincNet,
    frames: Vec<Tdnn>,
    stats_pool: StatsPool,
    segment6: nn::Linear,
    segment7: nn::Linear,
    config: XVectorConfig,
}

impl XVector {
    /// Build the network from a configuration.
    ///
    /// When `task` is supplied, the constructor runs one forward pass on
    /// the task's example input — after every stage exists and before
    /// returning — and assigns the resulting embedding to the task's
    /// `example_output`. An example input with the wrong channel count or
    /// too few samples therefore fails construction with a shape error.
    pub fn new(
        config: XVectorConfig,
        task: Option<&mut EmbeddingTask>,
        vb: VarBuilder,
    ) -> Result<Self> {
        config.validate()?;

        let sincnet = SincNet::new(&config, vb.pp("sincnet"))?;
        let mut frames = Vec::with_capacity(config.frames.len());
        for (i, frame) in config.frames.iter().enumerate() {
            frames.push(Tdnn::new(frame, vb.pp(format!("frame{}", i + 1)))?);
        }
        let segment6 = nn::linear(config.pooled_dim(), config.segment_dims[0], vb.pp("segment6"))?;
        let segment7 = nn::linear(
            config.segment_dims[0],
            config.segment_dims[1],
            vb.pp("segment7"),
        )?;

        let model = Self {
            sincnet,
            frames,
            stats_pool: StatsPool::new(),
            segment6,
            segment7,
            config,
        };

        if let Some(task) = task {
            task.example_output = Some(model.embed(&task.example_input)?);
        }

        Ok(model)
    }

    /// The width of the final embedding.
    pub fn embedding_dim(&self) -> usize {
        self.config.embedding_dim()
    }

    /// The configuration this network was built from.
    pub fn config(&self) -> &XVectorConfig {
        &self.config
    }

    /// Number of frames reaching the pooling stage for `num_samples`
    /// input samples, or `None` when the input is too short.
    pub fn num_frames(&self, num_samples: usize) -> Option<usize> {
        let mut frames = self.sincnet.num_frames(num_samples)?;
        for tdnn in &self.frames {
            frames = frames.checked_sub(tdnn.frame_reduction())?;
            if frames == 0 {
                return None;
            }
        }
        Some(frames)
    }

    /// Smallest sample count [`Self::embed`] accepts. Two frames must
    /// survive to the pooling stage (the unbiased std needs them).
    pub fn min_num_samples(&self) -> usize {
        let reduction: usize = self.frames.iter().map(Tdnn::frame_reduction).sum();
        self.sincnet.min_samples_for_frames(reduction + 2)
    }

    /// Compute the embedding for a batch of waveforms.
    ///
    /// Input: `[batch, num_channels, samples]` with `samples >=`
    /// [`Self::min_num_samples`]. Output: `[batch, embedding_dim]`.
    /// Pure with respect to the loaded parameters; safe to call
    /// concurrently from multiple threads.
    pub fn embed(&self, waveforms: &Tensor) -> Result<Tensor> {
        let (_b, channels, samples) = waveforms.dims3().map_err(|_| {
            Error::ShapeMismatch(format!(
                "expected a rank-3 (batch, channel, sample) waveform, got {:?}",
                waveforms.shape()
            ))
        })?;
        if channels != self.config.num_channels {
            return Err(Error::ShapeMismatch(format!(
                "model is configured for {} waveform channels, got {}",
                self.config.num_channels, channels
            )));
        }
        let min = self.min_num_samples();
        if samples < min {
            return Err(Error::ShapeMismatch(format!(
                "waveform of {samples} samples is too short, the context \
                 windows need at least {min}"
            )));
        }

        let mut outputs = self.sincnet.forward(waveforms)?;
        for frame in &self.frames {
            outputs = frame.forward(&outputs)?;
        }
        let pooled = self.stats_pool.forward(&outputs)?;
        let outputs = self.segment6.forward(&pooled.relu()?)?;
        Ok(self.segment7.forward(&outputs.relu()?)?)
    }
}
