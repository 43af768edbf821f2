//! Embedding-task collaborator.
//!
//! An embedding task needs the model's output width during its own setup,
//! which conventionally runs before the model could normally report its
//! output shape. [`crate::XVector::new`] solves this with a one-time
//! forward pass at construction: when a task is attached, the constructor
//! embeds the task's example input and assigns the result to
//! [`EmbeddingTask::example_output`] before returning.

use candle_core::Tensor;

/// Carrier for the construction-time shape-inference exchange.
#[derive(Debug, Clone)]
pub struct EmbeddingTask {
    /// Example waveform shaped `(batch, channel, sample)`, supplied by the
    /// task. Must match the model's configured channel count and minimum
    /// sample count, otherwise construction fails with a shape error.
    pub example_input: Tensor,

    /// Example embedding shaped `(batch, embedding_dim)`. `None` until a
    /// model is constructed with this task attached.
    pub example_output: Option<Tensor>,
}

impl EmbeddingTask {
    /// Create a task around an example input waveform.
    pub fn new(example_input: Tensor) -> Self {
        Self {
            example_input,
            example_output: None,
        }
    }
}
