//! X-Vector speaker embeddings in pure Rust.
//!
//! A candle-based implementation of the X-Vector speaker-embedding
//! architecture. Loads safetensors weights directly and maps a raw
//! waveform to a fixed-size vector summarizing speaker identity,
//! usable downstream for verification, clustering, or diarization.
//!
//! ## Architecture
//!
//! ```text
//! waveform (batch, channel, sample)
//!         ↓
//! SincNet front-end (learnable sinc filterbank → 60 channels)
//!         ↓
//! 5 × TDNN context stages (60 → 512 → 512 → 512 → 512 → 1500)
//!         ↓
//! statistics pooling (mean ‖ std over time → 3000)
//!         ↓
//! segment6 (3000 → 512) → segment7 (512 → 512)
//!         ↓
//! embedding (batch, 512)
//! ```
//!
//! ## Modules
//!
//! - [`audio`] — WAV I/O, channel downmix, waveform tensors
//! - [`model`] — SincNet front-end, TDNN stages, stats pooling, the
//!   composed [`model::xvector::XVector`] network
//! - [`pipeline`] — weight loading and end-to-end file embedding
//! - [`task`] — the embedding-task collaborator used for construction-time
//!   output-shape inference

pub mod audio;
pub mod config;
pub mod model;
pub mod pipeline;
pub mod task;

mod error;

pub use config::XVectorConfig;
pub use error::{Error, Result};
pub use model::xvector::XVector;
