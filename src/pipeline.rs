//! End-to-end embedding pipeline.
//!
//! Owns a loaded [`XVector`] model and turns WAV files into embedding
//! vectors:
//! 1. Read the WAV and downmix to the configured channel count
//! 2. Deinterleave into a `(1, channel, sample)` tensor
//! 3. Run the model
//! 4. Return the embedding as a plain `Vec<f32>`
//!
//! Weights load from a local safetensors file or from a HuggingFace Hub
//! snapshot. Expected parameter layout:
//!
//! ```text
//! sincnet.{wav_norm,norm1,norm2,norm3}.{weight,bias}
//! sincnet.sinc.{low_hz,band_hz}
//! sincnet.{conv2,conv3}.{weight,bias}
//! frame{1..5}.temporal_conv.{weight,bias}
//! segment{6,7}.{weight,bias}
//! ```

use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use std::path::Path;

use crate::audio::{downmix_mono, read_wav, waveform_tensor};
use crate::config::XVectorConfig;
use crate::model::xvector::XVector;
use crate::{Error, Result};

/// Name of the weights file in a hub snapshot.
const WEIGHTS_FILE: &str = "model.safetensors";
/// Name of the optional config file in a hub snapshot.
const CONFIG_FILE: &str = "config.json";

/// A loaded model plus the device it runs on.
pub struct EmbeddingPipeline {
    model: XVector,
    device: Device,
}

impl EmbeddingPipeline {
    /// Wrap an already-constructed model.
    pub fn new(model: XVector, device: Device) -> Self {
        Self { model, device }
    }

    /// Load weights from a local safetensors file.
    pub fn from_safetensors(
        path: impl AsRef<Path>,
        config: XVectorConfig,
        device: &Device,
        dtype: DType,
    ) -> Result<Self> {
        let path = path.as_ref();
        tracing::info!(path = %path.display(), "loading X-Vector weights");
        let vb = unsafe {
            VarBuilder::from_mmaped_safetensors(&[path], dtype, device)
                .map_err(|e| Error::WeightLoad(format!("{}: {e}", path.display())))?
        };
        let model = XVector::new(config, None, vb)?;
        Ok(Self::new(model, device.clone()))
    }

    /// Download a pretrained snapshot from the HuggingFace Hub and load it.
    ///
    /// The snapshot must contain `model.safetensors`; a `config.json` next
    /// to it overrides the default configuration.
    pub fn from_hub(repo_id: &str, device: &Device, dtype: DType) -> Result<Self> {
        tracing::info!(repo = repo_id, "fetching model snapshot from HuggingFace");
        let api = hf_hub::api::sync::Api::new().map_err(|e| Error::HfHub(e.to_string()))?;
        let repo = api.model(repo_id.to_string());

        let config = match repo.get(CONFIG_FILE) {
            Ok(path) => serde_json::from_reader(std::fs::File::open(path)?)?,
            Err(_) => {
                tracing::debug!("no config.json in snapshot, using the reference configuration");
                XVectorConfig::default()
            }
        };
        let weights = repo
            .get(WEIGHTS_FILE)
            .map_err(|e| Error::HfHub(format!("{repo_id}/{WEIGHTS_FILE}: {e}")))?;
        Self::from_safetensors(weights, config, device, dtype)
    }

    /// The wrapped model.
    pub fn model(&self) -> &XVector {
        &self.model
    }

    /// Embed a batch of waveforms shaped `(batch, channel, sample)`.
    pub fn embed_waveform(&self, waveforms: &Tensor) -> Result<Tensor> {
        self.model.embed(waveforms)
    }

    /// Embed one WAV file.
    ///
    /// The file's sample rate must match the configured rate (there is no
    /// resampler in this crate). Multi-channel files are downmixed by
    /// averaging when the model expects mono; otherwise the channel counts
    /// must agree.
    pub fn embed_file(&self, path: impl AsRef<Path>) -> Result<Vec<f32>> {
        let path = path.as_ref();
        let (samples, sample_rate, channels) = read_wav(path)?;
        let config = self.model.config();

        if sample_rate != config.sample_rate {
            return Err(Error::Audio(format!(
                "{} is sampled at {} Hz but the model expects {} Hz",
                path.display(),
                sample_rate,
                config.sample_rate
            )));
        }

        let channels = channels as usize;
        let (samples, channels) = if channels != config.num_channels {
            if config.num_channels == 1 {
                tracing::debug!(
                    path = %path.display(),
                    channels,
                    "downmixing to mono"
                );
                (downmix_mono(&samples, channels), 1)
            } else {
                return Err(Error::Audio(format!(
                    "{} has {} channels but the model expects {}",
                    path.display(),
                    channels,
                    config.num_channels
                )));
            }
        } else {
            (samples, channels)
        };

        let waveform = waveform_tensor(&samples, channels, &self.device)?;
        let embedding = self.model.embed(&waveform)?;
        Ok(embedding.flatten_all()?.to_vec1::<f32>()?)
    }
}

/// Cosine similarity between two embedding vectors.
///
/// Returns 0 when either vector has zero norm. Embeddings are not
/// normalized by the model, so this is the usual way to compare them.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::write_wav;

    fn pipeline() -> EmbeddingPipeline {
        let dev = Device::Cpu;
        let varmap = candle_nn::VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &dev);
        let model = XVector::new(XVectorConfig::default(), None, vb).unwrap();
        EmbeddingPipeline::new(model, dev)
    }

    fn tone(num_samples: usize, num_channels: usize) -> Vec<f32> {
        (0..num_samples * num_channels)
            .map(|i| (i as f32 * 0.05).sin() * 0.3)
            .collect()
    }

    #[test]
    fn embed_file_returns_embedding() {
        let p = pipeline();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mono.wav");
        write_wav(&path, &tone(6000, 1), 16000, 1).unwrap();
        let embedding = p.embed_file(&path).unwrap();
        assert_eq!(embedding.len(), 512);
    }

    #[test]
    fn stereo_file_is_downmixed() {
        let p = pipeline();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stereo.wav");
        write_wav(&path, &tone(6000, 2), 16000, 2).unwrap();
        let embedding = p.embed_file(&path).unwrap();
        assert_eq!(embedding.len(), 512);
    }

    #[test]
    fn sample_rate_mismatch_rejected() {
        let p = pipeline();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("slow.wav");
        write_wav(&path, &tone(6000, 1), 8000, 1).unwrap();
        assert!(matches!(p.embed_file(&path), Err(Error::Audio(_))));
    }

    #[test]
    fn cosine_similarity_identity() {
        let v = vec![0.3f32, -1.2, 4.0, 0.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_similarity_orthogonal() {
        let a = vec![1.0f32, 0.0];
        let b = vec![0.0f32, 1.0];
        assert!(cosine_similarity(&a, &b).abs() < 1e-6);
    }

    #[test]
    fn cosine_similarity_zero_norm() {
        let a = vec![0.0f32, 0.0];
        let b = vec![1.0f32, 1.0];
        assert_eq!(cosine_similarity(&a, &b), 0.0);
    }
}
