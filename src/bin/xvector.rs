//! X-Vector CLI — speaker embeddings from WAV files.
//!
//! Embeds one WAV file, or scores two against each other.
//!
//! # Output
//!
//! One JSON line on stdout:
//!
//! ```json
//! {"path":"a.wav","embedding_dim":512,"embedding":[...]}
//! {"paths":["a.wav","b.wav"],"similarity":0.83}
//! ```
//!
//! Exit code 0 on success, non-zero on error.

use clap::Parser;
use xvector_rs::XVectorConfig;
use xvector_rs::pipeline::{EmbeddingPipeline, cosine_similarity};

#[derive(Parser, Debug)]
#[command(
    name = "xvector",
    about = "X-Vector speaker embeddings",
    long_about = "Compute a speaker embedding for a WAV file, or the cosine\n\
                  similarity between the embeddings of two WAV files.\n\
                  Input audio must match the model sample rate (16 kHz by default)."
)]
struct Args {
    /// One WAV file to embed, or two to score against each other.
    #[arg(required = true, num_args = 1..=2)]
    inputs: Vec<String>,

    /// Local safetensors weights file.
    #[arg(long, short = 'w', conflicts_with = "repo")]
    weights: Option<String>,

    /// HuggingFace repository to download weights from.
    #[arg(long, short = 'r')]
    repo: Option<String>,

    /// Model configuration JSON. Defaults to the reference configuration.
    #[arg(long, short = 'c')]
    config: Option<String>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let config: XVectorConfig = match &args.config {
        Some(path) => serde_json::from_reader(std::fs::File::open(path)?)?,
        None => XVectorConfig::default(),
    };

    let device = candle_core::Device::cuda_if_available(0)?;
    let dtype = candle_core::DType::F32;
    tracing::info!("Using device: {:?}", device);

    let pipeline = match (&args.weights, &args.repo) {
        (Some(weights), _) => {
            EmbeddingPipeline::from_safetensors(weights, config, &device, dtype)?
        }
        (None, Some(repo)) => EmbeddingPipeline::from_hub(repo, &device, dtype)?,
        (None, None) => anyhow::bail!("either --weights or --repo is required"),
    };

    match args.inputs.as_slice() {
        [path] => {
            let embedding = pipeline.embed_file(path)?;
            let summary = serde_json::json!({
                "path": path,
                "embedding_dim": embedding.len(),
                "embedding": embedding,
            });
            println!("{summary}");
        }
        [a, b] => {
            let ea = pipeline.embed_file(a)?;
            let eb = pipeline.embed_file(b)?;
            let similarity = cosine_similarity(&ea, &eb);
            let summary = serde_json::json!({
                "paths": [a, b],
                "similarity": similarity,
            });
            println!("{summary}");
        }
        _ => unreachable!("clap enforces 1..=2 inputs"),
    }

    Ok(())
}
