//! WAV file I/O for speaker audio (16 kHz mono in the reference setup).

use candle_core::{Device, Tensor};
use std::path::Path;

use crate::Result;

/// Read a WAV file, return (samples, sample_rate, num_channels).
///
/// Samples are interleaved f32 in [-1, 1].
pub fn read_wav(path: impl AsRef<Path>) -> Result<(Vec<f32>, u32, u16)> {
    let reader = hound::WavReader::open(path)?;
    let spec = reader.spec();
    let sample_rate = spec.sample_rate;
    let channels = spec.channels;

    let samples: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .into_samples::<f32>()
            .collect::<std::result::Result<Vec<_>, _>>()?,
        hound::SampleFormat::Int => {
            let max_val = (1u32 << (spec.bits_per_sample - 1)) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 / max_val))
                .collect::<std::result::Result<Vec<_>, _>>()?
        }
    };

    Ok((samples, sample_rate, channels))
}

/// Write interleaved f32 samples as a WAV file.
pub fn write_wav(
    path: impl AsRef<Path>,
    samples: &[f32],
    sample_rate: u32,
    num_channels: u16,
) -> Result<()> {
    let spec = hound::WavSpec {
        channels: num_channels,
        sample_rate,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };
    let mut writer = hound::WavWriter::create(path, spec)?;
    for &s in samples {
        writer.write_sample(s)?;
    }
    writer.finalize()?;
    Ok(())
}

/// Downmix interleaved multi-channel samples to mono by averaging.
pub fn downmix_mono(samples: &[f32], num_channels: usize) -> Vec<f32> {
    if num_channels <= 1 {
        return samples.to_vec();
    }
    samples
        .chunks_exact(num_channels)
        .map(|frame| frame.iter().sum::<f32>() / num_channels as f32)
        .collect()
}

/// Deinterleave samples into a `(1, num_channels, num_samples)` waveform
/// tensor.
pub fn waveform_tensor(
    samples: &[f32],
    num_channels: usize,
    device: &Device,
) -> Result<Tensor> {
    let num_samples = samples.len() / num_channels;
    let mut planar = vec![0f32; num_channels * num_samples];
    for (i, frame) in samples.chunks_exact(num_channels).enumerate() {
        for (c, &s) in frame.iter().enumerate() {
            planar[c * num_samples + i] = s;
        }
    }
    Ok(Tensor::from_vec(planar, (1, num_channels, num_samples), device)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_downmix_mono() {
        let stereo = vec![1.0, 0.0, 0.5, 0.5, -1.0, 1.0];
        let mono = downmix_mono(&stereo, 2);
        assert_eq!(mono, vec![0.5, 0.5, 0.0]);
    }

    #[test]
    fn test_waveform_tensor_deinterleaves() {
        let dev = Device::Cpu;
        let stereo = vec![1.0f32, 10.0, 2.0, 20.0, 3.0, 30.0];
        let t = waveform_tensor(&stereo, 2, &dev).unwrap();
        assert_eq!(t.dims(), &[1, 2, 3]);
        let planar = t.flatten_all().unwrap().to_vec1::<f32>().unwrap();
        assert_eq!(planar, vec![1.0, 2.0, 3.0, 10.0, 20.0, 30.0]);
    }

    #[test]
    fn test_roundtrip_wav() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.wav");
        let original = vec![0.0f32, 0.5, -0.5, 1.0, -1.0, 0.25];
        write_wav(&path, &original, 16000, 1).unwrap();
        let (loaded, sr, ch) = read_wav(&path).unwrap();
        assert_eq!(sr, 16000);
        assert_eq!(ch, 1);
        assert_eq!(loaded.len(), original.len());
        for (a, b) in loaded.iter().zip(original.iter()) {
            assert!((a - b).abs() < 1e-5);
        }
    }
}
