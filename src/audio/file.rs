use anyhow::{Context, Result};
use std::fs::File;
use std::path::Path;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::info;

/// Basic facts about an extracted audio file
#[derive(Debug, Clone)]
pub struct AudioArtifact {
    pub path: String,
    pub size_bytes: u64,
    pub duration_seconds: Option<f64>,
    pub sample_rate: Option<u32>,
    pub channels: Option<usize>,
}

impl AudioArtifact {
    /// Probe the container/codec headers without decoding the stream
    pub fn probe(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let file = File::open(path)
            .with_context(|| format!("Failed to open audio file {}", path.display()))?;
        let size_bytes = file.metadata()?.len();

        let mss = MediaSourceStream::new(Box::new(file), Default::default());
        let mut hint = Hint::new();
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext);
        }

        let probed = symphonia::default::get_probe()
            .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
            .context("Unrecognised audio format")?;

        let track = probed
            .format
            .default_track()
            .context("Audio file has no default track")?;
        let params = &track.codec_params;

        let duration_seconds = match (params.n_frames, params.time_base) {
            (Some(frames), Some(time_base)) => {
                let time = time_base.calc_time(frames);
                Some(time.seconds as f64 + time.frac)
            }
            (Some(frames), None) => params.sample_rate.map(|rate| frames as f64 / rate as f64),
            _ => None,
        };

        let artifact = Self {
            path: path.display().to_string(),
            size_bytes,
            duration_seconds,
            sample_rate: params.sample_rate,
            channels: params.channels.map(|c| c.count()),
        };

        info!(
            "Audio artifact: {} ({:.1}s, {:?}Hz, {:?} channels, {} bytes)",
            artifact.path,
            artifact.duration_seconds.unwrap_or(0.0),
            artifact.sample_rate,
            artifact.channels,
            artifact.size_bytes
        );

        Ok(artifact)
    }
}
