pub mod devices;
pub mod extract;
pub mod file;

pub use devices::{resolve_audio_source, AudioDevice, DeviceResolver};
pub use extract::{
    default_audio_path, find_latest_recording, AudioExtractor, ExtractionMethod,
    DEFAULT_MP3_QUALITY,
};
pub use file::AudioArtifact;
