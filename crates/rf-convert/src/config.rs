//! Configuration types for conversion

use serde::{Deserialize, Serialize};

/// Output bitrate (constant, kbps)
pub const MP3_BITRATE_KBPS: u32 = 320;

/// Samples per channel handed to the encoder per call (one MP3 frame)
pub const SAMPLES_PER_FRAME: usize = 1152;

/// MIME type of the produced files
pub const MP3_MIME_TYPE: &str = "audio/mpeg";

/// MIME type accepted at intake
pub const WAV_MIME_TYPE: &str = "audio/wav";

/// Converter configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConvertConfig {
    /// How a `data` chunk size larger than the buffer is handled
    pub data_size_policy: DataSizePolicy,

    /// LAME algorithm quality (bitrate stays at 320 kbps)
    pub quality: EncodeQuality,

    /// Maximum jobs converted at once (1 = strictly sequential)
    pub max_parallel_jobs: usize,
}

impl Default for ConvertConfig {
    fn default() -> Self {
        Self {
            data_size_policy: DataSizePolicy::Clamp,
            quality: EncodeQuality::Best,
            max_parallel_jobs: 1,
        }
    }
}

impl ConvertConfig {
    /// Create config for faster encoding
    pub fn fast() -> Self {
        Self {
            quality: EncodeQuality::Fast,
            ..Default::default()
        }
    }

    /// Set data size policy
    pub fn with_data_size_policy(mut self, policy: DataSizePolicy) -> Self {
        self.data_size_policy = policy;
        self
    }

    /// Set encode quality
    pub fn with_quality(mut self, quality: EncodeQuality) -> Self {
        self.quality = quality;
        self
    }

    /// Set max parallel jobs (clamped to at least 1)
    pub fn with_max_parallel_jobs(mut self, max: usize) -> Self {
        self.max_parallel_jobs = max.max(1);
        self
    }
}

/// Handling of a declared `data` chunk size that exceeds the buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataSizePolicy {
    /// Trust only the bytes actually present
    Clamp,
    /// Reject the file
    Strict,
}

impl Default for DataSizePolicy {
    fn default() -> Self {
        Self::Clamp
    }
}

/// LAME algorithm quality preset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EncodeQuality {
    /// Slowest, best psychoacoustics
    Best,
    /// LAME default
    Good,
    /// Fast encoding
    Fast,
}

impl Default for EncodeQuality {
    fn default() -> Self {
        Self::Best
    }
}
