//! Single-file conversion pipeline
//!
//! parse → demux → encode → assemble. Every stage reads borrowed input and
//! produces new owned output; nothing flows back upstream.

use std::time::Instant;

use crate::config::ConvertConfig;
use crate::demux::demux;
use crate::encoder::{Mp3EncoderFactory, encode_frames};
use crate::error::ConvertResult;
use crate::job::Mp3Metadata;
use crate::wav::{PcmBuffer, WavParser};

/// A finished conversion
#[derive(Debug, Clone)]
pub struct ConversionOutput {
    pub bytes: Vec<u8>,
    pub info: Mp3Metadata,
}

/// Converts one WAV buffer at a time
pub struct ConversionPipeline<F: Mp3EncoderFactory> {
    parser: WavParser,
    factory: F,
}

impl<F: Mp3EncoderFactory> ConversionPipeline<F> {
    pub fn new(config: &ConvertConfig, factory: F) -> Self {
        Self {
            parser: WavParser::new(config.data_size_policy),
            factory,
        }
    }

    pub fn factory(&self) -> &F {
        &self.factory
    }

    /// Convert a complete WAV file held in memory
    pub fn convert(&self, source_name: &str, wav: &[u8]) -> ConvertResult<ConversionOutput> {
        let start = Instant::now();

        let descriptor = self.parser.parse(wav)?;
        log::debug!(
            "{}: {} ch, {} Hz, {} PCM bytes, {:.2}s",
            source_name,
            descriptor.channel_count,
            descriptor.sample_rate,
            descriptor.pcm_byte_length,
            descriptor.duration_seconds
        );

        let pcm = PcmBuffer::new(wav, &descriptor)?.to_samples();
        let channels = demux(&pcm, descriptor.channel_count)?;
        let stream = encode_frames(&self.factory, &channels, descriptor.sample_rate)?;

        let chunk_count = stream.chunk_count();
        let bytes = stream.into_bytes();
        let info = Mp3Metadata::new(source_name, bytes.len() as u64, &descriptor);

        log::debug!(
            "{}: {} MP3 chunks, {} bytes in {:?}",
            source_name,
            chunk_count,
            bytes.len(),
            start.elapsed()
        );

        Ok(ConversionOutput { bytes, info })
    }
}
