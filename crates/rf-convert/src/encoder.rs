//! MP3 frame encoding
//!
//! The pipeline talks to the MP3 codec through two narrow capabilities:
//! [`Mp3EncoderFactory::construct`] and, on the built instance,
//! [`Mp3Encode::encode_buffer`] / [`Mp3Encode::flush`]. The production
//! implementation is native LAME via the `mp3lame-encoder` crate; tests swap
//! in recording fakes.

use mp3lame_encoder::{Builder, DualPcm, FlushNoGap};

use crate::config::{EncodeQuality, MP3_BITRATE_KBPS, SAMPLES_PER_FRAME};
use crate::demux::ChannelSampleSet;
use crate::error::{ConvertError, ConvertResult};

/// Compressed bytes returned by one encoder call (may be empty)
pub type EncodedChunk = Vec<u8>;

/// Worst-case MP3 bytes produced by a flush
const FLUSH_BUFFER_SIZE: usize = 7200;

// ═══════════════════════════════════════════════════════════════════════════════
// CAPABILITIES
// ═══════════════════════════════════════════════════════════════════════════════

/// An MP3 encoder instance
pub trait Mp3Encode {
    /// Encode one block of samples. `right` is `None` for mono.
    /// An empty return is normal: the encoder buffers internally.
    fn encode_buffer(&mut self, left: &[i16], right: Option<&[i16]>) -> ConvertResult<EncodedChunk>;

    /// Drain buffered samples into a final chunk
    fn flush(&mut self) -> ConvertResult<EncodedChunk>;
}

/// Builds encoder instances. Shared across worker threads.
pub trait Mp3EncoderFactory: Send + Sync {
    type Encoder: Mp3Encode;

    fn construct(
        &self,
        channel_count: u16,
        sample_rate: u32,
        bitrate_kbps: u32,
    ) -> ConvertResult<Self::Encoder>;
}

// ═══════════════════════════════════════════════════════════════════════════════
// LAME
// ═══════════════════════════════════════════════════════════════════════════════

/// Builds [`LameMp3Encoder`]s (CBR)
#[derive(Debug, Clone, Copy, Default)]
pub struct LameEncoderFactory {
    quality: EncodeQuality,
}

impl LameEncoderFactory {
    pub fn new(quality: EncodeQuality) -> Self {
        Self { quality }
    }

    fn lame_bitrate(kbps: u32) -> mp3lame_encoder::Bitrate {
        match kbps {
            0..=96 => mp3lame_encoder::Bitrate::Kbps96,
            97..=112 => mp3lame_encoder::Bitrate::Kbps112,
            113..=128 => mp3lame_encoder::Bitrate::Kbps128,
            129..=160 => mp3lame_encoder::Bitrate::Kbps160,
            161..=192 => mp3lame_encoder::Bitrate::Kbps192,
            193..=224 => mp3lame_encoder::Bitrate::Kbps224,
            225..=256 => mp3lame_encoder::Bitrate::Kbps256,
            _ => mp3lame_encoder::Bitrate::Kbps320,
        }
    }

    fn lame_quality(&self) -> mp3lame_encoder::Quality {
        match self.quality {
            EncodeQuality::Best => mp3lame_encoder::Quality::Best,
            EncodeQuality::Good => mp3lame_encoder::Quality::Good,
            EncodeQuality::Fast => mp3lame_encoder::Quality::Ok,
        }
    }
}

impl Mp3EncoderFactory for LameEncoderFactory {
    type Encoder = LameMp3Encoder;

    fn construct(
        &self,
        channel_count: u16,
        sample_rate: u32,
        bitrate_kbps: u32,
    ) -> ConvertResult<LameMp3Encoder> {
        if !(1..=2).contains(&channel_count) {
            return Err(ConvertError::UnsupportedFormat(format!(
                "{} channels (only mono and stereo are supported)",
                channel_count
            )));
        }

        let mut builder = Builder::new()
            .ok_or_else(|| ConvertError::Encode("LAME encoder init failed".to_string()))?;

        builder
            .set_num_channels(channel_count as u8)
            .map_err(|e| ConvertError::Encode(format!("LAME set channels failed: {:?}", e)))?;

        builder.set_sample_rate(sample_rate).map_err(|e| {
            ConvertError::Encode(format!(
                "LAME rejected sample rate {} Hz: {:?}",
                sample_rate, e
            ))
        })?;

        builder
            .set_brate(Self::lame_bitrate(bitrate_kbps))
            .map_err(|e| ConvertError::Encode(format!("LAME set bitrate failed: {:?}", e)))?;

        builder
            .set_quality(self.lame_quality())
            .map_err(|e| ConvertError::Encode(format!("LAME set quality failed: {:?}", e)))?;

        let encoder = builder
            .build()
            .map_err(|e| ConvertError::Encode(format!("LAME build failed: {:?}", e)))?;

        Ok(LameMp3Encoder {
            encoder,
            channel_count,
        })
    }
}

/// Native LAME encoder instance
pub struct LameMp3Encoder {
    encoder: mp3lame_encoder::Encoder,
    channel_count: u16,
}

impl Mp3Encode for LameMp3Encoder {
    fn encode_buffer(&mut self, left: &[i16], right: Option<&[i16]>) -> ConvertResult<EncodedChunk> {
        // A 1-channel LAME encoder only reads the left slice
        let right = match (self.channel_count, right) {
            (2, Some(right)) if right.len() == left.len() => right,
            (2, Some(right)) => {
                return Err(ConvertError::Encode(format!(
                    "channel length mismatch: left {} / right {}",
                    left.len(),
                    right.len()
                )));
            }
            (2, None) => {
                return Err(ConvertError::Encode(
                    "stereo encoder needs a right channel".to_string(),
                ));
            }
            _ => left,
        };

        let mut output: Vec<u8> =
            Vec::with_capacity(mp3lame_encoder::max_required_buffer_size(left.len()));

        let encoded_size = self
            .encoder
            .encode(DualPcm { left, right }, output.spare_capacity_mut())
            .map_err(|e| ConvertError::Encode(format!("LAME encode failed: {:?}", e)))?;

        // SAFETY: encoder wrote encoded_size bytes into spare capacity
        unsafe {
            output.set_len(encoded_size);
        }

        Ok(output)
    }

    fn flush(&mut self) -> ConvertResult<EncodedChunk> {
        let mut output: Vec<u8> = Vec::with_capacity(FLUSH_BUFFER_SIZE);

        let flush_size = self
            .encoder
            .flush::<FlushNoGap>(output.spare_capacity_mut())
            .map_err(|e| ConvertError::Encode(format!("LAME flush failed: {:?}", e)))?;

        // SAFETY: encoder wrote flush_size bytes into spare capacity
        unsafe {
            output.set_len(flush_size);
        }

        Ok(output)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// FRAME ENCODER
// ═══════════════════════════════════════════════════════════════════════════════

/// Ordered, non-empty chunks produced for one input
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EncodedStream {
    chunks: Vec<EncodedChunk>,
}

impl EncodedStream {
    pub fn chunks(&self) -> &[EncodedChunk] {
        &self.chunks
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// Sum of chunk lengths
    pub fn total_len(&self) -> usize {
        self.chunks.iter().map(Vec::len).sum()
    }

    /// Concatenate all chunks in call order
    pub fn into_bytes(self) -> Vec<u8> {
        assemble(&self.chunks)
    }

    fn push(&mut self, chunk: EncodedChunk) {
        if !chunk.is_empty() {
            self.chunks.push(chunk);
        }
    }
}

/// Concatenate chunks in order, skipping nothing and duplicating nothing
pub fn assemble(chunks: &[EncodedChunk]) -> Vec<u8> {
    let mut out = Vec::with_capacity(chunks.iter().map(Vec::len).sum());
    for chunk in chunks {
        out.extend_from_slice(chunk);
    }
    out
}

/// Feeds samples to an encoder one MP3 frame (1152 samples per channel) at a
/// time. The last frame may be shorter. Consumed by [`FrameEncoder::encode`]
/// so the encoder is flushed exactly once.
pub struct FrameEncoder<E: Mp3Encode> {
    encoder: E,
    frame_size: usize,
}

impl<E: Mp3Encode> FrameEncoder<E> {
    pub fn new(encoder: E) -> Self {
        Self {
            encoder,
            frame_size: SAMPLES_PER_FRAME,
        }
    }

    /// Encode all samples, then flush
    pub fn encode(mut self, samples: &ChannelSampleSet<'_>) -> ConvertResult<EncodedStream> {
        let left = samples.left();
        let right = samples.right();
        let mut stream = EncodedStream::default();

        let mut start = 0;
        while start < left.len() {
            let end = (start + self.frame_size).min(left.len());
            let chunk = self
                .encoder
                .encode_buffer(&left[start..end], right.map(|r| &r[start..end]))?;
            stream.push(chunk);
            start = end;
        }

        stream.push(self.encoder.flush()?);
        Ok(stream)
    }
}

/// Build an encoder for `samples` at the fixed bitrate and encode them
pub fn encode_frames<F: Mp3EncoderFactory>(
    factory: &F,
    samples: &ChannelSampleSet<'_>,
    sample_rate: u32,
) -> ConvertResult<EncodedStream> {
    let encoder = factory.construct(samples.channel_count(), sample_rate, MP3_BITRATE_KBPS)?;
    FrameEncoder::new(encoder).encode(samples)
}
