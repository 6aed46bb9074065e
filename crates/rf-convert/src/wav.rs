//! RIFF/WAVE container parsing
//!
//! Walks the chunk list of a WAV byte buffer to find the PCM `data` chunk.
//! Only 16-bit linear PCM is accepted. The `fmt ` chunk is read at its
//! canonical position (offset 12); everything after it is located by walking
//! chunk headers, so `LIST`, `fact`, `JUNK` and friends are skipped.

use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::config::DataSizePolicy;
use crate::error::{ConvertError, ConvertResult};

// ═══════════════════════════════════════════════════════════════════════════════
// LAYOUT
// ═══════════════════════════════════════════════════════════════════════════════

/// "RIFF" read big-endian
const RIFF_TAG: u32 = 0x5249_4646;
/// "WAVE" read big-endian
const WAVE_TAG: u32 = 0x5741_5645;
/// "data" read big-endian
const DATA_TAG: u32 = 0x6461_7461;

/// RIFF header (12) + fmt chunk header (8) + PCM fmt body (16)
const MIN_HEADER_LEN: usize = 36;
/// First chunk after the RIFF/WAVE tag
const FIRST_CHUNK_OFFSET: usize = 12;
/// Chunk id (4) + chunk size (4)
const CHUNK_HEADER_LEN: usize = 8;

const FMT_SIZE_OFFSET: usize = 16;
const FORMAT_TAG_OFFSET: usize = 20;
const CHANNELS_OFFSET: usize = 22;
const SAMPLE_RATE_OFFSET: usize = 24;
const BITS_PER_SAMPLE_OFFSET: usize = 34;
/// First two bytes of the WAVE_FORMAT_EXTENSIBLE sub-format GUID
const SUB_FORMAT_OFFSET: usize = 44;
const EXTENSIBLE_FMT_LEN: u32 = 40;

const FORMAT_PCM: u16 = 0x0001;
const FORMAT_EXTENSIBLE: u16 = 0xFFFE;

/// The only supported sample width
pub const SUPPORTED_BITS_PER_SAMPLE: u16 = 16;

// ═══════════════════════════════════════════════════════════════════════════════
// DESCRIPTOR
// ═══════════════════════════════════════════════════════════════════════════════

/// Parsed WAV header
///
/// `pcm_byte_offset + pcm_byte_length` never exceeds the length of the buffer
/// the descriptor was parsed from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WavDescriptor {
    pub channel_count: u16,
    pub sample_rate: u32,
    pub bits_per_sample: u16,
    /// Start of the PCM payload (just past the `data` chunk header)
    pub pcm_byte_offset: u32,
    /// PCM payload length in bytes
    pub pcm_byte_length: u32,
    pub duration_seconds: f64,
}

impl WavDescriptor {
    /// Byte range of the PCM payload
    pub fn pcm_range(&self) -> Range<usize> {
        let start = self.pcm_byte_offset as usize;
        start..start + self.pcm_byte_length as usize
    }

    /// Bytes per interleaved sample frame
    pub fn block_align(&self) -> usize {
        self.channel_count as usize * (self.bits_per_sample as usize / 8)
    }

    /// Samples per channel
    pub fn frame_count(&self) -> usize {
        match self.block_align() {
            0 => 0,
            align => self.pcm_byte_length as usize / align,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// PARSER
// ═══════════════════════════════════════════════════════════════════════════════

/// RIFF/WAVE header parser
#[derive(Debug, Clone, Copy, Default)]
pub struct WavParser {
    policy: DataSizePolicy,
}

impl WavParser {
    pub fn new(policy: DataSizePolicy) -> Self {
        Self { policy }
    }

    /// Parse a complete WAV file held in memory
    pub fn parse(&self, buffer: &[u8]) -> ConvertResult<WavDescriptor> {
        if read_u32_be(buffer, 0) != Some(RIFF_TAG) {
            return Err(format_error("Not a valid WAV file: missing RIFF header"));
        }
        if read_u32_be(buffer, 8) != Some(WAVE_TAG) {
            return Err(format_error("Not a valid WAV file: missing WAVE tag"));
        }
        if buffer.len() < MIN_HEADER_LEN {
            return Err(format_error("Not a valid WAV file: truncated fmt chunk"));
        }

        self.check_format_tag(buffer)?;

        let channel_count = read_u16_le(buffer, CHANNELS_OFFSET).unwrap_or(0);
        let sample_rate = read_u32_le(buffer, SAMPLE_RATE_OFFSET).unwrap_or(0);
        let bits_per_sample = read_u16_le(buffer, BITS_PER_SAMPLE_OFFSET).unwrap_or(0);

        if bits_per_sample != SUPPORTED_BITS_PER_SAMPLE {
            return Err(ConvertError::Format(format!(
                "Only 16-bit WAV files are supported (file is {}-bit)",
                bits_per_sample
            )));
        }
        if channel_count == 0 {
            return Err(format_error("Invalid WAV header: channel count is 0"));
        }
        if sample_rate == 0 {
            return Err(format_error("Invalid WAV header: sample rate is 0"));
        }

        let data_chunk = find_data_chunk(buffer)?;
        let pcm_start = data_chunk + CHUNK_HEADER_LEN;
        let declared = read_u32_le(buffer, data_chunk + 4).unwrap_or(0) as usize;
        let available = buffer.len() - pcm_start;

        let pcm_len = if declared > available {
            match self.policy {
                DataSizePolicy::Clamp => {
                    log::warn!(
                        "WAV data chunk declares {} bytes but only {} are present, clamping",
                        declared,
                        available
                    );
                    available
                }
                DataSizePolicy::Strict => {
                    return Err(ConvertError::Format(format!(
                        "Truncated WAV file: data chunk declares {} bytes, {} present",
                        declared, available
                    )));
                }
            }
        } else {
            declared
        };

        let pcm_byte_offset = u32::try_from(pcm_start)
            .map_err(|_| format_error("Invalid WAV file: data chunk beyond 4 GiB"))?;
        let pcm_byte_length = u32::try_from(pcm_len)
            .map_err(|_| format_error("Invalid WAV file: data chunk larger than 4 GiB"))?;

        let bytes_per_second =
            sample_rate as f64 * channel_count as f64 * (bits_per_sample / 8) as f64;
        let duration_seconds = pcm_byte_length as f64 / bytes_per_second;

        Ok(WavDescriptor {
            channel_count,
            sample_rate,
            bits_per_sample,
            pcm_byte_offset,
            pcm_byte_length,
            duration_seconds,
        })
    }

    fn check_format_tag(&self, buffer: &[u8]) -> ConvertResult<()> {
        let tag = read_u16_le(buffer, FORMAT_TAG_OFFSET).unwrap_or(0);
        let is_pcm = match tag {
            FORMAT_PCM => true,
            FORMAT_EXTENSIBLE => {
                read_u32_le(buffer, FMT_SIZE_OFFSET).is_some_and(|len| len >= EXTENSIBLE_FMT_LEN)
                    && read_u16_le(buffer, SUB_FORMAT_OFFSET) == Some(FORMAT_PCM)
            }
            _ => false,
        };

        if is_pcm {
            Ok(())
        } else {
            Err(ConvertError::Format(format!(
                "Unsupported WAV encoding (format tag 0x{:04X}): only linear PCM is supported",
                tag
            )))
        }
    }
}

/// Parse with the default (clamping) policy
pub fn parse_wav(buffer: &[u8]) -> ConvertResult<WavDescriptor> {
    WavParser::default().parse(buffer)
}

/// Walk chunk headers from offset 12 until the `data` chunk is found.
/// Returns the offset of the `data` chunk header.
fn find_data_chunk(buffer: &[u8]) -> ConvertResult<usize> {
    let mut cursor = FIRST_CHUNK_OFFSET;

    loop {
        let id = read_u32_be(buffer, cursor);
        let size = read_u32_le(buffer, cursor.saturating_add(4));

        let (Some(id), Some(size)) = (id, size) else {
            return Err(format_error("Could not find data chunk in WAV file"));
        };

        if id == DATA_TAG {
            return Ok(cursor);
        }

        log::debug!(
            "Skipping WAV chunk {:?} ({} bytes) at offset {}",
            String::from_utf8_lossy(&id.to_be_bytes()),
            size,
            cursor
        );

        cursor = cursor
            .checked_add(CHUNK_HEADER_LEN)
            .and_then(|c| c.checked_add(size as usize))
            .ok_or_else(|| format_error("Could not find data chunk in WAV file"))?;
    }
}

fn format_error(msg: &str) -> ConvertError {
    ConvertError::Format(msg.to_string())
}

fn read_u32_be(buffer: &[u8], offset: usize) -> Option<u32> {
    let b = buffer.get(offset..offset.checked_add(4)?)?;
    Some(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
}

fn read_u32_le(buffer: &[u8], offset: usize) -> Option<u32> {
    let b = buffer.get(offset..offset.checked_add(4)?)?;
    Some(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
}

fn read_u16_le(buffer: &[u8], offset: usize) -> Option<u16> {
    let b = buffer.get(offset..offset.checked_add(2)?)?;
    Some(u16::from_le_bytes([b[0], b[1]]))
}

// ═══════════════════════════════════════════════════════════════════════════════
// PCM VIEW
// ═══════════════════════════════════════════════════════════════════════════════

/// Read-only view of the interleaved 16-bit PCM payload
#[derive(Debug, Clone, Copy)]
pub struct PcmBuffer<'a> {
    bytes: &'a [u8],
}

impl<'a> PcmBuffer<'a> {
    /// Borrow the PCM region described by `descriptor`
    pub fn new(buffer: &'a [u8], descriptor: &WavDescriptor) -> ConvertResult<Self> {
        let bytes = buffer
            .get(descriptor.pcm_range())
            .ok_or_else(|| format_error("WAV descriptor does not match buffer"))?;
        Ok(Self { bytes })
    }

    /// Raw payload bytes
    pub fn as_bytes(&self) -> &'a [u8] {
        self.bytes
    }

    /// Number of 16-bit samples (all channels); a trailing odd byte is ignored
    pub fn len(&self) -> usize {
        self.bytes.len() / 2
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Decoded little-endian samples
    pub fn samples(&self) -> impl Iterator<Item = i16> + 'a {
        self.bytes
            .chunks_exact(2)
            .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
    }

    pub fn to_samples(&self) -> Vec<i16> {
        self.samples().collect()
    }
}
