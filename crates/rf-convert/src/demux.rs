//! Channel demultiplexing
//!
//! Splits interleaved 16-bit PCM into per-channel sample sequences.

use std::borrow::Cow;

use crate::error::{ConvertError, ConvertResult};

/// Per-channel samples: left always present, right only for stereo.
/// Left and right have equal length.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelSampleSet<'a> {
    left: Cow<'a, [i16]>,
    right: Option<Vec<i16>>,
}

impl<'a> ChannelSampleSet<'a> {
    /// Single channel
    pub fn mono(samples: impl Into<Cow<'a, [i16]>>) -> Self {
        Self {
            left: samples.into(),
            right: None,
        }
    }

    /// Two channels, truncated to the shorter one
    pub fn stereo(mut left: Vec<i16>, mut right: Vec<i16>) -> Self {
        let frames = left.len().min(right.len());
        left.truncate(frames);
        right.truncate(frames);
        Self {
            left: Cow::Owned(left),
            right: Some(right),
        }
    }

    pub fn left(&self) -> &[i16] {
        &self.left
    }

    pub fn right(&self) -> Option<&[i16]> {
        self.right.as_deref()
    }

    pub fn channel_count(&self) -> u16 {
        if self.right.is_some() { 2 } else { 1 }
    }

    /// Samples per channel
    pub fn frames(&self) -> usize {
        self.left.len()
    }

    pub fn is_empty(&self) -> bool {
        self.left.is_empty()
    }
}

/// Split interleaved PCM into channels.
///
/// Mono borrows `pcm` unchanged; stereo yields `left[i] = pcm[2i]`,
/// `right[i] = pcm[2i + 1]` and drops a trailing half frame.
pub fn demux(pcm: &[i16], channel_count: u16) -> ConvertResult<ChannelSampleSet<'_>> {
    match channel_count {
        1 => Ok(ChannelSampleSet::mono(pcm)),
        2 => {
            let frames = pcm.len() / 2;
            let mut left = Vec::with_capacity(frames);
            let mut right = Vec::with_capacity(frames);
            for frame in pcm.chunks_exact(2) {
                left.push(frame[0]);
                right.push(frame[1]);
            }
            Ok(ChannelSampleSet::stereo(left, right))
        }
        n => Err(ConvertError::UnsupportedFormat(format!(
            "{} channels (only mono and stereo are supported)",
            n
        ))),
    }
}

/// Inverse of [`demux`]
pub fn interleave(set: &ChannelSampleSet<'_>) -> Vec<i16> {
    match set.right() {
        None => set.left().to_vec(),
        Some(right) => {
            let mut out = Vec::with_capacity(set.frames() * 2);
            for (&l, &r) in set.left().iter().zip(right) {
                out.push(l);
                out.push(r);
            }
            out
        }
    }
}
