//! Conversion job definitions

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::{MP3_BITRATE_KBPS, MP3_MIME_TYPE};
use crate::error::{ConvertError, ConvertResult};
use crate::wav::WavDescriptor;

/// Unique job identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct JobId(String);

impl JobId {
    /// New id derived from the source name plus a random suffix
    pub fn generate(source_name: &str) -> Self {
        Self(format!("{}-{}", source_name, Uuid::new_v4()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for JobId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Job lifecycle status
///
/// `Queued → Converting → (Done | Error)`; no transition skips `Converting`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobStatus {
    /// Waiting in queue
    Queued,
    /// Currently converting
    Converting,
    /// Converted successfully
    Done,
    /// Failed with error
    Error,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Error)
    }
}

/// Where a job's WAV bytes come from
#[derive(Debug, Clone)]
pub enum JobSource {
    /// Read from disk when the job starts
    Path(PathBuf),
    /// Already in memory
    Bytes(Arc<[u8]>),
}

impl JobSource {
    /// Load the WAV bytes
    pub fn read(&self) -> ConvertResult<Arc<[u8]>> {
        match self {
            Self::Path(path) => Ok(std::fs::read(path)?.into()),
            Self::Bytes(bytes) => Ok(Arc::clone(bytes)),
        }
    }

    /// Size in bytes, if known without reading
    pub fn size_hint(&self) -> Option<u64> {
        match self {
            Self::Path(path) => std::fs::metadata(path).ok().map(|m| m.len()),
            Self::Bytes(bytes) => Some(bytes.len() as u64),
        }
    }
}

/// Facts about a finished MP3
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mp3Metadata {
    /// Output file name (`<stem>.mp3`)
    pub file_name: String,
    pub size_bytes: u64,
    pub bitrate_kbps: u32,
    pub sample_rate: u32,
    pub duration_seconds: f64,
}

impl Mp3Metadata {
    pub fn new(source_name: &str, size_bytes: u64, descriptor: &WavDescriptor) -> Self {
        Self {
            file_name: mp3_file_name(source_name),
            size_bytes,
            bitrate_kbps: MP3_BITRATE_KBPS,
            sample_rate: descriptor.sample_rate,
            duration_seconds: descriptor.duration_seconds,
        }
    }

    pub fn mime_type(&self) -> &'static str {
        MP3_MIME_TYPE
    }
}

/// Replace the final extension of `source_name` with `.mp3`
pub fn mp3_file_name(source_name: &str) -> String {
    let stem = match source_name.rfind('.') {
        Some(dot) if dot > 0 => &source_name[..dot],
        _ => source_name,
    };
    format!("{}.mp3", stem)
}

/// One submitted file and its lifecycle
#[derive(Debug, Clone)]
pub struct ConversionJob {
    pub id: JobId,
    pub source_name: String,
    pub source_size: Option<u64>,
    pub status: JobStatus,
    pub result_bytes: Option<Arc<[u8]>>,
    pub result_info: Option<Mp3Metadata>,
    pub error_message: Option<String>,
    pub(crate) source: JobSource,
}

impl ConversionJob {
    /// New job in `Queued` state
    pub fn new(source_name: impl Into<String>, source: JobSource) -> Self {
        let source_name = source_name.into();
        Self {
            id: JobId::generate(&source_name),
            source_size: source.size_hint(),
            source_name,
            status: JobStatus::Queued,
            result_bytes: None,
            result_info: None,
            error_message: None,
            source,
        }
    }

    pub fn source(&self) -> &JobSource {
        &self.source
    }

    pub fn is_done(&self) -> bool {
        self.status == JobStatus::Done
    }

    /// Name shown for the job: the MP3 name once done, else the source name
    pub fn display_name(&self) -> &str {
        self.result_info
            .as_ref()
            .map(|info| info.file_name.as_str())
            .unwrap_or(&self.source_name)
    }

    /// Write the MP3 into `dir` under its derived name
    pub fn save_to<P: AsRef<Path>>(&self, dir: P) -> ConvertResult<PathBuf> {
        let (Some(bytes), Some(info)) = (&self.result_bytes, &self.result_info) else {
            return Err(ConvertError::NoResult(self.id.clone()));
        };

        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;
        let path = dir.join(&info.file_name);
        std::fs::write(&path, bytes)?;

        log::info!("Saved MP3: {} ({} bytes)", path.display(), bytes.len());
        Ok(path)
    }

    pub(crate) fn begin(&mut self) {
        self.status = JobStatus::Converting;
        self.error_message = None;
    }

    pub(crate) fn complete(&mut self, bytes: Vec<u8>, info: Mp3Metadata) {
        self.status = JobStatus::Done;
        self.result_bytes = Some(bytes.into());
        self.result_info = Some(info);
        self.error_message = None;
    }

    pub(crate) fn fail(&mut self, message: String) {
        self.status = JobStatus::Error;
        self.result_bytes = None;
        self.result_info = None;
        self.error_message = Some(message);
    }
}
