//! RF-Convert: Local WAV → MP3 Conversion Queue
//!
//! Converts 16-bit linear PCM WAV audio into 320 kbps CBR MP3, one file or a
//! whole queue at a time, entirely on the local machine.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                   ConversionOrchestrator                          │
//! │                                                                   │
//! │  ┌──────────┐   ┌───────────┐   ┌──────────────┐   ┌──────────┐  │
//! │  │ WavParser│ → │ Demuxer   │ → │ FrameEncoder │ → │ Assemble │  │
//! │  │ (RIFF)   │   │ (L / R)   │   │ (1152/frame) │   │ (bytes)  │  │
//! │  └──────────┘   └───────────┘   └──────────────┘   └──────────┘  │
//! │                                                                   │
//! │  ┌──────────────────────────────────────────────────────────────┐│
//! │  │  Job Queue (FIFO)  [Queued] → [Converting] → [Done | Error]  ││
//! │  └──────────────────────────────────────────────────────────────┘│
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use rf_convert::{ConversionOrchestrator, ConvertConfig};
//!
//! let queue = ConversionOrchestrator::new(ConvertConfig::default());
//! queue.add_files(["/path/to/take1.wav", "/path/to/take2.wav"])?;
//!
//! let summary = queue.convert_all()?;
//! for job in queue.jobs() {
//!     if job.is_done() {
//!         job.save_to("/path/to/out")?;
//!     }
//! }
//! ```

mod config;
mod demux;
mod display;
mod encoder;
mod error;
mod intake;
mod job;
mod pipeline;
mod queue;
mod wav;

pub use config::*;
pub use demux::*;
pub use display::*;
pub use encoder::*;
pub use error::*;
pub use intake::*;
pub use job::*;
pub use pipeline::*;
pub use queue::*;
pub use wav::*;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
