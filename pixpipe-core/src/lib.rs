//! # pixpipe-core
//!
//! Core library for the pixpipe remote framebuffer stream.
//!
//! This crate contains:
//! - **Stream pipeline**: LZ4 block codec, sign-bitmap deltas, the
//!   retained reference frame and the lock-step `StreamController`
//! - **Codec**: `StreamCodec` for length-prefixed TCP I/O via `tokio_util`
//! - **Session**: `SessionConfig` with dimensions and mode flags
//! - **Stop**: `wait_for_stop`, the shared shutdown poll
//! - **Error**: `PipeError`, a typed `thiserror`-based error hierarchy

pub mod codec;
pub mod error;
pub mod flags;
pub mod session;
pub mod stop;
pub mod stream;

// ── Re-exports for ergonomic usage ───────────────────────────────

pub use codec::StreamCodec;
pub use error::{PipeError, Result};
pub use flags::EncodingMode;
pub use session::{BYTES_PER_PIXEL, SessionConfig};
pub use stop::wait_for_stop;
pub use stream::{
    ACK_SENTINEL, CyclePhase, FrameChannel, FrameEncoder, FrameStats, FrameStore,
    FramedChannel, PresentationSink, PresentedFrame, RecordingSink, StreamController, WatchSink,
};
