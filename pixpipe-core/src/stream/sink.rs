//! Presentation sinks.
//!
//! The controller hands each reconstructed frame to a [`PresentationSink`]
//! as a shared borrow that ends when `present` returns. Sinks that need
//! the pixels later must copy them.

use tokio::sync::watch;

use crate::error::{PipeError, Result};

/// Consumer of reconstructed frames.
pub trait PresentationSink: Send {
    /// Display one frame. Called once per frame, in receipt order.
    fn present(&mut self, width: u32, height: u32, frame: &[u8]) -> Result<()>;

    /// The controller has just asked the producer for frame `sequence`.
    fn frame_requested(&mut self, _sequence: u64) {}
}

impl<S: PresentationSink + ?Sized> PresentationSink for &mut S {
    fn present(&mut self, width: u32, height: u32, frame: &[u8]) -> Result<()> {
        (**self).present(width, height, frame)
    }

    fn frame_requested(&mut self, sequence: u64) {
        (**self).frame_requested(sequence)
    }
}

impl<S: PresentationSink + ?Sized> PresentationSink for Box<S> {
    fn present(&mut self, width: u32, height: u32, frame: &[u8]) -> Result<()> {
        (**self).present(width, height, frame)
    }

    fn frame_requested(&mut self, sequence: u64) {
        (**self).frame_requested(sequence)
    }
}

// ── WatchSink ────────────────────────────────────────────────────

/// A frame as published through a [`WatchSink`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PresentedFrame {
    /// 1-based index of the frame within the session (0 = nothing yet).
    pub sequence: u64,
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

/// Publishes the latest frame on a `watch` channel so a render task can
/// pick it up at its own pace. Intermediate frames may be skipped by a
/// slow reader.
#[derive(Debug)]
pub struct WatchSink {
    tx: watch::Sender<PresentedFrame>,
    presented: u64,
}

impl WatchSink {
    pub fn new() -> (Self, watch::Receiver<PresentedFrame>) {
        let (tx, rx) = watch::channel(PresentedFrame::default());
        (Self { tx, presented: 0 }, rx)
    }

    pub fn subscribe(&self) -> watch::Receiver<PresentedFrame> {
        self.tx.subscribe()
    }
}

impl PresentationSink for WatchSink {
    fn present(&mut self, width: u32, height: u32, frame: &[u8]) -> Result<()> {
        if self.tx.is_closed() {
            return Err(PipeError::Presentation("no frame subscribers left".into()));
        }
        self.presented += 1;
        let sequence = self.presented;
        // Reuse the previous allocation when the size is unchanged.
        self.tx.send_modify(|slot| {
            slot.sequence = sequence;
            slot.width = width;
            slot.height = height;
            slot.data.clear();
            slot.data.extend_from_slice(frame);
        });
        Ok(())
    }
}

// ── RecordingSink ────────────────────────────────────────────────

/// One entry of a [`RecordingSink`] log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkEvent {
    Requested(u64),
    Presented { width: u32, height: u32 },
}

/// Keeps every presented frame and the order of sink calls.
#[derive(Debug, Default)]
pub struct RecordingSink {
    frames: Vec<Vec<u8>>,
    events: Vec<SinkEvent>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames(&self) -> &[Vec<u8>] {
        &self.frames
    }

    pub fn events(&self) -> &[SinkEvent] {
        &self.events
    }

    pub fn last_frame(&self) -> Option<&[u8]> {
        self.frames.last().map(Vec::as_slice)
    }
}

impl PresentationSink for RecordingSink {
    fn present(&mut self, width: u32, height: u32, frame: &[u8]) -> Result<()> {
        self.frames.push(frame.to_vec());
        self.events.push(SinkEvent::Presented { width, height });
        Ok(())
    }

    fn frame_requested(&mut self, sequence: u64) {
        self.events.push(SinkEvent::Requested(sequence));
    }
}
