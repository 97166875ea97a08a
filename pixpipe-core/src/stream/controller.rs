//! Viewer-side stream controller.
//!
//! Drives the receive → decode → present → acknowledge cycle over a
//! [`FrameChannel`]. Exactly one frame is in flight at any time: the
//! producer may only send after it has seen an acknowledgment, and the
//! controller only acknowledges once the previous frame has been handed
//! to the sink.
//!
//! ```text
//!            start: ack #0
//!                 │
//!                 ▼
//!  ┌──────► AwaitingFrame ──msg──► Decompressing ──► Reconstructing
//!  │                                                       │
//!  └──────────── ack ◄──────── Presenting ◄────────────────┘
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use bytes::Bytes;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::error::{PipeError, Result};
use crate::flags::EncodingMode;
use crate::session::SessionConfig;
use crate::stop::wait_for_stop;
use crate::stream::channel::FrameChannel;
use crate::stream::sink::PresentationSink;
use crate::stream::stats::{FpsCounter, FrameStats};
use crate::stream::store::FrameStore;
use crate::stream::{block, delta};

// ── CyclePhase ───────────────────────────────────────────────────

/// Where the controller is within one frame cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CyclePhase {
    /// Waiting for the producer's next message.
    #[default]
    AwaitingFrame,
    /// Undoing block compression into the decode buffer.
    Decompressing,
    /// Applying the decoded buffer to the reference frame.
    Reconstructing,
    /// The sink holds the reference frame.
    Presenting,
}

impl std::fmt::Display for CyclePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AwaitingFrame => write!(f, "AwaitingFrame"),
            Self::Decompressing => write!(f, "Decompressing"),
            Self::Reconstructing => write!(f, "Reconstructing"),
            Self::Presenting => write!(f, "Presenting"),
        }
    }
}

/// Snapshot of the lock-step bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProtocolState {
    /// An acknowledgment is outstanding and a frame may arrive.
    pub awaiting_frame: bool,
    pub dimensions: (u32, u32),
    pub mode: EncodingMode,
}

// ── StreamController ─────────────────────────────────────────────

/// Owns one viewing session: the channel, the reference frame and the
/// sink.
///
/// A controller is single-use. Reconnecting means building a new one,
/// which starts again from a zeroed reference.
pub struct StreamController<C, S> {
    channel: C,
    sink: S,
    session: SessionConfig,
    store: FrameStore,
    /// Scratch for decompressed payloads, sized to the decoded length.
    decode_buf: Vec<u8>,
    phase: CyclePhase,
    awaiting_frame: bool,
    acks_sent: u64,
    frames_presented: u64,
    bytes_in: u64,
    frame_timeout: Option<Duration>,
    running: Arc<AtomicBool>,
    fps: FpsCounter,
    stats_tx: watch::Sender<FrameStats>,
    stats_rx: watch::Receiver<FrameStats>,
}

impl<C, S> StreamController<C, S>
where
    C: FrameChannel,
    S: PresentationSink,
{
    /// Build a controller for `session`. Fails on unusable dimensions.
    pub fn new(channel: C, sink: S, session: SessionConfig) -> Result<Self> {
        session.validate()?;

        let decode_buf = if session.compression_enabled {
            vec![0u8; session.decoded_len()]
        } else {
            Vec::new()
        };
        let (stats_tx, stats_rx) = watch::channel(FrameStats {
            width: session.width,
            height: session.height,
            ..FrameStats::default()
        });

        Ok(Self {
            channel,
            sink,
            session,
            store: FrameStore::new(session.width, session.height),
            decode_buf,
            phase: CyclePhase::AwaitingFrame,
            awaiting_frame: false,
            acks_sent: 0,
            frames_presented: 0,
            bytes_in: 0,
            frame_timeout: None,
            running: Arc::new(AtomicBool::new(false)),
            fps: FpsCounter::default(),
            stats_tx,
            stats_rx,
        })
    }

    /// Bound the wait for each frame. `None` waits forever.
    pub fn with_frame_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.frame_timeout = timeout;
        self
    }

    // ── Accessors ────────────────────────────────────────────────

    pub fn phase(&self) -> CyclePhase {
        self.phase
    }

    pub fn state(&self) -> ProtocolState {
        ProtocolState {
            awaiting_frame: self.awaiting_frame,
            dimensions: self.session.dimensions(),
            mode: self.session.mode(),
        }
    }

    pub fn session(&self) -> &SessionConfig {
        &self.session
    }

    /// The current reference frame.
    pub fn frame(&self) -> &FrameStore {
        &self.store
    }

    pub fn frames_presented(&self) -> u64 {
        self.frames_presented
    }

    pub fn acks_sent(&self) -> u64 {
        self.acks_sent
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn into_parts(self) -> (C, S) {
        (self.channel, self.sink)
    }

    pub fn stats_receiver(&self) -> watch::Receiver<FrameStats> {
        self.stats_rx.clone()
    }

    /// A cloneable stop handle. Storing `false` ends [`run`](Self::run).
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    // ── Protocol ─────────────────────────────────────────────────

    /// Begin the session: zero the reference and send the initial
    /// ready acknowledgment.
    pub async fn start(&mut self) -> Result<()> {
        if self.acks_sent > 0 {
            return Err(PipeError::ProtocolViolation("session already started"));
        }
        self.store.reset();
        self.phase = CyclePhase::AwaitingFrame;
        info!(
            "session start: {}x{} mode={}",
            self.session.width,
            self.session.height,
            self.session.mode()
        );
        self.acknowledge().await
    }

    /// Wait for the next inbound message, bounded by the frame timeout.
    pub async fn next_frame(&mut self) -> Result<Bytes> {
        match self.frame_timeout {
            Some(limit) => tokio::time::timeout(limit, self.channel.recv())
                .await
                .map_err(|_| PipeError::Timeout(limit))?,
            None => self.channel.recv().await,
        }
    }

    /// Run one full cycle for `payload`: decode, present, acknowledge.
    ///
    /// Any error leaves the controller out of `AwaitingFrame`, so the
    /// session cannot continue on a reference frame of unknown state.
    pub async fn handle_message(&mut self, payload: &[u8]) -> Result<()> {
        if self.phase != CyclePhase::AwaitingFrame {
            return Err(PipeError::ProtocolViolation(
                "frame arrived while the controller was not awaiting one",
            ));
        }
        if !self.awaiting_frame {
            return Err(PipeError::ProtocolViolation(
                "frame arrived with no acknowledgment outstanding",
            ));
        }
        self.awaiting_frame = false;

        let started = Instant::now();
        let decoded_len = self.session.decoded_len();

        self.phase = CyclePhase::Decompressing;
        let decoded: &[u8] = if self.session.compression_enabled {
            block::decompress_into(payload, &mut self.decode_buf)?;
            self.decode_buf.as_slice()
        } else {
            block::passthrough(payload, decoded_len)?
        };

        self.phase = CyclePhase::Reconstructing;
        if self.session.delta_enabled {
            delta::reconstruct(self.store.as_mut_slice(), decoded)?;
        } else {
            delta::replace(self.store.as_mut_slice(), decoded)?;
        }
        let decode_time = started.elapsed();

        self.phase = CyclePhase::Presenting;
        self.sink
            .present(self.session.width, self.session.height, self.store.as_slice())?;
        self.frames_presented += 1;
        self.bytes_in += payload.len() as u64;

        debug!(
            frame = self.frames_presented,
            bytes = payload.len(),
            decode_us = decode_time.as_micros() as u64,
            "frame presented"
        );
        self.publish_stats(payload.len(), decode_time);

        self.acknowledge().await
    }

    /// Start the session and process frames until the channel closes,
    /// an error occurs, or the stop handle is cleared.
    pub async fn run(&mut self) -> Result<()> {
        self.running.store(true, Ordering::SeqCst);
        let result = self.run_cycles().await;
        self.running.store(false, Ordering::SeqCst);

        if let Err(e) = &result {
            warn!(
                "session ended after {} frames: {e}",
                self.frames_presented
            );
        }
        result
    }

    async fn run_cycles(&mut self) -> Result<()> {
        let running = Arc::clone(&self.running);
        self.start().await?;

        while running.load(Ordering::SeqCst) {
            let payload = tokio::select! {
                message = self.next_frame() => message?,
                _ = wait_for_stop(&running) => break,
            };
            self.handle_message(&payload).await?;
        }

        info!("session stopped after {} frames", self.frames_presented);
        Ok(())
    }

    async fn acknowledge(&mut self) -> Result<()> {
        self.phase = CyclePhase::AwaitingFrame;
        self.channel.send_ack().await?;
        self.acks_sent += 1;
        self.awaiting_frame = true;
        self.sink.frame_requested(self.acks_sent);
        Ok(())
    }

    fn publish_stats(&mut self, payload_len: usize, decode_time: Duration) {
        let fps = self.fps.tick();
        self.stats_tx.send_replace(FrameStats {
            frames: self.frames_presented,
            bytes_in: self.bytes_in,
            fps,
            last_decode: decode_time,
            last_payload: payload_len,
            width: self.session.width,
            height: self.session.height,
        });
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::StreamCodec;
    use crate::stream::channel::FramedChannel;
    use crate::stream::sink::{RecordingSink, SinkEvent};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Event {
        Ack,
        Present(Vec<u8>),
    }

    type Log = Arc<Mutex<Vec<Event>>>;

    /// Channel that replays queued payloads and logs acknowledgments.
    struct ScriptedChannel {
        inbound: VecDeque<Bytes>,
        log: Log,
    }

    #[async_trait]
    impl FrameChannel for ScriptedChannel {
        async fn recv(&mut self) -> Result<Bytes> {
            self.inbound.pop_front().ok_or(PipeError::ChannelClosed)
        }

        async fn send_ack(&mut self) -> Result<()> {
            self.log.lock().unwrap().push(Event::Ack);
            Ok(())
        }
    }

    struct LogSink {
        log: Log,
    }

    impl PresentationSink for LogSink {
        fn present(&mut self, _w: u32, _h: u32, frame: &[u8]) -> Result<()> {
            self.log.lock().unwrap().push(Event::Present(frame.to_vec()));
            Ok(())
        }
    }

    fn scripted(
        session: SessionConfig,
        payloads: Vec<Vec<u8>>,
    ) -> (StreamController<ScriptedChannel, LogSink>, Log) {
        let log: Log = Arc::default();
        let channel = ScriptedChannel {
            inbound: payloads.into_iter().map(Bytes::from).collect(),
            log: Arc::clone(&log),
        };
        let sink = LogSink {
            log: Arc::clone(&log),
        };
        let controller = StreamController::new(channel, sink, session).unwrap();
        (controller, log)
    }

    fn encode_frames(session: SessionConfig, frames: &[Vec<u8>]) -> Vec<Vec<u8>> {
        let mut reference = vec![0u8; session.pixel_len()];
        let mut scratch = Vec::new();
        frames
            .iter()
            .map(|frame| {
                let decoded = if session.delta_enabled {
                    delta::encode(&reference, frame, &mut scratch).unwrap();
                    scratch.clone()
                } else {
                    frame.clone()
                };
                reference.copy_from_slice(frame);
                if session.compression_enabled {
                    block::compress(&decoded)
                } else {
                    decoded
                }
            })
            .collect()
    }

    fn gradient(session: &SessionConfig, shift: u8) -> Vec<u8> {
        (0..session.pixel_len())
            .map(|i| (i as u8).wrapping_mul(3).wrapping_add(shift))
            .collect()
    }

    #[tokio::test]
    async fn start_sends_ready_ack() {
        let (mut controller, log) = scripted(SessionConfig::new(2, 1), vec![]);
        assert!(!controller.state().awaiting_frame);

        controller.start().await.unwrap();

        assert_eq!(*log.lock().unwrap(), vec![Event::Ack]);
        assert!(controller.state().awaiting_frame);
        assert_eq!(controller.phase(), CyclePhase::AwaitingFrame);
        assert_eq!(controller.acks_sent(), 1);
    }

    #[tokio::test]
    async fn two_pixel_delta_frame() {
        let session = SessionConfig::new(2, 1).with_compression(false);
        let (mut controller, log) = scripted(session, vec![]);
        controller.start().await.unwrap();

        // Bring the reference to [10; 6] first.
        let mut first = vec![10u8; 6];
        first.push(0);
        controller.handle_message(&first).await.unwrap();

        controller
            .handle_message(&[1, 1, 1, 1, 1, 1, 0b0000_0011])
            .await
            .unwrap();

        assert_eq!(controller.frame().as_slice(), &[9, 9, 11, 11, 11, 11]);
        assert_eq!(
            log.lock().unwrap().last(),
            Some(&Event::Ack),
            "every frame ends with an ack"
        );
    }

    #[tokio::test]
    async fn each_ack_follows_its_present() {
        let session = SessionConfig::new(4, 3);
        let frames: Vec<Vec<u8>> = (0..5).map(|i| gradient(&session, i * 17)).collect();
        let payloads = encode_frames(session, &frames);
        let (mut controller, log) = scripted(session, payloads);

        let err = controller.run().await.unwrap_err();
        assert!(matches!(err, PipeError::ChannelClosed));

        let mut expected = vec![Event::Ack];
        for frame in &frames {
            expected.push(Event::Present(frame.clone()));
            expected.push(Event::Ack);
        }
        assert_eq!(*log.lock().unwrap(), expected);
        assert_eq!(controller.frames_presented(), 5);
        assert_eq!(controller.acks_sent(), 6);
    }

    #[tokio::test]
    async fn all_mode_combinations_reconstruct() {
        for (delta_on, lz4_on) in [(true, true), (true, false), (false, true), (false, false)] {
            let session = SessionConfig::new(5, 4)
                .with_delta(delta_on)
                .with_compression(lz4_on);
            let frames: Vec<Vec<u8>> = (0..3).map(|i| gradient(&session, i * 40)).collect();
            let payloads = encode_frames(session, &frames);

            let sink = RecordingSink::new();
            let channel = ScriptedChannel {
                inbound: payloads.into_iter().map(Bytes::from).collect(),
                log: Arc::default(),
            };
            let mut controller = StreamController::new(channel, sink, session).unwrap();
            let _ = controller.run().await;

            assert_eq!(
                controller.sink().frames(),
                frames.as_slice(),
                "mode {}",
                session.mode()
            );
        }
    }

    #[tokio::test]
    async fn frame_before_start_is_violation() {
        let (mut controller, log) = scripted(SessionConfig::new(2, 1), vec![]);
        let err = controller.handle_message(&[0; 7]).await.unwrap_err();
        assert!(matches!(err, PipeError::ProtocolViolation(_)));
        assert!(log.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn start_twice_is_violation() {
        let (mut controller, _log) = scripted(SessionConfig::new(2, 1), vec![]);
        controller.start().await.unwrap();
        assert!(matches!(
            controller.start().await,
            Err(PipeError::ProtocolViolation(_))
        ));
    }

    #[tokio::test]
    async fn decode_error_presents_nothing_and_poisons_session() {
        let session = SessionConfig::new(2, 1);
        let (mut controller, log) = scripted(session, vec![]);
        controller.start().await.unwrap();

        // One literal byte then a match with offset zero.
        let err = controller
            .handle_message(&[0x10, 0xAA, 0x00, 0x00])
            .await
            .unwrap_err();
        assert!(matches!(err, PipeError::MalformedStream { .. }));
        assert_eq!(controller.phase(), CyclePhase::Decompressing);
        assert_eq!(*log.lock().unwrap(), vec![Event::Ack]);

        // Nothing more is accepted on this session.
        let again = controller.handle_message(&[0x70, 0, 0, 0, 0, 0, 0, 0]).await;
        assert!(matches!(again, Err(PipeError::ProtocolViolation(_))));
    }

    #[tokio::test]
    async fn short_decoded_buffer_is_size_mismatch() {
        let session = SessionConfig::new(2, 1);
        let (mut controller, _log) = scripted(session, vec![]);
        controller.start().await.unwrap();

        // Literal-only block producing 6 of the 7 expected bytes.
        let err = controller
            .handle_message(&[0x60, 1, 2, 3, 4, 5, 6])
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PipeError::SizeMismatch {
                expected: 7,
                actual: 6
            }
        ));
        assert!(controller.frame().as_slice().iter().all(|&b| b == 0));
    }

    #[tokio::test]
    async fn raw_passthrough_wrong_length() {
        let session = SessionConfig::new(2, 1)
            .with_delta(false)
            .with_compression(false);
        let (mut controller, _log) = scripted(session, vec![]);
        controller.start().await.unwrap();
        assert!(matches!(
            controller.handle_message(&[1, 2, 3, 4, 5]).await,
            Err(PipeError::SizeMismatch {
                expected: 6,
                actual: 5
            })
        ));
    }

    #[tokio::test]
    async fn sink_sees_requests_between_frames() {
        let session = SessionConfig::new(1, 1).with_compression(false);
        let channel = ScriptedChannel {
            inbound: VecDeque::from(vec![Bytes::from_static(&[7, 7, 7, 0])]),
            log: Arc::default(),
        };
        let mut controller =
            StreamController::new(channel, RecordingSink::new(), session).unwrap();
        let _ = controller.run().await;

        assert_eq!(
            controller.sink().events(),
            &[
                SinkEvent::Requested(1),
                SinkEvent::Presented {
                    width: 1,
                    height: 1
                },
                SinkEvent::Requested(2),
            ]
        );
    }

    #[tokio::test]
    async fn stats_are_published() {
        let session = SessionConfig::new(3, 3);
        let frames: Vec<Vec<u8>> = (0..3).map(|i| gradient(&session, i)).collect();
        let payloads = encode_frames(session, &frames);
        let total: u64 = payloads.iter().map(|p| p.len() as u64).sum();
        let (mut controller, _log) = scripted(session, payloads);
        let stats = controller.stats_receiver();

        let _ = controller.run().await;

        let snapshot = stats.borrow().clone();
        assert_eq!(snapshot.frames, 3);
        assert_eq!(snapshot.bytes_in, total);
        assert_eq!((snapshot.width, snapshot.height), (3, 3));
    }

    #[test]
    fn zero_sized_session_rejected() {
        let channel = ScriptedChannel {
            inbound: VecDeque::new(),
            log: Arc::default(),
        };
        let result = StreamController::new(channel, RecordingSink::new(), SessionConfig::new(0, 1));
        assert!(matches!(result, Err(PipeError::InvalidConfig(_))));
    }

    #[tokio::test]
    async fn frame_timeout_is_recoverable() {
        let (viewer_io, _producer_io) = tokio::io::duplex(64);
        let channel = FramedChannel::new(viewer_io, StreamCodec::default());
        let mut controller =
            StreamController::new(channel, RecordingSink::new(), SessionConfig::new(2, 2))
                .unwrap()
                .with_frame_timeout(Some(Duration::from_millis(30)));

        let err = controller.run().await.unwrap_err();
        assert!(matches!(err, PipeError::Timeout(_)));
        assert!(err.is_recoverable());
        assert!(!controller.is_running());
    }

    #[tokio::test]
    async fn stop_handle_ends_run() {
        let (viewer_io, _producer_io) = tokio::io::duplex(64);
        let channel = FramedChannel::new(viewer_io, StreamCodec::default());
        let mut controller =
            StreamController::new(channel, RecordingSink::new(), SessionConfig::new(2, 2))
                .unwrap();

        let stop = controller.stop_handle();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            stop.store(false, Ordering::SeqCst);
        });

        controller.run().await.unwrap();
        assert_eq!(controller.acks_sent(), 1);
    }

    #[tokio::test]
    async fn mock_io_lock_step() {
        use tokio_test::io::Builder;

        let session = SessionConfig::new(2, 1).with_compression(false);
        let frame = [1u8, 2, 3, 4, 5, 6, 0];
        let ack = [1u8, 0, 0, 0, 0];
        let mut message = (frame.len() as u32).to_le_bytes().to_vec();
        message.extend_from_slice(&frame);

        let mock = Builder::new()
            .write(&ack)
            .read(&message)
            .write(&ack)
            .build();
        let channel = FramedChannel::new(mock, StreamCodec::for_session(&session));
        let mut controller =
            StreamController::new(channel, RecordingSink::new(), session).unwrap();

        assert!(matches!(
            controller.run().await,
            Err(PipeError::ChannelClosed)
        ));
        assert_eq!(controller.frame().as_slice(), &[1, 2, 3, 4, 5, 6]);
    }

    #[tokio::test]
    async fn framed_raw_frame_one_byte_long() {
        use tokio_test::io::Builder;

        let session = SessionConfig::new(2, 1).with_compression(false);
        let frame = [9u8; 8];
        let mut message = (frame.len() as u32).to_le_bytes().to_vec();
        message.extend_from_slice(&frame);

        let mock = Builder::new()
            .write(&[1, 0, 0, 0, 0])
            .read(&message)
            .build();
        let channel = FramedChannel::new(mock, StreamCodec::for_session(&session));
        let mut controller =
            StreamController::new(channel, RecordingSink::new(), session).unwrap();

        assert!(matches!(
            controller.run().await,
            Err(PipeError::SizeMismatch {
                expected: 7,
                actual: 8
            })
        ));
        assert!(controller.sink().frames().is_empty());
        assert_eq!(controller.acks_sent(), 1);
    }

    #[test]
    fn phase_display() {
        assert_eq!(CyclePhase::default().to_string(), "AwaitingFrame");
        assert_eq!(CyclePhase::Presenting.to_string(), "Presenting");
    }
}
