//! Producer connection and session lifecycle.
//!
//! Each attempt opens a new TCP connection and runs a fresh
//! [`StreamController`] from a zeroed reference. Only a recoverable
//! error (a missed frame deadline) leads to another attempt.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use pixpipe_core::{
    FramedChannel, PipeError, PresentationSink, Result, StreamCodec, StreamController,
    wait_for_stop,
};
use tracing::{info, warn};

use crate::config::ViewerConfig;

/// How the viewer finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewerSummary {
    /// Sessions started, including the first.
    pub sessions: u32,
    /// Frames presented across all sessions.
    pub frames: u64,
}

/// Runs viewing sessions against one producer.
pub struct Viewer<S> {
    config: ViewerConfig,
    sink: S,
    running: Arc<AtomicBool>,
}

impl<S: PresentationSink> Viewer<S> {
    pub fn new(config: ViewerConfig, sink: S) -> Self {
        Self {
            config,
            sink,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Obtain a handle that can be used to stop the viewer from
    /// another task.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    /// Run sessions until the producer hangs up, a fatal error occurs,
    /// the retry budget is spent, or the viewer is stopped.
    ///
    /// A producer closing the channel ends the viewer normally.
    pub async fn run(&mut self) -> Result<ViewerSummary> {
        self.config.session.validate()?;
        self.running.store(true, Ordering::SeqCst);

        let mut summary = ViewerSummary {
            sessions: 0,
            frames: 0,
        };
        let mut retries = 0u32;

        let result = loop {
            if !self.is_running() {
                break Ok(());
            }
            summary.sessions += 1;

            let (frames, outcome) = self.run_session().await;
            summary.frames += frames;

            match outcome {
                Ok(()) => break Ok(()),
                Err(PipeError::ChannelClosed) => {
                    info!("producer closed the stream");
                    break Ok(());
                }
                Err(e) if e.is_recoverable() && self.may_retry(retries) => {
                    retries += 1;
                    let delay = self.config.backoff(retries);
                    warn!(
                        "{e}; reconnecting in {delay:?} (attempt {retries}/{})",
                        self.config.reconnect.max_attempts
                    );
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = wait_for_stop(&self.running) => break Ok(()),
                    }
                }
                Err(e) => break Err(e),
            }
        };

        self.running.store(false, Ordering::SeqCst);
        info!(
            "viewer finished: {} session(s), {} frame(s)",
            summary.sessions, summary.frames
        );
        result.map(|()| summary)
    }

    fn may_retry(&self, retries: u32) -> bool {
        self.config.reconnect.enabled && retries < self.config.reconnect.max_attempts
    }

    /// One connection, one session. Returns the frames it presented.
    async fn run_session(&mut self) -> (u64, Result<()>) {
        let session = self.config.session;
        let address = self.config.network.producer_address.clone();
        info!("connecting to producer at {address}");

        let channel = match FramedChannel::connect(
            address.as_str(),
            StreamCodec::for_session(&session),
            self.config.connect_timeout(),
        )
        .await
        {
            Ok(channel) => channel,
            Err(e) => return (0, Err(e)),
        };

        let mut controller = match StreamController::new(channel, &mut self.sink, session) {
            Ok(c) => c.with_frame_timeout(self.config.frame_timeout()),
            Err(e) => return (0, Err(e)),
        };

        let outcome = tokio::select! {
            result = controller.run() => result,
            _ = wait_for_stop(&self.running) => Ok(()),
        };
        (controller.frames_presented(), outcome)
    }
}

// ── Tests ────────────────────────────────────────────────────────
