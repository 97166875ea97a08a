//! Frame source service.
//!
//! Serves one viewer at a time in strict lock-step: wait for the ready
//! acknowledgment, render the next pattern frame, encode it against the
//! viewer's reference, send it. A new viewer always starts from a
//! zeroed reference.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use pixpipe_core::{
    FrameEncoder, FramedChannel, PipeError, Result, StreamCodec, wait_for_stop,
};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::SourceConfig;

// ── SourceService ────────────────────────────────────────────────

pub struct SourceService {
    config: SourceConfig,
    running: Arc<AtomicBool>,
}

impl SourceService {
    pub fn new(config: SourceConfig) -> Self {
        Self {
            config,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Obtain a handle that can be used to stop the service from
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

    /// Bind the configured address and serve until stopped.
    pub async fn run(&self) -> Result<()> {
        self.config.session.validate()?;
        let listener = TcpListener::bind(&self.config.network.listen_address).await?;
        info!("source listening on {}", listener.local_addr()?);
        self.serve(listener).await
    }

    /// Accept viewers on `listener` until stopped.
    pub async fn serve(&self, listener: TcpListener) -> Result<()> {
        self.running.store(true, Ordering::SeqCst);

        while self.running.load(Ordering::SeqCst) {
            let accept = tokio::select! {
                result = listener.accept() => result,
                _ = wait_for_stop(&self.running) => break,
            };

            let (stream, peer) = match accept {
                Ok(pair) => pair,
                Err(e) => {
                    warn!("accept error: {e}");
                    continue;
                }
            };

            info!("viewer connected from {peer}");
            let outcome = tokio::select! {
                result = self.serve_viewer(stream, peer) => result,
                _ = wait_for_stop(&self.running) => break,
            };
            match outcome {
                Ok(frames) => info!("viewer {peer} done after {frames} frames"),
                Err(e) => warn!("viewer {peer} dropped: {e}"),
            }
        }

        self.running.store(false, Ordering::SeqCst);
        info!("source stopped");
        Ok(())
    }

    /// Run one lock-step session. Returns the number of frames sent.
    async fn serve_viewer(&self, stream: TcpStream, peer: SocketAddr) -> Result<u64> {
        stream.set_nodelay(true)?;
        let session = self.config.session;
        let mut channel = FramedChannel::new(stream, StreamCodec::for_session(&session));
        let mut encoder = FrameEncoder::new(session)?;
        let mut frame = vec![0u8; session.pixel_len()];

        let pattern = self.config.stream.pattern;
        let limit = self.config.stream.frame_limit;
        let interval = self.config.frame_interval();
        let mut last_sent: Option<Instant> = None;

        loop {
            match self.wait_ack(&mut channel).await {
                Ok(()) => {}
                Err(PipeError::ChannelClosed) => {
                    debug!("viewer {peer} closed the channel");
                    return Ok(encoder.frames_encoded());
                }
                Err(e) => return Err(e),
            }

            let sent = encoder.frames_encoded();
            if limit > 0 && sent >= limit {
                info!("frame limit {limit} reached for {peer}");
                return Ok(sent);
            }

            if let (Some(interval), Some(last)) = (interval, last_sent) {
                tokio::time::sleep_until(last + interval).await;
            }

            pattern.render(session.width, session.height, sent, &mut frame);
            let payload = encoder.encode(&frame)?;
            let len = payload.len();
            channel.send_frame(payload).await?;
            last_sent = Some(Instant::now());

            debug!(frame = sent + 1, bytes = len, "frame sent to {peer}");
        }
    }

    async fn wait_ack(&self, channel: &mut FramedChannel<TcpStream>) -> Result<()> {
        match self.config.ack_timeout() {
            Some(limit) => tokio::time::timeout(limit, channel.recv_ack())
                .await
                .map_err(|_| PipeError::Timeout(limit))?,
            None => channel.recv_ack().await,
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn service_creates_with_defaults() {
        let svc = SourceService::new(SourceConfig::default());
        assert!(!svc.is_running());
    }

    #[test]
    fn stop_handle_works() {
        let svc = SourceService::new(SourceConfig::default());
        let handle = svc.stop_handle();
        handle.store(true, Ordering::SeqCst);
        assert!(svc.is_running());
        svc.stop();
        assert!(!svc.is_running());
    }

    #[tokio::test]
    async fn invalid_session_is_rejected() {
        let mut config = SourceConfig::default();
        config.session.width = 0;
        config.network.listen_address = "127.0.0.1:0".into();
        let svc = SourceService::new(config);
        assert!(matches!(svc.run().await, Err(PipeError::InvalidConfig(_))));
    }

    #[tokio::test]
    async fn stop_ends_idle_serve() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let svc = Arc::new(SourceService::new(SourceConfig::default()));
        let handle = svc.stop_handle();

        let task = tokio::spawn({
            let svc = Arc::clone(&svc);
            async move { svc.serve(listener).await }
        });
        tokio::time::sleep(Duration::from_millis(50)).await;
        handle.store(false, Ordering::SeqCst);

        tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .expect("serve did not stop")
            .unwrap()
            .unwrap();
    }
}
