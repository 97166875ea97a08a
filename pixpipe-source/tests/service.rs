//! Source service against a real viewer controller on localhost.

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use pixpipe_core::{
    FramedChannel, PipeError, RecordingSink, SessionConfig, StreamCodec, StreamController,
};
use pixpipe_source::config::SourceConfig;
use pixpipe_source::pattern::Pattern;
use pixpipe_source::service::SourceService;
use tokio::net::{TcpListener, TcpStream};

fn source_config(session: SessionConfig, pattern: Pattern, frames: u64) -> SourceConfig {
    let mut config = SourceConfig::default();
    config.session = session;
    config.stream.pattern = pattern;
    config.stream.frame_limit = frames;
    config.stream.max_fps = 0;
    config
}

async fn start_source(config: SourceConfig) -> (Arc<SourceService>, String) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    let service = Arc::new(SourceService::new(config));
    tokio::spawn({
        let service = Arc::clone(&service);
        async move { service.serve(listener).await }
    });
    (service, addr)
}

type Viewer = StreamController<FramedChannel<TcpStream>, RecordingSink>;

async fn view(addr: &str, session: SessionConfig) -> Viewer {
    let codec = StreamCodec::for_session(&session);
    let channel = FramedChannel::connect(addr, codec, Duration::from_secs(5))
        .await
        .unwrap();
    let mut controller = StreamController::new(channel, RecordingSink::new(), session)
        .unwrap()
        .with_frame_timeout(Some(Duration::from_secs(5)));
    let result = tokio::time::timeout(Duration::from_secs(10), controller.run())
        .await
        .expect("session hung");
    assert!(matches!(result, Err(PipeError::ChannelClosed)), "{result:?}");
    controller
}

fn expected(pattern: Pattern, session: &SessionConfig, frames: u64) -> Vec<Vec<u8>> {
    (0..frames)
        .map(|t| {
            let mut out = vec![0u8; session.pixel_len()];
            pattern.render(session.width, session.height, t, &mut out);
            out
        })
        .collect()
}

#[tokio::test]
async fn viewer_receives_pattern_frames() {
    for pattern in [Pattern::Gradient, Pattern::Bars, Pattern::Still] {
        let session = SessionConfig::new(40, 24);
        let (service, addr) = start_source(source_config(session, pattern, 6)).await;

        let controller = view(&addr, session).await;
        assert_eq!(
            controller.sink().frames(),
            expected(pattern, &session, 6).as_slice(),
            "pattern {pattern}"
        );
        service.stop();
    }
}

#[tokio::test]
async fn each_viewer_gets_a_fresh_session() {
    let session = SessionConfig::new(16, 16).with_compression(false);
    let (service, addr) = start_source(source_config(session, Pattern::Gradient, 3)).await;

    for _ in 0..2 {
        let controller = view(&addr, session).await;
        assert_eq!(
            controller.sink().frames(),
            expected(Pattern::Gradient, &session, 3).as_slice()
        );
    }
    service.stop_handle().store(false, Ordering::SeqCst);
}
