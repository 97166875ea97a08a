//! # Frame stream pipeline
//!
//! ```text
//! PRODUCER                                     VIEWER
//! ┌──────────────────┐                        ┌──────────────────────┐
//! │ delta::encode    │                        │ block::decompress    │
//! │   ↓              │   length-prefixed TCP  │   ↓                  │
//! │ block::compress  │ ─────── frame ───────► │ delta::reconstruct   │
//! │   ↓              │                        │   ↓                  │
//! │ send_frame       │ ◄────── 0x00 ack ───── │ sink.present → ack   │
//! └──────────────────┘                        └──────────────────────┘
//! ```
//!
//! | Module       | Purpose                                             |
//! |--------------|-----------------------------------------------------|
//! | `block`      | LZ4 block format decoder and greedy encoder         |
//! | `delta`      | Sign-bitmap delta reconstruction and encoding       |
//! | `store`      | The retained reference frame                        |
//! | `channel`    | `FrameChannel` trait and the framed TCP channel     |
//! | `controller` | Viewer-side lock-step state machine                 |
//! | `sink`       | Presentation sinks                                  |
//! | `source`     | Producer-side frame encoder                         |
//! | `stats`      | Frame statistics                                    |

pub mod block;
pub mod channel;
pub mod controller;
pub mod delta;
pub mod sink;
pub mod source;
pub mod stats;
pub mod store;

pub use channel::{ACK_SENTINEL, FrameChannel, FramedChannel};
pub use controller::{CyclePhase, ProtocolState, StreamController};
pub use sink::{PresentationSink, PresentedFrame, RecordingSink, SinkEvent, WatchSink};
pub use source::FrameEncoder;
pub use stats::{FpsCounter, FrameStats};
pub use store::FrameStore;
