//! # pixpipe-viewer
//!
//! Connects to a pixpipe producer, runs the lock-step frame stream and
//! hands every reconstructed frame to a presentation sink. Missed frame
//! deadlines are retried with a fresh session; anything else ends the
//! viewer.

pub mod config;
pub mod connection;
pub mod snapshot;
