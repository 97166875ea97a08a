//! # pixpipe-source
//!
//! Frame producer for pixpipe viewers. Accepts one viewer at a time,
//! waits for each "ready" acknowledgment, then renders, encodes and
//! sends exactly one frame. Frames come from a synthetic test pattern.

pub mod config;
pub mod pattern;
pub mod service;
