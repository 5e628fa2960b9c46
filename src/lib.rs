//! Streaming signal generator.
//!
//! Synthesizes sine, square, triangle, sawtooth, pulse, constant, white
//! noise and LRS noise buffers and pushes them, together with a stream
//! descriptor, to connected consumers at a real-time pace.

pub mod siggen;

pub type Float = f64;

pub use siggen::{
    ChannelPort, Config, ConfigUpdate, Controls, Keyword, OutputPort, Packet, PrecisionTime,
    Runner, ServiceResult, Shape, SigGen, SigGenError, StreamSri,
};
