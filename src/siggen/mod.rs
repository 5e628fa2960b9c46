pub mod config;
pub mod error;
pub mod generator;
pub mod noise;
pub mod phase;
pub mod port;
pub mod sri;
pub mod timestamp;
pub mod waveform;

pub use config::{Config, ConfigUpdate, Shape};
pub use error::SigGenError;
pub use generator::{Controls, Runner, ServiceResult, SigGen};
pub use noise::{Lrs, WhiteNoise};
pub use phase::Phase;
pub use port::{float_to_short, ChannelPort, OutputPort, Packet};
pub use sri::{Keyword, SriManager, SriUpdate, StreamSri, Units};
pub use timestamp::PrecisionTime;
pub use waveform::{Atom, Sample};

use super::Float;
