//! Stream descriptor (SRI) state.
//!
//! The descriptor is republished only when it is dirty. When the stream
//! identity changes while a stream is open, the update also names the old
//! identity so the caller can close it before announcing the new one.

use super::config::{Config, UNSET};
use super::Float;

use log::debug;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const CHAN_RF: &str = "CHAN_RF";
pub const COL_RF: &str = "COL_RF";

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Units {
    None,
    Time,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Keyword {
    pub id: String,
    pub value: Float,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct StreamSri {
    pub hversion: i32,
    pub xstart: Float,
    pub xdelta: Float, // seconds per sample
    pub xunits: Units,
    pub subsize: i32,
    pub ystart: Float,
    pub ydelta: Float,
    pub yunits: Units,
    pub mode: i16, // 0 = real, 1 = complex
    pub stream_id: String,
    pub blocking: bool,
    pub keywords: Vec<Keyword>,
}

impl StreamSri {
    pub fn new(stream_id: &str) -> Self {
        StreamSri {
            hversion: 1,
            xstart: 0.0,
            xdelta: 0.0,
            xunits: Units::Time,
            subsize: 0,
            ystart: 0.0,
            ydelta: 0.0,
            yunits: Units::None,
            mode: 0,
            stream_id: stream_id.to_string(),
            blocking: false,
            keywords: Vec::new(),
        }
    }

    pub fn keyword(&self, id: &str) -> Option<Float> {
        self.keywords.iter().find(|k| k.id == id).map(|k| k.value)
    }
}

/// Builds the keyword list from scratch, leaving out unset tags.
pub fn build_keywords(chan_rf: Float, col_rf: Float) -> Vec<Keyword> {
    let mut keywords = Vec::new();
    if chan_rf != UNSET {
        keywords.push(Keyword { id: CHAN_RF.to_string(), value: chan_rf });
    }
    if col_rf != UNSET {
        keywords.push(Keyword { id: COL_RF.to_string(), value: col_rf });
    }
    keywords
}

/// Replaces an empty identity with a random one.
pub fn resolve_stream_id(stream_id: &str) -> String {
    if stream_id.is_empty() {
        Uuid::new_v4().to_string()
    } else {
        stream_id.to_string()
    }
}

/// Descriptor to publish, and the identity to close first if there is one.
#[derive(Clone, Debug, PartialEq)]
pub struct SriUpdate {
    pub sri: StreamSri,
    pub closing: Option<String>,
}

#[derive(Debug)]
pub struct SriManager {
    sri: StreamSri,
    dirty: bool,
    open_stream: Option<String>,
}

impl SriManager {
    /// The stream identity of `config` must already be resolved.
    pub fn new(config: &Config) -> Self {
        let mut sri = StreamSri::new(&config.stream_id);
        sri.xdelta = config.sample_interval();
        sri.blocking = config.sri_blocking;
        sri.keywords = build_keywords(config.chan_rf, config.col_rf);
        SriManager { sri, dirty: true, open_stream: None }
    }

    pub fn sri(&self) -> &StreamSri {
        &self.sri
    }

    pub fn stream_id(&self) -> &str {
        &self.sri.stream_id
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Identity of the stream announced last, if any.
    pub fn open_stream(&self) -> Option<&str> {
        self.open_stream.as_deref()
    }

    /// Updates xdelta unless the new interval is within rounding of the old.
    pub fn set_sample_interval(&mut self, xdelta: Float) -> bool {
        if xdelta > self.sri.xdelta * 1.0000001 || xdelta < self.sri.xdelta * 0.999999 {
            debug!("xdelta {} -> {}", self.sri.xdelta, xdelta);
            self.sri.xdelta = xdelta;
            self.dirty = true;
            return true;
        }
        false
    }

    pub fn set_stream_id(&mut self, stream_id: &str) {
        self.sri.stream_id = stream_id.to_string();
        self.dirty = true;
    }

    pub fn set_blocking(&mut self, blocking: bool) {
        self.sri.blocking = blocking;
        self.dirty = true;
    }

    pub fn set_keywords(&mut self, chan_rf: Float, col_rf: Float) {
        self.sri.keywords = build_keywords(chan_rf, col_rf);
        self.dirty = true;
    }

    /// Clears the dirty flag and opens the current identity.
    pub fn take_update(&mut self) -> Option<SriUpdate> {
        if !self.dirty {
            return None;
        }
        self.dirty = false;
        let closing = match self.open_stream.replace(self.sri.stream_id.clone()) {
            Some(old) if old != self.sri.stream_id => Some(old),
            _ => None,
        };
        Some(SriUpdate { sri: self.sri.clone(), closing })
    }
}
