use super::sri::StreamSri;
use super::timestamp::PrecisionTime;
use super::SigGenError;

use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use log::debug;

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Clone, Debug, PartialEq)]
pub enum Packet<T> {
    Sri(StreamSri),
    Data {
        samples: Vec<T>,
        time: PrecisionTime,
        eos: bool,
        stream_id: String,
    },
}

/// Output side of the generator.
///
/// Pushes are best effort per consumer: an error reports the consumers that
/// missed the packet, the others have still received it.
pub trait OutputPort<T>: Send {
    fn name(&self) -> &str;

    /// False when nobody is listening, so the caller can skip the work of
    /// producing data for this port.
    fn is_active(&self) -> bool;

    fn push_sri(&mut self, sri: &StreamSri) -> Result<(), SigGenError>;

    fn push_packet(&mut self, data: &[T], time: PrecisionTime, eos: bool, stream_id: &str) -> Result<(), SigGenError>;

    /// True if every consumer has seen a descriptor for `stream_id`.
    fn has_sri(&self, stream_id: &str) -> bool;
}

struct Connection<T> {
    sender: Sender<Packet<T>>,
    known_streams: HashSet<String>,
}

struct Connections<T> {
    list: Vec<Connection<T>>,
    last_sri: HashMap<String, StreamSri>, // latest descriptor per open stream
}

/// Port fanning packets out to in-process consumers over channels.
///
/// Clones share the same set of connections, so consumers can connect while
/// the generator thread owns another clone. A consumer that connects after
/// a descriptor was pushed gets that descriptor ahead of its first data
/// packet.
pub struct ChannelPort<T> {
    name: String,
    connections: Arc<Mutex<Connections<T>>>,
}

impl<T> Clone for ChannelPort<T> {
    fn clone(&self) -> Self {
        ChannelPort { name: self.name.clone(), connections: self.connections.clone() }
    }
}

impl<T: Clone + Send> ChannelPort<T> {
    pub fn new(name: &str) -> Self {
        let connections = Connections { list: Vec::new(), last_sri: HashMap::new() };
        ChannelPort { name: name.to_string(), connections: Arc::new(Mutex::new(connections)) }
    }

    /// Adds a consumer with an unbounded queue.
    pub fn connect(&self) -> Receiver<Packet<T>> {
        let (sender, receiver) = unbounded();
        self.add_connection(sender);
        receiver
    }

    /// Adds a consumer whose queue holds at most `capacity` packets. A full
    /// queue blocks the generator until the consumer catches up.
    pub fn connect_bounded(&self, capacity: usize) -> Receiver<Packet<T>> {
        let (sender, receiver) = bounded(capacity);
        self.add_connection(sender);
        receiver
    }

    pub fn num_connections(&self) -> usize {
        self.lock().list.len()
    }

    fn add_connection(&self, sender: Sender<Packet<T>>) {
        let mut connections = self.lock();
        connections.list.push(Connection { sender, known_streams: HashSet::new() });
        debug!("Port {}: consumer connected, {} total", self.name, connections.list.len());
    }

    fn lock(&self) -> MutexGuard<'_, Connections<T>> {
        match self.connections.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Drops the disconnected consumers counted in `failed` and reports them.
    fn report(&self, failed: usize) -> Result<(), SigGenError> {
        if failed > 0 {
            debug!("Port {}: dropped {} disconnected consumer(s)", self.name, failed);
            return Err(SigGenError::PushFailed(self.name.clone(), failed));
        }
        Ok(())
    }
}

impl<T: Clone + Send> OutputPort<T> for ChannelPort<T> {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_active(&self) -> bool {
        !self.lock().list.is_empty()
    }

    fn push_sri(&mut self, sri: &StreamSri) -> Result<(), SigGenError> {
        let mut connections = self.lock();
        connections.last_sri.insert(sri.stream_id.clone(), sri.clone());
        let before = connections.list.len();
        connections.list.retain_mut(|connection| {
            connection.known_streams.insert(sri.stream_id.clone());
            connection.sender.send(Packet::Sri(sri.clone())).is_ok()
        });
        let failed = before - connections.list.len();
        drop(connections);
        self.report(failed)
    }

    fn push_packet(&mut self, data: &[T], time: PrecisionTime, eos: bool, stream_id: &str) -> Result<(), SigGenError> {
        let mut guard = self.lock();
        let connections = &mut *guard;
        let cached = connections.last_sri.get(stream_id);
        let before = connections.list.len();
        connections.list.retain_mut(|connection| {
            if !connection.known_streams.contains(stream_id) {
                if let Some(sri) = cached {
                    if connection.sender.send(Packet::Sri(sri.clone())).is_err() {
                        return false;
                    }
                    connection.known_streams.insert(stream_id.to_string());
                }
            }
            if eos {
                connection.known_streams.remove(stream_id);
            }
            let packet = Packet::Data { samples: data.to_vec(), time, eos, stream_id: stream_id.to_string() };
            connection.sender.send(packet).is_ok()
        });
        let failed = before - connections.list.len();
        if eos {
            connections.last_sri.remove(stream_id);
        }
        drop(guard);
        self.report(failed)
    }

    fn has_sri(&self, stream_id: &str) -> bool {
        self.lock().list.iter().all(|connection| connection.known_streams.contains(stream_id))
    }
}

/// Saturating conversion with rounding: values outside the i16 range clamp
/// to its limits. Converts `min(input.len(), output.len())` samples.
pub fn float_to_short(input: &[f32], output: &mut [i16]) {
    for (out, value) in output.iter_mut().zip(input.iter()) {
        // `as` saturates at the i16 limits and maps NaN to 0
        *out = value.round() as i16;
    }
}
