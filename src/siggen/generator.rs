//! The generation loop.
//!
//! Configuration lives behind one mutex shared by the generator and every
//! `Controls` handle. Each cycle copies what it needs under that lock and
//! does all pushing and pacing after releasing it, so slow consumers never
//! hold up configuration changes.

use super::config::{Config, ConfigUpdate, Shape};
use super::noise::{Lrs, WhiteNoise};
use super::phase::{delta_phase, Phase};
use super::port::{float_to_short, ChannelPort, OutputPort};
use super::sri::{resolve_stream_id, SriManager, SriUpdate, StreamSri};
use super::timestamp::PrecisionTime;
use super::waveform::{self, Atom};
use super::Float;
use super::SigGenError;

use crossbeam_channel::{bounded, Receiver, Sender, TryRecvError};
use log::{debug, error, info, warn};

use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Wait before the next cycle when the last one produced nothing.
pub const NOOP_PAUSE: Duration = Duration::from_micros(12500);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ServiceResult {
    Normal, // a packet was pushed
    Noop,   // nothing to produce, call again after a pause
    Finish, // stop calling
}

struct Settings {
    config: Config,
    sri: SriManager,
    noise_seed: Option<i32>, // not yet handed to the loop
}

/// Everything one cycle needs, copied under the lock.
struct Snapshot {
    shape: Shape,
    frequency: Float,
    magnitude: Float,
    xfer_len: usize,
    throttle: bool,
    sample_interval: Float,
    sri: StreamSri,
    update: Option<SriUpdate>,
    noise_seed: Option<i32>,
}

impl Settings {
    fn new(mut config: Config) -> Result<Settings, SigGenError> {
        config.validate()?;
        config.stream_id = resolve_stream_id(&config.stream_id);
        let sri = SriManager::new(&config);
        Ok(Settings { config, sri, noise_seed: None })
    }

    /// Validates the whole diff before touching anything, then runs the
    /// change handler of every field that actually changed.
    fn apply(&mut self, update: &ConfigUpdate) -> Result<(), SigGenError> {
        let mut config = self.config.merged(update);
        config.validate()?;
        config.stream_id = resolve_stream_id(&config.stream_id);
        let old = std::mem::replace(&mut self.config, config);

        if self.config.sample_rate != old.sample_rate {
            self.sample_rate_changed();
        }
        if self.config.stream_id != old.stream_id {
            self.stream_id_changed(&old.stream_id);
        }
        if self.config.sri_blocking != old.sri_blocking {
            self.sri.set_blocking(self.config.sri_blocking);
        }
        if self.config.chan_rf != old.chan_rf || self.config.col_rf != old.col_rf {
            self.sri.set_keywords(self.config.chan_rf, self.config.col_rf);
        }
        if self.config.xfer_len != old.xfer_len {
            self.sri.mark_dirty();
        }
        Ok(())
    }

    fn sample_rate_changed(&mut self) {
        let interval = self.config.sample_interval();
        if self.sri.set_sample_interval(interval) {
            info!("Sample rate changed to {} Hz", self.config.sample_rate);
        }
    }

    fn stream_id_changed(&mut self, old: &str) {
        info!("Stream id changed from \"{}\" to \"{}\"", old, self.config.stream_id);
        self.sri.set_stream_id(&self.config.stream_id);
    }

    fn snapshot(&mut self) -> Snapshot {
        Snapshot {
            shape: self.config.shape,
            frequency: self.config.frequency,
            magnitude: self.config.magnitude,
            xfer_len: self.config.xfer_len,
            throttle: self.config.throttle,
            sample_interval: self.config.sample_interval(),
            sri: self.sri.sri().clone(),
            update: self.sri.take_update(),
            noise_seed: self.noise_seed.take(),
        }
    }
}

fn lock(settings: &Mutex<Settings>) -> MutexGuard<'_, Settings> {
    match settings.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Configuration path into a running generator.
#[derive(Clone)]
pub struct Controls {
    settings: Arc<Mutex<Settings>>,
}

impl Controls {
    /// Applies all fields of `update` or, on error, none of them.
    pub fn configure(&self, update: &ConfigUpdate) -> Result<(), SigGenError> {
        debug!("configure {:?}", update);
        lock(&self.settings).apply(update)
    }

    pub fn config(&self) -> Config {
        lock(&self.settings).config.clone()
    }

    pub fn sri(&self) -> StreamSri {
        lock(&self.settings).sri.sri().clone()
    }

    pub fn is_sri_dirty(&self) -> bool {
        lock(&self.settings).sri.is_dirty()
    }

    /// Reseeds the white noise source at the start of the next cycle.
    pub fn set_noise_seed(&self, seed: i32) {
        lock(&self.settings).noise_seed = Some(seed);
    }
}

pub struct SigGen {
    settings: Arc<Mutex<Settings>>,
    float_out: Box<dyn OutputPort<f32>>,
    short_out: Box<dyn OutputPort<i16>>,

    data: Vec<f32>,
    short_data: Vec<i16>,
    phase: Phase,
    noise: WhiteNoise,
    lrs: Lrs,
    next_time: PrecisionTime,
}

impl SigGen {
    pub fn new<F, S>(config: Config, float_out: F, short_out: S) -> Result<SigGen, SigGenError>
    where
        F: OutputPort<f32> + 'static,
        S: OutputPort<i16> + 'static,
    {
        let settings = Settings::new(config)?;
        Ok(SigGen {
            settings: Arc::new(Mutex::new(settings)),
            float_out: Box::new(float_out),
            short_out: Box::new(short_out),
            data: Vec::new(),
            short_data: Vec::new(),
            phase: Phase::new(),
            noise: WhiteNoise::new(),
            lrs: Lrs::default(),
            next_time: PrecisionTime::now(),
        })
    }

    /// Creates a generator publishing on `dataFloat_out` and `dataShort_out`
    /// channel ports, and returns handles to both ports for connecting
    /// consumers.
    pub fn with_channel_ports(config: Config) -> Result<(SigGen, ChannelPort<f32>, ChannelPort<i16>), SigGenError> {
        let float_out = ChannelPort::new("dataFloat_out");
        let short_out = ChannelPort::new("dataShort_out");
        let siggen = SigGen::new(config, float_out.clone(), short_out.clone())?;
        Ok((siggen, float_out, short_out))
    }

    pub fn controls(&self) -> Controls {
        Controls { settings: self.settings.clone() }
    }

    pub fn phase(&self) -> Float {
        self.phase.value()
    }

    pub fn next_time(&self) -> PrecisionTime {
        self.next_time
    }

    /// Restarts the output clock from the wall clock.
    pub fn start(&mut self) {
        self.next_time = PrecisionTime::now();
        info!("Generator started at {:.6}", self.next_time.as_secs());
    }

    /// Runs one generation cycle.
    pub fn service_function(&mut self) -> Result<ServiceResult, SigGenError> {
        let snapshot = lock(&self.settings).snapshot();

        if let Some(seed) = snapshot.noise_seed {
            self.noise.set_seed(seed);
        }

        if let Some(closing) = snapshot.update.as_ref().and_then(|u| u.closing.as_deref()) {
            info!("Closing stream \"{}\"", closing);
            self.push_eos(closing);
        }

        if self.data.len() != snapshot.xfer_len {
            self.resize_buffers(snapshot.xfer_len)?;
        }

        let stream_id = &snapshot.sri.stream_id;
        if snapshot.update.is_some() || self.missing_sri(stream_id) {
            self.push_sri(&snapshot.sri);
        }

        if snapshot.xfer_len == 0 {
            return Ok(ServiceResult::Noop);
        }

        let dp = delta_phase(snapshot.frequency, snapshot.sample_interval, snapshot.shape);
        self.generate(snapshot.shape, snapshot.magnitude, dp, snapshot.xfer_len);
        self.phase.advance(dp, snapshot.xfer_len);

        if let Err(e) = self.float_out.push_packet(&self.data, self.next_time, false, stream_id) {
            warn!("{}", e);
        }
        if self.short_out.is_active() {
            float_to_short(&self.data, &mut self.short_data);
            if let Err(e) = self.short_out.push_packet(&self.short_data, self.next_time, false, stream_id) {
                warn!("{}", e);
            }
        }

        let duration = snapshot.xfer_len as Float * snapshot.sample_interval;
        self.next_time.advance(duration);

        if snapshot.throttle {
            pace(duration);
        }
        Ok(ServiceResult::Normal)
    }

    /// Starts the loop on its own thread.
    pub fn spawn(mut self) -> Runner {
        let (stop, stop_receiver) = bounded(1);
        let handle = thread::spawn(move || {
            self.start();
            self.run(&stop_receiver);
            self
        });
        Runner { stop, handle }
    }

    /// Calls `service_function` until told to stop. The stop signal is only
    /// checked between cycles.
    fn run(&mut self, stop: &Receiver<()>) {
        loop {
            match stop.try_recv() {
                Err(TryRecvError::Empty) => (),
                _ => break,
            }
            match self.service_function() {
                Ok(ServiceResult::Normal) => (),
                Ok(ServiceResult::Noop) => thread::sleep(NOOP_PAUSE),
                Ok(ServiceResult::Finish) => break,
                Err(e) => {
                    error!("Generator stopped: {}", e);
                    break;
                }
            }
        }
        info!("Generator loop finished");
    }

    fn missing_sri(&self, stream_id: &str) -> bool {
        !self.float_out.has_sri(stream_id) || (self.short_out.is_active() && !self.short_out.has_sri(stream_id))
    }

    fn push_sri(&mut self, sri: &StreamSri) {
        debug!("Pushing SRI for \"{}\", xdelta {}", sri.stream_id, sri.xdelta);
        if let Err(e) = self.float_out.push_sri(sri) {
            warn!("{}", e);
        }
        if let Err(e) = self.short_out.push_sri(sri) {
            warn!("{}", e);
        }
    }

    fn push_eos(&mut self, stream_id: &str) {
        if let Err(e) = self.float_out.push_packet(&[], self.next_time, true, stream_id) {
            warn!("{}", e);
        }
        if let Err(e) = self.short_out.push_packet(&[], self.next_time, true, stream_id) {
            warn!("{}", e);
        }
    }

    fn resize_buffers(&mut self, len: usize) -> Result<(), SigGenError> {
        debug!("Resizing buffers from {} to {} samples", self.data.len(), len);
        let additional = len.saturating_sub(self.data.len());
        self.data
            .try_reserve_exact(additional)
            .map_err(|_| SigGenError::BufferAllocation(len))?;
        self.short_data
            .try_reserve_exact(additional)
            .map_err(|_| SigGenError::BufferAllocation(len))?;
        self.data.resize(len, 0.0);
        self.short_data.resize(len, 0);
        Ok(())
    }

    fn generate(&mut self, shape: Shape, amp: Float, dp: Float, n: usize) {
        let p = self.phase.value();
        let buf = &mut self.data[..];
        match shape {
            Shape::Sine => waveform::sincos(buf, amp, p, dp, n, Atom::Real),
            Shape::Square => waveform::square(buf, amp, p, dp, n, Atom::Real),
            Shape::Triangle => waveform::triangle(buf, amp, p, dp, n, Atom::Real),
            Shape::Sawtooth => waveform::sawtooth(buf, amp, p, dp, n, Atom::Real),
            Shape::Pulse => waveform::pulse(buf, amp, p, dp, n, Atom::Real),
            Shape::Constant => waveform::constant(buf, amp, n, Atom::Real),
            Shape::WhiteNoise => self.noise.fill(buf, amp, n, Atom::Real),
            Shape::Lrs => self.lrs.fill(buf, amp, n, Atom::Real),
        }
    }
}

/// Best effort sleep; a duration that cannot be represented is skipped.
fn pace(seconds: Float) {
    match Duration::try_from_secs_f64(seconds) {
        Ok(wait) => thread::sleep(wait),
        Err(e) => debug!("Not pacing for {} s: {}", seconds, e),
    }
}

/// Handle to a generator running on its own thread.
///
/// Dropping the handle also ends the loop, after the cycle in progress.
pub struct Runner {
    stop: Sender<()>,
    handle: JoinHandle<SigGen>,
}

impl Runner {
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Stops the loop and hands the generator back, or `None` if the
    /// thread panicked.
    pub fn stop(self) -> Option<SigGen> {
        let _ = self.stop.send(());
        self.handle.join().ok()
    }
}
