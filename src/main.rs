use siggen::{Config, ConfigUpdate, Controls, Packet, SigGen, SigGenError};

use clap::Parser;
use crossbeam_channel::Receiver;
use flexi_logger::{Logger, ReconfigurationHandle};
use log::{info, warn};

use std::io::{self, BufRead};
use std::path::PathBuf;
use std::thread::{self, JoinHandle};

#[derive(Parser, Debug)]
#[command(
    name = "siggen",
    version,
    about = "Streaming signal generator",
    long_about = "Generates sampled waveforms in fixed-size packets with stream metadata.\n\
                  While running, lines of the form name=value on stdin change the configuration."
)]
struct Args {
    /// JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Waveform shape (sine, square, triangle, sawtooth, pulse, constant, whitenoise, lrs)
    #[arg(long)]
    shape: Option<String>,

    /// Frequency in Hz
    #[arg(long, allow_negative_numbers = true)]
    frequency: Option<f64>,

    /// Sample rate in Hz
    #[arg(long)]
    sample_rate: Option<f64>,

    /// Amplitude, or standard deviation for white noise
    #[arg(long, allow_negative_numbers = true)]
    magnitude: Option<f64>,

    /// Samples per packet
    #[arg(long)]
    xfer_len: Option<usize>,

    /// Produce packets as fast as possible instead of in real time
    #[arg(long)]
    no_throttle: bool,

    /// Stream identity, an empty string picks a random one
    #[arg(long)]
    stream_id: Option<String>,

    /// Stop after this many data packets
    #[arg(short = 'n', long)]
    packets: Option<u64>,

    /// Write the effective configuration to this file before starting
    #[arg(long)]
    save_config: Option<PathBuf>,

    /// Log level, overridden by RUST_LOG
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Log to files in this directory instead of stderr
    #[arg(long)]
    log_dir: Option<PathBuf>,
}

impl Args {
    fn overrides(&self) -> Result<ConfigUpdate, SigGenError> {
        let shape = match &self.shape {
            Some(name) => Some(name.parse()?),
            None => None,
        };
        Ok(ConfigUpdate {
            shape,
            frequency: self.frequency,
            sample_rate: self.sample_rate,
            magnitude: self.magnitude,
            xfer_len: self.xfer_len,
            throttle: if self.no_throttle { Some(false) } else { None },
            stream_id: self.stream_id.clone(),
            ..Default::default()
        })
    }
}

fn init_logger(args: &Args) -> Result<ReconfigurationHandle, SigGenError> {
    let mut logger = Logger::with_env_or_str(&args.log_level).format(flexi_logger::opt_format);
    if let Some(dir) = &args.log_dir {
        logger = logger.log_to_file().directory(dir.clone());
    }
    logger.start().map_err(|e| SigGenError::Logger(e.to_string()))
}

/// Logs descriptors and per-packet statistics until `limit` data packets
/// have been seen or the generator goes away.
fn consume(receiver: Receiver<Packet<f32>>, limit: Option<u64>) -> JoinHandle<u64> {
    thread::spawn(move || {
        let mut count = 0;
        for packet in receiver.iter() {
            match packet {
                Packet::Sri(sri) => info!(
                    "SRI \"{}\": xdelta {} s, blocking {}, keywords {:?}",
                    sri.stream_id, sri.xdelta, sri.blocking, sri.keywords
                ),
                Packet::Data { samples, time, eos: true, stream_id } => {
                    info!("EOS \"{}\" at {:.6} ({} samples)", stream_id, time.as_secs(), samples.len())
                }
                Packet::Data { samples, time, stream_id, .. } => {
                    count += 1;
                    let (min, max, mean) = stats(&samples);
                    info!(
                        "#{} \"{}\" at {:.6}: {} samples, min {:.4}, max {:.4}, mean {:.4}",
                        count, stream_id, time.as_secs(), samples.len(), min, max, mean
                    );
                    if limit.map_or(false, |limit| count >= limit) {
                        break;
                    }
                }
            }
        }
        count
    })
}

fn stats(samples: &[f32]) -> (f32, f32, f32) {
    if samples.is_empty() {
        return (0.0, 0.0, 0.0);
    }
    let mut min = f32::MAX;
    let mut max = f32::MIN;
    let mut sum = 0.0f64;
    for v in samples {
        min = min.min(*v);
        max = max.max(*v);
        sum += *v as f64;
    }
    (min, max, (sum / samples.len() as f64) as f32)
}

/// Applies `name=value` lines from stdin. Bad lines are reported and skipped.
fn read_commands(controls: Controls) {
    thread::spawn(move || {
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    warn!("Reading stdin failed: {}", e);
                    break;
                }
            };
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            match ConfigUpdate::parse_assignment(line).and_then(|update| controls.configure(&update)) {
                Ok(()) => info!("Applied {}", line),
                Err(e) => warn!("Ignoring \"{}\": {}", line, e),
            }
        }
    });
}

fn run(args: Args) -> Result<(), SigGenError> {
    let _logger = init_logger(&args)?;

    let config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    let config = config.merged(&args.overrides()?);
    config.validate()?;
    if let Some(path) = &args.save_config {
        config.save(path)?;
        info!("Saved configuration to {}", path.display());
    }
    info!("Starting with {:?}", config);

    let (siggen, float_out, _short_out) = SigGen::with_channel_ports(config)?;
    let consumer = consume(float_out.connect(), args.packets);
    read_commands(siggen.controls());

    let runner = siggen.spawn();
    let count = consumer.join().unwrap_or(0);
    runner.stop();
    info!("Received {} data packets", count);
    Ok(())
}

fn main() {
    let args = Args::parse();
    if let Err(e) = run(args) {
        eprintln!("siggen: {}", e);
        std::process::exit(1);
    }
}
