use super::Float;
use super::SigGenError;

use log::info;
use serde::{Deserialize, Serialize};

use std::fmt;
use std::fs::File;
use std::io::prelude::*;
use std::io::BufReader;
use std::path::Path;
use std::str::FromStr;

/// Keyword tag value meaning "leave the keyword out".
pub const UNSET: Float = -1.0;

pub const DEFAULT_STREAM_ID: &str = "SigGen Stream";

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Shape {
    Sine,
    Square,
    Triangle,
    Sawtooth,
    Pulse,
    Constant,
    WhiteNoise,
    Lrs,
}

impl Shape {
    pub fn name(&self) -> &'static str {
        match self {
            Shape::Sine => "sine",
            Shape::Square => "square",
            Shape::Triangle => "triangle",
            Shape::Sawtooth => "sawtooth",
            Shape::Pulse => "pulse",
            Shape::Constant => "constant",
            Shape::WhiteNoise => "whitenoise",
            Shape::Lrs => "lrs",
        }
    }
}

impl Default for Shape {
    fn default() -> Self {
        Shape::Sine
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Shape {
    type Err = SigGenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sine" => Ok(Shape::Sine),
            "square" => Ok(Shape::Square),
            "triangle" => Ok(Shape::Triangle),
            "sawtooth" => Ok(Shape::Sawtooth),
            "pulse" => Ok(Shape::Pulse),
            "constant" => Ok(Shape::Constant),
            "whitenoise" => Ok(Shape::WhiteNoise),
            "lrs" => Ok(Shape::Lrs),
            _ => Err(SigGenError::UnknownShape(s.to_string())),
        }
    }
}

/// Generator configuration.
///
/// Field names match the property ids used in configuration files.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub shape: Shape,
    pub frequency: Float,   // Hz, may be negative
    pub sample_rate: Float, // Hz
    pub magnitude: Float,
    pub xfer_len: usize, // samples per packet
    pub throttle: bool,
    pub stream_id: String,
    pub chan_rf: Float, // CHAN_RF keyword, UNSET to omit
    pub col_rf: Float,  // COL_RF keyword, UNSET to omit
    pub sri_blocking: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            shape: Shape::Sine,
            frequency: 1000.0,
            sample_rate: 5000.0,
            magnitude: 1.0,
            xfer_len: 1000,
            throttle: true,
            stream_id: DEFAULT_STREAM_ID.to_string(),
            chan_rf: UNSET,
            col_rf: UNSET,
            sri_blocking: false,
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), SigGenError> {
        if !self.sample_rate.is_finite() || self.sample_rate <= 0.0 {
            return Err(SigGenError::InvalidSampleRate(self.sample_rate));
        }
        let finite = [
            ("frequency", self.frequency),
            ("magnitude", self.magnitude),
            ("chan_rf", self.chan_rf),
            ("col_rf", self.col_rf),
        ];
        for (name, value) in finite.iter() {
            if !value.is_finite() {
                return Err(SigGenError::NotFinite(*name, *value));
            }
        }
        // Finite inputs can still overflow once combined.
        let interval = self.sample_interval();
        let step = self.frequency * interval;
        let derived = [
            ("sample interval", interval),
            ("phase step", step),
            ("phase step per packet", step * self.xfer_len as Float),
            ("packet duration", interval * self.xfer_len as Float),
        ];
        for (name, value) in derived.iter() {
            if !value.is_finite() {
                return Err(SigGenError::NotFinite(*name, *value));
            }
        }
        Ok(())
    }

    pub fn sample_interval(&self) -> Float {
        1.0 / self.sample_rate
    }

    /// Returns a copy with every field set in `update` replaced.
    pub fn merged(&self, update: &ConfigUpdate) -> Config {
        let mut config = self.clone();
        if let Some(shape) = update.shape {
            config.shape = shape;
        }
        if let Some(frequency) = update.frequency {
            config.frequency = frequency;
        }
        if let Some(sample_rate) = update.sample_rate {
            config.sample_rate = sample_rate;
        }
        if let Some(magnitude) = update.magnitude {
            config.magnitude = magnitude;
        }
        if let Some(xfer_len) = update.xfer_len {
            config.xfer_len = xfer_len;
        }
        if let Some(throttle) = update.throttle {
            config.throttle = throttle;
        }
        if let Some(stream_id) = &update.stream_id {
            config.stream_id = stream_id.clone();
        }
        if let Some(chan_rf) = update.chan_rf {
            config.chan_rf = chan_rf;
        }
        if let Some(col_rf) = update.col_rf {
            config.col_rf = col_rf;
        }
        if let Some(sri_blocking) = update.sri_blocking {
            config.sri_blocking = sri_blocking;
        }
        config
    }

    pub fn from_json(serialized: &str) -> Result<Config, SigGenError> {
        let config: Config = serde_json::from_str(serialized)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(filename: &Path) -> Result<Config, SigGenError> {
        let file = File::open(filename)?;
        let mut reader = BufReader::new(file);
        let mut serialized = String::new();
        reader.read_to_string(&mut serialized)?;
        let config = Config::from_json(&serialized)?;
        info!("Loaded configuration from {}", filename.display());
        Ok(config)
    }

    pub fn save(&self, filename: &Path) -> Result<(), SigGenError> {
        let mut file = File::create(filename)?;
        let serialized = serde_json::to_string_pretty(&self)?;
        file.write_all(serialized.as_bytes())?;
        Ok(())
    }
}

/// A set of configuration changes applied as one unit.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigUpdate {
    pub shape: Option<Shape>,
    pub frequency: Option<Float>,
    pub sample_rate: Option<Float>,
    pub magnitude: Option<Float>,
    pub xfer_len: Option<usize>,
    pub throttle: Option<bool>,
    pub stream_id: Option<String>,
    pub chan_rf: Option<Float>,
    pub col_rf: Option<Float>,
    pub sri_blocking: Option<bool>,
}

impl ConfigUpdate {
    pub fn from_json(serialized: &str) -> Result<ConfigUpdate, SigGenError> {
        Ok(serde_json::from_str(serialized)?)
    }

    /// Parses a single `name=value` assignment.
    pub fn parse_assignment(line: &str) -> Result<ConfigUpdate, SigGenError> {
        let (name, value) = match line.split_once('=') {
            Some((name, value)) => (name.trim(), value.trim()),
            None => return Err(SigGenError::MalformedAssignment(line.trim().to_string())),
        };
        let mut update = ConfigUpdate::default();
        match name {
            "shape" => update.shape = Some(value.parse()?),
            "frequency" => update.frequency = Some(parse_value(name, value)?),
            "sample_rate" => update.sample_rate = Some(parse_value(name, value)?),
            "magnitude" => update.magnitude = Some(parse_value(name, value)?),
            "xfer_len" => update.xfer_len = Some(parse_value(name, value)?),
            "throttle" => update.throttle = Some(parse_value(name, value)?),
            "stream_id" => update.stream_id = Some(value.to_string()),
            "chan_rf" => update.chan_rf = Some(parse_value(name, value)?),
            "col_rf" => update.col_rf = Some(parse_value(name, value)?),
            "sri_blocking" => update.sri_blocking = Some(parse_value(name, value)?),
            _ => return Err(SigGenError::UnknownProperty(name.to_string())),
        }
        Ok(update)
    }

    pub fn is_empty(&self) -> bool {
        *self == ConfigUpdate::default()
    }
}

fn parse_value<T: FromStr>(name: &str, value: &str) -> Result<T, SigGenError> {
    value
        .parse()
        .map_err(|_| SigGenError::InvalidValue(name.to_string(), value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.shape, Shape::Sine);
        assert_eq!(config.frequency, 1000.0);
        assert_eq!(config.sample_rate, 5000.0);
        assert_eq!(config.magnitude, 1.0);
        assert_eq!(config.xfer_len, 1000);
        assert!(config.throttle);
        assert_eq!(config.stream_id, "SigGen Stream");
        assert_eq!(config.chan_rf, UNSET);
        assert_eq!(config.col_rf, UNSET);
        assert!(!config.sri_blocking);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_shape_names_round_trip() {
        for name in &["sine", "square", "triangle", "sawtooth", "pulse", "constant", "whitenoise", "lrs"] {
            let shape: Shape = name.parse().unwrap();
            assert_eq!(shape.to_string(), *name);
        }
        match "noise".parse::<Shape>() {
            Err(SigGenError::UnknownShape(s)) => assert_eq!(s, "noise"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_invalid_sample_rate_is_rejected() {
        for rate in &[0.0, -5000.0, Float::NAN, Float::INFINITY] {
            let config = Config { sample_rate: *rate, ..Default::default() };
            match config.validate() {
                Err(SigGenError::InvalidSampleRate(_)) => (),
                other => panic!("rate {} gave {:?}", rate, other),
            }
        }
    }

    #[test]
    fn test_non_finite_magnitude_is_rejected() {
        let config = Config { magnitude: Float::NAN, ..Default::default() };
        match config.validate() {
            Err(SigGenError::NotFinite(name, _)) => assert_eq!(name, "magnitude"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_overflowing_combination_is_rejected() {
        let config = Config { frequency: 1e300, sample_rate: 1e-10, ..Default::default() };
        match config.validate() {
            Err(SigGenError::NotFinite(name, value)) => {
                assert_eq!(name, "phase step");
                assert!(value.is_infinite());
            }
            other => panic!("unexpected {:?}", other),
        }

        let config = Config { frequency: 1e300, sample_rate: 1.0, xfer_len: 1 << 40, ..Default::default() };
        match config.validate() {
            Err(SigGenError::NotFinite(name, _)) => assert_eq!(name, "phase step per packet"),
            other => panic!("unexpected {:?}", other),
        }

        let config = Config { sample_rate: 1e-320, frequency: 0.0, ..Default::default() };
        match config.validate() {
            Err(SigGenError::NotFinite(name, _)) => assert_eq!(name, "sample interval"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_json_unknown_field_fails() {
        assert!(Config::from_json(r#"{"samplerate": 10000.0}"#).is_err());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = Config::from_json(r#"{"shape": "square", "xfer_len": 16}"#).unwrap();
        assert_eq!(config.shape, Shape::Square);
        assert_eq!(config.xfer_len, 16);
        assert_eq!(config.sample_rate, 5000.0);
    }

    #[test]
    fn test_json_unknown_shape_fails() {
        assert!(Config::from_json(r#"{"shape": "chirp"}"#).is_err());
        assert!(ConfigUpdate::from_json(r#"{"shape": "chirp"}"#).is_err());
    }

    #[test]
    fn test_json_invalid_rate_fails() {
        match Config::from_json(r#"{"sample_rate": 0.0}"#) {
            Err(SigGenError::InvalidSampleRate(rate)) => assert_eq!(rate, 0.0),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_save_and_load() {
        let path = std::env::temp_dir().join(format!("siggen-config-{}.json", std::process::id()));
        let config = Config { shape: Shape::Lrs, chan_rf: 101.5e6, ..Default::default() };
        config.save(&path).unwrap();
        let loaded = Config::load(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_parse_assignment() {
        let update = ConfigUpdate::parse_assignment(" frequency = -250.5 ").unwrap();
        assert_eq!(update.frequency, Some(-250.5));
        assert_eq!(ConfigUpdate { frequency: None, ..update }, ConfigUpdate::default());

        let update = ConfigUpdate::parse_assignment("shape=whitenoise").unwrap();
        assert_eq!(update.shape, Some(Shape::WhiteNoise));

        let update = ConfigUpdate::parse_assignment("stream_id=").unwrap();
        assert_eq!(update.stream_id, Some(String::new()));
    }

    #[test]
    fn test_parse_assignment_errors() {
        match ConfigUpdate::parse_assignment("shape=chirp") {
            Err(SigGenError::UnknownShape(_)) => (),
            other => panic!("unexpected {:?}", other),
        }
        match ConfigUpdate::parse_assignment("volume=3") {
            Err(SigGenError::UnknownProperty(name)) => assert_eq!(name, "volume"),
            other => panic!("unexpected {:?}", other),
        }
        match ConfigUpdate::parse_assignment("xfer_len=-1") {
            Err(SigGenError::InvalidValue(name, value)) => {
                assert_eq!(name, "xfer_len");
                assert_eq!(value, "-1");
            }
            other => panic!("unexpected {:?}", other),
        }
        match ConfigUpdate::parse_assignment("throttle") {
            Err(SigGenError::MalformedAssignment(_)) => (),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_merged_only_touches_set_fields() {
        let config = Config::default();
        let update = ConfigUpdate { magnitude: Some(3.0), throttle: Some(false), ..Default::default() };
        let merged = config.merged(&update);
        assert_eq!(merged.magnitude, 3.0);
        assert!(!merged.throttle);
        assert_eq!(Config { magnitude: 1.0, throttle: true, ..merged }, config);
        assert!(!update.is_empty());
        assert!(ConfigUpdate::default().is_empty());
    }
}
