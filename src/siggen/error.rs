use failure::Fail;

#[derive(Debug, Fail)]
pub enum SigGenError {
    #[fail(display = "invalid sample rate {}, must be finite and greater than 0", _0)]
    InvalidSampleRate(f64),

    #[fail(display = "{} must be finite, got {}", _0, _1)]
    NotFinite(&'static str, f64),

    #[fail(display = "unknown waveform shape \"{}\"", _0)]
    UnknownShape(String),

    #[fail(display = "unknown property \"{}\"", _0)]
    UnknownProperty(String),

    #[fail(display = "expected name=value, got \"{}\"", _0)]
    MalformedAssignment(String),

    #[fail(display = "invalid value \"{}\" for property {}", _1, _0)]
    InvalidValue(String, String),

    #[fail(display = "unable to allocate a buffer of {} samples", _0)]
    BufferAllocation(usize),

    #[fail(display = "push on port {} failed for {} consumer(s)", _0, _1)]
    PushFailed(String, usize),

    #[fail(display = "logger setup failed: {}", _0)]
    Logger(String),

    #[fail(display = "I/O error: {}", _0)]
    Io(#[cause] std::io::Error),

    #[fail(display = "JSON error: {}", _0)]
    Json(#[cause] serde_json::Error),
}

impl From<std::io::Error> for SigGenError {
    fn from(e: std::io::Error) -> Self {
        SigGenError::Io(e)
    }
}

impl From<serde_json::Error> for SigGenError {
    fn from(e: serde_json::Error) -> Self {
        SigGenError::Json(e)
    }
}
