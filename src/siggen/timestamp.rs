use serde::{Deserialize, Serialize};

use super::Float;

use std::time::{SystemTime, UNIX_EPOCH};

/// Output epoch split into whole seconds and a fraction in [0, 1).
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq)]
pub struct PrecisionTime {
    pub twsec: Float,
    pub tfsec: Float,
}

impl PrecisionTime {
    pub fn new(twsec: Float, tfsec: Float) -> Self {
        let mut time = PrecisionTime { twsec, tfsec: 0.0 };
        time.advance(tfsec);
        time
    }

    /// Wall clock time.
    pub fn now() -> Self {
        match SystemTime::now().duration_since(UNIX_EPOCH) {
            Ok(d) => PrecisionTime {
                twsec: d.as_secs() as Float,
                tfsec: d.subsec_nanos() as Float / 1e9,
            },
            Err(_) => PrecisionTime::default(),
        }
    }

    /// Adds `seconds` and carries every whole second of the fraction, so the
    /// fraction is back in [0, 1) even for steps of more than a second.
    /// A non-finite step is ignored.
    pub fn advance(&mut self, seconds: Float) {
        if !seconds.is_finite() {
            return;
        }
        self.tfsec += seconds;
        let carry = self.tfsec.floor();
        self.twsec += carry;
        self.tfsec -= carry;
    }

    pub fn as_secs(&self) -> Float {
        self.twsec + self.tfsec
    }
}
