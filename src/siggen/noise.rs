//! Noise sources with persistent generator state.

use super::waveform::{fill_atom, Atom, Sample};
use super::Float;

// Linear congruential generator constants, modulus 2^26.
const A: Float = 67081293.0;
const B: Float = 14181771.0;
const T26: Float = 67108864.0;
const BI: Float = B / T26;

/// Binary giga, 2^30.
const B1G: Float = 1073741824.0;

pub const DEFAULT_NOISE_SEED: i32 = 123456789;
pub const DEFAULT_LRS_SEED: i32 = 1;

/// Gaussian noise from an LCG driven polar Box-Muller transform.
///
/// Each instance owns its seed, so two generators never disturb each other.
#[derive(Clone, Debug)]
pub struct WhiteNoise {
    seed: i32,
}

impl WhiteNoise {
    pub fn new() -> Self {
        WhiteNoise { seed: DEFAULT_NOISE_SEED }
    }

    /// Non-positive seeds are ignored.
    pub fn set_seed(&mut self, seed: i32) {
        if seed > 0 {
            self.seed = seed;
        }
    }

    pub fn seed(&self) -> i32 {
        self.seed
    }

    pub fn fill<T: Sample>(&mut self, buf: &mut [T], sdev: Float, n: usize, atom: Atom) {
        let total = n * atom.scalars_per_atom();
        let factor = -2.0 / (10.0 as Float).ln();
        let mut sis = self.seed as Float / T26;
        let mut i = 0;
        while i < total {
            sis = sis * A + BI;
            sis -= sis.trunc();
            let v1 = sis + sis - 1.0;
            sis = sis * A + BI;
            sis -= sis.trunc();
            let v2 = sis + sis - 1.0;

            let sum = v1 * v1 + v2 * v2;
            if sum >= 1.0 || sum == 0.0 {
                continue;
            }
            let scale = sdev * (factor * sum.ln() / sum).sqrt();
            buf[i] = T::from_float(v1 * scale);
            i += 1;
            if i < total {
                buf[i] = T::from_float(v2 * scale);
                i += 1;
            }
        }
        self.seed = (sis * T26) as i32;
    }
}

impl Default for WhiteNoise {
    fn default() -> Self {
        WhiteNoise::new()
    }
}

/// Fills `n` atoms from a linear recurring sequence and returns the register
/// value to continue from.
///
/// The register shifts left one bit per atom, feeding back the complement
/// of the XOR of bits 0, 1, 5 and 25.
pub fn lrs<T: Sample>(buf: &mut [T], amp: Float, n: usize, atom: Atom, seed: i32) -> i32 {
    let spa = atom.scalars_per_atom();
    let factor = amp / 2.0 / B1G;
    let mut register = seed;
    for out in buf[..n * spa].chunks_exact_mut(spa) {
        fill_atom(out, factor * register as Float);
        let bit0 = !(register ^ (register >> 1) ^ (register >> 5) ^ (register >> 25)) & 0x1;
        register = (register << 1) | bit0;
    }
    register
}

/// LRS noise source that carries its register across buffers.
#[derive(Clone, Debug)]
pub struct Lrs {
    register: i32,
}

impl Lrs {
    pub fn new(seed: i32) -> Self {
        Lrs { register: seed }
    }

    pub fn register(&self) -> i32 {
        self.register
    }

    pub fn fill<T: Sample>(&mut self, buf: &mut [T], amp: Float, n: usize, atom: Atom) {
        self.register = lrs(buf, amp, n, atom, self.register);
    }
}

impl Default for Lrs {
    fn default() -> Self {
        Lrs::new(DEFAULT_LRS_SEED)
    }
}
