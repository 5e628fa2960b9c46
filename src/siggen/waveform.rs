//! Waveform kernels.
//!
//! Every kernel overwrites the first `n * atom.scalars_per_atom()` values of
//! the destination buffer. The caller guarantees the capacity. Phase is
//! measured in cycles, so `p = 0.25` is a quarter period and `dp` is the
//! phase advance per sample.

use num::complex::Complex;
use num_traits::AsPrimitive;

use super::Float;

const TWOPI: Float = std::f64::consts::PI * 2.0;

/// Output sample type a kernel can write into.
pub trait Sample: Copy + Default + Send + 'static {
    fn from_float(value: Float) -> Self;
}

impl<T> Sample for T
where
    T: Copy + Default + Send + 'static,
    Float: AsPrimitive<T>,
{
    fn from_float(value: Float) -> Self {
        value.as_()
    }
}

/// Layout of one output atom.
///
/// The exact variants only change how `sincos` evaluates the carrier: one
/// `sin`/`cos` call per sample instead of the rotating phasor.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Atom {
    Real,
    Complex,
    ExactReal,
    ExactComplex,
}

impl Atom {
    pub fn scalars_per_atom(self) -> usize {
        match self {
            Atom::Real | Atom::ExactReal => 1,
            Atom::Complex | Atom::ExactComplex => 2,
        }
    }

    pub fn is_exact(self) -> bool {
        match self {
            Atom::ExactReal | Atom::ExactComplex => true,
            _ => false,
        }
    }
}

fn atoms<T>(buf: &mut [T], n: usize, atom: Atom) -> std::slice::ChunksExactMut<'_, T> {
    let spa = atom.scalars_per_atom();
    debug_assert!(buf.len() >= n * spa, "buffer too small for {} atoms", n);
    buf[..n * spa].chunks_exact_mut(spa)
}

/// Writes the same value into both halves of a complex atom.
pub(crate) fn fill_atom<T: Sample>(out: &mut [T], value: Float) {
    let value = T::from_float(value);
    for scalar in out.iter_mut() {
        *scalar = value;
    }
}

/// Writes a carrier value. Real atoms take the sine (imaginary) part.
fn write_carrier<T: Sample>(out: &mut [T], re: Float, im: Float) {
    match out {
        [out_re, out_im] => {
            *out_re = T::from_float(re);
            *out_im = T::from_float(im);
        }
        [out_im] => *out_im = T::from_float(im),
        _ => (),
    }
}

/// Sine, or cosine/sine pairs for complex atoms.
///
/// Uses the angle addition recurrence
/// `sin(x+dp) = sin(x)cos(dp) + cos(x)sin(dp)`,
/// `cos(x+dp) = cos(x)cos(dp) - sin(x)sin(dp)`
/// expressed as a rotating phasor, so only four trig calls are made per
/// buffer.
pub fn sincos<T: Sample>(buf: &mut [T], amp: Float, p: Float, dp: Float, n: usize, atom: Atom) {
    if atom.is_exact() {
        let mut p = p;
        for out in atoms(buf, n, atom) {
            let angle = p * TWOPI;
            write_carrier(out, amp * angle.cos(), amp * angle.sin());
            p += dp;
        }
        return;
    }

    let mut phasor = Complex::new(amp * (p * TWOPI).cos(), amp * (p * TWOPI).sin());
    let rotation = Complex::new((dp * TWOPI).cos(), (dp * TWOPI).sin());
    for out in atoms(buf, n, atom) {
        write_carrier(out, phasor.re, phasor.im);
        phasor = phasor * rotation;
    }
}

/// Square wave, low for the first half of the cycle.
pub fn square<T: Sample>(buf: &mut [T], amp: Float, p: Float, dp: Float, n: usize, atom: Atom) {
    let mut p = p;
    for out in atoms(buf, n, atom) {
        let mut value = -amp;
        if p >= 1.0 {
            p -= 1.0;
        } else if p >= 0.5 {
            value = amp;
        }
        fill_atom(out, value);
        p += dp;
    }
}

/// Triangle wave starting at `-amp` for phase 0.
pub fn triangle<T: Sample>(buf: &mut [T], amp: Float, p: Float, dp: Float, n: usize, atom: Atom) {
    let amp4 = 4.0 * amp;
    let mut fp = p - 0.5; // keep in double precision for phase accuracy
    for out in atoms(buf, n, atom) {
        if fp >= 0.5 {
            fp -= 1.0;
        }
        let value = if fp > 0.0 { amp - fp * amp4 } else { amp + fp * amp4 };
        fill_atom(out, value);
        fp += dp;
    }
}

/// Rising sawtooth from `-amp` to `amp`.
pub fn sawtooth<T: Sample>(buf: &mut [T], amp: Float, p: Float, dp: Float, n: usize, atom: Atom) {
    let amp2 = 2.0 * amp;
    let mut fp = p - 0.5;
    for out in atoms(buf, n, atom) {
        if fp >= 0.5 {
            fp -= 1.0;
        }
        fill_atom(out, fp * amp2);
        fp += dp;
    }
}

/// One sample of `amp` each time the phase crosses a full cycle, 0 otherwise.
pub fn pulse<T: Sample>(buf: &mut [T], amp: Float, p: Float, dp: Float, n: usize, atom: Atom) {
    let mut p = p;
    for out in atoms(buf, n, atom) {
        let value = if p >= 1.0 {
            p -= 1.0;
            amp
        } else {
            0.0
        };
        fill_atom(out, value);
        p += dp;
    }
}

pub fn constant<T: Sample>(buf: &mut [T], amp: Float, n: usize, atom: Atom) {
    for out in atoms(buf, n, atom) {
        fill_atom(out, amp);
    }
}
