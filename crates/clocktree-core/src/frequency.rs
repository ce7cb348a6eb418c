//! Exact rational frequencies.
//!
//! Clock arithmetic is dominated by "is this an exact integer divider" checks,
//! so frequencies are kept as reduced fractions of hertz instead of floats.
//! Floating point only appears when an approximate search computes a relative
//! error.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A non-negative frequency in hertz, stored as a reduced fraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawFrequency", into = "RawFrequency")]
pub struct Frequency {
    num: u64,
    den: u64,
}

#[derive(Serialize, Deserialize)]
struct RawFrequency {
    num: u64,
    #[serde(default = "one")]
    den: u64,
}

fn one() -> u64 {
    1
}

impl TryFrom<RawFrequency> for Frequency {
    type Error = String;

    fn try_from(raw: RawFrequency) -> Result<Self, Self::Error> {
        Frequency::new(raw.num, raw.den).ok_or_else(|| "frequency denominator is zero".into())
    }
}

impl From<Frequency> for RawFrequency {
    fn from(f: Frequency) -> Self {
        RawFrequency {
            num: f.num,
            den: f.den,
        }
    }
}

fn gcd(mut a: u128, mut b: u128) -> u128 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

impl Frequency {
    /// Zero hertz, used for disabled clocks.
    pub const ZERO: Frequency = Frequency { num: 0, den: 1 };

    /// A whole number of hertz.
    pub const fn from_hz(hz: u64) -> Self {
        Frequency { num: hz, den: 1 }
    }

    /// `num / den` hertz. Returns `None` for a zero denominator.
    pub fn new(num: u64, den: u64) -> Option<Self> {
        if den == 0 {
            return None;
        }
        Self::reduce(num as u128, den as u128)
    }

    fn reduce(num: u128, den: u128) -> Option<Self> {
        let g = gcd(num, den).max(1);
        let num = u64::try_from(num / g).ok()?;
        let den = u64::try_from(den / g).ok()?;
        Some(Frequency { num, den })
    }

    pub fn numerator(&self) -> u64 {
        self.num
    }

    pub fn denominator(&self) -> u64 {
        self.den
    }

    pub fn is_zero(&self) -> bool {
        self.num == 0
    }

    /// The frequency as whole hertz, if it is one.
    pub fn as_hz(&self) -> Option<u64> {
        (self.den == 1).then_some(self.num)
    }

    /// Divide by an integer. `None` when dividing by zero or on overflow.
    pub fn div_int(self, divisor: u64) -> Option<Self> {
        if divisor == 0 {
            return None;
        }
        Self::reduce(self.num as u128, self.den as u128 * divisor as u128)
    }

    /// Multiply by an integer. `None` on overflow.
    pub fn mul_int(self, factor: u64) -> Option<Self> {
        Self::reduce(self.num as u128 * factor as u128, self.den as u128)
    }

    /// `self / other` when that ratio is a positive whole number.
    ///
    /// This is the divider check used by every exact search stage: a source of
    /// 125 MHz divides a 1 MHz goal exactly (125) but not a 115200 Hz goal.
    pub fn exact_quotient(self, other: Frequency) -> Option<u64> {
        if other.is_zero() {
            return None;
        }
        let top = self.num as u128 * other.den as u128;
        let bottom = self.den as u128 * other.num as u128;
        if top == 0 || top % bottom != 0 {
            return None;
        }
        u64::try_from(top / bottom).ok()
    }

    /// Approximate value for error computations.
    pub fn as_f64(&self) -> f64 {
        self.num as f64 / self.den as f64
    }

    /// Relative error `|1 - actual / self|` of an approximation of this frequency.
    pub fn relative_error(&self, actual: f64) -> f64 {
        (1.0 - actual / self.as_f64()).abs()
    }
}

impl From<u64> for Frequency {
    fn from(hz: u64) -> Self {
        Frequency::from_hz(hz)
    }
}

impl Ord for Frequency {
    fn cmp(&self, other: &Self) -> Ordering {
        let lhs = self.num as u128 * other.den as u128;
        let rhs = other.num as u128 * self.den as u128;
        lhs.cmp(&rhs)
    }
}

impl PartialOrd for Frequency {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.as_hz() {
            Some(hz) if hz != 0 && hz % 1_000_000 == 0 => write!(f, "{} MHz", hz / 1_000_000),
            Some(hz) if hz != 0 && hz % 1_000 == 0 => write!(f, "{} kHz", hz / 1_000),
            Some(hz) => write!(f, "{hz} Hz"),
            None => write!(f, "{}/{} Hz", self.num, self.den),
        }
    }
}
