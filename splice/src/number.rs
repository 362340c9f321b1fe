use std::fmt;

use serde::Serialize;

/// A numeric value that keeps the integer/float distinction of the host language.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    pub fn as_f64(self) -> f64 {
        match self {
            Number::Int(n) => n as f64,
            Number::Float(f) => f,
        }
    }

    pub fn is_float(self) -> bool {
        matches!(self, Number::Float(_))
    }

    pub fn is_zero(self) -> bool {
        self.as_f64() == 0.0
    }

    /// True for negative values, including `-0.0`.
    pub fn is_negative(self) -> bool {
        match self {
            Number::Int(n) => n < 0,
            Number::Float(f) => f.is_sign_negative() && !f.is_nan(),
        }
    }

    pub fn neg(self) -> Number {
        match self {
            Number::Int(n) => n.checked_neg().map_or(Number::Float(-(n as f64)), Number::Int),
            Number::Float(f) => Number::Float(-f),
        }
    }

    pub fn abs(self) -> Number {
        if self.is_negative() { self.neg() } else { self }
    }

    pub fn add(self, other: Number) -> Number {
        match (self, other) {
            (Number::Int(a), Number::Int(b)) => a
                .checked_add(b)
                .map_or(Number::Float(a as f64 + b as f64), Number::Int),
            (a, b) => Number::Float(a.as_f64() + b.as_f64()),
        }
    }

    pub fn sub(self, other: Number) -> Number {
        self.add(other.neg())
    }

    pub fn mul(self, other: Number) -> Number {
        match (self, other) {
            (Number::Int(a), Number::Int(b)) => a
                .checked_mul(b)
                .map_or(Number::Float(a as f64 * b as f64), Number::Int),
            (a, b) => Number::Float(a.as_f64() * b.as_f64()),
        }
    }

    /// True division. Returns `None` for a zero divisor.
    pub fn div(self, other: Number) -> Option<Number> {
        if other.is_zero() {
            return None;
        }
        Some(Number::Float(self.as_f64() / other.as_f64()))
    }

    /// Floor division with the sign rules of the host language.
    pub fn floor_div(self, other: Number) -> Option<Number> {
        if other.is_zero() {
            return None;
        }
        match (self, other) {
            (Number::Int(a), Number::Int(b)) => Some(
                a.checked_div_euclid(b)
                    .map_or(Number::Float((a as f64 / b as f64).floor()), |q| {
                        Number::Int(q - adjust(a, b))
                    }),
            ),
            (a, b) => Some(Number::Float((a.as_f64() / b.as_f64()).floor())),
        }
    }

    /// Remainder whose sign follows the divisor.
    pub fn rem(self, other: Number) -> Option<Number> {
        if other.is_zero() {
            return None;
        }
        match (self, other) {
            (Number::Int(a), Number::Int(b)) => {
                let r = a.checked_rem(b).unwrap_or(0);
                Some(Number::Int(if r != 0 && (r < 0) != (b < 0) { r + b } else { r }))
            }
            (a, b) => {
                let (a, b) = (a.as_f64(), b.as_f64());
                let r = a % b;
                Some(Number::Float(if r != 0.0 && (r < 0.0) != (b < 0.0) { r + b } else { r }))
            }
        }
    }

    pub fn pow(self, exponent: Number) -> Number {
        match (self, exponent) {
            (Number::Int(base), Number::Int(exp)) if exp >= 0 => u32::try_from(exp)
                .ok()
                .and_then(|e| base.checked_pow(e))
                .map_or(Number::Float((base as f64).powf(exp as f64)), Number::Int),
            (base, exp) => Number::Float(base.as_f64().powf(exp.as_f64())),
        }
    }
}

// `div_euclid` rounds towards negative infinity only for positive divisors.
fn adjust(a: i64, b: i64) -> i64 {
    if b < 0 && a.checked_rem_euclid(b).is_some_and(|r| r != 0) { 1 } else { 0 }
}

impl From<i64> for Number {
    fn from(n: i64) -> Self {
        Number::Int(n)
    }
}

impl From<i32> for Number {
    fn from(n: i32) -> Self {
        Number::Int(i64::from(n))
    }
}

impl From<f64> for Number {
    fn from(f: f64) -> Self {
        Number::Float(f)
    }
}

/// Shortest round-trip representation of a float, spelled like the host language
/// (`3.0`, `1e-05`, `1.5e+16`, `inf`, `nan`).
pub fn float_repr(f: f64) -> String {
    if f.is_nan() {
        return "nan".to_string();
    }
    if f.is_infinite() {
        return if f > 0.0 { "inf".to_string() } else { "-inf".to_string() };
    }
    let debug = format!("{:?}", f);
    match debug.split_once('e') {
        Some((mantissa, exponent)) => {
            let (sign, digits) = match exponent.strip_prefix('-') {
                Some(d) => ('-', d),
                None => ('+', exponent),
            };
            format!("{}e{}{:0>2}", mantissa, sign, digits)
        }
        None => debug,
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Number::Int(n) => write!(f, "{}", n),
            Number::Float(x) => f.write_str(&float_repr(*x)),
        }
    }
}
